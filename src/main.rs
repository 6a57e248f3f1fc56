mod cli;
mod converter;
mod error;
mod naming;
mod pool;
mod report;
mod scanner;

use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{Cli, RunConfig};
use converter::ConversionTask;
use error::SetupError;
use naming::NameGenerator;
use report::Summary;
use scanner::{Scan, scan_directory};

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Pairs every file of `format` with its destination.
fn plan(config: &RunConfig, scan: &Scan, format: &str) -> Result<Vec<ConversionTask>, SetupError> {
    let mut names = NameGenerator::new(config);
    names.protect_sources(scan.matching(format).map(|f| f.path.as_path()));
    scan.matching(format)
        .map(|file| -> Result<ConversionTask, SetupError> {
            Ok(ConversionTask {
                source: file.path.clone(),
                destination: names.destination(file)?,
                ext: file.ext.clone(),
                source_size: file.size,
                options: config.encode,
            })
        })
        .collect()
}

fn run(config: &RunConfig) -> Result<()> {
    let scan = scan_directory(&config.input)?;
    for line in report::found_types(&scan.counts) {
        println!("{line}");
    }
    if config.list_only {
        return Ok(());
    }

    let Some(format) = config.format.as_deref() else {
        println!("\nNo format specified. Use -f/--format flag (e.g., -f jpg)");
        return Ok(());
    };
    if scan.count_of(format) == 0 {
        return Err(SetupError::NoMatchingFiles {
            format: format.to_string(),
            dir: config.input.clone(),
        }
        .into());
    }

    let tasks = plan(config, &scan, format)?;
    println!("\n{}", report::run_header(tasks.len(), format, &config.encode, config.workers));

    if config.dry_run {
        println!("DRY RUN - no conversion will be performed");
        for task in &tasks {
            println!("{}", report::dry_run_line(task));
        }
        return Ok(());
    }

    fs::create_dir_all(&config.output).map_err(|source| SetupError::OutputDir {
        path: config.output.clone(),
        source,
    })?;

    let bar = ProgressBar::new(tasks.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
            .context("progress bar template")?
            .progress_chars("#>-"),
    );

    let outcomes = pool::dispatch(tasks, config.workers, converter::convert, |outcome| {
        let line = report::status_line(outcome);
        bar.suspend(|| {
            if outcome.is_ok() {
                println!("{}", style(line).green());
            } else {
                eprintln!("{}", style(line).red().for_stderr());
            }
        });
        bar.inc(1);
    })?;
    bar.finish_and_clear();

    let summary = Summary::from_outcomes(&outcomes);
    info!(
        total = summary.total(),
        succeeded = summary.succeeded,
        failed = summary.failed,
        "run finished"
    );
    println!("\n{summary}");
    Ok(())
}

fn main() -> Result<()> {
    let config = Cli::parse().into_config()?;
    init_tracing(config.verbose);
    run(&config)
}

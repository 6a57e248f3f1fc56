use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueHint};

use crate::error::SetupError;
use crate::scanner::normalize_ext;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Convert a directory of images to WebP.",
    long_about = "Scans a directory (recursively) for images of one format and converts them to WebP on a bounded pool of worker threads.\n\nSupported inputs: jpg, png, bmp, webp, gif, tiff. heic/heif/avif files are listed but cannot be decoded.",
    after_help = "Examples:\n  webp-batch -i ./photos -f jpg\n  webp-batch -i ./photos -f png --lossless\n  webp-batch -i ./photos -f jpg -o ./output --keep-name"
)]
pub struct Cli {
    #[arg(short, long, default_value = ".", value_hint = ValueHint::DirPath, help = "Directory to scan for image files.")]
    pub input: PathBuf,

    #[arg(short, long, help = "Image format to convert (e.g. jpg, png, webp).")]
    pub format: Option<String>,

    #[arg(short, long, value_hint = ValueHint::DirPath, help = "Output directory (default: same as input).")]
    pub output: Option<PathBuf>,

    #[arg(short, long, default_value = "", help = "Optional prefix for output filenames.")]
    pub prefix: String,

    #[arg(short, long, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..), help = "Number of parallel conversion workers.")]
    pub workers: u16,

    #[arg(short, long, default_value_t = 80, value_parser = clap::value_parser!(u8).range(1..=100), help_heading = "Quality Settings", help = "WebP quality for lossy compression (1-100).")]
    pub quality: u8,

    #[arg(long, help_heading = "Quality Settings", help = "Use lossless WebP compression.")]
    pub lossless: bool,

    #[arg(short, long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(0..=6), help_heading = "Quality Settings", help = "Compression method: 0=fast, 6=slowest/best.")]
    pub method: u8,

    #[arg(long = "list", help = "Only list found file types without converting.")]
    pub list_only: bool,

    #[arg(long, help = "Show what would be converted without touching any file.")]
    pub dry_run: bool,

    #[arg(long, help = "Keep the original file name (only change the extension).")]
    pub keep_name: bool,

    #[arg(short, long, action = ArgAction::Count, help = "Increase log verbosity (-v info, -vv debug).")]
    pub verbose: u8,
}

/// Encoder settings copied into every task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub quality: u8,
    pub lossless: bool,
    pub method: u8,
}

impl EncodeOptions {
    pub fn describe(&self) -> String {
        if self.lossless {
            format!("lossless, method={}", self.method)
        } else {
            format!("quality={}, method={}", self.quality, self.method)
        }
    }
}

/// Options for one run. Built once from the command line, read-only afterwards.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Normalized extension (`jpeg` folds into `jpg`), `None` when not given.
    pub format: Option<String>,
    pub prefix: String,
    pub workers: usize,
    pub encode: EncodeOptions,
    pub list_only: bool,
    pub dry_run: bool,
    pub keep_name: bool,
    pub verbose: u8,
}

impl Cli {
    pub fn into_config(self) -> Result<RunConfig, SetupError> {
        if !self.input.is_dir() {
            return Err(SetupError::InputNotDirectory(self.input));
        }

        let format = self
            .format
            .as_deref()
            .map(normalize_ext)
            .filter(|f| !f.is_empty());
        let output = self.output.unwrap_or_else(|| self.input.clone());

        Ok(RunConfig {
            input: self.input,
            output,
            format,
            prefix: self.prefix,
            workers: usize::from(self.workers).max(1),
            encode: EncodeOptions {
                quality: self.quality,
                lossless: self.lossless,
                method: self.method,
            },
            list_only: self.list_only,
            dry_run: self.dry_run,
            keep_name: self.keep_name,
            verbose: self.verbose,
        })
    }
}

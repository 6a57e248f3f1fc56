use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::debug;
use uuid::Uuid;

use crate::cli::RunConfig;
use crate::error::SetupError;
use crate::scanner::ScannedFile;

const MAX_SUFFIX: u32 = 1000;

fn random_token() -> String {
    Uuid::new_v4().simple().to_string()[..6].to_string()
}

/// Hands out destination paths for one run.
///
/// With `keep_name` the source stem is reused as-is and duplicates overwrite
/// each other, but a registered source file is never handed out as a
/// destination (it gets a `-N` suffix instead). Otherwise names are `[prefix_]YYYYMMDD_xxxxxx.webp` and never
/// repeat within the run or clash with a file already in the output dir.
pub struct NameGenerator<'a> {
    out_dir: &'a Path,
    prefix: &'a str,
    keep_name: bool,
    token: fn() -> String,
    claimed: HashSet<PathBuf>,
    /// Canonical paths of the files being converted.
    sources: HashSet<PathBuf>,
}

impl<'a> NameGenerator<'a> {
    pub fn new(config: &'a RunConfig) -> Self {
        Self::with_token(config, random_token)
    }

    fn with_token(config: &'a RunConfig, token: fn() -> String) -> Self {
        NameGenerator {
            out_dir: &config.output,
            prefix: &config.prefix,
            keep_name: config.keep_name,
            token,
            claimed: HashSet::new(),
            sources: HashSet::new(),
        }
    }

    /// Registers input files so no destination lands on one of them.
    pub fn protect_sources<'p>(&mut self, paths: impl IntoIterator<Item = &'p Path>) {
        self.sources
            .extend(paths.into_iter().filter_map(|p| fs::canonicalize(p).ok()));
    }

    fn is_source(&self, path: &Path) -> bool {
        !self.sources.is_empty()
            && fs::canonicalize(path).is_ok_and(|p| self.sources.contains(&p))
    }

    fn with_prefix(&self, body: &str) -> String {
        if self.prefix.is_empty() {
            format!("{body}.webp")
        } else {
            format!("{}_{body}.webp", self.prefix)
        }
    }

    /// Base file name, before any de-duplication.
    pub fn file_name(&self, file: &ScannedFile) -> String {
        if self.keep_name {
            let stem = file.path.file_stem().unwrap_or_default().to_string_lossy();
            return self.with_prefix(&stem);
        }
        let date = DateTime::<Local>::from(file.modified).format("%Y%m%d");
        self.with_prefix(&format!("{date}_{}", (self.token)()))
    }

    fn is_taken(&self, path: &Path) -> bool {
        self.claimed.contains(path) || path.exists()
    }

    pub fn destination(&mut self, file: &ScannedFile) -> Result<PathBuf, SetupError> {
        let path = self.out_dir.join(self.file_name(file));
        let free = if self.keep_name {
            !self.is_source(&path)
        } else {
            !self.is_taken(&path)
        };
        if free {
            self.claimed.insert(path.clone());
            return Ok(path);
        }

        let stem = path.file_stem().unwrap_or_default().to_string_lossy().into_owned();
        for i in 1..MAX_SUFFIX {
            let candidate = self.out_dir.join(format!("{stem}-{i}.webp"));
            if !self.is_taken(&candidate) && !self.is_source(&candidate) {
                debug!(from = %path.display(), to = %candidate.display(), "renamed to avoid collision");
                self.claimed.insert(candidate.clone());
                return Ok(candidate);
            }
        }
        Err(SetupError::NameExhausted(path))
    }
}

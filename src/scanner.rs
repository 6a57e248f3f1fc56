use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::SetupError;

/// Extensions picked up by the scan, lowercase.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "bmp", "webp", "gif", "tiff", "tif", "heic", "heif", "avif",
];

/// Lowercases, strips a leading dot and folds `jpeg` into `jpg`.
pub fn normalize_ext(ext: &str) -> String {
    let ext = ext.trim().trim_start_matches('.').to_lowercase();
    if ext == "jpeg" { "jpg".to_string() } else { ext }
}

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    /// Normalized extension.
    pub ext: String,
    pub size: u64,
    pub modified: SystemTime,
}

#[derive(Debug, Default)]
pub struct Scan {
    pub files: Vec<ScannedFile>,
    pub counts: BTreeMap<String, usize>,
}

impl Scan {
    pub fn matching<'a>(&'a self, format: &str) -> impl Iterator<Item = &'a ScannedFile> + 'a {
        let format = normalize_ext(format);
        self.files.iter().filter(move |f| f.ext == format)
    }

    pub fn count_of(&self, format: &str) -> usize {
        self.counts.get(&normalize_ext(format)).copied().unwrap_or(0)
    }
}

fn image_ext(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    SUPPORTED_EXTENSIONS
        .contains(&ext.as_str())
        .then(|| normalize_ext(&ext))
}

/// Walks `dir` recursively and collects every regular file with a recognized
/// image extension.
pub fn scan_directory(dir: &Path) -> Result<Scan, SetupError> {
    if !dir.is_dir() {
        return Err(SetupError::InputNotDirectory(dir.to_path_buf()));
    }

    let mut scan = Scan::default();
    for entry in WalkDir::new(dir) {
        let entry = match entry {
            Ok(e) => e,
            Err(source) if source.depth() == 0 => {
                return Err(SetupError::ReadDir { path: dir.to_path_buf(), source });
            }
            Err(e) => {
                warn!("skipping unreadable entry: {e}");
                continue;
            }
        };
        let file_type = entry.file_type();
        if !(file_type.is_file() || file_type.is_symlink()) {
            continue;
        }
        let Some(ext) = image_ext(entry.path()) else {
            continue;
        };

        // Follows symlinks, so a linked image reports its target's size and mtime.
        let metadata = match fs::metadata(entry.path()) {
            Ok(m) => m,
            Err(e) => {
                warn!("can't stat {}: {e}", entry.path().display());
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or_else(|e| {
            warn!("no modification time for {}, using now: {e}", entry.path().display());
            SystemTime::now()
        });
        debug!(path = %entry.path().display(), %ext, size = metadata.len(), "found image");

        *scan.counts.entry(ext.clone()).or_default() += 1;
        scan.files.push(ScannedFile {
            path: entry.into_path(),
            ext,
            size: metadata.len(),
            modified,
        });
    }

    Ok(scan)
}

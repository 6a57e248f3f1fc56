use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop the run before any file is converted.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("input is not a directory or not accessible: {0}")]
    InputNotDirectory(PathBuf),

    #[error("cannot read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("no .{format} files found in directory {dir}")]
    NoMatchingFiles { format: String, dir: PathBuf },

    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not find a unique name for {0}")]
    NameExhausted(PathBuf),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Per-file failure. Recorded in the file's result, never aborts the batch.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    #[error("no decoder for .{0} files")]
    Unsupported(String),

    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("webp encode failed: {0}")]
    Encode(String),

    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    #[error("encoder produced an empty file")]
    EmptyOutput,

    #[error("worker panicked: {0}")]
    Panicked(String),
}

pub type ConvertResult<T> = Result<T, ConvertError>;

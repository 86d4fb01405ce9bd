pub mod cat;
pub mod txn;

use std::path::PathBuf;

use thiserror::Error;

use crate::segment::DumpError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Dump(#[from] DumpError),

    #[error("json rendering failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Sort dump files by file name so segments print in offset order, since
/// segment files are named after their starting offset.
pub(crate) fn sort_dump_paths(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.sort_by(|a, b| {
        a.file_name()
            .cmp(&b.file_name())
            .then_with(|| a.cmp(b))
    });
    paths
}

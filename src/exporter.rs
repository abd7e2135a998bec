use serde::Serialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::export_config::{ExportConfig, OverwritePolicy};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("source file not found: {}", path.display())]
    MissingSource { path: PathBuf },

    #[error("permission denied while trying to {action} {}", path.display())]
    PermissionDenied {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("source and copy destination are the same file: {}", path.display())]
    SameFile { path: PathBuf },

    #[error("artifact already exists: {} (overwrite policy is `fail`)", path.display())]
    TargetExists { path: PathBuf },

    #[error("failed to {action} {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ExportError {
    fn from_io(action: &'static str, path: &Path, source: io::Error) -> Self {
        let path = path.to_path_buf();
        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                action,
                path,
                source,
            },
            _ => Self::Io {
                action,
                path,
                source,
            },
        }
    }
}

/// Outcome of one export run.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub working_directory: PathBuf,
    pub source: PathBuf,
    pub destination_dir: PathBuf,
    pub artifact: PathBuf,
    /// File names inside `destination_dir`, sorted.
    pub entries: Vec<String>,
}

impl ExportReport {
    /// Renders `entries` as `['a', 'b']`.
    pub fn listing_line(&self) -> String {
        let quoted: Vec<String> = self.entries.iter().map(|e| format!("'{e}'")).collect();
        format!("[{}]", quoted.join(", "))
    }
}

/// Copies the configured source file into `<working_directory>/<destination_dir_name>`
/// and renames the copy to the `.ino` artifact name.
///
/// The process working directory is neither read nor changed; callers get the
/// destination back in the report.
pub fn export_artifact(
    working_directory: &Path,
    config: &ExportConfig,
) -> Result<ExportReport, ExportError> {
    let source = working_directory.join(&config.source_relative_path);
    let source_file_name = match source.file_name() {
        Some(name) if source.is_file() => name.to_owned(),
        _ => return Err(ExportError::MissingSource { path: source }),
    };

    let destination_dir = working_directory.join(&config.destination_dir_name);
    let copied = destination_dir.join(&source_file_name);
    // Copying a file onto itself truncates it.
    if copied.exists() && same_file(&source, &copied)? {
        return Err(ExportError::SameFile { path: source });
    }

    if destination_dir.is_dir() {
        log::debug!("Reusing destination directory {}", destination_dir.display());
    } else {
        fs::create_dir(&destination_dir)
            .map_err(|e| ExportError::from_io("create directory", &destination_dir, e))?;
        log::info!("Created destination directory {}", destination_dir.display());
    }

    let artifact = destination_dir.join(config.artifact_file_name());
    let artifact_exists = artifact.exists();
    if artifact_exists && config.overwrite == OverwritePolicy::Fail {
        return Err(ExportError::TargetExists { path: artifact });
    }

    let bytes = fs::copy(&source, &copied).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound if !source.exists() => ExportError::MissingSource {
            path: source.clone(),
        },
        _ => ExportError::from_io("copy to", &copied, e),
    })?;
    log::info!(
        "Copied {} -> {} ({bytes} bytes)",
        source.display(),
        copied.display()
    );

    if copied != artifact {
        if let Err(e) = replace_artifact(&copied, &artifact, artifact_exists) {
            if let Err(cleanup) = fs::remove_file(&copied) {
                log::warn!("Failed to remove {}: {cleanup}", copied.display());
            }
            return Err(e);
        }
        log::info!("Renamed {} -> {}", copied.display(), artifact.display());
    }

    let entries = list_entries(&destination_dir)?;

    Ok(ExportReport {
        working_directory: working_directory.to_path_buf(),
        source,
        destination_dir,
        artifact,
        entries,
    })
}

fn same_file(source: &Path, copied: &Path) -> Result<bool, ExportError> {
    let source = fs::canonicalize(source).map_err(|e| ExportError::from_io("resolve", source, e))?;
    let copied = fs::canonicalize(copied).map_err(|e| ExportError::from_io("resolve", copied, e))?;
    Ok(source == copied)
}

/// Moves the fresh copy onto the artifact path. `rename` already replaces an
/// existing file on Unix; Windows needs the old artifact gone first.
#[cfg_attr(not(windows), allow(unused_variables))]
fn replace_artifact(
    copied: &Path,
    artifact: &Path,
    artifact_exists: bool,
) -> Result<(), ExportError> {
    #[cfg(windows)]
    if artifact_exists {
        fs::remove_file(artifact)
            .map_err(|e| ExportError::from_io("remove stale artifact", artifact, e))?;
        log::debug!("Removed previous artifact {}", artifact.display());
    }

    fs::rename(copied, artifact).map_err(|e| ExportError::from_io("rename copy to", artifact, e))
}

fn list_entries(dir: &Path) -> Result<Vec<String>, ExportError> {
    let read_dir = fs::read_dir(dir).map_err(|e| ExportError::from_io("list", dir, e))?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| ExportError::from_io("list", dir, e))?;
        entries.push(entry.file_name().to_string_lossy().into_owned());
    }
    entries.sort();
    Ok(entries)
}

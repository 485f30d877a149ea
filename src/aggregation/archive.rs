//! Deterministic zip packaging of collected outputs.
//!
//! Entries are named `{source stem}-{task_id}/{artifact name}`, sorted, and
//! stamped with the zip epoch (1980-01-01) so the same outputs always give
//! the same bytes. Every collected task is traceable by its folder: each
//! artifact is one file entry, and a task with no artifacts gets a single
//! directory entry `{source stem}-{task_id}/` instead. The archive is assembled in a scratch directory that is
//! removed on every exit path.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Component, Path};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::result_aggregator::CollectedOutput;
use crate::error::{BatchError, Result};
use crate::history::persistence::atomic_write;
use crate::models::Artifact;

/// `source_ref` reported for failures not attributable to a single output
pub const ARCHIVE_SCOPE: &str = "archive";

const SCRATCH_PREFIX: &str = "idphoto-archive-";
const SCRATCH_FILE: &str = "bundle.zip";

struct PendingEntry<'a> {
    name: String,
    source_ref: &'a str,
    /// `None` for the directory entry of a task without artifacts
    artifact: Option<&'a Artifact>,
}

/// Package outputs into zip bytes. Zero outputs give an empty, valid archive.
///
/// The archive holds one file entry per artifact, plus one directory entry
/// per task that produced no artifacts.
pub fn package(outputs: &[CollectedOutput], scratch_dir: Option<&Path>) -> Result<Vec<u8>> {
    let mut entries = Vec::new();
    for output in outputs {
        let folder = format!("{}-{}", file_stem(&output.source_ref), output.task_id);
        if output.outputs.is_empty() {
            entries.push(PendingEntry {
                name: format!("{folder}/"),
                source_ref: &output.source_ref,
                artifact: None,
            });
        }
        for artifact in &output.outputs {
            validate_artifact_name(&artifact.name)
                .map_err(|reason| BatchError::archive(&output.source_ref, reason))?;
            entries.push(PendingEntry {
                name: format!("{folder}/{}", artifact.name),
                source_ref: &output.source_ref,
                artifact: Some(artifact),
            });
        }
    }

    // Sort for deterministic ordering
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    if let Some(pair) = entries.windows(2).find(|pair| pair[0].name == pair[1].name) {
        return Err(BatchError::archive(
            pair[1].source_ref,
            format!("duplicate archive entry {}", pair[1].name),
        ));
    }

    let scratch = match scratch_dir {
        Some(dir) => tempfile::Builder::new().prefix(SCRATCH_PREFIX).tempdir_in(dir),
        None => tempfile::Builder::new().prefix(SCRATCH_PREFIX).tempdir(),
    }
    .map_err(|e| BatchError::archive(ARCHIVE_SCOPE, format!("cannot create scratch directory: {e}")))?;

    let bundle_path = scratch.path().join(SCRATCH_FILE);
    let file = File::create(&bundle_path)
        .map_err(|e| BatchError::archive(ARCHIVE_SCOPE, format!("cannot create bundle file: {e}")))?;

    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .last_modified_time(zip::DateTime::default())
        .compression_method(zip::CompressionMethod::Deflated);

    for entry in &entries {
        let Some(artifact) = entry.artifact else {
            zip.add_directory(entry.name.as_str(), options)
                .map_err(|e| BatchError::archive(entry.source_ref, format!("cannot add {}: {e}", entry.name)))?;
            debug!(entry = %entry.name, "Added empty task folder");
            continue;
        };
        zip.start_file(entry.name.as_str(), options)
            .map_err(|e| BatchError::archive(entry.source_ref, format!("cannot add {}: {e}", entry.name)))?;
        zip.write_all(&artifact.content)
            .map_err(|e| BatchError::archive(entry.source_ref, format!("cannot write {}: {e}", entry.name)))?;
        debug!(entry = %entry.name, bytes = artifact.len(), "Added archive entry");
    }

    zip.finish()
        .map_err(|e| BatchError::archive(ARCHIVE_SCOPE, format!("cannot finalize archive: {e}")))?;

    let bytes = fs::read(&bundle_path)
        .map_err(|e| BatchError::archive(ARCHIVE_SCOPE, format!("cannot read bundle back: {e}")))?;

    info!(
        tasks = outputs.len(),
        entries = entries.len(),
        bytes = bytes.len(),
        "Packaged output archive"
    );
    Ok(bytes)
}

/// Package outputs and atomically write the archive to `dest`.
/// Returns the archive size in bytes.
pub fn export_archive(
    outputs: &[CollectedOutput],
    dest: &Path,
    scratch_dir: Option<&Path>,
) -> Result<usize> {
    let bytes = package(outputs, scratch_dir)?;
    atomic_write(dest, &bytes)?;
    info!(path = %dest.display(), bytes = bytes.len(), "Exported output archive");
    Ok(bytes.len())
}

/// File name of `source_ref` without extension, reduced to a safe charset
fn file_stem(source_ref: &str) -> String {
    let stem = Path::new(source_ref)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("output");

    stem.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Artifact names must be plain relative paths
fn validate_artifact_name(name: &str) -> std::result::Result<(), String> {
    if name.trim().is_empty() {
        return Err("artifact has an empty name".to_string());
    }
    if name.contains('\\') {
        return Err(format!("artifact name {name:?} contains a backslash"));
    }
    let path = Path::new(name);
    if path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(format!("artifact name {name:?} is not a plain relative path"));
    }
    Ok(())
}

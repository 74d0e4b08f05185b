use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Build directory not found: {0}")]
    MissingDirectory(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub files: usize,
    pub bytes: u64,
    /// Hex SHA-256 of the archive file.
    pub sha256: String,
}

/// Zips everything under `directory` into `archive`.
///
/// An existing archive is deleted first. The archive itself is skipped when
/// it lives inside `directory`. Entry names are relative and use `/`.
pub fn compress_directory(directory: &Path, archive: &Path) -> Result<ArchiveSummary, ArchiveError> {
    if !directory.is_dir() {
        return Err(ArchiveError::MissingDirectory(directory.to_path_buf()));
    }

    info!(
        directory = %directory.display(),
        archive = %archive.display(),
        "compressing build"
    );

    if archive.exists() {
        std::fs::remove_file(archive)?;
    }
    if let Some(parent) = archive.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = ZipWriter::new(BufWriter::new(File::create(archive)?));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true);

    let archive_abs = std::fs::canonicalize(archive)?;
    let mut files = 0;

    for entry in WalkDir::new(directory).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        if std::fs::canonicalize(path)? == archive_abs {
            continue;
        }

        let relative_path = path
            .strip_prefix(directory)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        debug!(%relative_path, "adding to archive");

        writer.start_file(relative_path, options)?;
        let mut source = BufReader::new(File::open(path)?);
        io::copy(&mut source, &mut writer)?;
        files += 1;
    }

    let mut inner = writer.finish()?;
    io::Write::flush(&mut inner)?;
    drop(inner);

    let (bytes, sha256) = digest(archive)?;
    info!(files, bytes, %sha256, "archive written");

    Ok(ArchiveSummary {
        path: archive.to_path_buf(),
        files,
        bytes,
        sha256,
    })
}

fn digest(path: &Path) -> io::Result<(u64, String)> {
    let mut hasher = Sha256::new();
    let mut file = BufReader::new(File::open(path)?);
    let bytes = io::copy(&mut file, &mut hasher)?;
    Ok((bytes, hex::encode(hasher.finalize())))
}

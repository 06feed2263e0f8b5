//! Directory archiving
//!
//! Packs every regular file under a directory into one compressed container,
//! keeping relative paths. The format follows the output's extension:
//!
//! - `.tar.gz` / `.tgz` - gzip-compressed tarball
//! - anything else - zip (Deflate)
//!
//! Both use compression level 6. The archive is written to a temp file next
//! to the output and renamed into place when complete.

use crate::core::error::{FetchError, Result};
use crate::core::output;
use crate::helpers::fs_utils::ensure_parent_dir;
use crate::location::RepositoryLocation;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const COMPRESSION_LEVEL: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Self::TarGz
        } else {
            Self::Zip
        }
    }
}

/// `<repo>-<leaf of subpath, else branch, else "root">.zip`
pub fn default_archive_name(location: &RepositoryLocation) -> String {
    let tag = location
        .leaf_name()
        .map(str::to_owned)
        .or_else(|| (!location.branch.is_empty()).then(|| location.branch.replace('/', "-")))
        .unwrap_or_else(|| "root".to_owned());
    format!("{}-{}.zip", location.repository, tag)
}

/// Archive every file under `source` into `output`, returning the entry count.
pub fn create_archive(source: &Path, output_path: &Path) -> Result<usize> {
    let files = collect_files(source, output_path)?;
    if files.is_empty() {
        return Err(FetchError::ArchiveEmptySource(source.to_path_buf()));
    }

    ensure_parent_dir(output_path)?;
    if output_path.exists() {
        output::warning(&format!("overwriting existing {}", output_path.display()));
    }

    let dir = match output_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    let file = tmp.reopen()?;

    match ArchiveFormat::from_path(output_path) {
        ArchiveFormat::Zip => write_zip(file, &files)?,
        ArchiveFormat::TarGz => write_tar_gz(file, &files)?,
    }

    tmp.persist(output_path).map_err(|e| FetchError::Io(e.error))?;
    output::detail(&format!(
        "archived {} file(s) into {}",
        files.len(),
        output_path.display()
    ));
    Ok(files.len())
}

/// (absolute path, archive name) for each file, sorted by name.
fn collect_files(source: &Path, exclude: &Path) -> Result<Vec<(PathBuf, String)>> {
    if !source.is_dir() {
        return Err(FetchError::ArchiveEmptySource(source.to_path_buf()));
    }
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|e| FetchError::Io(std::io::Error::other(e.to_string())))?;
        if !entry.file_type().is_file() || entry.path() == exclude {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(source) else {
            continue;
        };
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((entry.path().to_path_buf(), name));
    }
    Ok(files)
}

fn write_zip(file: File, files: &[(PathBuf, String)]) -> Result<()> {
    let mut zip = zip::ZipWriter::new(BufWriter::new(file));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL as i64));

    for (path, name) in files {
        zip.start_file(name.as_str(), options).map_err(zip_error)?;
        let mut input = File::open(path)?;
        std::io::copy(&mut input, &mut zip)?;
    }
    let mut inner = zip.finish().map_err(zip_error)?;
    inner.flush()?;
    Ok(())
}

fn write_tar_gz(file: File, files: &[(PathBuf, String)]) -> Result<()> {
    let encoder = flate2::write::GzEncoder::new(
        BufWriter::new(file),
        flate2::Compression::new(COMPRESSION_LEVEL),
    );
    let mut builder = tar::Builder::new(encoder);
    for (path, name) in files {
        builder.append_path_with_name(path, name)?;
    }
    let encoder = builder.into_inner()?;
    let mut inner = encoder.finish()?;
    inner.flush()?;
    Ok(())
}

fn zip_error(e: zip::result::ZipError) -> FetchError {
    FetchError::Io(std::io::Error::other(e.to_string()))
}

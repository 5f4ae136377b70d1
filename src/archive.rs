use std::{
    fs,
    io::{Cursor, Read, Write},
    path::{Component, Path, PathBuf},
};
use walkdir::WalkDir;

use crate::error::{BackendError, Result, StoreError};
use crate::tree::FileEntry;

pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";
/// Cap on the total uncompressed size read out of one archive.
pub const MAX_UNPACKED_SIZE: u64 = 1000 * 1024 * 1024;
const COMPRESSION_LEVEL: i64 = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

pub fn is_zip_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".zip")
}

/// JSON when the bytes parse as JSON text, text otherwise.
pub fn classify(bytes: &[u8]) -> FileEntry {
    match serde_json::from_slice(bytes) {
        Ok(value) => FileEntry::Json(value),
        Err(_) => FileEntry::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn relative_path(name: &str) -> Option<PathBuf> {
    if name.contains('\\') {
        return None;
    }
    let path = Path::new(name);
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Packs `entries` into a zip archive at maximum compression.
///
/// Either every entry lands in the archive or the call fails.
pub fn pack(entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::<()>::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL))
        .unix_permissions(0o644);

    for entry in entries {
        if relative_path(&entry.name).is_none() {
            return Err(StoreError::Encode(format!(
                "invalid entry name: {:?}",
                entry.name
            )));
        }
        writer
            .start_file(entry.name.as_str(), options)
            .map_err(|e| StoreError::Encode(format!("{}: {}", entry.name, e)))?;
        writer
            .write_all(&entry.bytes)
            .map_err(|e| StoreError::Encode(format!("{}: {}", entry.name, e)))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| StoreError::Encode(e.to_string()))?;
    Ok(cursor.into_inner())
}

/// Packs every file below `dir`, named by its `/`-separated relative path.
pub fn pack_dir(dir: &Path) -> Result<Vec<u8>> {
    if !dir.is_dir() {
        return Err(StoreError::Encode(format!(
            "Directory not found: {}",
            dir.display()
        )));
    }
    pack(&read_dir_entries(dir)?)
}

/// Reads every regular file below `dir` into memory.
pub fn read_dir_entries(dir: &Path) -> Result<Vec<ArchiveEntry>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| StoreError::Encode(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let rel = path
            .strip_prefix(dir)
            .map_err(|e| StoreError::Encode(e.to_string()))?;
        let name = rel.to_string_lossy().replace('\\', "/");
        let bytes = fs::read(path)
            .map_err(|e| StoreError::Encode(format!("{}: {}", path.display(), e)))?;
        entries.push(ArchiveEntry { name, bytes });
    }
    Ok(entries)
}

/// Reads every file entry of a zip archive. Directory entries are skipped.
///
/// Sizes recorded in the archive are not trusted; reading stops with
/// [`StoreError::Decode`] once the content passes [`MAX_UNPACKED_SIZE`].
pub fn unpack(bytes: &[u8]) -> Result<Vec<ArchiveEntry>> {
    unpack_limited(bytes, MAX_UNPACKED_SIZE)
}

fn unpack_limited(bytes: &[u8], limit: u64) -> Result<Vec<ArchiveEntry>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| StoreError::Decode(e.to_string()))?;

    let mut entries = Vec::with_capacity(archive.len());
    let mut total: u64 = 0;
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let remaining = limit - total;
        let mut content = Vec::new();
        (&mut file)
            .take(remaining + 1)
            .read_to_end(&mut content)
            .map_err(|e| StoreError::Decode(format!("{}: {}", name, e)))?;
        if content.len() as u64 > remaining {
            return Err(StoreError::Decode(format!(
                "archive exceeds {} bytes uncompressed",
                limit
            )));
        }
        total += content.len() as u64;
        entries.push(ArchiveEntry {
            name,
            bytes: content,
        });
    }
    Ok(entries)
}

/// Extracts an archive into `dir`, replacing whatever was there.
///
/// Entries are written to a temporary sibling directory first, so a bad
/// archive leaves `dir` untouched. The old contents are moved aside and
/// only removed once the new tree is in place.
pub fn unpack_to_dir(bytes: &[u8], dir: &Path) -> Result<()> {
    let entries = unpack(bytes)?;
    let mut files = Vec::with_capacity(entries.len());
    for entry in entries {
        let rel = relative_path(&entry.name)
            .ok_or_else(|| StoreError::Decode(format!("unsafe entry name: {:?}", entry.name)))?;
        files.push((rel, entry.bytes));
    }

    let io_err = |path: &Path, e: std::io::Error| {
        StoreError::Backend(BackendError::io(path.display().to_string(), e))
    };

    let parent = match dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| io_err(&parent, e))?;
    let staging = tempfile::Builder::new()
        .prefix(".slugstash_restore_")
        .tempdir_in(&parent)
        .map_err(|e| io_err(&parent, e))?;

    for (rel, bytes) in &files {
        let out_path = staging.path().join(rel);
        if let Some(sub) = out_path.parent() {
            fs::create_dir_all(sub).map_err(|e| io_err(sub, e))?;
        }
        fs::write(&out_path, bytes).map_err(|e| io_err(&out_path, e))?;
    }

    let backup = if dir.exists() {
        let mut name = staging.path().as_os_str().to_owned();
        name.push(".old");
        let backup = PathBuf::from(name);
        fs::rename(dir, &backup).map_err(|e| io_err(dir, e))?;
        Some(backup)
    } else {
        None
    };

    let staged = staging.keep();
    if let Err(e) = fs::rename(&staged, dir) {
        if let Some(backup) = &backup {
            if let Err(restore) = fs::rename(backup, dir) {
                error!(
                    "Failed to put back {} from {}: {}",
                    dir.display(),
                    backup.display(),
                    restore
                );
            }
        }
        let _ = fs::remove_dir_all(&staged);
        return Err(io_err(dir, e));
    }
    if let Some(backup) = backup {
        if let Err(e) = fs::remove_dir_all(&backup) {
            warn!("Failed to remove old contents at {}: {}", backup.display(), e);
        }
    }
    info!("Restored {} file(s) into {}", files.len(), dir.display());
    Ok(())
}

//! Turn an uploaded zip archive or an on-disk folder tree into the
//! `folder -> file -> bytes` map the assembler consumes.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::{Component, Path};
use std::{fs, io};

use anyhow::{Context, Result};
use tracing::debug;

/// `folder name -> { file name -> bytes }`. BTreeMaps keep iteration (and
/// therefore saved-image naming and progress output) deterministic.
pub type FolderMap = BTreeMap<String, BTreeMap<String, Vec<u8>>>;

pub fn unpack_zip(bytes: &[u8]) -> Result<FolderMap> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).context("not a valid zip archive")?;
    let mut folders = FolderMap::new();

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("corrupt archive entry #{i}"))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if name.contains("__MACOSX") {
            continue;
        }
        let Some((folder, base)) = split_entry_path(&name) else {
            debug!(entry = %name, "top-level archive entry, skipping");
            continue;
        };
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buf)
            .with_context(|| format!("failed to read archive entry {name}"))?;
        folders.entry(folder).or_default().insert(base, buf);
    }

    Ok(folders)
}

/// Equivalent of the folder-picker upload: each immediate subdirectory of
/// `root` becomes one folder entry with its regular files.
pub fn read_folder_tree(root: &Path) -> Result<FolderMap> {
    let mut folders = FolderMap::new();
    let entries =
        fs::read_dir(root).with_context(|| format!("cannot read {}", root.display()))?;

    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let folder = entry.file_name().to_string_lossy().into_owned();
        let mut files = BTreeMap::new();
        for file in fs::read_dir(entry.path())? {
            let file = file?;
            if !file.file_type()?.is_file() {
                continue;
            }
            let base = file.file_name().to_string_lossy().into_owned();
            if base.starts_with('.') {
                continue;
            }
            let bytes = fs::read(file.path())
                .with_context(|| format!("cannot read {}", file.path().display()))?;
            files.insert(base, bytes);
        }
        folders.insert(folder, files);
    }

    Ok(folders)
}

/// First path component as the folder, last as the file name; entries not
/// nested under a folder yield `None`. Hidden files are dropped.
fn split_entry_path(name: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = Path::new(name)
        .components()
        .filter_map(|c| match c {
            Component::Normal(p) => p.to_str(),
            _ => None,
        })
        .collect();
    if parts.len() < 2 {
        return None;
    }
    let base = *parts.last()?;
    if base.starts_with('.') {
        return None;
    }
    Some((parts[0].to_string(), base.to_string()))
}

/// True if `path` looks like a zip upload rather than a folder tree.
pub fn is_zip_path(path: &Path) -> io::Result<bool> {
    Ok(path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip")))
}

// ── Tests ──

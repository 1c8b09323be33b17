use crate::archive::{ArchiveEntry, ArchiveEntrySource, EntryReader};
use crate::error::{MediaError, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

struct FileReader(PathBuf);

impl EntryReader for FileReader {
    fn read(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.0)
    }
}

/// Archive source over an unpacked archive tree.
///
/// Layout: `<root>/<archive>/<fileid>.<ext>`. A `.drs` suffix on the archive
/// directory is dropped, so `graphics.drs/` yields archive `graphics`.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();

        if !root.exists() {
            return Err(MediaError::config(format!(
                "Archive source not found: {}",
                root.display()
            )));
        }

        if !root.is_dir() {
            return Err(MediaError::config(format!(
                "Archive source {} is not a directory",
                root.display()
            )));
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walker(&self) -> impl Iterator<Item = walkdir::Result<DirEntry>> {
        WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(2)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
    }

    fn entry_from_file(&self, file: &DirEntry) -> Option<ArchiveEntry> {
        let archive_dir = file.path().parent()?.file_name()?.to_str()?;
        let file_name = file.file_name().to_str()?;

        let (id, extension) = file_name.split_once('.')?;
        if extension.is_empty() || extension.contains('.') {
            return None;
        }
        let file_id = id.parse::<u32>().ok()?;

        Some(ArchiveEntry::new(
            archive_name_for_dir(archive_dir),
            file_id,
            extension,
            Arc::new(FileReader(file.path().to_path_buf())),
        ))
    }
}

impl ArchiveEntrySource for DirectorySource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        let mut entries = Vec::new();

        for item in self.walker() {
            let item = match item {
                Ok(item) => item,
                Err(err) => {
                    warn!("Skipping unreadable path in archive source: {}", err);
                    continue;
                }
            };

            if item.depth() != 2 || !item.file_type().is_file() {
                continue;
            }

            match self.entry_from_file(&item) {
                Some(entry) => entries.push(entry),
                None => debug!(
                    "Ignoring {}: not named <fileid>.<ext>",
                    item.path().display()
                ),
            }
        }

        entries.sort_by_key(ArchiveEntry::key);
        Ok(entries)
    }

    fn archive_names(&self) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();

        for item in self.walker().filter_map(|e| e.ok()) {
            if item.depth() == 1 && item.file_type().is_dir() {
                if let Some(name) = item.file_name().to_str() {
                    names.insert(archive_name_for_dir(name));
                }
            }
        }

        Ok(names)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn archive_name_for_dir(dir_name: &str) -> String {
    match dir_name.len().checked_sub(4) {
        Some(cut) if dir_name.is_char_boundary(cut) && dir_name[cut..].eq_ignore_ascii_case(".drs") => {
            dir_name[..cut].to_string()
        }
        _ => dir_name.to_string(),
    }
}

use crate::archive::{ArchiveEntry, ArchiveEntrySource};
use crate::error::Result;
use std::collections::BTreeSet;

/// Archive source backed by entries already held in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    entries: Vec<ArchiveEntry>,
    archives: BTreeSet<String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, entry: ArchiveEntry) -> Self {
        self.push(entry);
        self
    }

    pub fn with_file<A: Into<String>, E: Into<String>>(
        self,
        archive_name: A,
        file_id: u32,
        extension: E,
        data: Vec<u8>,
    ) -> Self {
        self.with_entry(ArchiveEntry::from_bytes(archive_name, file_id, extension, data))
    }

    /// Registers an archive that may have no entries.
    pub fn with_archive<A: Into<String>>(mut self, archive_name: A) -> Self {
        self.archives.insert(archive_name.into());
        self
    }

    pub fn push(&mut self, entry: ArchiveEntry) {
        self.archives.insert(entry.archive_name.clone());
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ArchiveEntrySource for MemorySource {
    fn describe(&self) -> String {
        format!("in-memory source ({} entries)", self.entries.len())
    }

    fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        Ok(self.entries.clone())
    }

    fn archive_names(&self) -> Result<BTreeSet<String>> {
        Ok(self.archives.clone())
    }
}

pub mod directory;
pub mod memory;

pub use directory::DirectorySource;
pub use memory::MemorySource;

use crate::error::{MediaError, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Lazy access to the bytes of one archived file.
pub trait EntryReader: Send + Sync {
    fn read(&self) -> std::io::Result<Vec<u8>>;
}

struct InlineBytes(Arc<[u8]>);

impl EntryReader for InlineBytes {
    fn read(&self) -> std::io::Result<Vec<u8>> {
        Ok(self.0.to_vec())
    }
}

/// One named, numbered, typed payload inside an archive.
#[derive(Clone)]
pub struct ArchiveEntry {
    pub archive_name: String,
    pub file_id: u32,
    pub extension: String,
    reader: Arc<dyn EntryReader>,
}

/// Identity of an entry within one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey {
    pub archive_name: String,
    pub file_id: u32,
    pub extension: String,
}

impl ArchiveEntry {
    pub fn new<A, E>(archive_name: A, file_id: u32, extension: E, reader: Arc<dyn EntryReader>) -> Self
    where
        A: Into<String>,
        E: Into<String>,
    {
        Self {
            archive_name: archive_name.into(),
            file_id,
            extension: extension.into(),
            reader,
        }
    }

    pub fn from_bytes<A, E>(archive_name: A, file_id: u32, extension: E, data: Vec<u8>) -> Self
    where
        A: Into<String>,
        E: Into<String>,
    {
        Self::new(
            archive_name,
            file_id,
            extension,
            Arc::new(InlineBytes(data.into())),
        )
    }

    /// Fetches the raw bytes. Failures are reported as `ArchiveRead`.
    pub fn read(&self) -> Result<Vec<u8>> {
        self.reader.read().map_err(|e| MediaError::ArchiveRead {
            archive: self.archive_name.clone(),
            file_id: self.file_id,
            extension: self.extension.clone(),
            message: e.to_string(),
        })
    }

    pub fn key(&self) -> EntryKey {
        EntryKey {
            archive_name: self.archive_name.clone(),
            file_id: self.file_id,
            extension: self.extension.clone(),
        }
    }

    pub fn display_name(&self) -> String {
        format!("{}:{}.{}", self.archive_name, self.file_id, self.extension)
    }
}

impl fmt::Debug for ArchiveEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveEntry")
            .field("archive_name", &self.archive_name)
            .field("file_id", &self.file_id)
            .field("extension", &self.extension)
            .finish()
    }
}

/// Enumerates the entries of one or more archives.
pub trait ArchiveEntrySource: Send + Sync {
    /// Human readable description used in log output.
    fn describe(&self) -> String;

    fn entries(&self) -> Result<Vec<ArchiveEntry>>;

    fn archive_names(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .entries()?
            .into_iter()
            .map(|e| e.archive_name)
            .collect())
    }

    fn find(&self, archive_name: &str, file_id: u32, extension: &str) -> Result<Option<ArchiveEntry>> {
        Ok(self.entries()?.into_iter().find(|e| {
            e.archive_name == archive_name && e.file_id == file_id && e.extension == extension
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenReader;

    impl EntryReader for BrokenReader {
        fn read(&self) -> std::io::Result<Vec<u8>> {
            Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "truncated archive"))
        }
    }

    #[test]
    fn test_inline_entry_reads_bytes() {
        let entry = ArchiveEntry::from_bytes("sounds", 5000, "wav", b"RIFF".to_vec());
        assert_eq!(entry.read().unwrap(), b"RIFF");
        assert_eq!(entry.display_name(), "sounds:5000.wav");
    }

    #[test]
    fn test_read_failure_is_archive_read_error() {
        let entry = ArchiveEntry::new("graphics", 7, "slp", Arc::new(BrokenReader));
        match entry.read() {
            Err(MediaError::ArchiveRead {
                archive,
                file_id,
                message,
                ..
            }) => {
                assert_eq!(archive, "graphics");
                assert_eq!(file_id, 7);
                assert!(message.contains("truncated"));
            }
            other => panic!("unexpected result: {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_entry_keys_order_by_archive_then_id() {
        let a = ArchiveEntry::from_bytes("a", 9, "slp", vec![]).key();
        let b = ArchiveEntry::from_bytes("b", 1, "slp", vec![]).key();
        assert!(a < b);
    }
}

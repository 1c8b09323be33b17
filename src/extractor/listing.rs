use crate::archive::ArchiveEntry;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedFile {
    pub archive: String,
    pub extension: String,
}

/// Selected entries grouped by file id, in ascending id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ListingIndex {
    files: BTreeMap<u32, Vec<ListedFile>>,
}

impl ListingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: &ArchiveEntry) {
        self.files.entry(entry.file_id).or_default().push(ListedFile {
            archive: entry.archive_name.clone(),
            extension: entry.extension.clone(),
        });
    }

    pub fn get(&self, file_id: u32) -> Option<&[ListedFile]> {
        self.files.get(&file_id).map(Vec::as_slice)
    }

    /// Number of distinct file ids.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &[ListedFile])> {
        self.files.iter().map(|(id, files)| (*id, files.as_slice()))
    }

    /// One `<fileid> = [ <archive>/<fileid>.<ext>, ... ]` line per id.
    pub fn lines(&self) -> Vec<String> {
        self.iter()
            .map(|(id, files)| {
                let items: Vec<String> = files
                    .iter()
                    .map(|f| format!("{}/{}.{}", f.archive, id, f.extension))
                    .collect();
                format!("{} = [ {} ]", id, items.join(", "))
            })
            .collect()
    }
}

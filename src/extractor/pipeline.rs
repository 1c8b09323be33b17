use crate::archive::{ArchiveEntry, EntryKey};
use crate::convert::{ConversionJob, ConversionOutcome, ConversionRouter};
use crate::error::{MediaError, UserFriendlyError};
use crate::extractor::{ExtractionProgress, ListingIndex};
use crate::rules::RuleSet;
use crate::sink::OutputSink;
use crate::ui::GracefulShutdown;
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub type ProgressCallback<'a> = &'a (dyn Fn(&ExtractionProgress) + Sync);

/// What happened to one queued entry.
#[derive(Debug)]
pub enum EntryResult {
    Converted { outcome: ConversionOutcome, bytes: u64 },
    /// The converter ran and rejected the bytes.
    Rejected { error: MediaError, bytes: u64 },
    Unreadable(MediaError),
}

#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub progress: ExtractionProgress,
    /// Present only in listing mode.
    pub listing: Option<ListingIndex>,
}

/// Walks archive entries, applies the selection rules and hands selected
/// entries to their converter.
pub struct ExtractionPipeline<'a> {
    rules: RuleSet,
    router: &'a ConversionRouter,
    sink: &'a OutputSink,
    list_files: bool,
    shutdown: Option<&'a GracefulShutdown>,
    jobs: usize,
}

impl<'a> ExtractionPipeline<'a> {
    pub fn new(rules: RuleSet, router: &'a ConversionRouter, sink: &'a OutputSink) -> Self {
        Self {
            rules,
            router,
            sink,
            list_files: false,
            shutdown: None,
            jobs: 1,
        }
    }

    pub fn with_listing(mut self, list_files: bool) -> Self {
        self.list_files = list_files;
        self
    }

    pub fn with_shutdown(mut self, shutdown: &'a GracefulShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn run(
        &self,
        entries: Vec<ArchiveEntry>,
        progress_callback: Option<ProgressCallback<'_>>,
    ) -> PipelineResult {
        let mut progress = ExtractionProgress::new();
        let mut listing = self.list_files.then(ListingIndex::new);
        let mut seen: HashSet<EntryKey> = HashSet::new();
        let mut queue = Vec::new();

        for entry in entries {
            progress.entries_seen += 1;

            if !self.rules.any_matches(&entry) {
                continue;
            }

            if !seen.insert(entry.key()) {
                debug!("Skipping duplicate entry {}", entry.display_name());
                progress.duplicates_skipped += 1;
                continue;
            }
            progress.entries_selected += 1;

            if let Some(ref mut index) = listing {
                index.record(&entry);
                continue;
            }

            if self.sink.is_enabled() {
                queue.push(entry);
            }
        }

        progress.total_files = queue.len();
        info!(
            "{} of {} entries selected, {} queued for conversion",
            progress.entries_selected,
            progress.entries_seen,
            queue.len()
        );

        if !queue.is_empty() {
            progress = self.convert_all(&queue, progress, progress_callback);
        }

        PipelineResult { progress, listing }
    }

    /// Reads one entry and runs its converter.
    pub fn process_entry(&self, entry: &ArchiveEntry) -> EntryResult {
        let destination = OutputSink::entry_path(&entry.archive_name, entry.file_id, &entry.extension);
        debug!("Extracting {} to {}", entry.display_name(), destination.display());

        let data = match entry.read() {
            Ok(data) => data,
            Err(e) => return EntryResult::Unreadable(e),
        };
        let bytes = data.len() as u64;
        let converter = self.router.route(&entry.extension);
        let job = ConversionJob {
            entry,
            data: &data,
            destination: &destination,
        };

        match converter.convert(&job, self.sink) {
            Ok(outcome) => {
                debug!("{} -> {} ({})", entry.display_name(), outcome.path().display(), converter.name());
                EntryResult::Converted { outcome, bytes }
            }
            Err(error) => EntryResult::Rejected { error, bytes },
        }
    }

    fn stop_requested(&self) -> bool {
        self.shutdown.is_some_and(|s| !s.is_running())
    }

    fn record(progress: &mut ExtractionProgress, entry: &ArchiveEntry, result: EntryResult) {
        match result {
            EntryResult::Converted { outcome, bytes } => {
                if let Some(warning) = outcome.warning() {
                    progress.add_warning(format!("{}: {}", entry.display_name(), warning));
                }
                progress.update_file(entry.display_name(), &entry.extension, bytes);
            }
            EntryResult::Rejected { error, bytes } => {
                warn!("Failed to convert {}: {}", entry.display_name(), error);
                progress.update_file(entry.display_name(), &entry.extension, bytes);
                progress.add_error(format!("{}: {}", entry.display_name(), error.user_message()));
            }
            EntryResult::Unreadable(error) => {
                warn!("Failed to read {}: {}", entry.display_name(), error);
                progress.add_read_failure(format!("{}: {}", entry.display_name(), error.user_message()));
            }
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn convert_all(
        &self,
        queue: &[ArchiveEntry],
        progress: ExtractionProgress,
        progress_callback: Option<ProgressCallback<'_>>,
    ) -> ExtractionProgress {
        self.convert_sequential(queue, progress, progress_callback)
    }

    #[cfg(feature = "parallel")]
    fn convert_all(
        &self,
        queue: &[ArchiveEntry],
        progress: ExtractionProgress,
        progress_callback: Option<ProgressCallback<'_>>,
    ) -> ExtractionProgress {
        use rayon::prelude::*;
        use std::sync::Mutex;

        if self.jobs == 1 {
            return self.convert_sequential(queue, progress, progress_callback);
        }

        let pool = match rayon::ThreadPoolBuilder::new().num_threads(self.jobs).build() {
            Ok(pool) => pool,
            Err(e) => {
                warn!("Falling back to sequential conversion: {}", e);
                return self.convert_sequential(queue, progress, progress_callback);
            }
        };

        let shared = Mutex::new(progress);
        pool.install(|| {
            queue.par_iter().for_each(|entry| {
                if self.stop_requested() {
                    shared.lock().unwrap_or_else(|e| e.into_inner()).cancelled = true;
                    return;
                }

                let result = self.process_entry(entry);

                let mut progress = shared.lock().unwrap_or_else(|e| e.into_inner());
                Self::record(&mut progress, entry, result);
                if let Some(callback) = progress_callback {
                    callback(&progress);
                }
            });
        });

        shared.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn convert_sequential(
        &self,
        queue: &[ArchiveEntry],
        mut progress: ExtractionProgress,
        progress_callback: Option<ProgressCallback<'_>>,
    ) -> ExtractionProgress {
        for entry in queue {
            if self.stop_requested() {
                warn!(
                    "Stop requested, {} entries left unconverted",
                    progress.total_files.saturating_sub(progress.files_attempted())
                );
                progress.cancelled = true;
                break;
            }

            if let Some(callback) = progress_callback {
                callback(&progress);
            }

            let result = self.process_entry(entry);
            Self::record(&mut progress, entry, result);
        }

        if let Some(callback) = progress_callback {
            callback(&progress);
        }

        progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveEntrySource, EntryReader, MemorySource};
    use crate::convert::{Atlas, ImageConverter, SpriteDecoder};
    use crate::error::Result;
    use crate::metadata::{MetadataFormat, Palette};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct CountingReader(Arc<AtomicUsize>);

    impl EntryReader for CountingReader {
        fn read(&self) -> std::io::Result<Vec<u8>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(b"data".to_vec())
        }
    }

    struct FailingReader;

    impl EntryReader for FailingReader {
        fn read(&self) -> std::io::Result<Vec<u8>> {
            Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "corrupt table"))
        }
    }

    struct RejectingDecoder;

    impl SpriteDecoder for RejectingDecoder {
        fn decode(&self, _data: &[u8], _palette: &Palette) -> Result<Atlas> {
            Err(MediaError::conversion("slp", "malformed sprite"))
        }
    }

    fn sample_source() -> MemorySource {
        MemorySource::new()
            .with_file("graphics", 2, "slp", b"g2".to_vec())
            .with_file("interfac", 50500, "bin", b"pal".to_vec())
            .with_file("sounds", 5000, "wav", b"RIFF".to_vec())
            .with_file("terrain", 15000, "slp", b"t".to_vec())
    }

    fn rules(rules: &[&str]) -> RuleSet {
        RuleSet::parse_all(rules).unwrap()
    }

    #[test]
    fn test_exact_rule_converts_one_entry() {
        let temp_dir = TempDir::new().unwrap();
        let sink = OutputSink::new(temp_dir.path());
        let router = ConversionRouter::new();
        let pipeline = ExtractionPipeline::new(rules(&["interfac:50500.bin"]), &router, &sink);

        let result = pipeline.run(sample_source().entries().unwrap(), None);

        assert_eq!(result.progress.entries_seen, 4);
        assert_eq!(result.progress.entries_selected, 1);
        assert_eq!(result.progress.files_processed, 1);
        assert!(temp_dir.path().join("interfac/50500.bin").exists());
        assert!(!temp_dir.path().join("sounds").exists());
    }

    #[test]
    fn test_disabled_output_reads_and_writes_nothing() {
        let reads = Arc::new(AtomicUsize::new(0));
        let entries = vec![ArchiveEntry::new(
            "sounds",
            1,
            "wav",
            Arc::new(CountingReader(reads.clone())),
        )];
        let sink = OutputSink::disabled();
        let router = ConversionRouter::new();

        let result = ExtractionPipeline::new(RuleSet::select_all(), &router, &sink).run(entries, None);

        assert_eq!(result.progress.entries_selected, 1);
        assert_eq!(result.progress.files_processed, 0);
        assert_eq!(reads.load(Ordering::SeqCst), 0);
        assert!(result.listing.is_none());
    }

    #[test]
    fn test_listing_mode_does_not_read_or_write() {
        let temp_dir = TempDir::new().unwrap();
        let reads = Arc::new(AtomicUsize::new(0));
        let mut entries = sample_source().entries().unwrap();
        entries.push(ArchiveEntry::new(
            "sounds",
            2,
            "wav",
            Arc::new(CountingReader(reads.clone())),
        ));
        let sink = OutputSink::new(temp_dir.path().join("out"));
        let router = ConversionRouter::new();

        let result = ExtractionPipeline::new(rules(&["*:*.*"]), &router, &sink)
            .with_listing(true)
            .run(entries, None);

        let listing = result.listing.as_ref().unwrap();
        assert_eq!(listing.len(), 4);
        assert_eq!(listing.get(2).unwrap().len(), 2);
        assert_eq!(result.progress.files_processed, 0);
        assert_eq!(reads.load(Ordering::SeqCst), 0);
        assert!(!temp_dir.path().join("out").exists());
    }

    #[test]
    fn test_overlapping_rules_process_entry_once() {
        let temp_dir = TempDir::new().unwrap();
        let sink = OutputSink::new(temp_dir.path());
        let router = ConversionRouter::new();
        let mut entries = sample_source().entries().unwrap();
        entries.push(ArchiveEntry::from_bytes("sounds", 5000, "wav", b"again".to_vec()));

        let result = ExtractionPipeline::new(rules(&["sounds:*.wav", "*:5000.*"]), &router, &sink)
            .run(entries, None);

        assert_eq!(result.progress.entries_selected, 1);
        assert_eq!(result.progress.duplicates_skipped, 1);
        assert_eq!(result.progress.files_processed, 1);
        assert_eq!(std::fs::read(temp_dir.path().join("sounds/5000.wav")).unwrap(), b"RIFF");
    }

    #[test]
    fn test_read_failure_is_isolated() {
        let temp_dir = TempDir::new().unwrap();
        let sink = OutputSink::new(temp_dir.path());
        let router = ConversionRouter::new();
        let mut entries = vec![ArchiveEntry::new("graphics", 1, "slp", Arc::new(FailingReader))];
        entries.extend(sample_source().entries().unwrap());

        let result = ExtractionPipeline::new(RuleSet::select_all(), &router, &sink).run(entries, None);

        assert_eq!(result.progress.files_processed, 4);
        assert_eq!(result.progress.errors.len(), 1);
        assert!(result.progress.errors[0].contains("graphics:1.slp"));
    }

    #[test]
    fn test_rejected_sprite_still_counts_as_processed() {
        let temp_dir = TempDir::new().unwrap();
        let sink = OutputSink::new(temp_dir.path());
        let mut router = ConversionRouter::new();
        router.register(
            "slp",
            Arc::new(ImageConverter::new(
                Arc::new(RejectingDecoder),
                Arc::new(Palette::new(vec![[0, 0, 0]; 256])),
                "terrain",
                &[MetadataFormat::Csv],
            )),
        );
        let entries = vec![ArchiveEntry::from_bytes("graphics", 1, "slp", b"bad".to_vec())];

        let result = ExtractionPipeline::new(rules(&["graphics:*.slp"]), &router, &sink).run(entries, None);

        assert_eq!(result.progress.files_processed, 1);
        assert_eq!(result.progress.read_failures, 0);
        assert_eq!(result.progress.errors.len(), 1);
        assert!(result.progress.errors[0].contains("malformed sprite"));
        assert_eq!(result.progress.files_attempted(), 1);
    }

    #[test]
    fn test_read_failure_is_not_counted_as_processed() {
        let temp_dir = TempDir::new().unwrap();
        let sink = OutputSink::new(temp_dir.path());
        let router = ConversionRouter::new();
        let entries = vec![ArchiveEntry::new("graphics", 1, "slp", Arc::new(FailingReader))];

        let result = ExtractionPipeline::new(RuleSet::select_all(), &router, &sink).run(entries, None);

        assert_eq!(result.progress.files_processed, 0);
        assert_eq!(result.progress.read_failures, 1);
        assert_eq!(result.progress.errors.len(), 1);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_conversion_shares_counters() {
        let temp_dir = TempDir::new().unwrap();
        let sink = OutputSink::new(temp_dir.path());
        let router = ConversionRouter::new();
        let mut entries: Vec<ArchiveEntry> = (0..64)
            .map(|id| ArchiveEntry::from_bytes("sounds", id, "bin", vec![id as u8; 16]))
            .collect();
        entries.push(ArchiveEntry::new("graphics", 1, "slp", Arc::new(FailingReader)));

        let result = ExtractionPipeline::new(RuleSet::select_all(), &router, &sink)
            .with_jobs(4)
            .run(entries, None);

        assert_eq!(result.progress.total_files, 65);
        assert_eq!(result.progress.files_processed, 64);
        assert_eq!(result.progress.errors.len(), 1);
        assert!(result.progress.errors[0].contains("graphics:1.slp"));
        assert_eq!(result.progress.bytes_processed, 64 * 16);
        for id in 0..64u32 {
            let written = std::fs::read(temp_dir.path().join(format!("sounds/{}.bin", id))).unwrap();
            assert_eq!(written, vec![id as u8; 16]);
        }
        assert!(!temp_dir.path().join("graphics").exists());
    }

    #[test]
    fn test_stop_flag_halts_between_entries() {
        let temp_dir = TempDir::new().unwrap();
        let sink = OutputSink::new(temp_dir.path());
        let router = ConversionRouter::new();
        let shutdown = GracefulShutdown::detached();
        shutdown.request_shutdown();

        let result = ExtractionPipeline::new(RuleSet::select_all(), &router, &sink)
            .with_shutdown(&shutdown)
            .run(sample_source().entries().unwrap(), None);

        assert!(result.progress.cancelled);
        assert_eq!(result.progress.files_processed, 0);
        assert_eq!(result.progress.total_files, 4);
    }

    #[test]
    fn test_progress_callback_sees_every_step() {
        let temp_dir = TempDir::new().unwrap();
        let sink = OutputSink::new(temp_dir.path());
        let router = ConversionRouter::new();
        let calls = AtomicUsize::new(0);
        let callback = |_: &ExtractionProgress| {
            calls.fetch_add(1, Ordering::SeqCst);
        };

        ExtractionPipeline::new(RuleSet::select_all(), &router, &sink)
            .with_jobs(1)
            .run(sample_source().entries().unwrap(), Some(&callback));

        assert!(calls.load(Ordering::SeqCst) >= 4);
    }
}

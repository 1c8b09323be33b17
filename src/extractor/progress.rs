use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ExtractionProgress {
    /// Entries offered by the archive source.
    pub entries_seen: usize,
    /// Entries matched by at least one rule, after deduplication.
    pub entries_selected: usize,
    pub duplicates_skipped: usize,
    /// Entries whose bytes reached a converter, whether or not it succeeded.
    pub files_processed: usize,
    /// Entries whose bytes could not be read.
    pub read_failures: usize,
    /// Entries queued for conversion.
    pub total_files: usize,
    pub bytes_processed: u64,
    pub current_file: Option<String>,
    pub processed_by_extension: BTreeMap<String, usize>,
    pub start_time: Instant,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub cancelled: bool,
}

impl ExtractionProgress {
    pub fn new() -> Self {
        Self {
            entries_seen: 0,
            entries_selected: 0,
            duplicates_skipped: 0,
            files_processed: 0,
            read_failures: 0,
            total_files: 0,
            bytes_processed: 0,
            current_file: None,
            processed_by_extension: BTreeMap::new(),
            start_time: Instant::now(),
            errors: Vec::new(),
            warnings: Vec::new(),
            cancelled: false,
        }
    }

    pub fn update_file(&mut self, filename: String, extension: &str, bytes: u64) {
        self.files_processed += 1;
        self.bytes_processed += bytes;
        self.current_file = Some(filename);
        *self
            .processed_by_extension
            .entry(extension.to_string())
            .or_insert(0) += 1;
    }

    pub fn add_error<S: Into<String>>(&mut self, error: S) {
        self.errors.push(error.into());
    }

    /// An entry that never reached its converter.
    pub fn add_read_failure<S: Into<String>>(&mut self, error: S) {
        self.read_failures += 1;
        self.add_error(error);
    }

    pub fn add_warning<S: Into<String>>(&mut self, warning: S) {
        self.warnings.push(warning.into());
    }

    /// Entries that left the queue, successfully or not.
    pub fn files_attempted(&self) -> usize {
        self.files_processed + self.read_failures
    }

    pub fn percentage(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.files_attempted() as f64 / self.total_files as f64) * 100.0
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn estimated_remaining(&self) -> Duration {
        let attempted = self.files_attempted();
        if attempted == 0 {
            return Duration::from_secs(0);
        }

        let elapsed = self.elapsed();
        let rate = attempted as f64 / elapsed.as_secs_f64();
        let remaining_files = self.total_files.saturating_sub(attempted);

        if rate > 0.0 {
            Duration::from_secs_f64(remaining_files as f64 / rate)
        } else {
            Duration::from_secs(0)
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.errors.is_empty() || !self.warnings.is_empty()
    }
}

impl Default for ExtractionProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracking() {
        let mut progress = ExtractionProgress::new();
        progress.total_files = 10;

        assert_eq!(progress.percentage(), 0.0);

        progress.update_file("sounds:5000.wav".to_string(), "wav", 100);
        assert_eq!(progress.percentage(), 10.0);
        assert_eq!(progress.bytes_processed, 100);
        assert_eq!(progress.files_processed, 1);
        assert_eq!(progress.processed_by_extension.get("wav"), Some(&1));

        progress.add_read_failure("graphics:1.slp: unreadable");
        assert_eq!(progress.percentage(), 20.0);
        assert_eq!(progress.files_processed, 1);
        assert!(progress.has_failures());
    }

    #[test]
    fn test_rejected_entry_counts_once() {
        let mut progress = ExtractionProgress::new();
        progress.total_files = 4;

        progress.update_file("graphics:1.slp".to_string(), "slp", 10);
        progress.add_error("graphics:1.slp: malformed sprite");

        assert_eq!(progress.files_attempted(), 1);
        assert_eq!(progress.percentage(), 25.0);
    }

    #[test]
    fn test_empty_run_has_no_estimate() {
        let progress = ExtractionProgress::new();
        assert_eq!(progress.estimated_remaining(), Duration::from_secs(0));
        assert!(!progress.has_failures());
    }
}

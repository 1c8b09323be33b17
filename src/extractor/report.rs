use crate::config::Config;
use crate::error::Result;
use crate::extractor::ExtractionProgress;
use crate::metadata::{AggregationReport, MetadataFormat};
use crate::sink::OutputSink;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory under the output root holding run bookkeeping.
pub const REPORT_DIR: &str = ".mediaconvert";
pub const REPORT_FILE: &str = "extraction_report.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Selected entries are listed, nothing is read or written.
    Listing,
    /// Selected entries are converted into the output directory.
    Convert,
    /// No output directory: entries are only matched against the rules.
    Inspect,
}

impl RunMode {
    pub fn for_config(config: &Config) -> Self {
        if config.extraction.list_files {
            RunMode::Listing
        } else if config.write_enabled() {
            RunMode::Convert
        } else {
            RunMode::Inspect
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub source: String,
    pub mode: RunMode,
    pub extraction_summary: ExtractionSummary,
    pub extraction_time: DateTime<Utc>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AggregationReport>,
    pub config_used: ConfigSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionSummary {
    pub entries_seen: usize,
    pub entries_selected: usize,
    pub duplicates_skipped: usize,
    pub total_files_processed: usize,
    pub total_bytes_processed: u64,
    pub extraction_duration: Duration,
    pub files_by_extension: BTreeMap<String, usize>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSnapshot {
    pub extract: Vec<String>,
    pub terrain_archive: String,
    pub metadata_formats: Vec<MetadataFormat>,
    pub extrafiles: bool,
    pub no_opus: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoder: Option<String>,
}

impl From<&Config> for ConfigSnapshot {
    fn from(config: &Config) -> Self {
        Self {
            extract: config.extraction.extract.clone(),
            terrain_archive: config.extraction.terrain_archive.clone(),
            metadata_formats: config.output.metadata_formats.clone(),
            extrafiles: config.output.extrafiles,
            no_opus: config.audio.no_opus,
            encoder: (!config.audio.no_opus).then(|| config.audio.encoder.clone()),
        }
    }
}

impl From<&ExtractionProgress> for ExtractionSummary {
    fn from(progress: &ExtractionProgress) -> Self {
        Self {
            entries_seen: progress.entries_seen,
            entries_selected: progress.entries_selected,
            duplicates_skipped: progress.duplicates_skipped,
            total_files_processed: progress.files_processed,
            total_bytes_processed: progress.bytes_processed,
            extraction_duration: progress.elapsed(),
            files_by_extension: progress.processed_by_extension.clone(),
            cancelled: progress.cancelled,
        }
    }
}

impl ExtractionReport {
    pub fn new(
        source: String,
        config: &Config,
        progress: &ExtractionProgress,
        metadata: Option<AggregationReport>,
    ) -> Self {
        let mut errors = progress.errors.clone();
        if let Some(ref metadata) = metadata {
            errors.extend(
                metadata
                    .failures
                    .iter()
                    .map(|f| format!("metadata {}: {}", f.producer, f.message)),
            );
        }

        Self {
            source,
            mode: RunMode::for_config(config),
            extraction_summary: ExtractionSummary::from(progress),
            extraction_time: Utc::now(),
            errors,
            warnings: progress.warnings.clone(),
            metadata,
            config_used: ConfigSnapshot::from(config),
        }
    }

    pub fn relative_path() -> PathBuf {
        Path::new(REPORT_DIR).join(REPORT_FILE)
    }

    /// Writes the report as JSON into the output root.
    pub fn save(&self, sink: &OutputSink) -> Result<PathBuf> {
        let mut json_content = serde_json::to_string_pretty(self)?;
        json_content.push('\n');
        sink.write(&Self::relative_path(), json_content.as_bytes())
    }
}

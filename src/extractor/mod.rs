pub mod listing;
pub mod pipeline;
pub mod progress;
pub mod report;

pub use listing::{ListedFile, ListingIndex};
pub use pipeline::{EntryResult, ExtractionPipeline, PipelineResult, ProgressCallback};
pub use progress::ExtractionProgress;
pub use report::{ExtractionReport, ExtractionSummary, RunMode};

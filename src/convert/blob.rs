use crate::convert::{ConversionJob, ConversionOutcome, Converter};
use crate::error::Result;
use crate::sink::OutputSink;

/// Stores entry bytes verbatim under their own name.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlobConverter;

impl Converter for BlobConverter {
    fn name(&self) -> &'static str {
        "blob"
    }

    fn convert(&self, job: &ConversionJob<'_>, sink: &OutputSink) -> Result<ConversionOutcome> {
        sink.write(job.destination, job.data)?;
        Ok(ConversionOutcome::Blob {
            path: job.destination.to_path_buf(),
            bytes: job.data.len() as u64,
        })
    }
}

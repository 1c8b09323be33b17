use crate::convert::{ConversionJob, ConversionOutcome, Converter, ExternalEncoder};
use crate::error::{Result, UserFriendlyError};
use crate::sink::OutputSink;
use tracing::{debug, warn};

pub const STAGING_EXTENSION: &str = "wav";
pub const COMPRESSED_EXTENSION: &str = "opus";

/// Stores wave data and, when an encoder is configured, replaces it with an
/// opus file. A failed encode keeps the wave file as the result.
pub struct AudioConverter {
    encoder: Option<ExternalEncoder>,
}

impl AudioConverter {
    pub fn new(encoder: ExternalEncoder) -> Self {
        Self {
            encoder: Some(encoder),
        }
    }

    pub fn without_encoder() -> Self {
        Self { encoder: None }
    }
}

impl Converter for AudioConverter {
    fn name(&self) -> &'static str {
        "audio"
    }

    fn convert(&self, job: &ConversionJob<'_>, sink: &OutputSink) -> Result<ConversionOutcome> {
        let staging = job.destination.with_extension(STAGING_EXTENSION);
        sink.write(&staging, job.data)?;

        let encoder = match self.encoder {
            Some(ref encoder) => encoder,
            None => {
                return Ok(ConversionOutcome::Audio {
                    path: staging,
                    compressed: false,
                    encoder_failure: None,
                })
            }
        };

        let compressed = job.destination.with_extension(COMPRESSED_EXTENSION);
        debug!(
            "opus convert: {} -> {}",
            staging.display(),
            compressed.display()
        );

        match encoder.encode(&sink.resolve(&staging)?, &sink.resolve(&compressed)?) {
            Ok(_) => {
                sink.remove(&staging)?;
                Ok(ConversionOutcome::Audio {
                    path: compressed,
                    compressed: true,
                    encoder_failure: None,
                })
            }
            Err(e) => {
                warn!("{}: {}", job.entry.display_name(), e);
                // Drop whatever the encoder left behind so only the wave remains
                if let Err(cleanup) = sink.remove(&compressed) {
                    debug!("Could not remove partial {}: {}", compressed.display(), cleanup);
                }
                Ok(ConversionOutcome::Audio {
                    path: staging,
                    compressed: false,
                    encoder_failure: Some(e.user_message()),
                })
            }
        }
    }
}

pub mod audio;
pub mod blob;
pub mod encoder;
pub mod router;
pub mod sprite;

pub use self::audio::AudioConverter;
pub use self::blob::BlobConverter;
pub use self::encoder::{EncoderOutput, ExternalEncoder};
pub use self::router::ConversionRouter;
pub use self::sprite::{
    apply_terrain_hotspot, Atlas, ImageConverter, SpriteDecoder, SubImage, TERRAIN_HOTSPOT,
};

use crate::archive::ArchiveEntry;
use crate::error::Result;
use crate::sink::OutputSink;
use std::path::{Path, PathBuf};

/// One selected entry on its way to the output sink.
pub struct ConversionJob<'a> {
    pub entry: &'a ArchiveEntry,
    pub data: &'a [u8],
    /// `<archive>/<fileid>.<ext>`, relative to the output root.
    pub destination: &'a Path,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConversionOutcome {
    Atlas {
        image: PathBuf,
        metadata: Vec<PathBuf>,
        frames: usize,
    },
    Audio {
        path: PathBuf,
        compressed: bool,
        /// Why the compressed copy is missing, if the encoder was tried.
        encoder_failure: Option<String>,
    },
    Blob {
        path: PathBuf,
        bytes: u64,
    },
}

impl ConversionOutcome {
    /// Primary artifact written for the entry.
    pub fn path(&self) -> &Path {
        match self {
            ConversionOutcome::Atlas { image, .. } => image,
            ConversionOutcome::Audio { path, .. } => path,
            ConversionOutcome::Blob { path, .. } => path,
        }
    }

    pub fn warning(&self) -> Option<&str> {
        match self {
            ConversionOutcome::Audio {
                encoder_failure: Some(message),
                ..
            } => Some(message),
            _ => None,
        }
    }
}

/// Turns the bytes of one entry into files under the sink.
pub trait Converter: Send + Sync {
    fn name(&self) -> &'static str;
    fn convert(&self, job: &ConversionJob<'_>, sink: &OutputSink) -> Result<ConversionOutcome>;
}

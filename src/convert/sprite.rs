use crate::convert::{ConversionJob, ConversionOutcome, Converter};
use crate::error::{MediaError, Result};
use crate::metadata::{DataFormatter, DumpBatch, DumpTable, MetadataFormat, Palette};
use crate::sink::OutputSink;
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::Serialize;
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

/// Hotspot every terrain tile is centered on.
pub const TERRAIN_HOTSPOT: (i32, i32) = (48, 24);

/// Placement of one frame inside an atlas, plus its hotspot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubImage {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub cx: i32,
    pub cy: i32,
}

/// A decoded sprite: RGBA pixels with frames packed side by side.
#[derive(Debug, Clone, PartialEq)]
pub struct Atlas {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub frames: Vec<SubImage>,
}

/// Decodes the game's sprite format against a palette.
pub trait SpriteDecoder: Send + Sync {
    fn decode(&self, data: &[u8], palette: &Palette) -> Result<Atlas>;
}

pub fn apply_terrain_hotspot(frames: &mut [SubImage]) {
    for frame in frames {
        frame.cx = TERRAIN_HOTSPOT.0;
        frame.cy = TERRAIN_HOTSPOT.1;
    }
}

/// Sprite to `<fileid>.png` plus one `<fileid>.<fmt>` frame table per format.
pub struct ImageConverter {
    decoder: Arc<dyn SpriteDecoder>,
    palette: Arc<Palette>,
    terrain_archive: String,
    formatter: DataFormatter,
}

impl ImageConverter {
    pub fn new<S: Into<String>>(
        decoder: Arc<dyn SpriteDecoder>,
        palette: Arc<Palette>,
        terrain_archive: S,
        formats: &[MetadataFormat],
    ) -> Self {
        Self {
            decoder,
            palette,
            terrain_archive: terrain_archive.into(),
            formatter: DataFormatter::new(formats),
        }
    }

    fn encode_png(atlas: Atlas, entry: &str) -> Result<Vec<u8>> {
        let (width, height) = (atlas.width, atlas.height);
        let image = RgbaImage::from_raw(width, height, atlas.pixels).ok_or_else(|| {
            MediaError::conversion(
                entry,
                format!("pixel buffer does not match {}x{} RGBA atlas", width, height),
            )
        })?;

        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| MediaError::conversion(entry, e.to_string()))?;
        Ok(buffer.into_inner())
    }

    fn frame_table(name: String, frames: &[SubImage]) -> DumpTable {
        let mut table = DumpTable::new(name, &["idx", "x", "y", "w", "h", "cx", "cy"]);
        table.rows = frames
            .iter()
            .enumerate()
            .map(|(idx, f)| {
                vec![
                    json!(idx),
                    json!(f.x),
                    json!(f.y),
                    json!(f.width),
                    json!(f.height),
                    json!(f.cx),
                    json!(f.cy),
                ]
            })
            .collect();
        table
    }
}

impl Converter for ImageConverter {
    fn name(&self) -> &'static str {
        "image"
    }

    fn convert(&self, job: &ConversionJob<'_>, sink: &OutputSink) -> Result<ConversionOutcome> {
        let entry = job.entry.display_name();

        let mut atlas = self
            .decoder
            .decode(job.data, &self.palette)
            .map_err(|e| match e {
                MediaError::Conversion { .. } => e,
                other => MediaError::conversion(entry.clone(), other.to_string()),
            })?;

        if job.entry.archive_name == self.terrain_archive {
            apply_terrain_hotspot(&mut atlas.frames);
        }

        debug!(
            "{} -> {}x{} atlas with {} frames",
            entry,
            atlas.width,
            atlas.height,
            atlas.frames.len()
        );

        let frames = std::mem::take(&mut atlas.frames);
        let image_path = job.destination.with_extension("png");
        sink.write(&image_path, &Self::encode_png(atlas, &entry)?)?;

        // Sidecars sit next to the image, named after the file id
        let mut batch = DumpBatch::new(vec![Self::frame_table(
            job.entry.file_id.to_string(),
            &frames,
        )]);
        if let Some(parent) = job.destination.parent() {
            batch = batch.with_prefix(parent.to_string_lossy());
        }

        let mut metadata = Vec::new();
        for file in self.formatter.export(&batch)? {
            sink.write(&file.relative_path, file.content.as_bytes())?;
            metadata.push(file.relative_path);
        }

        Ok(ConversionOutcome::Atlas {
            image: image_path,
            metadata,
            frames: frames.len(),
        })
    }
}

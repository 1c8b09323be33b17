use crate::error::{MediaError, Result};
use crate::metadata::DumpTable;
use image::{ImageFormat, Rgba, RgbaImage};
use serde_json::json;
use std::io::Cursor;

pub type Rgb = [u8; 3];

/// Players with their own color ramp in the game palette.
pub const PLAYER_COUNT: usize = 8;
/// Shades per player color ramp.
pub const PLAYER_SHADES: usize = 8;
const PLAYER_BASE_INDEX: usize = 16;

/// An indexed color table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgb>,
}

/// Turns the raw bytes of a palette entry into a [`Palette`].
pub trait PaletteBuilder: Send + Sync {
    fn build(&self, data: &[u8]) -> Result<Palette>;
}

/// Builds palettes stored in the JASC-PAL text format.
#[derive(Debug, Default, Clone, Copy)]
pub struct JascPaletteBuilder;

impl PaletteBuilder for JascPaletteBuilder {
    fn build(&self, data: &[u8]) -> Result<Palette> {
        Palette::from_jasc(data)
    }
}

impl Palette {
    pub fn new(colors: Vec<Rgb>) -> Self {
        Self { colors }
    }

    pub fn from_jasc(data: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(data);
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

        let invalid = |message: String| MediaError::conversion("palette", message);

        match lines.next() {
            Some("JASC-PAL") => {}
            other => {
                return Err(invalid(format!(
                    "expected JASC-PAL header, found {:?}",
                    other.unwrap_or("")
                )))
            }
        }

        let version = lines.next().unwrap_or("");
        if version != "0100" {
            return Err(invalid(format!("unsupported palette version '{}'", version)));
        }

        let count: usize = lines
            .next()
            .and_then(|l| l.parse().ok())
            .ok_or_else(|| invalid("missing color count".to_string()))?;

        let mut colors = Vec::with_capacity(count);
        for index in 0..count {
            let line = lines
                .next()
                .ok_or_else(|| invalid(format!("expected {} colors, found {}", count, index)))?;

            let channels: Vec<u8> = line
                .split_whitespace()
                .map(|c| c.parse::<u8>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| invalid(format!("color {}: {}", index, e)))?;

            match channels.as_slice() {
                [r, g, b] => colors.push([*r, *g, *b]),
                _ => {
                    return Err(invalid(format!(
                        "color {} has {} channels, expected 3",
                        index,
                        channels.len()
                    )))
                }
            }
        }

        Ok(Self { colors })
    }

    /// The 256-color terminal table: 16 system colors, a 6x6x6 cube and a
    /// 24-step gray ramp.
    pub fn terminal() -> Self {
        const SYSTEM: [Rgb; 16] = [
            [0x00, 0x00, 0x00],
            [0xcd, 0x00, 0x00],
            [0x00, 0xcd, 0x00],
            [0xcd, 0xcd, 0x00],
            [0x00, 0x00, 0xee],
            [0xcd, 0x00, 0xcd],
            [0x00, 0xcd, 0xcd],
            [0xe5, 0xe5, 0xe5],
            [0x7f, 0x7f, 0x7f],
            [0xff, 0x00, 0x00],
            [0x00, 0xff, 0x00],
            [0xff, 0xff, 0x00],
            [0x5c, 0x5c, 0xff],
            [0xff, 0x00, 0xff],
            [0x00, 0xff, 0xff],
            [0xff, 0xff, 0xff],
        ];
        const CUBE: [u8; 6] = [0, 95, 135, 175, 215, 255];

        let mut colors = SYSTEM.to_vec();
        for r in CUBE {
            for g in CUBE {
                for b in CUBE {
                    colors.push([r, g, b]);
                }
            }
        }
        for step in 0..24u8 {
            let level = 8 + step * 10;
            colors.push([level, level, level]);
        }

        Self { colors }
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    pub fn get(&self, index: usize) -> Option<Rgb> {
        self.colors.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Player color ramps, `PLAYER_SHADES` consecutive entries per player
    /// starting at palette index 16.
    pub fn player_colors(&self) -> Result<Palette> {
        let needed = PLAYER_BASE_INDEX + PLAYER_COUNT * PLAYER_SHADES;
        if self.colors.len() < needed {
            return Err(MediaError::conversion(
                "palette",
                format!(
                    "player colors need {} palette entries, palette has {}",
                    needed,
                    self.colors.len()
                ),
            ));
        }

        Ok(Palette::new(
            self.colors[PLAYER_BASE_INDEX..needed].to_vec(),
        ))
    }

    pub fn to_table<S: Into<String>>(&self, name: S) -> DumpTable {
        let mut table = DumpTable::new(name, &["idx", "r", "g", "b"]);
        table.rows = self
            .colors
            .iter()
            .enumerate()
            .map(|(idx, [r, g, b])| vec![json!(idx), json!(r), json!(g), json!(b)])
            .collect();
        table
    }

    /// Draws every color as a `cell`-sized square, `columns` per row.
    pub fn render_swatches(&self, columns: u32, cell: u32) -> RgbaImage {
        let columns = columns.max(1);
        let cell = cell.max(1);
        let rows = (self.colors.len() as u32).div_ceil(columns).max(1);

        let mut image = RgbaImage::new(columns * cell, rows * cell);
        for (index, [r, g, b]) in self.colors.iter().enumerate() {
            let index = index as u32;
            let left = (index % columns) * cell;
            let top = (index / columns) * cell;
            for y in top..top + cell {
                for x in left..left + cell {
                    image.put_pixel(x, y, Rgba([*r, *g, *b, 255]));
                }
            }
        }

        image
    }

    pub fn swatches_png(&self, columns: u32, cell: u32) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.render_swatches(columns, cell)
            .write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }
}

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use fontdue::{Font, FontSettings};

use crate::render::Cell;

/// Share of the cell height used as the font pixel size.
const FONT_SIZE_FACTOR: f32 = 0.85;

#[derive(Debug, Clone)]
pub struct GlyphBitmap {
    pub width: usize,
    pub height: usize,
    /// Offset from the cell's left edge.
    pub left: i32,
    /// Offset from the cell's top edge.
    pub top: i32,
    pub bitmap: Vec<u8>,
}

/// Rasterizes cell glyphs from a TrueType/OpenType font, caching each glyph once.
pub struct FontPainter {
    font: Font,
    font_size: f32,
    cell_width: u32,
    cell_height: u32,
    glyph_cache: HashMap<char, GlyphBitmap>,
}

impl FontPainter {
    pub fn from_path(font_path: &Path, cell_width: u32, cell_height: u32) -> Result<Self> {
        let font_bytes = std::fs::read(font_path)
            .with_context(|| format!("failed to read font file {}", font_path.display()))?;
        Self::from_bytes(font_bytes, cell_width, cell_height)
            .with_context(|| format!("failed to load font {}", font_path.display()))
    }

    pub fn from_bytes(font_bytes: Vec<u8>, cell_width: u32, cell_height: u32) -> Result<Self> {
        let font = Font::from_bytes(font_bytes, FontSettings::default())
            .map_err(|error| anyhow!("failed to parse font: {error}"))?;
        Ok(Self {
            font,
            font_size: cell_height as f32 * FONT_SIZE_FACTOR,
            cell_width,
            cell_height,
            glyph_cache: HashMap::new(),
        })
    }

    pub fn font_size(&self) -> f32 {
        self.font_size
    }

    fn glyph(&mut self, glyph: char) -> &GlyphBitmap {
        let font = &self.font;
        let font_size = self.font_size;
        let cell_width = self.cell_width as f32;
        let cell_height = self.cell_height as f32;
        self.glyph_cache.entry(glyph).or_insert_with(|| {
            let (metrics, bitmap) = font.rasterize(glyph, font_size);
            let ascent = font
                .horizontal_line_metrics(font_size)
                .map_or(font_size * 0.8, |line| line.ascent);
            let baseline = ((cell_height - font_size) * 0.5 + ascent).round();
            let left = ((cell_width - metrics.advance_width) * 0.5).round() as i32 + metrics.xmin;
            let top = baseline as i32 - (metrics.height as i32 + metrics.ymin);
            GlyphBitmap {
                width: metrics.width,
                height: metrics.height,
                left,
                top,
                bitmap,
            }
        })
    }
}

/// Draws one cell's glyph into an RGBA buffer.
pub enum GlyphPainter {
    Font(FontPainter),
    /// No font available: a centered block whose coverage follows the cell value.
    Density { cell_width: u32, cell_height: u32 },
}

impl GlyphPainter {
    pub fn density(cell_width: u32, cell_height: u32) -> Self {
        Self::Density {
            cell_width,
            cell_height,
        }
    }

    pub fn load(font: Option<&Path>, cell_width: u32, cell_height: u32) -> Result<Self> {
        match font {
            Some(path) => Ok(Self::Font(FontPainter::from_path(
                path,
                cell_width,
                cell_height,
            )?)),
            None => Ok(Self::density(cell_width, cell_height)),
        }
    }

    pub fn cell_size(&self) -> (u32, u32) {
        match self {
            Self::Font(painter) => (painter.cell_width, painter.cell_height),
            Self::Density {
                cell_width,
                cell_height,
            } => (*cell_width, *cell_height),
        }
    }

    pub fn paint_cell(
        &mut self,
        frame: &mut [u8],
        frame_width: u32,
        frame_height: u32,
        col: u32,
        row: u32,
        cell: &Cell,
    ) {
        if cell.glyph.is_whitespace() {
            return;
        }
        let (cell_width, cell_height) = self.cell_size();
        // Origins past i32::MAX cannot land on an allocatable frame.
        let (Ok(x), Ok(y)) = (
            i32::try_from(u64::from(col) * u64::from(cell_width)),
            i32::try_from(u64::from(row) * u64::from(cell_height)),
        ) else {
            return;
        };
        let color = [cell.color.r, cell.color.g, cell.color.b, 255];

        match self {
            Self::Font(painter) => {
                let glyph = painter.glyph(cell.glyph);
                blend_glyph(
                    frame,
                    frame_width,
                    frame_height,
                    x + glyph.left,
                    y + glyph.top,
                    glyph,
                    color,
                );
            }
            Self::Density { .. } => {
                let coverage = cell.value.clamp(0.0, 1.0);
                let block_width = ((cell_width as f64) * coverage).round() as i32;
                let block_height = ((cell_height as f64) * coverage).round() as i32;
                let block = GlyphBitmap {
                    width: block_width.max(0) as usize,
                    height: block_height.max(0) as usize,
                    left: 0,
                    top: 0,
                    bitmap: vec![255; (block_width.max(0) * block_height.max(0)) as usize],
                };
                blend_glyph(
                    frame,
                    frame_width,
                    frame_height,
                    x + (cell_width as i32 - block_width) / 2,
                    y + (cell_height as i32 - block_height) / 2,
                    &block,
                    color,
                );
            }
        }
    }
}

/// Composites an 8-bit coverage mask onto an RGBA frame with its top-left
/// corner at `(x, y)`. Mask rows and columns that fall outside the frame are
/// skipped up front.
pub fn blend_glyph(
    frame: &mut [u8],
    frame_width: u32,
    frame_height: u32,
    x: i32,
    y: i32,
    glyph: &GlyphBitmap,
    color: [u8; 4],
) {
    let visible = |origin: i32, extent: usize, limit: u32| {
        let extent = extent as i64;
        let start = (-i64::from(origin)).clamp(0, extent);
        let end = (i64::from(limit) - i64::from(origin)).clamp(start, extent);
        start as usize..end as usize
    };
    let cols = visible(x, glyph.width, frame_width);
    let stride = frame_width as usize;

    for row in visible(y, glyph.height, frame_height) {
        let py = (i64::from(y) + row as i64) as usize;
        let mask_row = &glyph.bitmap[row * glyph.width..(row + 1) * glyph.width];
        for col in cols.clone() {
            let coverage = mask_row[col];
            if coverage == 0 {
                continue;
            }
            let px = (i64::from(x) + col as i64) as usize;
            let offset = (py * stride + px) * 4;
            let alpha = (u16::from(coverage) * u16::from(color[3]) / 255) as u8;
            blend_pixel(
                &mut frame[offset..offset + 4],
                [color[0], color[1], color[2], alpha],
            );
        }
    }
}

/// Source-over of `src` onto one opaque RGBA pixel.
pub fn blend_pixel(pixel: &mut [u8], [red, green, blue, alpha]: [u8; 4]) {
    if alpha == 0 {
        return;
    }
    let alpha = u16::from(alpha);
    let keep = 255 - alpha;
    for (dst, src) in pixel.iter_mut().zip([red, green, blue]) {
        *dst = ((u16::from(src) * alpha + u16::from(*dst) * keep + 127) / 255) as u8;
    }
    pixel[3] = 255;
}

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, ImageFormat, RgbaImage};
use log::{debug, info};
use serde::Serialize;
use tiny_skia::{
    Color, FillRule, GradientStop, Paint, PathBuilder, Pixmap, Point, RadialGradient, SpreadMode,
    Transform,
};

use crate::error_codes::{CodedError, E_EXPORT_FORMAT};
use crate::painter::GlyphPainter;
use crate::render::{Frame, RenderState};

pub const DEFAULT_CELL_WIDTH: u32 = 10;
pub const DEFAULT_CELL_HEIGHT: u32 = 16;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0001_0000_01b3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Png,
    Jpeg,
    Gif,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "txt" => Ok(Self::Text),
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "gif" => Ok(Self::Gif),
            _ => Err(CodedError::usage(
                E_EXPORT_FORMAT,
                format!(
                    "unsupported export format for {}; use .txt, .png, .jpg or .gif",
                    path.display()
                ),
            )
            .with_details(serde_json::json!({ "extension": extension }))
            .into()),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
        }
    }
}

pub fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Hash of the frame's glyph text; color and glow are not included.
pub fn frame_hash(frame: &Frame) -> u64 {
    fnv1a64(frame.to_text_frame().to_text().as_bytes())
}

pub fn sequence_hash(frame_hashes: &[u64]) -> u64 {
    let mut bytes = Vec::with_capacity(frame_hashes.len() * 8);
    for hash in frame_hashes {
        bytes.extend_from_slice(&hash.to_le_bytes());
    }
    fnv1a64(&bytes)
}

fn hex_hash(hash: u64) -> String {
    format!("0x{hash:016x}")
}

#[derive(Debug, Serialize)]
struct ExportSidecar {
    cols: u32,
    rows: u32,
    format: &'static str,
    frame_hashes: Vec<String>,
    sequence_hash: String,
    start_time: f64,
}

/// Plain glyph text: one line per row, `\n`-terminated.
pub fn frame_text(frame: &Frame) -> String {
    frame.to_text_frame().to_text()
}

/// Truecolor ANSI rendition for terminal playback. Glowing cells are bold.
pub fn frame_ansi(frame: &Frame) -> String {
    let grid = frame.grid();
    let mut out = String::with_capacity(grid.cell_count() * 20);
    for row in 0..grid.rows() {
        for col in 0..grid.cols() {
            let Some(cell) = frame.cell(col, row) else {
                continue;
            };
            let weight = if cell.glow.is_some() { "1;" } else { "" };
            out.push_str(&format!(
                "\x1b[{weight}38;2;{};{};{}m{}",
                cell.color.r, cell.color.g, cell.color.b, cell.glyph
            ));
        }
        out.push_str("\x1b[0m\n");
    }
    out
}

/// Paints a frame onto a black pixmap: glow halos first, glyphs on top.
pub fn rasterize_frame(frame: &Frame, painter: &mut GlyphPainter) -> Result<Pixmap> {
    let (cell_width, cell_height) = painter.cell_size();
    let grid = frame.grid();
    let (Some(width), Some(height)) = (
        grid.cols().checked_mul(cell_width),
        grid.rows().checked_mul(cell_height),
    ) else {
        bail!(CodedError::usage(
            E_EXPORT_FORMAT,
            format!(
                "{}x{} cells of {cell_width}x{cell_height} px exceed the maximum image size",
                grid.cols(),
                grid.rows()
            ),
        ));
    };
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| anyhow!("failed to allocate {width}x{height} pixmap"))?;
    pixmap.fill(Color::BLACK);

    for row in 0..grid.rows() {
        for col in 0..grid.cols() {
            let Some(cell) = frame.cell(col, row) else {
                continue;
            };
            let Some(glow) = cell.glow else {
                continue;
            };
            let opacity = glow.opacity();
            if opacity <= 0.0 {
                continue;
            }
            let cx = (col * cell_width) as f32 + cell_width as f32 * 0.5;
            let cy = (row * cell_height) as f32 + cell_height as f32 * 0.5;
            let radius = glow.radius(cell_height as f32);
            let [r, g, b] = cell.color.as_array();
            let Some(shader) = RadialGradient::new(
                Point::from_xy(cx, cy),
                Point::from_xy(cx, cy),
                radius,
                vec![
                    GradientStop::new(0.0, Color::from_rgba8(r, g, b, (opacity * 255.0) as u8)),
                    GradientStop::new(1.0, Color::from_rgba8(r, g, b, 0)),
                ],
                SpreadMode::Pad,
                Transform::identity(),
            ) else {
                continue;
            };
            let Some(path) = PathBuilder::from_circle(cx, cy, radius) else {
                continue;
            };
            let paint = Paint {
                shader,
                anti_alias: true,
                ..Paint::default()
            };
            pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        }
    }

    let data = pixmap.data_mut();
    for row in 0..grid.rows() {
        for col in 0..grid.cols() {
            if let Some(cell) = frame.cell(col, row) {
                painter.paint_cell(data, width, height, col, row, cell);
            }
        }
    }
    Ok(pixmap)
}

fn pixmap_to_image(pixmap: Pixmap) -> Result<RgbaImage> {
    let (width, height) = (pixmap.width(), pixmap.height());
    RgbaImage::from_raw(width, height, pixmap.take())
        .ok_or_else(|| anyhow!("pixmap buffer does not match {width}x{height}"))
}

pub struct ExportArgs<'a> {
    pub output: &'a Path,
    pub frames: u32,
    pub font: Option<&'a Path>,
    pub cell_width: u32,
    pub cell_height: u32,
    pub sidecar: bool,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub format: ExportFormat,
    pub frame_hashes: Vec<u64>,
    pub sequence_hash: u64,
    pub sidecar_path: Option<std::path::PathBuf>,
}

/// Writes the state's current frame (or, for GIF, `frames` consecutive
/// frames starting at the current one) to `args.output`.
pub fn run_export(state: &mut RenderState, args: &ExportArgs) -> Result<ExportSummary> {
    let format = ExportFormat::from_path(args.output)?;
    if args.frames > 1 && format != ExportFormat::Gif {
        return Err(CodedError::usage(
            E_EXPORT_FORMAT,
            format!("{} export holds a single frame; use .gif for sequences", format.label()),
        )
        .into());
    }

    let start_time = state.time();
    let mut frames = vec![state.render()];
    if format == ExportFormat::Gif {
        let frame_delta = state.scene().timing.frame_delta;
        state.resume();
        for _ in 1..args.frames {
            if let Some(frame) = state.tick(frame_delta) {
                frames.push(frame);
            }
        }
    }
    let frame_hashes = frames.iter().map(frame_hash).collect::<Vec<_>>();
    let sequence = sequence_hash(&frame_hashes);

    match format {
        ExportFormat::Text => {
            std::fs::write(args.output, frame_text(&frames[0]))
                .with_context(|| format!("failed to write {}", args.output.display()))?;
        }
        ExportFormat::Png | ExportFormat::Jpeg => {
            let mut painter = GlyphPainter::load(args.font, args.cell_width, args.cell_height)?;
            let image = pixmap_to_image(rasterize_frame(&frames[0], &mut painter)?)?;
            if format == ExportFormat::Png {
                image
                    .save_with_format(args.output, ImageFormat::Png)
                    .with_context(|| format!("failed to write {}", args.output.display()))?;
            } else {
                DynamicImage::ImageRgba8(image)
                    .to_rgb8()
                    .save_with_format(args.output, ImageFormat::Jpeg)
                    .with_context(|| format!("failed to write {}", args.output.display()))?;
            }
        }
        ExportFormat::Gif => {
            let mut painter = GlyphPainter::load(args.font, args.cell_width, args.cell_height)?;
            write_gif(&frames, &mut painter, state.scene().timing.fps, args.output)?;
        }
    }
    info!(
        "exported {} frame(s) as {} to {}",
        frames.len(),
        format.label(),
        args.output.display()
    );

    let sidecar_path = if args.sidecar {
        let grid = frames[0].grid();
        let sidecar = ExportSidecar {
            cols: grid.cols(),
            rows: grid.rows(),
            format: format.label(),
            frame_hashes: frame_hashes.iter().copied().map(hex_hash).collect(),
            sequence_hash: hex_hash(sequence),
            start_time,
        };
        let path = args.output.with_extension("json");
        let json = serde_json::to_string_pretty(&sidecar)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write sidecar {}", path.display()))?;
        debug!("wrote sidecar {}", path.display());
        Some(path)
    } else {
        None
    };

    Ok(ExportSummary {
        format,
        frame_hashes,
        sequence_hash: sequence,
        sidecar_path,
    })
}

fn write_gif(frames: &[Frame], painter: &mut GlyphPainter, fps: u32, output: &Path) -> Result<()> {
    let file = File::create(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let mut encoder = GifEncoder::new(BufWriter::new(file));
    encoder.set_repeat(Repeat::Infinite)?;
    let delay = Delay::from_numer_denom_ms(1000, fps.max(1));
    for frame in frames {
        let image = pixmap_to_image(rasterize_frame(frame, painter)?)?;
        encoder
            .encode_frame(image::Frame::from_parts(image, 0, 0, delay))
            .with_context(|| format!("failed to encode gif frame into {}", output.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{fnv1a64, frame_ansi, frame_text, rasterize_frame, sequence_hash, ExportFormat};
    use crate::error_codes::{find_coded_error, E_EXPORT_FORMAT};
    use crate::painter::GlyphPainter;
    use crate::render::RenderState;
    use crate::schema::{GridSpec, PatternConfig, PatternKind, Scene};

    fn state(glow: bool) -> RenderState {
        let grid = GridSpec::new(6, 3).expect("grid should build");
        let mut scene = Scene::new(grid, PatternConfig::new(PatternKind::Waves).with_glow(glow));
        scene.seed = Some(9);
        RenderState::new(scene)
    }

    #[test]
    fn extension_selects_format() {
        assert_eq!(
            ExportFormat::from_path(Path::new("a.TXT")).expect("txt"),
            ExportFormat::Text
        );
        assert_eq!(
            ExportFormat::from_path(Path::new("a.jpeg")).expect("jpeg"),
            ExportFormat::Jpeg
        );
        let error = ExportFormat::from_path(Path::new("a.bmp")).expect_err("bmp is unsupported");
        let coded = find_coded_error(&error).expect("coded error");
        assert_eq!(coded.code, E_EXPORT_FORMAT);
    }

    #[test]
    fn fnv_matches_reference_vectors() {
        assert_eq!(fnv1a64(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a64(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_ne!(sequence_hash(&[1, 2]), sequence_hash(&[2, 1]));
    }

    #[test]
    fn text_export_has_one_line_per_row() {
        let frame = state(false).render();
        let text = frame_text(&frame);
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|line| line.chars().count() == 6));
    }

    #[test]
    fn ansi_export_resets_each_row() {
        let frame = state(false).render();
        let ansi = frame_ansi(&frame);
        assert_eq!(ansi.matches("\x1b[0m\n").count(), 3);
        assert!(ansi.contains("38;2;0;255;136m"));
    }

    #[test]
    fn raster_size_follows_cells() {
        let frame = state(true).render();
        let mut painter = GlyphPainter::density(10, 16);
        let pixmap = rasterize_frame(&frame, &mut painter).expect("rasterize");
        assert_eq!((pixmap.width(), pixmap.height()), (60, 48));
        assert!(pixmap.data().chunks(4).all(|px| px[3] == 255));
        assert!(pixmap.data().chunks(4).any(|px| px[1] > 0));
    }

    #[test]
    fn oversized_raster_is_an_error_not_an_overflow() {
        let frame = state(false).render();
        let mut painter = GlyphPainter::density(u32::MAX / 2, 16);
        let error = rasterize_frame(&frame, &mut painter).expect_err("width overflows u32");
        let coded = find_coded_error(&error).expect("coded error");
        assert_eq!(coded.code, E_EXPORT_FORMAT);
        assert!(coded.message.contains("6x3 cells"), "{}", coded.message);
    }
}

//! Caption rasterization with fontdue.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use adstudio_common::error::{StudioError, StudioResult};
use adstudio_project_model::scene::OverlayConfig;
use fontdue::{Font, FontSettings, Metrics};
use image::RgbaImage;

use super::caption::{layout_caption, CaptionLayout, TextMeasure};

const FILL_COLOR: [u8; 4] = [255, 255, 255, 255];
const STROKE_COLOR: [u8; 4] = [16, 16, 16, 230];
const SHADOW_COLOR: [u8; 4] = [0, 0, 0, 204];

/// Bold sans fonts probed when no caption font is configured.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/noto/NotoSans-Bold.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

struct GlyphBitmap {
    metrics: Metrics,
    coverage: Vec<u8>,
}

/// Rasterizes caption lines into an RGBA canvas.
pub struct GlyphPainter {
    font: Font,
    glyph_cache: HashMap<(char, u32), GlyphBitmap>,
}

impl GlyphPainter {
    pub fn from_bytes(bytes: Vec<u8>) -> StudioResult<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| StudioError::render(format!("failed to parse caption font: {e}")))?;
        Ok(Self {
            font,
            glyph_cache: HashMap::new(),
        })
    }

    pub fn from_file(path: &Path) -> StudioResult<Self> {
        let bytes = std::fs::read(path).map_err(|_| StudioError::FileNotFound {
            path: path.to_path_buf(),
        })?;
        Self::from_bytes(bytes)
    }

    /// Draw every line of `layout`: shadow, then stroke, then fill.
    pub fn draw(&mut self, canvas: &mut RgbaImage, layout: &CaptionLayout) {
        let shadow = layout.shadow_offset().round() as i32;
        let stroke = (2.0 * layout.scale).round().max(1.0) as i32;
        let ring = stroke_offsets(stroke);

        for line in &layout.lines {
            let baseline = self.baseline(line.top, layout.line_height, layout.font_px);
            let x = line.x.round() as i32;

            self.draw_run(canvas, &line.text, layout.font_px, x, baseline + shadow, SHADOW_COLOR);
            for &(dx, dy) in &ring {
                self.draw_run(canvas, &line.text, layout.font_px, x + dx, baseline + dy, STROKE_COLOR);
            }
            self.draw_run(canvas, &line.text, layout.font_px, x, baseline, FILL_COLOR);
        }
    }

    /// Baseline that vertically centers the font's ascent/descent in the line box.
    fn baseline(&self, top: f32, line_height: f32, font_px: f32) -> i32 {
        let (ascent, descent) = self
            .font
            .horizontal_line_metrics(font_px)
            .map(|m| (m.ascent, m.descent))
            .unwrap_or((font_px * 0.8, -font_px * 0.2));
        let glyph_height = ascent - descent;
        (top + (line_height - glyph_height) / 2.0 + ascent).round() as i32
    }

    fn draw_run(
        &mut self,
        canvas: &mut RgbaImage,
        text: &str,
        font_px: f32,
        x: i32,
        baseline: i32,
        color: [u8; 4],
    ) {
        let mut pen_x = x as f32;
        let mut previous = None;

        for ch in text.chars() {
            if let Some(prev) = previous {
                pen_x += self.font.horizontal_kern(prev, ch, font_px).unwrap_or(0.0);
            }

            let font = &self.font;
            let glyph = self
                .glyph_cache
                .entry((ch, font_px.to_bits()))
                .or_insert_with(|| {
                    let (metrics, coverage) = font.rasterize(ch, font_px);
                    GlyphBitmap { metrics, coverage }
                });

            let gx = pen_x.round() as i32 + glyph.metrics.xmin;
            let gy = baseline - glyph.metrics.height as i32 - glyph.metrics.ymin;
            blend_glyph(canvas, gx, gy, glyph, color);

            pen_x += glyph.metrics.advance_width;
            previous = Some(ch);
        }
    }
}

impl TextMeasure for GlyphPainter {
    fn measure(&self, text: &str, font_px: f32) -> f32 {
        let mut width = 0.0;
        let mut previous = None;
        for ch in text.chars() {
            if let Some(prev) = previous {
                width += self.font.horizontal_kern(prev, ch, font_px).unwrap_or(0.0);
            }
            width += self.font.metrics(ch, font_px).advance_width;
            previous = Some(ch);
        }
        width
    }
}

/// Pixel offsets forming a filled disc of the given radius, minus the center.
fn stroke_offsets(radius: i32) -> Vec<(i32, i32)> {
    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if (dx, dy) != (0, 0) && dx * dx + dy * dy <= radius * radius {
                offsets.push((dx, dy));
            }
        }
    }
    offsets
}

fn blend_glyph(canvas: &mut RgbaImage, x: i32, y: i32, glyph: &GlyphBitmap, color: [u8; 4]) {
    let (canvas_w, canvas_h) = (canvas.width() as i32, canvas.height() as i32);
    let glyph_w = glyph.metrics.width;

    for row in 0..glyph.metrics.height {
        let py = y + row as i32;
        if py < 0 || py >= canvas_h {
            continue;
        }
        for col in 0..glyph_w {
            let px = x + col as i32;
            if px < 0 || px >= canvas_w {
                continue;
            }
            let mask = glyph.coverage[row * glyph_w + col];
            if mask == 0 {
                continue;
            }
            let alpha = ((u16::from(mask) * u16::from(color[3])) / 255) as u8;
            blend_pixel(canvas.get_pixel_mut(px as u32, py as u32), [color[0], color[1], color[2], alpha]);
        }
    }
}

fn blend_pixel(dst: &mut image::Rgba<u8>, src: [u8; 4]) {
    let alpha = u16::from(src[3]);
    if alpha == 0 {
        return;
    }
    let inv_alpha = 255 - alpha;
    for channel in 0..3 {
        let d = u16::from(dst.0[channel]);
        let s = u16::from(src[channel]);
        dst.0[channel] = ((s * alpha + d * inv_alpha + 127) / 255) as u8;
    }
    dst.0[3] = 255;
}

/// Caption drawing with graceful degradation when no font is available.
pub struct CaptionRenderer {
    painter: Option<GlyphPainter>,
    warned: bool,
}

impl CaptionRenderer {
    /// Load the configured font, or the first system font that exists.
    pub fn load(configured: Option<&Path>) -> Self {
        let candidates: Vec<PathBuf> = configured
            .map(Path::to_path_buf)
            .into_iter()
            .chain(SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from))
            .collect();

        for path in candidates.iter().filter(|p| p.exists()) {
            match GlyphPainter::from_file(path) {
                Ok(painter) => {
                    tracing::debug!(font = %path.display(), "Loaded caption font");
                    return Self::with_painter(painter);
                }
                Err(e) => {
                    tracing::warn!(font = %path.display(), error = %e, "Skipping unusable caption font");
                }
            }
        }

        Self::disabled()
    }

    pub fn with_painter(painter: GlyphPainter) -> Self {
        Self {
            painter: Some(painter),
            warned: false,
        }
    }

    /// A renderer that never draws captions.
    pub fn disabled() -> Self {
        Self {
            painter: None,
            warned: false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.painter.is_some()
    }

    /// Lay out and draw `text` on the canvas. Returns `false` when captions
    /// are unavailable.
    pub fn render(&mut self, canvas: &mut RgbaImage, text: &str, overlay: &OverlayConfig) -> bool {
        let Some(painter) = self.painter.as_mut() else {
            if !self.warned {
                tracing::warn!("No caption font available; captions will be skipped");
                self.warned = true;
            }
            return false;
        };

        let layout = layout_caption(text, overlay, canvas.width(), canvas.height(), &*painter);
        painter.draw(canvas, &layout);
        true
    }
}

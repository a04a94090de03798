//! Caption layout: size, wrapping and anchoring of overlay text.
//!
//! Layout is independent of the rasterizer; widths come from a
//! [`TextMeasure`] so the geometry can be computed (and tested) without a
//! font file.

use adstudio_project_model::scene::{OverlayConfig, OverlayPosition};

/// Short canvas edge that the base font sizes are specified against.
pub const REFERENCE_SHORT_EDGE: f32 = 720.0;

/// Distance from the canvas edges at scale 1.0.
pub const EDGE_PADDING_PX: f32 = 64.0;

/// Line advance relative to the font size.
pub const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// Maximum line width relative to the canvas width.
pub const MAX_LINE_WIDTH_FRACTION: f32 = 0.8;

/// Drop shadow offset (downwards) at scale 1.0.
pub const SHADOW_OFFSET_PX: f32 = 4.0;

/// Something that can report the advance width of a run of text.
pub trait TextMeasure {
    fn measure(&self, text: &str, font_px: f32) -> f32;
}

/// Canvas scale relative to a 720px short edge.
pub fn scale_factor(canvas_w: u32, canvas_h: u32) -> f32 {
    canvas_w.min(canvas_h) as f32 / REFERENCE_SHORT_EDGE
}

/// Font size in pixels for an overlay on the given canvas.
pub fn font_px(config: &OverlayConfig, canvas_w: u32, canvas_h: u32) -> f32 {
    config.size.base_px() * scale_factor(canvas_w, canvas_h)
}

/// Greedy word wrap.
///
/// A word that would push the line past `max_width` starts a new line; a
/// single word wider than `max_width` sits alone on its line. Explicit line
/// breaks in the text are kept.
pub fn wrap_words(
    text: &str,
    max_width: f32,
    font_px: f32,
    measure: &dyn TextMeasure,
) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
                continue;
            }

            let candidate = format!("{current} {word}");
            if measure.measure(&candidate, font_px) > max_width {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            } else {
                current = candidate;
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    lines
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalAnchor {
    Top,
    Middle,
    Bottom,
}

/// Horizontal alignment and vertical anchor for a position.
pub fn resolve_anchor(position: OverlayPosition) -> (TextAlign, VerticalAnchor) {
    match position {
        OverlayPosition::Center => (TextAlign::Center, VerticalAnchor::Middle),
        OverlayPosition::Top => (TextAlign::Center, VerticalAnchor::Top),
        OverlayPosition::Bottom => (TextAlign::Center, VerticalAnchor::Bottom),
        OverlayPosition::TopLeft => (TextAlign::Left, VerticalAnchor::Top),
        OverlayPosition::TopRight => (TextAlign::Right, VerticalAnchor::Top),
        OverlayPosition::BottomLeft => (TextAlign::Left, VerticalAnchor::Bottom),
        OverlayPosition::BottomRight => (TextAlign::Right, VerticalAnchor::Bottom),
    }
}

/// One wrapped line with its box on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedLine {
    pub text: String,
    /// Left edge of the line.
    pub x: f32,
    /// Top of the line box (the box is `line_height` tall).
    pub top: f32,
    pub width: f32,
}

/// Fully resolved caption geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLayout {
    pub font_px: f32,
    pub line_height: f32,
    pub scale: f32,
    pub align: TextAlign,
    pub lines: Vec<PositionedLine>,
}

impl CaptionLayout {
    /// Bounding box of the text block as `(left, top, right, bottom)`.
    pub fn bounds(&self) -> Option<(f32, f32, f32, f32)> {
        let first = self.lines.first()?;
        let last = self.lines.last()?;
        let left = self.lines.iter().map(|l| l.x).fold(f32::MAX, f32::min);
        let right = self
            .lines
            .iter()
            .map(|l| l.x + l.width)
            .fold(f32::MIN, f32::max);
        Some((left, first.top, right, last.top + self.line_height))
    }

    pub fn shadow_offset(&self) -> f32 {
        SHADOW_OFFSET_PX * self.scale
    }
}

/// Wrap and position `text` on a `canvas_w × canvas_h` canvas.
pub fn layout_caption(
    text: &str,
    config: &OverlayConfig,
    canvas_w: u32,
    canvas_h: u32,
    measure: &dyn TextMeasure,
) -> CaptionLayout {
    let scale = scale_factor(canvas_w, canvas_h);
    let font_px = font_px(config, canvas_w, canvas_h);
    let line_height = font_px * LINE_HEIGHT_FACTOR;
    let padding = EDGE_PADDING_PX * scale;
    let (w, h) = (canvas_w as f32, canvas_h as f32);
    let (align, vertical) = resolve_anchor(config.position);

    let wrapped = wrap_words(text, w * MAX_LINE_WIDTH_FRACTION, font_px, measure);
    let block_height = wrapped.len() as f32 * line_height;

    let block_top = match vertical {
        VerticalAnchor::Top => padding,
        VerticalAnchor::Middle => (h - block_height) / 2.0,
        VerticalAnchor::Bottom => h - padding - block_height,
    };

    let lines = wrapped
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let width = measure.measure(&text, font_px);
            let x = match align {
                TextAlign::Left => padding,
                TextAlign::Center => (w - width) / 2.0,
                TextAlign::Right => w - padding - width,
            };
            PositionedLine {
                text,
                x,
                top: block_top + i as f32 * line_height,
                width,
            }
        })
        .collect();

    CaptionLayout {
        font_px,
        line_height,
        scale,
        align,
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adstudio_project_model::scene::OverlaySize;

    /// Every character advances by half the font size.
    struct FixedAdvance;

    impl TextMeasure for FixedAdvance {
        fn measure(&self, text: &str, font_px: f32) -> f32 {
            text.chars().count() as f32 * font_px * 0.5
        }
    }

    fn overlay(position: OverlayPosition, size: OverlaySize) -> OverlayConfig {
        OverlayConfig { position, size }
    }

    #[test]
    fn test_font_px_scales_with_short_edge() {
        let small = overlay(OverlayPosition::Center, OverlaySize::Small);
        assert!((font_px(&small, 1280, 720) - 24.0).abs() < 1e-4);
        assert!((font_px(&small, 1080, 1920) - 36.0).abs() < 1e-4);

        let xl = overlay(OverlayPosition::Center, OverlaySize::Xl);
        assert!((font_px(&xl, 720, 1280) - 72.0).abs() < 1e-4);
    }

    #[test]
    fn test_wrap_breaks_before_overflowing_word() {
        // 10px per char, limit 100px => at most 10 chars per line.
        let lines = wrap_words("aaaa bbbb cccc dd", 100.0, 20.0, &FixedAdvance);
        assert_eq!(lines, vec!["aaaa bbbb", "cccc dd"]);
    }

    #[test]
    fn test_wrap_keeps_long_word_alone() {
        let lines = wrap_words("hi supercalifragilistic yo", 100.0, 20.0, &FixedAdvance);
        assert_eq!(lines, vec!["hi", "supercalifragilistic", "yo"]);
    }

    #[test]
    fn test_wrap_keeps_explicit_breaks_and_drops_blank_text() {
        let lines = wrap_words("one\ntwo", 1000.0, 20.0, &FixedAdvance);
        assert_eq!(lines, vec!["one", "two"]);
        assert!(wrap_words("   ", 1000.0, 20.0, &FixedAdvance).is_empty());
    }

    #[test]
    fn test_bottom_right_small_on_720p() {
        let text = "Fresh roasted coffee delivered to your door every single morning \
                    so you never run out again and always start the day right";
        let config = overlay(OverlayPosition::BottomRight, OverlaySize::Small);
        let layout = layout_caption(text, &config, 1280, 720, &FixedAdvance);

        assert!((layout.font_px - 24.0).abs() < 1e-4);
        assert!(layout.lines.len() >= 2);
        for line in &layout.lines {
            assert!(line.width <= 1280.0 * 0.8 + 1e-3);
            assert!((line.x + line.width - (1280.0 - 64.0)).abs() < 1e-3);
        }

        let (_, top, right, bottom) = layout.bounds().unwrap();
        assert!((right - 1216.0).abs() < 1e-3);
        assert!((bottom - (720.0 - 64.0)).abs() < 1e-3);
        assert!(top > 0.0);
    }

    #[test]
    fn test_anchor_positions() {
        let measure = FixedAdvance;
        let large = OverlaySize::Large;

        let top_left = layout_caption("Hi", &overlay(OverlayPosition::TopLeft, large), 1280, 720, &measure);
        assert_eq!(top_left.lines[0].x, 64.0);
        assert_eq!(top_left.lines[0].top, 64.0);

        let top = layout_caption("Hi", &overlay(OverlayPosition::Top, large), 1280, 720, &measure);
        let line = &top.lines[0];
        assert!((line.x + line.width / 2.0 - 640.0).abs() < 1e-3);
        assert_eq!(line.top, 64.0);

        let center = layout_caption("Hi", &overlay(OverlayPosition::Center, large), 1280, 720, &measure);
        let (_, top_edge, _, bottom_edge) = center.bounds().unwrap();
        assert!(((top_edge + bottom_edge) / 2.0 - 360.0).abs() < 1e-3);

        let bottom_left =
            layout_caption("Hi", &overlay(OverlayPosition::BottomLeft, large), 1280, 720, &measure);
        let (left, _, _, bottom_edge) = bottom_left.bounds().unwrap();
        assert_eq!(left, 64.0);
        assert!((bottom_edge - 656.0).abs() < 1e-3);
    }

    #[test]
    fn test_padding_scales_on_1080p() {
        let layout = layout_caption(
            "Hi",
            &overlay(OverlayPosition::TopLeft, OverlaySize::Medium),
            1920,
            1080,
            &FixedAdvance,
        );
        assert!((layout.lines[0].x - 96.0).abs() < 1e-3);
        assert!((layout.shadow_offset() - 6.0).abs() < 1e-3);
    }
}

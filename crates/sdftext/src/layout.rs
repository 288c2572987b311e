//! Metrics-driven text layout
//!
//! Layout never touches faces or atlas pages: it works entirely from the
//! char-to-glyph and glyph-metrics maps, so text measured against a cached
//! font lays out exactly like text measured against a live one.

use rustc_hash::FxHashMap;
use unicode_linebreak::{linebreaks, BreakOpportunity};

use crate::font::{GlyphMetrics, NOMINAL_SIZE};
use crate::geom::Vec2;

/// Horizontal alignment inside the wrap width.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Layout and placement options.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawOptions {
    /// Uniform draw scale applied on top of the font size.
    pub scale: f32,
    /// Extra space between lines, in nominal-size pixels.
    pub leading: f32,
    /// Horizontal alignment (applies when a wrap width is given).
    pub align: TextAlign,
    /// Stretch every non-final line to the wrap width.
    pub justify: bool,
    /// Clip placements against the left/right edges of the clip rect.
    pub clip_horizontal: bool,
    /// Clip placements against the top/bottom edges of the clip rect.
    pub clip_vertical: bool,
    /// Snap baselines and glyph corners to whole pixels.
    pub pixel_snap: bool,
    /// Emit premultiplied alpha from the shader.
    pub premultiply: bool,
    /// Gamma the shader applies to glyph coverage.
    pub gamma: f32,
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            leading: 0.0,
            align: TextAlign::Left,
            justify: false,
            clip_horizontal: true,
            clip_vertical: true,
            pixel_snap: true,
            premultiply: false,
            gamma: 2.2,
        }
    }
}

impl DrawOptions {
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_leading(mut self, leading: f32) -> Self {
        self.leading = leading;
        self
    }

    pub fn with_align(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }

    pub fn with_justify(mut self, justify: bool) -> Self {
        self.justify = justify;
        self
    }

    pub fn with_clip_horizontal(mut self, clip: bool) -> Self {
        self.clip_horizontal = clip;
        self
    }

    pub fn with_clip_vertical(mut self, clip: bool) -> Self {
        self.clip_vertical = clip;
        self
    }

    pub fn with_pixel_snap(mut self, snap: bool) -> Self {
        self.pixel_snap = snap;
        self
    }

    pub fn with_premultiply(mut self, premultiply: bool) -> Self {
        self.premultiply = premultiply;
        self
    }

    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }
}

/// Everything layout needs to know about a font, borrowed from its owner.
#[derive(Clone, Copy)]
pub struct LayoutMetrics<'a> {
    pub char_to_glyph: &'a FxHashMap<char, u32>,
    pub glyph_metrics: &'a FxHashMap<u32, GlyphMetrics>,
    /// Point size glyph metrics are expressed at.
    pub font_size: f32,
    /// Ascent in nominal-size pixels.
    pub ascent: f32,
    /// Descent in nominal-size pixels.
    pub descent: f32,
}

/// Lay `text` out into per-glyph baseline positions.
///
/// Positions are in font-size pixels, Y growing downwards one line step at a
/// time; the first baseline sits at `y = 0`. Characters with no glyph mapping
/// contribute nothing, so layout against a partial charset degrades to
/// dropping the unmapped characters.
pub fn measure_glyphs(
    metrics: &LayoutMetrics<'_>,
    text: &str,
    max_width: Option<f32>,
    options: &DrawOptions,
) -> Vec<(u32, Vec2)> {
    let mut result = Vec::new();
    if text.is_empty() {
        return result;
    }

    let font_size_scale = metrics.font_size / NOMINAL_SIZE;
    let line_height =
        font_size_scale * options.scale * (metrics.ascent + metrics.descent + options.leading);

    let lines = break_lines(text, max_width, metrics);
    let mut cur_y = 0.0f32;

    for (li, raw_line) in lines.iter().enumerate() {
        let line = raw_line.trim_end();
        // A line is "last" for justification when nothing visible follows it.
        let is_last = match lines.get(li + 1) {
            Some(next) => next.trim_end().is_empty(),
            None => true,
        };

        let index = result.len();
        let mut glyph_count = 0usize;
        let mut space_count = 0usize;
        let mut space_glyph: Option<u32> = None;
        let mut pen_x = 0.0f32;

        for ch in line.chars() {
            let Some(&glyph) = metrics.char_to_glyph.get(&ch) else {
                continue;
            };
            let Some(gm) = metrics.glyph_metrics.get(&glyph) else {
                continue;
            };

            glyph_count += 1;
            if ch == ' ' {
                space_count += 1;
                space_glyph = Some(glyph);
            }

            result.push((glyph, Vec2::new(pen_x, cur_y)));
            pen_x += gm.advance.x;
        }

        // Justification stretches the line to the wrap width; alignment is
        // the fallback. Zero leftover leaves every position untouched.
        let mut aligned = false;
        if options.justify && !is_last && space_count > 0 {
            if let Some(width) = max_width {
                let space = width - pen_x;
                let mut offset = 0.0f32;
                for entry in &mut result[index..] {
                    entry.1.x += offset;
                    // 75% of the extra spacing adjusts every glyph.
                    offset += 0.75 * space / glyph_count as f32;
                    if Some(entry.0) == space_glyph {
                        // The remaining 25% adjusts spaces only.
                        offset += 0.25 * space / space_count as f32;
                    }
                }
                aligned = true;
            }
        }

        if !aligned {
            if let Some(width) = max_width {
                let offset = match options.align {
                    TextAlign::Left => 0.0,
                    TextAlign::Center => 0.5 * (width - pen_x),
                    TextAlign::Right => width - pen_x,
                };
                if offset > 0.0 {
                    for entry in &mut result[index..] {
                        entry.1.x += offset;
                    }
                }
            }
        }

        cur_y += line_height;
    }

    result
}

/// Split `text` into lines at break opportunities.
///
/// Greedy fill: a line extends through the last opportunity that still fits
/// the width; mandatory breaks always commit. A segment with no opportunity
/// that fits falls back to per-character splitting, so only a single glyph
/// wider than the wrap width ever produces an over-wide line.
fn break_lines<'t>(
    text: &'t str,
    max_width: Option<f32>,
    metrics: &LayoutMetrics<'_>,
) -> Vec<&'t str> {
    let mut lines = Vec::new();
    let mut start = 0usize;

    let Some(width) = max_width else {
        for (i, op) in linebreaks(text) {
            if op == BreakOpportunity::Mandatory {
                lines.push(&text[start..i]);
                start = i;
            }
        }
        return lines;
    };

    let ops: Vec<(usize, BreakOpportunity)> = linebreaks(text).collect();
    let mut prev: Option<usize> = None;
    let mut k = 0usize;
    while k < ops.len() {
        let (i, op) = ops[k];
        if line_width(&text[start..i], metrics) <= width {
            prev = Some(i);
            if op == BreakOpportunity::Mandatory {
                lines.push(&text[start..i]);
                start = i;
                prev = None;
            }
            k += 1;
        } else if let Some(p) = prev.take() {
            // Commit through the last fitting opportunity and retry this one.
            lines.push(&text[start..p]);
            start = p;
        } else {
            let cut = emergency_split(&text[start..i], width, metrics);
            if text[start + cut..i].trim().is_empty() {
                // Only break-triggering whitespace remains; it stays on this
                // line instead of opening a blank one.
                lines.push(&text[start..i]);
                start = i;
                k += 1;
            } else {
                lines.push(&text[start..start + cut]);
                start += cut;
            }
        }
    }

    lines
}

/// Advance-sum of a candidate segment, trailing whitespace included.
fn line_width(segment: &str, metrics: &LayoutMetrics<'_>) -> f32 {
    let mut width = 0.0f32;
    for ch in segment.chars() {
        let Some(&glyph) = metrics.char_to_glyph.get(&ch) else {
            continue;
        };
        if let Some(gm) = metrics.glyph_metrics.get(&glyph) {
            width += gm.advance.x;
        }
    }
    width
}

/// Byte length of the longest prefix that fits, always at least one char.
fn emergency_split(segment: &str, width: f32, metrics: &LayoutMetrics<'_>) -> usize {
    let mut acc = 0.0f32;
    let mut taken = 0usize;
    for (idx, ch) in segment.char_indices() {
        let advance = metrics
            .char_to_glyph
            .get(&ch)
            .and_then(|glyph| metrics.glyph_metrics.get(glyph))
            .map_or(0.0, |gm| gm.advance.x);
        if taken > 0 && acc + advance > width {
            return idx;
        }
        acc += advance;
        taken += 1;
    }
    segment.len()
}

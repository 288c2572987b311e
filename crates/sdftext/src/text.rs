//! The SdfText facade
//!
//! Ties a font, a build format, the shared atlas and the metric maps into
//! one object mirroring the lifecycle of a cache file: whatever `new` builds,
//! `save` persists and `load` reconstructs, so the measuring and placement
//! operations behave identically on a freshly built object and a reloaded
//! one.

use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::atlas::{Format, TextureAtlas};
use crate::codec;
use crate::font::{Font, GlyphMetrics};
use crate::geom::{Rect, Vec2};
use crate::layout::{measure_glyphs, DrawOptions, LayoutMetrics};
use crate::placement::{measure_rect, place_glyphs, place_glyphs_clipped, CharPlacement};
use crate::registry::AtlasCache;
use crate::Result;

/// Starter character set: ASCII alphanumerics, punctuation, the ligature
/// digraphs and the accented vowels common in western European text.
pub const DEFAULT_CHARS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz1234567890().?!,:;'\"&*=+-/\\|@#_[]<>%^llflfiphrids\u{e9}\u{e1}\u{e8}\u{e0}";

/// A font bound to its distance-field atlas and cached metrics.
///
/// Immutable once constructed; `load` and `create_cached` produce new
/// instances instead of mutating. Cheap to share behind an `Arc`, like the
/// atlas it holds.
#[derive(Debug)]
pub struct SdfText {
    font: Font,
    format: Format,
    atlas: Arc<TextureAtlas>,
    char_to_glyph: FxHashMap<char, u32>,
    glyph_to_char: FxHashMap<u32, char>,
    glyph_metrics: FxHashMap<u32, GlyphMetrics>,
}

impl SdfText {
    /// Build (or fetch from `cache`) the atlas for `chars` and capture the
    /// glyph maps and metrics.
    ///
    /// A space is appended to the request when missing: justification and
    /// wrapping need its glyph even if the caller never asked for it.
    /// Characters the face cannot map go to glyph 0, so they render as the
    /// face's missing-glyph box rather than vanishing.
    pub fn new(font: Font, format: Format, chars: &str, cache: &AtlasCache) -> Result<SdfText> {
        let mut requested: Vec<char> = chars.chars().collect();
        if !requested.contains(&' ') {
            requested.push(' ');
        }

        let mut char_to_glyph = FxHashMap::default();
        let mut glyph_to_char = FxHashMap::default();
        let mut glyph_indices: Vec<u32> = Vec::new();
        let mut glyph_metrics = FxHashMap::default();

        font.with_face(|face| {
            for &ch in &requested {
                let glyph = face.glyph_index(ch).map_or(0, |g| u32::from(g.0));
                if !glyph_indices.contains(&glyph) {
                    glyph_indices.push(glyph);
                    glyph_metrics.insert(glyph, GlyphMetrics::from_face(face, glyph, font.size()));
                }
                char_to_glyph.insert(ch, glyph);
                glyph_to_char.insert(glyph, ch);
            }
            Ok(())
        })?;

        // The cache key carries the characters as supplied; the appended
        // space only affects the glyph list.
        let atlas = cache.get_or_build(&font, &format, chars, &glyph_indices)?;
        tracing::debug!(
            "built SdfText for '{}' ({} glyphs, {} page(s))",
            font.name(),
            glyph_indices.len(),
            atlas.texture_count()
        );

        Ok(SdfText {
            font,
            format,
            atlas,
            char_to_glyph,
            glyph_to_char,
            glyph_metrics,
        })
    }

    /// Assemble an instance from already-built pieces (cache loading).
    pub(crate) fn from_parts(
        font: Font,
        format: Format,
        atlas: Arc<TextureAtlas>,
        char_to_glyph: FxHashMap<char, u32>,
        glyph_to_char: FxHashMap<u32, char>,
        glyph_metrics: FxHashMap<u32, GlyphMetrics>,
    ) -> SdfText {
        SdfText {
            font,
            format,
            atlas,
            char_to_glyph,
            glyph_to_char,
            glyph_metrics,
        }
    }

    /// Use the cache file at `path`, building and saving it on first run.
    ///
    /// The returned object always comes from the codec, so first and later
    /// runs hand back bit-identical state.
    pub fn create_cached(
        path: impl AsRef<Path>,
        font: Font,
        format: Format,
        chars: &str,
        cache: &AtlasCache,
    ) -> Result<SdfText> {
        let path = path.as_ref();
        if path.exists() {
            tracing::debug!("loading cached SdfText from {}", path.display());
            return codec::load_from_path(path, Some(font.size()));
        }

        let size = font.size();
        let built = SdfText::new(font, format, chars, cache)?;
        codec::save_to_path(path, &built)?;
        codec::load_from_path(path, Some(size))
    }

    /// Serialize into `path`, overwriting any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        codec::save_to_path(path, self)
    }

    /// Deserialize from `path`, optionally rescaling the glyph metrics.
    pub fn load(path: impl AsRef<Path>, size: Option<f32>) -> Result<SdfText> {
        codec::load_from_path(path, size)
    }

    pub fn font(&self) -> &Font {
        &self.font
    }

    pub fn format(&self) -> &Format {
        &self.format
    }

    pub fn atlas(&self) -> &Arc<TextureAtlas> {
        &self.atlas
    }

    pub fn char_to_glyph(&self) -> &FxHashMap<char, u32> {
        &self.char_to_glyph
    }

    pub fn glyph_to_char(&self) -> &FxHashMap<u32, char> {
        &self.glyph_to_char
    }

    pub fn glyph_metrics(&self) -> &FxHashMap<u32, GlyphMetrics> {
        &self.glyph_metrics
    }

    /// Borrow the maps in the form the layout engine consumes.
    pub fn layout_metrics(&self) -> LayoutMetrics<'_> {
        LayoutMetrics {
            char_to_glyph: &self.char_to_glyph,
            glyph_metrics: &self.glyph_metrics,
            font_size: self.font.size(),
            ascent: self.font.ascent(),
            descent: self.font.descent(),
        }
    }

    /// Lay `text` out on a single growing line per paragraph.
    pub fn glyph_placements(&self, text: &str, options: &DrawOptions) -> Vec<(u32, Vec2)> {
        measure_glyphs(&self.layout_metrics(), text, None, options)
    }

    /// Lay `text` out wrapped to `max_width`.
    pub fn glyph_placements_wrapped(
        &self,
        text: &str,
        max_width: f32,
        options: &DrawOptions,
    ) -> Vec<(u32, Vec2)> {
        measure_glyphs(&self.layout_metrics(), text, Some(max_width), options)
    }

    /// Width and height of `text` laid out unwrapped.
    pub fn measure_string(&self, text: &str, options: &DrawOptions) -> Vec2 {
        self.measure_string_bounds(text, options).size()
    }

    /// Width and height of `text` wrapped to `max_width`.
    pub fn measure_string_wrapped(&self, text: &str, max_width: f32, options: &DrawOptions) -> Vec2 {
        self.measure_string_bounds_wrapped(text, max_width, options)
            .size()
    }

    /// Ink bounds of `text` laid out unwrapped, relative to the first
    /// baseline at the origin.
    pub fn measure_string_bounds(&self, text: &str, options: &DrawOptions) -> Rect {
        let measures = self.glyph_placements(text, options);
        measure_rect(&self.atlas, &self.font, &measures, options)
    }

    /// Ink bounds of `text` wrapped to `max_width`.
    pub fn measure_string_bounds_wrapped(
        &self,
        text: &str,
        max_width: f32,
        options: &DrawOptions,
    ) -> Rect {
        let measures = self.glyph_placements_wrapped(text, max_width, options);
        measure_rect(&self.atlas, &self.font, &measures, options)
    }

    /// Per-page quads for `text` anchored at `baseline`.
    pub fn place_string(
        &self,
        text: &str,
        baseline: Vec2,
        options: &DrawOptions,
    ) -> Vec<(u32, Vec<CharPlacement>)> {
        let measures = self.glyph_placements(text, options);
        place_glyphs(&self.atlas, &self.font, &measures, baseline, options)
    }

    /// Per-page quads for `text` fitted into `fit`: the line grows freely but
    /// quads are clipped to the rect. `offset` shifts the text inside it.
    pub fn place_string_boxed(
        &self,
        text: &str,
        fit: Rect,
        offset: Vec2,
        options: &DrawOptions,
    ) -> Vec<(u32, Vec<CharPlacement>)> {
        let measures = self.glyph_placements(text, options);
        place_glyphs_clipped(
            &self.atlas,
            &self.font,
            &measures,
            fit,
            fit.upper_left() + offset,
            options,
        )
    }

    /// Per-page quads for `text` wrapped to the rect's width and anchored at
    /// its upper-left corner plus `offset`. No clipping: wrapped text may
    /// run past the rect's bottom edge.
    pub fn place_string_wrapped(
        &self,
        text: &str,
        fit: Rect,
        offset: Vec2,
        options: &DrawOptions,
    ) -> Vec<(u32, Vec<CharPlacement>)> {
        let measures = self.glyph_placements_wrapped(text, fit.width(), options);
        place_glyphs(
            &self.atlas,
            &self.font,
            &measures,
            fit.upper_left() + offset,
            options,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::GlyphInfo;
    use crate::registry::FontRegistry;
    use image::RgbImage;

    fn synthetic_text() -> SdfText {
        let font = Font::from_cached("Fixture".into(), 32.0, 38.0, 0.0, 26.0, 6.0);

        let mut char_to_glyph = FxHashMap::default();
        let mut glyph_to_char = FxHashMap::default();
        let mut glyph_metrics = FxHashMap::default();
        for (ch, glyph, advance) in [('A', 2u32, 18.0f32), ('a', 3, 14.0), (' ', 1, 8.0)] {
            char_to_glyph.insert(ch, glyph);
            glyph_to_char.insert(glyph, ch);
            glyph_metrics.insert(
                glyph,
                GlyphMetrics {
                    advance: Vec2::new(advance, 32.0),
                    min: Vec2::ZERO,
                    max: Vec2::new(advance, 22.0),
                },
            );
        }

        let mut glyph_infos = FxHashMap::default();
        for (i, glyph) in [2u32, 3, 1].into_iter().enumerate() {
            glyph_infos.insert(
                glyph,
                GlyphInfo {
                    texture_index: 0,
                    tex_coords: Rect::new(i as f32 * 33.0, 0.0, i as f32 * 33.0 + 32.0, 32.0),
                    origin_offset: Vec2::ZERO,
                    size: Vec2::new(12.0, 12.0),
                },
            );
        }
        let atlas = TextureAtlas::from_parts(
            glyph_infos,
            vec![RgbImage::new(128, 64)],
            Vec2::splat(2.0),
            Vec2::splat(2.0),
            (32, 32),
            Vec2::new(12.0, 12.0),
            24.0,
            8.0,
        );

        SdfText::from_parts(
            font,
            Format::default(),
            Arc::new(atlas),
            char_to_glyph,
            glyph_to_char,
            glyph_metrics,
        )
    }

    fn latin_font(registry: &FontRegistry, size: f32) -> Option<Font> {
        for family in registry.list_families() {
            let Ok(font) = registry.load_font(&family, size) else {
                continue;
            };
            let has_latin = font
                .with_face(|face| {
                    Ok(face.glyph_index('A').is_some() && face.glyph_index('a').is_some())
                })
                .unwrap_or(false);
            if has_latin {
                return Some(font);
            }
        }
        None
    }

    #[test]
    fn placements_accumulate_advances() {
        let text = synthetic_text();
        let out = text.glyph_placements("Aa", &DrawOptions::default());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], (2, Vec2::ZERO));
        // The second pen position is exactly advance('A').x.
        assert_eq!(out[1], (3, Vec2::new(18.0, 0.0)));
    }

    #[test]
    fn empty_text_measures_zero() {
        let text = synthetic_text();
        assert!(text.glyph_placements("", &DrawOptions::default()).is_empty());
        assert_eq!(
            text.measure_string("", &DrawOptions::default()),
            Vec2::ZERO
        );
    }

    #[test]
    fn wrapped_placements_respect_the_width() {
        let text = synthetic_text();
        // advance(A) + advance(space) + advance(a)/2 = 33; "A a" must split.
        let out = text.glyph_placements_wrapped("A a", 33.0, &DrawOptions::default());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].1, Vec2::ZERO);
        assert_eq!(out[1].1.x, 0.0);
        assert!(out[1].1.y > 0.0);
    }

    #[test]
    fn place_string_produces_one_group_per_touched_page() {
        let text = synthetic_text();
        let groups = text.place_string("Aa", Vec2::new(0.0, 50.0), &DrawOptions::default());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0, 0);
        assert_eq!(groups[0].1.len(), 2);
    }

    #[test]
    fn boxed_placement_clips_to_the_rect() {
        let text = synthetic_text();
        let fit = Rect::new(0.0, 0.0, 10.0, 40.0);
        let groups = text.place_string_boxed("Aa", fit, Vec2::new(0.0, 20.0), &DrawOptions::default());
        for (_, placements) in &groups {
            for p in placements {
                assert!(p.dst_rect.x1 >= fit.x1 && p.dst_rect.x2 <= fit.x2);
            }
        }
    }

    #[test]
    fn facade_appends_the_space_and_builds_maps() {
        let registry = FontRegistry::with_system_fonts();
        let Some(font) = latin_font(&registry, 32.0) else {
            println!("No system fonts available - skipping test (CI environment)");
            return;
        };

        let cache = AtlasCache::new();
        let text = SdfText::new(font, Format::default(), "Aa", &cache).unwrap();

        assert!(text.char_to_glyph().contains_key(&'A'));
        assert!(text.char_to_glyph().contains_key(&'a'));
        assert!(text.char_to_glyph().contains_key(&' '));
        for glyph in text.char_to_glyph().values() {
            assert!(text.glyph_metrics().contains_key(glyph));
            assert!(text.atlas().glyph_info(*glyph).is_some());
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn small_charset_fits_one_page() {
        let registry = FontRegistry::with_system_fonts();
        let Some(font) = latin_font(&registry, 32.0) else {
            println!("No system fonts available - skipping test (CI environment)");
            return;
        };

        let cache = AtlasCache::new();
        let text = SdfText::new(font, Format::default(), "Aa ", &cache).unwrap();
        assert_eq!(text.atlas().texture_count(), 1);

        // Layout of "Aa" lands at x = 0 and x = advance(A).x.
        let a_glyph = text.char_to_glyph()[&'A'];
        let a_advance = text.glyph_metrics()[&a_glyph].advance.x;
        let out = text.glyph_placements("Aa", &DrawOptions::default());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].1.x, 0.0);
        assert_eq!(out[1].1.x, a_advance);
    }

    #[test]
    fn create_cached_round_trips_through_the_file() {
        let registry = FontRegistry::with_system_fonts();
        let Some(font) = latin_font(&registry, 32.0) else {
            println!("No system fonts available - skipping test (CI environment)");
            return;
        };

        let path = std::env::temp_dir().join(format!(
            "sdftext-create-cached-{}.sdft",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        let cache = AtlasCache::new();
        let first =
            SdfText::create_cached(&path, font.clone(), Format::default(), "Aa", &cache).unwrap();
        assert!(path.exists());

        // Second run loads the file instead of rebuilding.
        let second =
            SdfText::create_cached(&path, font, Format::default(), "Aa", &cache).unwrap();
        assert!(!second.font().has_face());
        assert_eq!(first.char_to_glyph(), second.char_to_glyph());
        assert_eq!(first.glyph_metrics(), second.glyph_metrics());
        assert_eq!(first.atlas().glyphs(), second.atlas().glyphs());

        let _ = std::fs::remove_file(&path);
    }
}

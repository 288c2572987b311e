//! Font discovery and atlas caching
//!
//! Uses fontdb to discover system and user fonts by name. Lookup tries an
//! exact family query first, then falls back to token scoring over face
//! names so partial requests like "arial bold" still resolve.

use std::path::Path;
use std::sync::{Arc, Mutex};

use fontdb::{Database, Family, Query, Source, Stretch, Style, Weight};

use crate::atlas::{sdf_bitmap_size, Format, TextureAtlas};
use crate::font::{face_family_and_style, Font};
use crate::geom::Vec2;
use crate::outline::Shape;
use crate::{Result, TextError};

/// Font database wrapper resolving names to face data.
pub struct FontRegistry {
    db: Database,
}

impl FontRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            db: Database::new(),
        }
    }

    /// Create a registry populated with the system's fonts.
    pub fn with_system_fonts() -> Self {
        let mut db = Database::new();
        db.load_system_fonts();
        tracing::debug!("loaded {} system font faces", db.len());
        Self { db }
    }

    /// Register an in-memory font (a single face or a collection).
    pub fn load_font_data(&mut self, data: Vec<u8>) {
        self.db.load_font_data(data);
    }

    /// Register a single font file.
    pub fn load_font_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.db.load_font_file(path)?;
        Ok(())
    }

    /// Register every font found under `dir`, recursively.
    pub fn load_fonts_dir(&mut self, dir: impl AsRef<Path>) {
        self.db.load_fonts_dir(dir);
    }

    /// Resolve `name` and load the face at `size`.
    pub fn load_font(&self, name: &str, size: f32) -> Result<Font> {
        let (bytes, index) = self.font_data(name)?;
        let font = Font::from_data(bytes, index, size)?;
        tracing::debug!("resolved '{}' to '{}'", name, font.name());
        Ok(font)
    }

    /// Raw face bytes and collection index for `name`.
    pub fn font_data(&self, name: &str) -> Result<(Arc<Vec<u8>>, u32)> {
        let id = self
            .query_exact(name)
            .or_else(|| self.query_fuzzy(name))
            .ok_or_else(|| {
                tracing::warn!("no face matches '{}'", name);
                TextError::FontNotFound(name.to_string())
            })?;
        self.face_bytes(id)
    }

    /// List available font families, sorted and deduplicated.
    pub fn list_families(&self) -> Vec<String> {
        let mut families: Vec<String> = self
            .db
            .faces()
            .filter_map(|face| face.families.first().map(|(name, _)| name.clone()))
            .collect();

        families.sort();
        families.dedup();
        families
    }

    /// Check whether a family of this exact name is available.
    pub fn has_font(&self, name: &str) -> bool {
        self.query_exact(name).is_some()
    }

    fn query_exact(&self, name: &str) -> Option<fontdb::ID> {
        let query = Query {
            families: &[Family::Name(name)],
            weight: Weight::NORMAL,
            style: Style::Normal,
            stretch: Stretch::Normal,
        };
        self.db.query(&query)
    }

    /// Score every face name against the request and take the best hit.
    fn query_fuzzy(&self, name: &str) -> Option<fontdb::ID> {
        let wanted = name.trim().to_lowercase();
        let mut best: Option<(f32, fontdb::ID)> = None;
        for face in self.db.faces() {
            let key = face_key(face);
            if key == wanted {
                return Some(face.id);
            }
            let score = fuzzy_score(&wanted, &key);
            if score > best.map_or(0.0, |(s, _)| s) {
                best = Some((score, face.id));
            }
        }
        best.map(|(score, id)| {
            tracing::debug!("fuzzy-matched font '{}' with score {:.2}", wanted, score);
            id
        })
    }

    fn face_bytes(&self, id: fontdb::ID) -> Result<(Arc<Vec<u8>>, u32)> {
        let (src, index) = self
            .db
            .face_source(id)
            .ok_or_else(|| TextError::FaceLoad("face source not found".to_string()))?;

        let bytes = match src {
            Source::File(path) => std::fs::read(&path)?,
            Source::Binary(data) => data.as_ref().as_ref().to_vec(),
            Source::SharedFile(_, data) => data.as_ref().as_ref().to_vec(),
        };

        Ok((Arc::new(bytes), index))
    }
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase lookup key for a face: family plus weight/style qualifiers.
fn face_key(face: &fontdb::FaceInfo) -> String {
    let mut key = face
        .families
        .first()
        .map(|(name, _)| name.clone())
        .unwrap_or_else(|| face.post_script_name.clone());
    if face.weight == Weight::BOLD {
        key.push_str(" bold");
    }
    match face.style {
        Style::Italic => key.push_str(" italic"),
        Style::Oblique => key.push_str(" oblique"),
        Style::Normal => {}
    }
    key.to_lowercase()
}

/// Token score for a lowercase `query` against a lowercase candidate `key`.
///
/// Hits are the summed lengths of query tokens found in the key; the score
/// is 0.75 weighted by hit coverage of the key (separators excluded), plus
/// 0.25 when the token counts agree. Zero hits score zero.
fn fuzzy_score(query: &str, key: &str) -> f32 {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    let hits: usize = tokens
        .iter()
        .filter(|tok| key.contains(**tok))
        .map(|tok| tok.len())
        .sum();
    if hits == 0 {
        return 0.0;
    }

    let key_tokens = key.split_whitespace().count();
    let separators = key_tokens.saturating_sub(1);
    let coverage = hits as f32 / (key.len() - separators) as f32;
    let hit_score = 0.75 * coverage.min(1.0);
    let key_score = if key_tokens == tokens.len() { 0.25 } else { 0.0 };
    hit_score + key_score
}

/// Identity of a built atlas.
///
/// The glyph cell size is part of the key: two sizes of one face can share
/// an atlas only when their shared cell dimensions come out equal.
#[derive(Clone, Debug, PartialEq)]
struct AtlasKey {
    family: String,
    style: String,
    chars: String,
    texture_size: (u32, u32),
    bitmap_size: (u32, u32),
}

/// Shared store of built atlases.
#[derive(Default)]
pub struct AtlasCache {
    entries: Mutex<Vec<(AtlasKey, Arc<TextureAtlas>)>>,
}

impl AtlasCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the atlas for this font/format/charset, building it on a miss.
    ///
    /// The lock is held across the build so concurrent callers never render
    /// the same atlas twice.
    pub fn get_or_build(
        &self,
        font: &Font,
        format: &Format,
        chars: &str,
        glyphs: &[u32],
    ) -> Result<Arc<TextureAtlas>> {
        let key = make_key(font, format, chars, glyphs)?;

        let mut entries = self.entries.lock().unwrap();
        if let Some((_, atlas)) = entries.iter().find(|(k, _)| *k == key) {
            tracing::debug!("atlas cache hit for '{} {}'", key.family, key.style);
            return Ok(Arc::clone(atlas));
        }

        let atlas = Arc::new(TextureAtlas::build(font, format, glyphs)?);
        entries.push((key, Arc::clone(&atlas)));
        Ok(atlas)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Drop every cached atlas.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

/// Measure the glyph set to recover the cell size the build would choose.
fn make_key(font: &Font, format: &Format, chars: &str, glyphs: &[u32]) -> Result<AtlasKey> {
    font.with_face(|face| {
        let (family, style) = face_family_and_style(face);
        let mut max_glyph_size = Vec2::ZERO;
        for &glyph in glyphs {
            if let Ok(shape) = Shape::from_face(face, glyph) {
                max_glyph_size = max_glyph_size.max(shape.bounds().size());
            }
        }
        Ok(AtlasKey {
            family,
            style,
            chars: chars.to_string(),
            texture_size: format.texture_size,
            bitmap_size: sdf_bitmap_size(format.sdf_scale, format.sdf_padding, max_glyph_size),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_match_scores_one() {
        // hits = 9, key length without the separator = 9, counts agree.
        let score = fuzzy_score("arial bold", "arial bold");
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn partial_match_scores_below_full() {
        let partial = fuzzy_score("arial", "arial bold");
        let full = fuzzy_score("arial bold", "arial bold");
        assert!(partial > 0.0);
        assert!(partial < full);
        // 5 hit bytes over 9 scorable bytes, no token-count bonus.
        assert!((partial - 0.75 * 5.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn disjoint_names_score_zero() {
        assert_eq!(fuzzy_score("times", "arial bold"), 0.0);
        assert_eq!(fuzzy_score("", "arial bold"), 0.0);
    }

    #[test]
    fn token_count_bonus_breaks_ties() {
        // Same hit bytes; the candidate with matching token count wins.
        let same_shape = fuzzy_score("deja sans", "deja sans");
        let extra_token = fuzzy_score("deja sans", "deja sans mono");
        assert!(same_shape > extra_token);
    }

    #[test]
    fn unknown_font_is_reported() {
        let registry = FontRegistry::new();
        let err = registry.load_font("No Such Family", 32.0).unwrap_err();
        assert!(matches!(err, TextError::FontNotFound(_)));
    }

    #[test]
    fn lists_system_families() {
        let registry = FontRegistry::with_system_fonts();
        let families = registry.list_families();
        if families.is_empty() {
            println!("No system fonts available - skipping test (CI environment)");
            return;
        }
        let mut sorted = families.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(families, sorted);
        assert!(registry.has_font(&families[0]));
    }

    #[test]
    fn loads_a_system_font_by_family() {
        let registry = FontRegistry::with_system_fonts();
        let Some(family) = registry.list_families().into_iter().next() else {
            println!("No system fonts available - skipping test (CI environment)");
            return;
        };
        let font = registry.load_font(&family, 24.0).unwrap();
        assert!(font.has_face());
        assert_eq!(font.size(), 24.0);
        assert!(font.ascent() > 0.0);
    }

    #[test]
    fn cache_returns_shared_atlas() {
        let registry = FontRegistry::with_system_fonts();
        let mut found = None;
        for family in registry.list_families() {
            if let Ok(font) = registry.load_font(&family, 32.0) {
                let glyph = font
                    .with_face(|face| Ok(face.glyph_index('A').map(|g| u32::from(g.0))))
                    .ok()
                    .flatten();
                if let Some(glyph) = glyph {
                    found = Some((font, glyph));
                    break;
                }
            }
        }
        let Some((font, glyph)) = found else {
            println!("No system fonts available - skipping test (CI environment)");
            return;
        };

        let cache = AtlasCache::new();
        let format = Format::default();
        let first = cache.get_or_build(&font, &format, "A", &[glyph]).unwrap();
        let second = cache.get_or_build(&font, &format, "A", &[glyph]).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        // A different charset is a different atlas.
        let third = cache.get_or_build(&font, &format, "AB", &[glyph]).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(cache.len(), 2);
    }
}

//! Font handles and metrics.
//!
//! Font-wide metrics are expressed in pixels at [`NOMINAL_SIZE`] and never
//! change with the requested size; per-glyph metrics are expressed in pixels
//! at the font's own size so cache rescaling is a single multiplication.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use ttf_parser::{name_id, Face, GlyphId};

use crate::geom::Vec2;
use crate::{Result, TextError};

/// Size the atlas shapes and font-wide metrics are normalized to.
pub const NOMINAL_SIZE: f32 = 32.0;

/// Owned face bytes plus the face index within a collection.
#[derive(Clone)]
pub struct FaceData {
    pub bytes: Arc<Vec<u8>>,
    pub index: u32,
}

impl fmt::Debug for FaceData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaceData")
            .field("bytes", &self.bytes.len())
            .field("index", &self.index)
            .finish()
    }
}

/// A font at a fixed point size.
///
/// Fonts loaded from a cache file carry no face data; operations that need
/// the face (atlas building, glyph mapping) fail on them with
/// [`TextError::FaceLoad`], while metrics and layout keep working.
#[derive(Clone, Debug)]
pub struct Font {
    data: Option<FaceData>,
    name: String,
    size: f32,
    height: f32,
    leading: f32,
    ascent: f32,
    descent: f32,
}

impl Font {
    /// Parse a face and capture its nominal-size metrics.
    pub fn from_data(bytes: Arc<Vec<u8>>, index: u32, size: f32) -> Result<Font> {
        let face = Face::parse(&bytes, index).map_err(|e| TextError::FaceLoad(e.to_string()))?;

        let k = NOMINAL_SIZE / f32::from(face.units_per_em());
        let ascent = k * f32::from(face.ascender()).abs();
        let descent = k * f32::from(face.descender()).abs();
        // FreeType-style line height: ascender - descender + line gap.
        let height = k * (f32::from(face.height()) + f32::from(face.line_gap()));
        let leading = height - ascent - descent;
        let name = face_full_name(&face);

        Ok(Font {
            data: Some(FaceData { bytes, index }),
            name,
            size,
            height,
            leading,
            ascent,
            descent,
        })
    }

    /// Load the first face of a font file.
    pub fn from_file(path: impl AsRef<Path>, size: f32) -> Result<Font> {
        let bytes = std::fs::read(path)?;
        Font::from_data(Arc::new(bytes), 0, size)
    }

    /// Rebuild a font from cached metrics, without face data.
    pub(crate) fn from_cached(
        name: String,
        size: f32,
        height: f32,
        leading: f32,
        ascent: f32,
        descent: f32,
    ) -> Font {
        Font {
            data: None,
            name,
            size,
            height,
            leading,
            ascent,
            descent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    /// Line height at [`NOMINAL_SIZE`], including the line gap.
    pub fn height(&self) -> f32 {
        self.height
    }

    /// Line gap at [`NOMINAL_SIZE`].
    pub fn leading(&self) -> f32 {
        self.leading
    }

    pub fn ascent(&self) -> f32 {
        self.ascent
    }

    pub fn descent(&self) -> f32 {
        self.descent
    }

    /// Factor taking nominal-size values to this font's size.
    pub fn size_scale(&self) -> f32 {
        self.size / NOMINAL_SIZE
    }

    pub fn has_face(&self) -> bool {
        self.data.is_some()
    }

    pub(crate) fn face_data(&self) -> Result<&FaceData> {
        self.data.as_ref().ok_or_else(|| {
            TextError::FaceLoad(format!(
                "font '{}' carries no face data (loaded from a cache)",
                self.name
            ))
        })
    }

    /// Run `f` against the parsed face.
    pub fn with_face<T>(&self, f: impl FnOnce(&Face<'_>) -> Result<T>) -> Result<T> {
        let data = self.face_data()?;
        let face =
            Face::parse(&data.bytes, data.index).map_err(|e| TextError::FaceLoad(e.to_string()))?;
        f(&face)
    }
}

/// Per-glyph metrics in pixels at the font's size.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GlyphMetrics {
    pub advance: Vec2,
    /// Bounding box minimum (left, bottom), y-up.
    pub min: Vec2,
    /// Bounding box maximum (right, top), y-up.
    pub max: Vec2,
}

impl GlyphMetrics {
    pub(crate) fn from_face(face: &Face<'_>, glyph: u32, size: f32) -> GlyphMetrics {
        let Ok(gid) = u16::try_from(glyph) else {
            return GlyphMetrics::default();
        };
        let gid = GlyphId(gid);
        let scale = size / f32::from(face.units_per_em());

        let advance_x = face.glyph_hor_advance(gid).map_or(0.0, f32::from);
        // Horizontal-only fonts fall back to the face height, like FreeType's
        // synthesized vertical metrics.
        let advance_y = face
            .glyph_ver_advance(gid)
            .map_or_else(|| f32::from(face.height()), f32::from);

        let (min, max) = match face.glyph_bounding_box(gid) {
            Some(b) => (
                Vec2::new(f32::from(b.x_min) * scale, f32::from(b.y_min) * scale),
                Vec2::new(f32::from(b.x_max) * scale, f32::from(b.y_max) * scale),
            ),
            None => (Vec2::ZERO, Vec2::ZERO),
        };

        GlyphMetrics {
            advance: Vec2::new(advance_x * scale, advance_y * scale),
            min,
            max,
        }
    }

    pub(crate) fn rescaled(&self, factor: f32) -> GlyphMetrics {
        GlyphMetrics {
            advance: self.advance * factor,
            min: self.min * factor,
            max: self.max * factor,
        }
    }
}

fn name_record(face: &Face<'_>, id: u16) -> Option<String> {
    face.names().into_iter().find_map(|name| {
        (name.name_id == id && name.is_unicode())
            .then(|| name.to_string())
            .flatten()
    })
}

/// Full name when present, otherwise "family style".
pub(crate) fn face_full_name(face: &Face<'_>) -> String {
    if let Some(full) = name_record(face, name_id::FULL_NAME) {
        return full;
    }
    match (
        name_record(face, name_id::FAMILY),
        name_record(face, name_id::SUBFAMILY),
    ) {
        (Some(family), Some(style)) => format!("{family} {style}"),
        (Some(family), None) => family,
        _ => String::from("Unknown"),
    }
}

/// (family, style) pair used for atlas cache keys.
pub(crate) fn face_family_and_style(face: &Face<'_>) -> (String, String) {
    let family = name_record(face, name_id::FAMILY).unwrap_or_else(|| String::from("Unknown"));
    let style = name_record(face, name_id::SUBFAMILY).unwrap_or_default();
    (family, style)
}

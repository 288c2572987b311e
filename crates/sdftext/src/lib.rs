//! Signed distance field text rendering
//!
//! This crate provides:
//! - Font discovery and loading (TTF/OTF via fontdb + ttf-parser)
//! - Multi-channel SDF glyph atlas generation (fdsm)
//! - A binary cache format persisting atlases together with their metrics
//! - Text layout (line breaking, alignment, justification)
//! - Screen-space glyph placement for quad-based renderers

pub mod atlas;
pub mod codec;
pub mod font;
pub mod geom;
pub mod layout;
pub mod outline;
pub mod placement;
mod rasterizer;
pub mod registry;
pub mod shader;
pub mod text;

pub use atlas::{Format, GlyphInfo, TextureAtlas};
pub use font::{FaceData, Font, GlyphMetrics, NOMINAL_SIZE};
pub use geom::{Rect, Vec2};
pub use layout::{measure_glyphs, DrawOptions, LayoutMetrics, TextAlign};
pub use outline::{detect_winding, Shape, Winding};
pub use placement::{measure_rect, place_glyphs, place_glyphs_clipped, CharPlacement};
pub use registry::{AtlasCache, FontRegistry};
pub use shader::SDF_TEXT_SHADER;
pub use text::{SdfText, DEFAULT_CHARS};

use thiserror::Error;

/// Text rendering errors
#[derive(Error, Debug)]
pub enum TextError {
    #[error("Failed to load face: {0}")]
    FaceLoad(String),

    #[error("No outline data for glyph {0}")]
    GlyphOutline(u32),

    #[error("Font '{0}' not found")]
    FontNotFound(String),

    #[error("Invalid atlas format: {0}")]
    InvalidFormat(String),

    #[error("Malformed cache: {0}")]
    MalformedCache(String),

    #[error("Cannot rescale cached font to size {0}")]
    UnsupportedRescale(f32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, TextError>;

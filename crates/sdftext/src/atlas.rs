//! Glyph atlas packing.
//!
//! Every glyph of a face gets the same cell size, derived from the largest
//! glyph bounds in the request. Cells are walked row-major across as many
//! fixed-size pages as needed; the resulting layout is a pure function of
//! (face, format, glyph order).

use image::RgbImage;
use rustc_hash::FxHashMap;
use ttf_parser::{Face, GlyphId};

use crate::font::{Font, NOMINAL_SIZE};
use crate::geom::{Rect, Vec2};
use crate::outline::{detect_winding, Shape, Winding};
use crate::rasterizer::{render_glyph_cell, CellParams};
use crate::{Result, TextError};

/// Atlas build parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Format {
    /// Page dimensions in pixels.
    pub texture_size: (u32, u32),
    /// Distance-field supersampling scale.
    pub sdf_scale: Vec2,
    /// Shape-space padding around each glyph inside its cell.
    pub sdf_padding: Vec2,
    /// Field range in shape units.
    pub sdf_range: f32,
    /// Corner angle threshold for edge coloring, radians.
    pub sdf_angle: f32,
    /// Gap between cells in pixels.
    pub tile_spacing: Vec2,
}

impl Default for Format {
    fn default() -> Self {
        Self {
            texture_size: (1024, 1024),
            sdf_scale: Vec2::splat(2.0),
            sdf_padding: Vec2::splat(2.0),
            sdf_range: 4.0,
            sdf_angle: 3.0,
            tile_spacing: Vec2::splat(1.0),
        }
    }
}

impl Format {
    pub fn with_texture_size(mut self, width: u32, height: u32) -> Self {
        self.texture_size = (width, height);
        self
    }

    pub fn with_sdf_scale(mut self, scale: Vec2) -> Self {
        self.sdf_scale = scale;
        self
    }

    pub fn with_sdf_padding(mut self, padding: Vec2) -> Self {
        self.sdf_padding = padding;
        self
    }

    pub fn with_sdf_range(mut self, range: f32) -> Self {
        self.sdf_range = range;
        self
    }

    pub fn with_sdf_angle(mut self, angle: f32) -> Self {
        self.sdf_angle = angle;
        self
    }

    pub fn with_tile_spacing(mut self, spacing: Vec2) -> Self {
        self.tile_spacing = spacing;
        self
    }
}

/// Where a glyph ended up, plus the shape-space box it was rendered from.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GlyphInfo {
    pub texture_index: u32,
    /// Cell rectangle in page pixels.
    pub tex_coords: Rect,
    /// Lower-left corner of the glyph bounds; non-positive components.
    pub origin_offset: Vec2,
    /// Glyph bounds extent in shape units.
    pub size: Vec2,
}

/// Packed distance-field pages for one font.
#[derive(Debug)]
pub struct TextureAtlas {
    glyphs: FxHashMap<u32, GlyphInfo>,
    pages: Vec<RgbImage>,
    sdf_scale: Vec2,
    sdf_padding: Vec2,
    bitmap_size: (u32, u32),
    max_glyph_size: Vec2,
    max_ascent: f32,
    max_descent: f32,
}

/// Shared cell size for a glyph set: `trunc(scale * (max + 2*padding) + 0.5)`.
pub(crate) fn sdf_bitmap_size(sdf_scale: Vec2, padding: Vec2, max_glyph_size: Vec2) -> (u32, u32) {
    (
        (sdf_scale.x * (max_glyph_size.x + 2.0 * padding.x) + 0.5) as u32,
        (sdf_scale.y * (max_glyph_size.y + 2.0 * padding.y) + 0.5) as u32,
    )
}

struct Measured {
    origin_offset: Vec2,
    size: Vec2,
    empty: bool,
}

impl TextureAtlas {
    /// Pack `glyphs` (in order) into distance-field pages.
    pub fn build(font: &Font, format: &Format, glyphs: &[u32]) -> Result<TextureAtlas> {
        let data = font.face_data()?;
        let face =
            Face::parse(&data.bytes, data.index).map_err(|e| TextError::FaceLoad(e.to_string()))?;
        let winding = detect_winding(&data.bytes);

        // First pass: bounds for every extractable glyph.
        let mut measured: FxHashMap<u32, Measured> = FxHashMap::default();
        let mut max_glyph_size = Vec2::ZERO;
        let mut max_ascent = 0.0f32;
        let mut max_descent = 0.0f32;
        for &glyph in glyphs {
            let shape = match Shape::from_face(&face, glyph) {
                Ok(shape) => shape,
                Err(e) => {
                    tracing::warn!("skipping glyph {glyph}: {e}");
                    continue;
                }
            };
            let bounds = shape.bounds();
            max_glyph_size = max_glyph_size.max(bounds.size());
            max_ascent = max_ascent.max(bounds.top);
            max_descent = max_descent.max(bounds.bottom.abs());
            measured.insert(
                glyph,
                Measured {
                    origin_offset: bounds.origin_offset(),
                    size: bounds.size(),
                    empty: shape.is_empty(),
                },
            );
        }

        let bitmap = sdf_bitmap_size(format.sdf_scale, format.sdf_padding, max_glyph_size);
        let (tex_w, tex_h) = format.texture_size;
        let columns = (tex_w as f32 / (bitmap.0 as f32 + format.tile_spacing.x)) as u32;
        let rows = (tex_h as f32 / (bitmap.1 as f32 + format.tile_spacing.y)) as u32;
        if columns == 0 || rows == 0 {
            return Err(TextError::InvalidFormat(format!(
                "glyph cell {}x{} does not fit a {}x{} texture",
                bitmap.0, bitmap.1, tex_w, tex_h
            )));
        }
        let per_texture = columns as usize * rows as usize;

        let range = format.sdf_range * format.sdf_scale.x;
        let sin_alpha = f64::from(format.sdf_angle).sin();
        let shape_scale = NOMINAL_SIZE / f32::from(face.units_per_em());

        // Second pass: walk the grid. Failed glyphs still consume their cell
        // so the layout stays a function of the input order.
        let mut glyph_map: FxHashMap<u32, GlyphInfo> = FxHashMap::default();
        let mut pages: Vec<RgbImage> = Vec::new();
        let mut page = RgbImage::new(tex_w, tex_h);
        let mut index = 0usize;
        let mut x = 0.0f32;
        let mut y = 0.0f32;

        for &glyph in glyphs {
            if let Some(m) = measured.get(&glyph) {
                if !m.empty {
                    let params = CellParams {
                        cell: (x as u32, y as u32, bitmap.0, bitmap.1),
                        translate: Vec2::new(
                            format.sdf_padding.x,
                            m.origin_offset.y.abs() + format.sdf_padding.y,
                        ),
                        sdf_scale: format.sdf_scale,
                        shape_scale,
                        range,
                        sin_alpha,
                    };
                    render_glyph_cell(&face, GlyphId(glyph as u16), &mut page, &params);
                    if winding == Winding::Clockwise {
                        invert_cell(&mut page, x as u32, y as u32, bitmap.0, bitmap.1);
                    }
                }
                glyph_map.insert(
                    glyph,
                    GlyphInfo {
                        texture_index: pages.len() as u32,
                        tex_coords: Rect::new(x, y, x + bitmap.0 as f32, y + bitmap.1 as f32),
                        origin_offset: m.origin_offset,
                        size: m.size,
                    },
                );
            }

            index += 1;
            x += bitmap.0 as f32 + format.tile_spacing.x;
            if index % columns as usize == 0 {
                x = 0.0;
                y += bitmap.1 as f32 + format.tile_spacing.y;
            }
            if index == per_texture {
                pages.push(std::mem::replace(&mut page, RgbImage::new(tex_w, tex_h)));
                index = 0;
                x = 0.0;
                y = 0.0;
            }
        }
        if index > 0 {
            pages.push(page);
        }

        tracing::debug!(
            "packed {} glyphs into {} page(s), cell {}x{}",
            glyph_map.len(),
            pages.len(),
            bitmap.0,
            bitmap.1
        );

        Ok(TextureAtlas {
            glyphs: glyph_map,
            pages,
            sdf_scale: format.sdf_scale,
            sdf_padding: format.sdf_padding,
            bitmap_size: bitmap,
            max_glyph_size,
            max_ascent,
            max_descent,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        glyphs: FxHashMap<u32, GlyphInfo>,
        pages: Vec<RgbImage>,
        sdf_scale: Vec2,
        sdf_padding: Vec2,
        bitmap_size: (u32, u32),
        max_glyph_size: Vec2,
        max_ascent: f32,
        max_descent: f32,
    ) -> TextureAtlas {
        TextureAtlas {
            glyphs,
            pages,
            sdf_scale,
            sdf_padding,
            bitmap_size,
            max_glyph_size,
            max_ascent,
            max_descent,
        }
    }

    pub fn glyph_info(&self, glyph: u32) -> Option<&GlyphInfo> {
        self.glyphs.get(&glyph)
    }

    pub fn glyphs(&self) -> &FxHashMap<u32, GlyphInfo> {
        &self.glyphs
    }

    pub fn pages(&self) -> &[RgbImage] {
        &self.pages
    }

    pub fn texture_count(&self) -> usize {
        self.pages.len()
    }

    /// Page dimensions; zero when the atlas holds no pages.
    pub fn texture_size(&self) -> (u32, u32) {
        self.pages
            .first()
            .map(|p| p.dimensions())
            .unwrap_or((0, 0))
    }

    pub fn sdf_scale(&self) -> Vec2 {
        self.sdf_scale
    }

    pub fn sdf_padding(&self) -> Vec2 {
        self.sdf_padding
    }

    pub fn bitmap_size(&self) -> (u32, u32) {
        self.bitmap_size
    }

    pub fn max_glyph_size(&self) -> Vec2 {
        self.max_glyph_size
    }

    pub fn max_ascent(&self) -> f32 {
        self.max_ascent
    }

    pub fn max_descent(&self) -> f32 {
        self.max_descent
    }
}

fn invert_cell(page: &mut RgbImage, x: u32, y: u32, w: u32, h: u32) {
    for py in y..y + h {
        for px in x..x + w {
            let p = page.get_pixel_mut(px, py);
            p.0 = [255 - p.0[0], 255 - p.0[1], 255 - p.0[2]];
        }
    }
}

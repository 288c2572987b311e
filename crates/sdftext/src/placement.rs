//! Screen-space glyph placement
//!
//! Turns layout output (glyph id + baseline-relative position) into textured
//! quads: a destination rect in pixels and normalized source coordinates
//! into one atlas page. Results are grouped per page so a renderer can bind
//! each texture once.

use crate::atlas::{GlyphInfo, TextureAtlas};
use crate::font::{Font, NOMINAL_SIZE};
use crate::geom::{Rect, Vec2};
use crate::layout::DrawOptions;

/// One glyph quad: where to sample and where to draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CharPlacement {
    pub glyph: u32,
    /// Source coordinates into the page, normalized to 0..1.
    pub src_tex_coords: Rect,
    /// Destination rectangle in pixels, y-down.
    pub dst_rect: Rect,
}

/// Undo the packer's cell transform and anchor the quad on the baseline.
///
/// The returned rect is positioned for a glyph at the origin; callers add
/// the (scaled) glyph position afterwards.
fn base_dest_rect(
    info: &GlyphInfo,
    sdf_scale: Vec2,
    sdf_padding: Vec2,
    font_origin_scale: Vec2,
    font_render_scale: Vec2,
    scale: f32,
) -> Rect {
    let mut dest = info.tex_coords;
    dest.scale(scale);
    dest -= dest.upper_left();

    let mut offset = Vec2::new(0.0, -dest.height());
    let tx = sdf_padding.x;
    let ty = info.origin_offset.y.abs() + sdf_padding.y;
    offset += scale * sdf_scale * Vec2::new(-tx, ty);
    offset += scale * font_origin_scale * Vec2::new(info.origin_offset.x, 0.0);
    dest += offset;
    dest.scale_by(font_render_scale);
    dest
}

/// Resolve layout measures into quads anchored at `baseline`.
///
/// Output is grouped by atlas page in page order; pages that receive no
/// glyphs are skipped, as are glyphs the atlas does not contain.
pub fn place_glyphs(
    atlas: &TextureAtlas,
    font: &Font,
    measures: &[(u32, Vec2)],
    baseline: Vec2,
    options: &DrawOptions,
) -> Vec<(u32, Vec<CharPlacement>)> {
    let sdf_scale = atlas.sdf_scale();
    let sdf_padding = atlas.sdf_padding();
    let (tex_w, tex_h) = atlas.texture_size();
    let tex_size = Vec2::new(tex_w as f32, tex_h as f32);

    let font_render_scale = Vec2::splat(font.size()) / (sdf_scale * NOMINAL_SIZE);
    let font_origin_scale = Vec2::splat(font.size_scale());
    let scale = options.scale;
    let baseline = if options.pixel_snap {
        baseline.floor()
    } else {
        baseline
    };

    let mut result = Vec::new();
    for tex_idx in 0..atlas.texture_count() as u32 {
        let mut placements = Vec::new();
        for &(glyph, pos) in measures {
            let Some(info) = atlas.glyph_info(glyph) else {
                continue;
            };
            if info.texture_index != tex_idx {
                continue;
            }

            let mut dest = base_dest_rect(
                info,
                sdf_scale,
                sdf_padding,
                font_origin_scale,
                font_render_scale,
                scale,
            );
            dest += pos * scale;
            dest += baseline;

            placements.push(CharPlacement {
                glyph,
                src_tex_coords: info.tex_coords / tex_size,
                dst_rect: dest,
            });
        }
        if !placements.is_empty() {
            result.push((tex_idx, placements));
        }
    }

    result
}

/// Resolve layout measures into quads, clipped against `clip`.
///
/// This is the boxed-draw path: quads are built in the clip rect's space,
/// shifted by `offset`, trimmed edge-by-edge, and their source coordinates
/// rescaled to the surviving portion. Fully clipped glyphs are dropped.
pub fn place_glyphs_clipped(
    atlas: &TextureAtlas,
    font: &Font,
    measures: &[(u32, Vec2)],
    clip: Rect,
    offset: Vec2,
    options: &DrawOptions,
) -> Vec<(u32, Vec<CharPlacement>)> {
    let sdf_scale = atlas.sdf_scale();
    let sdf_padding = atlas.sdf_padding();
    let (tex_w, tex_h) = atlas.texture_size();
    let tex_size = Vec2::new(tex_w as f32, tex_h as f32);

    let font_render_scale = Vec2::splat(font.size()) / (sdf_scale * NOMINAL_SIZE);
    let font_origin_scale = Vec2::splat(font.size_scale());
    let scale = options.scale;
    let offset = if options.pixel_snap {
        offset.floor()
    } else {
        offset
    };

    let mut result = Vec::new();
    for tex_idx in 0..atlas.texture_count() as u32 {
        let mut placements = Vec::new();
        for &(glyph, pos) in measures {
            let Some(info) = atlas.glyph_info(glyph) else {
                continue;
            };
            if info.texture_index != tex_idx {
                continue;
            }

            let mut dest = info.tex_coords;
            dest.scale_by(font_render_scale);
            dest -= dest.upper_left();
            dest.scale(scale);
            dest += pos * scale;
            dest += offset;
            let origin = font_origin_scale * info.origin_offset;
            dest += Vec2::new((origin.x + 0.5).floor(), (-origin.y).floor()) * scale;
            dest += font_render_scale * Vec2::new(-sdf_padding.x, -sdf_padding.y);
            if options.pixel_snap {
                dest -= Vec2::new(dest.x1, dest.y1).fract();
            }

            let mut clipped = dest;
            if options.clip_horizontal {
                clipped.x1 = dest.x1.max(clip.x1);
                clipped.x2 = dest.x2.min(clip.x2);
            }
            if options.clip_vertical {
                clipped.y1 = dest.y1.max(clip.y1);
                clipped.y2 = dest.y2.min(clip.y2);
            }
            if clipped.x1 >= clipped.x2 || clipped.y1 >= clipped.y2 {
                continue;
            }

            // Trim the source by the same proportion as the destination.
            let mut src = info.tex_coords / tex_size;
            let coord_scale = Vec2::new(src.width() / dest.width(), src.height() / dest.height());
            src.x1 += (clipped.x1 - dest.x1) * coord_scale.x;
            src.x2 = src.x1 + clipped.width() * coord_scale.x;
            src.y1 += (clipped.y1 - dest.y1) * coord_scale.y;
            src.y2 = src.y1 + clipped.height() * coord_scale.y;

            placements.push(CharPlacement {
                glyph,
                src_tex_coords: src,
                dst_rect: clipped,
            });
        }
        if !placements.is_empty() {
            result.push((tex_idx, placements));
        }
    }

    result
}

/// Tight pixel bounds of laid-out text, before any baseline translation.
///
/// Each glyph contributes its ink box (cell padding removed, extended by a
/// half-pixel rim at origin scale); boxes are unioned with the first one
/// taken as-is.
pub fn measure_rect(
    atlas: &TextureAtlas,
    font: &Font,
    measures: &[(u32, Vec2)],
    options: &DrawOptions,
) -> Rect {
    let sdf_scale = atlas.sdf_scale();
    let sdf_padding = atlas.sdf_padding();
    let font_render_scale = Vec2::splat(font.size()) / (sdf_scale * NOMINAL_SIZE);
    let font_origin_scale = Vec2::splat(font.size_scale());
    let scale = options.scale;

    let mut result = Rect::ZERO;
    for &(glyph, pos) in measures {
        let Some(info) = atlas.glyph_info(glyph) else {
            continue;
        };

        let mut dest = base_dest_rect(
            info,
            sdf_scale,
            sdf_padding,
            font_origin_scale,
            font_render_scale,
            scale,
        );
        dest += pos * scale;

        dest.x1 += (sdf_padding.x + info.origin_offset.x) * font_origin_scale.x;
        dest.y2 -= sdf_padding.y * font_origin_scale.y;
        dest.x2 = dest.x1 + (info.size.x + 1.0) * font_origin_scale.x;
        dest.y1 = dest.y2 - (info.size.y + 1.0) * font_origin_scale.y;
        dest.x1 -= 0.5 * font_origin_scale.x;
        dest.y1 -= 0.5 * font_origin_scale.y;
        dest.x2 += 0.5 * font_origin_scale.x;
        dest.y2 += 0.5 * font_origin_scale.y;

        if result.width() > 0.0 || result.height() > 0.0 {
            result = result.union(dest);
        } else {
            result = dest;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use rustc_hash::FxHashMap;

    // One 32x32 cell at the page origin, glyph anchored exactly on the
    // baseline (origin offset zero), built at the nominal size.
    fn fixture() -> (TextureAtlas, Font) {
        let mut glyphs = FxHashMap::default();
        glyphs.insert(
            7u32,
            GlyphInfo {
                texture_index: 0,
                tex_coords: Rect::new(0.0, 0.0, 32.0, 32.0),
                origin_offset: Vec2::ZERO,
                size: Vec2::new(12.0, 12.0),
            },
        );
        let atlas = TextureAtlas::from_parts(
            glyphs,
            vec![RgbImage::new(64, 64)],
            Vec2::splat(2.0),
            Vec2::splat(2.0),
            (32, 32),
            Vec2::new(12.0, 12.0),
            24.0,
            8.0,
        );
        let font = Font::from_cached("Fixture".into(), 32.0, 38.0, 0.0, 26.0, 6.0);
        (atlas, font)
    }

    fn approx(a: Rect, b: Rect) -> bool {
        (a.x1 - b.x1).abs() < 1e-4
            && (a.y1 - b.y1).abs() < 1e-4
            && (a.x2 - b.x2).abs() < 1e-4
            && (a.y2 - b.y2).abs() < 1e-4
    }

    #[test]
    fn dest_rect_reverses_the_cell_transform() {
        let (atlas, font) = fixture();
        let groups = place_glyphs(
            &atlas,
            &font,
            &[(7, Vec2::ZERO)],
            Vec2::ZERO,
            &DrawOptions::default(),
        );

        assert_eq!(groups.len(), 1);
        let (tex, placements) = &groups[0];
        assert_eq!(*tex, 0);
        assert_eq!(placements.len(), 1);

        let place = &placements[0];
        assert_eq!(place.glyph, 7);
        // Cell 32x32 back through scale 2 and padding 2 at size 32.
        assert!(approx(place.dst_rect, Rect::new(-2.0, -14.0, 14.0, 2.0)));
        assert!(approx(place.src_tex_coords, Rect::new(0.0, 0.0, 0.5, 0.5)));
    }

    #[test]
    fn baseline_snaps_to_whole_pixels() {
        let (atlas, font) = fixture();
        let baseline = Vec2::new(10.7, 20.3);

        let snapped = place_glyphs(
            &atlas,
            &font,
            &[(7, Vec2::ZERO)],
            baseline,
            &DrawOptions::default(),
        );
        assert!(approx(
            snapped[0].1[0].dst_rect,
            Rect::new(8.0, 6.0, 24.0, 22.0)
        ));

        let raw = place_glyphs(
            &atlas,
            &font,
            &[(7, Vec2::ZERO)],
            baseline,
            &DrawOptions::default().with_pixel_snap(false),
        );
        assert!(approx(
            raw[0].1[0].dst_rect,
            Rect::new(8.7, 6.3, 24.7, 22.3)
        ));
    }

    #[test]
    fn groups_follow_page_order_and_skip_unknown_glyphs() {
        let mut glyphs = FxHashMap::default();
        glyphs.insert(
            1u32,
            GlyphInfo {
                texture_index: 1,
                tex_coords: Rect::new(0.0, 0.0, 32.0, 32.0),
                origin_offset: Vec2::ZERO,
                size: Vec2::new(12.0, 12.0),
            },
        );
        glyphs.insert(
            2u32,
            GlyphInfo {
                texture_index: 0,
                tex_coords: Rect::new(0.0, 0.0, 32.0, 32.0),
                origin_offset: Vec2::ZERO,
                size: Vec2::new(12.0, 12.0),
            },
        );
        let atlas = TextureAtlas::from_parts(
            glyphs,
            vec![RgbImage::new(64, 64), RgbImage::new(64, 64)],
            Vec2::splat(2.0),
            Vec2::splat(2.0),
            (32, 32),
            Vec2::new(12.0, 12.0),
            24.0,
            8.0,
        );
        let font = Font::from_cached("Fixture".into(), 32.0, 38.0, 0.0, 26.0, 6.0);

        // Measures name the page-1 glyph first and an unknown glyph; output
        // still comes out in page order with the unknown one dropped.
        let measures = [
            (1, Vec2::ZERO),
            (99, Vec2::ZERO),
            (2, Vec2::new(20.0, 0.0)),
        ];
        let groups = place_glyphs(&atlas, &font, &measures, Vec2::ZERO, &DrawOptions::default());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, 0);
        assert_eq!(groups[0].1[0].glyph, 2);
        assert_eq!(groups[1].0, 1);
        assert_eq!(groups[1].1[0].glyph, 1);

        // A measure set touching one page yields one group.
        let only_page_one = place_glyphs(
            &atlas,
            &font,
            &[(1, Vec2::ZERO)],
            Vec2::ZERO,
            &DrawOptions::default(),
        );
        assert_eq!(only_page_one.len(), 1);
        assert_eq!(only_page_one[0].0, 1);
    }

    #[test]
    fn clipping_trims_dest_and_src_together() {
        let (atlas, font) = fixture();
        let clip = Rect::new(0.0, 0.0, 32.0, 32.0);
        let groups = place_glyphs_clipped(
            &atlas,
            &font,
            &[(7, Vec2::ZERO)],
            clip,
            Vec2::ZERO,
            &DrawOptions::default(),
        );

        let place = &groups[0].1[0];
        // Unclipped dest is (-1,-1,15,15); one pixel is shaved off the
        // top-left, which moves the source by one texel (1/32 of the range).
        assert!(approx(place.dst_rect, Rect::new(0.0, 0.0, 15.0, 15.0)));
        assert!(approx(
            place.src_tex_coords,
            Rect::new(0.03125, 0.03125, 0.5, 0.5)
        ));
    }

    #[test]
    fn fully_clipped_glyphs_are_dropped() {
        let (atlas, font) = fixture();
        let clip = Rect::new(100.0, 100.0, 200.0, 200.0);
        let groups = place_glyphs_clipped(
            &atlas,
            &font,
            &[(7, Vec2::ZERO)],
            clip,
            Vec2::ZERO,
            &DrawOptions::default(),
        );
        assert!(groups.is_empty());
    }

    #[test]
    fn clip_axes_can_be_disabled() {
        let (atlas, font) = fixture();
        let clip = Rect::new(0.0, 0.0, 32.0, 32.0);
        let groups = place_glyphs_clipped(
            &atlas,
            &font,
            &[(7, Vec2::ZERO)],
            clip,
            Vec2::ZERO,
            &DrawOptions::default().with_clip_horizontal(false),
        );
        let place = &groups[0].1[0];
        assert!(approx(place.dst_rect, Rect::new(-1.0, 0.0, 15.0, 15.0)));
    }

    #[test]
    fn measure_unions_ink_boxes() {
        let (atlas, font) = fixture();
        let single = measure_rect(&atlas, &font, &[(7, Vec2::ZERO)], &DrawOptions::default());
        assert!(approx(single, Rect::new(-0.5, -13.5, 13.5, 0.5)));

        let pair = measure_rect(
            &atlas,
            &font,
            &[(7, Vec2::ZERO), (7, Vec2::new(20.0, 0.0))],
            &DrawOptions::default(),
        );
        assert!(approx(pair, Rect::new(-0.5, -13.5, 33.5, 0.5)));
    }

    #[test]
    fn measure_of_unknown_glyphs_is_zero() {
        let (atlas, font) = fixture();
        let rect = measure_rect(&atlas, &font, &[(99, Vec2::ZERO)], &DrawOptions::default());
        assert_eq!(rect, Rect::ZERO);
    }
}

//! Multi-channel distance field rendering for single atlas cells.
//!
//! All fdsm types stay behind this module; the packer hands over a cell
//! rectangle and the transform parameters and gets pixels back.

use fdsm::generate::generate_msdf;
use fdsm::shape::Shape;
use fdsm::transform::Transform;
use image::{GenericImage, RgbImage};
use nalgebra::{Affine2, Scale2, TAffine, Translation2};
use ttf_parser::{Face, GlyphId};

use crate::geom::Vec2;

const COLORING_SEED: u64 = 0;

/// Placement of one glyph inside an atlas page.
pub(crate) struct CellParams {
    /// Cell rectangle in the page: x, y, width, height.
    pub cell: (u32, u32, u32, u32),
    /// Shape-space translation applied before scaling (padding and descender
    /// lift).
    pub translate: Vec2,
    /// Distance-field supersampling scale.
    pub sdf_scale: Vec2,
    /// Font units to shape units.
    pub shape_scale: f32,
    /// Field range in image pixels.
    pub range: f32,
    /// Corner threshold for edge coloring, as a sine.
    pub sin_alpha: f64,
}

/// Render one glyph's MSDF into its cell.
///
/// The caller skips glyphs without contours; rendering an empty shape would
/// only repaint the cell.
pub(crate) fn render_glyph_cell(
    face: &Face<'_>,
    glyph: GlyphId,
    page: &mut RgbImage,
    params: &CellParams,
) {
    let mut shape = Shape::load_from_face(face, glyph);
    shape.transform(&cell_transform(params));

    let colored = Shape::edge_coloring_simple(shape, params.sin_alpha, COLORING_SEED);
    let prepared = colored.prepare();

    let (x, y, w, h) = params.cell;
    let mut sub = page.sub_image(x, y, w, h);
    generate_msdf(&prepared, f64::from(params.range), &mut *sub);
}

/// Font units to cell pixels with y flipped inside the cell:
/// `x = sx * (k*u + tx)`, `y = cellH - sy * (k*v + ty)`.
fn cell_transform(params: &CellParams) -> Affine2<f64> {
    let (_, _, _, cell_h) = params.cell;

    let scale_font = nalgebra::convert::<_, nalgebra::Transform<f64, TAffine, 2>>(Scale2::new(
        f64::from(params.shape_scale),
        f64::from(params.shape_scale),
    ));
    let translate = Translation2::new(
        f64::from(params.translate.x),
        f64::from(params.translate.y),
    );
    let scale_sdf = nalgebra::convert::<_, nalgebra::Transform<f64, TAffine, 2>>(Scale2::new(
        f64::from(params.sdf_scale.x),
        f64::from(params.sdf_scale.y),
    ));
    let flip = Translation2::new(0.0, f64::from(cell_h))
        * nalgebra::convert::<_, nalgebra::Transform<f64, TAffine, 2>>(Scale2::new(1.0, -1.0));

    // Applied right to left: font scale, translate, sdf scale, flip.
    nalgebra::convert(flip * scale_sdf * translate * scale_font)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    #[test]
    fn transform_maps_shape_units_into_the_cell() {
        let params = CellParams {
            cell: (0, 0, 136, 136),
            translate: Vec2::new(2.0, 6.5),
            sdf_scale: Vec2::new(2.0, 2.0),
            shape_scale: 32.0 / 2048.0,
            range: 8.0,
            sin_alpha: 3.0f64.sin(),
        };
        let m = cell_transform(&params);

        // Font-unit origin lands at the padded cell corner, y flipped.
        let p = m.transform_point(&Point2::new(0.0, 0.0));
        assert!((p.x - 4.0).abs() < 1e-9);
        assert!((p.y - (136.0 - 13.0)).abs() < 1e-9);

        // A point one em up maps 64 shape units higher in the cell.
        let p = m.transform_point(&Point2::new(0.0, 2048.0));
        assert!((p.x - 4.0).abs() < 1e-9);
        assert!((p.y - (136.0 - 13.0 - 64.0)).abs() < 1e-9);
    }
}

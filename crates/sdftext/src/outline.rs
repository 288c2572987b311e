//! Glyph outline extraction and winding classification.
//!
//! Outlines are recorded as line/quadratic/cubic segments in shape units
//! (pixels at [`NOMINAL_SIZE`](crate::font::NOMINAL_SIZE), y-up). The packer
//! uses them for bounds and the inversion decision; distance-field rendering
//! reads the face directly.

use ttf_parser::{Face, GlyphId, OutlineBuilder};

use crate::font::NOMINAL_SIZE;
use crate::geom::Vec2;
use crate::{Result, TextError};

/// Contour direction convention of a face's outlines.
///
/// TrueType-flavored fonts wind outer contours counter-clockwise, CFF
/// (PostScript) outlines wind them clockwise, which flips the sign of the
/// generated distance field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Winding {
    Clockwise,
    CounterClockwise,
}

/// Classify a font's outline winding from its raw bytes.
///
/// Faces carrying CFF outlines start with the `OTTO` sfnt tag; everything
/// else (TrueType, collections) is treated as counter-clockwise.
pub fn detect_winding(font_data: &[u8]) -> Winding {
    if font_data.len() >= 4 && &font_data[0..4] == b"OTTO" {
        Winding::Clockwise
    } else {
        Winding::CounterClockwise
    }
}

/// One outline segment. Points are in shape units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Segment {
    Line { p0: Vec2, p1: Vec2 },
    Quad { p0: Vec2, p1: Vec2, p2: Vec2 },
    Cubic { p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2 },
}

/// A closed run of consecutive segments.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Contour {
    pub segments: Vec<Segment>,
}

/// A glyph outline: zero or more closed contours.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Shape {
    pub contours: Vec<Contour>,
}

/// Shape-space extents, y-up.
///
/// Accumulation starts from the zero box, so the glyph origin is always
/// inside: `left`/`bottom` are never positive, and for glyphs living entirely
/// right of / above the origin the box spans from the origin itself. The
/// placement math relies on this.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bounds {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl Bounds {
    pub const ZERO: Bounds = Bounds {
        left: 0.0,
        bottom: 0.0,
        right: 0.0,
        top: 0.0,
    };

    fn include(&mut self, p: Vec2) {
        self.include_x(p.x);
        self.include_y(p.y);
    }

    fn include_x(&mut self, x: f32) {
        self.left = self.left.min(x);
        self.right = self.right.max(x);
    }

    fn include_y(&mut self, y: f32) {
        self.bottom = self.bottom.min(y);
        self.top = self.top.max(y);
    }

    /// Lower-left corner; non-positive by construction.
    pub fn origin_offset(&self) -> Vec2 {
        Vec2::new(self.left, self.bottom)
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.right - self.left, self.top - self.bottom)
    }
}

impl Shape {
    /// Extract a glyph outline scaled to shape units.
    ///
    /// Glyphs without an outline (space, empty `.notdef`) come back as an
    /// empty shape; only a glyph id the face does not have is an error.
    pub fn from_face(face: &Face<'_>, glyph: u32) -> Result<Shape> {
        if glyph >= u32::from(face.number_of_glyphs()) {
            return Err(TextError::GlyphOutline(glyph));
        }

        let mut builder = ShapeBuilder::new(NOMINAL_SIZE / f32::from(face.units_per_em()));
        let _ = face.outline_glyph(GlyphId(glyph as u16), &mut builder);
        builder.close();

        Ok(Shape {
            contours: builder.contours,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    /// Tight extents of all contours, unioned with the origin.
    pub fn bounds(&self) -> Bounds {
        let mut bounds = Bounds::ZERO;
        for contour in &self.contours {
            for segment in &contour.segments {
                segment.expand(&mut bounds);
            }
        }
        bounds
    }
}

impl Segment {
    fn expand(&self, bounds: &mut Bounds) {
        match *self {
            Segment::Line { p0, p1 } => {
                bounds.include(p0);
                bounds.include(p1);
            }
            Segment::Quad { p0, p1, p2 } => {
                bounds.include(p0);
                bounds.include(p2);
                if let Some(t) = quad_extremum(p0.x, p1.x, p2.x) {
                    bounds.include_x(quad_at(p0.x, p1.x, p2.x, t));
                }
                if let Some(t) = quad_extremum(p0.y, p1.y, p2.y) {
                    bounds.include_y(quad_at(p0.y, p1.y, p2.y, t));
                }
            }
            Segment::Cubic { p0, p1, p2, p3 } => {
                bounds.include(p0);
                bounds.include(p3);
                for t in cubic_extrema(p0.x, p1.x, p2.x, p3.x).into_iter().flatten() {
                    bounds.include_x(cubic_at(p0.x, p1.x, p2.x, p3.x, t));
                }
                for t in cubic_extrema(p0.y, p1.y, p2.y, p3.y).into_iter().flatten() {
                    bounds.include_y(cubic_at(p0.y, p1.y, p2.y, p3.y, t));
                }
            }
        }
    }
}

fn quad_at(a: f32, b: f32, c: f32, t: f32) -> f32 {
    let u = 1.0 - t;
    u * u * a + 2.0 * u * t * b + t * t * c
}

fn cubic_at(a: f32, b: f32, c: f32, d: f32, t: f32) -> f32 {
    let u = 1.0 - t;
    u * u * u * a + 3.0 * u * u * t * b + 3.0 * u * t * t * c + t * t * t * d
}

/// Interior parameter where a quadratic's derivative vanishes on one axis.
fn quad_extremum(a: f32, b: f32, c: f32) -> Option<f32> {
    let denom = a - 2.0 * b + c;
    if denom == 0.0 {
        return None;
    }
    let t = (a - b) / denom;
    (t > 0.0 && t < 1.0).then_some(t)
}

/// Interior parameters where a cubic's derivative vanishes on one axis.
fn cubic_extrema(a: f32, b: f32, c: f32, d: f32) -> [Option<f32>; 2] {
    let in_range = |t: f32| (t > 0.0 && t < 1.0).then_some(t);

    // Derivative is the quadratic qa*t^2 + qb*t + qc (up to a factor of 3).
    let qa = -a + 3.0 * b - 3.0 * c + d;
    let qb = 2.0 * (a - 2.0 * b + c);
    let qc = b - a;

    if qa == 0.0 {
        if qb == 0.0 {
            return [None, None];
        }
        return [in_range(-qc / qb), None];
    }

    let disc = qb * qb - 4.0 * qa * qc;
    if disc < 0.0 {
        return [None, None];
    }
    let root = disc.sqrt();
    [
        in_range((-qb + root) / (2.0 * qa)),
        in_range((-qb - root) / (2.0 * qa)),
    ]
}

struct ShapeBuilder {
    scale: f32,
    contours: Vec<Contour>,
    segments: Vec<Segment>,
    start: Vec2,
    cursor: Vec2,
}

impl ShapeBuilder {
    fn new(scale: f32) -> Self {
        Self {
            scale,
            contours: Vec::new(),
            segments: Vec::new(),
            start: Vec2::ZERO,
            cursor: Vec2::ZERO,
        }
    }

    fn point(&self, x: f32, y: f32) -> Vec2 {
        Vec2::new(x * self.scale, y * self.scale)
    }
}

impl OutlineBuilder for ShapeBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        // A move with a contour still open closes it first.
        self.close();
        let p = self.point(x, y);
        self.start = p;
        self.cursor = p;
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let p = self.point(x, y);
        if p != self.cursor {
            self.segments.push(Segment::Line {
                p0: self.cursor,
                p1: p,
            });
        }
        self.cursor = p;
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let ctrl = self.point(x1, y1);
        let p = self.point(x, y);
        self.segments.push(Segment::Quad {
            p0: self.cursor,
            p1: ctrl,
            p2: p,
        });
        self.cursor = p;
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let ctrl1 = self.point(x1, y1);
        let ctrl2 = self.point(x2, y2);
        let p = self.point(x, y);
        self.segments.push(Segment::Cubic {
            p0: self.cursor,
            p1: ctrl1,
            p2: ctrl2,
            p3: p,
        });
        self.cursor = p;
    }

    fn close(&mut self) {
        if !self.segments.is_empty() {
            if self.cursor != self.start {
                self.segments.push(Segment::Line {
                    p0: self.cursor,
                    p1: self.start,
                });
            }
            self.contours.push(Contour {
                segments: std::mem::take(&mut self.segments),
            });
        }
        self.cursor = self.start;
    }
}

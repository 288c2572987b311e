//! Binary atlas cache
//!
//! Little-endian layout, sections guarded by four-byte tags:
//!
//! ```text
//! "SDFT" version:u32
//! name_len:u32 name:utf8
//! size leading height ascent descent           (f32 each)
//! "CHGL" count:u32 { char:u32 glyph:u32 }*
//! "GLMT" count:u32 { glyph:u32 advance:2xf32 min:2xf32 max:2xf32 }*
//! "TXAT" sdf_scale:2xf32 sdf_padding:2xf32 bitmap:2xf32
//!        max_glyph_size:2xf32 max_ascent:f32 max_descent:f32
//!        glyph_count:u32 { glyph:u32 tex:u32 coords:4xf32 origin:2xf32 size:2xf32 }*
//!        page_count:u32 { "PNGF" len:u32 png_bytes }*
//! ```
//!
//! Maps are written in sorted key order so saving the same atlas twice
//! produces identical bytes. Loading with a requested size rescales the
//! per-glyph metrics only; pages, glyph cells and the nominal-size font
//! metrics are size-independent.

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;
use std::sync::Arc;

use image::ImageFormat;
use rustc_hash::FxHashMap;

use crate::atlas::{Format, GlyphInfo, TextureAtlas};
use crate::font::{Font, GlyphMetrics};
use crate::geom::{Rect, Vec2};
use crate::text::SdfText;
use crate::{Result, TextError};

const MAGIC: &[u8; 4] = b"SDFT";
const CACHE_VERSION: u32 = 1;

/// Serialize `text` (font metrics, glyph maps, atlas pages) into `writer`.
pub fn save<W: Write>(writer: &mut W, text: &SdfText) -> Result<()> {
    let font = text.font();
    let atlas = text.atlas();

    writer.write_all(MAGIC)?;
    write_u32(writer, CACHE_VERSION)?;

    let name = font.name().as_bytes();
    write_u32(writer, name.len() as u32)?;
    writer.write_all(name)?;

    write_f32(writer, font.size())?;
    write_f32(writer, font.leading())?;
    write_f32(writer, font.height())?;
    write_f32(writer, font.ascent())?;
    write_f32(writer, font.descent())?;

    writer.write_all(b"CHGL")?;
    let mut chars: Vec<(char, u32)> = text
        .char_to_glyph()
        .iter()
        .map(|(&ch, &glyph)| (ch, glyph))
        .collect();
    chars.sort_by_key(|&(ch, _)| ch);
    write_u32(writer, chars.len() as u32)?;
    for (ch, glyph) in chars {
        write_u32(writer, ch as u32)?;
        write_u32(writer, glyph)?;
    }

    writer.write_all(b"GLMT")?;
    let mut metrics: Vec<(u32, GlyphMetrics)> = text
        .glyph_metrics()
        .iter()
        .map(|(&glyph, &m)| (glyph, m))
        .collect();
    metrics.sort_by_key(|&(glyph, _)| glyph);
    write_u32(writer, metrics.len() as u32)?;
    for (glyph, m) in metrics {
        write_u32(writer, glyph)?;
        write_f32(writer, m.advance.x)?;
        write_f32(writer, m.advance.y)?;
        write_f32(writer, m.min.x)?;
        write_f32(writer, m.min.y)?;
        write_f32(writer, m.max.x)?;
        write_f32(writer, m.max.y)?;
    }

    writer.write_all(b"TXAT")?;
    write_f32(writer, atlas.sdf_scale().x)?;
    write_f32(writer, atlas.sdf_scale().y)?;
    write_f32(writer, atlas.sdf_padding().x)?;
    write_f32(writer, atlas.sdf_padding().y)?;
    write_f32(writer, atlas.bitmap_size().0 as f32)?;
    write_f32(writer, atlas.bitmap_size().1 as f32)?;
    write_f32(writer, atlas.max_glyph_size().x)?;
    write_f32(writer, atlas.max_glyph_size().y)?;
    write_f32(writer, atlas.max_ascent())?;
    write_f32(writer, atlas.max_descent())?;

    let mut infos: Vec<(u32, GlyphInfo)> = atlas
        .glyphs()
        .iter()
        .map(|(&glyph, &info)| (glyph, info))
        .collect();
    infos.sort_by_key(|&(glyph, _)| glyph);
    write_u32(writer, infos.len() as u32)?;
    for (glyph, info) in infos {
        write_u32(writer, glyph)?;
        write_u32(writer, info.texture_index)?;
        write_f32(writer, info.tex_coords.x1)?;
        write_f32(writer, info.tex_coords.y1)?;
        write_f32(writer, info.tex_coords.x2)?;
        write_f32(writer, info.tex_coords.y2)?;
        write_f32(writer, info.origin_offset.x)?;
        write_f32(writer, info.origin_offset.y)?;
        write_f32(writer, info.size.x)?;
        write_f32(writer, info.size.y)?;
    }

    write_u32(writer, atlas.pages().len() as u32)?;
    for page in atlas.pages() {
        let mut png = Vec::new();
        page.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        writer.write_all(b"PNGF")?;
        write_u32(writer, png.len() as u32)?;
        writer.write_all(&png)?;
    }

    Ok(())
}

/// Deserialize a cache, optionally rescaling its glyph metrics to `size`.
pub fn load<R: Read>(reader: &mut R, size: Option<f32>) -> Result<SdfText> {
    expect_tag(reader, MAGIC, "file header")?;
    let version = read_u32(reader)?;
    if version != CACHE_VERSION {
        return Err(TextError::MalformedCache(format!(
            "unsupported cache version {version}"
        )));
    }

    let name_len = read_u32(reader)? as usize;
    let mut name_buf = vec![0u8; name_len];
    reader.read_exact(&mut name_buf)?;
    let name = String::from_utf8(name_buf)
        .map_err(|_| TextError::MalformedCache("font name is not valid UTF-8".to_string()))?;

    let stored_size = read_f32(reader)?;
    let leading = read_f32(reader)?;
    let height = read_f32(reader)?;
    let ascent = read_f32(reader)?;
    let descent = read_f32(reader)?;

    let mut font_size = stored_size;
    let mut metric_scale = 1.0f32;
    if let Some(requested) = size {
        if requested <= 0.0 {
            return Err(TextError::UnsupportedRescale(requested));
        }
        if stored_size <= 0.0 {
            return Err(TextError::MalformedCache(format!(
                "stored font size {stored_size} is not positive"
            )));
        }
        metric_scale = requested / stored_size;
        font_size = requested;
    }
    let font = Font::from_cached(name, font_size, height, leading, ascent, descent);

    expect_tag(reader, b"CHGL", "char/glyph map")?;
    let char_count = read_u32(reader)?;
    let mut char_to_glyph = FxHashMap::default();
    let mut glyph_to_char = FxHashMap::default();
    for _ in 0..char_count {
        let code = read_u32(reader)?;
        let glyph = read_u32(reader)?;
        let ch = char::from_u32(code).ok_or_else(|| {
            TextError::MalformedCache(format!("invalid character codepoint {code:#x}"))
        })?;
        char_to_glyph.insert(ch, glyph);
        glyph_to_char.insert(glyph, ch);
    }

    expect_tag(reader, b"GLMT", "glyph metrics")?;
    let metric_count = read_u32(reader)?;
    let mut glyph_metrics = FxHashMap::default();
    for _ in 0..metric_count {
        let glyph = read_u32(reader)?;
        let metrics = GlyphMetrics {
            advance: read_vec2(reader)?,
            min: read_vec2(reader)?,
            max: read_vec2(reader)?,
        };
        glyph_metrics.insert(glyph, metrics.rescaled(metric_scale));
    }

    expect_tag(reader, b"TXAT", "texture atlas")?;
    let sdf_scale = read_vec2(reader)?;
    let sdf_padding = read_vec2(reader)?;
    let bitmap_size = (read_f32(reader)? as u32, read_f32(reader)? as u32);
    let max_glyph_size = read_vec2(reader)?;
    let max_ascent = read_f32(reader)?;
    let max_descent = read_f32(reader)?;

    let info_count = read_u32(reader)?;
    let mut glyph_infos = FxHashMap::default();
    for _ in 0..info_count {
        let glyph = read_u32(reader)?;
        let texture_index = read_u32(reader)?;
        let tex_coords = Rect::new(
            read_f32(reader)?,
            read_f32(reader)?,
            read_f32(reader)?,
            read_f32(reader)?,
        );
        let origin_offset = read_vec2(reader)?;
        let size = read_vec2(reader)?;
        glyph_infos.insert(
            glyph,
            GlyphInfo {
                texture_index,
                tex_coords,
                origin_offset,
                size,
            },
        );
    }

    let page_count = read_u32(reader)?;
    let mut pages = Vec::with_capacity(page_count as usize);
    for _ in 0..page_count {
        expect_tag(reader, b"PNGF", "page image")?;
        let png_len = read_u32(reader)? as usize;
        let mut png = vec![0u8; png_len];
        reader.read_exact(&mut png)?;
        let image = image::load_from_memory_with_format(&png, ImageFormat::Png)?;
        pages.push(image.to_rgb8());
    }

    let atlas = TextureAtlas::from_parts(
        glyph_infos,
        pages,
        sdf_scale,
        sdf_padding,
        bitmap_size,
        max_glyph_size,
        max_ascent,
        max_descent,
    );

    Ok(SdfText::from_parts(
        font,
        Format::default(),
        Arc::new(atlas),
        char_to_glyph,
        glyph_to_char,
        glyph_metrics,
    ))
}

/// Write a cache file, creating or truncating `path`.
pub fn save_to_path(path: impl AsRef<Path>, text: &SdfText) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    save(&mut writer, text)
}

/// Read a cache file, optionally rescaling to `size`.
pub fn load_from_path(path: impl AsRef<Path>, size: Option<f32>) -> Result<SdfText> {
    let mut reader = BufReader::new(File::open(path)?);
    load(&mut reader, size)
}

fn write_u32<W: Write>(writer: &mut W, value: u32) -> Result<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_f32<W: Write>(writer: &mut W, value: f32) -> Result<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_f32<R: Read>(reader: &mut R) -> Result<f32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn read_vec2<R: Read>(reader: &mut R) -> Result<Vec2> {
    Ok(Vec2::new(read_f32(reader)?, read_f32(reader)?))
}

fn expect_tag<R: Read>(reader: &mut R, tag: &[u8; 4], what: &str) -> Result<()> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    if &buf != tag {
        return Err(TextError::MalformedCache(format!(
            "expected {what} tag {:?}, found {:?}",
            String::from_utf8_lossy(tag),
            String::from_utf8_lossy(&buf)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn sample_text() -> SdfText {
        let font = Font::from_cached("Sample Sans".into(), 32.0, 38.0, 0.5, 26.0, 6.0);

        let mut char_to_glyph = FxHashMap::default();
        let mut glyph_to_char = FxHashMap::default();
        for (ch, glyph) in [('A', 4u32), (' ', 1u32), ('\u{e9}', 9u32)] {
            char_to_glyph.insert(ch, glyph);
            glyph_to_char.insert(glyph, ch);
        }

        let mut glyph_metrics = FxHashMap::default();
        glyph_metrics.insert(
            4,
            GlyphMetrics {
                advance: Vec2::new(18.0, 32.0),
                min: Vec2::new(1.0, 0.0),
                max: Vec2::new(17.0, 22.0),
            },
        );
        glyph_metrics.insert(
            1,
            GlyphMetrics {
                advance: Vec2::new(8.0, 32.0),
                min: Vec2::ZERO,
                max: Vec2::ZERO,
            },
        );
        glyph_metrics.insert(
            9,
            GlyphMetrics {
                advance: Vec2::new(18.0, 32.0),
                min: Vec2::new(1.0, 0.0),
                max: Vec2::new(17.0, 28.0),
            },
        );

        let mut glyph_infos = FxHashMap::default();
        glyph_infos.insert(
            4,
            GlyphInfo {
                texture_index: 0,
                tex_coords: Rect::new(0.0, 0.0, 16.0, 16.0),
                origin_offset: Vec2::new(0.5, -1.5),
                size: Vec2::new(11.0, 12.0),
            },
        );
        glyph_infos.insert(
            1,
            GlyphInfo {
                texture_index: 0,
                tex_coords: Rect::new(17.0, 0.0, 33.0, 16.0),
                origin_offset: Vec2::ZERO,
                size: Vec2::ZERO,
            },
        );
        glyph_infos.insert(
            9,
            GlyphInfo {
                texture_index: 0,
                tex_coords: Rect::new(0.0, 17.0, 16.0, 33.0),
                origin_offset: Vec2::new(0.5, -1.5),
                size: Vec2::new(11.0, 14.0),
            },
        );

        let mut page = RgbImage::new(64, 64);
        page.put_pixel(3, 5, Rgb([120, 30, 200]));
        page.put_pixel(60, 60, Rgb([1, 2, 3]));

        let atlas = TextureAtlas::from_parts(
            glyph_infos,
            vec![page],
            Vec2::splat(2.0),
            Vec2::splat(2.0),
            (16, 16),
            Vec2::new(11.0, 14.0),
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

    fn save_to_vec(text: &SdfText) -> Vec<u8> {
        let mut bytes = Vec::new();
        save(&mut bytes, text).unwrap();
        bytes
    }

    #[test]
    fn round_trip_preserves_everything() {
        let original = sample_text();
        let bytes = save_to_vec(&original);
        let loaded = load(&mut bytes.as_slice(), None).unwrap();

        let font = loaded.font();
        assert_eq!(font.name(), "Sample Sans");
        assert_eq!(font.size(), 32.0);
        assert_eq!(font.leading(), 0.5);
        assert_eq!(font.height(), 38.0);
        assert_eq!(font.ascent(), 26.0);
        assert_eq!(font.descent(), 6.0);
        assert!(!font.has_face());

        assert_eq!(loaded.char_to_glyph(), original.char_to_glyph());
        assert_eq!(loaded.glyph_metrics(), original.glyph_metrics());

        let atlas = loaded.atlas();
        let source = original.atlas();
        assert_eq!(atlas.glyphs(), source.glyphs());
        assert_eq!(atlas.sdf_scale(), source.sdf_scale());
        assert_eq!(atlas.sdf_padding(), source.sdf_padding());
        assert_eq!(atlas.bitmap_size(), source.bitmap_size());
        assert_eq!(atlas.max_glyph_size(), source.max_glyph_size());
        assert_eq!(atlas.max_ascent(), source.max_ascent());
        assert_eq!(atlas.max_descent(), source.max_descent());
        assert_eq!(atlas.pages().len(), 1);
        assert_eq!(atlas.pages()[0].as_raw(), source.pages()[0].as_raw());
    }

    #[test]
    fn saving_twice_is_byte_stable() {
        let text = sample_text();
        assert_eq!(save_to_vec(&text), save_to_vec(&text));
    }

    #[test]
    fn rescale_multiplies_glyph_metrics_only() {
        let original = sample_text();
        let bytes = save_to_vec(&original);
        let loaded = load(&mut bytes.as_slice(), Some(64.0)).unwrap();

        assert_eq!(loaded.font().size(), 64.0);
        // Nominal-size font metrics stay put.
        assert_eq!(loaded.font().ascent(), 26.0);
        assert_eq!(loaded.font().descent(), 6.0);

        for (glyph, m) in original.glyph_metrics() {
            let scaled = &loaded.glyph_metrics()[glyph];
            assert_eq!(scaled.advance, m.advance * 2.0);
            assert_eq!(scaled.min, m.min * 2.0);
            assert_eq!(scaled.max, m.max * 2.0);
        }
        // Atlas cells are size-independent.
        assert_eq!(loaded.atlas().glyphs(), original.atlas().glyphs());
    }

    #[test]
    fn rescale_to_stored_size_is_identity() {
        let original = sample_text();
        let bytes = save_to_vec(&original);
        let loaded = load(&mut bytes.as_slice(), Some(32.0)).unwrap();
        assert_eq!(loaded.glyph_metrics(), original.glyph_metrics());
        assert_eq!(loaded.font().size(), 32.0);
    }

    #[test]
    fn non_positive_rescale_is_rejected() {
        let bytes = save_to_vec(&sample_text());
        let err = load(&mut bytes.as_slice(), Some(0.0)).unwrap_err();
        assert!(matches!(err, TextError::UnsupportedRescale(_)));
        let err = load(&mut bytes.as_slice(), Some(-4.0)).unwrap_err();
        assert!(matches!(err, TextError::UnsupportedRescale(_)));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut bytes = save_to_vec(&sample_text());
        bytes[0] = b'X';
        let err = load(&mut bytes.as_slice(), None).unwrap_err();
        assert!(matches!(err, TextError::MalformedCache(_)));
    }

    #[test]
    fn corrupt_section_tag_is_rejected() {
        let mut bytes = save_to_vec(&sample_text());
        let pos = bytes
            .windows(4)
            .position(|w| w == b"GLMT")
            .expect("metrics tag present");
        bytes[pos] = b'g';
        let err = load(&mut bytes.as_slice(), None).unwrap_err();
        assert!(matches!(err, TextError::MalformedCache(_)));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut bytes = save_to_vec(&sample_text());
        bytes[4] = 0xff;
        let err = load(&mut bytes.as_slice(), None).unwrap_err();
        assert!(matches!(err, TextError::MalformedCache(_)));
    }
}

//! sdftext cache tool
//!
//! Two subcommands:
//! - `sdftext build`: generate a distance-field atlas for a font and write
//!   it as a cache file
//! - `sdftext inspect`: print the header, metrics and atlas stats of an
//!   existing cache file

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sdftext::{AtlasCache, Font, FontRegistry, Format, SdfText, Vec2, DEFAULT_CHARS};

/// Build and inspect SDF text atlas caches
#[derive(Parser, Debug)]
#[command(name = "sdftext")]
#[command(about = "Build and inspect SDF text atlas caches")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate an atlas and write it to a cache file
    Build {
        /// Font file path, or a family name resolved from system fonts
        #[arg(short, long)]
        font: String,

        /// Point size glyph metrics are generated at
        #[arg(short, long, default_value = "32")]
        size: f32,

        /// Characters to include (defaults to the built-in set)
        #[arg(short, long)]
        chars: Option<String>,

        /// Output cache file
        #[arg(short, long)]
        out: PathBuf,

        /// Atlas page width and height in pixels
        #[arg(long, default_value = "1024")]
        texture_size: u32,

        /// Distance-field supersampling scale
        #[arg(long, default_value = "2")]
        sdf_scale: f32,

        /// Padding around each glyph in shape units
        #[arg(long, default_value = "2")]
        sdf_padding: f32,
    },

    /// Print the contents of a cache file
    Inspect {
        /// Cache file to read
        file: PathBuf,

        /// Rescale glyph metrics to this size before printing
        #[arg(short, long)]
        size: Option<f32>,

        /// Also list every character with its glyph id and advance
        #[arg(long)]
        glyphs: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Command::Build {
            font,
            size,
            chars,
            out,
            texture_size,
            sdf_scale,
            sdf_padding,
        } => build(
            &font,
            size,
            chars.as_deref(),
            &out,
            texture_size,
            sdf_scale,
            sdf_padding,
        ),
        Command::Inspect { file, size, glyphs } => inspect(&file, size, glyphs),
    }
}

fn build(
    font_arg: &str,
    size: f32,
    chars: Option<&str>,
    out: &Path,
    texture_size: u32,
    sdf_scale: f32,
    sdf_padding: f32,
) -> Result<()> {
    let font_path = Path::new(font_arg);
    let font = if font_path.exists() {
        Font::from_file(font_path, size)
            .with_context(|| format!("Failed to load font file {}", font_path.display()))?
    } else {
        let registry = FontRegistry::with_system_fonts();
        registry
            .load_font(font_arg, size)
            .with_context(|| format!("Failed to resolve font '{font_arg}'"))?
    };
    tracing::info!("using face '{}'", font.name());

    let format = Format::default()
        .with_texture_size(texture_size, texture_size)
        .with_sdf_scale(Vec2::splat(sdf_scale))
        .with_sdf_padding(Vec2::splat(sdf_padding));
    let chars = chars.unwrap_or(DEFAULT_CHARS);

    let cache = AtlasCache::new();
    let text = SdfText::new(font, format, chars, &cache).context("Failed to build atlas")?;
    text.save(out)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    println!(
        "Wrote {}: '{}' at {}pt, {} glyphs in {} page(s)",
        out.display(),
        text.font().name(),
        text.font().size(),
        text.glyph_metrics().len(),
        text.atlas().texture_count()
    );
    Ok(())
}

fn inspect(file: &Path, size: Option<f32>, list_glyphs: bool) -> Result<()> {
    let text = SdfText::load(file, size)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let font = text.font();
    let atlas = text.atlas();

    println!("file:     {}", file.display());
    println!("font:     {} @ {}pt", font.name(), font.size());
    println!(
        "metrics:  height {:.2}  ascent {:.2}  descent {:.2}  leading {:.2}",
        font.height(),
        font.ascent(),
        font.descent(),
        font.leading()
    );
    println!(
        "charset:  {} characters, {} glyphs",
        text.char_to_glyph().len(),
        text.glyph_metrics().len()
    );

    let (tex_w, tex_h) = atlas.texture_size();
    let (cell_w, cell_h) = atlas.bitmap_size();
    println!(
        "atlas:    {} page(s) of {}x{}, cell {}x{}",
        atlas.texture_count(),
        tex_w,
        tex_h,
        cell_w,
        cell_h
    );
    println!(
        "sdf:      scale ({}, {})  padding ({}, {})  max glyph {:.1}x{:.1}",
        atlas.sdf_scale().x,
        atlas.sdf_scale().y,
        atlas.sdf_padding().x,
        atlas.sdf_padding().y,
        atlas.max_glyph_size().x,
        atlas.max_glyph_size().y
    );

    if list_glyphs {
        let mut chars: Vec<(char, u32)> = text
            .char_to_glyph()
            .iter()
            .map(|(&ch, &glyph)| (ch, glyph))
            .collect();
        chars.sort_by_key(|&(ch, _)| ch);

        println!();
        println!("{:<8} {:>6} {:>9} {:>5}", "char", "glyph", "advance", "page");
        for (ch, glyph) in chars {
            let advance = text
                .glyph_metrics()
                .get(&glyph)
                .map_or(0.0, |m| m.advance.x);
            let page = atlas
                .glyph_info(glyph)
                .map_or("-".to_string(), |info| info.texture_index.to_string());
            println!("{:<8} {:>6} {:>9.2} {:>5}", char_label(ch), glyph, advance, page);
        }
    }

    Ok(())
}

fn char_label(ch: char) -> String {
    if ch == ' ' {
        "space".to_string()
    } else if ch.is_control() {
        format!("U+{:04X}", ch as u32)
    } else {
        ch.to_string()
    }
}

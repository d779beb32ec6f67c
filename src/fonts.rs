//! Font resolution and text measurement.
//!
//! Templates embed their fonts as `@font-face` rules inside a `<style>` element, usually with a
//! base64 data URL in the `src` declaration. This module locates the rule matching a text
//! element's `font-family`, loads the referenced resource into a measuring handle, and memoizes
//! the handle per family for the lifetime of the owning engine.
//!
//! Measurement follows a fixed convention: glyphs are generated from origin (0, 0) with a
//! center-top anchor and kerning enabled. Letter spacing is normalized from the absolute pixel
//! value stored in SVG attributes (calibrated against a 50 px reference size) into the
//! em-relative fraction the measuring backend expects, so spacing scales proportionally with
//! font size.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::rc::Rc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::dom::Document;
use crate::error::{Context as _, Error, ErrorKind};
use crate::Px;

/// The reference font size that letter-spacing attribute values are calibrated against.
pub const DEFAULT_FONT_SIZE: f64 = 50.0;

/// Aggregate metrics for a rendered text string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    /// Total advance width, including kerning and letter spacing.
    pub width: Px,
    /// Line height (ascent minus descent).
    pub height: Px,
    /// Ascender height above the baseline (positive).
    pub ascent: Px,
    /// Descender depth below the baseline (negative or zero).
    pub descent: Px,
}

/// Options for a measurement pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsOptions {
    /// Font size in user units.
    pub font_size: f64,
    /// Letter spacing as a fraction of the em size.
    pub letter_spacing: f64,
}

impl MetricsOptions {
    /// Builds options from raw SVG attribute values.
    ///
    /// `letter_spacing_px` is the absolute pixel spacing stored in the template, calibrated
    /// against [`DEFAULT_FONT_SIZE`]; it is rescaled by `font_size / DEFAULT_FONT_SIZE` and
    /// normalized to an em fraction.
    pub fn for_attrs(font_size: f64, letter_spacing_px: f64) -> MetricsOptions {
        let scale = font_size / DEFAULT_FONT_SIZE;
        MetricsOptions {
            font_size,
            letter_spacing: (1.0 / font_size) * (letter_spacing_px * scale),
        }
    }
}

/// A loaded font capable of measuring text.
///
/// The engine only ever consumes widths and heights, so backends are free to approximate as
/// long as results are deterministic for a given input.
pub trait FontMetrics: fmt::Debug {
    /// Measures the given text, or `None` if this backend cannot resolve the string.
    fn measure(&self, text: &str, options: &MetricsOptions) -> Option<TextMetrics>;
}

/// Loads font resources referenced from `@font-face` rules.
///
/// Implementations resolve a `src` locator (data URL, file path, ...) into a measuring handle.
/// Network access is intentionally left to callers; the [`DefaultFontLoader`] understands
/// base64 data URLs and filesystem paths only.
pub trait FontLoader {
    /// Loads the resource behind `source` into a measuring handle.
    fn load(&self, source: &str) -> Result<Rc<dyn FontMetrics>, Error>;
}

/// A font backed by an in-memory TrueType/OpenType face.
#[derive(Clone)]
pub struct FontData {
    font: rusttype::Font<'static>,
}

impl FontData {
    /// Creates a font from the raw bytes of a TrueType or OpenType file.
    pub fn new(data: Vec<u8>) -> Result<FontData, Error> {
        let font = rusttype::Font::try_from_vec(data).ok_or_else(|| {
            Error::new(
                "font data is not a supported TrueType/OpenType face",
                ErrorKind::FontLoadFailed,
            )
        })?;
        Ok(FontData { font })
    }
}

impl fmt::Debug for FontData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontData")
            .field("glyph_count", &self.font.glyph_count())
            .finish()
    }
}

impl FontMetrics for FontData {
    fn measure(&self, text: &str, options: &MetricsOptions) -> Option<TextMetrics> {
        let scale = rusttype::Scale::uniform(options.font_size as f32);
        let v_metrics = self.font.v_metrics(scale);
        let spacing = (options.letter_spacing * options.font_size) as f32;

        let mut width = 0.0f32;
        let mut last: Option<rusttype::GlyphId> = None;
        for c in text.chars() {
            let glyph = self.font.glyph(c);
            let id = glyph.id();
            if let Some(prev) = last {
                width += self.font.pair_kerning(scale, prev, id);
            }
            width += glyph.scaled(scale).h_metrics().advance_width;
            width += spacing;
            last = Some(id);
        }

        Some(TextMetrics {
            width: Px(f64::from(width)),
            height: Px(f64::from(v_metrics.ascent - v_metrics.descent)),
            ascent: Px(f64::from(v_metrics.ascent)),
            descent: Px(f64::from(v_metrics.descent)),
        })
    }
}

/// The built-in loader: base64 data URLs and filesystem paths.
#[derive(Debug, Default)]
pub struct DefaultFontLoader;

impl FontLoader for DefaultFontLoader {
    fn load(&self, source: &str) -> Result<Rc<dyn FontMetrics>, Error> {
        let data = if let Some(rest) = source.strip_prefix("data:") {
            let payload = rest.split_once("base64,").map(|(_, p)| p).ok_or_else(|| {
                Error::new(
                    "font data URL is not base64-encoded",
                    ErrorKind::FontLoadFailed,
                )
            })?;
            BASE64_STANDARD.decode(payload.trim()).map_err(|err| {
                Error::new(
                    format!("invalid base64 font payload: {}", err),
                    ErrorKind::FontLoadFailed,
                )
            })?
        } else {
            fs::read(source).with_context(|| format!("failed to read font file {}", source))?
        };
        Ok(Rc::new(FontData::new(data)?))
    }
}

/// Per-family cache of loaded measuring handles.
///
/// Entries are populated lazily on first use and never evicted or invalidated; a font family
/// is assumed immutable for the process lifetime. Load failures are not cached, so a broken
/// `@font-face` definition fails again on the next lookup.
pub struct FontCache {
    loader: Box<dyn FontLoader>,
    fonts: HashMap<String, Rc<dyn FontMetrics>>,
}

impl fmt::Debug for FontCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontCache")
            .field("fonts", &self.fonts.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl FontCache {
    /// Creates a cache backed by the [`DefaultFontLoader`].
    pub fn new() -> FontCache {
        FontCache::with_loader(Box::new(DefaultFontLoader))
    }

    /// Creates a cache that resolves font resources through the given loader.
    pub fn with_loader(loader: Box<dyn FontLoader>) -> FontCache {
        FontCache {
            loader,
            fonts: HashMap::new(),
        }
    }

    /// Returns the measuring handle for `family`, loading it through the document's
    /// `@font-face` rules on first use.
    pub fn get_or_load(
        &mut self,
        document: &Document,
        family: &str,
    ) -> Result<Rc<dyn FontMetrics>, Error> {
        if let Some(handle) = self.fonts.get(family) {
            return Ok(Rc::clone(handle));
        }
        let src = font_face_src(document, family)?;
        let url = extract_url(&src).ok_or_else(|| {
            Error::new(
                format!("no url() in @font-face src for family {}", family),
                ErrorKind::FontUrlNotFound,
            )
        })?;
        let handle = self.loader.load(&url)?;
        debug!("loaded font metrics for family {}", family);
        self.fonts.insert(family.to_owned(), Rc::clone(&handle));
        Ok(handle)
    }
}

impl Default for FontCache {
    fn default() -> FontCache {
        FontCache::new()
    }
}

/// Finds the `src` declaration of the `@font-face` rule matching `family` in the document's
/// first `<style>` element.
fn font_face_src(document: &Document, family: &str) -> Result<String, Error> {
    let css = document
        .first_element_named("style")
        .map(|style| style.text_content())
        .unwrap_or_default();

    for block in font_face_blocks(&css) {
        let mut family_matches = false;
        let mut src = None;
        for (property, value) in declarations(block) {
            match property {
                "font-family" => family_matches = unquote(value) == family,
                "src" => src = Some(value.to_owned()),
                _ => {}
            }
        }
        if family_matches {
            return src.ok_or_else(|| {
                Error::new(
                    format!("@font-face rule for family {} has no src", family),
                    ErrorKind::FontUrlNotFound,
                )
            });
        }
    }

    Err(Error::new(
        format!("no @font-face rule for family {}", family),
        ErrorKind::FontFaceNotFound,
    ))
}

/// Yields the contents of each `@font-face { ... }` block, brace-aware.
fn font_face_blocks(css: &str) -> impl Iterator<Item = &str> + '_ {
    let mut remaining = css;
    std::iter::from_fn(move || {
        let start = remaining.find("@font-face")?;
        remaining = &remaining[start + "@font-face".len()..];
        let brace = remaining.find('{')?;
        remaining = &remaining[brace + 1..];

        let mut depth = 1usize;
        for (i, c) in remaining.char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let block = &remaining[..i];
                        remaining = &remaining[i + 1..];
                        return Some(block);
                    }
                }
                _ => {}
            }
        }
        None
    })
}

/// Splits a declaration block into trimmed `(property, value)` pairs.
fn declarations(block: &str) -> impl Iterator<Item = (&str, &str)> + '_ {
    block.split(';').filter_map(|decl| {
        let (property, value) = decl.split_once(':')?;
        Some((property.trim(), value.trim()))
    })
}

fn unquote(value: &str) -> &str {
    value
        .split(',')
        .next()
        .unwrap_or(value)
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
}

/// Pulls the locator out of a `url(...)` reference; single quotes, double quotes, or bare.
fn extract_url(src: &str) -> Option<String> {
    static URL_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#"url\(\s*(?:'([^']*)'|"([^"]*)"|([^'")][^)]*))\s*\)"#).expect("url pattern")
    });
    let captures = URL_RE.captures(src)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .or_else(|| captures.get(3))
        .map(|m| m.as_str().trim().to_owned())
}

//! Brand-name auto-fit for SVG templates.
//!
//! `brandfit` rewrites a designated text element inside an SVG template with a caller-supplied
//! brand name while preserving the design intent of the original: the replacement text stays
//! vertically centered where the designer put it, never overflows the space the widest original
//! line occupied, and keeps the template's baseline-offset convention. Font size, letter
//! spacing, and position are derived from real glyph metrics of the font embedded in the
//! template's `@font-face` rules, not from heuristics.
//!
//! Templates are registered under caller-chosen keys and mutated in place:
//!
//! ```
//! use brandfit::Engine;
//!
//! let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 400 200">
//!   <text data-role="brand-name" font-family="Sans" font-size="50" letter-spacing="2" y="100">
//!     <tspan dy="0">Acme</tspan>
//!   </text>
//! </svg>"##;
//!
//! let mut engine = Engine::new();
//! engine.init("card", svg, "brand-name")?;
//! engine.set_full_width("card")?;
//! let rendered = engine.svg_string("card")?;
//! assert!(rendered.contains(r#"width="100%""#));
//! # Ok::<(), brandfit::Error>(())
//! ```
//!
//! The target element is identified by its `data-role` marker attribute rather than by
//! position, so templates stay free to evolve structurally. For embedding several renders of
//! one template into a single containing document, [`Engine::init_unique_id`] rewrites every
//! internal id (clip paths, gradients, markers, and all references to them) to a
//! collision-free name first.

#![warn(missing_docs)]

use std::collections::HashMap;

use derive_more::{Add, AddAssign, From, Into, Mul, Sub};
use tracing::debug;

pub mod dom;
pub mod error;
pub mod fonts;
pub mod style;

mod fit;
mod uniquify;

pub use error::{Error, ErrorKind};
pub use fonts::{DefaultFontLoader, FontCache, FontData, FontLoader, FontMetrics};

use dom::{Document, Element, Node};
use fit::Fit;

/// The marker attribute that designates a template's brand-name text element.
pub const TARGET_ATTRIBUTE: &str = "data-role";

/// A length in SVG user units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, PartialOrd, Add, AddAssign, Sub, Mul, From, Into,
)]
pub struct Px(pub f64);

pub(crate) fn find_brand_text<'a>(document: &'a Document, target_id: &str) -> Option<&'a Element> {
    document.root().find(&|el: &Element| {
        el.local_name() == "text" && el.attribute(TARGET_ATTRIBUTE) == Some(target_id)
    })
}

fn find_brand_text_mut<'a>(
    document: &'a mut Document,
    target_id: &str,
) -> Option<&'a mut Element> {
    document.root_mut().find_mut(&|el: &Element| {
        el.local_name() == "text" && el.attribute(TARGET_ATTRIBUTE) == Some(target_id)
    })
}

/// The state held for one registered template.
#[derive(Debug)]
struct Registration {
    /// The live, mutable document for this key.
    document: Document,
    /// The target text element as it looked at registration time, captured from a separate
    /// parse so later mutations of `document` cannot perturb it.
    original: Option<Element>,
}

/// The template engine: a map of keyed SVG documents plus a font cache.
///
/// Every operation is scoped by a caller-chosen key. Re-initializing a key replaces its state
/// wholesale; there is no automatic expiry. The engine is single-threaded by design — font
/// handles are shared with `Rc` — and all state lives in memory for the engine's lifetime.
#[derive(Debug)]
pub struct Engine {
    registrations: HashMap<String, Registration>,
    fonts: FontCache,
}

impl Engine {
    /// Creates an engine that loads fonts with the [`DefaultFontLoader`]
    /// (base64 data URLs and filesystem paths).
    pub fn new() -> Engine {
        Engine::with_loader(Box::new(DefaultFontLoader))
    }

    /// Creates an engine with a custom font loader.
    pub fn with_loader(loader: Box<dyn FontLoader>) -> Engine {
        Engine {
            registrations: HashMap::new(),
            fonts: FontCache::with_loader(loader),
        }
    }

    /// Registers `svg` under `key` and snapshots the text element whose
    /// [`TARGET_ATTRIBUTE`] equals `target_id`.
    ///
    /// A template without a matching element registers normally; later brand-name updates for
    /// it are no-ops. Re-running `init` for an existing key replaces its prior state.
    pub fn init(&mut self, key: &str, svg: &str, target_id: &str) -> Result<&mut Engine, Error> {
        let document = Document::parse(svg)?;
        // Snapshot from an independent parse: the live tree above is mutated in place later,
        // and the snapshot must keep describing what the designer authored.
        let original_document = Document::parse(svg)?;
        let original = find_brand_text(&original_document, target_id).cloned();
        if original.is_none() {
            debug!("template {} has no text element with {}=\"{}\"", key, TARGET_ATTRIBUTE, target_id);
        }
        self.registrations
            .insert(key.to_owned(), Registration { document, original });
        Ok(self)
    }

    /// Like [`init`](#method.init), but rewrites every element id in `svg` to a fresh
    /// `{key}_{token}_{index}` name first, so multiple renders of the same template can
    /// coexist in one containing document.
    ///
    /// The rewrite is a case-insensitive textual substitution over the whole string — that is
    /// what lets it catch reference forms (`url(#...)`, `href`, style blocks) no tree API
    /// enumerates. An id value that also occurs as visible text content is rewritten there
    /// too; keep template ids unique tokens that cannot collide with prose.
    pub fn init_unique_id(
        &mut self,
        key: &str,
        svg: &str,
        target_id: &str,
    ) -> Result<&mut Engine, Error> {
        let unique = uniquify::substitute_ids(svg, key)?;
        self.init(key, &unique, target_id)
    }

    /// Replaces the target text's content with `brand_name`, auto-fitting font size, letter
    /// spacing, vertical position, and baseline offset to the original design.
    ///
    /// Recoverable conditions — no matching target element, no canvas size, missing font
    /// styling, unresolvable metrics — leave the document unchanged and return `Ok`; inspect
    /// the serialized output if a no-op must be detected. Hard failures are an unregistered
    /// `key` ([`ErrorKind::DocumentNotFound`]), a target element without a line span
    /// ([`ErrorKind::FirstNodeNotFound`]), and font resolution errors
    /// ([`ErrorKind::FontFaceNotFound`], [`ErrorKind::FontUrlNotFound`],
    /// [`ErrorKind::FontLoadFailed`]).
    ///
    /// All attribute and child writes happen after every fallible step has succeeded, so the
    /// document never observes a partially applied update.
    pub fn update_brand_name(
        &mut self,
        key: &str,
        target_id: &str,
        brand_name: &str,
    ) -> Result<&mut Engine, Error> {
        let registration = self.registrations.get(key).ok_or_else(|| not_found(key))?;
        let Some(target) = find_brand_text(&registration.document, target_id) else {
            debug!("no live target {}=\"{}\" for key {}", TARGET_ATTRIBUTE, target_id, key);
            return Ok(self);
        };
        if target.first_child_element().is_none() {
            return Err(Error::new(
                format!("target text element for key {} has no line span", key),
                ErrorKind::FirstNodeNotFound,
            ));
        }

        let fit = fit::compute(
            &registration.document,
            registration.original.as_ref(),
            target_id,
            brand_name,
            &mut self.fonts,
        )?;
        let update = match fit {
            Fit::Applied(update) => update,
            Fit::Skipped(reason) => {
                debug!("brand-name update skipped for key {}: {:?}", key, reason);
                return Ok(self);
            }
        };

        // The synchronous tail: everything fallible is done, now write all five pieces at once.
        let registration = self
            .registrations
            .get_mut(key)
            .ok_or_else(|| not_found(key))?;
        let Some(target) = find_brand_text_mut(&mut registration.document, target_id) else {
            return Ok(self);
        };
        let mut line = match target.first_child_element() {
            Some(first) => first.clone(),
            None => {
                return Err(Error::new(
                    format!("target text element for key {} has no line span", key),
                    ErrorKind::FirstNodeNotFound,
                ))
            }
        };
        line.set_text(brand_name);
        line.set_attribute("dy", fmt_number(update.dy));
        line.set_attribute("font-size", fmt_number(update.font_size));
        line.set_attribute("letter-spacing", fmt_number(update.letter_spacing));
        target.set_attribute("y", fmt_number(update.y));
        target.children = vec![Node::Element(line)];
        Ok(self)
    }

    /// Returns the live parsed document for `key`.
    pub fn document(&self, key: &str) -> Result<&Document, Error> {
        self.registrations
            .get(key)
            .map(|registration| &registration.document)
            .ok_or_else(|| not_found(key))
    }

    /// Serializes the current document for `key` back to an SVG string.
    ///
    /// Serialization is deterministic: without an intervening mutation, repeated calls return
    /// byte-identical output.
    pub fn svg_string(&self, key: &str) -> Result<String, Error> {
        self.document(key)?.to_xml()
    }

    /// Sets the root element's `width` and `height` to `"100%"` so the SVG fills its
    /// containing viewport.
    pub fn set_full_width(&mut self, key: &str) -> Result<&mut Engine, Error> {
        let registration = self
            .registrations
            .get_mut(key)
            .ok_or_else(|| not_found(key))?;
        let root = registration.document.root_mut();
        root.set_attribute("width", "100%");
        root.set_attribute("height", "100%");
        Ok(self)
    }
}

impl Default for Engine {
    fn default() -> Engine {
        Engine::new()
    }
}

fn not_found(key: &str) -> Error {
    Error::new(
        format!("no template registered under key {}", key),
        ErrorKind::DocumentNotFound,
    )
}

/// Formats a computed value the way it is written into an attribute.
fn fmt_number(value: f64) -> String {
    format!("{}", value)
}

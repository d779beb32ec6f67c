//! Extraction of design-time text styling and geometry from SVG attributes.

use crate::dom::Element;
use crate::error::{Error, ErrorKind};
use crate::Px;

/// Font styling attributes a template's text element must carry to participate in auto-fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FontStyles {
    /// The `font-family` attribute value.
    pub font_family: String,
    /// The `font-size` attribute in user units.
    pub font_size: f64,
    /// The `letter-spacing` attribute in user units.
    pub letter_spacing: f64,
}

/// The drawable canvas size, taken from the root element's `viewBox`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    /// Canvas width in user units.
    pub width: Px,
    /// Canvas height in user units.
    pub height: Px,
}

/// Reads the required `font-family`, `font-size`, and `letter-spacing` attributes.
///
/// These are design-time attributes, not optional styling: a missing one is a
/// [`MissingAttribute`](crate::ErrorKind::MissingAttribute) error, a non-numeric size or
/// spacing an [`InvalidAttribute`](crate::ErrorKind::InvalidAttribute) error.
pub fn font_styles(element: &Element) -> Result<FontStyles, Error> {
    let font_family = required(element, "font-family")?.to_owned();
    let font_size = parse_number(required(element, "font-size")?, "font-size")?;
    let letter_spacing = parse_number(required(element, "letter-spacing")?, "letter-spacing")?;
    Ok(FontStyles {
        font_family,
        font_size,
        letter_spacing,
    })
}

/// Returns the element's `y` position, or `None` if it is absent or not numeric.
///
/// Position may legitimately be unset before a first layout pass, so this is not an error.
pub fn y_position(element: &Element) -> Option<Px> {
    element
        .attribute("y")?
        .trim()
        .parse::<f64>()
        .ok()
        .map(Px)
}

/// Parses the canvas size out of a root element's `viewBox` attribute
/// (`"minX minY width height"`, whitespace-separated).
///
/// Returns `None` when the attribute is absent or malformed; callers treat size as optional.
pub fn canvas_size(root: &Element) -> Option<CanvasSize> {
    let view_box = root.attribute("viewBox")?;
    let parts: Vec<f64> = view_box
        .split_whitespace()
        .filter_map(|part| part.parse().ok())
        .collect();
    if parts.len() == 4 {
        Some(CanvasSize {
            width: Px(parts[2]),
            height: Px(parts[3]),
        })
    } else {
        None
    }
}

/// Parses the leading numeric prefix of an attribute value, e.g. `"12.5em"` to `12.5`.
pub(crate) fn leading_number(value: &str) -> Option<f64> {
    let value = value.trim();
    let mut end = 0;
    for (i, c) in value.char_indices() {
        if c.is_ascii_digit() || c == '.' || ((c == '+' || c == '-') && i == 0) {
            end = i + c.len_utf8();
        } else {
            break;
        }
    }
    value[..end].parse().ok()
}

fn required<'a>(element: &'a Element, name: &'static str) -> Result<&'a str, Error> {
    element.attribute(name).ok_or_else(|| {
        Error::new(
            format!("text element has no {} attribute", name),
            ErrorKind::MissingAttribute(name),
        )
    })
}

fn parse_number(value: &str, name: &'static str) -> Result<f64, Error> {
    value.trim().parse().map_err(|_| {
        Error::new(
            format!("{} attribute is not a number: {}", name, value),
            ErrorKind::InvalidAttribute(name),
        )
    })
}

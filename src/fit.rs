//! The auto-fit computation.
//!
//! Given the snapshot of a template's original text element and a replacement brand name, this
//! module derives the font size, letter spacing, vertical position, and baseline offset that
//! keep the replacement inside the space the designer gave the original text:
//!
//! 1. If the brand name rendered at the current styles is wider than the widest original line,
//!    font size and letter spacing are scaled down uniformly by `widest / brand_width`. Text is
//!    never scaled up.
//! 2. The replacement's vertical center is pinned to the original's: with a top-aligned anchor
//!    the original center is `(y + height_at_original_size / 2) / canvas_height`, and the new
//!    top edge is solved backwards from it using the height at the adjusted size.
//! 3. The last-line baseline offset is reduced proportionally for the collapse to a single
//!    line: `dy * (line_count - 1) / line_count`.
//!
//! Every computation either yields a complete [`TextUpdate`] or a [`SkipReason`]; nothing is
//! written to the document from here, so a skipped update leaves no partial state behind.

use tracing::trace;

use crate::dom::{Document, Element};
use crate::error::Error;
use crate::fonts::{FontCache, MetricsOptions};
use crate::style;

/// The attribute values a successful fit writes back to the document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct TextUpdate {
    pub font_size: f64,
    pub letter_spacing: f64,
    pub y: f64,
    pub dy: f64,
}

/// Outcome of a fit computation.
#[derive(Debug)]
pub(crate) enum Fit {
    /// All values resolved; the update can be applied.
    Applied(TextUpdate),
    /// A recoverable condition was hit; the document must stay untouched.
    Skipped(SkipReason),
}

/// The recoverable conditions that abandon an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SkipReason {
    /// The root element has no usable `viewBox`.
    NoCanvasSize,
    /// No original text element was captured at registration.
    NoSnapshot,
    /// The live document has no matching target element.
    NoTargetElement,
    /// The live or original text element lacks font styling attributes.
    MissingFontStyles,
    /// The original text element has no `y` position.
    NoYPosition,
    /// The original text element has no line spans or no readable `dy`.
    NoLineOffset,
    /// The metrics backend could not measure a string.
    MetricsUnavailable,
}

macro_rules! skip {
    ($reason:expr) => {
        return Ok(Fit::Skipped($reason))
    };
}

/// Computes the fitted attribute values for `brand_name`.
///
/// Recoverable conditions come back as [`Fit::Skipped`]; font resolution failures
/// (`FontFaceNotFound`, `FontUrlNotFound`, `FontLoadFailed`) are real errors and propagate.
pub(crate) fn compute(
    document: &Document,
    snapshot: Option<&Element>,
    target_id: &str,
    brand_name: &str,
    fonts: &mut FontCache,
) -> Result<Fit, Error> {
    let Some(canvas) = style::canvas_size(document.root()) else {
        skip!(SkipReason::NoCanvasSize);
    };
    let Some(snapshot) = snapshot else {
        skip!(SkipReason::NoSnapshot);
    };
    let Some(target) = crate::find_brand_text(document, target_id) else {
        skip!(SkipReason::NoTargetElement);
    };

    let Ok(styles) = style::font_styles(target) else {
        skip!(SkipReason::MissingFontStyles);
    };
    let Ok(original_styles) = style::font_styles(snapshot) else {
        skip!(SkipReason::MissingFontStyles);
    };

    let line_count = snapshot.child_element_count();
    if line_count == 0 {
        skip!(SkipReason::NoLineOffset);
    }

    let font = fonts.get_or_load(document, &styles.font_family)?;
    let options = MetricsOptions::for_attrs(styles.font_size, styles.letter_spacing);

    // Widest original line at the current styles; empty line text measures as the brand name.
    let mut widest = f64::NEG_INFINITY;
    for line in snapshot.child_elements() {
        let content = line.text_content();
        let text = if content.is_empty() {
            brand_name
        } else {
            content.as_str()
        };
        let Some(metrics) = font.measure(text, &options) else {
            skip!(SkipReason::MetricsUnavailable);
        };
        widest = widest.max(metrics.width.0);
    }
    let Some(brand_metrics) = font.measure(brand_name, &options) else {
        skip!(SkipReason::MetricsUnavailable);
    };

    let (font_size, letter_spacing) = if widest < brand_metrics.width.0 {
        let ratio = widest / brand_metrics.width.0;
        (styles.font_size * ratio, styles.letter_spacing * ratio)
    } else {
        (styles.font_size, styles.letter_spacing)
    };

    let Some(original_y) = style::y_position(snapshot) else {
        skip!(SkipReason::NoYPosition);
    };

    // Two heights, one for each font size: the anchor is top-aligned, so the original optical
    // center is found at the original size and the new top edge solved from the adjusted size.
    let Some(new_metrics) = font.measure(
        brand_name,
        &MetricsOptions::for_attrs(font_size, styles.letter_spacing),
    ) else {
        skip!(SkipReason::MetricsUnavailable);
    };
    let Some(center_metrics) = font.measure(
        brand_name,
        &MetricsOptions::for_attrs(original_styles.font_size, styles.letter_spacing),
    ) else {
        skip!(SkipReason::MetricsUnavailable);
    };
    let center = (original_y.0 + center_metrics.height.0 / 2.0) / canvas.height.0;
    let y = canvas.height.0 * center - new_metrics.height.0 / 2.0;

    let Some(dy_attr) = snapshot
        .last_child_element()
        .and_then(|last| last.attribute("dy"))
    else {
        skip!(SkipReason::NoLineOffset);
    };
    let Some(last_dy) = style::leading_number(dy_attr) else {
        skip!(SkipReason::NoLineOffset);
    };
    let dy = last_dy * (line_count as f64 - 1.0) / line_count as f64;

    trace!(
        "fit resolved: font_size {} -> {}, y {} -> {}, dy {}",
        styles.font_size,
        font_size,
        original_y.0,
        y,
        dy
    );

    Ok(Fit::Applied(TextUpdate {
        font_size,
        letter_spacing,
        y,
        dy,
    }))
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::error::ErrorKind;
    use crate::fonts::{FontLoader, FontMetrics, TextMetrics};
    use crate::Px;

    /// Ten user units per character at the reference size, one em tall.
    #[derive(Debug)]
    struct RuledFont;

    impl FontMetrics for RuledFont {
        fn measure(&self, text: &str, options: &MetricsOptions) -> Option<TextMetrics> {
            let per_char = 10.0 * options.font_size / 50.0;
            let height = options.font_size;
            Some(TextMetrics {
                width: Px(per_char * text.chars().count() as f64),
                height: Px(height),
                ascent: Px(height * 0.8),
                descent: Px(-height * 0.2),
            })
        }
    }

    #[derive(Debug)]
    struct RuledLoader;

    impl FontLoader for RuledLoader {
        fn load(&self, _source: &str) -> Result<Rc<dyn FontMetrics>, Error> {
            Ok(Rc::new(RuledFont))
        }
    }

    const TEMPLATE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 400 200"><style>@font-face { font-family: Test; src: url('data:font/ttf;base64,AA'); }</style><text data-role="brand" font-family="Test" font-size="50" letter-spacing="2" y="100"><tspan dy="0">Brand</tspan></text></svg>"#;

    fn cache() -> FontCache {
        FontCache::with_loader(Box::new(RuledLoader))
    }

    fn fit(svg: &str, brand_name: &str) -> Fit {
        let document = Document::parse(svg).unwrap();
        let snapshot = crate::find_brand_text(&document, "brand").cloned();
        compute(
            &document,
            snapshot.as_ref(),
            "brand",
            brand_name,
            &mut cache(),
        )
        .unwrap()
    }

    #[test]
    fn test_short_name_keeps_styles() {
        // "Hi" is narrower than "Brand": no scaling, and the y position is recentered to
        // exactly the original because both heights match.
        match fit(TEMPLATE, "Hi") {
            Fit::Applied(update) => {
                assert_eq!(update.font_size, 50.0);
                assert_eq!(update.letter_spacing, 2.0);
                assert_eq!(update.y, 100.0);
                assert_eq!(update.dy, 0.0);
            }
            other => panic!("unexpected fit: {:?}", other),
        }
    }

    #[test]
    fn test_long_name_scales_down_uniformly() {
        // "Brandbrand" (10 chars) is twice as wide as "Brand": both styles halve, and the new
        // height (25) re-centers y at (100 + 25) / 200 * 200 - 12.5 = 112.5.
        match fit(TEMPLATE, "Brandbrand") {
            Fit::Applied(update) => {
                assert_eq!(update.font_size, 25.0);
                assert_eq!(update.letter_spacing, 1.0);
                assert_eq!(update.y, 112.5);
            }
            other => panic!("unexpected fit: {:?}", other),
        }
    }

    #[test]
    fn test_missing_view_box_skips() {
        let svg = TEMPLATE.replacen(r#" viewBox="0 0 400 200""#, "", 1);
        match fit(&svg, "Hi") {
            Fit::Skipped(SkipReason::NoCanvasSize) => {}
            other => panic!("unexpected fit: {:?}", other),
        }
    }

    #[test]
    fn test_missing_snapshot_skips() {
        let document = Document::parse(TEMPLATE).unwrap();
        let fit = compute(&document, None, "brand", "Hi", &mut cache()).unwrap();
        match fit {
            Fit::Skipped(SkipReason::NoSnapshot) => {}
            other => panic!("unexpected fit: {:?}", other),
        }
    }

    #[test]
    fn test_missing_letter_spacing_skips() {
        let svg = TEMPLATE.replacen(r#" letter-spacing="2""#, "", 1);
        match fit(&svg, "Hi") {
            Fit::Skipped(SkipReason::MissingFontStyles) => {}
            other => panic!("unexpected fit: {:?}", other),
        }
    }

    #[test]
    fn test_missing_y_skips() {
        let svg = TEMPLATE.replacen(r#" y="100""#, "", 1);
        match fit(&svg, "Hi") {
            Fit::Skipped(SkipReason::NoYPosition) => {}
            other => panic!("unexpected fit: {:?}", other),
        }
    }

    #[test]
    fn test_multi_line_dy_reduced_by_one_line() {
        let svg = TEMPLATE.replacen(
            r#"<tspan dy="0">Brand</tspan>"#,
            r#"<tspan dy="0">Top</tspan><tspan dy="30">Bottom</tspan>"#,
            1,
        );
        match fit(&svg, "Hi") {
            Fit::Applied(update) => assert_eq!(update.dy, 15.0),
            other => panic!("unexpected fit: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_family_is_an_error() {
        let svg = TEMPLATE.replacen("font-family: Test;", "font-family: Other;", 1);
        let document = Document::parse(&svg).unwrap();
        let snapshot = crate::find_brand_text(&document, "brand").cloned();
        let err = compute(&document, snapshot.as_ref(), "brand", "Hi", &mut cache()).unwrap_err();
        match err.kind() {
            ErrorKind::FontFaceNotFound => {}
            kind => panic!("unexpected kind: {:?}", kind),
        }
    }
}

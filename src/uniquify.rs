//! Rewrites every internal id of an SVG string to a collision-free name.
//!
//! Templates reference their own ids from many places (`clip-path="url(#...)"`,
//! `href="#..."`, gradient and marker references, style blocks), and no tree-level API can
//! enumerate every reference form. The substitution therefore runs over the raw string: each
//! element id is replaced everywhere it occurs, case-insensitively, so the references are
//! rewritten along with the definitions. The trade-off is documented on
//! [`Engine::init_unique_id`](crate::Engine::init_unique_id): an id value that also occurs as
//! visible text gets rewritten there too, so template ids must be reasonably unique tokens.

use regex::{NoExpand, Regex};
use tracing::debug;
use uuid::Uuid;

use crate::dom::{Document, Element};
use crate::error::{Error, ErrorKind};

/// Replaces every element id (and, by substitution, every reference to it) in `svg` with
/// `{key}_{token}_{index}`, where the token is a single uuid-v4 draw shared by the whole call
/// and the index is the element's 0-based position among id-bearing elements in document order.
pub(crate) fn substitute_ids(svg: &str, key: &str) -> Result<String, Error> {
    let document = Document::parse(svg)?;
    let mut ids: Vec<String> = Vec::new();
    document.root().for_each_element(&mut |el: &Element| {
        if let Some(id) = el.attribute("id") {
            if !id.is_empty() {
                ids.push(id.to_owned());
            }
        }
    });

    let token = Uuid::new_v4();
    let mut result = svg.to_owned();
    for (index, id) in ids.iter().enumerate() {
        let pattern = Regex::new(&format!("(?i){}", regex::escape(id))).map_err(|err| {
            Error::new(
                format!("id is not substitutable: {}", err),
                ErrorKind::InvalidData,
            )
        })?;
        let replacement = format!("{}_{}_{}", key, token, index);
        result = pattern
            .replace_all(&result, NoExpand(&replacement))
            .into_owned();
    }
    debug!("rewrote {} template ids for key {}", ids.len(), key);
    Ok(result)
}

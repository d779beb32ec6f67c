//! Multi-instance id uniquification round-trips.

use brandfit::dom::Document;
use brandfit::Engine;

const TEMPLATE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 400 200"><defs><clipPath id="canvas1-clip"><rect width="400" height="200"/></clipPath><linearGradient id="brandGradient"/></defs><g clip-path="url(#canvas1-clip)"><rect fill="url(#brandGradient)" width="400" height="200"/><text data-role="brand-name" font-family="Sans" font-size="50" letter-spacing="2" y="100"><tspan dy="0">A happy accident happened</tspan></text></g></svg>"#;

const KEY: &str = "template-key";
const TARGET: &str = "brand-name";

#[test]
fn test_plain_init_keeps_ids() {
    let mut engine = Engine::new();
    engine.init(KEY, TEMPLATE, TARGET).unwrap();
    let out = engine.svg_string(KEY).unwrap();
    assert!(out.contains(r#"id="canvas1-clip""#));
}

#[test]
fn test_unique_init_rewrites_every_id() {
    let mut engine = Engine::new();
    engine.init_unique_id(KEY, TEMPLATE, TARGET).unwrap();
    let out = engine.svg_string(KEY).unwrap();
    let lowered = out.to_lowercase();
    assert!(!lowered.contains("canvas1-clip"));
    assert!(!lowered.contains("brandgradient"));
    // Text content survives untouched.
    assert!(out.contains("A happy accident happened"));
}

#[test]
fn test_unique_init_rewrites_references_consistently() {
    let mut engine = Engine::new();
    engine.init_unique_id(KEY, TEMPLATE, TARGET).unwrap();
    let document = engine.document(KEY).unwrap();

    let clip_id = document
        .first_element_named("clipPath")
        .and_then(|el| el.attribute("id"))
        .unwrap();
    let gradient_id = document
        .first_element_named("linearGradient")
        .and_then(|el| el.attribute("id"))
        .unwrap();
    assert!(clip_id.starts_with("template-key_"));
    assert_ne!(clip_id, gradient_id);

    let group = document.first_element_named("g").unwrap();
    assert_eq!(
        group.attribute("clip-path"),
        Some(format!("url(#{})", clip_id).as_str())
    );
    let rect = group.first_child_element().unwrap();
    assert_eq!(
        rect.attribute("fill"),
        Some(format!("url(#{})", gradient_id).as_str())
    );
}

#[test]
fn test_unique_init_output_is_well_formed() {
    let mut engine = Engine::new();
    engine.init_unique_id(KEY, TEMPLATE, TARGET).unwrap();
    let out = engine.svg_string(KEY).unwrap();
    assert!(Document::parse(&out).is_ok());
}

#[test]
fn test_two_registrations_do_not_collide() {
    let mut engine = Engine::new();
    engine.init_unique_id("left", TEMPLATE, TARGET).unwrap();
    engine.init_unique_id("right", TEMPLATE, TARGET).unwrap();

    let left_id = {
        let document = engine.document("left").unwrap();
        document
            .first_element_named("clipPath")
            .and_then(|el| el.attribute("id"))
            .unwrap()
            .to_owned()
    };
    let right_id = {
        let document = engine.document("right").unwrap();
        document
            .first_element_named("clipPath")
            .and_then(|el| el.attribute("id"))
            .unwrap()
            .to_owned()
    };
    assert_ne!(left_id, right_id);
    assert!(left_id.starts_with("left_"));
    assert!(right_id.starts_with("right_"));
}

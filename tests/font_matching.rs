use rust_fontface::*;

fn selector() -> FontSelector {
    FontSelector::builder()
        .provider(
            MemoryFontProvider::new()
                .with_font("Regular", "Regular")
                .with_font("Heavy", "Heavy")
                .with_font("Latin", "Latin")
                .with_font("Cyrillic", "Cyrillic"),
        )
        .build()
}

fn rule(css: &str) -> FontFaceRule {
    FontFaceRule::parse_block(css).unwrap()
}

fn add(selector: &mut FontSelector, css: &str) -> FontFaceId {
    selector
        .add_font_face_rule(StyleRuleKey::new(), &rule(css))
        .unwrap()
}

#[test]
fn test_weight_request_picks_nearest_group() {
    let mut selector = selector();
    add(&mut selector, "font-family: Body; src: local(Regular); font-weight: 400");
    add(&mut selector, "font-family: Body; src: local(Heavy); font-weight: 700");

    let bold = FontDescription::new("Body", 16.0).with_weight(650.0);
    let group = selector.segmented_face(&bold, "Body").unwrap();
    assert_eq!(
        selector.cache().segmented_face(group).unwrap().capabilities().weight.minimum,
        FontSelectionValue::from(700.0)
    );

    // below 400 lighter faces are preferred
    let light = FontDescription::new("Body", 16.0).with_weight(300.0);
    let group = selector.segmented_face(&light, "Body").unwrap();
    assert_eq!(
        selector.cache().segmented_face(group).unwrap().capabilities().weight.minimum,
        FontSelectionValue::from(400.0)
    );
}

#[test]
fn test_italic_request_prefers_italic_face() {
    let mut selector = selector();
    let upright = add(&mut selector, "font-family: Body; src: local(Regular)");
    let italic = add(&mut selector, "font-family: Body; src: local(Heavy); font-style: italic");

    let description = FontDescription::new("Body", 16.0).with_slope(20.0);
    let data = selector.font_data(&description, "Body").unwrap();
    assert_eq!(data.entries()[0].face, italic);

    let description = FontDescription::new("Body", 16.0);
    let data = selector.font_data(&description, "Body").unwrap();
    assert_eq!(data.entries()[0].face, upright);
}

#[test]
fn test_family_names_are_case_insensitive() {
    let mut selector = selector();
    add(&mut selector, "font-family: \"Brand Sans\"; src: local(Regular)");

    let description = FontDescription::new("brand sans", 16.0);
    assert!(selector.font_data(&description, "BRAND SANS").is_some());
    assert!(selector.font_data(&description, "Brand").is_none());
    assert_eq!(selector.families(), vec!["Brand Sans".to_string()]);
}

#[test]
fn test_generic_families_are_not_matched() {
    let mut selector = selector();
    add(&mut selector, "font-family: Body; src: local(Regular)");

    let description = FontDescription::new("sans-serif", 16.0);
    assert!(selector.segmented_face(&description, "sans-serif").is_none());
    assert!(selector.font_data(&description, "monospace").is_none());
}

#[test]
fn test_unicode_range_composite() {
    let mut selector = selector();
    let latin = add(
        &mut selector,
        "font-family: Mixed; src: local(Latin); unicode-range: U+0-7F",
    );
    let cyrillic = add(
        &mut selector,
        "font-family: Mixed; src: local(Cyrillic); unicode-range: U+400-4FF",
    );

    let description = FontDescription::new("Mixed", 16.0);
    let data = selector.font_data(&description, "Mixed").unwrap();
    assert_eq!(data.len(), 2);

    // the later rule wins, so it comes first
    assert_eq!(data.entries()[0].face, cyrillic);
    assert_eq!(data.font_data_for_char('a').unwrap().face, latin);
    assert_eq!(data.font_data_for_char('Ж').unwrap().face, cyrillic);
    assert!(data.font_data_for_char('中').is_none());
    assert!(data
        .entries()
        .iter()
        .all(|e| e.kind == FontDataKind::CacheDerived));

    // both faces went straight to loaded
    for face in [latin, cyrillic] {
        assert_eq!(selector.font_face(face).unwrap().status(), LoadStatus::Loaded);
    }
}

#[test]
fn test_composite_is_cached_per_instantiation() {
    let mut selector = selector();
    add(&mut selector, "font-family: Body; src: local(Regular)");

    let small = FontDescription::new("Body", 12.0);
    let large = FontDescription::new("Body", 24.0);
    let first = selector.font_data(&small, "Body").unwrap();
    let again = selector.font_data(&small, "Body").unwrap();
    let other = selector.font_data(&large, "Body").unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &again));
    assert!(!std::sync::Arc::ptr_eq(&first, &other));
    assert_eq!(other.entries()[0].font_data.size, 24.0);
}

#[test]
fn test_synthetic_bold_for_light_group() {
    let mut selector = selector();
    add(&mut selector, "font-family: Body; src: local(Regular); font-weight: 400");

    let bold = FontDescription::new("Body", 16.0).with_weight(700.0);
    let data = selector.font_data(&bold, "Body").unwrap();
    assert!(data.entries()[0].font_data.synthetic_bold);

    let mut no_synthesis = bold.clone();
    no_synthesis.synthetic_bold_allowed = false;
    let data = selector.font_data(&no_synthesis, "Body").unwrap();
    assert!(!data.entries()[0].font_data.synthetic_bold);
}

#[test]
fn test_missing_local_font_gives_no_data() {
    let mut selector = selector();
    let face = add(&mut selector, "font-family: Body; src: local(\"Not Installed\")");

    let description = FontDescription::new("Body", 16.0);
    assert!(selector.font_data(&description, "Body").is_none());
    selector.run_until_idle();
    let face = selector.font_face(face).unwrap();
    assert_eq!(face.status(), LoadStatus::Error);
    assert_eq!(face.error(), Some(&FontFaceError::Network));
}

#[test]
fn test_removing_rule_forgets_family() {
    let mut selector = selector();
    let key = StyleRuleKey::new();
    selector
        .add_font_face_rule(key, &rule("font-family: Body; src: local(Regular)"))
        .unwrap();

    // adding the same rule twice is a no-op
    assert!(selector
        .add_font_face_rule(key, &rule("font-family: Body; src: local(Regular)"))
        .is_none());

    let before = selector.version();
    assert!(selector.remove_font_face_rule(key));
    assert!(!selector.remove_font_face_rule(key));
    assert!(selector.version() > before);

    let description = FontDescription::new("Body", 16.0);
    assert!(selector.font_data(&description, "Body").is_none());
    assert!(selector.families().is_empty());
    assert_eq!(selector.font_faces().count(), 0);
}

#[test]
fn test_clear_css_connected_keeps_script_faces() {
    let mut selector = selector();
    add(&mut selector, "font-family: Body; src: local(Regular)");
    let script = selector.create_font_face("Body", "local(Heavy)", &FontFaceDescriptors::default());
    selector.add_to_set(script);
    assert_eq!(selector.set_size(), 2);

    assert!(selector.clear_css_connected());
    assert!(!selector.clear_css_connected());
    assert_eq!(selector.set_faces(), vec![script]);

    let description = FontDescription::new("Body", 16.0);
    let data = selector.font_data(&description, "Body").unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data.entries()[0].face, script);
}

#[test]
fn test_script_faces_outrank_rules() {
    let mut selector = selector();
    let css = add(&mut selector, "font-family: Body; src: local(Regular)");
    let script = selector.create_font_face("Body", "local(Heavy)", &FontFaceDescriptors::default());

    // not matched until it is in the set
    let description = FontDescription::new("Body", 16.0);
    assert_eq!(selector.font_data(&description, "Body").unwrap().len(), 1);

    selector.add_to_set(script);
    let data = selector.font_data(&description, "Body").unwrap();
    let order: Vec<FontFaceId> = data.entries().iter().map(|e| e.face).collect();
    assert_eq!(order, vec![script, css]);
}

#[test]
fn test_cascade_layers_order_rules() {
    let mut selector = selector();
    selector.set_cascade_layer_maps(CascadeLayerMaps {
        author: Some(CascadeLayerMap::new(["base", "theme"])),
        user: None,
    });

    let theme = selector
        .add_font_face_rule(
            StyleRuleKey::new(),
            &rule("font-family: Body; src: local(Heavy)").in_layer("theme"),
        )
        .unwrap();
    let base = selector
        .add_font_face_rule(
            StyleRuleKey::new(),
            &rule("font-family: Body; src: local(Regular)").in_layer("base"),
        )
        .unwrap();

    // added later, but the theme layer still wins
    let description = FontDescription::new("Body", 16.0);
    let data = selector.font_data(&description, "Body").unwrap();
    let order: Vec<FontFaceId> = data.entries().iter().map(|e| e.face).collect();
    assert_eq!(order, vec![theme, base]);
}

#[test]
fn test_descriptor_change_refiles_script_face() {
    let mut selector = selector();
    let face = selector.create_font_face("Body", "local(Regular)", &FontFaceDescriptors::default());
    selector.add_to_set(face);

    let bold = FontDescription::new("Body", 16.0).with_weight(700.0);
    let group = selector.segmented_face(&bold, "Body").unwrap();
    assert_eq!(
        selector.cache().segmented_face(group).unwrap().capabilities().weight.maximum,
        FontSelectionValue::from(400.0)
    );

    selector
        .set_descriptor(face, Descriptor::FontWeight, "700")
        .unwrap();
    let group = selector.segmented_face(&bold, "Body").unwrap();
    assert_eq!(
        selector.cache().segmented_face(group).unwrap().capabilities().weight.minimum,
        FontSelectionValue::from(700.0)
    );

    // an invalid value leaves the face untouched
    assert!(selector
        .set_descriptor(face, Descriptor::FontWeight, "heavy")
        .is_err());
    assert_eq!(selector.font_face(face).unwrap().descriptor(Descriptor::FontWeight), "700");
}

#[test]
fn test_face_features_reach_font_data() {
    let mut selector = selector();
    add(
        &mut selector,
        "font-family: Body; src: local(Regular); font-feature-settings: \"smcp\"; font-variant: small-caps",
    );

    let description = FontDescription::new("Body", 16.0);
    let data = selector.font_data(&description, "Body").unwrap();
    let font = &data.entries()[0].font_data;
    assert_eq!(font.feature_settings, vec![FontFeature { tag: *b"smcp", value: 1 }]);
    assert_eq!(font.variant, vec![String::from("small-caps")]);
}

#[test]
fn test_feature_change_refreshes_script_face_data() {
    let mut selector = selector();
    let face = selector.create_font_face("Body", "local(Regular)", &FontFaceDescriptors::default());
    selector.add_to_set(face);

    let description = FontDescription::new("Body", 16.0);
    let data = selector.font_data(&description, "Body").unwrap();
    assert!(data.entries()[0].font_data.feature_settings.is_empty());

    selector
        .set_descriptor(face, Descriptor::FontFeatureSettings, "\"tnum\" 1")
        .unwrap();
    let data = selector.font_data(&description, "Body").unwrap();
    assert_eq!(
        data.entries()[0].font_data.feature_settings,
        vec![FontFeature { tag: *b"tnum", value: 1 }]
    );
}

use std::sync::Arc;

use rust_fontface::*;

fn font_bytes() -> Vec<u8> {
    let mut bytes = b"OTTO".to_vec();
    bytes.resize(64, 0);
    bytes
}

fn web_font(css: &str) -> (FontSelector, FontFaceId) {
    web_font_with(FontSelector::builder(), css)
}

fn web_font_with(builder: FontSelectorBuilder, css: &str) -> (FontSelector, FontFaceId) {
    let mut selector = builder.build();
    let rule = FontFaceRule::parse_block(css).unwrap();
    let face = selector
        .add_font_face_rule(StyleRuleKey::new(), &rule)
        .unwrap();
    (selector, face)
}

fn description() -> FontDescription {
    FontDescription::new("Web", 16.0)
}

fn first_entry(selector: &mut FontSelector) -> Option<Arc<SimpleFontData>> {
    let data = selector.font_data(&description(), "Web")?;
    Some(data.entries()[0].font_data.clone())
}

fn remote_period(selector: &FontSelector, face: FontFaceId) -> DisplayPeriod {
    selector
        .font_face(face)
        .unwrap()
        .css_font_face()
        .sources()
        .next()
        .and_then(|s| s.as_remote())
        .unwrap()
        .period()
}

fn finish_fetch(selector: &mut FontSelector, response: FontFetchResponse) {
    let request = selector.pending_fetches()[0].id;
    selector.font_fetch_finished(request, response);
}

#[test]
fn test_fallback_timeline() {
    let (mut selector, face) = web_font(
        "font-family: Web; src: url(web.woff2) format(woff2); font-display: fallback",
    );
    selector.will_use_font_data(&description(), "Web", "Hello");
    assert_eq!(selector.font_face(face).unwrap().status(), LoadStatus::Loading);
    assert_eq!(selector.pending_fetches().len(), 1);
    assert_eq!(selector.pending_fetches()[0].url, "web.woff2");

    let fallback = first_entry(&mut selector).unwrap();
    assert!(fallback.is_loading_fallback());
    assert!(fallback.should_skip_drawing());

    selector.advance_time(99);
    assert!(first_entry(&mut selector).unwrap().should_skip_drawing());

    selector.advance_time(1);
    assert_eq!(remote_period(&selector, face), DisplayPeriod::Swap);
    assert!(!first_entry(&mut selector).unwrap().should_skip_drawing());

    selector.advance_time(2900);
    assert_eq!(remote_period(&selector, face), DisplayPeriod::Failure);
}

#[test]
fn test_swap_renders_fallback_then_web_font() {
    let (mut selector, face) =
        web_font("font-family: Web; src: url(web.woff2); font-display: swap");
    selector.will_use_font_data(&description(), "Web", "Hello");

    let fallback = first_entry(&mut selector).unwrap();
    assert!(fallback.is_loading_fallback());
    assert!(!fallback.should_skip_drawing());

    selector.take_invalidations();
    finish_fetch(
        &mut selector,
        FontFetchResponse::ok(font_bytes(), DataSource::Network),
    );
    assert_eq!(selector.font_face(face).unwrap().status(), LoadStatus::Loaded);
    assert!(selector
        .take_invalidations()
        .contains(&FontInvalidationReason::FontFaceLoaded));

    let data = selector.font_data(&description(), "Web").unwrap();
    assert_eq!(data.entries()[0].kind, FontDataKind::Custom);
    let font = &data.entries()[0].font_data;
    assert_eq!(font.custom, CustomFontKind::WebFont);
    assert!(matches!(font.typeface, Typeface::Web(_)));
    assert!(!data.is_loading_fallback());
}

#[test]
fn test_block_hides_text_until_long_limit() {
    let (mut selector, face) =
        web_font("font-family: Web; src: url(web.woff2); font-display: block");
    selector.will_use_font_data(&description(), "Web", "Hello");

    selector.advance_time(100);
    assert_eq!(remote_period(&selector, face), DisplayPeriod::Block);
    assert!(first_entry(&mut selector).unwrap().should_skip_drawing());

    selector.advance_time(2900);
    assert_eq!(remote_period(&selector, face), DisplayPeriod::Swap);
    assert!(!first_entry(&mut selector).unwrap().should_skip_drawing());
}

#[test]
fn test_custom_load_limits() {
    let config = FontLoadingConfig::default().with_load_limits(
        std::time::Duration::from_millis(10),
        std::time::Duration::from_millis(20),
    );
    let (mut selector, face) = web_font_with(
        FontSelector::builder().config(config),
        "font-family: Web; src: url(web.woff2); font-display: fallback",
    );
    selector.will_use_font_data(&description(), "Web", "a");
    selector.advance_time(10);
    assert_eq!(remote_period(&selector, face), DisplayPeriod::Swap);
    selector.advance_time(10);
    assert_eq!(remote_period(&selector, face), DisplayPeriod::Failure);
}

#[test]
fn test_auto_swaps_once_lcp_limit_passes() {
    let (mut selector, face) = web_font_with(
        FontSelector::builder().document(DocumentState::document().with_lcp_limit(500)),
        "font-family: Web; src: url(web.woff2)",
    );
    selector.will_use_font_data(&description(), "Web", "Hello");

    selector.advance_time(499);
    assert!(!selector.context().lcp_limit_reached);
    assert!(first_entry(&mut selector).unwrap().should_skip_drawing());

    // the invisible fallback becomes visible retroactively
    selector.advance_time(1);
    assert!(selector.context().lcp_limit_reached);
    assert_eq!(remote_period(&selector, face), DisplayPeriod::Swap);
    assert!(!first_entry(&mut selector).unwrap().should_skip_drawing());

    // a late font is still swapped in
    finish_fetch(
        &mut selector,
        FontFetchResponse::ok(font_bytes(), DataSource::Network),
    );
    let font = first_entry(&mut selector).unwrap();
    assert_eq!(font.custom, CustomFontKind::WebFont);
}

#[test]
fn test_auto_fails_at_lcp_limit_in_failure_mode() {
    let config =
        FontLoadingConfig::default().with_lcp_alignment(true, LcpInterventionMode::ToFailurePeriod);
    let (mut selector, face) = web_font_with(
        FontSelector::builder()
            .config(config)
            .document(DocumentState::document().with_lcp_limit(200)),
        "font-family: Web; src: url(web.woff2)",
    );
    selector.will_use_font_data(&description(), "Web", "Hello");
    selector.advance_time(200);
    assert_eq!(remote_period(&selector, face), DisplayPeriod::Failure);
    assert!(selector.font_data(&description(), "Web").is_none());
}

#[test]
fn test_lcp_alignment_can_be_disabled() {
    let config =
        FontLoadingConfig::default().with_lcp_alignment(false, LcpInterventionMode::ToSwapPeriod);
    let (mut selector, face) = web_font_with(
        FontSelector::builder()
            .config(config)
            .document(DocumentState::document().with_lcp_limit(200)),
        "font-family: Web; src: url(web.woff2)",
    );
    selector.will_use_font_data(&description(), "Web", "Hello");
    selector.advance_time(1000);
    assert!(!selector.context().lcp_limit_reached);
    assert_eq!(remote_period(&selector, face), DisplayPeriod::Block);
}

#[test]
fn test_optional_font_is_dropped_after_fallback_painted() {
    let (mut selector, face) =
        web_font("font-family: Web; src: url(web.woff2); font-display: optional");
    selector.document_mut().rendering_has_begun = true;
    selector.will_use_font_data(&description(), "Web", "Hello");

    // optional never blocks
    let fallback = first_entry(&mut selector).unwrap();
    assert!(!fallback.should_skip_drawing());
    selector.paint_requested(&fallback);

    selector.advance_time(100);
    assert_eq!(remote_period(&selector, face), DisplayPeriod::Failure);

    // arriving late does not swap the font in
    finish_fetch(
        &mut selector,
        FontFetchResponse::ok(font_bytes(), DataSource::Network),
    );
    assert!(selector.font_data(&description(), "Web").is_none());
}

#[test]
fn test_optional_font_loaded_before_rendering_is_used() {
    let (mut selector, face) =
        web_font("font-family: Web; src: url(web.woff2); font-display: optional");
    selector.will_use_font_data(&description(), "Web", "Hello");
    finish_fetch(
        &mut selector,
        FontFetchResponse::ok(font_bytes(), DataSource::Network),
    );

    selector.document_mut().rendering_has_begun = true;
    selector.advance_time(5000);
    assert_eq!(remote_period(&selector, face), DisplayPeriod::Swap);
    let font = first_entry(&mut selector).unwrap();
    assert_eq!(font.custom, CustomFontKind::WebFont);
}

#[test]
fn test_memory_cached_fetch_completes_synchronously() {
    let (mut selector, face) = web_font_with(
        FontSelector::builder()
            .fetcher(MemoryFetcher::new().with_resource("cached.woff2", font_bytes())),
        "font-family: Web; src: url(cached.woff2); font-display: block",
    );
    selector.will_use_font_data(&description(), "Web", "Hello");

    assert!(selector.pending_fetches().is_empty());
    assert_eq!(selector.font_face(face).unwrap().status(), LoadStatus::Loaded);
    assert_eq!(remote_period(&selector, face), DisplayPeriod::NotApplicable);
    assert_eq!(
        first_entry(&mut selector).unwrap().custom,
        CustomFontKind::WebFont
    );
}

#[test]
fn test_network_error_falls_through_to_local_source() {
    let (mut selector, face) = web_font_with(
        FontSelector::builder().provider(MemoryFontProvider::new().with_font("Backup", "Backup")),
        "font-family: Web; src: url(web.woff2), local(Backup); font-display: swap",
    );
    selector.will_use_font_data(&description(), "Web", "Hello");
    finish_fetch(&mut selector, FontFetchResponse::error(FetchError::NotFound));

    let face = selector.font_face(face).unwrap();
    assert_eq!(face.status(), LoadStatus::Loaded);
    assert_eq!(face.css_font_face().sources().count(), 1);

    let data = selector.font_data(&description(), "Web").unwrap();
    assert_eq!(data.entries()[0].kind, FontDataKind::CacheDerived);
    match &data.entries()[0].font_data.typeface {
        Typeface::System(typeface) => assert_eq!(typeface.unique_name, "Backup"),
        other => panic!("expected a system typeface, got {:?}", other),
    }
}

#[test]
fn test_decode_error_fails_face() {
    let (mut selector, face) = web_font("font-family: Web; src: url(broken.woff2), local(Backup)");
    selector.will_use_font_data(&description(), "Web", "Hello");
    selector.take_console_messages();
    finish_fetch(
        &mut selector,
        FontFetchResponse::ok(b"<!doctype html>".to_vec(), DataSource::Network),
    );

    // a rejected font does not fall back to the next source
    let face = selector.font_face(face).unwrap();
    assert_eq!(face.status(), LoadStatus::Error);
    assert_eq!(face.error(), Some(&FontFaceError::Network));

    let messages = selector.take_console_messages();
    assert_eq!(messages.len(), 2);
    assert!(messages
        .iter()
        .all(|m| m.level == ConsoleLevel::Warning));
    assert!(messages[0].text.contains("broken.woff2"));
    assert!(selector.font_data(&description(), "Web").is_none());
}

#[test]
fn test_local_lookup_waits_for_index() {
    let (mut selector, face) = web_font_with(
        FontSelector::builder().provider(
            MemoryFontProvider::new()
                .with_deferred_lookup()
                .with_font("Arial", "Arial"),
        ),
        "font-family: Web; src: local(Arial)",
    );

    let fallback = first_entry(&mut selector).unwrap();
    assert!(fallback.is_loading_fallback());
    assert!(!fallback.should_skip_drawing());
    assert_eq!(selector.font_face(face).unwrap().status(), LoadStatus::Loading);

    selector.run_until_idle();
    assert_eq!(selector.font_face(face).unwrap().status(), LoadStatus::Loaded);
    let font = first_entry(&mut selector).unwrap();
    assert_eq!(font.custom, CustomFontKind::None);
    assert!(matches!(&font.typeface, Typeface::System(t) if t.family == "Arial"));
}

#[test]
fn test_slow_network_gives_up_on_auto_fonts() {
    let mut document = DocumentState::document();
    document.network_is_slow = true;
    let (mut selector, face) = web_font_with(
        FontSelector::builder().document(document),
        "font-family: Web; src: url(web.woff2)",
    );
    selector.will_use_font_data(&description(), "Web", "Hello");
    let messages = selector.take_console_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].level, ConsoleLevel::Info);

    selector.advance_time(100);
    assert_eq!(remote_period(&selector, face), DisplayPeriod::Failure);
    assert!(selector.font_data(&description(), "Web").is_none());
}

#[test]
fn test_binary_faces_are_ready_immediately() {
    let mut selector = FontSelector::default();
    let face =
        selector.create_font_face_from_binary("Web", &font_bytes(), &FontFaceDescriptors::default());
    assert_eq!(selector.font_face(face).unwrap().status(), LoadStatus::Loaded);
    selector.add_to_set(face);
    assert_eq!(
        first_entry(&mut selector).unwrap().custom,
        CustomFontKind::WebFont
    );

    let broken =
        selector.create_font_face_from_binary("Web", b"nope", &FontFaceDescriptors::default());
    let broken = selector.font_face(broken).unwrap();
    assert_eq!(broken.status(), LoadStatus::Error);
    assert_eq!(broken.error().map(|e| e.name()), Some("SyntaxError"));
}

#[test]
fn test_detached_selector_ignores_late_results() {
    let (mut selector, face) = web_font("font-family: Web; src: url(web.woff2)");
    selector.will_use_font_data(&description(), "Web", "Hello");
    let request = selector.pending_fetches()[0].id;

    selector.detach();
    selector.font_fetch_finished(
        request,
        FontFetchResponse::ok(font_bytes(), DataSource::Network),
    );
    selector.advance_time(10_000);
    assert_eq!(selector.font_face(face).unwrap().status(), LoadStatus::Loading);
    assert_eq!(remote_period(&selector, face), DisplayPeriod::Block);
}

#[test]
fn test_unknown_fetch_results_are_dropped() {
    let (mut selector, face) = web_font("font-family: Web; src: url(web.woff2)");
    selector.will_use_font_data(&description(), "Web", "Hello");
    selector.font_fetch_finished(
        FetchRequestId::new(),
        FontFetchResponse::ok(font_bytes(), DataSource::Network),
    );
    assert_eq!(selector.font_face(face).unwrap().status(), LoadStatus::Loading);
    assert_eq!(selector.pending_fetches().len(), 1);
}

#[test]
fn test_fetch_request_carries_referrer_policy() {
    let mut document = DocumentState::document();
    document.referrer_policy = Some("no-referrer".into());
    let (mut selector, face) = web_font_with(
        FontSelector::builder().document(document),
        "font-family: Web; src: url(web.woff2)",
    );
    selector.load_font_face(face);

    let request = selector.pending_fetches().remove(0);
    assert_eq!(request.face, face);
    assert_eq!(request.cors_mode, CorsMode::Anonymous);
    assert_eq!(request.referrer_policy.as_deref(), Some("no-referrer"));
}

#[test]
fn test_blank_text_is_counted_during_block_period() {
    let (mut selector, face) =
        web_font("font-family: Web; src: url(web.woff2); font-display: block");
    selector.will_use_font_data(&description(), "Web", "Hello");
    selector.will_use_font_data(&description(), "Web", "World!");

    let font_face = selector.font_face(face).unwrap();
    assert_eq!(font_face.approximate_blank_character_count(), 11);
    assert!(!font_face.had_blank_text());

    let fallback = first_entry(&mut selector).unwrap();
    assert!(fallback.should_skip_drawing());
    selector.paint_requested(&fallback);
    assert!(selector.font_face(face).unwrap().had_blank_text());

    finish_fetch(
        &mut selector,
        FontFetchResponse::ok(font_bytes(), DataSource::Network),
    );
    let font_face = selector.font_face(face).unwrap();
    assert_eq!(font_face.status(), LoadStatus::Loaded);
    assert_eq!(font_face.approximate_blank_character_count(), 0);
    assert!(font_face.had_blank_text());
}

#[test]
fn test_swap_fonts_never_paint_blank_text() {
    let (mut selector, face) =
        web_font("font-family: Web; src: url(web.woff2); font-display: swap");
    selector.will_use_font_data(&description(), "Web", "Hello");

    let fallback = first_entry(&mut selector).unwrap();
    selector.paint_requested(&fallback);
    let font_face = selector.font_face(face).unwrap();
    assert_eq!(font_face.status(), LoadStatus::Loading);
    assert_eq!(font_face.approximate_blank_character_count(), 0);
    assert!(!font_face.had_blank_text());
}

#[test]
fn test_script_load_blocks_rendering_until_settled() {
    let mut selector = FontSelector::builder().build();
    let face = selector.create_font_face("Web", "url(web.woff2)", &FontFaceDescriptors::default());
    assert_eq!(selector.load_font_face(face), LoadStatus::Loading);
    assert_eq!(selector.render_blocking_font_loads(), vec![face]);

    finish_fetch(
        &mut selector,
        FontFetchResponse::error(FetchError::Network("connection reset".into())),
    );
    assert_eq!(selector.font_face(face).unwrap().status(), LoadStatus::Error);
    assert!(selector.render_blocking_font_loads().is_empty());
}

#[test]
fn test_style_driven_loads_do_not_block_rendering() {
    let (mut selector, _) = web_font("font-family: Web; src: url(web.woff2)");
    selector.will_use_font_data(&description(), "Web", "Hello");
    assert!(selector.render_blocking_font_loads().is_empty());

    let mut worker = FontSelector::builder().document(DocumentState::worker()).build();
    let face = worker.create_font_face("Web", "url(web.woff2)", &FontFaceDescriptors::default());
    worker.load_font_face(face);
    assert!(worker.render_blocking_font_loads().is_empty());

    let mut rendered = FontSelector::builder().build();
    rendered.document_mut().rendering_has_begun = true;
    let face = rendered.create_font_face("Web", "url(web.woff2)", &FontFaceDescriptors::default());
    rendered.load_font_face(face);
    assert!(rendered.render_blocking_font_loads().is_empty());
}

#[test]
fn test_released_face_stops_blocking_rendering() {
    let mut selector = FontSelector::builder().build();
    let face = selector.create_font_face("Web", "url(web.woff2)", &FontFaceDescriptors::default());
    selector.load_font_face(face);
    assert!(selector.release_font_face(face));
    assert!(selector.render_blocking_font_loads().is_empty());
}

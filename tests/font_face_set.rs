use rust_fontface::*;

fn font_bytes() -> Vec<u8> {
    let mut bytes = vec![0x00, 0x01, 0x00, 0x00];
    bytes.resize(64, 0);
    bytes
}

fn selector() -> FontSelector {
    FontSelector::builder()
        .provider(MemoryFontProvider::new().with_font("Arial", "Arial"))
        .build()
}

fn add_rule(selector: &mut FontSelector, css: &str) -> FontFaceId {
    let rule = FontFaceRule::parse_block(css).unwrap();
    selector
        .add_font_face_rule(StyleRuleKey::new(), &rule)
        .unwrap()
}

fn finish_all(selector: &mut FontSelector, ok: bool) {
    for request in selector.pending_fetches() {
        let response = if ok {
            FontFetchResponse::ok(font_bytes(), DataSource::Network)
        } else {
            FontFetchResponse::error(FetchError::Network("connection reset".into()))
        };
        selector.font_fetch_finished(request.id, response);
    }
}

fn event_kinds(events: &[FontFaceSetLoadEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.kind.name()).collect()
}

#[test]
fn test_loading_then_loadingdone() {
    let mut selector = selector();
    let face = add_rule(&mut selector, "font-family: Web; src: url(web.woff2)");
    assert_eq!(selector.set_status(), "loaded");

    let description = FontDescription::new("Web", 16.0);
    selector.will_use_font_data(&description, "Web", "abc");
    assert_eq!(selector.set_status(), "loading");
    assert_eq!(selector.ready(), ReadyState::Pending);

    selector.run_until_idle();
    assert_eq!(event_kinds(&selector.take_events()), vec!["loading"]);

    finish_all(&mut selector, true);
    selector.run_until_idle();
    let events = selector.take_events();
    assert_eq!(event_kinds(&events), vec!["loadingdone"]);
    assert_eq!(events[0].fontfaces, vec![face]);
    assert_eq!(selector.set_status(), "loaded");
    assert_eq!(selector.ready(), ReadyState::Resolved);
}

#[test]
fn test_failed_face_fires_loadingerror() {
    let mut selector = selector();
    let face = add_rule(&mut selector, "font-family: Web; src: url(web.woff2)");
    selector.will_use_font_data(&FontDescription::new("Web", 16.0), "Web", "abc");
    selector.run_until_idle();
    selector.take_events();

    finish_all(&mut selector, false);
    selector.run_until_idle();
    let events = selector.take_events();
    assert_eq!(event_kinds(&events), vec!["loadingdone", "loadingerror"]);
    assert!(events[0].fontfaces.is_empty());
    assert_eq!(events[1].fontfaces, vec![face]);
    assert_eq!(selector.font_face(face).unwrap().status(), LoadStatus::Error);
}

#[test]
fn test_done_events_wait_for_layout() {
    let mut selector = selector();
    add_rule(&mut selector, "font-family: Web; src: url(web.woff2)");
    selector.will_use_font_data(&FontDescription::new("Web", 16.0), "Web", "abc");
    selector.document_mut().needs_layout = true;
    selector.run_until_idle();
    selector.take_events();

    finish_all(&mut selector, true);
    selector.run_until_idle();
    assert!(selector.take_events().is_empty());
    assert_eq!(selector.ready(), ReadyState::Pending);

    selector.document_mut().needs_layout = false;
    selector.did_layout();
    selector.run_until_idle();
    assert_eq!(event_kinds(&selector.take_events()), vec!["loadingdone"]);
    assert_eq!(selector.ready(), ReadyState::Resolved);
}

#[test]
fn test_workers_do_not_wait_for_layout() {
    let mut document = DocumentState::worker();
    document.needs_layout = true;
    let mut selector = FontSelector::builder().document(document).build();
    add_rule(&mut selector, "font-family: Web; src: url(web.woff2)");
    selector.will_use_font_data(&FontDescription::new("Web", 16.0), "Web", "abc");
    finish_all(&mut selector, true);
    selector.run_until_idle();
    assert_eq!(
        event_kinds(&selector.take_events()),
        vec!["loading", "loadingdone"]
    );
}

#[test]
fn test_ready_resolves_when_idle() {
    let mut selector = selector();
    assert_eq!(selector.ready(), ReadyState::Pending);
    selector.run_until_idle();
    assert_eq!(selector.ready(), ReadyState::Resolved);
    assert!(selector.take_events().is_empty());
}

#[test]
fn test_set_membership() {
    let mut selector = selector();
    let css = add_rule(&mut selector, "font-family: Web; src: local(Arial)");
    let script = selector.create_font_face("Web", "local(Arial)", &FontFaceDescriptors::default());

    assert!(selector.set_has(css));
    assert!(!selector.set_has(script));
    assert_eq!(selector.set_size(), 1);

    selector.add_to_set(script);
    selector.add_to_set(script);
    // rule faces cannot be added from script
    selector.add_to_set(css);
    assert_eq!(selector.set_faces(), vec![css, script]);

    // faces still in the set are not released
    assert!(!selector.release_font_face(script));
    assert!(selector.delete_from_set(script));
    assert!(!selector.delete_from_set(script));
    assert!(!selector.delete_from_set(css));
    assert!(selector
        .take_invalidations()
        .contains(&FontInvalidationReason::FontFaceDeleted));

    assert!(selector.release_font_face(script));
    assert!(selector.font_face(script).is_none());

    selector.clear_set();
    assert_eq!(selector.set_faces(), vec![css]);
}

#[test]
fn test_load_fonts_resolves_with_matched_faces() {
    let mut selector = selector();
    let latin = selector.create_font_face(
        "Web",
        "url(latin.woff2)",
        &FontFaceDescriptors::default().with(Descriptor::UnicodeRange, "U+0-FF"),
    );
    let greek = selector.create_font_face(
        "Web",
        "url(greek.woff2)",
        &FontFaceDescriptors::default().with(Descriptor::UnicodeRange, "U+370-3FF"),
    );
    selector.add_to_set(latin);
    selector.add_to_set(greek);

    let description = FontDescription::with_families(["Web", "serif"], 16.0);
    let request = selector.load_fonts(&description, "hello");
    assert_eq!(selector.load_request_outcome(request), Some(LoadOutcome::Pending));
    assert_eq!(selector.font_face(latin).unwrap().status(), LoadStatus::Loading);
    assert_eq!(selector.font_face(greek).unwrap().status(), LoadStatus::Unloaded);
    assert_eq!(selector.pending_fetches().len(), 1);

    finish_all(&mut selector, true);
    selector.run_until_idle();
    assert_eq!(
        selector.load_request_outcome(request),
        Some(LoadOutcome::Resolved(vec![latin]))
    );
}

#[test]
fn test_load_fonts_rejects_on_failure() {
    let mut selector = selector();
    let face = selector.create_font_face("Web", "url(web.woff2)", &FontFaceDescriptors::default());
    selector.add_to_set(face);

    let request = selector.load_fonts(&FontDescription::new("Web", 16.0), "abc");
    finish_all(&mut selector, false);
    selector.run_until_idle();
    assert_eq!(
        selector.load_request_outcome(request),
        Some(LoadOutcome::Rejected(FontFaceError::Network))
    );
}

#[test]
fn test_load_fonts_settles_immediately_for_loaded_faces() {
    let mut selector = selector();
    let face = selector.create_font_face_from_binary("Web", &font_bytes(), &FontFaceDescriptors::default());
    selector.add_to_set(face);

    let request = selector.load_fonts(&FontDescription::new("Web", 16.0), "abc");
    assert_eq!(
        selector.load_request_outcome(request),
        Some(LoadOutcome::Resolved(vec![face]))
    );
}

#[test]
fn test_check_fonts() {
    let mut selector = selector();
    add_rule(
        &mut selector,
        "font-family: Web; src: url(web.woff2); unicode-range: U+0-7F",
    );
    let description = FontDescription::with_families(["Web", "Arial"], 16.0);

    assert!(!selector.check_fonts(&description, "abc"));
    // outside the face's range nothing needs loading
    assert!(selector.check_fonts(&description, "ЖЖ"));
    // installed families are always available
    assert!(selector.check_fonts(&FontDescription::new("Arial", 16.0), "abc"));
    assert!(selector.check_fonts(&FontDescription::new("Unknown", 16.0), "abc"));

    selector.will_use_font_data(&description, "Web", "abc");
    finish_all(&mut selector, true);
    assert!(selector.check_fonts(&description, "abc"));
}

#[test]
fn test_status_strings() {
    assert_eq!(LoadStatus::Unloaded.to_string(), "unloaded");
    assert_eq!(LoadStatus::Error.as_str(), "error");
    assert_eq!(FontFaceSetEventKind::LoadingError.name(), "loadingerror");
}

#[test]
fn test_taking_settled_outcome_forgets_request() {
    let mut selector = selector();
    let face = selector.create_font_face("Web", "url(web.woff2)", &FontFaceDescriptors::default());
    selector.add_to_set(face);

    let request = selector.load_fonts(&FontDescription::new("Web", 16.0), "abc");
    assert_eq!(selector.take_load_request_outcome(request), Some(LoadOutcome::Pending));
    assert_eq!(selector.font_face_set().load_request_count(), 1);

    finish_all(&mut selector, true);
    selector.run_until_idle();
    assert_eq!(
        selector.take_load_request_outcome(request),
        Some(LoadOutcome::Resolved(vec![face]))
    );
    assert_eq!(selector.font_face_set().load_request_count(), 0);
    assert_eq!(selector.load_request_outcome(request), None);

    let abandoned = selector.load_fonts(&FontDescription::new("Web", 16.0), "abc");
    selector.abandon_load_request(abandoned);
    assert_eq!(selector.font_face_set().load_request_count(), 0);
}

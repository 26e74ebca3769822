//! Walks a web font through the `font-display` timeline.
//!
//! A `font-display: fallback` face is requested, the clock is advanced
//! past the short limit and the download finishes late. The composite
//! font data is printed at each step.
//!
//! Run with: cargo run --example load_timeline

use rust_fontface::*;

fn describe(selector: &mut FontSelector, description: &FontDescription, label: &str) {
    let state = match selector.font_data(description, "Brand") {
        Some(data) => match data.entries().first() {
            Some(entry) if entry.font_data.should_skip_drawing() => "invisible fallback",
            Some(entry) if entry.font_data.is_loading_fallback() => "visible fallback",
            Some(_) => "web font",
            None => "nothing",
        },
        None => "nothing",
    };
    println!("{:>6} ms  {:<28} {}", selector.now_ms(), label, state);
}

fn main() {
    let mut selector = FontSelector::builder()
        .provider(MemoryFontProvider::new().with_font("Arial", "Arial"))
        .build();

    let rule = FontFaceRule::parse_block(
        "font-family: Brand; src: url(brand.woff2) format(woff2); font-display: fallback",
    )
    .expect("valid @font-face block");
    let face = selector
        .add_font_face_rule(StyleRuleKey::new(), &rule)
        .expect("rule registers a face");

    let description = FontDescription::with_families(["Brand", "Arial"], 16.0);
    selector.will_use_font_data(&description, "Brand", "Hello");
    describe(&mut selector, &description, "download started");

    selector.advance_time(50);
    describe(&mut selector, &description, "block period");

    selector.advance_time(100);
    describe(&mut selector, &description, "swap period");

    let fetch = selector.pending_fetches().remove(0);
    println!("           fetched {}", fetch.url);
    let mut bytes = b"OTTO".to_vec();
    bytes.resize(64, 0);
    selector.font_fetch_finished(fetch.id, FontFetchResponse::ok(bytes, DataSource::Network));
    selector.run_until_idle();
    describe(&mut selector, &description, "download finished");

    for event in selector.take_events() {
        println!("           event {} ({} faces)", event.kind.name(), event.fontfaces.len());
    }
    if let Some(face) = selector.font_face(face) {
        println!("           {} is {}", face.family(), face.status());
    }
}

//! Scans the installed fonts and resolves a few `local()` names.
//!
//! Run with: cargo run --example system_fonts --features "std,parsing"

use rust_fontface::*;

fn main() {
    let mut index = SystemFontIndex::new();
    for dir in index.directories() {
        println!("font directory: {}", dir.display());
    }

    let start = std::time::Instant::now();
    index.build_unique_name_lookup();
    println!(
        "indexed {} unique names in {:?}",
        index.len(),
        start.elapsed()
    );

    for name in ["DejaVu Sans", "DejaVuSans-Bold", "Arial", "Helvetica"] {
        match index.typeface_for_unique_name(name) {
            Some(typeface) => match &typeface.source {
                TypefaceSource::Path { path, font_index } => {
                    println!("local({}) -> {} [{}] in {}", name, typeface.family, font_index, path)
                }
                TypefaceSource::Builtin => println!("local({}) -> {}", name, typeface.family),
            },
            None => println!("local({}) -> not installed", name),
        }
    }

    let mut selector = FontSelector::builder().provider(index).build();
    let rule = FontFaceRule::parse_block("font-family: Body; src: local(\"DejaVu Sans\"), local(Arial)")
        .expect("valid @font-face block");
    let face = selector.add_font_face_rule(StyleRuleKey::new(), &rule);
    let description = FontDescription::new("Body", 16.0);
    selector.font_data(&description, "Body");
    selector.run_until_idle();
    if let Some(face) = face.and_then(|id| selector.font_face(id)) {
        println!("Body is {}", face.status());
    }
}

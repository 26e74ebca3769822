//! A single font face: its descriptors, selection capabilities and the
//! load state of its sources.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::context::{ConsoleLevel, LoadContext, Notification};
use crate::css_font_face::{CssFontFace, FaceAttributes};
use crate::descriptors::{
    parse_descriptor, parse_src, Descriptor, DescriptorValue, FontDisplay, FontFaceDescriptors,
    FontFaceRule, FontFaceSrc, FontFeature, FontStretchValue, FontStyleValue, FontWeightValue,
};
use crate::error::FontFaceError;
use crate::font_data::{FontDescription, FontMetricsOverride, SimpleFontData};
use crate::segmented::CascadeOrigin;
use crate::selection::{
    FontSelectionCapabilities, FontSelectionRange, FontSelectionValue, BOLD_WEIGHT, ITALIC_SLOPE,
    NORMAL_SLOPE, NORMAL_WEIGHT,
};
use crate::source::{
    BinaryFontFaceSource, CssFontFaceSource, FontFaceSource, LocalFontFaceSource,
    RemoteFontFaceSource,
};
use crate::unicode::{UnicodeRange, UnicodeRangeSet};
use crate::{FontFaceId, LoadRequestId, StyleRuleKey};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LoadStatus {
    Unloaded,
    Loading,
    Loaded,
    Error,
}

impl LoadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadStatus::Unloaded => "unloaded",
            LoadStatus::Loading => "loading",
            LoadStatus::Loaded => "loaded",
            LoadStatus::Error => "error",
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, LoadStatus::Loaded | LoadStatus::Error)
    }
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is waiting for a face to settle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoadFontCallback {
    /// The face set tracking loading faces.
    FontFaceSet,
    /// A `load()` call waiting on a batch of faces.
    LoadRequest(LoadRequestId),
}

/// Parsed form of the descriptors that feed matching and rendering.
#[derive(Debug, Clone, PartialEq)]
struct ParsedDescriptors {
    style: Option<FontStyleValue>,
    weight: Option<FontWeightValue>,
    stretch: Option<FontStretchValue>,
    unicode_range: Vec<UnicodeRange>,
    display: FontDisplay,
    metrics_override: FontMetricsOverride,
    size_adjust: Option<f32>,
    feature_settings: Vec<FontFeature>,
    variant: Vec<String>,
}

impl Default for ParsedDescriptors {
    fn default() -> Self {
        Self {
            style: None,
            weight: None,
            stretch: None,
            unicode_range: Vec::new(),
            display: FontDisplay::Auto,
            metrics_override: FontMetricsOverride::default(),
            size_adjust: None,
            feature_settings: Vec::new(),
            variant: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct FontFace {
    id: FontFaceId,
    family: String,
    descriptors: FontFaceDescriptors,
    parsed: ParsedDescriptors,
    style_rule: Option<StyleRuleKey>,
    origin: CascadeOrigin,
    layer: Option<String>,
    css_font_face: CssFontFace,
    callbacks: Vec<LoadFontCallback>,
}

impl FontFace {
    fn with_family(family: &str) -> Self {
        let id = FontFaceId::new();
        Self {
            id,
            family: String::from(family),
            descriptors: FontFaceDescriptors::default(),
            parsed: ParsedDescriptors::default(),
            style_rule: None,
            origin: CascadeOrigin::Author,
            layer: None,
            css_font_face: CssFontFace::new(id, UnicodeRangeSet::default()),
            callbacks: Vec::new(),
        }
    }

    /// Applies string descriptors the way the script constructor does:
    /// a value that fails to parse leaves the face in the error state.
    fn apply_constructor_descriptors(
        &mut self,
        descriptors: &FontFaceDescriptors,
        ctx: &mut LoadContext,
    ) {
        for descriptor in Descriptor::ALL {
            if let Err(e) = self.set_descriptor_value(descriptor, descriptors.get(descriptor), ctx) {
                self.css_font_face.set_error(Some(e), ctx);
            }
        }
    }

    /// A face for an `@font-face` rule. `None` if its selection
    /// capabilities come out invalid.
    pub fn from_rule(
        rule_key: StyleRuleKey,
        rule: &FontFaceRule,
        origin: CascadeOrigin,
        ctx: &mut LoadContext,
    ) -> Option<Self> {
        let mut face = Self::with_family(&rule.family);
        face.style_rule = Some(rule_key);
        face.origin = origin;
        face.layer = rule.layer.clone();
        for (descriptor, value) in &rule.descriptors {
            face.set_descriptor_value(*descriptor, value, ctx).ok()?;
        }
        if !face.capabilities().is_valid() {
            return None;
        }
        face.init_css_font_face(&rule.src, ctx);
        Some(face)
    }

    /// A script-constructed face whose source is a `src` descriptor string.
    pub fn from_source(
        family: &str,
        source: &str,
        descriptors: &FontFaceDescriptors,
        ctx: &mut LoadContext,
    ) -> Self {
        let mut face = Self::with_family(family);
        face.apply_constructor_descriptors(descriptors, ctx);
        match parse_src(source) {
            Some(src) => face.init_css_font_face(&src, ctx),
            None => {
                let error = FontFaceError::syntax(format!(
                    "The source provided ('{}') could not be parsed as a value list.",
                    source
                ));
                face.css_font_face.set_error(Some(error), ctx);
                face.init_css_font_face(&[], ctx);
            }
        }
        face
    }

    /// A script-constructed face from font bytes.
    pub fn from_binary(
        family: &str,
        bytes: &[u8],
        descriptors: &FontFaceDescriptors,
        ctx: &mut LoadContext,
    ) -> Self {
        let mut face = Self::with_family(family);
        face.apply_constructor_descriptors(descriptors, ctx);
        let ranges = face.unicode_range_set();
        face.css_font_face.set_ranges(ranges);
        if face.error().is_some() {
            return face;
        }

        let (source, decoded) = BinaryFontFaceSource::new(bytes, ctx);
        match decoded {
            Ok(()) => face.css_font_face.set_status(LoadStatus::Loaded, ctx),
            Err(e) => {
                ctx.add_console_message(
                    ConsoleLevel::Warning,
                    format!("OTS parsing error: {}", e.reason),
                );
                face.css_font_face.set_error(
                    Some(FontFaceError::syntax("Invalid font data in ArrayBuffer.")),
                    ctx,
                );
            }
        }
        let source = CssFontFaceSource::new(FontFaceSource::BinaryData(source), ctx);
        face.css_font_face.add_source(source);
        face
    }

    fn init_css_font_face(&mut self, src: &[FontFaceSrc], ctx: &mut LoadContext) {
        let ranges = self.unicode_range_set();
        self.css_font_face.set_ranges(ranges);
        if self.error().is_some() {
            return;
        }

        let display = self.parsed.display;
        for item in src {
            let source = match item {
                FontFaceSrc::Url(url) => {
                    if !ctx.downloads_allowed() || !url.is_supported_format() {
                        continue;
                    }
                    FontFaceSource::Remote(RemoteFontFaceSource::new(&url.url, display, ctx))
                }
                FontFaceSrc::Local(name) => FontFaceSource::Local(LocalFontFaceSource::new(name)),
            };
            let source = CssFontFaceSource::new(source, ctx);
            self.css_font_face.add_source(source);
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn id(&self) -> FontFaceId {
        self.id
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn set_family(&mut self, family: &str) {
        self.family = String::from(family);
    }

    /// Serialized value of a descriptor, or its initial value.
    pub fn descriptor(&self, descriptor: Descriptor) -> &str {
        self.descriptors.get(descriptor)
    }

    pub fn descriptors(&self) -> &FontFaceDescriptors {
        &self.descriptors
    }

    pub fn status(&self) -> LoadStatus {
        self.css_font_face.status()
    }

    pub fn error(&self) -> Option<&FontFaceError> {
        self.css_font_face.error()
    }

    pub fn display(&self) -> FontDisplay {
        self.parsed.display
    }

    pub fn style_rule(&self) -> Option<StyleRuleKey> {
        self.style_rule
    }

    pub fn is_css_connected(&self) -> bool {
        self.style_rule.is_some()
    }

    pub fn origin(&self) -> CascadeOrigin {
        self.origin
    }

    pub fn is_user_style(&self) -> bool {
        self.origin == CascadeOrigin::User
    }

    pub fn layer(&self) -> Option<&str> {
        self.layer.as_deref()
    }

    pub fn css_font_face(&self) -> &CssFontFace {
        &self.css_font_face
    }

    pub fn css_font_face_mut(&mut self) -> &mut CssFontFace {
        &mut self.css_font_face
    }

    pub fn metrics_override(&self) -> FontMetricsOverride {
        self.parsed.metrics_override
    }

    pub fn size_adjust(&self) -> Option<f32> {
        self.parsed.size_adjust
    }

    pub fn feature_settings(&self) -> &[FontFeature] {
        &self.parsed.feature_settings
    }

    /// `font-variant` keywords; empty for `normal`.
    pub fn variant(&self) -> &[String] {
        &self.parsed.variant
    }

    fn unicode_range_set(&self) -> UnicodeRangeSet {
        UnicodeRangeSet::new(self.parsed.unicode_range.clone())
    }

    // ── Descriptors ─────────────────────────────────────────────────────────

    /// Script-facing setter: an unparseable value is reported, not stored.
    pub fn set_descriptor(
        &mut self,
        descriptor: Descriptor,
        value: &str,
        ctx: &mut LoadContext,
    ) -> Result<(), FontFaceError> {
        self.set_descriptor_value(descriptor, value, ctx)
    }

    fn set_descriptor_value(
        &mut self,
        descriptor: Descriptor,
        value: &str,
        ctx: &mut LoadContext,
    ) -> Result<(), FontFaceError> {
        let parsed = parse_descriptor(descriptor, value).ok_or_else(|| {
            FontFaceError::syntax(format!("Failed to set '{}' as a property value.", value))
        })?;

        match parsed {
            DescriptorValue::Style(style) => self.parsed.style = Some(style),
            DescriptorValue::Weight(weight) => self.parsed.weight = Some(weight),
            DescriptorValue::Stretch(stretch) => self.parsed.stretch = Some(stretch),
            DescriptorValue::UnicodeRange(ranges) => {
                self.css_font_face
                    .set_ranges(UnicodeRangeSet::new(ranges.clone()));
                self.parsed.unicode_range = ranges;
            }
            DescriptorValue::Variant(mut keywords) => {
                keywords.retain(|k| k != "normal");
                self.parsed.variant = keywords;
                ctx.notify(Notification::FaceInvalidated(self.id));
            }
            DescriptorValue::FeatureSettings(features) => {
                self.parsed.feature_settings = features;
                ctx.notify(Notification::FaceInvalidated(self.id));
            }
            DescriptorValue::Display(display) => {
                self.parsed.display = display;
                self.css_font_face.set_display(display, ctx);
            }
            DescriptorValue::MetricOverride(value) => {
                match descriptor {
                    Descriptor::AscentOverride => self.parsed.metrics_override.ascent = value,
                    Descriptor::DescentOverride => self.parsed.metrics_override.descent = value,
                    _ => self.parsed.metrics_override.line_gap = value,
                }
                ctx.notify(Notification::FaceInvalidated(self.id));
            }
            DescriptorValue::SizeAdjust(factor) => {
                self.parsed.size_adjust = if factor == 1.0 { None } else { Some(factor) };
                ctx.notify(Notification::FaceInvalidated(self.id));
            }
        }
        self.descriptors.set(descriptor, value.trim().to_string());
        Ok(())
    }

    /// The ranges on each axis this face declares it can render.
    pub fn capabilities(&self) -> FontSelectionCapabilities {
        let normal = FontSelectionCapabilities::default();
        let mut capabilities = normal;

        match self.parsed.stretch {
            None | Some(FontStretchValue::Auto) => {}
            Some(FontStretchValue::Keyword(width)) => {
                capabilities.width = FontSelectionRange::point(width)
            }
            Some(FontStretchValue::Percentage(pct)) => {
                capabilities.width = FontSelectionRange::point(pct.into())
            }
            Some(FontStretchValue::Range(from, to)) => {
                capabilities.width = FontSelectionRange::new(from.into(), to.into())
            }
        }

        match &self.parsed.style {
            None | Some(FontStyleValue::Auto) | Some(FontStyleValue::Normal) => {
                capabilities.slope = FontSelectionRange::point(NORMAL_SLOPE)
            }
            Some(FontStyleValue::Italic) => capabilities.slope = FontSelectionRange::point(ITALIC_SLOPE),
            Some(FontStyleValue::Oblique(angles)) => match angles.as_slice() {
                [] => capabilities.slope = FontSelectionRange::point(ITALIC_SLOPE),
                [angle] => capabilities.slope = FontSelectionRange::point((*angle).into()),
                [from, to, ..] => {
                    capabilities.slope = FontSelectionRange::new((*from).into(), (*to).into())
                }
            },
        }

        let in_weight_range = |w: f32| (1.0..=1000.0).contains(&w);
        match self.parsed.weight {
            None | Some(FontWeightValue::Auto) | Some(FontWeightValue::Normal) => {
                capabilities.weight = FontSelectionRange::point(NORMAL_WEIGHT)
            }
            Some(FontWeightValue::Bold) => capabilities.weight = FontSelectionRange::point(BOLD_WEIGHT),
            Some(FontWeightValue::Absolute(weight)) => {
                if !in_weight_range(weight) {
                    return normal;
                }
                capabilities.weight = FontSelectionRange::point(FontSelectionValue::from(weight));
            }
            Some(FontWeightValue::Range(from, to)) => {
                if !in_weight_range(from) || !in_weight_range(to) {
                    return normal;
                }
                capabilities.weight = FontSelectionRange::new(from.into(), to.into());
            }
        }

        capabilities
    }

    pub(crate) fn attributes(&self) -> FaceAttributes {
        FaceAttributes {
            capabilities: self.capabilities(),
            size_adjust: self.parsed.size_adjust,
            metrics_override: self.parsed.metrics_override,
            feature_settings: self.parsed.feature_settings.clone(),
            variant: self.parsed.variant.clone(),
        }
    }

    // ── Loading ─────────────────────────────────────────────────────────────

    pub fn font_data(
        &mut self,
        description: &FontDescription,
        ctx: &mut LoadContext,
    ) -> Option<Arc<SimpleFontData>> {
        let attributes = self.attributes();
        self.css_font_face.font_data(description, &attributes, ctx)
    }

    /// Kicks off loading if nothing has been tried yet.
    pub fn load(&mut self, ctx: &mut LoadContext) {
        if self.status() == LoadStatus::Unloaded {
            self.css_font_face.load(ctx);
        }
    }

    /// `load()` called from script. A load still in flight blocks the
    /// first rendering of a document until it settles.
    pub fn load_imperatively(&mut self, ctx: &mut LoadContext) {
        self.load(ctx);
        if self.status() == LoadStatus::Loading {
            ctx.did_begin_imperative_load(self.id);
        }
    }

    pub fn approximate_blank_character_count(&self) -> usize {
        if self.status() == LoadStatus::Loading {
            self.css_font_face.approximate_blank_character_count()
        } else {
            0
        }
    }

    pub fn had_blank_text(&self) -> bool {
        self.css_font_face.had_blank_text()
    }

    /// Registers `callback`, or hands it back if the face already settled
    /// and it must be notified right away.
    pub(crate) fn add_callback(&mut self, callback: LoadFontCallback) -> Option<LoadFontCallback> {
        if self.status().is_settled() {
            return Some(callback);
        }
        self.callbacks.push(callback);
        None
    }

    pub(crate) fn take_callbacks(&mut self) -> Vec<LoadFontCallback> {
        core::mem::take(&mut self.callbacks)
    }

    pub fn set_display(&mut self, display: FontDisplay, ctx: &mut LoadContext) {
        self.parsed.display = display;
        self.descriptors.set(Descriptor::FontDisplay, display.as_str());
        self.css_font_face.set_display(display, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DocumentState, FontLoadingConfig};
    use crate::platform::{DeferredFetcher, MemoryFontProvider, SfntSniffDecoder};
    use crate::selection::{CONDENSED_WIDTH, SEMI_CONDENSED_WIDTH};
    use alloc::boxed::Box;

    fn context() -> LoadContext {
        LoadContext::new(
            FontLoadingConfig::default(),
            DocumentState::document(),
            Box::new(MemoryFontProvider::new().with_font("Arial", "Arial")),
            Box::new(DeferredFetcher),
            Box::new(SfntSniffDecoder),
        )
    }

    fn face_with(descriptor: Descriptor, value: &str) -> FontFace {
        let mut ctx = context();
        let descriptors = FontFaceDescriptors::default().with(descriptor, value);
        FontFace::from_source("Test", "local(Arial)", &descriptors, &mut ctx)
    }

    #[test]
    fn default_descriptor_values() {
        let face = face_with(Descriptor::FontStyle, "normal");
        assert_eq!(face.descriptor(Descriptor::FontWeight), "normal");
        assert_eq!(face.descriptor(Descriptor::UnicodeRange), "U+0-10FFFF");
        assert_eq!(face.descriptor(Descriptor::FontDisplay), "auto");
        assert_eq!(face.descriptor(Descriptor::SizeAdjust), "100%");
        assert_eq!(face.capabilities(), FontSelectionCapabilities::default());
        assert_eq!(face.size_adjust(), None);
    }

    #[test]
    fn feature_settings_and_variant_are_kept() {
        let face = face_with(Descriptor::FontFeatureSettings, "\"liga\" off, \"smcp\"");
        assert_eq!(
            face.feature_settings(),
            &[
                FontFeature { tag: *b"liga", value: 0 },
                FontFeature { tag: *b"smcp", value: 1 },
            ]
        );
        assert_eq!(face.attributes().feature_settings.len(), 2);

        let face = face_with(Descriptor::FontVariant, "small-caps");
        assert_eq!(face.variant(), &[String::from("small-caps")]);
        assert!(face_with(Descriptor::FontVariant, "normal").variant().is_empty());
    }

    #[test]
    fn decreasing_ranges_are_swapped() {
        let face = face_with(Descriptor::FontStretch, "120% 65%");
        let caps = face.capabilities();
        assert_eq!(caps.width.minimum, FontSelectionValue::from(65.0));
        assert_eq!(caps.width.maximum, FontSelectionValue::from(120.0));

        let face = face_with(Descriptor::FontWeight, "800 200");
        let caps = face.capabilities();
        assert_eq!(caps.weight, FontSelectionCapabilities::with_weight(200.0, 800.0).weight);
    }

    #[test]
    fn keyword_capabilities() {
        assert_eq!(
            face_with(Descriptor::FontStretch, "condensed").capabilities().width,
            FontSelectionRange::point(CONDENSED_WIDTH)
        );
        assert_eq!(
            face_with(Descriptor::FontStretch, "semi-condensed").capabilities().width,
            FontSelectionRange::point(SEMI_CONDENSED_WIDTH)
        );
        assert_eq!(
            face_with(Descriptor::FontStyle, "italic").capabilities().slope,
            FontSelectionRange::point(ITALIC_SLOPE)
        );
        assert_eq!(
            face_with(Descriptor::FontStyle, "oblique 20deg 5deg").capabilities().slope,
            FontSelectionRange::new(5.0f32.into(), 20.0f32.into())
        );
        assert_eq!(
            face_with(Descriptor::FontWeight, "bold").capabilities().weight,
            FontSelectionRange::point(BOLD_WEIGHT)
        );
    }

    #[test]
    fn metric_overrides_are_fractions() {
        let face = face_with(Descriptor::AscentOverride, "80%");
        assert_eq!(face.metrics_override().ascent, Some(0.8));
        let face = face_with(Descriptor::SizeAdjust, "50%");
        assert_eq!(face.size_adjust(), Some(0.5));
    }

    #[test]
    fn bad_descriptor_in_constructor_sets_error() {
        let face = face_with(Descriptor::FontWeight, "heavy");
        assert_eq!(face.status(), LoadStatus::Error);
        assert_eq!(
            face.error(),
            Some(&FontFaceError::syntax("Failed to set 'heavy' as a property value."))
        );
        assert!(!face.css_font_face().is_valid());
    }

    #[test]
    fn bad_source_string_sets_error() {
        let mut ctx = context();
        let face = FontFace::from_source("Test", "nonsense(", &FontFaceDescriptors::default(), &mut ctx);
        assert_eq!(face.status(), LoadStatus::Error);
        assert_eq!(
            face.error().map(|e| e.to_string()),
            Some("SyntaxError: The source provided ('nonsense(') could not be parsed as a value list.".into())
        );
    }

    #[test]
    fn setter_reports_without_erroring_face() {
        let mut ctx = context();
        let mut face = face_with(Descriptor::FontStyle, "normal");
        assert!(face.set_descriptor(Descriptor::FontStyle, "sideways", &mut ctx).is_err());
        assert_eq!(face.status(), LoadStatus::Unloaded);
        assert!(face.set_descriptor(Descriptor::FontStyle, "italic", &mut ctx).is_ok());
        assert_eq!(face.descriptor(Descriptor::FontStyle), "italic");
    }

    #[test]
    fn binary_faces() {
        let mut ctx = context();
        let mut bytes = b"\x00\x01\x00\x00".to_vec();
        bytes.resize(64, 0);
        let face = FontFace::from_binary("Bin", &bytes, &FontFaceDescriptors::default(), &mut ctx);
        assert_eq!(face.status(), LoadStatus::Loaded);
        assert!(face.css_font_face().is_valid());

        let face = FontFace::from_binary("Bin", b"garbage", &FontFaceDescriptors::default(), &mut ctx);
        assert_eq!(face.status(), LoadStatus::Error);
        assert_eq!(
            face.error(),
            Some(&FontFaceError::syntax("Invalid font data in ArrayBuffer."))
        );
        assert_eq!(face.css_font_face().sources().count(), 1);
        assert!(ctx
            .take_console_messages()
            .iter()
            .any(|m| m.text.starts_with("OTS parsing error")));
    }

    #[test]
    fn unsupported_remote_sources_are_skipped() {
        let mut ctx = context();
        let face = FontFace::from_source(
            "Test",
            "url(a.svg) format(svg), url(b.woff2) format(woff2), local(Arial)",
            &FontFaceDescriptors::default(),
            &mut ctx,
        );
        assert_eq!(face.css_font_face().sources().count(), 2);
    }

    #[test]
    fn downloads_can_be_disabled() {
        let mut ctx = context();
        ctx.config.downloadable_fonts_enabled = false;
        let face = FontFace::from_source(
            "Test",
            "url(b.woff2), local(Arial)",
            &FontFaceDescriptors::default(),
            &mut ctx,
        );
        assert_eq!(face.css_font_face().sources().count(), 1);
    }
}

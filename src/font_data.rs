//! Font descriptions as requested by style, and the font data handed back.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::descriptors::FontFeature;
use crate::selection::{
    FontSelectionCapabilities, FontSelectionRequest, FontSelectionValue, NORMAL_SLOPE,
    NORMAL_WEIGHT, NORMAL_WIDTH,
};
use crate::unicode::UnicodeRangeSet;
use crate::{FontFaceId, SourceId};

// ── FontDescription ─────────────────────────────────────────────────────────

/// What style asks for: families, size and a point on each selection axis.
#[derive(Debug, Clone, PartialEq)]
pub struct FontDescription {
    pub families: Vec<String>,
    pub size: f32,
    pub selection: FontSelectionRequest,
    pub synthetic_bold_allowed: bool,
    pub synthetic_italic_allowed: bool,
    pub synthetic_bold: bool,
    pub synthetic_italic: bool,
    /// `font-variation-settings` axes.
    pub variation_settings: Vec<([u8; 4], f32)>,
    pub palette: Option<String>,
}

impl FontDescription {
    pub fn new(family: &str, size: f32) -> Self {
        Self {
            families: vec![String::from(family)],
            size,
            selection: FontSelectionRequest::default(),
            synthetic_bold_allowed: true,
            synthetic_italic_allowed: true,
            synthetic_bold: false,
            synthetic_italic: false,
            variation_settings: Vec::new(),
            palette: None,
        }
    }

    pub fn with_families<S: Into<String>>(families: impl IntoIterator<Item = S>, size: f32) -> Self {
        Self {
            families: families.into_iter().map(Into::into).collect(),
            ..Self::new("", size)
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.selection.weight = weight.into();
        self
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.selection.width = width.into();
        self
    }

    pub fn with_slope(mut self, slope: f32) -> Self {
        self.selection.slope = slope.into();
        self
    }

    pub fn with_variation(mut self, tag: [u8; 4], value: f32) -> Self {
        self.variation_settings.push((tag, value));
        self
    }

    /// Key identifying one instantiation of a face: everything that
    /// changes the produced font data, but not the family list.
    pub fn cache_key(&self) -> FontCacheKey {
        FontCacheKey {
            size: (self.size.max(0.0) * 100.0).round() as u32,
            selection: self.selection,
            synthetic_bold: self.synthetic_bold,
            synthetic_italic: self.synthetic_italic,
            synthesis_allowed: (self.synthetic_bold_allowed, self.synthetic_italic_allowed),
            variations: self
                .variation_settings
                .iter()
                .map(|(tag, value)| (*tag, value.to_bits()))
                .collect(),
            palette: self.palette.clone(),
        }
    }

    pub fn size_adjusted(&self, factor: f32) -> Self {
        Self {
            size: self.size * factor,
            ..self.clone()
        }
    }

    /// Same size, normal on every selection axis. Used for `local()`
    /// lookups, which name a single face and must not be re-matched.
    pub fn unstyled(&self) -> Self {
        Self {
            selection: FontSelectionRequest {
                weight: NORMAL_WEIGHT,
                width: NORMAL_WIDTH,
                slope: NORMAL_SLOPE,
            },
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontCacheKey {
    /// Size in hundredths of a pixel.
    size: u32,
    selection: FontSelectionRequest,
    synthetic_bold: bool,
    synthetic_italic: bool,
    synthesis_allowed: (bool, bool),
    variations: Vec<([u8; 4], u32)>,
    palette: Option<String>,
}

// ── Typefaces ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypefaceSource {
    /// File on disk, with the index inside a collection.
    Path { path: String, font_index: usize },
    /// Provided by the embedder without a backing file.
    Builtin,
}

/// A font installed on the system, found through `local()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemTypeface {
    pub unique_name: String,
    pub family: String,
    pub source: TypefaceSource,
}

impl SystemTypeface {
    pub fn builtin(unique_name: &str, family: &str) -> Self {
        Self {
            unique_name: String::from(unique_name),
            family: String::from(family),
            source: TypefaceSource::Builtin,
        }
    }
}

/// A decoded downloaded or in-memory font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontCustomPlatformData {
    pub bytes: Arc<[u8]>,
    pub family_name: Option<String>,
    pub num_glyphs: Option<u16>,
    pub may_be_icon_font: bool,
}

impl FontCustomPlatformData {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: Arc::from(bytes),
            family_name: None,
            num_glyphs: None,
            may_be_icon_font: false,
        }
    }

    pub fn with_family_name(mut self, family_name: String) -> Self {
        self.may_be_icon_font = looks_like_icon_font(&family_name);
        self.family_name = Some(family_name);
        self
    }

    pub fn with_num_glyphs(mut self, num_glyphs: u16) -> Self {
        self.num_glyphs = Some(num_glyphs);
        self
    }

    pub fn data_size(&self) -> usize {
        self.bytes.len()
    }
}

fn looks_like_icon_font(family_name: &str) -> bool {
    let lower = family_name.to_ascii_lowercase();
    lower.contains("icon") || lower.contains("awesome") || lower.contains("symbols")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Typeface {
    Web(Arc<FontCustomPlatformData>),
    System(Arc<SystemTypeface>),
}

// ── SimpleFontData ──────────────────────────────────────────────────────────

/// Line metric overrides, as fractions of the used font size.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct FontMetricsOverride {
    pub ascent: Option<f32>,
    pub descent: Option<f32>,
    pub line_gap: Option<f32>,
}

impl FontMetricsOverride {
    pub fn is_empty(&self) -> bool {
        self.ascent.is_none() && self.descent.is_none() && self.line_gap.is_none()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CustomFontKind {
    /// Not a web font.
    None,
    WebFont,
    /// Stand-in used while the real font of `face` is loading.
    LoadingFallback {
        visible: bool,
        face: FontFaceId,
        source: SourceId,
    },
}

/// One concrete, sized font instance.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleFontData {
    pub typeface: Typeface,
    pub size: f32,
    pub synthetic_bold: bool,
    pub synthetic_italic: bool,
    /// The request clamped to what the face can render.
    pub selection: FontSelectionRequest,
    pub variation_settings: Vec<([u8; 4], f32)>,
    pub metrics_override: FontMetricsOverride,
    /// The face's `font-feature-settings`, applied before the element's own.
    pub feature_settings: Vec<FontFeature>,
    /// The face's `font-variant` keywords.
    pub variant: Vec<String>,
    pub custom: CustomFontKind,
}

fn clamp_to(value: FontSelectionValue, min: FontSelectionValue, max: FontSelectionValue) -> FontSelectionValue {
    if min > max {
        value
    } else {
        value.max(min).min(max)
    }
}

impl SimpleFontData {
    pub fn new(
        typeface: Typeface,
        description: &FontDescription,
        capabilities: &FontSelectionCapabilities,
        custom: CustomFontKind,
    ) -> Self {
        let request = description.selection;
        Self {
            typeface,
            size: description.size,
            synthetic_bold: description.synthetic_bold,
            synthetic_italic: description.synthetic_italic,
            selection: FontSelectionRequest {
                weight: clamp_to(
                    request.weight,
                    capabilities.weight.minimum,
                    capabilities.weight.maximum,
                ),
                width: clamp_to(
                    request.width,
                    capabilities.width.minimum,
                    capabilities.width.maximum,
                ),
                slope: clamp_to(
                    request.slope,
                    capabilities.slope.minimum,
                    capabilities.slope.maximum,
                ),
            },
            variation_settings: description.variation_settings.clone(),
            metrics_override: FontMetricsOverride::default(),
            feature_settings: Vec::new(),
            variant: Vec::new(),
            custom,
        }
    }

    pub fn is_custom_font(&self) -> bool {
        self.custom != CustomFontKind::None
    }

    pub fn is_loading_fallback(&self) -> bool {
        matches!(self.custom, CustomFontKind::LoadingFallback { .. })
    }

    /// Whether text drawn with this data should be painted at all.
    pub fn should_skip_drawing(&self) -> bool {
        matches!(
            self.custom,
            CustomFontKind::LoadingFallback { visible: false, .. }
        )
    }

    pub fn metrics_overridden(&self, metrics_override: FontMetricsOverride) -> Arc<SimpleFontData> {
        Arc::new(SimpleFontData {
            metrics_override,
            ..self.clone()
        })
    }

    pub fn with_face_features(&self, feature_settings: &[FontFeature], variant: &[String]) -> Arc<SimpleFontData> {
        Arc::new(SimpleFontData {
            feature_settings: feature_settings.to_vec(),
            variant: variant.to_vec(),
            ..self.clone()
        })
    }
}

// ── SegmentedFontData ───────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FontDataKind {
    /// Produced by a web font face.
    Custom,
    /// A platform font reached through `local()`.
    CacheDerived,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontDataForRangeSet {
    pub font_data: Arc<SimpleFontData>,
    pub ranges: UnicodeRangeSet,
    pub kind: FontDataKind,
    pub face: FontFaceId,
}

/// Ordered list of per-range font data; the first entry covering a
/// character is used for it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SegmentedFontData {
    entries: Vec<FontDataForRangeSet>,
}

impl SegmentedFontData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: FontDataForRangeSet) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FontDataForRangeSet] {
        &self.entries
    }

    pub fn font_data_for_char(&self, c: char) -> Option<&FontDataForRangeSet> {
        self.entries.iter().find(|e| e.ranges.contains(c as u32))
    }

    pub fn is_loading_fallback(&self) -> bool {
        self.entries.iter().any(|e| e.font_data.is_loading_fallback())
    }
}

//! The [`@font-face`][ff] descriptors and their parsers.
//!
//! [ff]: https://drafts.csswg.org/css-fonts/#at-font-face-rule

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use cssparser::{
    match_ignore_ascii_case, AtRuleParser, CowRcStr, DeclarationParser, Delimiter, ParseError,
    Parser, ParserInput, ParserState, QualifiedRuleParser, RuleBodyItemParser, RuleBodyParser,
    Token,
};
use log::warn;

use crate::selection::{
    FontSelectionValue, CONDENSED_WIDTH, EXPANDED_WIDTH, EXTRA_CONDENSED_WIDTH,
    EXTRA_EXPANDED_WIDTH, NORMAL_WIDTH, SEMI_CONDENSED_WIDTH, SEMI_EXPANDED_WIDTH,
    ULTRA_CONDENSED_WIDTH, ULTRA_EXPANDED_WIDTH,
};
use crate::unicode::UnicodeRange;

type CssResult<'i, T> = Result<T, ParseError<'i, ()>>;

/// Runs `parse` over the whole of `css`, failing on leftover tokens.
fn parse_value<T>(
    css: &str,
    parse: impl for<'i, 't> FnOnce(&mut Parser<'i, 't>) -> CssResult<'i, T>,
) -> Option<T> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    parser.parse_entirely(parse).ok()
}

// ── font-display ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FontDisplay {
    #[default]
    Auto,
    Block,
    Swap,
    Fallback,
    Optional,
}

impl FontDisplay {
    pub fn parse(css: &str) -> Option<Self> {
        parse_value(css, parse_font_display)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FontDisplay::Auto => "auto",
            FontDisplay::Block => "block",
            FontDisplay::Swap => "swap",
            FontDisplay::Fallback => "fallback",
            FontDisplay::Optional => "optional",
        }
    }
}

fn parse_font_display<'i, 't>(input: &mut Parser<'i, 't>) -> CssResult<'i, FontDisplay> {
    let location = input.current_source_location();
    let ident = input.expect_ident()?;
    match_ignore_ascii_case! { &**ident,
        "auto" => Ok(FontDisplay::Auto),
        "block" => Ok(FontDisplay::Block),
        "swap" => Ok(FontDisplay::Swap),
        "fallback" => Ok(FontDisplay::Fallback),
        "optional" => Ok(FontDisplay::Optional),
        _ => Err(location.new_custom_error(())),
    }
}

// ── font-style ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum FontStyleValue {
    Auto,
    Normal,
    Italic,
    /// `oblique [<angle>{1,2}]?`, angles in degrees.
    Oblique(Vec<f32>),
}

fn parse_angle<'i, 't>(input: &mut Parser<'i, 't>) -> CssResult<'i, f32> {
    let location = input.current_source_location();
    let degrees = match *input.next()? {
        Token::Dimension {
            value, ref unit, ..
        } => {
            match_ignore_ascii_case! { &**unit,
                "deg" => value,
                "grad" => value * 360.0 / 400.0,
                "rad" => value.to_degrees(),
                "turn" => value * 360.0,
                _ => return Err(location.new_custom_error(())),
            }
        }
        _ => return Err(location.new_custom_error(())),
    };
    if !(-90.0..=90.0).contains(&degrees) {
        return Err(location.new_custom_error(()));
    }
    Ok(degrees)
}

fn parse_font_style<'i, 't>(input: &mut Parser<'i, 't>) -> CssResult<'i, FontStyleValue> {
    let location = input.current_source_location();
    let ident = input.expect_ident()?.clone();
    match_ignore_ascii_case! { &*ident,
        "auto" => Ok(FontStyleValue::Auto),
        "normal" => Ok(FontStyleValue::Normal),
        "italic" => Ok(FontStyleValue::Italic),
        "oblique" => {
            let mut angles = Vec::new();
            if let Ok(first) = input.try_parse(parse_angle) {
                angles.push(first);
                if let Ok(second) = input.try_parse(parse_angle) {
                    angles.push(second);
                }
            }
            Ok(FontStyleValue::Oblique(angles))
        },
        _ => Err(location.new_custom_error(())),
    }
}

// ── font-weight ─────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum FontWeightValue {
    Auto,
    Normal,
    Bold,
    Absolute(f32),
    Range(f32, f32),
}

fn parse_weight_number<'i, 't>(input: &mut Parser<'i, 't>) -> CssResult<'i, f32> {
    let location = input.current_source_location();
    let value = input.expect_number()?;
    if (1.0..=1000.0).contains(&value) {
        Ok(value)
    } else {
        Err(location.new_custom_error(()))
    }
}

fn parse_font_weight<'i, 't>(input: &mut Parser<'i, 't>) -> CssResult<'i, FontWeightValue> {
    let keyword = input.try_parse(|input| -> CssResult<'i, FontWeightValue> {
        let location = input.current_source_location();
        let ident = input.expect_ident()?;
        // `lighter` and `bolder` are not valid inside @font-face
        match_ignore_ascii_case! { &**ident,
            "auto" => Ok(FontWeightValue::Auto),
            "normal" => Ok(FontWeightValue::Normal),
            "bold" => Ok(FontWeightValue::Bold),
            _ => Err(location.new_custom_error(())),
        }
    });
    if let Ok(keyword) = keyword {
        return Ok(keyword);
    }

    let first = parse_weight_number(input)?;
    match input.try_parse(parse_weight_number) {
        Ok(second) => Ok(FontWeightValue::Range(first, second)),
        Err(_) => Ok(FontWeightValue::Absolute(first)),
    }
}

// ── font-stretch ────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum FontStretchValue {
    Auto,
    Keyword(FontSelectionValue),
    /// Percentage, `100.0` is normal.
    Percentage(f32),
    Range(f32, f32),
}

fn parse_stretch_percentage<'i, 't>(input: &mut Parser<'i, 't>) -> CssResult<'i, f32> {
    let location = input.current_source_location();
    let value = input.expect_percentage()? * 100.0;
    if value < 0.0 {
        return Err(location.new_custom_error(()));
    }
    Ok(value)
}

fn parse_font_stretch<'i, 't>(input: &mut Parser<'i, 't>) -> CssResult<'i, FontStretchValue> {
    let keyword = input.try_parse(|input| -> CssResult<'i, FontStretchValue> {
        let location = input.current_source_location();
        let ident = input.expect_ident()?;
        let width = match_ignore_ascii_case! { &**ident,
            "auto" => return Ok(FontStretchValue::Auto),
            "normal" => NORMAL_WIDTH,
            "ultra-condensed" => ULTRA_CONDENSED_WIDTH,
            "extra-condensed" => EXTRA_CONDENSED_WIDTH,
            "condensed" => CONDENSED_WIDTH,
            "semi-condensed" => SEMI_CONDENSED_WIDTH,
            "semi-expanded" => SEMI_EXPANDED_WIDTH,
            "expanded" => EXPANDED_WIDTH,
            "extra-expanded" => EXTRA_EXPANDED_WIDTH,
            "ultra-expanded" => ULTRA_EXPANDED_WIDTH,
            _ => return Err(location.new_custom_error(())),
        };
        Ok(FontStretchValue::Keyword(width))
    });
    if let Ok(keyword) = keyword {
        return Ok(keyword);
    }

    let first = parse_stretch_percentage(input)?;
    match input.try_parse(parse_stretch_percentage) {
        Ok(second) => Ok(FontStretchValue::Range(first, second)),
        Err(_) => Ok(FontStretchValue::Percentage(first)),
    }
}

// ── unicode-range ───────────────────────────────────────────────────────────

fn parse_unicode_ranges<'i, 't>(input: &mut Parser<'i, 't>) -> CssResult<'i, Vec<UnicodeRange>> {
    input.parse_comma_separated(|input| -> CssResult<'i, UnicodeRange> {
        let range = cssparser::UnicodeRange::parse(input)?;
        Ok(UnicodeRange::new(
            range.start,
            range.end.min(UnicodeRange::MAX_CODEPOINT),
        ))
    })
}

// ── font-feature-settings / font-variant ────────────────────────────────────

/// One `"tag" value` pair of `font-feature-settings`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FontFeature {
    pub tag: [u8; 4],
    pub value: u32,
}

fn parse_feature_tag<'i, 't>(input: &mut Parser<'i, 't>) -> CssResult<'i, [u8; 4]> {
    let location = input.current_source_location();
    let tag = input.expect_string()?;
    let bytes = tag.as_bytes();
    if bytes.len() != 4 || !bytes.iter().all(|b| (0x20..=0x7E).contains(b)) {
        return Err(location.new_custom_error(()));
    }
    Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn parse_font_feature_settings<'i, 't>(
    input: &mut Parser<'i, 't>,
) -> CssResult<'i, Vec<FontFeature>> {
    if input.try_parse(|i| i.expect_ident_matching("normal")).is_ok() {
        return Ok(Vec::new());
    }
    input.parse_comma_separated(|input| -> CssResult<'i, FontFeature> {
        let tag = parse_feature_tag(input)?;
        if let Ok(value) = input.try_parse(|i| i.expect_integer()) {
            if value < 0 {
                return Err(input.new_custom_error(()));
            }
            return Ok(FontFeature {
                tag,
                value: value as u32,
            });
        }
        let value = match input.try_parse(|i| i.expect_ident_cloned()) {
            Ok(ident) if ident.eq_ignore_ascii_case("off") => 0,
            Ok(ident) if ident.eq_ignore_ascii_case("on") => 1,
            Ok(_) => return Err(input.new_custom_error(())),
            Err(_) => 1,
        };
        Ok(FontFeature { tag, value })
    })
}

fn parse_font_variant<'i, 't>(input: &mut Parser<'i, 't>) -> CssResult<'i, Vec<String>> {
    let mut values = Vec::new();
    while !input.is_exhausted() {
        let location = input.current_source_location();
        match *input.next()? {
            Token::Ident(ref ident) => values.push(ident.to_ascii_lowercase()),
            Token::Function(ref name) => {
                let name = name.to_ascii_lowercase();
                input.parse_nested_block(|i| -> CssResult<'i, ()> {
                    while i.next().is_ok() {}
                    Ok(())
                })?;
                values.push(name);
            }
            _ => return Err(location.new_custom_error(())),
        }
    }
    if values.is_empty() {
        return Err(input.new_custom_error(()));
    }
    Ok(values)
}

// ── metric overrides / size-adjust ──────────────────────────────────────────

fn parse_non_negative_percentage<'i, 't>(input: &mut Parser<'i, 't>) -> CssResult<'i, f32> {
    let location = input.current_source_location();
    let value = input.expect_percentage()?;
    if value < 0.0 {
        return Err(location.new_custom_error(()));
    }
    Ok(value)
}

/// `normal | <percentage [0,∞]>`; `normal` is stored as `None`.
fn parse_metric_override<'i, 't>(input: &mut Parser<'i, 't>) -> CssResult<'i, Option<f32>> {
    if input.try_parse(|i| i.expect_ident_matching("normal")).is_ok() {
        return Ok(None);
    }
    parse_non_negative_percentage(input).map(Some)
}

// ── font-family ─────────────────────────────────────────────────────────────

fn parse_family_name<'i, 't>(input: &mut Parser<'i, 't>) -> CssResult<'i, String> {
    if let Ok(name) = input.try_parse(|i| i.expect_string().map(|s| (**s).to_owned())) {
        return Ok(name);
    }

    let location = input.current_source_location();
    let first = (**input.expect_ident()?).to_owned();
    let reserved = crate::is_generic_family(&first)
        || ["initial", "inherit", "unset", "default", "revert"]
            .iter()
            .any(|k| first.eq_ignore_ascii_case(k));
    if reserved {
        return Err(location.new_custom_error(()));
    }

    let mut name = first;
    while let Ok(ident) = input.try_parse(|i| i.expect_ident().map(|s| (**s).to_owned())) {
        name.push(' ');
        name.push_str(&ident);
    }
    Ok(name)
}

/// Parses a `font-family` descriptor value.
pub fn parse_font_family(css: &str) -> Option<String> {
    parse_value(css, parse_family_name)
}

// ── src ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlSource {
    pub url: String,
    pub format_hints: Vec<String>,
    pub tech_hints: Vec<String>,
}

impl UrlSource {
    /// Formats the decoder can be asked to handle. Sources without a
    /// `format()` hint are downloaded unless they look like EOT files.
    pub fn is_supported_format(&self) -> bool {
        if self.format_hints.is_empty() {
            let lower = self.url.to_ascii_lowercase();
            return lower.starts_with("data:") || !lower.ends_with(".eot");
        }
        let format_ok = self.format_hints.iter().any(|hint| {
            matches!(
                hint.as_str(),
                "truetype"
                    | "opentype"
                    | "woff"
                    | "woff2"
                    | "collection"
                    | "truetype-variations"
                    | "opentype-variations"
                    | "woff-variations"
                    | "woff2-variations"
            )
        });
        let tech_ok = self.tech_hints.iter().all(|tech| {
            matches!(
                tech.as_str(),
                "features-opentype"
                    | "features-aat"
                    | "variations"
                    | "color-colrv0"
                    | "color-colrv1"
                    | "color-cbdt"
                    | "color-sbix"
                    | "palettes"
            )
        });
        format_ok && tech_ok
    }
}

/// One entry of the `src` descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontFaceSrc {
    Url(UrlSource),
    Local(String),
}

fn parse_string_or_ident<'i, 't>(input: &mut Parser<'i, 't>) -> CssResult<'i, String> {
    let location = input.current_source_location();
    match *input.next()? {
        Token::QuotedString(ref s) | Token::Ident(ref s) => Ok(s.to_ascii_lowercase()),
        _ => Err(location.new_custom_error(())),
    }
}

fn parse_one_src<'i, 't>(input: &mut Parser<'i, 't>) -> CssResult<'i, FontFaceSrc> {
    if input.try_parse(|i| i.expect_function_matching("local")).is_ok() {
        let name = input.parse_nested_block(|i| -> CssResult<'i, String> {
            let name = parse_family_name(i)?;
            i.expect_exhausted()?;
            Ok(name)
        })?;
        input.expect_exhausted()?;
        return Ok(FontFaceSrc::Local(name));
    }

    let url = input.expect_url()?;
    let url = String::from(&*url);

    // Parsing optional format()
    let format_hints = if input
        .try_parse(|i| i.expect_function_matching("format"))
        .is_ok()
    {
        input.parse_nested_block(|i| -> CssResult<'i, Vec<String>> {
            i.parse_comma_separated(parse_string_or_ident)
        })?
    } else {
        Vec::new()
    };

    let tech_hints = if input.try_parse(|i| i.expect_function_matching("tech")).is_ok() {
        input.parse_nested_block(|i| -> CssResult<'i, Vec<String>> {
            i.parse_comma_separated(|i| -> CssResult<'i, String> {
                Ok(i.expect_ident()?.to_ascii_lowercase())
            })
        })?
    } else {
        Vec::new()
    };

    input.expect_exhausted()?;
    Ok(FontFaceSrc::Url(UrlSource {
        url,
        format_hints,
        tech_hints,
    }))
}

fn parse_src_list<'i, 't>(input: &mut Parser<'i, 't>) -> CssResult<'i, Vec<FontFaceSrc>> {
    let mut sources = Vec::new();
    loop {
        // unparseable entries are dropped individually
        if let Ok(source) = input.parse_until_before(Delimiter::Comma, parse_one_src) {
            sources.push(source);
        }
        if input.next().is_err() {
            break;
        }
    }
    if sources.is_empty() {
        return Err(input.new_custom_error(()));
    }
    Ok(sources)
}

/// Parses a `src` descriptor value.
pub fn parse_src(css: &str) -> Option<Vec<FontFaceSrc>> {
    parse_value(css, parse_src_list)
}

// ── Descriptor ids and parsed values ────────────────────────────────────────

/// The settable descriptors of a face, besides `font-family` and `src`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Descriptor {
    FontStyle,
    FontWeight,
    FontStretch,
    UnicodeRange,
    FontVariant,
    FontFeatureSettings,
    FontDisplay,
    AscentOverride,
    DescentOverride,
    LineGapOverride,
    SizeAdjust,
}

impl Descriptor {
    pub const ALL: [Descriptor; 11] = [
        Descriptor::FontStyle,
        Descriptor::FontWeight,
        Descriptor::FontStretch,
        Descriptor::UnicodeRange,
        Descriptor::FontVariant,
        Descriptor::FontFeatureSettings,
        Descriptor::FontDisplay,
        Descriptor::AscentOverride,
        Descriptor::DescentOverride,
        Descriptor::LineGapOverride,
        Descriptor::SizeAdjust,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match_ignore_ascii_case! { name,
            "font-style" => Descriptor::FontStyle,
            "font-weight" => Descriptor::FontWeight,
            "font-stretch" => Descriptor::FontStretch,
            "unicode-range" => Descriptor::UnicodeRange,
            "font-variant" => Descriptor::FontVariant,
            "font-feature-settings" => Descriptor::FontFeatureSettings,
            "font-display" => Descriptor::FontDisplay,
            "ascent-override" => Descriptor::AscentOverride,
            "descent-override" => Descriptor::DescentOverride,
            "line-gap-override" => Descriptor::LineGapOverride,
            "size-adjust" => Descriptor::SizeAdjust,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Descriptor::FontStyle => "font-style",
            Descriptor::FontWeight => "font-weight",
            Descriptor::FontStretch => "font-stretch",
            Descriptor::UnicodeRange => "unicode-range",
            Descriptor::FontVariant => "font-variant",
            Descriptor::FontFeatureSettings => "font-feature-settings",
            Descriptor::FontDisplay => "font-display",
            Descriptor::AscentOverride => "ascent-override",
            Descriptor::DescentOverride => "descent-override",
            Descriptor::LineGapOverride => "line-gap-override",
            Descriptor::SizeAdjust => "size-adjust",
        }
    }

    /// Serialization of the initial value.
    pub fn initial_value(&self) -> &'static str {
        match self {
            Descriptor::UnicodeRange => "U+0-10FFFF",
            Descriptor::FontDisplay => "auto",
            Descriptor::SizeAdjust => "100%",
            _ => "normal",
        }
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorValue {
    Style(FontStyleValue),
    Weight(FontWeightValue),
    Stretch(FontStretchValue),
    UnicodeRange(Vec<UnicodeRange>),
    Variant(Vec<String>),
    FeatureSettings(Vec<FontFeature>),
    Display(FontDisplay),
    /// Fraction, `None` for `normal`.
    MetricOverride(Option<f32>),
    /// Fraction, `1.0` for `100%`.
    SizeAdjust(f32),
}

/// Parses one descriptor value, `None` if it is not valid CSS for it.
pub fn parse_descriptor(descriptor: Descriptor, css: &str) -> Option<DescriptorValue> {
    match descriptor {
        Descriptor::FontStyle => parse_value(css, parse_font_style).map(DescriptorValue::Style),
        Descriptor::FontWeight => parse_value(css, parse_font_weight).map(DescriptorValue::Weight),
        Descriptor::FontStretch => {
            parse_value(css, parse_font_stretch).map(DescriptorValue::Stretch)
        }
        Descriptor::UnicodeRange => {
            parse_value(css, parse_unicode_ranges).map(DescriptorValue::UnicodeRange)
        }
        Descriptor::FontVariant => parse_value(css, parse_font_variant).map(DescriptorValue::Variant),
        Descriptor::FontFeatureSettings => {
            parse_value(css, parse_font_feature_settings).map(DescriptorValue::FeatureSettings)
        }
        Descriptor::FontDisplay => parse_value(css, parse_font_display).map(DescriptorValue::Display),
        Descriptor::AscentOverride | Descriptor::DescentOverride | Descriptor::LineGapOverride => {
            parse_value(css, parse_metric_override).map(DescriptorValue::MetricOverride)
        }
        Descriptor::SizeAdjust => {
            parse_value(css, parse_non_negative_percentage).map(DescriptorValue::SizeAdjust)
        }
    }
}

// ── Descriptor dictionaries ─────────────────────────────────────────────────

/// String-valued descriptors handed to a script-constructed face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFaceDescriptors {
    pub style: String,
    pub weight: String,
    pub stretch: String,
    pub unicode_range: String,
    pub variant: String,
    pub feature_settings: String,
    pub display: String,
    pub ascent_override: String,
    pub descent_override: String,
    pub line_gap_override: String,
    pub size_adjust: String,
}

impl Default for FontFaceDescriptors {
    fn default() -> Self {
        Self {
            style: Descriptor::FontStyle.initial_value().to_string(),
            weight: Descriptor::FontWeight.initial_value().to_string(),
            stretch: Descriptor::FontStretch.initial_value().to_string(),
            unicode_range: Descriptor::UnicodeRange.initial_value().to_string(),
            variant: Descriptor::FontVariant.initial_value().to_string(),
            feature_settings: Descriptor::FontFeatureSettings.initial_value().to_string(),
            display: Descriptor::FontDisplay.initial_value().to_string(),
            ascent_override: Descriptor::AscentOverride.initial_value().to_string(),
            descent_override: Descriptor::DescentOverride.initial_value().to_string(),
            line_gap_override: Descriptor::LineGapOverride.initial_value().to_string(),
            size_adjust: Descriptor::SizeAdjust.initial_value().to_string(),
        }
    }
}

impl FontFaceDescriptors {
    pub fn get(&self, descriptor: Descriptor) -> &str {
        match descriptor {
            Descriptor::FontStyle => &self.style,
            Descriptor::FontWeight => &self.weight,
            Descriptor::FontStretch => &self.stretch,
            Descriptor::UnicodeRange => &self.unicode_range,
            Descriptor::FontVariant => &self.variant,
            Descriptor::FontFeatureSettings => &self.feature_settings,
            Descriptor::FontDisplay => &self.display,
            Descriptor::AscentOverride => &self.ascent_override,
            Descriptor::DescentOverride => &self.descent_override,
            Descriptor::LineGapOverride => &self.line_gap_override,
            Descriptor::SizeAdjust => &self.size_adjust,
        }
    }

    pub fn set(&mut self, descriptor: Descriptor, value: impl Into<String>) {
        let value = value.into();
        match descriptor {
            Descriptor::FontStyle => self.style = value,
            Descriptor::FontWeight => self.weight = value,
            Descriptor::FontStretch => self.stretch = value,
            Descriptor::UnicodeRange => self.unicode_range = value,
            Descriptor::FontVariant => self.variant = value,
            Descriptor::FontFeatureSettings => self.feature_settings = value,
            Descriptor::FontDisplay => self.display = value,
            Descriptor::AscentOverride => self.ascent_override = value,
            Descriptor::DescentOverride => self.descent_override = value,
            Descriptor::LineGapOverride => self.line_gap_override = value,
            Descriptor::SizeAdjust => self.size_adjust = value,
        }
    }

    pub fn with(mut self, descriptor: Descriptor, value: impl Into<String>) -> Self {
        self.set(descriptor, value);
        self
    }
}

// ── @font-face rules ────────────────────────────────────────────────────────

/// A parsed `@font-face` block. Only declarations whose values parsed are
/// kept, the way a style sheet drops invalid declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct FontFaceRule {
    pub family: String,
    pub src: Vec<FontFaceSrc>,
    /// Valid descriptor declarations, in source order.
    pub descriptors: Vec<(Descriptor, String)>,
    /// Cascade layer the rule lives in, `None` when unlayered.
    pub layer: Option<String>,
}

impl FontFaceRule {
    /// Builds a rule from `(name, value)` declarations. Returns `None`
    /// unless both `font-family` and `src` are present and valid.
    pub fn from_declarations<'a>(
        declarations: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Option<Self> {
        let mut family = None;
        let mut src = None;
        let mut descriptors: Vec<(Descriptor, String)> = Vec::new();

        for (name, value) in declarations {
            let value = value.trim();
            if name.eq_ignore_ascii_case("font-family") {
                match parse_font_family(value) {
                    Some(f) => family = Some(f),
                    None => warn!("Invalid @font-face font-family value: '{}'", value),
                }
                continue;
            }
            if name.eq_ignore_ascii_case("src") {
                match parse_src(value) {
                    Some(s) => src = Some(s),
                    None => warn!("Invalid @font-face src value: '{}'", value),
                }
                continue;
            }
            let descriptor = match Descriptor::from_name(name) {
                Some(d) => d,
                None => {
                    warn!("Unsupported @font-face descriptor declaration: '{}'", name);
                    continue;
                }
            };
            if parse_descriptor(descriptor, value).is_none() {
                warn!("Invalid @font-face {} value: '{}'", descriptor, value);
                continue;
            }
            descriptors.retain(|(d, _)| *d != descriptor);
            descriptors.push((descriptor, value.to_string()));
        }

        Some(FontFaceRule {
            family: family?,
            src: src?,
            descriptors,
            layer: None,
        })
    }

    /// Parses the body of an `@font-face` block (without braces).
    pub fn parse_block(css: &str) -> Option<Self> {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut rule_parser = FontFaceRuleParser;
        let mut declarations: Vec<(String, String)> = Vec::new();
        for item in RuleBodyParser::new(&mut parser, &mut rule_parser) {
            match item {
                Ok(declaration) => declarations.push(declaration),
                Err((_, slice)) => {
                    warn!("Unsupported @font-face descriptor declaration: '{}'", slice)
                }
            }
        }
        Self::from_declarations(declarations.iter().map(|(n, v)| (n.as_str(), v.as_str())))
    }

    pub fn in_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    pub fn descriptor(&self, descriptor: Descriptor) -> Option<&str> {
        self.descriptors
            .iter()
            .find(|(d, _)| *d == descriptor)
            .map(|(_, v)| v.as_str())
    }
}

struct FontFaceRuleParser;

impl<'i> DeclarationParser<'i> for FontFaceRuleParser {
    type Declaration = (String, String);
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
        _declaration_start: &ParserState,
    ) -> CssResult<'i, (String, String)> {
        let start = input.position();
        while input.next().is_ok() {}
        Ok((
            name.to_ascii_lowercase(),
            input.slice_from(start).trim().to_string(),
        ))
    }
}

/// Default methods reject all at rules.
impl<'i> AtRuleParser<'i> for FontFaceRuleParser {
    type Prelude = ();
    type AtRule = (String, String);
    type Error = ();
}

impl<'i> QualifiedRuleParser<'i> for FontFaceRuleParser {
    type Prelude = ();
    type QualifiedRule = (String, String);
    type Error = ();
}

impl<'i> RuleBodyItemParser<'i, (String, String), ()> for FontFaceRuleParser {
    fn parse_declarations(&self) -> bool {
        true
    }

    fn parse_qualified(&self) -> bool {
        false
    }
}

//! CSS `@font-face` matching and loading engine.
//!
//! Indexes `@font-face` rules and script-constructed faces by family and
//! selection capabilities, picks the best face group for a requested font
//! description, drives multi-source loading along the `font-display`
//! timeline and caches composited font data per instantiation.
//!
//! # Usage
//!
//! ```rust
//! use rust_fontface::*;
//!
//! let mut selector = FontSelector::builder()
//!     .provider(MemoryFontProvider::new().with_font("Arial", "Arial"))
//!     .build();
//!
//! let rule = FontFaceRule::parse_block(
//!     "font-family: Body; src: local(Arial), url(body.woff2) format(woff2)",
//! )
//! .unwrap();
//! let face = selector.add_font_face_rule(StyleRuleKey::new(), &rule).unwrap();
//!
//! let description = FontDescription::new("Body", 16.0);
//! let data = selector.font_data(&description, "Body").unwrap();
//! assert_eq!(data.len(), 1);
//! assert_eq!(selector.font_face(face).unwrap().status(), LoadStatus::Loaded);
//! ```

#![allow(non_snake_case)]

extern crate alloc;
extern crate core;

use core::sync::atomic::{AtomicU64, Ordering};

pub mod cache;
pub mod config;
pub mod context;
pub mod css_font_face;
pub mod descriptors;
pub mod error;
pub mod font_data;
pub mod font_face;
pub mod font_face_set;
pub mod platform;
pub mod segmented;
pub mod selection;
pub mod selector;
pub mod source;
#[cfg(all(feature = "std", not(target_family = "wasm")))]
pub mod system;
pub mod task;
pub mod unicode;

pub use cache::FontFaceCache;
pub use config::{ContextKind, DocumentState, FontLoadingConfig, LcpInterventionMode};
pub use context::{ConsoleLevel, ConsoleMessage, FontInvalidationReason, LoadContext};
pub use css_font_face::CssFontFace;
pub use descriptors::{
    Descriptor, FontDisplay, FontFaceDescriptors, FontFaceRule, FontFaceSrc, FontFeature,
    UrlSource,
};
pub use error::{DecodeError, FetchError, FontFaceError};
pub use font_data::{
    CustomFontKind, FontCacheKey, FontCustomPlatformData, FontDataForRangeSet, FontDataKind,
    FontDescription, FontMetricsOverride, SegmentedFontData, SimpleFontData, SystemTypeface,
    Typeface, TypefaceSource,
};
pub use font_face::{FontFace, LoadStatus};
pub use font_face_set::{
    FontFaceSet, FontFaceSetEventKind, FontFaceSetLoadEvent, LoadOutcome, ReadyState,
};
pub use platform::{
    CorsMode, DataSource, DeferredFetcher, FontDecoder, FontFetchRequest, FontFetchResponse,
    FontFetcher, MemoryFetcher, MemoryFontProvider, PlatformFontProvider, SfntSniffDecoder,
};
#[cfg(feature = "parsing")]
pub use platform::AllsortsFontDecoder;
pub use segmented::{
    CascadeLayerMap, CascadeLayerMaps, CascadeOrigin, FontFaceMap, SegmentedFontFace,
};
pub use selection::{
    FontSelectionAlgorithm, FontSelectionCapabilities, FontSelectionRange, FontSelectionRequest,
    FontSelectionValue,
};
pub use selector::{FontSelector, FontSelectorBuilder};
pub use source::{DisplayPeriod, LoadLimitPhase};
#[cfg(all(feature = "std", not(target_family = "wasm")))]
pub use system::{ScannedFace, SystemFontIndex};
pub use unicode::{UnicodeRange, UnicodeRangeSet};

// ── Identifiers ─────────────────────────────────────────────────────────────

fn next_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);

        impl $name {
            pub fn new() -> Self {
                $name(next_id())
            }

            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

id_type!(
    /// Stable handle of a [`FontFace`] inside its [`FontSelector`].
    FontFaceId
);
id_type!(
    /// Handle of one source slot in a face's `src` list.
    SourceId
);
id_type!(
    /// Handle of one capabilities group inside a [`FontFaceCache`].
    SegmentedFaceId
);
id_type!(
    /// Identifies an in-flight fetch handed to a [`FontFetcher`].
    FetchRequestId
);
id_type!(
    /// Identifies a pending [`FontSelector::load_fonts`] call.
    LoadRequestId
);
id_type!(
    /// Identity of an `@font-face` rule in a style sheet.
    StyleRuleKey
);

// ── Family names ────────────────────────────────────────────────────────────

/// Whether `family` is a CSS generic family keyword.
pub fn is_generic_family(family: &str) -> bool {
    matches!(
        family.to_ascii_lowercase().as_str(),
        "serif" | "sans-serif" | "monospace" | "cursive" | "fantasy" | "system-ui"
    )
}

/// Key under which a family is indexed: CSS family names match
/// ASCII case-insensitively.
pub fn family_key(family: &str) -> String {
    family.to_ascii_lowercase()
}

/// Normalize a local font name for lookup: lowercase, keep only alphanumeric
/// characters.
pub fn normalize_font_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

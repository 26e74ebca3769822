//! Runtime knobs for web font loading.

use core::time::Duration;

/// What an `auto` font does once the LCP limit has passed without it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LcpInterventionMode {
    /// Stop blocking and render with the fallback.
    ToSwapPeriod,
    /// Give up on the web font, unless it looks like an icon font.
    ToFailurePeriod,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FontLoadingConfig {
    /// Time after which a loading font leaves its short block period.
    pub short_limit: Duration,
    /// Time after which a loading font leaves its long block period.
    pub long_limit: Duration,
    /// Entries kept per segmented face (one per size / synthesis / variation).
    pub segmented_cache_size: usize,
    /// Entries kept per source.
    pub source_cache_size: usize,
    pub align_auto_timeout_with_lcp_goal: bool,
    pub lcp_intervention_mode: LcpInterventionMode,
    /// Treat `auto` as `fallback`-like when the network is slow.
    pub slow_network_intervention: bool,
    pub downloadable_fonts_enabled: bool,
    pub local_fonts_enabled: bool,
}

impl Default for FontLoadingConfig {
    fn default() -> Self {
        Self {
            short_limit: Duration::from_millis(100),
            long_limit: Duration::from_millis(3000),
            segmented_cache_size: 250,
            source_cache_size: 1024,
            align_auto_timeout_with_lcp_goal: true,
            lcp_intervention_mode: LcpInterventionMode::ToSwapPeriod,
            slow_network_intervention: true,
            downloadable_fonts_enabled: true,
            local_fonts_enabled: true,
        }
    }
}

impl FontLoadingConfig {
    pub fn with_load_limits(mut self, short_limit: Duration, long_limit: Duration) -> Self {
        self.short_limit = short_limit;
        self.long_limit = long_limit;
        self
    }

    pub fn with_segmented_cache_size(mut self, size: usize) -> Self {
        self.segmented_cache_size = size;
        self
    }

    pub fn with_source_cache_size(mut self, size: usize) -> Self {
        self.source_cache_size = size;
        self
    }

    pub fn with_lcp_alignment(mut self, enabled: bool, mode: LcpInterventionMode) -> Self {
        self.align_auto_timeout_with_lcp_goal = enabled;
        self.lcp_intervention_mode = mode;
        self
    }

    pub fn with_slow_network_intervention(mut self, enabled: bool) -> Self {
        self.slow_network_intervention = enabled;
        self
    }

    pub fn with_downloadable_fonts(mut self, enabled: bool) -> Self {
        self.downloadable_fonts_enabled = enabled;
        self
    }

    pub fn with_local_fonts(mut self, enabled: bool) -> Self {
        self.local_fonts_enabled = enabled;
        self
    }
}

/// Whether the owning context is a document or a worker.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ContextKind {
    Document,
    Worker,
}

/// Per-context inputs that the embedder keeps up to date.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentState {
    pub kind: ContextKind,
    pub rendering_has_begun: bool,
    pub needs_layout: bool,
    pub detached: bool,
    pub network_is_slow: bool,
    /// Milliseconds on the context clock at which the LCP goal expires.
    pub lcp_limit_ms: Option<u64>,
    /// Sent along with every font fetch.
    pub referrer_policy: Option<String>,
}

impl DocumentState {
    pub fn document() -> Self {
        Self {
            kind: ContextKind::Document,
            rendering_has_begun: false,
            needs_layout: false,
            detached: false,
            network_is_slow: false,
            lcp_limit_ms: None,
            referrer_policy: None,
        }
    }

    pub fn worker() -> Self {
        Self {
            kind: ContextKind::Worker,
            ..Self::document()
        }
    }

    pub fn with_lcp_limit(mut self, ms: u64) -> Self {
        self.lcp_limit_ms = Some(ms);
        self
    }

    pub fn is_document(&self) -> bool {
        self.kind == ContextKind::Document
    }
}

impl Default for DocumentState {
    fn default() -> Self {
        Self::document()
    }
}

//! Per-face loading state machine over an ordered list of sources.
//!
//! A face tries its `src` entries front to back. The front source is the
//! one in use; it is popped when it turns out unusable for a recoverable
//! reason (bad format, missing local font, network error). A front source
//! that enters its failure period fails the whole face instead.

use alloc::collections::btree_set::BTreeSet;
use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::context::{FontInvalidationReason, LoadContext, Notification};
use crate::descriptors::{FontDisplay, FontFeature};
use crate::error::FontFaceError;
use crate::font_data::{FontDescription, FontMetricsOverride, SimpleFontData};
use crate::font_face::LoadStatus;
use crate::platform::FontFetchResponse;
use crate::selection::FontSelectionCapabilities;
use crate::source::{BeginLoad, CssFontFaceSource, LoadLimitPhase, PeriodUpdate};
use crate::unicode::UnicodeRangeSet;
use crate::{FontFaceId, SegmentedFaceId, SourceId};

/// Descriptor-derived values used when instantiating font data.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceAttributes {
    pub capabilities: FontSelectionCapabilities,
    /// Fraction; `None` when `size-adjust` is `100%`.
    pub size_adjust: Option<f32>,
    pub metrics_override: FontMetricsOverride,
    pub feature_settings: Vec<FontFeature>,
    pub variant: Vec<String>,
}

#[derive(Debug)]
pub struct CssFontFace {
    face: FontFaceId,
    sources: VecDeque<CssFontFaceSource>,
    segmented_faces: BTreeSet<SegmentedFaceId>,
    ranges: Arc<UnicodeRangeSet>,
    status: LoadStatus,
    error: Option<FontFaceError>,
    approximate_character_count: usize,
}

impl CssFontFace {
    pub fn new(face: FontFaceId, ranges: UnicodeRangeSet) -> Self {
        Self {
            face,
            sources: VecDeque::new(),
            segmented_faces: BTreeSet::new(),
            ranges: Arc::new(ranges),
            status: LoadStatus::Unloaded,
            error: None,
            approximate_character_count: 0,
        }
    }

    pub fn face(&self) -> FontFaceId {
        self.face
    }

    pub fn status(&self) -> LoadStatus {
        self.status
    }

    pub fn error(&self) -> Option<&FontFaceError> {
        self.error.as_ref()
    }

    pub fn ranges(&self) -> &Arc<UnicodeRangeSet> {
        &self.ranges
    }

    pub(crate) fn set_ranges(&mut self, ranges: UnicodeRangeSet) {
        self.ranges = Arc::new(ranges);
    }

    /// A face with no sources left can never produce font data.
    pub fn is_valid(&self) -> bool {
        !self.sources.is_empty()
    }

    pub fn add_source(&mut self, source: CssFontFaceSource) {
        self.sources.push_back(source);
    }

    pub fn sources(&self) -> impl Iterator<Item = &CssFontFaceSource> {
        self.sources.iter()
    }

    fn source_mut(&mut self, id: SourceId) -> Option<&mut CssFontFaceSource> {
        self.sources.iter_mut().find(|s| s.id() == id)
    }

    fn is_front(&self, id: SourceId) -> bool {
        self.sources.front().map_or(false, |s| s.id() == id)
    }

    // ── Segmented face registration ─────────────────────────────────────────

    pub fn segmented_faces(&self) -> &BTreeSet<SegmentedFaceId> {
        &self.segmented_faces
    }

    pub fn add_segmented_face(&mut self, segmented: SegmentedFaceId) {
        self.segmented_faces.insert(segmented);
    }

    pub fn remove_segmented_face(&mut self, segmented: SegmentedFaceId) {
        self.segmented_faces.remove(&segmented);
    }

    // ── Status ──────────────────────────────────────────────────────────────

    /// Keeps the first error; without one a network error is recorded.
    pub fn set_error(&mut self, error: Option<FontFaceError>, ctx: &mut LoadContext) {
        if self.error.is_none() {
            self.error = Some(error.unwrap_or(FontFaceError::Network));
        }
        self.set_status(LoadStatus::Error, ctx);
    }

    /// Sets the status without the face-set bookkeeping of
    /// [`set_load_status`](Self::set_load_status).
    pub(crate) fn set_status(&mut self, status: LoadStatus, ctx: &mut LoadContext) {
        if status == LoadStatus::Error && self.error.is_none() {
            self.error = Some(FontFaceError::Network);
        }
        self.status = status;
        ctx.notify(Notification::LoadStatusChanged {
            face: self.face,
            status,
            in_segmented: !self.segmented_faces.is_empty(),
        });
    }

    fn set_load_status(&mut self, status: LoadStatus, ctx: &mut LoadContext) {
        if status == LoadStatus::Error {
            self.set_error(None, ctx);
        } else {
            self.set_status(status, ctx);
        }
    }

    pub fn did_begin_load(&mut self, ctx: &mut LoadContext) {
        if self.status == LoadStatus::Unloaded {
            self.set_load_status(LoadStatus::Loading, ctx);
        }
    }

    // ── Loading ─────────────────────────────────────────────────────────────

    /// Walks the sources until one is usable or starts loading.
    pub fn load(&mut self, ctx: &mut LoadContext) {
        if self.status == LoadStatus::Unloaded {
            self.set_load_status(LoadStatus::Loading, ctx);
        }

        while let Some(front) = self.sources.front_mut() {
            if front.is_valid(ctx) {
                if front.is_local_non_blocking(ctx) {
                    if front.is_local_font_available(ctx) {
                        self.set_load_status(LoadStatus::Loaded, ctx);
                        return;
                    }
                } else {
                    if !front.is_loaded(ctx) {
                        let id = front.id();
                        let begin = front.begin_load_if_needed(self.face, ctx);
                        self.handle_begin_load(id, begin, ctx);
                    } else {
                        self.set_load_status(LoadStatus::Loaded, ctx);
                    }
                    return;
                }
            }
            self.sources.pop_front();
        }

        self.set_load_status(LoadStatus::Error, ctx);
    }

    fn handle_begin_load(&mut self, source: SourceId, begin: BeginLoad, ctx: &mut LoadContext) {
        if begin.did_begin_load {
            self.did_begin_load(ctx);
        }
        if let Some(response) = begin.completed {
            self.fetch_finished(source, response, ctx);
        }
    }

    /// A source finished loading. Returns `false` for stale reports.
    pub fn font_loaded(&mut self, source: SourceId, ctx: &mut LoadContext) -> bool {
        if !self.is_valid() || !self.is_front(source) {
            return false;
        }

        if self.status == LoadStatus::Loading {
            let (valid, failed) = match self.sources.front() {
                Some(front) => (front.is_valid(ctx), front.is_in_failure_period()),
                None => return false,
            };
            if valid {
                self.set_load_status(LoadStatus::Loaded, ctx);
            } else if failed {
                self.sources.clear();
                self.set_load_status(LoadStatus::Error, ctx);
            } else {
                self.sources.pop_front();
                self.load(ctx);
            }
        }

        ctx.notify(Notification::FaceInvalidated(self.face));
        true
    }

    pub fn fallback_visibility_changed(&mut self, source: SourceId, ctx: &mut LoadContext) -> bool {
        if !self.is_valid() || !self.is_front(source) {
            return false;
        }
        ctx.notify(Notification::FaceInvalidated(self.face));
        true
    }

    fn handle_period_update(
        &mut self,
        source: SourceId,
        update: PeriodUpdate,
        ctx: &mut LoadContext,
    ) -> bool {
        if update.fallback_visibility_changed && self.fallback_visibility_changed(source, ctx) {
            ctx.fonts_invalidated(FontInvalidationReason::General);
        }
        update.changed
    }

    pub fn fetch_finished(
        &mut self,
        source: SourceId,
        response: FontFetchResponse,
        ctx: &mut LoadContext,
    ) {
        let finished = match self.source_mut(source) {
            Some(s) => s.fetch_finished(response, ctx),
            None => return,
        };
        if finished && self.font_loaded(source, ctx) {
            ctx.fonts_invalidated(FontInvalidationReason::FontFaceLoaded);
        }
    }

    pub fn load_limit_exceeded(
        &mut self,
        source: SourceId,
        phase: LoadLimitPhase,
        ctx: &mut LoadContext,
    ) {
        let update = match self.source_mut(source) {
            Some(s) => s.load_limit_exceeded(phase, ctx),
            None => return,
        };
        self.handle_period_update(source, update, ctx);
    }

    pub fn unique_name_lookup_ready(&mut self, source: SourceId, ctx: &mut LoadContext) {
        match self.source_mut(source) {
            Some(s) => s.unique_name_lookup_ready(),
            None => return,
        }
        if self.status == LoadStatus::Loading && self.font_loaded(source, ctx) {
            ctx.fonts_invalidated(FontInvalidationReason::FontFaceLoaded);
        }
    }

    pub fn paint_requested(&mut self, source: SourceId) {
        if let Some(s) = self.source_mut(source) {
            s.paint_requested();
        }
    }

    /// Recomputes every source's display period. Returns whether any changed.
    pub fn update_period(&mut self, ctx: &mut LoadContext) -> bool {
        if self.status == LoadStatus::Loaded {
            return false;
        }
        let updates: Vec<(SourceId, PeriodUpdate)> = self
            .sources
            .iter_mut()
            .map(|s| (s.id(), s.update_period(ctx)))
            .collect();
        let mut changed = false;
        for (source, update) in updates {
            changed |= self.handle_period_update(source, update, ctx);
        }
        changed
    }

    pub fn set_display(&mut self, display: FontDisplay, ctx: &mut LoadContext) {
        let updates: Vec<(SourceId, PeriodUpdate)> = self
            .sources
            .iter_mut()
            .map(|s| (s.id(), s.set_display(display, ctx)))
            .collect();
        for (source, update) in updates {
            self.handle_period_update(source, update, ctx);
        }
    }

    /// Starts loading if the first character of `text` is covered.
    pub fn maybe_load_font(&mut self, text: &str, ctx: &mut LoadContext) -> bool {
        let first = match text.chars().next() {
            Some(c) => c,
            None => return false,
        };
        if !self.ranges.contains(first as u32) {
            return false;
        }
        self.approximate_character_count += text.chars().count();
        if self.status == LoadStatus::Unloaded {
            self.load(ctx);
        }
        true
    }

    /// Characters laid out with this face while its front source hides
    /// fallback text. Zero outside the block period.
    pub fn approximate_blank_character_count(&self) -> usize {
        match self.sources.front() {
            Some(front) if front.is_in_block_period() => self.approximate_character_count,
            _ => 0,
        }
    }

    pub fn had_blank_text(&self) -> bool {
        self.sources.front().map_or(false, |s| s.had_blank_text())
    }

    /// Starts loading if this face owns exactly `ranges`.
    pub fn maybe_load_font_for_ranges(
        &mut self,
        ranges: &UnicodeRangeSet,
        ctx: &mut LoadContext,
    ) -> bool {
        if *self.ranges.as_ref() != *ranges {
            return false;
        }
        if self.status == LoadStatus::Unloaded {
            self.load(ctx);
        }
        true
    }

    // ── Font data ───────────────────────────────────────────────────────────

    pub fn font_data(
        &mut self,
        description: &FontDescription,
        attributes: &FaceAttributes,
        ctx: &mut LoadContext,
    ) -> Option<Arc<SimpleFontData>> {
        if !self.is_valid() {
            return None;
        }

        let description = match attributes.size_adjust {
            Some(factor) => description.size_adjusted(factor),
            None => description.clone(),
        };

        while let Some(front) = self.sources.front_mut() {
            // fall back to the next family instead of the next source
            if front.is_in_failure_period() {
                return None;
            }
            if let Some(mut result) =
                front.font_data(&description, &attributes.capabilities, self.face, ctx)
            {
                if !attributes.metrics_override.is_empty() {
                    result = result.metrics_overridden(attributes.metrics_override);
                }
                if !attributes.feature_settings.is_empty() || !attributes.variant.is_empty() {
                    result = result.with_face_features(&attributes.feature_settings, &attributes.variant);
                }
                let (loading, loaded) = (front.is_loading(ctx), front.is_loaded(ctx));
                if loading {
                    // a pending local() lookup has to be requested
                    front.begin_load_if_needed(self.face, ctx);
                }
                if self.status == LoadStatus::Unloaded && (loading || loaded) {
                    self.set_load_status(LoadStatus::Loading, ctx);
                }
                if self.status == LoadStatus::Loading && loaded {
                    self.set_load_status(LoadStatus::Loaded, ctx);
                }
                return Some(result);
            }
            self.sources.pop_front();
        }

        if self.status == LoadStatus::Unloaded {
            self.set_load_status(LoadStatus::Loading, ctx);
        }
        if self.status == LoadStatus::Loading {
            self.set_load_status(LoadStatus::Error, ctx);
        }
        None
    }
}

//! Per-document (or per-worker) entry point.
//!
//! A [`FontSelector`] owns every face, the family index, the face set and
//! the loading context. All work runs on the caller's thread: deferred work
//! sits in the task queue until [`FontSelector::advance_time`] or
//! [`FontSelector::run_until_idle`] runs it, and fetch results come back
//! through [`FontSelector::font_fetch_finished`].
//!
//! ```rust
//! use rust_fontface::*;
//! use rust_fontface::platform::FontFetchResponse;
//!
//! let mut selector = FontSelector::builder()
//!     .document(DocumentState::document())
//!     .build();
//!
//! let rule = FontFaceRule::parse_block(
//!     "font-family: Heading; src: url(heading.woff2) format(woff2); font-display: fallback",
//! )
//! .unwrap();
//! let face = selector.add_font_face_rule(StyleRuleKey::new(), &rule).unwrap();
//!
//! let description = FontDescription::new("Heading", 24.0);
//! selector.will_use_font_data(&description, "Heading", "Hello");
//! assert_eq!(selector.font_face(face).unwrap().status(), LoadStatus::Loading);
//!
//! // the fallback font is invisible during the block period
//! let data = selector.font_data(&description, "Heading").unwrap();
//! assert!(data.entries()[0].font_data.should_skip_drawing());
//!
//! // past the short limit it becomes visible
//! selector.advance_time(100);
//! let data = selector.font_data(&description, "Heading").unwrap();
//! assert!(!data.entries()[0].font_data.should_skip_drawing());
//!
//! let request = selector.pending_fetches()[0].id;
//! let mut bytes = vec![0x00, 0x01, 0x00, 0x00];
//! bytes.resize(64, 0);
//! selector.font_fetch_finished(request, FontFetchResponse::ok(bytes, DataSource::Network));
//! assert_eq!(selector.font_face(face).unwrap().status(), LoadStatus::Loaded);
//! ```

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use log::debug;

use crate::cache::FontFaceCache;
use crate::config::{DocumentState, FontLoadingConfig};
use crate::context::{ConsoleMessage, FontInvalidationReason, LoadContext, Notification};
use crate::descriptors::{Descriptor, FontFaceDescriptors, FontFaceRule};
use crate::error::FontFaceError;
use crate::font_data::{CustomFontKind, FontDescription, SegmentedFontData, SimpleFontData};
use crate::font_face::{FontFace, LoadStatus};
use crate::font_face_set::{FontFaceSet, FontFaceSetLoadEvent, LoadOutcome, ReadyState};
use crate::platform::{
    DeferredFetcher, FontDecoder, FontFetchRequest, FontFetchResponse, FontFetcher,
    MemoryFontProvider, PlatformFontProvider, SfntSniffDecoder,
};
use crate::segmented::{CascadeLayerMaps, CascadeOrigin, FontFaceMap};
use crate::source::LoadLimitPhase;
use crate::task::Task;
use crate::unicode::UnicodeRangeSet;
use crate::{
    is_generic_family, FetchRequestId, FontFaceId, LoadRequestId, SegmentedFaceId, SourceId,
    StyleRuleKey,
};

// ── Builder ─────────────────────────────────────────────────────────────────

pub struct FontSelectorBuilder {
    config: FontLoadingConfig,
    document: DocumentState,
    provider: Box<dyn PlatformFontProvider>,
    fetcher: Box<dyn FontFetcher>,
    decoder: Box<dyn FontDecoder>,
}

impl Default for FontSelectorBuilder {
    fn default() -> Self {
        Self {
            config: FontLoadingConfig::default(),
            document: DocumentState::document(),
            provider: Box::new(MemoryFontProvider::new()),
            fetcher: Box::new(DeferredFetcher),
            decoder: Box::new(SfntSniffDecoder),
        }
    }
}

impl FontSelectorBuilder {
    pub fn config(mut self, config: FontLoadingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn document(mut self, document: DocumentState) -> Self {
        self.document = document;
        self
    }

    pub fn provider(mut self, provider: impl PlatformFontProvider + 'static) -> Self {
        self.provider = Box::new(provider);
        self
    }

    pub fn fetcher(mut self, fetcher: impl FontFetcher + 'static) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    pub fn decoder(mut self, decoder: impl FontDecoder + 'static) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    pub fn build(self) -> FontSelector {
        let kind = self.document.kind;
        FontSelector {
            ctx: LoadContext::new(
                self.config,
                self.document,
                self.provider,
                self.fetcher,
                self.decoder,
            ),
            faces: FontFaceMap::new(),
            cache: FontFaceCache::new(),
            set: FontFaceSet::new(kind),
            invalidations: Vec::new(),
        }
    }
}

// ── FontSelector ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct FontSelector {
    ctx: LoadContext,
    faces: FontFaceMap,
    cache: FontFaceCache,
    set: FontFaceSet,
    invalidations: Vec<FontInvalidationReason>,
}

impl Default for FontSelector {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl FontSelector {
    pub fn builder() -> FontSelectorBuilder {
        FontSelectorBuilder::default()
    }

    pub fn context(&self) -> &LoadContext {
        &self.ctx
    }

    pub fn config(&self) -> &FontLoadingConfig {
        &self.ctx.config
    }

    pub fn document(&self) -> &DocumentState {
        &self.ctx.document
    }

    /// For the embedder to report rendering and layout milestones.
    pub fn document_mut(&mut self) -> &mut DocumentState {
        &mut self.ctx.document
    }

    pub fn cache(&self) -> &FontFaceCache {
        &self.cache
    }

    pub fn font_face_set(&self) -> &FontFaceSet {
        &self.set
    }

    pub fn font_face(&self, id: FontFaceId) -> Option<&FontFace> {
        self.faces.get(&id)
    }

    pub fn font_faces(&self) -> impl Iterator<Item = &FontFace> {
        self.faces.values()
    }

    /// Bumped whenever the usable fonts change; compare to detect staleness.
    pub fn version(&self) -> u64 {
        self.cache.version()
    }

    pub fn now_ms(&self) -> u64 {
        self.ctx.now_ms()
    }

    // ── Style sheet faces ───────────────────────────────────────────────────

    pub fn set_cascade_layer_maps(&mut self, maps: CascadeLayerMaps) {
        self.cache.set_layer_maps(maps);
    }

    /// Registers the face of an author `@font-face` rule. `None` if the
    /// rule was already added or describes no usable face.
    pub fn add_font_face_rule(&mut self, rule_key: StyleRuleKey, rule: &FontFaceRule) -> Option<FontFaceId> {
        self.add_font_face_rule_with_origin(rule_key, rule, CascadeOrigin::Author)
    }

    pub fn add_font_face_rule_with_origin(
        &mut self,
        rule_key: StyleRuleKey,
        rule: &FontFaceRule,
        origin: CascadeOrigin,
    ) -> Option<FontFaceId> {
        if self.cache.face_for_rule(rule_key).is_some() {
            return None;
        }
        let face = FontFace::from_rule(rule_key, rule, origin, &mut self.ctx)?;
        let id = face.id();
        self.faces.insert(id, face);
        self.cache.add_rule_face(rule_key, id, &mut self.faces, &self.ctx);
        self.ctx.fonts_invalidated(FontInvalidationReason::General);
        self.process_notifications();
        Some(id)
    }

    pub fn remove_font_face_rule(&mut self, rule_key: StyleRuleKey) -> bool {
        let face = match self.cache.remove_rule(rule_key, &mut self.faces) {
            Some(face) => face,
            None => return false,
        };
        self.destroy_face(face);
        self.ctx.fonts_invalidated(FontInvalidationReason::General);
        self.process_notifications();
        true
    }

    /// Drops every style sheet face, e.g. before re-collecting rules.
    pub fn clear_css_connected(&mut self) -> bool {
        let removed: Vec<FontFaceId> = self.cache.css_connected_faces().to_vec();
        if !self.cache.clear_css_connected(&mut self.faces) {
            return false;
        }
        for face in removed {
            self.destroy_face(face);
        }
        self.ctx.fonts_invalidated(FontInvalidationReason::General);
        self.process_notifications();
        true
    }

    fn destroy_face(&mut self, face: FontFaceId) {
        self.faces.remove(&face);
        self.ctx.forget_fetches_of(face);
        self.ctx.imperative_load_settled(face);
        self.set.forget(face, &mut self.ctx);
    }

    // ── Script faces ────────────────────────────────────────────────────────

    /// A face constructed from a `src` string. It is not matched until it
    /// is added to the face set.
    pub fn create_font_face(
        &mut self,
        family: &str,
        source: &str,
        descriptors: &FontFaceDescriptors,
    ) -> FontFaceId {
        let face = FontFace::from_source(family, source, descriptors, &mut self.ctx);
        self.insert_script_face(face)
    }

    /// A face constructed from font bytes.
    pub fn create_font_face_from_binary(
        &mut self,
        family: &str,
        bytes: &[u8],
        descriptors: &FontFaceDescriptors,
    ) -> FontFaceId {
        let face = FontFace::from_binary(family, bytes, descriptors, &mut self.ctx);
        self.insert_script_face(face)
    }

    fn insert_script_face(&mut self, face: FontFace) -> FontFaceId {
        let id = face.id();
        self.faces.insert(id, face);
        self.process_notifications();
        id
    }

    /// Drops a script face the embedder no longer references. Faces still
    /// in the face set are kept.
    pub fn release_font_face(&mut self, face: FontFaceId) -> bool {
        let releasable = match self.faces.get(&face) {
            Some(f) => !f.is_css_connected() && !self.set.has(face, &self.cache),
            None => false,
        };
        if releasable {
            self.destroy_face(face);
        }
        releasable
    }

    /// Sets a descriptor of a face from its CSS text. A face in the family
    /// index is re-filed if its family bucket may have changed.
    pub fn set_descriptor(
        &mut self,
        face: FontFaceId,
        descriptor: Descriptor,
        value: &str,
    ) -> Result<(), FontFaceError> {
        let result = match self.faces.get_mut(&face) {
            Some(f) => f.set_descriptor(descriptor, value, &mut self.ctx),
            None => return Ok(()),
        };
        if result.is_ok() && self.needs_refile(face, descriptor) {
            self.refile(face);
        }
        self.process_notifications();
        result
    }

    pub fn set_family(&mut self, face: FontFaceId, family: &str) {
        let in_cache = self.cache.contains(face);
        if let Some(f) = self.faces.get_mut(&face) {
            f.set_family(family);
        }
        if in_cache && self.set.non_css_connected_faces().contains(&face) {
            self.refile(face);
        }
        self.process_notifications();
    }

    fn needs_refile(&self, face: FontFaceId, descriptor: Descriptor) -> bool {
        matches!(
            descriptor,
            Descriptor::FontStyle
                | Descriptor::FontWeight
                | Descriptor::FontStretch
                | Descriptor::UnicodeRange
        ) && self.cache.contains(face)
            && self.set.non_css_connected_faces().contains(&face)
    }

    fn refile(&mut self, face: FontFaceId) {
        self.cache.remove_font_face(face, &mut self.faces);
        self.cache.add_font_face(face, false, &mut self.faces, &self.ctx);
        self.ctx.fonts_invalidated(FontInvalidationReason::General);
    }

    /// `FontFace.load()`: starts loading a face if it has not started.
    pub fn load_font_face(&mut self, face: FontFaceId) -> LoadStatus {
        let status = match self.faces.get_mut(&face) {
            Some(f) => {
                f.load_imperatively(&mut self.ctx);
                f.status()
            }
            None => return LoadStatus::Error,
        };
        self.process_notifications();
        status
    }

    /// Faces loaded through `load_font_face` that still hold back the
    /// document's first rendering.
    pub fn render_blocking_font_loads(&self) -> Vec<FontFaceId> {
        self.ctx.render_blocking_loads().collect()
    }

    // ── Face set ────────────────────────────────────────────────────────────

    pub fn add_to_set(&mut self, face: FontFaceId) {
        self.set
            .add(face, &mut self.cache, &mut self.faces, &mut self.ctx);
        self.process_notifications();
    }

    pub fn delete_from_set(&mut self, face: FontFaceId) -> bool {
        let deleted = self
            .set
            .delete(face, &mut self.cache, &mut self.faces, &mut self.ctx);
        self.process_notifications();
        deleted
    }

    pub fn clear_set(&mut self) {
        self.set
            .clear(&mut self.cache, &mut self.faces, &mut self.ctx);
        self.process_notifications();
    }

    pub fn set_has(&self, face: FontFaceId) -> bool {
        self.set.has(face, &self.cache)
    }

    pub fn set_size(&self) -> usize {
        self.set.size(&self.cache)
    }

    pub fn set_faces(&self) -> Vec<FontFaceId> {
        self.set.faces(&self.cache)
    }

    pub fn set_status(&self) -> &'static str {
        self.set.status()
    }

    pub fn ready(&mut self) -> ReadyState {
        self.set.ready(&mut self.ctx)
    }

    /// `FontFaceSet.load()`.
    pub fn load_fonts(&mut self, description: &FontDescription, text: &str) -> LoadRequestId {
        let id = self
            .set
            .load(description, text, &mut self.cache, &mut self.faces, &mut self.ctx);
        self.process_notifications();
        id
    }

    /// Peeks at a request. Settled requests are kept until taken with
    /// [`take_load_request_outcome`](Self::take_load_request_outcome).
    pub fn load_request_outcome(&self, id: LoadRequestId) -> Option<LoadOutcome> {
        self.set.load_request_outcome(id).cloned()
    }

    /// The outcome of a settled request, which is forgotten. A pending
    /// request stays registered and reports `Pending`.
    pub fn take_load_request_outcome(&mut self, id: LoadRequestId) -> Option<LoadOutcome> {
        if *self.set.load_request_outcome(id)? == LoadOutcome::Pending {
            return Some(LoadOutcome::Pending);
        }
        self.set.take_load_request_outcome(id)
    }

    /// Drops a request whose result is no longer wanted.
    pub fn abandon_load_request(&mut self, id: LoadRequestId) {
        self.set.take_load_request_outcome(id);
    }

    /// `FontFaceSet.check()`.
    pub fn check_fonts(&mut self, description: &FontDescription, text: &str) -> bool {
        self.set
            .check(description, text, &mut self.cache, &self.faces, &self.ctx)
    }

    /// Layout finished; the embedder clears `needs_layout` before calling.
    pub fn did_layout(&mut self) {
        self.set.did_layout(&mut self.ctx);
    }

    pub fn take_events(&mut self) -> Vec<FontFaceSetLoadEvent> {
        self.set.take_events()
    }

    // ── Matching ────────────────────────────────────────────────────────────

    /// The face group of `family` that best matches `description`.
    pub fn segmented_face(&mut self, description: &FontDescription, family: &str) -> Option<SegmentedFaceId> {
        if is_generic_family(family) {
            return None;
        }
        self.cache.get(description, family)
    }

    /// Composite font data for `family`, or `None` if no face of that
    /// family can provide any. Platform fonts are not consulted.
    pub fn font_data(&mut self, description: &FontDescription, family: &str) -> Option<Arc<SegmentedFontData>> {
        let id = self.segmented_face(description, family)?;
        let data = self
            .cache
            .segmented_face_mut(id)?
            .font_data(description, &mut self.faces, &mut self.ctx);
        self.process_notifications();
        data
    }

    /// Style is about to render `text` with `family`: loads the face that
    /// covers it.
    pub fn will_use_font_data(&mut self, description: &FontDescription, family: &str, text: &str) {
        let id = match self.segmented_face(description, family) {
            Some(id) => id,
            None => return,
        };
        if let Some(group) = self.cache.segmented_face(id) {
            group.will_use_font_data(text, &mut self.faces, &mut self.ctx);
        }
        self.process_notifications();
    }

    pub fn will_use_range(&mut self, description: &FontDescription, family: &str, ranges: &UnicodeRangeSet) {
        let id = match self.segmented_face(description, family) {
            Some(id) => id,
            None => return,
        };
        if let Some(group) = self.cache.segmented_face(id) {
            group.will_use_range(ranges, &mut self.faces, &mut self.ctx);
        }
        self.process_notifications();
    }

    /// Text was painted with `font_data`. Painting a loading fallback
    /// counts against `font-display: optional`.
    pub fn paint_requested(&mut self, font_data: &SimpleFontData) {
        if let CustomFontKind::LoadingFallback { face, source, .. } = font_data.custom {
            if let Some(f) = self.faces.get_mut(&face) {
                f.css_font_face_mut().paint_requested(source);
            }
        }
    }

    // ── Fetches ─────────────────────────────────────────────────────────────

    pub fn pending_fetches(&self) -> Vec<FontFetchRequest> {
        self.ctx.pending_fetches().cloned().collect()
    }

    /// Delivers the result of a fetch started through the fetcher.
    /// Results for unknown or abandoned requests are dropped.
    pub fn font_fetch_finished(&mut self, request: FetchRequestId, response: FontFetchResponse) {
        if self.ctx.document.detached {
            return;
        }
        let (face, source) = match self.ctx.take_pending_fetch(request) {
            Some(found) => found,
            None => {
                debug!("dropping result of unknown fetch {}", request);
                return;
            }
        };
        if let Some(f) = self.faces.get_mut(&face) {
            f.css_font_face_mut()
                .fetch_finished(source, response, &mut self.ctx);
        }
        self.process_notifications();
    }

    // ── Tasks ───────────────────────────────────────────────────────────────

    /// Runs every task that is due now.
    pub fn run_until_idle(&mut self) {
        while let Some(task) = self.ctx.tasks.pop_ready() {
            self.run_task(task);
        }
    }

    /// Moves the clock forward by `ms`, running due tasks in order.
    pub fn advance_time(&mut self, ms: u64) {
        let target = self.ctx.now_ms().saturating_add(ms);
        self.run_until_idle();
        while let Some(due) = self.ctx.tasks.next_due() {
            if due > target {
                break;
            }
            self.ctx.tasks.advance_to(due);
            self.run_until_idle();
        }
        self.ctx.tasks.advance_to(target);
        self.run_until_idle();
    }

    /// The context went away: queued work is dropped and later results
    /// are ignored.
    pub fn detach(&mut self) {
        self.ctx.document.detached = true;
        self.ctx.tasks.clear();
        self.ctx.clear_render_blocking_loads();
    }

    fn run_task(&mut self, task: Task) {
        if self.ctx.document.detached {
            return;
        }
        match task {
            Task::HandlePendingEvents => self.set.handle_pending_events(&self.ctx),
            Task::RunFaceCallbacks(face) => self.run_face_callbacks(face),
            Task::ShortLimitExceeded { face, source } => {
                self.load_limit_exceeded(face, source, LoadLimitPhase::ShortLimitExceeded)
            }
            Task::LongLimitExceeded { face, source } => {
                self.load_limit_exceeded(face, source, LoadLimitPhase::LongLimitExceeded)
            }
            Task::LcpLimitReached => {
                debug!("LCP limit reached at {} ms", self.ctx.now_ms());
                self.set
                    .lcp_limit_reached(&self.cache, &mut self.faces, &mut self.ctx)
            }
            Task::BuildUniqueNameLookup => {
                for (face, source) in self.ctx.build_unique_name_lookup() {
                    if let Some(f) = self.faces.get_mut(&face) {
                        f.css_font_face_mut()
                            .unique_name_lookup_ready(source, &mut self.ctx);
                    }
                }
            }
        }
        self.process_notifications();
    }

    fn load_limit_exceeded(&mut self, face: FontFaceId, source: SourceId, phase: LoadLimitPhase) {
        if let Some(f) = self.faces.get_mut(&face) {
            f.css_font_face_mut()
                .load_limit_exceeded(source, phase, &mut self.ctx);
        }
    }

    fn run_face_callbacks(&mut self, face: FontFaceId) {
        let (callbacks, status, error) = match self.faces.get_mut(&face) {
            Some(f) => (f.take_callbacks(), f.status(), f.error().cloned()),
            None => return,
        };
        for callback in callbacks {
            self.set
                .run_callback(callback, face, status, error.clone(), &mut self.ctx);
        }
    }

    fn process_notifications(&mut self) {
        loop {
            let notifications = self.ctx.take_notifications();
            if notifications.is_empty() {
                break;
            }
            for notification in notifications {
                self.handle_notification(notification);
            }
        }
    }

    fn handle_notification(&mut self, notification: Notification) {
        match notification {
            Notification::LoadStatusChanged {
                face,
                status,
                in_segmented,
            } => {
                debug!("{} is {}", face, status);
                if self.ctx.document.detached {
                    return;
                }
                if status == LoadStatus::Loading && in_segmented {
                    self.set
                        .begin_font_loading(face, &mut self.faces, &mut self.ctx);
                }
                if status.is_settled() {
                    self.ctx.imperative_load_settled(face);
                    self.ctx.tasks.post(Task::RunFaceCallbacks(face));
                }
            }
            Notification::FaceInvalidated(face) => {
                self.cache.face_invalidated(face, &self.faces);
            }
            Notification::FontsInvalidated(reason) => {
                debug!("fonts invalidated: {}", reason);
                self.cache.increment_version();
                self.invalidations.push(reason);
            }
            Notification::RemoteLoadStarted => {
                self.set.start_lcp_limit_timer_if_needed(&mut self.ctx);
            }
        }
    }

    // ── Diagnostics ─────────────────────────────────────────────────────────

    /// Invalidations since the last call, oldest first.
    pub fn take_invalidations(&mut self) -> Vec<FontInvalidationReason> {
        core::mem::take(&mut self.invalidations)
    }

    pub fn take_console_messages(&mut self) -> Vec<ConsoleMessage> {
        self.ctx.take_console_messages()
    }

    /// Family names with at least one registered face.
    pub fn families(&self) -> Vec<String> {
        let mut families: Vec<String> = self
            .faces
            .values()
            .filter(|f| self.cache.contains(f.id()))
            .map(|f| String::from(f.family()))
            .collect();
        families.sort();
        families.dedup();
        families
    }
}

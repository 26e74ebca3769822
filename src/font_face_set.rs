//! The set of faces visible to a document or worker, and the loading
//! events and `ready` state derived from them.
//!
//! A face counts as loading for the set while it is registered in at
//! least one face group and its status is `Loading`. The set fires
//! `loading` when it goes from idle to loading, and `loadingdone` (plus
//! `loadingerror` if something failed) once nothing is loading anymore.
//! In a document the done events additionally wait for layout.

use alloc::collections::btree_map::BTreeMap;
use alloc::collections::btree_set::BTreeSet;
use alloc::vec::Vec;

use log::debug;

use crate::cache::FontFaceCache;
use crate::config::ContextKind;
use crate::context::{FontInvalidationReason, LoadContext};
use crate::error::FontFaceError;
use crate::font_data::FontDescription;
use crate::font_face::{LoadFontCallback, LoadStatus};
use crate::segmented::FontFaceMap;
use crate::task::Task;
use crate::{is_generic_family, FontFaceId, LoadRequestId};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FontFaceSetEventKind {
    Loading,
    LoadingDone,
    LoadingError,
}

impl FontFaceSetEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            FontFaceSetEventKind::Loading => "loading",
            FontFaceSetEventKind::LoadingDone => "loadingdone",
            FontFaceSetEventKind::LoadingError => "loadingerror",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFaceSetLoadEvent {
    pub kind: FontFaceSetEventKind,
    pub fontfaces: Vec<FontFaceId>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadyState {
    Pending,
    Resolved,
}

/// Settlement of a [`FontFaceSet::load`] request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Pending,
    Resolved(Vec<FontFaceId>),
    Rejected(FontFaceError),
}

#[derive(Debug, Clone)]
struct LoadRequest {
    faces: Vec<FontFaceId>,
    num_loading: usize,
    error_occurred: bool,
    outcome: LoadOutcome,
}

impl LoadRequest {
    fn notify_loaded(&mut self) {
        self.num_loading = self.num_loading.saturating_sub(1);
        if self.num_loading > 0 || self.error_occurred {
            return;
        }
        self.outcome = LoadOutcome::Resolved(self.faces.clone());
    }

    fn notify_error(&mut self, error: FontFaceError) {
        self.num_loading = self.num_loading.saturating_sub(1);
        if !self.error_occurred {
            self.error_occurred = true;
            self.outcome = LoadOutcome::Rejected(error);
        }
    }
}

#[derive(Debug)]
pub struct FontFaceSet {
    kind: ContextKind,
    non_css_connected_faces: Vec<FontFaceId>,
    loading_fonts: BTreeSet<FontFaceId>,
    loaded_fonts: Vec<FontFaceId>,
    failed_fonts: Vec<FontFaceId>,
    is_loading: bool,
    should_fire_loading_event: bool,
    pending_task_queued: bool,
    ready: ReadyState,
    events: Vec<FontFaceSetLoadEvent>,
    load_requests: BTreeMap<LoadRequestId, LoadRequest>,
}

impl FontFaceSet {
    pub fn new(kind: ContextKind) -> Self {
        Self {
            kind,
            non_css_connected_faces: Vec::new(),
            loading_fonts: BTreeSet::new(),
            loaded_fonts: Vec::new(),
            failed_fonts: Vec::new(),
            is_loading: false,
            should_fire_loading_event: false,
            pending_task_queued: false,
            ready: ReadyState::Pending,
            events: Vec::new(),
            load_requests: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    /// `"loading"` while any face is loading, `"loaded"` otherwise.
    pub fn status(&self) -> &'static str {
        if self.is_loading {
            "loading"
        } else {
            "loaded"
        }
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn loading_fonts(&self) -> &BTreeSet<FontFaceId> {
        &self.loading_fonts
    }

    pub fn non_css_connected_faces(&self) -> &[FontFaceId] {
        &self.non_css_connected_faces
    }

    // ── Membership ──────────────────────────────────────────────────────────

    /// Adds a script face. CSS-connected faces and faces already in the
    /// set are ignored.
    pub fn add(
        &mut self,
        face: FontFaceId,
        cache: &mut FontFaceCache,
        faces: &mut FontFaceMap,
        ctx: &mut LoadContext,
    ) {
        if ctx.document.detached || self.non_css_connected_faces.contains(&face) {
            return;
        }
        let (css_connected, status) = match faces.get(&face) {
            Some(f) => (f.is_css_connected(), f.status()),
            None => return,
        };
        if css_connected {
            return;
        }
        self.non_css_connected_faces.push(face);
        cache.add_font_face(face, false, faces, ctx);
        if status == LoadStatus::Loading {
            self.add_to_loading_fonts(face, faces, ctx);
        }
        ctx.fonts_invalidated(FontInvalidationReason::General);
    }

    /// Removes a script face. Returns whether it was in the set.
    pub fn delete(
        &mut self,
        face: FontFaceId,
        cache: &mut FontFaceCache,
        faces: &mut FontFaceMap,
        ctx: &mut LoadContext,
    ) -> bool {
        if ctx.document.detached {
            return false;
        }
        let pos = match self.non_css_connected_faces.iter().position(|f| *f == face) {
            Some(pos) => pos,
            None => return false,
        };
        self.non_css_connected_faces.remove(pos);
        cache.remove_font_face(face, faces);
        if faces.get(&face).map(|f| f.status()) == Some(LoadStatus::Loading) {
            self.remove_from_loading_fonts(face, ctx);
        }
        ctx.fonts_invalidated(FontInvalidationReason::FontFaceDeleted);
        true
    }

    /// Removes every script face.
    pub fn clear(&mut self, cache: &mut FontFaceCache, faces: &mut FontFaceMap, ctx: &mut LoadContext) {
        if ctx.document.detached || self.non_css_connected_faces.is_empty() {
            return;
        }
        for face in core::mem::take(&mut self.non_css_connected_faces) {
            cache.remove_font_face(face, faces);
            if faces.get(&face).map(|f| f.status()) == Some(LoadStatus::Loading) {
                self.remove_from_loading_fonts(face, ctx);
            }
        }
        ctx.fonts_invalidated(FontInvalidationReason::General);
    }

    pub fn has(&self, face: FontFaceId, cache: &FontFaceCache) -> bool {
        self.non_css_connected_faces.contains(&face) || cache.css_connected_faces().contains(&face)
    }

    pub fn size(&self, cache: &FontFaceCache) -> usize {
        cache.css_connected_faces().len() + self.non_css_connected_faces.len()
    }

    /// CSS-connected faces, then script faces in insertion order.
    pub fn faces(&self, cache: &FontFaceCache) -> Vec<FontFaceId> {
        cache
            .css_connected_faces()
            .iter()
            .chain(self.non_css_connected_faces.iter())
            .copied()
            .collect()
    }

    // ── Loading tracking ────────────────────────────────────────────────────

    /// A face in some group started loading.
    pub fn begin_font_loading(&mut self, face: FontFaceId, faces: &mut FontFaceMap, ctx: &mut LoadContext) {
        self.add_to_loading_fonts(face, faces, ctx);
    }

    fn add_to_loading_fonts(&mut self, face: FontFaceId, faces: &mut FontFaceMap, ctx: &mut LoadContext) {
        if !self.is_loading {
            self.is_loading = true;
            self.should_fire_loading_event = true;
            self.ready = ReadyState::Pending;
            self.handle_pending_events_soon(ctx);
        }
        self.loading_fonts.insert(face);
        if let Some(f) = faces.get_mut(&face) {
            if let Some(callback) = f.add_callback(LoadFontCallback::FontFaceSet) {
                let status = f.status();
                self.run_callback(callback, face, status, f.error().cloned(), ctx);
            }
        }
    }

    fn remove_from_loading_fonts(&mut self, face: FontFaceId, ctx: &mut LoadContext) {
        self.loading_fonts.remove(&face);
        if self.loading_fonts.is_empty() {
            self.handle_pending_events_soon(ctx);
        }
    }

    pub fn notify_loaded(&mut self, face: FontFaceId, ctx: &mut LoadContext) {
        self.loaded_fonts.push(face);
        self.remove_from_loading_fonts(face, ctx);
    }

    pub fn notify_error(&mut self, face: FontFaceId, ctx: &mut LoadContext) {
        self.failed_fonts.push(face);
        self.remove_from_loading_fonts(face, ctx);
    }

    /// Delivers the settlement of `face` to one of its callbacks.
    pub(crate) fn run_callback(
        &mut self,
        callback: LoadFontCallback,
        face: FontFaceId,
        status: LoadStatus,
        error: Option<FontFaceError>,
        ctx: &mut LoadContext,
    ) {
        let loaded = status == LoadStatus::Loaded;
        match callback {
            LoadFontCallback::FontFaceSet if loaded => self.notify_loaded(face, ctx),
            LoadFontCallback::FontFaceSet => self.notify_error(face, ctx),
            LoadFontCallback::LoadRequest(id) => {
                if let Some(request) = self.load_requests.get_mut(&id) {
                    if loaded {
                        request.notify_loaded();
                    } else {
                        request.notify_error(error.unwrap_or(FontFaceError::Network));
                    }
                }
            }
        }
    }

    // ── Events and ready ────────────────────────────────────────────────────

    fn handle_pending_events_soon(&mut self, ctx: &mut LoadContext) {
        if !self.pending_task_queued {
            self.pending_task_queued = true;
            ctx.tasks.post(Task::HandlePendingEvents);
        }
    }

    /// Runs the queued event flush.
    pub fn handle_pending_events(&mut self, ctx: &LoadContext) {
        self.pending_task_queued = false;
        if ctx.document.detached {
            return;
        }
        self.fire_loading_event();
        self.fire_done_event_if_possible(ctx);
    }

    fn fire_loading_event(&mut self) {
        if self.should_fire_loading_event {
            self.should_fire_loading_event = false;
            self.events.push(FontFaceSetLoadEvent {
                kind: FontFaceSetEventKind::Loading,
                fontfaces: Vec::new(),
            });
        }
    }

    fn should_signal_ready(&self) -> bool {
        if !self.loading_fonts.is_empty() {
            return false;
        }
        self.is_loading || self.ready == ReadyState::Pending
    }

    fn fire_done_event_if_possible(&mut self, ctx: &LoadContext) {
        if self.should_fire_loading_event || !self.should_signal_ready() {
            return;
        }
        if self.kind == ContextKind::Document && ctx.document.needs_layout {
            debug!("font face set: done events wait for layout");
            return;
        }

        if self.is_loading {
            let loaded = core::mem::take(&mut self.loaded_fonts);
            let failed = core::mem::take(&mut self.failed_fonts);
            self.events.push(FontFaceSetLoadEvent {
                kind: FontFaceSetEventKind::LoadingDone,
                fontfaces: loaded,
            });
            if !failed.is_empty() {
                self.events.push(FontFaceSetLoadEvent {
                    kind: FontFaceSetEventKind::LoadingError,
                    fontfaces: failed,
                });
            }
            self.is_loading = false;
        }
        self.ready = ReadyState::Resolved;
    }

    /// State of the `ready` promise. Asking while it is pending and
    /// nothing is loading schedules its resolution.
    pub fn ready(&mut self, ctx: &mut LoadContext) -> ReadyState {
        if self.ready == ReadyState::Pending && self.should_signal_ready() && !ctx.document.detached {
            self.handle_pending_events_soon(ctx);
        }
        self.ready
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready
    }

    /// Layout finished; deferred done events may fire now.
    pub fn did_layout(&mut self, ctx: &mut LoadContext) {
        if ctx.document.detached || !self.should_signal_ready() {
            return;
        }
        self.handle_pending_events_soon(ctx);
    }

    pub fn take_events(&mut self) -> Vec<FontFaceSetLoadEvent> {
        core::mem::take(&mut self.events)
    }

    // ── load() / check() ────────────────────────────────────────────────────

    /// Loads every face of `description`'s families whose ranges intersect
    /// `text`. The outcome is available from
    /// [`load_request_outcome`](Self::load_request_outcome).
    pub fn load(
        &mut self,
        description: &FontDescription,
        text: &str,
        cache: &mut FontFaceCache,
        faces: &mut FontFaceMap,
        ctx: &mut LoadContext,
    ) -> LoadRequestId {
        let id = LoadRequestId::new();
        let mut matched = Vec::new();
        for family in &description.families {
            if is_generic_family(family) {
                continue;
            }
            if let Some(group) = cache.get(description, family) {
                if let Some(group) = cache.segmented_face(group) {
                    matched.extend(group.match_text(text, faces));
                }
            }
        }

        let mut request = LoadRequest {
            num_loading: matched.len(),
            faces: matched.clone(),
            error_occurred: false,
            outcome: LoadOutcome::Pending,
        };
        if matched.is_empty() {
            request.outcome = LoadOutcome::Resolved(Vec::new());
        }
        self.load_requests.insert(id, request);

        for face in matched {
            let settled = match faces.get_mut(&face) {
                Some(f) => {
                    f.load(ctx);
                    f.add_callback(LoadFontCallback::LoadRequest(id))
                        .map(|callback| (callback, f.status(), f.error().cloned()))
                }
                None => None,
            };
            if let Some((callback, status, error)) = settled {
                self.run_callback(callback, face, status, error, ctx);
            }
        }
        id
    }

    pub fn load_request_outcome(&self, id: LoadRequestId) -> Option<&LoadOutcome> {
        self.load_requests.get(&id).map(|r| &r.outcome)
    }

    /// Forgets a settled or abandoned request.
    pub fn take_load_request_outcome(&mut self, id: LoadRequestId) -> Option<LoadOutcome> {
        self.load_requests.remove(&id).map(|r| r.outcome)
    }

    /// Requests not yet taken, settled or not.
    pub fn load_request_count(&self) -> usize {
        self.load_requests.len()
    }

    /// Whether every face needed to render `text` with `description` is
    /// already loaded. Families the platform provides are skipped.
    pub fn check(
        &self,
        description: &FontDescription,
        text: &str,
        cache: &mut FontFaceCache,
        faces: &FontFaceMap,
        ctx: &LoadContext,
    ) -> bool {
        if ctx.document.detached {
            return false;
        }
        for c in text.chars() {
            for family in &description.families {
                if is_generic_family(family) || ctx.provider().has_family(family) {
                    continue;
                }
                let group = match cache.get(description, family) {
                    Some(group) => group,
                    None => continue,
                };
                if let Some(group) = cache.segmented_face(group) {
                    if !group.check_font(c, faces) {
                        return false;
                    }
                }
            }
        }
        true
    }

    // ── LCP limit ───────────────────────────────────────────────────────────

    /// Starts the one-shot LCP limit timer the first time a remote font
    /// begins loading in a document.
    pub fn start_lcp_limit_timer_if_needed(&mut self, ctx: &mut LoadContext) {
        if self.kind != ContextKind::Document
            || !ctx.config.align_auto_timeout_with_lcp_goal
            || ctx.lcp_limit_reached
            || ctx.lcp_timer_started
        {
            return;
        }
        let limit = match ctx.document.lcp_limit_ms {
            Some(limit) => limit,
            None => return,
        };
        ctx.lcp_timer_started = true;
        let remaining = limit.saturating_sub(ctx.now_ms());
        debug!("font face set: LCP limit in {} ms", remaining);
        ctx.tasks.post_delayed(Task::LcpLimitReached, remaining);
    }

    /// The LCP limit passed: every face recomputes its display period.
    pub fn lcp_limit_reached(&mut self, cache: &FontFaceCache, faces: &mut FontFaceMap, ctx: &mut LoadContext) {
        if ctx.document.detached {
            return;
        }
        ctx.lcp_limit_reached = true;
        for face in self.faces(cache) {
            if let Some(f) = faces.get_mut(&face) {
                f.css_font_face_mut().update_period(ctx);
            }
        }
    }

    /// Forgets a face that is being destroyed.
    pub(crate) fn forget(&mut self, face: FontFaceId, ctx: &mut LoadContext) {
        if self.loading_fonts.contains(&face) {
            self.remove_from_loading_fonts(face, ctx);
        }
        self.non_css_connected_faces.retain(|f| *f != face);
    }
}

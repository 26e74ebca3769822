//! State shared by every face of one selector: configuration, document
//! state, the embedder seams, the task queue and the outbox of
//! notifications the selector processes after each operation.

use alloc::boxed::Box;
use alloc::collections::btree_map::BTreeMap;
use alloc::collections::btree_set::BTreeSet;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use log::{info, warn};

use crate::config::{DocumentState, FontLoadingConfig};
use crate::font_face::LoadStatus;
use crate::platform::{
    CorsMode, FontDecoder, FontFetchRequest, FontFetchResponse, FontFetcher, PlatformFontProvider,
};
use crate::task::{Task, TaskQueue};
use crate::{FetchRequestId, FontFaceId, SourceId};

/// Why the set of usable fonts changed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FontInvalidationReason {
    General,
    FontFaceLoaded,
    FontFaceDeleted,
}

impl fmt::Display for FontInvalidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FontInvalidationReason::General => "general",
            FontInvalidationReason::FontFaceLoaded => "font face loaded",
            FontInvalidationReason::FontFaceDeleted => "font face deleted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConsoleLevel {
    Info,
    Warning,
    Error,
}

/// A message for the developer console of the owning context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleMessage {
    pub level: ConsoleLevel,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Notification {
    LoadStatusChanged {
        face: FontFaceId,
        status: LoadStatus,
        in_segmented: bool,
    },
    /// Cached font data of every group holding the face is stale.
    FaceInvalidated(FontFaceId),
    FontsInvalidated(FontInvalidationReason),
    RemoteLoadStarted,
}

pub struct LoadContext {
    pub config: FontLoadingConfig,
    pub document: DocumentState,
    pub lcp_limit_reached: bool,
    pub(crate) lcp_timer_started: bool,
    pub(crate) provider: Box<dyn PlatformFontProvider>,
    pub(crate) fetcher: Box<dyn FontFetcher>,
    pub(crate) decoder: Box<dyn FontDecoder>,
    pub(crate) tasks: TaskQueue,
    pending_fetches: BTreeMap<FetchRequestId, (FontFaceId, SourceId, FontFetchRequest)>,
    unique_name_waiters: BTreeSet<(FontFaceId, SourceId)>,
    unique_name_lookup_scheduled: bool,
    render_blocking_loads: BTreeSet<FontFaceId>,
    notifications: Vec<Notification>,
    console_messages: Vec<ConsoleMessage>,
}

impl fmt::Debug for LoadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadContext")
            .field("config", &self.config)
            .field("document", &self.document)
            .field("lcp_limit_reached", &self.lcp_limit_reached)
            .field("now_ms", &self.tasks.now_ms())
            .field("pending_fetches", &self.pending_fetches.len())
            .finish()
    }
}

impl LoadContext {
    pub fn new(
        config: FontLoadingConfig,
        document: DocumentState,
        provider: Box<dyn PlatformFontProvider>,
        fetcher: Box<dyn FontFetcher>,
        decoder: Box<dyn FontDecoder>,
    ) -> Self {
        Self {
            config,
            document,
            lcp_limit_reached: false,
            lcp_timer_started: false,
            provider,
            fetcher,
            decoder,
            tasks: TaskQueue::new(),
            pending_fetches: BTreeMap::new(),
            unique_name_waiters: BTreeSet::new(),
            unique_name_lookup_scheduled: false,
            render_blocking_loads: BTreeSet::new(),
            notifications: Vec::new(),
            console_messages: Vec::new(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.tasks.now_ms()
    }

    pub fn provider(&self) -> &dyn PlatformFontProvider {
        self.provider.as_ref()
    }

    pub fn decoder(&self) -> &dyn FontDecoder {
        self.decoder.as_ref()
    }

    /// Whether `url()` sources may be downloaded in this context.
    pub fn downloads_allowed(&self) -> bool {
        !self.document.is_document() || self.config.downloadable_fonts_enabled
    }

    // ── Fetches ─────────────────────────────────────────────────────────────

    /// Hands a request to the fetcher. A synchronous answer is returned
    /// directly; otherwise the request stays pending until
    /// [`take_pending_fetch`](Self::take_pending_fetch).
    pub(crate) fn start_fetch(
        &mut self,
        face: FontFaceId,
        source: SourceId,
        url: &str,
    ) -> (FetchRequestId, Option<FontFetchResponse>) {
        let request = FontFetchRequest {
            id: FetchRequestId::new(),
            url: String::from(url),
            face,
            cors_mode: CorsMode::Anonymous,
            referrer_policy: self.document.referrer_policy.clone(),
        };
        let id = request.id;
        let response = self.fetcher.start_fetch(&request);
        if response.is_none() {
            self.pending_fetches.insert(id, (face, source, request));
        }
        (id, response)
    }

    pub(crate) fn take_pending_fetch(&mut self, id: FetchRequestId) -> Option<(FontFaceId, SourceId)> {
        self.pending_fetches
            .remove(&id)
            .map(|(face, source, _)| (face, source))
    }

    pub(crate) fn forget_fetches_of(&mut self, face: FontFaceId) {
        self.pending_fetches.retain(|_, (f, _, _)| *f != face);
    }

    pub fn pending_fetches(&self) -> impl Iterator<Item = &FontFetchRequest> {
        self.pending_fetches.values().map(|(_, _, request)| request)
    }

    // ── Render blocking ─────────────────────────────────────────────────────

    /// Only documents that have not rendered yet are blocked.
    pub(crate) fn did_begin_imperative_load(&mut self, face: FontFaceId) {
        if self.document.is_document() && !self.document.rendering_has_begun && !self.document.detached {
            self.render_blocking_loads.insert(face);
        }
    }

    pub(crate) fn imperative_load_settled(&mut self, face: FontFaceId) {
        self.render_blocking_loads.remove(&face);
    }

    pub(crate) fn clear_render_blocking_loads(&mut self) {
        self.render_blocking_loads.clear();
    }

    /// Faces whose script-started load still blocks rendering.
    pub fn render_blocking_loads(&self) -> impl Iterator<Item = FontFaceId> + '_ {
        self.render_blocking_loads.iter().copied()
    }

    // ── Unique name lookup ──────────────────────────────────────────────────

    pub(crate) fn request_unique_name_lookup(&mut self, face: FontFaceId, source: SourceId) {
        self.unique_name_waiters.insert((face, source));
        if !self.unique_name_lookup_scheduled {
            self.unique_name_lookup_scheduled = true;
            self.tasks.post(Task::BuildUniqueNameLookup);
        }
    }

    /// Builds the lookup and returns everyone who was waiting for it.
    pub(crate) fn build_unique_name_lookup(&mut self) -> Vec<(FontFaceId, SourceId)> {
        self.unique_name_lookup_scheduled = false;
        if !self.provider.unique_name_lookup_ready() {
            self.provider.build_unique_name_lookup();
        }
        core::mem::take(&mut self.unique_name_waiters)
            .into_iter()
            .collect()
    }

    // ── Outbox ──────────────────────────────────────────────────────────────

    pub(crate) fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    pub(crate) fn take_notifications(&mut self) -> Vec<Notification> {
        core::mem::take(&mut self.notifications)
    }

    pub(crate) fn fonts_invalidated(&mut self, reason: FontInvalidationReason) {
        self.notify(Notification::FontsInvalidated(reason));
    }

    pub fn add_console_message(&mut self, level: ConsoleLevel, text: String) {
        match level {
            ConsoleLevel::Info => info!("{}", text),
            ConsoleLevel::Warning | ConsoleLevel::Error => warn!("{}", text),
        }
        self.console_messages.push(ConsoleMessage { level, text });
    }

    pub fn take_console_messages(&mut self) -> Vec<ConsoleMessage> {
        core::mem::take(&mut self.console_messages)
    }
}

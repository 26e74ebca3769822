use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;

use log::debug;

use super::{BeginLoad, DisplayPeriod, LoadLimitPhase, PeriodUpdate};
use crate::config::LcpInterventionMode;
use crate::context::{ConsoleLevel, LoadContext, Notification};
use crate::descriptors::FontDisplay;
use crate::error::FetchError;
use crate::font_data::{
    CustomFontKind, FontCustomPlatformData, FontDescription, SimpleFontData, Typeface,
};
use crate::platform::{DataSource, FontFetchResponse};
use crate::selection::FontSelectionCapabilities;
use crate::task::Task;
use crate::{FetchRequestId, FontFaceId, SourceId};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RemoteState {
    NotStarted,
    Loading(FetchRequestId),
    Finished,
}

/// `url(...)`: a font downloaded through the [`FontFetcher`](crate::FontFetcher).
#[derive(Debug, Clone)]
pub struct RemoteFontFaceSource {
    url: String,
    state: RemoteState,
    custom_font_data: Option<Arc<FontCustomPlatformData>>,
    display: FontDisplay,
    phase: LoadLimitPhase,
    period: DisplayPeriod,
    is_intervention_triggered: bool,
    finished_before_document_rendering_begin: bool,
    finished_before_lcp_limit: bool,
    paint_requested_while_pending: bool,
    had_blank_text: bool,
    data_source: Option<DataSource>,
    decode_failed: bool,
    limit_timers_started: bool,
}

impl RemoteFontFaceSource {
    pub fn new(url: &str, display: FontDisplay, ctx: &LoadContext) -> Self {
        let mut source = Self {
            url: String::from(url),
            state: RemoteState::NotStarted,
            custom_font_data: None,
            display,
            phase: LoadLimitPhase::NoLimitExceeded,
            period: DisplayPeriod::Block,
            is_intervention_triggered: ctx.document.is_document()
                && ctx.document.network_is_slow
                && ctx.config.slow_network_intervention,
            finished_before_document_rendering_begin: false,
            finished_before_lcp_limit: false,
            paint_requested_while_pending: false,
            had_blank_text: false,
            data_source: None,
            decode_failed: false,
            limit_timers_started: false,
        };
        source.period = source.compute_period(ctx);
        source
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> RemoteState {
        self.state
    }

    pub fn period(&self) -> DisplayPeriod {
        self.period
    }

    pub fn phase(&self) -> LoadLimitPhase {
        self.phase
    }

    pub fn data_source(&self) -> Option<DataSource> {
        self.data_source
    }

    pub fn is_loaded(&self) -> bool {
        self.state == RemoteState::Finished
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, RemoteState::Loading(_))
    }

    /// Still worth trying: not finished yet, or finished with a font.
    pub fn is_valid(&self) -> bool {
        !self.is_loaded() || self.custom_font_data.is_some()
    }

    fn finished_from_memory_cache(&self) -> bool {
        self.is_loaded() && self.data_source.map_or(false, |d| d.is_memory_cache())
    }

    fn may_be_icon_font(&self) -> bool {
        self.custom_font_data
            .as_ref()
            .map_or(false, |d| d.may_be_icon_font)
    }

    fn needs_intervention_to_align_with_lcp_goal(&self, ctx: &LoadContext) -> bool {
        if !ctx.document.is_document()
            || !ctx.config.align_auto_timeout_with_lcp_goal
            || self.display != FontDisplay::Auto
            || !ctx.lcp_limit_reached
        {
            return false;
        }
        if !self.is_loaded() {
            return true;
        }
        !self.finished_from_memory_cache() && !self.finished_before_lcp_limit
    }

    /// The display period implied by the current inputs. Pure: calling it
    /// twice without an intervening state change gives the same answer.
    pub fn compute_period(&self, ctx: &LoadContext) -> DisplayPeriod {
        if self.decode_failed {
            return DisplayPeriod::Failure;
        }
        if self.finished_from_memory_cache() {
            return DisplayPeriod::NotApplicable;
        }

        match self.display {
            FontDisplay::Auto => {
                if self.is_intervention_triggered {
                    return match self.phase {
                        LoadLimitPhase::NoLimitExceeded => DisplayPeriod::Block,
                        _ => DisplayPeriod::Failure,
                    };
                }
                if self.needs_intervention_to_align_with_lcp_goal(ctx) {
                    return match ctx.config.lcp_intervention_mode {
                        LcpInterventionMode::ToSwapPeriod => DisplayPeriod::Swap,
                        LcpInterventionMode::ToFailurePeriod => {
                            // late icon-ambiguous fonts stay hidden
                            if self.is_loaded() && !self.may_be_icon_font() {
                                DisplayPeriod::Swap
                            } else {
                                DisplayPeriod::Failure
                            }
                        }
                    };
                }
                match self.phase {
                    LoadLimitPhase::NoLimitExceeded | LoadLimitPhase::ShortLimitExceeded => {
                        DisplayPeriod::Block
                    }
                    LoadLimitPhase::LongLimitExceeded => DisplayPeriod::Swap,
                }
            }
            FontDisplay::Block => match self.phase {
                LoadLimitPhase::NoLimitExceeded | LoadLimitPhase::ShortLimitExceeded => {
                    DisplayPeriod::Block
                }
                LoadLimitPhase::LongLimitExceeded => DisplayPeriod::Swap,
            },
            FontDisplay::Swap => DisplayPeriod::Swap,
            FontDisplay::Fallback => match self.phase {
                LoadLimitPhase::NoLimitExceeded => DisplayPeriod::Block,
                LoadLimitPhase::ShortLimitExceeded => DisplayPeriod::Swap,
                LoadLimitPhase::LongLimitExceeded => DisplayPeriod::Failure,
            },
            FontDisplay::Optional => {
                // never render invisible text for optional fonts
                if !ctx.document.is_document() || !ctx.document.rendering_has_begun {
                    return DisplayPeriod::Swap;
                }
                if self.finished_from_memory_cache()
                    || self.finished_before_document_rendering_begin
                    || !self.paint_requested_while_pending
                {
                    DisplayPeriod::Swap
                } else {
                    DisplayPeriod::Failure
                }
            }
        }
    }

    pub fn update_period(&mut self, ctx: &mut LoadContext) -> PeriodUpdate {
        let new_period = self.compute_period(ctx);
        let changed = new_period != self.period;
        // the fallback is invisible exactly while loading in the block period
        let fallback_visibility_changed = self.is_loading()
            && changed
            && (self.period == DisplayPeriod::Block || new_period == DisplayPeriod::Block);
        if changed {
            debug!(
                "{}: display period {:?} -> {:?}",
                self.url, self.period, new_period
            );
        }
        self.period = new_period;
        PeriodUpdate {
            changed,
            fallback_visibility_changed,
        }
    }

    pub fn set_display(&mut self, display: FontDisplay, ctx: &mut LoadContext) -> PeriodUpdate {
        self.display = display;
        if self.is_loaded() {
            return PeriodUpdate::default();
        }
        self.update_period(ctx)
    }

    pub fn load_limit_exceeded(
        &mut self,
        phase: LoadLimitPhase,
        ctx: &mut LoadContext,
    ) -> PeriodUpdate {
        if self.is_loaded() {
            return PeriodUpdate::default();
        }
        self.phase = self.phase.max(phase);
        self.update_period(ctx)
    }

    pub fn paint_requested(&mut self) {
        if !self.is_loaded() {
            self.paint_requested_while_pending = true;
            if self.period == DisplayPeriod::Block {
                self.had_blank_text = true;
            }
        }
    }

    /// Whether invisible fallback text was painted while this source loaded.
    pub fn had_blank_text(&self) -> bool {
        self.had_blank_text
    }

    pub fn begin_load_if_needed(
        &mut self,
        face: FontFaceId,
        source: SourceId,
        ctx: &mut LoadContext,
    ) -> BeginLoad {
        if self.is_loaded() || ctx.document.detached {
            return BeginLoad::default();
        }

        let mut completed = None;
        if self.state == RemoteState::NotStarted {
            if self.is_intervention_triggered && self.display == FontDisplay::Auto {
                ctx.add_console_message(
                    ConsoleLevel::Info,
                    format!(
                        "Slow network is detected. Fallback font will be used while loading: {}",
                        self.url
                    ),
                );
            }
            let (id, response) = ctx.start_fetch(face, source, &self.url);
            self.state = RemoteState::Loading(id);
            completed = response;
        }

        if !self.limit_timers_started {
            self.limit_timers_started = true;
            let short_ms = ctx.config.short_limit.as_millis() as u64;
            let long_ms = ctx.config.long_limit.as_millis() as u64;
            ctx.tasks
                .post_delayed(Task::ShortLimitExceeded { face, source }, short_ms);
            ctx.tasks
                .post_delayed(Task::LongLimitExceeded { face, source }, long_ms);
        }

        ctx.notify(Notification::RemoteLoadStarted);

        BeginLoad {
            did_begin_load: true,
            completed,
        }
    }

    /// Takes the fetch result. Returns `false` if it was dropped.
    pub fn notify_finished(&mut self, response: FontFetchResponse, ctx: &mut LoadContext) -> bool {
        if ctx.document.detached {
            return false;
        }

        self.data_source = Some(response.data_source);
        match response.result {
            Ok(bytes) => match ctx.decoder().decode(&bytes) {
                Ok(data) => self.custom_font_data = Some(Arc::new(data)),
                Err(e) => {
                    self.decode_failed = true;
                    ctx.add_console_message(
                        ConsoleLevel::Warning,
                        format!("Failed to decode downloaded font: {}", self.url),
                    );
                    ctx.add_console_message(
                        ConsoleLevel::Warning,
                        format!("OTS parsing error: {}", e.reason),
                    );
                }
            },
            Err(FetchError::IntegrityCheckFailed) => {
                // same outcome as a network error: no data
                ctx.add_console_message(
                    ConsoleLevel::Error,
                    format!(
                        "Failed to find a valid digest in the 'integrity' attribute for resource '{}'",
                        self.url
                    ),
                );
            }
            Err(e) => {
                debug!("{}: fetch failed: {}", self.url, e);
            }
        }
        self.state = RemoteState::Finished;

        if ctx.document.is_document() {
            if !ctx.document.rendering_has_begun {
                self.finished_before_document_rendering_begin = true;
            }
            if !ctx.lcp_limit_reached {
                self.finished_before_lcp_limit = true;
            }
        }

        self.update_period(ctx);
        true
    }

    pub fn create_font_data(
        &self,
        description: &FontDescription,
        capabilities: &FontSelectionCapabilities,
        face: FontFaceId,
        source: SourceId,
        ctx: &LoadContext,
    ) -> Option<Arc<SimpleFontData>> {
        if self.period == DisplayPeriod::Failure || !self.is_valid() {
            return None;
        }

        if !self.is_loaded() {
            return Some(Arc::new(SimpleFontData::new(
                Typeface::System(ctx.provider().last_resort_typeface()),
                description,
                capabilities,
                CustomFontKind::LoadingFallback {
                    visible: self.period != DisplayPeriod::Block,
                    face,
                    source,
                },
            )));
        }

        let data = self.custom_font_data.as_ref()?;
        Some(Arc::new(SimpleFontData::new(
            Typeface::Web(data.clone()),
            description,
            capabilities,
            CustomFontKind::WebFont,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DocumentState, FontLoadingConfig};
    use crate::platform::{DeferredFetcher, MemoryFontProvider, SfntSniffDecoder};
    use alloc::boxed::Box;

    fn context(config: FontLoadingConfig, document: DocumentState) -> LoadContext {
        LoadContext::new(
            config,
            document,
            Box::new(MemoryFontProvider::new()),
            Box::new(DeferredFetcher),
            Box::new(SfntSniffDecoder),
        )
    }

    fn font_bytes() -> Vec<u8> {
        let mut bytes = b"OTTO".to_vec();
        bytes.resize(32, 0);
        bytes
    }

    fn start(source: &mut RemoteFontFaceSource, ctx: &mut LoadContext) {
        let begin = source.begin_load_if_needed(FontFaceId::new(), SourceId::new(), ctx);
        assert!(begin.did_begin_load);
        assert!(begin.completed.is_none());
    }

    #[test]
    fn fallback_timeline() {
        let mut ctx = context(FontLoadingConfig::default(), DocumentState::document());
        let mut source = RemoteFontFaceSource::new("a.woff2", FontDisplay::Fallback, &ctx);
        start(&mut source, &mut ctx);
        assert_eq!(source.period(), DisplayPeriod::Block);

        let update = source.load_limit_exceeded(LoadLimitPhase::ShortLimitExceeded, &mut ctx);
        assert!(update.changed && update.fallback_visibility_changed);
        assert_eq!(source.period(), DisplayPeriod::Swap);

        let update = source.load_limit_exceeded(LoadLimitPhase::LongLimitExceeded, &mut ctx);
        assert!(update.changed && !update.fallback_visibility_changed);
        assert_eq!(source.period(), DisplayPeriod::Failure);
    }

    #[test]
    fn compute_period_is_idempotent() {
        let mut ctx = context(FontLoadingConfig::default(), DocumentState::document());
        let mut source = RemoteFontFaceSource::new("a.woff2", FontDisplay::Auto, &ctx);
        start(&mut source, &mut ctx);
        ctx.lcp_limit_reached = true;
        let first = source.compute_period(&ctx);
        assert_eq!(first, source.compute_period(&ctx));
        assert!(source.update_period(&mut ctx).changed);
        assert!(!source.update_period(&mut ctx).changed);
        assert_eq!(source.period(), DisplayPeriod::Swap);
    }

    #[test]
    fn lcp_failure_mode_fails_icon_fonts() {
        let config = FontLoadingConfig::default()
            .with_lcp_alignment(true, LcpInterventionMode::ToFailurePeriod);
        let mut ctx = context(config, DocumentState::document());
        let mut source = RemoteFontFaceSource::new("icons.woff2", FontDisplay::Auto, &ctx);
        start(&mut source, &mut ctx);
        ctx.lcp_limit_reached = true;
        assert_eq!(source.compute_period(&ctx), DisplayPeriod::Failure);

        source.custom_font_data = Some(Arc::new(
            FontCustomPlatformData::new(&font_bytes()).with_family_name("Material Icons".into()),
        ));
        source.state = RemoteState::Finished;
        source.data_source = Some(DataSource::Network);
        assert_eq!(source.compute_period(&ctx), DisplayPeriod::Failure);

        // a late text font is still swapped in
        source.custom_font_data = Some(Arc::new(
            FontCustomPlatformData::new(&font_bytes()).with_family_name("Brand Sans".into()),
        ));
        assert_eq!(source.compute_period(&ctx), DisplayPeriod::Swap);
    }

    #[test]
    fn optional_swaps_before_rendering_begins() {
        let mut ctx = context(FontLoadingConfig::default(), DocumentState::document());
        let mut source = RemoteFontFaceSource::new("o.woff2", FontDisplay::Optional, &ctx);
        start(&mut source, &mut ctx);
        assert_eq!(source.period(), DisplayPeriod::Swap);

        ctx.document.rendering_has_begun = true;
        source.paint_requested();
        source.update_period(&mut ctx);
        assert_eq!(source.period(), DisplayPeriod::Failure);
    }

    #[test]
    fn optional_finished_before_render_stays_usable() {
        let mut ctx = context(FontLoadingConfig::default(), DocumentState::document());
        let mut source = RemoteFontFaceSource::new("o.woff2", FontDisplay::Optional, &ctx);
        start(&mut source, &mut ctx);
        assert!(source.notify_finished(
            FontFetchResponse::ok(font_bytes(), DataSource::Network),
            &mut ctx
        ));

        ctx.document.rendering_has_begun = true;
        source.update_period(&mut ctx);
        assert_eq!(source.period(), DisplayPeriod::Swap);
    }

    #[test]
    fn decode_error_latches_failure() {
        let mut ctx = context(FontLoadingConfig::default(), DocumentState::document());
        let mut source = RemoteFontFaceSource::new("bad.woff2", FontDisplay::Swap, &ctx);
        start(&mut source, &mut ctx);
        source.notify_finished(
            FontFetchResponse::ok(b"not a font at all".to_vec(), DataSource::MemoryCache),
            &mut ctx,
        );
        assert!(!source.is_valid());
        assert_eq!(source.period(), DisplayPeriod::Failure);
        let messages = ctx.take_console_messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].text.starts_with("Failed to decode downloaded font"));
    }

    #[test]
    fn detached_context_drops_results() {
        let mut ctx = context(FontLoadingConfig::default(), DocumentState::document());
        let mut source = RemoteFontFaceSource::new("a.woff2", FontDisplay::Swap, &ctx);
        start(&mut source, &mut ctx);
        ctx.document.detached = true;
        assert!(!source.notify_finished(
            FontFetchResponse::ok(font_bytes(), DataSource::Network),
            &mut ctx
        ));
        assert!(source.is_loading());
    }

    #[test]
    fn slow_network_intervention() {
        let mut document = DocumentState::document();
        document.network_is_slow = true;
        let mut ctx = context(FontLoadingConfig::default(), document);
        let mut source = RemoteFontFaceSource::new("a.woff2", FontDisplay::Auto, &ctx);
        start(&mut source, &mut ctx);
        assert_eq!(ctx.take_console_messages().len(), 1);
        source.load_limit_exceeded(LoadLimitPhase::ShortLimitExceeded, &mut ctx);
        assert_eq!(source.period(), DisplayPeriod::Failure);
    }
}

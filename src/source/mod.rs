//! One entry of a face's `src` list, plus the per-instantiation cache of
//! font data it produced.

mod binary;
mod local;
mod remote;

pub use self::binary::BinaryFontFaceSource;
pub use self::local::LocalFontFaceSource;
pub use self::remote::{RemoteFontFaceSource, RemoteState};

use alloc::sync::Arc;
use core::num::NonZeroUsize;

use lru::LruCache;

use crate::context::LoadContext;
use crate::descriptors::FontDisplay;
use crate::font_data::{FontCacheKey, FontDescription, SimpleFontData};
use crate::platform::FontFetchResponse;
use crate::selection::FontSelectionCapabilities;
use crate::{FontFaceId, SourceId};

/// Where a loading remote font is on the `font-display` timeline.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DisplayPeriod {
    /// Render invisible fallback text.
    Block,
    /// Render visible fallback text; swap in the font when it arrives.
    Swap,
    /// Give up on this font.
    Failure,
    /// Served from memory; the timeline never applied.
    NotApplicable,
}

/// How far a remote load has run past its load limits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadLimitPhase {
    NoLimitExceeded,
    ShortLimitExceeded,
    LongLimitExceeded,
}

/// Result of recomputing a source's display period.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PeriodUpdate {
    pub changed: bool,
    /// The loading fallback switched between visible and invisible.
    pub fallback_visibility_changed: bool,
}

/// What a call to `begin_load_if_needed` set in motion.
#[derive(Debug, Default)]
pub struct BeginLoad {
    /// The owning face should move from `Unloaded` to `Loading`.
    pub did_begin_load: bool,
    /// The fetcher answered synchronously.
    pub completed: Option<FontFetchResponse>,
}

#[derive(Debug)]
pub enum FontFaceSource {
    Local(LocalFontFaceSource),
    Remote(RemoteFontFaceSource),
    BinaryData(BinaryFontFaceSource),
}

#[derive(Debug)]
pub struct CssFontFaceSource {
    id: SourceId,
    source: FontFaceSource,
    font_data_table: LruCache<FontCacheKey, Option<Arc<SimpleFontData>>>,
}

fn table_capacity(ctx: &LoadContext) -> NonZeroUsize {
    NonZeroUsize::new(ctx.config.source_cache_size).unwrap_or(NonZeroUsize::MIN)
}

impl CssFontFaceSource {
    pub fn new(source: FontFaceSource, ctx: &LoadContext) -> Self {
        Self {
            id: SourceId::new(),
            source,
            font_data_table: LruCache::new(table_capacity(ctx)),
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn source(&self) -> &FontFaceSource {
        &self.source
    }

    pub fn as_remote(&self) -> Option<&RemoteFontFaceSource> {
        match &self.source {
            FontFaceSource::Remote(remote) => Some(remote),
            _ => None,
        }
    }

    pub fn is_valid(&self, ctx: &LoadContext) -> bool {
        match &self.source {
            FontFaceSource::Local(local) => local.is_valid(ctx),
            FontFaceSource::Remote(remote) => remote.is_valid(),
            FontFaceSource::BinaryData(binary) => binary.is_valid(),
        }
    }

    pub fn is_loading(&self, ctx: &LoadContext) -> bool {
        match &self.source {
            FontFaceSource::Local(local) => local.is_loading(ctx),
            FontFaceSource::Remote(remote) => remote.is_loading(),
            FontFaceSource::BinaryData(_) => false,
        }
    }

    pub fn is_loaded(&self, ctx: &LoadContext) -> bool {
        match &self.source {
            FontFaceSource::Local(local) => local.is_loaded(ctx),
            FontFaceSource::Remote(remote) => remote.is_loaded(),
            FontFaceSource::BinaryData(_) => true,
        }
    }

    /// A `local()` source whose lookup can be answered right now.
    pub fn is_local_non_blocking(&self, ctx: &LoadContext) -> bool {
        match &self.source {
            FontFaceSource::Local(local) => local.is_local_non_blocking(ctx),
            _ => false,
        }
    }

    pub fn is_local_font_available(&self, ctx: &LoadContext) -> bool {
        match &self.source {
            FontFaceSource::Local(local) => local.is_local_font_available(ctx),
            _ => false,
        }
    }

    pub fn is_in_block_period(&self) -> bool {
        matches!(&self.source, FontFaceSource::Remote(r) if r.period() == DisplayPeriod::Block)
    }

    pub fn is_in_failure_period(&self) -> bool {
        matches!(&self.source, FontFaceSource::Remote(r) if r.period() == DisplayPeriod::Failure)
    }

    pub fn begin_load_if_needed(&mut self, face: FontFaceId, ctx: &mut LoadContext) -> BeginLoad {
        let id = self.id;
        match &mut self.source {
            FontFaceSource::Local(local) => local.begin_load_if_needed(face, id, ctx),
            FontFaceSource::Remote(remote) => remote.begin_load_if_needed(face, id, ctx),
            FontFaceSource::BinaryData(_) => BeginLoad::default(),
        }
    }

    /// Font data for one instantiation, cached per cache key. Misses are
    /// cached too.
    pub fn font_data(
        &mut self,
        description: &FontDescription,
        capabilities: &FontSelectionCapabilities,
        face: FontFaceId,
        ctx: &LoadContext,
    ) -> Option<Arc<SimpleFontData>> {
        if !self.is_valid(ctx) {
            return None;
        }

        let key = description.cache_key();
        if let Some(cached) = self.font_data_table.get(&key) {
            return cached.clone();
        }

        let id = self.id;
        let data = match &self.source {
            FontFaceSource::Local(local) => {
                local.create_font_data(description, capabilities, face, id, ctx)
            }
            FontFaceSource::Remote(remote) => {
                remote.create_font_data(description, capabilities, face, id, ctx)
            }
            FontFaceSource::BinaryData(binary) => binary.create_font_data(description, capabilities),
        };
        self.font_data_table.put(key, data.clone());
        data
    }

    pub fn prune_table(&mut self) {
        self.font_data_table.clear();
    }

    pub fn cached_entries(&self) -> usize {
        self.font_data_table.len()
    }

    pub fn update_period(&mut self, ctx: &mut LoadContext) -> PeriodUpdate {
        let update = match &mut self.source {
            FontFaceSource::Remote(remote) => remote.update_period(ctx),
            _ => PeriodUpdate::default(),
        };
        if update.fallback_visibility_changed {
            self.prune_table();
        }
        update
    }

    pub fn set_display(&mut self, display: FontDisplay, ctx: &mut LoadContext) -> PeriodUpdate {
        let update = match &mut self.source {
            FontFaceSource::Remote(remote) => remote.set_display(display, ctx),
            _ => PeriodUpdate::default(),
        };
        if update.fallback_visibility_changed {
            self.prune_table();
        }
        update
    }

    pub fn load_limit_exceeded(
        &mut self,
        phase: LoadLimitPhase,
        ctx: &mut LoadContext,
    ) -> PeriodUpdate {
        let update = match &mut self.source {
            FontFaceSource::Remote(remote) => remote.load_limit_exceeded(phase, ctx),
            _ => PeriodUpdate::default(),
        };
        if update.fallback_visibility_changed {
            self.prune_table();
        }
        update
    }

    /// Delivers a fetch result. Returns whether the owning face should be
    /// told that this source finished.
    pub fn fetch_finished(&mut self, response: FontFetchResponse, ctx: &mut LoadContext) -> bool {
        let finished = match &mut self.source {
            FontFaceSource::Remote(remote) => remote.notify_finished(response, ctx),
            _ => false,
        };
        if finished {
            self.prune_table();
        }
        finished
    }

    /// The platform unique name lookup became available.
    pub fn unique_name_lookup_ready(&mut self) {
        if let FontFaceSource::Local(_) = self.source {
            self.prune_table();
        }
    }

    pub fn paint_requested(&mut self) {
        if let FontFaceSource::Remote(remote) = &mut self.source {
            remote.paint_requested();
        }
    }

    pub fn had_blank_text(&self) -> bool {
        matches!(&self.source, FontFaceSource::Remote(r) if r.had_blank_text())
    }
}

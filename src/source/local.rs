use alloc::string::String;
use alloc::sync::Arc;

use log::debug;

use super::BeginLoad;
use crate::context::LoadContext;
use crate::font_data::{CustomFontKind, FontDescription, SimpleFontData, Typeface};
use crate::selection::FontSelectionCapabilities;
use crate::{FontFaceId, SourceId};

/// `local(<font name>)`: a font installed on the system, looked up by its
/// full or postscript name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFontFaceSource {
    font_name: String,
}

impl LocalFontFaceSource {
    pub fn new(font_name: &str) -> Self {
        Self {
            font_name: String::from(font_name),
        }
    }

    pub fn font_name(&self) -> &str {
        &self.font_name
    }

    pub fn is_local_non_blocking(&self, ctx: &LoadContext) -> bool {
        ctx.provider().unique_name_lookup_ready()
    }

    pub fn is_local_font_available(&self, ctx: &LoadContext) -> bool {
        ctx.provider().has_unique_name(&self.font_name)
    }

    pub fn is_loaded(&self, ctx: &LoadContext) -> bool {
        self.is_local_non_blocking(ctx)
    }

    pub fn is_loading(&self, ctx: &LoadContext) -> bool {
        !self.is_local_non_blocking(ctx)
    }

    pub fn is_valid(&self, ctx: &LoadContext) -> bool {
        self.is_loading(ctx) || self.is_local_font_available(ctx)
    }

    pub fn begin_load_if_needed(
        &mut self,
        face: FontFaceId,
        source: SourceId,
        ctx: &mut LoadContext,
    ) -> BeginLoad {
        if self.is_loaded(ctx) {
            return BeginLoad::default();
        }
        debug!("local({}) waits for the unique name lookup", self.font_name);
        ctx.request_unique_name_lookup(face, source);
        BeginLoad {
            did_begin_load: true,
            completed: None,
        }
    }

    pub fn create_font_data(
        &self,
        description: &FontDescription,
        capabilities: &FontSelectionCapabilities,
        face: FontFaceId,
        source: SourceId,
        ctx: &LoadContext,
    ) -> Option<Arc<SimpleFontData>> {
        if !self.is_valid(ctx) || !ctx.config.local_fonts_enabled {
            return None;
        }

        if self.is_loading(ctx) {
            return Some(Arc::new(SimpleFontData::new(
                Typeface::System(ctx.provider().last_resort_typeface()),
                description,
                capabilities,
                CustomFontKind::LoadingFallback {
                    visible: true,
                    face,
                    source,
                },
            )));
        }

        // a local() name denotes one face, so it is looked up unstyled
        let typeface = ctx.provider().typeface_for_unique_name(&self.font_name)?;
        Some(Arc::new(SimpleFontData::new(
            Typeface::System(typeface),
            &description.unstyled(),
            capabilities,
            CustomFontKind::None,
        )))
    }
}

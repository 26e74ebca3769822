use alloc::sync::Arc;

use crate::context::LoadContext;
use crate::error::DecodeError;
use crate::font_data::{
    CustomFontKind, FontCustomPlatformData, FontDescription, SimpleFontData, Typeface,
};
use crate::selection::FontSelectionCapabilities;

/// Font bytes handed over directly (an `ArrayBuffer` source). Decoded once
/// at construction; either usable right away or never.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryFontFaceSource {
    custom_platform_data: Option<Arc<FontCustomPlatformData>>,
}

impl BinaryFontFaceSource {
    pub fn new(bytes: &[u8], ctx: &LoadContext) -> (Self, Result<(), DecodeError>) {
        match ctx.decoder().decode(bytes) {
            Ok(data) => (
                Self {
                    custom_platform_data: Some(Arc::new(data)),
                },
                Ok(()),
            ),
            Err(e) => (
                Self {
                    custom_platform_data: None,
                },
                Err(e),
            ),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.custom_platform_data.is_some()
    }

    pub fn platform_data(&self) -> Option<&Arc<FontCustomPlatformData>> {
        self.custom_platform_data.as_ref()
    }

    pub fn create_font_data(
        &self,
        description: &FontDescription,
        capabilities: &FontSelectionCapabilities,
    ) -> Option<Arc<SimpleFontData>> {
        let data = self.custom_platform_data.as_ref()?;
        Some(Arc::new(SimpleFontData::new(
            Typeface::Web(data.clone()),
            description,
            capabilities,
            CustomFontKind::WebFont,
        )))
    }
}

//! Seams to the embedder: installed fonts, networking and font decoding.

use alloc::collections::btree_map::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::error::{DecodeError, FetchError};
use crate::font_data::{FontCustomPlatformData, SystemTypeface};
use crate::{family_key, normalize_font_name, FetchRequestId, FontFaceId};

// ── Installed fonts ─────────────────────────────────────────────────────────

/// Access to the fonts installed on the system.
///
/// Looking up fonts by unique name (what `local()` refers to) may need an
/// index that is expensive to build. Until
/// [`unique_name_lookup_ready`](Self::unique_name_lookup_ready) returns
/// `true`, `local()` sources report themselves as loading and ask for the
/// index through [`build_unique_name_lookup`](Self::build_unique_name_lookup),
/// which runs as a task.
pub trait PlatformFontProvider {
    fn unique_name_lookup_ready(&self) -> bool;

    fn build_unique_name_lookup(&mut self);

    fn has_unique_name(&self, unique_name: &str) -> bool {
        self.typeface_for_unique_name(unique_name).is_some()
    }

    fn typeface_for_unique_name(&self, unique_name: &str) -> Option<Arc<SystemTypeface>>;

    /// Whether an installed font serves `family`.
    fn has_family(&self, family: &str) -> bool;

    /// Typeface used for loading fallbacks.
    fn last_resort_typeface(&self) -> Arc<SystemTypeface> {
        Arc::new(SystemTypeface::builtin("LastResort", "LastResort"))
    }
}

/// In-memory font list, for embedders that know their fonts up front.
#[derive(Debug, Default, Clone)]
pub struct MemoryFontProvider {
    by_unique_name: BTreeMap<String, Arc<SystemTypeface>>,
    families: BTreeMap<String, String>,
    lookup_ready: bool,
}

impl MemoryFontProvider {
    pub fn new() -> Self {
        Self {
            lookup_ready: true,
            ..Default::default()
        }
    }

    /// The unique name lookup only becomes ready once it has been built.
    pub fn with_deferred_lookup(mut self) -> Self {
        self.lookup_ready = false;
        self
    }

    pub fn with_font(mut self, unique_name: &str, family: &str) -> Self {
        self.add_font(SystemTypeface::builtin(unique_name, family));
        self
    }

    pub fn add_font(&mut self, typeface: SystemTypeface) {
        self.families
            .insert(family_key(&typeface.family), typeface.family.clone());
        self.by_unique_name
            .insert(normalize_font_name(&typeface.unique_name), Arc::new(typeface));
    }
}

impl PlatformFontProvider for MemoryFontProvider {
    fn unique_name_lookup_ready(&self) -> bool {
        self.lookup_ready
    }

    fn build_unique_name_lookup(&mut self) {
        self.lookup_ready = true;
    }

    fn typeface_for_unique_name(&self, unique_name: &str) -> Option<Arc<SystemTypeface>> {
        if !self.lookup_ready {
            return None;
        }
        self.by_unique_name
            .get(&normalize_font_name(unique_name))
            .cloned()
    }

    fn has_family(&self, family: &str) -> bool {
        self.families.contains_key(&family_key(family))
    }
}

// ── Fetching ────────────────────────────────────────────────────────────────

/// Where the bytes of a finished fetch came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DataSource {
    DataUrl,
    MemoryCache,
    DiskCache,
    Network,
}

impl DataSource {
    /// Resources that are available without waiting on the network.
    pub fn is_memory_cache(&self) -> bool {
        matches!(self, DataSource::MemoryCache | DataSource::DataUrl)
    }
}

/// Credentials policy of a font fetch. Fonts are always fetched in CORS
/// mode; `Anonymous` sends credentials to same-origin URLs only.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum CorsMode {
    #[default]
    Anonymous,
    UseCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFetchRequest {
    pub id: FetchRequestId,
    pub url: String,
    pub face: FontFaceId,
    pub cors_mode: CorsMode,
    pub referrer_policy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFetchResponse {
    pub result: Result<Vec<u8>, FetchError>,
    pub data_source: DataSource,
}

impl FontFetchResponse {
    pub fn ok(bytes: Vec<u8>, data_source: DataSource) -> Self {
        Self {
            result: Ok(bytes),
            data_source,
        }
    }

    pub fn error(error: FetchError) -> Self {
        Self {
            result: Err(error),
            data_source: DataSource::Network,
        }
    }
}

/// Starts downloads of remote font resources.
///
/// A fetcher either answers synchronously (memory cache, `data:` URLs) by
/// returning the response, or returns `None` and the embedder later calls
/// [`FontSelector::font_fetch_finished`](crate::FontSelector::font_fetch_finished).
pub trait FontFetcher {
    fn start_fetch(&mut self, request: &FontFetchRequest) -> Option<FontFetchResponse>;
}

/// Never answers synchronously.
#[derive(Debug, Default, Copy, Clone)]
pub struct DeferredFetcher;

impl FontFetcher for DeferredFetcher {
    fn start_fetch(&mut self, _request: &FontFetchRequest) -> Option<FontFetchResponse> {
        None
    }
}

/// Answers from a fixed URL map; unknown URLs are left pending.
#[derive(Debug, Default, Clone)]
pub struct MemoryFetcher {
    resources: BTreeMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.resources.insert(String::from(url), bytes);
        self
    }
}

impl FontFetcher for MemoryFetcher {
    fn start_fetch(&mut self, request: &FontFetchRequest) -> Option<FontFetchResponse> {
        let bytes = self.resources.get(&request.url)?;
        Some(FontFetchResponse::ok(bytes.clone(), DataSource::MemoryCache))
    }
}

// ── Decoding ────────────────────────────────────────────────────────────────

/// Validates and decodes the bytes of a downloaded or in-memory font.
pub trait FontDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<FontCustomPlatformData, DecodeError>;
}

const SFNT_VERSION_TRUETYPE: [u8; 4] = [0x00, 0x01, 0x00, 0x00];

fn sniff_container(bytes: &[u8]) -> Result<&'static str, DecodeError> {
    if bytes.len() < 12 {
        return Err(DecodeError::new("file too short"));
    }
    match &bytes[0..4] {
        v if v == SFNT_VERSION_TRUETYPE => Ok("truetype"),
        b"true" => Ok("truetype"),
        b"OTTO" => Ok("opentype"),
        b"ttcf" => Ok("collection"),
        b"wOFF" => Ok("woff"),
        b"wOF2" => Ok("woff2"),
        _ => Err(DecodeError::new("invalid sfntVersion")),
    }
}

/// Accepts anything that starts with a known font container signature.
#[derive(Debug, Default, Copy, Clone)]
pub struct SfntSniffDecoder;

impl FontDecoder for SfntSniffDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<FontCustomPlatformData, DecodeError> {
        sniff_container(bytes)?;
        Ok(FontCustomPlatformData::new(bytes))
    }
}

/// Parses the font with allsorts, reading the family name and glyph count.
#[cfg(feature = "parsing")]
#[derive(Debug, Default, Copy, Clone)]
pub struct AllsortsFontDecoder;

#[cfg(feature = "parsing")]
impl FontDecoder for AllsortsFontDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<FontCustomPlatformData, DecodeError> {
        use allsorts::{
            binary::read::ReadScope,
            font_data::FontData,
            get_name::fontcode_get_name,
            tables::{FontTableProvider, MaxpTable},
            tag,
        };

        const FONT_SPECIFIER_FAMILY_ID: u16 = 1;

        let container = sniff_container(bytes)?;
        let scope = ReadScope::new(bytes);
        let font_file = scope
            .read::<FontData<'_>>()
            .map_err(|e| DecodeError::new(format!("{} parse error: {}", container, e)))?;
        let provider = font_file
            .table_provider(0)
            .map_err(|e| DecodeError::new(format!("{}", e)))?;

        let maxp_data = provider
            .table_data(tag::MAXP)
            .map_err(|e| DecodeError::new(format!("maxp: {}", e)))?
            .ok_or_else(|| DecodeError::new("maxp: missing table"))?
            .into_owned();
        let maxp = ReadScope::new(&maxp_data)
            .read::<MaxpTable>()
            .map_err(|e| DecodeError::new(format!("maxp: {}", e)))?;
        if maxp.num_glyphs == 0 {
            return Err(DecodeError::new("maxp: font has no glyphs"));
        }

        let mut data = FontCustomPlatformData::new(bytes).with_num_glyphs(maxp.num_glyphs);

        // the name table is optional for rendering, a broken one is not fatal
        if let Ok(Some(name_data)) = provider.table_data(tag::NAME) {
            if let Ok(Some(family)) = fontcode_get_name(&name_data, FONT_SPECIFIER_FAMILY_ID) {
                let family = String::from_utf8_lossy(family.to_bytes()).to_string();
                if !family.is_empty() {
                    data = data.with_family_name(family);
                }
            }
        }

        Ok(data)
    }
}

//! Index of the fonts installed on this machine, for `local()` sources.
//!
//! Scanning is deferred: a fresh [`SystemFontIndex`] knows its directories
//! but not their contents. The first `local()` source that asks for a
//! lookup schedules [`build_unique_name_lookup`], which walks the
//! directories (in parallel with the `multithreading` feature), memory-maps
//! every font file and reads the full name, PostScript name and family from
//! its `name` table.
//!
//! On Linux the directory list comes from `/etc/fonts/fonts.conf`, falling
//! back to the usual XDG locations.
//!
//! With the `cache` feature the scan result is stored as a bincode manifest
//! in the user cache directory and reused as long as none of the indexed
//! files changed.
//!
//! ```rust,no_run
//! use rust_fontface::{PlatformFontProvider, SystemFontIndex};
//!
//! let mut index = SystemFontIndex::new();
//! index.build_unique_name_lookup();
//! if let Some(typeface) = index.typeface_for_unique_name("DejaVu Sans Bold") {
//!     println!("{} -> {:?}", typeface.family, typeface.source);
//! }
//! ```
//!
//! [`build_unique_name_lookup`]: crate::PlatformFontProvider::build_unique_name_lookup

use alloc::collections::btree_map::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::font_data::{SystemTypeface, TypefaceSource};
use crate::platform::PlatformFontProvider;
use crate::{family_key, normalize_font_name};

const FONT_FILE_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc", "otc"];

/// One face found in a font file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct ScannedFace {
    pub path: String,
    pub font_index: usize,
    pub family: String,
    pub full_name: String,
    pub postscript_name: Option<String>,
}

impl ScannedFace {
    fn typeface(&self) -> SystemTypeface {
        SystemTypeface {
            unique_name: self.full_name.clone(),
            family: self.family.clone(),
            source: TypefaceSource::Path {
                path: self.path.clone(),
                font_index: self.font_index,
            },
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct SystemFontIndex {
    directories: Vec<PathBuf>,
    by_unique_name: BTreeMap<String, Arc<SystemTypeface>>,
    families: BTreeMap<String, String>,
    lookup_ready: bool,
}

impl SystemFontIndex {
    /// Index over the platform's font directories; nothing is scanned yet.
    pub fn new() -> Self {
        Self::with_directories(system_font_directories())
    }

    pub fn with_directories(directories: Vec<PathBuf>) -> Self {
        Self {
            directories,
            ..Default::default()
        }
    }

    /// Ready index over already known faces.
    pub fn from_faces(faces: &[ScannedFace]) -> Self {
        let mut index = Self::default();
        index.insert_faces(faces);
        index.lookup_ready = true;
        index
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Number of distinct unique names (full and PostScript names).
    pub fn len(&self) -> usize {
        self.by_unique_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_unique_name.is_empty()
    }

    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.families.values().map(|s| s.as_str())
    }

    fn insert_faces(&mut self, faces: &[ScannedFace]) {
        for face in faces {
            let typeface = Arc::new(face.typeface());
            self.families
                .entry(family_key(&face.family))
                .or_insert_with(|| face.family.clone());
            // first file wins when two files claim the same name
            self.by_unique_name
                .entry(normalize_font_name(&face.full_name))
                .or_insert_with(|| typeface.clone());
            if let Some(ps) = face.postscript_name.as_ref() {
                self.by_unique_name
                    .entry(normalize_font_name(ps))
                    .or_insert(typeface);
            }
        }
    }

    /// Walks the directories and parses every font file found.
    pub fn scan(&self) -> Vec<ScannedFace> {
        let faces = ScanDirectories(&self.directories);
        debug!(
            "scanned {} font directories, found {} faces",
            self.directories.len(),
            faces.len()
        );
        faces
    }
}

impl PlatformFontProvider for SystemFontIndex {
    fn unique_name_lookup_ready(&self) -> bool {
        self.lookup_ready
    }

    fn build_unique_name_lookup(&mut self) {
        if self.lookup_ready {
            return;
        }

        #[cfg(feature = "cache")]
        let faces = match self.load_from_disk_cache() {
            Some(faces) => faces,
            None => {
                let faces = self.scan();
                if let Err(e) = save_to_disk_cache(&faces) {
                    debug!("font index not cached: {}", e);
                }
                faces
            }
        };

        #[cfg(not(feature = "cache"))]
        let faces = self.scan();

        self.insert_faces(&faces);
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

// ── Font directories ────────────────────────────────────────────────────────

/// OS-specific font directories. On Linux, the `<dir>` entries of
/// `/etc/fonts/fonts.conf` come first.
pub fn system_font_directories() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(target_os = "linux")]
    {
        if let Ok(xml) = std::fs::read_to_string("/etc/fonts/fonts.conf") {
            match ParseFontsConf(&xml) {
                Some(entries) => dirs.extend(
                    entries
                        .iter()
                        .filter_map(|(prefix, dir)| resolve_fonts_conf_dir(*prefix, dir)),
                ),
                None => warn!("/etc/fonts/fonts.conf could not be parsed"),
            }
        }
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Some(home) = std::env::var_os("HOME") {
            let home = PathBuf::from(home);
            dirs.push(home.join(".fonts"));
            dirs.push(home.join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Some(home) = std::env::var_os("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        let system_root = std::env::var("SystemRoot")
            .or_else(|_| std::env::var("WINDIR"))
            .unwrap_or_else(|_| String::from("C:\\Windows"));
        dirs.push(PathBuf::from(system_root).join("Fonts"));
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            dirs.push(PathBuf::from(local).join("Microsoft\\Windows\\Fonts"));
        }
    }

    let mut seen = alloc::collections::btree_set::BTreeSet::new();
    dirs.retain(|d| seen.insert(d.clone()));
    dirs
}

#[cfg(target_os = "linux")]
fn resolve_fonts_conf_dir(prefix: Option<&str>, dir: &str) -> Option<PathBuf> {
    let home = || std::env::var_os("HOME").map(PathBuf::from);
    match prefix {
        Some("xdg") => {
            let base = std::env::var_os("XDG_DATA_HOME")
                .map(PathBuf::from)
                .or_else(|| home().map(|h| h.join(".local/share")))?;
            Some(base.join(dir))
        }
        Some("relative") => Some(PathBuf::from("/etc/fonts").join(dir)),
        _ => match dir.strip_prefix("~/") {
            Some(rest) => Some(home()?.join(rest)),
            None => Some(PathBuf::from(dir)),
        },
    }
}

/// Collects the `(prefix, path)` of every `<dir>` element.
/// Returns `None` on malformed XML or nested `<dir>` tags.
#[cfg(target_os = "linux")]
fn ParseFontsConf(input: &str) -> Option<Vec<(Option<&str>, &str)>> {
    use xmlparser::Token::*;
    use xmlparser::Tokenizer;

    let mut font_paths = Vec::new();
    let mut current_prefix: Option<&str> = None;
    let mut current_dir: Option<&str> = None;
    let mut is_in_dir = false;

    for token in Tokenizer::from(input) {
        match token.ok()? {
            ElementStart { local, .. } => {
                if local.as_str() != "dir" {
                    continue;
                }
                if is_in_dir {
                    return None;
                }
                is_in_dir = true;
                current_dir = None;
                current_prefix = None;
            }
            Attribute { local, value, .. } => {
                if is_in_dir && local.as_str() == "prefix" {
                    current_prefix = Some(value.as_str());
                }
            }
            Text { text } => {
                let text = text.as_str().trim();
                if is_in_dir && !text.is_empty() {
                    current_dir = Some(text);
                }
            }
            ElementEnd {
                end: xmlparser::ElementEnd::Close(_, name),
                ..
            } => {
                if name.as_str() != "dir" || !is_in_dir {
                    continue;
                }
                if let Some(dir) = current_dir.take() {
                    font_paths.push((current_prefix.take(), dir));
                }
                is_in_dir = false;
            }
            _ => {}
        }
    }

    Some(font_paths)
}

// ── Scanning ────────────────────────────────────────────────────────────────

fn ScanDirectories(dirs: &[PathBuf]) -> Vec<ScannedFace> {
    let files: Vec<PathBuf> = dirs
        .iter()
        .flat_map(|d| CollectFontFiles(d.clone()))
        .collect();
    ParseFontFiles(&files)
}

/// Breadth-first walk, without following the same directory twice.
fn CollectFontFiles(root: PathBuf) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut dirs_to_visit = vec![root];
    let mut visited = alloc::collections::btree_set::BTreeSet::new();

    while !dirs_to_visit.is_empty() {
        let mut next = Vec::new();
        for dir in dirs_to_visit {
            let canonical = std::fs::canonicalize(&dir).unwrap_or_else(|_| dir.clone());
            if !visited.insert(canonical) {
                continue;
            }
            let entries = match std::fs::read_dir(&dir) {
                Ok(o) => o,
                Err(_) => continue,
            };
            for path in entries.filter_map(|e| Some(e.ok()?.path())) {
                if path.is_dir() {
                    next.push(path);
                } else if is_font_file(&path) {
                    files.push(path);
                }
            }
        }
        dirs_to_visit = next;
    }

    files
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| {
            FONT_FILE_EXTENSIONS
                .iter()
                .any(|known| e.eq_ignore_ascii_case(known))
        })
}

#[cfg(feature = "multithreading")]
fn ParseFontFiles(files: &[PathBuf]) -> Vec<ScannedFace> {
    use rayon::prelude::*;

    files
        .par_iter()
        .filter_map(|file| ParseFontFile(file))
        .collect::<Vec<Vec<_>>>()
        .into_iter()
        .flatten()
        .collect()
}

#[cfg(not(feature = "multithreading"))]
fn ParseFontFiles(files: &[PathBuf]) -> Vec<ScannedFace> {
    files.iter().filter_map(|f| ParseFontFile(f)).flatten().collect()
}

#[cfg(feature = "parsing")]
fn ParseFontFile(filepath: &Path) -> Option<Vec<ScannedFace>> {
    use allsorts::{
        binary::read::ReadScope, font_data::FontData, get_name::fontcode_get_name,
        tables::FontTableProvider, tag,
    };
    use mmapio::MmapOptions;
    use std::fs::File;

    const FONT_SPECIFIER_FAMILY_ID: u16 = 1;
    const FONT_SPECIFIER_NAME_ID: u16 = 4;
    const FONT_SPECIFIER_POSTSCRIPT_ID: u16 = 6;

    // only the first face of a collection is indexed
    let font_index = 0;

    let file = File::open(filepath).ok()?;
    // SAFETY: the map is read-only and dropped before returning
    let font_bytes = unsafe { MmapOptions::new().map(&file).ok()? };
    let scope = ReadScope::new(&font_bytes[..]);
    let font_file = scope.read::<FontData<'_>>().ok()?;
    let provider = font_file.table_provider(font_index).ok()?;
    let name_data = provider.table_data(tag::NAME).ok()??.into_owned();

    let read_name = |id: u16| -> Option<String> {
        let name = fontcode_get_name(&name_data, id).ok()??;
        let name = String::from_utf8_lossy(name.to_bytes()).trim().to_string();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    };

    let family = read_name(FONT_SPECIFIER_FAMILY_ID)?;
    let postscript_name = read_name(FONT_SPECIFIER_POSTSCRIPT_ID);
    let full_name = read_name(FONT_SPECIFIER_NAME_ID)
        .or_else(|| postscript_name.clone())
        .unwrap_or_else(|| family.clone());

    Some(vec![ScannedFace {
        path: filepath.to_string_lossy().to_string(),
        font_index,
        family,
        full_name,
        postscript_name,
    }])
}

#[cfg(not(feature = "parsing"))]
fn ParseFontFile(_filepath: &Path) -> Option<Vec<ScannedFace>> {
    None
}

// ── Disk cache ──────────────────────────────────────────────────────────────

#[cfg(feature = "cache")]
pub use self::disk_cache::{save_to_disk_cache, FontFileEntry, FontIndexManifest};

#[cfg(feature = "cache")]
mod disk_cache {
    use super::*;
    use crate::error::IndexCacheError;

    /// On-disk form of a scan: file path to the faces found in it.
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct FontIndexManifest {
        pub version: u32,
        pub entries: BTreeMap<String, FontFileEntry>,
    }

    impl FontIndexManifest {
        pub const CURRENT_VERSION: u32 = 1;

        pub fn from_faces(faces: &[ScannedFace]) -> Self {
            let mut entries: BTreeMap<String, FontFileEntry> = BTreeMap::new();
            for face in faces {
                entries
                    .entry(face.path.clone())
                    .or_insert_with(|| {
                        let (mtime_secs, file_size) = file_metadata(&face.path);
                        FontFileEntry {
                            mtime_secs,
                            file_size,
                            faces: Vec::new(),
                        }
                    })
                    .faces
                    .push(face.clone());
            }
            Self {
                version: Self::CURRENT_VERSION,
                entries,
            }
        }

        /// Paths whose size or modification time changed since the scan.
        pub fn stale_entries(&self) -> Vec<&str> {
            self.entries
                .iter()
                .filter(|(path, entry)| file_metadata(path) != (entry.mtime_secs, entry.file_size))
                .map(|(path, _)| path.as_str())
                .collect()
        }

        pub fn faces(&self) -> Vec<ScannedFace> {
            self.entries
                .values()
                .flat_map(|e| e.faces.iter().cloned())
                .collect()
        }

        pub fn load(path: &Path) -> Result<Self, IndexCacheError> {
            let data = std::fs::read(path)?;
            let manifest: FontIndexManifest = bincode::deserialize(&data)?;
            if manifest.version != Self::CURRENT_VERSION {
                return Err(IndexCacheError::VersionMismatch {
                    found: manifest.version,
                    expected: Self::CURRENT_VERSION,
                });
            }
            Ok(manifest)
        }

        pub fn save(&self, path: &Path) -> Result<(), IndexCacheError> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, bincode::serialize(self)?)?;
            Ok(())
        }
    }

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct FontFileEntry {
        /// Seconds since the epoch.
        pub mtime_secs: u64,
        pub file_size: u64,
        pub faces: Vec<ScannedFace>,
    }

    fn file_metadata(path: &str) -> (u64, u64) {
        match std::fs::metadata(path) {
            Ok(meta) => {
                let mtime = meta
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                (mtime, meta.len())
            }
            Err(_) => (0, 0),
        }
    }

    pub(super) fn manifest_path() -> Result<PathBuf, IndexCacheError> {
        let base = dirs::cache_dir().ok_or(IndexCacheError::NoCacheDir)?;
        Ok(base.join("rust-fontface").join("manifest.bin"))
    }

    pub fn save_to_disk_cache(faces: &[ScannedFace]) -> Result<(), IndexCacheError> {
        FontIndexManifest::from_faces(faces).save(&manifest_path()?)
    }

    impl SystemFontIndex {
        /// Faces from the cached manifest, or `None` when there is no
        /// usable cache or any indexed file changed.
        pub fn load_from_disk_cache(&self) -> Option<Vec<ScannedFace>> {
            let manifest = match manifest_path().and_then(|p| FontIndexManifest::load(&p)) {
                Ok(m) => m,
                Err(e) => {
                    debug!("no usable font index cache: {}", e);
                    return None;
                }
            };
            let stale = manifest.stale_entries();
            if !stale.is_empty() {
                warn!(
                    "font index cache is stale ({} changed files, e.g. {}), rescanning",
                    stale.len(),
                    stale[0]
                );
                return None;
            }
            Some(manifest.faces())
        }
    }
}

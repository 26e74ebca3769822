//! All faces of one family that share the same selection capabilities.
//!
//! A [`SegmentedFontFace`] is what matching picks. Its members usually
//! differ only in `unicode-range`, and the font data it hands out is a
//! composite of every member's data, each tagged with the ranges it covers.
//!
//! Members live in two lists. Faces coming from style sheets are kept in
//! cascade order (lowest priority first); faces added from script are kept
//! in insertion order and always come after them. Composites are built by
//! walking both lists backwards, script faces first, so the highest
//! priority face ends up at the front of the composite.

use alloc::collections::btree_map::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::num::NonZeroUsize;

use log::trace;
use lru::LruCache;

use crate::context::LoadContext;
use crate::font_data::{
    FontCacheKey, FontDataForRangeSet, FontDataKind, FontDescription, SegmentedFontData,
};
use crate::font_face::{FontFace, LoadStatus};
use crate::selection::{FontSelectionCapabilities, BOLD_THRESHOLD, ITALIC_THRESHOLD};
use crate::unicode::UnicodeRangeSet;
use crate::{FontFaceId, SegmentedFaceId};

/// Owner of every face known to a selector.
pub type FontFaceMap = BTreeMap<FontFaceId, FontFace>;

// ── Cascade priority ────────────────────────────────────────────────────────

/// Style sheet origin of an `@font-face` rule.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CascadeOrigin {
    #[default]
    Author,
    User,
}

/// Order of the named cascade layers of one origin. Rules outside any
/// layer rank above every named layer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CascadeLayerMap {
    order: BTreeMap<String, u32>,
}

impl CascadeLayerMap {
    /// Layers in declaration order, lowest priority first.
    pub fn new<S: Into<String>>(layers: impl IntoIterator<Item = S>) -> Self {
        let mut map = Self::default();
        for layer in layers {
            map.push_layer(layer);
        }
        map
    }

    pub fn push_layer(&mut self, layer: impl Into<String>) {
        let next = self.order.len() as u32;
        self.order.entry(layer.into()).or_insert(next);
    }

    /// `None` for a layer name the map has never seen.
    pub fn layer_order(&self, layer: Option<&str>) -> Option<u32> {
        match layer {
            None => Some(u32::MAX),
            Some(name) => self.order.get(name).copied(),
        }
    }

    pub fn compare_layer_order(&self, a: Option<&str>, b: Option<&str>) -> Option<Ordering> {
        Some(self.layer_order(a)?.cmp(&self.layer_order(b)?))
    }
}

/// Layer maps of the author and user origins; either may be absent.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CascadeLayerMaps {
    pub author: Option<CascadeLayerMap>,
    pub user: Option<CascadeLayerMap>,
}

impl CascadeLayerMaps {
    pub fn for_origin(&self, origin: CascadeOrigin) -> Option<&CascadeLayerMap> {
        match origin {
            CascadeOrigin::Author => self.author.as_ref(),
            CascadeOrigin::User => self.user.as_ref(),
        }
    }
}

/// Whether `new` beats `existing` in the cascade. Whenever the answer
/// cannot be determined, `new` wins.
pub fn cascade_priority_higher_than(
    new: &FontFace,
    existing: &FontFace,
    maps: &CascadeLayerMaps,
) -> bool {
    if new.style_rule().is_none() || existing.style_rule().is_none() {
        return true;
    }
    if new.is_user_style() != existing.is_user_style() {
        return existing.is_user_style();
    }
    let map = match maps.for_origin(new.origin()) {
        Some(map) => map,
        None => return true,
    };
    match map.compare_layer_order(existing.layer(), new.layer()) {
        Some(order) => order != Ordering::Greater,
        None => true,
    }
}

// ── FontFaceList ────────────────────────────────────────────────────────────

/// The two member lists of a segmented face.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FontFaceList {
    css_connected: Vec<FontFaceId>,
    non_css_connected: Vec<FontFaceId>,
}

impl FontFaceList {
    pub fn is_empty(&self) -> bool {
        self.css_connected.is_empty() && self.non_css_connected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.css_connected.len() + self.non_css_connected.len()
    }

    pub fn contains(&self, face: FontFaceId) -> bool {
        self.css_connected.contains(&face) || self.non_css_connected.contains(&face)
    }

    /// Adds `face`, keeping CSS-connected faces in cascade order. Returns
    /// `false` if it was already a member.
    pub fn insert(&mut self, face: &FontFace, faces: &FontFaceMap, maps: &CascadeLayerMaps) -> bool {
        let id = face.id();
        if self.contains(id) {
            return false;
        }
        if !face.is_css_connected() {
            self.non_css_connected.push(id);
            return true;
        }

        let mut at = self.css_connected.len();
        while at > 0 {
            let higher = match faces.get(&self.css_connected[at - 1]) {
                Some(existing) => cascade_priority_higher_than(face, existing, maps),
                None => true,
            };
            if higher {
                break;
            }
            at -= 1;
        }
        self.css_connected.insert(at, id);
        true
    }

    pub fn erase(&mut self, face: FontFaceId) -> bool {
        if let Some(pos) = self.css_connected.iter().position(|f| *f == face) {
            self.css_connected.remove(pos);
            return true;
        }
        if let Some(pos) = self.non_css_connected.iter().position(|f| *f == face) {
            self.non_css_connected.remove(pos);
            return true;
        }
        false
    }

    /// CSS-connected in cascade order, then script faces in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = FontFaceId> + '_ {
        self.css_connected
            .iter()
            .chain(self.non_css_connected.iter())
            .copied()
    }

    /// Script faces newest first, then CSS-connected highest priority first.
    pub fn iter_reverse(&self) -> impl Iterator<Item = FontFaceId> + '_ {
        self.non_css_connected
            .iter()
            .rev()
            .chain(self.css_connected.iter().rev())
            .copied()
    }
}

// ── SegmentedFontFace ───────────────────────────────────────────────────────

fn cache_capacity(ctx: &LoadContext) -> NonZeroUsize {
    NonZeroUsize::new(ctx.config.segmented_cache_size).unwrap_or(NonZeroUsize::MIN)
}

#[derive(Debug)]
pub struct SegmentedFontFace {
    id: SegmentedFaceId,
    capabilities: FontSelectionCapabilities,
    list: FontFaceList,
    font_data_table: LruCache<FontCacheKey, Arc<SegmentedFontData>>,
}

impl SegmentedFontFace {
    pub fn new(capabilities: FontSelectionCapabilities, ctx: &LoadContext) -> Self {
        Self {
            id: SegmentedFaceId::new(),
            capabilities,
            list: FontFaceList::default(),
            font_data_table: LruCache::new(cache_capacity(ctx)),
        }
    }

    pub fn id(&self) -> SegmentedFaceId {
        self.id
    }

    pub fn capabilities(&self) -> FontSelectionCapabilities {
        self.capabilities
    }

    pub fn faces(&self) -> &FontFaceList {
        &self.list
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn cached_entries(&self) -> usize {
        self.font_data_table.len()
    }

    /// Whether any member can still produce font data.
    pub fn is_valid(&self, faces: &FontFaceMap) -> bool {
        self.list
            .iter()
            .any(|id| faces.get(&id).map_or(false, |f| f.css_font_face().is_valid()))
    }

    pub fn prune_table(&mut self) {
        self.font_data_table.clear();
    }

    /// A member's font data changed.
    pub fn face_invalidated(&mut self) {
        self.prune_table();
    }

    pub fn add_font_face(
        &mut self,
        face: FontFaceId,
        faces: &mut FontFaceMap,
        maps: &CascadeLayerMaps,
    ) -> bool {
        let inserted = match faces.get(&face) {
            Some(f) => self.list.insert(f, faces, maps),
            None => false,
        };
        if !inserted {
            return false;
        }
        self.prune_table();
        if let Some(f) = faces.get_mut(&face) {
            f.css_font_face_mut().add_segmented_face(self.id);
        }
        true
    }

    pub fn remove_font_face(&mut self, face: FontFaceId, faces: &mut FontFaceMap) -> bool {
        if !self.list.erase(face) {
            return false;
        }
        self.prune_table();
        if let Some(f) = faces.get_mut(&face) {
            f.css_font_face_mut().remove_segmented_face(self.id);
        }
        true
    }

    /// Composite font data for `description`, or `None` if no member can
    /// provide any.
    pub fn font_data(
        &mut self,
        description: &FontDescription,
        faces: &mut FontFaceMap,
        ctx: &mut LoadContext,
    ) -> Option<Arc<SegmentedFontData>> {
        if !self.is_valid(faces) {
            return None;
        }

        let key = description.cache_key();
        if let Some(cached) = self.font_data_table.get(&key) {
            if !cached.is_empty() {
                trace!("{}: composite cache hit", self.id);
                return Some(cached.clone());
            }
        }

        let request = description.selection;
        let mut requested = description.clone();
        requested.synthetic_bold = description.synthetic_bold_allowed
            && self.capabilities.weight.maximum < BOLD_THRESHOLD
            && request.weight >= BOLD_THRESHOLD;
        requested.synthetic_italic = description.synthetic_italic_allowed
            && self.capabilities.slope.maximum < ITALIC_THRESHOLD
            && request.slope >= ITALIC_THRESHOLD;

        let mut composite = SegmentedFontData::new();
        let members: Vec<FontFaceId> = self.list.iter_reverse().collect();
        for id in members {
            let face = match faces.get_mut(&id) {
                Some(face) => face,
                None => continue,
            };
            if !face.css_font_face().is_valid() {
                continue;
            }
            if let Some(data) = face.font_data(&requested, ctx) {
                let kind = if data.is_custom_font() {
                    FontDataKind::Custom
                } else {
                    FontDataKind::CacheDerived
                };
                composite.append(FontDataForRangeSet {
                    font_data: data,
                    ranges: face.css_font_face().ranges().as_ref().clone(),
                    kind,
                    face: id,
                });
            }
        }

        trace!("{}: built composite of {} faces", self.id, composite.len());
        if composite.is_empty() {
            return None;
        }
        let composite = Arc::new(composite);
        self.font_data_table.put(key, composite.clone());
        Some(composite)
    }

    /// Members whose `unicode-range` intersects `text`.
    pub fn match_text(&self, text: &str, faces: &FontFaceMap) -> Vec<FontFaceId> {
        self.list
            .iter()
            .filter(|id| {
                faces
                    .get(id)
                    .map_or(false, |f| f.css_font_face().ranges().intersects_with(text))
            })
            .collect()
    }

    /// Starts loading the first member that covers the start of `text`.
    pub fn will_use_font_data(
        &self,
        text: &str,
        faces: &mut FontFaceMap,
        ctx: &mut LoadContext,
    ) -> bool {
        for id in self.list.iter() {
            if let Some(face) = faces.get_mut(&id) {
                if face.css_font_face_mut().maybe_load_font(text, ctx) {
                    return true;
                }
            }
        }
        false
    }

    /// Starts loading the member that owns exactly `ranges`.
    pub fn will_use_range(
        &self,
        ranges: &UnicodeRangeSet,
        faces: &mut FontFaceMap,
        ctx: &mut LoadContext,
    ) -> bool {
        for id in self.list.iter() {
            if let Some(face) = faces.get_mut(&id) {
                if face.css_font_face_mut().maybe_load_font_for_ranges(ranges, ctx) {
                    return true;
                }
            }
        }
        false
    }

    /// `false` if some member covering `c` has not loaded yet.
    pub fn check_font(&self, c: char, faces: &FontFaceMap) -> bool {
        self.list.iter().all(|id| match faces.get(&id) {
            Some(face) => {
                face.status() == LoadStatus::Loaded
                    || !face.css_font_face().ranges().contains(c as u32)
            }
            None => true,
        })
    }
}

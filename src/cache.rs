//! Family index of every face known to a selector.
//!
//! Faces are bucketed by family (ASCII case-insensitive), then by their
//! selection capabilities. Each capabilities bucket is one
//! [`SegmentedFontFace`]. Best-match queries are memoized per family and
//! thrown away whenever that family changes.
//!
//! ```rust
//! use rust_fontface::*;
//! use rust_fontface::segmented::FontFaceMap;
//!
//! let mut ctx = LoadContext::new(
//!     FontLoadingConfig::default(),
//!     DocumentState::document(),
//!     Box::new(MemoryFontProvider::new().with_font("Arial", "Arial")),
//!     Box::new(platform::DeferredFetcher),
//!     Box::new(SfntSniffDecoder),
//! );
//! let mut faces = FontFaceMap::new();
//! let mut cache = FontFaceCache::new();
//!
//! let face = FontFace::from_source("Body", "local(Arial)", &FontFaceDescriptors::default(), &mut ctx);
//! let id = face.id();
//! faces.insert(id, face);
//! cache.add_font_face(id, false, &mut faces, &ctx);
//!
//! let description = FontDescription::new("body", 16.0);
//! assert!(cache.get(&description, "BODY").is_some());
//! assert!(cache.get(&description, "Missing").is_none());
//! ```

use alloc::collections::btree_map::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use log::{debug, trace};

use crate::context::LoadContext;
use crate::font_data::{FontDescription, SegmentedFontData};
use crate::segmented::{CascadeLayerMaps, FontFaceMap, SegmentedFontFace};
use crate::selection::{FontSelectionAlgorithm, FontSelectionCapabilities, FontSelectionRequest};
use crate::{family_key, FontFaceId, SegmentedFaceId, StyleRuleKey};

fn next_version() -> u64 {
    static VERSION: AtomicU64 = AtomicU64::new(1);
    VERSION.fetch_add(1, Ordering::Relaxed)
}

/// Capabilities buckets of one family.
type CapabilitiesSet = BTreeMap<FontSelectionCapabilities, SegmentedFaceId>;

/// Where a face was filed when it was added, so it can be found again
/// even if its descriptors changed since.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FaceRecord {
    family: String,
    capabilities: FontSelectionCapabilities,
    css_connected: bool,
}

#[derive(Debug)]
pub struct FontFaceCache {
    families: BTreeMap<String, CapabilitiesSet>,
    segmented: BTreeMap<SegmentedFaceId, SegmentedFontFace>,
    queries: BTreeMap<String, BTreeMap<FontSelectionRequest, SegmentedFaceId>>,
    style_rules: BTreeMap<StyleRuleKey, FontFaceId>,
    css_connected: Vec<FontFaceId>,
    records: BTreeMap<FontFaceId, FaceRecord>,
    layer_maps: CascadeLayerMaps,
    version: u64,
}

impl Default for FontFaceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FontFaceCache {
    pub fn new() -> Self {
        Self {
            families: BTreeMap::new(),
            segmented: BTreeMap::new(),
            queries: BTreeMap::new(),
            style_rules: BTreeMap::new(),
            css_connected: Vec::new(),
            records: BTreeMap::new(),
            layer_maps: CascadeLayerMaps::default(),
            version: next_version(),
        }
    }

    /// Changes on every structural mutation. Never repeats, not even
    /// across caches.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn increment_version(&mut self) {
        self.version = next_version();
    }

    pub fn layer_maps(&self) -> &CascadeLayerMaps {
        &self.layer_maps
    }

    /// Used for CSS-connected faces added from now on.
    pub fn set_layer_maps(&mut self, maps: CascadeLayerMaps) {
        self.layer_maps = maps;
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn contains(&self, face: FontFaceId) -> bool {
        self.records.contains_key(&face)
    }

    pub fn contains_family(&self, family: &str) -> bool {
        self.families.contains_key(&family_key(family))
    }

    pub fn face_for_rule(&self, rule: StyleRuleKey) -> Option<FontFaceId> {
        self.style_rules.get(&rule).copied()
    }

    /// CSS-connected faces in the order they were added.
    pub fn css_connected_faces(&self) -> &[FontFaceId] {
        &self.css_connected
    }

    pub fn segmented_face(&self, id: SegmentedFaceId) -> Option<&SegmentedFontFace> {
        self.segmented.get(&id)
    }

    pub fn segmented_face_mut(&mut self, id: SegmentedFaceId) -> Option<&mut SegmentedFontFace> {
        self.segmented.get_mut(&id)
    }

    /// Capabilities buckets of `family`, in capabilities order.
    pub fn segmented_faces_for_family(&self, family: &str) -> Vec<SegmentedFaceId> {
        self.families
            .get(&family_key(family))
            .map(|set| set.values().copied().collect())
            .unwrap_or_default()
    }

    /// Number of memoized best-match queries for `family`.
    pub fn memoized_queries(&self, family: &str) -> usize {
        self.queries.get(&family_key(family)).map_or(0, |q| q.len())
    }

    // ── Mutation ────────────────────────────────────────────────────────────

    /// Adds the face of an `@font-face` rule. A rule is only added once.
    pub fn add_rule_face(
        &mut self,
        rule: StyleRuleKey,
        face: FontFaceId,
        faces: &mut FontFaceMap,
        ctx: &LoadContext,
    ) -> bool {
        if self.style_rules.contains_key(&rule) {
            return false;
        }
        if !self.add_font_face(face, true, faces, ctx) {
            return false;
        }
        self.style_rules.insert(rule, face);
        true
    }

    pub fn add_font_face(
        &mut self,
        face: FontFaceId,
        css_connected: bool,
        faces: &mut FontFaceMap,
        ctx: &LoadContext,
    ) -> bool {
        if self.records.contains_key(&face) {
            return false;
        }
        let (family, capabilities) = match faces.get(&face) {
            Some(f) => (family_key(f.family()), f.capabilities()),
            None => return false,
        };

        let bucket = self.families.entry(family.clone()).or_default();
        let group_id = *bucket.entry(capabilities).or_insert_with(|| {
            let group = SegmentedFontFace::new(capabilities, ctx);
            let id = group.id();
            self.segmented.insert(id, group);
            id
        });
        if let Some(group) = self.segmented.get_mut(&group_id) {
            group.add_font_face(face, faces, &self.layer_maps);
        }

        if css_connected {
            self.css_connected.push(face);
        }
        self.records.insert(
            face,
            FaceRecord {
                family: family.clone(),
                capabilities,
                css_connected,
            },
        );
        self.queries.remove(&family);
        self.increment_version();
        debug!("font face cache: added {} to '{}'", face, family);
        true
    }

    /// Removes the face of an `@font-face` rule.
    pub fn remove_rule(&mut self, rule: StyleRuleKey, faces: &mut FontFaceMap) -> Option<FontFaceId> {
        let face = self.style_rules.remove(&rule)?;
        self.remove_font_face(face, faces);
        Some(face)
    }

    pub fn remove_font_face(&mut self, face: FontFaceId, faces: &mut FontFaceMap) -> bool {
        let record = match self.records.remove(&face) {
            Some(record) => record,
            None => return false,
        };

        if let Some(bucket) = self.families.get_mut(&record.family) {
            if let Some(group_id) = bucket.get(&record.capabilities).copied() {
                let now_empty = match self.segmented.get_mut(&group_id) {
                    Some(group) => {
                        group.remove_font_face(face, faces);
                        group.is_empty()
                    }
                    None => true,
                };
                if now_empty {
                    bucket.remove(&record.capabilities);
                    self.segmented.remove(&group_id);
                }
            }
            if bucket.is_empty() {
                self.families.remove(&record.family);
            }
        }

        if record.css_connected {
            self.css_connected.retain(|f| *f != face);
            self.style_rules.retain(|_, f| *f != face);
        }
        self.queries.remove(&record.family);
        self.increment_version();
        debug!("font face cache: removed {} from '{}'", face, record.family);
        true
    }

    /// Drops every CSS-connected face. Returns `false` if there were none.
    pub fn clear_css_connected(&mut self, faces: &mut FontFaceMap) -> bool {
        if self.css_connected.is_empty() {
            return false;
        }
        for face in core::mem::take(&mut self.css_connected) {
            self.remove_font_face(face, faces);
        }
        self.style_rules.clear();
        true
    }

    pub fn clear_all(&mut self, faces: &mut FontFaceMap) {
        if self.records.is_empty() {
            return;
        }
        for (group_id, group) in &self.segmented {
            for face in group.faces().iter() {
                if let Some(f) = faces.get_mut(&face) {
                    f.css_font_face_mut().remove_segmented_face(*group_id);
                }
            }
        }
        self.families.clear();
        self.segmented.clear();
        self.queries.clear();
        self.style_rules.clear();
        self.css_connected.clear();
        self.records.clear();
        self.increment_version();
    }

    /// Drops cached font data of every group holding `face`.
    pub fn face_invalidated(&mut self, face: FontFaceId, faces: &FontFaceMap) {
        let groups = match faces.get(&face) {
            Some(f) => f.css_font_face().segmented_faces().clone(),
            None => return,
        };
        for id in groups {
            if let Some(group) = self.segmented.get_mut(&id) {
                group.face_invalidated();
            }
        }
    }

    // ── Matching ────────────────────────────────────────────────────────────

    /// The group of `family` that best matches `description`, or `None`
    /// if the family has no faces.
    pub fn get(&mut self, description: &FontDescription, family: &str) -> Option<SegmentedFaceId> {
        let key = family_key(family);
        let bucket = self.families.get(&key)?;
        if bucket.is_empty() {
            return None;
        }

        let request = description.selection;
        let queries = self.queries.entry(key).or_default();
        if let Some(found) = queries.get(&request) {
            return Some(*found);
        }

        let mut bounds = FontSelectionCapabilities::empty();
        for capabilities in bucket.keys() {
            bounds.expand(capabilities);
        }
        let algorithm = FontSelectionAlgorithm::new(request, bounds);

        let mut best: Option<(&FontSelectionCapabilities, SegmentedFaceId)> = None;
        for (capabilities, id) in bucket {
            best = match best {
                Some((current, _))
                    if !algorithm.is_better_match_for_request(capabilities, current) =>
                {
                    best
                }
                _ => Some((capabilities, *id)),
            };
        }

        let (_, found) = best?;
        trace!("font face cache: '{}' matched {}", family, found);
        queries.insert(request, found);
        Some(found)
    }

    /// Composite font data of the group matching `description` in `family`.
    pub fn font_data(
        &mut self,
        description: &FontDescription,
        family: &str,
        faces: &mut FontFaceMap,
        ctx: &mut LoadContext,
    ) -> Option<Arc<SegmentedFontData>> {
        let id = self.get(description, family)?;
        self.segmented.get_mut(&id)?.font_data(description, faces, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DocumentState, FontLoadingConfig};
    use crate::descriptors::{Descriptor, FontFaceDescriptors};
    use crate::font_face::FontFace;
    use crate::platform::{DeferredFetcher, MemoryFontProvider, SfntSniffDecoder};
    use crate::selection::FontSelectionValue;
    use alloc::boxed::Box;

    fn context() -> LoadContext {
        LoadContext::new(
            FontLoadingConfig::default(),
            DocumentState::document(),
            Box::new(MemoryFontProvider::new().with_font("Local", "Local")),
            Box::new(DeferredFetcher),
            Box::new(SfntSniffDecoder),
        )
    }

    fn add(
        cache: &mut FontFaceCache,
        faces: &mut FontFaceMap,
        ctx: &mut LoadContext,
        family: &str,
        weight: &str,
    ) -> FontFaceId {
        let descriptors = FontFaceDescriptors::default().with(Descriptor::FontWeight, weight);
        let face = FontFace::from_source(family, "local(Local)", &descriptors, ctx);
        let id = face.id();
        faces.insert(id, face);
        assert!(cache.add_font_face(id, false, faces, ctx));
        id
    }

    fn matched_min_weight(cache: &mut FontFaceCache, family: &str, weight: f32) -> FontSelectionValue {
        let description = FontDescription::new(family, 16.0).with_weight(weight);
        let id = cache.get(&description, family).unwrap();
        cache.segmented_face(id).unwrap().capabilities().weight.minimum
    }

    #[test]
    fn weight_search_between_400_and_500() {
        let mut ctx = context();
        let mut faces = FontFaceMap::new();
        let mut cache = FontFaceCache::new();

        add(&mut cache, &mut faces, &mut ctx, "Test", "600 610");
        assert_eq!(matched_min_weight(&mut cache, "Test", 450.0), FontSelectionValue::from(600.0));

        add(&mut cache, &mut faces, &mut ctx, "Test", "415 425");
        assert_eq!(matched_min_weight(&mut cache, "Test", 450.0), FontSelectionValue::from(415.0));

        add(&mut cache, &mut faces, &mut ctx, "Test", "475 485");
        assert_eq!(matched_min_weight(&mut cache, "Test", 450.0), FontSelectionValue::from(475.0));
    }

    #[test]
    fn equal_capabilities_share_a_group() {
        let mut ctx = context();
        let mut faces = FontFaceMap::new();
        let mut cache = FontFaceCache::new();

        let a = add(&mut cache, &mut faces, &mut ctx, "Test", "400");
        let b = add(&mut cache, &mut faces, &mut ctx, "test", "normal");
        assert_eq!(cache.segmented_faces_for_family("TEST").len(), 1);
        let group = faces[&a].css_font_face().segmented_faces().iter().next().copied();
        assert_eq!(group, faces[&b].css_font_face().segmented_faces().iter().next().copied());
    }

    #[test]
    fn queries_are_memoized_per_family() {
        let mut ctx = context();
        let mut faces = FontFaceMap::new();
        let mut cache = FontFaceCache::new();
        add(&mut cache, &mut faces, &mut ctx, "A", "400");
        add(&mut cache, &mut faces, &mut ctx, "B", "400");

        let description = FontDescription::new("A", 16.0);
        let first = cache.get(&description, "A");
        assert_eq!(first, cache.get(&description, "A"));
        cache.get(&description, "B");
        assert_eq!(cache.memoized_queries("A"), 1);
        assert_eq!(cache.memoized_queries("B"), 1);

        let version = cache.version();
        add(&mut cache, &mut faces, &mut ctx, "B", "700");
        assert!(cache.version() > version);
        assert_eq!(cache.memoized_queries("A"), 1);
        assert_eq!(cache.memoized_queries("B"), 0);
        assert_eq!(first, cache.get(&description, "A"));
    }

    #[test]
    fn rule_faces_are_added_once() {
        let mut ctx = context();
        let mut faces = FontFaceMap::new();
        let mut cache = FontFaceCache::new();
        let rule = StyleRuleKey::new();

        let face = FontFace::from_source("Test", "local(Local)", &FontFaceDescriptors::default(), &mut ctx);
        let id = face.id();
        faces.insert(id, face);
        assert!(cache.add_rule_face(rule, id, &mut faces, &ctx));
        assert!(!cache.add_rule_face(rule, id, &mut faces, &ctx));
        assert_eq!(cache.css_connected_faces(), &[id]);

        assert_eq!(cache.remove_rule(rule, &mut faces), Some(id));
        assert!(!cache.contains_family("Test"));
        assert!(cache.is_empty());
        assert!(!cache.clear_css_connected(&mut faces));
    }

    #[test]
    fn removing_last_face_drops_the_family() {
        let mut ctx = context();
        let mut faces = FontFaceMap::new();
        let mut cache = FontFaceCache::new();
        let light = add(&mut cache, &mut faces, &mut ctx, "Test", "300");
        let bold = add(&mut cache, &mut faces, &mut ctx, "Test", "700");
        assert_eq!(cache.segmented_faces_for_family("Test").len(), 2);

        assert!(cache.remove_font_face(light, &mut faces));
        assert!(!cache.remove_font_face(light, &mut faces));
        assert_eq!(cache.segmented_faces_for_family("Test").len(), 1);
        assert!(faces[&light].css_font_face().segmented_faces().is_empty());

        assert!(cache.remove_font_face(bold, &mut faces));
        assert!(!cache.contains_family("Test"));
        assert!(cache.get(&FontDescription::new("Test", 16.0), "Test").is_none());
    }

    #[test]
    fn clear_all_unregisters_groups() {
        let mut ctx = context();
        let mut faces = FontFaceMap::new();
        let mut cache = FontFaceCache::new();
        let id = add(&mut cache, &mut faces, &mut ctx, "Test", "400");
        cache.clear_all(&mut faces);
        assert!(cache.is_empty());
        assert!(faces[&id].css_font_face().segmented_faces().is_empty());
    }
}

//! Font selection values and the CSS Fonts 4 matching algorithm.
//!
//! Every face advertises a [`FontSelectionCapabilities`] (a range on each of
//! the width, slope and weight axes). A style lookup produces a point
//! [`FontSelectionRequest`]. [`FontSelectionAlgorithm`] ranks capabilities
//! against a request, width first, then slope, then weight.
//!
//! ```rust
//! use rust_fontface::selection::*;
//!
//! let request = FontSelectionRequest {
//!     weight: FontSelectionValue::from(450.0),
//!     ..Default::default()
//! };
//! let light = FontSelectionCapabilities::with_weight(415.0, 425.0);
//! let heavy = FontSelectionCapabilities::with_weight(600.0, 610.0);
//!
//! let mut bounds = FontSelectionCapabilities::empty();
//! bounds.expand(&light);
//! bounds.expand(&heavy);
//!
//! let algorithm = FontSelectionAlgorithm::new(request, bounds);
//! assert!(algorithm.is_better_match_for_request(&light, &heavy));
//! ```

use core::fmt;
use core::ops::{Neg, Sub};

/// Fixed point axis value with two fractional bits.
///
/// Quarter precision is enough for every CSS keyword (62.5%, 87.5%, ...)
/// and lets the value be used as a map key.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FontSelectionValue(i32);

impl FontSelectionValue {
    const FRACTIONAL_BITS: i32 = 2;
    const FRACTIONAL_MULTIPLIER: f32 = (1 << Self::FRACTIONAL_BITS) as f32;

    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    pub const fn from_int(value: i32) -> Self {
        Self(value << Self::FRACTIONAL_BITS)
    }

    pub fn to_f32(self) -> f32 {
        self.0 as f32 / Self::FRACTIONAL_MULTIPLIER
    }

    pub const fn max_value() -> Self {
        Self(i32::MAX)
    }

    pub const fn min_value() -> Self {
        Self(i32::MIN)
    }
}

impl From<f32> for FontSelectionValue {
    fn from(value: f32) -> Self {
        Self((value * Self::FRACTIONAL_MULTIPLIER) as i32)
    }
}

impl Sub for FontSelectionValue {
    type Output = FontSelectionValue;

    fn sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl Neg for FontSelectionValue {
    type Output = FontSelectionValue;

    fn neg(self) -> Self {
        Self(self.0.saturating_neg())
    }
}

impl fmt::Display for FontSelectionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f32())
    }
}

// ── Axis constants ──────────────────────────────────────────────────────────

pub const ULTRA_CONDENSED_WIDTH: FontSelectionValue = FontSelectionValue::from_int(50);
pub const EXTRA_CONDENSED_WIDTH: FontSelectionValue = FontSelectionValue::from_raw(250);
pub const CONDENSED_WIDTH: FontSelectionValue = FontSelectionValue::from_int(75);
pub const SEMI_CONDENSED_WIDTH: FontSelectionValue = FontSelectionValue::from_raw(350);
pub const NORMAL_WIDTH: FontSelectionValue = FontSelectionValue::from_int(100);
pub const SEMI_EXPANDED_WIDTH: FontSelectionValue = FontSelectionValue::from_raw(450);
pub const EXPANDED_WIDTH: FontSelectionValue = FontSelectionValue::from_int(125);
pub const EXTRA_EXPANDED_WIDTH: FontSelectionValue = FontSelectionValue::from_int(150);
pub const ULTRA_EXPANDED_WIDTH: FontSelectionValue = FontSelectionValue::from_int(200);

pub const NORMAL_SLOPE: FontSelectionValue = FontSelectionValue::from_int(0);
pub const ITALIC_SLOPE: FontSelectionValue = FontSelectionValue::from_int(14);
pub const ITALIC_THRESHOLD: FontSelectionValue = FontSelectionValue::from_int(14);

pub const NORMAL_WEIGHT: FontSelectionValue = FontSelectionValue::from_int(400);
pub const BOLD_WEIGHT: FontSelectionValue = FontSelectionValue::from_int(700);
pub const BOLD_THRESHOLD: FontSelectionValue = FontSelectionValue::from_int(600);
pub const LOWER_WEIGHT_SEARCH_THRESHOLD: FontSelectionValue = FontSelectionValue::from_int(400);
pub const UPPER_WEIGHT_SEARCH_THRESHOLD: FontSelectionValue = FontSelectionValue::from_int(500);

/// Closed range on one selection axis.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FontSelectionRange {
    pub minimum: FontSelectionValue,
    pub maximum: FontSelectionValue,
}

impl FontSelectionRange {
    /// Builds a range, swapping the endpoints of a decreasing range.
    pub fn new(a: FontSelectionValue, b: FontSelectionValue) -> Self {
        if a <= b {
            Self { minimum: a, maximum: b }
        } else {
            Self { minimum: b, maximum: a }
        }
    }

    pub fn point(value: FontSelectionValue) -> Self {
        Self { minimum: value, maximum: value }
    }

    /// Starting value for [`expand`](Self::expand); contains nothing.
    pub const fn empty() -> Self {
        Self {
            minimum: FontSelectionValue::max_value(),
            maximum: FontSelectionValue::min_value(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.minimum <= self.maximum
    }

    pub fn includes(&self, value: FontSelectionValue) -> bool {
        value >= self.minimum && value <= self.maximum
    }

    pub fn expand(&mut self, other: &FontSelectionRange) {
        debug_assert!(other.is_valid());
        if !self.is_valid() {
            *self = *other;
        } else {
            self.minimum = self.minimum.min(other.minimum);
            self.maximum = self.maximum.max(other.maximum);
        }
    }
}

/// What one face (or one group of faces) can render, per axis.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FontSelectionCapabilities {
    pub width: FontSelectionRange,
    pub slope: FontSelectionRange,
    pub weight: FontSelectionRange,
}

impl Default for FontSelectionCapabilities {
    fn default() -> Self {
        Self {
            width: FontSelectionRange::point(NORMAL_WIDTH),
            slope: FontSelectionRange::point(NORMAL_SLOPE),
            weight: FontSelectionRange::point(NORMAL_WEIGHT),
        }
    }
}

impl FontSelectionCapabilities {
    pub const fn empty() -> Self {
        Self {
            width: FontSelectionRange::empty(),
            slope: FontSelectionRange::empty(),
            weight: FontSelectionRange::empty(),
        }
    }

    /// Normal width and slope with the given weight range.
    pub fn with_weight(from: f32, to: f32) -> Self {
        Self {
            weight: FontSelectionRange::new(from.into(), to.into()),
            ..Default::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_valid() && self.slope.is_valid() && self.weight.is_valid()
    }

    pub fn expand(&mut self, other: &FontSelectionCapabilities) {
        self.width.expand(&other.width);
        self.slope.expand(&other.slope);
        self.weight.expand(&other.weight);
    }
}

/// Point on each axis as computed by style.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FontSelectionRequest {
    pub weight: FontSelectionValue,
    pub width: FontSelectionValue,
    pub slope: FontSelectionValue,
}

impl Default for FontSelectionRequest {
    fn default() -> Self {
        Self {
            weight: NORMAL_WEIGHT,
            width: NORMAL_WIDTH,
            slope: NORMAL_SLOPE,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DistanceResult {
    pub distance: FontSelectionValue,
    pub value: FontSelectionValue,
}

impl DistanceResult {
    fn new(distance: FontSelectionValue, value: FontSelectionValue) -> Self {
        Self { distance, value }
    }
}

/// Ranks candidate capabilities against one request.
///
/// Distances are measured relative to `capabilities_bounds`, the union of
/// every candidate that takes part in the comparison.
#[derive(Debug, Clone)]
pub struct FontSelectionAlgorithm {
    request: FontSelectionRequest,
    capabilities_bounds: FontSelectionCapabilities,
}

impl FontSelectionAlgorithm {
    pub fn new(
        request: FontSelectionRequest,
        capabilities_bounds: FontSelectionCapabilities,
    ) -> Self {
        Self {
            request,
            capabilities_bounds,
        }
    }

    pub fn request(&self) -> &FontSelectionRequest {
        &self.request
    }

    pub fn stretch_distance(&self, capabilities: &FontSelectionCapabilities) -> DistanceResult {
        let width = capabilities.width;
        let request = self.request.width;
        if width.includes(request) {
            return DistanceResult::new(FontSelectionValue::default(), request);
        }

        // wider first for expanded requests, narrower first otherwise
        if request > NORMAL_WIDTH {
            if width.minimum > request {
                return DistanceResult::new(width.minimum - request, width.minimum);
            }
            let threshold = request.max(self.capabilities_bounds.width.maximum);
            return DistanceResult::new(threshold - width.maximum, width.maximum);
        }

        if width.maximum < request {
            return DistanceResult::new(request - width.maximum, width.maximum);
        }
        let threshold = request.min(self.capabilities_bounds.width.minimum);
        DistanceResult::new(width.minimum - threshold, width.minimum)
    }

    pub fn style_distance(&self, capabilities: &FontSelectionCapabilities) -> DistanceResult {
        let slope = capabilities.slope;
        let request = self.request.slope;
        let zero = FontSelectionValue::default();
        if slope.includes(request) {
            return DistanceResult::new(zero, request);
        }

        if request >= ITALIC_THRESHOLD {
            if slope.minimum > request {
                return DistanceResult::new(slope.minimum - request, slope.minimum);
            }
            let threshold = request.max(self.capabilities_bounds.slope.maximum);
            return DistanceResult::new(threshold - slope.maximum, slope.maximum);
        }

        if request >= zero {
            if slope.maximum >= zero && slope.maximum < request {
                return DistanceResult::new(request - slope.maximum, slope.maximum);
            }
            if slope.minimum > request {
                return DistanceResult::new(slope.minimum, slope.minimum);
            }
            let threshold = request.max(self.capabilities_bounds.slope.maximum);
            return DistanceResult::new(threshold - slope.maximum, slope.maximum);
        }

        if request > -ITALIC_THRESHOLD {
            if slope.minimum > request && slope.minimum <= zero {
                return DistanceResult::new(slope.minimum - request, slope.minimum);
            }
            if slope.maximum < request {
                return DistanceResult::new(-slope.maximum, slope.maximum);
            }
            let threshold = request.min(self.capabilities_bounds.slope.minimum);
            return DistanceResult::new(slope.minimum - threshold, slope.minimum);
        }

        if slope.maximum < request {
            return DistanceResult::new(request - slope.maximum, slope.maximum);
        }
        let threshold = request.min(self.capabilities_bounds.slope.minimum);
        DistanceResult::new(slope.minimum - threshold, slope.minimum)
    }

    /// Requests in `[400, 500]` search upward to 500, then downward below
    /// the request, then upward above 500.
    pub fn weight_distance(&self, capabilities: &FontSelectionCapabilities) -> DistanceResult {
        let weight = capabilities.weight;
        let request = self.request.weight;
        if weight.includes(request) {
            return DistanceResult::new(FontSelectionValue::default(), request);
        }

        if request >= LOWER_WEIGHT_SEARCH_THRESHOLD && request <= UPPER_WEIGHT_SEARCH_THRESHOLD {
            if weight.minimum > request && weight.minimum <= UPPER_WEIGHT_SEARCH_THRESHOLD {
                return DistanceResult::new(weight.minimum - request, weight.minimum);
            }
            if weight.maximum < request {
                return DistanceResult::new(
                    UPPER_WEIGHT_SEARCH_THRESHOLD - weight.maximum,
                    weight.maximum,
                );
            }
            let threshold = request.min(self.capabilities_bounds.weight.minimum);
            return DistanceResult::new(weight.minimum - threshold, weight.minimum);
        }

        if request < LOWER_WEIGHT_SEARCH_THRESHOLD {
            if weight.maximum < request {
                return DistanceResult::new(request - weight.maximum, weight.maximum);
            }
            let threshold = request.min(self.capabilities_bounds.weight.minimum);
            return DistanceResult::new(weight.minimum - threshold, weight.minimum);
        }

        if weight.minimum > request {
            return DistanceResult::new(weight.minimum - request, weight.minimum);
        }
        let threshold = request.max(self.capabilities_bounds.weight.maximum);
        DistanceResult::new(threshold - weight.maximum, weight.maximum)
    }

    /// Whether `first` is a strictly better match than `second`.
    pub fn is_better_match_for_request(
        &self,
        first: &FontSelectionCapabilities,
        second: &FontSelectionCapabilities,
    ) -> bool {
        let stretch_first = self.stretch_distance(first).distance;
        let stretch_second = self.stretch_distance(second).distance;
        if stretch_first != stretch_second {
            return stretch_first < stretch_second;
        }

        let style_first = self.style_distance(first).distance;
        let style_second = self.style_distance(second).distance;
        if style_first != style_second {
            return style_first < style_second;
        }

        self.weight_distance(first).distance < self.weight_distance(second).distance
    }
}

//! Result features: boolean facts a node asserts about its value.

use serde::{Deserialize, Serialize};

/// A single feature flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    /// The value can never be null; consumers may skip null guards.
    NonNullable,
    /// Recomputing the node is acceptable instead of caching its value
    /// in a temporary.
    Cheap,
}

impl Feature {
    fn bit(self) -> u8 {
        match self {
            Feature::NonNullable => 0b01,
            Feature::Cheap => 0b10,
        }
    }
}

/// An immutable feature set. All operations return a new set; toggling a
/// feature already in the requested state is a no-op clone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Features(u8);

impl Features {
    pub const EMPTY: Features = Features(0);

    pub fn of(features: &[Feature]) -> Self {
        let mut bits = 0;
        for f in features {
            bits |= f.bit();
        }
        Features(bits)
    }

    pub fn has(&self, feature: Feature) -> bool {
        self.0 & feature.bit() != 0
    }

    #[must_use]
    pub fn with(&self, feature: Feature) -> Self {
        Features(self.0 | feature.bit())
    }

    #[must_use]
    pub fn without(&self, feature: Feature) -> Self {
        Features(self.0 & !feature.bit())
    }

    /// Features present in both sets; used when two branches merge.
    #[must_use]
    pub fn intersect(&self, other: Features) -> Self {
        Features(self.0 & other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_are_idempotent() {
        let base = Features::EMPTY.with(Feature::Cheap);
        assert_eq!(base.with(Feature::Cheap), base);
        assert_eq!(
            base.without(Feature::NonNullable),
            base.without(Feature::NonNullable).without(Feature::NonNullable)
        );
        assert_eq!(base.without(Feature::Cheap).with(Feature::Cheap), base);
    }

    #[test]
    fn intersect_keeps_common_features() {
        let a = Features::of(&[Feature::Cheap, Feature::NonNullable]);
        let b = Features::of(&[Feature::NonNullable]);
        let merged = a.intersect(b);
        assert!(merged.has(Feature::NonNullable));
        assert!(!merged.has(Feature::Cheap));
    }
}

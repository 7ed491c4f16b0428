//! Bounding box in a table's own coordinate reference

use crate::{GpkgResult, SchemaError};
use serde::{Deserialize, Serialize};

/// Axis-aligned extent. X is longitude/easting, Y is latitude/northing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a bounding box, rejecting NaN bounds and inverted extents.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> GpkgResult<Self> {
        let bbox = Self {
            min_x,
            min_y,
            max_x,
            max_y,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    /// The whole-world geographic extent.
    pub fn world() -> Self {
        Self {
            min_x: -180.0,
            min_y: -90.0,
            max_x: 180.0,
            max_y: 90.0,
        }
    }

    pub fn validate(&self) -> GpkgResult<()> {
        for (field, value) in [
            ("min_x", self.min_x),
            ("min_y", self.min_y),
            ("max_x", self.max_x),
            ("max_y", self.max_y),
        ] {
            if value.is_nan() {
                return Err(SchemaError::InvalidValue {
                    field: field.to_string(),
                    reason: "must not be NaN".to_string(),
                }
                .into());
            }
        }
        if self.min_x > self.max_x {
            return Err(SchemaError::InvalidValue {
                field: "min_x".to_string(),
                reason: format!("{} exceeds max_x {}", self.min_x, self.max_x),
            }
            .into());
        }
        if self.min_y > self.max_y {
            return Err(SchemaError::InvalidValue {
                field: "min_y".to_string(),
                reason: format!("{} exceeds max_y {}", self.min_y, self.max_y),
            }
            .into());
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_bbox() -> impl Strategy<Value = BoundingBox> {
        (-1.0e6..1.0e6f64, -1.0e6..1.0e6f64, 0.0..1.0e6f64, 0.0..1.0e6f64).prop_map(
            |(x, y, w, h)| BoundingBox {
                min_x: x,
                min_y: y,
                max_x: x + w,
                max_y: y + h,
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A union covers both inputs and is itself valid.
        #[test]
        fn prop_union_contains_both(a in arb_bbox(), b in arb_bbox()) {
            let u = a.union(&b);
            prop_assert!(u.validate().is_ok());
            prop_assert!(u.contains(&a));
            prop_assert!(u.contains(&b));
        }

        /// Swapping min and max of a non-degenerate extent is rejected.
        #[test]
        fn prop_inverted_rejected(bbox in arb_bbox()) {
            prop_assume!(bbox.width() > 0.0);
            let inverted = BoundingBox::new(bbox.max_x, bbox.min_y, bbox.min_x, bbox.max_y);
            prop_assert!(inverted.is_err());
        }
    }
}

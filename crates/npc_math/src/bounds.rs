//! Axis-aligned map bounds.
//!
//! [`Bounds`] describes the walkable rectangle of a map. Random placement
//! insets it by a margin so NPCs never spawn flush against an edge.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::GeometryError;

/// An axis-aligned rectangle in map coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Lower-left corner (inclusive).
    pub min: DVec2,
    /// Upper-right corner (inclusive).
    pub max: DVec2,
}

impl Bounds {
    /// Create bounds from two corners.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::NonFinite`] for NaN/infinite corners and
    /// [`GeometryError::InvalidBounds`] if `min` exceeds `max` on either axis.
    pub fn new(min: DVec2, max: DVec2) -> Result<Self, GeometryError> {
        crate::ensure_finite("bounds min", min)?;
        crate::ensure_finite("bounds max", max)?;
        if min.x > max.x || min.y > max.y {
            return Err(GeometryError::InvalidBounds {
                min_x: min.x,
                min_y: min.y,
                max_x: max.x,
                max_y: max.y,
            });
        }
        Ok(Self { min, max })
    }

    /// Bounds anchored at the origin with the given width and height.
    ///
    /// # Errors
    ///
    /// See [`Bounds::new`].
    pub fn from_size(width: f64, height: f64) -> Result<Self, GeometryError> {
        Self::new(DVec2::ZERO, DVec2::new(width, height))
    }

    /// Width and height of the rectangle.
    #[must_use]
    pub fn size(&self) -> DVec2 {
        self.max - self.min
    }

    /// Returns `true` if `point` lies inside (or on the edge of) the bounds.
    #[must_use]
    pub fn contains(&self, point: DVec2) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Shrink the rectangle by `margin` on all four sides.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::InvalidMargin`] if the margin is negative,
    /// non-finite, or larger than half the width or height.
    pub fn inset(&self, margin: f64) -> Result<Self, GeometryError> {
        let size = self.size();
        if !margin.is_finite() || margin < 0.0 || margin * 2.0 > size.x || margin * 2.0 > size.y {
            return Err(GeometryError::InvalidMargin { margin });
        }
        let offset = DVec2::splat(margin);
        Ok(Self {
            min: self.min + offset,
            max: self.max - offset,
        })
    }

    /// Map unit coordinates `(u, v)` in `[0, 1]` onto the rectangle.
    #[must_use]
    pub fn point_at(&self, u: f64, v: f64) -> DVec2 {
        self.min + self.size() * DVec2::new(u, v)
    }
}

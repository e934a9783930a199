//! # npc_math
//!
//! Math types for NPC movement. Re-exports [`glam`]'s double-precision 2D
//! vector and defines the small amount of map geometry the movement runtime
//! needs:
//!
//! - [`Bounds`]: an axis-aligned map rectangle with margin insetting.
//! - [`lerp`]: straight-line interpolation between two waypoints.
//! - [`ensure_finite`]: input validation for externally supplied coordinates.

pub mod bounds;

// Re-export glam types for convenience.
pub use glam::DVec2;

pub use bounds::Bounds;

/// Errors produced when validating externally supplied geometry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    /// A coordinate was NaN or infinite.
    #[error("{what} is not finite: ({x}, {y})")]
    NonFinite {
        /// Which input was rejected (e.g. `"position"`).
        what: &'static str,
        x: f64,
        y: f64,
    },

    /// The rectangle's minimum corner is not below its maximum corner.
    #[error("invalid bounds: min ({min_x}, {min_y}) must not exceed max ({max_x}, {max_y})")]
    InvalidBounds {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },

    /// The margin is negative, non-finite, or leaves no room to place anything.
    #[error("invalid margin {margin}: must be finite, non-negative and fit inside the bounds")]
    InvalidMargin {
        /// The rejected margin.
        margin: f64,
    },
}

/// Linearly interpolate between `from` and `to` by `t`.
///
/// `t` is not clamped; callers own the progress range.
#[must_use]
pub fn lerp(from: DVec2, to: DVec2, t: f64) -> DVec2 {
    from + (to - from) * t
}

/// Reject NaN or infinite coordinates.
///
/// # Errors
///
/// Returns [`GeometryError::NonFinite`] if either component is not finite.
pub fn ensure_finite(what: &'static str, point: DVec2) -> Result<DVec2, GeometryError> {
    if point.is_finite() {
        Ok(point)
    } else {
        Err(GeometryError::NonFinite {
            what,
            x: point.x,
            y: point.y,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_endpoints() {
        let a = DVec2::new(0.0, 0.0);
        let b = DVec2::new(100.0, -40.0);
        assert_eq!(lerp(a, b, 0.0), a);
        assert_eq!(lerp(a, b, 1.0), b);
        assert_eq!(lerp(a, b, 0.5), DVec2::new(50.0, -20.0));
    }

    #[test]
    fn test_ensure_finite_accepts_regular_points() {
        let p = DVec2::new(3.5, -2.0);
        assert_eq!(ensure_finite("position", p), Ok(p));
    }

    #[test]
    fn test_ensure_finite_rejects_nan_and_infinity() {
        assert!(ensure_finite("position", DVec2::new(f64::NAN, 0.0)).is_err());
        let err = ensure_finite("target", DVec2::new(0.0, f64::INFINITY)).unwrap_err();
        assert!(matches!(err, GeometryError::NonFinite { what: "target", .. }));
    }
}

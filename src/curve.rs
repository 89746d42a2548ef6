//! Servo motion curves: short sequences of `(time, position)` points.
//!
//! A curve is stored the way model-railway decoders keep it in EEPROM or flash: byte pairs of a
//! time (in refresh intervals of ~20 ms) and a position (0..=255), ended by a point whose time is
//! 0. The first point is the only one allowed to have time 0.
//!
//! Positions are relative. A [`CurvePlayer`](crate::curve_player::CurvePlayer) maps 0 and 255 onto
//! its two pulse-width thresholds when it plays the curve.
//!
//! # Example
//!
//! ```
//! use moba_servo::curve::{Curve, CurvePoint};
//!
//! // (time, position) pairs followed by the terminator.
//! let eeprom = [0u8, 0, 2, 128, 4, 255, 0, 0];
//! let curve = Curve::from_store(&mut &eeprom[..], 0);
//!
//! assert_eq!(curve.len(), 3);
//! assert_eq!(curve.last(), Some(CurvePoint::new(4, 255)));
//! ```

mod catalog;
mod segment;

pub use catalog::{CurveCatalog, PredefinedCurves};
pub(crate) use segment::{PulseScale, Segment};

use serde::{Deserialize, Serialize};

/// Most points a curve can hold, not counting the terminator.
pub const MAX_CURVE_POINTS: usize = 24;

/// One point of a curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CurvePoint {
    /// Refresh intervals since the start of the curve, before time stretching.
    pub time: u8,
    /// Position between the two thresholds: 0 is one end, 255 the other.
    pub position: u8,
}

impl CurvePoint {
    /// The point that ends a curve.
    pub const TERMINATOR: Self = Self::new(0, 0);

    /// Create a point.
    #[must_use]
    pub const fn new(time: u8, position: u8) -> Self {
        Self { time, position }
    }
}

/// Which threshold curve position 0 maps onto.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Position 0 is threshold 1, position 255 is threshold 2.
    #[default]
    Forward,
    /// Position 0 is threshold 2, position 255 is threshold 1.
    Reverse,
}

/// Byte-addressable storage that holds curves, such as an EEPROM.
pub trait CurveStore {
    /// Byte at `address`.
    fn read(&mut self, address: u16) -> u8;
}

/// Reads past the end return 0, which ends any curve.
impl CurveStore for &[u8] {
    fn read(&mut self, address: u16) -> u8 {
        self.get(usize::from(address)).copied().unwrap_or(0)
    }
}

impl<const N: usize> CurveStore for [u8; N] {
    fn read(&mut self, address: u16) -> u8 {
        self.get(usize::from(address)).copied().unwrap_or(0)
    }
}

impl<S: CurveStore + ?Sized> CurveStore for &mut S {
    fn read(&mut self, address: u16) -> u8 {
        (**self).read(address)
    }
}

/// A loaded curve, without its terminator.
///
/// Times are expected to increase from point to point. That is not checked; a curve that breaks
/// the rule plays to a standstill instead of finishing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Curve {
    points: heapless::Vec<CurvePoint, MAX_CURVE_POINTS>,
}

impl Curve {
    /// An empty curve.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            points: heapless::Vec::new(),
        }
    }

    /// Load a curve from points, stopping at the terminator or after [`MAX_CURVE_POINTS`].
    #[must_use]
    pub fn from_points(points: &[CurvePoint]) -> Self {
        Self::collect(points.iter().copied())
    }

    /// Load a curve from byte pairs starting at `address`, stopping at the terminator or after
    /// [`MAX_CURVE_POINTS`].
    #[must_use]
    pub fn from_store<S: CurveStore + ?Sized>(store: &mut S, address: u16) -> Self {
        let mut next = address;
        Self::collect(core::iter::from_fn(|| {
            let point = CurvePoint::new(store.read(next), store.read(next.wrapping_add(1)));
            next = next.wrapping_add(2);
            Some(point)
        }))
    }

    fn collect(points: impl IntoIterator<Item = CurvePoint>) -> Self {
        let mut curve = Self::new();
        for (index, point) in points.into_iter().take(MAX_CURVE_POINTS).enumerate() {
            if index > 0 && point.time == 0 {
                break;
            }
            if curve.points.push(point).is_err() {
                break;
            }
        }
        curve
    }

    /// The points, without the terminator.
    #[must_use]
    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    /// Number of points, without the terminator.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether no points are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// First point.
    #[must_use]
    pub fn first(&self) -> Option<CurvePoint> {
        self.points.first().copied()
    }

    /// Last point before the terminator.
    #[must_use]
    pub fn last(&self) -> Option<CurvePoint> {
        self.points.last().copied()
    }

    /// Point `index`, or the terminator past the end.
    pub(crate) fn point_or_terminator(&self, index: usize) -> CurvePoint {
        self.points
            .get(index)
            .copied()
            .unwrap_or(CurvePoint::TERMINATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_loading_stops_at_terminator() {
        let mut eeprom = [9u8, 9, 0, 10, 3, 20, 6, 30, 0, 0, 8, 40];
        let curve = Curve::from_store(&mut eeprom, 2);
        assert_eq!(
            curve.points(),
            &[
                CurvePoint::new(0, 10),
                CurvePoint::new(3, 20),
                CurvePoint::new(6, 30)
            ]
        );
    }

    #[test]
    fn store_loading_is_bounded() {
        let bytes: [u8; 64] = core::array::from_fn(|i| u8::try_from(i / 2 + 1).unwrap());
        let curve = Curve::from_store(&mut &bytes[..], 0);
        assert_eq!(curve.len(), MAX_CURVE_POINTS);
        assert_eq!(curve.last(), Some(CurvePoint::new(24, 24)));
    }

    #[test]
    fn reading_past_the_store_ends_the_curve() {
        let bytes = [0u8, 50];
        let curve = Curve::from_store(&mut &bytes[..], 0);
        assert_eq!(curve.points(), &[CurvePoint::new(0, 50)]);
    }

    #[test]
    fn first_point_may_have_time_zero_only_once() {
        let curve = Curve::from_points(&[
            CurvePoint::new(0, 1),
            CurvePoint::new(0, 2),
            CurvePoint::new(5, 3),
        ]);
        assert_eq!(curve.len(), 1);
        assert_eq!(curve.point_or_terminator(1), CurvePoint::TERMINATOR);
    }
}

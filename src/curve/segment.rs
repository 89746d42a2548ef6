//! Linear interpolation between two curve points.

use super::{CurvePoint, Direction};

/// Maps curve positions (0..=255) onto pulse widths between two thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PulseScale {
    pub(crate) threshold1: i16,
    pub(crate) threshold2: i16,
    pub(crate) direction: Direction,
}

impl PulseScale {
    /// Pulse width (µs) of a curve position. Integer division truncates toward zero.
    pub(crate) fn to_us(self, position: u8) -> i32 {
        let threshold1 = i32::from(self.threshold1);
        let threshold2 = i32::from(self.threshold2);
        let position = i32::from(position);
        match self.direction {
            Direction::Forward => position * (threshold2 - threshold1) / 255 + threshold1,
            Direction::Reverse => position * (threshold1 - threshold2) / 255 + threshold2,
        }
    }
}

/// One leg of a curve, in stretched time and microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Segment {
    x_from: i32,
    x_delta: i32,
    y_from: i32,
    y_delta: i32,
}

impl Segment {
    pub(crate) fn new(from: CurvePoint, to: CurvePoint, stretch: u8, scale: PulseScale) -> Self {
        let stretch = i32::from(stretch);
        let x_from = i32::from(from.time) * stretch;
        let x_to = i32::from(to.time) * stretch;
        let y_from = scale.to_us(from.position);
        let y_to = scale.to_us(to.position);
        Self {
            x_from,
            x_delta: x_to - x_from,
            y_from,
            y_delta: y_to - y_from,
        }
    }

    /// Interpolated pulse width (µs) at stretched time `x`.
    ///
    /// A leg of zero length holds its start value.
    pub(crate) fn pulse_at(&self, x: i32) -> i32 {
        if self.x_delta == 0 {
            return self.y_from;
        }
        (x - self.x_from).saturating_mul(self.y_delta) / self.x_delta + self.y_from
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORWARD: PulseScale = PulseScale {
        threshold1: 1_400,
        threshold2: 1_600,
        direction: Direction::Forward,
    };

    #[test]
    fn directions_traverse_the_same_range() {
        let reverse = PulseScale {
            direction: Direction::Reverse,
            ..FORWARD
        };
        assert_eq!(FORWARD.to_us(0), 1_400);
        assert_eq!(FORWARD.to_us(128), 1_500);
        assert_eq!(FORWARD.to_us(255), 1_600);
        assert_eq!(reverse.to_us(0), 1_600);
        assert_eq!(reverse.to_us(128), 1_500);
        assert_eq!(reverse.to_us(255), 1_400);
    }

    #[test]
    fn thresholds_may_be_given_in_either_order() {
        let swapped = PulseScale {
            threshold1: 1_600,
            threshold2: 1_400,
            direction: Direction::Forward,
        };
        assert_eq!(swapped.to_us(0), 1_600);
        assert_eq!(swapped.to_us(255), 1_400);
    }

    #[test]
    fn interpolates_with_truncation() {
        let segment = Segment::new(CurvePoint::new(2, 128), CurvePoint::new(4, 255), 1, FORWARD);
        assert_eq!(segment.pulse_at(2), 1_500);
        assert_eq!(segment.pulse_at(3), 1_550);
        assert_eq!(segment.pulse_at(4), 1_600);

        let stretched =
            Segment::new(CurvePoint::new(0, 0), CurvePoint::new(1, 255), 3, FORWARD);
        assert_eq!(stretched.pulse_at(1), 1_466);
        assert_eq!(stretched.pulse_at(2), 1_533);
    }

    #[test]
    fn descending_leg_has_negative_slope() {
        let segment = Segment::new(CurvePoint::new(0, 255), CurvePoint::new(4, 0), 1, FORWARD);
        assert_eq!(segment.pulse_at(1), 1_550);
        assert_eq!(segment.pulse_at(3), 1_450);
    }

    #[test]
    fn zero_length_leg_holds_start_value() {
        let segment = Segment::new(CurvePoint::new(5, 0), CurvePoint::new(5, 255), 2, FORWARD);
        assert_eq!(segment.pulse_at(10), 1_400);
    }
}

//! Collections of ready-made curves.

use super::CurvePoint;

/// An indexed, read-only collection of curves.
///
/// Each entry is stored the same way as a curve in a [`CurveStore`](super::CurveStore): points
/// followed by a terminator whose time is 0.
pub trait CurveCatalog {
    /// Number of curves.
    fn len(&self) -> usize;

    /// Whether the catalog holds no curves.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Points of curve `index`, or `None` if out of range.
    fn curve(&self, index: u8) -> Option<&[CurvePoint]>;
}

impl CurveCatalog for [&[CurvePoint]] {
    fn len(&self) -> usize {
        <[_]>::len(self)
    }

    fn curve(&self, index: u8) -> Option<&[CurvePoint]> {
        self.get(usize::from(index)).copied()
    }
}

/// The standard servo curves of the OpenDCC decoders.
///
/// Curves come in pairs: the `_A` curve moves from position 0 to 255 (or swings up), the `_B`
/// curve is its mirror image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PredefinedCurves;

impl PredefinedCurves {
    /// Linear, 4 intervals.
    pub const LIN_A: u8 = 0;
    /// Linear, reversed.
    pub const LIN_B: u8 = 1;
    /// Smooth acceleration and deceleration, 12 intervals.
    pub const MOVE_A: u8 = 2;
    /// Smooth move, reversed.
    pub const MOVE_B: u8 = 3;
    /// Half a sine above the middle position, returning to the middle.
    pub const SINE_A: u8 = 4;
    /// Half a sine below the middle position.
    pub const SINE_B: u8 = 5;
    /// Accelerating swing up and back.
    pub const WHIP_A: u8 = 6;
    /// Accelerating swing down and back.
    pub const WHIP_B: u8 = 7;
    /// Semaphore signal arm dropping to stop, with bounce.
    pub const SIG_HP0: u8 = 8;
    /// Semaphore signal arm rising to clear, with bounce.
    pub const SIG_HP1: u8 = 9;
    /// Semaphore signal arm rising to clear with a pause halfway.
    pub const SIG_HP1P: u8 = 10;
    /// A full sine period around the middle position.
    pub const SINE_AB: u8 = 11;
}

impl CurveCatalog for PredefinedCurves {
    fn len(&self) -> usize {
        PREDEFINED.len()
    }

    fn curve(&self, index: u8) -> Option<&[CurvePoint]> {
        PREDEFINED.get(usize::from(index)).copied()
    }
}

const fn p(time: u8, position: u8) -> CurvePoint {
    CurvePoint::new(time, position)
}

const END: CurvePoint = CurvePoint::TERMINATOR;

static PREDEFINED: [&[CurvePoint]; 12] = [
    LIN_A, LIN_B, MOVE_A, MOVE_B, SINE_A, SINE_B, WHIP_A, WHIP_B, SIG_HP0, SIG_HP1, SIG_HP1P, SINE_AB,
];

const LIN_A: &[CurvePoint] = &[p(0, 0), p(2, 128), p(4, 255), END];

const LIN_B: &[CurvePoint] = &[p(0, 255), p(2, 128), p(4, 0), END];

const MOVE_A: &[CurvePoint] = &[
    p(0, 0),
    p(1, 5),
    p(2, 17),
    p(3, 37),
    p(4, 64),
    p(6, 128),
    p(8, 192),
    p(9, 218),
    p(10, 238),
    p(11, 250),
    p(12, 255),
    END,
];

const MOVE_B: &[CurvePoint] = &[
    p(0, 255),
    p(1, 250),
    p(2, 238),
    p(3, 218),
    p(4, 192),
    p(6, 128),
    p(8, 64),
    p(9, 37),
    p(10, 17),
    p(11, 5),
    p(12, 0),
    END,
];

const SINE_A: &[CurvePoint] = &[
    p(0, 128),
    p(3, 186),
    p(5, 218),
    p(7, 241),
    p(8, 249),
    p(9, 253),
    p(10, 255),
    p(11, 253),
    p(12, 249),
    p(13, 241),
    p(15, 218),
    p(17, 186),
    p(20, 128),
    END,
];

const SINE_B: &[CurvePoint] = &[
    p(0, 128),
    p(3, 70),
    p(5, 38),
    p(7, 15),
    p(8, 7),
    p(9, 3),
    p(10, 1),
    p(11, 3),
    p(12, 7),
    p(13, 15),
    p(15, 38),
    p(17, 70),
    p(20, 128),
    END,
];

const WHIP_A: &[CurvePoint] = &[
    p(0, 128),
    p(1, 135),
    p(2, 145),
    p(3, 157),
    p(4, 172),
    p(5, 189),
    p(6, 208),
    p(8, 255),
    p(10, 208),
    p(11, 189),
    p(12, 172),
    p(13, 157),
    p(14, 145),
    p(15, 135),
    p(16, 128),
    END,
];

const WHIP_B: &[CurvePoint] = &[
    p(0, 128),
    p(1, 121),
    p(2, 111),
    p(3, 99),
    p(4, 84),
    p(5, 67),
    p(6, 48),
    p(8, 1),
    p(10, 48),
    p(11, 67),
    p(12, 84),
    p(13, 99),
    p(14, 111),
    p(15, 121),
    p(16, 128),
    END,
];

const SIG_HP0: &[CurvePoint] = &[
    p(0, 230),
    p(1, 224),
    p(7, 140),
    p(9, 89),
    p(10, 51),
    p(11, 26),
    p(12, 16),
    p(13, 15),
    p(15, 29),
    p(16, 33),
    p(17, 31),
    p(19, 21),
    p(20, 20),
    p(22, 27),
    p(23, 29),
    p(25, 26),
    p(26, 23),
    p(27, 23),
    p(29, 26),
    p(30, 27),
    p(31, 27),
    p(33, 24),
    p(35, 25),
    END,
];

const SIG_HP1: &[CurvePoint] = &[
    p(0, 26),
    p(11, 115),
    p(13, 122),
    p(16, 128),
    p(28, 122),
    p(40, 230),
    p(41, 239),
    p(42, 240),
    p(44, 226),
    p(45, 222),
    p(46, 224),
    p(48, 234),
    p(49, 235),
    p(51, 228),
    p(52, 226),
    p(54, 230),
    p(55, 232),
    p(56, 232),
    p(58, 229),
    p(59, 228),
    p(60, 228),
    p(62, 231),
    p(64, 230),
    END,
];

const SIG_HP1P: &[CurvePoint] = SIG_HP1;

const SINE_AB: &[CurvePoint] = &[
    p(0, 128),
    p(3, 186),
    p(5, 218),
    p(7, 241),
    p(9, 253),
    p(10, 255),
    p(11, 253),
    p(13, 241),
    p(15, 218),
    p(17, 186),
    p(20, 128),
    p(23, 70),
    p(25, 38),
    p(27, 15),
    p(29, 3),
    p(30, 1),
    p(31, 3),
    p(33, 15),
    p(35, 38),
    p(37, 70),
    p(40, 128),
    END,
];

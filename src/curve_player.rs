//! Curve-driven servo motion for model-railway turnouts, signals and barriers.
//!
//! A [`CurvePlayer`] moves a servo along a [`Curve`], one curve tick per refresh interval (~20 ms),
//! instead of jumping straight to a target. Around the motion it can switch the servo's pulse line
//! and its power supply on and off, so that idle servos neither hum nor drift.
//!
//! # Motion states
//!
//! A move walks through four states:
//!
//! | state    | what happens each tick                                                      |
//! |----------|-----------------------------------------------------------------------------|
//! | `Idle`   | nothing                                                                     |
//! | `Start`  | count down the pre-roll; pulses and power come on at their configured ticks |
//! | `Moving` | emit the interpolated pulse width for the current tick                      |
//! | `Finish` | count down the post-roll; pulses and power go off at their configured ticks |
//!
//! Power and pulse switching requested during one tick is applied at the start of the next, so
//! every switch lines up with the refresh grid.
//!
//! # Example
//!
//! ```rust,ignore
//! use embedded_hal::digital::PinState;
//! use moba_servo::curve::{Direction, PredefinedCurves};
//! use moba_servo::curve_player::{CurvePlayer, IdlePulse};
//! use moba_servo::servo::Servo;
//!
//! let mut servo = Servo::new(&TIMER);
//! servo.attach(PIN_PC0)?;
//!
//! let mut player = CurvePlayer::new(servo);
//! player.init_pulse(IdlePulse::Low, 2, 5);
//! player.init_power(true, power_pin, PinState::High, 3, 10)?;
//! player.init_curve_from_catalog(PredefinedCurves::MOVE_A, 2);
//! player.move_servo_along_curve(Direction::Forward);
//!
//! loop {
//!     player.poll()?;
//! }
//! ```

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin, PinState};

use crate::curve::{
    Curve, CurveCatalog, CurvePoint, CurveStore, Direction, PredefinedCurves, PulseScale, Segment,
};
use crate::servo::PulseChannel;
use crate::{Error, Result};

/// Default pulse width (µs) for curve position 0 when moving forward.
pub const DEFAULT_THRESHOLD1_US: u16 = 1_400;

/// Default pulse width (µs) for curve position 255 when moving forward.
pub const DEFAULT_THRESHOLD2_US: u16 = 1_600;

// ============================================================================
// Public types
// ============================================================================

/// State of a [`CurvePlayer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionState {
    /// No move in progress.
    #[default]
    Idle,
    /// Counting down the pre-roll.
    Start,
    /// Following the curve.
    Moving,
    /// Counting down the post-roll.
    Finish,
}

impl MotionState {
    /// The state a move normally enters after this one.
    #[must_use]
    pub const fn successor(self) -> Self {
        match self {
            Self::Idle => Self::Start,
            Self::Start => Self::Moving,
            Self::Moving => Self::Finish,
            Self::Finish => Self::Idle,
        }
    }
}

/// What the pulse line does while the servo is idle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdlePulse {
    /// Held low: no pulses.
    Low,
    /// Held high: no pulses.
    High,
    /// Keep pulsing the last position.
    #[default]
    Continuous,
}

/// Where the loaded curve came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CurveSource {
    /// Index into a [`CurveCatalog`].
    Catalog(u8),
    /// Start address in a [`CurveStore`].
    Store(u16),
}

/// Stand-in power pin for players without a power switch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoPowerPin;

impl ErrorType for NoPowerPin {
    type Error = Infallible;
}

impl OutputPin for NoPowerPin {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }
}

struct PowerSwitch<P> {
    pin: P,
    enable: PinState,
}

// ============================================================================
// Curve player
// ============================================================================

/// Moves one servo along a curve.
///
/// `C` is the pulse output, normally a [`Servo`](crate::servo::Servo) or `&mut Servo`. `P` is the
/// optional power-enable pin configured with [`init_power`](Self::init_power).
///
/// Call [`poll`](Self::poll) on every pass of the main loop; it does work only once per refresh
/// interval, when the servo accepts a new value.
pub struct CurvePlayer<C, P = NoPowerPin> {
    servo: C,
    power: Option<PowerSwitch<P>>,

    curve: Curve,
    source: Option<CurveSource>,
    time_stretch: u8,
    scale: PulseScale,
    first_position: u16,
    last_position: u16,

    state: MotionState,
    segment: Segment,
    index: usize,
    ticks: u16,

    idle_pulse: IdlePulse,
    pulse_on_before: u8,
    pulse_off_after: u8,
    idle_power_off: bool,
    power_on_before: u8,
    power_off_after: u8,

    count_servo: u8,
    count_pulse: u8,
    count_power: u8,
    power_on_next: bool,
    power_off_next: bool,
    pulse_off_next: bool,
}

impl<C: PulseChannel, P: OutputPin> CurvePlayer<C, P> {
    /// A player with thresholds [`DEFAULT_THRESHOLD1_US`]/[`DEFAULT_THRESHOLD2_US`], time stretch
    /// 1, continuous idle pulses, no power switch and an empty curve.
    #[must_use]
    pub fn new(servo: C) -> Self {
        Self {
            servo,
            power: None,
            curve: Curve::new(),
            source: None,
            time_stretch: 1,
            scale: PulseScale {
                threshold1: DEFAULT_THRESHOLD1_US.cast_signed(),
                threshold2: DEFAULT_THRESHOLD2_US.cast_signed(),
                direction: Direction::Forward,
            },
            first_position: DEFAULT_THRESHOLD1_US,
            last_position: DEFAULT_THRESHOLD1_US,
            state: MotionState::Idle,
            segment: Segment::default(),
            index: 0,
            ticks: 0,
            idle_pulse: IdlePulse::Continuous,
            pulse_on_before: 0,
            pulse_off_after: 0,
            idle_power_off: false,
            power_on_before: 0,
            power_off_after: 0,
            count_servo: 0,
            count_pulse: 0,
            count_power: 0,
            power_on_next: false,
            power_off_next: false,
            pulse_off_next: false,
        }
    }

    // ------------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------------

    /// Configure the pulse line.
    ///
    /// `before` is the number of ticks pulses start ahead of the motion, `after` the number of
    /// ticks they continue once the motion ends; then the line falls back to `idle`. With
    /// [`IdlePulse::High`] the pre-roll gets one extra tick, so the servo sees at least one real
    /// pulse after the line was held high.
    pub fn init_pulse(&mut self, idle: IdlePulse, before: u8, after: u8) {
        self.idle_pulse = idle;
        self.pulse_on_before = if idle == IdlePulse::High {
            before.saturating_add(1)
        } else {
            before
        };
        self.pulse_off_after = after;
    }

    /// Configure a power-enable pin and drive it to its idle level now.
    ///
    /// With `idle_off`, power comes on `before` ticks ahead of the motion and goes off one tick
    /// more than `after` ticks after it ends. Without it, power stays on and both rolls are 0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PowerPin`] if the pin rejects the write. The pin is kept either way.
    pub fn init_power(
        &mut self,
        idle_off: bool,
        pin: P,
        enable: PinState,
        before: u8,
        after: u8,
    ) -> Result<()> {
        self.idle_power_off = idle_off;
        if idle_off {
            self.power_on_before = before;
            self.power_off_after = after.saturating_add(1);
        } else {
            self.power_on_before = 0;
            self.power_off_after = 0;
        }
        self.power = Some(PowerSwitch { pin, enable });
        self.switch_power(!idle_off)
    }

    /// Set the pulse width (µs) that curve position 0 maps onto when moving forward.
    pub const fn set_threshold1(&mut self, us: u16) {
        self.scale.threshold1 = us.cast_signed();
    }

    /// Set the pulse width (µs) that curve position 255 maps onto when moving forward.
    pub const fn set_threshold2(&mut self, us: u16) {
        self.scale.threshold2 = us.cast_signed();
    }

    /// Pulse width (µs) for curve position 0 when moving forward.
    #[must_use]
    pub const fn threshold1(&self) -> u16 {
        self.scale.threshold1.cast_unsigned()
    }

    /// Pulse width (µs) for curve position 255 when moving forward.
    #[must_use]
    pub const fn threshold2(&self) -> u16 {
        self.scale.threshold2.cast_unsigned()
    }

    // ------------------------------------------------------------------------
    // Curves
    // ------------------------------------------------------------------------

    /// Load curve `index` of [`PredefinedCurves`].
    ///
    /// `stretch` multiplies every point's time (0 counts as 1). An index past the end leaves the
    /// current curve and its time stretch unchanged.
    pub fn init_curve_from_catalog(&mut self, index: u8, stretch: u8) {
        self.init_curve_from(&PredefinedCurves, index, stretch);
    }

    /// Load curve `index` of any [`CurveCatalog`]. See
    /// [`init_curve_from_catalog`](Self::init_curve_from_catalog).
    pub fn init_curve_from<K: CurveCatalog + ?Sized>(&mut self, catalog: &K, index: u8, stretch: u8) {
        let Some(points) = catalog.curve(index) else {
            warn!("curve {} is not in the catalog", index);
            return;
        };
        self.time_stretch = stretch.max(1);
        self.load(Curve::from_points(points), Some(CurveSource::Catalog(index)));
    }

    /// Load a curve stored as byte pairs at `address`.
    ///
    /// `stretch` multiplies every point's time (0 counts as 1).
    pub fn init_curve_from_store<S: CurveStore + ?Sized>(
        &mut self,
        store: &mut S,
        address: u16,
        stretch: u8,
    ) {
        self.time_stretch = stretch.max(1);
        self.load(Curve::from_store(store, address), Some(CurveSource::Store(address)));
    }

    /// Load a curve that is already in memory.
    pub fn set_curve(&mut self, curve: Curve, stretch: u8) {
        self.time_stretch = stretch.max(1);
        self.load(curve, None);
    }

    fn load(&mut self, curve: Curve, source: Option<CurveSource>) {
        let first = curve.first().unwrap_or(CurvePoint::TERMINATOR);
        let last = curve.last().unwrap_or(first);
        self.first_position = to_pulse(self.scale.to_us(first.position));
        self.last_position = to_pulse(self.scale.to_us(last.position));
        debug!(
            "curve loaded: {} points, {} us to {} us",
            curve.len(),
            self.first_position,
            self.last_position
        );
        self.curve = curve;
        self.source = source;
    }

    /// The loaded curve.
    #[must_use]
    pub const fn curve(&self) -> &Curve {
        &self.curve
    }

    /// Where the loaded curve came from; `None` before the first load or after
    /// [`set_curve`](Self::set_curve).
    #[must_use]
    pub const fn curve_source(&self) -> Option<CurveSource> {
        self.source
    }

    /// Time stretch of the loaded curve.
    #[must_use]
    pub const fn time_stretch(&self) -> u8 {
        self.time_stretch
    }

    /// Pulse width (µs) of the loaded curve's first point, in the direction current at load time.
    #[must_use]
    pub const fn first_curve_position(&self) -> u16 {
        self.first_position
    }

    /// Pulse width (µs) of the loaded curve's last point, in the direction current at load time.
    #[must_use]
    pub const fn last_curve_position(&self) -> u16 {
        self.last_position
    }

    // ------------------------------------------------------------------------
    // Motion
    // ------------------------------------------------------------------------

    /// Start moving along the loaded curve. Restarts a move that is in progress.
    ///
    /// The longer of the pulse and power pre-rolls sets the length of the `Start` phase; the
    /// shorter one starts correspondingly later. The first tick runs immediately.
    pub fn move_servo_along_curve(&mut self, direction: Direction) {
        self.scale.direction = direction;
        if self.power_on_before >= self.pulse_on_before {
            self.count_servo = self.power_on_before;
            self.count_pulse = self.power_on_before.saturating_sub(self.pulse_on_before);
            self.count_power = 0;
        } else {
            self.count_servo = self.pulse_on_before;
            self.count_pulse = 0;
            self.count_power = self.pulse_on_before.saturating_sub(self.power_on_before);
        }
        self.ticks = 0;
        self.index = 0;
        // Ticks before the first point's time hold its pulse.
        let first = self.curve.point_or_terminator(0);
        self.segment = Segment::new(first, first, self.time_stretch, self.scale);
        self.enter(MotionState::Start);
        self.start();
    }

    /// Advance by one tick if the servo has output its last value.
    ///
    /// Applies pending power and pulse switches, runs the current state, then waits for the next
    /// pulse. Does nothing between pulses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PowerPin`] if the power pin rejected a switch. The tick still runs.
    pub fn poll(&mut self) -> Result<()> {
        if !self.servo.accepts_new_value() {
            return Ok(());
        }
        let mut result = Ok(());
        if self.power_on_next {
            self.power_on_next = false;
            result = result.and(self.switch_power(true));
        }
        if self.power_off_next {
            self.power_off_next = false;
            result = result.and(self.switch_power(false));
        }
        if self.pulse_off_next {
            self.pulse_off_next = false;
            self.pulse_off();
        }
        match self.state {
            MotionState::Idle => {}
            MotionState::Start => self.start(),
            MotionState::Moving => self.moving(),
            MotionState::Finish => self.finish(),
        }
        self.servo.wait_till_next_pulse();
        result
    }

    /// Current motion state.
    #[must_use]
    pub const fn state(&self) -> MotionState {
        self.state
    }

    /// Whether a move is in progress.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        self.state != MotionState::Idle
    }

    /// Direction of the current or last move.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.scale.direction
    }

    /// The pulse output.
    #[must_use]
    pub const fn servo(&self) -> &C {
        &self.servo
    }

    /// The pulse output, for direct writes while idle.
    pub const fn servo_mut(&mut self) -> &mut C {
        &mut self.servo
    }

    /// Give back the pulse output and the power pin.
    pub fn into_parts(self) -> (C, Option<P>) {
        (self.servo, self.power.map(|power| power.pin))
    }

    fn start(&mut self) {
        if self.count_pulse > 0 {
            self.count_pulse -= 1;
        } else {
            let first = self.pulse_for(self.curve.point_or_terminator(0));
            self.servo.write_microseconds(first);
        }
        if self.count_power > 0 {
            self.count_power -= 1;
        } else if self.idle_power_off {
            self.power_on_next = true;
        }
        if self.count_servo > 0 {
            self.count_servo -= 1;
        } else {
            self.enter(MotionState::Moving);
            self.moving();
        }
    }

    fn moving(&mut self) {
        let point = self.curve.point_or_terminator(self.index);
        if u16::from(point.time) * u16::from(self.time_stretch) == self.ticks {
            self.index = self.index.saturating_add(1);
            self.segment = Segment::new(
                self.curve
                    .point_or_terminator(self.index.saturating_sub(1)),
                self.curve.point_or_terminator(self.index),
                self.time_stretch,
                self.scale,
            );
        }
        let pulse = to_pulse(self.segment.pulse_at(i32::from(self.ticks)));
        trace!("curve tick {}: {} us", self.ticks, pulse);
        self.servo.write_microseconds(pulse);
        self.ticks = self.ticks.wrapping_add(1);
        if self.index > 0 && self.curve.point_or_terminator(self.index).time == 0 {
            self.count_pulse = self.pulse_off_after;
            self.count_power = self.power_off_after;
            self.enter(MotionState::Finish);
            self.finish();
        }
    }

    fn finish(&mut self) {
        let to_idle = self.count_pulse == 0 && self.count_power == 0;
        if self.count_pulse > 0 {
            self.count_pulse -= 1;
        } else {
            self.pulse_off_next = true;
        }
        if self.count_power > 0 {
            self.count_power -= 1;
        } else if self.idle_power_off {
            self.power_off_next = true;
        }
        if to_idle {
            self.enter(MotionState::Idle);
        }
    }

    fn enter(&mut self, next: MotionState) {
        debug_assert!(
            next == MotionState::Start || next == self.state.successor(),
            "illegal motion transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!("motion state {} -> {}", self.state, next);
        self.state = next;
    }

    fn pulse_for(&self, point: CurvePoint) -> u16 {
        to_pulse(self.scale.to_us(point.position))
    }

    fn pulse_off(&mut self) {
        match self.idle_pulse {
            IdlePulse::Low => self.servo.constant_output(PinState::Low),
            IdlePulse::High => self.servo.constant_output(PinState::High),
            IdlePulse::Continuous => {}
        }
    }

    fn switch_power(&mut self, on: bool) -> Result<()> {
        let Some(power) = self.power.as_mut() else {
            return Ok(());
        };
        let level = if on { power.enable } else { !power.enable };
        power.pin.set_state(level).map_err(|_| {
            warn!("power-enable pin write failed");
            Error::PowerPin
        })
    }
}

fn to_pulse(us: i32) -> u16 {
    u16::try_from(us.max(0)).unwrap_or(u16::MAX)
}

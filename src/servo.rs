//! A device abstraction for hobby positional servos driven by a shared [`ServoTimer`].
//!
//! Each [`Servo`] is one of the three channels of its timer. Writes are published to the channel
//! table and reach the output pin on the channel's next slot in the refresh interval; poll
//! [`Servo::accepts_new_value`] to learn when that has happened.
//!
//! # Example
//!
//! ```rust,ignore
//! use embedded_hal::digital::PinState;
//! use moba_servo::servo::Servo;
//!
//! let mut servo = Servo::new(&TIMER);
//! servo.attach(PIN_PC0)?;
//! servo.write(90); // degrees
//!
//! loop {
//!     if servo.accepts_new_value() {
//!         servo.write_microseconds(next_pulse());
//!     }
//! }
//! ```

use embedded_hal::digital::PinState;

use crate::hal::TimerHardware;
use crate::servo_timer::{Channel, CompareUnitBinder, OUT_HIGH, ServoTimer};
use crate::{Error, Result};

/// Shortest pulse a servo accepts by default (µs). Smaller values given to [`Servo::write`] are
/// angles.
pub const MIN_PULSE_WIDTH_US: u16 = 544;

/// Longest pulse a servo accepts by default (µs).
pub const MAX_PULSE_WIDTH_US: u16 = 2_400;

/// Pulse a new channel starts with (µs).
pub const DEFAULT_PULSE_WIDTH_US: u16 = 1_500;

/// Raw channel index of a servo that could not get a channel.
pub const INVALID_SERVO: u8 = 255;

/// What a curve player needs from a servo output.
///
/// [`Servo`] is the implementation for real hardware; tests can substitute a recorder.
pub trait PulseChannel {
    /// Bind the channel to an output pin and start pulsing.
    ///
    /// # Errors
    ///
    /// See [`Servo::attach`].
    fn attach(&mut self, pin: u8) -> Result<u8>;

    /// Stop pulsing.
    fn detach(&mut self);

    /// Write an angle (below [`MIN_PULSE_WIDTH_US`]) or a pulse width in microseconds.
    fn write(&mut self, value: u16);

    /// Write a pulse width in microseconds.
    fn write_microseconds(&mut self, us: u16);

    /// Current pulse width as an angle.
    fn read(&self) -> i32;

    /// Current pulse width in microseconds.
    fn read_microseconds(&self) -> u16;

    /// Whether the channel takes part in the pulse rotation.
    fn attached(&self) -> bool;

    /// Whether the last written value has reached the output.
    fn accepts_new_value(&self) -> bool;

    /// Forget the current ready signal until the next pulse.
    fn wait_till_next_pulse(&mut self);

    /// Hold the output permanently high or low until the next write.
    fn constant_output(&mut self, level: PinState);
}

impl<C: PulseChannel + ?Sized> PulseChannel for &mut C {
    fn attach(&mut self, pin: u8) -> Result<u8> {
        (**self).attach(pin)
    }

    fn detach(&mut self) {
        (**self).detach();
    }

    fn write(&mut self, value: u16) {
        (**self).write(value);
    }

    fn write_microseconds(&mut self, us: u16) {
        (**self).write_microseconds(us);
    }

    fn read(&self) -> i32 {
        (**self).read()
    }

    fn read_microseconds(&self) -> u16 {
        (**self).read_microseconds()
    }

    fn attached(&self) -> bool {
        (**self).attached()
    }

    fn accepts_new_value(&self) -> bool {
        (**self).accepts_new_value()
    }

    fn wait_till_next_pulse(&mut self) {
        (**self).wait_till_next_pulse();
    }

    fn constant_output(&mut self, level: PinState) {
        (**self).constant_output(level);
    }
}

/// One servo output on a [`ServoTimer`].
///
/// At most three servos exist per timer. A fourth handle is permanently invalid: every operation
/// on it is a no-op, reads return 0 and [`attach`](Self::attach) returns
/// [`Error::ServoLimitReached`].
///
/// The usable pulse range defaults to [`MIN_PULSE_WIDTH_US`]..=[`MAX_PULSE_WIDTH_US`] and can be
/// narrowed or widened in 4 µs steps, by at most 508 µs per end, with
/// [`attach_with_limits`](Self::attach_with_limits).
pub struct Servo<'t, H, B> {
    timer: &'t ServoTimer<H, B>,
    index: Option<u8>,
    min_delta: i8,
    max_delta: i8,
}

impl<'t, H: TimerHardware, B: CompareUnitBinder> Servo<'t, H, B> {
    /// Claim the next free channel of `timer`, seeded with [`DEFAULT_PULSE_WIDTH_US`].
    ///
    /// Nothing is output until [`attach`](Self::attach).
    #[must_use]
    pub fn new(timer: &'t ServoTimer<H, B>) -> Self {
        let initial_ticks = timer.config().us_to_ticks(DEFAULT_PULSE_WIDTH_US);
        let index = timer.channels().allocate(initial_ticks);
        if index.is_none() {
            warn!("servo limit reached; new servo handle is invalid");
        }
        Self {
            timer,
            index,
            min_delta: 0,
            max_delta: 0,
        }
    }

    /// Channel index of this servo, or [`INVALID_SERVO`].
    #[must_use]
    pub fn index(&self) -> u8 {
        self.index.unwrap_or(INVALID_SERVO)
    }

    /// Whether this handle owns a channel.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.index.is_some()
    }

    fn channel(&self) -> Option<&'t Channel> {
        self.timer.channels().channel(self.index?)
    }

    /// Bind this servo to `pin` and start pulsing. Starts the timer on first use.
    ///
    /// Returns the channel index.
    ///
    /// # Errors
    ///
    /// - [`Error::ServoLimitReached`] if this handle has no channel.
    /// - [`Error::UnsupportedPin`] if no compare unit of the timer reaches `pin`.
    /// - [`Error::PortConflict`] if another servo of this timer already uses a different port.
    /// - [`Error::CompareUnitTaken`] if another servo already drives the pin's compare unit.
    /// - [`Error::UnsupportedPort`] if the timer's multiplexer cannot reach the pin's port.
    pub fn attach(&mut self, pin: u8) -> Result<u8> {
        let Some(index) = self.index else {
            warn!("attach on pin {} ignored: servo handle is invalid", pin);
            return Err(Error::ServoLimitReached);
        };
        self.timer.activate();
        match self.timer.bind(pin, index) {
            Ok(unit) => {
                if let Some(channel) = self.channel() {
                    channel.set_active(true);
                }
                info!("servo {} attached to pin {} (compare unit {})", index, pin, unit);
                Ok(index)
            }
            Err(error) => {
                warn!("servo {} attach to pin {} failed: {}", index, pin, error);
                Err(error)
            }
        }
    }

    /// [`attach`](Self::attach) with a custom pulse range.
    ///
    /// Each limit is stored as a signed offset of 4 µs steps from its default, saturating at
    /// ±127 steps.
    ///
    /// # Errors
    ///
    /// See [`attach`](Self::attach).
    pub fn attach_with_limits(&mut self, pin: u8, min_us: u16, max_us: u16) -> Result<u8> {
        self.min_delta = limit_delta(MIN_PULSE_WIDTH_US, min_us);
        self.max_delta = limit_delta(MAX_PULSE_WIDTH_US, max_us);
        self.attach(pin)
    }

    /// Shortest pulse this servo will emit (µs).
    #[must_use]
    pub fn min_us(&self) -> u16 {
        apply_delta(MIN_PULSE_WIDTH_US, self.min_delta)
    }

    /// Longest pulse this servo will emit (µs).
    #[must_use]
    pub fn max_us(&self) -> u16 {
        apply_delta(MAX_PULSE_WIDTH_US, self.max_delta)
    }

    /// Stop pulsing this servo. When no servo of the timer is left attached, the timer is handed
    /// back to the runtime.
    ///
    /// The pin stays bound to its compare unit; use [`constant_output`](Self::constant_output) for
    /// a defined idle level instead.
    pub fn detach(&mut self) {
        let Some(channel) = self.channel() else {
            return;
        };
        channel.set_active(false);
        if !self.timer.channels().any_active() {
            self.timer.relinquish();
        }
    }

    /// Write an angle in degrees (values below [`MIN_PULSE_WIDTH_US`], clamped to 180) or a pulse
    /// width in microseconds.
    pub fn write(&mut self, value: u16) {
        let us = if value < MIN_PULSE_WIDTH_US {
            let degrees = i32::from(value.min(180));
            let us = map(
                degrees,
                0,
                180,
                i32::from(self.min_us()),
                i32::from(self.max_us()),
            );
            u16::try_from(us).unwrap_or(MIN_PULSE_WIDTH_US)
        } else {
            value
        };
        self.write_microseconds(us);
    }

    /// Write a pulse width in microseconds, clamped to [`min_us`](Self::min_us)..=[`max_us`](Self::max_us).
    pub fn write_microseconds(&mut self, us: u16) {
        let (min_us, max_us) = (self.min_us(), self.max_us());
        let Some(channel) = self.channel() else {
            return;
        };
        let us = us.clamp(min_us, max_us.max(min_us));
        channel.set_ticks(self.timer.config().us_to_ticks(us));
    }

    /// Current pulse width as an angle between the servo's limits. 0 for an invalid handle.
    #[must_use]
    pub fn read(&self) -> i32 {
        if !self.is_valid() {
            return 0;
        }
        map(
            i32::from(self.read_microseconds()) + 1,
            i32::from(self.min_us()),
            i32::from(self.max_us()),
            0,
            180,
        )
    }

    /// Current pulse width in microseconds. 0 for an invalid handle.
    #[must_use]
    pub fn read_microseconds(&self) -> u16 {
        self.channel()
            .map_or(0, |channel| self.timer.config().ticks_to_us(channel.ticks()))
    }

    /// Whether this servo takes part in the pulse rotation.
    #[must_use]
    pub fn attached(&self) -> bool {
        self.channel().is_some_and(Channel::is_active)
    }

    /// Whether the interrupt handler has latched the last written value. Writing before this
    /// returns `true` replaces a value that was never output.
    #[must_use]
    pub fn accepts_new_value(&self) -> bool {
        self.channel().is_some_and(Channel::is_ready)
    }

    /// Clear the ready signal; [`accepts_new_value`](Self::accepts_new_value) turns `true` again
    /// after the next pulse.
    pub fn wait_till_next_pulse(&mut self) {
        if let Some(channel) = self.channel() {
            channel.clear_ready();
        }
    }

    /// Hold the output permanently low or high until the next write.
    ///
    /// Useful as a soft idle state: some servos hold position without pulses, others need the
    /// line held high.
    pub fn constant_output(&mut self, level: PinState) {
        if let Some(channel) = self.channel() {
            channel.set_ticks(match level {
                PinState::Low => 0,
                PinState::High => OUT_HIGH,
            });
        }
    }
}

impl<H: TimerHardware, B: CompareUnitBinder> PulseChannel for Servo<'_, H, B> {
    fn attach(&mut self, pin: u8) -> Result<u8> {
        Self::attach(self, pin)
    }

    fn detach(&mut self) {
        Self::detach(self);
    }

    fn write(&mut self, value: u16) {
        Self::write(self, value);
    }

    fn write_microseconds(&mut self, us: u16) {
        Self::write_microseconds(self, us);
    }

    fn read(&self) -> i32 {
        Self::read(self)
    }

    fn read_microseconds(&self) -> u16 {
        Self::read_microseconds(self)
    }

    fn attached(&self) -> bool {
        Self::attached(self)
    }

    fn accepts_new_value(&self) -> bool {
        Self::accepts_new_value(self)
    }

    fn wait_till_next_pulse(&mut self) {
        Self::wait_till_next_pulse(self);
    }

    fn constant_output(&mut self, level: PinState) {
        Self::constant_output(self, level);
    }
}

/// Offset of `given` from `default` in 4 µs steps, saturating at ±127.
fn limit_delta(default: u16, given: u16) -> i8 {
    let delta = (i32::from(default) - i32::from(given)) / 4;
    match i8::try_from(delta) {
        Ok(delta) if delta != i8::MIN => delta,
        _ if default > given => i8::MAX,
        _ => -i8::MAX,
    }
}

fn apply_delta(default: u16, delta: i8) -> u16 {
    let us = i32::from(default) - i32::from(delta) * 4;
    u16::try_from(us).unwrap_or(default)
}

/// Re-map `value` from one range onto another, truncating toward zero.
fn map(value: i32, in_min: i32, in_max: i32, out_min: i32, out_max: i32) -> i32 {
    let in_span = in_max - in_min;
    if in_span == 0 {
        return out_min;
    }
    (value - in_min) * (out_max - out_min) / in_span + out_min
}

//! Jitter-free pulses for up to three hobby servos on one 16-bit timer, plus curve-driven motion for
//! model-railway accessories (turnouts, semaphore signals, barriers).
//!
//! - [`servo_timer`]: the shared timer, its channel table and the overflow interrupt.
//! - [`servo`]: [`Servo`](servo::Servo) handles with the familiar `attach`/`write`/`read` API.
//! - [`curve`] and [`curve_player`]: motion along `(time, position)` curves, with power and pulse
//!   switching around each move.
//! - [`hal`]: the small hardware trait a timer implementation provides.
//!
//! # Glossary
//!
//! - **Tick:** one timer count. Its length depends on the CPU clock and the prescaler.
//! - **Refresh interval:** the ~20 ms period in which every attached servo receives one pulse.
//! - **Compare unit:** the part of the timer that ends a pulse when the count reaches a programmed
//!   value. The timer has three; each servo uses one.
//! - **Curve:** an ordered, terminated list of `(time, position)` points describing a motion.
//! - **Segment:** the straight line between two neighbouring curve points.
//! - **Time stretch:** a factor applied to every curve time to slow a motion down.
//! - **Threshold 1/2:** the pulse widths (µs) that curve positions 0 and 255 map onto.
#![cfg_attr(not(any(test, feature = "host")), no_std)]

mod fmt;

mod error;
pub mod hal;
pub mod servo_timer;
#[cfg(any(test, feature = "host"))]
pub mod servo_timer_host;
pub mod servo;
pub mod curve;
pub mod curve_player;

// Re-export error types and result (used throughout)
pub use crate::error::{Error, Result};

pub use crate::curve::MAX_CURVE_POINTS;
pub use crate::servo::{
    DEFAULT_PULSE_WIDTH_US, INVALID_SERVO, MAX_PULSE_WIDTH_US, MIN_PULSE_WIDTH_US,
};
pub use crate::servo_timer::{OUT_HIGH, REFRESH_INTERVAL_US, SERVOS_PER_TIMER};

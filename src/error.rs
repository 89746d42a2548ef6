//! Crate-wide error type.

use derive_more::{Display, Error};

use crate::hal::{CompareUnit, Port};

/// Result alias used throughout this crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Reasons a servo could not be bound or driven.
///
/// Out-of-range pulse widths, angles and limits are never errors; they are clamped.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// More servo handles were created than the timer has compare units.
    ///
    /// The handle that reports this stays invalid for its whole lifetime.
    #[display("all {} servo channels of this timer are taken", crate::SERVOS_PER_TIMER)]
    ServoLimitReached,
    /// The pin has no compare-unit output on this timer.
    #[display("pin {pin} has no compare-unit output")]
    UnsupportedPin {
        /// Pin that was requested.
        pin: u8,
    },
    /// The multiplexer cannot route the timer to this port.
    #[display("the timer cannot be routed to port {port}")]
    UnsupportedPort {
        /// Port that was requested.
        port: Port,
    },
    /// All servo pins of one timer must share a port.
    #[display("pin {pin} is on port {requested}, but this timer is routed to port {bound}")]
    PortConflict {
        /// Pin that was requested.
        pin: u8,
        /// Port committed by the first successful attach.
        bound: Port,
        /// Port the requested pin belongs to.
        requested: Port,
    },
    /// Another channel already drives this compare unit.
    #[display("compare unit {unit} is already bound to another servo")]
    CompareUnitTaken {
        /// Compare unit that is in use.
        unit: CompareUnit,
    },
    /// The CPU clock is not one the tick conversion supports.
    #[display("unsupported CPU clock {cpu_hz} Hz")]
    UnsupportedClock {
        /// Clock that was requested.
        cpu_hz: u32,
    },
    /// The power-enable output rejected a write.
    #[display("power-enable pin write failed")]
    PowerPin,
}

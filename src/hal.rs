//! Hardware seam between this crate and a concrete timer/counter peripheral.
//!
//! One [`TimerHardware`] implementation exists per timer instance (for example TCA0 or TCA1 on an
//! AVR Dx part). It only moves bits into registers; every decision about which compare unit is
//! current, which pin may be used, or which pulse width to emit is made by
//! [`ServoTimer`](crate::servo_timer::ServoTimer).

use derive_more::Display;

/// One of the three compare units of the shared timer.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompareUnit {
    /// Compare unit 0 (waveform output WO0).
    #[display("0")]
    Unit0,
    /// Compare unit 1 (waveform output WO1).
    #[display("1")]
    Unit1,
    /// Compare unit 2 (waveform output WO2).
    #[display("2")]
    Unit2,
}

impl CompareUnit {
    /// All compare units, in rotation order.
    pub const ALL: [Self; 3] = [Self::Unit0, Self::Unit1, Self::Unit2];

    /// Zero-based index of this compare unit.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Unit0 => 0,
            Self::Unit1 => 1,
            Self::Unit2 => 2,
        }
    }

    /// Compare unit for a zero-based index, if it exists.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Unit0),
            1 => Some(Self::Unit1),
            2 => Some(Self::Unit2),
            _ => None,
        }
    }

    /// The unit that follows this one in the interrupt rotation (0 → 1 → 2 → 0).
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Unit0 => Self::Unit1,
            Self::Unit1 => Self::Unit2,
            Self::Unit2 => Self::Unit0,
        }
    }
}

/// An I/O port, as seen by the timer's output multiplexer.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs, reason = "port letters are self-describing")]
pub enum Port {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

/// Where a pin lives: its port and its bit position within that port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinLocation {
    /// Port the pin belongs to.
    pub port: Port,
    /// Bit position within the port (`Px3` is bit 3).
    pub bit: u8,
}

impl PinLocation {
    /// Create a pin location.
    #[must_use]
    pub const fn new(port: Port, bit: u8) -> Self {
        Self { port, bit }
    }
}

/// How a compare unit reaches a pin.
///
/// `alternate` selects the secondary pin of a compare unit on parts whose multiplexer routes
/// per unit instead of per port (tinyAVR). Parts that route per port ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CompareRoute {
    /// Compare unit that drives the pin.
    pub unit: CompareUnit,
    /// Use the unit's alternate output pin.
    pub alternate: bool,
}

impl CompareRoute {
    /// Route through the unit's default output pin.
    #[must_use]
    pub const fn default_pin(unit: CompareUnit) -> Self {
        Self {
            unit,
            alternate: false,
        }
    }

    /// Route through the unit's alternate output pin.
    #[must_use]
    pub const fn alternate_pin(unit: CompareUnit) -> Self {
        Self {
            unit,
            alternate: true,
        }
    }
}

/// Timer clock prescaler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs, reason = "divider names are self-describing")]
pub enum Prescaler {
    Div1,
    Div2,
    Div4,
    Div8,
}

impl Prescaler {
    /// Divider applied to the CPU clock.
    #[must_use]
    pub const fn divider(self) -> u32 {
        match self {
            Self::Div1 => 1,
            Self::Div2 => 2,
            Self::Div4 => 4,
            Self::Div8 => 8,
        }
    }

    /// Prescaler for a CPU clock: higher clocks get larger dividers so that one timer tick stays
    /// a whole fraction of a microsecond (1 to 9 ticks per µs).
    #[must_use]
    pub const fn for_clock(cpu_hz: u32) -> Self {
        if cpu_hz > 36_000_000 {
            Self::Div8
        } else if cpu_hz > 16_000_000 {
            Self::Div4
        } else if cpu_hz > 8_000_000 {
            Self::Div2
        } else {
            Self::Div1
        }
    }
}

/// Register-level access to one 16-bit timer with three compare units, plus the pin operations
/// needed to route its outputs.
///
/// Implementations must be usable from interrupt context: every method is short and
/// non-blocking.
pub trait TimerHardware {
    /// Take the timer away from whatever the runtime uses it for (e.g. `millis()` or `analogWrite`).
    fn take_over(&mut self);

    /// Hand the timer back to the runtime.
    fn resume(&mut self);

    /// Set the prescaler, single-slope waveform mode and period, then start counting.
    fn configure(&mut self, prescaler: Prescaler, period_ticks: u16);

    /// Enable or disable the overflow interrupt.
    fn set_overflow_interrupt(&mut self, enabled: bool);

    /// Acknowledge a pending overflow interrupt.
    fn clear_overflow_flag(&mut self);

    /// Value currently latched in a compare register.
    fn compare(&self, unit: CompareUnit) -> u16;

    /// Write a compare buffer register; it is latched at the next overflow.
    fn set_compare_buffer(&mut self, unit: CompareUnit, ticks: u16);

    /// Connect a compare unit to its waveform output.
    fn enable_compare_output(&mut self, unit: CompareUnit);

    /// Port and bit position of a pin, or `None` if the pin does not exist.
    fn pin_location(&self, pin: u8) -> Option<PinLocation>;

    /// Point the output multiplexer at a port (and alternate pin where supported).
    ///
    /// Returns `false` if the multiplexer cannot reach that port.
    fn route_output(&mut self, port: Port, route: CompareRoute) -> bool;

    /// Make a pin a digital output.
    fn set_pin_output(&mut self, pin: u8);
}

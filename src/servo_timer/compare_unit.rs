//! Binding servo pins to compare units.
//!
//! Which pin a compare unit can drive differs per timer and per chip family. A
//! [`CompareUnitBinder`] captures that difference; [`ServoTimer`] applies the rules every family
//! shares (one port per timer, one channel per compare unit).

use crate::hal::{CompareRoute, CompareUnit, PinLocation, Port, TimerHardware};
use crate::{Error, Result};

use super::ServoTimer;
use CompareUnit::{Unit0, Unit1, Unit2};

/// Maps a pin location to the compare unit (and output route) that drives it.
pub trait CompareUnitBinder {
    /// Route for a pin, or `None` if no compare unit of this timer reaches it.
    fn route(&self, location: PinLocation) -> Option<CompareRoute>;
}

/// Bit 0, 1 and 2 of any port drive compare unit 0, 1 and 2.
///
/// This is TCA0 on AVR Dx parts, where the multiplexer moves all three outputs to a port at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitPositionBinder;

impl CompareUnitBinder for BitPositionBinder {
    fn route(&self, location: PinLocation) -> Option<CompareRoute> {
        CompareUnit::from_index(usize::from(location.bit)).map(CompareRoute::default_pin)
    }
}

/// One row of a [`PinTableBinder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinTableEntry {
    /// Pin the row applies to.
    pub location: PinLocation,
    /// How the timer reaches it.
    pub route: CompareRoute,
}

impl PinTableEntry {
    const fn new(port: Port, bit: u8, unit: CompareUnit, alternate: bool) -> Self {
        Self {
            location: PinLocation::new(port, bit),
            route: CompareRoute { unit, alternate },
        }
    }
}

/// A fixed table of the pins a timer can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinTableBinder {
    entries: &'static [PinTableEntry],
}

impl PinTableBinder {
    /// Binder over a static pin table such as [`TCA1_DX`].
    #[must_use]
    pub const fn new(entries: &'static [PinTableEntry]) -> Self {
        Self { entries }
    }

    /// The table rows.
    #[must_use]
    pub const fn entries(&self) -> &'static [PinTableEntry] {
        self.entries
    }
}

impl CompareUnitBinder for PinTableBinder {
    fn route(&self, location: PinLocation) -> Option<CompareRoute> {
        self.entries
            .iter()
            .find(|entry| entry.location == location)
            .map(|entry| entry.route)
    }
}

/// TCA1 on AVR DA/DB parts with up to 48 pins: PB0-PB2 or PC4-PC6.
pub const TCA1_DX: &[PinTableEntry] = &[
    PinTableEntry::new(Port::B, 0, Unit0, false),
    PinTableEntry::new(Port::B, 1, Unit1, false),
    PinTableEntry::new(Port::B, 2, Unit2, false),
    PinTableEntry::new(Port::C, 4, Unit0, false),
    PinTableEntry::new(Port::C, 5, Unit1, false),
    PinTableEntry::new(Port::C, 6, Unit2, false),
];

/// TCA1 on 64-pin AVR DA/DB parts: [`TCA1_DX`] plus PE4-PE6 and PG0-PG2.
pub const TCA1_DX_64PIN: &[PinTableEntry] = &[
    PinTableEntry::new(Port::B, 0, Unit0, false),
    PinTableEntry::new(Port::B, 1, Unit1, false),
    PinTableEntry::new(Port::B, 2, Unit2, false),
    PinTableEntry::new(Port::C, 4, Unit0, false),
    PinTableEntry::new(Port::C, 5, Unit1, false),
    PinTableEntry::new(Port::C, 6, Unit2, false),
    PinTableEntry::new(Port::E, 4, Unit0, false),
    PinTableEntry::new(Port::E, 5, Unit1, false),
    PinTableEntry::new(Port::E, 6, Unit2, false),
    PinTableEntry::new(Port::G, 0, Unit0, false),
    PinTableEntry::new(Port::G, 1, Unit1, false),
    PinTableEntry::new(Port::G, 2, Unit2, false),
];

/// TCA0 on tinyAVR 0/1/2 parts with 14 or more pins. PB0-PB2 are the default outputs and
/// PB3-PB5 the alternates; the multiplexer switches each unit separately.
pub const TCA0_TINY: &[PinTableEntry] = &[
    PinTableEntry::new(Port::B, 0, Unit0, false),
    PinTableEntry::new(Port::B, 1, Unit1, false),
    PinTableEntry::new(Port::B, 2, Unit2, false),
    PinTableEntry::new(Port::B, 3, Unit0, true),
    PinTableEntry::new(Port::B, 4, Unit1, true),
    PinTableEntry::new(Port::B, 5, Unit2, true),
];

/// TCA0 on 8-pin tinyAVR parts: PA3 (alternate PA7), PA1 and PA2.
pub const TCA0_TINY_8PIN: &[PinTableEntry] = &[
    PinTableEntry::new(Port::A, 3, Unit0, false),
    PinTableEntry::new(Port::A, 7, Unit0, true),
    PinTableEntry::new(Port::A, 1, Unit1, false),
    PinTableEntry::new(Port::A, 2, Unit2, false),
];

impl<H: TimerHardware, B: CompareUnitBinder> ServoTimer<H, B> {
    /// Bind `pin` to a compare unit for channel `index` and make it an output.
    ///
    /// The first successful bind commits the timer to the pin's port. Re-binding a channel to a
    /// new pin releases its old compare unit.
    pub(crate) fn bind(&self, pin: u8, index: u8) -> Result<CompareUnit> {
        let channels = &self.channels;
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            let location = state
                .hardware
                .pin_location(pin)
                .ok_or(Error::UnsupportedPin { pin })?;
            if let Some(bound) = state.bound_port
                && bound != location.port
            {
                return Err(Error::PortConflict {
                    pin,
                    bound,
                    requested: location.port,
                });
            }
            let route = state
                .binder
                .route(location)
                .ok_or(Error::UnsupportedPin { pin })?;
            if channels.owner(route.unit).is_some_and(|owner| owner != index) {
                return Err(Error::CompareUnitTaken { unit: route.unit });
            }
            if !state.hardware.route_output(location.port, route) {
                return Err(Error::UnsupportedPort {
                    port: location.port,
                });
            }
            channels.bind(index, route.unit);
            state.hardware.enable_compare_output(route.unit);
            state.hardware.set_pin_output(pin);
            state.bound_port = Some(location.port);
            Ok(route.unit)
        })
    }
}

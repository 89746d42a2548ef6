//! A simulated timer peripheral for running servo code on the host.
//!
//! [`HostTimer`] implements [`TimerHardware`] by recording every register write. Pins are numbered
//! `port * 8 + bit` (PA0 is 0, PB0 is 8, ..., PG7 is 55); see [`HostTimer::pin`].
//!
//! [`ServoTimer::simulate_overflow`] plays the part of the hardware: it latches the compare
//! buffers, raises the overflow flag and runs the interrupt handler.

use crate::hal::{CompareRoute, CompareUnit, PinLocation, Port, Prescaler, TimerHardware};
use crate::servo_timer::{CompareUnitBinder, ServoTimer};

const PORTS: [Port; 7] = [
    Port::A,
    Port::B,
    Port::C,
    Port::D,
    Port::E,
    Port::F,
    Port::G,
];

/// Recorded state of a simulated timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTimer {
    /// `take_over` calls so far.
    pub take_over_calls: u32,
    /// `resume` calls so far.
    pub resume_calls: u32,
    /// Last prescaler and period passed to `configure`.
    pub configuration: Option<(Prescaler, u16)>,
    /// Overflow interrupt enable.
    pub interrupt_enabled: bool,
    /// Overflow flag; set by [`ServoTimer::simulate_overflow`], cleared by the handler.
    pub overflow_flag: bool,
    /// Latched compare registers.
    pub compare: [u16; 3],
    /// Compare buffer registers.
    pub compare_buffer: [u16; 3],
    /// Compare units connected to their waveform output.
    pub outputs_enabled: [bool; 3],
    /// Every `route_output` request that succeeded, most recent last.
    pub routes: heapless::Vec<(Port, CompareRoute), 8>,
    /// Pins switched to output mode, most recent last.
    pub output_pins: heapless::Vec<u8, 8>,
    reachable_ports: heapless::Vec<Port, 7>,
}

impl Default for HostTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl HostTimer {
    /// A simulated timer whose multiplexer reaches every port.
    #[must_use]
    pub fn new() -> Self {
        Self::with_reachable_ports(&PORTS)
    }

    /// A simulated timer whose multiplexer only reaches `ports`.
    #[must_use]
    pub fn with_reachable_ports(ports: &[Port]) -> Self {
        Self {
            take_over_calls: 0,
            resume_calls: 0,
            configuration: None,
            interrupt_enabled: false,
            overflow_flag: false,
            compare: [0; 3],
            compare_buffer: [0; 3],
            outputs_enabled: [false; 3],
            routes: heapless::Vec::new(),
            output_pins: heapless::Vec::new(),
            reachable_ports: ports.iter().copied().take(PORTS.len()).collect(),
        }
    }

    /// Pin number of `P<port><bit>` in this simulation.
    #[must_use]
    pub const fn pin(port: Port, bit: u8) -> u8 {
        (port as u8) * 8 + bit
    }

    /// Latched compare value of `unit`.
    #[must_use]
    pub fn compare_of(&self, unit: CompareUnit) -> u16 {
        self.compare.get(unit.index()).copied().unwrap_or(0)
    }

    /// Copy the compare buffers into the compare registers, as the timer does at each overflow.
    pub fn latch(&mut self) {
        self.compare = self.compare_buffer;
    }
}

impl TimerHardware for HostTimer {
    fn take_over(&mut self) {
        self.take_over_calls = self.take_over_calls.saturating_add(1);
    }

    fn resume(&mut self) {
        self.resume_calls = self.resume_calls.saturating_add(1);
    }

    fn configure(&mut self, prescaler: Prescaler, period_ticks: u16) {
        self.configuration = Some((prescaler, period_ticks));
    }

    fn set_overflow_interrupt(&mut self, enabled: bool) {
        self.interrupt_enabled = enabled;
    }

    fn clear_overflow_flag(&mut self) {
        self.overflow_flag = false;
    }

    fn compare(&self, unit: CompareUnit) -> u16 {
        self.compare_of(unit)
    }

    fn set_compare_buffer(&mut self, unit: CompareUnit, ticks: u16) {
        if let Some(buffer) = self.compare_buffer.get_mut(unit.index()) {
            *buffer = ticks;
        }
    }

    fn enable_compare_output(&mut self, unit: CompareUnit) {
        if let Some(enabled) = self.outputs_enabled.get_mut(unit.index()) {
            *enabled = true;
        }
    }

    fn pin_location(&self, pin: u8) -> Option<PinLocation> {
        let port = *PORTS.get(usize::from(pin / 8))?;
        Some(PinLocation::new(port, pin % 8))
    }

    fn route_output(&mut self, port: Port, route: CompareRoute) -> bool {
        if !self.reachable_ports.contains(&port) {
            return false;
        }
        if self.routes.is_full() {
            self.routes.remove(0);
        }
        self.routes.push((port, route)).is_ok()
    }

    fn set_pin_output(&mut self, pin: u8) {
        if self.output_pins.is_full() {
            self.output_pins.remove(0);
        }
        let _ = self.output_pins.push(pin);
    }
}

impl<B: CompareUnitBinder> ServoTimer<HostTimer, B> {
    /// Run one timer overflow: latch the compare buffers, then run the interrupt handler if it
    /// is enabled.
    pub fn simulate_overflow(&self) {
        let enabled = self.with_hardware(|hardware| {
            hardware.latch();
            hardware.overflow_flag = true;
            hardware.interrupt_enabled
        });
        if enabled {
            self.on_overflow();
        }
    }

    /// Run the three overflows of one refresh interval.
    pub fn simulate_refresh_interval(&self) {
        for _ in 0..3 {
            self.simulate_overflow();
        }
    }
}

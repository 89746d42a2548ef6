//! One shared 16-bit timer that produces pulses for up to three servos.
//!
//! A [`ServoTimer`] owns the timer peripheral (through a [`TimerHardware`] implementation), the
//! table of servo channels, and the binding of pins to compare units. It is meant to live in a
//! `static` so that both the foreground loop and the overflow interrupt can reach it.
//!
//! The timer overflows every [`REFRESH_INTERVAL_US`]` / 3` µs. Each overflow hands the pulse to the
//! next compare unit in turn, so every servo sees exactly one pulse per refresh interval and the
//! three pulses never overlap.
//!
//! # Example
//!
//! ```rust,ignore
//! use moba_servo::servo_timer::{ServoTimer, TimerConfig, BitPositionBinder};
//!
//! static TIMER: ServoTimer<Tca0, BitPositionBinder> =
//!     ServoTimer::new(Tca0::new(), BitPositionBinder, TimerConfig::new(24_000_000));
//!
//! // In the TCA0 overflow vector:
//! fn tca0_ovf() {
//!     TIMER.on_overflow();
//! }
//! ```

mod channel_table;
mod compare_unit;

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use portable_atomic::{AtomicU8, Ordering};

pub(crate) use channel_table::{Channel, ChannelTable};
pub use compare_unit::{
    BitPositionBinder, CompareUnitBinder, PinTableBinder, PinTableEntry, TCA0_TINY, TCA0_TINY_8PIN,
    TCA1_DX, TCA1_DX_64PIN,
};

use crate::hal::{CompareUnit, Port, Prescaler, TimerHardware};
use crate::{Error, Result};

/// Servos driven by one timer: one per compare unit.
pub const SERVOS_PER_TIMER: usize = 3;

/// Length of one refresh interval (µs). Every attached servo gets one pulse per interval.
pub const REFRESH_INTERVAL_US: u16 = 19_999;

/// Compare value that keeps an output permanently high.
pub const OUT_HIGH: u16 = u16::MAX;

/// CPU clocks (MHz) for which ticks convert exactly to whole microseconds.
pub const SUPPORTED_CLOCKS_MHZ: [u32; 14] = [1, 4, 5, 8, 10, 12, 16, 20, 24, 28, 32, 36, 40, 48];

// ============================================================================
// Configuration
// ============================================================================

/// Clock configuration of a servo timer.
///
/// The prescaler is chosen so that one microsecond is a whole number of ticks (1 to 9), which
/// keeps [`us_to_ticks`](Self::us_to_ticks) exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerConfig {
    cpu_hz: u32,
    prescaler: Prescaler,
    ticks_per_us: u32,
}

impl TimerConfig {
    /// Configuration for a CPU clock in Hz.
    ///
    /// # Panics
    ///
    /// Panics if the clock is not one of [`SUPPORTED_CLOCKS_MHZ`]. In a `static` initializer this
    /// is a compile-time error.
    #[must_use]
    pub const fn new(cpu_hz: u32) -> Self {
        match Self::try_new(cpu_hz) {
            Ok(config) => config,
            Err(_) => panic!("unsupported CPU clock for servo timer"),
        }
    }

    /// Configuration for a CPU clock in Hz.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedClock`] if the clock is not one of [`SUPPORTED_CLOCKS_MHZ`].
    pub const fn try_new(cpu_hz: u32) -> Result<Self> {
        if cpu_hz % 1_000_000 != 0 || !is_supported_mhz(cpu_hz / 1_000_000) {
            return Err(Error::UnsupportedClock { cpu_hz });
        }
        let prescaler = Prescaler::for_clock(cpu_hz);
        Ok(Self {
            cpu_hz,
            prescaler,
            ticks_per_us: cpu_hz / 1_000_000 / prescaler.divider(),
        })
    }

    /// CPU clock in Hz.
    #[must_use]
    pub const fn cpu_hz(&self) -> u32 {
        self.cpu_hz
    }

    /// Prescaler applied to the CPU clock.
    #[must_use]
    pub const fn prescaler(&self) -> Prescaler {
        self.prescaler
    }

    /// Timer ticks per microsecond.
    #[must_use]
    pub const fn ticks_per_us(&self) -> u32 {
        self.ticks_per_us
    }

    /// Convert microseconds to timer ticks, saturating at `u16::MAX`.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "checked against u16::MAX")]
    pub const fn us_to_ticks(&self, us: u16) -> u16 {
        let ticks = (us as u32).saturating_mul(self.ticks_per_us);
        if ticks > u16::MAX as u32 {
            u16::MAX
        } else {
            ticks as u16
        }
    }

    /// Convert timer ticks to microseconds, truncating.
    ///
    /// Converting back and forth loses at most one microsecond's worth of ticks.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "quotient never exceeds the u16 input")]
    pub const fn ticks_to_us(&self, ticks: u16) -> u16 {
        (ticks as u32 / self.ticks_per_us) as u16
    }

    /// Timer period, so that three overflows span one refresh interval.
    #[must_use]
    #[expect(clippy::cast_possible_truncation, reason = "SERVOS_PER_TIMER is 3")]
    pub const fn period_ticks(&self) -> u16 {
        self.us_to_ticks(REFRESH_INTERVAL_US / SERVOS_PER_TIMER as u16)
    }
}

const fn is_supported_mhz(mhz: u32) -> bool {
    let mut index = 0;
    while index < SUPPORTED_CLOCKS_MHZ.len() {
        if SUPPORTED_CLOCKS_MHZ[index] == mhz {
            return true;
        }
        index += 1;
    }
    false
}

// ============================================================================
// Timer context
// ============================================================================

/// Foreground-owned state. The interrupt only touches `hardware`.
struct TimerState<H, B> {
    hardware: H,
    binder: B,
    bound_port: Option<Port>,
    running: bool,
}

/// The process-wide context for one servo timer: hardware, channel table and pin bindings.
///
/// Create it in a `static`, hand `&'static` references to [`Servo`](crate::servo::Servo) handles,
/// and call [`on_overflow`](Self::on_overflow) from the timer's overflow interrupt.
pub struct ServoTimer<H, B> {
    config: TimerConfig,
    channels: ChannelTable,
    current_unit: AtomicU8,
    state: Mutex<CriticalSectionRawMutex, RefCell<TimerState<H, B>>>,
}

impl<H: TimerHardware, B: CompareUnitBinder> ServoTimer<H, B> {
    /// Create an inactive servo timer. Nothing touches the hardware until the first attach.
    #[must_use]
    pub const fn new(hardware: H, binder: B, config: TimerConfig) -> Self {
        Self {
            config,
            channels: ChannelTable::new(),
            current_unit: AtomicU8::new(0),
            state: Mutex::new(RefCell::new(TimerState {
                hardware,
                binder,
                bound_port: None,
                running: false,
            })),
        }
    }

    /// Clock configuration of this timer.
    #[must_use]
    pub const fn config(&self) -> &TimerConfig {
        &self.config
    }

    /// Take the timer over and start the overflow interrupt. Does nothing if already running.
    pub fn activate(&self) {
        let started = self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if state.running {
                return false;
            }
            state.hardware.take_over();
            state
                .hardware
                .configure(self.config.prescaler, self.config.period_ticks());
            state.hardware.set_overflow_interrupt(true);
            state.running = true;
            true
        });
        if started {
            info!(
                "servo timer started: prescaler /{}, period {} ticks",
                self.config.prescaler.divider(),
                self.config.period_ticks()
            );
        }
    }

    /// Stop the overflow interrupt and hand the timer back to the runtime. Does nothing if the
    /// timer is not running.
    ///
    /// [`Servo::detach`](crate::servo::Servo::detach) calls this once the last channel goes
    /// inactive. A later attach starts the timer again.
    pub fn relinquish(&self) {
        let stopped = self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if !state.running {
                return false;
            }
            state.hardware.set_overflow_interrupt(false);
            state.hardware.resume();
            state.running = false;
            true
        });
        if stopped {
            info!("servo timer relinquished");
        }
    }

    /// Whether the overflow interrupt is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock(|state| state.borrow().running)
    }

    /// Port all servo pins of this timer are routed to, once the first pin is bound.
    #[must_use]
    pub fn bound_port(&self) -> Option<Port> {
        self.state.lock(|state| state.borrow().bound_port)
    }

    /// Compare unit the channel `index` drives, if bound.
    #[must_use]
    pub fn compare_unit_of(&self, index: u8) -> Option<CompareUnit> {
        self.channels.channel(index)?.compare_unit()
    }

    /// Channel that drives compare unit `unit`, if any.
    #[must_use]
    pub fn channel_of(&self, unit: CompareUnit) -> Option<u8> {
        self.channels.owner(unit)
    }

    /// Number of servo handles created on this timer (at most [`SERVOS_PER_TIMER`]).
    #[must_use]
    pub fn servo_count(&self) -> u8 {
        self.channels.allocated()
    }

    /// Compare unit programmed by the most recent overflow.
    #[must_use]
    pub fn current_unit(&self) -> CompareUnit {
        CompareUnit::from_index(usize::from(self.current_unit.load(Ordering::SeqCst)))
            .unwrap_or(CompareUnit::Unit0)
    }

    /// Run `f` with exclusive access to the timer hardware.
    pub fn with_hardware<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        self.state.lock(|state| f(&mut state.borrow_mut().hardware))
    }

    /// Overflow interrupt handler. Call it from the timer's overflow vector.
    ///
    /// Advances the rotation by one compare unit, loads that unit's compare buffer with its
    /// channel's pulse width (0 if the channel is inactive or the unit unbound), silences the other
    /// two units unless they are held high, and flags the channel as ready for a new value.
    /// Runs in constant time and never logs.
    pub fn on_overflow(&self) {
        let unit = self.current_unit().next();
        let (owner, ticks) = self.channels.ticks_for(unit);
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            let hardware = &mut state.hardware;
            hardware.clear_overflow_flag();
            for other in CompareUnit::ALL {
                if other == unit {
                    hardware.set_compare_buffer(unit, ticks);
                } else if hardware.compare(other) != OUT_HIGH {
                    hardware.set_compare_buffer(other, 0);
                }
            }
        });
        if let Some(index) = owner {
            self.channels.mark_ready(index);
        }
        #[expect(clippy::cast_possible_truncation, reason = "compare unit index is 0..=2")]
        self.current_unit
            .store(unit.index() as u8, Ordering::SeqCst);
    }

    pub(crate) const fn channels(&self) -> &ChannelTable {
        &self.channels
    }
}

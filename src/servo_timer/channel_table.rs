//! The channel table shared between servo handles and the overflow interrupt.
//!
//! Every field has exactly one writer context:
//!
//! | field          | written by                 | read by            |
//! |----------------|----------------------------|--------------------|
//! | `ticks`        | foreground                 | interrupt          |
//! | `active`       | foreground                 | interrupt          |
//! | `compare_unit` | foreground (attach)        | foreground         |
//! | `ready`        | interrupt (set), foreground (clear) | foreground |
//!
//! so plain atomics are enough; no lock is held while the interrupt reads them.

use portable_atomic::{AtomicBool, AtomicU8, AtomicU16, Ordering};

use crate::SERVOS_PER_TIMER;
use crate::hal::CompareUnit;

const UNBOUND: u8 = u8::MAX;

/// One servo slot.
pub(crate) struct Channel {
    compare_unit: AtomicU8,
    ticks: AtomicU16,
    ready: AtomicBool,
    active: AtomicBool,
}

impl Channel {
    const fn new() -> Self {
        Self {
            compare_unit: AtomicU8::new(UNBOUND),
            ticks: AtomicU16::new(0),
            ready: AtomicBool::new(false),
            active: AtomicBool::new(false),
        }
    }

    pub(crate) fn ticks(&self) -> u16 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Publish a new pulse width; the interrupt latches it on this channel's next slot.
    pub(crate) fn set_ticks(&self, ticks: u16) {
        self.ticks.store(ticks, Ordering::SeqCst);
        self.ready.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub(crate) fn clear_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub(crate) fn compare_unit(&self) -> Option<CompareUnit> {
        CompareUnit::from_index(usize::from(self.compare_unit.load(Ordering::SeqCst)))
    }
}

/// Fixed table of [`SERVOS_PER_TIMER`] channels plus the reverse map from compare unit to channel.
pub(crate) struct ChannelTable {
    channels: [Channel; SERVOS_PER_TIMER],
    unit_owner: [AtomicU8; SERVOS_PER_TIMER],
    allocated: AtomicU8,
}

impl ChannelTable {
    pub(crate) const fn new() -> Self {
        Self {
            channels: [Channel::new(), Channel::new(), Channel::new()],
            unit_owner: [
                AtomicU8::new(UNBOUND),
                AtomicU8::new(UNBOUND),
                AtomicU8::new(UNBOUND),
            ],
            allocated: AtomicU8::new(0),
        }
    }

    /// Hand out the next free channel index, seeded with `initial_ticks`.
    ///
    /// Returns `None` once all channels are taken; indices are never returned to the pool.
    pub(crate) fn allocate(&self, initial_ticks: u16) -> Option<u8> {
        let index = self
            .allocated
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                (usize::from(count) < SERVOS_PER_TIMER).then(|| count.saturating_add(1))
            })
            .ok()?;
        self.channel(index)?.set_ticks(initial_ticks);
        Some(index)
    }

    /// Number of channels handed out so far.
    pub(crate) fn allocated(&self) -> u8 {
        self.allocated.load(Ordering::SeqCst)
    }

    pub(crate) fn channel(&self, index: u8) -> Option<&Channel> {
        self.channels.get(usize::from(index))
    }

    /// Channel that drives `unit`, if any.
    pub(crate) fn owner(&self, unit: CompareUnit) -> Option<u8> {
        let owner = self.unit_owner.get(unit.index())?.load(Ordering::SeqCst);
        (owner != UNBOUND).then_some(owner)
    }

    /// Record that channel `index` drives `unit`, dropping any unit it drove before.
    ///
    /// Callers must have checked that `unit` is free or already owned by `index`.
    pub(crate) fn bind(&self, index: u8, unit: CompareUnit) {
        let Some(channel) = self.channel(index) else {
            return;
        };
        if let Some(previous) = channel.compare_unit()
            && previous != unit
            && let Some(slot) = self.unit_owner.get(previous.index())
        {
            slot.store(UNBOUND, Ordering::SeqCst);
        }
        if let Some(slot) = self.unit_owner.get(unit.index()) {
            slot.store(index, Ordering::SeqCst);
        }
        #[expect(clippy::cast_possible_truncation, reason = "compare unit index is 0..=2")]
        channel
            .compare_unit
            .store(unit.index() as u8, Ordering::SeqCst);
    }

    /// Pulse width to program for `unit`: the owner's ticks if it is active, otherwise 0.
    pub(crate) fn ticks_for(&self, unit: CompareUnit) -> (Option<u8>, u16) {
        let Some(index) = self.owner(unit) else {
            return (None, 0);
        };
        let ticks = self
            .channel(index)
            .filter(|channel| channel.is_active())
            .map_or(0, Channel::ticks);
        (Some(index), ticks)
    }

    pub(crate) fn mark_ready(&self, index: u8) {
        if let Some(channel) = self.channel(index) {
            channel.mark_ready();
        }
    }

    pub(crate) fn any_active(&self) -> bool {
        self.channels.iter().any(Channel::is_active)
    }
}

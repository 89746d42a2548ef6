#![allow(missing_docs)]
//! Host-level tests for the shared servo timer: activation, the overflow rotation and pin binding.

use moba_servo::hal::{CompareRoute, CompareUnit, Port, Prescaler};
use moba_servo::servo::Servo;
use moba_servo::servo_timer::{BitPositionBinder, PinTableBinder, ServoTimer, TCA0_TINY, TimerConfig};
use moba_servo::servo_timer_host::HostTimer;
use moba_servo::{Error, OUT_HIGH};

type HostServoTimer = ServoTimer<HostTimer, BitPositionBinder>;

fn timer() -> HostServoTimer {
    ServoTimer::new(HostTimer::new(), BitPositionBinder, TimerConfig::new(24_000_000))
}

const PD0: u8 = HostTimer::pin(Port::D, 0);
const PD1: u8 = HostTimer::pin(Port::D, 1);
const PD2: u8 = HostTimer::pin(Port::D, 2);
const PD5: u8 = HostTimer::pin(Port::D, 5);
const PC1: u8 = HostTimer::pin(Port::C, 1);

fn buffers(timer: &HostServoTimer) -> [u16; 3] {
    timer.with_hardware(|hardware| hardware.compare_buffer)
}

#[test]
fn first_attach_starts_the_timer_once() {
    let timer = timer();
    assert!(!timer.is_running());

    let mut first = Servo::new(&timer);
    let mut second = Servo::new(&timer);
    first.attach(PD0).unwrap();
    second.attach(PD1).unwrap();

    assert!(timer.is_running());
    timer.with_hardware(|hardware| {
        assert_eq!(hardware.take_over_calls, 1);
        assert_eq!(hardware.configuration, Some((Prescaler::Div4, 39_996)));
        assert!(hardware.interrupt_enabled);
        assert_eq!(hardware.outputs_enabled, [true, true, false]);
        assert_eq!(hardware.output_pins.as_slice(), &[PD0, PD1]);
    });
    assert_eq!(timer.bound_port(), Some(Port::D));
}

#[test]
fn overflow_programs_one_unit_per_interrupt() {
    let timer = timer();
    let mut first = Servo::new(&timer);
    let mut second = Servo::new(&timer);
    first.attach(PD0).unwrap();
    second.attach(PD1).unwrap();
    first.write_microseconds(1_000);
    second.write_microseconds(2_000);

    timer.simulate_overflow();
    assert_eq!(timer.current_unit(), CompareUnit::Unit1);
    assert_eq!(buffers(&timer), [0, 12_000, 0]);
    assert!(second.accepts_new_value());
    assert!(!first.accepts_new_value());

    timer.simulate_overflow();
    assert_eq!(timer.current_unit(), CompareUnit::Unit2);
    assert_eq!(buffers(&timer), [0, 0, 0]);

    timer.simulate_overflow();
    assert_eq!(timer.current_unit(), CompareUnit::Unit0);
    assert_eq!(buffers(&timer), [6_000, 0, 0]);
    assert!(first.accepts_new_value());
    timer.with_hardware(|hardware| assert!(!hardware.overflow_flag));
}

#[test]
fn inactive_channel_gets_no_pulse() {
    let timer = timer();
    let mut first = Servo::new(&timer);
    let mut second = Servo::new(&timer);
    first.attach(PD0).unwrap();
    second.attach(PD1).unwrap();
    second.detach();
    assert!(timer.is_running());

    timer.simulate_overflow();
    assert_eq!(buffers(&timer)[1], 0);
    assert!(!second.attached());
}

#[test]
fn held_high_output_is_not_silenced() {
    let timer = timer();
    let mut servo = Servo::new(&timer);
    servo.attach(PD0).unwrap();
    servo.constant_output(embedded_hal::digital::PinState::High);

    timer.simulate_refresh_interval();
    timer.simulate_refresh_interval();

    timer.with_hardware(|hardware| {
        assert_eq!(hardware.compare_of(CompareUnit::Unit0), OUT_HIGH);
        assert_eq!(hardware.compare_buffer[0], OUT_HIGH);
    });
}

#[test]
fn a_compare_unit_has_at_most_one_channel() {
    let timer = timer();
    let mut first = Servo::new(&timer);
    let mut second = Servo::new(&timer);
    first.attach(PD0).unwrap();

    assert_eq!(
        second.attach(PD0),
        Err(Error::CompareUnitTaken {
            unit: CompareUnit::Unit0
        })
    );
    assert_eq!(second.attach(PD5), Err(Error::UnsupportedPin { pin: PD5 }));
    assert_eq!(
        second.attach(PC1),
        Err(Error::PortConflict {
            pin: PC1,
            bound: Port::D,
            requested: Port::C
        })
    );
    assert!(!second.attached());

    assert_eq!(second.attach(PD1), Ok(1));
    assert_eq!(timer.channel_of(CompareUnit::Unit1), Some(1));

    // Moving the first servo to another pin frees its old compare unit.
    first.attach(PD2).unwrap();
    assert_eq!(timer.channel_of(CompareUnit::Unit0), None);
    assert_eq!(timer.channel_of(CompareUnit::Unit2), Some(0));
    assert_eq!(timer.compare_unit_of(0), Some(CompareUnit::Unit2));

    for unit in CompareUnit::ALL {
        let bound = (0..3)
            .filter(|&index| timer.compare_unit_of(index) == Some(unit))
            .count();
        assert!(bound <= 1, "compare unit {unit} bound {bound} times");
    }
}

#[test]
fn unreachable_port_is_rejected() {
    let timer = ServoTimer::new(
        HostTimer::with_reachable_ports(&[Port::C]),
        BitPositionBinder,
        TimerConfig::new(16_000_000),
    );
    let mut servo = Servo::new(&timer);
    assert_eq!(
        servo.attach(PD0),
        Err(Error::UnsupportedPort { port: Port::D })
    );
    assert_eq!(timer.bound_port(), None);
    assert_eq!(servo.attach(PC1), Ok(0));
    assert_eq!(timer.bound_port(), Some(Port::C));
}

#[test]
fn fourth_servo_is_invalid_and_harmless() {
    let timer = timer();
    let mut servos = [Servo::new(&timer), Servo::new(&timer), Servo::new(&timer)];
    for (servo, pin) in servos.iter_mut().zip([PD0, PD1, PD2]) {
        servo.attach(pin).unwrap();
        servo.write_microseconds(1_200);
    }

    let mut fourth = Servo::new(&timer);
    assert!(!fourth.is_valid());
    assert_eq!(fourth.index(), moba_servo::INVALID_SERVO);
    assert_eq!(fourth.attach(PD0), Err(Error::ServoLimitReached));
    fourth.write_microseconds(2_000);
    fourth.constant_output(embedded_hal::digital::PinState::High);
    fourth.detach();
    assert_eq!(fourth.read(), 0);
    assert_eq!(fourth.read_microseconds(), 0);
    assert!(!fourth.accepts_new_value());
    assert!(!fourth.attached());

    assert_eq!(timer.servo_count(), 3);
    for (index, servo) in servos.iter().enumerate() {
        assert!(servo.attached());
        assert_eq!(servo.read_microseconds(), 1_200);
        assert_eq!(usize::from(servo.index()), index);
    }
    assert!(timer.is_running());
}

#[test]
fn detaching_the_last_servo_relinquishes_once() {
    let timer = timer();
    let mut first = Servo::new(&timer);
    let mut second = Servo::new(&timer);
    first.attach(PD0).unwrap();
    second.attach(PD1).unwrap();

    first.detach();
    timer.with_hardware(|hardware| assert_eq!(hardware.resume_calls, 0));

    second.detach();
    second.detach();
    first.detach();
    assert!(!timer.is_running());
    timer.with_hardware(|hardware| {
        assert_eq!(hardware.resume_calls, 1);
        assert!(!hardware.interrupt_enabled);
    });

    // The interrupt no longer runs.
    let before = buffers(&timer);
    first.write_microseconds(2_000);
    timer.simulate_refresh_interval();
    assert_eq!(buffers(&timer), before);

    // Attaching again takes the timer back.
    first.attach(PD0).unwrap();
    assert!(timer.is_running());
    timer.with_hardware(|hardware| assert_eq!(hardware.take_over_calls, 2));
}

#[test]
fn tiny_table_routes_alternate_pins() {
    let timer = ServoTimer::new(
        HostTimer::new(),
        PinTableBinder::new(TCA0_TINY),
        TimerConfig::new(20_000_000),
    );
    let mut servo = Servo::new(&timer);
    servo.attach(HostTimer::pin(Port::B, 3)).unwrap();
    assert_eq!(timer.channel_of(CompareUnit::Unit0), Some(0));
    timer.with_hardware(|hardware| {
        assert_eq!(
            hardware.routes.last(),
            Some(&(Port::B, CompareRoute::alternate_pin(CompareUnit::Unit0)))
        );
    });

    let mut other = Servo::new(&timer);
    assert_eq!(
        other.attach(HostTimer::pin(Port::B, 6)),
        Err(Error::UnsupportedPin {
            pin: HostTimer::pin(Port::B, 6)
        })
    );
}

#[test]
fn overflow_without_interrupt_does_nothing() {
    let timer = timer();
    let _servo = Servo::new(&timer);
    timer.simulate_refresh_interval();
    assert_eq!(timer.current_unit(), CompareUnit::Unit0);
    assert_eq!(buffers(&timer), [0, 0, 0]);
}

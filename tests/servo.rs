#![allow(missing_docs)]
//! Servo handle behavior on a host timer: angle mapping, clamping, limits and the ready signal.

use embedded_hal::digital::PinState;
use moba_servo::hal::Port;
use moba_servo::servo::{PulseChannel, Servo};
use moba_servo::servo_timer::{BitPositionBinder, ServoTimer, TimerConfig};
use moba_servo::servo_timer_host::HostTimer;
use moba_servo::{DEFAULT_PULSE_WIDTH_US, MAX_PULSE_WIDTH_US, MIN_PULSE_WIDTH_US};

fn timer(cpu_hz: u32) -> ServoTimer<HostTimer, BitPositionBinder> {
    ServoTimer::new(HostTimer::new(), BitPositionBinder, TimerConfig::new(cpu_hz))
}

const PA0: u8 = HostTimer::pin(Port::A, 0);
const PA1: u8 = HostTimer::pin(Port::A, 1);

#[test]
fn new_servo_starts_at_the_default_pulse() {
    let timer = timer(24_000_000);
    let servo = Servo::new(&timer);
    assert_eq!(servo.index(), 0);
    assert!(!servo.attached());
    assert_eq!(servo.read_microseconds(), DEFAULT_PULSE_WIDTH_US);
    assert_eq!(servo.min_us(), MIN_PULSE_WIDTH_US);
    assert_eq!(servo.max_us(), MAX_PULSE_WIDTH_US);
}

#[test]
fn small_values_are_angles() {
    let timer = timer(24_000_000);
    let mut by_angle = Servo::new(&timer);
    let mut by_width = Servo::new(&timer);
    by_angle.attach(PA0).unwrap();
    by_width.attach(PA1).unwrap();

    by_angle.write(90);
    by_width.write_microseconds(1_472);
    assert_eq!(by_angle.read_microseconds(), 1_472);
    assert_eq!(by_angle.read_microseconds(), by_width.read_microseconds());
    assert_eq!(by_angle.read(), 90);

    by_angle.write(0);
    assert_eq!(by_angle.read_microseconds(), MIN_PULSE_WIDTH_US);
    by_angle.write(200);
    assert_eq!(by_angle.read_microseconds(), MAX_PULSE_WIDTH_US);
    by_angle.write(543);
    assert_eq!(by_angle.read_microseconds(), MAX_PULSE_WIDTH_US);

    by_angle.write(1_500);
    assert_eq!(by_angle.read_microseconds(), 1_500);
}

#[test]
fn pulse_widths_are_clamped_to_the_limits() {
    let timer = timer(16_000_000);
    let mut servo = Servo::new(&timer);
    servo.attach(PA0).unwrap();

    servo.write_microseconds(100);
    assert_eq!(servo.read_microseconds(), MIN_PULSE_WIDTH_US);
    servo.write_microseconds(3_000);
    assert_eq!(servo.read_microseconds(), MAX_PULSE_WIDTH_US);
}

#[test]
fn custom_limits_rescale_angles() {
    let timer = timer(24_000_000);
    let mut servo = Servo::new(&timer);
    servo.attach_with_limits(PA0, 1_000, 2_000).unwrap();
    assert_eq!((servo.min_us(), servo.max_us()), (1_000, 2_000));

    servo.write(0);
    assert_eq!(servo.read_microseconds(), 1_000);
    servo.write(180);
    assert_eq!(servo.read_microseconds(), 2_000);
    servo.write_microseconds(2_300);
    assert_eq!(servo.read_microseconds(), 2_000);
}

#[test]
fn far_limits_saturate() {
    let timer = timer(24_000_000);
    let mut servo = Servo::new(&timer);
    servo.attach_with_limits(PA0, 0, 4_000).unwrap();
    assert_eq!((servo.min_us(), servo.max_us()), (36, 2_908));
}

#[test]
fn ready_signal_follows_the_pulse_rotation() {
    let timer = timer(24_000_000);
    let mut servo = Servo::new(&timer);
    servo.attach(PA0).unwrap();
    servo.write_microseconds(1_800);
    assert!(!servo.accepts_new_value());

    timer.simulate_refresh_interval();
    assert!(servo.accepts_new_value());
    assert_eq!(timer.with_hardware(|hardware| hardware.compare_buffer[0]), 10_800);

    servo.wait_till_next_pulse();
    assert!(!servo.accepts_new_value());

    timer.simulate_refresh_interval();
    assert!(servo.accepts_new_value());
    servo.write_microseconds(1_200);
    assert!(!servo.accepts_new_value());
}

#[test]
fn constant_output_is_outside_the_pulse_range() {
    let timer = timer(24_000_000);
    let mut servo = Servo::new(&timer);
    servo.attach(PA0).unwrap();

    servo.constant_output(PinState::Low);
    assert_eq!(servo.read_microseconds(), 0);

    servo.constant_output(PinState::High);
    assert_eq!(servo.read_microseconds(), 10_922);
    assert!(servo.read_microseconds() > MAX_PULSE_WIDTH_US);

    servo.write_microseconds(1_500);
    assert_eq!(servo.read_microseconds(), 1_500);
}

#[test]
fn constant_high_reads_back_per_clock() {
    let timer = timer(4_000_000);
    let mut servo = Servo::new(&timer);
    servo.constant_output(PinState::High);
    assert_eq!(servo.read_microseconds(), 16_383);
}

#[test]
fn pulse_channel_works_through_a_reference() {
    fn drive<C: PulseChannel>(mut channel: C) -> u16 {
        channel.write(90);
        channel.read_microseconds()
    }

    let timer = timer(20_000_000);
    let mut servo = Servo::new(&timer);
    assert_eq!(PulseChannel::attach(&mut servo, PA0), Ok(0));
    assert_eq!(drive(&mut servo), 1_472);
    assert!(PulseChannel::attached(&servo));
}

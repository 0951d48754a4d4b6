use accel_flasher::{FlasherConfig, FlasherError, MotionFlasher, ShutdownSignal, WhiteLed};
use embassy_time::Duration;
use embedded_hal::i2c::ErrorKind;
use embedded_hal_mock::eh1::digital::{
    Mock as PinMock, State as PinState, Transaction as PinTransaction,
};
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
use lsm6ds3tr::{Address, Lsm6ds3tr};
use tokio_test::block_on;

const ADDR: u8 = 0x6A;

fn test_config() -> FlasherConfig {
    FlasherConfig {
        pulse: Duration::from_millis(5),
        ..FlasherConfig::default()
    }
}

fn pulse_pin() -> PinMock {
    PinMock::new(&[
        PinTransaction::set(PinState::Low),
        PinTransaction::set(PinState::High),
    ])
}

fn inverted_pulse_pin() -> PinMock {
    PinMock::new(&[
        PinTransaction::set(PinState::High),
        PinTransaction::set(PinState::Low),
    ])
}

fn clear_pin() -> PinMock {
    PinMock::new(&[PinTransaction::set(PinState::High)])
}

fn inverted_clear_pin() -> PinMock {
    PinMock::new(&[PinTransaction::set(PinState::Low)])
}

// driver setup sequence shared by both strategies: identity check, BDU +
// IF_INC, 104Hz accelerometer / gyro power-down, ±4g full scale
fn setup_transactions() -> Vec<I2cTransaction> {
    vec![
        I2cTransaction::write_read(ADDR, vec![0x0F], vec![0x6A]),
        I2cTransaction::write(ADDR, vec![0x12, 0b0100_0100]),
        I2cTransaction::write_read(ADDR, vec![0x10], vec![0x00]),
        I2cTransaction::write(ADDR, vec![0x10, 0b0100_0000]),
        I2cTransaction::write_read(ADDR, vec![0x11], vec![0x00]),
        I2cTransaction::write(ADDR, vec![0x11, 0x00]),
        I2cTransaction::write_read(ADDR, vec![0x10], vec![0b0100_0000]),
        I2cTransaction::write(ADDR, vec![0x10, 0b0100_1000]),
    ]
}

// cleanup sequence: wake-up routing cleared on MD1_CFG
fn stop_transactions() -> Vec<I2cTransaction> {
    vec![
        I2cTransaction::write_read(ADDR, vec![0x5E], vec![0b0010_0000]),
        I2cTransaction::write(ADDR, vec![0x5E, 0x00]),
    ]
}

#[test]
fn wakeup_handler_pulses_on_x_axis() {
    // WU_IA and X_WU set
    let expectations = [I2cTransaction::write_read(ADDR, vec![0x1B], vec![0b0000_1100])];

    let mut i2c = I2cMock::new(&expectations);
    let mut blue = pulse_pin();
    let mut green = pulse_pin();
    let mut red = pulse_pin();
    let mut external = inverted_pulse_pin();

    let lsm = Lsm6ds3tr::new(&mut i2c, Address::from(ADDR));
    let led = WhiteLed::new(blue.clone(), green.clone(), red.clone(), external.clone());
    let mut flasher = MotionFlasher::new(lsm, led, test_config());

    let result = block_on(flasher.handle_wakeup());
    assert!(result.is_ok());
    assert!(flasher.wake_pending());

    //check if all expectations are met
    i2c.done();
    blue.done();
    green.done();
    red.done();
    external.done();
}

#[test]
fn wakeup_handler_ignores_other_axes() {
    // WU_IA with Y_WU only; the indicator must not be touched
    let expectations = [I2cTransaction::write_read(ADDR, vec![0x1B], vec![0b0000_1010])];

    let mut i2c = I2cMock::new(&expectations);
    let mut blue = PinMock::new(&[]);
    let mut green = PinMock::new(&[]);
    let mut red = PinMock::new(&[]);
    let mut external = PinMock::new(&[]);

    let lsm = Lsm6ds3tr::new(&mut i2c, Address::from(ADDR));
    let led = WhiteLed::new(blue.clone(), green.clone(), red.clone(), external.clone());
    let mut flasher = MotionFlasher::new(lsm, led, test_config());

    let result = block_on(flasher.handle_wakeup());
    assert!(result.is_ok());
    assert!(flasher.wake_pending());

    i2c.done();
    blue.done();
    green.done();
    red.done();
    external.done();
}

#[test]
fn polling_shutdown_runs_cleanup() {
    let mut expectations = setup_transactions();
    expectations.extend(stop_transactions());

    let mut i2c = I2cMock::new(&expectations);
    let mut blue = clear_pin();
    let mut green = clear_pin();
    let mut red = clear_pin();
    let mut external = inverted_clear_pin();

    let lsm = Lsm6ds3tr::new(&mut i2c, Address::from(ADDR));
    let led = WhiteLed::new(blue.clone(), green.clone(), red.clone(), external.clone());
    let mut flasher = MotionFlasher::new(lsm, led, test_config());

    let shutdown = ShutdownSignal::new();
    shutdown.signal(());

    let result = block_on(flasher.run_polling(&shutdown));
    assert!(result.is_ok());

    i2c.done();
    blue.done();
    green.done();
    red.done();
    external.done();
}

#[test]
fn wakeup_shutdown_runs_cleanup() {
    let mut expectations = setup_transactions();
    // 500mg at ±4g is register 8, duration 2 samples, slope filter
    expectations.extend([
        I2cTransaction::write_read(ADDR, vec![0x5B], vec![0x00]),
        I2cTransaction::write(ADDR, vec![0x5B, 8]),
        I2cTransaction::write_read(ADDR, vec![0x5C], vec![0x00]),
        I2cTransaction::write(ADDR, vec![0x5C, 0b0010_0000]),
        I2cTransaction::write_read(ADDR, vec![0x58], vec![0x00]),
        I2cTransaction::write(ADDR, vec![0x58, 0b1000_0000]),
        I2cTransaction::write_read(ADDR, vec![0x5E], vec![0x00]),
        I2cTransaction::write(ADDR, vec![0x5E, 0b0010_0000]),
    ]);
    expectations.extend(stop_transactions());

    let mut i2c = I2cMock::new(&expectations);
    let mut blue = clear_pin();
    let mut green = clear_pin();
    let mut red = clear_pin();
    let mut external = inverted_clear_pin();
    // the shutdown wins the select before the edge wait is ever polled
    let mut int_pin = PinMock::new(&[]);

    let lsm = Lsm6ds3tr::new(&mut i2c, Address::from(ADDR));
    let led = WhiteLed::new(blue.clone(), green.clone(), red.clone(), external.clone());
    let mut flasher = MotionFlasher::new(lsm, led, test_config());

    let shutdown = ShutdownSignal::new();
    shutdown.signal(());

    let result = block_on(flasher.run_wakeup(&mut int_pin, &shutdown));
    assert!(result.is_ok());

    i2c.done();
    blue.done();
    green.done();
    red.done();
    external.done();
    int_pin.done();
}

#[test]
fn stop_clears_indicator_mid_pulse() {
    // shutdown while a pulse is active: the indicator was switched on and
    // the cleanup must still leave every output inactive
    let expectations = stop_transactions();

    let mut i2c = I2cMock::new(&expectations);
    let mut blue = pulse_pin();
    let mut green = pulse_pin();
    let mut red = pulse_pin();
    let mut external = inverted_pulse_pin();

    let mut led = WhiteLed::new(blue.clone(), green.clone(), red.clone(), external.clone());
    led.on().unwrap();

    let lsm = Lsm6ds3tr::new(&mut i2c, Address::from(ADDR));
    let mut flasher = MotionFlasher::new(lsm, led, test_config());
    flasher.stop();

    i2c.done();
    blue.done();
    green.done();
    red.done();
    external.done();
}

#[test]
fn bus_failure_is_fatal_but_still_cleans_up() {
    let mut expectations =
        vec![I2cTransaction::write_read(ADDR, vec![0x0F], vec![0x6A]).with_error(ErrorKind::Other)];
    expectations.extend(stop_transactions());

    let mut i2c = I2cMock::new(&expectations);
    let mut blue = clear_pin();
    let mut green = clear_pin();
    let mut red = clear_pin();
    let mut external = inverted_clear_pin();

    let lsm = Lsm6ds3tr::new(&mut i2c, Address::from(ADDR));
    let led = WhiteLed::new(blue.clone(), green.clone(), red.clone(), external.clone());
    let mut flasher = MotionFlasher::new(lsm, led, test_config());

    let shutdown = ShutdownSignal::new();

    let result = block_on(flasher.run_polling(&shutdown));
    assert!(matches!(result, Err(FlasherError::Sensor(_))));

    i2c.done();
    blue.done();
    green.done();
    red.done();
    external.done();
}

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_futures::select::{select3, Either3};
use embassy_time::{Duration, Timer};
use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;
use embedded_hal_async::digital::Wait;
use lsm6ds3tr::{Error as SensorError, Lsm6ds3tr};

use crate::{DeltaDetector, FlasherConfig, PulseGate, ShutdownSignal, WhiteLed};

/// Pause between STATUS_REG polls and between loop iterations in the polling
/// strategy. Suspends instead of spinning so other tasks get the core.
const DATA_POLL_PERIOD: Duration = Duration::from_millis(1);

/// Bounded idle wait between interrupts; the loop periodically regains
/// control to drain the wake flag even with no motion.
const IDLE_PERIOD: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub enum FlasherError<E, P> {
    /// Sensor driver failure, usually a bus transaction. Fatal to the loop.
    Sensor(SensorError<E>),
    /// Indicator or interrupt pin failure.
    Gpio(P),
}

/// Top-level monitoring context: owns the sensor driver, the indicator and
/// the configuration. Construct it with board-supplied handles, run one of
/// the two strategies, and signal `ShutdownSignal` to stop it; every exit
/// path runs the cleanup sequence (wake interrupt off, indicator inactive).
///
/// ```ignore
/// let lsm = Lsm6ds3tr::new(board_i2c, Address::from_pin_state(PinState::Low));
/// let led = WhiteLed::new(blue, green, red, d0);
/// static SHUTDOWN: ShutdownSignal = ShutdownSignal::new();
/// let mut flasher = MotionFlasher::new(lsm, led, FlasherConfig::default());
/// flasher.run_wakeup(&mut int1_pin, &SHUTDOWN).await?;
/// ```
pub struct MotionFlasher<I2C, O> {
    sensor: Lsm6ds3tr<I2C>,
    led: WhiteLed<O>,
    config: FlasherConfig,
    wake_flagged: AtomicBool,
}

impl<I2C, O, E> MotionFlasher<I2C, O>
where
    I2C: I2c<Error = E>,
    O: OutputPin,
{
    pub fn new(sensor: Lsm6ds3tr<I2C>, led: WhiteLed<O>, config: FlasherConfig) -> Self {
        MotionFlasher {
            sensor,
            led,
            config,
            wake_flagged: AtomicBool::new(false),
        }
    }

    /// Polling strategy: suspend until a sample is ready, compare the X axis
    /// against the previous reading, and pulse the indicator through the
    /// deadline gate when the delta exceeds the configured threshold.
    ///
    /// Returns when `shutdown` is signalled, or with the first sensor or pin
    /// error; cleanup runs in both cases.
    pub async fn run_polling(
        &mut self,
        shutdown: &ShutdownSignal,
    ) -> Result<(), FlasherError<E, O::Error>> {
        let mut detector = DeltaDetector::new(self.config.delta_threshold);
        let mut gate = PulseGate::new(self.config.pulse);

        let res = self.poll_loop(&mut detector, &mut gate, shutdown).await;
        self.stop();
        log::info!("Monitoring stopped.");
        res
    }

    async fn poll_loop(
        &mut self,
        detector: &mut DeltaDetector,
        gate: &mut PulseGate,
        shutdown: &ShutdownSignal,
    ) -> Result<(), FlasherError<E, O::Error>> {
        self.setup()?;
        log::info!("Monitoring started.");

        loop {
            if shutdown.signaled() {
                return Ok(());
            }

            while !self.sensor.accel_data_ready().map_err(FlasherError::Sensor)? {
                if shutdown.signaled() {
                    return Ok(());
                }
                Timer::after(DATA_POLL_PERIOD).await;
            }

            let sample = self.sensor.read_accel().map_err(FlasherError::Sensor)?;
            if detector.observe(sample.x) {
                log::debug!("motion: x={} y={} z={}", sample.x, sample.y, sample.z);
                if gate.trigger() {
                    self.led.on().map_err(FlasherError::Gpio)?;
                }
            }
            if gate.expired() {
                self.led.off().map_err(FlasherError::Gpio)?;
            }

            Timer::after(DATA_POLL_PERIOD).await;
        }
    }

    /// Interrupt strategy: arm the hardware wake-up engine, then sleep on
    /// the INT1 line with a bounded idle timeout. Rising edges run
    /// `handle_wakeup`; the idle arm drains the wake flag for logging.
    ///
    /// Returns when `shutdown` is signalled, or with the first sensor or pin
    /// error; cleanup runs in both cases. Dropping the returned future
    /// detaches the edge wait.
    pub async fn run_wakeup<W>(
        &mut self,
        int_pin: &mut W,
        shutdown: &ShutdownSignal,
    ) -> Result<(), FlasherError<E, O::Error>>
    where
        W: Wait<Error = O::Error>,
    {
        let res = self.wakeup_loop(int_pin, shutdown).await;
        self.stop();
        log::info!("Monitoring stopped.");
        res
    }

    async fn wakeup_loop<W>(
        &mut self,
        int_pin: &mut W,
        shutdown: &ShutdownSignal,
    ) -> Result<(), FlasherError<E, O::Error>>
    where
        W: Wait<Error = O::Error>,
    {
        self.setup()?;

        let fs_mg = self.sensor.full_scale().mg();
        let mut threshold_mg = self.config.wake_threshold_mg;
        if threshold_mg > fs_mg {
            log::warn!(
                "threshold {}mg exceeds full-scale maximum {}mg",
                threshold_mg,
                fs_mg
            );
            threshold_mg = fs_mg;
        }
        self.sensor
            .set_wakeup_threshold(threshold_mg, self.config.wake_duration, self.config.use_hpf)
            .map_err(FlasherError::Sensor)?;
        self.sensor
            .enable_wakeup_interrupt(true)
            .map_err(FlasherError::Sensor)?;

        log::info!("Monitoring started.");

        loop {
            match select3(
                shutdown.wait(),
                int_pin.wait_for_rising_edge(),
                Timer::after(IDLE_PERIOD),
            )
            .await
            {
                Either3::First(()) => return Ok(()),
                Either3::Second(edge) => {
                    edge.map_err(FlasherError::Gpio)?;
                    self.handle_wakeup().await?;
                }
                Either3::Third(()) => {
                    if self.wake_flagged.swap(false, Ordering::Relaxed) {
                        // one read; WAKE_UP_SRC may be read-to-clear
                        let src = self.sensor.wakeup_sources().map_err(FlasherError::Sensor)?;
                        if src.wake_event() {
                            log::info!("Wake-up detected: {:06b}", src.bits());
                        }
                    }
                }
            }
        }
    }

    /// INT1 rising-edge handler body: one WAKE_UP_SRC read, and a pulse with
    /// a bounded blocking wait when the X axis contributed. Blocking here is
    /// acceptable because the pulse is short and nothing else on this core is
    /// time-critical while it runs.
    pub async fn handle_wakeup(&mut self) -> Result<(), FlasherError<E, O::Error>> {
        self.wake_flagged.store(true, Ordering::Relaxed);

        let src = self.sensor.wakeup_sources().map_err(FlasherError::Sensor)?;
        if src.x_wake() {
            self.led.on().map_err(FlasherError::Gpio)?;
            Timer::after(self.config.pulse).await;
            self.led.off().map_err(FlasherError::Gpio)?;
        }
        Ok(())
    }

    /// A wake-up event has been flagged by the handler and not yet drained
    /// by the monitoring loop.
    pub fn wake_pending(&self) -> bool {
        self.wake_flagged.load(Ordering::Relaxed)
    }

    /// Cleanup sequence: un-route the wake-up interrupt and force the
    /// indicator inactive. Best effort; failures are logged, not propagated,
    /// so it is safe on error paths.
    pub fn stop(&mut self) {
        if self.sensor.enable_wakeup_interrupt(false).is_err() {
            log::warn!("failed to disable wake-up interrupt during shutdown");
        }
        if self.led.off().is_err() {
            log::warn!("failed to clear indicator during shutdown");
        }
    }

    fn setup(&mut self) -> Result<(), FlasherError<E, O::Error>> {
        self.sensor.init().map_err(FlasherError::Sensor)?;
        self.sensor
            .configure(self.config.accel_mode, self.config.gyro_mode)
            .map_err(FlasherError::Sensor)?;
        self.sensor
            .set_full_scale(self.config.full_scale)
            .map_err(FlasherError::Sensor)
    }
}

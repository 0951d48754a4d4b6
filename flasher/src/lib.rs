#![no_std]

//! Motion-triggered indicator controller.
//!
//! Watches the on-board LSM6DS3TR-C accelerometer and flashes a white
//! indicator (the three onboard RGB outputs plus an external LED) for a
//! bounded pulse whenever motion is detected, either by sample-to-sample
//! delta polling or by the sensor's hardware wake-up interrupt.

pub mod detector;
pub mod indicator;
pub mod monitor;

pub use detector::DeltaDetector;
pub use indicator::{PulseGate, WhiteLed};
pub use monitor::{FlasherError, MotionFlasher};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Duration;
use lsm6ds3tr::{FullScale, OdrMode, WakeupDuration};

/// Cooperative shutdown request, signalled from the platform's exit path.
pub type ShutdownSignal = Signal<CriticalSectionRawMutex, ()>;

/// Monitoring parameters.
#[derive(Debug, Clone)]
pub struct FlasherConfig {
    /// Accelerometer data rate for both strategies.
    pub accel_mode: OdrMode,
    /// Gyroscope mode; the controller never consumes gyro data.
    pub gyro_mode: OdrMode,
    /// Accelerometer full-scale range.
    pub full_scale: FullScale,
    /// Wake-up threshold request in milli-g (interrupt strategy). Clamped to
    /// the full-scale maximum with a warning.
    pub wake_threshold_mg: u32,
    /// Consecutive over-threshold samples before the wake condition latches.
    pub wake_duration: WakeupDuration,
    /// Select the high-pass filter instead of the slope filter on the
    /// wake-up path.
    pub use_hpf: bool,
    /// X-axis delta threshold in raw counts (polling strategy).
    pub delta_threshold: u16,
    /// Indicator pulse duration.
    pub pulse: Duration,
}

impl Default for FlasherConfig {
    fn default() -> Self {
        FlasherConfig {
            accel_mode: OdrMode::Normal104Hz,
            gyro_mode: OdrMode::PowerDown,
            full_scale: FullScale::Fs4g,
            wake_threshold_mg: 500,
            wake_duration: WakeupDuration::Samples2,
            use_hpf: false,
            delta_threshold: 10_000,
            pulse: Duration::from_millis(100),
        }
    }
}

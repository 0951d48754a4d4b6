#![no_std]

use bitfield::bitfield;
use embedded_hal::digital::PinState;
use embedded_hal::i2c::I2c;

/// LSM6DS3TR-C accelerometer/gyroscope driver
///
/// Register-level I2C driver for the ST LSM6DS3TR-C 6-axis IMU. Covers rate
/// and full-scale configuration, raw accelerometer reads, and the hardware
/// wake-up engine (threshold, duration, INT1 routing, source decode).
pub struct Lsm6ds3tr<I2C> {
    i2c: I2C,
    address: u8,
    full_scale: FullScale,
}

/// WHO_AM_I value of the LSM6DS3TR-C.
pub const DEVICE_ID: u8 = 0x6A;
/// WHO_AM_I value of the older LSM6DS3, register compatible for our use.
pub const DEVICE_ID_LSM6DS3: u8 = 0x69;

/// I2C device address
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Address(u8);

impl From<u8> for Address {
    fn from(a: u8) -> Self {
        Address(a)
    }
}

impl Address {
    /// Address selected by the SDO/SA0 strap.
    pub fn from_pin_state(sa0: PinState) -> Self {
        match sa0 {
            PinState::Low => Address(0x6A),
            PinState::High => Address(0x6B),
        }
    }
}

/// LSM6DS3TR-C register addresses
#[derive(Debug, Clone, Copy)]
#[repr(u8)]
#[allow(dead_code)]
enum Register {
    Int1Ctrl = 0x0D,
    WhoAmI = 0x0F,
    Ctrl1Xl = 0x10,
    Ctrl2G = 0x11,
    Ctrl3C = 0x12,
    Ctrl8Xl = 0x17,
    WakeUpSrc = 0x1B,
    StatusReg = 0x1E,
    OutxLG = 0x22,
    OutxLXl = 0x28,
    TapCfg = 0x58,
    WakeUpThs = 0x5B,
    WakeUpDur = 0x5C,
    Md1Cfg = 0x5E,
}

/// Output data rate and power mode, shared by CTRL1_XL and CTRL2_G.
///
/// Values are the 4-bit ODR codes before shifting into the high nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OdrMode {
    PowerDown = 0,
    LowPower26Hz = 2,
    Normal104Hz = 4,
    Normal208Hz = 5,
    Performance416Hz = 6,
}

/// Accelerometer full-scale range, CTRL1_XL bits 3:2.
///
/// The encoding is not monotonic in g; see the FS_XL table in the datasheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FullScale {
    Fs2g = 0b00,
    Fs16g = 0b01,
    Fs4g = 0b10,
    Fs8g = 0b11,
}

impl FullScale {
    /// Range magnitude in milli-g.
    pub fn mg(self) -> u32 {
        match self {
            FullScale::Fs2g => 2_000,
            FullScale::Fs4g => 4_000,
            FullScale::Fs8g => 8_000,
            FullScale::Fs16g => 16_000,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => FullScale::Fs2g,
            0b01 => FullScale::Fs16g,
            0b10 => FullScale::Fs4g,
            _ => FullScale::Fs8g,
        }
    }
}

/// Number of consecutive over-threshold samples before the wake condition
/// latches, WAKE_UP_DUR bits 6:5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WakeupDuration {
    Samples1 = 0,
    Samples2 = 1,
    Samples3 = 2,
    Samples4 = 3,
}

/// One raw accelerometer sample, signed 16-bit ADC counts per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisSample {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl AxisSample {
    fn from_le_bytes(b: [u8; 6]) -> Self {
        AxisSample {
            x: i16::from_le_bytes([b[0], b[1]]),
            y: i16::from_le_bytes([b[2], b[3]]),
            z: i16::from_le_bytes([b[4], b[5]]),
        }
    }
}

bitfield! {
    /// WAKE_UP_SRC register contents
    #[derive(Clone, Copy, PartialEq)]
    pub struct WakeUpSource(u8);
    impl Debug;

    pub z_wake, _: 0;
    pub y_wake, _: 1;
    pub x_wake, _: 2;
    pub wake_event, _: 3;
    pub sleep_event, _: 4;
    pub free_fall, _: 5;
}

impl WakeUpSource {
    /// Raw register byte.
    pub fn bits(&self) -> u8 {
        self.0
    }
}

#[derive(Debug)]
pub enum Error<E> {
    /// I2C communication error
    I2c(E),
    /// WHO_AM_I returned an unexpected value
    InvalidDevice(u8),
}

// Wake-up threshold LSB is fs_mg / 64 (15.625 mg per g of full scale).
// Intermediate math in u64: out-of-range requests clamp, they never overflow.
fn threshold_register(threshold_mg: u32, fs_mg: u32) -> u8 {
    let fs_mg = u64::from(fs_mg);
    let reg = (u64::from(threshold_mg) * 64 + fs_mg / 2) / fs_mg;
    reg.clamp(1, 63) as u8
}

impl<I2C, E> Lsm6ds3tr<I2C>
where
    I2C: I2c<Error = E>,
{
    const ODR_BP: u8 = 4; // output data rate bit position in CTRL1_XL / CTRL2_G
    const ODR_BM: u8 = 0b1111_0000;
    const FS_BP: u8 = 2; // accelerometer full scale bit position in CTRL1_XL
    const FS_BM: u8 = 0b0000_1100;
    const CTRL3_BDU_IF_INC: u8 = 0b0100_0100;
    const STATUS_XLDA_BM: u8 = 0b0000_0001; // accelerometer new data available
    const STATUS_GDA_BM: u8 = 0b0000_0010; // gyroscope new data available
    const WAKE_THS_BM: u8 = 0b0011_1111; // bit 7 selects single/double tap
    const WAKE_DUR_BP: u8 = 5;
    const WAKE_DUR_BM: u8 = 0b0110_0000;
    const TAP_CFG_INT_EN_BM: u8 = 0b1000_0000;
    const TAP_CFG_SLOPE_FDS_BM: u8 = 0b0001_0000; // 1: high-pass, 0: slope filter
    const MD1_INT1_WU_BM: u8 = 0b0010_0000; // route wake-up to INT1

    /// Create a new instance of the LSM6DS3TR-C device.
    ///
    /// The cached full-scale range starts at the power-on default of ±2g and
    /// follows `configure` / `set_full_scale` afterwards.
    pub fn new(i2c: I2C, address: Address) -> Self {
        Lsm6ds3tr {
            i2c,
            address: address.0,
            full_scale: FullScale::Fs2g,
        }
    }

    /// Check device identity and enable block data update and register
    /// address auto-increment.
    pub fn init(&mut self) -> Result<(), Error<E>> {
        let id = self.read_register(Register::WhoAmI)?;
        if id != DEVICE_ID && id != DEVICE_ID_LSM6DS3 {
            return Err(Error::InvalidDevice(id));
        }
        self.write_register(Register::Ctrl3C, Self::CTRL3_BDU_IF_INC)
    }

    /// Set the accelerometer and gyroscope data rate / power mode.
    ///
    /// Each register is updated independently and takes effect immediately.
    /// The full-scale bits sharing CTRL1_XL are preserved, and the cached
    /// scale factor is refreshed from the readback.
    pub fn configure(&mut self, accel: OdrMode, gyro: OdrMode) -> Result<(), Error<E>> {
        let ctrl1 = self.read_register(Register::Ctrl1Xl)?;
        let ctrl1 = (ctrl1 & !Self::ODR_BM) | ((accel as u8) << Self::ODR_BP);
        self.write_register(Register::Ctrl1Xl, ctrl1)?;
        self.full_scale = FullScale::from_bits((ctrl1 & Self::FS_BM) >> Self::FS_BP);

        let ctrl2 = self.read_register(Register::Ctrl2G)?;
        self.write_register(
            Register::Ctrl2G,
            (ctrl2 & !Self::ODR_BM) | ((gyro as u8) << Self::ODR_BP),
        )
    }

    /// Set the accelerometer full-scale range, preserving the data rate bits
    /// of CTRL1_XL. Updates the cached scale used by the threshold math.
    pub fn set_full_scale(&mut self, fs: FullScale) -> Result<(), Error<E>> {
        let ctrl1 = self.read_register(Register::Ctrl1Xl)?;
        let ctrl1 = (ctrl1 & !Self::FS_BM) | ((fs as u8) << Self::FS_BP);
        self.write_register(Register::Ctrl1Xl, ctrl1)?;
        self.full_scale = fs;
        Ok(())
    }

    /// Currently cached full-scale range.
    pub fn full_scale(&self) -> FullScale {
        self.full_scale
    }

    /// Read one raw accelerometer sample, 6 bytes starting at OUTX_L_XL.
    pub fn read_accel(&mut self) -> Result<AxisSample, Error<E>> {
        let mut data = [0u8; 6];
        self.i2c
            .write_read(self.address, &[Register::OutxLXl as u8], &mut data)
            .map_err(Error::I2c)?;
        Ok(AxisSample::from_le_bytes(data))
    }

    /// A new accelerometer sample is available.
    pub fn accel_data_ready(&mut self) -> Result<bool, Error<E>> {
        let status = self.read_register(Register::StatusReg)?;
        Ok(status & Self::STATUS_XLDA_BM != 0)
    }

    /// A new gyroscope sample is available.
    pub fn gyro_data_ready(&mut self) -> Result<bool, Error<E>> {
        let status = self.read_register(Register::StatusReg)?;
        Ok(status & Self::STATUS_GDA_BM != 0)
    }

    /// Set the acceleration threshold and duration for the wake-up engine.
    ///
    /// The threshold is converted to the 6-bit WAKE_UP_THS value using the
    /// current full-scale range (1 LSB = fs_g * 15.625 mg) and clamped to
    /// 1..=63. Returns the threshold the hardware will actually enforce, in
    /// mg; it may differ from the request by up to one LSB.
    ///
    /// `use_hpf` selects the high-pass filter instead of the slope filter on
    /// the wake-up path. Interrupt generation is enabled as a side effect
    /// (INTERRUPTS_ENABLE in TAP_CFG); the tap configuration sharing that
    /// register is preserved.
    pub fn set_wakeup_threshold(
        &mut self,
        threshold_mg: u32,
        duration: WakeupDuration,
        use_hpf: bool,
    ) -> Result<f32, Error<E>> {
        let fs_mg = self.full_scale.mg();
        let reg = threshold_register(threshold_mg, fs_mg);
        let effective_mg = f32::from(reg) * fs_mg as f32 / 64.0;

        let ths = self.read_register(Register::WakeUpThs)? & !Self::WAKE_THS_BM;
        self.write_register(Register::WakeUpThs, ths | (reg & Self::WAKE_THS_BM))?;

        let dur = self.read_register(Register::WakeUpDur)? & !Self::WAKE_DUR_BM;
        self.write_register(
            Register::WakeUpDur,
            dur | (((duration as u8) << Self::WAKE_DUR_BP) & Self::WAKE_DUR_BM),
        )?;

        let mut cfg = self.read_register(Register::TapCfg)? | Self::TAP_CFG_INT_EN_BM;
        if use_hpf {
            cfg |= Self::TAP_CFG_SLOPE_FDS_BM;
        } else {
            cfg &= !Self::TAP_CFG_SLOPE_FDS_BM;
        }
        self.write_register(Register::TapCfg, cfg)?;

        log::debug!("wake-up threshold set to {}mg (register {})", effective_mg, reg);
        Ok(effective_mg)
    }

    /// Route (or un-route) the wake-up condition to the INT1 pin. Idempotent.
    pub fn enable_wakeup_interrupt(&mut self, enable: bool) -> Result<(), Error<E>> {
        let md1 = self.read_register(Register::Md1Cfg)?;
        let md1 = if enable {
            md1 | Self::MD1_INT1_WU_BM
        } else {
            md1 & !Self::MD1_INT1_WU_BM
        };
        self.write_register(Register::Md1Cfg, md1)?;
        log::debug!("wake-up interrupt on INT1: {}", enable);
        Ok(())
    }

    /// A wake-up event has latched (WU_IA in WAKE_UP_SRC).
    ///
    /// WAKE_UP_SRC can be read-to-clear depending on the part configuration;
    /// this performs exactly one register read. Use `wakeup_sources` when the
    /// per-axis flags are needed from the same read.
    pub fn wakeup_detected(&mut self) -> Result<bool, Error<E>> {
        Ok(self.wakeup_sources()?.wake_event())
    }

    /// Read WAKE_UP_SRC once and decode it. Never cached; capture the result
    /// of a single call instead of calling twice.
    pub fn wakeup_sources(&mut self) -> Result<WakeUpSource, Error<E>> {
        let src = self.read_register(Register::WakeUpSrc)?;
        Ok(WakeUpSource(src))
    }

    fn read_register(&mut self, register: Register) -> Result<u8, Error<E>> {
        let mut buffer = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register as u8], &mut buffer)
            .map_err(Error::I2c)?;
        Ok(buffer[0])
    }

    fn write_register(&mut self, register: Register, value: u8) -> Result<(), Error<E>> {
        self.i2c
            .write(self.address, &[register as u8, value])
            .map_err(Error::I2c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_register_rounding() {
        // 1 LSB at ±4g is 62.5mg; 500mg is exactly 8 LSB
        assert_eq!(threshold_register(500, 4_000), 8);
        // rounds to nearest: 531mg / 62.5 = 8.496 -> 8, 532mg -> 9
        assert_eq!(threshold_register(531, 4_000), 8);
        assert_eq!(threshold_register(532, 4_000), 9);
    }

    #[test]
    fn test_threshold_register_clamps() {
        for fs_mg in [2_000, 4_000, 8_000, 16_000] {
            // below one LSB clamps to the minimum of 1
            assert_eq!(threshold_register(0, fs_mg), 1);
            assert_eq!(threshold_register(fs_mg / 64 / 4, fs_mg), 1);
            // beyond full scale clamps to the 6-bit maximum
            assert_eq!(threshold_register(fs_mg, fs_mg), 63);
            assert_eq!(threshold_register(fs_mg * 4, fs_mg), 63);
            // absurd requests clamp too instead of overflowing
            assert_eq!(threshold_register(u32::MAX, fs_mg), 63);
        }
    }

    #[test]
    fn test_threshold_register_in_range() {
        for fs_mg in [2_000u32, 4_000, 8_000, 16_000] {
            for threshold_mg in (0..20_000).step_by(7) {
                let reg = threshold_register(threshold_mg, fs_mg);
                assert!((1..=63).contains(&reg));
            }
        }
    }

    #[test]
    fn test_full_scale_round_trip() {
        for fs in [
            FullScale::Fs2g,
            FullScale::Fs4g,
            FullScale::Fs8g,
            FullScale::Fs16g,
        ] {
            assert_eq!(FullScale::from_bits(fs as u8), fs);
        }
    }

    #[test]
    fn test_wake_up_source_bitfield() {
        // WU_IA and X_WU set
        let src = WakeUpSource(0b0000_1100);
        assert!(src.wake_event());
        assert!(src.x_wake());
        assert!(!src.y_wake());
        assert!(!src.z_wake());
        assert!(!src.free_fall());
        assert_eq!(src.bits(), 0b0000_1100);
    }
}

use embassy_time::{Duration, Instant};
use embedded_hal::digital::OutputPin;

/// White indicator built from the three onboard RGB outputs plus one
/// external LED.
///
/// The onboard pins are active low (drive low to light), the external pin is
/// active high. `on`/`off` preserve that asymmetry; the board is expected to
/// hand over the pins already in the inactive state.
pub struct WhiteLed<O> {
    blue: O,
    green: O,
    red: O,
    external: O,
}

impl<O: OutputPin> WhiteLed<O> {
    pub fn new(blue: O, green: O, red: O, external: O) -> Self {
        WhiteLed {
            blue,
            green,
            red,
            external,
        }
    }

    /// Drive all four outputs to their active level.
    pub fn on(&mut self) -> Result<(), O::Error> {
        self.blue.set_low()?;
        self.green.set_low()?;
        self.red.set_low()?;
        self.external.set_high()
    }

    /// Drive all four outputs to their inactive level.
    pub fn off(&mut self) -> Result<(), O::Error> {
        self.blue.set_high()?;
        self.green.set_high()?;
        self.red.set_high()?;
        self.external.set_low()
    }

    /// Give the pins back, e.g. for board-level teardown.
    pub fn release(self) -> (O, O, O, O) {
        (self.blue, self.green, self.red, self.external)
    }
}

/// Deadline-based self-clearing pulse state.
///
/// A trigger arms (or re-arms) a deadline one pulse duration away; polling
/// reports exactly one clear transition once the deadline passes. Re-triggers
/// while armed restart the countdown instead of stacking, so the output goes
/// inactive one duration after the last trigger.
///
/// The gate tracks state only; the caller owns the output switching, which
/// keeps the gate independent of pin types and timers.
pub struct PulseGate {
    duration: Duration,
    deadline: Option<Instant>,
}

impl PulseGate {
    pub fn new(duration: Duration) -> Self {
        PulseGate {
            duration,
            deadline: None,
        }
    }

    /// Arm or re-arm the pulse as of `now`. Returns true when the output
    /// must be switched on, i.e. the gate was idle.
    pub fn trigger_at(&mut self, now: Instant) -> bool {
        let was_idle = self.deadline.is_none();
        self.deadline = Some(now + self.duration);
        was_idle
    }

    /// Check the deadline as of `now`. Returns true exactly once per pulse,
    /// when the output must be switched off.
    pub fn expire_at(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn active(&self) -> bool {
        self.deadline.is_some()
    }

    /// `trigger_at` with the current time.
    pub fn trigger(&mut self) -> bool {
        self.trigger_at(Instant::now())
    }

    /// `expire_at` with the current time.
    pub fn expired(&mut self) -> bool {
        self.expire_at(Instant::now())
    }
}

/// Sample-to-sample delta motion rule.
///
/// Compares each X-axis reading against the previous one and reports motion
/// when the absolute delta exceeds the threshold. The previous reading starts
/// at zero, so a large first sample can trigger spuriously; that matches the
/// hardware behavior this rule replaced and is accepted.
pub struct DeltaDetector {
    threshold: u16,
    last_x: i16,
}

impl DeltaDetector {
    /// `threshold` is in raw ADC counts.
    pub fn new(threshold: u16) -> Self {
        DeltaDetector {
            threshold,
            last_x: 0,
        }
    }

    /// Feed one X-axis sample; returns whether it counts as motion.
    ///
    /// The reference sample updates unconditionally, trigger or not.
    pub fn observe(&mut self, x: i16) -> bool {
        let delta = (i32::from(x) - i32::from(self.last_x)).unsigned_abs();
        self.last_x = x;
        delta > u32::from(self.threshold)
    }
}

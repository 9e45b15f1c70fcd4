//! Volume control with logarithmic scaling
//!
//! Human-perceptual volume control using dB scaling. The level range is
//! 0-100%, mapped to -60 dB to 0 dB internally.

/// Volume controller with logarithmic scaling
///
/// 0% = -60 dB (near silence), 100% = 0 dB (unity gain).
#[derive(Debug, Clone)]
pub struct Volume {
    /// Volume level (0-100)
    level: u8,

    /// Cached linear gain multiplier
    linear_gain: f32,
}

impl Volume {
    /// Create a new volume controller clamped to 0-100
    pub fn new(level: u8) -> Self {
        let level = level.min(100);
        Self {
            level,
            linear_gain: Self::calculate_linear_gain(level),
        }
    }

    /// Set the volume level (0-100)
    pub fn set_level(&mut self, level: u8) {
        self.level = level.min(100);
        self.linear_gain = Self::calculate_linear_gain(self.level);
    }

    /// Current volume level (0-100)
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Linear gain multiplier applied by the audio sink
    pub fn gain(&self) -> f32 {
        self.linear_gain
    }

    /// Convert volume percentage to linear gain
    ///
    /// Formula: gain = 10^((level% - 100) * 0.6 / 20)
    /// - 0%   → silence
    /// - 50%  → -30 dB → 0.0316
    /// - 100% →   0 dB → 1.0 (unity)
    fn calculate_linear_gain(level: u8) -> f32 {
        if level == 0 {
            return 0.0;
        }

        let db = (level as f32 - 100.0) * 0.6;
        10.0_f32.powf(db / 20.0)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(80)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_clamps_to_100() {
        let mut vol = Volume::new(150);
        assert_eq!(vol.level(), 100);

        vol.set_level(255);
        assert_eq!(vol.level(), 100);
    }

    #[test]
    fn gain_calculation() {
        // 0% is silence
        assert_eq!(Volume::new(0).gain(), 0.0);

        // 100% is unity gain
        assert!((Volume::new(100).gain() - 1.0).abs() < 0.001);

        // 50% is -30 dB
        assert!((Volume::new(50).gain() - 0.0316).abs() < 0.001);
    }

    #[test]
    fn scaling_is_logarithmic() {
        // Well below linear scaling at every point
        assert!(Volume::new(25).gain() < 0.01);
        assert!(Volume::new(50).gain() < 0.1);
        assert!(Volume::new(75).gain() < 0.5);
    }
}

//! Output level with mute and ducking
//!
//! Levels are 0-100 and mapped onto -60 dB .. 0 dB before they reach the
//! output resource, so the scale feels even to the ear.

/// User level, mute flag and duck state of the output
#[derive(Debug, Clone)]
pub struct OutputVolume {
    level: u8,
    muted: bool,
    ducked: bool,
    duck_level: u8,
}

impl OutputVolume {
    /// Create a volume at `level`, ducking down to `duck_level`
    pub fn new(level: u8, duck_level: u8) -> Self {
        Self {
            level: level.min(100),
            muted: false,
            ducked: false,
            duck_level: duck_level.min(100),
        }
    }

    /// User-facing level (0-100)
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Set the user-facing level (clamped to 100)
    pub fn set_level(&mut self, level: u8) {
        self.level = level.min(100);
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }

    pub fn is_ducked(&self) -> bool {
        self.ducked
    }

    /// Lower the output while another app talks over us
    pub fn duck(&mut self) {
        self.ducked = true;
    }

    pub fn unduck(&mut self) {
        self.ducked = false;
    }

    /// Level actually applied, accounting for mute and ducking
    pub fn effective_level(&self) -> u8 {
        if self.muted {
            0
        } else if self.ducked {
            self.level.min(self.duck_level)
        } else {
            self.level
        }
    }

    /// Linear gain for the output resource
    ///
    /// 0 maps to silence, 100 to unity, everything between on a 60 dB curve:
    /// gain = 10^((level - 100) * 0.6 / 20)
    pub fn gain(&self) -> f32 {
        let level = self.effective_level();
        if level == 0 {
            return 0.0;
        }
        let db = (f32::from(level) - 100.0) * 0.6;
        10.0_f32.powf(db / 20.0)
    }
}

impl Default for OutputVolume {
    fn default() -> Self {
        Self::new(100, 20)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_is_clamped() {
        let mut volume = OutputVolume::new(150, 20);
        assert_eq!(volume.level(), 100);

        volume.set_level(200);
        assert_eq!(volume.level(), 100);
    }

    #[test]
    fn full_level_is_unity_gain() {
        let volume = OutputVolume::new(100, 20);
        assert!((volume.gain() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn half_level_is_minus_thirty_db() {
        let volume = OutputVolume::new(50, 20);
        let db = 20.0 * volume.gain().log10();
        assert!((db + 30.0).abs() < 0.01);
    }

    #[test]
    fn mute_silences_and_preserves_level() {
        let mut volume = OutputVolume::new(70, 20);
        volume.toggle_mute();
        assert_eq!(volume.gain(), 0.0);
        assert_eq!(volume.level(), 70);

        volume.toggle_mute();
        assert_eq!(volume.effective_level(), 70);
    }

    #[test]
    fn ducking_caps_the_level() {
        let mut volume = OutputVolume::new(90, 20);
        volume.duck();
        assert_eq!(volume.effective_level(), 20);

        volume.unduck();
        assert_eq!(volume.effective_level(), 90);
    }

    #[test]
    fn ducking_never_raises_a_quiet_level() {
        let mut volume = OutputVolume::new(10, 20);
        volume.duck();
        assert_eq!(volume.effective_level(), 10);
    }
}

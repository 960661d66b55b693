//! 17-bit LFSR noise.

/// Power-on register value. Any non-zero seed works; zero would lock up.
pub const NOISE_SEED: u32 = 0x1FFFF;

/// Bipolar pseudo-random bit stream clocked by its own phase accumulator,
/// so the noise pitch is independent of the note pitch.
#[derive(Debug, Clone)]
pub struct NoiseGenerator {
    register: u32,
    phase: f64,
    increment: f64,
    output: f64,
}

impl Default for NoiseGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl NoiseGenerator {
    pub fn new() -> Self {
        Self::with_seed(NOISE_SEED)
    }

    pub fn with_seed(seed: u32) -> Self {
        let register = match seed & 0x1FFFF {
            0 => NOISE_SEED,
            s => s,
        };
        NoiseGenerator {
            register,
            phase: 0.0,
            increment: 0.0,
            output: if register & 1 != 0 { 1.0 } else { -1.0 },
        }
    }

    /// Set the shift clock. Clocks above the host rate are clamped to one
    /// shift per sample.
    pub fn set_frequency(&mut self, frequency: f64, sample_rate: f64) {
        self.increment = if sample_rate > 0.0 {
            (frequency / sample_rate).clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    pub fn reset(&mut self) {
        *self = NoiseGenerator {
            increment: self.increment,
            ..Self::new()
        };
    }

    /// Shift the register once and return the new output bit as +/-1.
    pub fn step(&mut self) -> f64 {
        let bit = (self.register & 1) ^ ((self.register >> 3) & 1);
        self.register >>= 1;
        if bit != 0 {
            self.register |= 1 << 16;
        }
        self.output = if self.register & 1 != 0 { 1.0 } else { -1.0 };
        self.output
    }

    /// Advance one host sample; the register shifts only when the phase wraps.
    pub fn next_sample(&mut self) -> f64 {
        self.phase += self.increment;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
            self.step();
        }
        self.output
    }

    pub fn register(&self) -> u32 {
        self.register
    }
}

//! Lo-fi emulation: chip clock decimation and bit-depth quantization.
//!
//! A sound chip runs its own sample clock, usually slower than the audio
//! interface. `RateAccumulator` decides on which host frames a new chip
//! sample is due and the engine holds the previous one otherwise, which
//! gives the stepped aliasing of the real hardware.

/// Selectable chip clock rates in Hz, indexed by the `rateIndex` knob.
///
/// Every engine in this crate uses this one table.
pub const TARGET_RATES: [f64; 7] = [96000.0, 55500.0, 48000.0, 44100.0, 22050.0, 16000.0, 8000.0];

/// Upper bound on chip samples computed in one host frame when the chip
/// clock is faster than the host.
const MAX_STEPS_PER_FRAME: u32 = 8;

/// Resolve a rate index to Hz, clamping out-of-range indices to the last entry.
pub fn target_rate(index: u8) -> f64 {
    TARGET_RATES[(index as usize).min(TARGET_RATES.len() - 1)]
}

/// Phase accumulator running at `target / host` per host sample.
///
/// The ratio is capped at `MAX_STEPS_PER_FRAME`, so a chip clock more than
/// eight times the host rate actually runs at `host * 8`. Engines must
/// derive their pitch and envelope rates from `effective_rate`.
#[derive(Debug, Clone)]
pub struct RateAccumulator {
    acc: f64,
    ratio: f64,
    effective_rate: f64,
}

impl RateAccumulator {
    pub fn new(target_rate: f64, host_rate: f64) -> Self {
        let mut acc = RateAccumulator {
            acc: 0.0,
            ratio: 1.0,
            effective_rate: target_rate,
        };
        acc.set_rates(target_rate, host_rate);
        acc
    }

    pub fn set_rates(&mut self, target_rate: f64, host_rate: f64) {
        if host_rate > 0.0 && target_rate > 0.0 {
            self.ratio = (target_rate / host_rate).min(MAX_STEPS_PER_FRAME as f64);
            self.effective_rate = self.ratio * host_rate;
        } else {
            self.ratio = 1.0;
            self.effective_rate = target_rate.max(host_rate).max(1.0);
        }
    }

    /// Chip samples per second actually produced.
    pub fn effective_rate(&self) -> f64 {
        self.effective_rate
    }

    pub fn reset(&mut self) {
        self.acc = 0.0;
    }

    /// Advance one host frame and return how many chip samples are due.
    ///
    /// Zero means "hold the previous sample". More than one only happens
    /// when the chip clock outruns the host clock.
    pub fn tick(&mut self) -> u32 {
        self.acc += self.ratio;
        let mut due = 0;
        while self.acc >= 1.0 && due < MAX_STEPS_PER_FRAME {
            self.acc -= 1.0;
            due += 1;
        }
        if due == MAX_STEPS_PER_FRAME {
            self.acc = self.acc.fract();
        }
        due
    }
}

/// Linear step quantizer used after FM and wavetable synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDepth {
    Steps15,
    Steps31,
    Steps63,
    Steps255,
    #[default]
    Raw,
}

impl BitDepth {
    /// `0:15, 1:31, 2:63, 3:255`, anything else is raw.
    pub fn from_index(index: u8) -> Self {
        match index {
            0 => BitDepth::Steps15,
            1 => BitDepth::Steps31,
            2 => BitDepth::Steps63,
            3 => BitDepth::Steps255,
            _ => BitDepth::Raw,
        }
    }

    pub fn steps(self) -> Option<f64> {
        match self {
            BitDepth::Steps15 => Some(15.0),
            BitDepth::Steps31 => Some(31.0),
            BitDepth::Steps63 => Some(63.0),
            BitDepth::Steps255 => Some(255.0),
            BitDepth::Raw => None,
        }
    }

    /// Snap a [-1, 1] signal onto the step grid.
    pub fn quantize(self, x: f64) -> f64 {
        let Some(steps) = self.steps() else {
            return x;
        };
        let norm = (x.clamp(-1.0, 1.0) + 1.0) * 0.5;
        // The epsilon keeps values already on the grid from falling one step
        // on re-quantization.
        let q = (norm * steps + 1e-9).floor() / steps;
        q * 2.0 - 1.0
    }
}

/// Bit-crush modes for PCM sample playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PcmBitDepth {
    #[default]
    Off,
    Bits24,
    Bits16,
    Bits8,
    Bits5,
    Bits4,
}

impl PcmBitDepth {
    /// `0:off, 1:24-bit, 2:16-bit, 3:8-bit, 4:5-bit, 5:4-bit`.
    pub fn from_index(index: u8) -> Self {
        match index {
            1 => PcmBitDepth::Bits24,
            2 => PcmBitDepth::Bits16,
            3 => PcmBitDepth::Bits8,
            4 => PcmBitDepth::Bits5,
            5 => PcmBitDepth::Bits4,
            _ => PcmBitDepth::Off,
        }
    }

    pub fn max_value(self) -> Option<f64> {
        match self {
            PcmBitDepth::Off => None,
            PcmBitDepth::Bits24 => Some(8_388_607.0),
            PcmBitDepth::Bits16 => Some(32_767.0),
            PcmBitDepth::Bits8 => Some(127.0),
            PcmBitDepth::Bits5 => Some(15.0),
            PcmBitDepth::Bits4 => Some(7.0),
        }
    }

    pub fn crush(self, sample: f64) -> f64 {
        match self.max_value() {
            Some(max) => (sample * max).floor() / max,
            None => sample,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_rates_update_every_sample() {
        let mut acc = RateAccumulator::new(44100.0, 44100.0);
        for i in 0..1000 {
            assert_eq!(acc.tick(), 1, "held at frame {i}");
        }
    }

    #[test]
    fn half_rate_holds_every_other_sample() {
        let mut acc = RateAccumulator::new(22050.0, 44100.0);
        let pattern: Vec<u32> = (0..8).map(|_| acc.tick()).collect();
        assert_eq!(pattern, vec![0, 1, 0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn faster_chip_catches_up_in_one_frame() {
        let mut acc = RateAccumulator::new(96000.0, 48000.0);
        let total: u32 = (0..100).map(|_| acc.tick()).sum();
        assert_eq!(total, 200);
    }

    #[test]
    fn effective_rate_caps_at_eight_steps() {
        let acc = RateAccumulator::new(96000.0, 11025.0);
        assert_eq!(acc.effective_rate(), 88200.0);
        let acc = RateAccumulator::new(22050.0, 44100.0);
        assert_eq!(acc.effective_rate(), 22050.0);

        let mut acc = RateAccumulator::new(96000.0, 11025.0);
        let total: u32 = (0..11025).map(|_| acc.tick()).sum();
        assert_eq!(total, 88200);
    }

    #[test]
    fn rate_index_clamps() {
        assert_eq!(target_rate(0), 96000.0);
        assert_eq!(target_rate(1), 55500.0);
        assert_eq!(target_rate(6), 8000.0);
        assert_eq!(target_rate(200), 8000.0);
    }

    #[test]
    fn raw_passes_through() {
        assert_eq!(BitDepth::from_index(4).quantize(0.123), 0.123);
        assert_eq!(BitDepth::from_index(9), BitDepth::Raw);
    }

    #[test]
    fn quantize_snaps_to_grid() {
        let q = BitDepth::Steps15;
        assert_eq!(q.quantize(-1.0), -1.0);
        assert_eq!(q.quantize(1.0), 1.0);
        // norm 0.5 * 15 = 7.5 -> 7/15
        let mid = q.quantize(0.0);
        assert!((mid - (7.0 / 15.0 * 2.0 - 1.0)).abs() < 1e-12, "got {mid}");
    }

    #[test]
    fn quantize_is_idempotent() {
        for depth in [
            BitDepth::Steps15,
            BitDepth::Steps31,
            BitDepth::Steps63,
            BitDepth::Steps255,
            BitDepth::Raw,
        ] {
            for i in 0..=2000 {
                let x = -1.0 + i as f64 * 0.001;
                let once = depth.quantize(x);
                let twice = depth.quantize(once);
                assert!(
                    (once - twice).abs() < 1e-12,
                    "{depth:?}: quantize({x}) = {once}, again = {twice}"
                );
            }
        }
    }

    #[test]
    fn quantize_clamps_out_of_range() {
        assert_eq!(BitDepth::Steps31.quantize(3.0), 1.0);
        assert_eq!(BitDepth::Steps31.quantize(-3.0), -1.0);
    }

    #[test]
    fn pcm_crush_uses_floor() {
        let c = PcmBitDepth::Bits4;
        assert!((c.crush(0.5) - 3.0 / 7.0).abs() < 1e-12);
        assert!((c.crush(-0.5) + 4.0 / 7.0).abs() < 1e-12);
        assert_eq!(PcmBitDepth::Off.crush(0.3), 0.3);
        assert_eq!(PcmBitDepth::from_index(2).max_value(), Some(32_767.0));
    }
}

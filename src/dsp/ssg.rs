//! SSG-style tone + noise voice.
//!
//! A pulse or triangle/saw tone generator, crossfaded with LFSR noise,
//! shaped by the shared ADSR (with sustain smoothing) and an optional
//! repeating hardware envelope.

use crate::params::{ParameterSnapshot, SsgParams, SsgTone};

use super::envelope::Envelope;
use super::noise::NoiseGenerator;

/// Pulse duty presets, widest first.
pub const DUTY_PRESETS: [f64; 9] = [
    0.5, 0.4375, 0.375, 0.3125, 0.25, 0.1875, 0.125, 0.09375, 0.0625,
];

/// Fixed output headroom.
const OUTPUT_SCALE: f64 = 0.5;

/// Hardware envelope shapes, named after the classic register values 8-15.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwEnvelopeShape {
    /// `\\\\` repeating decay.
    DecaySaw,
    /// `\___` one decay, then silence.
    DecayHoldLow,
    /// `\/\/` decay/attack triangle.
    DecayTriangle,
    /// `\¯¯¯` one decay, then full level.
    DecayHoldHigh,
    /// `////` repeating attack.
    AttackSaw,
    /// `/¯¯¯` one attack, then full level.
    AttackHoldHigh,
    /// `/\/\` attack/decay triangle.
    AttackTriangle,
    /// `/___` one attack, then silence.
    AttackHoldLow,
}

impl HwEnvelopeShape {
    pub fn from_index(index: u8) -> Self {
        match index.min(7) {
            0 => HwEnvelopeShape::DecaySaw,
            1 => HwEnvelopeShape::DecayHoldLow,
            2 => HwEnvelopeShape::DecayTriangle,
            3 => HwEnvelopeShape::DecayHoldHigh,
            4 => HwEnvelopeShape::AttackSaw,
            5 => HwEnvelopeShape::AttackHoldHigh,
            6 => HwEnvelopeShape::AttackTriangle,
            _ => HwEnvelopeShape::AttackHoldLow,
        }
    }

    /// Gain for the given completed-cycle count and position within the cycle.
    pub fn gain(self, cycle: u32, frac: f64) -> f64 {
        let first = cycle == 0;
        let even = cycle % 2 == 0;
        let up = frac;
        let down = 1.0 - frac;
        match self {
            HwEnvelopeShape::DecaySaw => down,
            HwEnvelopeShape::DecayHoldLow => if first { down } else { 0.0 },
            HwEnvelopeShape::DecayTriangle => if even { down } else { up },
            HwEnvelopeShape::DecayHoldHigh => if first { down } else { 1.0 },
            HwEnvelopeShape::AttackSaw => up,
            HwEnvelopeShape::AttackHoldHigh => if first { up } else { 1.0 },
            HwEnvelopeShape::AttackTriangle => if even { up } else { down },
            HwEnvelopeShape::AttackHoldLow => if first { up } else { 0.0 },
        }
    }
}

/// Pulse level for a phase in [0, 1): high while below the duty threshold.
pub fn pulse(phase: f64, duty: f64, invert: bool) -> f64 {
    let high = phase < duty;
    if high != invert { 1.0 } else { -1.0 }
}

/// Piecewise-linear ramp peaking at `peak`: saw-down near 0, triangle at
/// 0.5, saw-up near 1.
pub fn ramp(phase: f64, peak: f64) -> f64 {
    let k = peak.clamp(0.001, 0.999);
    if phase < k {
        -1.0 + 2.0 * phase / k
    } else {
        1.0 - 2.0 * (phase - k) / (1.0 - k)
    }
}

/// One SSG voice.
#[derive(Debug, Clone)]
pub struct SsgEngine {
    params: SsgParams,
    sample_rate: f64,
    frequency: f64,
    velocity: f64,
    level: f64,
    bend: f64,
    tone_phase: f64,
    hw_phase: f64,
    hw_cycle: u32,
    noise: NoiseGenerator,
    envelope: Envelope,
}

impl SsgEngine {
    pub fn new(sample_rate: f64) -> Self {
        let mut engine = SsgEngine {
            params: SsgParams::default(),
            sample_rate,
            frequency: 440.0,
            velocity: 1.0,
            level: 1.0,
            bend: 1.0,
            tone_phase: 0.0,
            hw_phase: 0.0,
            hw_cycle: 0,
            noise: NoiseGenerator::new(),
            envelope: Envelope::new(sample_rate),
        };
        engine.envelope.smooth_sustain = true;
        engine.prepare(sample_rate);
        engine
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate.max(1.0);
        self.envelope.set_sample_rate(self.sample_rate);
        self.apply_envelope();
    }

    pub fn set_parameters(&mut self, snapshot: &ParameterSnapshot) {
        self.params = snapshot.ssg.clone();
        self.level = snapshot.output_level();
        self.bend = snapshot.bend_ratio();
        self.apply_envelope();
    }

    pub fn note_on(&mut self, frequency: f64, velocity: f64) {
        self.frequency = frequency.max(0.0);
        self.velocity = velocity.clamp(0.0, 1.0);
        self.tone_phase = 0.0;
        self.hw_phase = 0.0;
        self.hw_cycle = 0;
        self.noise.reset();
        self.apply_envelope();
        self.envelope.gate_on();
    }

    pub fn note_off(&mut self) {
        self.envelope.gate_off();
    }

    pub fn is_playing(&self) -> bool {
        !self.envelope.is_finished()
    }

    /// Generate the next sample.
    pub fn next_sample(&mut self) -> f64 {
        if !self.is_playing() {
            return 0.0;
        }

        let env = self.envelope.next_sample();
        let tone = self.tone_sample();
        let noise = self.noise.next_sample();
        let hw = self.hw_envelope_gain();

        let mix = self.params.mix.clamp(0.0, 1.0);
        let out = tone * (1.0 - mix) + noise * mix;
        out * env * hw * OUTPUT_SCALE * self.level * self.velocity
    }

    /// Mono voice, same signal on both sides.
    pub fn next_stereo(&mut self) -> (f64, f64) {
        let s = self.next_sample();
        (s, s)
    }

    fn apply_envelope(&mut self) {
        let e = self.params.envelope;
        self.envelope.set_adsr(e.attack, e.decay, e.sustain, e.release);
        self.envelope.bypass = self.params.adsr_bypass;
        self.noise
            .set_frequency(self.params.noise_frequency.max(0.0), self.sample_rate);
    }

    fn duty(&self) -> f64 {
        if self.params.variable_duty {
            self.params.duty.clamp(0.01, 0.99)
        } else {
            DUTY_PRESETS[(self.params.duty_preset as usize).min(DUTY_PRESETS.len() - 1)]
        }
    }

    /// Tone value at the current phase, then advance the phase.
    fn tone_sample(&mut self) -> f64 {
        let (value, frequency) = match self.params.tone {
            SsgTone::Pulse => (
                pulse(self.tone_phase, self.duty(), self.params.invert),
                self.frequency * self.bend,
            ),
            SsgTone::Triangle => {
                let frequency = if self.params.key_track {
                    self.frequency * self.bend
                } else {
                    self.params.manual_frequency.max(0.0)
                };
                (ramp(self.tone_phase, self.params.peak), frequency)
            }
        };

        let delta = (frequency / self.sample_rate).clamp(0.0, 1.0);
        self.tone_phase += delta;
        if self.tone_phase >= 1.0 {
            self.tone_phase -= 1.0;
        }
        value
    }

    fn hw_envelope_gain(&mut self) -> f64 {
        if !self.params.hw_envelope {
            return 1.0;
        }
        let shape = HwEnvelopeShape::from_index(self.params.hw_envelope_shape);
        let gain = shape.gain(self.hw_cycle, self.hw_phase);

        let delta = (self.params.hw_envelope_frequency.max(0.0) / self.sample_rate).min(1.0);
        self.hw_phase += delta;
        if self.hw_phase >= 1.0 {
            self.hw_phase -= 1.0;
            // Parity is all the repeating shapes need once past the first cycle.
            self.hw_cycle = if self.hw_cycle == 0 { 1 } else { 3 - self.hw_cycle };
        }
        gain
    }
}

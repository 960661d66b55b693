//! 4-operator FM voice.
//!
//! Four sine operators with their own envelopes, wired by one of eight
//! fixed algorithms. Operator 1 can feed back into itself. A shared LFO
//! drives pitch and amplitude modulation through sensitivity tables. The
//! whole voice runs on the chip clock selected by `rate_index` and is then
//! bit-quantized.

use std::f64::consts::{PI, TAU};

use crate::params::{FmOperatorParams, FmParams, LfoWaveform, ParameterSnapshot};

use super::envelope::Envelope;
use super::lofi::{target_rate, BitDepth, RateAccumulator};
use super::noise::NoiseGenerator;

/// Pitch modulation depth in cents per PMS setting.
pub const PMS_CENTS: [f64; 8] = [0.0, 3.4, 6.7, 10.0, 14.0, 20.0, 40.0, 80.0];

/// Amplitude modulation depth in dB per AMS setting.
pub const AMS_DB: [f64; 4] = [0.0, 1.4, 5.9, 11.8];

/// Operator 1 self-modulation depth in radians per feedback setting.
const FEEDBACK_DEPTH: [f64; 8] = [
    0.0,
    PI / 16.0,
    PI / 8.0,
    PI / 4.0,
    PI / 2.0,
    PI,
    2.0 * PI,
    4.0 * PI,
];

/// Phase deviation in radians produced by a full-scale modulator.
const MODULATION_DEPTH: f64 = PI;

/// Detune step in cents.
const DETUNE_CENTS: f64 = 2.0;

/// Lowest note frequency that key scaling starts from (A0).
const KEY_SCALE_BASE: f64 = 27.5;

/// Operators that reach the output, per algorithm.
const CARRIERS: [&[usize]; 8] = [
    &[3],
    &[3],
    &[3],
    &[3],
    &[1, 3],
    &[1, 2, 3],
    &[1, 2, 3],
    &[0, 1, 2, 3],
];

/// Low-frequency oscillator shared by all operators.
#[derive(Debug, Clone)]
struct Lfo {
    waveform: LfoWaveform,
    phase: f64,
    increment: f64,
    noise: NoiseGenerator,
    held_noise: f64,
}

impl Lfo {
    fn new() -> Self {
        Lfo {
            waveform: LfoWaveform::Triangle,
            phase: 0.0,
            increment: 0.0,
            noise: NoiseGenerator::new(),
            held_noise: 0.0,
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
        self.noise.reset();
        self.held_noise = 0.0;
    }

    /// Bipolar LFO value, then advance.
    fn next(&mut self) -> f64 {
        let p = self.phase;
        let value = match self.waveform {
            LfoWaveform::Saw => 2.0 * p - 1.0,
            LfoWaveform::Square => if p < 0.5 { 1.0 } else { -1.0 },
            LfoWaveform::Triangle => if p < 0.5 { 4.0 * p - 1.0 } else { 3.0 - 4.0 * p },
            LfoWaveform::Noise => self.held_noise,
        };
        self.phase += self.increment;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
            // Sample-and-hold a new value built from 8 LFSR bits.
            let mut acc = 0.0;
            for bit in 0..8 {
                if self.noise.step() > 0.0 {
                    acc += (1 << bit) as f64;
                }
            }
            self.held_noise = acc / 127.5 - 1.0;
        }
        value
    }
}

#[derive(Debug, Clone)]
struct Operator {
    params: FmOperatorParams,
    envelope: Envelope,
    phase: f64,
    increment: f64,
    gain: f64,
}

impl Operator {
    fn new(chip_rate: f64) -> Self {
        Operator {
            params: FmOperatorParams::default(),
            envelope: Envelope::new(chip_rate),
            phase: 0.0,
            increment: 0.0,
            gain: 1.0,
        }
    }

    /// Derive increment, gain and envelope times for a note.
    fn configure(&mut self, note_frequency: f64, bend: f64, chip_rate: f64) {
        let p = &self.params;
        let frequency = if p.fixed {
            p.fixed_frequency.max(0.0)
        } else {
            let multiplier = match p.multiplier.min(15) {
                0 => 0.5,
                m => m as f64,
            };
            let detune = (2.0_f64).powf(p.detune.clamp(-3, 3) as f64 * DETUNE_CENTS / 1200.0);
            note_frequency * bend * multiplier * detune
        };
        self.increment = (frequency / chip_rate).clamp(0.0, 0.5);
        self.gain = (10.0_f64).powf(-0.75 * p.total_level.min(127) as f64 / 20.0);

        // Higher notes run their envelopes faster.
        let octaves = (note_frequency / KEY_SCALE_BASE).max(1.0).log2();
        let speedup = (2.0_f64).powf(p.key_scale.min(3) as f64 * octaves / 8.0);
        let e = p.envelope;
        self.envelope.set_sample_rate(chip_rate);
        self.envelope.set_adsr(
            e.attack / speedup,
            e.decay / speedup,
            e.sustain,
            e.release / speedup,
        );
        self.envelope.sustain_rate = p.sustain_rate.max(0.0) / speedup;
    }

    /// One chip sample. `modulation` is a phase offset in radians.
    fn compute(&mut self, modulation: f64, pitch: f64, amplitude: f64) -> f64 {
        let env = self.envelope.next_sample();
        let out = (TAU * self.phase + modulation).sin() * env * self.gain * amplitude;
        self.phase += self.increment * pitch;
        self.phase -= self.phase.floor();
        out
    }
}

/// One FM voice.
#[derive(Debug, Clone)]
pub struct FmEngine {
    params: FmParams,
    operators: [Operator; 4],
    lfo: Lfo,
    clock: RateAccumulator,
    bit_depth: BitDepth,
    sample_rate: f64,
    chip_rate: f64,
    frequency: f64,
    velocity: f64,
    level: f64,
    bend: f64,
    feedback_history: [f64; 2],
    held: f64,
}

impl FmEngine {
    pub fn new(sample_rate: f64) -> Self {
        let params = FmParams::default();
        let chip_rate = target_rate(params.rate_index);
        let mut engine = FmEngine {
            operators: std::array::from_fn(|_| Operator::new(chip_rate)),
            params,
            lfo: Lfo::new(),
            clock: RateAccumulator::new(chip_rate, sample_rate),
            bit_depth: BitDepth::Raw,
            sample_rate,
            chip_rate,
            frequency: 440.0,
            velocity: 1.0,
            level: 1.0,
            bend: 1.0,
            feedback_history: [0.0; 2],
            held: 0.0,
        };
        engine.prepare(sample_rate);
        engine
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate.max(1.0);
        self.refresh();
    }

    pub fn set_parameters(&mut self, snapshot: &ParameterSnapshot) {
        self.params = snapshot.fm.clone();
        self.level = snapshot.output_level();
        self.bend = snapshot.bend_ratio();
        self.refresh();
    }

    pub fn note_on(&mut self, frequency: f64, velocity: f64) {
        self.frequency = frequency.max(0.0);
        self.velocity = velocity.clamp(0.0, 1.0);
        self.refresh();
        self.clock.reset();
        self.lfo.reset();
        self.feedback_history = [0.0; 2];
        self.held = 0.0;
        for op in &mut self.operators {
            op.phase = 0.0;
            op.envelope.gate_on();
        }
    }

    pub fn note_off(&mut self) {
        for op in &mut self.operators {
            op.envelope.gate_off();
        }
    }

    /// True until every carrier envelope has finished its release.
    pub fn is_playing(&self) -> bool {
        self.carriers()
            .iter()
            .any(|&i| !self.operators[i].envelope.is_finished())
    }

    /// Generate the next sample.
    pub fn next_sample(&mut self) -> f64 {
        if !self.is_playing() {
            return 0.0;
        }
        for _ in 0..self.clock.tick() {
            self.held = self.synthesize();
        }
        self.bit_depth.quantize(self.held) * self.level * self.velocity
    }

    /// Mono voice, same signal on both sides.
    pub fn next_stereo(&mut self) -> (f64, f64) {
        let s = self.next_sample();
        (s, s)
    }

    fn algorithm(&self) -> usize {
        (self.params.algorithm as usize).min(7)
    }

    fn carriers(&self) -> &'static [usize] {
        CARRIERS[self.algorithm()]
    }

    fn refresh(&mut self) {
        self.clock.set_rates(target_rate(self.params.rate_index), self.sample_rate);
        self.chip_rate = self.clock.effective_rate();
        self.bit_depth = BitDepth::from_index(self.params.bit_depth_index);
        self.lfo.waveform = self.params.lfo_waveform;
        self.lfo.increment = (self.params.lfo_frequency.max(0.0) / self.chip_rate).min(1.0);
        for (op, params) in self.operators.iter_mut().zip(self.params.operators) {
            op.params = params;
            op.configure(self.frequency, self.bend, self.chip_rate);
        }
    }

    /// Compute one chip-rate sample.
    fn synthesize(&mut self) -> f64 {
        let lfo = self.lfo.next();
        let pms = PMS_CENTS[(self.params.pms as usize).min(7)];
        let ams = AMS_DB[(self.params.ams as usize).min(3)];
        let pitch = (2.0_f64).powf(lfo * pms / 1200.0);
        let amplitude = (10.0_f64).powf(-ams * (lfo + 1.0) * 0.5 / 20.0);

        let fb_depth = FEEDBACK_DEPTH[(self.params.feedback as usize).min(7)];
        let feedback = (self.feedback_history[0] + self.feedback_history[1]) * 0.5 * fb_depth;

        let d = MODULATION_DEPTH;
        let algorithm = self.algorithm();
        let [op1, op2, op3, op4] = &mut self.operators;

        let m1 = op1.compute(feedback, pitch, amplitude);
        self.feedback_history = [m1, self.feedback_history[0]];

        match algorithm {
            // 1 -> 2 -> 3 -> 4
            0 => {
                let m2 = op2.compute(m1 * d, pitch, amplitude);
                let m3 = op3.compute(m2 * d, pitch, amplitude);
                op4.compute(m3 * d, pitch, amplitude)
            }
            // (1 + 2) -> 3 -> 4
            1 => {
                let m2 = op2.compute(0.0, pitch, amplitude);
                let m3 = op3.compute((m1 + m2) * d, pitch, amplitude);
                op4.compute(m3 * d, pitch, amplitude)
            }
            // (1 + (2 -> 3)) -> 4
            2 => {
                let m2 = op2.compute(0.0, pitch, amplitude);
                let m3 = op3.compute(m2 * d, pitch, amplitude);
                op4.compute((m1 + m3) * d, pitch, amplitude)
            }
            // ((1 -> 2) + 3) -> 4
            3 => {
                let m2 = op2.compute(m1 * d, pitch, amplitude);
                let m3 = op3.compute(0.0, pitch, amplitude);
                op4.compute((m2 + m3) * d, pitch, amplitude)
            }
            // (1 -> 2) + (3 -> 4)
            4 => {
                let c2 = op2.compute(m1 * d, pitch, amplitude);
                let m3 = op3.compute(0.0, pitch, amplitude);
                let c4 = op4.compute(m3 * d, pitch, amplitude);
                (c2 + c4) * 0.5
            }
            // 1 -> 2, 1 -> 3, 1 -> 4
            5 => {
                let c2 = op2.compute(m1 * d, pitch, amplitude);
                let c3 = op3.compute(m1 * d, pitch, amplitude);
                let c4 = op4.compute(m1 * d, pitch, amplitude);
                (c2 + c3 + c4) / 3.0
            }
            // (1 -> 2) + 3 + 4
            6 => {
                let c2 = op2.compute(m1 * d, pitch, amplitude);
                let c3 = op3.compute(0.0, pitch, amplitude);
                let c4 = op4.compute(0.0, pitch, amplitude);
                (c2 + c3 + c4) / 3.0
            }
            // 1 + 2 + 3 + 4
            _ => {
                let c2 = op2.compute(0.0, pitch, amplitude);
                let c3 = op3.compute(0.0, pitch, amplitude);
                let c4 = op4.compute(0.0, pitch, amplitude);
                (m1 + c2 + c3 + c4) * 0.25
            }
        }
    }
}

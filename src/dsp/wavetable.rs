//! Wavetable voice.
//!
//! A 64-sample master table, rebuilt only when the waveform selector (or
//! the custom table it reads) changes, read through a phase that a
//! vibrato LFO can displace. Like the FM voice it runs on a chip clock and
//! is bit-quantized afterwards.

use std::f64::consts::TAU;

use crate::params::{ParameterSnapshot, TableWaveform, WavetableParams};

use super::envelope::Envelope;
use super::lofi::{target_rate, BitDepth, RateAccumulator};
use super::noise::NoiseGenerator;

/// Master table length.
pub const TABLE_SIZE: usize = 64;

/// Extra vibrato depth contributed by a fully raised mod wheel.
const MOD_WHEEL_DEPTH: f64 = 0.1;

/// Build the 64-sample table for a waveform.
///
/// `custom` supplies user-drawn steps for the custom shapes: 32 steps are
/// stretched to 64 by reading index/2, 64 steps are used as-is. Missing
/// steps read as 0 and values are clamped to [-1, 1].
pub fn build_table(waveform: TableWaveform, custom: &[f64]) -> [f64; TABLE_SIZE] {
    let mut table = [0.0; TABLE_SIZE];
    let mut noise = NoiseGenerator::new();
    for (i, slot) in table.iter_mut().enumerate() {
        let t = i as f64 / TABLE_SIZE as f64;
        *slot = match waveform {
            TableWaveform::Sine => (TAU * t).sin(),
            TableWaveform::Triangle => {
                if t < 0.5 {
                    4.0 * t - 1.0
                } else {
                    3.0 - 4.0 * t
                }
            }
            TableWaveform::SawUp => 2.0 * t - 1.0,
            TableWaveform::SawDown => 1.0 - 2.0 * t,
            TableWaveform::Square => step(t < 0.5),
            TableWaveform::Pulse25 => step(t < 0.25),
            TableWaveform::Pulse12 => step(t < 0.125),
            TableWaveform::Noise => noise.step(),
            TableWaveform::Custom32 => custom_step(custom, i / 2),
            TableWaveform::Custom64 => custom_step(custom, i),
        };
    }
    table
}

fn step(high: bool) -> f64 {
    if high { 1.0 } else { -1.0 }
}

fn custom_step(custom: &[f64], index: usize) -> f64 {
    custom.get(index).copied().unwrap_or(0.0).clamp(-1.0, 1.0)
}

/// One wavetable voice.
#[derive(Debug, Clone)]
pub struct WavetableEngine {
    params: WavetableParams,
    table: [f64; TABLE_SIZE],
    envelope: Envelope,
    clock: RateAccumulator,
    bit_depth: BitDepth,
    sample_rate: f64,
    chip_rate: f64,
    frequency: f64,
    velocity: f64,
    level: f64,
    bend: f64,
    mod_wheel: f64,
    phase: f64,
    mod_phase: f64,
    held: f64,
}

impl WavetableEngine {
    pub fn new(sample_rate: f64) -> Self {
        let params = WavetableParams::default();
        let chip_rate = target_rate(params.rate_index);
        let mut engine = WavetableEngine {
            table: build_table(params.waveform, &params.custom_table),
            params,
            envelope: Envelope::new(chip_rate),
            clock: RateAccumulator::new(chip_rate, sample_rate),
            bit_depth: BitDepth::Raw,
            sample_rate,
            chip_rate,
            frequency: 440.0,
            velocity: 1.0,
            level: 1.0,
            bend: 1.0,
            mod_wheel: 0.0,
            phase: 0.0,
            mod_phase: 0.0,
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
        let next = &snapshot.wavetable;
        let table_changed = next.waveform != self.params.waveform
            || (next.waveform.is_custom() && next.custom_table != self.params.custom_table);
        if table_changed {
            log::debug!("wavetable: rebuilding table for {:?}", next.waveform);
            self.table = build_table(next.waveform, &next.custom_table);
        }
        self.params = next.clone();
        self.level = snapshot.output_level();
        self.bend = snapshot.bend_ratio();
        self.mod_wheel = snapshot.mod_wheel();
        self.refresh();
    }

    pub fn note_on(&mut self, frequency: f64, velocity: f64) {
        self.frequency = frequency.max(0.0);
        self.velocity = velocity.clamp(0.0, 1.0);
        self.phase = 0.0;
        self.mod_phase = 0.0;
        self.held = 0.0;
        self.clock.reset();
        self.envelope.gate_on();
    }

    pub fn note_off(&mut self) {
        self.envelope.gate_off();
    }

    pub fn is_playing(&self) -> bool {
        !self.envelope.is_finished()
    }

    pub fn table(&self) -> &[f64; TABLE_SIZE] {
        &self.table
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

    fn refresh(&mut self) {
        self.clock.set_rates(target_rate(self.params.rate_index), self.sample_rate);
        self.chip_rate = self.clock.effective_rate();
        self.bit_depth = BitDepth::from_index(self.params.bit_depth_index);
        let e = self.params.envelope;
        self.envelope.set_sample_rate(self.chip_rate);
        self.envelope.set_adsr(e.attack, e.decay, e.sustain, e.release);
    }

    /// Compute one chip-rate sample.
    fn synthesize(&mut self) -> f64 {
        let env = self.envelope.next_sample();
        let delta = (self.frequency * self.bend / self.chip_rate).clamp(0.0, 0.5);

        let depth = (self.params.mod_depth + self.mod_wheel * MOD_WHEEL_DEPTH).max(0.0);
        let offset = if depth > 0.0 {
            (TAU * self.mod_phase).sin() * depth
        } else {
            0.0
        };
        let read = (self.phase + offset).rem_euclid(1.0);
        let index = ((read * TABLE_SIZE as f64) as usize).min(TABLE_SIZE - 1);
        let sample = self.table[index];

        self.phase += delta;
        self.phase -= self.phase.floor();
        self.mod_phase += delta * self.params.mod_speed.max(0.0);
        self.mod_phase -= self.mod_phase.floor();

        sample * env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(waveform: TableWaveform) -> ParameterSnapshot {
        let mut snap = ParameterSnapshot::default();
        snap.level = 1.0;
        snap.wavetable.waveform = waveform;
        snap.wavetable.rate_index = 3;
        snap.wavetable.bit_depth_index = 4;
        snap.wavetable.envelope.attack = 0.001;
        snap.wavetable.envelope.sustain = 1.0;
        snap.wavetable.envelope.release = 0.01;
        snap
    }

    #[test]
    fn preset_tables() {
        let sine = build_table(TableWaveform::Sine, &[]);
        assert_eq!(sine[0], 0.0);
        assert!((sine[16] - 1.0).abs() < 1e-12);

        let square = build_table(TableWaveform::Square, &[]);
        assert_eq!(square[31], 1.0);
        assert_eq!(square[32], -1.0);

        let pulse = build_table(TableWaveform::Pulse12, &[]);
        assert_eq!(pulse.iter().filter(|&&v| v > 0.0).count(), 8);

        let pulse = build_table(TableWaveform::Pulse25, &[]);
        assert_eq!(pulse.iter().filter(|&&v| v > 0.0).count(), 16);

        let up = build_table(TableWaveform::SawUp, &[]);
        let down = build_table(TableWaveform::SawDown, &[]);
        assert_eq!(up[0], -1.0);
        assert_eq!(down[0], 1.0);
        assert!(up.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn noise_table_is_fixed() {
        let a = build_table(TableWaveform::Noise, &[]);
        let b = build_table(TableWaveform::Noise, &[]);
        assert_eq!(a, b);
        assert!(a.iter().all(|v| v.abs() == 1.0));
    }

    #[test]
    fn custom_32_expands_by_half_index() {
        let custom: Vec<f64> = (0..32).map(|i| i as f64 / 32.0).collect();
        let table = build_table(TableWaveform::Custom32, &custom);
        for i in 0..TABLE_SIZE {
            assert_eq!(table[i], custom[i / 2]);
        }
    }

    #[test]
    fn custom_64_is_direct_and_clamped() {
        let mut custom = vec![0.25; 64];
        custom[5] = 3.0;
        let table = build_table(TableWaveform::Custom64, &custom[..60]);
        assert_eq!(table[0], 0.25);
        assert_eq!(table[5], 1.0);
        assert_eq!(table[63], 0.0, "missing steps read as zero");
    }

    #[test]
    fn table_rebuilds_only_on_change() {
        let mut wt = WavetableEngine::new(44100.0);
        let mut snap = snapshot(TableWaveform::Custom64);
        snap.wavetable.custom_table = vec![0.5; 64];
        wt.set_parameters(&snap);
        assert_eq!(wt.table()[10], 0.5);

        snap.wavetable.custom_table[10] = -0.5;
        wt.set_parameters(&snap);
        assert_eq!(wt.table()[10], -0.5);

        snap.wavetable.waveform = TableWaveform::Square;
        wt.set_parameters(&snap);
        assert_eq!(wt.table()[10], 1.0);
    }

    #[test]
    fn square_plays_table_values() {
        let mut wt = WavetableEngine::new(44100.0);
        wt.set_parameters(&snapshot(TableWaveform::Square));
        wt.note_on(441.0, 1.0);
        for _ in 0..200 {
            wt.next_sample();
        }
        // Past the attack, output sits on +/-1.
        for _ in 0..200 {
            let s = wt.next_sample();
            assert!((s.abs() - 1.0).abs() < 1e-9, "got {s}");
        }
    }

    #[test]
    fn vibrato_displaces_phase() {
        let mut plain = WavetableEngine::new(44100.0);
        let mut wobbly = WavetableEngine::new(44100.0);
        let snap = snapshot(TableWaveform::SawUp);
        plain.set_parameters(&snap);
        let mut snap = snap.clone();
        snap.wavetable.mod_depth = 0.2;
        snap.wavetable.mod_speed = 0.05;
        wobbly.set_parameters(&snap);
        plain.note_on(220.0, 1.0);
        wobbly.note_on(220.0, 1.0);
        let differs = (0..5000).any(|_| plain.next_sample() != wobbly.next_sample());
        assert!(differs);
    }

    #[test]
    fn mod_wheel_adds_vibrato() {
        let mut plain = WavetableEngine::new(44100.0);
        let mut wheel = WavetableEngine::new(44100.0);
        let mut snap = snapshot(TableWaveform::SawUp);
        snap.wavetable.mod_depth = 0.0;
        snap.wavetable.mod_speed = 0.05;
        plain.set_parameters(&snap);
        snap.mod_wheel = 1.0;
        wheel.set_parameters(&snap);
        plain.note_on(220.0, 1.0);
        wheel.note_on(220.0, 1.0);
        let differs = (0..5000).any(|_| plain.next_sample() != wheel.next_sample());
        assert!(differs, "mod wheel alone should displace the read phase");
    }

    #[test]
    fn fast_chip_clock_keeps_pitch_on_slow_host() {
        for host in [44100.0, 11025.0] {
            let mut snap = snapshot(TableWaveform::Square);
            snap.wavetable.rate_index = 0; // 96 kHz, more than 8x an 11.025 kHz host
            let mut wt = WavetableEngine::new(host);
            wt.set_parameters(&snap);
            wt.note_on(100.0, 1.0);
            let mut prev = 0.0;
            let mut cycles = 0;
            for _ in 0..host as usize {
                let s = wt.next_sample();
                if prev <= 0.0 && s > 0.0 {
                    cycles += 1;
                }
                prev = s;
            }
            assert!((99..=101).contains(&cycles), "host {host}: {cycles} cycles");
        }
    }

    #[test]
    fn release_and_range() {
        let mut wt = WavetableEngine::new(48000.0);
        let mut snap = snapshot(TableWaveform::Triangle);
        snap.wavetable.rate_index = 6;
        snap.wavetable.bit_depth_index = 1;
        wt.set_parameters(&snap);
        wt.note_on(330.0, 0.7);
        for _ in 0..4800 {
            let s = wt.next_sample();
            assert!(s.abs() <= 1.0, "{s}");
        }
        wt.note_off();
        for _ in 0..4800 {
            wt.next_sample();
        }
        assert!(!wt.is_playing());
        assert_eq!(wt.next_sample(), 0.0);
    }
}

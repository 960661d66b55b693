//! Sample playback with ADPCM degradation.
//!
//! A voice holds the raw source audio plus a derived copy that has been
//! resampled to the chip rate and pushed through the 4-bit ADPCM codec.
//! Playback reads either the derived copy (nearest neighbour, like the
//! chip) or the raw audio (linear interpolation), with optional bit-crush.

use std::f64::consts::TAU;

use crate::params::{AdpcmParams, ParameterSnapshot, SamplePlayback};

use super::adpcm;
use super::envelope::Envelope;
use super::lofi::{target_rate, PcmBitDepth};
use super::pitch::semitones_to_ratio;

/// Vibrato depth in semitones at full mod wheel for the single-voice player.
const VIBRATO_DEPTH: f64 = 0.5;
/// Vibrato rate in Hz for the single-voice player.
const VIBRATO_RATE: f64 = 5.0;

/// A single sample buffer loaded into memory.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    /// Mono f32 samples.
    pub data: Vec<f32>,
    /// Native sample rate of the audio.
    pub sample_rate: f64,
}

impl SampleBuffer {
    pub fn new(data: Vec<f32>, sample_rate: f64) -> Self {
        SampleBuffer { data, sample_rate }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read a sample with linear interpolation at a fractional position.
    /// Positions past the end read the last sample.
    pub fn read_interpolated(&self, position: f64) -> f64 {
        if self.data.is_empty() || position < 0.0 {
            return 0.0;
        }

        let idx = position as usize;
        if idx >= self.data.len() - 1 {
            return self.data[self.data.len() - 1] as f64;
        }

        let frac = position - idx as f64;
        self.data[idx] as f64 * (1.0 - frac) + self.data[idx + 1] as f64 * frac
    }
}

/// Raw audio plus its ADPCM-degraded copy at the selected chip rate.
#[derive(Debug, Clone, Default)]
pub struct SampleSource {
    raw: SampleBuffer,
    degraded: Vec<i16>,
    degraded_rate: f64,
    /// Rate index the degraded copy was built for; `None` forces a rebuild.
    built_for: Option<u8>,
}

impl SampleSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install new audio and rebuild the degraded copy for `rate_index`.
    pub fn set_data(&mut self, data: &[f32], sample_rate: f64, rate_index: u8) {
        self.raw = SampleBuffer::new(data.to_vec(), sample_rate.max(0.0));
        self.built_for = None;
        self.ensure_rate(rate_index);
    }

    /// Rebuild the degraded copy if the rate selector moved.
    pub fn ensure_rate(&mut self, rate_index: u8) {
        if self.built_for == Some(rate_index) {
            return;
        }
        self.degraded_rate = target_rate(rate_index);
        self.degraded = adpcm::degrade(&self.raw.data, self.raw.sample_rate, self.degraded_rate);
        self.built_for = Some(rate_index);
        log::debug!(
            "sampler: re-encoded {} source frames to {} ADPCM frames at {} Hz",
            self.raw.len(),
            self.degraded.len(),
            self.degraded_rate
        );
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Frame count of the buffer `playback` reads.
    pub fn len(&self, playback: SamplePlayback) -> usize {
        match playback {
            SamplePlayback::Adpcm => self.degraded.len(),
            SamplePlayback::Raw => self.raw.len(),
        }
    }

    /// Rate of the buffer `playback` reads.
    pub fn native_rate(&self, playback: SamplePlayback) -> f64 {
        match playback {
            SamplePlayback::Adpcm => self.degraded_rate,
            SamplePlayback::Raw => self.raw.sample_rate,
        }
    }

    pub fn read(&self, playback: SamplePlayback, position: f64) -> f64 {
        match playback {
            SamplePlayback::Adpcm => {
                let Some(last) = self.degraded.len().checked_sub(1) else {
                    return 0.0;
                };
                let idx = (position.max(0.0) as usize).min(last);
                self.degraded[idx] as f64 / 32768.0
            }
            SamplePlayback::Raw => self.raw.read_interpolated(position),
        }
    }
}

/// Sine LFO producing the playback pitch ratio: pitch bend times
/// mod-wheel vibrato. Advanced once per frame.
#[derive(Debug, Clone, Default)]
pub struct Vibrato {
    phase: f64,
}

impl Vibrato {
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Return this frame's pitch ratio and advance the LFO.
    ///
    /// `depth` is in semitones at full mod wheel.
    pub fn next_ratio(
        &mut self,
        bend: f64,
        mod_wheel: f64,
        depth: f64,
        rate: f64,
        sample_rate: f64,
    ) -> f64 {
        let semitones = (TAU * self.phase).sin() * mod_wheel * depth;
        self.phase = (self.phase + rate.max(0.0) / sample_rate.max(1.0)).fract();
        bend * semitones_to_ratio(semitones)
    }
}

/// Single-voice ADPCM sample player.
#[derive(Debug, Clone)]
pub struct SampleEngine {
    params: AdpcmParams,
    source: SampleSource,
    envelope: Envelope,
    vibrato: Vibrato,
    crush: PcmBitDepth,
    sample_rate: f64,
    frequency: f64,
    velocity: f64,
    level: f64,
    bend: f64,
    mod_wheel: f64,
    /// Current read position in the active buffer (fractional).
    position: f64,
    increment: f64,
    active: bool,
    finished: bool,
}

impl SampleEngine {
    pub fn new(sample_rate: f64) -> Self {
        let mut engine = SampleEngine {
            params: AdpcmParams::default(),
            source: SampleSource::new(),
            envelope: Envelope::new(sample_rate),
            vibrato: Vibrato::default(),
            crush: PcmBitDepth::Off,
            sample_rate,
            frequency: 0.0,
            velocity: 1.0,
            level: 1.0,
            bend: 1.0,
            mod_wheel: 0.0,
            position: 0.0,
            increment: 0.0,
            active: false,
            finished: false,
        };
        engine.prepare(sample_rate);
        engine
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate.max(1.0);
        self.envelope.set_sample_rate(self.sample_rate);
        self.refresh();
    }

    pub fn set_parameters(&mut self, snapshot: &ParameterSnapshot) {
        let old_rate = self.source.native_rate(self.params.playback);
        self.params = snapshot.adpcm;
        self.level = snapshot.output_level();
        self.bend = snapshot.bend_ratio();
        self.mod_wheel = snapshot.mod_wheel();
        self.source.ensure_rate(self.params.rate_index);

        // Keep a playing note at the same point in time if the buffer changed.
        let new_rate = self.source.native_rate(self.params.playback);
        if old_rate > 0.0 && new_rate != old_rate {
            self.position *= new_rate / old_rate;
        }
        self.refresh();
    }

    /// Install new source audio. Forces a full rebuild of the ADPCM copy.
    pub fn set_sample_data(&mut self, data: &[f32], source_rate: f64) {
        self.source.set_data(data, source_rate, self.params.rate_index);
        self.refresh();
    }

    pub fn note_on(&mut self, frequency: f64, velocity: f64) {
        self.frequency = frequency.max(0.0);
        self.velocity = velocity.clamp(0.0, 1.0);
        self.position = 0.0;
        self.active = true;
        self.finished = self.source.len(self.params.playback) == 0;
        self.vibrato.reset();
        self.refresh();
        self.envelope.gate_on();
    }

    /// Begin release. One-shot samples ignore note-off and play to the end.
    pub fn note_off(&mut self) {
        if self.params.one_shot {
            return;
        }
        self.envelope.gate_off();
    }

    pub fn is_playing(&self) -> bool {
        self.active && !self.finished
    }

    /// Generate the next sample.
    pub fn next_sample(&mut self) -> f64 {
        if !self.is_playing() {
            return 0.0;
        }

        let playback = self.params.playback;
        let len = self.source.len(playback);
        if len == 0 {
            self.finished = true;
            return 0.0;
        }

        let sample = self.crush.crush(self.source.read(playback, self.position));
        let env = self.envelope.next_sample();
        let ratio = self.vibrato.next_ratio(
            self.bend,
            self.mod_wheel,
            VIBRATO_DEPTH,
            VIBRATO_RATE,
            self.sample_rate,
        );

        self.position += self.increment * ratio;
        if self.position >= len as f64 {
            if self.params.looping && !self.params.one_shot {
                self.position %= len as f64;
            } else {
                self.finished = true;
            }
        }
        if self.envelope.is_finished() {
            self.finished = true;
        }

        sample * env * self.level * self.velocity
    }

    /// Mono voice, same signal on both sides.
    pub fn next_stereo(&mut self) -> (f64, f64) {
        let s = self.next_sample();
        (s, s)
    }

    fn refresh(&mut self) {
        let e = self.params.envelope;
        self.envelope.set_adsr(e.attack, e.decay, e.sustain, e.release);
        self.crush = PcmBitDepth::from_index(self.params.crush_index);

        // note / root, times buffer rate / host rate; bend is applied per frame
        let root = self.params.root_frequency;
        let pitch = if root > 0.0 { self.frequency / root } else { 1.0 };
        let rate_ratio = self.source.native_rate(self.params.playback) / self.sample_rate;
        self.increment = (pitch * rate_ratio).max(0.0);
    }
}

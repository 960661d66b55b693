//! Rhythm mixer: eight sample pads mixed to stereo.
//!
//! Each pad owns its own source audio and ADPCM copy and is triggered by a
//! MIDI note. Pads release linearly from their own release time instead of
//! sharing an ADSR, and all of them follow one modulation LFO (pitch bend
//! times mod-wheel vibrato) evaluated once per frame.

use crate::error::ChipError;
use crate::params::{PadParams, ParameterSnapshot, RhythmParams, PAD_COUNT};

use super::lofi::PcmBitDepth;
use super::pitch::{frequency_to_midi, semitones_to_ratio, A4_FREQUENCY};
use super::sampler::{SampleSource, Vibrato};

/// Shortest release ramp in seconds.
const MIN_RELEASE: f64 = 0.001;

#[derive(Debug, Clone, Default)]
struct Pad {
    source: SampleSource,
    position: f64,
    /// Frames per host frame before modulation.
    increment: f64,
    gain: f64,
    release_step: f64,
    releasing: bool,
    active: bool,
}

impl Pad {
    fn trigger(&mut self, params: &PadParams, velocity: f64) {
        self.position = 0.0;
        self.gain = params.level.clamp(0.0, 1.0) * velocity;
        self.release_step = 0.0;
        self.releasing = false;
        self.active = self.source.len(params.playback) > 0;
    }

    /// Latch a linear ramp from the current gain to zero.
    fn release(&mut self, params: &PadParams, sample_rate: f64) {
        if !self.active || self.releasing || params.one_shot {
            return;
        }
        self.releasing = true;
        self.release_step = self.gain / (params.release.max(MIN_RELEASE) * sample_rate);
    }

    fn update_increment(&mut self, params: &PadParams, sample_rate: f64) {
        let rate = self.source.native_rate(params.playback);
        self.increment = semitones_to_ratio(params.tune) * rate / sample_rate;
    }

    fn next_sample(&mut self, params: &PadParams, crush: PcmBitDepth, ratio: f64) -> f64 {
        let len = self.source.len(params.playback);
        if len == 0 {
            self.active = false;
            return 0.0;
        }

        let sample = crush.crush(self.source.read(params.playback, self.position)) * self.gain;

        if self.releasing {
            self.gain -= self.release_step;
            if self.gain <= 0.0 {
                self.gain = 0.0;
                self.active = false;
            }
        }
        self.position += self.increment * ratio;
        if self.position >= len as f64 {
            self.active = false;
        }
        sample
    }
}

/// Eight-pad drum voice.
#[derive(Debug, Clone)]
pub struct RhythmMixer {
    params: RhythmParams,
    pads: [Pad; PAD_COUNT],
    crush: [PcmBitDepth; PAD_COUNT],
    vibrato: Vibrato,
    sample_rate: f64,
    level: f64,
    bend: f64,
    mod_wheel: f64,
}

impl RhythmMixer {
    pub fn new(sample_rate: f64) -> Self {
        let mut mixer = RhythmMixer {
            params: RhythmParams::default(),
            pads: Default::default(),
            crush: [PcmBitDepth::Off; PAD_COUNT],
            vibrato: Vibrato::default(),
            sample_rate,
            level: 1.0,
            bend: 1.0,
            mod_wheel: 0.0,
        };
        mixer.prepare(sample_rate);
        mixer
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate.max(1.0);
        self.refresh();
    }

    pub fn set_parameters(&mut self, snapshot: &ParameterSnapshot) {
        for (pad, (old, new)) in self
            .pads
            .iter_mut()
            .zip(self.params.pads.iter().zip(snapshot.rhythm.pads.iter()))
        {
            let old_rate = pad.source.native_rate(old.playback);
            pad.source.ensure_rate(new.rate_index);
            let new_rate = pad.source.native_rate(new.playback);
            if pad.active && old_rate > 0.0 && new_rate != old_rate {
                pad.position *= new_rate / old_rate;
            }
        }
        self.params = snapshot.rhythm.clone();
        self.level = snapshot.output_level();
        self.bend = snapshot.bend_ratio();
        self.mod_wheel = snapshot.mod_wheel();
        self.refresh();
    }

    /// Load audio into one pad.
    pub fn set_pad_sample(
        &mut self,
        index: usize,
        data: &[f32],
        source_rate: f64,
    ) -> Result<(), ChipError> {
        let Some(pad) = self.pads.get_mut(index) else {
            log::warn!("rhythm: ignoring sample for pad {index}");
            return Err(ChipError::PadIndex { index });
        };
        let params = &self.params.pads[index];
        pad.source.set_data(data, source_rate, params.rate_index);
        pad.active = false;
        pad.update_increment(params, self.sample_rate);
        Ok(())
    }

    /// Trigger the pads mapped to the nearest MIDI note of `frequency`.
    pub fn note_on(&mut self, frequency: f64, velocity: f64) {
        self.note_on_midi(frequency_to_midi(frequency, A4_FREQUENCY), velocity);
    }

    /// Trigger every pad mapped to `note`.
    pub fn note_on_midi(&mut self, note: u8, velocity: f64) {
        let velocity = velocity.clamp(0.0, 1.0);
        let mut any = false;
        for (pad, params) in self.pads.iter_mut().zip(self.params.pads.iter()) {
            if params.note == note {
                pad.trigger(params, velocity);
                any = true;
            }
        }
        if any {
            self.vibrato.reset();
        }
    }

    /// Release every sounding pad that is not one-shot.
    pub fn note_off(&mut self) {
        for (pad, params) in self.pads.iter_mut().zip(self.params.pads.iter()) {
            pad.release(params, self.sample_rate);
        }
    }

    /// Release the pads mapped to `note`.
    pub fn note_off_midi(&mut self, note: u8) {
        for (pad, params) in self.pads.iter_mut().zip(self.params.pads.iter()) {
            if params.note == note {
                pad.release(params, self.sample_rate);
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.pads.iter().any(|p| p.active)
    }

    /// Mix one stereo frame.
    pub fn next_stereo(&mut self) -> (f64, f64) {
        if !self.is_playing() {
            return (0.0, 0.0);
        }

        let ratio = self.vibrato.next_ratio(
            self.bend,
            self.mod_wheel,
            self.params.vibrato_depth,
            self.params.vibrato_rate,
            self.sample_rate,
        );

        let mut left = 0.0;
        let mut right = 0.0;
        for (i, pad) in self.pads.iter_mut().enumerate() {
            if !pad.active {
                continue;
            }
            let params = &self.params.pads[i];
            let s = pad.next_sample(params, self.crush[i], ratio);
            let pan = params.pan.clamp(0.0, 1.0);
            left += s * (1.0 - pan);
            right += s * pan;
        }
        (left * self.level, right * self.level)
    }

    /// Mono fold-down of `next_stereo`.
    pub fn next_sample(&mut self) -> f64 {
        let (l, r) = self.next_stereo();
        (l + r) * 0.5
    }

    fn refresh(&mut self) {
        for (i, pad) in self.pads.iter_mut().enumerate() {
            let params = &self.params.pads[i];
            self.crush[i] = PcmBitDepth::from_index(params.crush_index);
            pad.update_increment(params, self.sample_rate);
        }
    }
}

//! Voice: one playing instance of whichever engine the snapshot selects.

use crate::error::ChipError;
use crate::params::{scale_velocity, ChipMode, ParameterSnapshot};

use super::fm::FmEngine;
use super::rhythm::RhythmMixer;
use super::sampler::SampleEngine;
use super::ssg::SsgEngine;
use super::wavetable::WavetableEngine;

/// The engine behind a voice.
#[derive(Debug, Clone)]
enum Engine {
    Ssg(SsgEngine),
    Fm(Box<FmEngine>),
    Wavetable(WavetableEngine),
    Adpcm(SampleEngine),
    Rhythm(Box<RhythmMixer>),
}

impl Engine {
    fn new(mode: ChipMode, sample_rate: f64) -> Self {
        match mode {
            ChipMode::Ssg => Engine::Ssg(SsgEngine::new(sample_rate)),
            ChipMode::Fm => Engine::Fm(Box::new(FmEngine::new(sample_rate))),
            ChipMode::Wavetable => Engine::Wavetable(WavetableEngine::new(sample_rate)),
            ChipMode::Adpcm => Engine::Adpcm(SampleEngine::new(sample_rate)),
            ChipMode::Rhythm => Engine::Rhythm(Box::new(RhythmMixer::new(sample_rate))),
        }
    }

    fn mode(&self) -> ChipMode {
        match self {
            Engine::Ssg(_) => ChipMode::Ssg,
            Engine::Fm(_) => ChipMode::Fm,
            Engine::Wavetable(_) => ChipMode::Wavetable,
            Engine::Adpcm(_) => ChipMode::Adpcm,
            Engine::Rhythm(_) => ChipMode::Rhythm,
        }
    }
}

/// One playing instance of the engine selected by `ChipMode`.
#[derive(Debug, Clone)]
pub struct ChipVoice {
    engine: Engine,
    sample_rate: f64,
    velocity_sensitivity: f64,
}

impl ChipVoice {
    pub fn new(mode: ChipMode, sample_rate: f64) -> Self {
        ChipVoice {
            engine: Engine::new(mode, sample_rate),
            sample_rate,
            velocity_sensitivity: 1.0,
        }
    }

    /// Build a voice for `snapshot.mode` with the snapshot already applied.
    pub fn from_snapshot(snapshot: &ParameterSnapshot, sample_rate: f64) -> Self {
        let mut voice = ChipVoice::new(snapshot.mode, sample_rate);
        voice.set_parameters(snapshot);
        voice
    }

    pub fn mode(&self) -> ChipMode {
        self.engine.mode()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        match &mut self.engine {
            Engine::Ssg(e) => e.prepare(sample_rate),
            Engine::Fm(e) => e.prepare(sample_rate),
            Engine::Wavetable(e) => e.prepare(sample_rate),
            Engine::Adpcm(e) => e.prepare(sample_rate),
            Engine::Rhythm(e) => e.prepare(sample_rate),
        }
    }

    /// Apply a snapshot. A different mode replaces the engine with a fresh
    /// one at the current rate; loaded sample data does not carry over.
    pub fn set_parameters(&mut self, snapshot: &ParameterSnapshot) {
        if snapshot.mode != self.mode() {
            log::debug!("voice: switching {:?} -> {:?}", self.mode(), snapshot.mode);
            self.engine = Engine::new(snapshot.mode, self.sample_rate);
        }
        self.velocity_sensitivity = snapshot.velocity_sensitivity;
        match &mut self.engine {
            Engine::Ssg(e) => e.set_parameters(snapshot),
            Engine::Fm(e) => e.set_parameters(snapshot),
            Engine::Wavetable(e) => e.set_parameters(snapshot),
            Engine::Adpcm(e) => e.set_parameters(snapshot),
            Engine::Rhythm(e) => e.set_parameters(snapshot),
        }
    }

    /// Start a note. `velocity` is scaled by the snapshot's velocity
    /// sensitivity before it reaches the engine.
    pub fn note_on(&mut self, frequency: f64, velocity: f64) {
        let velocity = scale_velocity(self.velocity_sensitivity, velocity);
        match &mut self.engine {
            Engine::Ssg(e) => e.note_on(frequency, velocity),
            Engine::Fm(e) => e.note_on(frequency, velocity),
            Engine::Wavetable(e) => e.note_on(frequency, velocity),
            Engine::Adpcm(e) => e.note_on(frequency, velocity),
            Engine::Rhythm(e) => e.note_on(frequency, velocity),
        }
    }

    pub fn note_off(&mut self) {
        match &mut self.engine {
            Engine::Ssg(e) => e.note_off(),
            Engine::Fm(e) => e.note_off(),
            Engine::Wavetable(e) => e.note_off(),
            Engine::Adpcm(e) => e.note_off(),
            Engine::Rhythm(e) => e.note_off(),
        }
    }

    pub fn is_playing(&self) -> bool {
        match &self.engine {
            Engine::Ssg(e) => e.is_playing(),
            Engine::Fm(e) => e.is_playing(),
            Engine::Wavetable(e) => e.is_playing(),
            Engine::Adpcm(e) => e.is_playing(),
            Engine::Rhythm(e) => e.is_playing(),
        }
    }

    pub fn next_sample(&mut self) -> f64 {
        match &mut self.engine {
            Engine::Ssg(e) => e.next_sample(),
            Engine::Fm(e) => e.next_sample(),
            Engine::Wavetable(e) => e.next_sample(),
            Engine::Adpcm(e) => e.next_sample(),
            Engine::Rhythm(e) => e.next_sample(),
        }
    }

    pub fn next_stereo(&mut self) -> (f64, f64) {
        match &mut self.engine {
            Engine::Ssg(e) => e.next_stereo(),
            Engine::Fm(e) => e.next_stereo(),
            Engine::Wavetable(e) => e.next_stereo(),
            Engine::Adpcm(e) => e.next_stereo(),
            Engine::Rhythm(e) => e.next_stereo(),
        }
    }

    /// Load source audio. The ADPCM voice takes it directly, the rhythm
    /// voice loads it into pad 0, the synth voices ignore it.
    pub fn set_sample_data(&mut self, data: &[f32], source_rate: f64) -> Result<(), ChipError> {
        match &mut self.engine {
            Engine::Adpcm(e) => e.set_sample_data(data, source_rate),
            Engine::Rhythm(e) => e.set_pad_sample(0, data, source_rate)?,
            other => log::debug!("voice: {:?} ignores sample data", other.mode()),
        }
        Ok(())
    }

    /// Load audio into a rhythm pad. Other voices reject it as an
    /// out-of-range pad.
    pub fn set_pad_sample(
        &mut self,
        index: usize,
        data: &[f32],
        source_rate: f64,
    ) -> Result<(), ChipError> {
        match &mut self.engine {
            Engine::Rhythm(e) => e.set_pad_sample(index, data, source_rate),
            other => {
                log::warn!("voice: {:?} has no pads", other.mode());
                Err(ChipError::PadIndex { index })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SamplePlayback;

    #[test]
    fn default_snapshot_plays_ssg() {
        let snap = ParameterSnapshot::default();
        let mut voice = ChipVoice::from_snapshot(&snap, 44100.0);
        assert_eq!(voice.mode(), ChipMode::Ssg);
        voice.note_on(440.0, 1.0);
        let peak = (0..4410).map(|_| voice.next_sample().abs()).fold(0.0, f64::max);
        assert!(peak > 0.1, "expected sound, peak {peak}");
    }

    #[test]
    fn mode_change_swaps_engine() {
        let mut snap = ParameterSnapshot::default();
        let mut voice = ChipVoice::from_snapshot(&snap, 48000.0);
        let modes = [
            ChipMode::Fm,
            ChipMode::Wavetable,
            ChipMode::Adpcm,
            ChipMode::Rhythm,
            ChipMode::Ssg,
        ];
        for mode in modes {
            snap.mode = mode;
            voice.set_parameters(&snap);
            assert_eq!(voice.mode(), mode);
            assert_eq!(voice.sample_rate(), 48000.0);
        }
    }

    #[test]
    fn mono_engines_duplicate_to_stereo() {
        let mut snap = ParameterSnapshot::default();
        snap.mode = ChipMode::Wavetable;
        let mut voice = ChipVoice::from_snapshot(&snap, 44100.0);
        voice.note_on(220.0, 1.0);
        for _ in 0..1000 {
            let (l, r) = voice.next_stereo();
            assert_eq!(l, r);
        }
    }

    #[test]
    fn sample_data_reaches_adpcm_engine() {
        let mut snap = ParameterSnapshot::default();
        snap.mode = ChipMode::Adpcm;
        snap.adpcm.playback = SamplePlayback::Raw;
        snap.adpcm.one_shot = true;
        let mut voice = ChipVoice::from_snapshot(&snap, 44100.0);
        voice.set_sample_data(&[0.5; 100], 44100.0).unwrap();
        voice.note_on(snap.adpcm.root_frequency, 1.0);
        let mut frames = 0;
        while voice.is_playing() {
            voice.next_sample();
            frames += 1;
        }
        assert_eq!(frames, 100);
    }

    #[test]
    fn pads_only_on_rhythm() {
        let mut snap = ParameterSnapshot::default();
        let mut voice = ChipVoice::from_snapshot(&snap, 44100.0);
        assert!(voice.set_pad_sample(0, &[0.5; 8], 44100.0).is_err());

        snap.mode = ChipMode::Rhythm;
        voice.set_parameters(&snap);
        assert!(voice.set_pad_sample(3, &[0.5; 8], 44100.0).is_ok());
        assert!(voice.set_pad_sample(8, &[0.5; 8], 44100.0).is_err());
    }

    #[test]
    fn rhythm_sample_data_loads_first_pad() {
        let mut snap = ParameterSnapshot::default();
        snap.mode = ChipMode::Rhythm;
        snap.rhythm.pads[0].playback = SamplePlayback::Raw;
        let mut voice = ChipVoice::from_snapshot(&snap, 44100.0);
        assert!(voice.set_sample_data(&[0.5; 100], 44100.0).is_ok());

        let kick = crate::dsp::pitch::midi_to_frequency(snap.rhythm.pads[0].note, 440.0);
        voice.note_on(kick, 1.0);
        assert!(voice.is_playing(), "pad 0 should hold the loaded sample");
    }

    #[test]
    fn synth_voice_ignores_sample_data() {
        let mut voice = ChipVoice::new(ChipMode::Fm, 44100.0);
        assert!(voice.set_sample_data(&[0.5; 100], 44100.0).is_ok());
    }

    #[test]
    fn velocity_sensitivity_off_plays_full_level() {
        let mut snap = ParameterSnapshot::default();
        snap.mode = ChipMode::Adpcm;
        snap.level = 1.0;
        snap.velocity_sensitivity = 0.0;
        snap.adpcm.playback = SamplePlayback::Raw;
        let mut voice = ChipVoice::from_snapshot(&snap, 44100.0);
        voice.set_sample_data(&[0.5; 1000], 44100.0).unwrap();
        voice.note_on(snap.adpcm.root_frequency, 0.1);
        let mut last = 0.0;
        for _ in 0..200 {
            last = voice.next_sample();
        }
        assert!((last - 0.5).abs() < 1e-9, "got {last}");
    }

    #[test]
    fn prepare_updates_rate() {
        let mut voice = ChipVoice::new(ChipMode::Fm, 44100.0);
        voice.prepare(96000.0);
        assert_eq!(voice.sample_rate(), 96000.0);
    }
}

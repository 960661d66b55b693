//! Parameter snapshot types.
//!
//! A `ParameterSnapshot` is handed wholesale to an engine's
//! `set_parameters`. Every field has a default, so a partial JSON snapshot
//! fills in the rest. Values are stored as the host sent them; each engine
//! clamps at the point of use.

use serde::{Deserialize, Serialize};

use crate::error::ChipError;

/// Number of pads in the rhythm unit.
pub const PAD_COUNT: usize = 8;

/// Which chip engine renders the voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChipMode {
    #[default]
    Ssg,
    Fm,
    Wavetable,
    Adpcm,
    Rhythm,
}

/// Top-level snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParameterSnapshot {
    pub mode: ChipMode,
    /// Output level [0, 1].
    pub level: f64,
    /// How much note velocity scales the output: 0 ignores it, 1 is fully
    /// velocity sensitive.
    pub velocity_sensitivity: f64,
    /// Pitch bend wheel [-1, 1].
    pub pitch_bend: f64,
    /// Bend range in semitones.
    pub pitch_bend_range: f64,
    /// Mod wheel [0, 1].
    pub mod_wheel: f64,
    pub ssg: SsgParams,
    pub fm: FmParams,
    pub wavetable: WavetableParams,
    pub adpcm: AdpcmParams,
    pub rhythm: RhythmParams,
}

impl Default for ParameterSnapshot {
    fn default() -> Self {
        ParameterSnapshot {
            mode: ChipMode::Ssg,
            level: 0.8,
            velocity_sensitivity: 1.0,
            pitch_bend: 0.0,
            pitch_bend_range: 2.0,
            mod_wheel: 0.0,
            ssg: SsgParams::default(),
            fm: FmParams::default(),
            wavetable: WavetableParams::default(),
            adpcm: AdpcmParams::default(),
            rhythm: RhythmParams::default(),
        }
    }
}

impl ParameterSnapshot {
    /// Parse a snapshot from JSON. Missing fields take their defaults.
    pub fn from_json(source: &str) -> Result<Self, ChipError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn to_json(&self) -> Result<String, ChipError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Output level clamped to [0, 1].
    pub fn output_level(&self) -> f64 {
        self.level.clamp(0.0, 1.0)
    }

    /// Frequency multiplier from the pitch bend wheel.
    pub fn bend_ratio(&self) -> f64 {
        let semitones = self.pitch_bend.clamp(-1.0, 1.0) * self.pitch_bend_range.clamp(0.0, 48.0);
        (2.0_f64).powf(semitones / 12.0)
    }

    pub fn mod_wheel(&self) -> f64 {
        self.mod_wheel.clamp(0.0, 1.0)
    }
}

/// Blend between a fixed full-scale gain (sensitivity 0) and the raw
/// velocity (sensitivity 1).
pub fn scale_velocity(sensitivity: f64, velocity: f64) -> f64 {
    let sens = sensitivity.clamp(0.0, 1.0);
    1.0 - sens + sens * velocity.clamp(0.0, 1.0)
}

/// ADSR times in seconds and sustain level [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdsrParams {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl Default for AdsrParams {
    fn default() -> Self {
        AdsrParams {
            attack: 0.005,
            decay: 0.1,
            sustain: 0.8,
            release: 0.2,
        }
    }
}

// ── SSG ─────────────────────────────────────────────────────

/// Tone generator shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SsgTone {
    #[default]
    Pulse,
    Triangle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SsgParams {
    pub tone: SsgTone,
    /// Index into the duty presets, 0 (50%) to 8 (6.25%).
    pub duty_preset: u8,
    /// Use `duty` instead of the preset table.
    pub variable_duty: bool,
    /// Continuous duty ratio (0, 1).
    pub duty: f64,
    /// Flip the pulse polarity.
    pub invert: bool,
    /// Triangle follows the note pitch; otherwise `manual_frequency`.
    pub key_track: bool,
    pub manual_frequency: f64,
    /// Triangle peak position: 0 saw-down, 0.5 triangle, 1 saw-up.
    pub peak: f64,
    /// Noise shift clock in Hz.
    pub noise_frequency: f64,
    /// Tone/noise crossfade: 0 tone only, 1 noise only.
    pub mix: f64,
    pub hw_envelope: bool,
    /// Hardware envelope shape 0..=7.
    pub hw_envelope_shape: u8,
    /// Hardware envelope period rate in Hz.
    pub hw_envelope_frequency: f64,
    /// Skip the ADSR and gate the tone on/off.
    pub adsr_bypass: bool,
    pub envelope: AdsrParams,
}

impl Default for SsgParams {
    fn default() -> Self {
        SsgParams {
            tone: SsgTone::Pulse,
            duty_preset: 0,
            variable_duty: false,
            duty: 0.5,
            invert: false,
            key_track: true,
            manual_frequency: 440.0,
            peak: 0.5,
            noise_frequency: 8000.0,
            mix: 0.0,
            hw_envelope: false,
            hw_envelope_shape: 0,
            hw_envelope_frequency: 4.0,
            adsr_bypass: false,
            envelope: AdsrParams::default(),
        }
    }
}

// ── FM ──────────────────────────────────────────────────────

/// LFO shape for the FM voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LfoWaveform {
    Saw,
    Square,
    #[default]
    Triangle,
    Noise,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FmOperatorParams {
    /// Frequency multiplier 0..=15; 0 means one half.
    pub multiplier: u8,
    /// Detune -3..=3.
    pub detune: i8,
    /// Attenuation 0..=127 in 0.75 dB steps.
    pub total_level: u8,
    /// Envelope key scaling 0..=3.
    pub key_scale: u8,
    /// Ignore the note pitch and run at `fixed_frequency`.
    pub fixed: bool,
    pub fixed_frequency: f64,
    pub envelope: AdsrParams,
    /// Second decay time while sustaining; 0 holds.
    pub sustain_rate: f64,
}

impl Default for FmOperatorParams {
    fn default() -> Self {
        FmOperatorParams {
            multiplier: 1,
            detune: 0,
            total_level: 0,
            key_scale: 0,
            fixed: false,
            fixed_frequency: 440.0,
            envelope: AdsrParams {
                attack: 0.002,
                decay: 0.3,
                sustain: 0.7,
                release: 0.25,
            },
            sustain_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FmParams {
    /// Routing topology 0..=7.
    pub algorithm: u8,
    /// Operator 1 self-feedback 0..=7.
    pub feedback: u8,
    pub operators: [FmOperatorParams; 4],
    pub lfo_waveform: LfoWaveform,
    pub lfo_frequency: f64,
    /// Pitch modulation sensitivity 0..=7.
    pub pms: u8,
    /// Amplitude modulation sensitivity 0..=3.
    pub ams: u8,
    pub rate_index: u8,
    pub bit_depth_index: u8,
}

impl Default for FmParams {
    fn default() -> Self {
        FmParams {
            algorithm: 4,
            feedback: 0,
            operators: [FmOperatorParams::default(); 4],
            lfo_waveform: LfoWaveform::Triangle,
            lfo_frequency: 5.0,
            pms: 0,
            ams: 0,
            rate_index: 1,
            bit_depth_index: 4,
        }
    }
}

// ── Wavetable ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TableWaveform {
    #[default]
    Sine,
    Triangle,
    SawUp,
    SawDown,
    Square,
    Pulse25,
    Pulse12,
    Noise,
    Custom32,
    Custom64,
}

impl TableWaveform {
    pub fn is_custom(self) -> bool {
        matches!(self, TableWaveform::Custom32 | TableWaveform::Custom64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WavetableParams {
    pub waveform: TableWaveform,
    /// User-drawn steps in [-1, 1]; 32 or 64 are read depending on `waveform`.
    pub custom_table: Vec<f64>,
    /// Vibrato depth as a fraction of one cycle.
    pub mod_depth: f64,
    /// Vibrato speed relative to the note frequency.
    pub mod_speed: f64,
    pub rate_index: u8,
    pub bit_depth_index: u8,
    pub envelope: AdsrParams,
}

impl Default for WavetableParams {
    fn default() -> Self {
        WavetableParams {
            waveform: TableWaveform::Sine,
            custom_table: Vec::new(),
            mod_depth: 0.0,
            mod_speed: 0.01,
            rate_index: 1,
            bit_depth_index: 0,
            envelope: AdsrParams::default(),
        }
    }
}

// ── Sample playback ─────────────────────────────────────────

/// Which buffer a sample voice reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplePlayback {
    #[default]
    Adpcm,
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdpcmParams {
    pub playback: SamplePlayback,
    /// ADPCM re-encode rate index.
    pub rate_index: u8,
    /// PCM bit-crush index, 0 is off.
    pub crush_index: u8,
    /// Play to the end once, ignoring note-off.
    pub one_shot: bool,
    pub looping: bool,
    /// Note frequency at which the sample plays at its native speed.
    pub root_frequency: f64,
    pub envelope: AdsrParams,
}

impl Default for AdpcmParams {
    fn default() -> Self {
        AdpcmParams {
            playback: SamplePlayback::Adpcm,
            rate_index: 5,
            crush_index: 0,
            one_shot: false,
            looping: false,
            root_frequency: 261.625_565_300_598_6,
            envelope: AdsrParams {
                attack: 0.001,
                decay: 0.1,
                sustain: 1.0,
                release: 0.1,
            },
        }
    }
}

// ── Rhythm ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PadParams {
    /// MIDI note that triggers the pad.
    pub note: u8,
    pub level: f64,
    /// 0 hard left, 1 hard right.
    pub pan: f64,
    /// Tuning in semitones.
    pub tune: f64,
    /// Linear release time in seconds.
    pub release: f64,
    pub one_shot: bool,
    pub playback: SamplePlayback,
    pub rate_index: u8,
    pub crush_index: u8,
}

impl Default for PadParams {
    fn default() -> Self {
        PadParams {
            note: 36,
            level: 1.0,
            pan: 0.5,
            tune: 0.0,
            release: 0.05,
            one_shot: true,
            playback: SamplePlayback::Adpcm,
            rate_index: 5,
            crush_index: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RhythmParams {
    pub pads: [PadParams; PAD_COUNT],
    /// Vibrato depth in semitones at full mod wheel.
    pub vibrato_depth: f64,
    /// Vibrato rate in Hz.
    pub vibrato_rate: f64,
}

impl Default for RhythmParams {
    fn default() -> Self {
        // Bass drum, snare, hats, toms... on the GM drum map.
        const NOTES: [u8; PAD_COUNT] = [36, 38, 42, 46, 41, 45, 49, 51];
        RhythmParams {
            pads: NOTES.map(|note| PadParams {
                note,
                ..PadParams::default()
            }),
            vibrato_depth: 0.5,
            vibrato_rate: 5.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let snap = ParameterSnapshot::from_json(r#"{ "mode": "fm", "fm": { "algorithm": 7 } }"#)
            .unwrap();
        assert_eq!(snap.mode, ChipMode::Fm);
        assert_eq!(snap.fm.algorithm, 7);
        assert_eq!(snap.fm.operators[2].multiplier, 1);
        assert_eq!(snap.rhythm.pads[1].note, 38);
        assert_eq!(snap.level, 0.8);
    }

    #[test]
    fn json_roundtrip() {
        let mut snap = ParameterSnapshot::default();
        snap.mode = ChipMode::Wavetable;
        snap.wavetable.waveform = TableWaveform::Custom32;
        snap.wavetable.custom_table = vec![0.5; 32];
        let json = snap.to_json().unwrap();
        assert!(json.contains("\"custom32\""));
        assert!(json.contains("\"customTable\""));
        let back = ParameterSnapshot::from_json(&json).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = ParameterSnapshot::from_json(r#"{ "mode": "opl" }"#).unwrap_err();
        assert!(matches!(err, ChipError::Snapshot(_)), "got {err:?}");
    }

    #[test]
    fn bend_ratio_clamps() {
        let mut snap = ParameterSnapshot::default();
        snap.pitch_bend = 1.0;
        snap.pitch_bend_range = 12.0;
        assert!((snap.bend_ratio() - 2.0).abs() < 1e-12);
        snap.pitch_bend = -5.0;
        assert!((snap.bend_ratio() - 0.5).abs() < 1e-12);
        snap.pitch_bend = 0.0;
        assert_eq!(snap.bend_ratio(), 1.0);
    }

    #[test]
    fn out_of_range_level_clamps() {
        let mut snap = ParameterSnapshot::default();
        snap.level = 4.0;
        assert_eq!(snap.output_level(), 1.0);
        snap.mod_wheel = -1.0;
        assert_eq!(snap.mod_wheel(), 0.0);
    }

    #[test]
    fn velocity_sensitivity_blends_gain() {
        let snap = ParameterSnapshot::default();
        assert_eq!(scale_velocity(snap.velocity_sensitivity, 0.25), 0.25);
        assert_eq!(scale_velocity(0.0, 0.25), 1.0);
        assert!((scale_velocity(0.5, 0.0) - 0.5).abs() < 1e-12);
        assert_eq!(scale_velocity(3.0, 0.25), 0.25, "sensitivity clamps to 1");
    }
}

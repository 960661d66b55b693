//! Offline renderer: plays one note through a `ChipVoice` into an
//! interleaved stereo buffer or a WAV byte buffer.

use crate::error::ChipError;
use crate::params::ParameterSnapshot;

use super::voice::ChipVoice;

/// Longest release tail rendered after the gate closes, in seconds.
pub const MAX_TAIL_SECONDS: f64 = 10.0;

/// Hold a note for `gate_seconds`, release it, and render until the voice
/// falls silent or the tail limit is hit. Returns interleaved L/R samples.
pub fn render_voice(
    voice: &mut ChipVoice,
    frequency: f64,
    velocity: f64,
    gate_seconds: f64,
) -> Vec<f32> {
    let sample_rate = voice.sample_rate();
    let gate_frames = (gate_seconds.max(0.0) * sample_rate).round() as usize;
    let max_frames = gate_frames + (MAX_TAIL_SECONDS * sample_rate) as usize;

    let mut out = Vec::with_capacity(gate_frames * 2);
    voice.note_on(frequency, velocity);
    for frame in 0..max_frames {
        if frame == gate_frames {
            voice.note_off();
        }
        if !voice.is_playing() {
            break;
        }
        let (l, r) = voice.next_stereo();
        out.push(l as f32);
        out.push(r as f32);
    }
    out
}

/// Render one note of a synth mode.
pub fn render_note(
    snapshot: &ParameterSnapshot,
    frequency: f64,
    velocity: f64,
    gate_seconds: f64,
    sample_rate: u32,
) -> Vec<f32> {
    let mut voice = ChipVoice::from_snapshot(snapshot, sample_rate as f64);
    render_voice(&mut voice, frequency, velocity, gate_seconds)
}

/// Render one note of a sample mode with `data` loaded first.
pub fn render_sample_note(
    snapshot: &ParameterSnapshot,
    data: &[f32],
    source_rate: f64,
    frequency: f64,
    velocity: f64,
    gate_seconds: f64,
    sample_rate: u32,
) -> Result<Vec<f32>, ChipError> {
    let mut voice = ChipVoice::from_snapshot(snapshot, sample_rate as f64);
    voice.set_sample_data(data, source_rate)?;
    Ok(render_voice(&mut voice, frequency, velocity, gate_seconds))
}

/// Render one note to a WAV file as bytes (16-bit stereo PCM).
pub fn render_wav(
    snapshot: &ParameterSnapshot,
    frequency: f64,
    velocity: f64,
    gate_seconds: f64,
    sample_rate: u32,
) -> Vec<u8> {
    let samples = render_note(snapshot, frequency, velocity, gate_seconds, sample_rate);
    encode_wav(&to_pcm_i16(&samples), sample_rate, 2)
}

/// Convert float samples to 16-bit PCM, clipping out-of-range values.
pub fn to_pcm_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s as f64 * 32767.0).round().clamp(-32768.0, 32767.0) as i16)
        .collect()
}

/// Encode interleaved i16 PCM samples to a WAV byte buffer.
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data_size = (samples.len() * 2) as u32;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(44 + data_size as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for &sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }

    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ChipMode, SamplePlayback};

    #[test]
    fn wav_header_valid() {
        let wav = render_wav(&ParameterSnapshot::default(), 440.0, 1.0, 0.1, 44100);

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(&wav[36..40], b"data");

        let sr = u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]);
        assert_eq!(sr, 44100);

        let ch = u16::from_le_bytes([wav[22], wav[23]]);
        assert_eq!(ch, 2);

        let data_size = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]);
        assert_eq!(wav.len(), 44 + data_size as usize);
    }

    #[test]
    fn note_renders_gate_then_release() {
        let mut snap = ParameterSnapshot::default();
        snap.ssg.envelope.release = 0.05;
        let out = render_note(&snap, 440.0, 1.0, 0.1, 44100);

        // gate plus most of the release tail, interleaved
        let frames = out.len() / 2;
        assert_eq!(out.len() % 2, 0);
        assert!(frames >= 4410, "gate cut short: {frames}");
        assert!(frames < 4410 + 2205 + 10, "tail too long: {frames}");
        assert!(out.iter().any(|&s| s.abs() > 0.1), "should not be silent");
    }

    #[test]
    fn every_synth_mode_renders() {
        for mode in [ChipMode::Ssg, ChipMode::Fm, ChipMode::Wavetable] {
            let mut snap = ParameterSnapshot::default();
            snap.mode = mode;
            let out = render_note(&snap, 220.0, 0.8, 0.05, 22050);
            assert!(!out.is_empty(), "{mode:?} rendered nothing");
            assert!(out.iter().all(|s| s.is_finite() && s.abs() <= 1.0), "{mode:?} out of range");
        }
    }

    #[test]
    fn sample_mode_needs_data() {
        let mut snap = ParameterSnapshot::default();
        snap.mode = ChipMode::Adpcm;
        snap.adpcm.playback = SamplePlayback::Raw;
        snap.adpcm.one_shot = true;

        assert!(render_note(&snap, 261.63, 1.0, 0.1, 44100).is_empty());

        let data = vec![0.5f32; 441];
        let root = snap.adpcm.root_frequency;
        let out = render_sample_note(&snap, &data, 44100.0, root, 1.0, 1.0, 44100).unwrap();
        assert_eq!(out.len(), 441 * 2, "one-shot ends with the sample");
    }

    #[test]
    fn rhythm_pad_renders_stereo() {
        let mut snap = ParameterSnapshot::default();
        snap.mode = ChipMode::Rhythm;
        snap.level = 1.0;
        snap.rhythm.pads[0].playback = SamplePlayback::Raw;
        snap.rhythm.pads[0].pan = 1.0;
        let data = vec![0.5f32; 100];
        let kick = crate::dsp::pitch::midi_to_frequency(36, 440.0);
        let out = render_sample_note(&snap, &data, 44100.0, kick, 1.0, 0.5, 44100).unwrap();
        assert_eq!(out.len(), 200);
        assert_eq!(out[0], 0.0, "hard right leaves left empty");
        assert_eq!(out[1], 0.5);
    }

    #[test]
    fn pcm_conversion_clips() {
        assert_eq!(to_pcm_i16(&[0.0, 1.0, -1.0, 2.0, -2.0]), vec![0, 32767, -32767, 32767, -32768]);
    }
}

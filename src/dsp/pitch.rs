//! Note / frequency conversion.

/// Standard concert pitch for A4.
pub const A4_FREQUENCY: f64 = 440.0;

/// Convert a MIDI note number to frequency using the given tuning pitch.
///
/// `tuning_pitch` is the frequency of A4 (MIDI 69).
/// Formula: `tuning_pitch * 2^((midi - 69) / 12)`
pub fn midi_to_frequency(midi: u8, tuning_pitch: f64) -> f64 {
    tuning_pitch * (2.0_f64).powf((midi as f64 - 69.0) / 12.0)
}

/// Convert a frequency back to the nearest MIDI note number.
pub fn frequency_to_midi(freq: f64, tuning_pitch: f64) -> u8 {
    if freq <= 0.0 || tuning_pitch <= 0.0 {
        return 0;
    }
    let midi = 69.0 + 12.0 * (freq / tuning_pitch).log2();
    midi.round().clamp(0.0, 127.0) as u8
}

/// Frequency ratio for a shift in semitones.
pub fn semitones_to_ratio(semitones: f64) -> f64 {
    (2.0_f64).powf(semitones / 12.0)
}

pub mod dsp;
pub mod error;
pub mod params;

use crate::error::ChipError;
use crate::params::ParameterSnapshot;
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the chiptone-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Parse a JSON snapshot, turning failures into a readable report.
fn parse_snapshot(json: &str) -> Result<ParameterSnapshot, JsValue> {
    ParameterSnapshot::from_json(json).map_err(|e| to_js_error(&e, json))
}

fn to_js_error(err: &ChipError, source: &str) -> JsValue {
    JsValue::from_str(&err.report(source))
}

/// WASM-exposed: the default parameter snapshot as a JS object.
#[wasm_bindgen]
pub fn default_snapshot() -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&ParameterSnapshot::default())
        .map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: render one note to interleaved stereo f32 samples.
/// Returns the raw audio buffer for AudioWorklet playback.
#[wasm_bindgen]
pub fn render_note_samples(
    snapshot_json: &str,
    frequency: f64,
    velocity: f64,
    gate_seconds: f64,
    sample_rate: u32,
) -> Result<Vec<f32>, JsValue> {
    let snapshot = parse_snapshot(snapshot_json)?;
    Ok(dsp::renderer::render_note(
        &snapshot,
        frequency,
        velocity,
        gate_seconds,
        sample_rate,
    ))
}

/// WASM-exposed: render one note to a WAV byte array.
#[wasm_bindgen]
pub fn render_note_wav(
    snapshot_json: &str,
    frequency: f64,
    velocity: f64,
    gate_seconds: f64,
    sample_rate: u32,
) -> Result<Vec<u8>, JsValue> {
    let snapshot = parse_snapshot(snapshot_json)?;
    Ok(dsp::renderer::render_wav(
        &snapshot,
        frequency,
        velocity,
        gate_seconds,
        sample_rate,
    ))
}

/// WASM-exposed: load `data` into an ADPCM or rhythm voice and render one
/// note to interleaved stereo f32 samples.
#[wasm_bindgen]
pub fn render_sample_note(
    snapshot_json: &str,
    data: &[f32],
    source_rate: f64,
    frequency: f64,
    velocity: f64,
    gate_seconds: f64,
    sample_rate: u32,
) -> Result<Vec<f32>, JsValue> {
    let snapshot = parse_snapshot(snapshot_json)?;
    dsp::renderer::render_sample_note(
        &snapshot,
        data,
        source_rate,
        frequency,
        velocity,
        gate_seconds,
        sample_rate,
    )
    .map_err(|e| to_js_error(&e, snapshot_json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_manifest() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn partial_snapshot_renders() {
        let snapshot = ParameterSnapshot::from_json(r#"{"mode":"fm","level":0.5}"#).unwrap();
        let samples = dsp::renderer::render_note(&snapshot, 440.0, 1.0, 0.05, 22050);
        assert!(!samples.is_empty());
    }
}

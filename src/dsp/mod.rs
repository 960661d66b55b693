//! DSP: chip sound engines and the building blocks they share.
//!
//! Every engine follows the same contract (`prepare`, `set_parameters`,
//! `note_on`, `note_off`, `is_playing`, `next_sample`, `next_stereo`) and
//! never allocates or fails on the per-sample path. `voice::ChipVoice`
//! dispatches to the engine the snapshot selects.

pub mod adpcm;
pub mod envelope;
pub mod fm;
pub mod lofi;
pub mod noise;
pub mod pitch;
pub mod renderer;
pub mod rhythm;
pub mod sampler;
pub mod ssg;
pub mod voice;
pub mod wavetable;

//! ADSR envelope generator shared by every chip engine.
//!
//! One state machine with three behaviours switched by flags:
//! - plain linear ADSR (wavetable, sample playback)
//! - sustain smoothing, where the held level creeps toward a live-edited
//!   sustain target instead of jumping (SSG)
//! - a sustain rate, a second decay running during the sustain stage (FM)
//!
//! A bypass flag turns the whole thing into a hard gate.

/// Shortest stage time in seconds; shorter values are clamped up.
pub const MIN_STAGE_TIME: f64 = 0.001;

/// One-pole coefficient for the sustain creep.
const SUSTAIN_SMOOTHING: f64 = 0.005;

/// Envelope stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// ADSR envelope with linear attack/decay/release segments.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Attack time in seconds.
    pub attack: f64,
    /// Decay time in seconds.
    pub decay: f64,
    /// Sustain level [0, 1].
    pub sustain: f64,
    /// Release time in seconds.
    pub release: f64,
    /// Time in seconds to fall from full scale to silence while sustaining.
    /// Zero holds the sustain level.
    pub sustain_rate: f64,
    /// Skip ADSR: level is 1 while gated, 0 the moment release is requested.
    pub bypass: bool,
    /// Creep toward the sustain level instead of holding it exactly.
    pub smooth_sustain: bool,

    stage: Stage,
    level: f64,
    sample_rate: f64,
    /// Per-sample decrement latched when release was triggered.
    release_step: f64,
}

impl Envelope {
    pub fn new(sample_rate: f64) -> Self {
        Envelope {
            attack: 0.01,
            decay: 0.1,
            sustain: 0.7,
            release: 0.3,
            sustain_rate: 0.0,
            bypass: false,
            smooth_sustain: false,
            stage: Stage::Idle,
            level: 0.0,
            sample_rate: sample_rate.max(1.0),
            release_step: 0.0,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate.max(1.0);
    }

    /// Apply new stage times, clamping to the documented ranges.
    pub fn set_adsr(&mut self, attack: f64, decay: f64, sustain: f64, release: f64) {
        self.attack = attack.max(MIN_STAGE_TIME);
        self.decay = decay.max(MIN_STAGE_TIME);
        self.sustain = sustain.clamp(0.0, 1.0);
        self.release = release.max(MIN_STAGE_TIME);
    }

    /// Trigger the envelope (note on). Always restarts from silence.
    pub fn gate_on(&mut self) {
        self.stage = Stage::Attack;
        self.level = 0.0;
        self.release_step = 0.0;
    }

    /// Release the envelope (note off).
    ///
    /// The release slope is fixed here from the current level and release
    /// time; later edits to `release` do not affect a release in progress.
    pub fn gate_off(&mut self) {
        if self.stage == Stage::Idle {
            return;
        }
        if self.bypass {
            self.reset();
            return;
        }
        self.stage = Stage::Release;
        self.release_step = self.level / self.samples(self.release);
        if self.level <= 0.0 {
            self.reset();
        }
    }

    /// Force silence.
    pub fn reset(&mut self) {
        self.stage = Stage::Idle;
        self.level = 0.0;
        self.release_step = 0.0;
    }

    /// Advance one sample and return the level [0, 1].
    pub fn next_sample(&mut self) -> f64 {
        if self.bypass {
            self.level = if self.stage == Stage::Idle { 0.0 } else { 1.0 };
            return self.level;
        }

        let sustain = self.sustain.clamp(0.0, 1.0);
        match self.stage {
            Stage::Idle => {
                self.level = 0.0;
            }
            Stage::Attack => {
                self.level += 1.0 / self.samples(self.attack);
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = Stage::Decay;
                }
            }
            Stage::Decay => {
                self.level -= (1.0 - sustain) / self.samples(self.decay);
                if self.level <= sustain {
                    self.level = sustain;
                    self.stage = Stage::Sustain;
                }
            }
            Stage::Sustain => {
                if self.sustain_rate > 0.0 {
                    self.level -= 1.0 / self.samples(self.sustain_rate);
                } else if self.smooth_sustain {
                    self.level += (sustain - self.level) * SUSTAIN_SMOOTHING;
                } else {
                    self.level = sustain;
                }
            }
            Stage::Release => {
                self.level -= self.release_step;
                if self.level <= 0.0 {
                    self.reset();
                }
            }
        }
        self.level = self.level.clamp(0.0, 1.0);
        self.level
    }

    /// Returns true if the envelope has finished (idle after release).
    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Idle
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    fn samples(&self, seconds: f64) -> f64 {
        seconds.max(MIN_STAGE_TIME) * self.sample_rate
    }
}

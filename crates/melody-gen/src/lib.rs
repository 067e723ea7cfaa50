//! Melody generation: two interchangeable strategies behind [`MelodyStrategy`]
//! plus the shared chord overlay and instrument assignment.

use melody_core::{Score, Track};
use music_mapping::{MusicParams, ParamsError};
use thiserror::Error;
use tracing::info;

mod chords;
mod instruments;
mod model;
mod scale_walk;

pub use chords::chord_overlay;
pub use instruments::{assign_instruments, gm_program};
pub use model::{segment_count, stretch_to_duration, GenerativeAdapter, ModelError, ModelSegment, SequenceModel};
pub use scale_walk::{note_count, ScaleWalk, DEFAULT_STEP_WEIGHTS};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid music parameters: {0}")]
    InvalidParams(#[from] ParamsError),
    #[error("target duration must be positive, got {0}")]
    InvalidDuration(f64),
    #[error("scale for base pitch {0} is empty")]
    EmptyScale(u8),
    #[error("invalid step weights: {0}")]
    StepWeights(String),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("{strategy} produced no notes")]
    EmptySequence { strategy: &'static str },
}

/// Produces one melody track covering `[0, target_duration]` seconds.
pub trait MelodyStrategy {
    fn name(&self) -> &'static str;
    fn generate(&mut self, params: &MusicParams, target_duration: f64) -> Result<Track, GenerationError>;
}

impl<S: MelodyStrategy + ?Sized> MelodyStrategy for Box<S> {
    fn name(&self) -> &'static str { (**self).name() }
    fn generate(&mut self, params: &MusicParams, target_duration: f64) -> Result<Track, GenerationError> {
        (**self).generate(params, target_duration)
    }
}

/// How a melody becomes a full score.
#[derive(Clone, Debug)]
pub struct ArrangeOptions {
    pub chord_velocity: u8,
    /// Split the melody across the mapped instruments.
    pub assign_instruments: bool,
}

impl Default for ArrangeOptions {
    fn default() -> Self {
        Self { chord_velocity: 80, assign_instruments: true }
    }
}

/// Run `strategy`, then lay the chord progression under the melody. An empty
/// melody is fatal for the plan.
pub fn compose<S: MelodyStrategy + ?Sized>(
    strategy: &mut S,
    params: &MusicParams,
    target_duration: f64,
    opts: &ArrangeOptions,
) -> Result<Score, GenerationError> {
    params.validate()?;
    if !(target_duration.is_finite() && target_duration > 0.0) {
        return Err(GenerationError::InvalidDuration(target_duration));
    }

    let melody = strategy.generate(params, target_duration)?;
    if melody.is_empty() {
        return Err(GenerationError::EmptySequence { strategy: strategy.name() });
    }
    info!(
        strategy = strategy.name(),
        notes = melody.notes.len(),
        duration = melody.end_time(),
        "generated melody"
    );

    let mut score = Score::new(params.tempo);
    if opts.assign_instruments {
        for t in assign_instruments(&melody, &params.instruments) {
            score.push_track(t);
        }
    } else {
        score.push_track(melody);
    }
    score.push_track(chord_overlay(&params.chord_progression, target_duration, opts.chord_velocity));
    Ok(score)
}

//! Plan B: adapter over an external generative sequence model.
//!
//! The model produces fixed-length segments centred on its own default pitch.
//! The adapter asks for enough segments to cover the target, lays them end to
//! end, transposes onto the mapped base pitch and stretches the result so it
//! ends exactly at the target duration.

use melody_core::{clamp_pitch, Note, Track};
use music_mapping::MusicParams;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{GenerationError, MelodyStrategy};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Request(String),
    #[error("model response is malformed: {0}")]
    Malformed(String),
}

/// One generated segment; note times are relative to the segment start.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSegment {
    pub notes: Vec<Note>,
}

pub trait SequenceModel {
    fn sample(&self, num_segments: usize, steps_per_segment: usize) -> Result<Vec<ModelSegment>, ModelError>;
}

impl<M: SequenceModel + ?Sized> SequenceModel for Box<M> {
    fn sample(&self, num_segments: usize, steps_per_segment: usize) -> Result<Vec<ModelSegment>, ModelError> {
        (**self).sample(num_segments, steps_per_segment)
    }
}

/// Whole segments that fit in `target_duration`, at least one.
pub fn segment_count(target_duration: f64, segment_duration: f64) -> usize {
    let n = (target_duration / segment_duration).floor();
    if n.is_finite() && n >= 1.0 { n as usize } else { 1 }
}

/// Scale every note time by `target / end_time` so the track ends at `target`.
/// Returns `false` (and leaves the track untouched) when the track has no
/// duration to scale.
pub fn stretch_to_duration(track: &mut Track, target: f64) -> bool {
    let actual = track.end_time();
    if actual <= 0.0 {
        return false;
    }
    let factor = target / actual;
    for n in &mut track.notes {
        n.start *= factor;
        n.end *= factor;
    }
    true
}

pub struct GenerativeAdapter<M> {
    model: M,
    /// Length of one segment at the model's default tempo (2 bars at 120 BPM).
    pub segment_duration: f64,
    pub steps_per_segment: usize,
    /// Pitch the model's output is centred on.
    pub center_pitch: u8,
}

impl<M: SequenceModel> GenerativeAdapter<M> {
    pub fn new(model: M) -> Self {
        Self { model, segment_duration: 4.0, steps_per_segment: 16, center_pitch: 60 }
    }
}

impl<M: SequenceModel> MelodyStrategy for GenerativeAdapter<M> {
    fn name(&self) -> &'static str { "generative-model" }

    fn generate(&mut self, params: &MusicParams, target_duration: f64) -> Result<Track, GenerationError> {
        let n = segment_count(target_duration, self.segment_duration);
        let segments = self.model.sample(n, self.steps_per_segment)?;
        debug!(requested = n, received = segments.len(), "model segments");

        let shift = params.base_pitch as i32 - self.center_pitch as i32;
        let mut track = Track::new("melody");
        for (i, seg) in segments.iter().enumerate() {
            let offset = i as f64 * self.segment_duration;
            for note in seg.notes.iter().filter(|n| n.end > n.start) {
                track.push(
                    clamp_pitch(note.pitch as i32 + shift),
                    offset + note.start.max(0.0),
                    offset + note.end,
                    note.velocity,
                );
            }
        }
        track.sort();

        if !stretch_to_duration(&mut track, target_duration) {
            warn!("generative model returned no audible notes; leaving melody unscaled");
        }
        Ok(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use melody_core::Mode;
    use music_mapping::{MelodyShape, TimeSignature};
    use std::cell::Cell;

    /// Returns the same segment every time and records the request.
    struct Scripted {
        segment: ModelSegment,
        asked: Cell<(usize, usize)>,
    }

    impl SequenceModel for Scripted {
        fn sample(&self, n: usize, steps: usize) -> Result<Vec<ModelSegment>, ModelError> {
            self.asked.set((n, steps));
            Ok(vec![self.segment.clone(); n])
        }
    }

    struct Broken;
    impl SequenceModel for Broken {
        fn sample(&self, _: usize, _: usize) -> Result<Vec<ModelSegment>, ModelError> {
            Err(ModelError::Request("connection refused".into()))
        }
    }

    fn params(base_pitch: u8) -> MusicParams {
        MusicParams {
            mode: Mode::Minor,
            base_pitch,
            chord_progression: vec![vec![57, 60, 64]],
            melody_shape: MelodyShape::Descending,
            tempo: 70.0,
            dynamics: "soft".into(),
            ornamentation: "minimal".into(),
            instruments: vec!["cello".into()],
            background_effects: None,
            structure: "free form".into(),
            time_signature: TimeSignature::FourFour,
        }
    }

    fn two_note_segment() -> ModelSegment {
        ModelSegment { notes: vec![Note::new(60, 90, 0.0, 2.0), Note::new(67, 90, 2.0, 3.5)] }
    }

    #[test]
    fn segment_count_floors_with_minimum_one() {
        assert_eq!(segment_count(3.0, 4.0), 1);
        assert_eq!(segment_count(8.0, 4.0), 2);
        assert_eq!(segment_count(17.9, 4.0), 4);
    }

    #[test]
    fn output_is_transposed_and_stretched() {
        let model = Scripted { segment: two_note_segment(), asked: Cell::new((0, 0)) };
        let mut plan_b = GenerativeAdapter::new(model);
        let track = plan_b.generate(&params(57), 10.0).unwrap();
        assert_eq!(plan_b.model.asked.get(), (2, 16));

        assert_eq!(track.notes.len(), 4);
        assert_eq!(track.notes[0].pitch, 57);
        assert_eq!(track.notes[1].pitch, 64);
        // content ended at 4 + 3.5 = 7.5s, stretched to 10s
        assert!((track.end_time() - 10.0).abs() < 1e-9);
        assert!((track.notes[2].start - 4.0 * 10.0 / 7.5).abs() < 1e-9);
    }

    #[test]
    fn transposition_clamps_at_midi_edges() {
        let seg = ModelSegment { notes: vec![Note::new(120, 80, 0.0, 1.0), Note::new(2, 80, 1.0, 2.0)] };
        let model = Scripted { segment: seg, asked: Cell::new((0, 0)) };
        let track = GenerativeAdapter::new(model).generate(&params(72), 4.0).unwrap();
        assert_eq!(track.notes[0].pitch, 127);
        let track = GenerativeAdapter::new(Scripted {
            segment: ModelSegment { notes: vec![Note::new(2, 80, 0.0, 1.0)] },
            asked: Cell::new((0, 0)),
        })
        .generate(&params(48), 4.0)
        .unwrap();
        assert_eq!(track.notes[0].pitch, 0);
    }

    #[test]
    fn empty_model_output_is_left_unscaled() {
        let model = Scripted { segment: ModelSegment::default(), asked: Cell::new((0, 0)) };
        let track = GenerativeAdapter::new(model).generate(&params(60), 12.0).unwrap();
        assert!(track.is_empty());
    }

    #[test]
    fn model_errors_propagate() {
        let err = GenerativeAdapter::new(Broken).generate(&params(60), 12.0).unwrap_err();
        assert!(matches!(err, GenerationError::Model(ModelError::Request(_))));
    }

    #[test]
    fn stretch_handles_silence() {
        let mut t = Track::new("x");
        assert!(!stretch_to_duration(&mut t, 5.0));
        t.push(60, 0.0, 2.0, 100);
        assert!(stretch_to_duration(&mut t, 5.0));
        assert_eq!(t.notes[0].end, 5.0);
    }
}

//! Plan A: a weighted random walk over the mode's scale.

use melody_core::{build_scale, Track};
use music_mapping::MusicParams;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::{GenerationError, MelodyStrategy};

/// Index steps and their relative weights: small moves dominate, staying put
/// is the single most likely draw.
pub const DEFAULT_STEP_WEIGHTS: [(i32, u32); 5] = [(-2, 1), (-1, 3), (0, 4), (1, 3), (2, 1)];

/// Notes needed to fill `target_duration` at `tempo`, one note per beat,
/// never fewer than `min_notes` (and never zero).
pub fn note_count(target_duration: f64, tempo: f64, min_notes: usize) -> usize {
    let beats = (target_duration * (tempo / 60.0)).floor();
    let beats = if beats.is_finite() && beats > 0.0 { beats as usize } else { 0 };
    beats.max(min_notes).max(1)
}

pub struct ScaleWalk {
    pub octaves: u32,
    pub min_notes: usize,
    pub step_weights: Vec<(i32, u32)>,
    pub velocity: u8,
    rng: StdRng,
}

impl ScaleWalk {
    pub fn new(rng: StdRng) -> Self {
        Self {
            octaves: 3,
            min_notes: 16,
            step_weights: DEFAULT_STEP_WEIGHTS.to_vec(),
            velocity: 100,
            rng,
        }
    }

    pub fn seeded(seed: u64) -> Self { Self::new(StdRng::seed_from_u64(seed)) }

    pub fn from_entropy() -> Self { Self::new(StdRng::from_entropy()) }

    /// Walk `count` scale indices from the middle of a scale of `len` pitches.
    /// The index is clamped at both ends, so a walk pushing past an edge
    /// repeats the edge pitch.
    fn walk(&mut self, len: usize, count: usize) -> Result<Vec<usize>, GenerationError> {
        let dist = WeightedIndex::new(self.step_weights.iter().map(|&(_, w)| w))
            .map_err(|e| GenerationError::StepWeights(e.to_string()))?;
        let max = len as i64 - 1;
        let mut idx = (len / 2) as i64;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(idx as usize);
            let step = self.step_weights[dist.sample(&mut self.rng)].0 as i64;
            idx = (idx + step).clamp(0, max);
        }
        Ok(out)
    }
}

impl MelodyStrategy for ScaleWalk {
    fn name(&self) -> &'static str { "scale-walk" }

    fn generate(&mut self, params: &MusicParams, target_duration: f64) -> Result<Track, GenerationError> {
        let scale = build_scale(params.base_pitch, params.mode, self.octaves);
        if scale.is_empty() {
            return Err(GenerationError::EmptyScale(params.base_pitch));
        }
        let count = note_count(target_duration, params.tempo, self.min_notes);
        let note_len = target_duration / count as f64;
        debug!(scale_len = scale.len(), count, note_len, "scale walk");

        let mut track = Track::new("melody");
        for (i, idx) in self.walk(scale.len(), count)?.into_iter().enumerate() {
            let start = i as f64 * note_len;
            let end = if i + 1 == count { target_duration } else { (i + 1) as f64 * note_len };
            track.push(scale[idx], start, end, self.velocity);
        }
        Ok(track)
    }
}

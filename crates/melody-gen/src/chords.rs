use melody_core::Track;
use music_mapping::Chord;

// Relative tolerance so float error never opens an extra sliver slot.
const SLOT_EPSILON: f64 = 1e-9;

/// Spread `progression` evenly over `[0, target_duration]`: one slot of
/// `target_duration / len` seconds per chord, cycling from the first chord for
/// as long as time remains. All chord tones sound together for the full slot.
pub fn chord_overlay(progression: &[Chord], target_duration: f64, velocity: u8) -> Track {
    let mut track = Track::new("chords");
    if progression.is_empty() || !(target_duration.is_finite() && target_duration > 0.0) {
        return track;
    }

    let slot = target_duration / progression.len() as f64;
    let mut i = 0usize;
    while (i as f64) * slot < target_duration - SLOT_EPSILON * slot {
        let start = i as f64 * slot;
        let end = (i + 1) as f64 * slot;
        for &pitch in &progression[i % progression.len()] {
            track.push(pitch, start, end, velocity);
        }
        i += 1;
    }
    track
}

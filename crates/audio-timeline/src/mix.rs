use tracing::{debug, warn};

use crate::{AudioError, Waveform};

/// Per-track gain offsets in dB.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MixSettings {
    pub recitation_db: f32,
    pub melody_db: f32,
}

impl Default for MixSettings {
    fn default() -> Self {
        Self { recitation_db: 0.0, melody_db: -3.0 }
    }
}

/// Right-pad the shorter waveform with silence so both have the same number
/// of samples.
pub fn align_lengths(a: &mut Waveform, b: &mut Waveform) -> Result<(), AudioError> {
    if a.sample_rate() != b.sample_rate() {
        return Err(AudioError::SampleRateMismatch { left: a.sample_rate(), right: b.sample_rate() });
    }
    let len = a.len_samples().max(b.len_samples());
    a.pad_to(len);
    b.pad_to(len);
    Ok(())
}

/// Lay the recitation over the melody: melody is brought to the recitation's
/// sample rate, both are padded to the longer length, gains applied, then
/// summed from time 0.
pub fn mix(recitation: &Waveform, melody: &Waveform, settings: &MixSettings) -> Result<Waveform, AudioError> {
    let mut voice = recitation.clone();
    let mut music = melody.resampled(recitation.sample_rate())?;
    align_lengths(&mut voice, &mut music)?;
    debug!(
        recitation_ms = recitation.duration_ms(),
        melody_ms = melody.duration_ms(),
        aligned_ms = voice.duration_ms(),
        "aligned tracks"
    );
    voice.apply_gain_db(settings.recitation_db)?;
    music.apply_gain_db(settings.melody_db)?;
    music.overlay(&voice)
}

/// Result of mixing, keeping track of whether the melody made it in.
#[derive(Clone, Debug, PartialEq)]
pub enum MixOutcome {
    Mixed(Waveform),
    /// Mixing failed; this is the untouched recitation.
    RecitationOnly { waveform: Waveform, reason: String },
}

impl MixOutcome {
    pub fn waveform(&self) -> &Waveform {
        match self {
            MixOutcome::Mixed(w) | MixOutcome::RecitationOnly { waveform: w, .. } => w,
        }
    }
    pub fn into_waveform(self) -> Waveform {
        match self {
            MixOutcome::Mixed(w) | MixOutcome::RecitationOnly { waveform: w, .. } => w,
        }
    }
    pub fn is_degraded(&self) -> bool { matches!(self, MixOutcome::RecitationOnly { .. }) }
}

/// [`mix`], degrading to the bare recitation instead of failing.
pub fn mix_or_recitation(recitation: &Waveform, melody: &Waveform, settings: &MixSettings) -> MixOutcome {
    match mix(recitation, melody, settings) {
        Ok(w) => MixOutcome::Mixed(w),
        Err(e) => {
            warn!(error = %e, "mixing failed, falling back to recitation only");
            MixOutcome::RecitationOnly { waveform: recitation.clone(), reason: e.to_string() }
        }
    }
}

//! Melody Synth: turns a [`Score`] into a [`Waveform`].
//!
//! Two renderers sit behind [`Renderer`]: FluidSynth driven as an external
//! binary with a soundfont, and a small built-in oscillator synth that needs
//! nothing installed. [`render_or_silence`] wraps either one so a failed
//! render degrades to silence of the score's length.

use std::path::PathBuf;

use audio_timeline::{AudioError, Waveform};
use melody_core::{MidiError, Score};
use thiserror::Error;
use tracing::{info, warn};

mod fluidsynth;
mod oscillator;

pub use fluidsynth::FluidSynthRenderer;
pub use oscillator::{Osc, OscillatorRenderer};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("score has no notes to render")]
    EmptyScore,
    #[error("soundfont not found: {0}")]
    MissingSoundfont(PathBuf),
    #[error("failed to start renderer {bin}: {source}")]
    Spawn { bin: PathBuf, source: std::io::Error },
    #[error("renderer exited with {status}: {stderr}")]
    RendererFailed { status: String, stderr: String },
    #[error(transparent)]
    Midi(#[from] MidiError),
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error("temporary file error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait Renderer {
    fn name(&self) -> &'static str;
    fn render(&self, score: &Score) -> Result<Waveform, RenderError>;
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn name(&self) -> &'static str { (**self).name() }
    fn render(&self, score: &Score) -> Result<Waveform, RenderError> { (**self).render(score) }
}

/// A render result that remembers whether it is the real thing.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderOutcome {
    Rendered(Waveform),
    /// Rendering failed; silence as long as the score stands in for it.
    Silent { waveform: Waveform, reason: String },
}

impl RenderOutcome {
    pub fn waveform(&self) -> &Waveform {
        match self {
            RenderOutcome::Rendered(w) | RenderOutcome::Silent { waveform: w, .. } => w,
        }
    }
    pub fn into_waveform(self) -> Waveform {
        match self {
            RenderOutcome::Rendered(w) | RenderOutcome::Silent { waveform: w, .. } => w,
        }
    }
    pub fn is_degraded(&self) -> bool { matches!(self, RenderOutcome::Silent { .. }) }
}

/// Render `score`, or fall back to `score.end_time()` seconds of silence at
/// `sample_rate` when the renderer fails.
pub fn render_or_silence<R: Renderer + ?Sized>(renderer: &R, score: &Score, sample_rate: u32) -> RenderOutcome {
    match renderer.render(score) {
        Ok(w) => {
            info!(renderer = renderer.name(), duration_ms = w.duration_ms(), "rendered score");
            RenderOutcome::Rendered(w)
        }
        Err(e) => {
            warn!(renderer = renderer.name(), error = %e, "render failed, substituting silence");
            RenderOutcome::Silent {
                waveform: Waveform::silent_secs(score.end_time(), sample_rate),
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use melody_core::Track;

    struct Failing;
    impl Renderer for Failing {
        fn name(&self) -> &'static str { "failing" }
        fn render(&self, _: &Score) -> Result<Waveform, RenderError> {
            Err(RenderError::RendererFailed { status: "exit status: 1".into(), stderr: "boom".into() })
        }
    }

    fn score(secs: f64) -> Score {
        let mut t = Track::new("melody");
        t.push(60, 0.0, secs, 100);
        let mut s = Score::new(100.0);
        s.push_track(t);
        s
    }

    #[test]
    fn failure_becomes_silence_of_score_length() {
        let out = render_or_silence(&Failing, &score(3.25), 22_050);
        assert!(out.is_degraded());
        assert_eq!(out.waveform().duration_ms(), 3250);
        assert!(out.waveform().samples().iter().all(|&s| s == 0.0));
        match out {
            RenderOutcome::Silent { reason, .. } => assert!(reason.contains("boom")),
            RenderOutcome::Rendered(_) => unreachable!(),
        }
    }

    #[test]
    fn success_is_passed_through() {
        let out = render_or_silence(&OscillatorRenderer::new(8000), &score(1.0), 8000);
        assert!(!out.is_degraded());
        assert_eq!(out.into_waveform().duration_ms(), 1000);
    }
}

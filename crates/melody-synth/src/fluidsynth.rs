use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use audio_timeline::Waveform;
use melody_core::Score;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::{RenderError, Renderer};

/// Renders through the `fluidsynth` command-line synthesizer. The score is
/// written to a temporary `.mid`, rendered into a temporary `.wav`, and both
/// files are removed when the call returns, whatever the outcome.
#[derive(Clone, Debug)]
pub struct FluidSynthRenderer {
    /// Path to (or name on `PATH` of) the fluidsynth executable.
    pub binary: PathBuf,
    pub soundfont: PathBuf,
    pub sample_rate: u32,
    /// Where intermediate files go; the system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
}

impl FluidSynthRenderer {
    pub fn new(binary: impl Into<PathBuf>, soundfont: impl Into<PathBuf>, sample_rate: u32) -> Self {
        Self { binary: binary.into(), soundfont: soundfont.into(), sample_rate, scratch_dir: None }
    }

    fn scratch_file(&self, suffix: &str) -> std::io::Result<NamedTempFile> {
        let mut b = tempfile::Builder::new();
        b.prefix("versify-").suffix(suffix);
        match &self.scratch_dir {
            Some(dir) => b.tempfile_in(dir),
            None => b.tempfile(),
        }
    }
}

impl Renderer for FluidSynthRenderer {
    fn name(&self) -> &'static str { "fluidsynth" }

    fn render(&self, score: &Score) -> Result<Waveform, RenderError> {
        if score.is_empty() {
            return Err(RenderError::EmptyScore);
        }
        if !self.soundfont.is_file() {
            return Err(RenderError::MissingSoundfont(self.soundfont.clone()));
        }

        let mut midi_file = self.scratch_file(".mid")?;
        midi_file.write_all(&score.to_mid_bytes()?)?;
        midi_file.flush()?;
        let wav_file = self.scratch_file(".wav")?;

        debug!(bin = %self.binary.display(), midi = %midi_file.path().display(), "invoking fluidsynth");
        let output = Command::new(&self.binary)
            .arg("-ni")
            .arg(&self.soundfont)
            .arg(midi_file.path())
            .arg("-F")
            .arg(wav_file.path())
            .arg("-r")
            .arg(self.sample_rate.to_string())
            .stdin(Stdio::null())
            .output()
            .map_err(|source| RenderError::Spawn { bin: self.binary.clone(), source })?;

        if !output.status.success() {
            return Err(RenderError::RendererFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(Waveform::read(wav_file.path())?)
    }
}

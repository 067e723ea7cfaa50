//! JSON configuration. Every field has a default, so `{}` is a complete
//! config and a file only needs the values it changes.

use std::path::{Path, PathBuf};

use melody_gen::{ArrangeOptions, GenerativeAdapter, ScaleWalk, SequenceModel, DEFAULT_STEP_WEIGHTS};
use melody_synth::{FluidSynthRenderer, OscillatorRenderer, Renderer};
use audio_timeline::MixSettings;
use serde::{Deserialize, Serialize};

use crate::models::{FixtureModel, HttpSequenceModel};
use crate::PipelineError;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub melody_generation: MelodyGenerationConfig,
    pub music_synthesis: MusicSynthesisConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MelodyGenerationConfig {
    pub octaves: u32,
    pub min_notes: usize,
    /// `[step, weight]` pairs for the scale walk.
    pub step_weights: Vec<(i32, u32)>,
    pub melody_velocity: u8,
    pub chord_velocity: u8,
    pub segment_duration_secs: f64,
    pub steps_per_segment: usize,
    pub model_center_pitch: u8,
    pub seed: Option<u64>,
    pub assign_instruments: bool,
    pub model: Option<ModelSource>,
}

impl Default for MelodyGenerationConfig {
    fn default() -> Self {
        Self {
            octaves: 3,
            min_notes: 16,
            step_weights: DEFAULT_STEP_WEIGHTS.to_vec(),
            melody_velocity: 100,
            chord_velocity: 80,
            segment_duration_secs: 4.0,
            steps_per_segment: 16,
            model_center_pitch: 60,
            seed: None,
            assign_instruments: true,
            model: None,
        }
    }
}

/// Where Plan B gets its segments from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModelSource {
    Http { url: String },
    Fixture { path: PathBuf },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    #[default]
    FluidSynth,
    Oscillator,
}

impl std::str::FromStr for RendererKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fluidsynth" => Ok(RendererKind::FluidSynth),
            "oscillator" => Ok(RendererKind::Oscillator),
            other => Err(format!("unknown renderer '{other}' (expected fluidsynth or oscillator)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MusicSynthesisConfig {
    pub renderer: RendererKind,
    pub soundfont_path: Option<PathBuf>,
    pub renderer_bin: PathBuf,
    pub sample_rate: u32,
    pub recitation_volume_db: f32,
    pub melody_volume_db: f32,
}

impl Default for MusicSynthesisConfig {
    fn default() -> Self {
        Self {
            renderer: RendererKind::FluidSynth,
            soundfont_path: None,
            renderer_bin: PathBuf::from("fluidsynth"),
            sample_rate: 44_100,
            recitation_volume_db: 0.0,
            melody_volume_db: -3.0,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(s: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(s).map_err(config_err)
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// Plan A, seeded when the config carries a seed.
    pub fn scale_walk(&self) -> ScaleWalk {
        let g = &self.melody_generation;
        let mut walk = match g.seed {
            Some(seed) => ScaleWalk::seeded(seed),
            None => ScaleWalk::from_entropy(),
        };
        walk.octaves = g.octaves;
        walk.min_notes = g.min_notes;
        walk.step_weights = g.step_weights.clone();
        walk.velocity = g.melody_velocity;
        walk
    }

    pub fn sequence_model(&self) -> Result<Box<dyn SequenceModel>, PipelineError> {
        let model: Box<dyn SequenceModel> = match &self.melody_generation.model {
            Some(ModelSource::Http { url }) => Box::new(HttpSequenceModel::new(url.clone()).map_err(config_err)?),
            Some(ModelSource::Fixture { path }) => Box::new(FixtureModel::load(path).map_err(config_err)?),
            None => return Err(PipelineError::Config("melody_generation.model is not set".into())),
        };
        Ok(model)
    }

    /// Plan B around `model`, with the segment geometry from this config.
    pub fn generative_adapter<M: SequenceModel>(&self, model: M) -> GenerativeAdapter<M> {
        let g = &self.melody_generation;
        let mut adapter = GenerativeAdapter::new(model);
        adapter.segment_duration = g.segment_duration_secs;
        adapter.steps_per_segment = g.steps_per_segment;
        adapter.center_pitch = g.model_center_pitch;
        adapter
    }

    pub fn renderer(&self) -> Result<Box<dyn Renderer>, PipelineError> {
        let s = &self.music_synthesis;
        match s.renderer {
            RendererKind::Oscillator => Ok(Box::new(OscillatorRenderer::new(s.sample_rate))),
            RendererKind::FluidSynth => {
                let font = s.soundfont_path.clone().ok_or_else(|| {
                    PipelineError::Config("music_synthesis.soundfont_path is required for fluidsynth".into())
                })?;
                Ok(Box::new(FluidSynthRenderer::new(s.renderer_bin.clone(), font, s.sample_rate)))
            }
        }
    }

    pub fn arrange_options(&self) -> ArrangeOptions {
        ArrangeOptions {
            chord_velocity: self.melody_generation.chord_velocity,
            assign_instruments: self.melody_generation.assign_instruments,
        }
    }

    pub fn mix_settings(&self) -> MixSettings {
        MixSettings {
            recitation_db: self.music_synthesis.recitation_volume_db,
            melody_db: self.music_synthesis.melody_volume_db,
        }
    }
}

fn config_err(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Config(e.to_string())
}

//! Poem pipeline: feature record + recitation in, two finished songs out.
//!
//! Stages run strictly in order: mapping, then Plan A (scale walk) and Plan B
//! (generative model), each of which is composed, rendered and mixed with
//! the recitation on its own. Rendering and mixing degrade instead of failing;
//! anything else aborts the run with the stage that broke.

use std::fmt;

use audio_timeline::{mix_or_recitation, AudioError, MixOutcome, MixSettings, Waveform};
use melody_core::{MidiError, Score};
use melody_gen::{compose, ArrangeOptions, GenerationError, MelodyStrategy};
use melody_synth::{render_or_silence, RenderOutcome, Renderer};
use music_mapping::{map_features, MusicParams, ParamsError};
use poem_features::FeatureRecord;
use thiserror::Error;
use tracing::{error, info};

mod config;
mod models;

pub use config::{MelodyGenerationConfig, ModelSource, MusicSynthesisConfig, PipelineConfig, RendererKind};
pub use models::{FixtureModel, HttpSequenceModel};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlanId {
    A,
    B,
}

impl PlanId {
    /// Slug used in file names and JSON keys.
    pub fn slug(self) -> &'static str {
        match self {
            PlanId::A => "plan_a",
            PlanId::B => "plan_b",
        }
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanId::A => f.write_str("Plan A"),
            PlanId::B => f.write_str("Plan B"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("mapping stage failed: {0}")]
    Mapping(#[from] ParamsError),
    #[error("Plan A failed: {0}")]
    PlanA(#[source] GenerationError),
    #[error("Plan B failed: {0}")]
    PlanB(#[source] GenerationError),
    #[error("synthesis stage failed for {plan}: {source}")]
    Synthesis { plan: PlanId, source: MidiError },
    #[error("recitation audio is unusable: {0}")]
    Recitation(#[from] AudioError),
    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    fn generation(plan: PlanId, e: GenerationError) -> Self {
        match plan {
            PlanId::A => PipelineError::PlanA(e),
            PlanId::B => PipelineError::PlanB(e),
        }
    }
}

/// One plan's finished product.
#[derive(Clone, Debug)]
pub struct PlanOutput {
    pub plan: PlanId,
    pub score: Score,
    /// `score` as a Standard MIDI File.
    pub midi: Vec<u8>,
    pub render: RenderOutcome,
    pub mix: MixOutcome,
}

impl PlanOutput {
    pub fn final_waveform(&self) -> &Waveform { self.mix.waveform() }

    pub fn is_degraded(&self) -> bool {
        self.render.is_degraded() || self.mix.is_degraded()
    }
}

#[derive(Clone, Debug)]
pub struct SongOutput {
    pub params: MusicParams,
    pub plan_a: PlanOutput,
    pub plan_b: PlanOutput,
}

impl SongOutput {
    pub fn plans(&self) -> [&PlanOutput; 2] { [&self.plan_a, &self.plan_b] }
}

pub struct Pipeline {
    plan_a: Box<dyn MelodyStrategy>,
    plan_b: Box<dyn MelodyStrategy>,
    renderer: Box<dyn Renderer>,
    pub arrange: ArrangeOptions,
    pub mix: MixSettings,
    /// Rate of the silent stand-in when rendering fails.
    pub sample_rate: u32,
}

impl Pipeline {
    pub fn new(
        plan_a: impl MelodyStrategy + 'static,
        plan_b: impl MelodyStrategy + 'static,
        renderer: impl Renderer + 'static,
    ) -> Self {
        Self {
            plan_a: Box::new(plan_a),
            plan_b: Box::new(plan_b),
            renderer: Box::new(renderer),
            arrange: ArrangeOptions::default(),
            mix: MixSettings::default(),
            sample_rate: 44_100,
        }
    }

    /// Wire both plans, the renderer and the mix settings from `config`.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let plan_b = config.generative_adapter(config.sequence_model()?);
        let mut p = Pipeline::new(config.scale_walk(), plan_b, config.renderer()?);
        p.arrange = config.arrange_options();
        p.mix = config.mix_settings();
        p.sample_rate = config.music_synthesis.sample_rate;
        Ok(p)
    }

    /// Full run. The recitation's length is the target duration for both
    /// plans. Both plans are always attempted; if either fails the run fails
    /// with the first failing plan's error.
    pub fn run(&mut self, features: &FeatureRecord, recitation: &Waveform) -> Result<SongOutput, PipelineError> {
        let params = map_features(features);
        params.validate()?;

        let a = self.run_plan(PlanId::A, &params, recitation);
        let b = self.run_plan(PlanId::B, &params, recitation);
        for (plan, result) in [(PlanId::A, &a), (PlanId::B, &b)] {
            if let Err(e) = result {
                error!(plan = plan.slug(), error = %e, "plan failed");
            }
        }
        Ok(SongOutput { params, plan_a: a?, plan_b: b? })
    }

    /// Compose, render and mix a single plan.
    pub fn run_plan(&mut self, plan: PlanId, params: &MusicParams, recitation: &Waveform) -> Result<PlanOutput, PipelineError> {
        let target = recitation.duration_secs();
        let strategy = match plan {
            PlanId::A => self.plan_a.as_mut(),
            PlanId::B => self.plan_b.as_mut(),
        };
        let score = compose(strategy, params, target, &self.arrange)
            .map_err(|e| PipelineError::generation(plan, e))?;
        let midi = score.to_mid_bytes().map_err(|source| PipelineError::Synthesis { plan, source })?;

        let render = render_or_silence(self.renderer.as_ref(), &score, self.sample_rate);
        let mix = mix_or_recitation(recitation, render.waveform(), &self.mix);
        info!(
            plan = plan.slug(),
            notes = score.note_count(),
            render_degraded = render.is_degraded(),
            mix_degraded = mix.is_degraded(),
            duration_ms = mix.waveform().duration_ms(),
            "plan finished"
        );
        Ok(PlanOutput { plan, score, midi, render, mix })
    }
}

/// Make `title` safe to use as a file name on any platform: spaces become
/// underscores, reserved and control characters are dropped, the result is
/// at most 100 characters, and an empty result becomes `untitled`.
pub fn sanitize_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .take(100)
        .collect();
    if cleaned.is_empty() { "untitled".to_string() } else { cleaned }
}

/// `(mixed wav, midi)` file names for one plan.
pub fn artifact_names(title: &str, plan: PlanId) -> (String, String) {
    let stem = sanitize_filename(title);
    (
        format!("{stem}_final_song_{}.wav", plan.slug()),
        format!("{stem}_{}.mid", plan.slug()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_titles() {
        assert_eq!(sanitize_filename("The Road Not Taken"), "The_Road_Not_Taken");
        assert_eq!(sanitize_filename("a<b>c:d\"e/f\\g|h?i*j"), "abcdefghij");
        assert_eq!(sanitize_filename("tab\there\u{7}"), "tabhere");
        assert_eq!(sanitize_filename("???"), "untitled");
        assert_eq!(sanitize_filename(""), "untitled");
        assert_eq!(sanitize_filename(&"x".repeat(250)).chars().count(), 100);
        assert_eq!(sanitize_filename("Ode à l'été"), "Ode_à_l'été");
    }

    #[test]
    fn artifact_names_per_plan() {
        assert_eq!(
            artifact_names("Sea Fever", PlanId::A),
            ("Sea_Fever_final_song_plan_a.wav".into(), "Sea_Fever_plan_a.mid".into())
        );
        assert_eq!(artifact_names("", PlanId::B).0, "untitled_final_song_plan_b.wav");
    }

    #[test]
    fn stage_errors_name_the_plan() {
        let e = PipelineError::generation(PlanId::B, GenerationError::EmptySequence { strategy: "generative-model" });
        assert!(matches!(e, PipelineError::PlanB(_)));
        assert_eq!(e.to_string(), "Plan B failed: generative-model produced no notes");
    }
}

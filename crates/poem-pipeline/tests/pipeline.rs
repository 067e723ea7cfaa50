use std::cell::Cell;
use std::io::Write;

use audio_timeline::Waveform;
use melody_core::{Mode, Note, Score};
use melody_gen::{GenerationError, GenerativeAdapter, ModelError, ModelSegment, ScaleWalk, SequenceModel};
use melody_synth::{OscillatorRenderer, RenderError, RenderOutcome, Renderer};
use music_mapping::TimeSignature;
use poem_features::{Emotion, FeatureRecord, RhymePattern, Sentiment};
use poem_pipeline::{Pipeline, PipelineConfig, PipelineError, PlanId};

const SR: u32 = 8000;

struct Scripted(ModelSegment);

impl SequenceModel for Scripted {
    fn sample(&self, n: usize, _steps: usize) -> Result<Vec<ModelSegment>, ModelError> {
        Ok(vec![self.0.clone(); n])
    }
}

struct Unreachable;

impl SequenceModel for Unreachable {
    fn sample(&self, _: usize, _: usize) -> Result<Vec<ModelSegment>, ModelError> {
        Err(ModelError::Request("connection refused".into()))
    }
}

/// Oscillator that gives up on every call after the first.
struct FailsAfterFirst {
    inner: OscillatorRenderer,
    calls: Cell<usize>,
}

impl Renderer for FailsAfterFirst {
    fn name(&self) -> &'static str { "fails-after-first" }
    fn render(&self, score: &Score) -> Result<Waveform, RenderError> {
        let n = self.calls.get();
        self.calls.set(n + 1);
        if n == 0 {
            self.inner.render(score)
        } else {
            Err(RenderError::RendererFailed { status: "exit status: 1".into(), stderr: "no audio driver".into() })
        }
    }
}

fn love_poem() -> FeatureRecord {
    FeatureRecord {
        sentiment: Sentiment::Positive,
        emotion: Emotion::Joy,
        theme: "love".into(),
        keywords: vec![],
        rhyme_pattern: RhymePattern::Aabb,
    }
}

fn recitation(secs: f64) -> Waveform {
    let n = (secs * SR as f64) as usize;
    let samples = (0..n)
        .map(|i| 0.3 * (2.0 * std::f32::consts::PI * 220.0 * i as f32 / SR as f32).sin())
        .collect();
    Waveform::new(samples, SR).unwrap()
}

fn arpeggio() -> ModelSegment {
    ModelSegment {
        notes: vec![
            Note::new(60, 90, 0.0, 1.0),
            Note::new(64, 90, 1.0, 2.0),
            Note::new(67, 90, 2.0, 3.0),
            Note::new(72, 90, 3.0, 4.0),
        ],
    }
}

fn pipeline<M: SequenceModel + 'static, R: Renderer + 'static>(model: M, renderer: R) -> Pipeline {
    let mut p = Pipeline::new(ScaleWalk::seeded(11), GenerativeAdapter::new(model), renderer);
    p.sample_rate = SR;
    p
}

fn melody_notes(score: &Score) -> Vec<Note> {
    let (_chords, melody) = score.tracks.split_last().unwrap();
    let mut notes: Vec<Note> = melody.iter().flat_map(|t| t.notes.iter().copied()).collect();
    notes.sort_by(|a, b| a.start.total_cmp(&b.start));
    notes
}

#[test]
fn love_poem_end_to_end() {
    let voice = recitation(8.0);
    let out = pipeline(Scripted(arpeggio()), OscillatorRenderer::new(SR))
        .run(&love_poem(), &voice)
        .unwrap();

    assert_eq!(out.params.mode, Mode::Major);
    assert_eq!(out.params.base_pitch, 60);
    assert_eq!(out.params.tempo, 100.0);
    assert_eq!(out.params.instruments, ["piano", "violin", "cello", "guitar"]);
    assert_eq!(out.params.time_signature, TimeSignature::FourFour);

    // four instrument tracks, chords last
    let a = &out.plan_a;
    assert_eq!(a.score.tracks.len(), 5);
    assert_eq!(a.score.tracks[4].name, "chords");
    let notes = melody_notes(&a.score);
    assert_eq!(notes.len(), 16);
    assert!(notes.iter().all(|n| (n.duration() - 0.5).abs() < 1e-9));
    let total: f64 = notes.iter().map(Note::duration).sum();
    assert!((total - 8.0).abs() < 1e-9);

    let b = &out.plan_b;
    assert!((b.score.end_time() - 8.0).abs() < 1e-9);
    assert_eq!(melody_notes(&b.score).len(), 8);

    for plan in out.plans() {
        assert!(!plan.is_degraded(), "{} degraded", plan.plan);
        assert_eq!(plan.final_waveform().duration_ms(), 8000);
        assert_eq!(&plan.midi[..4], b"MThd");
    }
}

#[test]
fn plan_b_render_failure_only_silences_plan_b() {
    let voice = recitation(6.0);
    let renderer = FailsAfterFirst { inner: OscillatorRenderer::new(SR), calls: Cell::new(0) };
    let out = pipeline(Scripted(arpeggio()), renderer).run(&love_poem(), &voice).unwrap();

    assert!(!out.plan_a.is_degraded());
    assert_ne!(out.plan_a.final_waveform(), &voice);

    let b = &out.plan_b;
    match &b.render {
        RenderOutcome::Silent { waveform, reason } => {
            assert_eq!(waveform.duration_ms(), (b.score.end_time() * 1000.0).round() as u64);
            assert!(waveform.samples().iter().all(|&s| s == 0.0));
            assert!(reason.contains("no audio driver"));
        }
        RenderOutcome::Rendered(_) => panic!("plan B should have fallen back to silence"),
    }
    assert!(!b.mix.is_degraded());
    assert_eq!(b.final_waveform(), &voice);
}

#[test]
fn model_failure_fails_the_run_as_plan_b() {
    let err = pipeline(Unreachable, OscillatorRenderer::new(SR))
        .run(&love_poem(), &recitation(4.0))
        .unwrap_err();
    assert!(matches!(err, PipelineError::PlanB(GenerationError::Model(ModelError::Request(_)))));
}

#[test]
fn empty_model_output_fails_the_run() {
    let err = pipeline(Scripted(ModelSegment::default()), OscillatorRenderer::new(SR))
        .run(&love_poem(), &recitation(4.0))
        .unwrap_err();
    assert!(matches!(err, PipelineError::PlanB(GenerationError::EmptySequence { .. })));
}

#[test]
fn silent_recitation_of_zero_length_fails_plan_a_first() {
    let err = pipeline(Scripted(arpeggio()), OscillatorRenderer::new(SR))
        .run(&love_poem(), &Waveform::silent(0, SR))
        .unwrap_err();
    assert!(matches!(err, PipelineError::PlanA(GenerationError::InvalidDuration(_))));
}

#[test]
fn unknown_labels_still_produce_songs() {
    let features: FeatureRecord = serde_json::from_str(
        r#"{ "sentiment": "ambivalent", "emotion": "wistful", "theme": "cities",
             "keywords": ["Autumn", "lamp"], "rhyme_pattern": "ABCB" }"#,
    )
    .unwrap();
    let out = pipeline(Scripted(arpeggio()), OscillatorRenderer::new(SR))
        .run(&features, &recitation(5.0))
        .unwrap();
    assert_eq!(out.params.mode, Mode::Minor);
    assert_eq!(out.params.tempo, 90.0);
    assert_eq!(out.params.instruments, ["piano", "guitar", "violin", "alto_sax"]);
    assert_eq!(out.params.background_effects.unwrap().len(), 3);
    assert_eq!(out.plan_a.final_waveform().duration_ms(), 5000);
}

#[test]
fn configured_pipeline_is_reproducible_with_a_seed() {
    let mut fixture = tempfile::NamedTempFile::new().unwrap();
    write!(
        fixture,
        r#"{{ "segments": [ {{ "notes": [ {{ "pitch": 62, "velocity": 80, "start": 0.0, "end": 3.5 }} ] }} ] }}"#
    )
    .unwrap();
    let config = PipelineConfig::from_json_str(&format!(
        r#"{{
            "melody_generation": {{ "seed": 5, "model": {{ "kind": "fixture", "path": {:?} }} }},
            "music_synthesis": {{ "renderer": "oscillator", "sample_rate": {SR}, "melody_volume_db": -6.0 }}
        }}"#,
        fixture.path()
    ))
    .unwrap();

    let voice = recitation(4.5);
    let first = Pipeline::from_config(&config).unwrap().run(&love_poem(), &voice).unwrap();
    let second = Pipeline::from_config(&config).unwrap().run(&love_poem(), &voice).unwrap();
    assert_eq!(first.plan_a.score, second.plan_a.score);
    assert_eq!(first.plan_a.final_waveform(), second.plan_a.final_waveform());

    // one 4 s segment fits in 4.5 s; its single note is stretched to the end
    let b = melody_notes(&first.plan_b.score);
    assert_eq!(b.len(), 1);
    assert_eq!(b[0].pitch, 62);
    assert!((b[0].end - 4.5).abs() < 1e-9);
    assert_eq!(first.plan_b.plan, PlanId::B);
}

//! Built-in additive oscillator synth. Each track picks a timbre from its
//! General MIDI program family; layers are slightly detuned copies.

use std::f32::consts::PI;

use audio_timeline::Waveform;
use melody_core::{midi_to_hz, Note, Score};

use crate::{RenderError, Renderer};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Osc {
    Sine,
    Saw,
    Square,
}

#[derive(Clone, Debug)]
pub struct OscillatorRenderer {
    pub sample_rate: u32,
    /// Timbre layers on top of each track's primary oscillator.
    pub extra_layers: Vec<Osc>,
}

impl OscillatorRenderer {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate, extra_layers: vec![Osc::Sine] }
    }
}

impl Renderer for OscillatorRenderer {
    fn name(&self) -> &'static str { "oscillator" }

    fn render(&self, score: &Score) -> Result<Waveform, RenderError> {
        if score.is_empty() {
            return Err(RenderError::EmptyScore);
        }
        let sr = self.sample_rate.max(1);
        let total_samples = (score.end_time() * sr as f64).ceil() as usize;
        let mut out = vec![0.0f32; total_samples];

        for track in &score.tracks {
            let mut layers = vec![primary_osc(track.program)];
            layers.extend_from_slice(&self.extra_layers);
            let specs = layering_specs(&layers);
            for note in &track.notes {
                for spec in &specs {
                    let f0 = midi_to_hz(note.pitch as f32) * cents_to_ratio(spec.detune_cents);
                    render_note(&mut out, sr, f0, note, (note.velocity as f32 / 127.0) * spec.gain, spec.osc);
                }
            }
        }

        normalize_soft(&mut out, 0.99);
        Ok(Waveform::new(out, sr)?)
    }
}

/// Rough GM family -> oscillator choice.
fn primary_osc(program: u8) -> Osc {
    match program {
        40..=55 => Osc::Saw,    // strings, ensembles
        56..=71 => Osc::Square, // brass, reeds
        _ => Osc::Sine,         // keys, guitars, pipes, percussion
    }
}

#[derive(Clone, Copy)]
struct LayerSpec { osc: Osc, detune_cents: f32, gain: f32 }

fn layering_specs(list: &[Osc]) -> Vec<LayerSpec> {
    list.iter()
        .enumerate()
        .map(|(i, &osc)| {
            let (det, g) = match (osc, i) {
                (Osc::Saw, 0)    => (  0.0, 0.70),
                (Osc::Saw, 1)    => (  7.0, 0.20),
                (Osc::Saw, _)    => ( -4.0, 0.10),
                (Osc::Square, 0) => (  0.0, 0.70),
                (Osc::Square, 1) => (  5.0, 0.20),
                (Osc::Square, _) => ( -5.0, 0.10),
                (Osc::Sine, 0)   => (  0.0, 0.80),
                (Osc::Sine, 1)   => ( 12.0, 0.15),
                (Osc::Sine, _)   => (  4.0, 0.05),
            };
            LayerSpec { osc, detune_cents: det, gain: g }
        })
        .collect()
}

fn cents_to_ratio(cents: f32) -> f32 {
    2f32.powf(cents / 1200.0)
}

fn osc_sample(osc: Osc, phase: f32) -> f32 {
    match osc {
        Osc::Sine => (2.0 * PI * phase).sin(),
        Osc::Saw => 2.0 * phase.fract() - 1.0,
        Osc::Square => if phase.fract() < 0.5 { 1.0 } else { -1.0 },
    }
}

// fast attack, gentle decay; rel in [0,1]
fn ad_env(rel: f32) -> f32 {
    let a = if rel < 0.02 { rel / 0.02 } else { 1.0 };
    let d = 1.0 - rel.powf(1.5).min(1.0);
    a * d
}

fn render_note(out: &mut [f32], sr: u32, f0: f32, note: &Note, gain: f32, osc: Osc) {
    if note.end <= note.start { return; }
    let sr_f = sr as f64;
    let start = (note.start * sr_f).max(0.0) as usize;
    let end = ((note.end * sr_f) as usize).min(out.len());
    if end <= start { return; }

    let mut phase = 0.0f32;
    let inc = f0 / sr as f32;
    let dur = (end - start).max(1) as f32;
    for (i, s) in out[start..end].iter_mut().enumerate() {
        *s += osc_sample(osc, phase) * ad_env(i as f32 / dur) * gain;
        phase += inc;
        if phase >= 1.0 { phase -= 1.0; }
    }
}

fn normalize_soft(buf: &mut [f32], target_peak: f32) {
    let peak = buf.iter().fold(0.0f32, |p, &x| p.max(x.abs()));
    if peak > target_peak && peak > 1e-9 {
        let k = target_peak / peak;
        for x in buf.iter_mut() { *x *= k; }
    }
}

//! Feature record -> music parameters.
//!
//! Every sub-mapping is a fixed table with a default row, so mapping never
//! fails. Unrecognized labels are reported through `tracing` and mapped to the
//! default row.

use melody_core::{Mode, MIDI_MAX};
use poem_features::{Emotion, FeatureRecord, RhymePattern, Sentiment};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Simultaneous pitches, absolute MIDI numbers.
pub type Chord = Vec<u8>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MelodyShape { Ascending, Descending, Abrupt, Variable, Unstable, Irregular, Smooth }

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSignature {
    #[serde(rename = "4/4")]
    FourFour,
    #[serde(rename = "3/4")]
    ThreeFour,
}

impl TimeSignature {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeSignature::FourFour => "4/4",
            TimeSignature::ThreeFour => "3/4",
        }
    }
}

/// Everything both melody strategies need to know about a poem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MusicParams {
    pub mode: Mode,
    pub base_pitch: u8,
    pub chord_progression: Vec<Chord>,
    /// Informational; the scale walk does not follow it.
    pub melody_shape: MelodyShape,
    /// Beats per minute.
    pub tempo: f64,
    pub dynamics: String,
    pub ornamentation: String,
    pub instruments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_effects: Option<Vec<String>>,
    pub structure: String,
    pub time_signature: TimeSignature,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("tempo must be a positive number of BPM, got {0}")]
    Tempo(f64),
    #[error("base pitch {0} is outside the MIDI range")]
    BasePitch(u8),
    #[error("chord progression is empty")]
    EmptyProgression,
    #[error("chord {index} is empty or holds a pitch above 127")]
    Chord { index: usize },
}

impl MusicParams {
    /// Reject records that cannot drive a generator (hand-edited or
    /// deserialized records; mapper output always passes).
    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(self.tempo.is_finite() && self.tempo > 0.0) {
            return Err(ParamsError::Tempo(self.tempo));
        }
        if self.base_pitch > MIDI_MAX {
            return Err(ParamsError::BasePitch(self.base_pitch));
        }
        if self.chord_progression.is_empty() {
            return Err(ParamsError::EmptyProgression);
        }
        for (index, chord) in self.chord_progression.iter().enumerate() {
            if chord.is_empty() || chord.iter().any(|&p| p > MIDI_MAX) {
                return Err(ParamsError::Chord { index });
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SentimentMapping { pub mode: Mode, pub base_pitch: u8, pub chord_progression: Vec<Chord> }

pub fn map_sentiment(sentiment: &Sentiment) -> SentimentMapping {
    match sentiment {
        Sentiment::Positive => SentimentMapping {
            mode: Mode::Major,
            base_pitch: 60, // C4
            // C F G C
            chord_progression: vec![vec![60, 64, 67], vec![65, 69, 72], vec![67, 71, 74], vec![60, 64, 67]],
        },
        Sentiment::Negative => SentimentMapping {
            mode: Mode::Minor,
            base_pitch: 57, // A3
            // Am Dm Em(approx.) Am
            chord_progression: vec![vec![57, 60, 64], vec![50, 53, 57], vec![52, 56, 59], vec![57, 60, 64]],
        },
        Sentiment::Neutral => SentimentMapping {
            mode: Mode::Modal,
            base_pitch: 60,
            // Csus2 Dm Bb Csus2, C dorian colour
            chord_progression: vec![vec![60, 62, 67], vec![62, 65, 69], vec![58, 62, 65], vec![60, 62, 67]],
        },
        Sentiment::Other(raw) => {
            warn!(sentiment = %raw, "unrecognized sentiment, using default minor mapping");
            SentimentMapping {
                mode: Mode::Minor,
                base_pitch: 60,
                // Cm Fm Gm Cm
                chord_progression: vec![vec![60, 63, 67], vec![65, 68, 72], vec![67, 70, 74], vec![60, 63, 67]],
            }
        }
    }
}

/// Named tempo characters, each a BPM range.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TempoRange { Lively, Slow, FastOrIrregular, SuddenShifts, Uneven, Unpredictable, Moderate }

impl TempoRange {
    pub fn bounds(self) -> (f64, f64) {
        match self {
            TempoRange::Lively => (90.0, 110.0),
            TempoRange::Slow => (60.0, 80.0),
            TempoRange::FastOrIrregular => (110.0, 130.0),
            TempoRange::SuddenShifts => (80.0, 120.0),
            TempoRange::Uneven => (70.0, 90.0),
            TempoRange::Unpredictable => (90.0, 120.0),
            TempoRange::Moderate => (80.0, 100.0),
        }
    }
    pub fn midpoint(self) -> f64 {
        let (lo, hi) = self.bounds();
        lo + (hi - lo) * 0.5
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EmotionMapping {
    pub melody_shape: MelodyShape,
    pub tempo: f64,
    pub dynamics: &'static str,
    pub ornamentation: &'static str,
}

pub fn map_emotion(emotion: &Emotion) -> EmotionMapping {
    let (melody_shape, range, dynamics, ornamentation) = match emotion {
        Emotion::Joy => (MelodyShape::Ascending, TempoRange::Lively, "active", "rich"),
        Emotion::Sadness => (MelodyShape::Descending, TempoRange::Slow, "soft", "minimal"),
        Emotion::Anger => (MelodyShape::Abrupt, TempoRange::FastOrIrregular, "strong and staccato", "sporadic with dissonances"),
        Emotion::Surprise => (MelodyShape::Variable, TempoRange::SuddenShifts, "unexpected", "sporadic"),
        Emotion::Fear => (MelodyShape::Unstable, TempoRange::Uneven, "tense", "sparse, with suspenseful intervals"),
        Emotion::Disgust => (MelodyShape::Irregular, TempoRange::Unpredictable, "uneven", "dissonant"),
        Emotion::Other(raw) => {
            warn!(emotion = %raw, "unrecognized emotion, using default smooth mapping");
            (MelodyShape::Smooth, TempoRange::Moderate, "normal", "minimal")
        }
    };
    EmotionMapping { melody_shape, tempo: range.midpoint(), dynamics, ornamentation }
}

const THEME_INSTRUMENTS: &[(&str, [&str; 4])] = &[
    ("nature", ["flute", "clarinet", "harp", "tubular_bells"]),
    ("love", ["piano", "violin", "cello", "guitar"]),
    ("death", ["cello", "contrabass", "organ", "tuba"]),
    ("war", ["timpani", "trumpet", "french_horn", "trombone"]),
];
const DEFAULT_INSTRUMENTS: [&str; 4] = ["piano", "guitar", "violin", "alto_sax"];

pub fn map_theme(theme: &str) -> Vec<String> {
    let key = theme.trim().to_lowercase();
    let row = match THEME_INSTRUMENTS.iter().find(|(t, _)| *t == key) {
        Some((_, row)) => row,
        None => {
            if key != "other" {
                warn!(theme = %theme, "unrecognized theme, using default instruments");
            }
            &DEFAULT_INSTRUMENTS
        }
    };
    row.iter().map(|s| s.to_string()).collect()
}

const NATURE_WORDS: &[&str] = &["nests", "squirrels", "dormouse", "seeds", "autumn"];
const NATURE_EFFECTS: &[&str] = &["bird chirps", "water flow", "wind rustle"];

/// Ambient effect suggestions; `None` when no keyword triggers any.
pub fn map_keywords(keywords: &[String]) -> Option<Vec<String>> {
    let hit = keywords.iter().any(|k| NATURE_WORDS.contains(&k.trim().to_lowercase().as_str()));
    hit.then(|| NATURE_EFFECTS.iter().map(|s| s.to_string()).collect())
}

#[derive(Clone, Debug, PartialEq)]
pub struct RhymeMapping { pub structure: &'static str, pub time_signature: TimeSignature }

pub fn map_rhyme_pattern(pattern: &RhymePattern) -> RhymeMapping {
    match pattern {
        RhymePattern::Aabb => RhymeMapping { structure: "symmetric paired repetition", time_signature: TimeSignature::FourFour },
        RhymePattern::Abab => RhymeMapping { structure: "alternating thematic sections", time_signature: TimeSignature::ThreeFour },
        RhymePattern::FreeVerse => RhymeMapping { structure: "free form", time_signature: TimeSignature::FourFour },
        RhymePattern::Other(raw) => {
            warn!(rhyme_pattern = %raw, "unrecognized rhyme pattern, using free form");
            RhymeMapping { structure: "free form", time_signature: TimeSignature::FourFour }
        }
    }
}

/// Combine all sub-mappings into one parameter record.
pub fn map_features(features: &FeatureRecord) -> MusicParams {
    let s = map_sentiment(&features.sentiment);
    let e = map_emotion(&features.emotion);
    let r = map_rhyme_pattern(&features.rhyme_pattern);
    let params = MusicParams {
        mode: s.mode,
        base_pitch: s.base_pitch,
        chord_progression: s.chord_progression,
        melody_shape: e.melody_shape,
        tempo: e.tempo,
        dynamics: e.dynamics.to_string(),
        ornamentation: e.ornamentation.to_string(),
        instruments: map_theme(&features.theme),
        background_effects: map_keywords(&features.keywords),
        structure: r.structure.to_string(),
        time_signature: r.time_signature,
    };
    info!(
        mode = %params.mode,
        base_pitch = params.base_pitch,
        tempo = params.tempo,
        melody_shape = ?params.melody_shape,
        instruments = ?params.instruments,
        background_effects = ?params.background_effects,
        time_signature = params.time_signature.as_str(),
        "mapped poem features to music parameters"
    );
    params
}

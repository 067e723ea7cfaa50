//! Poem feature record: the categorical summary of a poem that drives the
//! music mapping. Labels parse leniently (case-insensitive, unknown labels are
//! kept verbatim) so the mapper can log what it fell back on.

use serde::{Deserialize, Serialize};

mod extract;

pub use extract::{analyze, polarity, sentiment_from_polarity, AnalyzeOptions};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    /// Anything the NLP stage produced that is not one of the three above.
    Other(String),
}

impl From<String> for Sentiment {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            "neutral" => Sentiment::Neutral,
            _ => Sentiment::Other(s),
        }
    }
}

impl From<Sentiment> for String {
    fn from(s: Sentiment) -> Self {
        match s {
            Sentiment::Positive => "Positive".into(),
            Sentiment::Negative => "Negative".into(),
            Sentiment::Neutral => "Neutral".into(),
            Sentiment::Other(raw) => raw,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Emotion {
    Joy,
    Sadness,
    Anger,
    Surprise,
    Fear,
    Disgust,
    Other(String),
}

impl From<String> for Emotion {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "joy" => Emotion::Joy,
            "sadness" => Emotion::Sadness,
            "anger" => Emotion::Anger,
            "surprise" => Emotion::Surprise,
            "fear" => Emotion::Fear,
            "disgust" => Emotion::Disgust,
            _ => Emotion::Other(s),
        }
    }
}

impl From<Emotion> for String {
    fn from(e: Emotion) -> Self {
        match e {
            Emotion::Joy => "joy".into(),
            Emotion::Sadness => "sadness".into(),
            Emotion::Anger => "anger".into(),
            Emotion::Surprise => "surprise".into(),
            Emotion::Fear => "fear".into(),
            Emotion::Disgust => "disgust".into(),
            Emotion::Other(raw) => raw,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RhymePattern {
    Aabb,
    Abab,
    FreeVerse,
    Other(String),
}

impl From<String> for RhymePattern {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "aabb" => RhymePattern::Aabb,
            "abab" => RhymePattern::Abab,
            "free verse" | "free_verse" | "freeverse" => RhymePattern::FreeVerse,
            _ => RhymePattern::Other(s),
        }
    }
}

impl From<RhymePattern> for String {
    fn from(r: RhymePattern) -> Self {
        match r {
            RhymePattern::Aabb => "AABB".into(),
            RhymePattern::Abab => "ABAB".into(),
            RhymePattern::FreeVerse => "Free Verse".into(),
            RhymePattern::Other(raw) => raw,
        }
    }
}

/// Output of the NLP stage for one poem. Immutable once produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub sentiment: Sentiment,
    pub emotion: Emotion,
    pub theme: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub rhyme_pattern: RhymePattern,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_case_insensitively() {
        let rec: FeatureRecord = serde_json::from_str(
            r#"{"sentiment":"positive","emotion":"Joy","theme":"Love","rhyme_pattern":"aabb"}"#,
        )
        .unwrap();
        assert_eq!(rec.sentiment, Sentiment::Positive);
        assert_eq!(rec.emotion, Emotion::Joy);
        assert_eq!(rec.rhyme_pattern, RhymePattern::Aabb);
        assert!(rec.keywords.is_empty());
    }

    #[test]
    fn unknown_labels_are_kept() {
        assert_eq!(Sentiment::from("Mixed".to_string()), Sentiment::Other("Mixed".into()));
        assert_eq!(Emotion::from("Unknown".to_string()), Emotion::Other("Unknown".into()));
        assert_eq!(RhymePattern::from("ABBA".to_string()), RhymePattern::Other("ABBA".into()));
        assert_eq!(RhymePattern::from("Free Verse".to_string()), RhymePattern::FreeVerse);
    }

    #[test]
    fn serializes_back_to_labels() {
        let rec = FeatureRecord {
            sentiment: Sentiment::Neutral,
            emotion: Emotion::Other("calm".into()),
            theme: "nature".into(),
            keywords: vec!["autumn".into()],
            rhyme_pattern: RhymePattern::FreeVerse,
        };
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["sentiment"], "Neutral");
        assert_eq!(v["emotion"], "calm");
        assert_eq!(v["rhyme_pattern"], "Free Verse");
    }

    #[test]
    fn missing_sentiment_is_an_error() {
        let r: Result<FeatureRecord, _> =
            serde_json::from_str(r#"{"emotion":"joy","theme":"love","rhyme_pattern":"AABB"}"#);
        assert!(r.is_err());
    }
}

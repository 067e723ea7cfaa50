//! Lexicon-based feature extraction. Crude on purpose: it exists so a poem can
//! be run end to end without the full NLP stack behind the feature record.

use std::collections::HashMap;

use tracing::debug;

use crate::{Emotion, FeatureRecord, RhymePattern, Sentiment};

#[derive(Clone, Debug)]
pub struct AnalyzeOptions {
    /// Polarity above `+t` is positive, below `-t` negative.
    pub sentiment_threshold: f32,
    pub top_keywords: usize,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self { sentiment_threshold: 0.1, top_keywords: 5 }
    }
}

const POSITIVE: &[&str] = &["sun", "warm", "love", "bright", "calm", "happy", "hope", "joy", "sweet", "light"];
const NEGATIVE: &[&str] = &["dark", "cold", "sad", "storm", "alone", "hate", "anger", "death", "grief", "tears"];

const EMOTIONS: &[(&str, &[&str])] = &[
    ("joy", &["joy", "happy", "delight", "glad", "laugh", "merry", "smile"]),
    ("sadness", &["sad", "tears", "grief", "sorrow", "weep", "lonely", "alone"]),
    ("anger", &["anger", "rage", "fury", "hate", "wrath", "scorn"]),
    ("surprise", &["surprise", "sudden", "wonder", "amazed", "astonish"]),
    ("fear", &["fear", "afraid", "terror", "dread", "tremble", "shadow"]),
    ("disgust", &["disgust", "rot", "foul", "vile", "filth"]),
];

const THEMES: &[(&str, &[&str])] = &[
    ("nature", &["tree", "trees", "forest", "river", "flower", "autumn", "leaves", "seeds", "nests", "squirrels", "rain", "wind", "bird"]),
    ("love", &["love", "heart", "kiss", "beloved", "darling", "desire"]),
    ("death", &["death", "grave", "dying", "mourn", "funeral", "tomb"]),
    ("war", &["war", "battle", "soldier", "sword", "blood", "army"]),
];

const STOPWORDS: &[&str] = &[
    "that", "this", "with", "from", "have", "were", "they", "them", "their", "there", "then",
    "than", "when", "what", "which", "will", "would", "shall", "into", "upon", "your", "been",
    "some", "like", "only", "over", "such", "where", "while", "each", "more", "most", "very",
];

/// Very simple sentiment signal in [-1, 1]
pub fn polarity(text: &str) -> f32 {
    let words = tokenize(text);
    let mut s = 0f32;
    for w in &words {
        if POSITIVE.contains(&w.as_str()) { s += 1.0; }
        if NEGATIVE.contains(&w.as_str()) { s -= 1.0; }
    }
    s.tanh()
}

pub fn sentiment_from_polarity(p: f32, threshold: f32) -> Sentiment {
    if p > threshold {
        Sentiment::Positive
    } else if p < -threshold {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

/// Build a full feature record from raw poem text.
pub fn analyze(text: &str, opts: &AnalyzeOptions) -> FeatureRecord {
    let p = polarity(text);
    let keywords = keywords(text, opts.top_keywords);
    let theme = theme_for(&keywords);
    let lines: Vec<&str> = text.lines().collect();
    let record = FeatureRecord {
        sentiment: sentiment_from_polarity(p, opts.sentiment_threshold),
        emotion: emotion_for(text),
        theme,
        keywords,
        rhyme_pattern: rhyme_scheme(&lines),
    };
    debug!(polarity = p, ?record, "extracted poem features");
    record
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphabetic() && c != '\'')
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

fn keywords(text: &str, top_n: usize) -> Vec<String> {
    // word -> (count, first position)
    let mut seen: HashMap<String, (usize, usize)> = HashMap::new();
    for (pos, w) in tokenize(text).into_iter().enumerate() {
        if w.chars().count() < 4 || STOPWORDS.contains(&w.as_str()) {
            continue;
        }
        seen.entry(w).or_insert((0, pos)).0 += 1;
    }
    let mut ranked: Vec<(String, (usize, usize))> = seen.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked.into_iter().take(top_n).map(|(w, _)| w).collect()
}

fn theme_for(keywords: &[String]) -> String {
    THEMES
        .iter()
        .find(|(_, vocab)| keywords.iter().any(|k| vocab.contains(&k.as_str())))
        .map(|(t, _)| t.to_string())
        .unwrap_or_else(|| "other".to_string())
}

fn emotion_for(text: &str) -> Emotion {
    let words = tokenize(text);
    let mut best: Option<(&str, usize)> = None;
    for (label, vocab) in EMOTIONS {
        let hits = words.iter().filter(|w| vocab.contains(&w.as_str())).count();
        if hits > 0 && best.map_or(true, |(_, b)| hits > b) {
            best = Some((*label, hits));
        }
    }
    match best {
        Some((label, _)) => Emotion::from(label.to_string()),
        None => Emotion::Other("neutral".to_string()),
    }
}

// Last vowel group of a word plus whatever follows it: "night" -> "ight".
fn rhyme_tail(word: &str) -> Option<String> {
    let chars: Vec<char> = word.chars().collect();
    let is_vowel = |c: char| "aeiouy".contains(c);
    let last_vowel = chars.iter().rposition(|&c| is_vowel(c))?;
    let mut start = last_vowel;
    while start > 0 && is_vowel(chars[start - 1]) {
        start -= 1;
    }
    Some(chars[start..].iter().collect())
}

fn last_word(line: &str) -> Option<String> {
    tokenize(line).pop()
}

fn rhyme_scheme(lines: &[&str]) -> RhymePattern {
    let tails: Vec<Option<String>> = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| last_word(l).and_then(|w| rhyme_tail(&w)))
        .collect();
    if tails.len() < 2 {
        return RhymePattern::FreeVerse;
    }
    let matches: Vec<bool> = tails
        .chunks_exact(2)
        .map(|pair| matches!((&pair[0], &pair[1]), (Some(a), Some(b)) if a == b))
        .collect();
    if matches.iter().all(|&m| m) {
        RhymePattern::Aabb
    } else if matches.iter().any(|&m| m) {
        RhymePattern::Abab
    } else {
        RhymePattern::FreeVerse
    }
}

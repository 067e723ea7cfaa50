use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest valid MIDI note number.
pub const MIDI_MAX: u8 = 127;

/// MIDI -> frequency
pub fn midi_to_hz(m: f32) -> f32 { 440.0 * 2f32.powf((m - 69.0) / 12.0) }

/// Clamp an arbitrary semitone value into the MIDI range. Never wraps.
pub fn clamp_pitch(p: i32) -> u8 { p.clamp(0, MIDI_MAX as i32) as u8 }

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("score tempo must be positive, got {0}")]
    InvalidTempo(f64),
    #[error("failed to encode SMF: {0}")]
    Io(#[from] std::io::Error),
}

/// One note event; times are in seconds from the start of the score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note { pub pitch: u8, pub velocity: u8, pub start: f64, pub end: f64 }

impl Note {
    pub fn new(pitch: u8, velocity: u8, start: f64, end: f64) -> Self {
        Self { pitch: pitch.min(MIDI_MAX), velocity: velocity.min(MIDI_MAX), start, end }
    }
    pub fn duration(&self) -> f64 { self.end - self.start }
}

/// One instrument line of a score.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    /// General MIDI program (0 = acoustic grand piano).
    pub program: u8,
    pub notes: Vec<Note>,
}

impl Track {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), program: 0, notes: Vec::new() }
    }
    pub fn with_program(mut self, program: u8) -> Self {
        self.program = program.min(MIDI_MAX);
        self
    }
    pub fn push(&mut self, pitch: u8, start: f64, end: f64, vel: u8) {
        self.notes.push(Note::new(pitch, vel, start, end));
    }
    pub fn is_empty(&self) -> bool { self.notes.is_empty() }
    pub fn end_time(&self) -> f64 {
        self.notes.iter().fold(0.0, |mx, n| mx.max(n.end))
    }
    /// Keep notes chronologically non-decreasing by start time.
    pub fn sort(&mut self) {
        self.notes.sort_by(|a, b| a.start.total_cmp(&b.start));
    }
}

/// Multi-track symbolic music container.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Score { pub tempo_bpm: f64, pub tracks: Vec<Track> }

impl Score {
    pub fn new(tempo_bpm: f64) -> Self { Self { tempo_bpm, tracks: Vec::new() } }
    pub fn push_track(&mut self, track: Track) { self.tracks.push(track); }
    pub fn end_time(&self) -> f64 {
        self.tracks.iter().fold(0.0, |mx, t| mx.max(t.end_time()))
    }
    pub fn note_count(&self) -> usize { self.tracks.iter().map(|t| t.notes.len()).sum() }
    pub fn is_empty(&self) -> bool { self.tracks.iter().all(Track::is_empty) }

    /// Serialize to SMF bytes: format 1, tempo track first, then one track per
    /// instrument track with its own channel and program.
    pub fn to_mid_bytes(&self) -> Result<Vec<u8>, MidiError> {
        use midly::{
            Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind,
            num::{u15, u24, u28, u4, u7},
        };

        if !(self.tempo_bpm.is_finite() && self.tempo_bpm > 0.0) {
            return Err(MidiError::InvalidTempo(self.tempo_bpm));
        }
        let micros_per_quarter = (60_000_000.0 / self.tempo_bpm).round().min(0xFF_FFFF as f64) as u32;
        let ticks_per_sec = self.tempo_bpm / 60.0 * PPQ as f64;
        let to_tick = |t: f64| (t.max(0.0) * ticks_per_sec).round() as u32;

        let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(u15::new(PPQ))));
        smf.tracks.push(vec![
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(micros_per_quarter))),
            },
            TrackEvent { delta: u28::new(0), kind: TrackEventKind::Meta(MetaMessage::EndOfTrack) },
        ]);

        for (ti, t) in self.tracks.iter().enumerate() {
            let channel = u4::new(midi_channel(ti));
            let mut track = vec![
                TrackEvent {
                    delta: u28::new(0),
                    kind: TrackEventKind::Meta(MetaMessage::TrackName(t.name.as_bytes())),
                },
                TrackEvent {
                    delta: u28::new(0),
                    kind: TrackEventKind::Midi {
                        channel,
                        message: MidiMessage::ProgramChange { program: u7::new(t.program.min(MIDI_MAX)) },
                    },
                },
            ];

            // (tick, is_on, note); offs sort before ons on the same tick
            let mut evs: Vec<(u32, bool, &Note)> = Vec::with_capacity(t.notes.len() * 2);
            for n in &t.notes {
                evs.push((to_tick(n.start), true, n));
                evs.push((to_tick(n.end), false, n));
            }
            evs.sort_by_key(|&(tick, on, _)| (tick, on));

            let mut last_tick = 0u32;
            for (tick, is_on, n) in evs {
                let delta = tick.saturating_sub(last_tick);
                last_tick = tick;
                let key = u7::new(n.pitch.min(MIDI_MAX));
                let message = if is_on {
                    MidiMessage::NoteOn { key, vel: u7::new(n.velocity.min(MIDI_MAX)) }
                } else {
                    MidiMessage::NoteOff { key, vel: u7::new(0) }
                };
                track.push(TrackEvent { delta: u28::new(delta), kind: TrackEventKind::Midi { channel, message } });
            }
            track.push(TrackEvent { delta: u28::new(0), kind: TrackEventKind::Meta(MetaMessage::EndOfTrack) });
            smf.tracks.push(track);
        }

        let mut buf = Vec::new();
        smf.write_std(&mut buf)?;
        Ok(buf)
    }
}

/// Ticks per quarter note in SMF output.
pub const PPQ: u16 = 480;

// Channel 9 is GM percussion.
fn midi_channel(track_idx: usize) -> u8 {
    let ch = (track_idx % 15) as u8;
    if ch >= 9 { ch + 1 } else { ch }
}

/// Scale families a melody can be built over.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Mode { Major, Minor, Modal }

impl Mode {
    /// Ascending scale-degree offsets, octave included.
    pub fn intervals(self) -> [u8; 8] {
        match self {
            Mode::Minor => [0, 2, 3, 5, 7, 8, 10, 12],
            Mode::Major => [0, 2, 4, 5, 7, 9, 11, 12],
            Mode::Modal => [0, 2, 3, 5, 7, 9, 10, 12],
        }
    }
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
            Mode::Modal => "modal",
        }
    }
}

/// Unknown mode names fall back to major.
impl From<&str> for Mode {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "minor" => Mode::Minor,
            "modal" => Mode::Modal,
            _ => Mode::Major,
        }
    }
}

impl From<String> for Mode {
    fn from(s: String) -> Self { Mode::from(s.as_str()) }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Build the pitch alphabet for `mode` starting at `base`, spanning `octaves`:
/// pitches above 127 are dropped, the rest deduplicated and sorted ascending.
pub fn build_scale(base: u8, mode: Mode, octaves: u32) -> Vec<u8> {
    let mut notes: Vec<u8> = (0..octaves)
        .flat_map(|oct| mode.intervals().into_iter().map(move |iv| base as u32 + iv as u32 + 12 * oct))
        .filter(|&p| p <= MIDI_MAX as u32)
        .map(|p| p as u8)
        .collect();
    notes.sort_unstable();
    notes.dedup();
    notes
}

use melody_core::Track;

/// General MIDI programs (0-based) for the instrument names the mapper uses.
const GM_PROGRAMS: &[(&str, u8)] = &[
    ("piano", 0),
    ("tubular_bells", 14),
    ("organ", 19),
    ("guitar", 24),
    ("violin", 40),
    ("viola", 41),
    ("cello", 42),
    ("contrabass", 43),
    ("harp", 46),
    ("timpani", 47),
    ("trumpet", 56),
    ("trombone", 57),
    ("tuba", 58),
    ("french_horn", 60),
    ("alto_sax", 65),
    ("clarinet", 71),
    ("flute", 73),
];

/// Unknown names map to acoustic grand piano.
pub fn gm_program(name: &str) -> u8 {
    let key = name.trim().to_lowercase().replace([' ', '-'], "_");
    GM_PROGRAMS.iter().find(|(n, _)| *n == key).map_or(0, |&(_, p)| p)
}

/// Cut the melody into one consecutive run of notes per instrument. Every
/// run gets `len / instruments` notes and the last one also takes the
/// remainder; runs that end up empty are dropped.
pub fn assign_instruments(melody: &Track, instruments: &[String]) -> Vec<Track> {
    if instruments.is_empty() {
        return vec![melody.clone()];
    }
    let total = melody.notes.len();
    let run = total / instruments.len();
    instruments
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let from = (i * run).min(total);
            let to = if i + 1 == instruments.len() { total } else { from + run };
            Track {
                name: name.clone(),
                program: gm_program(name),
                notes: melody.notes[from..to].to_vec(),
            }
        })
        .filter(|t| !t.is_empty())
        .collect()
}

// Hand Splitting - Assigns every note/chord to the right or left hand
// A fixed pitch threshold (middle C by default) decides the staff;
// chords straddling the threshold are split tone by tone

use serde::{Deserialize, Serialize};

use crate::notes::{sort_by_start, Note};

/// MIDI middle C; pitches at or above go to the right hand
pub const DEFAULT_SPLIT_PITCH: u8 = 60;

/// Simultaneous tones sharing one onset, drawn on a single stem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffChord {
    tones: Vec<Note>,
}

impl StaffChord {
    /// Build a chord from its tones, ordered low to high; `None` when empty
    pub fn new(mut tones: Vec<Note>) -> Option<Self> {
        if tones.is_empty() {
            return None;
        }
        tones.sort_by_key(|n| n.pitch());
        Some(StaffChord { tones })
    }

    pub fn tones(&self) -> &[Note] {
        &self.tones
    }

    pub fn pitches(&self) -> Vec<u8> {
        self.tones.iter().map(|n| n.pitch()).collect()
    }

    pub fn start(&self) -> f64 {
        self.tones.iter().map(|n| n.start()).fold(f64::INFINITY, f64::min)
    }

    pub fn end(&self) -> f64 {
        self.tones.iter().map(|n| n.end()).fold(0.0, f64::max)
    }
}

/// A silent placeholder
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rest {
    pub start: f64,
    pub end: f64,
}

/// One item on a staff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandElement {
    Note(Note),
    Chord(StaffChord),
    Rest(Rest),
}

impl HandElement {
    pub fn start(&self) -> f64 {
        match self {
            HandElement::Note(note) => note.start(),
            HandElement::Chord(chord) => chord.start(),
            HandElement::Rest(rest) => rest.start,
        }
    }

    pub fn end(&self) -> f64 {
        match self {
            HandElement::Note(note) => note.end(),
            HandElement::Chord(chord) => chord.end(),
            HandElement::Rest(rest) => rest.end,
        }
    }

    /// Every sounding note in this element (none for a rest)
    pub fn tones(&self) -> Vec<Note> {
        match self {
            HandElement::Note(note) => vec![*note],
            HandElement::Chord(chord) => chord.tones.clone(),
            HandElement::Rest(_) => Vec::new(),
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self, HandElement::Rest(_))
    }
}

/// Result of splitting a stream into two staves
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandSplit {
    pub right_hand: Vec<HandElement>,
    pub left_hand: Vec<HandElement>,
}

/// Turn a subset of chord tones into a staff element
fn element_from_tones(tones: Vec<Note>) -> Option<HandElement> {
    match tones.len() {
        0 => None,
        1 => Some(HandElement::Note(tones[0])),
        _ => StaffChord::new(tones).map(HandElement::Chord),
    }
}

/// Split a merged note/chord stream into right- and left-hand staves
///
/// Elements are grouped by exact start time and emitted in ascending order.
/// Rests are copied to both hands, single notes go to one hand, and chords are
/// split tone by tone: a one-tone side becomes a note, more becomes a chord.
pub fn split_hands(elements: &[HandElement], threshold: u8) -> HandSplit {
    let mut ordered: Vec<&HandElement> = elements.iter().collect();
    ordered.sort_by(|a, b| a.start().total_cmp(&b.start()));

    let mut split = HandSplit::default();

    for group in ordered.chunk_by(|a, b| a.start() == b.start()) {
        for element in group {
            match element {
                HandElement::Rest(rest) => {
                    split.right_hand.push(HandElement::Rest(*rest));
                    split.left_hand.push(HandElement::Rest(*rest));
                }
                HandElement::Note(note) => {
                    if note.pitch() >= threshold {
                        split.right_hand.push(HandElement::Note(*note));
                    } else {
                        split.left_hand.push(HandElement::Note(*note));
                    }
                }
                HandElement::Chord(chord) => {
                    let (right, left): (Vec<Note>, Vec<Note>) =
                        chord.tones.iter().partition(|n| n.pitch() >= threshold);

                    if let Some(el) = element_from_tones(right) {
                        split.right_hand.push(el);
                    }
                    if let Some(el) = element_from_tones(left) {
                        split.left_hand.push(el);
                    }
                }
            }
        }
    }

    split
}

/// Merge melody notes and chord groups into one stream, sorted by start
pub fn merge_streams(melody: &[Note], chords: Vec<StaffChord>) -> Vec<HandElement> {
    let mut sorted_melody = melody.to_vec();
    sort_by_start(&mut sorted_melody);

    let mut merged: Vec<HandElement> = sorted_melody.into_iter().map(HandElement::Note).collect();
    merged.extend(chords.into_iter().map(HandElement::Chord));
    merged.sort_by(|a, b| a.start().total_cmp(&b.start()));
    merged
}

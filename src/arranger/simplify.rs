// Simplification - Minimum-duration floor for beginner-friendly notation
// Very short notes (below a 32nd by default) are lengthened; nothing else changes

use serde::{Deserialize, Serialize};

use super::arrangement::Arrangement;
use super::hands::{HandElement, Rest, StaffChord};
use crate::notes::Note;

/// Settings for the duration floor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimplifySettings {
    /// Shortest allowed duration in quarter notes (0.125 = 32nd note)
    pub min_quarter_length: f64,
}

impl Default for SimplifySettings {
    fn default() -> Self {
        SimplifySettings {
            min_quarter_length: 0.125,
        }
    }
}

fn floor_note(note: &Note, min_secs: f64) -> Note {
    if note.duration() >= min_secs {
        return *note;
    }
    note.with_span(note.start(), note.start() + min_secs)
        .unwrap_or(*note)
}

fn floor_element(element: &HandElement, min_secs: f64) -> HandElement {
    match element {
        HandElement::Note(note) => HandElement::Note(floor_note(note, min_secs)),
        HandElement::Chord(chord) => {
            let tones = chord.tones().iter().map(|n| floor_note(n, min_secs)).collect();
            StaffChord::new(tones)
                .map(HandElement::Chord)
                .unwrap_or_else(|| element.clone())
        }
        HandElement::Rest(rest) => {
            let end = rest.end.max(rest.start + min_secs);
            HandElement::Rest(Rest { start: rest.start, end })
        }
    }
}

/// Lengthen every element shorter than the floor, at the arrangement's tempo
pub fn apply_duration_floor(arrangement: &Arrangement, settings: &SimplifySettings) -> Arrangement {
    let min_secs = settings.min_quarter_length.max(0.0) * arrangement.metadata.quarter_secs();
    if min_secs <= 0.0 {
        return arrangement.clone();
    }

    let right = arrangement.right_hand.iter().map(|e| floor_element(e, min_secs)).collect();
    let left = arrangement.left_hand.iter().map(|e| floor_element(e, min_secs)).collect();

    Arrangement::new(right, left, arrangement.metadata.clone())
}

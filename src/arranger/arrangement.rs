// Arrangement - The two-hand result handed to the renderer
// Melody and accompaniment merged, then split into right/left staves

use serde::{Deserialize, Serialize};

use super::accompaniment::Chord;
use super::hands::{merge_streams, split_hands, HandElement, StaffChord};
use crate::notes::Note;
use crate::score::ScoreMetadata;

/// Complete two-hand arrangement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrangement {
    /// Treble staff, ascending by start time
    pub right_hand: Vec<HandElement>,

    /// Bass staff, ascending by start time
    pub left_hand: Vec<HandElement>,

    /// Latest element end in seconds
    pub duration: f64,

    pub metadata: ScoreMetadata,
}

impl Arrangement {
    /// Create an arrangement from already split staves
    pub fn new(
        right_hand: Vec<HandElement>,
        left_hand: Vec<HandElement>,
        metadata: ScoreMetadata,
    ) -> Self {
        let duration = right_hand
            .iter()
            .chain(left_hand.iter())
            .map(|e| e.end())
            .fold(0.0, f64::max);

        Arrangement {
            right_hand,
            left_hand,
            duration,
            metadata,
        }
    }

    /// Number of sounding notes across both hands
    pub fn note_count(&self) -> usize {
        self.right_hand
            .iter()
            .chain(self.left_hand.iter())
            .map(|e| e.tones().len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.right_hand.is_empty() && self.left_hand.is_empty()
    }
}

/// Build the arrangement from melody notes and synthesized chords
pub fn build_arrangement(
    melody: &[Note],
    chords: &[Chord],
    metadata: ScoreMetadata,
    split_pitch: u8,
) -> Arrangement {
    let staff_chords: Vec<StaffChord> = chords
        .iter()
        .filter_map(|c| StaffChord::new(c.notes.to_vec()))
        .collect();

    let merged = merge_streams(melody, staff_chords);
    let split = split_hands(&merged, split_pitch);

    log::debug!(
        "Split {} elements into {} right / {} left",
        merged.len(),
        split.right_hand.len(),
        split.left_hand.len()
    );

    Arrangement::new(split.right_hand, split.left_hand, metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arranger::accompaniment::{synthesize_accompaniment, AccompanimentSettings};
    use crate::arranger::hands::DEFAULT_SPLIT_PITCH;
    use crate::notes::PartId;

    fn note(pitch: u8, start: f64, end: f64) -> Note {
        Note::new(pitch, 90, start, end, PartId(0)).unwrap()
    }

    #[test]
    fn test_build_arrangement() {
        let melody = vec![note(60, 0.0, 1.0), note(64, 1.0, 2.0), note(67, 2.0, 3.5)];
        let chords = synthesize_accompaniment(&melody, &AccompanimentSettings::default());
        assert_eq!(chords.len(), 2);

        let arrangement = build_arrangement(&melody, &chords, ScoreMetadata::default(), DEFAULT_SPLIT_PITCH);

        // Melody sits at or above middle C, triads in octave 3 below it
        assert_eq!(arrangement.right_hand.len(), 3);
        assert_eq!(arrangement.left_hand.len(), 2);
        assert!(arrangement
            .left_hand
            .iter()
            .all(|e| matches!(e, HandElement::Chord(_))));

        assert_eq!(arrangement.note_count(), 3 + 6);
        assert_eq!(arrangement.duration, 4.0);
    }

    #[test]
    fn test_empty_arrangement() {
        let arrangement = build_arrangement(&[], &[], ScoreMetadata::default(), DEFAULT_SPLIT_PITCH);
        assert!(arrangement.is_empty());
        assert_eq!(arrangement.duration, 0.0);
        assert_eq!(arrangement.note_count(), 0);
    }
}

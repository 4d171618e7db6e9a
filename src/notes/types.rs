// Note model - Pitched, timed notes and the parts (tracks) that carry them
// Notes are immutable values; transformations return new notes

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest valid MIDI pitch/velocity value
pub const MIDI_MAX: u8 = 127;

/// Reasons a note cannot be constructed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NoteError {
    #[error("Pitch out of range: {0}")]
    PitchOutOfRange(u8),

    #[error("Velocity out of range: {0}")]
    VelocityOutOfRange(u8),

    #[error("Invalid time span: start={start}, end={end}")]
    InvalidSpan { start: f64, end: f64 },
}

/// Opaque identifier of the part a note came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartId(pub u32);

/// One sounded pitch with a start/end time in seconds
///
/// Invariant: `end > start`, both finite, `start >= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNote")]
pub struct Note {
    pitch: u8,
    velocity: u8,
    start: f64,
    end: f64,
    part_id: PartId,
}

#[derive(Deserialize)]
struct RawNote {
    pitch: u8,
    velocity: u8,
    start: f64,
    end: f64,
    part_id: PartId,
}

impl TryFrom<RawNote> for Note {
    type Error = NoteError;

    fn try_from(raw: RawNote) -> Result<Self, Self::Error> {
        Note::new(raw.pitch, raw.velocity, raw.start, raw.end, raw.part_id)
    }
}

impl Note {
    /// Create a validated note
    pub fn new(
        pitch: u8,
        velocity: u8,
        start: f64,
        end: f64,
        part_id: PartId,
    ) -> Result<Self, NoteError> {
        if pitch > MIDI_MAX {
            return Err(NoteError::PitchOutOfRange(pitch));
        }
        if velocity > MIDI_MAX {
            return Err(NoteError::VelocityOutOfRange(velocity));
        }
        if !start.is_finite() || !end.is_finite() || start < 0.0 || end <= start {
            return Err(NoteError::InvalidSpan { start, end });
        }

        Ok(Note {
            pitch,
            velocity,
            start,
            end,
            part_id,
        })
    }

    pub fn pitch(&self) -> u8 {
        self.pitch
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    /// Start time in seconds
    pub fn start(&self) -> f64 {
        self.start
    }

    /// End time in seconds
    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn part_id(&self) -> PartId {
        self.part_id
    }

    /// Pitch reduced modulo 12
    pub fn pitch_class(&self) -> u8 {
        self.pitch % 12
    }

    /// Copy of this note moved to a new time span
    pub fn with_span(&self, start: f64, end: f64) -> Result<Self, NoteError> {
        Note::new(self.pitch, self.velocity, start, end, self.part_id)
    }

    /// Copy of this note at a different pitch
    pub fn with_pitch(&self, pitch: u8) -> Result<Self, NoteError> {
        Note::new(pitch, self.velocity, self.start, self.end, self.part_id)
    }
}

/// Sort notes by start time, keeping insertion order for equal starts
pub fn sort_by_start(notes: &mut [Note]) {
    notes.sort_by(|a, b| a.start.total_cmp(&b.start));
}

/// One instrument's note stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub id: PartId,

    /// Track name, empty when the source had none
    pub name: String,

    /// General MIDI program number (0 = acoustic grand)
    pub program: u8,

    /// Percussion parts never carry melody or harmony
    pub is_percussion: bool,

    /// Notes in insertion order (not guaranteed sorted)
    pub notes: Vec<Note>,
}

impl Part {
    /// Create a new empty part
    pub fn new(id: PartId, name: impl Into<String>, program: u8, is_percussion: bool) -> Self {
        Part {
            id,
            name: name.into(),
            program,
            is_percussion,
            notes: Vec::new(),
        }
    }

    /// Add a note to this part
    pub fn add_note(&mut self, note: Note) {
        self.notes.push(note);
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    /// Mean MIDI pitch, `None` for an empty part
    pub fn mean_pitch(&self) -> Option<f64> {
        if self.notes.is_empty() {
            return None;
        }
        let sum: f64 = self.notes.iter().map(|n| n.pitch as f64).sum();
        Some(sum / self.notes.len() as f64)
    }

    /// Latest note end, 0.0 for an empty part
    pub fn end_time(&self) -> f64 {
        self.notes.iter().map(|n| n.end).fold(0.0, f64::max)
    }

    /// Notes sorted by start time (stable)
    pub fn sorted_notes(&self) -> Vec<Note> {
        let mut notes = self.notes.clone();
        sort_by_start(&mut notes);
        notes
    }
}

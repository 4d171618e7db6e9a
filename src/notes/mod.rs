// Note model and MIDI ingestion
// Notes, parts, and reading Standard MIDI Files into them

pub mod ingest;
pub mod types;

pub use ingest::{import_midi, ImportedScore, MidiError, PERCUSSION_CHANNEL};
pub use types::{sort_by_start, Note, NoteError, Part, PartId, MIDI_MAX};

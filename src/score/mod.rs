// Score metadata passed through to the renderer

pub mod metadata;

pub use metadata::{key_name_from_midi, ScoreMetadata, TimeSignature, DEFAULT_KEY, DEFAULT_TEMPO_BPM};

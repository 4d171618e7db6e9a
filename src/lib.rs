// Chorus Arranger - Two-hand piano arrangements of a song's most repeated passage
// Module declarations

pub mod arranger;
pub mod commands;
pub mod notes;
pub mod pipeline;
pub mod score;

pub use arranger::{Arrangement, ArrangeError, HandElement};
pub use notes::{import_midi, Note, Part, PartId};
pub use pipeline::{arrange_parts, extract_melody, ArrangeSettings};
pub use score::ScoreMetadata;

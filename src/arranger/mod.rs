// Arranger - Melody selection, chorus detection, accompaniment and hand splitting
// Pure transformations over in-memory notes; each call takes its settings explicitly

pub mod accompaniment;
pub mod arrangement;
pub mod chorus;
pub mod error;
pub mod hands;
pub mod melody;
pub mod midi;
pub mod simplify;

// Re-export main types
pub use accompaniment::{accompaniment_notes, synthesize_accompaniment, AccompanimentSettings, Chord};
pub use arrangement::{build_arrangement, Arrangement};
pub use chorus::{detect_chorus, segment_fingerprints, ChorusSettings, Fingerprint};
pub use error::ArrangeError;
pub use hands::{merge_streams, split_hands, HandElement, HandSplit, Rest, StaffChord, DEFAULT_SPLIT_PITCH};
pub use melody::{melody_score, select_melody};
pub use midi::{export_arrangement, export_melody, MidiExportOptions};
pub use simplify::{apply_duration_floor, SimplifySettings};

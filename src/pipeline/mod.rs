// Pipeline - End-to-end arrangement and progress tracing

pub mod arrange;
pub mod trace;

pub use arrange::{
    arrange_parts, arrange_parts_with_progress, extract_melody, ArrangeSettings, ArrangementInfo,
    ArrangementResult, MelodyExtraction, MelodyInfo,
};
pub use trace::{read_trace_file, Stage, TraceEntry, TraceError, TraceWriter};

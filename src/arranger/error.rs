// Arrangement errors
// Value-level failures of the arrangement engine; none are retryable

use thiserror::Error;

use crate::notes::NoteError;

/// Errors that can occur while arranging
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArrangeError {
    /// No non-percussion part with at least one note
    #[error("No suitable melody part found")]
    NoMelodyFound,

    /// Chorus detection was handed an empty note list
    #[error("Chorus detection requires at least one note")]
    EmptyChorusInput,

    #[error("Invalid note: {0}")]
    InvalidNote(#[from] NoteError),
}

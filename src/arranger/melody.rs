// Melody Selection - Picks the part most likely carrying the lead line
// Heuristic: busy, high-register parts tend to be the melody in transcribed audio

use super::error::ArrangeError;
use crate::notes::Part;

/// Score a part for melody likelihood: `note_count * (mean_pitch / 127)`
///
/// Returns `None` for parts that are never eligible (percussion or empty).
pub fn melody_score(part: &Part) -> Option<f64> {
    if part.is_percussion {
        return None;
    }
    let mean_pitch = part.mean_pitch()?;
    Some(part.note_count() as f64 * (mean_pitch / 127.0))
}

/// Select the melody part among `parts`
///
/// This is a heuristic, not ground truth. The part with the strictly greatest
/// score wins; on a tie the part seen first in input order is kept.
///
/// # Errors
/// `ArrangeError::NoMelodyFound` when every part is empty or percussion.
pub fn select_melody(parts: &[Part]) -> Result<&Part, ArrangeError> {
    let mut best: Option<(&Part, f64)> = None;

    for part in parts {
        let Some(score) = melody_score(part) else {
            continue;
        };

        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((part, score)),
        }
    }

    match best {
        Some((part, score)) => {
            log::debug!(
                "Selected melody part {:?} ('{}') with score {:.3}",
                part.id,
                part.name,
                score
            );
            Ok(part)
        }
        None => {
            log::warn!("No suitable melody part among {} parts", parts.len());
            Err(ArrangeError::NoMelodyFound)
        }
    }
}

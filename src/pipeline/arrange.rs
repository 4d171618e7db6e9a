// Arrangement pipeline - Melody selection through hand splitting in one call
// Stateless; every stage receives its settings from ArrangeSettings

use serde::{Deserialize, Serialize};

use crate::arranger::{
    accompaniment_notes, apply_duration_floor, build_arrangement, detect_chorus, select_melody,
    synthesize_accompaniment, AccompanimentSettings, ArrangeError, Arrangement, ChorusSettings,
    MidiExportOptions, SimplifySettings, DEFAULT_SPLIT_PITCH,
};
use crate::notes::{Note, Part, PartId};
use crate::score::ScoreMetadata;

use super::trace::Stage;

/// All tunable parameters of one arrangement request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrangeSettings {
    pub chorus: ChorusSettings,
    pub accompaniment: AccompanimentSettings,
    pub simplify: SimplifySettings,

    /// Pitches at or above go to the right hand
    pub split_pitch: u8,

    pub export: MidiExportOptions,
}

impl Default for ArrangeSettings {
    fn default() -> Self {
        ArrangeSettings {
            chorus: ChorusSettings::default(),
            accompaniment: AccompanimentSettings::default(),
            simplify: SimplifySettings::default(),
            split_pitch: DEFAULT_SPLIT_PITCH,
            export: MidiExportOptions::default(),
        }
    }
}

/// Summary of the melody extraction step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MelodyInfo {
    pub part_id: PartId,

    /// Source track name, "Unknown" when the track had none
    pub part_name: String,

    pub program: u8,
    pub total_notes: usize,
    pub chorus_notes: usize,

    /// Latest chorus note end in seconds
    pub duration: f64,
}

/// Melody part reduced to its chorus
#[derive(Debug, Clone)]
pub struct MelodyExtraction {
    pub chorus: Vec<Note>,
    pub info: MelodyInfo,
}

/// Summary of the arrangement step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrangementInfo {
    pub melody_notes: usize,
    pub accompaniment_notes: usize,
    pub right_hand_elements: usize,
    pub left_hand_elements: usize,
    pub duration: f64,
}

/// Full result of an arrangement request
#[derive(Debug, Clone)]
pub struct ArrangementResult {
    pub arrangement: Arrangement,
    pub melody: MelodyExtraction,
    pub info: ArrangementInfo,
}

/// Select the melody part and reduce it to its chorus
pub fn extract_melody(parts: &[Part], settings: &ArrangeSettings) -> Result<MelodyExtraction, ArrangeError> {
    let part = select_melody(parts)?;
    melody_chorus(part, settings)
}

fn melody_chorus(part: &Part, settings: &ArrangeSettings) -> Result<MelodyExtraction, ArrangeError> {
    let chorus = detect_chorus(&part.notes, &settings.chorus)?;

    let info = MelodyInfo {
        part_id: part.id,
        part_name: if part.name.is_empty() {
            "Unknown".to_string()
        } else {
            part.name.clone()
        },
        program: part.program,
        total_notes: part.note_count(),
        chorus_notes: chorus.len(),
        duration: chorus.iter().map(|n| n.end()).fold(0.0, f64::max),
    };

    log::info!(
        "Melody from '{}' (program {}): {} of {} notes in chorus",
        info.part_name,
        info.program,
        info.chorus_notes,
        info.total_notes
    );

    Ok(MelodyExtraction { chorus, info })
}

/// Arrange parts into a two-hand piano arrangement of the chorus
///
/// # Errors
/// `ArrangeError::NoMelodyFound` when no part can carry the melody.
pub fn arrange_parts(
    parts: &[Part],
    metadata: ScoreMetadata,
    settings: &ArrangeSettings,
) -> Result<ArrangementResult, ArrangeError> {
    arrange_parts_with_progress(parts, metadata, settings, |_, _, _| {})
}

/// `arrange_parts`, reporting each completed stage to `on_stage`
///
/// Stages are reported in order: melody selection, chorus detection,
/// accompaniment, hand split.
pub fn arrange_parts_with_progress<F>(
    parts: &[Part],
    metadata: ScoreMetadata,
    settings: &ArrangeSettings,
    mut on_stage: F,
) -> Result<ArrangementResult, ArrangeError>
where
    F: FnMut(Stage, &str, Option<serde_json::Value>),
{
    let part = select_melody(parts)?;
    on_stage(
        Stage::MelodySelection,
        "Selected melody part",
        Some(serde_json::json!({
            "part_id": part.id,
            "part_name": part.name,
            "notes": part.note_count(),
        })),
    );

    let melody = melody_chorus(part, settings)?;
    on_stage(
        Stage::ChorusDetection,
        "Extracted melody chorus",
        serde_json::to_value(&melody.info).ok(),
    );

    let chords = synthesize_accompaniment(&melody.chorus, &settings.accompaniment);
    let accompaniment_count = accompaniment_notes(&chords).len();
    on_stage(
        Stage::Accompaniment,
        "Synthesized accompaniment",
        Some(serde_json::json!({
            "chords": chords.len(),
            "notes": accompaniment_count,
        })),
    );

    let arrangement = build_arrangement(&melody.chorus, &chords, metadata, settings.split_pitch);
    let arrangement = apply_duration_floor(&arrangement, &settings.simplify);

    let info = ArrangementInfo {
        melody_notes: melody.chorus.len(),
        accompaniment_notes: accompaniment_count,
        right_hand_elements: arrangement.right_hand.len(),
        left_hand_elements: arrangement.left_hand.len(),
        duration: arrangement.duration,
    };
    on_stage(
        Stage::HandSplit,
        "Split arrangement into hands",
        serde_json::to_value(&info).ok(),
    );

    log::info!(
        "Arrangement: {} melody + {} accompaniment notes over {:.2}s",
        info.melody_notes,
        info.accompaniment_notes,
        info.duration
    );

    Ok(ArrangementResult {
        arrangement,
        melody,
        info,
    })
}

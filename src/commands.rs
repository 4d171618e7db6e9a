// File-level commands
// Read a MIDI file, run the arrangement pipeline, write MIDI/JSON/trace artifacts

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::arranger::{self, Arrangement};
use crate::notes::{self, ImportedScore};
use crate::pipeline::{self, ArrangeSettings, ArrangementInfo, MelodyInfo, Stage, TraceWriter};

#[derive(Debug, Serialize)]
pub struct CommandError {
    message: String,
}

impl<E: std::fmt::Display> From<E> for CommandError {
    fn from(error: E) -> Self {
        CommandError {
            message: error.to_string(),
        }
    }
}

impl CommandError {
    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

/// Artifacts of a melody extraction
#[derive(Debug, Serialize)]
pub struct MelodyOutput {
    pub task_id: String,
    pub melody_midi_path: PathBuf,
    pub info: MelodyInfo,
}

/// Artifacts of a full arrangement
#[derive(Debug, Serialize)]
pub struct ArrangementOutput {
    pub task_id: String,
    pub arrangement_midi_path: PathBuf,
    pub arrangement_json_path: PathBuf,
    pub trace_path: PathBuf,
    pub melody: MelodyInfo,
    pub info: ArrangementInfo,
}

/// JSON document handed to the rendering collaborator
#[derive(Debug, Serialize)]
struct ArrangementDocument<'a> {
    task_id: &'a str,
    melody: &'a MelodyInfo,
    info: &'a ArrangementInfo,
    arrangement: &'a Arrangement,
}

/// Generate a fresh task id
pub fn new_task_id() -> String {
    Uuid::new_v4().to_string()
}

/// Default output directory under the user's data dir
pub fn default_output_dir() -> CommandResult<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| CommandError {
        message: "Failed to get app data directory".to_string(),
    })?;
    let output_dir = data_dir.join("chorus-arranger").join("output");
    fs::create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn load_score(input: &Path) -> CommandResult<ImportedScore> {
    if !input.exists() {
        log::error!("MIDI file does not exist: {}", input.display());
        return Err(CommandError {
            message: format!("MIDI file not found: {}", input.display()),
        });
    }

    let data = fs::read(input)?;
    let score = notes::import_midi(&data).map_err(|e| CommandError {
        message: format!("Failed to read MIDI file {}: {}", input.display(), e),
    })?;
    Ok(score)
}

/// Extract the chorus of the melody part into `<task_id>_melody.mid`
pub fn extract_melody_file(
    input: &Path,
    output_dir: &Path,
    task_id: &str,
    settings: &ArrangeSettings,
) -> CommandResult<MelodyOutput> {
    log::info!("Extracting main melody from MIDI: {}", input.display());
    let score = load_score(input)?;

    let melody = pipeline::extract_melody(&score.parts, settings)?;
    let bytes = arranger::export_melody(&melody.chorus, melody.info.program, &score.metadata, &settings.export)?;

    fs::create_dir_all(output_dir)?;
    let melody_midi_path = output_dir.join(format!("{}_melody.mid", task_id));
    fs::write(&melody_midi_path, bytes)?;

    log::info!("Extracted melody to MIDI: {}", melody_midi_path.display());

    Ok(MelodyOutput {
        task_id: task_id.to_string(),
        melody_midi_path,
        info: melody.info,
    })
}

/// Arrange a MIDI file for piano
///
/// Writes `<task_id>_arrangement.mid`, `<task_id>_arrangement.json` and a
/// `<task_id>.trace.jsonl` progress trace into `output_dir`.
pub fn arrange_midi_file(
    input: &Path,
    output_dir: &Path,
    task_id: &str,
    settings: &ArrangeSettings,
) -> CommandResult<ArrangementOutput> {
    log::info!("Creating piano arrangement from MIDI: {}", input.display());
    fs::create_dir_all(output_dir)?;

    let trace = TraceWriter::new(task_id, output_dir.join(format!("{}.trace.jsonl", task_id)));

    let score = load_score(input)?;
    trace.stage(
        Stage::Import,
        "Imported MIDI",
        Some(serde_json::json!({
            "parts": score.parts.len(),
            "duration": score.duration(),
        })),
    );

    let result = pipeline::arrange_parts_with_progress(
        &score.parts,
        score.metadata.clone(),
        settings,
        |stage, message, data| trace.stage(stage, message, data),
    )?;

    let midi_bytes = arranger::export_arrangement(&result.arrangement, &settings.export)?;
    let arrangement_midi_path = output_dir.join(format!("{}_arrangement.mid", task_id));
    fs::write(&arrangement_midi_path, midi_bytes)?;

    let document = ArrangementDocument {
        task_id,
        melody: &result.melody.info,
        info: &result.info,
        arrangement: &result.arrangement,
    };
    let arrangement_json_path = output_dir.join(format!("{}_arrangement.json", task_id));
    fs::write(&arrangement_json_path, serde_json::to_vec_pretty(&document)?)?;

    trace.stage(Stage::Export, "Wrote arrangement", None);
    log::info!("Created arrangement: {}", arrangement_midi_path.display());

    Ok(ArrangementOutput {
        task_id: task_id.to_string(),
        arrangement_midi_path,
        arrangement_json_path,
        trace_path: trace.path().to_path_buf(),
        melody: result.melody.info,
        info: result.info,
    })
}

/// Arrange several MIDI files concurrently, one blocking worker per file
///
/// Results come back in input order; one failing file doesn't affect the others.
pub async fn arrange_midi_files(
    inputs: Vec<PathBuf>,
    output_dir: PathBuf,
    settings: ArrangeSettings,
) -> Vec<(PathBuf, CommandResult<ArrangementOutput>)> {
    let settings = Arc::new(settings);
    let output_dir = Arc::new(output_dir);

    let handles: Vec<_> = inputs
        .into_iter()
        .map(|input| {
            let settings = Arc::clone(&settings);
            let output_dir = Arc::clone(&output_dir);
            let task_id = new_task_id();
            let path = input.clone();
            let handle = tokio::task::spawn_blocking(move || {
                arrange_midi_file(&input, &output_dir, &task_id, &settings)
            });
            (path, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (path, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(CommandError::from(e)),
        };
        if let Err(ref e) = result {
            log::error!("Arrangement failed for {}: {}", path.display(), e.message());
        }
        results.push((path, result));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arranger::MidiExportOptions;
    use crate::notes::{Note, PartId};
    use crate::pipeline::read_trace_file;
    use crate::score::ScoreMetadata;
    use tempfile::TempDir;

    /// A lead line repeating the same motif every 4 seconds, plus a bass line
    fn write_song(dir: &Path) -> PathBuf {
        let mut lead = Vec::new();
        for bar in 0..4 {
            let base = bar as f64 * 4.0;
            for (i, pitch) in [72u8, 74, 76, 72].iter().enumerate() {
                let start = base + i as f64 * 0.5;
                lead.push(Note::new(*pitch, 100, start, start + 0.5, PartId(0)).unwrap());
            }
        }
        let bytes = arranger::export_melody(&lead, 0, &ScoreMetadata::default(), &MidiExportOptions::default()).unwrap();

        let path = dir.join("song.mid");
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_missing_input_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = arrange_midi_file(
            &temp_dir.path().join("missing.mid"),
            temp_dir.path(),
            "task",
            &ArrangeSettings::default(),
        );
        assert!(result.unwrap_err().message().contains("not found"));
    }

    #[test]
    fn test_invalid_midi_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.mid");
        fs::write(&path, b"garbage").unwrap();

        let result = extract_melody_file(&path, temp_dir.path(), "task", &ArrangeSettings::default());
        assert!(result.unwrap_err().message().contains("Failed to read MIDI file"));
    }

    #[test]
    fn test_extract_melody_file() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_song(temp_dir.path());
        let out_dir = temp_dir.path().join("out");

        let output = extract_melody_file(&input, &out_dir, "abc", &ArrangeSettings::default()).unwrap();

        assert_eq!(output.melody_midi_path, out_dir.join("abc_melody.mid"));
        assert!(output.melody_midi_path.exists());
        assert_eq!(output.info.total_notes, 16);
        assert_eq!(output.info.chorus_notes, 16);
        assert_eq!(output.info.part_name, "Melody");

        // The written melody reads back with the same notes
        let score = notes::import_midi(&fs::read(&output.melody_midi_path).unwrap()).unwrap();
        assert_eq!(score.parts[0].note_count(), 16);
    }

    #[test]
    fn test_arrange_midi_file() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_song(temp_dir.path());

        let output = arrange_midi_file(&input, temp_dir.path(), "xyz", &ArrangeSettings::default()).unwrap();

        assert!(output.arrangement_midi_path.exists());
        assert!(output.arrangement_json_path.exists());
        assert_eq!(output.info.melody_notes, 16);
        // Motifs start every 4s, so only every other 2s measure gets a triad
        assert_eq!(output.info.accompaniment_notes, 12);

        let score = notes::import_midi(&fs::read(&output.arrangement_midi_path).unwrap()).unwrap();
        assert_eq!(score.parts.len(), 2);
        assert_eq!(score.parts[0].name, "Right Hand");
        assert_eq!(score.parts[1].name, "Left Hand");

        let json: serde_json::Value =
            serde_json::from_slice(&fs::read(&output.arrangement_json_path).unwrap()).unwrap();
        assert_eq!(json["task_id"], "xyz");
        assert_eq!(json["arrangement"]["left_hand"][0]["kind"], "chord");

        let trace = read_trace_file(&output.trace_path).unwrap();
        let stages: Vec<Stage> = trace.iter().map(|e| e.stage).collect();
        assert_eq!(
            stages,
            vec![
                Stage::Import,
                Stage::MelodySelection,
                Stage::ChorusDetection,
                Stage::Accompaniment,
                Stage::HandSplit,
                Stage::Export
            ]
        );
        assert!(trace.windows(2).all(|pair| pair[0].progress < pair[1].progress));
        assert_eq!(trace.last().unwrap().progress, 1.0);
    }

    #[tokio::test]
    async fn test_arrange_midi_files_batch() {
        let temp_dir = TempDir::new().unwrap();
        let good = write_song(temp_dir.path());
        let missing = temp_dir.path().join("missing.mid");

        let results = arrange_midi_files(
            vec![good.clone(), missing.clone()],
            temp_dir.path().join("batch"),
            ArrangeSettings::default(),
        )
        .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, good);
        assert!(results[0].1.is_ok());
        assert_eq!(results[1].0, missing);
        assert!(results[1].1.is_err());
    }
}

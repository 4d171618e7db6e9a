// MIDI ingestion - Reads Standard MIDI Files into parts and score metadata
// Converts tick-based events to seconds through the file's tempo map

use std::collections::{HashMap, VecDeque};

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use thiserror::Error;

use super::types::{Note, Part, PartId};
use crate::score::{key_name_from_midi, ScoreMetadata, TimeSignature};

/// General MIDI percussion channel (channel 10, 0-indexed)
pub const PERCUSSION_CHANNEL: u8 = 9;

const DEFAULT_MICROS_PER_QUARTER: u32 = 500_000;

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("Failed to parse MIDI file: {0}")]
    Parse(#[from] midly::Error),

    #[error("Failed to write MIDI file: {0}")]
    Write(String),
}

/// Parts and metadata read from a MIDI file
#[derive(Debug, Clone)]
pub struct ImportedScore {
    pub parts: Vec<Part>,
    pub metadata: ScoreMetadata,
}

impl ImportedScore {
    /// Latest note end over all parts, in seconds
    pub fn duration(&self) -> f64 {
        self.parts.iter().map(|p| p.end_time()).fold(0.0, f64::max)
    }
}

/// Piecewise tick -> seconds conversion
struct TempoMap {
    ticks_per_quarter: Option<f64>,
    ticks_per_second: f64,
    /// (tick, seconds at tick, microseconds per quarter from tick on)
    segments: Vec<(u64, f64, u32)>,
}

impl TempoMap {
    fn new(timing: Timing, mut changes: Vec<(u64, u32)>) -> Self {
        match timing {
            Timing::Metrical(ppq) => {
                let ppq = (ppq.as_int() as f64).max(1.0);
                changes.sort_by_key(|(tick, _)| *tick);

                let mut segments = vec![(0u64, 0.0f64, DEFAULT_MICROS_PER_QUARTER)];
                for (tick, micros) in changes {
                    let (last_tick, last_secs, last_micros) = segments[segments.len() - 1];
                    let secs = last_secs + (tick - last_tick) as f64 * last_micros as f64 / 1_000_000.0 / ppq;
                    if tick == last_tick {
                        segments.pop();
                    }
                    segments.push((tick, secs, micros.max(1)));
                }

                TempoMap {
                    ticks_per_quarter: Some(ppq),
                    ticks_per_second: 0.0,
                    segments,
                }
            }
            Timing::Timecode(fps, subframes) => TempoMap {
                ticks_per_quarter: None,
                ticks_per_second: (fps.as_f32() as f64 * subframes as f64).max(1.0),
                segments: Vec::new(),
            },
        }
    }

    fn seconds_at(&self, tick: u64) -> f64 {
        let Some(ppq) = self.ticks_per_quarter else {
            return tick as f64 / self.ticks_per_second;
        };

        let idx = self
            .segments
            .partition_point(|(seg_tick, _, _)| *seg_tick <= tick)
            .saturating_sub(1);
        let (seg_tick, seg_secs, micros) = self.segments[idx];
        seg_secs + (tick - seg_tick) as f64 * micros as f64 / 1_000_000.0 / ppq
    }
}

/// Collect tempo changes and the first time/key signature from every track
fn scan_meta(smf: &Smf) -> (Vec<(u64, u32)>, Option<(u64, TimeSignature)>, Option<(u64, String)>) {
    let mut tempos = Vec::new();
    let mut time_signature: Option<(u64, TimeSignature)> = None;
    let mut key: Option<(u64, String)> = None;

    for track in &smf.tracks {
        let mut tick = 0u64;
        for event in track {
            tick += event.delta.as_int() as u64;
            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(micros)) => {
                    tempos.push((tick, micros.as_int()));
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(num, den_pow, _, _)) => {
                    if time_signature.as_ref().map_or(true, |(t, _)| tick < *t) {
                        time_signature = Some((tick, TimeSignature::from_midi(num, den_pow)));
                    }
                }
                TrackEventKind::Meta(MetaMessage::KeySignature(sharps, minor)) => {
                    if key.as_ref().map_or(true, |(t, _)| tick < *t) {
                        key = Some((tick, key_name_from_midi(sharps, minor)));
                    }
                }
                _ => {}
            }
        }
    }

    (tempos, time_signature, key)
}

/// A part under construction, keyed by (track, channel)
struct PartBuilder {
    name: String,
    program: u8,
    channel: u8,
    notes: Vec<(u8, u8, f64, f64)>,
}

/// Import a Standard MIDI File
///
/// One part is produced per (track, channel) pair that carries notes, in
/// first-seen order. Channel 10 parts are flagged as percussion. Tempo, time
/// signature and key come from the first matching meta events, with defaults
/// when absent. Zero-length and unterminated notes are dropped.
pub fn import_midi(data: &[u8]) -> Result<ImportedScore, MidiError> {
    let smf = Smf::parse(data)?;

    let (tempos, time_signature, key) = scan_meta(&smf);

    let mut metadata = ScoreMetadata::default();
    if let Some((_, micros)) = tempos.iter().min_by_key(|(tick, _)| *tick) {
        metadata.tempo_bpm = 60_000_000.0 / (*micros).max(1) as f64;
    }
    if let Some((_, ts)) = time_signature {
        metadata.time_signature = ts;
    }
    if let Some((_, name)) = key {
        metadata.key_name = name;
    }

    let tempo_map = TempoMap::new(smf.header.timing, tempos);

    let mut builders: Vec<PartBuilder> = Vec::new();
    let mut dropped = 0usize;

    for (track_idx, track) in smf.tracks.iter().enumerate() {
        let mut tick = 0u64;
        let mut track_name = String::new();
        let mut programs: HashMap<u8, u8> = HashMap::new();
        let mut part_index: HashMap<u8, usize> = HashMap::new();
        let mut open: HashMap<(u8, u8), VecDeque<(u64, u8)>> = HashMap::new();

        for event in track {
            tick += event.delta.as_int() as u64;

            match event.kind {
                TrackEventKind::Meta(MetaMessage::TrackName(name)) if track_name.is_empty() => {
                    track_name = String::from_utf8_lossy(name).trim().to_string();
                }
                TrackEventKind::Midi { channel, message } => {
                    let channel = channel.as_int();
                    match message {
                        MidiMessage::ProgramChange { program } => {
                            programs.insert(channel, program.as_int());
                        }
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            part_index.entry(channel).or_insert_with(|| {
                                builders.push(PartBuilder {
                                    name: track_name.clone(),
                                    program: programs.get(&channel).copied().unwrap_or(0),
                                    channel,
                                    notes: Vec::new(),
                                });
                                builders.len() - 1
                            });
                            open.entry((channel, key.as_int()))
                                .or_default()
                                .push_back((tick, vel.as_int()));
                        }
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            let pitch = key.as_int();
                            let Some((start_tick, velocity)) =
                                open.get_mut(&(channel, pitch)).and_then(|q| q.pop_front())
                            else {
                                continue;
                            };
                            let Some(&idx) = part_index.get(&channel) else {
                                continue;
                            };
                            builders[idx].notes.push((
                                pitch,
                                velocity,
                                tempo_map.seconds_at(start_tick),
                                tempo_map.seconds_at(tick),
                            ));
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        let unterminated: usize = open.values().map(|q| q.len()).sum();
        if unterminated > 0 {
            log::debug!("Track {}: dropped {} unterminated notes", track_idx, unterminated);
            dropped += unterminated;
        }
    }

    let mut parts = Vec::new();
    for builder in builders {
        let id = PartId(parts.len() as u32);
        let mut part = Part::new(
            id,
            builder.name,
            builder.program,
            builder.channel == PERCUSSION_CHANNEL,
        );
        for (pitch, velocity, start, end) in builder.notes {
            match Note::new(pitch, velocity, start, end, id) {
                Ok(note) => part.add_note(note),
                Err(_) => dropped += 1,
            }
        }
        if part.note_count() > 0 {
            parts.push(part);
        }
    }

    log::info!(
        "Imported {} parts ({} notes, {} dropped) at {:.1} BPM",
        parts.len(),
        parts.iter().map(|p| p.note_count()).sum::<usize>(),
        dropped,
        metadata.tempo_bpm
    );

    Ok(ImportedScore { parts, metadata })
}

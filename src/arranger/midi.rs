// MIDI Export - Convert melodies and arrangements to MIDI files using midly
// Produces a meta track followed by one track per staff

use midly::num::{u24, u28, u4};
use midly::{Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};
use serde::{Deserialize, Serialize};

use super::arrangement::Arrangement;
use crate::notes::{Note, MIDI_MAX};
use crate::notes::ingest::MidiError;
use crate::score::ScoreMetadata;

/// General MIDI acoustic grand piano
pub const PROGRAM_ACOUSTIC_GRAND: u8 = 0;

/// MIDI export options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiExportOptions {
    /// Pulses per quarter note (PPQ) - typically 480 or 960
    pub ppq: u16,

    /// Include tempo metadata
    pub include_tempo: bool,

    /// Include time signature and key signature metadata
    pub include_time_signature: bool,

    /// Include track names
    pub track_names: bool,
}

impl Default for MidiExportOptions {
    fn default() -> Self {
        MidiExportOptions {
            ppq: 480,
            include_tempo: true,
            include_time_signature: true,
            track_names: true,
        }
    }
}

/// A named track of notes on one channel
struct StaffTrack<'a> {
    name: &'a str,
    channel: u8,
    program: u8,
    notes: Vec<Note>,
}

/// Export a melody (e.g. the detected chorus) as a single-track MIDI file
pub fn export_melody(
    notes: &[Note],
    program: u8,
    metadata: &ScoreMetadata,
    options: &MidiExportOptions,
) -> Result<Vec<u8>, MidiError> {
    let staff = StaffTrack {
        name: "Melody",
        channel: 0,
        program: program.min(MIDI_MAX),
        notes: notes.to_vec(),
    };
    write_smf(&[staff], metadata, options)
}

/// Export a two-hand arrangement: meta track, right hand, left hand
pub fn export_arrangement(
    arrangement: &Arrangement,
    options: &MidiExportOptions,
) -> Result<Vec<u8>, MidiError> {
    let right = StaffTrack {
        name: "Right Hand",
        channel: 0,
        program: PROGRAM_ACOUSTIC_GRAND,
        notes: arrangement.right_hand.iter().flat_map(|e| e.tones()).collect(),
    };
    let left = StaffTrack {
        name: "Left Hand",
        channel: 1,
        program: PROGRAM_ACOUSTIC_GRAND,
        notes: arrangement.left_hand.iter().flat_map(|e| e.tones()).collect(),
    };
    write_smf(&[right, left], &arrangement.metadata, options)
}

fn write_smf(
    staves: &[StaffTrack<'_>],
    metadata: &ScoreMetadata,
    options: &MidiExportOptions,
) -> Result<Vec<u8>, MidiError> {
    let header = Header {
        format: midly::Format::Parallel,
        timing: Timing::Metrical(options.ppq.into()),
    };

    let ticks_per_sec = calculate_ticks_per_sec(metadata.tempo_bpm, options.ppq);
    let mut tracks = Vec::with_capacity(staves.len() + 1);

    // Track 0: tempo, time signature and key
    let mut meta_track = Track::new();
    if options.include_tempo {
        let micros = metadata.micros_per_quarter();
        let tempo = u24::try_from(micros).ok_or_else(|| {
            MidiError::Write(format!("Tempo of {} BPM is too slow for MIDI", metadata.tempo_bpm))
        })?;
        meta_track.push(TrackEvent {
            delta: 0u32.into(),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(tempo)),
        });
    }
    if options.include_time_signature {
        let ts = metadata.time_signature;
        meta_track.push(TrackEvent {
            delta: 0u32.into(),
            kind: TrackEventKind::Meta(MetaMessage::TimeSignature(
                ts.numerator,
                ts.midi_denominator_power(),
                24, // MIDI clocks per metronome click
                8,  // 32nd notes per quarter
            )),
        });
        if let Some((sharps, minor)) = metadata.key_signature() {
            meta_track.push(TrackEvent {
                delta: 0u32.into(),
                kind: TrackEventKind::Meta(MetaMessage::KeySignature(sharps, minor)),
            });
        }
    }
    meta_track.push(TrackEvent {
        delta: 0u32.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    tracks.push(meta_track);

    for staff in staves {
        tracks.push(create_staff_track(staff, ticks_per_sec, options)?);
    }

    let smf = Smf { header, tracks };

    let mut bytes = Vec::new();
    smf.write(&mut bytes)
        .map_err(|e| MidiError::Write(e.to_string()))?;

    Ok(bytes)
}

fn create_staff_track<'a>(
    staff: &StaffTrack<'a>,
    ticks_per_sec: f64,
    options: &MidiExportOptions,
) -> Result<Track<'a>, MidiError> {
    let mut track = Track::new();
    let channel: u4 = staff.channel.into();

    if options.track_names {
        track.push(TrackEvent {
            delta: 0u32.into(),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(staff.name.as_bytes())),
        });
    }
    track.push(TrackEvent {
        delta: 0u32.into(),
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: staff.program.into(),
            },
        },
    });

    // (tick, is_note_on, event); note-offs sort before note-ons on the same tick
    let mut events: Vec<(u32, bool, TrackEventKind<'a>)> = Vec::with_capacity(staff.notes.len() * 2);
    for note in &staff.notes {
        let tick_on = seconds_to_ticks(note.start(), ticks_per_sec)?;
        let tick_off = seconds_to_ticks(note.end(), ticks_per_sec)?.max(tick_on.saturating_add(1));

        events.push((
            tick_on,
            true,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key: note.pitch().into(),
                    vel: note.velocity().max(1).into(),
                },
            },
        ));
        events.push((
            tick_off,
            false,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key: note.pitch().into(),
                    vel: 0u8.into(),
                },
            },
        ));
    }

    events.sort_by_key(|(tick, is_on, _)| (*tick, *is_on));

    // Convert to delta times
    let mut last_tick = 0;
    for (tick, _, kind) in events {
        let delta = tick.saturating_sub(last_tick);
        let delta = u28::try_from(delta).ok_or_else(|| {
            MidiError::Write(format!("Gap of {} ticks in '{}' exceeds the MIDI delta range", delta, staff.name))
        })?;
        track.push(TrackEvent { delta, kind });
        last_tick = tick;
    }

    track.push(TrackEvent {
        delta: 0u32.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    Ok(track)
}

/// Calculate ticks per second at a given tempo
fn calculate_ticks_per_sec(bpm: f64, ppq: u16) -> f64 {
    let bpm = if bpm > 0.0 { bpm } else { crate::score::DEFAULT_TEMPO_BPM };
    ppq as f64 * bpm / 60.0
}

fn seconds_to_ticks(seconds: f64, ticks_per_sec: f64) -> Result<u32, MidiError> {
    let ticks = (seconds * ticks_per_sec).round();
    if !ticks.is_finite() || ticks > u32::MAX as f64 {
        return Err(MidiError::Write(format!("Time {}s is out of MIDI tick range", seconds)));
    }
    Ok(ticks as u32)
}

// Accompaniment - Sustained triads derived from the melody's pitch content
// One chord per measure window; the quality is a local major/minor guess,
// not key-aware harmonic analysis

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::notes::{sort_by_start, Note, PartId, MIDI_MAX};

/// Part id stamped on synthesized chord tones
pub const ACCOMPANIMENT_PART_ID: PartId = PartId(u32::MAX);

const MAJOR_THIRD: u8 = 4;
const MINOR_THIRD: u8 = 3;
const PERFECT_FIFTH: u8 = 7;

/// Settings for accompaniment synthesis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccompanimentSettings {
    /// Measure window width in seconds
    pub measure_secs: f64,

    /// Octave the triad is voiced from; the root lands at `pc + (octave - 1) * 12`
    pub base_octave: u8,

    /// Velocity of every chord tone (softer than a typical melody)
    pub velocity: u8,
}

impl Default for AccompanimentSettings {
    fn default() -> Self {
        AccompanimentSettings {
            measure_secs: 2.0,
            base_octave: 4,
            velocity: 70,
        }
    }
}

/// A synthesized triad covering one measure window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    /// Root pitch class (0 = C)
    pub root: u8,

    pub is_major: bool,

    /// Root, third and fifth
    pub notes: [Note; 3],

    /// Window start in seconds
    pub start: f64,

    /// Window end in seconds (exclusive)
    pub end: f64,
}

impl Chord {
    pub fn pitches(&self) -> [u8; 3] {
        [
            self.notes[0].pitch(),
            self.notes[1].pitch(),
            self.notes[2].pitch(),
        ]
    }
}

/// Most frequent pitch class; on a tie the first one seen wins
pub fn root_pitch_class(pitch_classes: &[u8]) -> Option<u8> {
    let mut counts = [0usize; 12];
    let mut first_seen: Vec<u8> = Vec::with_capacity(12);

    for &pc in pitch_classes {
        let pc = pc % 12;
        if counts[pc as usize] == 0 {
            first_seen.push(pc);
        }
        counts[pc as usize] += 1;
    }

    let mut best: Option<(u8, usize)> = None;
    for pc in first_seen {
        let count = counts[pc as usize];
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((pc, count)),
        }
    }
    best.map(|(pc, _)| pc)
}

/// Guess chord quality from the window's pitch classes
///
/// Minor only when the minor third is present and the major third is absent.
/// Both or neither present defaults to major; this is a known simplification.
pub fn is_major_quality(root: u8, pitch_classes: &[u8]) -> bool {
    let has_major_third = pitch_classes.contains(&((root + MAJOR_THIRD) % 12));
    let has_minor_third = pitch_classes.contains(&((root + MINOR_THIRD) % 12));

    !(has_minor_third && !has_major_third)
}

/// Triad pitches voiced from `base_octave`, clamped to the MIDI range
pub fn triad_pitches(root: u8, is_major: bool, base_octave: u8) -> [u8; 3] {
    let root_note = (root % 12) as i32 + (base_octave as i32 - 1) * 12;
    let third = (if is_major { MAJOR_THIRD } else { MINOR_THIRD }) as i32;

    let clamp = |pitch: i32| pitch.clamp(0, MIDI_MAX as i32) as u8;
    [
        clamp(root_note),
        clamp(root_note + third),
        clamp(root_note + PERFECT_FIFTH as i32),
    ]
}

/// Synthesize one triad per measure window that contains melody notes
///
/// Windows without notes are skipped. An empty input yields no chords.
pub fn synthesize_accompaniment(notes: &[Note], settings: &AccompanimentSettings) -> Vec<Chord> {
    if notes.is_empty() {
        log::debug!("No melody notes, accompaniment left empty");
        return Vec::new();
    }

    let measure_secs = if settings.measure_secs.is_finite() && settings.measure_secs > 0.0 {
        settings.measure_secs
    } else {
        log::warn!("Invalid measure width {}s, using default", settings.measure_secs);
        AccompanimentSettings::default().measure_secs
    };

    let mut sorted = notes.to_vec();
    sort_by_start(&mut sorted);

    let song_duration = sorted.iter().map(|n| n.end()).fold(0.0, f64::max);
    let last_measure = (song_duration / measure_secs).floor() as u64;

    // Occupied measures only, keyed by measure index
    let mut measures: BTreeMap<u64, Vec<u8>> = BTreeMap::new();
    for note in &sorted {
        let idx = (note.start() / measure_secs).floor() as u64;
        if idx <= last_measure {
            measures.entry(idx).or_default().push(note.pitch_class());
        }
    }

    let velocity = settings.velocity.min(MIDI_MAX);
    let mut chords = Vec::new();

    for (&idx, pitch_classes) in &measures {
        let Some(root) = root_pitch_class(pitch_classes) else {
            continue;
        };
        let is_major = is_major_quality(root, pitch_classes);
        let pitches = triad_pitches(root, is_major, settings.base_octave);

        let start = idx as f64 * measure_secs;
        let end = (idx + 1) as f64 * measure_secs;

        let tones = pitches.map(|pitch| Note::new(pitch, velocity, start, end, ACCOMPANIMENT_PART_ID));
        let [Ok(root_tone), Ok(third), Ok(fifth)] = tones else {
            log::warn!("Skipping chord for measure {} with invalid span", idx);
            continue;
        };

        chords.push(Chord {
            root,
            is_major,
            notes: [root_tone, third, fifth],
            start,
            end,
        });
    }

    log::debug!("Synthesized {} chords from {} notes", chords.len(), notes.len());
    chords
}

/// Flatten chords into their chord-tone notes, in chord order
pub fn accompaniment_notes(chords: &[Chord]) -> Vec<Note> {
    chords.iter().flat_map(|c| c.notes.iter().copied()).collect()
}

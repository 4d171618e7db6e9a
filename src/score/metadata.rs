// Score Metadata - Tempo, time signature and key carried alongside the notes
// Fixed defaults (120 BPM, 4/4, C major) when the source provides none

use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMPO_BPM: f64 = 120.0;
pub const DEFAULT_KEY: &str = "C";

/// Major key names indexed by sharps + 7 (-7 flats ..= 7 sharps)
const MAJOR_KEYS: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];

/// Minor key names indexed by sharps + 7
const MINOR_KEYS: [&str; 15] = [
    "Abm", "Ebm", "Bbm", "Fm", "Cm", "Gm", "Dm", "Am", "Em", "Bm", "F#m", "C#m", "G#m", "D#m",
    "A#m",
];

/// Musical time signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    /// Beats per bar
    pub numerator: u8,

    /// Note value that gets one beat (4 = quarter note)
    pub denominator: u8,
}

impl TimeSignature {
    pub const FOUR_FOUR: TimeSignature = TimeSignature {
        numerator: 4,
        denominator: 4,
    };

    /// Denominator as the power of two stored in MIDI meta events (4 -> 2)
    pub fn midi_denominator_power(&self) -> u8 {
        let mut power = 0u8;
        let mut value = self.denominator.max(1);
        while value > 1 {
            value >>= 1;
            power += 1;
        }
        power
    }

    /// Build from a MIDI time signature meta event
    pub fn from_midi(numerator: u8, denominator_power: u8) -> Self {
        TimeSignature {
            numerator: numerator.max(1),
            denominator: 1u8.checked_shl(denominator_power as u32).unwrap_or(4),
        }
    }

    /// Length of one bar in quarter notes
    pub fn quarters_per_bar(&self) -> f64 {
        self.numerator as f64 * 4.0 / self.denominator.max(1) as f64
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature::FOUR_FOUR
    }
}

/// Metadata passed through from source to renderer, never used by the
/// note-level heuristics themselves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreMetadata {
    pub tempo_bpm: f64,
    pub time_signature: TimeSignature,

    /// Key name, e.g. "C", "F#", "Am"
    pub key_name: String,
}

impl Default for ScoreMetadata {
    fn default() -> Self {
        ScoreMetadata {
            tempo_bpm: DEFAULT_TEMPO_BPM,
            time_signature: TimeSignature::FOUR_FOUR,
            key_name: DEFAULT_KEY.to_string(),
        }
    }
}

impl ScoreMetadata {
    /// Duration of one quarter note in seconds
    pub fn quarter_secs(&self) -> f64 {
        if self.tempo_bpm > 0.0 {
            60.0 / self.tempo_bpm
        } else {
            60.0 / DEFAULT_TEMPO_BPM
        }
    }

    /// Microseconds per quarter note, as stored in MIDI tempo events
    pub fn micros_per_quarter(&self) -> u32 {
        (self.quarter_secs() * 1_000_000.0) as u32
    }

    /// MIDI key signature `(sharps, is_minor)` for `key_name`, if it is a known key
    pub fn key_signature(&self) -> Option<(i8, bool)> {
        if let Some(idx) = MAJOR_KEYS.iter().position(|k| *k == self.key_name) {
            return Some((idx as i8 - 7, false));
        }
        MINOR_KEYS
            .iter()
            .position(|k| *k == self.key_name)
            .map(|idx| (idx as i8 - 7, true))
    }
}

/// Key name for a MIDI key signature
pub fn key_name_from_midi(sharps: i8, minor: bool) -> String {
    let idx = (sharps.clamp(-7, 7) + 7) as usize;
    if minor {
        MINOR_KEYS[idx].to_string()
    } else {
        MAJOR_KEYS[idx].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let meta = ScoreMetadata::default();
        assert_eq!(meta.tempo_bpm, 120.0);
        assert_eq!(meta.time_signature, TimeSignature::FOUR_FOUR);
        assert_eq!(meta.key_name, "C");
        assert!((meta.quarter_secs() - 0.5).abs() < 1e-9);
        assert_eq!(meta.micros_per_quarter(), 500_000);
    }

    #[test]
    fn test_time_signature_midi_conversion() {
        assert_eq!(TimeSignature::FOUR_FOUR.midi_denominator_power(), 2);

        let six_eight = TimeSignature::from_midi(6, 3);
        assert_eq!(six_eight.denominator, 8);
        assert_eq!(six_eight.midi_denominator_power(), 3);
        assert!((six_eight.quarters_per_bar() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_key_names() {
        assert_eq!(key_name_from_midi(0, false), "C");
        assert_eq!(key_name_from_midi(0, true), "Am");
        assert_eq!(key_name_from_midi(-1, false), "F");
        assert_eq!(key_name_from_midi(3, true), "F#m");

        let meta = ScoreMetadata {
            key_name: "Eb".to_string(),
            ..Default::default()
        };
        assert_eq!(meta.key_signature(), Some((-3, false)));

        let unknown = ScoreMetadata {
            key_name: "H".to_string(),
            ..Default::default()
        };
        assert_eq!(unknown.key_signature(), None);
    }

    #[test]
    fn test_non_positive_tempo_falls_back() {
        let meta = ScoreMetadata {
            tempo_bpm: 0.0,
            ..Default::default()
        };
        assert!((meta.quarter_secs() - 0.5).abs() < 1e-9);
    }
}

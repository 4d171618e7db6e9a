// Chorus Detection - Finds the most frequently repeated fixed-length passage
// Segments the melody into windows, fingerprints each by relative pitch movement,
// and keeps the notes of every window sharing the winning fingerprint

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::ArrangeError;
use crate::notes::{sort_by_start, Note};

/// Settings for chorus detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChorusSettings {
    /// Segment window width in seconds
    pub window_secs: f64,

    /// Minimum share of the input (by note count) the chorus must keep.
    /// Below this the whole input is returned instead.
    pub min_fraction: f64,
}

impl Default for ChorusSettings {
    fn default() -> Self {
        ChorusSettings {
            window_secs: 4.0,
            min_fraction: 0.2,
        }
    }
}

/// Comparison-only encoding of a segment's relative pitch movement,
/// e.g. "2,2,-4". Empty for segments with fewer than two notes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint notes already ordered by start time
    pub fn from_notes(notes: &[Note]) -> Self {
        if notes.len() <= 1 {
            return Fingerprint::default();
        }

        let diffs: Vec<String> = notes
            .windows(2)
            .map(|pair| (pair[1].pitch() as i16 - pair[0].pitch() as i16).to_string())
            .collect();

        Fingerprint(diffs.join(","))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bucket sorted notes into fixed windows by start time
///
/// Only occupied windows get a bucket, keyed by window index, so memory follows
/// the note count rather than the song length. Indices past
/// `floor(song_duration / window)` are left out.
fn bucket_segments(sorted: &[Note], window_secs: f64) -> Vec<Vec<Note>> {
    let song_duration = sorted.iter().map(|n| n.end()).fold(0.0, f64::max);
    let last_segment = (song_duration / window_secs).floor() as u64;

    let mut segments: BTreeMap<u64, Vec<Note>> = BTreeMap::new();
    for note in sorted {
        let idx = (note.start() / window_secs).floor() as u64;
        if idx <= last_segment {
            segments.entry(idx).or_default().push(*note);
        }
    }
    segments.into_values().collect()
}

/// Fingerprints of every occupied window, in segment order
///
/// Exposed for diagnostics; `detect_chorus` uses the same segmentation.
pub fn segment_fingerprints(notes: &[Note], settings: &ChorusSettings) -> Vec<Fingerprint> {
    let mut sorted = notes.to_vec();
    sort_by_start(&mut sorted);

    bucket_segments(&sorted, window_width(settings))
        .iter()
        .map(|segment| Fingerprint::from_notes(segment))
        .collect()
}

/// Most frequent non-empty fingerprint; first seen wins ties
fn most_common(fingerprints: &[Fingerprint]) -> Option<&Fingerprint> {
    let mut counts: HashMap<&Fingerprint, usize> = HashMap::new();
    let mut order: Vec<&Fingerprint> = Vec::new();

    for fp in fingerprints.iter().filter(|fp| !fp.is_empty()) {
        let count = counts.entry(fp).or_insert(0);
        if *count == 0 {
            order.push(fp);
        }
        *count += 1;
    }

    let mut winner: Option<(&Fingerprint, usize)> = None;
    for fp in order {
        let count = counts[fp];
        match winner {
            Some((_, best)) if count <= best => {}
            _ => winner = Some((fp, count)),
        }
    }
    winner.map(|(fp, _)| fp)
}

fn window_width(settings: &ChorusSettings) -> f64 {
    if settings.window_secs.is_finite() && settings.window_secs > 0.0 {
        settings.window_secs
    } else {
        log::warn!(
            "Invalid chorus window {}s, using default",
            settings.window_secs
        );
        ChorusSettings::default().window_secs
    }
}

/// Detect the chorus of a melody
///
/// Returns the notes of every window whose fingerprint equals the most
/// frequent one, in segment order then start order. When nothing repeats, or
/// the chorus would keep fewer than `min_fraction` of the notes, the input is
/// returned unchanged.
///
/// # Errors
/// `ArrangeError::EmptyChorusInput` for an empty note list.
pub fn detect_chorus(notes: &[Note], settings: &ChorusSettings) -> Result<Vec<Note>, ArrangeError> {
    if notes.is_empty() {
        return Err(ArrangeError::EmptyChorusInput);
    }

    let mut sorted = notes.to_vec();
    sort_by_start(&mut sorted);

    let segments = bucket_segments(&sorted, window_width(settings));
    let fingerprints: Vec<Fingerprint> = segments
        .iter()
        .map(|segment| Fingerprint::from_notes(segment))
        .collect();

    let Some(winner) = most_common(&fingerprints) else {
        log::debug!("No repeated pattern found, keeping all {} notes", notes.len());
        return Ok(notes.to_vec());
    };

    let chorus: Vec<Note> = segments
        .iter()
        .zip(&fingerprints)
        .filter(|(_, fp)| *fp == winner)
        .flat_map(|(segment, _)| segment.iter().copied())
        .collect();

    if (chorus.len() as f64) < notes.len() as f64 * settings.min_fraction {
        log::debug!(
            "Chorus '{}' too small ({} of {} notes), keeping all notes",
            winner,
            chorus.len(),
            notes.len()
        );
        return Ok(notes.to_vec());
    }

    log::debug!(
        "Chorus '{}' spans {} of {} notes",
        winner,
        chorus.len(),
        notes.len()
    );
    Ok(chorus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::PartId;

    fn note(pitch: u8, start: f64, end: f64) -> Note {
        Note::new(pitch, 90, start, end, PartId(0)).unwrap()
    }

    fn notes_from(layout: &[(u8, f64, f64)]) -> Vec<Note> {
        layout.iter().map(|&(p, s, e)| note(p, s, e)).collect()
    }

    #[test]
    fn test_fingerprint_from_notes() {
        let notes = notes_from(&[(60, 0.0, 1.0), (62, 1.0, 2.0), (58, 2.0, 3.0)]);
        assert_eq!(Fingerprint::from_notes(&notes).as_str(), "2,-4");

        assert!(Fingerprint::from_notes(&notes[..1]).is_empty());
        assert!(Fingerprint::from_notes(&[]).is_empty());
    }

    #[test]
    fn test_repeated_segments_share_fingerprint() {
        let notes = notes_from(&[
            (60, 0.0, 1.0),
            (62, 1.0, 2.0),
            (64, 2.0, 3.0),
            (60, 4.0, 5.0),
            (62, 5.0, 6.0),
            (64, 6.0, 7.0),
        ]);

        let fps = segment_fingerprints(&notes, &ChorusSettings::default());
        assert_eq!(fps.len(), 2);
        assert_eq!(fps[0].as_str(), "2,2");
        assert_eq!(fps[0], fps[1]);

        let chorus = detect_chorus(&notes, &ChorusSettings::default()).unwrap();
        assert_eq!(chorus, notes);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        let result = detect_chorus(&[], &ChorusSettings::default());
        assert_eq!(result.unwrap_err(), ArrangeError::EmptyChorusInput);
    }

    #[test]
    fn test_selects_most_frequent_pattern() {
        // Segments 0, 2, 4 repeat "2,2"; segments 1, 3 each differ
        let mut layout = Vec::new();
        for seg in 0..5 {
            let base = seg as f64 * 4.0;
            if seg % 2 == 0 {
                layout.extend([(60, base, base + 1.0), (62, base + 1.0, base + 2.0), (64, base + 2.0, base + 3.0)]);
            } else {
                layout.extend([(70, base, base + 1.0), (65 + seg as u8, base + 1.0, base + 2.0)]);
            }
        }
        let notes = notes_from(&layout);

        let chorus = detect_chorus(&notes, &ChorusSettings::default()).unwrap();
        assert_eq!(chorus.len(), 9);
        assert!(chorus.iter().all(|n| [60, 62, 64].contains(&n.pitch())));

        // Segment order then start order
        let starts: Vec<f64> = chorus.iter().map(|n| n.start()).collect();
        let mut sorted_starts = starts.clone();
        sorted_starts.sort_by(f64::total_cmp);
        assert_eq!(starts, sorted_starts);
    }

    #[test]
    fn test_tie_goes_to_first_seen_pattern() {
        let notes = notes_from(&[
            (60, 0.0, 1.0),
            (65, 1.0, 2.0), // "5"
            (60, 4.0, 5.0),
            (58, 5.0, 6.0), // "-2"
        ]);

        let chorus = detect_chorus(&notes, &ChorusSettings::default()).unwrap();
        let pitches: Vec<u8> = chorus.iter().map(|n| n.pitch()).collect();
        assert_eq!(pitches, vec![60, 65]);
    }

    #[test]
    fn test_no_repetition_returns_input_unchanged() {
        // Only single-note segments: every fingerprint is empty
        let notes = notes_from(&[(67, 8.0, 9.0), (60, 0.0, 1.0), (64, 4.0, 5.0)]);

        let chorus = detect_chorus(&notes, &ChorusSettings::default()).unwrap();
        assert_eq!(chorus, notes);
    }

    #[test]
    fn test_min_fraction_fallback() {
        // Winner covers 2 of 12 notes (< 20%), so everything is kept
        let mut layout = vec![(60, 0.0, 0.5), (62, 0.5, 1.0)];
        for i in 0..10 {
            let start = 4.0 + i as f64 * 0.3;
            layout.push((50 + i as u8, start, start + 0.3));
        }
        let notes = notes_from(&layout);

        let fps = segment_fingerprints(&notes, &ChorusSettings::default());
        assert_eq!(fps[0].as_str(), "2");
        assert_eq!(fps[1].as_str(), "1,1,1,1,1,1,1,1,1");

        let chorus = detect_chorus(&notes, &ChorusSettings::default()).unwrap();
        assert_eq!(chorus, notes);

        // With a lower floor, the first-seen winner is returned
        let lenient = ChorusSettings {
            min_fraction: 0.1,
            ..Default::default()
        };
        let chorus = detect_chorus(&notes, &lenient).unwrap();
        assert_eq!(chorus.len(), 2);
    }

    #[test]
    fn test_output_is_subsequence_and_idempotent() {
        let mut layout = Vec::new();
        for seg in 0..6 {
            let base = seg as f64 * 4.0;
            if seg < 4 {
                layout.extend([(67, base, base + 0.5), (69, base + 0.5, base + 1.0)]);
            } else {
                layout.extend([(50, base, base + 0.5), (41, base + 0.5, base + 1.0), (45, base + 1.0, base + 1.5)]);
            }
        }
        let notes = notes_from(&layout);
        let settings = ChorusSettings::default();

        let chorus = detect_chorus(&notes, &settings).unwrap();
        assert_eq!(chorus.len(), 8);
        assert!(chorus.iter().all(|n| notes.contains(n)));
        assert!(chorus.len() as f64 >= 0.2 * notes.len() as f64);

        let again = detect_chorus(&chorus, &settings).unwrap();
        assert_eq!(again, chorus);
    }

    #[test]
    fn test_unsorted_input_is_sorted_for_detection() {
        let notes = notes_from(&[
            (64, 2.0, 3.0),
            (60, 0.0, 1.0),
            (62, 1.0, 2.0),
            (64, 6.0, 7.0),
            (62, 5.0, 6.0),
            (60, 4.0, 5.0),
        ]);

        let fps = segment_fingerprints(&notes, &ChorusSettings::default());
        assert_eq!(fps[0].as_str(), "2,2");
        assert_eq!(fps[1].as_str(), "2,2");

        let chorus = detect_chorus(&notes, &ChorusSettings::default()).unwrap();
        let starts: Vec<f64> = chorus.iter().map(|n| n.start()).collect();
        assert_eq!(starts, vec![0.0, 1.0, 2.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_invalid_window_uses_default() {
        let notes = notes_from(&[(60, 0.0, 1.0), (62, 1.0, 2.0), (60, 4.0, 5.0), (62, 5.0, 6.0)]);
        let settings = ChorusSettings {
            window_secs: 0.0,
            ..Default::default()
        };
        let fps = segment_fingerprints(&notes, &settings);
        assert_eq!(fps.len(), 2);
    }

    #[test]
    fn test_very_late_note_keeps_segments_sparse() {
        let notes = notes_from(&[(60, 0.0, 1.0), (62, 1.0, 2.0), (64, 2.0, 1e13)]);

        let fps = segment_fingerprints(&notes, &ChorusSettings::default());
        assert_eq!(fps.len(), 1);
        assert_eq!(fps[0].as_str(), "2,2");

        let chorus = detect_chorus(&notes, &ChorusSettings::default()).unwrap();
        assert_eq!(chorus, notes);
    }

    #[test]
    fn test_far_apart_windows_keep_segment_order() {
        let notes = notes_from(&[
            (60, 1e9, 1e9 + 1.0),
            (62, 1e9 + 1.0, 1e9 + 2.0),
            (60, 0.0, 1.0),
            (62, 1.0, 2.0),
        ]);

        let fps = segment_fingerprints(&notes, &ChorusSettings::default());
        assert_eq!(fps.len(), 2);

        let chorus = detect_chorus(&notes, &ChorusSettings::default()).unwrap();
        let starts: Vec<f64> = chorus.iter().map(|n| n.start()).collect();
        assert_eq!(starts, vec![0.0, 1.0, 1e9, 1e9 + 1.0]);
    }
}

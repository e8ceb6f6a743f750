use crate::sheet::keyboard::Key;
use crate::sheet::quantize::QuantizedFrame;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmenterConfig {
    /// Unvoiced frames a sustained note may bridge before it ends.
    pub max_gap_frames: usize,
    /// Runs shorter than this are treated as detector jitter and dropped.
    pub min_note_ms: f32,
    /// Events starting within this window of the first event of a group
    /// are played together as a chord.
    pub chord_window_ms: f32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_gap_frames: 1,
            min_note_ms: 30.0,
            chord_window_ms: 100.0,
        }
    }
}

/// A note with an onset and a duration, assembled from a run of frames
/// that agreed on the same key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub key: Key,
    pub onset: f32,
    pub duration: f32,
}

/// Notes struck together. `keys` is deduplicated and sorted in keyboard
/// order; `time` is the onset of the earliest member.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordGroup {
    pub time: f32,
    pub keys: Vec<Key>,
}

struct Run {
    key: Key,
    onset: f32,
    end: f32,
}

impl Run {
    fn into_event(self) -> NoteEvent {
        NoteEvent {
            key: self.key,
            onset: self.onset,
            duration: self.end - self.onset,
        }
    }
}

/// Merge consecutive frames with the same key into note events. Dropouts
/// of up to `max_gap_frames` unvoiced frames inside a run are bridged; a
/// different key always ends the run. Runs shorter than `min_note_ms`
/// are discarded afterwards.
pub fn merge_runs(
    frames: &[QuantizedFrame],
    frame_period: f32,
    cfg: &SegmenterConfig,
) -> Vec<NoteEvent> {
    let mut events: Vec<NoteEvent> = Vec::new();
    let mut current: Option<Run> = None;
    let mut gap = 0usize;

    for frame in frames {
        match frame.key {
            Some(key) => {
                gap = 0;
                match current.take() {
                    Some(mut run) if run.key == key => {
                        run.end = frame.time + frame_period;
                        current = Some(run);
                    }
                    finished => {
                        if let Some(run) = finished {
                            events.push(run.into_event());
                        }
                        current = Some(Run {
                            key,
                            onset: frame.time,
                            end: frame.time + frame_period,
                        });
                    }
                }
            }
            None if current.is_some() => {
                gap += 1;
                if gap > cfg.max_gap_frames {
                    if let Some(run) = current.take() {
                        events.push(run.into_event());
                    }
                    gap = 0;
                }
            }
            None => {}
        }
    }

    if let Some(run) = current.take() {
        events.push(run.into_event());
    }

    let min_duration = cfg.min_note_ms / 1000.0;
    events.retain(|event| event.duration >= min_duration);
    events
}

/// Group note events into chords. Events are sorted by onset first, so
/// the grouping depends only on the set of events, not the order they
/// were collected in. Each group is anchored at its earliest onset; an
/// event within `chord_window_ms` of the anchor joins the group.
pub fn group_chords(mut events: Vec<NoteEvent>, cfg: &SegmenterConfig) -> Vec<ChordGroup> {
    events.sort_by(|a, b| a.onset.total_cmp(&b.onset));

    let window = cfg.chord_window_ms / 1000.0;
    let mut groups: Vec<ChordGroup> = Vec::new();
    let mut anchor = 0.0f32;
    let mut keys: Vec<Key> = Vec::new();

    for event in &events {
        if !keys.is_empty() && event.onset - anchor > window {
            groups.push(finish_group(anchor, std::mem::take(&mut keys)));
        }
        if keys.is_empty() {
            anchor = event.onset;
        }
        keys.push(event.key);
    }

    if !keys.is_empty() {
        groups.push(finish_group(anchor, keys));
    }

    groups
}

fn finish_group(time: f32, mut keys: Vec<Key>) -> ChordGroup {
    keys.sort();
    keys.dedup();
    ChordGroup { time, keys }
}

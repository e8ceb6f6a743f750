use serde::Serialize;

use crate::sheet::keyboard::Key;
use crate::sheet::segment::ChordGroup;

/// Song-level metadata carried into the output document.
#[derive(Debug, Clone)]
pub struct SheetMeta {
    pub name: String,
    pub author: String,
    pub transcribed_by: String,
    pub bpm: u32,
}

impl Default for SheetMeta {
    fn default() -> Self {
        Self {
            name: "Untitled".to_string(),
            author: "skynote".to_string(),
            transcribed_by: "skynote".to_string(),
            bpm: 120,
        }
    }
}

/// The sheet document as written to disk. Field names and order follow
/// the player's expected schema, so the serde declaration order matters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetDoc {
    pub name: String,
    pub author: String,
    pub transcribed_by: String,
    pub bpm: u32,
    pub bits_per_page: u32,
    pub pitch_level: u32,
    pub is_composed: bool,
    pub is_encrypted: bool,
    pub song_notes: Vec<SheetNote>,
}

/// One playable note. Chords appear as consecutive notes sharing a time.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SheetNote {
    pub key: Key,
    pub time: u64,
}

impl SheetDoc {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn note_count(&self) -> usize {
        self.song_notes.len()
    }
}

/// Flatten chord groups into the output document. Every key of a group
/// becomes its own note entry at the group's time.
pub fn build_sheet(meta: &SheetMeta, groups: &[ChordGroup]) -> SheetDoc {
    let mut song_notes = Vec::new();
    for group in groups {
        let time = to_millis(group.time);
        for &key in &group.keys {
            song_notes.push(SheetNote { key, time });
        }
    }

    SheetDoc {
        name: meta.name.clone(),
        author: meta.author.clone(),
        transcribed_by: meta.transcribed_by.clone(),
        bpm: meta.bpm,
        bits_per_page: 16,
        pitch_level: 0,
        is_composed: true,
        is_encrypted: false,
        song_notes,
    }
}

/// Seconds to whole milliseconds, rounding half up.
pub fn to_millis(secs: f32) -> u64 {
    (secs as f64 * 1000.0 + 0.5).floor() as u64
}

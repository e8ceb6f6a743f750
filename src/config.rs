use serde::Deserialize;
use std::path::PathBuf;

use crate::audio::decode::AudioConfig;
use crate::audio::pitch::DetectorConfig;
use crate::sheet::segment::SegmenterConfig;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioSection,
    #[serde(default)]
    pub detector: DetectorSection,
    #[serde(default)]
    pub quantizer: QuantizerSection,
    #[serde(default)]
    pub segmenter: SegmenterSection,
    #[serde(default)]
    pub sheet: SheetSection,
}

#[derive(Debug, Deserialize)]
pub struct AudioSection {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

#[derive(Debug, Deserialize)]
pub struct DetectorSection {
    #[serde(default = "default_frame_length")]
    pub frame_length: usize,
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
    #[serde(default = "default_fmin")]
    pub fmin: f32,
    #[serde(default = "default_fmax")]
    pub fmax: f32,
    #[serde(default = "default_yin_threshold")]
    pub yin_threshold: f32,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    #[serde(default = "default_silence_rms")]
    pub silence_rms: f32,
    #[serde(default)]
    pub budget_secs: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct QuantizerSection {
    #[serde(default = "default_tolerance_cents")]
    pub tolerance_cents: f32,
}

#[derive(Debug, Deserialize)]
pub struct SegmenterSection {
    #[serde(default = "default_max_gap_frames")]
    pub max_gap_frames: usize,
    #[serde(default = "default_min_note_ms")]
    pub min_note_ms: f32,
    #[serde(default = "default_chord_window_ms")]
    pub chord_window_ms: f32,
}

#[derive(Debug, Deserialize)]
pub struct SheetSection {
    #[serde(default = "default_credit")]
    pub author: String,
    #[serde(default = "default_credit")]
    pub transcribed_by: String,
}

impl Default for AudioSection {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
        }
    }
}

impl Default for DetectorSection {
    fn default() -> Self {
        Self {
            frame_length: default_frame_length(),
            hop_length: default_hop_length(),
            fmin: default_fmin(),
            fmax: default_fmax(),
            yin_threshold: default_yin_threshold(),
            min_confidence: default_min_confidence(),
            silence_rms: default_silence_rms(),
            budget_secs: None,
        }
    }
}

impl Default for QuantizerSection {
    fn default() -> Self {
        Self {
            tolerance_cents: default_tolerance_cents(),
        }
    }
}

impl Default for SegmenterSection {
    fn default() -> Self {
        Self {
            max_gap_frames: default_max_gap_frames(),
            min_note_ms: default_min_note_ms(),
            chord_window_ms: default_chord_window_ms(),
        }
    }
}

impl Default for SheetSection {
    fn default() -> Self {
        Self {
            author: default_credit(),
            transcribed_by: default_credit(),
        }
    }
}

fn default_sample_rate() -> u32 { 22050 }
fn default_frame_length() -> usize { 2048 }
fn default_hop_length() -> usize { 512 }
fn default_fmin() -> f32 { 65.0 }
fn default_fmax() -> f32 { 2000.0 }
fn default_yin_threshold() -> f32 { 0.1 }
fn default_min_confidence() -> f32 { 0.7 }
fn default_silence_rms() -> f32 { 0.001 }
fn default_tolerance_cents() -> f32 { 100.0 }
fn default_max_gap_frames() -> usize { 1 }
fn default_min_note_ms() -> f32 { 30.0 }
fn default_chord_window_ms() -> f32 { 100.0 }
fn default_credit() -> String { "skynote".into() }

impl Config {
    pub fn audio_config(&self) -> AudioConfig {
        AudioConfig {
            sample_rate: self.audio.sample_rate,
        }
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            frame_length: self.detector.frame_length,
            hop_length: self.detector.hop_length,
            fmin: self.detector.fmin,
            fmax: self.detector.fmax,
            yin_threshold: self.detector.yin_threshold,
            min_confidence: self.detector.min_confidence,
            silence_rms: self.detector.silence_rms,
            budget_secs: self.detector.budget_secs,
        }
    }

    pub fn segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig {
            max_gap_frames: self.segmenter.max_gap_frames,
            min_note_ms: self.segmenter.min_note_ms,
            chord_window_ms: self.segmenter.chord_window_ms,
        }
    }
}

pub fn load_config(path: &PathBuf) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            log::warn!("Ignoring config {}: {}", path.display(), err);
            None
        }
    }
}

use std::path::Path;

use crate::audio::decode::{self, AudioConfig, Waveform};
use crate::audio::pitch::{self, DetectorConfig};
use crate::audio::tempo;
use crate::cancel::CancelToken;
use crate::error::PipelineError;
use crate::progress::{ProgressSink, Stage};
use crate::sheet::encode::{build_sheet, SheetDoc, SheetMeta};
use crate::sheet::quantize::{self, QuantizerConfig};
use crate::sheet::segment::{self, SegmenterConfig};

/// Everything a single conversion needs beyond the audio itself.
///
/// `name`, `author` and `transcribed_by` fall back to the source file
/// stem (for `name`) and the tool defaults when unset. `bpm` skips tempo
/// estimation when given.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub audio: AudioConfig,
    pub detector: DetectorConfig,
    pub quantizer: QuantizerConfig,
    pub segmenter: SegmenterConfig,
    pub name: Option<String>,
    pub author: Option<String>,
    pub transcribed_by: Option<String>,
    pub bpm: Option<u32>,
}

/// Convert an audio file on disk.
pub fn convert_path(
    path: &Path,
    opts: &ConvertOptions,
    cancel: &CancelToken,
    progress: &dyn ProgressSink,
) -> Result<SheetDoc, PipelineError> {
    ensure_live(cancel)?;
    let waveform = decode::load_path(path, &opts.audio)?;
    let stem = path.file_stem().and_then(|s| s.to_str());
    run(waveform, stem, opts, cancel, progress)
}

/// Convert an in-memory encoded audio stream.
pub fn convert_bytes(
    bytes: Vec<u8>,
    extension: Option<&str>,
    opts: &ConvertOptions,
    cancel: &CancelToken,
    progress: &dyn ProgressSink,
) -> Result<SheetDoc, PipelineError> {
    ensure_live(cancel)?;
    let waveform = decode::load_bytes(bytes, extension, &opts.audio)?;
    run(waveform, None, opts, cancel, progress)
}

/// Convert already-decoded mono PCM.
pub fn convert_samples(
    samples: Vec<f32>,
    sample_rate: u32,
    opts: &ConvertOptions,
    cancel: &CancelToken,
    progress: &dyn ProgressSink,
) -> Result<SheetDoc, PipelineError> {
    ensure_live(cancel)?;
    let waveform = decode::from_samples(samples, sample_rate, &opts.audio)?;
    run(waveform, None, opts, cancel, progress)
}

fn run(
    waveform: Waveform,
    source_name: Option<&str>,
    opts: &ConvertOptions,
    cancel: &CancelToken,
    progress: &dyn ProgressSink,
) -> Result<SheetDoc, PipelineError> {
    if waveform.samples.is_empty() {
        return Err(PipelineError::EmptyAudio);
    }
    stage_done(
        progress,
        Stage::Load,
        format!(
            "{:.1}s of audio at {} Hz",
            waveform.duration_secs(),
            waveform.sample_rate
        ),
    );

    ensure_live(cancel)?;
    let track = pitch::detect(&waveform, &opts.detector, cancel)?;
    let voiced = track.iter().filter(|e| e.frequency.is_some()).count();
    stage_done(
        progress,
        Stage::DetectPitch,
        format!("{voiced}/{} voiced frames", track.len()),
    );

    ensure_live(cancel)?;
    let frames = quantize::quantize(&track, &opts.quantizer);
    let mapped = frames.iter().filter(|f| f.key.is_some()).count();
    stage_done(
        progress,
        Stage::Quantize,
        format!("{mapped} frames on the keyboard"),
    );

    ensure_live(cancel)?;
    let frame_period = opts.detector.hop_length as f32 / waveform.sample_rate as f32;
    let events = segment::merge_runs(&frames, frame_period, &opts.segmenter);
    let event_count = events.len();
    let groups = segment::group_chords(events, &opts.segmenter);
    stage_done(
        progress,
        Stage::Segment,
        format!("{event_count} events in {} groups", groups.len()),
    );

    if groups.is_empty() {
        return Err(PipelineError::NoPitchedContent);
    }

    ensure_live(cancel)?;
    let bpm = match opts.bpm {
        Some(bpm) => bpm,
        None => tempo::estimate_bpm(&waveform).round() as u32,
    };
    let defaults = SheetMeta::default();
    let meta = SheetMeta {
        name: opts
            .name
            .clone()
            .or_else(|| source_name.map(str::to_string))
            .unwrap_or(defaults.name),
        author: opts.author.clone().unwrap_or(defaults.author),
        transcribed_by: opts.transcribed_by.clone().unwrap_or(defaults.transcribed_by),
        bpm,
    };
    let doc = build_sheet(&meta, &groups);
    stage_done(progress, Stage::Encode, format!("{} notes", doc.note_count()));

    Ok(doc)
}

fn stage_done(progress: &dyn ProgressSink, stage: Stage, detail: String) {
    log::info!("Stage {} done: {}", stage, detail);
    progress.stage_complete(stage, stage.percent_complete(), &detail);
}

fn ensure_live(cancel: &CancelToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}

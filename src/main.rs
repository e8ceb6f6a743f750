mod audio;
mod cancel;
mod cli;
mod config;
mod error;
mod pipeline;
mod progress;
mod sheet;
mod source;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use audio::pitch::DetectorConfig;
use cancel::CancelToken;
use cli::Cli;
use error::PipelineError;
use pipeline::ConvertOptions;
use progress::{ProgressSink, Stage};
use sheet::quantize::QuantizerConfig;
use sheet::segment::SegmenterConfig;
use source::AudioSource;

struct BarProgress {
    bar: ProgressBar,
}

impl ProgressSink for BarProgress {
    fn stage_complete(&self, stage: Stage, percent: u8, detail: &str) {
        self.bar.set_position(percent as u64);
        self.bar.set_message(format!("{stage}: {detail}"));
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect skynote.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = std::path::PathBuf::from("skynote.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("skynote").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("skynote").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });
    let mut file_cfg = config::Config::default();
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.frame_length == 2048 { cli.frame_length = cfg.detector.frame_length; }
            if cli.hop_length == 512 { cli.hop_length = cfg.detector.hop_length; }
            if cli.fmin == 65.0 { cli.fmin = cfg.detector.fmin; }
            if cli.fmax == 2000.0 { cli.fmax = cfg.detector.fmax; }
            if cli.min_confidence == 0.7 { cli.min_confidence = cfg.detector.min_confidence; }
            if cli.tolerance_cents == 100.0 { cli.tolerance_cents = cfg.quantizer.tolerance_cents; }
            if cli.min_note_ms == 30.0 { cli.min_note_ms = cfg.segmenter.min_note_ms; }
            if cli.chord_window_ms == 100.0 { cli.chord_window_ms = cfg.segmenter.chord_window_ms; }
            if cli.timeout_secs.is_none() {
                cli.timeout_secs = cfg.detector.budget_secs;
            }
            if cli.author.is_none() {
                cli.author = Some(cfg.sheet.author.clone());
            }
            file_cfg = cfg;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    let input = cli.input.as_deref().context("Input audio file or URL is required")?;
    let audio_source = AudioSource::parse(input);
    let resolved = source::resolve(&audio_source)?;

    log::info!("skynote - audio to Sky sheet-music converter");
    log::info!("Input: {}", resolved.path().display());
    log::info!("Output: {}", cli.output.display());

    let opts = ConvertOptions {
        audio: file_cfg.audio_config(),
        detector: DetectorConfig {
            frame_length: cli.frame_length,
            hop_length: cli.hop_length,
            fmin: cli.fmin,
            fmax: cli.fmax,
            min_confidence: cli.min_confidence,
            budget_secs: cli.timeout_secs,
            ..file_cfg.detector_config()
        },
        quantizer: QuantizerConfig {
            tolerance_cents: cli.tolerance_cents,
        },
        segmenter: SegmenterConfig {
            min_note_ms: cli.min_note_ms,
            chord_window_ms: cli.chord_window_ms,
            ..file_cfg.segmenter_config()
        },
        name: cli.title.clone(),
        author: cli.author.clone(),
        transcribed_by: Some(file_cfg.sheet.transcribed_by.clone()),
        bpm: None,
    };

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );
    let progress = BarProgress { bar };

    let cancel = CancelToken::new();
    let sheet = match pipeline::convert_path(resolved.path(), &opts, &cancel, &progress) {
        Ok(sheet) => sheet,
        Err(PipelineError::NoPitchedContent) => {
            progress.bar.finish_and_clear();
            anyhow::bail!(
                "No melody could be detected in this audio. Try a cleaner \
                 recording, or loosen --min-confidence / --tolerance-cents."
            );
        }
        Err(err) => {
            progress.bar.finish_and_clear();
            return Err(err.into());
        }
    };
    progress.bar.finish_with_message("Conversion complete");

    let json = sheet.to_json()?;
    std::fs::write(&cli.output, &json)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;

    log::info!("Done! Output: {} ({} notes)", cli.output.display(), sheet.note_count());
    Ok(())
}

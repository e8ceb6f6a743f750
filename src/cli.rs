use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "skynote", about = "Audio to Sky sheet-music JSON converter")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG, M4A) or a URL to download
    pub input: Option<String>,

    /// Output sheet file
    #[arg(short, long, default_value = "sheet.json")]
    pub output: PathBuf,

    /// Song title written into the sheet (defaults to the input file name)
    #[arg(long)]
    pub title: Option<String>,

    /// Sheet author credit
    #[arg(long)]
    pub author: Option<String>,

    /// Config file path (overrides skynote.toml discovery)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Abort pitch detection after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<f32>,

    /// Minimum voicing confidence (0.0-1.0) for a frame to count as pitched
    #[arg(long, default_value_t = 0.7)]
    pub min_confidence: f32,

    /// Notes starting within this window are grouped into one chord
    #[arg(long, default_value_t = 100.0)]
    pub chord_window_ms: f32,

    /// Drop detected notes shorter than this
    #[arg(long, default_value_t = 30.0)]
    pub min_note_ms: f32,

    /// Reject frames further than this from the nearest key (cents)
    #[arg(long, default_value_t = 100.0)]
    pub tolerance_cents: f32,

    /// Analysis frame length in samples
    #[arg(long, default_value_t = 2048)]
    pub frame_length: usize,

    /// Hop between analysis frames in samples
    #[arg(long, default_value_t = 512)]
    pub hop_length: usize,

    /// Lowest frequency the pitch detector searches (Hz)
    #[arg(long, default_value_t = 65.0)]
    pub fmin: f32,

    /// Highest frequency the pitch detector searches (Hz)
    #[arg(long, default_value_t = 2000.0)]
    pub fmax: f32,
}

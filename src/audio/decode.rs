use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::resample::{resample, ANALYSIS_SAMPLE_RATE};
use crate::error::PipelineError;

/// Loader settings. Everything downstream assumes audio at `sample_rate`,
/// so the loader owns the conversion to it.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioConfig {
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: ANALYSIS_SAMPLE_RATE,
        }
    }
}

/// Mono PCM audio at a known sample rate.
#[derive(Debug, Clone)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Decode an audio file into a mono waveform at the analysis rate.
pub fn load_path(path: &Path, cfg: &AudioConfig) -> Result<Waveform, PipelineError> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let waveform = decode_stream(mss, hint)?;
    resample(waveform, cfg.sample_rate)
}

/// Decode an in-memory byte stream, e.g. an upload body. `extension` is a
/// container hint like `"mp3"` when the caller knows one.
pub fn load_bytes(
    bytes: Vec<u8>,
    extension: Option<&str>,
    cfg: &AudioConfig,
) -> Result<Waveform, PipelineError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let waveform = decode_stream(mss, hint)?;
    resample(waveform, cfg.sample_rate)
}

/// Accept already-decoded mono PCM.
pub fn from_samples(
    samples: Vec<f32>,
    sample_rate: u32,
    cfg: &AudioConfig,
) -> Result<Waveform, PipelineError> {
    if samples.is_empty() {
        return Err(PipelineError::EmptyAudio);
    }
    resample(
        Waveform {
            samples,
            sample_rate,
        },
        cfg.sample_rate,
    )
}

fn decode_stream(mss: MediaSourceStream, hint: Hint) -> Result<Waveform, PipelineError> {
    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| PipelineError::UnsupportedFormat("no audio tracks found".into()))?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| PipelineError::UnsupportedFormat("unknown sample rate".into()))?;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // Skip corrupt packets; the rest of the stream is usable.
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let samples = sample_buf.samples();

        // Downmix to mono
        if channels == 1 {
            all_samples.extend_from_slice(samples);
        } else {
            for frame in samples.chunks(channels) {
                let mono: f32 = frame.iter().sum::<f32>() / channels as f32;
                all_samples.push(mono);
            }
        }
    }

    if all_samples.is_empty() {
        return Err(PipelineError::EmptyAudio);
    }

    log::info!(
        "Decoded {} samples at {} Hz ({:.1}s)",
        all_samples.len(),
        sample_rate,
        all_samples.len() as f32 / sample_rate as f32
    );

    Ok(Waveform {
        samples: all_samples,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
        let block_align = channels * 2;
        let data_len = (samples.len() * 2) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
        bytes.extend_from_slice(&block_align.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn decodes_a_minimal_wav() {
        let samples: Vec<i16> = vec![0, 8192, -8192, 16384, -16384, 0, 8192, 0];
        let bytes = wav_bytes(&samples, 22050, 1);
        let waveform = load_bytes(bytes, Some("wav"), &AudioConfig::default()).unwrap();
        assert_eq!(waveform.sample_rate, 22050);
        assert_eq!(waveform.samples.len(), samples.len());
        assert!(waveform.samples[0].abs() < 1e-4);
        assert!((waveform.samples[1] - 0.25).abs() < 1e-3);
        assert!((waveform.samples[2] + 0.25).abs() < 1e-3);
    }

    #[test]
    fn downmixes_stereo_by_averaging() {
        // 8 frames of L=1000, R=3000 at the analysis rate, so no resample.
        let mut interleaved = Vec::new();
        for _ in 0..8 {
            interleaved.push(1000i16);
            interleaved.push(3000i16);
        }
        let bytes = wav_bytes(&interleaved, 22050, 2);
        let waveform = load_bytes(bytes, Some("wav"), &AudioConfig::default()).unwrap();
        assert_eq!(waveform.samples.len(), 8);
        let expected = 2000.0 / 32768.0;
        for &s in &waveform.samples {
            assert!((s - expected).abs() < 1e-3);
        }
    }

    #[test]
    fn foreign_rates_come_out_at_the_analysis_rate() {
        let samples: Vec<i16> = (0..4410)
            .map(|i| {
                let t = i as f32 / 44100.0;
                (8000.0 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()) as i16
            })
            .collect();
        let bytes = wav_bytes(&samples, 44100, 1);
        let waveform = load_bytes(bytes, Some("wav"), &AudioConfig::default()).unwrap();
        assert_eq!(waveform.sample_rate, 22050);
        let expected = 2205.0;
        let actual = waveform.samples.len() as f32;
        assert!(
            (actual - expected).abs() / expected < 0.1,
            "got {actual} samples"
        );
    }

    #[test]
    fn rejects_unrecognizable_bytes() {
        let err = load_bytes(vec![0u8; 64], None, &AudioConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat(_)));
    }

    #[test]
    fn zero_sample_stream_is_empty_audio() {
        let bytes = wav_bytes(&[], 22050, 1);
        let err = load_bytes(bytes, Some("wav"), &AudioConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyAudio));
    }

    #[test]
    fn empty_pcm_input_is_empty_audio() {
        let err = from_samples(Vec::new(), 22050, &AudioConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyAudio));
    }

    #[test]
    fn pcm_input_passes_through_at_the_analysis_rate() {
        let samples = vec![0.25f32; 1024];
        let waveform = from_samples(samples.clone(), 22050, &AudioConfig::default()).unwrap();
        assert_eq!(waveform.samples, samples);
    }

    #[test]
    fn duration_follows_sample_count() {
        let waveform = Waveform {
            samples: vec![0.0; 44100],
            sample_rate: 22050,
        };
        assert!((waveform.duration_secs() - 2.0).abs() < 1e-6);
    }
}

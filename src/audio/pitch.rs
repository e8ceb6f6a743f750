use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::audio::decode::Waveform;
use crate::cancel::CancelToken;
use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Samples per analysis frame.
    pub frame_length: usize,
    /// Samples between consecutive frame starts.
    pub hop_length: usize,
    /// Lowest detectable fundamental, Hz.
    pub fmin: f32,
    /// Highest detectable fundamental, Hz.
    pub fmax: f32,
    /// Absolute threshold on the normalized difference for dip picking.
    pub yin_threshold: f32,
    /// Frames below this confidence are reported unvoiced.
    pub min_confidence: f32,
    /// Frames with RMS below this are skipped as silence.
    pub silence_rms: f32,
    /// Wall-clock budget for the whole detection pass.
    pub budget_secs: Option<f32>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            frame_length: 2048,
            hop_length: 512,
            fmin: 65.0,
            fmax: 2000.0,
            yin_threshold: 0.1,
            min_confidence: 0.7,
            silence_rms: 1e-3,
            budget_secs: None,
        }
    }
}

/// One frame of the pitch track. `frequency` is `None` for unvoiced
/// frames; `confidence` is reported either way.
#[derive(Debug, Clone, Copy)]
pub struct PitchEstimate {
    /// Frame start time in seconds.
    pub time: f32,
    pub frequency: Option<f32>,
    pub confidence: f32,
}

/// Run the detector over the whole waveform. Frames are independent, so
/// they run in parallel; cancellation and the time budget are checked per
/// frame. Audio shorter than one frame yields an empty track; zero frame
/// or hop lengths are rejected.
pub fn detect(
    waveform: &Waveform,
    cfg: &DetectorConfig,
    cancel: &CancelToken,
) -> Result<Vec<PitchEstimate>, PipelineError> {
    let samples = &waveform.samples;
    let sample_rate = waveform.sample_rate;

    if cfg.frame_length == 0 || cfg.hop_length == 0 {
        return Err(PipelineError::InvalidSettings(
            "frame_length and hop_length must be nonzero".into(),
        ));
    }
    if samples.len() < cfg.frame_length {
        return Ok(Vec::new());
    }
    let n_frames = (samples.len() - cfg.frame_length) / cfg.hop_length + 1;

    // Budgets that cannot form a deadline are treated as absent.
    let deadline = cfg.budget_secs.and_then(|secs| {
        let budget = Duration::try_from_secs_f32(secs).ok()?;
        Instant::now().checked_add(budget).map(|at| (at, secs))
    });

    log::info!("Detecting pitch over {} frames...", n_frames);

    let track: Vec<PitchEstimate> = (0..n_frames)
        .into_par_iter()
        .map(|index| {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            if let Some((deadline, budget_secs)) = deadline {
                if Instant::now() > deadline {
                    return Err(PipelineError::DetectionTimeout { budget_secs });
                }
            }

            let start = index * cfg.hop_length;
            let frame = &samples[start..start + cfg.frame_length];
            let time = start as f32 / sample_rate as f32;
            Ok(analyze_frame(frame, time, sample_rate, cfg))
        })
        .collect::<Result<_, _>>()?;

    let voiced = track.iter().filter(|e| e.frequency.is_some()).count();
    log::info!("Pitch track: {}/{} voiced frames", voiced, track.len());

    Ok(track)
}

/// Single-frame YIN: squared difference over a half-frame window, cumulative
/// mean normalization, absolute-threshold dip picking, parabolic refinement.
fn analyze_frame(frame: &[f32], time: f32, sample_rate: u32, cfg: &DetectorConfig) -> PitchEstimate {
    let unvoiced = PitchEstimate {
        time,
        frequency: None,
        confidence: 0.0,
    };

    // The normalized difference is amplitude-invariant, so gate on level
    // before anything else.
    let rms = (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt();
    if rms < cfg.silence_rms {
        return unvoiced;
    }

    let win = frame.len() / 2;
    let tau_min = ((sample_rate as f32 / cfg.fmax).floor() as usize).max(2);
    let tau_max = ((sample_rate as f32 / cfg.fmin).ceil() as usize).min(win.saturating_sub(1));
    if tau_min >= tau_max {
        return unvoiced;
    }

    let diff = difference(frame, win);
    let cmndf = cumulative_mean_normalize(&diff);

    let tau = pick_dip(&cmndf, tau_min, tau_max, cfg.yin_threshold);
    let confidence = (1.0 - cmndf[tau]).clamp(0.0, 1.0);
    let frequency = sample_rate as f32 / refine_tau(&cmndf, tau);

    let voiced =
        confidence >= cfg.min_confidence && frequency >= cfg.fmin && frequency <= cfg.fmax;

    PitchEstimate {
        time,
        frequency: voiced.then_some(frequency),
        confidence,
    }
}

/// Squared difference of the frame against itself shifted by each lag.
fn difference(frame: &[f32], win: usize) -> Vec<f32> {
    let mut diff = vec![0.0f32; win];
    for tau in 1..win {
        let mut sum = 0.0f32;
        for j in 0..win {
            let delta = frame[j] - frame[j + tau];
            sum += delta * delta;
        }
        diff[tau] = sum;
    }
    diff
}

/// Cumulative mean normalized difference. Lag 0 is defined as 1, and an
/// all-zero frame normalizes to 1 everywhere so nothing downstream sees a
/// spurious dip.
fn cumulative_mean_normalize(diff: &[f32]) -> Vec<f32> {
    let mut out = vec![1.0f32; diff.len()];
    let mut running = 0.0f32;
    for tau in 1..diff.len() {
        running += diff[tau];
        out[tau] = if running > 0.0 {
            diff[tau] * tau as f32 / running
        } else {
            1.0
        };
    }
    out
}

/// First lag whose normalized difference drops under the threshold, walked
/// down to the bottom of its dip. With no dip under the threshold the
/// global minimum is returned instead; the confidence gate usually rejects
/// that frame.
fn pick_dip(cmndf: &[f32], tau_min: usize, tau_max: usize, threshold: f32) -> usize {
    let mut tau = tau_min;
    while tau < tau_max {
        if cmndf[tau] < threshold {
            while tau + 1 < tau_max && cmndf[tau + 1] < cmndf[tau] {
                tau += 1;
            }
            return tau;
        }
        tau += 1;
    }

    let mut best = tau_min;
    for t in tau_min..tau_max {
        if cmndf[t] < cmndf[best] {
            best = t;
        }
    }
    best
}

/// Parabolic interpolation of the dip position from its neighbors.
fn refine_tau(cmndf: &[f32], tau: usize) -> f32 {
    if tau == 0 || tau + 1 >= cmndf.len() {
        return tau as f32;
    }
    let left = cmndf[tau - 1];
    let center = cmndf[tau];
    let right = cmndf[tau + 1];
    let denom = left - 2.0 * center + right;
    if denom.abs() < 1e-12 {
        return tau as f32;
    }
    let shift = 0.5 * (left - right) / denom;
    tau as f32 + shift.clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, secs: f32, amplitude: f32) -> Waveform {
        let n = (sample_rate as f32 * secs) as usize;
        let samples = (0..n)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                amplitude * (2.0 * std::f32::consts::PI * freq * t).sin()
            })
            .collect();
        Waveform {
            samples,
            sample_rate,
        }
    }

    #[test]
    fn tracks_a_clean_sine() {
        let waveform = sine(440.0, 22050, 1.0, 0.5);
        let track = detect(&waveform, &DetectorConfig::default(), &CancelToken::new()).unwrap();
        assert_eq!(track.len(), (22050 - 2048) / 512 + 1);

        let voiced: Vec<f32> = track.iter().filter_map(|e| e.frequency).collect();
        assert!(voiced.len() > track.len() * 3 / 4);
        for freq in &voiced {
            assert!((freq - 440.0).abs() < 5.0, "estimated {freq} Hz");
        }
    }

    #[test]
    fn silence_is_unvoiced() {
        let waveform = Waveform {
            samples: vec![0.0; 4410],
            sample_rate: 22050,
        };
        let track = detect(&waveform, &DetectorConfig::default(), &CancelToken::new()).unwrap();
        assert!(!track.is_empty());
        for estimate in &track {
            assert_eq!(estimate.frequency, None);
            assert_eq!(estimate.confidence, 0.0);
        }
    }

    #[test]
    fn noise_is_mostly_unvoiced() {
        // Deterministic LCG noise, amplitude well above the silence gate.
        let mut state = 0x2545f4914f6cdd1du64;
        let samples: Vec<f32> = (0..22050)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let unit = (state >> 40) as f32 / (1u64 << 24) as f32;
                (unit - 0.5) * 0.6
            })
            .collect();
        let waveform = Waveform {
            samples,
            sample_rate: 22050,
        };
        let track = detect(&waveform, &DetectorConfig::default(), &CancelToken::new()).unwrap();
        let unvoiced = track.iter().filter(|e| e.frequency.is_none()).count();
        assert!(unvoiced * 2 > track.len());
    }

    #[test]
    fn short_input_yields_an_empty_track() {
        let waveform = Waveform {
            samples: vec![0.1; 1000],
            sample_rate: 22050,
        };
        let track = detect(&waveform, &DetectorConfig::default(), &CancelToken::new()).unwrap();
        assert!(track.is_empty());
    }

    #[test]
    fn timestamps_advance_by_the_hop() {
        let waveform = sine(330.0, 22050, 0.5, 0.5);
        let cfg = DetectorConfig::default();
        let track = detect(&waveform, &cfg, &CancelToken::new()).unwrap();
        let hop_secs = cfg.hop_length as f32 / 22050.0;
        for (i, estimate) in track.iter().enumerate() {
            assert!((estimate.time - i as f32 * hop_secs).abs() < 1e-5);
        }
    }

    #[test]
    fn cancelled_token_aborts_detection() {
        let waveform = sine(440.0, 22050, 1.0, 0.5);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = detect(&waveform, &DetectorConfig::default(), &cancel).unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }

    #[test]
    fn zero_budget_times_out() {
        let waveform = sine(440.0, 22050, 2.0, 0.5);
        let cfg = DetectorConfig {
            budget_secs: Some(0.0),
            ..DetectorConfig::default()
        };
        let err = detect(&waveform, &cfg, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, PipelineError::DetectionTimeout { .. }));
    }

    #[test]
    fn unusable_budgets_are_ignored() {
        // Values that cannot form a deadline behave like no budget at all.
        let waveform = sine(440.0, 22050, 0.5, 0.5);
        for bad in [-1.0, f32::NAN, f32::INFINITY] {
            let cfg = DetectorConfig {
                budget_secs: Some(bad),
                ..DetectorConfig::default()
            };
            let track = detect(&waveform, &cfg, &CancelToken::new()).unwrap();
            assert!(!track.is_empty());
        }
    }

    #[test]
    fn degenerate_frame_settings_are_rejected() {
        let waveform = sine(440.0, 22050, 0.5, 0.5);
        let zero_hop = DetectorConfig {
            hop_length: 0,
            ..DetectorConfig::default()
        };
        let zero_frame = DetectorConfig {
            frame_length: 0,
            ..DetectorConfig::default()
        };
        for cfg in [zero_hop, zero_frame] {
            let err = detect(&waveform, &cfg, &CancelToken::new()).unwrap_err();
            assert!(matches!(err, PipelineError::InvalidSettings(_)));
        }
    }

    #[test]
    fn quiet_tone_below_the_gate_is_skipped() {
        let waveform = sine(440.0, 22050, 0.5, 5e-4);
        let track = detect(&waveform, &DetectorConfig::default(), &CancelToken::new()).unwrap();
        for estimate in &track {
            assert_eq!(estimate.frequency, None);
        }
    }
}

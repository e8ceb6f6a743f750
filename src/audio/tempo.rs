use rustfft::{num_complex::Complex, FftPlanner};

use crate::audio::decode::Waveform;

const FFT_SIZE: usize = 2048;
const HOP_SIZE: usize = 1024;

pub const DEFAULT_BPM: f32 = 120.0;

/// Estimate tempo in beats per minute from spectral-flux onsets. Anything
/// unusable falls back to [`DEFAULT_BPM`]; this only seeds the sheet header.
pub fn estimate_bpm(waveform: &Waveform) -> f32 {
    let onsets = onset_times(&waveform.samples, waveform.sample_rate);
    let bpm = tempo_from_onsets(&onsets);
    log::info!("Tempo estimate: {:.1} BPM from {} onsets", bpm, onsets.len());
    bpm
}

fn onset_times(samples: &[f32], sample_rate: u32) -> Vec<f32> {
    if samples.len() < FFT_SIZE {
        return Vec::new();
    }

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FFT_SIZE);
    let hann = hann_window(FFT_SIZE);

    let mut prev_magnitudes = vec![0.0f32; FFT_SIZE / 2];
    let mut flux_values: Vec<(f32, f32)> = Vec::new(); // (time, flux)

    let mut pos = 0;
    while pos + FFT_SIZE <= samples.len() {
        let mut buffer: Vec<Complex<f32>> = samples[pos..pos + FFT_SIZE]
            .iter()
            .enumerate()
            .map(|(i, &s)| Complex::new(s * hann[i], 0.0))
            .collect();
        fft.process(&mut buffer);

        let magnitudes: Vec<f32> = buffer[..FFT_SIZE / 2].iter().map(|c| c.norm()).collect();

        let flux: f32 = magnitudes
            .iter()
            .zip(prev_magnitudes.iter())
            .map(|(cur, prev)| (cur - prev).max(0.0))
            .sum();

        flux_values.push((pos as f32 / sample_rate as f32, flux));
        prev_magnitudes = magnitudes;
        pos += HOP_SIZE;
    }

    pick_onsets(&flux_values)
}

/// Flux peaks that clear a local adaptive threshold, at least 100ms apart.
fn pick_onsets(flux_values: &[(f32, f32)]) -> Vec<f32> {
    if flux_values.is_empty() {
        return Vec::new();
    }

    let window = 20;
    let mut onsets = Vec::new();

    for i in 0..flux_values.len() {
        let start = i.saturating_sub(window);
        let end = (i + window + 1).min(flux_values.len());
        let local_mean: f32 =
            flux_values[start..end].iter().map(|(_, f)| f).sum::<f32>() / (end - start) as f32;

        let threshold = local_mean * 1.5 + 0.01;

        if flux_values[i].1 > threshold {
            let is_peak = (i == 0 || flux_values[i].1 >= flux_values[i - 1].1)
                && (i == flux_values.len() - 1 || flux_values[i].1 >= flux_values[i + 1].1);

            let far_enough = onsets
                .last()
                .map_or(true, |&last: &f32| flux_values[i].0 - last > 0.1);

            if is_peak && far_enough {
                onsets.push(flux_values[i].0);
            }
        }
    }

    onsets
}

fn tempo_from_onsets(onsets: &[f32]) -> f32 {
    if onsets.len() < 2 {
        return DEFAULT_BPM;
    }

    let intervals: Vec<f32> = onsets.windows(2).map(|w| w[1] - w[0]).collect();

    // 60-200 BPM corresponds to 0.3-1.0s between beats.
    let reasonable: Vec<f32> = intervals
        .iter()
        .copied()
        .filter(|&i| (0.3..=1.0).contains(&i))
        .collect();

    if reasonable.is_empty() {
        return DEFAULT_BPM;
    }

    let median_interval = {
        let mut sorted = reasonable;
        sorted.sort_by(|a, b| a.total_cmp(b));
        sorted[sorted.len() / 2]
    };

    60.0 / median_interval
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click_track(interval_secs: f32, total_secs: f32, sample_rate: u32) -> Waveform {
        let n = (sample_rate as f32 * total_secs) as usize;
        let mut samples = vec![0.0f32; n];
        let step = (sample_rate as f32 * interval_secs) as usize;
        let mut pos = 0;
        while pos + 64 < n {
            for i in 0..64 {
                samples[pos + i] = 0.9 * (1.0 - i as f32 / 64.0);
            }
            pos += step;
        }
        Waveform {
            samples,
            sample_rate,
        }
    }

    #[test]
    fn short_input_falls_back_to_default() {
        let waveform = Waveform {
            samples: vec![0.0; 512],
            sample_rate: 22050,
        };
        assert_eq!(estimate_bpm(&waveform), DEFAULT_BPM);
    }

    #[test]
    fn steady_clicks_land_near_their_tempo() {
        // Two clicks per second, so 120 BPM up to hop quantization.
        let waveform = click_track(0.5, 8.0, 22050);
        let bpm = estimate_bpm(&waveform);
        assert!((100.0..140.0).contains(&bpm), "estimated {bpm} BPM");
    }

    #[test]
    fn too_fast_onsets_fall_back_to_default() {
        // 120ms intervals sit below the plausible beat range even after
        // the refractory gap merges neighbouring onsets.
        let waveform = click_track(0.12, 4.0, 22050);
        assert_eq!(estimate_bpm(&waveform), DEFAULT_BPM);
    }

    #[test]
    fn silence_has_no_onsets() {
        let waveform = Waveform {
            samples: vec![0.0; 22050 * 4],
            sample_rate: 22050,
        };
        assert_eq!(estimate_bpm(&waveform), DEFAULT_BPM);
    }
}

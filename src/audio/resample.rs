use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::audio::decode::Waveform;
use crate::error::PipelineError;

/// Sample rate every later stage runs at.
pub const ANALYSIS_SAMPLE_RATE: u32 = 22050;

/// Resample mono audio to `target_rate`. Input already at the target rate
/// is passed through untouched.
pub fn resample(waveform: Waveform, target_rate: u32) -> Result<Waveform, PipelineError> {
    if waveform.sample_rate == target_rate {
        return Ok(waveform);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target_rate as f64 / waveform.sample_rate as f64;
    let source_rate = waveform.sample_rate;

    let mut resampler = SincFixedIn::<f32>::new(
        ratio,
        2.0, // max relative ratio
        params,
        waveform.samples.len(),
        1, // mono
    )
    .map_err(|e| PipelineError::Resample(e.to_string()))?;

    let input = vec![waveform.samples];
    let output = resampler
        .process(&input, None)
        .map_err(|e| PipelineError::Resample(e.to_string()))?;

    let samples = output.into_iter().next().unwrap_or_default();

    log::debug!(
        "Resampled {} Hz -> {} Hz ({} samples)",
        source_rate,
        target_rate,
        samples.len()
    );

    Ok(Waveform {
        samples,
        sample_rate: target_rate,
    })
}

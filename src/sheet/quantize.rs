use crate::audio::pitch::PitchEstimate;
use crate::sheet::keyboard::{nearest_key, Key};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizerConfig {
    /// Largest distance from a key center, in cents, still mapped onto that
    /// key. The default of 100 (one half step) means any detected frequency
    /// lands on some key unless it falls outside the table's range.
    pub tolerance_cents: f32,
}

impl Default for QuantizerConfig {
    fn default() -> Self {
        Self {
            tolerance_cents: 100.0,
        }
    }
}

/// One analysis frame after quantization. `key` is `None` for unvoiced
/// frames and for frequencies beyond the tolerance of every key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizedFrame {
    pub time: f32,
    pub key: Option<Key>,
}

/// Quantize a pitch track frame by frame. The output is aligned with the
/// input so downstream run merging can reason about frame gaps.
pub fn quantize(track: &[PitchEstimate], cfg: &QuantizerConfig) -> Vec<QuantizedFrame> {
    track
        .iter()
        .map(|frame| {
            let key = frame
                .frequency
                .filter(|freq| freq.is_finite() && *freq > 0.0)
                .and_then(|freq| {
                    let (key, cents) = nearest_key(freq);
                    (cents <= cfg.tolerance_cents).then_some(key)
                });
            QuantizedFrame {
                time: frame.time,
                key,
            }
        })
        .collect()
}

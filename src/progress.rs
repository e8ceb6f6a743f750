use std::fmt;

/// The five pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    DetectPitch,
    Quantize,
    Segment,
    Encode,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::DetectPitch => "detect-pitch",
            Stage::Quantize => "quantize",
            Stage::Segment => "segment",
            Stage::Encode => "encode",
        }
    }

    /// Cumulative percent complete once this stage has finished, weighted
    /// by relative stage cost.
    pub fn percent_complete(self) -> u8 {
        match self {
            Stage::Load => 10,
            Stage::DetectPitch => 45,
            Stage::Quantize => 60,
            Stage::Segment => 85,
            Stage::Encode => 100,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Observer for stage completion events.
pub trait ProgressSink {
    /// Called once per stage, immediately after it completes.
    /// `detail` is a human-readable summary of what the stage produced.
    fn stage_complete(&self, stage: Stage, percent: u8, detail: &str);
}

/// Sink that discards all events.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn stage_complete(&self, _stage: Stage, _percent: u8, _detail: &str) {}
}

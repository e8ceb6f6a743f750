pub mod decode;
pub mod pitch;
pub mod resample;
pub mod tempo;

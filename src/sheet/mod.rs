pub mod encode;
pub mod keyboard;
pub mod quantize;
pub mod segment;

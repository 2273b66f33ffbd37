mod biquad;
mod gain;

pub use biquad::*;
pub use gain::*;

// src/processing/mod.rs
//! Signal conditioning, windowing and feature extraction.

pub mod conditioning;
pub mod features;
pub mod spectral;
pub mod window;

pub use conditioning::*;
pub use features::*;
pub use spectral::*;
pub use window::*;

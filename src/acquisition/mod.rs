// src/acquisition/mod.rs
//! Signal acquisition: block buffering and the signal source boundary.

pub mod exchange;
pub mod source;

pub use exchange::*;
pub use source::*;

//! Shared utilities: clocks for timestamping and front-end unit conversion.

pub mod conversion;
pub mod time;

pub use conversion::{counts_to_volts, volts_to_counts};
pub use time::{
    current_timestamp_micros, current_timestamp_nanos, MockTimeProvider, SystemTimeProvider,
    TimeProvider,
};

//! Sample storage shared between ingestion and frame assembly.
pub mod sample_buffer;

pub use sample_buffer::{ReceivedSample, SampleBuffer, DEFAULT_HISTORY_CAPACITY};

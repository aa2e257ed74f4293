//! Text shaping: display/speech massaging and sentence segmentation.

pub mod massage;
pub mod segment;

pub use segment::{segment_full_message, split_into_sentences, StreamSegmenter};

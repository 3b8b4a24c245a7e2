//! Conversion between internal types and wire formats

pub mod openai;

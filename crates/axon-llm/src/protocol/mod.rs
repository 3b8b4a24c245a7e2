//! Wire format types for external API protocols

pub mod openai;

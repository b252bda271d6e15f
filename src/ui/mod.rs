//! Message formatting.

pub mod embeds;

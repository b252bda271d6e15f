//! # Audio Module
//!
//! Voice playback for the bot.
//!
//! ### [`player`] - Guild playback state
//! - One FIFO queue, one current entry and one skip-vote set per guild
//! - A single consumption loop per guild pulls the next entry when the
//!   previous one completes
//!
//! ### [`queue`] - Queue entries
//! - [`queue::QueueItem`]: who asked for what, and where
//!
//! ### [`backend`] - Voice driver seam
//! - [`backend::VoiceBackend`] and [`backend::TrackControl`], implemented on
//!   top of songbird
//!
//! ### [`registry`] - Guild registry
//! - Create-on-first-use, explicit teardown

pub mod backend;
pub mod player;
pub mod queue;
pub mod registry;

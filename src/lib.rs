// src/lib.rs
//
// pchannel — a persistent, bounded, in-process message channel.
//
// cargo test

pub mod alpha_sequence;
pub mod config;
pub mod disk_log;
pub mod engine;
pub mod error;
pub mod hot_window;

pub use alpha_sequence::AlphaSequence;
pub use config::{PChannelConfig, DEFAULT_ID_LEN};
pub use engine::{Engine, PMessage};
pub use error::PChannelError;

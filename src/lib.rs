//! slot_player: core library for the scheduled radio player.
//!
//! Schedule handling, the playback state machine and the audio engine
//! boundary live here. The CLI drives it once per frame.

pub mod app;
pub mod config;
pub mod console;
pub mod control_panel;
pub mod engine;
pub mod error;
pub mod logger;
pub mod memory_engine;
pub mod player_widget;
pub mod random_list;
pub mod rodio_engine;
pub mod schedule;
pub mod session;

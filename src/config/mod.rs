//! Configuration management
//!
//! `Settings` holds the server address, poll cadence and editor window size.

pub mod settings;

pub use settings::Settings;

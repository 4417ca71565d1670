pub mod audio_models;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod format;
pub mod state;

pub mod app;
pub mod artwork;
pub mod audio;
pub mod config;
pub mod core;
#[cfg(test)]
mod fixtures;
pub mod library;
pub mod model;
pub mod player;
pub mod queue;
pub mod ui;

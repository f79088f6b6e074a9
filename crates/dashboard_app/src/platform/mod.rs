//! Console front-end: settings, logging, command input and text rendering.
mod app;
mod commands;
mod effects;
mod logging;
mod render;
mod settings;

pub use app::run_app;

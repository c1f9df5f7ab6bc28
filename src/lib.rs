pub mod app;
pub mod config;
pub mod error;
pub mod model;
pub mod sync;
pub mod tasks;
pub mod theme;
pub mod ui;

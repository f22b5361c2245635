pub mod app;
pub mod art;
pub mod audio;
pub mod color;
pub mod config;
pub mod core;
pub mod library;
pub mod model;
pub mod sleep;
pub mod theme;
pub mod ui;
pub mod worker;

pub mod book;
pub mod cli;
pub mod config;
pub mod encoding;
pub mod export;
pub mod logging;
pub mod models;
pub mod pagination;
pub mod settings;
pub mod state;
pub mod ui;

pub mod app;
pub mod cli;
pub mod config;
pub mod identity;
pub mod links;
pub mod preview;
pub mod profile;
pub mod storage;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};

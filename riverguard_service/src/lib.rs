pub mod alert;
pub mod commands;
pub mod config;
pub mod dev_mode;
pub mod history;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod monitor;
pub mod render;
pub mod verify;

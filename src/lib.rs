pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod conversion;
pub mod db;
pub mod global;
pub mod pipeline;
pub mod relay;
pub mod upload;
pub mod watcher;

pub mod auth;
pub mod build;
pub mod config;
pub mod item_parser;
pub mod item_source;
pub mod item_sync;

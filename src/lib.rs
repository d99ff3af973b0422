// LAN game content server: catalog scanning, token lookup and file serving.

pub mod api;
pub mod catalog;
pub mod config;
pub mod metrics;
pub mod stream;
pub mod token;

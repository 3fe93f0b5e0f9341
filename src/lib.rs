pub mod api;
pub mod config;
pub mod models;
pub mod storage;

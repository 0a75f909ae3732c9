pub mod app;
pub mod auth;
pub mod common;
pub mod config;
pub mod images;
pub mod state;
pub mod storage;

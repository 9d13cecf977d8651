//! Vehicle position tracking service
//!
//! Stores the latest reported position of every vehicle and pushes each
//! accepted report to connected viewers.

pub mod api;
pub mod config;
pub mod database;
pub mod errors;
pub mod hub;
pub mod models;
pub mod service;

//! Folio library
//!
//! PDF library service plus the annotation viewer engine. Exposed as a
//! library for the server binary and for testing.

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod http;
pub mod render;
pub mod services;
pub mod storage;
pub mod viewer;

//! Library crate for karaoke-back, exposing modules for binaries and integration tests.

pub mod client;
pub mod config;
pub mod dao;
mod dto;
mod error;
pub mod routes;
pub mod services;
pub mod state;

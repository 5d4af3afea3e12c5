//! File Portal relay server
//!
//! Pairs one HTTP upload with one HTTP download under a shared identifier
//! and streams the bytes straight through; nothing is written to disk.

pub mod args;
pub mod connection;
pub mod constants;
mod handlers;
pub mod relay;
pub mod server;

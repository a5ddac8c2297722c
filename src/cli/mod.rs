//! Server binary entry point
//!
//! Only available with the `cli` feature.

#[path = "main.rs"]
mod main_impl;

pub use main_impl::{main, Cli};

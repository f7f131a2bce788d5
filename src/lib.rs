#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod config;
pub mod data;
pub mod farcaster;
pub mod focus;
pub mod format;
pub mod history;
pub mod hub;
pub mod logging;
pub mod nav;
pub mod storage;
pub mod target;
pub mod thread;
pub mod ui;
pub mod viewport;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{run, RunOptions};

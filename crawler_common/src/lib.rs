//! Crawler Common Library
//!
//! Shared types, constants and configuration loading for all crawler
//! workspace crates.
//!
//! # Module Structure
//!
//! - [`frame`] - Control frame and control source types
//! - [`config`] - TOML configuration loading and validation
//! - [`consts`] - System-wide constants (tick periods, priorities, defaults)
//! - [`prelude`] - Common re-exports for convenience

pub mod config;
pub mod consts;
pub mod frame;
pub mod prelude;

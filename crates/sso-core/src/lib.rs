//! # sso-core
//!
//! Configuration, error handling and logging setup shared by the SAML SSO
//! gateway crates.
//!
//! This crate holds the process-level pieces that every other crate in the
//! workspace depends on: the [`SsoConfig`] loaded at startup, the common
//! [`Error`] type and the tracing subscriber bootstrap.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::SsoConfig;
pub use error::{Error, Result};

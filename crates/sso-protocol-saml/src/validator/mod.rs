//! Inbound AuthnRequest validation.
//!
//! [`SpInitValidator`] turns a decoded request and the resolved SP
//! configuration into a [`ValidationOutcome`].

mod config;
mod outcome;
mod sp_init;

pub use config::*;
pub use outcome::*;
pub use sp_init::*;

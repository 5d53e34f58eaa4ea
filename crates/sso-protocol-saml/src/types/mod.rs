//! SAML 2.0 types and data structures.
//!
//! This module contains the typed protocol model for inbound authentication
//! requests and the status-only responses sent back when a request fails.

mod authn_request;
mod constants;
mod name_id;
mod response;
mod status;

pub use authn_request::*;
pub use constants::*;
pub use name_id::*;
pub use response::*;
pub use status::*;

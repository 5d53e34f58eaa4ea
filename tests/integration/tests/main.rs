//! End-to-end integration tests.
//!
//! These tests drive the SAML inbound SSO core the way a gateway would:
//! encode a request as a service provider, then decode, verify and
//! validate it as the identity provider.

mod common;
mod bindings;
mod concurrency;
mod signatures;
mod validation;

//! Credential handling
//!
//! Supports: API Key (header or query), Basic, Bearer, Custom Headers
//!
//! A [`Credential`] is applied to every outgoing request before it reaches
//! the transport, so retries and paced attempts all carry it.

mod credential;

pub use credential::{Credential, Location};
pub(crate) use credential::{header_name_of, header_value_of};

//! # parlor-core
//!
//! Foundation utilities shared by the parlor crates:
//!
//! - **Logging**: [`logging::init_subscriber`] bootstraps the `tracing`
//!   subscriber once at startup.
//! - **Phone numbers**: [`phone::normalize_digits`] reduces operator-entered
//!   recipients to the digit string the messaging layer validates against.
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other parlor crates.

#![deny(unsafe_code)]

pub mod logging;
pub mod phone;

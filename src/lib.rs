//! stencil library crate.
//!
//! The primary interface is the `stencil` binary. The library exposes the
//! build pipeline and each of its stages so that integration tests and other
//! tools can drive them directly: [`staging`] → [`hooks`] → [`transform`] →
//! [`diff`] → [`apply`], wired together by [`pipeline`].

pub mod apply;
pub mod config;
pub mod diff;
pub mod discover;
pub mod error;
pub mod format;
pub mod hooks;
pub mod pipeline;
pub mod staging;
pub mod telemetry;
pub mod transform;

pub use error::StencilError;

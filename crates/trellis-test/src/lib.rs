//! Trellis Test - Shared test utilities for the Trellis module runtime.
//!
//! This crate provides in-memory capabilities, a recording API publisher and
//! module fixtures that lay out module and adapter sources the way discovery
//! expects them. Use it as a dev-dependency.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! trellis-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use trellis_test::{ModuleFixture, fake_capabilities, sources};
//!
//! let sources = sources([
//!     ModuleFixture::new("personas"),
//!     ModuleFixture::new("threads").capability("jsonFile").depends_on("personas"),
//! ]);
//! let capabilities = fake_capabilities();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;

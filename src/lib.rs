#![forbid(unsafe_code)]

pub mod bootstrap;
pub mod config;
pub mod datamodel;
pub mod error;
pub mod identity;
pub mod sampler;
pub mod store;
pub mod watch;

pub use error::{Error, Result};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

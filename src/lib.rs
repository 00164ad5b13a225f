#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod config;
pub use config::*;

mod error;
pub use error::*;

mod engines;
pub use engines::{engine_for, RateEngine};

mod sync_bucket;
pub use sync_bucket::*;

#[cfg(feature = "async")]
mod async_bucket;
#[cfg(feature = "async")]
pub use async_bucket::*;

#[cfg(test)]
mod tests;

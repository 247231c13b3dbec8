//! Kube Nukem
//!
//! Removes CustomResourceDefinitions and forcibly clears custom resources
//! of their kind that are stuck on finalizers nobody will ever process.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod error;
pub mod nuker;
pub mod resource;

pub use error::{Error, Result};

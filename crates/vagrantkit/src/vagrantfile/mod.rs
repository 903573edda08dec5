//! Vagrantfile generation.
//!
//! This module renders a [`Config`](crate::Config) as Ruby source.

pub mod ruby;
pub mod writer;

pub use writer::{write_file, write_string, WriteOptions};

//! Package format implementations.
//!
//! This module contains format-specific implementations of the
//! [`PackageFormat`](crate::harvest::PackageFormat) trait:
//! - `tarball` - gzip-compressed tar archives with a JSON manifest

pub mod tarball;

pub use tarball::TarballFormat;

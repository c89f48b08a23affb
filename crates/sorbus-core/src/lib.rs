//! Core types for the sorbus D-Bus library.
//!
//! This is split into a separate crate so the derive macros can share the
//! signature machinery with the library proper.

#![allow(clippy::module_inception)]

#[macro_use]
mod macros;

#[doc(hidden)]
pub mod signature;

#[doc(hidden)]
pub mod proto;

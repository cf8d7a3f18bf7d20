//! # arch-fit-ts
//!
//! Tree-sitter based semantic model providers for languages without a
//! native Rust parser.
//!
//! - [`KotlinProvider`] for `.kt` and `.kts` files
//!
//! Tree-sitter models are partial: imports, declarations, methods,
//! annotations and calls are extracted; mutations and control flow are not.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod kotlin;

pub use kotlin::KotlinProvider;

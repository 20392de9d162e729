#![forbid(unsafe_code)]
//! exrun: run the top-level functions of a JavaScript exercise file
//!
//! A run is a fixed pipeline:
//!
//! 1. `frontend::patcher` exports every top-level function and class and
//!    rewrites relative `readFile` paths, writing the result next to the source.
//! 2. `host::loader` evaluates the patched module in an embedded engine and
//!    collects its exports in source order.
//! 3. `cli::executor` invokes the selected functions and reports results.
//! 4. The patched file is removed.
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod cli;
pub mod frontend;
pub mod host;

pub use frontend::patcher::{PatchedSource, Patcher, patch_file};
pub use host::{ExportMap, LoadedModule, load};

//! JavaScript host
//!
//! Embeds the boa engine as the module loading facility for patched sources.
//!
//! ## Modules
//!
//! - `loader` - Module loading, export map construction, invocation
//! - `fs` - Built-in `fs` / `fs/promises` modules available to loaded code

pub mod fs;
pub mod loader;

pub use loader::{Export, ExportMap, LoadError, LoadedModule, load};

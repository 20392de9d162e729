//! Source-level frontend
//!
//! - `lexer`: just enough JavaScript tokenization to find top-level statements
//! - `patcher`: export insertion and read-path rewriting
//! - `artifact`: the temporary patched file on disk

pub mod artifact;
pub mod lexer;
pub mod patcher;

//! In-process backends for single-node dev runs and tests.

mod revocation_store_memory;
mod user_repo_memory;

pub use revocation_store_memory::*;
pub use user_repo_memory::*;

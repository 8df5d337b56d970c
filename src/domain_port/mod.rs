// store

mod revocation_store;

pub use revocation_store::*;

// repo

mod user_repo;

pub use user_repo::*;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate key")]
    Duplicate,
    #[error("store error: {0}")]
    Backend(String),
}

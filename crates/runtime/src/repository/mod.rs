//! Repository layer for dynamic item data
//!
//! Repositories persist what CHANGES during play: the contents of each store,
//! captured as [`StoreSnapshot`]s.
//!
//! Static content (item definitions) is handled by the oracle, not repositories.

mod error;
mod file;
mod memory;
mod snapshot;
mod traits;

pub use error::{RepositoryError, Result};
pub use file::FileStoreRepository;
pub use memory::InMemoryStoreRepository;
pub use snapshot::StoreSnapshot;
pub use traits::StoreRepository;

pub mod memory;
pub mod repo;
pub mod repo_types;

pub use memory::MemoryUserStore;
pub use repo::{PgUserStore, StoreError, UserStore};
pub use repo_types::{User, UserDraft};

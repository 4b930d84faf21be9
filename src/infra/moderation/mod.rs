mod json_block_store;
mod sqlite_warning_store;

pub use json_block_store::JsonBlockStore;
pub use sqlite_warning_store::SqliteWarningStore;

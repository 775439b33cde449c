pub mod api;
pub mod error;
pub mod models;
pub mod store;

pub use error::{Error, Result};
pub use store::{RecordStore, StorageConfig};

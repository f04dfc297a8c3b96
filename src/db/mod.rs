pub mod entities;
pub mod services;
pub mod store;

pub use store::{SiteStore, StoreError, CHECK_INTERVAL_KEY};

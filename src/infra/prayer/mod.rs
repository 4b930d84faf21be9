mod aladhan_client;
mod json_store;

pub use aladhan_client::AladhanClient;
pub use json_store::JsonPrayerConfigStore;

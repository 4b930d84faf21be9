// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

pub mod json_file;
pub mod sqlite;

#[path = "settings/json_store.rs"]
pub mod settings;

#[path = "responsibility/json_store.rs"]
pub mod responsibility;

#[path = "points/sqlite_store.rs"]
pub mod points;

#[path = "down/json_store.rs"]
pub mod down;

#[path = "vacation/json_store.rs"]
pub mod vacation;

#[path = "promotion/json_store.rs"]
pub mod promotion;

#[path = "streak/sqlite_store.rs"]
pub mod streak;

#[path = "prayer/mod.rs"]
pub mod prayer;

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "notifications/json_store.rs"]
pub mod notifications;

#[path = "colors/json_store.rs"]
pub mod colors;

#[path = "rooms/json_store.rs"]
pub mod rooms;

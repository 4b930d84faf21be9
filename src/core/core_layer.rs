// The core module contains all business logic.
// Each feature gets its own submodule; none of them know about Discord.

pub mod durations;

#[path = "settings/settings_service.rs"]
pub mod settings;

#[path = "responsibility/responsibility_service.rs"]
pub mod responsibility;

#[path = "points/points_service.rs"]
pub mod points;

#[path = "down/down_service.rs"]
pub mod down;

#[path = "vacation/vacation_service.rs"]
pub mod vacation;

#[path = "promotion/promotion_service.rs"]
pub mod promotion;

#[path = "streak/mod.rs"]
pub mod streak;

#[path = "prayer/mod.rs"]
pub mod prayer;

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "notifications/notification_service.rs"]
pub mod notifications;

#[path = "colors/color_service.rs"]
pub mod colors;

#[path = "rooms/room_service.rs"]
pub mod rooms;

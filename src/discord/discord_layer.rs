// Discord layer - commands, event handlers and background tasks.
// Everything that touches serenity/poise lives here; the core never does.

pub mod audit;
pub mod data;
pub mod roles;

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "events/event_router.rs"]
pub mod events;

#[path = "interactions/component_router.rs"]
pub mod interactions;

#[path = "tasks/task_runner.rs"]
pub mod tasks;

pub use data::{Context, Data, Error};

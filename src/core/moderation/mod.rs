// Core moderation module - block list and warnings.

pub mod block_service;
pub mod moderation_models;
pub mod warning_service;

pub use block_service::{BlockService, BlockStore};
pub use moderation_models::*;
pub use warning_service::{WarningService, WarningStore};

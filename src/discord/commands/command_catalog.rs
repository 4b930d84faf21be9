// Discord commands module.
// Each feature gets its own command file.

pub mod check;
pub mod colors;
pub mod down;
pub mod help;
pub mod moderation;
pub mod notifications;
pub mod points;
pub mod prayer;
pub mod presence;
pub mod promotion;
pub mod responsibility;
pub mod rooms;
pub mod settings;
pub mod streak;
pub mod vacation;

use crate::discord::{Data, Error};

/// Every slash command the bot registers.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        help::help(),
        check::check(),
        settings::settings(),
        responsibility::responsibility(),
        responsibility::call(),
        points::points(),
        points::leaderboard(),
        down::down(),
        vacation::vacation(),
        promotion::promote(),
        promotion::promotion(),
        streak::streak(),
        prayer::prayer(),
        moderation::block(),
        moderation::warn(),
        moderation::warnings(),
        notifications::notifications(),
        colors::color(),
        rooms::rooms(),
    ]
}

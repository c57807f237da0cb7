pub mod bot;
pub mod dialogs;

pub use bot::BotClient;
pub use dialogs::UserSession;

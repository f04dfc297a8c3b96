pub mod models;
pub mod senders;

pub use models::{AlertKind, AlertMessage};
pub use senders::{log::LogSender, telegram::TelegramSender, NotificationSender, SenderError};

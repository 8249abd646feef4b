pub mod bot;
pub mod messages;
pub mod reminders;
pub mod webhook;

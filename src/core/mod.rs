pub mod config;
pub mod lifecycle;
pub mod reconcile;
pub mod terminal;

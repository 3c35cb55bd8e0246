pub mod auth;
pub mod config_handler;
pub mod inbox;
pub mod send;

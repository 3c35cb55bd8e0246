pub mod auth;
pub mod chrome;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod js_templates;
pub mod locators;
pub mod messaging;
pub mod output;
pub mod timeouts;
pub mod utils;

pub use auth::{AuthState, AuthenticationController, ClientEvent, CredentialCodec, Session};
pub use client::{AuthOutcome, MessagesClient};
pub use config::Config;
pub use error::MessagesError;
pub use messaging::{MessageDispatcher, OutboundMessage, SendResult};

pub type Result<T> = std::result::Result<T, MessagesError>;

//! Remote collaborators: configuration, wire records, service traits and
//! the HTTP backend.

pub mod config;
pub mod dto;
pub mod errors;
pub mod http;
pub mod services;

pub use config::ClientConfig;
pub use errors::{ClientError, ClientResult};
pub use http::HttpBackend;
pub use services::{AuthService, ChatService, ConversationService, NoteService, ServiceFuture};

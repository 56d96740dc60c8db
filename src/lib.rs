//! Client core for the RecallAI notes assistant: conversation windows kept in
//! sync with the backend, paginated history, optimistic chat turns and notes.

// Interdiction stricte de pratiques dangereuses ou non idiomatiques
#![deny(unsafe_code)] // Le code unsafe est interdit
#![warn(missing_docs)] // Toute fonction, struct, enum ou module public doit être documenté
#![warn(dead_code)] // Le code inutilisé est signalé
#![deny(non_camel_case_types)]

// Options supplémentaires pour ne rien laisser passer
#![warn(unused_imports)]
#![warn(unused_variables)]
#![deny(unused_must_use)] // Oblige à gérer explicitement les Result et Option
#![deny(non_snake_case)]
#![deny(non_upper_case_globals)]
#![deny(nonstandard_style)]
#![forbid(unsafe_op_in_unsafe_fn)]

// Clippy pour stricte discipline
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::unwrap_used)] // Interdit unwrap()
#![deny(clippy::expect_used)] // Interdit expect()
#![deny(clippy::panic)] // Interdit panic!()
#![deny(clippy::print_stdout)] // Interdit println!() en production
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_in_result)]
#![deny(clippy::module_inception)]
#![deny(clippy::redundant_clone)]
#![deny(clippy::too_many_arguments)]
// Les tests peuvent unwrap
#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)
)]

// Lints pour sécurité et robustesse
#![deny(overflowing_literals)]

/// HTTP access to the RecallAI backend.
#[allow(clippy::missing_errors_doc)]
pub mod client;
/// Conversation windows, pagination and chat turns.
#[allow(clippy::module_name_repetitions, clippy::too_many_lines)]
pub mod conversation;
/// Notes of the signed-in user.
pub mod notes;
/// Signed-in identity and its on-disk cache.
pub mod session;
/// Entry helpers to start the terminal client.
pub mod start_recallai;

pub use client::{ClientConfig, ClientError, ClientResult, HttpBackend};
pub use conversation::{ConversationId, ConversationView, MessageId, ViewBackends};
pub use notes::NotesBook;
pub use session::{IdentityStore, SessionContext, UserIdentity};

//! Application store for the prompt library.
//!
//! [`LibraryApp`] wires the persistent role and template stores, the
//! composition logic, and the enhancement client together. It keeps a
//! mirror of both collections for listing, owns prompts with their version
//! history, sharing grants and tags, tracks view state, and manages the login
//! session. A
//! [`RequestQueue`] with a per-user rate limit is available for deferred
//! calls.

#![warn(missing_docs, clippy::pedantic)]

mod app;
mod auth;
mod error;
mod prompts;
mod queue;
mod view;

pub use app::{ConfirmCascade, LibraryApp, RoleDeletion, SESSION_KEY};
pub use auth::{Authenticator, StaticAuthenticator};
pub use error::{AppError, AppResult};
pub use prompts::{PromptBook, PromptRequest};
pub use queue::{DEFAULT_DRAIN_INTERVAL, DrainOutcome, QueuedRequest, RequestQueue};
pub use view::{Modal, ModalMode, ViewState};

//! Session management for folio.
//!
//! Owns the persisted credential record (access token, refresh token,
//! cached email) and the in-memory session state. Restores a session at
//! startup with one refresh-and-retry on 401, and exposes sign-in, sign-up
//! and sign-out as explicit transitions.

pub mod credentials;
pub mod manager;
pub mod state;
pub mod storage;
pub mod types;

pub use credentials::{CredentialRecord, CredentialSnapshot};
pub use manager::{RestoreOutcome, SessionManager};
pub use state::{SessionState, SessionStatus, User, UNKNOWN_USER_ID};
pub use storage::{open_store, FileStore, KeyValueStore, MemoryStore};
pub use types::{AuthResponse, AuthUser, Profile};

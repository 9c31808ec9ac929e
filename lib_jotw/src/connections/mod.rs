//! # Connections Module
//!
//! Concrete collaborators for the core seams:
//!
//! - **`store_json`**: [`Persistence`](crate::core::Persistence) over a single
//!   pretty-printed JSON file (the `guilds.json` layout).
//! - **`loopback`**: an in-process [`Transport`](crate::core::Transport) that
//!   keeps published messages in memory and accepts reactions pushed by the
//!   command surface. Used by the server and by tests.

/// JSON file persistence for communities.
pub mod store_json;
/// In-process transport and identity directory.
pub mod loopback;

pub use store_json::JsonFileStore;
pub use loopback::{LoopbackTransport, PostedMessage, PostedReaction};

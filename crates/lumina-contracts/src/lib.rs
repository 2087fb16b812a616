//! Core data and local-state logic for Lumina: aspect-ratio and size-tier
//! resolution, tolerant parsing of assistant responses, and the artifact and
//! saved-prompt store. Nothing in this crate touches the network.

pub mod chat;
pub mod error;
pub mod events;
pub mod models;
pub mod ratio;
pub mod sections;
pub mod store;

pub use error::{StorageError, StoreWarning, UpstreamError};
pub use ratio::{AspectRatio, Dimensions, SizeTier, Sizing};
pub use sections::ParsedResponse;

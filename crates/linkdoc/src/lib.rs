//! Observable JSON-like documents.
//!
//! Dicts and lists live in a [`Graph`] arena and report every mutation as a
//! [`Change`] to listeners on the mutated node and on every ancestor. Trees
//! can be diffed into place with [`Graph::assign`] and patched with
//! [`Graph::apply`]. Documents are dicts bound to a URL; a [`Session`] loads
//! and stores them as OML text and follows `!link` references.

pub mod change;
pub mod config;
pub mod document;
pub mod error;
pub mod graph;
pub mod oml;
pub mod session;
pub mod transport;
pub mod value;

pub use change::{Change, ChangeOp, ContainerKind, Diff};
pub use config::ClientConfig;
pub use document::{normalize_url, LoadState};
pub use error::{DocumentError, ObservableError};
pub use graph::{Descendants, DictHandle, Graph, ListHandle, Phase, Subscription};
pub use linkdoc_path::{parse_index, Path};
pub use oml::OmlError;
pub use session::{Document, Session};
pub use transport::{Authorize, HttpTransport, NoAuthorization, Response, StaticToken, Transport};
pub use value::{Input, Key, NodeId, Snapshot, Value};

/// Returns the crate version at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

//! Routing API clients.
//!
//! Two cooperating clients against the same GraphQL endpoint: a polling
//! client fetching the full per-tag terminal list on a tick, and a
//! subscription client receiving push updates over a websocket. Both yield
//! the same [`Edge`] shape to the correlator.
//!
//! Known backend quirk: the `tags` filter fuzz-matches, so exact tag
//! membership must be re-verified on every returned edge.

mod client;
mod error;
mod subscription;
mod types;

pub use client::{RouterClient, RouterClientConfig};
pub use error::RouterError;
pub use subscription::{websocket_url, TerminalSubscription};
pub use types::{
    find_nameset_value, Edge, GraphQlError, GraphQlResponse, Nameset, NamesetName, SourceTerminal,
    Terminals, TerminalsData, TerminalsUpdated, TERMINALS_QUERY, TERMINALS_SUBSCRIPTION,
};

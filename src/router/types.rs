//! GraphQL wire types for the routing API.

use serde::Deserialize;

/// Document for the per-tag terminals query.
///
/// The filter set is fixed: destination subscriber terminals matching the
/// tag. The backend fuzz-matches the tag filter, so callers must re-verify
/// exact membership on every returned edge.
pub const TERMINALS_QUERY: &str = r#"query Terminals($tag: String!, $limit: Int!) {
  terminals(input: {filters: [{id: "isDst", booleanValue: true}, {id: "isSub", booleanValue: true}, {id: "tags", value: $tag}]}) {
    totalCount
    edges(limit: $limit) {
      id name tags isSub isDst type
      namesetNames { id name nameset { id name } }
      ... on RouteableTerminal {
        routedPhysicalSource { id name isSrc namesetNames { id name nameset { id name } } }
        subscribedSource { id name isSub namesetNames { id name nameset { id name } } }
      }
    }
  }
}"#;

/// Document for the push subscription; same filter shape as the query.
pub const TERMINALS_SUBSCRIPTION: &str = r#"subscription TerminalsUpdated($tag: String!) {
  terminalsUpdated(input: {filters: [{id: "isDst", booleanValue: true}, {id: "isSub", booleanValue: true}, {id: "tags", value: $tag}]}) {
    id name tags isSub isDst type
    namesetNames { id name nameset { id name } }
    ... on RouteableTerminal {
      routedPhysicalSource { id name isSrc namesetNames { id name nameset { id name } } }
      subscribedSource { id name isSub namesetNames { id name nameset { id name } } }
    }
  }
}"#;

/// One terminal record returned by the routing API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_sub: bool,
    #[serde(default)]
    pub is_dst: bool,
    #[serde(rename = "type", default)]
    pub terminal_type: String,
    #[serde(default)]
    pub nameset_names: Vec<NamesetName>,
    pub routed_physical_source: Option<SourceTerminal>,
    pub subscribed_source: Option<SourceTerminal>,
}

impl Edge {
    /// The inner source feeding this destination, physical preferred.
    pub fn inner_source(&self) -> Option<&SourceTerminal> {
        self.routed_physical_source
            .as_ref()
            .or(self.subscribed_source.as_ref())
    }
}

/// A terminal's value inside one nameset.
#[derive(Debug, Clone, Deserialize)]
pub struct NamesetName {
    pub id: String,
    pub name: String,
    pub nameset: Nameset,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Nameset {
    pub id: String,
    pub name: String,
}

/// Source terminal nested under a routeable destination. Covers both the
/// routed physical source and the subscribed source shapes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceTerminal {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_src: bool,
    #[serde(default)]
    pub is_sub: bool,
    #[serde(default)]
    pub nameset_names: Vec<NamesetName>,
}

/// Find a terminal's value under the nameset with the given name.
pub fn find_nameset_value<'a>(list: &'a [NamesetName], nameset: &str) -> Option<&'a str> {
    list.iter()
        .find(|n| n.nameset.name == nameset)
        .map(|n| n.name.as_str())
}

/// Generic GraphQL response envelope.
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

/// `data` payload of the terminals query.
#[derive(Debug, Deserialize)]
pub struct TerminalsData {
    pub terminals: Terminals,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Terminals {
    pub total_count: i64,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// `data` payload of a subscription push.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalsUpdated {
    #[serde(default)]
    pub terminals_updated: Vec<Edge>,
}

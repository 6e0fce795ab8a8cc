//! Per-edge event construction.

use serde_json::{json, Map, Value};

use crate::config::MappingConfig;
use crate::domain::EventKind;
use crate::events::Event;
use crate::router::{find_nameset_value, Edge, NamesetName, SourceTerminal};

/// Resolved operator-facing labels for one edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Labels {
    pub destination: String,
    pub source: String,
}

/// Resolve destination and source labels through the configured nameset.
///
/// The destination label comes from the edge's own namesets; the source
/// label from the chosen inner source (physical preferred, else
/// subscribed). Either falls back to the configured default.
pub fn resolve_labels(edge: &Edge, mapping: &MappingConfig) -> Labels {
    let destination = find_nameset_value(&edge.nameset_names, &mapping.nameset)
        .unwrap_or(&mapping.default)
        .to_string();

    let source = edge
        .inner_source()
        .and_then(|src| find_nameset_value(&src.nameset_names, &mapping.nameset))
        .unwrap_or(&mapping.default)
        .to_string();

    Labels {
        destination,
        source,
    }
}

/// Build the base event for one edge.
///
/// Carries the edge identity, the exact tag filter, the nameset map
/// (lowercased nameset names), and a nested `routeableTerminal` object for
/// whichever inner source exists. Destinations with neither source get no
/// `routeableTerminal` field at all.
pub fn base_event(edge: &Edge, tag: &str, kind: EventKind) -> Event {
    let mut event = Event::new(kind);

    event.put("dstId", Value::String(edge.id.clone()));
    event.put("dstName", Value::String(edge.name.clone()));
    event.put("dstIsSub", Value::Bool(edge.is_sub));
    event.put("dstIsDst", Value::Bool(edge.is_dst));
    event.put("dstType", Value::String(edge.terminal_type.clone()));
    event.put("dstTags", json!(edge.tags));
    event.put("dstTag", Value::String(tag.to_string()));
    event.put("dstNameset", Value::Object(nameset_object(&edge.nameset_names)));

    let mut routeable = Map::new();

    if let Some(source) = &edge.routed_physical_source {
        routeable.insert("physicalSource".into(), source_object(source, true));
    }

    if let Some(source) = &edge.subscribed_source {
        routeable.insert("subscribedSource".into(), source_object(source, false));
    }

    if !routeable.is_empty() {
        event.put("routeableTerminal", Value::Object(routeable));
    }

    event
}

fn source_object(source: &SourceTerminal, physical: bool) -> Value {
    let mut obj = Map::new();

    obj.insert("name".into(), Value::String(source.name.clone()));
    if physical {
        obj.insert("isSrc".into(), Value::Bool(source.is_src));
    } else {
        obj.insert("isSub".into(), Value::Bool(source.is_sub));
    }
    obj.insert(
        "nameset".into(),
        Value::Object(nameset_object(&source.nameset_names)),
    );

    Value::Object(obj)
}

/// `lowercased nameset name → value` object for a nameset list.
fn nameset_object(list: &[NamesetName]) -> Map<String, Value> {
    let mut obj = Map::new();

    for entry in list {
        obj.insert(
            entry.nameset.name.to_lowercase(),
            Value::String(entry.name.clone()),
        );
    }

    obj
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> MappingConfig {
        MappingConfig {
            nameset: "BUSCODES".into(),
            default: "UNKNOWN".into(),
        }
    }

    fn edge_json() -> Value {
        json!({
            "id": "t-1",
            "name": "MES1-OUT",
            "tags": ["MES"],
            "isSub": true,
            "isDst": true,
            "type": "audio",
            "namesetNames": [
                { "id": "n-1", "name": "MES1", "nameset": { "id": "ns-1", "name": "BUSCODES" } },
                { "id": "n-2", "name": "Mix Bus 1", "nameset": { "id": "ns-2", "name": "Friendly" } }
            ],
            "routedPhysicalSource": {
                "id": "s-1",
                "name": "SRC-A-OUT",
                "isSrc": true,
                "namesetNames": [
                    { "id": "n-3", "name": "SRC-A", "nameset": { "id": "ns-1", "name": "BUSCODES" } }
                ]
            }
        })
    }

    #[test]
    fn labels_resolve_through_nameset() {
        let edge: Edge = serde_json::from_value(edge_json()).unwrap();
        let labels = resolve_labels(&edge, &mapping());

        assert_eq!(labels.destination, "MES1");
        assert_eq!(labels.source, "SRC-A");
    }

    #[test]
    fn labels_fall_back_to_default() {
        let edge: Edge = serde_json::from_value(json!({
            "id": "t-2",
            "name": "bare",
        }))
        .unwrap();

        let labels = resolve_labels(&edge, &mapping());
        assert_eq!(labels.destination, "UNKNOWN");
        assert_eq!(labels.source, "UNKNOWN");
    }

    #[test]
    fn source_label_prefers_physical_source() {
        let mut raw = edge_json();
        raw["subscribedSource"] = json!({
            "id": "s-2",
            "name": "SUB-OUT",
            "isSub": true,
            "namesetNames": [
                { "id": "n-4", "name": "SRC-SUB", "nameset": { "id": "ns-1", "name": "BUSCODES" } }
            ]
        });

        let edge: Edge = serde_json::from_value(raw).unwrap();
        let labels = resolve_labels(&edge, &mapping());
        assert_eq!(labels.source, "SRC-A");
    }

    #[test]
    fn base_event_field_layout() {
        let edge: Edge = serde_json::from_value(edge_json()).unwrap();
        let event = base_event(&edge, "MES", EventKind::Query);

        assert_eq!(event.get("dstId"), Some(&json!("t-1")));
        assert_eq!(event.get("dstTag"), Some(&json!("MES")));
        assert_eq!(event.get("dstType"), Some(&json!("audio")));
        assert_eq!(event.get("eventType"), Some(&json!("query")));

        // Nameset names are lowercased.
        let namesets = event.get("dstNameset").unwrap();
        assert_eq!(namesets["buscodes"], json!("MES1"));
        assert_eq!(namesets["friendly"], json!("Mix Bus 1"));

        let routeable = event.get("routeableTerminal").unwrap();
        assert_eq!(routeable["physicalSource"]["name"], json!("SRC-A-OUT"));
        assert_eq!(routeable["physicalSource"]["isSrc"], json!(true));
        assert_eq!(
            routeable["physicalSource"]["nameset"]["buscodes"],
            json!("SRC-A")
        );
        assert!(routeable.get("subscribedSource").is_none());
    }

    #[test]
    fn sourceless_edge_has_no_routeable_terminal() {
        let edge: Edge = serde_json::from_value(json!({
            "id": "t-3",
            "name": "dark",
        }))
        .unwrap();

        let event = base_event(&edge, "MES", EventKind::Notification);
        assert!(event.get("routeableTerminal").is_none());
        assert_eq!(event.get("eventType"), Some(&json!("notification")));
    }
}

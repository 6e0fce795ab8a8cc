//! Search request body and typed response parsing.
//!
//! The scheduler index is queried with one pre-built request: a bool query
//! selecting currently-active schedule records ingested in the last four
//! hours, under a `buscode` terms aggregation with one filter + top-hits
//! sub-aggregation per projected field. The response is parsed into typed
//! aggregates; malformed buckets are skipped individually so one bad record
//! cannot poison a refresh.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::domain::{parse_schedule_time, ScheduleEntry};

/// Sub-aggregation key → projected document field.
const FIELD_MAP: [(&str, &str); 4] = [
    ("pri_src", "primary_source"),
    ("sec_src", "backup_source"),
    ("start_date", "schedule.start_date"),
    ("end_date", "schedule.end_date"),
];

/// Maximum number of buscode groups returned per refresh.
const MAX_BUSCODE_GROUPS: u32 = 3000;

/// Build the `_search` request body.
pub fn search_body() -> Value {
    let mut aggs = serde_json::Map::new();

    for (key, field) in FIELD_MAP {
        aggs.insert(
            key.to_string(),
            json!({
                "filter": {
                    "bool": {
                        "should": [{ "exists": { "field": field } }],
                        "minimum_should_match": 1
                    }
                },
                "aggs": {
                    "metric": {
                        "top_hits": {
                            "fields": [{ "field": field }],
                            "_source": false,
                            "size": 1,
                            "sort": [{ "@timestamp": { "order": "desc" } }]
                        }
                    }
                }
            }),
        );
    }

    json!({
        "size": 0,
        "query": {
            "bool": {
                "must": [
                    { "range": { "@timestamp": { "from": "now-4h", "to": "now" } } },
                    { "match_phrase": { "event.module": "schedule" } },
                    { "range": { "schedule.end_date": { "gte": "now" } } },
                    { "range": { "schedule.start_date": { "lte": "now" } } }
                ]
            }
        },
        "aggs": {
            "bus_name": {
                "terms": {
                    "field": "buscode",
                    "order": { "_key": "asc" },
                    "size": MAX_BUSCODE_GROUPS
                },
                "aggs": Value::Object(aggs)
            }
        }
    })
}

/// Top-level `_search` response.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub hits: HitsMeta,
    pub aggregations: Option<Aggregations>,
}

#[derive(Debug, Deserialize)]
pub struct HitsMeta {
    pub total: TotalHits,
}

#[derive(Debug, Deserialize)]
pub struct TotalHits {
    pub value: i64,
}

#[derive(Debug, Deserialize)]
pub struct Aggregations {
    pub bus_name: TermsAggregate,
}

#[derive(Debug, Deserialize)]
pub struct TermsAggregate {
    /// Raw buckets; each is parsed individually so a malformed one can be
    /// skipped without dropping the rest.
    pub buckets: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct BusBucket {
    key: Value,
    pri_src: Option<FilterAggregate>,
    sec_src: Option<FilterAggregate>,
    start_date: Option<FilterAggregate>,
    end_date: Option<FilterAggregate>,
}

#[derive(Debug, Deserialize)]
struct FilterAggregate {
    metric: Option<TopHitsAggregate>,
}

#[derive(Debug, Deserialize)]
struct TopHitsAggregate {
    hits: TopHitsList,
}

#[derive(Debug, Deserialize)]
struct TopHitsList {
    total: TotalHits,
    hits: Vec<TopHit>,
}

#[derive(Debug, Deserialize)]
struct TopHit {
    #[serde(default)]
    fields: HashMap<String, Value>,
}

/// Reduce terms-aggregation buckets to the schedule map.
pub fn buckets_into_schedule_map(buckets: Vec<Value>) -> HashMap<String, ScheduleEntry> {
    let mut map = HashMap::with_capacity(buckets.len());

    for raw in buckets {
        let bucket: BusBucket = match serde_json::from_value(raw) {
            Ok(bucket) => bucket,
            Err(err) => {
                warn!("skipping malformed buscode bucket: {err}");
                continue;
            }
        };

        let Some(buscode) = bucket.key.as_str() else {
            warn!("skipping bucket with non-string key: {}", bucket.key);
            continue;
        };

        let mut entry = ScheduleEntry::default();

        if let Some(value) = top_hit_value(&bucket.pri_src, "primary_source", buscode) {
            entry.primary = value;
        }
        if let Some(value) = top_hit_value(&bucket.sec_src, "backup_source", buscode) {
            entry.secondary = value;
        }
        if let Some(value) = top_hit_value(&bucket.start_date, "schedule.start_date", buscode) {
            entry.start = parse_schedule_time(&value);
        }
        if let Some(value) = top_hit_value(&bucket.end_date, "schedule.end_date", buscode) {
            entry.end = parse_schedule_time(&value);
        }

        map.insert(buscode.to_string(), entry);
    }

    map
}

/// Project the single top-hit value for `field` out of a sub-aggregation.
///
/// The top-hits `fields` section holds each value as a one-element array.
fn top_hit_value(agg: &Option<FilterAggregate>, field: &str, buscode: &str) -> Option<String> {
    let top = agg.as_ref()?.metric.as_ref()?;

    if top.hits.total.value == 0 || top.hits.hits.is_empty() {
        warn!("empty top-hits list for field {field}, bus {buscode}");
        return None;
    }

    let values = top.hits.hits[0].fields.get(field)?;

    match values.as_array().and_then(|list| list.first()) {
        Some(first) => first.as_str().map(str::to_string),
        None => {
            warn!("empty value list for field {field}, bus {buscode}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(key: Value, primary: Option<&str>, start: Option<&str>) -> Value {
        let mut b = serde_json::Map::new();
        b.insert("key".into(), key);
        b.insert("doc_count".into(), json!(7));

        if let Some(primary) = primary {
            b.insert(
                "pri_src".into(),
                json!({
                    "doc_count": 3,
                    "metric": {
                        "hits": {
                            "total": { "value": 3, "relation": "eq" },
                            "hits": [{ "fields": { "primary_source": [primary] } }]
                        }
                    }
                }),
            );
        }

        if let Some(start) = start {
            b.insert(
                "start_date".into(),
                json!({
                    "doc_count": 3,
                    "metric": {
                        "hits": {
                            "total": { "value": 3, "relation": "eq" },
                            "hits": [{ "fields": { "schedule.start_date": [start] } }]
                        }
                    }
                }),
            );
        }

        Value::Object(b)
    }

    #[test]
    fn search_body_shape() {
        let body = search_body();

        assert_eq!(body["size"], json!(0));
        assert_eq!(
            body["aggs"]["bus_name"]["terms"]["field"],
            json!("buscode")
        );
        assert_eq!(body["aggs"]["bus_name"]["terms"]["size"], json!(3000));
        assert_eq!(body["query"]["bool"]["must"].as_array().unwrap().len(), 4);

        // One sub-aggregation per projected field.
        let sub = body["aggs"]["bus_name"]["aggs"].as_object().unwrap();
        assert_eq!(sub.len(), 4);
        assert_eq!(
            sub["pri_src"]["aggs"]["metric"]["top_hits"]["size"],
            json!(1)
        );
    }

    #[test]
    fn buckets_reduce_to_entries() {
        let buckets = vec![
            bucket(json!("MES1"), Some("SRC-A"), Some("2026/07/31 18:30:00")),
            bucket(json!("MES2"), Some("SRC-B"), None),
        ];

        let map = buckets_into_schedule_map(buckets);

        assert_eq!(map.len(), 2);
        assert_eq!(map["MES1"].primary, "SRC-A");
        assert_eq!(
            map["MES1"].start.unwrap().to_rfc3339(),
            "2026-07-31T18:30:00+00:00"
        );
        assert_eq!(map["MES2"].primary, "SRC-B");
        assert!(map["MES2"].start.is_none());
    }

    #[test]
    fn non_string_key_is_skipped() {
        let buckets = vec![
            bucket(json!(42), Some("SRC-A"), None),
            bucket(json!("MES1"), Some("SRC-A"), None),
        ];

        let map = buckets_into_schedule_map(buckets);

        assert_eq!(map.len(), 1);
        assert!(map.contains_key("MES1"));
    }

    #[test]
    fn malformed_bucket_is_skipped() {
        let buckets = vec![
            json!({ "key": "BAD", "pri_src": "not an aggregate" }),
            bucket(json!("MES1"), Some("SRC-A"), None),
        ];

        let map = buckets_into_schedule_map(buckets);

        assert_eq!(map.len(), 1);
        assert!(map.contains_key("MES1"));
    }

    #[test]
    fn empty_top_hits_leaves_field_unset() {
        let raw = json!({
            "key": "MES1",
            "doc_count": 1,
            "pri_src": {
                "doc_count": 0,
                "metric": {
                    "hits": { "total": { "value": 0, "relation": "eq" }, "hits": [] }
                }
            }
        });

        let map = buckets_into_schedule_map(vec![raw]);

        assert_eq!(map["MES1"].primary, "");
    }

    #[test]
    fn bad_date_leaves_timestamp_unset() {
        let buckets = vec![bucket(json!("MES1"), Some("SRC-A"), Some("31-07-2026"))];

        let map = buckets_into_schedule_map(buckets);

        assert_eq!(map["MES1"].primary, "SRC-A");
        assert!(map["MES1"].start.is_none());
    }
}

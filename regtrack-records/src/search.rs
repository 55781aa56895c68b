//! Search entry point
//!
//! Compiles caller-supplied query fields into match fragments and runs
//! them against the record store. The compiler returns `None` (not an
//! empty array) for a missing field map; that contract is handled here
//! so store filters are always well-formed.

use regtrack_common::query::{generate_exp_array, QueryFields};
use regtrack_common::Result;
use serde_json::{json, Map, Value};

use crate::store::RecordStore;

/// Find all records matching the given query fields
///
/// A missing field map means an unfiltered find.
pub async fn search_records(
    store: &dyn RecordStore,
    fields: Option<&QueryFields>,
) -> Result<Vec<Value>> {
    let filter = match generate_exp_array(fields) {
        Some(fragments) if !fragments.is_empty() => json!({ "$and": fragments }),
        _ => Value::Object(Map::new()),
    };

    store.find(&filter).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteRecordStore;
    use regtrack_common::query::QueryValue;
    use sqlx::SqlitePool;
    use std::collections::BTreeMap;

    async fn seeded_store() -> SqliteRecordStore {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        let store = SqliteRecordStore::from_pool(pool).await.unwrap();

        store
            .insert(&json!({
                "_id": "o-1",
                "_schemaName": "Order",
                "issuingAgency": "AGRI",
                "dateIssued": "2020-03-15T10:00:00Z",
                "isNrcedPublished": true,
                "active": true,
                "documents": ["d-1"],
            }))
            .await
            .unwrap();
        store
            .insert(&json!({
                "_id": "o-2",
                "_schemaName": "Order",
                "issuingAgency": "EAO",
                "dateIssued": "2020-06-01T00:00:00Z",
                "isNrcedPublished": false,
                "active": true,
                "documents": [],
            }))
            .await
            .unwrap();

        store
    }

    fn fields(entries: Vec<(&str, QueryValue)>) -> QueryFields {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[tokio::test]
    async fn test_no_fields_means_unfiltered() {
        let store = seeded_store().await;
        let hits = search_records(&store, None).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_compiled_filters_apply() {
        let store = seeded_store().await;

        let f = fields(vec![
            (
                "issuingAgency",
                QueryValue::Many(vec!["AGRI".to_string(), "ENV".to_string()]),
            ),
            (
                "isNrcedPublished",
                QueryValue::One("true".to_string()),
            ),
        ]);
        let hits = search_records(&store, Some(&f)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["_id"], "o-1");
    }

    #[tokio::test]
    async fn test_date_range_and_has_documents() {
        let store = seeded_store().await;

        let f = fields(vec![(
            "dateRangeFromFilterdateIssued",
            QueryValue::One("2020-05-01".to_string()),
        )]);
        let hits = search_records(&store, Some(&f)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["_id"], "o-2");

        let f = fields(vec![("hasDocuments", QueryValue::One("true".to_string()))]);
        let hits = search_records(&store, Some(&f)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["_id"], "o-1");
    }

    #[tokio::test]
    async fn test_unknown_filter_is_silently_dropped() {
        let store = seeded_store().await;

        let f = fields(vec![(
            "someFutureUiFilter",
            QueryValue::One("whatever".to_string()),
        )]);
        // {someFutureUiFilter: "whatever"} matches nothing rather than
        // erroring; a prefixed unknown would compile to {} and match all
        let hits = search_records(&store, Some(&f)).await.unwrap();
        assert!(hits.is_empty());

        let f = fields(vec![(
            "(within)location",
            QueryValue::One("5km".to_string()),
        )]);
        let hits = search_records(&store, Some(&f)).await.unwrap();
        assert_eq!(hits.len(), 2);
    }
}

//! Property-based tests using proptest
//!
//! These tests verify path construction, key validation and payload
//! handling using randomized inputs.

use jira_resource::mock::MockClient;
use jira_resource::resource::identity::{validate_key, with_query};
use jira_resource::resource::{AttributeStore, ResourceType};
use jira_resource::ResourceFactory;
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Keys as JIRA hands them out: numeric ids and project keys
fn arb_key() -> impl Strategy<Value = String> {
    prop_oneof!["[1-9][0-9]{0,8}", "[A-Z][A-Z0-9]{1,9}-[1-9][0-9]{0,5}"]
}

/// Plain attribute values (no nested association data)
fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 ._-]{0,40}".prop_map(Value::String),
    ]
}

/// Attribute maps that never collide with a declared association of `Status`
fn arb_attributes() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-z][a-zA-Z]{0,15}", arb_scalar(), 0..20).prop_map(|m| {
        m.into_iter()
            .filter(|(k, _)| k != "statusCategory")
            .collect()
    })
}

proptest! {
    /// Valid keys always form `endpoint/key`
    #[test]
    fn test_item_path_shape(key in arb_key()) {
        let issue = ResourceType::new("Issue");
        let path = issue.item_path(&key).unwrap();
        prop_assert_eq!(path, format!("issue/{}", key));

        let link = ResourceType::new("Issuelink").with_endpoint_name("issueLink");
        prop_assert!(link.item_path(&key).unwrap().starts_with("issueLink/"));
    }

    /// Keys with a separator never produce a path
    #[test]
    fn test_key_with_separator_rejected(a in "[a-z0-9]{0,8}", b in "[a-z0-9]{0,8}") {
        let key = format!("{}/{}", a, b);
        prop_assert!(validate_key(&key).is_err());
    }

    /// Whitespace-only keys are rejected
    #[test]
    fn test_blank_key_rejected(key in "[ \t]{0,6}") {
        prop_assert!(validate_key(&key).is_err());
    }

    /// Query values never leak reserved characters into the path
    #[test]
    fn test_query_value_encoded(value in "[a-zA-Z0-9 &=?/#]{1,20}") {
        let path = with_query("version", &[("project", value.as_str())]);
        let query = path.strip_prefix("version?project=").unwrap();
        prop_assert!(!query.contains('&'));
        prop_assert!(!query.contains('='));
        prop_assert!(!query.contains(' '));
        prop_assert!(!query.contains('#'));
    }

    /// Plain attributes survive build and serialization unchanged
    #[test]
    fn test_plain_attributes_round_trip(key in arb_key(), attrs in arb_attributes()) {
        let factory = ResourceFactory::with_builtin_types(Arc::new(MockClient::new()));
        let mut payload = attrs.clone();
        payload.insert("id".to_string(), json!(key));

        let status = factory.build("Status", None, Value::Object(payload.clone())).unwrap();
        prop_assert_eq!(status.key(), Some(key.as_str()));
        prop_assert_eq!(status.to_json(), Value::Object(payload));
    }

    /// Non-clobbering merge keeps keys the patch does not mention
    #[test]
    fn test_merge_keeps_untouched_keys(base in arb_attributes(), patch in arb_attributes()) {
        let mut store = AttributeStore::from_map(base.clone());
        store.merge(patch.clone(), false);

        for (k, v) in &base {
            if !patch.contains_key(k) {
                prop_assert_eq!(store.get(k), Some(v));
            }
        }
        for (k, v) in &patch {
            prop_assert_eq!(store.get(k), Some(v));
        }
    }

    /// Collections come back in the order the server returned them
    #[test]
    fn test_collection_order_preserved(ids in prop::collection::vec("[1-9][0-9]{0,6}", 0..30)) {
        let client = Arc::new(MockClient::new());
        let items: Vec<Value> = ids.iter().map(|id| json!({"id": id})).collect();
        client.respond("issue/P-1/worklog", json!({"worklogs": items}));
        let factory = ResourceFactory::with_builtin_types(client.clone());

        let issue = factory.build("Issue", None, json!({"key": "P-1", "fields": {}})).unwrap();
        let worklogs = tokio_test::block_on(issue.many("worklogs")).unwrap();

        let keys: Vec<String> = worklogs.iter().filter_map(|w| w.key().map(String::from)).collect();
        prop_assert_eq!(keys, ids);
        prop_assert_eq!(client.fetch_count("issue/P-1/worklog"), 1);
    }
}

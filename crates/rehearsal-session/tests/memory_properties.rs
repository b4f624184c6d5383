//! Property tests for the in-memory session store.

use proptest::prelude::*;
use rehearsal_core::session::{SessionAdapter, SessionStatus};
use rehearsal_session::MemorySession;
use serde_json::{json, Value};

fn arb_key() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,11}".prop_map(|s| s)
}

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[ -~]{0,16}".prop_map(Value::from),
        prop::collection::vec(any::<i32>(), 0..4).prop_map(|v| json!(v)),
    ]
}

/// An operation applied to both the store and a model map.
#[derive(Debug, Clone)]
enum Op {
    Set(String, Value),
    Remove(String),
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            (arb_key(), arb_value()).prop_map(|(k, v)| Op::Set(k, v)),
            arb_key().prop_map(Op::Remove),
        ],
        0..24,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: a value that was set can be read back and is reported present.
    #[test]
    fn prop_set_then_get(key in arb_key(), value in arb_value()) {
        let session = MemorySession::new();
        session.set(&key, value.clone());
        prop_assert_eq!(session.get(&key, None, false), Some(value));
        prop_assert!(session.has(&key));
    }

    /// Property: the store behaves like a map under any sequence of writes.
    #[test]
    fn prop_behaves_like_map(ops in arb_ops()) {
        let session = MemorySession::new();
        let mut model = std::collections::HashMap::new();
        for op in &ops {
            match op {
                Op::Set(k, v) => {
                    session.set(k, v.clone());
                    model.insert(k.clone(), v.clone());
                }
                Op::Remove(k) => {
                    session.remove(k);
                    model.remove(k);
                }
            }
        }
        for (k, v) in &model {
            prop_assert_eq!(session.get(k, None, false), Some(v.clone()));
        }
        prop_assert_eq!(session.to_array().len(), model.len());
    }

    /// Property: start succeeds exactly once per destroy cycle.
    #[test]
    fn prop_start_once_per_cycle(cycles in 1usize..5) {
        let session = MemorySession::new();
        for _ in 0..cycles {
            prop_assert!(session.start());
            prop_assert!(!session.start());
            prop_assert_eq!(session.status(), SessionStatus::Active);
            prop_assert!(session.destroy());
            prop_assert_eq!(session.status(), SessionStatus::None);
        }
    }

    /// Property: changing the id hides earlier keys without failing.
    #[test]
    fn prop_new_id_hides_old_keys(key in arb_key(), value in arb_value(), id in "[a-f0-9]{8}") {
        let session = MemorySession::new();
        session.set(&key, value);

        let mut options = serde_json::Map::new();
        options.insert("uniqueId".into(), Value::from(id.clone()));
        session.set_options(options);
        prop_assert_eq!(session.id(), id);
        prop_assert_eq!(session.get(&key, Some(json!("default")), false), Some(json!("default")));
        prop_assert!(!session.has(&key));

        session.set(&key, json!(1));
        session.regenerate_id();
        prop_assert!(!session.has(&key));
    }
}

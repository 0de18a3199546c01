use std::sync::{Arc, Mutex};

use linkdoc::{Change, Graph, NodeId};
use proptest::prelude::*;
use serde_json::{json, Value as Json};

#[derive(Debug, Clone)]
enum Op {
    Set(String, Json),
    Delete(String),
    Insert(usize, Json),
    Replace(usize, Json),
    Remove(usize),
}

fn leaf() -> impl Strategy<Value = Json> {
    prop_oneof![
        Just(Json::Null),
        any::<bool>().prop_map(Json::from),
        any::<i32>().prop_map(Json::from),
        "[a-z]{0,4}".prop_map(Json::from),
    ]
}

fn value() -> impl Strategy<Value = Json> {
    leaf().prop_recursive(2, 8, 3, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..3).prop_map(Json::from),
            proptest::collection::btree_map("[a-c]", inner, 0..3)
                .prop_map(|m| Json::Object(m.into_iter().collect())),
        ]
    })
}

fn op() -> impl Strategy<Value = Op> {
    let key = "[a-d]";
    prop_oneof![
        (key, value()).prop_map(|(k, v)| Op::Set(k, v)),
        key.prop_map(Op::Delete),
        (0usize..8, value()).prop_map(|(i, v)| Op::Insert(i, v)),
        (0usize..8, value()).prop_map(|(i, v)| Op::Replace(i, v)),
        (0usize..8).prop_map(Op::Remove),
    ]
}

fn run(graph: &mut Graph, root: NodeId, op: &Op) {
    let dict = graph.get(root, "d").and_then(|v| v.as_node()).unwrap();
    let list = graph.get(root, "l").and_then(|v| v.as_node()).unwrap();
    let len = graph.len(list).unwrap();
    match op {
        Op::Set(k, v) => {
            graph.dict(dict).unwrap().set(k, v.clone()).unwrap();
        }
        Op::Delete(k) => {
            graph.dict(dict).unwrap().delete(k).unwrap();
        }
        Op::Insert(i, v) => {
            graph.list(list).unwrap().insert(i % (len + 1), v.clone()).unwrap();
        }
        Op::Replace(i, v) if len > 0 => {
            graph.list(list).unwrap().set(i % len, v.clone()).unwrap();
        }
        Op::Remove(i) if len > 0 => {
            graph.list(list).unwrap().remove(i % len).unwrap();
        }
        Op::Replace(..) | Op::Remove(_) => {}
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn applying_emitted_changes_reproduces_state(ops in proptest::collection::vec(op(), 1..12)) {
        let mut g = Graph::new();
        let source = g.create(json!({"d": {}, "l": []})).unwrap();
        let replica = g.create(json!({"d": {}, "l": []})).unwrap();
        let seen: Arc<Mutex<Vec<Change>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        g.on_change(source, move |c| sink.lock().unwrap().push(c.clone())).unwrap();

        for op in &ops {
            run(&mut g, source, op);
            let pending: Vec<Change> = seen.lock().unwrap().drain(..).collect();
            for change in &pending {
                let applied = g.apply(replica, change).unwrap();
                prop_assert_eq!(applied.as_ref(), Some(change));
            }
            prop_assert_eq!(g.snapshot(replica).unwrap(), g.snapshot(source).unwrap());
        }
    }

    #[test]
    fn assign_converges_and_is_idempotent(start in value(), target in value()) {
        let mut g = Graph::new();
        let root = g.create(json!({"v": start})).unwrap();
        let target = json!({"v": target});
        g.assign(root, target.clone()).unwrap();
        prop_assert_eq!(g.snapshot(root).unwrap().to_json(), target.clone());
        prop_assert!(g.assign(root, target).unwrap().is_empty());
    }
}

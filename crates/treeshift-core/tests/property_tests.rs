use proptest::prelude::*;
use serde_json::Value;
use treeshift_core::{
    Classification, CollectionRef, DecisionMap, Migrator, Sampler, SamplerConfig, Summary,
};
use treeshift_store::MemoryStore;
use treeshift_test_utils::source;
use treeshift_tree::{Node, TreePath};

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-z ]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(6, 96, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z/~]{1,4}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn chain(keys: &[String]) -> Value {
    keys.iter().rev().fold(Value::from(true), |inner, key| {
        let mut map = serde_json::Map::new();
        map.insert(key.clone(), inner);
        Value::Object(map)
    })
}

proptest! {
    #[test]
    fn prop_summary_is_bounded_projection(
        tree in arb_json(),
        limit in 1usize..5,
        max_depth in 0usize..5,
    ) {
        let config = SamplerConfig::new().with_limit(limit).with_max_depth(max_depth);
        let node = Node::from(tree);
        let summary = Sampler::new(config).sample_node(&node);

        prop_assert!(summary.max_fanout() <= limit);
        for path in summary.paths() {
            prop_assert!(path.len() <= max_depth + 1);
            let sampled = summary.at(&path).unwrap();
            let Some(real) = node.at(&path) else {
                return Err(TestCaseError::fail(format!("fabricated path {path}")));
            };
            match sampled {
                Summary::MaxDepth => prop_assert_eq!(path.len(), max_depth + 1),
                Summary::Leaf(kind) => {
                    prop_assert_eq!(real.as_scalar().and_then(|s| s.kind()), Some(*kind));
                }
                Summary::Null => prop_assert!(real.is_null()),
                Summary::Branch(children) => {
                    prop_assert!(real.is_branch());
                    prop_assert_eq!(children.len(), real.len().min(limit));
                }
            }
        }
    }

    #[test]
    fn prop_sampler_and_migrator_share_paths(
        keys in prop::collection::vec("[a-z/~]{1,4}", 1..6),
    ) {
        let tree = chain(&keys);
        let summary = Sampler::default().sample_node(&Node::from(tree.clone()));
        let sampled = summary.paths().pop().unwrap();
        let expected = TreePath::new(keys.clone());
        prop_assert_eq!(&sampled, &expected);
        prop_assert_eq!(TreePath::parse(&sampled.render()).unwrap(), expected.clone());

        // Classify every prefix as collection and the last key as field
        let mut decisions = DecisionMap::new();
        for n in 1..keys.len() {
            decisions.insert(&TreePath::new(keys[..n].to_vec()), Classification::Collection);
        }
        decisions.insert(&sampled, Classification::Field);

        let store = MemoryStore::new();
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let report = runtime
            .block_on(Migrator::default().run(&source(tree), &store, &decisions))
            .unwrap();

        let container = keys[..keys.len() - 1]
            .iter()
            .fold(CollectionRef::root(), |c, key| c.collection(key.clone()));
        let last = keys[keys.len() - 1].clone();
        let merged = store.fields(&container);
        prop_assert_eq!(merged.get(&last), Some(&Value::from(true)));
        prop_assert!(report.unclassified.is_empty());
        prop_assert_eq!(report.fields_merged, 1);
    }
}

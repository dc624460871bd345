use pretty_assertions::assert_eq;
use serde_json::json;
use treeshift_core::{MigrationError, Sampler, SamplerConfig, Summary};
use treeshift_test_utils::{
    chain_path, deep_chain, scenario_tree, source, users_tree, CountingSource, FailingSource,
};
use treeshift_tree::{Node, ScalarKind, TreePath};

#[tokio::test]
async fn test_scenario_summary() {
    let summary = Sampler::default().sample(&source(scenario_tree())).await.unwrap();
    assert_eq!(
        serde_json::to_value(&summary).unwrap(),
        json!({"a": {"x": "number", "y": "number"}, "b": "string"})
    );
}

#[tokio::test]
async fn test_live_and_in_memory_agree() {
    let sampler = Sampler::default();
    let tree = users_tree();
    let live = sampler.sample(&source(tree.clone())).await.unwrap();
    let local = sampler.sample_node(&Node::from(tree));
    assert_eq!(live, local);
}

#[tokio::test]
async fn test_one_bounded_read_per_node() {
    let counting = CountingSource::new(source(users_tree()));
    let summary = Sampler::default().sample(&counting).await.unwrap();

    assert_eq!(counting.child_reads(), summary.paths().len() + 1);
    assert_eq!(counting.full_reads(), 0);
    assert!(counting.limits().iter().all(|limit| *limit == Some(3)));
}

#[tokio::test]
async fn test_wide_object_keeps_first_keys() {
    let wide: serde_json::Map<_, _> = (0..100).map(|i| (format!("k{i:03}"), json!(i))).collect();
    let summary = Sampler::new(SamplerConfig::new().with_limit(5))
        .sample(&source(serde_json::Value::Object(wide)))
        .await
        .unwrap();

    let Summary::Branch(children) = summary else {
        panic!("expected branch");
    };
    let keys: Vec<_> = children.keys().cloned().collect();
    assert_eq!(keys, vec!["k000", "k001", "k002", "k003", "k004"]);
}

#[tokio::test]
async fn test_twelve_levels_truncate_at_ten() {
    let summary = Sampler::default().sample(&source(deep_chain(12))).await.unwrap();

    assert!(summary.at(&chain_path(10)).unwrap().is_branch());
    assert_eq!(summary.at(&chain_path(11)), Some(&Summary::MaxDepth));
    assert_eq!(summary.at(&chain_path(12)), None);
    assert_eq!(summary.depth(), 11);
}

#[tokio::test]
async fn test_depth_ten_leaf_is_reported() {
    let summary = Sampler::default().sample(&source(deep_chain(10))).await.unwrap();
    assert_eq!(
        summary.at(&chain_path(10)),
        Some(&Summary::Leaf(ScalarKind::String))
    );
}

#[tokio::test]
async fn test_missing_root_is_null() {
    let summary = Sampler::default().sample(&source(json!(null))).await.unwrap();
    assert_eq!(summary, Summary::Null);
}

#[tokio::test]
async fn test_failed_read_names_path() {
    let failing = FailingSource::new(source(scenario_tree()), TreePath::single("a"));
    let err = Sampler::default().sample(&failing).await.unwrap_err();

    assert!(matches!(err, MigrationError::StoreIo { ref path, .. } if path.render() == "/a"));
    assert!(err.is_retryable());
    assert_eq!(failing.failures(), 1);
}

use pretty_assertions::assert_eq;
use serde_json::json;
use treeshift_core::{Classification, CollectionRef, DecisionMap, Migrator, Sampler};
use treeshift_store::{JsonSource, MemoryStore};
use treeshift_tree::TreePath;

#[tokio::test]
async fn test_file_to_file_migration() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("rtdb.json");
    let output = dir.path().join("store.json");
    std::fs::write(
        &input,
        r#"{"users": {"u1": {"name": "Ann"}, "u2": {"name": "Bo"}}, "motd": "hi"}"#,
    )
    .unwrap();

    let source = JsonSource::load(&input).await.unwrap();
    let summary = Sampler::default().sample(&source).await.unwrap();
    let mut decisions = DecisionMap::new();
    for path in summary.paths() {
        let choice = match path.render().as_str() {
            "/users" => Classification::Collection,
            "/motd" => Classification::Field,
            _ if path.len() == 2 => Classification::Document,
            _ => continue,
        };
        decisions.insert(&path, choice);
    }
    assert!(decisions.unknown_paths(&summary).is_empty());

    let store = MemoryStore::load_or_default(&output).await.unwrap();
    Migrator::default().run(&source, &store, &decisions).await.unwrap();
    store.save(&output).await.unwrap();

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(
        saved,
        json!({
            "fields": {"motd": "hi"},
            "collections": {
                "users": {"documents": {"u1": {"name": "Ann"}, "u2": {"name": "Bo"}}}
            }
        })
    );

    let reloaded = MemoryStore::load(&output).await.unwrap();
    let users = CollectionRef::root().collection("users");
    assert_eq!(reloaded.document_ids(&users), vec!["u1", "u2"]);
    assert!(reloaded.document(&users.document("u3")).is_none());
    assert_eq!(TreePath::single("users").render(), "/users");
}

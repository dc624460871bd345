//! Write-recording target for dry runs

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use treeshift_core::{CollectionRef, DocRef, Fields, StoreError, TargetStore};

/// One acknowledged write
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum WriteOp {
    /// Document replaced
    Set { doc: DocRef, fields: Fields },
    /// Fields merged into a container
    Update {
        collection: CollectionRef,
        fields: Fields,
    },
}

impl WriteOp {
    /// Human readable one-line description
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Set { doc, fields } => format!("set {doc} ({} fields)", fields.len()),
            Self::Update { collection, fields } => {
                let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
                format!("update {collection} [{}]", keys.join(", "))
            }
        }
    }
}

/// Target that records writes instead of applying them
#[derive(Debug, Default)]
pub struct RecordingStore {
    ops: Mutex<Vec<WriteOp>>,
}

impl RecordingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes recorded so far, in acknowledgement order
    #[must_use]
    pub fn ops(&self) -> Vec<WriteOp> {
        self.ops.lock().clone()
    }

    /// Take the recorded writes
    #[must_use]
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops.into_inner()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.lock().is_empty()
    }
}

#[async_trait]
impl TargetStore for RecordingStore {
    async fn set(&self, doc: &DocRef, fields: Fields) -> Result<(), StoreError> {
        self.ops.lock().push(WriteOp::Set {
            doc: doc.clone(),
            fields,
        });
        Ok(())
    }

    async fn update(&self, collection: &CollectionRef, fields: Fields) -> Result<(), StoreError> {
        self.ops.lock().push(WriteOp::Update {
            collection: collection.clone(),
            fields,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn records_in_order() {
        let store = RecordingStore::new();
        let users = CollectionRef::root().collection("users");
        let mut f = Fields::new();
        f.insert("age".into(), json!(30));
        store.set(&users.document("alice"), f.clone()).await.unwrap();
        store.update(&users, f).await.unwrap();

        let ops = store.into_ops();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].describe(), "set users/alice (1 fields)");
        assert_eq!(ops[1].describe(), "update users [age]");
        assert_eq!(
            serde_json::to_value(&ops[1]).unwrap(),
            json!({"op": "update", "collection": ["users"], "fields": {"age": 30}})
        );
    }
}

//! Integration tests for entry reconciliation.
//!
//! These tests drive [`Entry`] through the public API with an in-memory
//! transport that records every request, starting from a raw directory entry
//! fixture that still carries `count` metadata.

use async_trait::async_trait;
use dirsync_ldap::{
    AttributeClient, AttributeMap, AttributeValue, DirectoryTransport, Entry, Error,
    ModifyOperation, TransportError, TransportResult,
};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

const DN: &str = "uid=alice,ou=People,dc=example,dc=com";

/// Transport that records batches and optionally rejects them.
#[derive(Default)]
struct RecordingTransport {
    batches: Mutex<Vec<Vec<ModifyOperation>>>,
    single_calls: Mutex<Vec<&'static str>>,
    reject_with: Mutex<Option<TransportError>>,
}

impl RecordingTransport {
    fn batches(&self) -> Vec<Vec<ModifyOperation>> {
        self.batches.lock().unwrap().clone()
    }

    fn reject_next(&self, err: TransportError) {
        *self.reject_with.lock().unwrap() = Some(err);
    }

    fn outcome(&self) -> TransportResult<()> {
        match self.reject_with.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DirectoryTransport for RecordingTransport {
    fn is_bound(&self) -> bool {
        true
    }

    async fn batch_modify(&self, _dn: &str, batch: &[ModifyOperation]) -> TransportResult<()> {
        self.batches.lock().unwrap().push(batch.to_vec());
        self.outcome()
    }

    async fn modify_add(&self, _dn: &str, _attributes: &AttributeMap) -> TransportResult<()> {
        self.single_calls.lock().unwrap().push("add");
        self.outcome()
    }

    async fn modify_replace(&self, _dn: &str, _attributes: &AttributeMap) -> TransportResult<()> {
        self.single_calls.lock().unwrap().push("replace");
        self.outcome()
    }

    async fn modify_delete(&self, _dn: &str, _attributes: &AttributeMap) -> TransportResult<()> {
        self.single_calls.lock().unwrap().push("delete");
        self.outcome()
    }
}

/// Load the raw entry fixture from disk.
fn load_raw_entry() -> serde_json::Value {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("raw_entry.json");
    let json = fs::read_to_string(&path).unwrap_or_else(|e| {
        panic!("Failed to read raw entry fixture at {}: {}", path.display(), e)
    });
    serde_json::from_str(&json).unwrap()
}

fn load_entry(transport: &Arc<RecordingTransport>) -> Entry {
    let transport: Arc<dyn DirectoryTransport> = transport.clone();
    Entry::from_raw(transport, &load_raw_entry()).unwrap()
}

#[test]
fn test_fixture_ingestion_strips_metadata() {
    let entry = load_entry(&Arc::new(RecordingTransport::default()));

    assert_eq!(entry.dn(), Some(DN));
    let names: Vec<&str> = entry.attributes().keys().map(String::as_str).collect();
    assert_eq!(names, vec!["cn", "mail", "objectClass", "sn", "uidNumber"]);
    assert_eq!(
        entry.get("mail"),
        Some(&AttributeValue::multi([
            "alice@example.com",
            "a.liddell@example.com"
        ]))
    );
    assert_eq!(entry.get("uidNumber"), Some(&AttributeValue::single("1001")));
}

#[tokio::test]
async fn test_full_reconciliation_round() {
    let transport = Arc::new(RecordingTransport::default());
    let mut entry = load_entry(&transport);

    let mut desired = entry.attributes().clone();
    desired.insert("cn".to_string(), AttributeValue::single("Alice Kingsleigh"));
    desired.insert("title".to_string(), AttributeValue::single("eng"));
    desired.remove("uidNumber");

    let plan = entry.sync(&desired).await.unwrap();
    assert_eq!(plan.changed(), vec!["cn"]);
    assert_eq!(plan.added(), vec!["title"]);
    assert_eq!(plan.removed(), vec!["uidNumber"]);

    assert_eq!(
        transport.batches(),
        vec![vec![
            ModifyOperation::Replace {
                attribute: "cn".to_string(),
                values: vec!["Alice Kingsleigh".to_string()],
            },
            ModifyOperation::Add {
                attribute: "title".to_string(),
                values: vec!["eng".to_string()],
            },
            ModifyOperation::remove_all("uidNumber"),
        ]]
    );
    assert_eq!(entry.attributes(), &desired);

    // A second identical round has nothing to send.
    let plan = entry.sync(&desired).await.unwrap();
    assert!(plan.is_empty());
    assert_eq!(transport.batches().len(), 1);
}

#[tokio::test]
async fn test_rejected_batch_keeps_snapshot() {
    let transport = Arc::new(RecordingTransport::default());
    let mut entry = load_entry(&transport);
    let before = entry.attributes().clone();

    transport.reject_next(TransportError::rejected(50, "insufficient access"));
    let err = entry.update(DN, &AttributeMap::new()).await.unwrap_err();

    assert!(matches!(err, Error::DirectoryOperation { .. }));
    assert_eq!(err.error_code(), "DIRECTORY_OPERATION_ERROR");
    assert_eq!(transport.batches()[0].len(), before.len());
    assert_eq!(entry.attributes(), &before);
}

#[tokio::test]
async fn test_attribute_client_shares_transport() {
    let transport = Arc::new(RecordingTransport::default());
    let client = AttributeClient::new(transport.clone());

    let mut attributes = AttributeMap::new();
    attributes.insert("description".to_string(), AttributeValue::Multi(Vec::new()));

    client.add_attribute(DN, &attributes).await.unwrap();
    client.update_attribute(DN, &attributes).await.unwrap();
    client.delete_attribute(DN, &attributes).await.unwrap();
    assert!(client.add_attribute(DN, &AttributeMap::new()).await.is_err());

    assert_eq!(
        *transport.single_calls.lock().unwrap(),
        vec!["add", "replace", "delete"]
    );
}

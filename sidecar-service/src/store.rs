//! In-memory state store with numeric etags.
//!
//! Every write bumps a store-wide counter that becomes the etag of the written key, so etags
//! never repeat. A write or delete carrying an etag fails with `Aborted` unless it matches the
//! current one; a first-write request without an etag fails with `Aborted` if the key exists.
use dapr_client::proto::dapr::proto::{
    common::v1::{StateItem, StateOptions, state_options::StateConcurrency},
    runtime::v1::TransactionalStateOperation,
};
use std::collections::HashMap;
use tonic::Status;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: Vec<u8>,
    pub etag: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct StateStore {
    entries: HashMap<(String, String), StoredValue>,
    last_etag: u64,
}

impl StateStore {
    pub fn get(&self, store_name: &str, key: &str) -> Option<&StoredValue> {
        self.entries.get(&(store_name.to_string(), key.to_string()))
    }

    /// Writes `value` without any etag or concurrency check and returns the new etag.
    pub fn put(&mut self, store_name: &str, key: &str, value: Vec<u8>) -> String {
        self.write(store_name, key.to_string(), value, HashMap::new())
    }

    /// Writes every item, or none if one of them is rejected.
    pub fn save(&mut self, store_name: &str, items: Vec<StateItem>) -> Result<(), Status> {
        let mut staged = self.clone();
        for item in items {
            staged.save_one(store_name, item)?;
        }
        *self = staged;
        Ok(())
    }

    pub fn delete(
        &mut self,
        store_name: &str,
        key: &str,
        etag: &str,
        options: Option<StateOptions>,
    ) -> Result<(), Status> {
        check_concurrency(self.get(store_name, key), key, etag, options)?;
        self.entries.remove(&(store_name.to_string(), key.to_string()));
        Ok(())
    }

    /// Applies the operations in order. Either all of them take effect or none does.
    ///
    /// Operations without metadata of their own inherit `metadata`.
    pub fn transact(
        &mut self,
        store_name: &str,
        operations: Vec<TransactionalStateOperation>,
        metadata: &HashMap<String, String>,
    ) -> Result<(), Status> {
        let mut staged = self.clone();

        for operation in operations {
            let mut item = operation
                .request
                .ok_or_else(|| Status::invalid_argument("Transaction operation without request"))?;
            if item.metadata.is_empty() {
                item.metadata = metadata.clone();
            }

            match operation.operation_type.as_str() {
                "upsert" => staged.save_one(store_name, item)?,
                "delete" => {
                    let etag = item.etag.clone();
                    staged.delete(store_name, &item.key, &etag, item.options)?
                }
                other => {
                    return Err(Status::invalid_argument(format!(
                        "Unsupported operation type '{other}'"
                    )));
                }
            }
        }

        *self = staged;
        Ok(())
    }

    fn save_one(&mut self, store_name: &str, item: StateItem) -> Result<(), Status> {
        check_concurrency(self.get(store_name, &item.key), &item.key, &item.etag, item.options)?;
        self.write(store_name, item.key, item.value, item.metadata);
        Ok(())
    }

    fn write(
        &mut self,
        store_name: &str,
        key: String,
        value: Vec<u8>,
        metadata: HashMap<String, String>,
    ) -> String {
        self.last_etag += 1;
        let etag = self.last_etag.to_string();
        self.entries.insert(
            (store_name.to_string(), key),
            StoredValue {
                value,
                etag: etag.clone(),
                metadata,
            },
        );
        etag
    }
}

fn check_concurrency(
    current: Option<&StoredValue>,
    key: &str,
    etag: &str,
    options: Option<StateOptions>,
) -> Result<(), Status> {
    if !etag.is_empty() {
        return match current {
            Some(stored) if stored.etag == etag => Ok(()),
            _ => Err(Status::aborted(format!(
                "possible etag mismatch for key '{key}'"
            ))),
        };
    }

    let first_write = options
        .is_some_and(|o| o.concurrency() == StateConcurrency::ConcurrencyFirstWrite);
    if first_write && current.is_some() {
        return Err(Status::aborted(format!(
            "first-write requires an etag for existing key '{key}'"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    fn item(key: &str, value: &[u8], etag: &str) -> StateItem {
        StateItem {
            key: key.into(),
            value: value.to_vec(),
            etag: etag.into(),
            ..Default::default()
        }
    }

    #[test]
    fn etags_change_on_every_write() {
        let mut store = StateStore::default();
        let first = store.put("s", "k", b"1".to_vec());
        let second = store.put("s", "k", b"2".to_vec());

        assert_ne!(first, second);
        assert_eq!(store.get("s", "k").unwrap().etag, second);
    }

    #[test]
    fn stale_etag_is_rejected_and_nothing_is_written() {
        let mut store = StateStore::default();
        let etag = store.put("s", "k", b"1".to_vec());
        store.put("s", "k", b"2".to_vec());

        let err = store.save("s", vec![item("k", b"3", &etag)]).unwrap_err();

        assert_eq!(err.code(), Code::Aborted);
        assert_eq!(store.get("s", "k").unwrap().value, b"2");
    }

    #[test]
    fn failed_transaction_leaves_the_store_untouched() {
        let mut store = StateStore::default();
        store.put("s", "a", b"1".to_vec());

        let operations = vec![
            TransactionalStateOperation {
                operation_type: "delete".into(),
                request: Some(item("a", b"", "")),
            },
            TransactionalStateOperation {
                operation_type: "upsert".into(),
                request: Some(item("b", b"2", "999")),
            },
        ];

        let err = store.transact("s", operations, &HashMap::new()).unwrap_err();

        assert_eq!(err.code(), Code::Aborted);
        assert!(store.get("s", "a").is_some());
        assert!(store.get("s", "b").is_none());
    }
}

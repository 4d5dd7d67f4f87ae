mod file;

pub use file::JsonFileStore;

use crate::error::Result;
use crate::models::Invoice;
use async_trait::async_trait;
use serde_json::{Map, Value};

#[async_trait]
pub trait InvoiceOperations {
    async fn get_invoice(&self, id: &str) -> Result<Option<Invoice>>;

    /// Merge `fields` into the stored document, leaving other fields intact
    async fn merge_invoice(&self, id: &str, fields: Map<String, Value>) -> Result<()>;
}

/// Deep-merge `fields` into `target`.
///
/// Nested objects are merged key by key; any other value replaces the
/// existing one.
pub fn merge_document(target: &mut Map<String, Value>, fields: Map<String, Value>) {
    for (key, value) in fields {
        match value {
            Value::Object(incoming) => match target.get_mut(&key) {
                Some(Value::Object(existing)) => merge_document(existing, incoming),
                _ => {
                    target.insert(key, Value::Object(incoming));
                }
            },
            value => {
                target.insert(key, value);
            }
        }
    }
}

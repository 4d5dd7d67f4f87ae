use super::{InvoiceOperations, merge_document};
use crate::error::{AppError, Result};
use crate::models::Invoice;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, instrument};

/// Invoice documents kept in one JSON file, keyed by invoice id
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str(&contents)? {
            Value::Object(documents) => Ok(documents),
            _ => Err(AppError::Store(format!(
                "{:?} must contain a JSON object keyed by invoice id",
                self.path
            ))),
        }
    }

    /// Write through a sibling temp file so readers never see a partial file
    fn save(&self, documents: Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(&Value::Object(documents))?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }
}

#[async_trait]
impl InvoiceOperations for JsonFileStore {
    #[instrument(name = "Loading invoice", skip(self))]
    async fn get_invoice(&self, id: &str) -> Result<Option<Invoice>> {
        let mut documents = self.load()?;

        documents
            .remove(id)
            .map(|document| Invoice::from_document(id, document))
            .transpose()
    }

    #[instrument(name = "Merging invoice", skip(self, fields))]
    async fn merge_invoice(&self, id: &str, fields: Map<String, Value>) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AppError::Store("Invoice store lock poisoned".to_string()))?;

        let mut documents = self.load()?;
        let document = documents
            .entry(id.to_string())
            .or_insert_with(|| Value::Object(Map::new()));

        let Value::Object(existing) = document else {
            return Err(AppError::Store(format!(
                "Invoice document {} is not an object",
                id
            )));
        };
        merge_document(existing, fields);

        self.save(documents)?;
        debug!("Invoice document merged");

        Ok(())
    }
}

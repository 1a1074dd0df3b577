use std::fs;
use std::path::Path;

use nomnom_core::{Dataset, export_json, import_json};

use crate::error::{Result, StoreError};
use crate::store::{ImportSummary, Store};

impl Store {
    /// Replace the store contents with a JSON dataset file.
    pub fn import_json_file(&self, path: &Path) -> Result<ImportSummary> {
        let json = fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidData(format!("failed to read {}: {e}", path.display()))
        })?;
        self.import_json_str(&json)
    }

    /// Replace the store contents with a JSON dataset string.
    pub fn import_json_str(&self, json: &str) -> Result<ImportSummary> {
        let dataset =
            import_json(json).map_err(|e| StoreError::InvalidData(format!("invalid JSON: {e}")))?;
        self.replace_all(&dataset)
    }

    pub fn export_json_file(&self, path: &Path) -> Result<()> {
        let json = self.export_json_string()?;
        fs::write(path, json).map_err(|e| {
            StoreError::InvalidData(format!("failed to write {}: {e}", path.display()))
        })
    }

    pub fn export_json_string(&self) -> Result<String> {
        let dataset = Dataset::from_snapshot(&self.load_snapshot()?);
        export_json(&dataset)
            .map_err(|e| StoreError::InvalidData(format!("JSON export failed: {e}")))
    }
}

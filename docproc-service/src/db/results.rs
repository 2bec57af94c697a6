//! Document processor result operations.
//!
//! Rows are append-only: every status transition inserts a new row and the
//! most recent one by timestamp is authoritative.

use rusqlite::{params, params_from_iter};
use uuid::Uuid;

use super::Database;
use super::models::DocumentProcessorResult;
use crate::error::{DatabaseError, ServiceResult};
use crate::store::ResultStore;

const RESULT_COLUMNS: &str = "document_id, processor_id, status, result, timestamp";

impl ResultStore for Database {
    fn save(&self, result: &DocumentProcessorResult) -> ServiceResult<()> {
        let result_json =
            serde_json::to_string(&result.result).map_err(DatabaseError::Serialization)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO document_processor_results (document_id, processor_id, status, result, timestamp) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                result.document_id.to_string(),
                result.processor_id,
                result.status.as_str(),
                result_json,
                result.timestamp.to_rfc3339(),
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    fn find_by_document_id(&self, document_id: Uuid) -> ServiceResult<Vec<DocumentProcessorResult>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {RESULT_COLUMNS} FROM document_processor_results \
                 WHERE document_id = ?1 ORDER BY id"
            ))
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(params![document_id.to_string()], DocumentProcessorResult::from_row)
            .map_err(DatabaseError::Query)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(DatabaseError::Query)?);
        }

        Ok(results)
    }

    fn find_by_document_id_and_processor_ids(
        &self,
        document_id: Uuid,
        processor_ids: &[String],
    ) -> ServiceResult<Vec<DocumentProcessorResult>> {
        if processor_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (0..processor_ids.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");

        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {RESULT_COLUMNS} FROM document_processor_results \
                 WHERE document_id = ?1 AND processor_id IN ({placeholders}) ORDER BY id"
            ))
            .map_err(DatabaseError::Query)?;

        let bindings = std::iter::once(document_id.to_string()).chain(processor_ids.iter().cloned());
        let rows = stmt
            .query_map(params_from_iter(bindings), DocumentProcessorResult::from_row)
            .map_err(DatabaseError::Query)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(DatabaseError::Query)?);
        }

        Ok(results)
    }
}

// Batch writer: replace a table's contents in one transaction

use crate::config::DEFAULT_CHUNK_SIZE;
use crate::error::WriteError;
use crate::normalize::TableSchema;
use crate::record::{Batch, RunMetadata, SqlValue};
use crate::sink::{SqlSink, Statement, StatementKind};
use dashfeed_common::sql::{format_timestamp, quote_identifier, text_literal};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{error, info, warn};

/// What to do with a text value longer than its column allows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OversizePolicy {
    /// Abort the write with `WriteError::ValueTooLong`
    #[default]
    Fail,
    /// Cut the value to the column length and log it
    Truncate,
}

/// Outcome of a committed write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub rows_written: usize,
    pub insert_statements: usize,
    pub truncated_values: usize,
}

/// Renders and executes DELETE, chunked INSERTs and the tracking UPDATE
pub struct BatchWriter {
    schema: TableSchema,
    tracking_table: String,
    tracking_name: String,
    chunk_size: usize,
    post_commit: Vec<String>,
}

impl BatchWriter {
    pub fn new(
        schema: TableSchema,
        tracking_table: impl Into<String>,
        tracking_name: impl Into<String>,
    ) -> Self {
        Self {
            schema,
            tracking_table: tracking_table.into(),
            tracking_name: tracking_name.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            post_commit: Vec::new(),
        }
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Statement run after a successful commit, e.g. a status refresh procedure
    pub fn post_commit(mut self, sql: impl Into<String>) -> Self {
        self.post_commit.push(sql.into());
        self
    }

    fn literal(
        &self,
        column: &str,
        value: &SqlValue,
        truncated: &mut usize,
    ) -> Result<String, WriteError> {
        let SqlValue::Text(text) = value else {
            return Ok(value.to_sql());
        };
        let max_len = self
            .schema
            .columns
            .iter()
            .find(|c| c.column == column)
            .and_then(|c| c.max_len);

        match max_len {
            Some(max) if text.char_len() > max => match self.schema.oversize {
                OversizePolicy::Fail => Err(WriteError::ValueTooLong(format!(
                    "{}.{} holds {} characters, limit is {}",
                    self.schema.table,
                    column,
                    text.char_len(),
                    max
                ))),
                OversizePolicy::Truncate => {
                    warn!(
                        table = %self.schema.table,
                        column,
                        length = text.char_len(),
                        max,
                        "Truncating oversized value"
                    );
                    *truncated += 1;
                    Ok(SqlValue::Text(text.truncated(max)).to_sql())
                },
            },
            _ => Ok(value.to_sql()),
        }
    }

    /// Render the statements of one write, in execution order
    ///
    /// Returns the transaction's statements followed by the post-commit ones,
    /// and the number of truncated values.
    pub fn render(
        &self,
        batch: &Batch,
        run: &RunMetadata,
    ) -> Result<(Vec<Statement>, Vec<Statement>, usize), WriteError> {
        let table = quote_identifier(&batch.table)?;
        let columns = batch
            .columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");

        let mut statements = vec![Statement {
            kind: StatementKind::Delete {
                table: batch.table.clone(),
            },
            sql: format!("DELETE FROM {}", table),
        }];

        let mut truncated = 0;
        for chunk in batch.records.chunks(self.chunk_size) {
            let rows = chunk
                .iter()
                .map(|record| {
                    let values = record
                        .columns()
                        .zip(record.values())
                        .map(|(column, value)| self.literal(column, value, &mut truncated))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(format!("({})", values.join(", ")))
                })
                .collect::<Result<Vec<_>, WriteError>>()?;

            statements.push(Statement {
                kind: StatementKind::Insert {
                    table: batch.table.clone(),
                    rows: chunk.len(),
                },
                sql: format!(
                    "INSERT INTO {} ({}) VALUES {}",
                    table,
                    columns,
                    rows.join(", ")
                ),
            });
        }

        statements.push(Statement {
            kind: StatementKind::UpdateTracking,
            sql: format!(
                "UPDATE {} SET {} = {}, {} = {} WHERE {} = {}",
                quote_identifier(&self.tracking_table)?,
                quote_identifier("lastRun")?,
                text_literal(&format_timestamp(&run.started_at)),
                quote_identifier("DataGenerated")?,
                text_literal(&format_timestamp(&run.generated_at)),
                quote_identifier("taskName")?,
                text_literal(&self.tracking_name),
            ),
        });

        let post_commit = self
            .post_commit
            .iter()
            .map(|sql| Statement {
                kind: StatementKind::PostCommit,
                sql: sql.clone(),
            })
            .collect();

        Ok((statements, post_commit, truncated))
    }

    /// Replace the table's contents with `batch`
    ///
    /// Nothing is committed unless every statement succeeds; on any error the
    /// transaction is dropped and rolled back, leaving prior rows intact.
    pub async fn write(
        &self,
        sink: &mut dyn SqlSink,
        batch: &Batch,
        run: &RunMetadata,
    ) -> Result<WriteSummary, WriteError> {
        let started = Instant::now();
        let (statements, post_commit, truncated_values) = self.render(batch, run)?;
        let insert_statements = statements.iter().filter(|s| s.is_insert()).count();

        let mut tx = sink.begin().await?;
        for statement in &statements {
            tx.execute(statement).await?;
        }
        tx.commit().await?;

        info!(
            table = %batch.table,
            rows = batch.len(),
            inserts = insert_statements,
            truncated = truncated_values,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch committed"
        );

        for statement in &post_commit {
            if let Err(e) = sink.execute(statement).await {
                error!(sql = %statement.sql, error = %e, "Post-commit statement failed");
                return Err(e);
            }
        }

        Ok(WriteSummary {
            rows_written: batch.len(),
            insert_statements,
            truncated_values,
        })
    }
}

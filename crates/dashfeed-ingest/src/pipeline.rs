// Generic fetch -> extract -> normalize -> replace pipeline
//
// A source contributes only a `SourceDescriptor`: how to build its requests
// from configuration, which extractor reads the responses, and the
// destination schema. Everything else is shared.

use crate::config::{SourceConfig, TaskConfig};
use crate::error::{ConfigError, Result};
use crate::extract::{Extractor, RecordExtractor};
use crate::fetch::{RequestSpec, SourceFetcher};
use crate::normalize::{datetime, normalize_batch, TableSchema};
use crate::record::{RawRecord, RawValue, RunMetadata};
use crate::retry::RetryPolicy;
use crate::sink::{PgSink, SqlSink};
use crate::writer::BatchWriter;
use chrono::NaiveDateTime;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Builds the run's requests from the task configuration
pub type RequestBuilder =
    fn(&SourceConfig, &RunMetadata) -> std::result::Result<Vec<RequestSpec>, ConfigError>;

/// Everything that distinguishes one source from another
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    /// Task name used on the command line and in config file names
    pub name: &'static str,
    /// `taskName` of the tracking row
    pub tracking_name: String,
    pub extractor: Extractor,
    pub schema: TableSchema,
    pub requests: RequestBuilder,
    /// Raw field holding the source's own generation time
    pub generated_from: Option<String>,
    pub post_commit: Vec<String>,
    /// Built-in configuration, overridden by file and environment
    pub defaults: TaskConfig,
}

impl SourceDescriptor {
    pub fn new(
        name: &'static str,
        extractor: impl Into<Extractor>,
        schema: TableSchema,
        requests: RequestBuilder,
    ) -> Self {
        Self {
            name,
            tracking_name: name.to_string(),
            extractor: extractor.into(),
            schema,
            requests,
            generated_from: None,
            post_commit: Vec::new(),
            defaults: TaskConfig::default(),
        }
    }

    pub fn tracking_name(mut self, name: impl Into<String>) -> Self {
        self.tracking_name = name.into();
        self
    }

    pub fn generated_from(mut self, field: impl Into<String>) -> Self {
        self.generated_from = Some(field.into());
        self
    }

    pub fn post_commit(mut self, sql: impl Into<String>) -> Self {
        self.post_commit.push(sql.into());
        self
    }

    pub fn default_url(mut self, url: impl Into<String>) -> Self {
        self.defaults.source.url = Some(url.into());
        self
    }

    pub fn default_areas(mut self, prefix: Option<&str>, areas: &[&str]) -> Self {
        self.defaults.source.area_prefix = prefix.map(str::to_string);
        self.defaults.source.areas = areas.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn retry(mut self, attempts: u32, delay_secs: u64) -> Self {
        self.defaults.source.retry_attempts = attempts;
        self.defaults.source.retry_delay_secs = delay_secs;
        self
    }

    pub fn table(&self) -> &str {
        &self.schema.table
    }

    /// Generation times claimed by the records, unparsable ones skipped
    fn claimed_generation(&self, records: &[RawRecord]) -> Vec<NaiveDateTime> {
        let Some(field) = &self.generated_from else {
            return Vec::new();
        };
        records
            .iter()
            .filter_map(|r| datetime::parse_raw(r.field(field)))
            .collect()
    }
}

/// What a completed run did
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub task: String,
    pub table: String,
    pub requests: usize,
    pub records: usize,
    pub rows_written: usize,
    pub insert_statements: usize,
    pub truncated_values: usize,
    pub generated_at: NaiveDateTime,
    pub elapsed: Duration,
}

pub struct Pipeline {
    descriptor: SourceDescriptor,
    config: TaskConfig,
    fetcher: SourceFetcher,
    retry: RetryPolicy,
}

impl Pipeline {
    /// Validates the source settings and prepares the HTTP client
    pub fn new(descriptor: SourceDescriptor, config: TaskConfig) -> Result<Self> {
        config.validate_source()?;
        let fetcher = SourceFetcher::new(
            config.source.timeout_secs,
            config.source.raw_dump_dir.clone(),
        )?;
        let retry = RetryPolicy::from_config(&config.source);

        Ok(Self {
            descriptor,
            config,
            fetcher,
            retry,
        })
    }

    pub fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    fn writer(&self) -> BatchWriter {
        let writer = BatchWriter::new(
            self.descriptor.schema.clone(),
            self.config.database.tracking_table.clone(),
            self.descriptor.tracking_name.clone(),
        )
        .chunk_size(self.config.chunk_size);

        self.descriptor
            .post_commit
            .iter()
            .fold(writer, |writer, sql| writer.post_commit(sql.clone()))
    }

    /// One request, fetched and extracted, with the request's context fields
    /// copied onto every record
    async fn fetch_records(&self, request: &RequestSpec, index: usize) -> Result<Vec<RawRecord>> {
        let response = self
            .fetcher
            .fetch(request)
            .await?
            .ensure_success(&request.endpoint)?;

        self.fetcher
            .dump_raw(
                self.descriptor.name,
                index,
                self.descriptor.extractor.file_extension(),
                &response.body,
            )
            .await;

        let mut records = self.descriptor.extractor.extract(&response.body)?;
        for record in &mut records {
            for (key, value) in &request.context {
                record.insert(key.clone(), RawValue::text(value.clone()));
            }
        }
        Ok(records)
    }

    /// The requests a run issues, in order
    pub fn requests(&self, run: &RunMetadata) -> Result<Vec<RequestSpec>> {
        Ok((self.descriptor.requests)(&self.config.source, run)?)
    }

    /// Fetch and extract every request, retrying each one per the policy
    pub async fn collect(&self, requests: &[RequestSpec]) -> Result<Vec<RawRecord>> {
        let mut records = Vec::new();

        for (index, request) in requests.iter().enumerate() {
            let extracted = self
                .retry
                .run(move |attempt| {
                    debug!(endpoint = %request.endpoint, attempt, "Fetching");
                    self.fetch_records(request, index)
                })
                .await?;

            debug!(
                endpoint = %request.endpoint,
                records = extracted.len(),
                "Extracted records"
            );
            records.extend(extracted);
        }

        info!(
            requests = requests.len(),
            records = records.len(),
            "Source collected"
        );
        Ok(records)
    }

    /// Connect to the configured database and run once
    pub async fn run(&self) -> Result<RunReport> {
        self.config.validate()?;
        let mut sink = PgSink::connect(&self.config.database).await?;
        self.run_with(&mut sink, RunMetadata::start(self.descriptor.name))
            .await
    }

    /// Run once against `sink`
    ///
    /// Nothing is written unless every request was fetched and extracted.
    #[instrument(
        name = "run",
        skip(self, sink, run),
        fields(task = %self.descriptor.name, run_id = %run.run_id)
    )]
    pub async fn run_with(&self, sink: &mut dyn SqlSink, mut run: RunMetadata) -> Result<RunReport> {
        let started = Instant::now();
        info!(table = %self.descriptor.table(), "Starting run");

        let requests = self.requests(&run)?;
        let records = self.collect(&requests).await?;

        run.claim_generated(self.descriptor.claimed_generation(&records));
        let batch = normalize_batch(&records, &self.descriptor.schema, &run);
        let summary = self.writer().write(sink, &batch, &run).await?;

        let report = RunReport {
            task: self.descriptor.name.to_string(),
            table: batch.table.clone(),
            requests: requests.len(),
            records: records.len(),
            rows_written: summary.rows_written,
            insert_statements: summary.insert_statements,
            truncated_values: summary.truncated_values,
            generated_at: run.generated_at,
            elapsed: started.elapsed(),
        };

        info!(
            rows = report.rows_written,
            generated_at = %report.generated_at,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Run complete"
        );
        Ok(report)
    }
}

//! Source descriptors
//!
//! One module per upstream source. Each exposes `descriptor()`, which fully
//! describes the source for the generic [`Pipeline`](crate::pipeline::Pipeline).

pub mod cap_alerts;
pub mod hospital_status;
pub mod ritis_bottlenecks;
pub mod river_gauges;
pub mod usgs_stream_gauges;
pub mod webeoc_shelters;

use crate::config::SourceConfig;
use crate::error::ConfigError;
use crate::fetch::RequestSpec;
use crate::pipeline::SourceDescriptor;
use crate::record::RunMetadata;
use clap::ValueEnum;

/// Every task the binary can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Task {
    HospitalStatus,
    CapAlerts,
    UsgsStreamGauges,
    RitisBottlenecks,
    WebeocShelters,
    RiverGauges,
}

impl Task {
    pub const ALL: [Task; 6] = [
        Task::HospitalStatus,
        Task::CapAlerts,
        Task::UsgsStreamGauges,
        Task::RitisBottlenecks,
        Task::WebeocShelters,
        Task::RiverGauges,
    ];

    pub fn descriptor(self) -> SourceDescriptor {
        match self {
            Task::HospitalStatus => hospital_status::descriptor(),
            Task::CapAlerts => cap_alerts::descriptor(),
            Task::UsgsStreamGauges => usgs_stream_gauges::descriptor(),
            Task::RitisBottlenecks => ritis_bottlenecks::descriptor(),
            Task::WebeocShelters => webeoc_shelters::descriptor(),
            Task::RiverGauges => river_gauges::descriptor(),
        }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }
}

/// One GET per configured endpoint
pub(crate) fn get_each_endpoint(
    source: &SourceConfig,
    _run: &RunMetadata,
) -> Result<Vec<RequestSpec>, ConfigError> {
    let headers = source.parsed_headers()?;
    Ok(source
        .endpoints()
        .into_iter()
        .map(|endpoint| RequestSpec::get(endpoint).headers(headers.clone()))
        .collect())
}

/// A single POST of the rendered body template
pub(crate) fn post_body(
    source: &SourceConfig,
    run: &RunMetadata,
) -> Result<Vec<RequestSpec>, ConfigError> {
    use chrono::Datelike;

    let body = source
        .render_body(run.started_at.year())
        .ok_or_else(|| ConfigError::Invalid("source.body_template is required".to_string()))?;

    Ok(vec![
        RequestSpec::post(source.endpoint()?, body).headers(source.parsed_headers()?)
    ])
}

/// Configured areas, or an error naming the task when none are set
pub(crate) fn require_areas<'a>(
    source: &'a SourceConfig,
    task: &str,
) -> Result<&'a [String], ConfigError> {
    if source.areas.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "{}: source.areas cannot be empty",
            task
        )));
    }
    Ok(&source.areas)
}

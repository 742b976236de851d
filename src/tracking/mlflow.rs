//! MLflow tracking-server sink using the REST API (`/api/2.0/mlflow/...`).

use super::{ExperimentTracker, RunRecord};
use crate::error::{RagError, Result, Service, UpstreamKind};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Serialize)]
struct KeyValue<'a> {
    key: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct Metric<'a> {
    key: &'a str,
    value: f64,
    timestamp: u64,
    step: u64,
}

#[derive(Serialize)]
struct CreateExperiment<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct CreateRun<'a> {
    experiment_id: &'a str,
    run_name: &'a str,
    start_time: u64,
    tags: Vec<KeyValue<'a>>,
}

#[derive(Serialize)]
struct LogBatch<'a> {
    run_id: &'a str,
    params: Vec<KeyValue<'a>>,
    metrics: Vec<Metric<'a>>,
    tags: Vec<KeyValue<'a>>,
}

#[derive(Serialize)]
struct UpdateRun<'a> {
    run_id: &'a str,
    status: &'a str,
    end_time: u64,
}

#[derive(Deserialize)]
struct GetExperimentResponse {
    experiment: ExperimentInfo,
}

#[derive(Deserialize)]
struct ExperimentInfo {
    experiment_id: String,
}

#[derive(Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Deserialize)]
struct CreateRunResponse {
    run: RunResponse,
}

#[derive(Deserialize)]
struct RunResponse {
    info: RunInfo,
}

#[derive(Deserialize)]
struct RunInfo {
    run_id: String,
}

/// Records runs on an MLflow tracking server.
pub struct MlflowTracker {
    client: Client,
    base: String,
    /// Experiment name -> id, resolved once per experiment.
    experiments: RwLock<HashMap<String, String>>,
}

impl MlflowTracker {
    pub fn new(tracking_uri: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RagError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base: tracking_uri.trim_end_matches('/').to_string(),
            experiments: RwLock::new(HashMap::new()),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/api/2.0/mlflow/{}", self.base, method)
    }

    /// Look up an experiment by name, creating it when it does not exist.
    async fn experiment_id(&self, name: &str) -> Result<String> {
        if let Some(id) = self.experiments.read().await.get(name) {
            return Ok(id.clone());
        }

        let response = self
            .client
            .get(self.url("experiments/get-by-name"))
            .query(&[("experiment_name", name)])
            .send()
            .await
            .map_err(|e| RagError::network(Service::Tracking, e))?;

        let id = if response.status() == StatusCode::NOT_FOUND {
            let created: CreateExperimentResponse = send(
                self.client
                    .post(self.url("experiments/create"))
                    .json(&CreateExperiment { name }),
            )
            .await?;
            debug!(experiment = name, id = %created.experiment_id, "created MLflow experiment");
            created.experiment_id
        } else {
            let found: GetExperimentResponse = parse(response).await?;
            found.experiment.experiment_id
        };

        self.experiments
            .write()
            .await
            .insert(name.to_string(), id.clone());
        Ok(id)
    }
}

#[async_trait]
impl ExperimentTracker for MlflowTracker {
    async fn record(&self, run: &RunRecord) -> Result<()> {
        let experiment_id = self.experiment_id(&run.experiment).await?;

        let created: CreateRunResponse = send(self.client.post(self.url("runs/create")).json(
            &CreateRun {
                experiment_id: &experiment_id,
                run_name: &run.run_name,
                start_time: run.start_time_ms,
                tags: vec![KeyValue {
                    key: "mlflow.runName",
                    value: &run.run_name,
                }],
            },
        ))
        .await?;
        let run_id = created.run.info.run_id;

        let batch = LogBatch {
            run_id: &run_id,
            params: key_values(&run.params),
            metrics: run
                .metrics
                .iter()
                .map(|(key, value)| Metric {
                    key,
                    value: *value,
                    timestamp: run.end_time_ms,
                    step: 0,
                })
                .collect(),
            tags: key_values(&run.tags),
        };
        let _: serde_json::Value =
            send(self.client.post(self.url("runs/log-batch")).json(&batch)).await?;

        let _: serde_json::Value = send(self.client.post(self.url("runs/update")).json(
            &UpdateRun {
                run_id: &run_id,
                status: "FINISHED",
                end_time: run.end_time_ms,
            },
        ))
        .await?;

        debug!(experiment = %run.experiment, run = %run.run_name, run_id = %run_id, "run recorded on MLflow");
        Ok(())
    }
}

fn key_values<'a, I>(pairs: I) -> Vec<KeyValue<'a>>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    pairs
        .into_iter()
        .map(|(key, value)| KeyValue { key, value })
        .collect()
}

async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| RagError::network(Service::Tracking, e))?;
    parse(response).await
}

async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| RagError::network(Service::Tracking, e))?;

    if !status.is_success() {
        return Err(RagError::upstream(
            Service::Tracking,
            UpstreamKind::from_status(status.as_u16()),
            body,
        ));
    }

    serde_json::from_str(&body)
        .map_err(|e| RagError::Tracking(format!("Unexpected MLflow response: {}: {}", e, body)))
}

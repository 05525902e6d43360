//! HTTP client for the Director REST API
//!
//! Mutating Director calls answer with a redirect to the task they started.
//! Redirects are never followed: the task id is read from the `Location`
//! header of the response instead.

use async_trait::async_trait;
use broker_common::{Error, Result, Task};
use reqwest::{header, redirect, Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::details::DirectorDetails;
use crate::manifest::{self, Manifest};
use crate::retry::RetryPolicy;
use crate::{DirectorClient, VmIps};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Director client speaking HTTP(S)
pub struct HttpDirectorClient {
    client: Client,
    base_url: Url,
    credentials: Option<(String, String)>,
    retry: RetryPolicy,
}

impl HttpDirectorClient {
    /// Build a client for the Director at `details.url`
    ///
    /// User info embedded in the URL is moved into a basic auth header.
    pub fn new(details: &DirectorDetails, retry: RetryPolicy) -> Result<Self> {
        let (base_url, credentials) = split_credentials(&details.url)?;

        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .connect_timeout(CONNECT_TIMEOUT)
            .danger_accept_invalid_certs(details.skip_tls_verification)
            .build()
            .map_err(|e| {
                error!("Error in building http client: {}", e);
                Error::HttpRequestCreate(e.to_string())
            })?;

        info!("Director client targeting {}", base_url);

        Ok(Self {
            client,
            base_url,
            credentials,
            retry,
        })
    }

    /// Director URL for the given path segments
    ///
    /// Segments are percent-encoded, so a deployment name can never escape
    /// its place in the path.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                Error::HttpRequestCreate(format!("{} cannot take a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        self.authorized(request).send().await.map_err(|e| {
            if e.is_builder() {
                error!("Error in creating http request: {}", e);
                Error::HttpRequestCreate(e.to_string())
            } else {
                error!("Error in connecting to Director: {}", e);
                Error::BoshConnect(e.to_string())
            }
        })
    }

    /// Submit a request that starts a Director task and return the task id
    async fn submit(&self, request: RequestBuilder) -> Result<String> {
        let response = self.send(request).await?;
        debug!("Director answered with status {}", response.status());
        task_id_from_location(&response)
    }
}

/// Strip user info from the Director URL
fn split_credentials(raw: &str) -> Result<(Url, Option<(String, String)>)> {
    let mut url = Url::parse(raw).map_err(|e| {
        error!("Invalid Director URL: {}", e);
        Error::HttpRequestCreate(e.to_string())
    })?;

    let credentials = if url.username().is_empty() {
        None
    } else {
        Some((
            url.username().to_string(),
            url.password().unwrap_or_default().to_string(),
        ))
    };

    // Neither call fails for http(s) URLs, which always have a host
    let _ = url.set_username("");
    let _ = url.set_password(None);

    Ok((url, credentials))
}

/// Read the task id from the trailing segment of the `Location` header
fn task_id_from_location(response: &Response) -> Result<String> {
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    parse_task_id(location).ok_or_else(|| {
        error!("Invalid response from Director, no task location");
        Error::BoshInvalidResponse(format!("missing task location: {:?}", location))
    })
}

pub(crate) fn parse_task_id(location: &str) -> Option<String> {
    let task_id = location.rsplit('/').next().unwrap_or_default();
    if task_id.is_empty() {
        None
    } else {
        Some(task_id.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct DeploymentRecord {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DeploymentDocument {
    #[serde(default)]
    manifest: String,
}

#[derive(Debug, Deserialize)]
struct VmRecord {
    job_name: String,
    #[serde(default)]
    ips: Vec<String>,
}

/// Parse the newline delimited VM listing of a finished `vms` task
///
/// Keeps the first IP of every VM, grouped by job name. Lines that are blank,
/// not JSON, or list no IPs are skipped.
pub fn parse_vm_ips(body: &str) -> VmIps {
    let mut vm_ips = VmIps::new();

    for line in body.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let record: VmRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                warn!("Error in unmarshalling vm details: {}", e);
                continue;
            }
        };

        match record.ips.into_iter().next() {
            Some(ip) => {
                debug!("IP for job {} is {}", record.job_name, ip);
                vm_ips.entry(record.job_name).or_default().push(ip);
            }
            None => warn!("No IPs for job {}", record.job_name),
        }
    }

    vm_ips
}

#[async_trait]
impl DirectorClient for HttpDirectorClient {
    async fn create_deployment(&self, manifest: &Manifest) -> Result<Task> {
        let body = manifest.to_yaml()?;
        debug!("Manifest for deployment {}:\n{}", manifest.name, body);

        let request = self
            .client
            .post(self.endpoint(&["deployments"])?)
            .header(header::CONTENT_TYPE, "text/yaml")
            .body(body);
        let task_id = self.submit(request).await?;

        info!(
            "Successfully initiated deployment {}. Task id is {}",
            manifest.name, task_id
        );
        self.get_task(&task_id).await
    }

    async fn delete_deployment(&self, deployment_name: &str) -> Result<Task> {
        let request = self
            .client
            .delete(self.endpoint(&["deployments", deployment_name])?);
        let task_id = self.submit(request).await?;

        info!(
            "Successfully initiated delete of deployment {}. Task id is {}",
            deployment_name, task_id
        );
        self.get_task(&task_id).await
    }

    async fn get_task(&self, task_id: &str) -> Result<Task> {
        let request = self.client.get(self.endpoint(&["tasks", task_id])?);
        let response = self.send(request).await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(Error::TaskNotFound(task_id.to_string())),
            status => {
                error!("Non OK status code from Director: {}", status);
                return Err(Error::DirectorStatus(status.as_u16()));
            }
        }

        response.json::<Task>().await.map_err(|e| {
            error!("Error in decoding task {} from Director: {}", task_id, e);
            Error::BoshInvalidResponse(e.to_string())
        })
    }

    async fn get_vm_ips(&self, deployment_name: &str) -> Result<VmIps> {
        let mut vms_url = self.endpoint(&["deployments", deployment_name, "vms"])?;
        vms_url.query_pairs_mut().append_pair("format", "full");
        let task_id = self.submit(self.client.get(vms_url)).await?;
        debug!("Initiated vm listing for {}. Task id is {}", deployment_name, task_id);

        let mut output_url = self.endpoint(&["tasks", task_id.as_str(), "output"])?;
        output_url.query_pairs_mut().append_pair("type", "result");
        tokio::time::sleep(self.retry.initial_delay).await;

        for attempt in 1..=self.retry.max_attempts {
            debug!("Attempt {} to get VM details for {}", attempt, deployment_name);
            let response = self.send(self.client.get(output_url.clone())).await?;

            match response.status() {
                StatusCode::OK => {
                    let body = response.text().await.map_err(|e| {
                        error!("Error reading vm listing: {}", e);
                        Error::BoshInvalidResponse(e.to_string())
                    })?;
                    return Ok(parse_vm_ips(&body));
                }
                StatusCode::NO_CONTENT => {}
                status => {
                    error!("Error in getting deployment details. Status code: {}", status);
                    return Err(Error::DirectorStatus(status.as_u16()));
                }
            }

            if let Some(delay) = self.retry.delay_after(attempt) {
                tokio::time::sleep(delay).await;
            }
        }

        error!(
            "Could not get deployment details for {} after {} attempts",
            deployment_name, self.retry.max_attempts
        );
        Err(Error::MaxRetriesExceeded(deployment_name.to_string()))
    }

    async fn list_deployments(&self) -> Result<Vec<String>> {
        let response = self
            .send(self.client.get(self.endpoint(&["deployments"])?))
            .await?;

        if response.status() != StatusCode::OK {
            error!("Error in listing deployments. Status code: {}", response.status());
            return Err(Error::DirectorStatus(response.status().as_u16()));
        }

        let records: Vec<DeploymentRecord> = response.json().await.map_err(|e| {
            error!("Error in decoding deployment list: {}", e);
            Error::BoshInvalidResponse(e.to_string())
        })?;
        Ok(records.into_iter().map(|record| record.name).collect())
    }

    async fn get_deployment_network(&self, deployment_name: &str) -> Result<Option<String>> {
        let request = self
            .client
            .get(self.endpoint(&["deployments", deployment_name])?);
        let response = self.send(request).await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Ok(None),
            status => {
                error!("Error in getting deployment {}. Status code: {}", deployment_name, status);
                return Err(Error::DirectorStatus(status.as_u16()));
            }
        }

        let document: DeploymentDocument = response.json().await.map_err(|e| {
            error!("Error in decoding deployment {}: {}", deployment_name, e);
            Error::BoshInvalidResponse(e.to_string())
        })?;
        manifest::first_network(&document.manifest)
    }
}

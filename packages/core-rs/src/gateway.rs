use crate::artifacts::{DiagramArtifact, DiagramKind, EntityCatalog, FeatureFiles, SchemaOverview};
use crate::config::GatewayConfig;
use crate::error::{Operation, SessionError, SessionResult};
use crate::flows::CallFlowEntry;
use crate::types::{Classification, CloneResult, EndpointList, RepoRequest, SubmitAck};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::error::Category;
use serde_json::Value;
use tracing::debug;
use url::Url;

/// The remote analysis service, one method per operation it exposes.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn submit(&self, request: &RepoRequest) -> SessionResult<SubmitAck>;

    async fn clone_repository(&self, request: &RepoRequest) -> SessionResult<CloneResult>;

    async fn analyze(&self, repo_name: &str) -> SessionResult<Classification>;

    async fn endpoints(&self, repo_name: &str) -> SessionResult<EndpointList>;

    async fn flows(&self, repo_name: &str) -> SessionResult<Vec<CallFlowEntry>>;

    async fn entities(&self, repo_name: &str) -> SessionResult<EntityCatalog>;

    async fn schema_overview(&self, repo_name: &str) -> SessionResult<SchemaOverview>;

    /// Raw OpenAPI document. Only an explicit failure `status` is rejected.
    async fn swagger(&self, repo_name: &str) -> SessionResult<Value>;

    async fn features(&self, repo_name: &str) -> SessionResult<FeatureFiles>;

    async fn diagram(&self, repo_name: &str, kind: DiagramKind) -> SessionResult<DiagramArtifact>;

    async fn markdown_export(&self, repo_name: &str) -> SessionResult<String>;
}

#[derive(Debug, Deserialize)]
struct FlowsPayload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    detail: Option<Value>,
    #[serde(default)]
    flows: Vec<CallFlowEntry>,
}

/// How a JSON body signals success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Envelope {
    /// `status` must be present and equal to `"success"`.
    Required,
    /// Raw documents: only an explicit non-success `status` is a failure.
    Optional,
}

fn pick_message(candidates: [Option<&Value>; 2]) -> Option<String> {
    candidates.into_iter().flatten().find_map(|value| match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Null | Value::String(_) => None,
        other => Some(other.to_string()),
    })
}

fn server_message(body: &Value) -> Option<String> {
    pick_message([body.get("message"), body.get("detail")])
}

fn check_status<F>(operation: Operation, envelope: Envelope, status: Option<&str>, message: F) -> SessionResult<()>
where
    F: FnOnce() -> Option<String>,
{
    match (status, envelope) {
        (Some("success"), _) | (None, Envelope::Optional) => Ok(()),
        _ => {
            let message = message().unwrap_or_else(|| "Unknown error".to_string());
            Err(SessionError::application(operation, message))
        }
    }
}

fn decode_error(operation: Operation, error: serde_json::Error) -> SessionError {
    match error.classify() {
        Category::Data => {
            SessionError::application(operation, format!("unexpected response shape: {error}"))
        }
        Category::Io | Category::Syntax | Category::Eof => {
            SessionError::application(operation, format!("response was not valid JSON: {error}"))
        }
    }
}

fn into_success<T: DeserializeOwned>(operation: Operation, envelope: Envelope, body: Value) -> SessionResult<T> {
    check_status(
        operation,
        envelope,
        body.get("status").and_then(Value::as_str),
        || server_message(&body),
    )?;
    serde_json::from_value(body).map_err(|error| decode_error(operation, error))
}

/// Decode without serde_json's nesting limit, growing the stack on demand.
fn decode_nested<T: DeserializeOwned>(operation: Operation, text: &str) -> SessionResult<T> {
    let mut json = serde_json::Deserializer::from_str(text);
    json.disable_recursion_limit();
    let value = T::deserialize(serde_stacker::Deserializer::new(&mut json))
        .map_err(|error| decode_error(operation, error))?;
    json.end().map_err(|error| decode_error(operation, error))?;
    Ok(value)
}

async fn read_text(operation: Operation, response: Response) -> SessionResult<String> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|error| SessionError::transport(operation, error.to_string()))?;

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .as_ref()
            .and_then(server_message)
            .unwrap_or_else(|| format!("request failed with status {status}"));
        return Err(SessionError::application(operation, message));
    }

    Ok(text)
}

async fn read_json(operation: Operation, response: Response) -> SessionResult<Value> {
    let text = read_text(operation, response).await?;
    serde_json::from_str(&text).map_err(|error| decode_error(operation, error))
}

/// [`Gateway`] over HTTP.
#[derive(Debug)]
pub struct HttpGateway {
    client: Client,
    config: GatewayConfig,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> SessionResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|error| SessionError::config(format!("HTTP client init failed: {error}")))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Link for downloading every generated feature file as one archive.
    pub fn features_download_url(&self, repo_name: &str) -> SessionResult<Url> {
        self.config.endpoint(&["features", "download", repo_name], &[])
    }

    pub fn markdown_export_url(&self, repo_name: &str) -> SessionResult<Url> {
        self.config.endpoint(&["export", "markdown", repo_name], &[])
    }

    async fn get(&self, operation: Operation, url: Url) -> SessionResult<Response> {
        debug!(operation = ?operation, %url, "GET");
        self.client
            .get(url)
            .send()
            .await
            .map_err(|error| SessionError::transport(operation, error.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: Operation,
        envelope: Envelope,
        url: Url,
    ) -> SessionResult<T> {
        let response = self.get(operation, url).await?;
        let body = read_json(operation, response).await?;
        into_success(operation, envelope, body)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        operation: Operation,
        envelope: Envelope,
        url: Url,
        request: &RepoRequest,
    ) -> SessionResult<T> {
        debug!(operation = ?operation, %url, "POST");
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|error| SessionError::transport(operation, error.to_string()))?;
        let body = read_json(operation, response).await?;
        into_success(operation, envelope, body)
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn submit(&self, request: &RepoRequest) -> SessionResult<SubmitAck> {
        let url = self.config.endpoint(&["submit-repo"], &[])?;
        self.post_json(Operation::Submit, Envelope::Optional, url, request).await
    }

    async fn clone_repository(&self, request: &RepoRequest) -> SessionResult<CloneResult> {
        let url = self.config.endpoint(&["clone"], &[])?;
        self.post_json(Operation::Clone, Envelope::Required, url, request).await
    }

    async fn analyze(&self, repo_name: &str) -> SessionResult<Classification> {
        let url = self.config.endpoint(&["analyze", repo_name], &[])?;
        self.get_json(Operation::Analyze, Envelope::Required, url).await
    }

    async fn endpoints(&self, repo_name: &str) -> SessionResult<EndpointList> {
        let url = self.config.endpoint(&["endpoints", repo_name], &[])?;
        self.get_json(Operation::Endpoints, Envelope::Required, url).await
    }

    async fn flows(&self, repo_name: &str) -> SessionResult<Vec<CallFlowEntry>> {
        let url = self.config.endpoint(&["flows", repo_name], &[])?;
        let response = self.get(Operation::Flows, url).await?;
        let text = read_text(Operation::Flows, response).await?;
        let payload: FlowsPayload = decode_nested(Operation::Flows, &text)?;
        check_status(
            Operation::Flows,
            Envelope::Required,
            payload.status.as_deref(),
            || pick_message([payload.message.as_ref(), payload.detail.as_ref()]),
        )?;
        Ok(payload.flows)
    }

    async fn entities(&self, repo_name: &str) -> SessionResult<EntityCatalog> {
        let url = self.config.endpoint(&["entities", repo_name], &[])?;
        self.get_json(Operation::Entities, Envelope::Optional, url).await
    }

    async fn schema_overview(&self, repo_name: &str) -> SessionResult<SchemaOverview> {
        let url = self.config.endpoint(&["schema-overview", repo_name], &[])?;
        self.get_json(Operation::SchemaOverview, Envelope::Required, url).await
    }

    async fn swagger(&self, repo_name: &str) -> SessionResult<Value> {
        let url = self.config.endpoint(&["swagger", repo_name], &[])?;
        let response = self.get(Operation::Swagger, url).await?;
        let document = read_json(Operation::Swagger, response).await?;
        check_status(
            Operation::Swagger,
            Envelope::Optional,
            document.get("status").and_then(Value::as_str),
            || server_message(&document),
        )?;
        Ok(document)
    }

    async fn features(&self, repo_name: &str) -> SessionResult<FeatureFiles> {
        let url = self.config.endpoint(&["features", repo_name], &[])?;
        self.get_json(Operation::Features, Envelope::Required, url).await
    }

    async fn diagram(&self, repo_name: &str, kind: DiagramKind) -> SessionResult<DiagramArtifact> {
        let url = match kind {
            DiagramKind::Class | DiagramKind::Er => self.config.endpoint(
                &["diagrams", "entities", repo_name],
                &[("diagram_type", kind.as_str())],
            )?,
            DiagramKind::UseCase => self.config.endpoint(&["diagrams", "use-cases", repo_name], &[])?,
            DiagramKind::Interaction => {
                self.config.endpoint(&["diagrams", "interaction", repo_name], &[])?
            }
        };
        self.get_json(Operation::Diagram, Envelope::Required, url).await
    }

    async fn markdown_export(&self, repo_name: &str) -> SessionResult<String> {
        let url = self.markdown_export_url(repo_name)?;
        let response = self.get(Operation::MarkdownExport, url).await?;
        read_text(Operation::MarkdownExport, response).await
    }
}

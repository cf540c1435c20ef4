//! In-memory gateway and fixtures for unit tests.

use crate::artifacts::{DiagramArtifact, DiagramKind, EntityCatalog, FeatureFiles, SchemaOverview};
use crate::error::{Operation, SessionError, SessionResult};
use crate::flows::CallFlowEntry;
use crate::gateway::Gateway;
use crate::types::{
    Classification, CloneResult, Endpoint, EndpointList, HttpMethod, RepoRequest, SubmitAck,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Holds a scripted response until the test releases it.
#[derive(Clone, Default)]
pub(crate) struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

/// Answers from per-key scripts; anything unscripted is an application failure.
#[derive(Default)]
pub(crate) struct ScriptedGateway {
    pub submit: HashMap<String, SessionResult<SubmitAck>>,
    pub clone: HashMap<String, SessionResult<CloneResult>>,
    pub clone_gates: HashMap<String, Gate>,
    pub analyze: HashMap<String, SessionResult<Classification>>,
    pub analyze_gates: HashMap<String, Gate>,
    pub endpoint_gates: HashMap<String, Gate>,
    pub endpoints: HashMap<String, SessionResult<EndpointList>>,
    pub flows: HashMap<String, SessionResult<Vec<CallFlowEntry>>>,
    pub entities: HashMap<String, SessionResult<EntityCatalog>>,
    pub schema: HashMap<String, SessionResult<SchemaOverview>>,
    pub features: HashMap<String, SessionResult<FeatureFiles>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

async fn pass(gates: &HashMap<String, Gate>, key: &str) {
    if let Some(gate) = gates.get(key) {
        gate.entered.notify_one();
        gate.release.notified().await;
    }
}

fn scripted<T: Clone>(
    table: &HashMap<String, SessionResult<T>>,
    key: &str,
    operation: Operation,
) -> SessionResult<T> {
    table
        .get(key)
        .cloned()
        .unwrap_or_else(|| Err(SessionError::application(operation, format!("not scripted: {key}"))))
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn submit(&self, request: &RepoRequest) -> SessionResult<SubmitAck> {
        self.record(format!("submit:{}", request.repo_url));
        self.submit.get(&request.repo_url).cloned().unwrap_or_else(|| {
            Ok(SubmitAck {
                message: "Repository details received".to_string(),
            })
        })
    }

    async fn clone_repository(&self, request: &RepoRequest) -> SessionResult<CloneResult> {
        self.record(format!("clone:{}", request.repo_url));
        pass(&self.clone_gates, &request.repo_url).await;
        scripted(&self.clone, &request.repo_url, Operation::Clone)
    }

    async fn analyze(&self, repo_name: &str) -> SessionResult<Classification> {
        self.record(format!("analyze:{repo_name}"));
        pass(&self.analyze_gates, repo_name).await;
        scripted(&self.analyze, repo_name, Operation::Analyze)
    }

    async fn endpoints(&self, repo_name: &str) -> SessionResult<EndpointList> {
        self.record(format!("endpoints:{repo_name}"));
        pass(&self.endpoint_gates, repo_name).await;
        scripted(&self.endpoints, repo_name, Operation::Endpoints)
    }

    async fn flows(&self, repo_name: &str) -> SessionResult<Vec<CallFlowEntry>> {
        self.record(format!("flows:{repo_name}"));
        scripted(&self.flows, repo_name, Operation::Flows)
    }

    async fn entities(&self, repo_name: &str) -> SessionResult<EntityCatalog> {
        self.record(format!("entities:{repo_name}"));
        scripted(&self.entities, repo_name, Operation::Entities)
    }

    async fn schema_overview(&self, repo_name: &str) -> SessionResult<SchemaOverview> {
        self.record(format!("schema:{repo_name}"));
        scripted(&self.schema, repo_name, Operation::SchemaOverview)
    }

    async fn swagger(&self, repo_name: &str) -> SessionResult<Value> {
        self.record(format!("swagger:{repo_name}"));
        Err(SessionError::application(Operation::Swagger, "not scripted"))
    }

    async fn features(&self, repo_name: &str) -> SessionResult<FeatureFiles> {
        self.record(format!("features:{repo_name}"));
        scripted(&self.features, repo_name, Operation::Features)
    }

    async fn diagram(&self, repo_name: &str, kind: DiagramKind) -> SessionResult<DiagramArtifact> {
        self.record(format!("diagram:{repo_name}:{kind}"));
        Err(SessionError::application(Operation::Diagram, "not scripted"))
    }

    async fn markdown_export(&self, repo_name: &str) -> SessionResult<String> {
        self.record(format!("markdown:{repo_name}"));
        Err(SessionError::application(Operation::MarkdownExport, "not scripted"))
    }
}

pub(crate) fn spring_boot() -> Classification {
    Classification {
        project_type: "Spring Boot".to_string(),
        build_system: "Maven".to_string(),
        is_spring_boot: true,
        is_bootable: true,
        has_maven: true,
        has_gradle: false,
        message: "Spring Boot project detected".to_string(),
    }
}

pub(crate) fn plain_java() -> Classification {
    Classification {
        project_type: "Java".to_string(),
        build_system: "Gradle".to_string(),
        is_spring_boot: false,
        is_bootable: false,
        has_maven: false,
        has_gradle: true,
        message: "Plain Java project".to_string(),
    }
}

pub(crate) fn endpoint(controller: &str, method: &str, http_method: HttpMethod, path: &str) -> Endpoint {
    Endpoint {
        controller: controller.to_string(),
        method: method.to_string(),
        http_method,
        path: path.to_string(),
    }
}

pub(crate) fn cloned(repo_name: &str) -> SessionResult<CloneResult> {
    Ok(CloneResult {
        repo_name: repo_name.to_string(),
        message: None,
    })
}

use crate::error::{SessionError, SessionResult};
use crate::gateway::Gateway;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityField {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub annotations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default)]
    pub fields: Vec<EntityField>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCatalog {
    #[serde(default)]
    pub entities: BTreeMap<String, Entity>,
}

impl EntityCatalog {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaTable {
    #[serde(default)]
    pub entity: String,
    #[serde(default)]
    pub relations: Vec<String>,
    #[serde(default)]
    pub used_by: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaEntity {
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default)]
    pub fields: Vec<EntityField>,
    #[serde(default)]
    pub column_mappings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaOverview {
    #[serde(default)]
    pub tables: BTreeMap<String, SchemaTable>,
    #[serde(default)]
    pub entities: BTreeMap<String, SchemaEntity>,
}

impl SchemaOverview {
    /// Table relations as a Mermaid `graph TD` block.
    pub fn relations_graph(&self) -> String {
        let mut lines = vec!["graph TD".to_string()];
        lines.extend(self.tables.keys().map(|table| format!("  {table}[{table}]")));
        for (table, data) in &self.tables {
            lines.extend(data.relations.iter().map(|relation| format!("  {table} --> {relation}")));
        }
        lines.join("\n")
    }

    pub fn entity_for_table(&self, table: &str) -> Option<&SchemaEntity> {
        let entity = &self.tables.get(table)?.entity;
        self.entities.get(entity)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFile {
    pub filename: String,
    #[serde(default)]
    pub controller: String,
    #[serde(default)]
    pub endpoint_count: usize,
    #[serde(default)]
    pub preview: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFiles {
    #[serde(default)]
    pub feature_files: Vec<FeatureFile>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagramKind {
    #[default]
    Class,
    Er,
    UseCase,
    Interaction,
}

impl DiagramKind {
    pub const ALL: [DiagramKind; 4] = [
        DiagramKind::Class,
        DiagramKind::Er,
        DiagramKind::UseCase,
        DiagramKind::Interaction,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DiagramKind::Class => "class",
            DiagramKind::Er => "er",
            DiagramKind::UseCase => "use-case",
            DiagramKind::Interaction => "interaction",
        }
    }
}

impl fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiagramKind {
    type Err = SessionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        DiagramKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| SessionError::validation(format!("Unknown diagram type: {value}")))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramArtifact {
    #[serde(default)]
    pub diagram_url: Option<String>,
    #[serde(default)]
    pub puml_source: Option<String>,
}

/// Read-only artifacts for one repository. Each slot succeeds or fails on its own.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSet {
    pub repo_name: String,
    pub diagram_kind: DiagramKind,
    pub entities: SessionResult<EntityCatalog>,
    pub schema: SessionResult<SchemaOverview>,
    pub swagger: SessionResult<Value>,
    pub features: SessionResult<FeatureFiles>,
    pub diagram: SessionResult<DiagramArtifact>,
}

impl ArtifactSet {
    pub async fn load<G: Gateway + ?Sized>(gateway: &G, repo_name: &str, diagram_kind: DiagramKind) -> Self {
        let (entities, schema, swagger, features, diagram) = tokio::join!(
            gateway.entities(repo_name),
            gateway.schema_overview(repo_name),
            gateway.swagger(repo_name),
            gateway.features(repo_name),
            gateway.diagram(repo_name, diagram_kind),
        );

        let set = Self {
            repo_name: repo_name.to_string(),
            diagram_kind,
            entities,
            schema,
            swagger,
            features,
            diagram,
        };

        for error in set.failures() {
            warn!(repo = repo_name, error = %error, "artifact fetch failed");
        }
        info!(repo = repo_name, failed = set.failures().len(), "artifacts loaded");
        set
    }

    pub fn failures(&self) -> Vec<&SessionError> {
        [
            self.entities.as_ref().err(),
            self.schema.as_ref().err(),
            self.swagger.as_ref().err(),
            self.features.as_ref().err(),
            self.diagram.as_ref().err(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// A user-supplied repository URL that has passed local validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryReference {
    url: String,
}

impl RepositoryReference {
    pub fn parse(input: &str) -> Result<Self, SessionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SessionError::validation("Repository URL is required."));
        }

        Url::parse(trimmed)
            .map_err(|_| SessionError::validation("Invalid Repository URL format."))?;

        Ok(Self {
            url: trimmed.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Body shared by the submit and clone operations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoRequest {
    pub repo_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl RepoRequest {
    pub fn public(reference: &RepositoryReference) -> Self {
        Self {
            repo_url: reference.as_str().to_string(),
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitAck {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloneResult {
    pub repo_name: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Project classification as reported by the analyze operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Classification {
    #[serde(default)]
    pub project_type: String,
    #[serde(default)]
    pub build_system: String,
    #[serde(default)]
    pub is_spring_boot: bool,
    #[serde(default)]
    pub is_bootable: bool,
    #[serde(default)]
    pub has_maven: bool,
    #[serde(default)]
    pub has_gradle: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Other(String),
}

impl HttpMethod {
    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Other(value) => value,
        }
    }
}

impl From<String> for HttpMethod {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "DELETE" => HttpMethod::Delete,
            "PATCH" => HttpMethod::Patch,
            _ => HttpMethod::Other(value),
        }
    }
}

impl From<HttpMethod> for String {
    fn from(value: HttpMethod) -> Self {
        match value {
            HttpMethod::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Endpoint {
    pub controller: String,
    pub method: String,
    pub http_method: HttpMethod,
    pub path: String,
}

/// Result of the endpoint extraction stage, in the order the service returned it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointList {
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub message: Option<String>,
}

use crate::types::{Classification, EndpointList};
use serde::Serialize;
use std::collections::HashSet;

/// Counts shown next to the classification. Always derived, never stored on their own.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct ProjectCounts {
    pub endpoints_count: usize,
    pub controllers_count: usize,
    /// `None` until something reconciles feature files back into the snapshot.
    pub features_count: Option<usize>,
    /// `None` until something reconciles entities back into the snapshot.
    pub entities_count: Option<usize>,
}

pub fn derive_counts(endpoints: Option<&EndpointList>) -> ProjectCounts {
    let Some(list) = endpoints else {
        return ProjectCounts::default();
    };

    let controllers: HashSet<&str> = list
        .endpoints
        .iter()
        .map(|endpoint| endpoint.controller.as_str())
        .collect();

    ProjectCounts {
        endpoints_count: list.endpoints.len(),
        controllers_count: controllers.len(),
        features_count: None,
        entities_count: None,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProjectInfo {
    #[serde(flatten)]
    pub classification: Classification,
    #[serde(flatten)]
    counts: ProjectCounts,
}

impl ProjectInfo {
    pub fn counts(&self) -> &ProjectCounts {
        &self.counts
    }

    pub fn is_spring_boot(&self) -> bool {
        self.classification.is_spring_boot
    }
}

/// Everything known about the repository of the current workflow.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ProjectSnapshot {
    repo_name: Option<String>,
    project_info: Option<ProjectInfo>,
    endpoints: Option<EndpointList>,
}

impl ProjectSnapshot {
    pub fn repo_name(&self) -> Option<&str> {
        self.repo_name.as_deref()
    }

    pub fn project_info(&self) -> Option<&ProjectInfo> {
        self.project_info.as_ref()
    }

    pub fn endpoints(&self) -> Option<&EndpointList> {
        self.endpoints.as_ref()
    }

    pub fn counts(&self) -> ProjectCounts {
        derive_counts(self.endpoints.as_ref())
    }

    pub fn assign_repo(&mut self, repo_name: impl Into<String>) {
        self.repo_name = Some(repo_name.into());
    }

    pub fn apply_classification(&mut self, classification: Classification) {
        self.project_info = Some(ProjectInfo {
            classification,
            counts: derive_counts(self.endpoints.as_ref()),
        });
    }

    pub fn merge_endpoints(&mut self, endpoints: EndpointList) {
        self.endpoints = Some(endpoints);
        self.refresh_counts();
    }

    fn refresh_counts(&mut self) {
        let counts = derive_counts(self.endpoints.as_ref());
        if let Some(info) = self.project_info.as_mut() {
            info.counts = counts;
        }
    }
}

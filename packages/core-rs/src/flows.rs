//! Call-flow traces: one recursive call tree per endpoint, a bounded
//! traversal over it, and the expand/collapse state of the flow board.

use crate::error::SessionResult;
use crate::gateway::Gateway;
use crate::types::HttpMethod;
use serde::{Deserialize, Serialize};
use std::mem;
use tracing::info;

/// Nodes deeper than this are summarized instead of walked.
pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassType {
    Controller,
    Service,
    Repository,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallNode {
    pub class_name: String,
    #[serde(default)]
    pub class_type: ClassType,
    pub method: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub calls: Vec<CallNode>,
}

impl CallNode {
    pub fn new(class_name: impl Into<String>, class_type: ClassType, method: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            class_type,
            method: method.into(),
            parameters: Vec::new(),
            return_type: None,
            calls: Vec::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<Parameter>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn returning(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = Some(return_type.into());
        self
    }

    pub fn with_calls(mut self, calls: Vec<CallNode>) -> Self {
        self.calls = calls;
        self
    }
}

// Flatten the subtree before it is freed so deep chains don't recurse in drop.
impl Drop for CallNode {
    fn drop(&mut self) {
        let mut pending = mem::take(&mut self.calls);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.calls);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFlowEntry {
    pub http_method: HttpMethod,
    pub endpoint: String,
    pub controller: String,
    #[serde(default)]
    pub flow: Vec<CallNode>,
}

impl CallFlowEntry {
    pub fn walk(&self, max_depth: usize) -> FlowWalk<'_> {
        FlowWalk::new(&self.flow, max_depth)
    }

    pub fn node_count(&self) -> usize {
        self.walk(usize::MAX)
            .filter(|step| matches!(step, FlowStep::Node { .. }))
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStep<'a> {
    Node { depth: usize, node: &'a CallNode },
    /// Stands in for the `hidden` direct calls of a node at `depth - 1`.
    DepthLimit { depth: usize, hidden: usize },
}

enum Frame<'a> {
    Visit(usize, &'a CallNode),
    Limit(usize, usize),
}

/// Pre-order walk over a call forest with an explicit stack.
pub struct FlowWalk<'a> {
    stack: Vec<Frame<'a>>,
    max_depth: usize,
}

impl<'a> FlowWalk<'a> {
    pub fn new(roots: &'a [CallNode], max_depth: usize) -> Self {
        let stack = roots.iter().rev().map(|node| Frame::Visit(0, node)).collect();
        Self { stack, max_depth }
    }
}

impl<'a> Iterator for FlowWalk<'a> {
    type Item = FlowStep<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.stack.pop()? {
            Frame::Limit(depth, hidden) => Some(FlowStep::DepthLimit { depth, hidden }),
            Frame::Visit(depth, node) => {
                if !node.calls.is_empty() {
                    let child_depth = depth.saturating_add(1);
                    if child_depth > self.max_depth {
                        self.stack.push(Frame::Limit(child_depth, node.calls.len()));
                    } else {
                        self.stack
                            .extend(node.calls.iter().rev().map(|child| Frame::Visit(child_depth, child)));
                    }
                }
                Some(FlowStep::Node { depth, node })
            }
        }
    }
}

pub fn format_parameters(parameters: &[Parameter]) -> String {
    let joined = parameters
        .iter()
        .map(|parameter| format!("{} {}", parameter.type_name, parameter.name))
        .collect::<Vec<String>>()
        .join(", ");
    format!("({joined})")
}

pub fn format_signature(node: &CallNode) -> String {
    let mut signature = format!(
        "{}.{}{}",
        node.class_name,
        node.method,
        format_parameters(&node.parameters)
    );
    if let Some(return_type) = node.return_type.as_deref().filter(|value| !value.is_empty()) {
        signature.push_str(" returns ");
        signature.push_str(return_type);
    }
    signature
}

pub fn render_header(entry: &CallFlowEntry) -> String {
    format!("{} {} [{}]", entry.http_method, entry.endpoint, entry.controller)
}

/// Header line followed by one indented line per visited call.
pub fn render_entry(entry: &CallFlowEntry, max_depth: usize) -> Vec<String> {
    let mut lines = vec![render_header(entry)];
    for step in entry.walk(max_depth) {
        match step {
            FlowStep::Node { depth, node } => {
                let indent = "  ".repeat(depth + 1);
                let arrow = if depth == 0 { "" } else { "→ " };
                lines.push(format!("{indent}{arrow}{}", format_signature(node)));
            }
            FlowStep::DepthLimit { depth, hidden } => {
                let indent = "  ".repeat(depth + 1);
                lines.push(format!("{indent}… {hidden} more call(s) beyond depth {max_depth}"));
            }
        }
    }
    lines
}

/// Fetched flow entries for one repository plus which of them are expanded.
#[derive(Debug, Clone)]
pub struct FlowBoard {
    repo_name: String,
    entries: Vec<CallFlowEntry>,
    expanded: Vec<bool>,
}

impl FlowBoard {
    pub fn new(repo_name: impl Into<String>, entries: Vec<CallFlowEntry>) -> Self {
        let expanded = vec![false; entries.len()];
        Self {
            repo_name: repo_name.into(),
            entries,
            expanded,
        }
    }

    pub async fn load<G: Gateway + ?Sized>(gateway: &G, repo_name: &str) -> SessionResult<Self> {
        let entries = gateway.flows(repo_name).await?;
        info!(repo = repo_name, flows = entries.len(), "loaded call flows");
        Ok(Self::new(repo_name, entries))
    }

    pub fn repo_name(&self) -> &str {
        &self.repo_name
    }

    pub fn entries(&self) -> &[CallFlowEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_expanded(&self, index: usize) -> bool {
        self.expanded.get(index).copied().unwrap_or(false)
    }

    pub fn any_expanded(&self) -> bool {
        self.expanded.iter().any(|value| *value)
    }

    /// Flip one entry. Returns the new state; out-of-range indexes stay collapsed.
    pub fn toggle(&mut self, index: usize) -> bool {
        match self.expanded.get_mut(index) {
            Some(value) => {
                *value = !*value;
                *value
            }
            None => false,
        }
    }

    pub fn expand_all(&mut self) {
        self.expanded.iter_mut().for_each(|value| *value = true);
    }

    pub fn collapse_all(&mut self) {
        self.expanded.iter_mut().for_each(|value| *value = false);
    }

    /// Collapse everything if anything is open, otherwise open everything.
    pub fn toggle_all(&mut self) {
        if self.any_expanded() {
            self.collapse_all();
        } else {
            self.expand_all();
        }
    }

    pub fn expanded_entries(&self) -> impl Iterator<Item = (usize, &CallFlowEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(index, _)| self.is_expanded(*index))
    }
}

use serde::{Deserialize, Serialize};
use std::path::Path;
use anyhow::Result;
use tokio::fs;

// The shape of a tool entry (matches tools.json)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    // Ordered by priority: the first keyword that matches selects the tool
    pub keywords: Vec<String>,
}

impl Tool {
    pub fn new(name: &str, description: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn matches(&self, lowered_input: &str) -> bool {
        self.keywords
            .iter()
            .any(|kw| !kw.trim().is_empty() && lowered_input.contains(&kw.to_lowercase()))
    }
}

/// Ordered, read-only tool catalog. Registry order is match-priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    tools: Vec<Tool>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Registry {
    pub fn new(tools: Vec<Tool>) -> Self {
        Self { tools }
    }

    // The catalog the service ships with
    pub fn builtin() -> Self {
        Self::new(vec![
            Tool::new(
                "analyze_image",
                "Inspect an uploaded site image for hazards",
                &["analyze image", "image analysis"],
            ),
            Tool::new(
                "categorize_machinery",
                "Group detected machinery into equipment classes",
                &["categorize machinery", "machinery categorization"],
            ),
            Tool::new(
                "summarize_report",
                "Condense a risk report into a short summary",
                &["summary", "summarize report"],
            ),
        ])
    }

    // Reads a tools.json file and returns the catalog it describes
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // 1. Read the JSON file
        let content = fs::read_to_string(path).await
            .map_err(|e| anyhow::anyhow!("Failed to read registry at '{}': {}", path.display(), e))?;

        // 2. Parse it
        let tools: Vec<Tool> = serde_json::from_str(&content)?;

        // 3. Sanity check: a tool without keywords can never be selected
        for tool in &tools {
            if tool.keywords.iter().all(|k| k.trim().is_empty()) {
                tracing::warn!("Tool '{}' registered without keywords; it will never match", tool.name);
            }
        }

        Ok(Self::new(tools))
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Returns the names of every tool whose keywords appear in `text`.
    ///
    /// Matching is case-insensitive. Each tool is reported at most once and the
    /// result follows registry order, not the position of the match in `text`.
    pub fn determine_tools(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let lowered = text.to_lowercase();

        self.tools
            .iter()
            .filter(|tool| tool.matches(&lowered))
            .map(|tool| tool.name.clone())
            .collect()
    }
}

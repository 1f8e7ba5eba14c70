//! Comparison prompt construction.

use agentperf_common::MetricsArtifact;
use std::path::Path;
use tracing::{debug, warn};

pub const FIRST_PLACEHOLDER: &str = "{first}";
pub const SECOND_PLACEHOLDER: &str = "{second}";

const INTRO: &str = "I have two performance test results from running the Microsoft Agent \
Framework in different environments. Please analyze and compare these results.";

/// Built-in template, used whenever the on-disk template cannot be read.
pub const DEFAULT_TEMPLATE: &str = "I have two performance test results from running the \
Microsoft Agent Framework in different environments. Please analyze and compare these results.

**First Test Result:**
```json
{first}
```

**Second Test Result:**
```json
{second}
```

Please provide a comprehensive comparison that includes:

1. **Test Configuration Comparison:**
   - Language/Framework used
   - AI Provider and Model
   - Test mode and configuration
   - Warmup status
   - Test timestamp

2. **Performance Metrics Analysis:**
   - Total execution time comparison (which is faster and by what percentage?)
   - Average time per iteration (which has better average performance?)
   - Min/Max iteration times (which has more consistent performance?)
   - Percentiles (P90/P95/P99) and standard deviation

3. **Resource Usage:**
   - Memory consumption comparison
   - CPU utilization comparison
   - Efficiency analysis (performance vs resource usage)

4. **Test Mode Specific Metrics:**
   - Streaming performance and time to first token (if applicable)

5. **Key Insights:**
   - Which implementation performs better overall?
   - What are the notable differences?
   - Any recommendations based on the results?

6. **Statistical Summary:**
   - Provide a clear winner or note if results are comparable
   - Highlight any significant performance gaps
   - Consider both speed and resource efficiency

Please format your response in a clear, structured way with percentages and concrete numbers for easy understanding.";

/// Read a template from disk, falling back to [`DEFAULT_TEMPLATE`] when the
/// file is missing, unreadable, not UTF-8, or blank.
pub fn load_template(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(body) if !body.trim().is_empty() => {
            debug!(path = %path.display(), "loaded comparison template");
            body
        }
        Ok(_) => {
            debug!(path = %path.display(), "comparison template is blank, using built-in");
            DEFAULT_TEMPLATE.to_string()
        }
        Err(error) => {
            debug!(path = %path.display(), %error, "comparison template unavailable, using built-in");
            DEFAULT_TEMPLATE.to_string()
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComparisonPromptBuilder {
    template: String,
}

impl Default for ComparisonPromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl ComparisonPromptBuilder {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self::new(load_template(path))
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn build(&self, first: &MetricsArtifact, second: &MetricsArtifact) -> String {
        build(&self.template, first, second)
    }
}

/// Fill `template` with the pretty JSON of both artifacts.
///
/// With both placeholders present they are substituted in place.
/// Otherwise the fixed introduction and both fenced blocks come first and
/// the whole template follows as instructions.
pub fn build(template: &str, first: &MetricsArtifact, second: &MetricsArtifact) -> String {
    let first_json = pretty(first);
    let second_json = pretty(second);

    if template.contains(FIRST_PLACEHOLDER) && template.contains(SECOND_PLACEHOLDER) {
        return substitute(template, &first_json, &second_json);
    }

    format!(
        "{INTRO}\n\n**First Test Result:**\n```json\n{first_json}\n```\n\n\
         **Second Test Result:**\n```json\n{second_json}\n```\n\n{template}"
    )
}

/// Replace placeholders in the template text only, never inside the
/// inserted JSON.
fn substitute(template: &str, first: &str, second: &str) -> String {
    template
        .split(FIRST_PLACEHOLDER)
        .map(|piece| piece.replace(SECOND_PLACEHOLDER, second))
        .collect::<Vec<_>>()
        .join(first)
}

fn pretty(artifact: &MetricsArtifact) -> String {
    artifact.to_pretty_json().unwrap_or_else(|error| {
        warn!(%error, "artifact could not be serialized for prompt");
        "{}".to_string()
    })
}

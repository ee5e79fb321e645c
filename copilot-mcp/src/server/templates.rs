//! Prompt templates for the preset tools (`review`, `brainstorm`).

use schemars::JsonSchema;
use serde::Deserialize;

/// Review focus presets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewType {
    CodeQuality,
    Security,
    Performance,
    BestPractices,
    Architecture,
    Testing,
    Documentation,
    Accessibility,
    #[default]
    Comprehensive,
}

impl ReviewType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::CodeQuality => "code-quality",
            Self::Security => "security",
            Self::Performance => "performance",
            Self::BestPractices => "best-practices",
            Self::Architecture => "architecture",
            Self::Testing => "testing",
            Self::Documentation => "documentation",
            Self::Accessibility => "accessibility",
            Self::Comprehensive => "comprehensive",
        }
    }

    const fn focus(self) -> &'static str {
        match self {
            Self::CodeQuality => {
                "Focus on code structure, readability, maintainability, design patterns, \
                 and clean code practices."
            }
            Self::Security => {
                "Focus on security vulnerabilities, authentication issues, input validation, \
                 injection risks, and secure coding practices."
            }
            Self::Performance => {
                "Focus on performance bottlenecks, inefficient algorithms, memory usage, \
                 caching opportunities, and optimization potential."
            }
            Self::BestPractices => {
                "Focus on language-specific best practices, conventions, and idiomatic code."
            }
            Self::Architecture => {
                "Focus on system design, component coupling, separation of concerns, \
                 scalability, and architectural patterns."
            }
            Self::Testing => {
                "Focus on test coverage, test quality, edge cases, and testing best practices."
            }
            Self::Documentation => {
                "Focus on code documentation, comments, README files, and API documentation."
            }
            Self::Accessibility => {
                "Focus on web accessibility (WCAG), semantic HTML, ARIA attributes, \
                 keyboard navigation, and inclusive design."
            }
            Self::Comprehensive => {
                "Perform a comprehensive review covering security, performance, code quality, \
                 best practices, and architecture."
            }
        }
    }
}

/// Minimum severity filter for review findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    const fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Brainstorming frameworks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Methodology {
    Divergent,
    Convergent,
    Scamper,
    DesignThinking,
    Lateral,
    #[default]
    Auto,
}

impl Methodology {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Divergent => "divergent",
            Self::Convergent => "convergent",
            Self::Scamper => "scamper",
            Self::DesignThinking => "design-thinking",
            Self::Lateral => "lateral",
            Self::Auto => "auto",
        }
    }

    const fn instructions(self) -> &'static str {
        match self {
            Self::Divergent => {
                "**Divergent Thinking Approach:**\n\
                 - Generate maximum quantity of ideas without self-censoring\n\
                 - Build on wild or seemingly impractical ideas\n\
                 - Combine unrelated concepts for unexpected solutions\n\
                 - Postpone evaluation until all ideas are generated"
            }
            Self::Convergent => {
                "**Convergent Thinking Approach:**\n\
                 - Focus on refining and improving existing concepts\n\
                 - Synthesize related ideas into stronger solutions\n\
                 - Prioritize based on feasibility and impact\n\
                 - Develop implementation pathways for top ideas"
            }
            Self::Scamper => {
                "**SCAMPER Creative Triggers:**\n\
                 - Substitute: what can be substituted or replaced?\n\
                 - Combine: what can be combined or merged?\n\
                 - Adapt: what can be adapted from other domains?\n\
                 - Modify: what can be magnified, minimized, or altered?\n\
                 - Put to other use: how else can this be used?\n\
                 - Eliminate: what can be removed or simplified?\n\
                 - Reverse: what can be rearranged or reversed?"
            }
            Self::DesignThinking => {
                "**Human-Centered Design Thinking:**\n\
                 - Empathize: consider user needs, pain points, and contexts\n\
                 - Define: frame problems from the user perspective\n\
                 - Ideate: generate user-focused solutions\n\
                 - Prototype mindset: focus on testable, iterative concepts"
            }
            Self::Lateral => {
                "**Lateral Thinking Approach:**\n\
                 - Make unexpected connections between unrelated fields\n\
                 - Challenge fundamental assumptions\n\
                 - Apply metaphors and analogies from other domains\n\
                 - Reverse conventional thinking patterns"
            }
            Self::Auto => {
                "**Combined Approach:**\n\
                 - Divergent exploration with domain-specific knowledge\n\
                 - SCAMPER triggers and lateral thinking\n\
                 - Human-centered perspective for practical value"
            }
        }
    }
}

/// Build the instruction prompt for a code review run.
pub fn review_prompt(
    target: &str,
    review_type: ReviewType,
    severity: Option<Severity>,
    exclude_patterns: &[String],
    max_issues: usize,
    include_fix_suggestions: bool,
    include_priority_ranking: bool,
) -> String {
    let mut prompt = format!(
        "Please perform a {} code review of {target}. {}",
        review_type.label(),
        review_type.focus()
    );

    if let Some(severity) = severity {
        prompt.push_str(&format!(
            " Only report issues of {} severity or higher.",
            severity.label()
        ));
    }
    if !exclude_patterns.is_empty() {
        prompt.push_str(&format!(
            " Exclude files matching these patterns: {}.",
            exclude_patterns.join(", ")
        ));
    }
    prompt.push_str(&format!(" Limit to the top {max_issues} most important issues."));
    if include_fix_suggestions {
        prompt.push_str(
            " For each issue, provide specific fix suggestions with code examples \
             where applicable.",
        );
    }
    if include_priority_ranking {
        prompt.push_str(" Rank issues by priority (Critical, High, Medium, Low) and impact.");
    }
    prompt.push_str(
        " Format the response as a well-structured Markdown report with sections, \
         code blocks, and clear headings. Include a summary section with statistics, \
         key findings, and overall assessment.",
    );
    prompt
}

/// Build the structured prompt for a brainstorming run.
pub fn brainstorm_prompt(
    challenge: &str,
    methodology: Methodology,
    domain: Option<&str>,
    constraints: Option<&str>,
    existing_context: Option<&str>,
    idea_count: usize,
    include_analysis: bool,
) -> String {
    let mut prompt = format!(
        "# BRAINSTORMING SESSION\n\n\
         ## Challenge: {challenge}\n\n\
         ## Framework\n{}\n\n\
         ## Context\n",
        methodology.instructions()
    );

    if let Some(domain) = domain {
        prompt.push_str(&format!("Domain: {domain}\n"));
    }
    if let Some(constraints) = constraints {
        prompt.push_str(&format!("Constraints: {constraints}\n"));
    }
    if let Some(context) = existing_context {
        prompt.push_str(&format!("Background: {context}\n"));
    }

    prompt.push_str(&format!(
        "\n## Requirements\n\
         Generate {idea_count} actionable ideas. Keep descriptions concise \
         (2-3 sentences max).\n"
    ));
    if include_analysis {
        prompt.push_str(
            "\n## Analysis\nRate each: Feasibility (1-5), Impact (1-5), Innovation (1-5)\n",
        );
    }
    prompt.push_str(
        "\n## Format\n\
         ### Idea [N]: [Name]\n\
         Description: [2-3 sentences]\n",
    );
    if include_analysis {
        prompt.push_str("Ratings: F:[1-5] I:[1-5] N:[1-5]\n");
    }
    prompt.push_str("\nBegin:");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_prompt_carries_focus_and_filters() {
        let prompt = review_prompt(
            "@src/auth",
            ReviewType::Security,
            Some(Severity::High),
            &["*.test.ts".to_string()],
            10,
            true,
            false,
        );
        assert!(prompt.starts_with("Please perform a security code review of @src/auth."));
        assert!(prompt.contains("security vulnerabilities"));
        assert!(prompt.contains("high severity or higher"));
        assert!(prompt.contains("*.test.ts"));
        assert!(prompt.contains("top 10 most important issues"));
        assert!(prompt.contains("fix suggestions"));
        assert!(!prompt.contains("Rank issues by priority"));
    }

    #[test]
    fn review_type_deserializes_from_kebab_case() {
        let t: ReviewType = serde_json::from_str(r#""best-practices""#).unwrap();
        assert_eq!(t, ReviewType::BestPractices);
    }

    #[test]
    fn brainstorm_prompt_includes_framework_and_counts() {
        let prompt = brainstorm_prompt(
            "reduce cold-start latency",
            Methodology::Scamper,
            Some("infrastructure"),
            None,
            None,
            5,
            true,
        );
        assert!(prompt.contains("## Challenge: reduce cold-start latency"));
        assert!(prompt.contains("SCAMPER"));
        assert!(prompt.contains("Domain: infrastructure"));
        assert!(prompt.contains("Generate 5 actionable ideas"));
        assert!(prompt.contains("Feasibility (1-5)"));
        assert!(prompt.ends_with("Begin:"));
    }

    #[test]
    fn brainstorm_analysis_section_is_optional() {
        let prompt = brainstorm_prompt("x", Methodology::Auto, None, None, None, 12, false);
        assert!(!prompt.contains("## Analysis"));
        assert!(!prompt.contains("Ratings:"));
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Input validator: purely syntactic screening of task descriptions.
//!
//! A fixed table of threat patterns is matched case-insensitively against
//! the description. Each match carries a severity class and a risk
//! increment; the summed risk is capped and drives the verdict together
//! with the highest severity seen. Nothing is ever executed or resolved;
//! matching is substring/word scanning only.

use cortex_core::ValidatorConfig;
use serde::Serialize;

/// Cap on summed risk so one spammy description cannot overflow scoring.
const MAX_RISK: u32 = 100;

/// Severity class of a threat pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

/// Admission verdict for a submitted description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Admit unchanged.
    Allow,
    /// Admit, but mark the task for later review.
    Flag,
    /// Refuse admission; no task is created, no worker is contacted.
    Reject,
}

/// One matched threat pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreatMatch {
    /// Threat category, e.g. `instruction-override`.
    pub category: &'static str,
    /// The pattern that matched.
    pub pattern: &'static str,
    pub severity: Severity,
    pub risk: u32,
}

/// Outcome of validating one description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub verdict: Verdict,
    /// Summed risk of all matches, capped at 100.
    pub risk: u32,
    pub threats: Vec<ThreatMatch>,
}

impl ValidationReport {
    /// Distinct matched categories, for rejection responses and events.
    pub fn threat_categories(&self) -> Vec<String> {
        let mut cats: Vec<String> = Vec::new();
        for threat in &self.threats {
            if !cats.iter().any(|c| c == threat.category) {
                cats.push(threat.category.to_string());
            }
        }
        cats
    }
}

/// How a pattern is matched against the lowercased description.
enum Matcher {
    /// Substring anywhere.
    Phrase(&'static str),
    /// Substring bounded by non-alphanumeric characters on both sides.
    Word(&'static str),
    /// Markdown image whose URL targets an external host: `![...](http...`.
    MarkdownImage,
}

struct ThreatPattern {
    category: &'static str,
    matcher: Matcher,
    severity: Severity,
    risk: u32,
}

const PATTERNS: &[ThreatPattern] = &[
    // Instruction-override phrases
    ThreatPattern {
        category: "instruction-override",
        matcher: Matcher::Phrase("ignore previous instructions"),
        severity: Severity::Critical,
        risk: 40,
    },
    ThreatPattern {
        category: "instruction-override",
        matcher: Matcher::Phrase("ignore all previous instructions"),
        severity: Severity::Critical,
        risk: 40,
    },
    ThreatPattern {
        category: "instruction-override",
        matcher: Matcher::Phrase("disregard your instructions"),
        severity: Severity::Critical,
        risk: 40,
    },
    ThreatPattern {
        category: "instruction-override",
        matcher: Matcher::Phrase("new instructions:"),
        severity: Severity::Medium,
        risk: 15,
    },
    // Privilege escalation
    ThreatPattern {
        category: "privilege-escalation",
        matcher: Matcher::Phrase("admin mode"),
        severity: Severity::High,
        risk: 25,
    },
    ThreatPattern {
        category: "privilege-escalation",
        matcher: Matcher::Phrase("system override"),
        severity: Severity::High,
        risk: 25,
    },
    ThreatPattern {
        category: "privilege-escalation",
        matcher: Matcher::Phrase("developer mode"),
        severity: Severity::Medium,
        risk: 15,
    },
    // Context-boundary tokens
    ThreatPattern {
        category: "context-boundary",
        matcher: Matcher::Phrase("---end of user input---"),
        severity: Severity::High,
        risk: 25,
    },
    ThreatPattern {
        category: "context-boundary",
        matcher: Matcher::Phrase("<|im_start|>"),
        severity: Severity::High,
        risk: 25,
    },
    ThreatPattern {
        category: "context-boundary",
        matcher: Matcher::Phrase("[system]"),
        severity: Severity::Medium,
        risk: 15,
    },
    // External-URL exfiltration in markdown-image form
    ThreatPattern {
        category: "exfiltration",
        matcher: Matcher::MarkdownImage,
        severity: Severity::High,
        risk: 25,
    },
    // Encoded-payload indicators
    ThreatPattern {
        category: "encoded-payload",
        matcher: Matcher::Phrase("base64 decode"),
        severity: Severity::Medium,
        risk: 15,
    },
    ThreatPattern {
        category: "encoded-payload",
        matcher: Matcher::Phrase("base64 -d"),
        severity: Severity::Medium,
        risk: 15,
    },
    ThreatPattern {
        category: "encoded-payload",
        matcher: Matcher::Phrase("atob("),
        severity: Severity::Medium,
        risk: 15,
    },
    // Credential-access targets
    ThreatPattern {
        category: "credential-access",
        matcher: Matcher::Phrase(".env"),
        severity: Severity::Medium,
        risk: 15,
    },
    ThreatPattern {
        category: "credential-access",
        matcher: Matcher::Word("secrets"),
        severity: Severity::Medium,
        risk: 10,
    },
    ThreatPattern {
        category: "credential-access",
        matcher: Matcher::Word("credentials"),
        severity: Severity::Medium,
        risk: 10,
    },
    ThreatPattern {
        category: "credential-access",
        matcher: Matcher::Word("id_rsa"),
        severity: Severity::High,
        risk: 25,
    },
    // Destructive-command indicators
    ThreatPattern {
        category: "destructive-operation",
        matcher: Matcher::Phrase("rm -rf"),
        severity: Severity::Critical,
        risk: 40,
    },
    ThreatPattern {
        category: "destructive-operation",
        matcher: Matcher::Phrase("delete all"),
        severity: Severity::High,
        risk: 25,
    },
    ThreatPattern {
        category: "destructive-operation",
        matcher: Matcher::Phrase("drop table"),
        severity: Severity::High,
        risk: 25,
    },
    ThreatPattern {
        category: "destructive-operation",
        matcher: Matcher::Word("mkfs"),
        severity: Severity::Critical,
        risk: 40,
    },
    // Fork-bomb shape
    ThreatPattern {
        category: "fork-bomb",
        matcher: Matcher::Phrase(":(){ :|:& };:"),
        severity: Severity::Critical,
        risk: 40,
    },
    ThreatPattern {
        category: "fork-bomb",
        matcher: Matcher::Phrase("fork bomb"),
        severity: Severity::High,
        risk: 25,
    },
];

/// The input validator. Cheap to construct and to run; holds only the
/// configured thresholds.
#[derive(Debug, Clone)]
pub struct Validator {
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Screen a task description.
    pub fn inspect(&self, description: &str) -> ValidationReport {
        let haystack = description.to_lowercase();

        let mut threats = Vec::new();
        let mut risk = 0u32;
        let mut worst = Severity::None;

        for pattern in PATTERNS {
            let hit = match &pattern.matcher {
                Matcher::Phrase(needle) => haystack.contains(needle),
                Matcher::Word(needle) => contains_word(&haystack, needle),
                Matcher::MarkdownImage => contains_markdown_external_image(&haystack),
            };
            if !hit {
                continue;
            }
            risk = (risk + pattern.risk).min(MAX_RISK);
            worst = worst.max(pattern.severity);
            threats.push(ThreatMatch {
                category: pattern.category,
                pattern: match &pattern.matcher {
                    Matcher::Phrase(n) | Matcher::Word(n) => *n,
                    Matcher::MarkdownImage => "![...](http...)",
                },
                severity: pattern.severity,
                risk: pattern.risk,
            });
        }

        let high_allowed = |threats: &[ThreatMatch]| {
            threats
                .iter()
                .filter(|t| t.severity == Severity::High)
                .all(|t| self.config.allow_listed.iter().any(|a| a == t.category))
        };

        let verdict = if worst == Severity::Critical {
            Verdict::Reject
        } else if worst == Severity::High && !high_allowed(&threats) {
            Verdict::Reject
        } else if risk >= self.config.reject_risk {
            Verdict::Reject
        } else if worst >= Severity::Medium || risk >= self.config.flag_risk {
            Verdict::Flag
        } else {
            Verdict::Allow
        };

        ValidationReport {
            verdict,
            risk,
            threats,
        }
    }
}

/// Substring match bounded by non-alphanumeric characters on both sides.
fn contains_word(haystack: &str, needle: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let abs = start + pos;
        let before_ok = abs == 0
            || haystack[..abs]
                .chars()
                .next_back()
                .map(|c| !c.is_alphanumeric())
                .unwrap_or(true);
        let after = abs + needle.len();
        let after_ok = after >= haystack.len()
            || haystack[after..]
                .chars()
                .next()
                .map(|c| !c.is_alphanumeric())
                .unwrap_or(true);
        if before_ok && after_ok {
            return true;
        }
        start = abs + needle.len();
    }
    false
}

/// Markdown image pointing at an external URL: `![..](http..`.
fn contains_markdown_external_image(haystack: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find("![") {
        let rest = &haystack[start + pos..];
        if let Some(close) = rest.find("](") {
            if rest[close + 2..].starts_with("http") {
                return true;
            }
        }
        start += pos + 2;
    }
    false
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;

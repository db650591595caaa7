// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mixture-of-Experts router.
//!
//! Scoring is additive keyword matching: explainable, cheaply evaluated,
//! and tolerant of ambiguous descriptions. A declared task type that matches
//! a category's explicit type list routes deterministically at fixed high
//! confidence. Category selection applies the single-expert, parallel
//! activation, and minimum-confidence thresholds in that order; worker
//! choice within the category is lowest-load with a longest-idle tiebreak.

use cortex_core::{CoordinatorConfig, Task, WorkerId};
use cortex_storage::MaterializedState;
use std::collections::BTreeMap;

/// Confidence assigned on an explicit declared-type match.
const TYPE_MATCH_CONFIDENCE: f64 = 0.95;

/// Default weight of one positive keyword match.
const KEYWORD_WEIGHT: f64 = 25.0;

/// Weight of one booster phrase match.
const BOOSTER_WEIGHT: f64 = 12.0;

/// Penalty of one negative keyword match.
const NEGATIVE_WEIGHT: f64 = 30.0;

/// Raw-score divisor for normalization into [0, 1]. Saturation needs four
/// plain keyword hits, which only an overwhelming match produces.
const CATEGORY_MAX_RAW: f64 = 100.0;

/// The category tasks fall back to when nothing clears minimum confidence.
pub const FALLBACK_CATEGORY: &str = "fallback";

/// Ruleset for one expert category.
#[derive(Debug, Clone)]
pub struct ExpertCategory {
    pub name: &'static str,
    /// Declared task types that route here at fixed high confidence.
    pub task_types: &'static [&'static str],
    pub keywords: &'static [&'static str],
    pub boosters: &'static [&'static str],
    pub negatives: &'static [&'static str],
}

impl ExpertCategory {
    /// Score a description against this category's ruleset, normalized to
    /// [0, 1].
    fn score(&self, description_lower: &str, declared_type: Option<&str>) -> f64 {
        if let Some(declared) = declared_type {
            if self.task_types.iter().any(|t| t.eq_ignore_ascii_case(declared)) {
                return TYPE_MATCH_CONFIDENCE;
            }
        }

        let mut raw = 0.0f64;
        for keyword in self.keywords {
            if description_lower.contains(keyword) {
                raw += KEYWORD_WEIGHT;
            }
        }
        for booster in self.boosters {
            if description_lower.contains(booster) {
                raw += BOOSTER_WEIGHT;
            }
        }
        for negative in self.negatives {
            if description_lower.contains(negative) {
                raw -= NEGATIVE_WEIGHT;
            }
        }
        (raw.max(0.0) / CATEGORY_MAX_RAW).min(1.0)
    }
}

/// Built-in expert table. The fallback category carries no rules; it is
/// selected only when every scored category stays below minimum confidence.
const EXPERTS: &[ExpertCategory] = &[
    ExpertCategory {
        name: "development",
        task_types: &["feature", "bugfix", "refactor", "development"],
        keywords: &["fix", "bug", "implement", "refactor", "feature", "compile", "function", "api"],
        boosters: &["unit test", "stack trace", "pull request"],
        negatives: &["deploy", "vulnerability"],
    },
    ExpertCategory {
        name: "security",
        task_types: &["security", "audit"],
        keywords: &["vulnerability", "cve", "audit", "exploit", "injection", "security", "hardening", "permissions"],
        boosters: &["threat model", "security review", "penetration test"],
        negatives: &["inventory"],
    },
    ExpertCategory {
        name: "inventory",
        task_types: &["inventory"],
        keywords: &["inventory", "catalog", "asset", "stock", "enumerate", "census", "manifest", "reconcile"],
        boosters: &["asset list", "stock count"],
        negatives: &["deploy"],
    },
    ExpertCategory {
        name: "ci-cd",
        task_types: &["ci", "cd", "deploy", "release"],
        keywords: &["pipeline", "deploy", "build", "release", "rollout", "artifact", "container", "helm"],
        boosters: &["blue-green", "canary deploy"],
        negatives: &["audit"],
    },
    ExpertCategory {
        name: "coordination",
        task_types: &["coordination", "planning"],
        keywords: &["schedule", "plan", "coordinate", "assign", "triage", "prioritize", "roadmap", "standup"],
        boosters: &["status report", "sprint plan"],
        negatives: &["compile"],
    },
];

/// Router thresholds, lifted from the coordinator configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub single_expert_threshold: f64,
    pub parallel_activation_threshold: f64,
    pub parallel_activation_enabled: bool,
    pub minimum_confidence: f64,
}

impl From<&CoordinatorConfig> for RouterConfig {
    fn from(config: &CoordinatorConfig) -> Self {
        Self {
            single_expert_threshold: config.single_expert_threshold,
            parallel_activation_threshold: config.parallel_activation_threshold,
            parallel_activation_enabled: config.parallel_activation_enabled,
            minimum_confidence: config.minimum_confidence,
        }
    }
}

/// Routing outcome for one task.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    pub category: String,
    /// Secondary categories under parallel activation (empty when disabled).
    pub secondary: Vec<String>,
    pub scores: BTreeMap<String, f64>,
}

/// The MoE router.
#[derive(Debug, Clone)]
pub struct Router {
    config: RouterConfig,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        Self { config }
    }

    /// Confidence per category for a description.
    pub fn score_vector(
        &self,
        description: &str,
        declared_type: Option<&str>,
    ) -> BTreeMap<String, f64> {
        let lower = description.to_lowercase();
        EXPERTS
            .iter()
            .map(|e| (e.name.to_string(), e.score(&lower, declared_type)))
            .collect()
    }

    /// Choose the expert category for a task.
    ///
    /// Ties at identical confidence break by declared-type match first,
    /// historical success rate second, lexicographic name last.
    pub fn choose_category(
        &self,
        description: &str,
        declared_type: Option<&str>,
        state: &MaterializedState,
    ) -> RoutingDecision {
        let scores = self.score_vector(description, declared_type);

        let best = scores
            .iter()
            .max_by(|&(a_name, a_score), &(b_name, b_score)| {
                a_score
                    .partial_cmp(b_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| {
                        let a_typed = self.is_type_match(a_name, declared_type);
                        let b_typed = self.is_type_match(b_name, declared_type);
                        a_typed.cmp(&b_typed)
                    })
                    .then_with(|| {
                        let a_rate = success_rate(state, a_name);
                        let b_rate = success_rate(state, b_name);
                        a_rate
                            .partial_cmp(&b_rate)
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                    // max_by keeps the later of equal elements; reverse the
                    // name ordering so the lexicographically first one wins
                    .then_with(|| b_name.cmp(a_name))
            })
            .map(|(name, score)| (name.clone(), *score));

        let Some((best_name, best_score)) = best else {
            return RoutingDecision {
                category: FALLBACK_CATEGORY.to_string(),
                secondary: Vec::new(),
                scores,
            };
        };

        if best_score >= self.config.single_expert_threshold {
            return RoutingDecision {
                category: best_name,
                secondary: Vec::new(),
                scores,
            };
        }

        if best_score >= self.config.parallel_activation_threshold {
            let secondary = if self.config.parallel_activation_enabled {
                scores
                    .iter()
                    .filter(|(name, score)| {
                        **score >= self.config.parallel_activation_threshold && **name != best_name
                    })
                    .map(|(name, _)| name.clone())
                    .collect()
            } else {
                Vec::new()
            };
            return RoutingDecision {
                category: best_name,
                secondary,
                scores,
            };
        }

        if best_score >= self.config.minimum_confidence {
            return RoutingDecision {
                category: best_name,
                secondary: Vec::new(),
                scores,
            };
        }

        RoutingDecision {
            category: FALLBACK_CATEGORY.to_string(),
            secondary: Vec::new(),
            scores,
        }
    }

    /// Choose a worker within the chosen category.
    ///
    /// Candidates: capability tags include the category, admissible
    /// lifecycle state, load below maximum, and not the excluded worker.
    /// Lowest current load wins; ties break to the longest time since last
    /// assignment.
    pub fn choose_worker(
        &self,
        category: &str,
        state: &MaterializedState,
        excluded: Option<&WorkerId>,
    ) -> Option<WorkerId> {
        state
            .workers
            .values()
            .filter(|w| w.has_capacity())
            .filter(|w| w.capabilities.contains(category))
            .filter(|w| Some(&w.id) != excluded)
            .min_by(|a, b| {
                a.load
                    .cmp(&b.load)
                    .then_with(|| a.last_assigned_at_ms.cmp(&b.last_assigned_at_ms))
                    .then_with(|| a.id.as_str().cmp(b.id.as_str()))
            })
            .map(|w| w.id.clone())
    }

    /// Route a task end to end: category choice plus worker choice.
    pub fn route(&self, task: &Task, state: &MaterializedState) -> Option<WorkerId> {
        self.choose_worker(&task.category, state, task.excluded_worker.as_ref())
    }

    fn is_type_match(&self, category: &str, declared_type: Option<&str>) -> bool {
        let Some(declared) = declared_type else {
            return false;
        };
        EXPERTS
            .iter()
            .find(|e| e.name == category)
            .map(|e| e.task_types.iter().any(|t| t.eq_ignore_ascii_case(declared)))
            .unwrap_or(false)
    }
}

fn success_rate(state: &MaterializedState, category: &str) -> f64 {
    state
        .category_stats
        .get(category)
        .map(|s| s.success_rate())
        .unwrap_or(0.0)
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;

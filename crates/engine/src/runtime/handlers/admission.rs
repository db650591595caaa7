// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task admission: validation, scoring, and the admitted/rejected events.

use crate::error::RuntimeError;
use crate::runtime::{AdmissionDefaults, Runtime, ScoreVector};
use crate::validator::Verdict;
use cortex_core::{Clock, Event, IdGen, Priority, TaskId};

/// A task submission as received from the surface.
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub description: String,
    pub declared_type: Option<String>,
    pub priority: Option<Priority>,
    pub ttl_ms: Option<u64>,
    pub max_retries: Option<u32>,
}

/// Result of admission. The contained event has not yet been applied or
/// persisted; the caller sends it to the event bus.
#[derive(Debug, Clone)]
pub enum AdmitOutcome {
    Admitted {
        task_id: TaskId,
        category: String,
        scores: ScoreVector,
        flagged: bool,
        event: Event,
    },
    Rejected {
        task_id: TaskId,
        reason: String,
        threats: Vec<String>,
        event: Event,
    },
}

impl<C: Clock, I: IdGen> Runtime<C, I> {
    /// Validate and score a submission.
    ///
    /// Rejected submissions never become tasks and never reach a worker;
    /// the rejection event exists only for observers. Admission computes
    /// the full score vector and category here so the routing decision is
    /// retained on the task for observability.
    pub fn admit(&self, req: SubmitRequest) -> Result<AdmitOutcome, RuntimeError> {
        let depth = self.lock_state(|st| st.queue.len());
        if depth >= self.config.max_queue_depth {
            return Err(RuntimeError::QueueFull(depth));
        }

        let at_ms = self.epoch_ms();
        let task_id = self.next_task_id();

        let report = self.validator.inspect(&req.description);
        if report.verdict == Verdict::Reject {
            self.metrics().record_rejection();
            let threats = report.threat_categories();
            let reason = "prompt-injection".to_string();
            tracing::warn!(
                task_id = %task_id,
                risk = report.risk,
                threats = ?threats,
                "submission rejected"
            );
            let event = Event::TaskRejected {
                task_id: task_id.clone(),
                reason: reason.clone(),
                threats: threats.clone(),
                at_ms,
            };
            return Ok(AdmitOutcome::Rejected {
                task_id,
                reason,
                threats,
                event,
            });
        }

        let decision = self.lock_state(|state| {
            self.router
                .choose_category(&req.description, req.declared_type.as_deref(), state)
        });
        let defaults = AdmissionDefaults::resolve(&self.config, &req);
        let flagged = report.verdict == Verdict::Flag;
        if flagged {
            tracing::info!(task_id = %task_id, risk = report.risk, "submission flagged for review");
        }

        let event = Event::TaskAdmitted {
            task_id: task_id.clone(),
            description: req.description,
            declared_type: req.declared_type,
            priority: defaults.priority,
            ttl_ms: defaults.ttl_ms,
            max_retries: defaults.max_retries,
            scores: decision.scores.clone(),
            category: decision.category.clone(),
            flagged,
            at_ms,
        };

        Ok(AdmitOutcome::Admitted {
            task_id,
            category: decision.category,
            scores: decision.scores,
            flagged,
            event,
        })
    }
}

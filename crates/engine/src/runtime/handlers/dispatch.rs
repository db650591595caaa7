// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The dispatch loop: queue head → router → assignment.

use crate::runtime::Runtime;
use cortex_core::{Clock, Event, IdGen};

impl<C: Clock, I: IdGen> Runtime<C, I> {
    /// Dispatch as many queued tasks as current capacity allows.
    ///
    /// Strictly head-of-queue: if the head has no eligible worker (all
    /// busy, no capability match, or only its excluded worker is free) it
    /// stays put and blocks dispatch until capacity frees. Skipping the
    /// head would reorder within a priority level.
    pub(crate) fn try_dispatch(&self, out: &mut Vec<Event>) {
        loop {
            let pick = self.lock_state(|st| {
                let head_id = st.queue.first()?;
                let task = st.tasks.get(head_id.as_str())?;
                let worker_id = self.router.route(task, st)?;
                Some((task.id.clone(), worker_id))
            });

            let Some((task_id, worker_id)) = pick else {
                return;
            };

            tracing::debug!(task = %task_id, worker = %worker_id, "dispatching");
            self.emit(
                out,
                Event::TaskAssigned {
                    task_id,
                    worker_id,
                    at_ms: self.epoch_ms(),
                },
            );
        }
    }
}

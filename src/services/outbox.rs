// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Queue of remote writes that have not reached the profile store yet.
//!
//! Ops carry only what cannot be read back from the live profile. Column
//! values (metrics, points, status) are read when the op is flushed, so a
//! second `SaveProfile` or `SetPoints` behind an unflushed one adds nothing
//! and is coalesced away.
//!
//! The queue is strictly FIFO. A transient failure leaves the head in place
//! and delays it with exponential backoff; everything behind it waits.
//!
//! The head is marked in flight while it executes. It has already read the
//! values it writes, so a later change never coalesces into it and queues a
//! fresh op behind it instead.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

use crate::models::CertKind;

/// A pending remote write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RemoteOp {
    /// Insert (no remote id yet) or update every mutable profile column.
    SaveProfile {
        /// New credential hash to store alongside, if any
        #[serde(skip)]
        credential_hash: Option<String>,
    },
    /// Write the points column.
    SetPoints,
    CreatePost {
        post_id: String,
        kind: CertKind,
        #[serde(skip)]
        image: String,
        created_at: String,
    },
    /// Delete by id, or by image match when no id was tracked.
    DeletePost {
        post_id: Option<String>,
        #[serde(skip)]
        image: String,
    },
}

impl RemoteOp {
    /// Whether the op can only run against an existing remote row.
    pub fn needs_remote_id(&self) -> bool {
        !matches!(self, RemoteOp::SaveProfile { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            RemoteOp::SaveProfile { .. } => "save_profile",
            RemoteOp::SetPoints => "set_points",
            RemoteOp::CreatePost { .. } => "create_post",
            RemoteOp::DeletePost { .. } => "delete_post",
        }
    }
}

/// Exponential backoff for the head of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempts` (1-based).
    pub fn delay(&self, attempts: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempts.saturating_sub(1));
        self.base.saturating_mul(factor).min(self.max)
    }
}

#[derive(Debug)]
struct Entry {
    seq: u64,
    op: RemoteOp,
    attempts: u32,
    not_before: Option<Instant>,
    in_flight: bool,
}

/// What the flusher should do next.
#[derive(Debug, PartialEq, Eq)]
pub enum Head {
    Empty,
    /// Head is backing off until the given instant.
    Waiting(Instant),
    Ready { seq: u64, op: RemoteOp },
}

#[derive(Debug, Default)]
pub struct Outbox {
    queue: VecDeque<Entry>,
    next_seq: u64,
    policy: RetryPolicy,
}

impl Outbox {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            queue: VecDeque::new(),
            next_seq: 0,
            policy,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Snapshot of queued ops in flush order.
    pub fn ops(&self) -> Vec<RemoteOp> {
        self.queue.iter().map(|e| e.op.clone()).collect()
    }

    pub fn has_pending_save(&self) -> bool {
        self.queue
            .iter()
            .any(|e| matches!(e.op, RemoteOp::SaveProfile { .. }))
    }

    /// Whether a queued op will overwrite the remote points column.
    pub fn has_pending_points(&self) -> bool {
        self.queue
            .iter()
            .any(|e| matches!(e.op, RemoteOp::SaveProfile { .. } | RemoteOp::SetPoints))
    }

    /// Queue an op, coalescing it with an equivalent pending one that has
    /// not started executing.
    ///
    /// Returns false when the op was absorbed.
    pub fn push(&mut self, op: RemoteOp) -> bool {
        match op {
            RemoteOp::SetPoints
                if self.queue.iter().any(|e| {
                    !e.in_flight
                        && matches!(e.op, RemoteOp::SaveProfile { .. } | RemoteOp::SetPoints)
                }) =>
            {
                false
            }
            RemoteOp::SaveProfile { credential_hash } => {
                if let Some(existing) = self.queue.iter_mut().find_map(|e| match &mut e.op {
                    RemoteOp::SaveProfile { credential_hash } if !e.in_flight => {
                        Some(credential_hash)
                    }
                    _ => None,
                }) {
                    if credential_hash.is_some() {
                        *existing = credential_hash;
                    }
                    return false;
                }
                self.push_back(RemoteOp::SaveProfile { credential_hash });
                true
            }
            op => {
                self.push_back(op);
                true
            }
        }
    }

    fn push_back(&mut self, op: RemoteOp) {
        self.next_seq += 1;
        self.queue.push_back(Entry {
            seq: self.next_seq,
            op,
            attempts: 0,
            not_before: None,
            in_flight: false,
        });
    }

    /// Take the head for execution and mark it in flight. With `force`, a
    /// backing-off head is ready anyway.
    ///
    /// The head stays queued until [`Outbox::remove`] or
    /// [`Outbox::retry_later`] settles it.
    pub fn begin(&mut self, now: Instant, force: bool) -> Head {
        match self.queue.front_mut() {
            None => Head::Empty,
            Some(entry) => match entry.not_before {
                Some(at) if at > now && !force => Head::Waiting(at),
                _ => {
                    entry.in_flight = true;
                    Head::Ready {
                        seq: entry.seq,
                        op: entry.op.clone(),
                    }
                }
            },
        }
    }

    /// Earliest instant at which the head may be retried.
    pub fn next_retry_at(&self) -> Option<Instant> {
        self.queue.front().and_then(|e| e.not_before)
    }

    /// Remove the op `seq` once it has completed or been given up on.
    ///
    /// A no-op if it was cancelled or cleared meanwhile.
    pub fn remove(&mut self, seq: u64) {
        self.queue.retain(|e| e.seq != seq);
    }

    /// Record a transient failure of `seq` and return the backoff applied.
    pub fn retry_later(&mut self, seq: u64, now: Instant) -> Option<Duration> {
        let policy = self.policy;
        let entry = self.queue.iter_mut().find(|e| e.seq == seq)?;
        entry.attempts += 1;
        entry.in_flight = false;
        let delay = policy.delay(entry.attempts);
        entry.not_before = Some(now + delay);
        Some(delay)
    }

    /// Cancel a post that was never created remotely.
    ///
    /// Returns true if a queued create was removed. A create in flight may
    /// still land, so it is left alone and the caller queues a delete.
    pub fn cancel_create_post(&mut self, id: &str) -> bool {
        let before = self.queue.len();
        self.queue.retain(|e| {
            e.in_flight
                || !matches!(&e.op, RemoteOp::CreatePost { post_id, .. } if post_id == id)
        });
        self.queue.len() != before
    }

    /// Drop everything and return how many ops were discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }
}

// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Approval coordination: a suspendable promise-of-decision keyed by
//! approval id.
//!
//! A tool creates the pending entry **synchronously** via [`ApprovalCoordinator::request`],
//! emits its `exec.approval_request` event, and only then awaits the ticket.
//! The RPC handler for `exec.approve`/`exec.deny` resolves the entry from a
//! different task. The coordinator tolerates a decision arriving before the
//! await begins because the oneshot channel buffers it.

use dashmap::DashMap;
use tokio::sync::oneshot;

/// The user's decision on one approval request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Denied { reason: Option<String> },
}

/// Awaitable handle returned by [`ApprovalCoordinator::request`].
pub struct ApprovalTicket {
    rx: oneshot::Receiver<Decision>,
}

impl ApprovalTicket {
    /// Waits for the user's decision. A dropped coordinator entry counts as a
    /// denial so the awaiting tool can never hang on a vanished channel.
    pub async fn decision(self) -> Decision {
        self.rx.await.unwrap_or(Decision::Denied {
            reason: Some("approval channel closed".into()),
        })
    }
}

/// approvalId -> write-end of a oneshot decision channel.
///
/// Exactly one of `resolve`/`reject` succeeds per id; after either, the entry
/// is gone and further calls return false.
#[derive(Default)]
pub struct ApprovalCoordinator {
    pending: DashMap<String, oneshot::Sender<Decision>>,
}

impl ApprovalCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-creates the pending entry and returns the awaitable ticket.
    pub fn request(&self, approval_id: &str) -> ApprovalTicket {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(approval_id.to_string(), tx);
        ApprovalTicket { rx }
    }

    /// Fulfills the pending entry. Returns false when the id is unknown or
    /// already decided.
    pub fn resolve(&self, approval_id: &str) -> bool {
        match self.pending.remove(approval_id) {
            Some((_, tx)) => {
                // A dropped ticket means the tool is gone; the decision is
                // honored but discarded.
                let _ = tx.send(Decision::Approved);
                true
            }
            None => false,
        }
    }

    /// Fails the pending entry with an optional reason. Returns false when
    /// the id is unknown or already decided.
    pub fn reject(&self, approval_id: &str, reason: Option<String>) -> bool {
        match self.pending.remove(approval_id) {
            Some((_, tx)) => {
                let _ = tx.send(Decision::Denied { reason });
                true
            }
            None => false,
        }
    }

    /// Whether a decision is still outstanding for this id.
    pub fn has_pending(&self, approval_id: &str) -> bool {
        self.pending.contains_key(approval_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_completes_the_ticket() {
        let coordinator = ApprovalCoordinator::new();
        let ticket = coordinator.request("a1");
        assert!(coordinator.has_pending("a1"));

        assert!(coordinator.resolve("a1"));
        assert_eq!(ticket.decision().await, Decision::Approved);
        assert!(!coordinator.has_pending("a1"));
    }

    #[tokio::test]
    async fn reject_carries_the_reason() {
        let coordinator = ApprovalCoordinator::new();
        let ticket = coordinator.request("a2");

        assert!(coordinator.reject("a2", Some("nope".into())));
        assert_eq!(
            ticket.decision().await,
            Decision::Denied {
                reason: Some("nope".into())
            }
        );
    }

    #[tokio::test]
    async fn at_most_one_of_resolve_reject_succeeds() {
        let coordinator = ApprovalCoordinator::new();
        let ticket = coordinator.request("a3");

        assert!(coordinator.resolve("a3"));
        assert!(!coordinator.resolve("a3"));
        assert!(!coordinator.reject("a3", None));
        assert_eq!(ticket.decision().await, Decision::Approved);
    }

    #[test]
    fn unknown_id_is_a_no_op() {
        let coordinator = ApprovalCoordinator::new();
        assert!(!coordinator.resolve("ghost"));
        assert!(!coordinator.reject("ghost", None));
        assert!(!coordinator.has_pending("ghost"));
    }

    #[tokio::test]
    async fn decision_arriving_before_await_is_buffered() {
        let coordinator = ApprovalCoordinator::new();
        let ticket = coordinator.request("a4");
        // The user answers before the tool starts awaiting.
        assert!(coordinator.resolve("a4"));
        assert_eq!(ticket.decision().await, Decision::Approved);
    }

    #[tokio::test]
    async fn dropped_ticket_still_consumes_the_entry() {
        let coordinator = ApprovalCoordinator::new();
        drop(coordinator.request("a5"));
        // The entry exists; resolving it succeeds even though nobody listens.
        assert!(coordinator.resolve("a5"));
        assert!(!coordinator.resolve("a5"));
    }

    #[tokio::test]
    async fn concurrent_resolvers_race_to_one_winner() {
        use std::sync::Arc;

        let coordinator = Arc::new(ApprovalCoordinator::new());
        let ticket = coordinator.request("a6");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let c = coordinator.clone();
            handles.push(tokio::spawn(async move { c.resolve("a6") }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(ticket.decision().await, Decision::Approved);
    }
}

use chrono::Utc;
use courier_core::types::{ArgumentMap, Invocation, InvocationId, InvocationStatus};
use dashmap::DashMap;
use tracing::{debug, warn};

/// Invocation records keyed by id, kept for the life of the process.
///
/// Records are replaced whole, so a reader sees either the previous state
/// or the next one. Status changes that would move backwards are refused.
#[derive(Default)]
pub struct InvocationStore {
    records: DashMap<InvocationId, Invocation>,
}

impl InvocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, invocation: Invocation) {
        self.records.insert(invocation.id.clone(), invocation);
    }

    pub fn get(&self, id: &InvocationId) -> Option<Invocation> {
        self.records.get(id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Swap in `next` if its status is reachable from the stored one.
    pub fn replace(&self, next: Invocation) -> bool {
        let Some(mut current) = self.records.get_mut(&next.id) else {
            warn!(id = %next.id, "update for unknown invocation ignored");
            return false;
        };
        if !current.status.can_advance_to(next.status) {
            warn!(
                id = %next.id,
                from = %current.status,
                to = %next.status,
                "refusing backwards status change"
            );
            return false;
        }
        debug!(id = %next.id, from = %current.status, to = %next.status, "invocation updated");
        *current = next;
        true
    }

    pub fn mark_processing(&self, id: &InvocationId) -> bool {
        self.transition(id, |inv| inv.status = InvocationStatus::Processing)
    }

    pub fn record_arguments(&self, id: &InvocationId, arguments: ArgumentMap) -> bool {
        self.transition(id, |inv| inv.arguments = Some(arguments))
    }

    pub fn complete(&self, id: &InvocationId, raw_result: String, summary: String) -> bool {
        self.transition(id, |inv| {
            inv.status = InvocationStatus::Completed;
            inv.raw_result = Some(raw_result);
            inv.summarized_result = Some(summary);
        })
    }

    pub fn fail(&self, id: &InvocationId, message: String) -> bool {
        self.transition(id, |inv| {
            inv.status = InvocationStatus::Error;
            inv.error_message = Some(message);
        })
    }

    fn transition(&self, id: &InvocationId, apply: impl FnOnce(&mut Invocation)) -> bool {
        let Some(mut next) = self.get(id) else {
            warn!(id = %id, "update for unknown invocation ignored");
            return false;
        };
        apply(&mut next);
        next.updated_at = Utc::now();
        self.replace(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(store: &InvocationStore) -> InvocationId {
        let id = InvocationId::new();
        store.insert(Invocation::pending(id.clone(), "read-unread"));
        id
    }

    #[test]
    fn lifecycle_moves_forward() {
        let store = InvocationStore::new();
        let id = stored(&store);

        assert!(store.mark_processing(&id));
        assert!(store.complete(&id, "raw\n".into(), "summary".into()));

        let record = store.get(&id).unwrap();
        assert_eq!(record.status, InvocationStatus::Completed);
        assert_eq!(record.raw_result.as_deref(), Some("raw\n"));
        assert_eq!(record.summarized_result.as_deref(), Some("summary"));
        assert!(record.updated_at >= record.created_at);
    }

    #[test]
    fn pending_may_fail_directly() {
        let store = InvocationStore::new();
        let id = stored(&store);
        assert!(store.fail(&id, "Dispatch queue is full".into()));
        assert_eq!(store.get(&id).unwrap().status, InvocationStatus::Error);
    }

    #[test]
    fn backwards_and_cross_terminal_changes_are_refused() {
        let store = InvocationStore::new();
        let id = stored(&store);
        store.mark_processing(&id);
        store.fail(&id, "boom".into());

        assert!(!store.mark_processing(&id));
        assert!(!store.complete(&id, "late".into(), "late".into()));

        let record = store.get(&id).unwrap();
        assert_eq!(record.status, InvocationStatus::Error);
        assert_eq!(record.error_message.as_deref(), Some("boom"));
        assert!(record.raw_result.is_none());
    }

    #[test]
    fn unknown_id_is_not_created() {
        let store = InvocationStore::new();
        assert!(!store.mark_processing(&InvocationId::from("missing")));
        assert!(store.get(&InvocationId::from("missing")).is_none());
        assert!(store.is_empty());
    }
}

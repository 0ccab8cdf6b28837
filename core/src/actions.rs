//! Response-code action table.
//!
//! Maps a status code to an ordered list of side effects, for example "on 401,
//! drop the session". Firing is independent of classification. Every matching
//! action is scheduled on the delivery context as its own job, so one
//! misbehaving action cannot prevent the others from running or change the
//! request's outcome.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::delivery::DeliveryQueue;

pub type ResponseCode = u16;
pub type Action = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Default)]
pub struct ActionTable {
    actions: HashMap<ResponseCode, Vec<Action>>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `action` for `code`, after any already registered for it.
    pub fn on(mut self, code: ResponseCode, action: impl Fn() + Send + Sync + 'static) -> Self {
        self.insert(code, Arc::new(action));
        self
    }

    pub fn insert(&mut self, code: ResponseCode, action: Action) {
        self.actions.entry(code).or_default().push(action);
    }

    pub fn actions_for(&self, code: ResponseCode) -> &[Action] {
        self.actions.get(&code).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Schedule every action registered for `code`, in registration order.
    pub fn fire(&self, code: ResponseCode, delivery: &DeliveryQueue) -> usize {
        let actions = self.actions_for(code);
        for action in actions {
            let action = Arc::clone(action);
            delivery.dispatch(move || action());
        }
        if !actions.is_empty() {
            tracing::debug!(status = code, count = actions.len(), "response code actions scheduled");
        }
        actions.len()
    }
}

impl fmt::Debug for ActionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut codes: Vec<_> = self.actions.keys().copied().collect();
        codes.sort_unstable();
        f.debug_struct("ActionTable").field("codes", &codes).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Action) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |label: &'static str| -> Action {
            let sink = Arc::clone(&sink);
            Arc::new(move || sink.lock().unwrap().push(label))
        };
        (log, make)
    }

    #[test]
    fn fires_only_matching_code_in_order() {
        let (log, make) = recorder();
        let mut table = ActionTable::new();
        table.insert(401, make("first"));
        table.insert(401, make("second"));
        table.insert(500, make("other"));

        let (queue, mailbox) = DeliveryQueue::manual();
        assert_eq!(table.fire(401, &queue), 2);
        mailbox.run_pending();

        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn unknown_code_fires_nothing() {
        let table = ActionTable::new().on(401, || {});
        let (queue, mailbox) = DeliveryQueue::manual();
        assert_eq!(table.fire(200, &queue), 0);
        assert!(!mailbox.run_next(Duration::from_millis(10)));
    }

    #[test]
    fn panicking_action_does_not_block_later_ones() {
        let (log, make) = recorder();
        let mut table = ActionTable::new().on(403, || panic!("bad action"));
        table.insert(403, make("survivor"));

        let (queue, mailbox) = DeliveryQueue::manual();
        table.fire(403, &queue);
        assert_eq!(mailbox.run_pending(), 2);
        assert_eq!(*log.lock().unwrap(), vec!["survivor"]);
    }

    #[test]
    fn debug_lists_sorted_codes() {
        let table = ActionTable::new().on(500, || {}).on(401, || {});
        assert_eq!(format!("{table:?}"), "ActionTable { codes: [401, 500] }");
    }
}

// Per-record transaction guard
//
// At most one move may be in flight per record. The guard is a keyed state table scoped to a
// single board session, with typed listeners notified synchronously on every lifecycle event.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::debug;

use crate::board::RecordId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("Transaction in progress for record {0}: commit or abort to start a new one")]
    InProgress(RecordId),
    #[error("No transaction in progress for record {0}")]
    NotInProgress(RecordId),
}

/// State of a record in the transaction table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Absent,
    /// `cycle` increases with every started transaction of the session
    Active { cycle: u64 },
}

/// Lifecycle events raised by the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionEvent {
    Start,
    Commit,
    Abort,
}

/// Observer of transaction lifecycle events.
///
/// The token returned by `on_start` is handed back to `on_commit` or `on_abort` when the same
/// record's transaction ends.
pub trait TransactionListener: Send + Sync + 'static {
    type Token: Send + 'static;

    fn on_start(&self, record: &RecordId) -> Self::Token;

    fn on_commit(&self, _record: &RecordId, _token: Self::Token) {}

    fn on_abort(&self, _record: &RecordId, _token: Self::Token) {}
}

trait EventSink: Send + Sync {
    fn dispatch(&self, event: TransactionEvent, record: &RecordId, cycle: u64);
}

/// Per-cycle bookkeeping of one listener
enum Slot<T> {
    /// `on_start` ran, its token waits for the end of the cycle
    Started(T),
    /// The end of the cycle was dispatched before its start
    Ended(TransactionEvent),
}

struct Registration<L: TransactionListener> {
    listener: L,
    /// Last cycle started before the listener was registered
    registered_after: u64,
    slots: Mutex<HashMap<u64, Slot<L::Token>>>,
}

impl<L: TransactionListener> Registration<L> {
    fn slots(&self) -> MutexGuard<'_, HashMap<u64, Slot<L::Token>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish(&self, event: TransactionEvent, record: &RecordId, token: L::Token) {
        match event {
            TransactionEvent::Commit => self.listener.on_commit(record, token),
            TransactionEvent::Abort => self.listener.on_abort(record, token),
            TransactionEvent::Start => {}
        }
    }
}

// No lock is held while the listener runs, so listeners may call back into the guard
impl<L: TransactionListener> EventSink for Registration<L> {
    fn dispatch(&self, event: TransactionEvent, record: &RecordId, cycle: u64) {
        match event {
            TransactionEvent::Start => {
                let token = self.listener.on_start(record);
                let early_end = match self.slots().remove(&cycle) {
                    Some(Slot::Ended(end)) => Some(end),
                    Some(Slot::Started(_)) | None => None,
                };
                match early_end {
                    Some(end) => self.finish(end, record, token),
                    None => {
                        self.slots().insert(cycle, Slot::Started(token));
                    }
                }
            }
            TransactionEvent::Commit | TransactionEvent::Abort => {
                let slot = self.slots().remove(&cycle);
                match slot {
                    Some(Slot::Started(token)) => self.finish(event, record, token),
                    // Listeners registered mid-transaction never saw the start
                    None if cycle <= self.registered_after => {}
                    None | Some(Slot::Ended(_)) => {
                        self.slots().insert(cycle, Slot::Ended(event));
                    }
                }
            }
        }
    }
}

/// Mutual exclusion of moves per record id.
///
/// Events of one record may reach listeners out of order when threads race on that record;
/// tokens are paired by transaction cycle, so each end still receives the token of its own
/// start.
#[derive(Default)]
pub struct TransactionGuard {
    transactions: Mutex<HashMap<RecordId, u64>>,
    listeners: Mutex<Vec<Arc<dyn EventSink>>>,
    cycles: AtomicU64,
}

impl TransactionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a transaction for `record`
    pub fn start(&self, record: &RecordId) -> Result<(), TransactionError> {
        let cycle = {
            let mut transactions = self.table();
            if transactions.contains_key(record) {
                return Err(TransactionError::InProgress(record.clone()));
            }
            let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
            transactions.insert(record.clone(), cycle);
            debug!(record_id = %record, cycle, "Transaction started");
            cycle
        };
        self.emit(TransactionEvent::Start, record, cycle);
        Ok(())
    }

    pub fn commit(&self, record: &RecordId) -> Result<(), TransactionError> {
        self.finish(record, TransactionEvent::Commit)
    }

    pub fn abort(&self, record: &RecordId) -> Result<(), TransactionError> {
        self.finish(record, TransactionEvent::Abort)
    }

    /// Subscribe a listener; events reach listeners in registration order
    pub fn register<L: TransactionListener>(&self, listener: L) {
        let registration = Registration {
            listener,
            registered_after: self.cycles.load(Ordering::Relaxed),
            slots: Mutex::new(HashMap::new()),
        };
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(registration));
    }

    pub fn state(&self, record: &RecordId) -> TransactionState {
        match self.table().get(record) {
            Some(&cycle) => TransactionState::Active { cycle },
            None => TransactionState::Absent,
        }
    }

    pub fn is_active(&self, record: &RecordId) -> bool {
        self.table().contains_key(record)
    }

    pub fn active_count(&self) -> usize {
        self.table().len()
    }

    fn finish(&self, record: &RecordId, event: TransactionEvent) -> Result<(), TransactionError> {
        let cycle = self
            .table()
            .remove(record)
            .ok_or_else(|| TransactionError::NotInProgress(record.clone()))?;
        debug!(record_id = %record, cycle, ?event, "Transaction finished");
        self.emit(event, record, cycle);
        Ok(())
    }

    // Dispatch to a snapshot of the listeners with no guard lock held
    fn emit(&self, event: TransactionEvent, record: &RecordId, cycle: u64) {
        let listeners: Vec<Arc<dyn EventSink>> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.dispatch(event, record, cycle);
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<RecordId, u64>> {
        self.transactions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use proptest_derive::Arbitrary;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Weak;

    #[derive(Clone, Default)]
    struct Journal {
        entries: Arc<Mutex<Vec<String>>>,
    }

    impl Journal {
        fn push(&self, entry: String) {
            self.entries.lock().unwrap().push(entry);
        }

        fn entries(&self) -> Vec<String> {
            self.entries.lock().unwrap().clone()
        }
    }

    struct Recorder {
        name: &'static str,
        journal: Journal,
    }

    impl TransactionListener for Recorder {
        type Token = String;

        fn on_start(&self, record: &RecordId) -> String {
            self.journal.push(format!("{}:start:{}", self.name, record));
            format!("token-{record}")
        }

        fn on_commit(&self, record: &RecordId, token: String) {
            self.journal
                .push(format!("{}:commit:{}:{}", self.name, record, token));
        }

        fn on_abort(&self, record: &RecordId, token: String) {
            self.journal
                .push(format!("{}:abort:{}:{}", self.name, record, token));
        }
    }

    #[test]
    fn test_second_start_on_same_record_is_rejected() {
        let guard = TransactionGuard::new();
        let record = RecordId::new("r1");

        guard.start(&record).unwrap();
        assert_eq!(
            guard.start(&record),
            Err(TransactionError::InProgress(record.clone()))
        );
        assert_eq!(guard.active_count(), 1);
    }

    #[test]
    fn test_records_do_not_interfere() {
        let guard = TransactionGuard::new();
        guard.start(&"r1".into()).unwrap();
        guard.start(&"r2".into()).unwrap();

        guard.commit(&"r1".into()).unwrap();
        assert!(!guard.is_active(&"r1".into()));
        assert!(guard.is_active(&"r2".into()));
    }

    #[test]
    fn test_commit_and_abort_require_active_transaction() {
        let guard = TransactionGuard::new();
        let record = RecordId::new("r1");

        assert_eq!(
            guard.commit(&record),
            Err(TransactionError::NotInProgress(record.clone()))
        );
        assert_eq!(
            guard.abort(&record),
            Err(TransactionError::NotInProgress(record.clone()))
        );

        guard.start(&record).unwrap();
        guard.abort(&record).unwrap();
        assert_eq!(guard.state(&record), TransactionState::Absent);

        // Released records can be locked again
        guard.start(&record).unwrap();
        assert!(matches!(guard.state(&record), TransactionState::Active { cycle: 2 }));
    }

    #[test]
    fn test_listeners_receive_events_in_registration_order() {
        let guard = TransactionGuard::new();
        let journal = Journal::default();
        guard.register(Recorder {
            name: "first",
            journal: journal.clone(),
        });
        guard.register(Recorder {
            name: "second",
            journal: journal.clone(),
        });

        guard.start(&"r1".into()).unwrap();
        guard.commit(&"r1".into()).unwrap();

        assert_eq!(
            journal.entries(),
            vec![
                "first:start:r1",
                "second:start:r1",
                "first:commit:r1:token-r1",
                "second:commit:r1:token-r1",
            ]
        );
    }

    #[test]
    fn test_start_token_follows_its_own_record() {
        let guard = TransactionGuard::new();
        let journal = Journal::default();
        guard.register(Recorder {
            name: "l",
            journal: journal.clone(),
        });

        guard.start(&"r1".into()).unwrap();
        guard.start(&"r2".into()).unwrap();
        guard.abort(&"r1".into()).unwrap();
        guard.commit(&"r2".into()).unwrap();

        let entries = journal.entries();
        assert!(entries.contains(&"l:abort:r1:token-r1".to_string()));
        assert!(entries.contains(&"l:commit:r2:token-r2".to_string()));
    }

    #[test]
    fn test_failed_start_raises_no_event() {
        let guard = TransactionGuard::new();
        let journal = Journal::default();
        guard.register(Recorder {
            name: "l",
            journal: journal.clone(),
        });

        guard.start(&"r1".into()).unwrap();
        let _ = guard.start(&"r1".into());
        let _ = guard.commit(&"r9".into());

        assert_eq!(journal.entries(), vec!["l:start:r1"]);
    }

    #[test]
    fn test_concurrent_starts_admit_exactly_one() {
        let guard = Arc::new(TransactionGuard::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let guard = Arc::clone(&guard);
                std::thread::spawn(move || guard.start(&"r1".into()).is_ok())
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(guard.active_count(), 1);
    }

    /// Starts a follow-up transaction from inside the commit callback
    struct Chain {
        guard: Weak<TransactionGuard>,
        next: RecordId,
        journal: Journal,
    }

    impl TransactionListener for Chain {
        type Token = ();

        fn on_start(&self, record: &RecordId) {
            self.journal.push(format!("start:{record}"));
        }

        fn on_commit(&self, record: &RecordId, _token: ()) {
            self.journal.push(format!("commit:{record}"));
            if let Some(guard) = self.guard.upgrade() {
                if *record != self.next {
                    guard.start(&self.next).unwrap();
                }
            }
        }
    }

    #[test]
    fn test_listener_may_start_a_transaction_from_commit() {
        let guard = Arc::new(TransactionGuard::new());
        let journal = Journal::default();
        guard.register(Chain {
            guard: Arc::downgrade(&guard),
            next: "r2".into(),
            journal: journal.clone(),
        });

        guard.start(&"r1".into()).unwrap();
        guard.commit(&"r1".into()).unwrap();

        assert!(guard.is_active(&"r2".into()));
        assert!(!guard.is_active(&"r1".into()));
        assert_eq!(journal.entries(), vec!["start:r1", "commit:r1", "start:r2"]);

        guard.commit(&"r2".into()).unwrap();
        assert_eq!(guard.active_count(), 0);
    }

    /// Hands out increasing numbers as tokens
    struct Numbered {
        next: AtomicUsize,
        journal: Journal,
    }

    impl TransactionListener for Numbered {
        type Token = usize;

        fn on_start(&self, _record: &RecordId) -> usize {
            self.next.fetch_add(1, Ordering::Relaxed)
        }

        fn on_commit(&self, record: &RecordId, token: usize) {
            self.journal.push(format!("commit:{record}:#{token}"));
        }

        fn on_abort(&self, record: &RecordId, token: usize) {
            self.journal.push(format!("abort:{record}:#{token}"));
        }
    }

    fn numbered(registered_after: u64, journal: &Journal) -> Registration<Numbered> {
        Registration {
            listener: Numbered {
                next: AtomicUsize::new(0),
                journal: journal.clone(),
            },
            registered_after,
            slots: Mutex::new(HashMap::new()),
        }
    }

    #[test]
    fn test_interleaved_cycles_of_one_record_keep_their_tokens() {
        let journal = Journal::default();
        let registration = numbered(0, &journal);
        let record = RecordId::new("r1");

        // A thread commits cycle 1 and restarts while another still dispatches
        registration.dispatch(TransactionEvent::Start, &record, 1);
        registration.dispatch(TransactionEvent::Start, &record, 2);
        registration.dispatch(TransactionEvent::Commit, &record, 1);
        registration.dispatch(TransactionEvent::Abort, &record, 2);

        assert_eq!(journal.entries(), vec!["commit:r1:#0", "abort:r1:#1"]);
        assert!(registration.slots().is_empty());
    }

    #[test]
    fn test_end_dispatched_before_its_start_still_pairs() {
        let journal = Journal::default();
        let registration = numbered(0, &journal);
        let record = RecordId::new("r1");

        registration.dispatch(TransactionEvent::Commit, &record, 3);
        assert!(journal.entries().is_empty());

        registration.dispatch(TransactionEvent::Start, &record, 3);
        assert_eq!(journal.entries(), vec!["commit:r1:#0"]);
        assert!(registration.slots().is_empty());
    }

    #[test]
    fn test_late_listener_ignores_end_of_earlier_cycle() {
        let guard = TransactionGuard::new();
        let journal = Journal::default();
        guard.start(&"r1".into()).unwrap();
        guard.register(Recorder {
            name: "late",
            journal: journal.clone(),
        });

        guard.commit(&"r1".into()).unwrap();
        guard.start(&"r1".into()).unwrap();
        guard.abort(&"r1".into()).unwrap();

        assert_eq!(
            journal.entries(),
            vec!["late:start:r1", "late:abort:r1:token-r1"]
        );
    }

    #[derive(Debug, Clone, Arbitrary)]
    enum GuardOp {
        Start(#[proptest(strategy = "0u8..4")] u8),
        Commit(#[proptest(strategy = "0u8..4")] u8),
        Abort(#[proptest(strategy = "0u8..4")] u8),
    }

    #[test]
    fn prop_guard_matches_set_of_active_records() {
        let mut runner = proptest::test_runner::TestRunner::default();

        runner
            .run(&prop::collection::vec(any::<GuardOp>(), 0..40), |ops| {
                let guard = TransactionGuard::new();
                let mut active = HashSet::new();

                for op in ops {
                    match op {
                        GuardOp::Start(n) => {
                            let record = RecordId::new(format!("r{n}"));
                            prop_assert_eq!(guard.start(&record).is_ok(), active.insert(n));
                        }
                        GuardOp::Commit(n) => {
                            let record = RecordId::new(format!("r{n}"));
                            prop_assert_eq!(guard.commit(&record).is_ok(), active.remove(&n));
                        }
                        GuardOp::Abort(n) => {
                            let record = RecordId::new(format!("r{n}"));
                            prop_assert_eq!(guard.abort(&record).is_ok(), active.remove(&n));
                        }
                    }
                    prop_assert_eq!(guard.active_count(), active.len());
                }

                for n in 0u8..4 {
                    let record = RecordId::new(format!("r{n}"));
                    prop_assert_eq!(guard.is_active(&record), active.contains(&n));
                }
                Ok(())
            })
            .unwrap();
    }
}

//! Rental ledger: deterministic leak diagnostics for a `BufferPool`.
//!
//! Every rental made by a tracking pool opens a record keyed by a slotmap
//! key; the rented `Buffer` carries a `Ticket` naming that record. Returning
//! the buffer closes the record. Dropping the buffer instead flags the
//! record as leaked, and the next audit reports it. Nothing here depends on
//! collection timing: leaks are visible at the first audit after the drop.
//!
//! Reporting is split from detection so that user hooks never run while a
//! ledger or pool lock is held.

use parking_lot::Mutex;
use slotmap::{DefaultKey, SlotMap};
use std::sync::{Arc, Weak};

pub(crate) type SharedLedger = Arc<Mutex<Ledger>>;

/// Why a rental was reported.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LeakCause {
    /// The buffer was dropped without being returned.
    Dropped,
    /// The buffer was still rented when the pool was disposed.
    OutstandingAtShutdown,
}

/// One reported rental.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LeakRecord {
    /// Rental order within the pool, starting at 0.
    pub sequence: u64,
    pub length: usize,
    pub cause: LeakCause,
}

/// Result of an audit.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LeakReport {
    /// Records reported by this audit. Each record is reported once.
    pub leaked: Vec<LeakRecord>,
    /// Rentals still out (not returned, not dropped) after the audit.
    pub outstanding: usize,
}

impl LeakReport {
    pub fn is_clean(&self) -> bool {
        self.leaked.is_empty()
    }
}

#[derive(Debug)]
struct Rental {
    sequence: u64,
    length: usize,
    leaked: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Ledger {
    rentals: SlotMap<DefaultKey, Rental>,
    next_sequence: u64,
}

/// Proof of a tracked rental, carried inside the rented buffer.
#[derive(Debug)]
pub(crate) struct Ticket {
    ledger: Weak<Mutex<Ledger>>,
    key: DefaultKey,
}

impl Ticket {
    /// Called from `Buffer::drop`. A ledger that is already gone has
    /// nothing left to report to.
    pub(crate) fn mark_leaked(self) {
        if let Some(ledger) = self.ledger.upgrade() {
            if let Some(r) = ledger.lock().rentals.get_mut(self.key) {
                r.leaked = true;
            }
        }
    }

    pub(crate) fn belongs_to(&self, ledger: &SharedLedger) -> bool {
        core::ptr::eq(self.ledger.as_ptr(), Arc::as_ptr(ledger))
    }
}

impl Ledger {
    pub(crate) fn shared() -> SharedLedger {
        Arc::new(Mutex::new(Ledger::default()))
    }

    pub(crate) fn open(ledger: &SharedLedger, length: usize) -> Ticket {
        let mut l = ledger.lock();
        let sequence = l.next_sequence;
        l.next_sequence += 1;
        let key = l.rentals.insert(Rental {
            sequence,
            length,
            leaked: false,
        });
        Ticket {
            ledger: Arc::downgrade(ledger),
            key,
        }
    }

    /// Close the record for a returned buffer. Returns false if the ticket
    /// does not name a live record.
    pub(crate) fn close(&mut self, ticket: Ticket) -> bool {
        self.rentals.remove(ticket.key).is_some()
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.rentals.values().filter(|r| !r.leaked).count()
    }

    /// Remove and return every record flagged as leaked.
    pub(crate) fn drain_leaked(&mut self) -> Vec<LeakRecord> {
        let keys: Vec<DefaultKey> = self
            .rentals
            .iter()
            .filter(|(_, r)| r.leaked)
            .map(|(k, _)| k)
            .collect();
        let mut out: Vec<LeakRecord> = keys
            .into_iter()
            .filter_map(|k| self.rentals.remove(k))
            .map(|r| LeakRecord {
                sequence: r.sequence,
                length: r.length,
                cause: LeakCause::Dropped,
            })
            .collect();
        out.sort_by_key(|r| r.sequence);
        out
    }

    /// Shutdown: report leaked records, then everything still out.
    pub(crate) fn drain_all(&mut self) -> Vec<LeakRecord> {
        let mut out = self.drain_leaked();
        let mut rest: Vec<LeakRecord> = self
            .rentals
            .drain()
            .map(|(_, r)| LeakRecord {
                sequence: r.sequence,
                length: r.length,
                cause: LeakCause::OutstandingAtShutdown,
            })
            .collect();
        rest.sort_by_key(|r| r.sequence);
        out.extend(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_removes_record() {
        let ledger = Ledger::shared();
        let t = Ledger::open(&ledger, 16);
        assert!(t.belongs_to(&ledger));
        assert_eq!(ledger.lock().outstanding(), 1);
        assert!(ledger.lock().close(t));
        assert_eq!(ledger.lock().outstanding(), 0);
        assert!(ledger.lock().drain_leaked().is_empty());
    }

    #[test]
    fn leaked_records_are_reported_once() {
        let ledger = Ledger::shared();
        let t0 = Ledger::open(&ledger, 16);
        let t1 = Ledger::open(&ledger, 32);
        t1.mark_leaked();

        let first = ledger.lock().drain_leaked();
        assert_eq!(
            first,
            vec![LeakRecord {
                sequence: 1,
                length: 32,
                cause: LeakCause::Dropped
            }]
        );
        assert!(ledger.lock().drain_leaked().is_empty());
        assert_eq!(ledger.lock().outstanding(), 1);

        let rest = ledger.lock().drain_all();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].cause, LeakCause::OutstandingAtShutdown);
        drop(t0);
    }

    #[test]
    fn ticket_from_other_ledger_is_foreign() {
        let a = Ledger::shared();
        let b = Ledger::shared();
        let t = Ledger::open(&a, 16);
        assert!(!t.belongs_to(&b));
        assert!(a.lock().close(t));
    }

    #[test]
    fn marking_after_ledger_is_gone_is_harmless() {
        let ledger = Ledger::shared();
        let t = Ledger::open(&ledger, 64);
        drop(ledger);
        t.mark_leaked();
    }
}

//! Two-phase reservation ledger for one request.

use crate::error::{BudgetError, Result};
use prospector_core::{CollectorKind, Cost, RequestId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Identifier of a reservation, unique within one ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReservationId(u64);

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A provisional hold against the budget.
///
/// Consumed by [`BudgetLedger::commit`] or [`BudgetLedger::release`], so a
/// reservation can be closed only once.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a reservation must be committed or released"]
pub struct Reservation {
    id: ReservationId,
    request_id: RequestId,
    kind: CollectorKind,
    amount: Cost,
}

impl Reservation {
    /// Reservation identifier.
    #[must_use]
    pub fn id(&self) -> ReservationId {
        self.id
    }

    /// Request whose ledger issued the reservation.
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Kind the reservation was made for.
    #[must_use]
    pub fn kind(&self) -> CollectorKind {
        self.kind
    }

    /// Amount originally reserved.
    #[must_use]
    pub fn amount(&self) -> Cost {
        self.amount
    }
}

/// Outcome of [`BudgetLedger::reserve`].
#[derive(Debug, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// The amount is now held
    Allowed(Reservation),
    /// The amount exceeds what is left
    Denied {
        /// Amount asked for
        requested: Cost,
        /// Budget left (limit minus committed)
        remaining: Cost,
    },
}

/// What a charge actually recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeReceipt {
    /// Amount recorded as spend
    pub recorded: Cost,
    /// Amount the provider reported but the budget could not absorb
    pub overrun: Cost,
}

/// Final accounting of a closed reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    /// Total spend recorded against the reservation
    pub spent: Cost,
    /// Unspent amount returned to the pool
    pub released: Cost,
    /// Charges that could not be recorded within the budget
    pub overrun: Cost,
}

/// Point-in-time view of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Budget limit
    pub limit: Cost,
    /// Recorded spend
    pub spent: Cost,
    /// Reserved but not yet spent
    pub held: Cost,
    /// `spent + held`
    pub committed: Cost,
    /// `limit - committed`
    pub remaining: Cost,
    /// Reservations not yet committed or released
    pub open_reservations: usize,
}

/// Ledger audit event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEventKind {
    /// A reservation was granted
    Reserved,
    /// A reservation was refused
    Denied,
    /// Spend was recorded
    Charged,
    /// A charge exceeded what the budget could absorb
    Overrun,
    /// A reservation was committed
    Committed,
    /// A reservation was released
    Released,
}

/// One entry of the ledger's audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// When it happened
    pub at: Timestamp,
    /// Kind the event concerns
    pub kind: CollectorKind,
    /// Reservation involved, if any
    pub reservation: Option<ReservationId>,
    /// What happened
    pub event: LedgerEventKind,
    /// Amount involved
    pub amount: Cost,
}

#[derive(Debug)]
struct Hold {
    kind: CollectorKind,
    amount: Cost,
    charged: Cost,
    overrun: Cost,
}

impl Hold {
    fn unspent(&self) -> Cost {
        self.amount.saturating_sub(self.charged)
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    spent: Cost,
    held: Cost,
    next_id: u64,
    open: HashMap<ReservationId, Hold>,
    events: Vec<LedgerEvent>,
    alerted: bool,
}

impl LedgerState {
    fn committed(&self) -> Cost {
        self.spent + self.held
    }

    fn record(
        &mut self,
        kind: CollectorKind,
        reservation: Option<ReservationId>,
        event: LedgerEventKind,
        amount: Cost,
    ) {
        self.events.push(LedgerEvent {
            at: Timestamp::now(),
            kind,
            reservation,
            event,
            amount,
        });
    }
}

/// Per-request cost ledger.
///
/// Holds the running totals `{spent, held, limit}` for one request. Share it
/// between workers behind an `Arc`; every operation takes the single
/// internal lock and never awaits, so callers never block on I/O.
///
/// Invariant: `spent + held <= limit` after every operation.
#[derive(Debug)]
pub struct BudgetLedger {
    request_id: RequestId,
    limit: Cost,
    alert_threshold_pct: u8,
    state: Mutex<LedgerState>,
}

impl BudgetLedger {
    /// Create a ledger with the default 80% alert threshold.
    #[must_use]
    pub fn new(request_id: RequestId, limit: Cost) -> Self {
        Self {
            request_id,
            limit,
            alert_threshold_pct: 80,
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Set the alert threshold as a percentage of the limit (0 disables).
    #[must_use]
    pub fn with_alert_threshold(mut self, pct: u8) -> Self {
        self.alert_threshold_pct = pct.min(100);
        self
    }

    /// Request this ledger belongs to.
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Budget limit.
    #[must_use]
    pub fn limit(&self) -> Cost {
        self.limit
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve `amount` for a task of `kind`.
    ///
    /// Fails fast with `Denied` when `amount > limit - committed`; never blocks.
    pub fn reserve(&self, kind: CollectorKind, amount: Cost) -> ReserveOutcome {
        let mut state = self.lock();
        let remaining = self.limit.saturating_sub(state.committed());

        if amount > remaining {
            state.record(kind, None, LedgerEventKind::Denied, amount);
            debug!(
                request_id = %self.request_id,
                kind = %kind,
                requested = %amount,
                remaining = %remaining,
                "budget reservation denied"
            );
            return ReserveOutcome::Denied {
                requested: amount,
                remaining,
            };
        }

        let id = ReservationId(state.next_id);
        state.next_id += 1;
        state.held += amount;
        state.open.insert(
            id,
            Hold {
                kind,
                amount,
                charged: Cost::ZERO,
                overrun: Cost::ZERO,
            },
        );
        state.record(kind, Some(id), LedgerEventKind::Reserved, amount);
        debug!(
            request_id = %self.request_id,
            kind = %kind,
            reservation = %id,
            amount = %amount,
            "budget reserved"
        );
        self.check_alert(&mut state);

        ReserveOutcome::Allowed(Reservation {
            id,
            request_id: self.request_id.clone(),
            kind,
            amount,
        })
    }

    /// Record `amount` of provider spend against an open reservation.
    ///
    /// Spend beyond the reservation grows it only as far as the remaining
    /// budget allows; anything past that is reported as overrun and not
    /// recorded.
    pub fn charge(&self, reservation: &Reservation, amount: Cost) -> Result<ChargeReceipt> {
        let mut state = self.lock();
        let receipt = self.apply_charge(&mut state, reservation, amount)?;
        self.check_alert(&mut state);
        Ok(receipt)
    }

    /// Close a reservation, bringing its reported spend up to `actual`.
    ///
    /// Only the part of `actual` not already reported through
    /// [`charge`](Self::charge) is applied. If more than `actual` was already
    /// charged the recorded spend stands.
    /// The unspent remainder returns to the pool.
    pub fn commit(&self, reservation: Reservation, actual: Cost) -> Result<Settlement> {
        let mut state = self.lock();
        let hold = self.hold(&state, &reservation)?;
        let reported = hold.charged + hold.overrun;
        if actual > reported {
            self.apply_charge(&mut state, &reservation, actual.saturating_sub(reported))?;
        }
        let settlement = self.close(&mut state, &reservation, LedgerEventKind::Committed)?;
        self.check_alert(&mut state);
        Ok(settlement)
    }

    /// Close a reservation without further spend (failure or cancellation).
    ///
    /// Spend already charged stands; the unspent remainder returns to the pool.
    pub fn release(&self, reservation: Reservation) -> Result<Settlement> {
        let mut state = self.lock();
        self.close(&mut state, &reservation, LedgerEventKind::Released)
    }

    /// Current totals.
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.lock();
        let committed = state.committed();
        LedgerSnapshot {
            limit: self.limit,
            spent: state.spent,
            held: state.held,
            committed,
            remaining: self.limit.saturating_sub(committed),
            open_reservations: state.open.len(),
        }
    }

    /// Copy of the audit log.
    #[must_use]
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.lock().events.clone()
    }

    fn hold<'a>(&self, state: &'a LedgerState, reservation: &Reservation) -> Result<&'a Hold> {
        let id = self.owned(reservation)?;
        state.open.get(&id).ok_or_else(|| self.unknown(id))
    }

    /// Id of `reservation` if this ledger issued it. Ids are only unique
    /// per ledger, so the owning request is checked first.
    fn owned(&self, reservation: &Reservation) -> Result<ReservationId> {
        if reservation.request_id == self.request_id {
            Ok(reservation.id)
        } else {
            Err(self.unknown(reservation.id))
        }
    }

    fn unknown(&self, id: ReservationId) -> BudgetError {
        BudgetError::UnknownReservation {
            reservation: id.0,
            request_id: self.request_id.to_string(),
        }
    }

    fn apply_charge(
        &self,
        state: &mut LedgerState,
        reservation: &Reservation,
        amount: Cost,
    ) -> Result<ChargeReceipt> {
        let id = self.owned(reservation)?;
        let free = self.limit.saturating_sub(state.committed());
        let hold = state.open.get_mut(&id).ok_or_else(|| self.unknown(id))?;
        let kind = hold.kind;

        let unspent = hold.unspent();
        let grow = if amount > unspent {
            (amount.saturating_sub(unspent)).min(free)
        } else {
            Cost::ZERO
        };
        hold.amount += grow;

        let recorded = amount.min(unspent + grow);
        let overrun = amount.saturating_sub(recorded);
        hold.charged += recorded;
        hold.overrun += overrun;

        // grow moves from free budget into held, recorded moves from held to spent
        state.held = (state.held + grow).saturating_sub(recorded);
        state.spent += recorded;

        if !recorded.is_zero() {
            state.record(kind, Some(id), LedgerEventKind::Charged, recorded);
        }
        if !overrun.is_zero() {
            state.record(kind, Some(id), LedgerEventKind::Overrun, overrun);
            warn!(
                request_id = %self.request_id,
                kind = %kind,
                reservation = %id,
                overrun = %overrun,
                "provider charge exceeds remaining budget; excess not recorded"
            );
        }

        Ok(ChargeReceipt { recorded, overrun })
    }

    fn close(
        &self,
        state: &mut LedgerState,
        reservation: &Reservation,
        event: LedgerEventKind,
    ) -> Result<Settlement> {
        let id = self.owned(reservation)?;
        let hold = state.open.remove(&id).ok_or_else(|| self.unknown(id))?;
        let released = hold.unspent();
        state.held = state.held.saturating_sub(released);
        state.record(hold.kind, Some(id), event, hold.charged);

        debug!(
            request_id = %self.request_id,
            kind = %hold.kind,
            reservation = %id,
            spent = %hold.charged,
            released = %released,
            "budget reservation closed"
        );

        Ok(Settlement {
            spent: hold.charged,
            released,
            overrun: hold.overrun,
        })
    }

    fn check_alert(&self, state: &mut LedgerState) {
        if state.alerted || self.alert_threshold_pct == 0 || self.limit.is_zero() {
            return;
        }
        let committed = u128::from(state.committed().as_micros());
        let threshold = u128::from(self.limit.as_micros()) * u128::from(self.alert_threshold_pct);
        if committed * 100 >= threshold {
            state.alerted = true;
            warn!(
                request_id = %self.request_id,
                committed = %state.committed(),
                limit = %self.limit,
                threshold_pct = self.alert_threshold_pct,
                "budget alert threshold reached"
            );
        }
    }
}

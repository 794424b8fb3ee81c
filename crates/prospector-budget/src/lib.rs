//! Prospector Budget - Per-request cost ledger.
//!
//! Every request runs against its own [`BudgetLedger`]. Tasks reserve their
//! estimated cost before calling a collector, record per-attempt charges,
//! and finally commit or release the reservation. All mutations go through
//! one lock, so concurrent tasks never observe a partial update and recorded
//! spend never exceeds the limit.
//!
//! # Example
//!
//! ```rust
//! use prospector_budget::{BudgetLedger, ReserveOutcome};
//! use prospector_core::{CollectorKind, Cost, RequestId};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = BudgetLedger::new(RequestId::generate(), Cost::from_usd(50.0));
//!
//! let ReserveOutcome::Allowed(reservation) =
//!     ledger.reserve(CollectorKind::Zoominfo, Cost::from_usd(20.0))
//! else {
//!     return Ok(());
//! };
//! ledger.commit(reservation, Cost::from_usd(18.5))?;
//!
//! assert_eq!(ledger.snapshot().spent, Cost::from_usd(18.5));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod ledger;

pub use error::{BudgetError, Result};
pub use ledger::{
    BudgetLedger, ChargeReceipt, LedgerEvent, LedgerEventKind, LedgerSnapshot, Reservation,
    ReservationId, ReserveOutcome, Settlement,
};

//! Recording schedules
//!
//! Turns the weekly recording windows declared in the appliance config into
//! systemd timer/service pairs and keeps the installed pairs in sync:
//! - [`calendar`] validates a schedule and compiles its `OnCalendar=` expression
//! - [`unit`] renders the unit file text
//! - [`sync`] reconciles desired schedules against what the host has installed
//!
//! Overlapping schedules are not detected; two windows that overlap simply
//! start two recordings.

pub mod calendar;
pub mod error;
pub mod model;
pub mod sync;
pub mod unit;

pub use calendar::{compile, CompiledSchedule};
pub use error::InvalidSchedule;
pub use model::{DayOfWeek, Schedule};
pub use sync::{ItemOutcome, ReconcileReport, ReportItem, SyncAction, Synchronizer};
pub use unit::{generate, UnitPair, UnitSettings};

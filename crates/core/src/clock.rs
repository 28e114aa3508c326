//! Injectable time source.
//!
//! Every timestamp the core writes (`createdAt`, `transferredAt`) and every staleness
//! check reads "now" through a [`Clock`], so tests can pin time.

use chrono::{DateTime, Local, NaiveDateTime, Utc};

pub trait Clock: Send + Sync {
    /// Current instant, used for persisted timestamps.
    fn now(&self) -> DateTime<Utc>;

    /// Current wall-clock time on the ward.
    ///
    /// Venous access dates are written by hand in local day/month form, so staleness is
    /// evaluated against local time rather than UTC.
    fn local_now(&self) -> NaiveDateTime {
        self.now().with_timezone(&Local).naive_local()
    }
}

/// The system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant. Its wall-clock time is the UTC time, so results do not
/// depend on the host timezone.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }

    fn local_now(&self) -> NaiveDateTime {
        self.0.naive_utc()
    }
}

//! Time source for `close_time` and `updated_at`.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Supplies the current instant. Implementations must never go backwards
/// within a process; "most recent" comparisons depend on it.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time, clamped so successive readings never decrease.
#[derive(Debug, Default)]
pub struct SystemClock {
  last: Mutex<Option<DateTime<Utc>>>,
}

impl SystemClock {
  pub fn new() -> Self { Self::default() }
}

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    let wall = Utc::now();
    let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
    let now = match *last {
      Some(prev) if prev > wall => prev,
      _ => wall,
    };
    *last = Some(now);
    now
  }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self { Self { now: Mutex::new(start) } }

  pub fn set(&self, at: DateTime<Utc>) {
    *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
  }

  pub fn advance(&self, by: Duration) {
    let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
    *now += by;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> { *self.now.lock().unwrap_or_else(|e| e.into_inner()) }
}

//! services/client/src/adapters/clock.rs
//!
//! The wall clock, behind the core's `Clock` port.

use chrono::{DateTime, Utc};
use model_test_core::ports::Clock;

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

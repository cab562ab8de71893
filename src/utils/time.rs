use chrono::{DateTime, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Whole seconds between two instants, floored and never negative.
pub fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> i32 {
    (to - from).num_seconds().max(0) as i32
}

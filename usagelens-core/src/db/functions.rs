//! SQL scalar functions that carry local-time bucketing into SQLite.
//!
//! Both the rollup path and the raw-event path group through these
//! functions, so a bucket computed in SQL is bit-identical to one computed
//! by [`Granularity::bucket_start`] in Rust.
//!
//! | Function | Result |
//! |----------|--------|
//! | `lens_bucket(ts_ms, 'hour'\|'day'\|'week'\|'month')` | bucket start, ms |
//! | `lens_hour(ts_ms)` | local hour, 0-23 |
//! | `lens_weekday(ts_ms)` | local weekday, 0 = Sunday |
//! | `lens_tokens(text)` | token count, 0 when malformed |

use crate::time::bucket::{hour_of_day, weekday};
use crate::time::{BucketZone, Granularity};
use crate::types::parse_token_count;
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

/// Register the `lens_*` functions on `conn`, bucketing in `tz`.
///
/// Re-registering replaces the previous definitions.
pub fn register_time_functions<Tz: BucketZone>(conn: &Connection, tz: Tz) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function("lens_bucket", 2, flags, move |ctx| {
        let ts: Option<i64> = ctx.get(0)?;
        let unit: String = ctx.get(1)?;
        let granularity = Granularity::parse(&unit).ok_or_else(|| {
            rusqlite::Error::UserFunctionError(format!("unknown granularity: {}", unit).into())
        })?;
        Ok(ts.map(|ts| granularity.bucket_start(&tz, ts)))
    })?;

    conn.create_scalar_function("lens_hour", 1, flags, move |ctx| {
        let ts: Option<i64> = ctx.get(0)?;
        Ok(ts.map(|ts| i64::from(hour_of_day(&tz, ts))))
    })?;

    conn.create_scalar_function("lens_weekday", 1, flags, move |ctx| {
        let ts: Option<i64> = ctx.get(0)?;
        Ok(ts.map(|ts| i64::from(weekday(&tz, ts))))
    })?;

    conn.create_scalar_function("lens_tokens", 1, flags, |ctx| {
        use rusqlite::types::ValueRef;
        let parsed = match ctx.get_raw(0) {
            ValueRef::Integer(n) => n.max(0),
            ValueRef::Real(f) => (f as i64).max(0),
            ValueRef::Text(bytes) => parse_token_count(std::str::from_utf8(bytes).ok()),
            ValueRef::Null | ValueRef::Blob(_) => 0,
        };
        Ok(parsed)
    })?;

    Ok(())
}

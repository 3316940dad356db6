//! `date.*` catalog functions
//!
//! `date.now` is the catalog's sole impure member, allowed only where a
//! pipe's row 0 permits a nullary seed; everything else converts between
//! epoch milliseconds and ISO-8601 strings deterministically.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use super::{as_i64, as_str, FunctionRegistry};
use crate::pipe::Val;

pub fn register(registry: &mut FunctionRegistry) {
    registry.register("date.now", 0, Some(0), |_args| {
        Ok(Val::Defined(json!(Utc::now().timestamp_millis())))
    });

    registry.register("date.to_iso_string", 1, Some(1), |args| {
        let millis = as_i64("date.to_iso_string", args, 0)?;
        let dt = Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| super::arg_err("date.to_iso_string", "timestamp out of range"))?;
        Ok(Val::Defined(json!(dt.to_rfc3339_opts(
            chrono::SecondsFormat::Millis,
            true
        ))))
    });

    registry.register("date.from_iso_string", 1, Some(1), |args| {
        let s = as_str("date.from_iso_string", args, 0)?;
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| super::arg_err("date.from_iso_string", &format!("bad timestamp: {}", e)))?;
        Ok(Val::Defined(json!(dt.timestamp_millis())))
    });
}

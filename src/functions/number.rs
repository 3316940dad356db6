//! `number.*` catalog functions

use serde_json::json;

use super::{as_f64, as_i64, FunctionRegistry};
use crate::pipe::Val;

pub fn register(registry: &mut FunctionRegistry) {
    registry.register("number.gt", 2, Some(2), |args| {
        Ok(Val::Defined(json!(as_f64("number.gt", args, 0)? > as_f64("number.gt", args, 1)?)))
    });

    registry.register("number.gte", 2, Some(2), |args| {
        Ok(Val::Defined(json!(
            as_f64("number.gte", args, 0)? >= as_f64("number.gte", args, 1)?
        )))
    });

    registry.register("number.lt", 2, Some(2), |args| {
        Ok(Val::Defined(json!(as_f64("number.lt", args, 0)? < as_f64("number.lt", args, 1)?)))
    });

    registry.register("number.lte", 2, Some(2), |args| {
        Ok(Val::Defined(json!(
            as_f64("number.lte", args, 0)? <= as_f64("number.lte", args, 1)?
        )))
    });

    registry.register("number.eq", 2, Some(2), |args| {
        Ok(Val::Defined(json!(
            as_f64("number.eq", args, 0)? == as_f64("number.eq", args, 1)?
        )))
    });

    registry.register("number.to_fixed", 2, Some(2), |args| {
        let n = as_f64("number.to_fixed", args, 0)?;
        let digits = as_i64("number.to_fixed", args, 1)?.clamp(0, 20) as usize;
        Ok(Val::Defined(json!(format!("{:.*}", digits, n))))
    });

    registry.register("number.is_finite", 1, Some(1), |args| {
        let finite = args
            .first()
            .and_then(|v| v.as_json())
            .and_then(|v| v.as_f64())
            .map(|f| f.is_finite())
            .unwrap_or(false);
        Ok(Val::Defined(json!(finite)))
    });
}

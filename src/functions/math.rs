//! `math.*` catalog functions

use super::{as_f64, number, FunctionRegistry};
use crate::pipe::Val;

pub fn register(registry: &mut FunctionRegistry) {
    registry.register("math.add", 2, None, |args| {
        let mut sum = 0.0;
        for i in 0..args.len() {
            sum += as_f64("math.add", args, i)?;
        }
        Ok(number(sum))
    });

    registry.register("math.subtract", 2, Some(2), |args| {
        Ok(number(as_f64("math.subtract", args, 0)? - as_f64("math.subtract", args, 1)?))
    });

    registry.register("math.multiply", 2, None, |args| {
        let mut product = 1.0;
        for i in 0..args.len() {
            product *= as_f64("math.multiply", args, i)?;
        }
        Ok(number(product))
    });

    registry.register("math.divide", 2, Some(2), |args| {
        let divisor = as_f64("math.divide", args, 1)?;
        if divisor == 0.0 {
            return Err(super::arg_err("math.divide", "division by zero"));
        }
        Ok(number(as_f64("math.divide", args, 0)? / divisor))
    });

    registry.register("math.max", 1, None, |args| {
        let mut max = f64::NEG_INFINITY;
        for i in 0..args.len() {
            max = max.max(as_f64("math.max", args, i)?);
        }
        Ok(number(max))
    });

    registry.register("math.min", 1, None, |args| {
        let mut min = f64::INFINITY;
        for i in 0..args.len() {
            min = min.min(as_f64("math.min", args, i)?);
        }
        Ok(number(min))
    });

    registry.register("math.abs", 1, Some(1), |args| {
        Ok(number(as_f64("math.abs", args, 0)?.abs()))
    });

    registry.register("math.floor", 1, Some(1), |args| {
        Ok(number(as_f64("math.floor", args, 0)?.floor()))
    });

    registry.register("math.ceil", 1, Some(1), |args| {
        Ok(number(as_f64("math.ceil", args, 0)?.ceil()))
    });

    registry.register("math.round", 1, Some(1), |args| {
        Ok(number(as_f64("math.round", args, 0)?.round()))
    });

    registry.register("math.pow", 2, Some(2), |args| {
        Ok(number(as_f64("math.pow", args, 0)?.powf(as_f64("math.pow", args, 1)?)))
    });
}

//! Built-in functions bound in the root scope.
//!
//! Operator syntax resolves to the `Core:` functions here by name, so a host
//! can observe or replace them like any other binding.

use std::collections::HashMap;

use crate::error::ErrorKind;
use crate::native::NativeContext;
use crate::scope::Variable;
use crate::value::Value;
use crate::Result;

/// Largest number of elements `Core:range` will build.
const MAX_RANGE_LEN: f64 = 16_777_216.0;

fn arg(args: &[Value], i: usize) -> Result<&Value> {
    args.get(i).ok_or_else(|| ErrorKind::ExpectedAny.into())
}

fn nums(args: &[Value]) -> Result<(f64, f64)> {
    Ok((arg(args, 0)?.as_num()?, arg(args, 1)?.as_num()?))
}

/// Numeric operation that must not produce NaN.
fn checked(op: &str, n: f64) -> Result<Value> {
    if n.is_nan() {
        Err(ErrorKind::InvalidOperation(format!("{} produced NaN", op)).into())
    } else {
        Ok(Value::Num(n))
    }
}

fn binary(f: fn(f64, f64) -> Result<Value>) -> impl Fn(&[Value], &NativeContext) -> Result<Value> {
    move |args: &[Value], _: &NativeContext| {
        let (a, b) = nums(args)?;
        f(a, b)
    }
}

/// Every library binding, keyed by its qualified name.
pub fn library() -> HashMap<String, Variable> {
    let mut lib: Vec<(&str, Value)> = vec![
        ("Core:add", Value::native("Core:add", binary(|a, b| Ok(Value::Num(a + b))))),
        ("Core:sub", Value::native("Core:sub", binary(|a, b| Ok(Value::Num(a - b))))),
        ("Core:mul", Value::native("Core:mul", binary(|a, b| Ok(Value::Num(a * b))))),
        ("Core:div", Value::native("Core:div", binary(|a, b| checked("division", a / b)))),
        ("Core:pow", Value::native("Core:pow", binary(|a, b| checked("exponentiation", a.powf(b))))),
        ("Core:mod", Value::native("Core:mod", binary(|a, b| checked("remainder", a % b)))),
        ("Core:lt", Value::native("Core:lt", binary(|a, b| Ok(Value::Bool(a < b))))),
        ("Core:lteq", Value::native("Core:lteq", binary(|a, b| Ok(Value::Bool(a <= b))))),
        ("Core:gt", Value::native("Core:gt", binary(|a, b| Ok(Value::Bool(a > b))))),
        ("Core:gteq", Value::native("Core:gteq", binary(|a, b| Ok(Value::Bool(a >= b))))),
    ];
    lib.extend([
        (
            "Core:eq",
            Value::native("Core:eq", |args, _| Ok(Value::Bool(arg(args, 0)? == arg(args, 1)?))),
        ),
        (
            "Core:neq",
            Value::native("Core:neq", |args, _| Ok(Value::Bool(arg(args, 0)? != arg(args, 1)?))),
        ),
        (
            "Core:type",
            Value::native("Core:type", |args, _| Ok(Value::str(arg(args, 0)?.type_name()))),
        ),
        (
            "Core:to_str",
            Value::native("Core:to_str", |args, _| Ok(Value::Str(arg(args, 0)?.repr()))),
        ),
        (
            "Core:range",
            Value::native("Core:range", |args, _| {
                let (a, b) = nums(args)?;
                if !a.is_finite() || !b.is_finite() {
                    return Err(ErrorKind::InvalidOperation("Core:range bounds must be finite".into()).into());
                }
                if (b - a).abs() >= MAX_RANGE_LEN {
                    return Err(ErrorKind::InvalidOperation("Core:range is too large".into()).into());
                }
                let items = if a <= b {
                    (0..=(b - a).floor() as u64).map(|i| Value::Num(a + i as f64)).collect()
                } else {
                    (0..=(a - b).floor() as u64).map(|i| Value::Num(a - i as f64)).collect()
                };
                Ok(Value::arr(items))
            }),
        ),
        (
            "Error:create",
            Value::native("Error:create", |args, _| {
                let name = arg(args, 0)?.as_str()?.to_string();
                Ok(Value::error(name, args.get(1).cloned()))
            }),
        ),
    ]);
    lib.into_iter()
        .map(|(name, value)| (name.to_string(), Variable::constant(value)))
        .collect()
}

//! Properties of non-object values: `"abc".len`, `[1, 2].push(3)`, ...
//!
//! Method-like properties are returned as native functions bound to the
//! receiver.

use crate::error::ErrorKind;
use crate::native::NativeFn;
use crate::reference::{out_of_range, slot};
use crate::value::{format_num, Value};
use crate::Result;

fn no_such_prop(target: &Value, name: &str) -> ErrorKind {
    ErrorKind::NoSuchProp {
        name: name.to_string(),
        target: target.type_name(),
    }
}

fn arg(args: &[Value], i: usize) -> Result<&Value> {
    args.get(i).ok_or_else(|| ErrorKind::ExpectedAny.into())
}

/// Character `index` of a string.
pub(crate) fn index_str(s: &str, index: f64) -> Result<Value> {
    let len = s.chars().count();
    match slot(index, len).and_then(|i| s.chars().nth(i)) {
        Some(c) => Ok(Value::Str(c.to_string())),
        None => Err(out_of_range(index, len).into()),
    }
}

pub(crate) fn get_prop(target: &Value, name: &str) -> Result<Value> {
    match target {
        Value::Str(s) => str_prop(s, name).ok_or_else(|| no_such_prop(target, name).into()),
        Value::Num(n) => match name {
            "to_str" => {
                let n = *n;
                Ok(Value::native("num.to_str", move |_, _| Ok(Value::Str(format_num(n)))))
            }
            _ => Err(no_such_prop(target, name).into()),
        },
        Value::Bool(b) => match name {
            "to_str" => {
                let b = *b;
                Ok(Value::native("bool.to_str", move |_, _| Ok(Value::Str(b.to_string()))))
            }
            _ => Err(no_such_prop(target, name).into()),
        },
        Value::Arr(_) => arr_prop(target, name),
        Value::Error { name: error_name, info } => match name {
            "name" => Ok(Value::Str(error_name.clone())),
            "info" => Ok(info.as_deref().cloned().unwrap_or_default()),
            _ => Err(no_such_prop(target, name).into()),
        },
        Value::Null | Value::Fn(_) | Value::Obj(_) => Err(no_such_prop(target, name).into()),
    }
}

fn str_prop(s: &str, name: &str) -> Option<Value> {
    let s = s.to_string();
    let prop = match name {
        "len" => Value::Num(s.chars().count() as f64),
        "upper" => Value::native("str.upper", move |_, _| Ok(Value::Str(s.to_uppercase()))),
        "lower" => Value::native("str.lower", move |_, _| Ok(Value::Str(s.to_lowercase()))),
        "to_num" => Value::native("str.to_num", move |_, _| {
            Ok(s.trim().parse::<f64>().map(Value::Num).unwrap_or_default())
        }),
        "split" => Value::native("str.split", move |args, _| {
            let parts: Vec<Value> = match args.first() {
                Some(sep) if !sep.as_str()?.is_empty() => {
                    s.split(sep.as_str()?).map(Value::from).collect()
                }
                _ => s.chars().map(|c| Value::Str(c.to_string())).collect(),
            };
            Ok(Value::arr(parts))
        }),
        _ => return None,
    };
    Some(prop)
}

fn arr_prop(target: &Value, name: &str) -> Result<Value> {
    let items = target.as_arr()?.clone();
    let prop = match name {
        "len" => Value::Num(items.borrow().len() as f64),
        "push" => Value::native("arr.push", move |args, _| {
            items.borrow_mut().push(arg(args, 0)?.clone());
            Ok(Value::Arr(items.clone()))
        }),
        "pop" => Value::native("arr.pop", move |_, _| Ok(items.borrow_mut().pop().unwrap_or_default())),
        "join" => Value::native("arr.join", move |args, _| {
            let sep = match args.first() {
                Some(sep) => sep.as_str()?.to_string(),
                None => String::new(),
            };
            let parts: Vec<String> = items.borrow().iter().map(Value::repr).collect();
            Ok(Value::Str(parts.join(&sep)))
        }),
        "map" => {
            let sync_items = items.clone();
            let native = NativeFn::new_async(move |args, ctx| {
                let items = items.clone();
                async move {
                    let f = arg(&args, 0)?.clone();
                    let snapshot = items.borrow().clone();
                    let mut out = Vec::with_capacity(snapshot.len());
                    for (i, item) in snapshot.into_iter().enumerate() {
                        out.push(ctx.call(&f, vec![item, Value::Num(i as f64)]).await?);
                    }
                    Ok::<_, crate::Error>(Value::arr(out))
                }
            })
            .with_sync(move |args, ctx| {
                let f = arg(args, 0)?;
                let snapshot = sync_items.borrow().clone();
                let mut out = Vec::with_capacity(snapshot.len());
                for (i, item) in snapshot.into_iter().enumerate() {
                    out.push(ctx.call_sync(f, vec![item, Value::Num(i as f64)])?);
                }
                Ok(Value::arr(out))
            });
            Value::native_fn("arr.map", native)
        }
        _ => return Err(no_such_prop(target, name).into()),
    };
    Ok(prop)
}

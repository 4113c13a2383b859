//! Runtime values for the skein interpreter.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use serde_json::Value as JsonValue;
use skein_ast::{FnDef, NodeKind};

use crate::error::Error;
use crate::native::NativeFn;
use crate::scope::Scope;
use crate::Result;

pub type ArrRef = Rc<Shared<Vec<Value>>>;
pub type ObjRef = Rc<Shared<BTreeMap<String, Value>>>;

/// Payload of an array or object: the mutable contents plus the attributes
/// attached when the value was defined. Derefs to the contents' `RefCell`.
#[derive(Debug, Default)]
pub struct Shared<T> {
    contents: RefCell<T>,
    attrs: RefCell<Vec<Attr>>,
}

impl<T> Shared<T> {
    pub fn new(contents: T) -> Self {
        Self {
            contents: RefCell::new(contents),
            attrs: RefCell::new(Vec::new()),
        }
    }

    pub fn attrs(&self) -> Vec<Attr> {
        self.attrs.borrow().clone()
    }

    pub(crate) fn set_attrs(&self, attrs: Vec<Attr>) {
        *self.attrs.borrow_mut() = attrs;
    }
}

impl<T> Deref for Shared<T> {
    type Target = RefCell<T>;

    fn deref(&self) -> &RefCell<T> {
        &self.contents
    }
}

/// A runtime value.
///
/// Arrays and objects are shared by reference: cloning a `Value` clones the
/// handle, so mutations through one copy are visible through every other.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Arr(ArrRef),
    Obj(ObjRef),
    Fn(Rc<Function>),
    Error {
        name: String,
        info: Option<Box<Value>>,
    },
}

/// A `#[name value]` attribute after evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub name: String,
    pub value: Value,
}

/// A callable value: a closure created from a function literal, or a native
/// function supplied by the host.
pub struct Function {
    name: RefCell<Option<String>>,
    attrs: RefCell<Vec<Attr>>,
    pub(crate) body: FnBody,
}

pub(crate) enum FnBody {
    User {
        def: Rc<FnDef>,
        /// One entry per parameter: `None` means the argument is required.
        defaults: Vec<Option<Value>>,
        scope: Rc<Scope>,
    },
    Native(NativeFn),
}

impl Function {
    pub(crate) fn user(def: Rc<FnDef>, defaults: Vec<Option<Value>>, scope: Rc<Scope>) -> Self {
        Self {
            name: RefCell::new(None),
            attrs: RefCell::new(Vec::new()),
            body: FnBody::User {
                def,
                defaults,
                scope,
            },
        }
    }

    pub fn native(name: impl Into<String>, native: NativeFn) -> Self {
        Self {
            name: RefCell::new(Some(name.into())),
            attrs: RefCell::new(Vec::new()),
            body: FnBody::Native(native),
        }
    }

    /// Qualified name given at definition time, if any.
    pub fn name(&self) -> Option<String> {
        self.name.borrow().clone()
    }

    pub(crate) fn set_name(&self, name: String) {
        *self.name.borrow_mut() = Some(name);
    }

    pub fn attrs(&self) -> Vec<Attr> {
        self.attrs.borrow().clone()
    }

    pub(crate) fn set_attrs(&self, attrs: Vec<Attr>) {
        *self.attrs.borrow_mut() = attrs;
    }

    pub fn is_native(&self) -> bool {
        matches!(self.body, FnBody::Native(_))
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name.borrow())
            .field("native", &self.is_native())
            .finish()
    }
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn arr(items: Vec<Value>) -> Self {
        Value::Arr(Rc::new(Shared::new(items)))
    }

    pub fn obj<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        let map = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Value::Obj(Rc::new(Shared::new(map)))
    }

    pub fn error(name: impl Into<String>, info: Option<Value>) -> Self {
        Value::Error {
            name: name.into(),
            info: info.map(Box::new),
        }
    }

    /// Lowercase type tag used in messages and by `Core:type`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Num(_) => "num",
            Value::Str(_) => "str",
            Value::Arr(_) => "arr",
            Value::Obj(_) => "obj",
            Value::Fn(_) => "fn",
            Value::Error { .. } => "error",
        }
    }

    /// Attributes attached at definition time. Only arrays, objects and
    /// functions carry them; other values always report none.
    pub fn attrs(&self) -> Vec<Attr> {
        match self {
            Value::Arr(items) => items.attrs(),
            Value::Obj(map) => map.attrs(),
            Value::Fn(f) => f.attrs(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn set_attrs(&self, attrs: Vec<Attr>) {
        match self {
            Value::Arr(items) => items.set_attrs(attrs),
            Value::Obj(map) => map.set_attrs(attrs),
            Value::Fn(f) => f.set_attrs(attrs),
            _ => {}
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(Error::type_mismatch("bool", other)),
        }
    }

    pub fn as_num(&self) -> Result<f64> {
        match self {
            Value::Num(n) => Ok(*n),
            other => Err(Error::type_mismatch("num", other)),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(Error::type_mismatch("str", other)),
        }
    }

    pub fn as_arr(&self) -> Result<&ArrRef> {
        match self {
            Value::Arr(items) => Ok(items),
            other => Err(Error::type_mismatch("arr", other)),
        }
    }

    pub fn as_obj(&self) -> Result<&ObjRef> {
        match self {
            Value::Obj(map) => Ok(map),
            other => Err(Error::type_mismatch("obj", other)),
        }
    }

    pub fn as_fn(&self) -> Result<&Rc<Function>> {
        match self {
            Value::Fn(f) => Ok(f),
            other => Err(Error::type_mismatch("fn", other)),
        }
    }

    /// Human-readable rendering, as used by templates and `print`.
    ///
    /// Strings render bare at the top level and quoted inside containers.
    /// A container that contains itself renders the inner occurrence as `...`.
    pub fn repr(&self) -> String {
        self.repr_inner(false, &mut Vec::new())
    }

    /// Rendering with strings quoted, as they appear inside containers.
    pub fn repr_literal(&self) -> String {
        self.repr_inner(true, &mut Vec::new())
    }

    fn repr_inner(&self, quote: bool, seen: &mut Vec<*const ()>) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Num(n) => format_num(*n),
            Value::Str(s) if quote => format!(
                "\"{}\"",
                s.replace('\\', "\\\\")
                    .replace('"', "\\\"")
                    .replace('\r', "\\r")
                    .replace('\n', "\\n")
            ),
            Value::Str(s) => s.clone(),
            Value::Arr(items) => {
                let ptr = Rc::as_ptr(items) as *const ();
                if seen.contains(&ptr) {
                    return "...".to_string();
                }
                seen.push(ptr);
                let parts: Vec<String> = items
                    .borrow()
                    .iter()
                    .map(|v| v.repr_inner(true, seen))
                    .collect();
                seen.pop();
                format!("[ {} ]", parts.join(", "))
            }
            Value::Obj(map) => {
                let ptr = Rc::as_ptr(map) as *const ();
                if seen.contains(&ptr) {
                    return "...".to_string();
                }
                seen.push(ptr);
                let parts: Vec<String> = map
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.repr_inner(true, seen)))
                    .collect();
                seen.pop();
                format!("{{ {} }}", parts.join(", "))
            }
            Value::Fn(f) => match &f.body {
                FnBody::User { def, .. } => {
                    let params: Vec<&str> = def
                        .params
                        .iter()
                        .map(|p| match &p.dest.kind {
                            NodeKind::Identifier { name } => name.as_str(),
                            _ => "?",
                        })
                        .collect();
                    format!("@( {} ) {{ ... }}", params.join(", "))
                }
                FnBody::Native(_) => "@( ?? ) { native code }".to_string(),
            },
            Value::Error { name, .. } => format!("Error: {}", name),
        }
    }

    /// Convert a JSON document into a value.
    pub fn from_json(s: &str) -> std::result::Result<Value, serde_json::Error> {
        let json: JsonValue = serde_json::from_str(s)?;
        Ok(Value::from_json_value(json))
    }

    pub fn from_json_value(json: JsonValue) -> Value {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => Value::Num(n.as_f64().unwrap_or(0.0)),
            JsonValue::String(s) => Value::Str(s),
            JsonValue::Array(arr) => Value::arr(arr.into_iter().map(Value::from_json_value).collect()),
            JsonValue::Object(obj) => Value::obj(obj.into_iter().map(|(k, v)| (k, Value::from_json_value(v)))),
        }
    }

    /// Convert this value to JSON.
    ///
    /// Functions become `null`; errors become `{ "error": name, "info": ... }`.
    /// Self-containing containers are cut off with `null`.
    pub fn to_json_value(&self) -> JsonValue {
        self.to_json_inner(&mut Vec::new())
    }

    fn to_json_inner(&self, seen: &mut Vec<*const ()>) -> JsonValue {
        match self {
            Value::Null | Value::Fn(_) => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Num(n) => serde_json::Number::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Str(s) => JsonValue::String(s.clone()),
            Value::Arr(items) => {
                let ptr = Rc::as_ptr(items) as *const ();
                if seen.contains(&ptr) {
                    return JsonValue::Null;
                }
                seen.push(ptr);
                let arr = items.borrow().iter().map(|v| v.to_json_inner(seen)).collect();
                seen.pop();
                JsonValue::Array(arr)
            }
            Value::Obj(map) => {
                let ptr = Rc::as_ptr(map) as *const ();
                if seen.contains(&ptr) {
                    return JsonValue::Null;
                }
                seen.push(ptr);
                let obj: serde_json::Map<String, JsonValue> = map
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json_inner(seen)))
                    .collect();
                seen.pop();
                JsonValue::Object(obj)
            }
            Value::Error { name, info } => {
                let mut obj = serde_json::Map::new();
                obj.insert("error".to_string(), JsonValue::String(name.clone()));
                if let Some(info) = info {
                    obj.insert("info".to_string(), info.to_json_inner(seen));
                }
                JsonValue::Object(obj)
            }
        }
    }
}

/// Numbers print the way scripts expect: integral values without a
/// fractional part, and `NaN`/`Infinity` spelled out.
pub(crate) fn format_num(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Structural equality for data, identity for functions. Attributes are
/// not compared.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.eq_inner(other, &mut Vec::new())
    }
}

impl Value {
    /// `seen` holds the container pairs under comparison on the current
    /// path; meeting one again means both sides cycle the same way.
    fn eq_inner(&self, other: &Self, seen: &mut Vec<(*const (), *const ())>) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Arr(a), Value::Arr(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let pair = (Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ());
                if seen.contains(&pair) {
                    return true;
                }
                seen.push(pair);
                let (a, b) = (a.borrow(), b.borrow());
                let equal = a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.eq_inner(y, seen));
                seen.pop();
                equal
            }
            (Value::Obj(a), Value::Obj(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let pair = (Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ());
                if seen.contains(&pair) {
                    return true;
                }
                seen.push(pair);
                let (a, b) = (a.borrow(), b.borrow());
                let equal = a.len() == b.len()
                    && a
                        .iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va.eq_inner(vb, seen));
                seen.pop();
                equal
            }
            (Value::Fn(a), Value::Fn(b)) => Rc::ptr_eq(a, b),
            (
                Value::Error { name: a, info: ia },
                Value::Error { name: b, info: ib },
            ) => {
                a == b
                    && match (ia, ib) {
                        (Some(x), Some(y)) => x.eq_inner(y, seen),
                        (None, None) => true,
                        _ => false,
                    }
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

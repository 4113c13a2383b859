//! Assignable locations.
//!
//! The target expression of an assignment is evaluated once into a
//! [`Reference`]; compound assignment then reads and writes through it
//! without re-evaluating anything.

use std::rc::Rc;

use crate::error::ErrorKind;
use crate::scope::Scope;
use crate::value::{ArrRef, ObjRef, Value};
use crate::Result;

pub enum Reference {
    Variable { name: String, scope: Rc<Scope> },
    Index { target: ArrRef, index: f64 },
    Prop { target: ObjRef, key: String },
    /// `[a, b] = value`
    Arr(Vec<Reference>),
    /// `{ k: a } = value`
    Obj(Vec<(String, Reference)>),
}

/// Position `index` in a sequence of `len` items, if it is a whole number
/// inside the bounds.
pub(crate) fn slot(index: f64, len: usize) -> Option<usize> {
    if index.fract() == 0.0 && index >= 0.0 && index < len as f64 {
        Some(index as usize)
    } else {
        None
    }
}

pub(crate) fn out_of_range(index: f64, len: usize) -> ErrorKind {
    ErrorKind::IndexOutOfRange {
        index,
        max: len as i64 - 1,
    }
}

impl Reference {
    pub fn get(&self) -> Result<Value> {
        match self {
            Reference::Variable { name, scope } => scope.get(name),
            Reference::Index { target, index } => {
                let items = target.borrow();
                slot(*index, items.len())
                    .map(|i| items[i].clone())
                    .ok_or_else(|| out_of_range(*index, items.len()).into())
            }
            Reference::Prop { target, key } => Ok(target.borrow().get(key).cloned().unwrap_or_default()),
            Reference::Arr(items) => Ok(Value::arr(
                items.iter().map(Reference::get).collect::<Result<Vec<_>>>()?,
            )),
            Reference::Obj(entries) => {
                let mut pairs = Vec::with_capacity(entries.len());
                for (key, item) in entries {
                    pairs.push((key.clone(), item.get()?));
                }
                Ok(Value::obj(pairs))
            }
        }
    }

    pub fn set(&self, value: Value) -> Result<()> {
        match self {
            Reference::Variable { name, scope } => scope.assign(name, value),
            Reference::Index { target, index } => {
                let mut items = target.borrow_mut();
                let len = items.len();
                let i = slot(*index, len).ok_or_else(|| out_of_range(*index, len))?;
                items[i] = value;
                Ok(())
            }
            Reference::Prop { target, key } => {
                target.borrow_mut().insert(key.clone(), value);
                Ok(())
            }
            Reference::Arr(items) => {
                let source = value.as_arr()?.borrow().clone();
                for (i, item) in items.iter().enumerate() {
                    item.set(source.get(i).cloned().unwrap_or_default())?;
                }
                Ok(())
            }
            Reference::Obj(entries) => {
                let source = value.as_obj()?.borrow().clone();
                for (key, item) in entries {
                    item.set(source.get(key).cloned().unwrap_or_default())?;
                }
                Ok(())
            }
        }
    }
}

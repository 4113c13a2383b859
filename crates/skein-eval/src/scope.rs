//! Lexical scopes.
//!
//! A scope is an ordered list of layers, innermost first. A child scope shares
//! its parent's layers by reference and pushes one fresh layer in front, so a
//! closure sees later assignments made through the scope it captured.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::ErrorKind;
use crate::value::{Attr, Value};
use crate::Result;

/// A named binding.
#[derive(Debug, Clone)]
pub struct Variable {
    pub is_mutable: bool,
    pub value: Value,
    pub attrs: Vec<Attr>,
}

impl Variable {
    pub fn new(is_mutable: bool, value: Value) -> Self {
        Self {
            is_mutable,
            value,
            attrs: Vec::new(),
        }
    }

    pub fn constant(value: Value) -> Self {
        Self::new(false, value)
    }

    pub fn mutable(value: Value) -> Self {
        Self::new(true, value)
    }
}

/// Payload of a diagnostic log event.
#[derive(Debug, Clone, Default)]
pub struct LogEvent {
    pub scope: Option<String>,
    pub var: Option<String>,
    pub val: Option<Value>,
}

/// Host callback receiving `(event, payload)` diagnostics.
pub type LogSink = Rc<dyn Fn(&str, &LogEvent)>;

type Layer = Rc<RefCell<HashMap<String, Variable>>>;

pub struct Scope {
    layers: Vec<Layer>,
    parent: Option<Rc<Scope>>,
    name: String,
    ns_name: Option<String>,
    log: Option<LogSink>,
}

impl Scope {
    /// Create the root scope, named `<root>`.
    pub fn root(bindings: HashMap<String, Variable>, log: Option<LogSink>) -> Rc<Scope> {
        Rc::new(Scope {
            layers: vec![Rc::new(RefCell::new(bindings))],
            parent: None,
            name: "<root>".to_string(),
            ns_name: None,
            log,
        })
    }

    fn derive(self: &Rc<Self>, bindings: HashMap<String, Variable>, ns_name: Option<String>) -> Rc<Scope> {
        let mut layers = Vec::with_capacity(self.layers.len() + 1);
        layers.push(Rc::new(RefCell::new(bindings)));
        layers.extend(self.layers.iter().cloned());
        Rc::new(Scope {
            layers,
            parent: Some(self.clone()),
            name: "<anonymous>".to_string(),
            ns_name,
            log: self.log.clone(),
        })
    }

    pub fn create_child_scope(self: &Rc<Self>, bindings: HashMap<String, Variable>) -> Rc<Scope> {
        self.derive(bindings, None)
    }

    /// Child scope for the members of namespace `name`. Every definition made
    /// in it is also registered, qualified, in the enclosing scope.
    pub fn create_child_namespace_scope(self: &Rc<Self>, name: &str) -> Rc<Scope> {
        self.derive(HashMap::new(), Some(name.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Qualification prefix of this scope: `""` outside namespaces, `A:B:`
    /// inside `A` nested in `B`'s parent chain.
    pub fn ns_prefix(&self) -> String {
        match (&self.parent, &self.ns_name) {
            (Some(parent), Some(ns)) => format!("{}{}:", parent.ns_prefix(), ns),
            _ => String::new(),
        }
    }

    fn find<T>(&self, name: &str, f: impl Fn(&Variable) -> T) -> Option<T> {
        self.layers
            .iter()
            .find_map(|layer| layer.borrow().get(name).map(&f))
    }

    /// Look a name up through every layer, then retry it qualified with this
    /// scope's namespace prefix.
    pub fn get(&self, name: &str) -> Result<Value> {
        let found = self.find(name, |var| var.value.clone()).or_else(|| {
            let prefix = self.ns_prefix();
            if prefix.is_empty() {
                None
            } else {
                self.find(&format!("{}{}", prefix, name), |var| var.value.clone())
            }
        });
        match found {
            Some(value) => {
                self.log("var:read", name, Some(&value));
                Ok(value)
            }
            None => Err(ErrorKind::UnknownIdentifier {
                name: name.to_string(),
                scope: self.name.clone(),
            }
            .into()),
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.find(name, |_| ()).is_some()
    }

    /// Attributes recorded on the binding `name`.
    pub fn attrs(&self, name: &str) -> Option<Vec<Attr>> {
        self.find(name, |var| var.attrs.clone())
    }

    /// Define `name` in the innermost layer.
    pub fn add(&self, name: &str, var: Variable) -> Result<()> {
        self.log("var:add", name, Some(&var.value));
        {
            let mut layer = self.layers[0].borrow_mut();
            if layer.contains_key(name) {
                return Err(ErrorKind::AlreadyDefined {
                    name: name.to_string(),
                    scope: self.name.clone(),
                }
                .into());
            }
            layer.insert(name.to_string(), var.clone());
        }
        if let (Some(parent), Some(ns)) = (&self.parent, &self.ns_name) {
            parent.add(&format!("{}:{}", ns, name), var)?;
        }
        Ok(())
    }

    pub(crate) fn set_attrs(&self, name: &str, attrs: Vec<Attr>) {
        if let Some(var) = self.layers[0].borrow_mut().get_mut(name) {
            var.attrs = attrs;
        }
    }

    /// Overwrite the nearest binding of `name`.
    pub fn assign(&self, name: &str, value: Value) -> Result<()> {
        self.log("var:write", name, Some(&value));
        for layer in &self.layers {
            if let Some(var) = layer.borrow_mut().get_mut(name) {
                if !var.is_mutable {
                    return Err(ErrorKind::AssignToImmutable(name.to_string()).into());
                }
                var.value = value;
                return Ok(());
            }
        }
        Err(ErrorKind::UnknownIdentifier {
            name: name.to_string(),
            scope: self.name.clone(),
        }
        .into())
    }

    /// Snapshot of every visible binding, innermost shadowing outer ones.
    pub fn get_all(&self) -> HashMap<String, Value> {
        let mut all = HashMap::new();
        for layer in self.layers.iter().rev() {
            for (name, var) in layer.borrow().iter() {
                all.insert(name.clone(), var.value.clone());
            }
        }
        all
    }

    fn log(&self, event: &str, var: &str, val: Option<&Value>) {
        tracing::trace!(scope = %self.name, var, "{}", event);
        if let Some(log) = &self.log {
            log(
                event,
                &LogEvent {
                    scope: Some(self.name.clone()),
                    var: Some(var.to_string()),
                    val: val.cloned(),
                },
            );
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.name)
            .field("ns_name", &self.ns_name)
            .field("depth", &self.layers.len())
            .finish()
    }
}

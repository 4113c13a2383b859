//! Evaluation rules for individual node kinds.
//!
//! Each rule is an async method on [`Engine`]; sub-expressions are always
//! evaluated through [`Engine::eval`] so that stepping, pausing and error
//! locations apply uniformly.

use std::collections::HashMap;
use std::rc::Rc;

use skein_ast::{Attribute, ElseIf, FnDef, ForSpec, MatchCase, Node, NodeKind, TmplPart};

use crate::control::{loop_step, unwrap_labeled_break, Flow, Interrupt, LoopStep};
use crate::engine::{Cx, Engine};
use crate::error::ErrorKind;
use crate::native::BoxFuture;
use crate::prim;
use crate::reference::{out_of_range, slot, Reference};
use crate::scope::{Scope, Variable};
use crate::value::{Attr, Function, Value};
use crate::Result;

/// Bind `value` to a definition target: a name, or an array/object pattern
/// whose missing parts bind `null`.
pub(crate) fn define(scope: &Rc<Scope>, dest: &Node, value: Value, is_mutable: bool) -> Result<()> {
    match &dest.kind {
        NodeKind::Identifier { name } => scope.add(name, Variable::new(is_mutable, value)),
        NodeKind::Arr { value: items } => {
            let source = value.as_arr()?.borrow().clone();
            for (i, item) in items.iter().enumerate() {
                define(scope, item, source.get(i).cloned().unwrap_or_default(), is_mutable)?;
            }
            Ok(())
        }
        NodeKind::Obj { value: entries } => {
            let source = value.as_obj()?.borrow().clone();
            for (key, item) in entries {
                define(scope, item, source.get(key).cloned().unwrap_or_default(), is_mutable)?;
            }
            Ok(())
        }
        _ => Err(ErrorKind::InvalidTarget(
            "The left-hand side of an definition expression must be a variable.",
        )
        .into()),
    }
}

/// Record evaluated attributes on the value and on the binding they decorate.
/// Scalars cannot hold attributes, so for them only the binding keeps them.
pub(crate) fn attach_attrs(scope: &Scope, dest: &Node, value: &Value, attrs: Vec<Attr>) {
    if attrs.is_empty() {
        return;
    }
    value.set_attrs(attrs.clone());
    if let NodeKind::Identifier { name } = &dest.kind {
        scope.set_attrs(name, attrs);
    }
}

/// A function literal bound directly to a name takes that name, qualified
/// with the namespace prefix of the defining scope.
pub(crate) fn name_function(scope: &Scope, dest: &Node, expr: &Node, value: &Value) {
    if let (NodeKind::Fn(_), NodeKind::Identifier { name }, Value::Fn(f)) = (&expr.kind, &dest.kind, value) {
        f.set_name(format!("{}{}", scope.ns_prefix(), name));
    }
}

impl Engine {
    pub(crate) async fn eval_attrs(
        self: &Rc<Self>,
        attrs: &[Attribute],
        scope: &Rc<Scope>,
        cx: Cx<'_>,
    ) -> std::result::Result<Vec<Attr>, Interrupt> {
        let mut out = Vec::with_capacity(attrs.len());
        for attr in attrs {
            let value = self.eval(&attr.value, scope, cx).await?;
            out.push(Attr {
                name: attr.name.clone(),
                value,
            });
        }
        Ok(out)
    }

    pub(crate) async fn eval_call(
        self: &Rc<Self>,
        node: &Node,
        target: &Node,
        args: &[Node],
        scope: &Rc<Scope>,
        cx: Cx<'_>,
    ) -> Flow {
        let callee = self.eval(target, scope, cx).await?;
        let f = callee.as_fn()?;
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, scope, cx).await?);
        }
        Ok(self.call_fn(f, values, cx, Some(node.loc.start)).await?)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn eval_if(
        self: &Rc<Self>,
        label: Option<&str>,
        cond: &Node,
        then: &Node,
        elseif: &[ElseIf],
        otherwise: Option<&Node>,
        scope: &Rc<Scope>,
        cx: Cx<'_>,
    ) -> Flow {
        if self.eval(cond, scope, cx).await?.as_bool()? {
            return unwrap_labeled_break(self.eval_clause(then, scope, cx).await, label);
        }
        for branch in elseif {
            if self.eval(&branch.cond, scope, cx).await?.as_bool()? {
                return unwrap_labeled_break(self.eval_clause(&branch.then, scope, cx).await, label);
            }
        }
        match otherwise {
            Some(otherwise) => unwrap_labeled_break(self.eval_clause(otherwise, scope, cx).await, label),
            None => Ok(Value::Null),
        }
    }

    pub(crate) async fn eval_match(
        self: &Rc<Self>,
        label: Option<&str>,
        about: &Node,
        qs: &[MatchCase],
        default: Option<&Node>,
        scope: &Rc<Scope>,
        cx: Cx<'_>,
    ) -> Flow {
        let about = self.eval(about, scope, cx).await?;
        for case in qs {
            let q = self.eval(&case.q, scope, cx).await?;
            if about == q {
                return unwrap_labeled_break(self.eval_clause(&case.a, scope, cx).await, label);
            }
        }
        match default {
            Some(default) => unwrap_labeled_break(self.eval_clause(default, scope, cx).await, label),
            None => Ok(Value::Null),
        }
    }

    pub(crate) async fn eval_loop(
        self: &Rc<Self>,
        label: Option<&str>,
        statements: &[Node],
        scope: &Rc<Scope>,
        cx: Cx<'_>,
    ) -> Flow {
        loop {
            if self.lifecycle.is_stopped() {
                return Ok(Value::Null);
            }
            let body_scope = scope.create_child_scope(HashMap::new());
            match loop_step(self.run(statements, &body_scope, cx).await, label) {
                LoopStep::Next => {}
                LoopStep::Exit => return Ok(Value::Null),
                LoopStep::Propagate(interrupt) => return Err(interrupt),
            }
        }
    }

    pub(crate) async fn eval_for(
        self: &Rc<Self>,
        label: Option<&str>,
        spec: &ForSpec,
        body: &Node,
        scope: &Rc<Scope>,
        cx: Cx<'_>,
    ) -> Flow {
        match spec {
            ForSpec::Times { times } => {
                let times = self.eval(times, scope, cx).await?.as_num()?;
                let mut i = 0.0;
                while i < times && !self.lifecycle.is_stopped() {
                    match loop_step(self.eval_clause(body, scope, cx).await, label) {
                        LoopStep::Next => {}
                        LoopStep::Exit => break,
                        LoopStep::Propagate(interrupt) => return Err(interrupt),
                    }
                    i += 1.0;
                }
            }
            ForSpec::Range { var, from, to } => {
                let from = match from {
                    Some(from) => self.eval(from, scope, cx).await?,
                    None => Value::Num(0.0),
                };
                let count = self.eval(to, scope, cx).await?;
                let start = from.as_num()?;
                let end = start + count.as_num()?;
                let mut i = start;
                while i < end && !self.lifecycle.is_stopped() {
                    let bindings = HashMap::from([(var.clone(), Variable::constant(Value::Num(i)))]);
                    let iter_scope = scope.create_child_scope(bindings);
                    match loop_step(self.eval_clause(body, &iter_scope, cx).await, label) {
                        LoopStep::Next => {}
                        LoopStep::Exit => break,
                        LoopStep::Propagate(interrupt) => return Err(interrupt),
                    }
                    i += 1.0;
                }
            }
        }
        Ok(Value::Null)
    }

    /// Elements pushed onto the array during iteration are visited too.
    pub(crate) async fn eval_each(
        self: &Rc<Self>,
        label: Option<&str>,
        var: &Node,
        items: &Node,
        body: &Node,
        scope: &Rc<Scope>,
        cx: Cx<'_>,
    ) -> Flow {
        let items = self.eval(items, scope, cx).await?;
        let items = items.as_arr()?.clone();
        let mut i = 0;
        while !self.lifecycle.is_stopped() {
            let Some(item) = items.borrow().get(i).cloned() else {
                break;
            };
            let each_scope = scope.create_child_scope(HashMap::new());
            define(&each_scope, var, item, false)?;
            match loop_step(self.eval(body, &each_scope, cx).await, label) {
                LoopStep::Next => {}
                LoopStep::Exit => break,
                LoopStep::Propagate(interrupt) => return Err(interrupt),
            }
            i += 1;
        }
        Ok(Value::Null)
    }

    pub(crate) async fn eval_def(
        self: &Rc<Self>,
        dest: &Node,
        expr: &Node,
        is_mutable: bool,
        attr: &[Attribute],
        scope: &Rc<Scope>,
        cx: Cx<'_>,
    ) -> Flow {
        let value = self.eval(expr, scope, cx).await?;
        let attrs = self.eval_attrs(attr, scope, cx).await?;
        name_function(scope, dest, expr, &value);
        define(scope, dest, value.clone(), is_mutable)?;
        attach_attrs(scope, dest, &value, attrs);
        Ok(Value::Null)
    }

    pub(crate) async fn eval_assign(self: &Rc<Self>, dest: &Node, expr: &Node, scope: &Rc<Scope>, cx: Cx<'_>) -> Flow {
        let target = self.get_reference(dest, scope, cx).await?;
        let value = self.eval(expr, scope, cx).await?;
        target.set(value)?;
        Ok(Value::Null)
    }

    /// `+=` (sign 1) and `-=` (sign -1). The target is evaluated only once.
    pub(crate) async fn eval_compound_assign(
        self: &Rc<Self>,
        dest: &Node,
        expr: &Node,
        sign: f64,
        scope: &Rc<Scope>,
        cx: Cx<'_>,
    ) -> Flow {
        let target = self.get_reference(dest, scope, cx).await?;
        let delta = self.eval(expr, scope, cx).await?.as_num()?;
        let current = target.get()?.as_num()?;
        target.set(Value::Num(current + sign * delta))?;
        Ok(Value::Null)
    }

    /// Resolve an assignment target, evaluating its sub-expressions once.
    pub(crate) fn get_reference<'a>(
        self: &'a Rc<Self>,
        dest: &'a Node,
        scope: &'a Rc<Scope>,
        cx: Cx<'a>,
    ) -> BoxFuture<'a, std::result::Result<Reference, Interrupt>> {
        Box::pin(async move {
            match &dest.kind {
                NodeKind::Identifier { name } => Ok(Reference::Variable {
                    name: name.clone(),
                    scope: scope.clone(),
                }),
                NodeKind::Index { target, index } => {
                    let target = self.eval(target, scope, cx).await?;
                    let index = self.eval(index, scope, cx).await?;
                    match (&target, &index) {
                        (Value::Arr(items), Value::Num(i)) => Ok(Reference::Index {
                            target: items.clone(),
                            index: *i,
                        }),
                        (Value::Obj(map), Value::Str(key)) => Ok(Reference::Prop {
                            target: map.clone(),
                            key: key.clone(),
                        }),
                        (target, index) => Err(ErrorKind::CannotReadProp {
                            prop: index.repr_literal(),
                            target: target.type_name(),
                        }
                        .into()),
                    }
                }
                NodeKind::Prop { target, name } => {
                    let target = self.eval(target, scope, cx).await?;
                    Ok(Reference::Prop {
                        target: target.as_obj()?.clone(),
                        key: name.clone(),
                    })
                }
                NodeKind::Arr { value } => {
                    let mut items = Vec::with_capacity(value.len());
                    for item in value {
                        items.push(self.get_reference(item, scope, cx).await?);
                    }
                    Ok(Reference::Arr(items))
                }
                NodeKind::Obj { value } => {
                    let mut entries = Vec::with_capacity(value.len());
                    for (key, item) in value {
                        entries.push((key.clone(), self.get_reference(item, scope, cx).await?));
                    }
                    Ok(Reference::Obj(entries))
                }
                _ => Err(ErrorKind::InvalidTarget("The left-hand side of an assignment must be a variable.").into()),
            }
        })
    }

    pub(crate) async fn eval_arr(self: &Rc<Self>, items: &[Node], scope: &Rc<Scope>, cx: Cx<'_>) -> Flow {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            values.push(self.eval(item, scope, cx).await?);
        }
        Ok(Value::arr(values))
    }

    pub(crate) async fn eval_obj(self: &Rc<Self>, entries: &[(String, Node)], scope: &Rc<Scope>, cx: Cx<'_>) -> Flow {
        let mut pairs = Vec::with_capacity(entries.len());
        for (key, item) in entries {
            pairs.push((key.clone(), self.eval(item, scope, cx).await?));
        }
        Ok(Value::obj(pairs))
    }

    pub(crate) async fn eval_tmpl(self: &Rc<Self>, parts: &[TmplPart], scope: &Rc<Scope>, cx: Cx<'_>) -> Flow {
        let mut out = String::new();
        for part in parts {
            match part {
                TmplPart::Text(text) => out.push_str(text),
                TmplPart::Expr(expr) => out.push_str(&self.eval(expr, scope, cx).await?.repr()),
            }
        }
        Ok(Value::Str(out))
    }

    pub(crate) async fn eval_prop(self: &Rc<Self>, target: &Node, name: &str, scope: &Rc<Scope>, cx: Cx<'_>) -> Flow {
        let target = self.eval(target, scope, cx).await?;
        match &target {
            Value::Obj(map) => {
                let value = map.borrow().get(name).cloned();
                Ok(value.unwrap_or_default())
            }
            other => Ok(prim::get_prop(other, name)?),
        }
    }

    pub(crate) async fn eval_index(self: &Rc<Self>, target: &Node, index: &Node, scope: &Rc<Scope>, cx: Cx<'_>) -> Flow {
        let target = self.eval(target, scope, cx).await?;
        let index = self.eval(index, scope, cx).await?;
        match &target {
            Value::Arr(items) => {
                let i = index.as_num()?;
                let items = items.borrow();
                match slot(i, items.len()) {
                    Some(k) => Ok(items[k].clone()),
                    None => Err(out_of_range(i, items.len()).into()),
                }
            }
            Value::Obj(map) => {
                let value = map.borrow().get(index.as_str()?).cloned();
                Ok(value.unwrap_or_default())
            }
            Value::Str(s) => Ok(prim::index_str(s, index.as_num()?)?),
            other => Err(ErrorKind::CannotReadProp {
                prop: index.repr_literal(),
                target: other.type_name(),
            }
            .into()),
        }
    }

    pub(crate) async fn eval_fn(self: &Rc<Self>, def: &Rc<FnDef>, scope: &Rc<Scope>, cx: Cx<'_>) -> Flow {
        let mut defaults = Vec::with_capacity(def.params.len());
        for param in &def.params {
            let default = match &param.default {
                Some(expr) => Some(self.eval(expr, scope, cx).await?),
                None if param.optional => Some(Value::Null),
                None => None,
            };
            defaults.push(default);
        }
        Ok(Value::Fn(Rc::new(Function::user(def.clone(), defaults, scope.clone()))))
    }

    pub(crate) async fn eval_block(
        self: &Rc<Self>,
        label: Option<&str>,
        statements: &[Node],
        scope: &Rc<Scope>,
        cx: Cx<'_>,
    ) -> Flow {
        let block_scope = scope.create_child_scope(HashMap::new());
        unwrap_labeled_break(self.run(statements, &block_scope, cx).await, label)
    }

    /// `&&`: the right side is evaluated only when the left is `true`.
    pub(crate) async fn eval_and(self: &Rc<Self>, left: &Node, right: &Node, scope: &Rc<Scope>, cx: Cx<'_>) -> Flow {
        if !self.eval(left, scope, cx).await?.as_bool()? {
            return Ok(Value::Bool(false));
        }
        let right = self.eval(right, scope, cx).await?;
        Ok(Value::Bool(right.as_bool()?))
    }

    /// `||`: the right side is evaluated only when the left is `false`.
    pub(crate) async fn eval_or(self: &Rc<Self>, left: &Node, right: &Node, scope: &Rc<Scope>, cx: Cx<'_>) -> Flow {
        if self.eval(left, scope, cx).await?.as_bool()? {
            return Ok(Value::Bool(true));
        }
        let right = self.eval(right, scope, cx).await?;
        Ok(Value::Bool(right.as_bool()?))
    }
}

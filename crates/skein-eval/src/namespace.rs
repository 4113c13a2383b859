//! Namespace collection.
//!
//! Before the main run, every top-level `:: Name { ... }` declaration is
//! evaluated into its own scope, so namespace members are visible to the
//! whole script under their qualified names (`Name:member`). Nested
//! namespaces are collected before the definitions of the namespace that
//! contains them.

use std::rc::Rc;

use skein_ast::{Node, NodeKind};

use crate::control::{expect_value, Interrupt};
use crate::engine::{Cx, Engine, Mode};
use crate::error::Error;
use crate::eval::{attach_attrs, define, name_function};
use crate::native::BoxFuture;
use crate::scope::Scope;
use crate::Result;

impl Engine {
    pub(crate) fn collect_ns<'a>(
        self: &'a Rc<Self>,
        script: &'a [Node],
        scope: &'a Rc<Scope>,
        mode: Mode,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            for node in script {
                if let NodeKind::Ns { name, members } = &node.kind {
                    self.collect_ns_member(name, members, scope, mode).await?;
                }
            }
            Ok(())
        })
    }

    async fn collect_ns_member(
        self: &Rc<Self>,
        name: &str,
        members: &[Node],
        scope: &Rc<Scope>,
        mode: Mode,
    ) -> Result<()> {
        let ns_scope = scope.create_child_namespace_scope(name);
        self.collect_ns(members, &ns_scope, mode).await?;
        let cx = Cx::top(mode);

        for node in members {
            let pos = node.loc.start;
            match &node.kind {
                NodeKind::Def {
                    dest,
                    expr,
                    mutable,
                    attr,
                } => {
                    let NodeKind::Identifier { name: member } = &dest.kind else {
                        return Err(
                            Error::namespace("Destructuring assignment is invalid in namespace declarations.").at(pos),
                        );
                    };
                    if *mutable {
                        return Err(Error::namespace(format!("No \"var\" in namespace declaration: {}", member)).at(pos));
                    }
                    let value = expect_value(self.eval(expr, &ns_scope, cx).await)?;
                    let attrs = expect_attrs(self.eval_attrs(attr, scope, cx).await)?;
                    name_function(&ns_scope, dest, expr, &value);
                    define(&ns_scope, dest, value.clone(), false).map_err(|e| e.at(pos))?;
                    attach_attrs(&ns_scope, dest, &value, attrs);
                }
                NodeKind::Ns { .. } => {}
                other => {
                    return Err(Error::namespace(format!("invalid ns member type: {}", other.name())).at(pos));
                }
            }
        }
        Ok(())
    }
}

fn expect_attrs<T>(result: std::result::Result<T, Interrupt>) -> Result<T> {
    result.map_err(|interrupt| match interrupt {
        Interrupt::Error(e) => e,
        Interrupt::Control(control) => Error::internal(format!(
            "Unexpected {} in attribute",
            control.kind()
        )),
    })
}

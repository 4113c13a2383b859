//! Tree builders and runners shared by the integration tests
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use skein_ast::{Attribute, ElseIf, FnDef, ForSpec, MatchCase, Node, NodeKind, Param, TmplPart};
use skein_eval::{Interpreter, InterpreterOptions, Value};

fn node(kind: NodeKind) -> Node {
    Node::new(kind)
}

/// Move a node to `line:column`.
pub fn at(mut n: Node, line: u32, column: u32) -> Node {
    n.loc = Node::at(NodeKind::Null, line, column).loc;
    n
}

pub fn num(value: f64) -> Node {
    node(NodeKind::Num { value })
}

pub fn text(value: &str) -> Node {
    node(NodeKind::Str { value: value.into() })
}

pub fn boolean(value: bool) -> Node {
    node(NodeKind::Bool { value })
}

pub fn null() -> Node {
    node(NodeKind::Null)
}

pub fn ident(name: &str) -> Node {
    node(NodeKind::Identifier { name: name.into() })
}

pub fn arr(items: Vec<Node>) -> Node {
    node(NodeKind::Arr { value: items })
}

pub fn obj(entries: Vec<(&str, Node)>) -> Node {
    node(NodeKind::Obj {
        value: entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
    })
}

pub fn tmpl(parts: Vec<TmplPart>) -> Node {
    node(NodeKind::Tmpl { tmpl: parts })
}

fn def(dest: Node, expr: Node, mutable: bool, attr: Vec<Attribute>) -> Node {
    node(NodeKind::Def {
        dest: Box::new(dest),
        expr: Box::new(expr),
        mutable,
        attr,
    })
}

/// `let name = expr`
pub fn let_(name: &str, expr: Node) -> Node {
    def(ident(name), expr, false, vec![])
}

/// `var name = expr`
pub fn var(name: &str, expr: Node) -> Node {
    def(ident(name), expr, true, vec![])
}

/// `let <pattern> = expr`
pub fn let_pattern(dest: Node, expr: Node) -> Node {
    def(dest, expr, false, vec![])
}

/// `#[name value] let dest = expr`
pub fn let_with_attr(name: &str, expr: Node, attr: (&str, Node)) -> Node {
    def(
        ident(name),
        expr,
        false,
        vec![Attribute {
            name: attr.0.into(),
            value: attr.1,
        }],
    )
}

pub fn assign(dest: Node, expr: Node) -> Node {
    node(NodeKind::Assign {
        dest: Box::new(dest),
        expr: Box::new(expr),
    })
}

pub fn add_assign(dest: Node, expr: Node) -> Node {
    node(NodeKind::AddAssign {
        dest: Box::new(dest),
        expr: Box::new(expr),
    })
}

pub fn sub_assign(dest: Node, expr: Node) -> Node {
    node(NodeKind::SubAssign {
        dest: Box::new(dest),
        expr: Box::new(expr),
    })
}

pub fn call(target: Node, args: Vec<Node>) -> Node {
    node(NodeKind::Call {
        target: Box::new(target),
        args,
    })
}

/// Call a function by name.
pub fn call_named(name: &str, args: Vec<Node>) -> Node {
    call(ident(name), args)
}

pub fn index(target: Node, idx: Node) -> Node {
    node(NodeKind::Index {
        target: Box::new(target),
        index: Box::new(idx),
    })
}

pub fn prop(target: Node, name: &str) -> Node {
    node(NodeKind::Prop {
        target: Box::new(target),
        name: name.into(),
    })
}

macro_rules! binary {
    ($($name:ident => $kind:ident),* $(,)?) => {
        $(
            pub fn $name(left: Node, right: Node) -> Node {
                node(NodeKind::$kind {
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
        )*
    };
}

binary! {
    add => Add,
    sub => Sub,
    mul => Mul,
    div => Div,
    rem => Rem,
    eq => Eq,
    neq => Neq,
    lt => Lt,
    gt => Gt,
    and => And,
    or => Or,
}

pub fn not(expr: Node) -> Node {
    node(NodeKind::Not { expr: Box::new(expr) })
}

/// `@(params) { body }` with plain identifier parameters.
pub fn func(params: &[&str], body: Vec<Node>) -> Node {
    func_with(
        params
            .iter()
            .map(|p| Param {
                dest: ident(p),
                optional: false,
                default: None,
            })
            .collect(),
        body,
    )
}

pub fn func_with(params: Vec<Param>, children: Vec<Node>) -> Node {
    node(NodeKind::Fn(Rc::new(FnDef { params, children })))
}

pub fn ret(expr: Node) -> Node {
    node(NodeKind::Return { expr: Box::new(expr) })
}

pub fn brk(label: Option<&str>, expr: Option<Node>) -> Node {
    node(NodeKind::Break {
        label: label.map(String::from),
        expr: expr.map(Box::new),
    })
}

pub fn cont(label: Option<&str>) -> Node {
    node(NodeKind::Continue {
        label: label.map(String::from),
    })
}

pub fn block(label: Option<&str>, statements: Vec<Node>) -> Node {
    node(NodeKind::Block {
        label: label.map(String::from),
        statements,
    })
}

pub fn if_(cond: Node, then: Vec<Node>, otherwise: Option<Vec<Node>>) -> Node {
    node(NodeKind::If {
        label: None,
        cond: Box::new(cond),
        then: Box::new(block(None, then)),
        elseif: vec![],
        otherwise: otherwise.map(|stmts| Box::new(block(None, stmts))),
    })
}

pub fn if_chain(cond: Node, then: Node, elseif: Vec<(Node, Node)>, otherwise: Option<Node>) -> Node {
    node(NodeKind::If {
        label: None,
        cond: Box::new(cond),
        then: Box::new(then),
        elseif: elseif.into_iter().map(|(cond, then)| ElseIf { cond, then }).collect(),
        otherwise: otherwise.map(Box::new),
    })
}

pub fn match_(about: Node, cases: Vec<(Node, Node)>, default: Option<Node>) -> Node {
    node(NodeKind::Match {
        label: None,
        about: Box::new(about),
        qs: cases.into_iter().map(|(q, a)| MatchCase { q, a }).collect(),
        default: default.map(Box::new),
    })
}

pub fn loop_(label: Option<&str>, statements: Vec<Node>) -> Node {
    node(NodeKind::Loop {
        label: label.map(String::from),
        statements,
    })
}

/// `for times body`
pub fn for_times(times: Node, body: Node) -> Node {
    node(NodeKind::For {
        label: None,
        spec: ForSpec::Times { times: Box::new(times) },
        body: Box::new(body),
    })
}

/// `for (let var = from, count) body`
pub fn for_range(label: Option<&str>, var: &str, from: Option<Node>, count: Node, body: Node) -> Node {
    node(NodeKind::For {
        label: label.map(String::from),
        spec: ForSpec::Range {
            var: var.into(),
            from: from.map(Box::new),
            to: Box::new(count),
        },
        body: Box::new(body),
    })
}

pub fn each(var: &str, items: Node, body: Node) -> Node {
    node(NodeKind::Each {
        label: None,
        var: Box::new(ident(var)),
        items: Box::new(items),
        body: Box::new(body),
    })
}

pub fn ns(name: &str, members: Vec<Node>) -> Node {
    node(NodeKind::Ns {
        name: name.into(),
        members,
    })
}

pub fn exists(name: &str) -> Node {
    node(NodeKind::Exists {
        identifier: name.into(),
    })
}

pub fn meta(name: Option<&str>, value: Node) -> Node {
    node(NodeKind::Meta {
        name: name.map(String::from),
        value: Box::new(value),
    })
}

pub fn interpreter(opts: InterpreterOptions) -> Interpreter {
    Interpreter::new(HashMap::new(), opts).unwrap()
}

/// Options whose `print` output is collected into the returned buffer.
pub fn capture_output(opts: InterpreterOptions) -> (InterpreterOptions, Rc<RefCell<Vec<Value>>>) {
    let printed = Rc::new(RefCell::new(Vec::new()));
    let sink = printed.clone();
    (opts.output(move |v| sink.borrow_mut().push(v)), printed)
}

/// Run a script asynchronously with default options.
pub async fn run(script: &[Node]) -> Value {
    interpreter(InterpreterOptions::default())
        .exec(script)
        .await
        .unwrap()
        .unwrap()
}

/// Run a script synchronously with default options.
pub fn run_sync(script: &[Node]) -> Value {
    interpreter(InterpreterOptions::default())
        .exec_sync(script)
        .unwrap()
        .unwrap()
}

/// Run a script in both modes and check they agree.
pub async fn run_both(script: &[Node]) -> Value {
    let async_result = run(script).await;
    let sync_result = run_sync(script);
    assert_eq!(async_result, sync_result, "async and sync execution disagree");
    async_result
}

pub fn nums(values: &[f64]) -> Value {
    Value::arr(values.iter().map(|n| Value::Num(*n)).collect())
}

/// Abstract Syntax Tree types for skein
///
/// These types represent an already-parsed script. The interpreter never sees
/// source text: a parser (or a JSON file produced by one) hands it a tree of
/// `Node`s. Every node carries its source location for diagnostics.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// A position in the source text (1-based line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

impl Pos {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Source span of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Loc {
    pub start: Pos,
    pub end: Pos,
}

/// A single node of the tree: its kind plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default)]
    pub loc: Loc,
}

impl Node {
    /// Create a node with an empty location.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            loc: Loc::default(),
        }
    }

    /// Create a node starting at `line:column`.
    pub fn at(kind: NodeKind, line: u32, column: u32) -> Self {
        let pos = Pos::new(line, column);
        Self {
            kind,
            loc: Loc { start: pos, end: pos },
        }
    }

    pub fn is_statement(&self) -> bool {
        self.kind.is_statement()
    }
}

/// Every kind of node the interpreter knows about.
///
/// The set is closed: the dispatcher matches on it exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeKind {
    /// Namespace declaration: `:: Name { ... }`
    Ns { name: String, members: Vec<Node> },
    /// Metadata block: `### name { ... }`
    Meta {
        name: Option<String>,
        value: Box<Node>,
    },

    // Statements
    /// Definition: `let x = expr` / `var x = expr`, optionally destructuring
    Def {
        dest: Box<Node>,
        expr: Box<Node>,
        #[serde(rename = "mut")]
        mutable: bool,
        #[serde(default)]
        attr: Vec<Attribute>,
    },
    Return { expr: Box<Node> },
    /// `each let x, items body`
    Each {
        #[serde(default)]
        label: Option<String>,
        var: Box<Node>,
        items: Box<Node>,
        #[serde(rename = "for")]
        body: Box<Node>,
    },
    /// `for (let i = from, count) body` / `for count body`
    For {
        #[serde(default)]
        label: Option<String>,
        spec: ForSpec,
        #[serde(rename = "for")]
        body: Box<Node>,
    },
    Loop {
        #[serde(default)]
        label: Option<String>,
        statements: Vec<Node>,
    },
    Break {
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        expr: Option<Box<Node>>,
    },
    Continue {
        #[serde(default)]
        label: Option<String>,
    },
    Assign { dest: Box<Node>, expr: Box<Node> },
    AddAssign { dest: Box<Node>, expr: Box<Node> },
    SubAssign { dest: Box<Node>, expr: Box<Node> },

    // Expressions
    If {
        #[serde(default)]
        label: Option<String>,
        cond: Box<Node>,
        then: Box<Node>,
        #[serde(default)]
        elseif: Vec<ElseIf>,
        #[serde(rename = "else", default)]
        otherwise: Option<Box<Node>>,
    },
    Fn(Rc<FnDef>),
    Match {
        #[serde(default)]
        label: Option<String>,
        about: Box<Node>,
        qs: Vec<MatchCase>,
        #[serde(default)]
        default: Option<Box<Node>>,
    },
    Block {
        #[serde(default)]
        label: Option<String>,
        statements: Vec<Node>,
    },
    Exists { identifier: String },
    Tmpl { tmpl: Vec<TmplPart> },
    Str { value: String },
    Num { value: f64 },
    Bool { value: bool },
    Null,
    /// Object literal; entries keep source order for evaluation.
    Obj { value: Vec<(String, Node)> },
    Arr { value: Vec<Node> },
    Not { expr: Box<Node> },
    Plus { expr: Box<Node> },
    Minus { expr: Box<Node> },
    Pow { left: Box<Node>, right: Box<Node> },
    Mul { left: Box<Node>, right: Box<Node> },
    Div { left: Box<Node>, right: Box<Node> },
    Rem { left: Box<Node>, right: Box<Node> },
    Add { left: Box<Node>, right: Box<Node> },
    Sub { left: Box<Node>, right: Box<Node> },
    Lt { left: Box<Node>, right: Box<Node> },
    Lteq { left: Box<Node>, right: Box<Node> },
    Gt { left: Box<Node>, right: Box<Node> },
    Gteq { left: Box<Node>, right: Box<Node> },
    Eq { left: Box<Node>, right: Box<Node> },
    Neq { left: Box<Node>, right: Box<Node> },
    And { left: Box<Node>, right: Box<Node> },
    Or { left: Box<Node>, right: Box<Node> },
    Identifier { name: String },
    Call { target: Box<Node>, args: Vec<Node> },
    Index { target: Box<Node>, index: Box<Node> },
    Prop { target: Box<Node>, name: String },

    // Type annotations, erased before evaluation
    NamedTypeSource,
    FnTypeSource,
    UnionTypeSource,
    Attr,
}

impl NodeKind {
    /// Statement kinds get a fresh scope when used as a clause body.
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            NodeKind::Def { .. }
                | NodeKind::Return { .. }
                | NodeKind::Each { .. }
                | NodeKind::For { .. }
                | NodeKind::Loop { .. }
                | NodeKind::Break { .. }
                | NodeKind::Continue { .. }
                | NodeKind::Assign { .. }
                | NodeKind::AddAssign { .. }
                | NodeKind::SubAssign { .. }
        )
    }

    /// The tag used in serialized trees.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Ns { .. } => "ns",
            NodeKind::Meta { .. } => "meta",
            NodeKind::Def { .. } => "def",
            NodeKind::Return { .. } => "return",
            NodeKind::Each { .. } => "each",
            NodeKind::For { .. } => "for",
            NodeKind::Loop { .. } => "loop",
            NodeKind::Break { .. } => "break",
            NodeKind::Continue { .. } => "continue",
            NodeKind::Assign { .. } => "assign",
            NodeKind::AddAssign { .. } => "addAssign",
            NodeKind::SubAssign { .. } => "subAssign",
            NodeKind::If { .. } => "if",
            NodeKind::Fn(_) => "fn",
            NodeKind::Match { .. } => "match",
            NodeKind::Block { .. } => "block",
            NodeKind::Exists { .. } => "exists",
            NodeKind::Tmpl { .. } => "tmpl",
            NodeKind::Str { .. } => "str",
            NodeKind::Num { .. } => "num",
            NodeKind::Bool { .. } => "bool",
            NodeKind::Null => "null",
            NodeKind::Obj { .. } => "obj",
            NodeKind::Arr { .. } => "arr",
            NodeKind::Not { .. } => "not",
            NodeKind::Plus { .. } => "plus",
            NodeKind::Minus { .. } => "minus",
            NodeKind::Pow { .. } => "pow",
            NodeKind::Mul { .. } => "mul",
            NodeKind::Div { .. } => "div",
            NodeKind::Rem { .. } => "rem",
            NodeKind::Add { .. } => "add",
            NodeKind::Sub { .. } => "sub",
            NodeKind::Lt { .. } => "lt",
            NodeKind::Lteq { .. } => "lteq",
            NodeKind::Gt { .. } => "gt",
            NodeKind::Gteq { .. } => "gteq",
            NodeKind::Eq { .. } => "eq",
            NodeKind::Neq { .. } => "neq",
            NodeKind::And { .. } => "and",
            NodeKind::Or { .. } => "or",
            NodeKind::Identifier { .. } => "identifier",
            NodeKind::Call { .. } => "call",
            NodeKind::Index { .. } => "index",
            NodeKind::Prop { .. } => "prop",
            NodeKind::NamedTypeSource => "namedTypeSource",
            NodeKind::FnTypeSource => "fnTypeSource",
            NodeKind::UnionTypeSource => "unionTypeSource",
            NodeKind::Attr => "attr",
        }
    }
}

/// Attribute attached to a definition: `#[name value]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: Node,
}

/// The two shapes of a `for` header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ForSpec {
    /// `for count body`: repeat without binding an index.
    Times { times: Box<Node> },
    /// `for (let var = from, count) body`: `from` defaults to 0 and the
    /// loop runs `count` times.
    Range {
        var: String,
        #[serde(default)]
        from: Option<Box<Node>>,
        to: Box<Node>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElseIf {
    pub cond: Node,
    pub then: Node,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCase {
    pub q: Node,
    pub a: Node,
}

/// Segment of a template string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TmplPart {
    Text(String),
    Expr(Node),
}

/// Function literal: `@(params) { children }`
///
/// Shared so a function value can outlive the tree it was created from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FnDef {
    pub params: Vec<Param>,
    pub children: Vec<Node>,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Identifier or destructuring pattern.
    pub dest: Node,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub default: Option<Node>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_kinds() {
        let def = NodeKind::Def {
            dest: Box::new(Node::new(NodeKind::Identifier { name: "x".into() })),
            expr: Box::new(Node::new(NodeKind::Null)),
            mutable: false,
            attr: vec![],
        };
        assert!(def.is_statement());
        assert!(!NodeKind::Null.is_statement());
        assert!(!NodeKind::Block { label: None, statements: vec![] }.is_statement());
    }

    #[test]
    fn test_deserialize_tagged_node() {
        let json = r#"{
            "type": "add",
            "left": { "type": "num", "value": 1, "loc": { "start": { "line": 1, "column": 1 }, "end": { "line": 1, "column": 2 } } },
            "right": { "type": "identifier", "name": "x" }
        }"#;
        let node: Node = serde_json::from_str(json).unwrap();
        match node.kind {
            NodeKind::Add { left, right } => {
                assert_eq!(left.kind, NodeKind::Num { value: 1.0 });
                assert_eq!(left.loc.start, Pos::new(1, 1));
                assert_eq!(right.kind, NodeKind::Identifier { name: "x".into() });
            }
            other => panic!("Expected add node, got {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_fn_and_for() {
        let json = r#"[
            { "type": "fn", "params": [ { "dest": { "type": "identifier", "name": "a" } } ], "children": [] },
            { "type": "for", "spec": { "range": { "var": "i", "to": { "type": "num", "value": 3 } } },
              "for": { "type": "block", "statements": [] } }
        ]"#;
        let nodes: Vec<Node> = serde_json::from_str(json).unwrap();
        match &nodes[0].kind {
            NodeKind::Fn(def) => {
                assert_eq!(def.params.len(), 1);
                assert!(!def.params[0].optional);
                assert!(def.params[0].default.is_none());
            }
            other => panic!("Expected fn node, got {:?}", other),
        }
        match &nodes[1].kind {
            NodeKind::For { spec: ForSpec::Range { var, from, .. }, .. } => {
                assert_eq!(var, "i");
                assert!(from.is_none());
            }
            other => panic!("Expected for node, got {:?}", other),
        }
    }

    #[test]
    fn test_template_parts_untagged() {
        let json = r#"{ "type": "tmpl", "tmpl": [ "a = ", { "type": "identifier", "name": "a" } ] }"#;
        let node: Node = serde_json::from_str(json).unwrap();
        let NodeKind::Tmpl { tmpl } = node.kind else {
            panic!("Expected tmpl node");
        };
        assert_eq!(tmpl[0], TmplPart::Text("a = ".into()));
        assert!(matches!(tmpl[1], TmplPart::Expr(_)));
    }
}

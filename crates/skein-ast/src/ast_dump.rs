/// AST dumping utilities for testing and debugging
///
/// Provides human-readable tree representations of AST nodes.

use crate::ast::*;
use std::fmt::Write as FmtWrite;

/// Dump a script as a pretty-printed tree
pub fn dump_nodes(nodes: &[Node]) -> String {
    let mut out = String::new();
    writeln!(out, "Script:").unwrap();
    for node in nodes {
        write_node(&mut out, node, 1).unwrap();
    }
    out
}

fn write_label(out: &mut String, label: &Option<String>) -> std::fmt::Result {
    if let Some(label) = label {
        write!(out, " #{}", label)?;
    }
    Ok(())
}

fn write_children(out: &mut String, title: &str, nodes: &[Node], indent: usize) -> std::fmt::Result {
    let prefix = "  ".repeat(indent);
    if nodes.is_empty() {
        writeln!(out, "{}{}: (none)", prefix, title)?;
    } else {
        writeln!(out, "{}{}:", prefix, title)?;
        for node in nodes {
            write_node(out, node, indent + 1)?;
        }
    }
    Ok(())
}

fn write_node(out: &mut String, node: &Node, indent: usize) -> std::fmt::Result {
    let prefix = "  ".repeat(indent);
    let pos = node.loc.start;
    write!(out, "{}{} @{}:{}", prefix, node.kind.name(), pos.line, pos.column)?;

    match &node.kind {
        NodeKind::Ns { name, members } => {
            writeln!(out, " {}", name)?;
            write_children(out, "Members", members, indent + 1)?;
        }
        NodeKind::Meta { name, value } => {
            writeln!(out, " {}", name.as_deref().unwrap_or("(default)"))?;
            write_node(out, value, indent + 1)?;
        }
        NodeKind::Def { dest, expr, mutable, attr } => {
            writeln!(out, "{}", if *mutable { " var" } else { " let" })?;
            for a in attr {
                writeln!(out, "{}  #[{}]", prefix, a.name)?;
                write_node(out, &a.value, indent + 2)?;
            }
            write_node(out, dest, indent + 1)?;
            write_node(out, expr, indent + 1)?;
        }
        NodeKind::Return { expr } | NodeKind::Not { expr } | NodeKind::Plus { expr } | NodeKind::Minus { expr } => {
            writeln!(out)?;
            write_node(out, expr, indent + 1)?;
        }
        NodeKind::Each { label, var, items, body } => {
            write_label(out, label)?;
            writeln!(out)?;
            write_node(out, var, indent + 1)?;
            write_node(out, items, indent + 1)?;
            write_node(out, body, indent + 1)?;
        }
        NodeKind::For { label, spec, body } => {
            write_label(out, label)?;
            match spec {
                ForSpec::Times { times } => {
                    writeln!(out, " times")?;
                    write_node(out, times, indent + 1)?;
                }
                ForSpec::Range { var, from, to } => {
                    writeln!(out, " {}", var)?;
                    if let Some(from) = from {
                        write_node(out, from, indent + 1)?;
                    }
                    write_node(out, to, indent + 1)?;
                }
            }
            write_node(out, body, indent + 1)?;
        }
        NodeKind::Loop { label, statements } | NodeKind::Block { label, statements } => {
            write_label(out, label)?;
            writeln!(out)?;
            write_children(out, "Statements", statements, indent + 1)?;
        }
        NodeKind::Break { label, expr } => {
            write_label(out, label)?;
            writeln!(out)?;
            if let Some(expr) = expr {
                write_node(out, expr, indent + 1)?;
            }
        }
        NodeKind::Continue { label } => {
            write_label(out, label)?;
            writeln!(out)?;
        }
        NodeKind::Assign { dest, expr }
        | NodeKind::AddAssign { dest, expr }
        | NodeKind::SubAssign { dest, expr } => {
            writeln!(out)?;
            write_node(out, dest, indent + 1)?;
            write_node(out, expr, indent + 1)?;
        }
        NodeKind::If { label, cond, then, elseif, otherwise } => {
            write_label(out, label)?;
            writeln!(out)?;
            write_node(out, cond, indent + 1)?;
            write_node(out, then, indent + 1)?;
            for branch in elseif {
                writeln!(out, "{}  elif:", prefix)?;
                write_node(out, &branch.cond, indent + 2)?;
                write_node(out, &branch.then, indent + 2)?;
            }
            if let Some(otherwise) = otherwise {
                writeln!(out, "{}  else:", prefix)?;
                write_node(out, otherwise, indent + 2)?;
            }
        }
        NodeKind::Fn(def) => {
            writeln!(out)?;
            if def.params.is_empty() {
                writeln!(out, "{}  Params: (none)", prefix)?;
            } else {
                writeln!(out, "{}  Params:", prefix)?;
                for param in &def.params {
                    write_node(out, &param.dest, indent + 2)?;
                    if let Some(default) = &param.default {
                        writeln!(out, "{}      default:", prefix)?;
                        write_node(out, default, indent + 4)?;
                    } else if param.optional {
                        writeln!(out, "{}      (optional)", prefix)?;
                    }
                }
            }
            write_children(out, "Body", &def.children, indent + 1)?;
        }
        NodeKind::Match { label, about, qs, default } => {
            write_label(out, label)?;
            writeln!(out)?;
            write_node(out, about, indent + 1)?;
            for case in qs {
                writeln!(out, "{}  case:", prefix)?;
                write_node(out, &case.q, indent + 2)?;
                write_node(out, &case.a, indent + 2)?;
            }
            if let Some(default) = default {
                writeln!(out, "{}  default:", prefix)?;
                write_node(out, default, indent + 2)?;
            }
        }
        NodeKind::Exists { identifier } => writeln!(out, " {}", identifier)?,
        NodeKind::Tmpl { tmpl } => {
            writeln!(out)?;
            for part in tmpl {
                match part {
                    TmplPart::Text(text) => writeln!(out, "{}  {:?}", prefix, text)?,
                    TmplPart::Expr(expr) => write_node(out, expr, indent + 1)?,
                }
            }
        }
        NodeKind::Str { value } => writeln!(out, " {:?}", value)?,
        NodeKind::Num { value } => writeln!(out, " {}", value)?,
        NodeKind::Bool { value } => writeln!(out, " {}", value)?,
        NodeKind::Obj { value } => {
            writeln!(out)?;
            for (key, item) in value {
                writeln!(out, "{}  {}:", prefix, key)?;
                write_node(out, item, indent + 2)?;
            }
        }
        NodeKind::Arr { value } => {
            writeln!(out)?;
            for item in value {
                write_node(out, item, indent + 1)?;
            }
        }
        NodeKind::Pow { left, right }
        | NodeKind::Mul { left, right }
        | NodeKind::Div { left, right }
        | NodeKind::Rem { left, right }
        | NodeKind::Add { left, right }
        | NodeKind::Sub { left, right }
        | NodeKind::Lt { left, right }
        | NodeKind::Lteq { left, right }
        | NodeKind::Gt { left, right }
        | NodeKind::Gteq { left, right }
        | NodeKind::Eq { left, right }
        | NodeKind::Neq { left, right }
        | NodeKind::And { left, right }
        | NodeKind::Or { left, right } => {
            writeln!(out)?;
            write_node(out, left, indent + 1)?;
            write_node(out, right, indent + 1)?;
        }
        NodeKind::Identifier { name } => writeln!(out, " {}", name)?,
        NodeKind::Call { target, args } => {
            writeln!(out)?;
            write_node(out, target, indent + 1)?;
            write_children(out, "Args", args, indent + 1)?;
        }
        NodeKind::Index { target, index } => {
            writeln!(out)?;
            write_node(out, target, indent + 1)?;
            write_node(out, index, indent + 1)?;
        }
        NodeKind::Prop { target, name } => {
            writeln!(out, " .{}", name)?;
            write_node(out, target, indent + 1)?;
        }
        NodeKind::Null
        | NodeKind::NamedTypeSource
        | NodeKind::FnTypeSource
        | NodeKind::UnionTypeSource
        | NodeKind::Attr => writeln!(out)?,
    }
    Ok(())
}

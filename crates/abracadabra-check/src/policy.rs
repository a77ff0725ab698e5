//! Straight-line policy for candidate programs.
//!
//! Candidate code must be a flat sequence of graph-building statements:
//! batching and branching belong in the graph, not in the code that builds
//! it. [`check_straight_line`] walks the parsed program and reports every
//! loop and branch, at any nesting depth and inside any expression.

use std::fmt;

use serde::Serialize;

use crate::interpreter::ast::{Expr, ExprKind, Program, Stmt, StmtKind, Target};

/// The kind of control flow found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ControlFlow {
    ForLoop,
    WhileLoop,
    IfStatement,
    ConditionalExpression,
    Comprehension,
}

impl fmt::Display for ControlFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ControlFlow::ForLoop => "for loop",
            ControlFlow::WhileLoop => "while loop",
            ControlFlow::IfStatement => "if statement",
            ControlFlow::ConditionalExpression => "conditional expression",
            ControlFlow::Comprehension => "list comprehension",
        })
    }
}

/// One disallowed construct and where it starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyViolation {
    pub line: usize,
    pub construct: ControlFlow,
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.construct)
    }
}

/// Returns every control-flow construct in `program`, in source order
/// (outer constructs before the ones nested inside them).
pub fn check_straight_line(program: &Program) -> Vec<PolicyViolation> {
    let mut violations = Vec::new();
    for stmt in &program.body {
        visit_stmt(stmt, &mut violations);
    }
    violations
}

fn visit_stmt(stmt: &Stmt, out: &mut Vec<PolicyViolation>) {
    match &stmt.kind {
        StmtKind::Assign { targets, value } => {
            for target in targets {
                visit_target(target, out);
            }
            visit_expr(value, out);
        }
        StmtKind::Expr(expr) => visit_expr(expr, out),
        StmtKind::Pass => {}
        StmtKind::For {
            target,
            iter,
            body,
            orelse,
        } => {
            flag(out, stmt.line, ControlFlow::ForLoop);
            visit_expr(target, out);
            visit_expr(iter, out);
            visit_block(body, orelse, out);
        }
        StmtKind::While { test, body, orelse } => {
            flag(out, stmt.line, ControlFlow::WhileLoop);
            visit_expr(test, out);
            visit_block(body, orelse, out);
        }
        StmtKind::If { test, body, orelse } => {
            flag(out, stmt.line, ControlFlow::IfStatement);
            visit_expr(test, out);
            visit_block(body, orelse, out);
        }
    }
}

fn flag(out: &mut Vec<PolicyViolation>, line: usize, construct: ControlFlow) {
    out.push(PolicyViolation { line, construct });
}

fn visit_block(body: &[Stmt], orelse: &[Stmt], out: &mut Vec<PolicyViolation>) {
    for stmt in body.iter().chain(orelse) {
        visit_stmt(stmt, out);
    }
}

fn visit_target(target: &Target, out: &mut Vec<PolicyViolation>) {
    match target {
        Target::Name(_) => {}
        Target::Subscript { value, index } => {
            visit_expr(value, out);
            visit_expr(index, out);
        }
        Target::Tuple(targets) => targets.iter().for_each(|t| visit_target(t, out)),
    }
}

fn visit_expr(expr: &Expr, out: &mut Vec<PolicyViolation>) {
    let construct = match expr.kind {
        ExprKind::Conditional { .. } => Some(ControlFlow::ConditionalExpression),
        ExprKind::ListComp { .. } => Some(ControlFlow::Comprehension),
        _ => None,
    };
    if let Some(construct) = construct {
        flag(out, expr.line, construct);
    }
    expr.for_each_child(|child| visit_expr(child, out));
}

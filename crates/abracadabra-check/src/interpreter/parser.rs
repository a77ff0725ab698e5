//! Recursive-descent parser for candidate programs.
//!
//! Grammar (a Python-compatible subset):
//!
//! ```text
//! program    := statement*
//! statement  := for | while | if | simple (';' simple)* NEWLINE
//! simple     := 'pass' | exprlist ('=' exprlist)*
//! block      := ':' (simple-line | NEWLINE INDENT statement+ DEDENT)
//! test       := or_test ('if' or_test 'else' test)?
//! or_test    := and_test ('or' and_test)*
//! and_test   := not_test ('and' not_test)*
//! not_test   := 'not' not_test | comparison
//! comparison := arith (compop arith)*
//! arith      := term (('+' | '-') term)*
//! term       := factor (('*' | '/' | '//' | '%') factor)*
//! factor     := ('+' | '-') factor | power
//! power      := postfix ('**' factor)?
//! postfix    := atom ('.' NAME | '(' args ')' | '[' test ']')*
//! ```

use super::ast::{
    BinaryOp, BoolOp, CompareOp, Expr, ExprKind, Keyword, Program, Stmt, StmtKind, Target,
    UnaryOp,
};
use super::error::ParseError;
use super::lexer::{lex, Token, TokenKind};

/// Deepest expression or block nesting accepted before parsing gives up.
const MAX_DEPTH: usize = 64;

/// Parses a complete candidate program.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        depth: 0,
    };
    parser.program()
}

struct Parser<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl<'s> Parser<'s> {
    // ---- token cursor ----

    fn peek(&self) -> TokenKind {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map_or(TokenKind::Eof, |t| t.kind)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn text(&self) -> &'s str {
        let source = self.source;
        self.tokens
            .get(self.pos)
            .map_or("", |t| &source[t.span.clone()])
    }

    fn bump(&mut self) -> &'s str {
        let text = self.text();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        text
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<&'s str, ParseError> {
        if self.peek() == kind {
            Ok(self.bump())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let found = match self.text() {
            "" => self.peek().describe().to_string(),
            text => format!("'{}'", text),
        };
        ParseError::new(self.line(), format!("{}, found {}", message.into(), found))
    }

    fn unexpected(&self) -> ParseError {
        self.error("invalid syntax")
    }

    fn deepen(&mut self) -> Result<(), ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::new(self.line(), "expression nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    /// Runs `parse` one nesting level deeper, failing past `MAX_DEPTH`.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        self.deepen()?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    // ---- statements ----

    fn program(&mut self) -> Result<Program, ParseError> {
        let mut body = Vec::new();
        loop {
            while self.eat(TokenKind::Newline) {}
            if self.peek() == TokenKind::Eof {
                break;
            }
            self.statement(&mut body)?;
        }
        Ok(Program { body })
    }

    fn statement(&mut self, out: &mut Vec<Stmt>) -> Result<(), ParseError> {
        match self.peek() {
            TokenKind::For => out.push(self.for_stmt()?),
            TokenKind::While => out.push(self.while_stmt()?),
            TokenKind::If => out.push(self.if_stmt()?),
            TokenKind::Indent => {
                return Err(ParseError::new(self.line(), "unexpected indent"));
            }
            _ => self.simple_line(out)?,
        }
        Ok(())
    }

    /// One or more `;`-separated small statements terminated by a newline.
    fn simple_line(&mut self, out: &mut Vec<Stmt>) -> Result<(), ParseError> {
        loop {
            out.push(self.small_stmt()?);
            if !self.eat(TokenKind::Semicolon) {
                break;
            }
            if matches!(self.peek(), TokenKind::Newline | TokenKind::Eof) {
                break;
            }
        }
        match self.peek() {
            TokenKind::Newline => {
                self.bump();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            _ => Err(self.unexpected()),
        }
    }

    fn small_stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        match self.peek() {
            TokenKind::Pass => {
                self.bump();
                return Ok(Stmt {
                    line,
                    kind: StmtKind::Pass,
                });
            }
            TokenKind::ReservedKeyword => return Err(self.reserved()),
            _ => {}
        }

        let mut value = self.expr_list()?;
        let mut targets = Vec::new();
        while self.eat(TokenKind::Assign) {
            targets.push(self.to_target(value)?);
            value = self.expr_list()?;
        }
        if self.peek() == TokenKind::AugAssign {
            return Err(self.error("augmented assignment is not supported"));
        }

        let kind = if targets.is_empty() {
            StmtKind::Expr(value)
        } else {
            StmtKind::Assign { targets, value }
        };
        Ok(Stmt { line, kind })
    }

    fn to_target(&self, expr: Expr) -> Result<Target, ParseError> {
        match expr.kind {
            ExprKind::Name(name) => Ok(Target::Name(name)),
            ExprKind::Subscript { value, index } => Ok(Target::Subscript {
                value: *value,
                index: *index,
            }),
            ExprKind::Tuple(items) | ExprKind::List(items) => Ok(Target::Tuple(
                items
                    .into_iter()
                    .map(|item| self.to_target(item))
                    .collect::<Result<_, _>>()?,
            )),
            _ => Err(ParseError::new(
                expr.line,
                "cannot assign to this expression",
            )),
        }
    }

    fn for_stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        self.expect(TokenKind::For, "'for'")?;
        let target = self.target_list()?;
        self.expect(TokenKind::In, "'in'")?;
        let iter = self.expr_list()?;
        let body = self.block()?;
        let orelse = self.else_block()?;
        Ok(Stmt {
            line,
            kind: StmtKind::For {
                target,
                iter,
                body,
                orelse,
            },
        })
    }

    fn while_stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        self.expect(TokenKind::While, "'while'")?;
        let test = self.test()?;
        let body = self.block()?;
        let orelse = self.else_block()?;
        Ok(Stmt {
            line,
            kind: StmtKind::While { test, body, orelse },
        })
    }

    /// Parses `if` and, re-entrantly, each `elif` of the chain.
    fn if_stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        self.bump(); // `if` or `elif`
        let test = self.test()?;
        let body = self.block()?;
        let orelse = if self.peek() == TokenKind::Elif {
            vec![self.if_stmt()?]
        } else {
            self.else_block()?
        };
        Ok(Stmt {
            line,
            kind: StmtKind::If { test, body, orelse },
        })
    }

    fn else_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        if self.eat(TokenKind::Else) {
            self.block()
        } else {
            Ok(Vec::new())
        }
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(TokenKind::Colon, "':'")?;
        let mut body = Vec::new();
        if !self.eat(TokenKind::Newline) {
            self.simple_line(&mut body)?;
            return Ok(body);
        }
        if !self.eat(TokenKind::Indent) {
            return Err(self.error("expected an indented block"));
        }
        loop {
            while self.eat(TokenKind::Newline) {}
            match self.peek() {
                TokenKind::Dedent => {
                    self.bump();
                    break;
                }
                TokenKind::Eof => break,
                _ => self.nested(|p| p.statement(&mut body))?,
            }
        }
        Ok(body)
    }

    // ---- expressions ----

    /// `test (',' test)* [',']`; more than one element (or a trailing comma)
    /// makes a tuple.
    fn expr_list(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        let first = self.test()?;
        if self.peek() != TokenKind::Comma {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(TokenKind::Comma) {
            if !self.starts_expr() {
                break;
            }
            items.push(self.test()?);
        }
        Ok(Expr::new(line, ExprKind::Tuple(items)))
    }

    /// Loop and comprehension targets: stops before `in`.
    fn target_list(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        let first = self.arith()?;
        if self.peek() != TokenKind::Comma {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(TokenKind::Comma) {
            if self.peek() == TokenKind::In {
                break;
            }
            items.push(self.arith()?);
        }
        Ok(Expr::new(line, ExprKind::Tuple(items)))
    }

    fn starts_expr(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Name
                | TokenKind::Int
                | TokenKind::Float
                | TokenKind::Str
                | TokenKind::TrueLit
                | TokenKind::FalseLit
                | TokenKind::NoneLit
                | TokenKind::ParenOpen
                | TokenKind::BracketOpen
                | TokenKind::BraceOpen
                | TokenKind::Minus
                | TokenKind::Plus
                | TokenKind::Not
        )
    }

    fn test(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> Result<Expr, ParseError> {
        let body = self.or_test()?;
        if self.peek() != TokenKind::If {
            return Ok(body);
        }
        self.bump();
        let test = self.or_test()?;
        self.expect(TokenKind::Else, "'else' in conditional expression")?;
        let orelse = self.test()?;
        Ok(Expr::new(
            body.line,
            ExprKind::Conditional {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            },
        ))
    }

    fn or_test(&mut self) -> Result<Expr, ParseError> {
        self.bool_chain(TokenKind::Or, BoolOp::Or, Self::and_test)
    }

    fn and_test(&mut self) -> Result<Expr, ParseError> {
        self.bool_chain(TokenKind::And, BoolOp::And, Self::not_test)
    }

    fn bool_chain(
        &mut self,
        token: TokenKind,
        op: BoolOp,
        operand: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let first = operand(self)?;
        if self.peek() != token {
            return Ok(first);
        }
        let line = first.line;
        let mut values = vec![first];
        while self.eat(token) {
            values.push(operand(self)?);
        }
        Ok(Expr::new(line, ExprKind::BoolOp { op, values }))
    }

    fn not_test(&mut self) -> Result<Expr, ParseError> {
        if self.peek() == TokenKind::Not {
            let line = self.line();
            self.bump();
            let operand = self.nested(Self::not_test)?;
            return Ok(Expr::new(
                line,
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
            ));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.arith()?;
        let mut ops = Vec::new();
        while let Some(op) = self.compare_op() {
            ops.push((op, self.arith()?));
        }
        if ops.is_empty() {
            return Ok(left);
        }
        Ok(Expr::new(
            left.line,
            ExprKind::Compare {
                left: Box::new(left),
                ops,
            },
        ))
    }

    fn compare_op(&mut self) -> Option<CompareOp> {
        let op = match (self.peek(), self.peek_at(1)) {
            (TokenKind::EqEq, _) => CompareOp::Eq,
            (TokenKind::NotEq, _) => CompareOp::NotEq,
            (TokenKind::Lt, _) => CompareOp::Lt,
            (TokenKind::LtEq, _) => CompareOp::LtEq,
            (TokenKind::Gt, _) => CompareOp::Gt,
            (TokenKind::GtEq, _) => CompareOp::GtEq,
            (TokenKind::In, _) => CompareOp::In,
            (TokenKind::Not, TokenKind::In) => {
                self.bump();
                CompareOp::NotIn
            }
            (TokenKind::Is, TokenKind::Not) => {
                self.bump();
                CompareOp::IsNot
            }
            (TokenKind::Is, _) => CompareOp::Is,
            _ => return None,
        };
        self.bump();
        Some(op)
    }

    fn arith(&mut self) -> Result<Expr, ParseError> {
        let start = self.depth;
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => {
                    self.depth = start;
                    return Ok(left);
                }
            };
            self.deepen()?;
            self.bump();
            let right = self.term()?;
            left = binary(op, left, right);
        }
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let start = self.depth;
        let mut left = self.factor()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::DoubleSlash => BinaryOp::FloorDiv,
                TokenKind::Percent => BinaryOp::Mod,
                _ => {
                    self.depth = start;
                    return Ok(left);
                }
            };
            self.deepen()?;
            self.bump();
            let right = self.factor()?;
            left = binary(op, left, right);
        }
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.power(),
        };
        let line = self.line();
        self.bump();
        let operand = self.nested(Self::factor)?;
        Ok(Expr::new(
            line,
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
        ))
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let base = self.postfix()?;
        if self.eat(TokenKind::DoubleStar) {
            let exponent = self.nested(Self::factor)?;
            return Ok(binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let start = self.depth;
        let mut expr = self.atom()?;
        loop {
            let line = self.line();
            if matches!(
                self.peek(),
                TokenKind::Dot | TokenKind::ParenOpen | TokenKind::BracketOpen
            ) {
                self.deepen()?;
            }
            match self.peek() {
                TokenKind::Dot => {
                    self.bump();
                    let attr = self.expect(TokenKind::Name, "attribute name")?;
                    expr = Expr::new(
                        line,
                        ExprKind::Attribute {
                            value: Box::new(expr),
                            attr: attr.to_string(),
                        },
                    );
                }
                TokenKind::ParenOpen => {
                    self.bump();
                    let (args, keywords) = self.call_args()?;
                    expr = Expr::new(
                        expr.line,
                        ExprKind::Call {
                            func: Box::new(expr),
                            args,
                            keywords,
                        },
                    );
                }
                TokenKind::BracketOpen => {
                    self.bump();
                    let index = self.test()?;
                    if self.peek() == TokenKind::Colon {
                        return Err(self.error("slices are not supported"));
                    }
                    self.expect(TokenKind::BracketClose, "']'")?;
                    expr = Expr::new(
                        line,
                        ExprKind::Subscript {
                            value: Box::new(expr),
                            index: Box::new(index),
                        },
                    );
                }
                _ => {
                    self.depth = start;
                    return Ok(expr);
                }
            }
        }
    }

    /// Arguments after `(`, consuming the closing `)`.
    fn call_args(&mut self) -> Result<(Vec<Expr>, Vec<Keyword>), ParseError> {
        let mut args = Vec::new();
        let mut keywords: Vec<Keyword> = Vec::new();
        while self.peek() != TokenKind::ParenClose {
            if matches!(self.peek(), TokenKind::Star | TokenKind::DoubleStar) {
                return Err(self.error("argument unpacking is not supported"));
            }
            if self.peek() == TokenKind::Name && self.peek_at(1) == TokenKind::Assign {
                let line = self.line();
                let name = self.bump().to_string();
                self.bump();
                if keywords.iter().any(|k| k.name == name) {
                    return Err(ParseError::new(
                        line,
                        format!("keyword argument repeated: {}", name),
                    ));
                }
                let value = self.test()?;
                keywords.push(Keyword { name, value });
            } else {
                if !keywords.is_empty() {
                    return Err(self.error("positional argument follows keyword argument"));
                }
                args.push(self.test()?);
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::ParenClose, "')'")?;
        Ok((args, keywords))
    }

    fn atom(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        let kind = match self.peek() {
            TokenKind::Name => ExprKind::Name(self.bump().to_string()),
            TokenKind::Int => {
                let text = self.bump().replace('_', "");
                let value = text
                    .parse::<i128>()
                    .map_err(|_| ParseError::new(line, format!("integer literal too large: {}", text)))?;
                ExprKind::Int(value)
            }
            TokenKind::Float => {
                let text = self.bump().replace('_', "");
                let value = text
                    .parse::<f64>()
                    .map_err(|_| ParseError::new(line, format!("invalid float literal: {}", text)))?;
                ExprKind::Float(value)
            }
            TokenKind::Str => {
                // Adjacent literals concatenate.
                let mut value = String::new();
                while self.peek() == TokenKind::Str {
                    value.push_str(&unescape(self.bump()));
                }
                ExprKind::Str(value)
            }
            TokenKind::TrueLit => {
                self.bump();
                ExprKind::Bool(true)
            }
            TokenKind::FalseLit => {
                self.bump();
                ExprKind::Bool(false)
            }
            TokenKind::NoneLit => {
                self.bump();
                ExprKind::None
            }
            TokenKind::ParenOpen => return self.paren(),
            TokenKind::BracketOpen => return self.list(),
            TokenKind::BraceOpen => {
                return Err(self.error("dict and set literals are not supported"));
            }
            TokenKind::ReservedKeyword => return Err(self.reserved()),
            _ => return Err(self.unexpected()),
        };
        Ok(Expr::new(line, kind))
    }

    fn paren(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        self.expect(TokenKind::ParenOpen, "'('")?;
        if self.eat(TokenKind::ParenClose) {
            return Ok(Expr::new(line, ExprKind::Tuple(Vec::new())));
        }
        let first = self.test()?;
        if self.peek() == TokenKind::For {
            let comp = self.comprehension(line, first)?;
            self.expect(TokenKind::ParenClose, "')'")?;
            return Ok(comp);
        }
        if self.eat(TokenKind::ParenClose) {
            return Ok(first);
        }
        let items = self.sequence_tail(first, TokenKind::ParenClose, "')'")?;
        Ok(Expr::new(line, ExprKind::Tuple(items)))
    }

    fn list(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        self.expect(TokenKind::BracketOpen, "'['")?;
        if self.eat(TokenKind::BracketClose) {
            return Ok(Expr::new(line, ExprKind::List(Vec::new())));
        }
        let first = self.test()?;
        if self.peek() == TokenKind::For {
            let comp = self.comprehension(line, first)?;
            self.expect(TokenKind::BracketClose, "']'")?;
            return Ok(comp);
        }
        let items = self.sequence_tail(first, TokenKind::BracketClose, "']'")?;
        Ok(Expr::new(line, ExprKind::List(items)))
    }

    /// Remaining `, item` elements up to and including `close`.
    fn sequence_tail(
        &mut self,
        first: Expr,
        close: TokenKind,
        what: &str,
    ) -> Result<Vec<Expr>, ParseError> {
        let mut items = vec![first];
        while self.eat(TokenKind::Comma) {
            if self.peek() == close {
                break;
            }
            items.push(self.test()?);
        }
        self.expect(close, what)?;
        Ok(items)
    }

    fn comprehension(&mut self, line: usize, element: Expr) -> Result<Expr, ParseError> {
        self.expect(TokenKind::For, "'for'")?;
        let target = self.target_list()?;
        self.expect(TokenKind::In, "'in'")?;
        let iter = self.or_test()?;
        let mut conditions = Vec::new();
        while self.eat(TokenKind::If) {
            conditions.push(self.or_test()?);
        }
        if self.peek() == TokenKind::For {
            return Err(self.error("nested comprehensions are not supported"));
        }
        Ok(Expr::new(
            line,
            ExprKind::ListComp {
                element: Box::new(element),
                target: Box::new(target),
                iter: Box::new(iter),
                conditions,
            },
        ))
    }

    fn reserved(&self) -> ParseError {
        ParseError::new(
            self.line(),
            format!(
                "'{}' is not supported; write straight-line graph-building code",
                self.text()
            ),
        )
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::new(
        left.line,
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    )
}

/// Strips the quotes of a string token and resolves backslash escapes.
/// Unknown escapes are kept verbatim.
fn unescape(token: &str) -> String {
    let inner = &token[1..token.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

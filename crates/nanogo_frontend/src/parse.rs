//! Go source parser built on top of `tree-sitter-go`.
//!
//! The tree-sitter grammar accepts all of Go; this module maps the subset
//! nanogo understands into [`crate::ast`] and turns everything else into
//! `Unsupported` nodes so the code generator can reject them with a location.

use thiserror::Error;
use tracing::{debug, warn};
use tree_sitter::{Node as TsNode, Parser as TsParser};

use crate::ast::*;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to load the tree-sitter Go grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),
    #[error("tree-sitter produced no syntax tree")]
    NoTree,
    #[error("{span}: syntax error near `{snippet}`")]
    Syntax { span: Span, snippet: String },
    #[error("{span}: missing `{expected}`")]
    Missing { span: Span, expected: String },
    #[error("{span}: invalid string literal: {reason}")]
    InvalidString { span: Span, reason: String },
    #[error("{span}: malformed `{kind}` node")]
    Malformed { span: Span, kind: String },
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Parser that owns a tree-sitter instance with the Go grammar loaded.
pub struct GoParser {
    parser: TsParser,
}

impl GoParser {
    pub fn new() -> Result<Self> {
        let mut parser = TsParser::new();
        parser.set_language(&tree_sitter_go::LANGUAGE.into())?;
        Ok(Self { parser })
    }

    /// Parse Go source text into a [`SourceFile`].
    ///
    /// The first syntax error aborts parsing; the grammar's error recovery is
    /// not exposed.
    pub fn parse_str(&mut self, source: &str) -> Result<SourceFile> {
        let tree = self.parser.parse(source, None).ok_or(ParseError::NoTree)?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(first_error(root, source));
        }
        lower_source_file(root, source)
    }
}

/// Convenience wrapper: create a parser and parse `source` once.
pub fn parse_source(source: &str) -> Result<SourceFile> {
    GoParser::new()?.parse_str(source)
}

// ---------------------------------------------------------------------------
// Node helpers
// ---------------------------------------------------------------------------

fn span_of(node: TsNode) -> Span {
    let pos = node.start_position();
    Span::new(node.start_byte(), node.end_byte(), pos.row + 1, pos.column + 1)
}

fn text<'s>(node: TsNode, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}

/// Named children, skipping comments (which tree-sitter attaches anywhere).
fn named_children<'t>(node: TsNode<'t>) -> Vec<TsNode<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

fn field<'t>(node: TsNode<'t>, name: &str) -> Result<TsNode<'t>> {
    node.child_by_field_name(name)
        .ok_or_else(|| ParseError::Malformed {
            span: span_of(node),
            kind: node.kind().to_string(),
        })
}

fn first_error(node: TsNode, source: &str) -> ParseError {
    if node.is_missing() {
        return ParseError::Missing {
            span: span_of(node),
            expected: node.kind().to_string(),
        };
    }
    if node.is_error() {
        let snippet: String = text(node, source).chars().take(32).collect();
        return ParseError::Syntax {
            span: span_of(node),
            snippet,
        };
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() {
            return first_error(child, source);
        }
    }
    ParseError::Syntax {
        span: span_of(node),
        snippet: String::new(),
    }
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

fn lower_source_file(root: TsNode, source: &str) -> Result<SourceFile> {
    let mut package = String::new();
    let mut decls = Vec::new();

    for child in named_children(root) {
        match child.kind() {
            "package_clause" => {
                if let Some(name) = named_children(child).first() {
                    package = text(*name, source).to_string();
                }
            }
            "function_declaration" => decls.push(lower_function(child, source)?),
            kind => {
                debug!("unsupported top-level node: {kind}");
                decls.push(Decl::Unsupported {
                    construct: kind.replace('_', " "),
                    span: span_of(child),
                });
            }
        }
    }

    if package.is_empty() {
        warn!("source file has no package clause");
    }

    Ok(SourceFile { package, decls })
}

fn lower_function(node: TsNode, source: &str) -> Result<Decl> {
    let span = span_of(node);
    let name_node = field(node, "name")?;
    let name = Ident::spanned(text(name_node, source), span_of(name_node));

    if node.child_by_field_name("type_parameters").is_some() {
        return Ok(Decl::Unsupported {
            construct: format!("generic function `{}`", name.name),
            span,
        });
    }
    let Some(body_node) = node.child_by_field_name("body") else {
        return Ok(Decl::Unsupported {
            construct: format!("function `{}` without a body", name.name),
            span,
        });
    };

    let params = lower_parameters(field(node, "parameters")?, source);
    let results = match node.child_by_field_name("result") {
        None => Vec::new(),
        Some(result) if result.kind() == "parameter_list" => lower_parameters(result, source)
            .into_iter()
            .map(|param| param.ty)
            .collect(),
        Some(result) => vec![lower_type(result, source)],
    };
    let body = lower_block(body_node, source)?;

    Ok(Decl::Func(FuncDecl {
        name,
        params,
        results,
        body,
        span,
    }))
}

fn lower_parameters(node: TsNode, source: &str) -> Vec<Param> {
    let mut params = Vec::new();
    for decl in named_children(node) {
        let Some(ty_node) = decl.child_by_field_name("type") else {
            continue;
        };
        let mut ty = lower_type(ty_node, source);
        if decl.kind() == "variadic_parameter_declaration" {
            ty.name = format!("...{}", ty.name);
        }

        let mut cursor = decl.walk();
        let names: Vec<Ident> = decl
            .children_by_field_name("name", &mut cursor)
            .map(|n| Ident::spanned(text(n, source), span_of(n)))
            .collect();

        if names.is_empty() {
            // Unnamed parameter (or a result type list entry).
            params.push(Param {
                name: Ident::spanned("_", ty.span),
                ty,
            });
        } else {
            params.extend(names.into_iter().map(|name| Param {
                name,
                ty: ty.clone(),
            }));
        }
    }
    params
}

fn lower_type(node: TsNode, source: &str) -> TypeExpr {
    TypeExpr {
        name: text(node, source).to_string(),
        span: span_of(node),
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

fn lower_block(node: TsNode, source: &str) -> Result<Block> {
    let mut stmts = Vec::new();
    for child in named_children(node) {
        // Newer grammar versions wrap the statements in a `statement_list`.
        if child.kind() == "statement_list" {
            for stmt in named_children(child) {
                stmts.push(lower_stmt(stmt, source)?);
            }
        } else {
            stmts.push(lower_stmt(child, source)?);
        }
    }
    Ok(Block {
        stmts,
        span: span_of(node),
    })
}

fn lower_stmt(node: TsNode, source: &str) -> Result<Stmt> {
    let span = span_of(node);
    let kind = match node.kind() {
        "expression_statement" => {
            let inner = named_children(node);
            match inner.first() {
                Some(expr) => StmtKind::Expr(lower_expr(*expr, source)?),
                None => StmtKind::Empty,
            }
        }
        "inc_statement" | "dec_statement" => {
            let target = named_children(node)
                .first()
                .copied()
                .ok_or_else(|| ParseError::Malformed {
                    span,
                    kind: node.kind().to_string(),
                })?;
            let op = if node.kind() == "inc_statement" {
                IncDecOp::Inc
            } else {
                IncDecOp::Dec
            };
            StmtKind::IncDec {
                target: lower_expr(target, source)?,
                op,
            }
        }
        "assignment_statement" => {
            let operator = text(field(node, "operator")?, source);
            let op = if operator == "=" {
                None
            } else {
                match BinaryOp::from_assign_token(operator) {
                    Some(op) => Some(op),
                    None => {
                        return Ok(Stmt {
                            kind: StmtKind::Unsupported {
                                construct: format!("assignment operator `{operator}`"),
                            },
                            span,
                        });
                    }
                }
            };
            StmtKind::Assign {
                targets: lower_expr_list(field(node, "left")?, source)?,
                op,
                values: lower_expr_list(field(node, "right")?, source)?,
            }
        }
        "short_var_declaration" => {
            let left = lower_expr_list(field(node, "left")?, source)?;
            let values = lower_expr_list(field(node, "right")?, source)?;
            let mut names = Vec::with_capacity(left.len());
            for expr in &left {
                match expr.as_ident() {
                    Some(name) => names.push(Ident::spanned(name, expr.span)),
                    None => {
                        return Ok(Stmt {
                            kind: StmtKind::Unsupported {
                                construct: "short declaration of a non-identifier".to_string(),
                            },
                            span,
                        });
                    }
                }
            }
            StmtKind::ShortVarDecl { names, values }
        }
        "var_declaration" => lower_var_declaration(node, source)?,
        "return_statement" => {
            let exprs = match named_children(node).first() {
                Some(list) => lower_expr_list(*list, source)?,
                None => Vec::new(),
            };
            StmtKind::Return(exprs)
        }
        "if_statement" => StmtKind::If(lower_if(node, source)?),
        "for_statement" => StmtKind::For(lower_for(node, source)?),
        "block" => StmtKind::Block(lower_block(node, source)?),
        "break_statement" => StmtKind::Break,
        "continue_statement" => StmtKind::Continue,
        "empty_statement" => StmtKind::Empty,
        kind => StmtKind::Unsupported {
            construct: kind.replace('_', " "),
        },
    };
    Ok(Stmt { kind, span })
}

fn lower_var_declaration(node: TsNode, source: &str) -> Result<StmtKind> {
    let mut specs = Vec::new();
    for child in named_children(node) {
        match child.kind() {
            "var_spec" => specs.push(child),
            "var_spec_list" => specs.extend(
                named_children(child)
                    .into_iter()
                    .filter(|spec| spec.kind() == "var_spec"),
            ),
            _ => {}
        }
    }

    let mut decls = Vec::with_capacity(specs.len());
    for spec in specs {
        let mut cursor = spec.walk();
        let names: Vec<Ident> = spec
            .children_by_field_name("name", &mut cursor)
            .map(|n| Ident::spanned(text(n, source), span_of(n)))
            .collect();
        let ty = spec.child_by_field_name("type").map(|t| lower_type(t, source));
        let values = match spec.child_by_field_name("value") {
            Some(list) => lower_expr_list(list, source)?,
            None => Vec::new(),
        };
        decls.push(Stmt {
            kind: StmtKind::VarDecl { names, ty, values },
            span: span_of(spec),
        });
    }

    if decls.len() == 1 {
        return Ok(decls.remove(0).kind);
    }
    Ok(StmtKind::Block(Block {
        stmts: decls,
        span: span_of(node),
    }))
}

fn lower_if(node: TsNode, source: &str) -> Result<IfStmt> {
    let init = match node.child_by_field_name("initializer") {
        Some(init) => Some(Box::new(lower_stmt(init, source)?)),
        None => None,
    };
    let cond = lower_expr(field(node, "condition")?, source)?;
    let then_block = lower_block(field(node, "consequence")?, source)?;
    let else_branch = match node.child_by_field_name("alternative") {
        None => None,
        Some(alt) if alt.kind() == "if_statement" => {
            Some(Else::If(Box::new(lower_if(alt, source)?)))
        }
        Some(alt) => Some(Else::Block(lower_block(alt, source)?)),
    };
    Ok(IfStmt {
        init,
        cond,
        then_block,
        else_branch,
    })
}

fn lower_for(node: TsNode, source: &str) -> Result<ForStmt> {
    let body_node = field(node, "body")?;
    let body = lower_block(body_node, source)?;

    let header_node = named_children(node)
        .into_iter()
        .find(|child| child.id() != body_node.id());

    let header = match header_node {
        None => ForHeader::Clause {
            init: None,
            cond: None,
            post: None,
        },
        Some(clause) if clause.kind() == "for_clause" => {
            let init = match clause.child_by_field_name("initializer") {
                Some(stmt) => Some(Box::new(lower_stmt(stmt, source)?)),
                None => None,
            };
            let cond = match clause.child_by_field_name("condition") {
                Some(expr) => Some(lower_expr(expr, source)?),
                None => None,
            };
            let post = match clause.child_by_field_name("update") {
                Some(stmt) => Some(Box::new(lower_stmt(stmt, source)?)),
                None => None,
            };
            ForHeader::Clause { init, cond, post }
        }
        Some(clause) if clause.kind() == "range_clause" => ForHeader::Range,
        Some(expr) => ForHeader::Cond(lower_expr(expr, source)?),
    };

    Ok(ForStmt { header, body })
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

fn lower_expr_list(node: TsNode, source: &str) -> Result<Vec<Expr>> {
    if node.kind() != "expression_list" {
        return Ok(vec![lower_expr(node, source)?]);
    }
    named_children(node)
        .into_iter()
        .map(|child| lower_expr(child, source))
        .collect()
}

fn unsupported(construct: impl Into<String>) -> ExprKind {
    ExprKind::Unsupported {
        construct: construct.into(),
    }
}

fn lower_expr(node: TsNode, source: &str) -> Result<Expr> {
    let span = span_of(node);
    let kind = match node.kind() {
        "identifier" => ExprKind::Ident(text(node, source).to_string()),
        "int_literal" => ExprKind::Lit(Lit::Int(text(node, source).to_string())),
        "float_literal" => ExprKind::Lit(Lit::Float(text(node, source).to_string())),
        "imaginary_literal" => ExprKind::Lit(Lit::Imaginary(text(node, source).to_string())),
        "rune_literal" => ExprKind::Lit(Lit::Rune(text(node, source).to_string())),
        "interpreted_string_literal" => {
            let bytes = unquote_interpreted(text(node, source))
                .map_err(|reason| ParseError::InvalidString { span, reason })?;
            ExprKind::Lit(Lit::Str(bytes))
        }
        "raw_string_literal" => ExprKind::Lit(Lit::Str(unquote_raw(text(node, source)))),
        "parenthesized_expression" => {
            let inner = named_children(node)
                .first()
                .copied()
                .ok_or_else(|| ParseError::Malformed {
                    span,
                    kind: node.kind().to_string(),
                })?;
            return lower_expr(inner, source);
        }
        "unary_expression" => {
            let token = text(field(node, "operator")?, source);
            match UnaryOp::from_token(token) {
                Some(op) => ExprKind::Unary {
                    op,
                    operand: Box::new(lower_expr(field(node, "operand")?, source)?),
                },
                None => unsupported(format!("unary operator `{token}`")),
            }
        }
        "binary_expression" => {
            let token = text(field(node, "operator")?, source);
            match BinaryOp::from_token(token) {
                Some(op) => ExprKind::Binary {
                    op,
                    lhs: Box::new(lower_expr(field(node, "left")?, source)?),
                    rhs: Box::new(lower_expr(field(node, "right")?, source)?),
                },
                None => unsupported(format!("binary operator `{token}`")),
            }
        }
        "call_expression" => lower_call(node, source)?,
        "true" | "false" => unsupported("boolean literal"),
        kind => unsupported(kind.replace('_', " ")),
    };
    Ok(Expr { kind, span })
}

fn lower_call(node: TsNode, source: &str) -> Result<ExprKind> {
    if node.child_by_field_name("type_arguments").is_some() {
        return Ok(unsupported("generic call"));
    }
    let callee = lower_expr(field(node, "function")?, source)?;
    let args_node = field(node, "arguments")?;

    let mut cursor = args_node.walk();
    let spread = args_node
        .children(&mut cursor)
        .any(|child| !child.is_named() && child.kind() == "...");
    if spread {
        return Ok(unsupported("variadic argument spread"));
    }

    let args = named_children(args_node)
        .into_iter()
        .map(|arg| lower_expr(arg, source))
        .collect::<Result<Vec<_>>>()?;
    Ok(ExprKind::Call {
        callee: Box::new(callee),
        args,
    })
}

// ---------------------------------------------------------------------------
// String literals
// ---------------------------------------------------------------------------

/// Decode a double-quoted Go string literal (quotes included) into bytes.
pub fn unquote_interpreted(raw: &str) -> std::result::Result<Vec<u8>, String> {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| format!("not a quoted string: {raw}"))?;

    let mut out = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        let esc = chars.next().ok_or("trailing backslash")?;
        match esc {
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0c),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            'v' => out.push(0x0b),
            '\\' => out.push(b'\\'),
            '"' => out.push(b'"'),
            'x' => out.push(take_digits(&mut chars, 2, 16)? as u8),
            '0'..='7' => {
                let rest = take_digits(&mut chars, 2, 8)?;
                let value = (esc as u32 - '0' as u32) * 64 + rest;
                if value > 0xff {
                    return Err(format!("octal escape out of range: {value}"));
                }
                out.push(value as u8);
            }
            'u' | 'U' => {
                let width = if esc == 'u' { 4 } else { 8 };
                let code = take_digits(&mut chars, width, 16)?;
                let ch = char::from_u32(code)
                    .ok_or_else(|| format!("invalid Unicode code point {code:#x}"))?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
            other => return Err(format!("unknown escape sequence `\\{other}`")),
        }
    }
    Ok(out)
}

fn take_digits(
    chars: &mut std::str::Chars<'_>,
    count: usize,
    radix: u32,
) -> std::result::Result<u32, String> {
    let mut value = 0u32;
    for _ in 0..count {
        let digit = chars
            .next()
            .and_then(|c| c.to_digit(radix))
            .ok_or_else(|| format!("expected {count} base-{radix} digits in escape"))?;
        value = value * radix + digit;
    }
    Ok(value)
}

/// Decode a back-quoted raw string literal. Carriage returns are discarded.
pub fn unquote_raw(raw: &str) -> Vec<u8> {
    let inner = raw
        .strip_prefix('`')
        .and_then(|s| s.strip_suffix('`'))
        .unwrap_or(raw);
    inner.bytes().filter(|b| *b != b'\r').collect()
}

//! Prompt and print template rendering.
//!
//! Templates are rendered against the execution scope, a string-keyed map
//! of tagged values. Supported forms:
//!
//! - `{{ .name }}` substitutes a scope variable
//! - `{{if .name}} ... {{else}} ... {{end}}` conditionals
//! - `{{range .name}} ... {{end}}` iterates arrays, with `{{ . }}` bound
//!   to the current element
//!
//! Referencing a variable that is not in scope is an error, never an empty
//! substitution.

use std::collections::HashMap;

use thiserror::Error;

use crate::domain::models::value::Value;

#[derive(Debug, Error, PartialEq)]
pub enum RenderError {
    #[error("unclosed template tag")]
    UnclosedTag,

    #[error("unterminated block, missing {{{{end}}}}")]
    UnclosedBlock,

    #[error("unexpected tag '{0}'")]
    UnexpectedTag(String),

    #[error("invalid variable reference '{0}'")]
    InvalidVariable(String),

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("variable '{0}' is not iterable")]
    NotIterable(String),

    #[error("'.' used outside of a range block")]
    CurrentOutsideRange,
}

/// Render a template against the given variable scope.
pub fn render(template: &str, vars: &HashMap<String, Value>) -> Result<String, RenderError> {
    let toks = lex(template)?;
    let mut parser = Parser { toks, pos: 0 };
    let (nodes, terminator) = parser.parse_nodes(false)?;
    debug_assert_eq!(terminator, Terminator::Eof);
    let mut out = String::new();
    eval(&nodes, vars, None, &mut out)?;
    Ok(out)
}

#[derive(Debug, Clone)]
enum Tok {
    Text(String),
    Tag(String),
}

fn lex(input: &str) -> Result<Vec<Tok>, RenderError> {
    let mut toks = Vec::new();
    let mut rest = input;
    while let Some(start) = rest.find("{{") {
        if start > 0 {
            toks.push(Tok::Text(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or(RenderError::UnclosedTag)?;
        toks.push(Tok::Tag(after[..end].trim().to_string()));
        rest = &after[end + 2..];
    }
    if !rest.is_empty() {
        toks.push(Tok::Text(rest.to_string()));
    }
    Ok(toks)
}

#[derive(Debug)]
enum Node {
    Text(String),
    Var(String),
    Current,
    If {
        var: String,
        then_body: Vec<Node>,
        else_body: Vec<Node>,
    },
    Range {
        var: String,
        body: Vec<Node>,
    },
}

#[derive(Debug, PartialEq)]
enum Terminator {
    End,
    Else,
    Eof,
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn parse_nodes(&mut self, in_block: bool) -> Result<(Vec<Node>, Terminator), RenderError> {
        let mut nodes = Vec::new();
        while self.pos < self.toks.len() {
            let tok = self.toks[self.pos].clone();
            self.pos += 1;
            match tok {
                Tok::Text(text) => nodes.push(Node::Text(text)),
                Tok::Tag(tag) => match tag.as_str() {
                    "end" => {
                        if in_block {
                            return Ok((nodes, Terminator::End));
                        }
                        return Err(RenderError::UnexpectedTag("end".to_string()));
                    }
                    "else" => {
                        if in_block {
                            return Ok((nodes, Terminator::Else));
                        }
                        return Err(RenderError::UnexpectedTag("else".to_string()));
                    }
                    "." => nodes.push(Node::Current),
                    _ => {
                        if let Some(cond) = tag.strip_prefix("if ") {
                            let var = parse_var(cond)?;
                            let (then_body, term) = self.parse_nodes(true)?;
                            let else_body = match term {
                                Terminator::Else => {
                                    let (body, term) = self.parse_nodes(true)?;
                                    if term != Terminator::End {
                                        return Err(RenderError::UnclosedBlock);
                                    }
                                    body
                                }
                                Terminator::End => Vec::new(),
                                Terminator::Eof => return Err(RenderError::UnclosedBlock),
                            };
                            nodes.push(Node::If {
                                var,
                                then_body,
                                else_body,
                            });
                        } else if let Some(source) = tag.strip_prefix("range ") {
                            let var = parse_var(source)?;
                            let (body, term) = self.parse_nodes(true)?;
                            match term {
                                Terminator::End => nodes.push(Node::Range { var, body }),
                                Terminator::Else => {
                                    return Err(RenderError::UnexpectedTag("else".to_string()))
                                }
                                Terminator::Eof => return Err(RenderError::UnclosedBlock),
                            }
                        } else if let Some(name) = tag.strip_prefix('.') {
                            if name.is_empty() || name.contains(char::is_whitespace) {
                                return Err(RenderError::InvalidVariable(tag));
                            }
                            nodes.push(Node::Var(name.to_string()));
                        } else {
                            return Err(RenderError::UnexpectedTag(tag));
                        }
                    }
                },
            }
        }
        if in_block {
            return Err(RenderError::UnclosedBlock);
        }
        Ok((nodes, Terminator::Eof))
    }
}

fn parse_var(raw: &str) -> Result<String, RenderError> {
    let raw = raw.trim();
    let name = raw
        .strip_prefix('.')
        .ok_or_else(|| RenderError::InvalidVariable(raw.to_string()))?;
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(RenderError::InvalidVariable(raw.to_string()));
    }
    Ok(name.to_string())
}

fn eval(
    nodes: &[Node],
    vars: &HashMap<String, Value>,
    current: Option<&Value>,
    out: &mut String,
) -> Result<(), RenderError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var(name) => {
                let value = vars
                    .get(name)
                    .ok_or_else(|| RenderError::UnknownVariable(name.clone()))?;
                out.push_str(&value.as_display_string());
            }
            Node::Current => {
                let value = current.ok_or(RenderError::CurrentOutsideRange)?;
                out.push_str(&value.as_display_string());
            }
            Node::If {
                var,
                then_body,
                else_body,
            } => {
                let value = vars
                    .get(var)
                    .ok_or_else(|| RenderError::UnknownVariable(var.clone()))?;
                if value.is_truthy() {
                    eval(then_body, vars, current, out)?;
                } else {
                    eval(else_body, vars, current, out)?;
                }
            }
            Node::Range { var, body } => {
                let value = vars
                    .get(var)
                    .ok_or_else(|| RenderError::UnknownVariable(var.clone()))?;
                let items = value
                    .iter_items()
                    .ok_or_else(|| RenderError::NotIterable(var.clone()))?;
                for item in items {
                    eval(body, vars, Some(&item), out)?;
                }
            }
        }
    }
    Ok(())
}

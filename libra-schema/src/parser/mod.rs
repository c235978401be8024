//! Parser for type specifications, default expressions and list literals.
//!
//! Type specifications are constructor-call shaped text such as
//! `Float(precision = 53, asdecimal = True)`. The parser only normalises
//! syntax: it never checks that the base type exists or that the arguments
//! suit it.

mod grammar;

use pest::Parser;
use pest::error::{ErrorVariant, InputLocation};
use smol_str::SmolStr;
use tracing::warn;

use crate::ast::{TypeDescriptor, Value};
use crate::error::{Notice, SchemaError, SchemaResult};

pub use grammar::{Rule, TypeSpecParser};

type Pair<'i> = pest::iterators::Pair<'i, Rule>;

/// Parse a type specification, logging and discarding advisories.
pub fn parse_type_spec(input: &str) -> SchemaResult<TypeDescriptor> {
    let (descriptor, notices) = parse_type_spec_with_notices(input)?;
    for notice in &notices {
        warn!(spec = input, %notice, "type spec advisory");
    }
    Ok(descriptor)
}

/// Parse a type specification and return any advisories next to it.
///
/// A keyword given twice keeps its last value and yields a
/// [`Notice::DuplicateKeywordArg`].
pub fn parse_type_spec_with_notices(input: &str) -> SchemaResult<(TypeDescriptor, Vec<Notice>)> {
    let mut pairs =
        TypeSpecParser::parse(Rule::type_spec_input, input).map_err(|e| syntax_error(input, e))?;

    let mut lowering = Lowering::new(input);
    let spec = next_pair(&mut pairs, input, "type specification")?;
    let descriptor = lowering.call(spec)?;

    Ok((descriptor, lowering.notices))
}

/// Parse default-value text into either a literal or a call expression.
///
/// A bare identifier is rejected; only a call with an argument list
/// (possibly empty) counts as an expression.
pub fn parse_default_expr(input: &str) -> SchemaResult<(Value, Vec<Notice>)> {
    let mut pairs =
        TypeSpecParser::parse(Rule::default_input, input).map_err(|e| syntax_error(input, e))?;

    let mut lowering = Lowering::new(input);
    let first = next_pair(&mut pairs, input, "default value")?;
    let value = match first.as_rule() {
        Rule::call_expr => Value::Call(lowering.call(first)?),
        _ => lowering.value(first)?,
    };

    Ok((value, lowering.notices))
}

/// Parse list-literal text such as `['col_a', 'col_b']`.
pub fn parse_list_literal(input: &str) -> SchemaResult<Vec<Value>> {
    let pairs =
        TypeSpecParser::parse(Rule::list_input, input).map_err(|e| syntax_error(input, e))?;

    let mut lowering = Lowering::new(input);
    pairs
        .filter(|pair| pair.as_rule() == Rule::value)
        .map(|pair| lowering.value(pair))
        .collect()
}

/// Turns parse pairs into AST values.
struct Lowering<'s> {
    src: &'s str,
    notices: Vec<Notice>,
}

impl<'s> Lowering<'s> {
    fn new(src: &'s str) -> Self {
        Self {
            src,
            notices: Vec::new(),
        }
    }

    /// Lower a `type_spec` or `call_expr` pair.
    fn call(&mut self, pair: Pair<'_>) -> SchemaResult<TypeDescriptor> {
        let text = pair.as_str();
        let mut inner = pair.into_inner();

        let name = next_pair(&mut inner, self.src, "identifier")?;
        let mut descriptor = TypeDescriptor::new(name.as_str());

        if let Some(arg_list) = inner.next() {
            for arg in arg_list.into_inner().filter(|p| p.as_rule() == Rule::arg) {
                let offset = arg.as_span().start();
                let item = next_pair(&mut arg.into_inner(), self.src, "argument")?;

                if item.as_rule() == Rule::keyword_arg {
                    let mut kv = item.into_inner();
                    let key = SmolStr::new(next_pair(&mut kv, self.src, "keyword")?.as_str());
                    let value_pair = next_pair(&mut kv, self.src, "value")?;
                    let value = self.value(value_pair)?;

                    if descriptor.kwargs.shift_remove(&key).is_some() {
                        self.notices.push(Notice::DuplicateKeywordArg {
                            spec: text.to_string(),
                            keyword: key.to_string(),
                        });
                    }
                    descriptor.kwargs.insert(key, value);
                } else {
                    if !descriptor.kwargs.is_empty() {
                        return Err(SchemaError::malformed(
                            self.src,
                            offset,
                            "positional argument follows keyword argument",
                        ));
                    }
                    let value = self.value(item)?;
                    descriptor.args.push(value);
                }
            }
        }

        Ok(descriptor)
    }

    fn value(&mut self, pair: Pair<'_>) -> SchemaResult<Value> {
        match pair.as_rule() {
            Rule::value => {
                let inner = next_pair(&mut pair.into_inner(), self.src, "value")?;
                self.value(inner)
            }
            Rule::string_literal => {
                let s = pair.as_str();
                // Both delimiters are one byte wide.
                Ok(Value::String(s[1..s.len() - 1].to_string()))
            }
            Rule::number_literal => self.number(pair),
            Rule::boolean_literal => Ok(Value::Bool(pair.as_str().eq_ignore_ascii_case("true"))),
            Rule::type_spec | Rule::call_expr => Ok(Value::Call(self.call(pair)?)),
            rule => Err(SchemaError::malformed(
                self.src,
                pair.as_span().start(),
                format!("unexpected {}", describe(rule)),
            )),
        }
    }

    fn number(&self, pair: Pair<'_>) -> SchemaResult<Value> {
        let s = pair.as_str();
        let offset = pair.as_span().start();

        if s.contains(['.', 'e', 'E']) {
            s.parse()
                .map(Value::Float)
                .map_err(|_| SchemaError::malformed(self.src, offset, "invalid float literal"))
        } else {
            s.parse()
                .map(Value::Int)
                .map_err(|_| SchemaError::malformed(self.src, offset, "integer literal out of range"))
        }
    }
}

/// Take the next pair, failing with a parse error if the tree is short.
fn next_pair<'i>(
    pairs: &mut impl Iterator<Item = Pair<'i>>,
    src: &str,
    what: &str,
) -> SchemaResult<Pair<'i>> {
    pairs
        .next()
        .ok_or_else(|| SchemaError::malformed(src, src.len(), format!("expected {}", what)))
}

fn syntax_error(src: &str, err: pest::error::Error<Rule>) -> SchemaError {
    let offset = match err.location {
        InputLocation::Pos(pos) => pos,
        InputLocation::Span((start, _)) => start,
    };

    let message = match &err.variant {
        ErrorVariant::ParsingError { positives, .. } if !positives.is_empty() => {
            let mut expected: Vec<&str> = Vec::new();
            for rule in positives {
                let what = describe(*rule);
                if !expected.contains(&what) {
                    expected.push(what);
                }
            }
            format!("expected {}", expected.join(" or "))
        }
        ErrorVariant::ParsingError { .. } => "unexpected input".to_string(),
        ErrorVariant::CustomError { message } => message.clone(),
    };

    SchemaError::malformed(src, offset, message)
}

fn describe(rule: Rule) -> &'static str {
    match rule {
        Rule::identifier | Rule::type_spec | Rule::call_expr => "identifier",
        Rule::string_literal => "string",
        Rule::number_literal => "number",
        Rule::boolean_literal => "boolean",
        Rule::value | Rule::arg => "value",
        Rule::arg_list => "argument list",
        Rule::keyword_arg => "keyword argument",
        Rule::lparen => "`(`",
        Rule::rparen => "`)`",
        Rule::comma => "`,`",
        Rule::EOI => "end of input",
        _ => "token",
    }
}

//! The two VCD grammars.
//!
//! The header is a list of `$keyword ... $end` declarations ending with
//! `$enddefinitions $end`. The body is an unbounded stream of ticks and value
//! changes read to the end of the input. They are parsed separately so the
//! header can be read without touching the (usually much larger) body.

use log::{debug, info, warn};
use num_traits::FromPrimitive;

use crate::{
    error::{ParseError, ParseErrorKind, ParsePhase},
    lexer::{Lexer, Token},
    types::{
        Change, Declarations, Document, DumpSection, ScopeId, ScopeType, SimCmd, Timescale,
        TimescaleMagnitude, TimescaleUnit, Var, VarType, ROOT_SCOPE,
    },
    value::{BinaryNum, RealNum, ScalarValue, Value},
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Skip malformed body records instead of failing, collecting the errors
    /// in `Document::diagnostics`. Out of range reals are always skipped.
    pub recover_malformed_records: bool,
}

/// Commands from the body, plus any records that were skipped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedSimCmds {
    pub sim_cmds: Vec<SimCmd>,
    pub diagnostics: Vec<ParseError>,
}

fn expected(lex: &Lexer<'_>, expected: &str, found: &Token<'_>) -> ParseError {
    lex.error(
        found.start,
        ParseErrorKind::Expected {
            expected: expected.to_string(),
            found: found.lossy(),
        },
    )
}

fn parse_timescale(lex: &mut Lexer<'_>, keyword: &Token<'_>) -> Result<Timescale, ParseError> {
    let tokens = lex.tokens_until_end("$timescale")?;

    // Either `1 ns` or `1ns`.
    let (magnitude, unit) = match tokens.as_slice() {
        [magnitude, unit] => (*magnitude, *unit),
        [glued] => {
            let split = glued
                .text
                .iter()
                .position(|b| !b.is_ascii_digit())
                .unwrap_or(glued.text.len());
            (
                Token {
                    start: glued.start,
                    text: &glued.text[..split],
                },
                Token {
                    start: glued.start + split,
                    text: &glued.text[split..],
                },
            )
        }
        [] => {
            return Err(lex.error(
                keyword.end(),
                ParseErrorKind::Expected {
                    expected: "timescale magnitude and unit".to_string(),
                    found: "$end".to_string(),
                },
            ))
        }
        [_, _, extra, ..] => return Err(expected(lex, "$end to close $timescale", extra)),
    };

    let magnitude = std::str::from_utf8(magnitude.text)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .and_then(TimescaleMagnitude::from_u32)
        .ok_or_else(|| {
            lex.error(
                magnitude.start,
                ParseErrorKind::InvalidTimescaleMagnitude(magnitude.lossy()),
            )
        })?;
    let unit = TimescaleUnit::from_bytes(unit.text).ok_or_else(|| {
        lex.error(unit.start, ParseErrorKind::InvalidTimescaleUnit(unit.lossy()))
    })?;

    Ok(Timescale { magnitude, unit })
}

fn parse_scope(
    lex: &mut Lexer<'_>,
    keyword: &Token<'_>,
    decls: &mut Declarations,
    parent: ScopeId,
) -> Result<ScopeId, ParseError> {
    let tokens = lex.tokens_until_end("$scope")?;
    let (scope_type, identifier) = match tokens.as_slice() {
        [scope_type, identifier] => (scope_type, identifier),
        [_, _, extra, ..] => return Err(expected(lex, "$end to close $scope", extra)),
        _ => {
            return Err(lex.error(
                keyword.start,
                ParseErrorKind::Expected {
                    expected: "$scope <type> <identifier> $end".to_string(),
                    found: format!("{} token(s)", tokens.len()),
                },
            ))
        }
    };

    let scope_type = ScopeType::from_bytes(scope_type.text).ok_or_else(|| {
        lex.error(
            scope_type.start,
            ParseErrorKind::UnknownScopeType(scope_type.lossy()),
        )
    })?;

    let id = decls.add_scope(parent, scope_type, identifier.lossy());
    debug!(
        "Scope {} {} ({:?})",
        scope_type.as_str(),
        decls.scope_path(id),
        id
    );
    Ok(id)
}

fn parse_var(lex: &mut Lexer<'_>, keyword: &Token<'_>) -> Result<Var, ParseError> {
    let tokens = lex.tokens_until_end("$var")?;
    let [var_type, size, id, reference, range @ ..] = tokens.as_slice() else {
        return Err(lex.error(
            keyword.start,
            ParseErrorKind::Expected {
                expected: "$var <type> <size> <identifier> <reference> $end".to_string(),
                found: format!("{} token(s)", tokens.len()),
            },
        ));
    };

    let var_type = VarType::from_bytes(var_type.text).ok_or_else(|| {
        lex.error(var_type.start, ParseErrorKind::UnknownVarType(var_type.lossy()))
    })?;
    let size = std::str::from_utf8(size.text)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|&s| s > 0)
        .ok_or_else(|| lex.error(size.start, ParseErrorKind::InvalidVarSize(size.lossy())))?;

    // `[7:0]` is usually one token but may be written `[7 : 0]`.
    let range = if range.is_empty() {
        None
    } else {
        Some(range.iter().map(Token::lossy).collect::<String>())
    };

    Ok(Var {
        var_type,
        size,
        id: id.lossy(),
        reference: reference.lossy(),
        range,
    })
}

/// Parse the header. Returns the declarations and the offset just past
/// `$enddefinitions $end`, where the body starts.
pub fn parse_declarations(input: &[u8]) -> Result<(Declarations, usize), ParseError> {
    let mut lex = Lexer::new(input, 0, ParsePhase::Declarations);
    let mut decls = Declarations::default();
    let mut stack = vec![ROOT_SCOPE];

    loop {
        let Some(token) = lex.next_token() else {
            if stack.len() > 1 {
                return Err(lex.error(
                    lex.pos(),
                    ParseErrorKind::UnbalancedScope {
                        open: stack.len() - 1,
                    },
                ));
            }
            warn!("Reached end of input without $enddefinitions");
            break;
        };

        match token.text {
            b"$comment" => decls.comments.push(lex.text_until_end("$comment")?),
            b"$date" => decls.date = Some(lex.text_until_end("$date")?),
            b"$version" => decls.version = Some(lex.text_until_end("$version")?),
            b"$timescale" => decls.timescale = Some(parse_timescale(&mut lex, &token)?),
            b"$scope" => {
                let parent = stack.last().copied().unwrap_or(ROOT_SCOPE);
                let id = parse_scope(&mut lex, &token, &mut decls, parent)?;
                stack.push(id);
            }
            b"$upscope" => {
                lex.expect_end("$upscope")?;
                if stack.len() <= 1 {
                    return Err(lex.error(token.start, ParseErrorKind::UnmatchedUpscope));
                }
                stack.pop();
            }
            b"$var" => {
                let var = parse_var(&mut lex, &token)?;
                let scope = stack.last().copied().unwrap_or(ROOT_SCOPE);
                debug!("Var {} {} {}", var.var_type.as_str(), var.id, var.reference);
                decls.add_var(scope, var);
            }
            b"$enddefinitions" => {
                lex.tokens_until_end("$enddefinitions")?;
                if stack.len() > 1 {
                    return Err(lex.error(
                        token.start,
                        ParseErrorKind::UnbalancedScope {
                            open: stack.len() - 1,
                        },
                    ));
                }
                break;
            }
            _ => {
                return Err(expected(
                    &lex,
                    "a declaration ($comment, $date, $version, $timescale, $scope, \
                     $upscope, $var or $enddefinitions)",
                    &token,
                ))
            }
        }
    }

    info!(
        "Parsed declarations: {} scopes, {} vars",
        decls.scopes.len() - 1,
        decls.num_vars()
    );
    Ok((decls, lex.pos()))
}

/// The identifier after a vector or real value, which is the next token.
fn value_identifier(lex: &mut Lexer<'_>) -> Result<String, ParseError> {
    match lex.next_token() {
        Some(t) => Ok(t.lossy()),
        None => Err(lex.error(lex.pos(), ParseErrorKind::MissingIdentifier)),
    }
}

fn invalid_value(lex: &Lexer<'_>, token: &Token<'_>) -> ParseError {
    lex.error(token.start, ParseErrorKind::InvalidValue(token.lossy()))
}

fn parse_real(lex: &Lexer<'_>, token: &Token<'_>) -> Result<f64, ParseError> {
    let literal = &token.text[1..];
    let value = std::str::from_utf8(literal)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| invalid_value(lex, token))?;

    let mantissa = literal
        .split(|&b| b == b'e' || b == b'E')
        .next()
        .unwrap_or_default();
    let mantissa_is_zero = mantissa.iter().all(|b| !matches!(b, b'1'..=b'9'));
    let is_inf_literal = mantissa.iter().any(|b| b.is_ascii_alphabetic());

    if (value.is_infinite() && !is_inf_literal) || (value == 0.0 && !mantissa_is_zero) {
        return Err(lex.error(
            token.start,
            ParseErrorKind::RealOutOfRange(token.lossy()),
        ));
    }
    Ok(value)
}

fn parse_sim_cmd(
    lex: &mut Lexer<'_>,
    token: Token<'_>,
    open_section: &mut Option<DumpSection>,
) -> Result<Option<SimCmd>, ParseError> {
    Ok(Some(match token.text[0] {
        b'#' => {
            let tick = std::str::from_utf8(&token.text[1..])
                .ok()
                .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| {
                    lex.error(token.start, ParseErrorKind::InvalidTick(token.lossy()))
                })?;
            SimCmd::Tick(tick)
        }
        b'$' => match token.text {
            b"$comment" => SimCmd::Comment(lex.text_until_end("$comment")?),
            b"$end" if open_section.is_some() => {
                *open_section = None;
                return Ok(None);
            }
            keyword => match DumpSection::from_keyword(keyword) {
                Some(section) if open_section.is_none() => {
                    *open_section = Some(section);
                    SimCmd::Dump(section)
                }
                _ => return Err(expected(lex, "a tick, value change or $comment", &token)),
            },
        },
        b'0' | b'1' | b'x' | b'X' | b'z' | b'Z' => {
            if token.text.len() < 2 {
                return Err(lex.error(token.end(), ParseErrorKind::MissingIdentifier));
            }
            let value =
                ScalarValue::from_char(token.text[0]).map_err(|_| invalid_value(lex, &token))?;
            SimCmd::Change(Change {
                value: Value::Scalar(value),
                id: String::from_utf8_lossy(&token.text[1..]).to_string(),
            })
        }
        b'b' | b'B' => {
            let id = value_identifier(lex)?;
            let value =
                BinaryNum::from_digits(&token.text[1..]).map_err(|_| invalid_value(lex, &token))?;
            SimCmd::Change(Change {
                value: Value::Binary(value),
                id,
            })
        }
        b'r' | b'R' => {
            // Read the identifier first so a bad value doesn't leave it to be
            // parsed as the next command.
            let id = value_identifier(lex)?;
            let value = parse_real(lex, &token)?;
            SimCmd::Change(Change {
                value: Value::Real(RealNum(value)),
                id,
            })
        }
        _ => return Err(expected(lex, "a tick, value change or $comment", &token)),
    }))
}

/// Parse the body starting at `offset`. Offsets in errors are relative to
/// the start of `input`, not `offset`.
pub fn parse_sim_cmds(
    input: &[u8],
    offset: usize,
    options: &ParseOptions,
) -> Result<ParsedSimCmds, ParseError> {
    let mut lex = Lexer::new(input, offset, ParsePhase::SimCmds);
    let mut parsed = ParsedSimCmds::default();
    let mut open_section = None;

    while let Some(token) = lex.next_token() {
        match parse_sim_cmd(&mut lex, token, &mut open_section) {
            Ok(Some(cmd)) => parsed.sim_cmds.push(cmd),
            Ok(None) => {}
            Err(e) if e.is_range_error() || options.recover_malformed_records => {
                warn!("Skipping record: {e}");
                parsed.diagnostics.push(e);
            }
            Err(e) => return Err(e),
        }
    }

    if let Some(section) = open_section {
        warn!("{} not closed by $end at end of input", section.keyword());
    }

    info!(
        "Parsed {} simulation commands ({} skipped)",
        parsed.sim_cmds.len(),
        parsed.diagnostics.len()
    );
    Ok(parsed)
}

/// Parse a whole file in one go.
pub fn parse_document(input: &[u8], options: &ParseOptions) -> Result<Document, ParseError> {
    let (declarations, offset) = parse_declarations(input)?;
    let ParsedSimCmds {
        sim_cmds,
        diagnostics,
    } = parse_sim_cmds(input, offset, options)?;
    Ok(Document {
        declarations,
        sim_cmds,
        diagnostics,
    })
}

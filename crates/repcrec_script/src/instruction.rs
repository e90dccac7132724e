//! Instruction grammar.
//!
//! ```text
//! begin(T1); beginRO(T2)
//! R(T1, x4)
//! W(T1, x4, 7)
//! end(T1)
//! fail(3); recover(3)
//! dump(); dump(x4); dump(3)
//! ```
//!
//! Several instructions may share a line separated by `;`. Everything after
//! `//` is a comment.

use crate::error::{ScriptError, ScriptResult};
use repcrec_core::{Value, VariableId};
use std::fmt;
use std::str::FromStr;

/// What a `dump` instruction reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpTarget {
    /// Every site.
    All,
    /// One variable at every site hosting it.
    Variable(VariableId),
    /// One site, by number.
    Site(u32),
}

/// A parsed instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// `begin(T)`
    Begin {
        /// Transaction label.
        txn: String,
    },
    /// `beginRO(T)`
    BeginReadOnly {
        /// Transaction label.
        txn: String,
    },
    /// `R(T, x)`
    Read {
        /// Transaction label.
        txn: String,
        /// Variable to read.
        variable: VariableId,
    },
    /// `W(T, x, v)`
    Write {
        /// Transaction label.
        txn: String,
        /// Variable to write.
        variable: VariableId,
        /// Value to write.
        value: Value,
    },
    /// `end(T)`
    End {
        /// Transaction label.
        txn: String,
    },
    /// `fail(site)`
    Fail {
        /// Site number.
        site: u32,
    },
    /// `recover(site)`
    Recover {
        /// Site number.
        site: u32,
    },
    /// `dump()`, `dump(xN)` or `dump(N)`
    Dump(DumpTarget),
}

impl Instruction {
    /// Returns the transaction label for transaction-scoped instructions.
    #[must_use]
    pub fn transaction(&self) -> Option<&str> {
        match self {
            Self::Begin { txn }
            | Self::BeginReadOnly { txn }
            | Self::Read { txn, .. }
            | Self::Write { txn, .. }
            | Self::End { txn } => Some(txn),
            Self::Fail { .. } | Self::Recover { .. } | Self::Dump(_) => None,
        }
    }

    /// Returns true for instructions that may be held back behind an earlier
    /// blocked instruction of the same transaction.
    #[must_use]
    pub fn is_queueable(&self) -> bool {
        matches!(self, Self::Read { .. } | Self::Write { .. } | Self::End { .. })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Begin { txn } => write!(f, "begin({txn})"),
            Self::BeginReadOnly { txn } => write!(f, "beginRO({txn})"),
            Self::Read { txn, variable } => write!(f, "R({txn}, {variable})"),
            Self::Write {
                txn,
                variable,
                value,
            } => write!(f, "W({txn}, {variable}, {value})"),
            Self::End { txn } => write!(f, "end({txn})"),
            Self::Fail { site } => write!(f, "fail({site})"),
            Self::Recover { site } => write!(f, "recover({site})"),
            Self::Dump(DumpTarget::All) => f.write_str("dump()"),
            Self::Dump(DumpTarget::Variable(variable)) => write!(f, "dump({variable})"),
            Self::Dump(DumpTarget::Site(site)) => write!(f, "dump({site})"),
        }
    }
}

impl FromStr for Instruction {
    type Err = ScriptError;

    fn from_str(text: &str) -> ScriptResult<Self> {
        let text = text.trim();
        let open = text
            .find('(')
            .ok_or_else(|| ScriptError::invalid(text, "missing `(`"))?;
        let inner = text[open + 1..]
            .strip_suffix(')')
            .ok_or_else(|| ScriptError::invalid(text, "missing closing `)`"))?;
        let name = text[..open].trim();
        let args: Vec<&str> = if inner.trim().is_empty() {
            Vec::new()
        } else {
            inner.split(',').map(str::trim).collect()
        };

        let arity = |n: usize| -> ScriptResult<()> {
            if args.len() == n {
                Ok(())
            } else {
                Err(ScriptError::invalid(
                    text,
                    format!("`{name}` takes {n} argument(s), got {}", args.len()),
                ))
            }
        };

        match name {
            "begin" => {
                arity(1)?;
                Ok(Self::Begin {
                    txn: parse_label(text, args[0])?,
                })
            }
            "beginRO" => {
                arity(1)?;
                Ok(Self::BeginReadOnly {
                    txn: parse_label(text, args[0])?,
                })
            }
            "R" => {
                arity(2)?;
                Ok(Self::Read {
                    txn: parse_label(text, args[0])?,
                    variable: parse_variable(text, args[1])?,
                })
            }
            "W" => {
                arity(3)?;
                let value = args[2]
                    .parse::<Value>()
                    .map_err(|e| ScriptError::invalid(text, format!("bad value: {e}")))?;
                Ok(Self::Write {
                    txn: parse_label(text, args[0])?,
                    variable: parse_variable(text, args[1])?,
                    value,
                })
            }
            "end" => {
                arity(1)?;
                Ok(Self::End {
                    txn: parse_label(text, args[0])?,
                })
            }
            "fail" => {
                arity(1)?;
                Ok(Self::Fail {
                    site: parse_site(text, args[0])?,
                })
            }
            "recover" => {
                arity(1)?;
                Ok(Self::Recover {
                    site: parse_site(text, args[0])?,
                })
            }
            "dump" => match args.as_slice() {
                [] => Ok(Self::Dump(DumpTarget::All)),
                [arg] if arg.starts_with('x') => {
                    Ok(Self::Dump(DumpTarget::Variable(parse_variable(text, arg)?)))
                }
                [arg] => Ok(Self::Dump(DumpTarget::Site(parse_site(text, arg)?))),
                _ => Err(ScriptError::invalid(text, "`dump` takes at most 1 argument")),
            },
            other => Err(ScriptError::invalid(
                text,
                format!("unknown operation `{other}`"),
            )),
        }
    }
}

/// Parses one script line into its instructions.
///
/// Returns an empty list for blank and comment-only lines. `line` is only
/// used to locate errors.
pub fn parse_line(text: &str, line: usize) -> ScriptResult<Vec<Instruction>> {
    let code = match text.find("//") {
        Some(pos) => &text[..pos],
        None => text,
    };
    code.split(';')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(|piece| piece.parse::<Instruction>().map_err(|e| e.at_line(line)))
        .collect()
}

fn parse_label(text: &str, arg: &str) -> ScriptResult<String> {
    let valid = !arg.is_empty() && arg.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(arg.to_string())
    } else {
        Err(ScriptError::invalid(
            text,
            format!("bad transaction label `{arg}`"),
        ))
    }
}

fn parse_variable(text: &str, arg: &str) -> ScriptResult<VariableId> {
    arg.strip_prefix('x')
        .and_then(|digits| digits.parse::<u32>().ok())
        .filter(|index| *index > 0)
        .map(VariableId::new)
        .ok_or_else(|| ScriptError::invalid(text, format!("bad variable `{arg}`")))
}

fn parse_site(text: &str, arg: &str) -> ScriptResult<u32> {
    arg.parse::<u32>()
        .map_err(|_| ScriptError::invalid(text, format!("bad site `{arg}`")))
}

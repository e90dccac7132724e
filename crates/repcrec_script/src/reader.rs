//! Line-oriented script reader.

use crate::error::{ScriptError, ScriptResult};
use crate::instruction::{parse_line, Instruction};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// The instructions found on one script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    /// 1-based line number.
    pub number: usize,
    /// Instructions in the order they appear.
    pub instructions: Vec<Instruction>,
}

/// Reads a script line by line, skipping blank and comment-only lines.
///
/// A syntax error is reported for its line and reading continues with the
/// next one; an I/O error ends the iteration.
#[derive(Debug)]
pub struct ScriptReader<R> {
    input: R,
    line: usize,
    buf: String,
    done: bool,
}

impl<R: BufRead> ScriptReader<R> {
    /// Wraps a buffered reader.
    pub fn new(input: R) -> Self {
        Self {
            input,
            line: 0,
            buf: String::new(),
            done: false,
        }
    }

    /// Returns the number of lines consumed so far.
    #[must_use]
    pub fn lines_read(&self) -> usize {
        self.line
    }
}

impl ScriptReader<BufReader<File>> {
    /// Opens a script file.
    pub fn open(path: impl AsRef<Path>) -> ScriptResult<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<'a> ScriptReader<&'a [u8]> {
    /// Reads a script held in memory.
    #[must_use]
    pub fn from_text(text: &'a str) -> Self {
        Self::new(text.as_bytes())
    }
}

impl<R: BufRead> Iterator for ScriptReader<R> {
    type Item = ScriptResult<ScriptLine>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            match self.input.read_line(&mut self.buf) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line += 1;
                    match parse_line(&self.buf, self.line) {
                        Ok(instructions) if instructions.is_empty() => continue,
                        Ok(instructions) => {
                            return Some(Ok(ScriptLine {
                                number: self.line,
                                instructions,
                            }))
                        }
                        Err(e) => return Some(Err(e)),
                    }
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(ScriptError::Io(e)));
                }
            }
        }
        None
    }
}

/// Parses a whole script, failing on the first bad line.
pub fn parse_script(text: &str) -> ScriptResult<Vec<Instruction>> {
    let mut instructions = Vec::new();
    for line in ScriptReader::from_text(text) {
        instructions.extend(line?.instructions);
    }
    Ok(instructions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SCRIPT: &str = "// Test 1\n\
        begin(T1)\n\
        \n\
        begin(T2); W(T1, x1, 101)\n\
        R(T2, x2) // seed\n\
        end(T1)\n";

    #[test]
    fn skips_blank_and_comment_lines() {
        let lines: Vec<ScriptLine> = ScriptReader::from_text(SCRIPT)
            .collect::<ScriptResult<_>>()
            .unwrap();
        let numbers: Vec<usize> = lines.iter().map(|l| l.number).collect();
        assert_eq!(numbers, vec![2, 4, 5, 6]);
        assert_eq!(lines[1].instructions.len(), 2);
    }

    #[test]
    fn continues_after_syntax_error() {
        let mut reader = ScriptReader::from_text("begin(T1)\nR(T1)\nend(T1)\n");
        assert!(reader.next().unwrap().is_ok());
        let err = reader.next().unwrap().unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { line: 2, .. }));
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().is_none());
        assert_eq!(reader.lines_read(), 3);
    }

    #[test]
    fn last_line_without_newline() {
        let all = parse_script("begin(T1)\nend(T1)").unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn parse_script_fails_on_bad_line() {
        assert!(parse_script("begin(T1)\nbogus\n").is_err());
    }

    #[test]
    fn open_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{SCRIPT}").unwrap();
        let reader = ScriptReader::open(file.path()).unwrap();
        assert_eq!(reader.count(), 4);
    }

    #[test]
    fn open_missing_file_is_io_error() {
        let err = ScriptReader::open("/nonexistent/script.txt").unwrap_err();
        assert!(matches!(err, ScriptError::Io(_)));
    }
}

//! Check command implementation.

use repcrec_script::ScriptReader;
use std::io::BufRead;
use std::path::Path;

/// Summary of a parsed script.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CheckSummary {
    /// Lines holding at least one instruction.
    pub lines: usize,
    /// Instructions parsed.
    pub instructions: usize,
    /// Rendered syntax errors.
    pub errors: Vec<String>,
}

/// Runs the check command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let summary = check(ScriptReader::open(path)?)?;
    for error in &summary.errors {
        println!("{error}");
    }
    if !summary.errors.is_empty() {
        let count = summary.errors.len();
        return Err(format!("{count} invalid line(s) in {}", path.display()).into());
    }
    println!(
        "{}: {} instructions on {} lines",
        path.display(),
        summary.instructions,
        summary.lines
    );
    Ok(())
}

/// Parses every line, collecting syntax errors.
pub fn check<R: BufRead>(
    reader: ScriptReader<R>,
) -> Result<CheckSummary, Box<dyn std::error::Error>> {
    let mut summary = CheckSummary::default();
    for line in reader {
        match line {
            Ok(line) => {
                summary.lines += 1;
                summary.instructions += line.instructions.len();
            }
            Err(e) if e.is_syntax() => summary.errors.push(e.to_string()),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(summary)
}

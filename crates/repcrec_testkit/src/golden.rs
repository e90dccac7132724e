//! Golden transcript utilities.
//!
//! A golden test runs a script and compares its output lines against a
//! checked-in `.golden` file. Set `UPDATE_GOLDEN=1` to rewrite the files
//! from the current output.

use repcrec_core::EngineConfig;
use repcrec_script::DriverConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// A golden test that compares output against expected files.
pub struct GoldenTest {
    name: String,
    golden_dir: PathBuf,
    update_mode: bool,
}

impl GoldenTest {
    /// Creates a new golden test.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the test (used for file naming)
    /// * `golden_dir` - Directory containing golden files
    pub fn new(name: impl Into<String>, golden_dir: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            golden_dir: golden_dir.as_ref().to_path_buf(),
            update_mode: std::env::var("UPDATE_GOLDEN").is_ok(),
        }
    }

    /// Creates a golden test using this crate's `golden/` directory.
    pub fn with_default_dir(name: impl Into<String>) -> Self {
        let golden_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("golden");
        Self::new(name, golden_dir)
    }

    /// Asserts that the given string matches the golden file.
    ///
    /// If `UPDATE_GOLDEN` environment variable is set, updates the golden file instead.
    pub fn assert_text(&self, actual: &str) {
        let path = self.file_path();

        if self.update_mode {
            self.update_golden_file(&path, actual);
            return;
        }

        if !path.exists() {
            panic!(
                "Golden file not found: {:?}\n\
                 Run with UPDATE_GOLDEN=1 to create it.\n\
                 Actual:\n{}",
                path, actual
            );
        }

        let expected = fs::read_to_string(&path).expect("Failed to read golden file");

        if actual != expected {
            panic!(
                "Golden test '{}' failed:\n\
                 --- Expected ---\n{}\n\
                 --- Actual ---\n{}\n\
                 Run with UPDATE_GOLDEN=1 to update.",
                self.name, expected, actual
            );
        }
    }

    /// Asserts that output lines match the golden file.
    pub fn assert_lines(&self, lines: &[String]) {
        let mut text = lines.join("\n");
        text.push('\n');
        self.assert_text(&text);
    }

    /// Runs a script and asserts its transcript matches the golden file.
    pub fn assert_script(&self, script: &str, engine: &EngineConfig, config: DriverConfig) {
        let lines = crate::fixtures::run_script_with(script, engine, config);
        self.assert_lines(&lines);
    }

    fn file_path(&self) -> PathBuf {
        self.golden_dir.join(format!("{}.golden", self.name))
    }

    fn update_golden_file(&self, path: &Path, data: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create golden directory");
        }
        fs::write(path, data).expect("Failed to write golden file");
        println!("Updated golden file: {:?}", path);
    }
}

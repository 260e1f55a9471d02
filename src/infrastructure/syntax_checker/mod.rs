//! Robot Framework syntax checks.
//!
//! Two checkers exist: a structural one that runs in-process, and a wrapper around
//! `robot --dryrun` for installations that ship Robot Framework.

use crate::domain::error::{AppError, Result};
use crate::domain::review::DryRunResult;
use crate::infrastructure::config::{CheckerMode, SyntaxCheckerSettings};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

/// An `Err` means the checker itself could not run; script problems are reported in the result.
#[async_trait]
pub trait SyntaxChecker {
    async fn check(&self, script: &str) -> Result<DryRunResult>;
}

pub fn checker_from_settings(settings: &SyntaxCheckerSettings) -> Arc<dyn SyntaxChecker + Send + Sync> {
    match settings.mode {
        CheckerMode::Builtin => Arc::new(RobotStructureChecker),
        CheckerMode::Robot => Arc::new(RobotCliChecker::new(
            settings.robot_command.clone(),
            settings.timeout_secs,
        )),
    }
}

const KNOWN_SECTIONS: &[&str] = &[
    "settings",
    "setting",
    "variables",
    "variable",
    "test cases",
    "test case",
    "tasks",
    "task",
    "keywords",
    "keyword",
    "comments",
    "comment",
];

pub struct RobotStructureChecker;

/// Lowercased name from the header's first cell. Data-driven headers carry column
/// names after it, separated like any other cells.
fn section_name(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if !trimmed.starts_with('*') {
        return None;
    }
    let first_cell = trimmed
        .split('\t')
        .next()
        .and_then(|cell| cell.split("  ").next())
        .unwrap_or(trimmed);
    let name = first_cell.trim_matches('*').trim();
    Some(name.to_ascii_lowercase())
}

fn found(flag: bool) -> &'static str {
    if flag {
        "Found"
    } else {
        "Not found"
    }
}

impl RobotStructureChecker {
    pub fn inspect(script: &str) -> DryRunResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if script.trim().is_empty() {
            return DryRunResult {
                success: false,
                output: "Syntax validation complete.\nScript is empty.".to_string(),
                errors: vec!["Script is empty".to_string()],
                warnings,
            };
        }

        let mut has_settings = false;
        let mut has_test_cases = false;
        let mut has_keywords = false;

        for (index, line) in script.lines().enumerate() {
            let line_no = index + 1;
            let stripped = line.trim();

            if let Some(name) = section_name(line) {
                match name.as_str() {
                    "settings" | "setting" => has_settings = true,
                    "test cases" | "test case" | "tasks" | "task" => has_test_cases = true,
                    "keywords" | "keyword" => has_keywords = true,
                    _ if KNOWN_SECTIONS.contains(&name.as_str()) => {}
                    _ => errors.push(format!(
                        "Line {}: Unknown section header '{}'",
                        line_no, stripped
                    )),
                }
                continue;
            }

            if stripped.starts_with('[') && !stripped.contains(']') {
                let preview: String = stripped.chars().take(30).collect();
                errors.push(format!("Line {}: Unclosed bracket in '{}...'", line_no, preview));
            }
        }

        if !has_test_cases {
            warnings.push("Missing *** Test Cases *** section".to_string());
        }

        DryRunResult {
            success: errors.is_empty(),
            output: format!(
                "Syntax validation complete.\nSettings section: {}\nTest Cases section: {}\nKeywords section: {}",
                found(has_settings),
                found(has_test_cases),
                found(has_keywords)
            ),
            errors,
            warnings,
        }
    }
}

#[async_trait]
impl SyntaxChecker for RobotStructureChecker {
    async fn check(&self, script: &str) -> Result<DryRunResult> {
        Ok(Self::inspect(script))
    }
}

/// Runs `robot --dryrun` against a temporary copy of the script.
pub struct RobotCliChecker {
    command: String,
    timeout: Duration,
}

impl RobotCliChecker {
    pub fn new(command: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            command: command.into(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl SyntaxChecker for RobotCliChecker {
    async fn check(&self, script: &str) -> Result<DryRunResult> {
        let path = std::env::temp_dir().join(format!("dryrun-{}.robot", Uuid::new_v4()));
        tokio::fs::write(&path, script)
            .await
            .map_err(|e| AppError::CheckerInvocation(format!("Cannot stage script: {}", e)))?;

        let run = Command::new(&self.command)
            .args(["--dryrun", "--output", "NONE", "--report", "NONE", "--log", "NONE"])
            .arg(&path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let outcome = tokio::time::timeout(self.timeout, run).await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            debug!(path = %path.display(), error = %e, "Failed to remove dry-run script");
        }

        let output = match outcome {
            Err(_) => {
                return Err(AppError::CheckerInvocation(format!(
                    "{} did not finish within {}s",
                    self.command,
                    self.timeout.as_secs()
                )))
            }
            Ok(Err(e)) => {
                warn!(command = %self.command, error = %e, "Failed to start syntax checker");
                return Err(AppError::CheckerInvocation(format!(
                    "Cannot run '{}': {}",
                    self.command, e
                )));
            }
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let mut result = parse_dryrun_output(&stdout, &stderr);
        result.success = output.status.success() && result.errors.is_empty();
        if !output.status.success() && result.errors.is_empty() {
            result.errors.push(format!(
                "{} exited with {}",
                self.command,
                output
                    .status
                    .code()
                    .map(|code| format!("status {}", code))
                    .unwrap_or_else(|| "a signal".to_string())
            ));
        }
        Ok(result)
    }
}

/// Collects `[ ERROR ]`/`[ WARN ]` lines and failed-test messages from a dry-run.
pub fn parse_dryrun_output(stdout: &str, stderr: &str) -> DryRunResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for line in stderr.lines().chain(stdout.lines()) {
        let trimmed = line.trim();
        if let Some(message) = trimmed.strip_prefix("[ ERROR ]") {
            errors.push(message.trim().to_string());
        } else if let Some(message) = trimmed.strip_prefix("[ WARN ]") {
            warnings.push(message.trim().to_string());
        }
    }

    let lines: Vec<&str> = stdout.lines().collect();
    for (index, line) in lines.iter().enumerate() {
        if !line.contains("| FAIL |") {
            continue;
        }
        let name = line.split('|').next().unwrap_or_default().trim();
        let detail = lines[index + 1..]
            .iter()
            .map(|next| next.trim())
            .find(|next| !next.is_empty())
            .filter(|next| !next.starts_with("---") && !next.starts_with("==="));
        match detail {
            Some(detail) => errors.push(format!("{}: {}", name, detail)),
            None => errors.push(format!("{}: FAIL", name)),
        }
    }

    DryRunResult {
        success: errors.is_empty(),
        output: format!("{}{}", stdout, stderr).trim().to_string(),
        errors,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "*** Settings ***\nLibrary    OperatingSystem\n\n*** Test Cases ***\nBoot\n    [Documentation]    boots\n    Log    ok\n";

    #[test]
    fn well_formed_script_passes() {
        let result = RobotStructureChecker::inspect(VALID);
        assert!(result.success);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
        assert!(result.output.contains("Settings section: Found"));
        assert!(result.output.contains("Keywords section: Not found"));
    }

    #[test]
    fn empty_script_is_an_error() {
        let result = RobotStructureChecker::inspect("   \n");
        assert!(!result.success);
        assert_eq!(result.errors, vec!["Script is empty".to_string()]);
    }

    #[test]
    fn unclosed_bracket_reports_line() {
        let script = "*** Test Cases ***\nBoot\n    [Documentation    boots\n";
        let result = RobotStructureChecker::inspect(script);
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Line 3: Unclosed bracket"));
    }

    #[test]
    fn unknown_header_and_missing_test_cases() {
        let script = "*** Keywords ***\nOpen Bus\n    No Operation\n*** Testcases Here ***\n";
        let result = RobotStructureChecker::inspect(script);
        assert!(result.errors[0].contains("Unknown section header"));
        assert_eq!(result.warnings, vec!["Missing *** Test Cases *** section".to_string()]);
    }

    #[test]
    fn data_driven_header_keeps_column_names_out_of_the_name() {
        let script = "*** Settings ***\nTest Template    Check Sum\n\n*** Test Cases ***    A    B\nAdds\n    1    2\n";
        let result = RobotStructureChecker::inspect(script);
        assert!(result.success, "{:?}", result.errors);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
        assert!(result.output.contains("Test Cases section: Found"));

        assert_eq!(section_name("*** Keywords ***\tArg").as_deref(), Some("keywords"));
        assert_eq!(section_name("***Variables***").as_deref(), Some("variables"));
    }

    #[test]
    fn dryrun_output_is_parsed() {
        let stdout = "==============================================================================\n\
Suite\n\
==============================================================================\n\
Boot                                                                  | FAIL |\n\
No keyword with name 'Open Bus' found.\n\
------------------------------------------------------------------------------\n";
        let stderr = "[ ERROR ] Error in file 'x.robot' on line 3: Unrecognized section header.\n[ WARN ] Deprecated syntax\n";
        let result = parse_dryrun_output(stdout, stderr);
        assert!(!result.success);
        assert_eq!(
            result.errors,
            vec![
                "Error in file 'x.robot' on line 3: Unrecognized section header.".to_string(),
                "Boot: No keyword with name 'Open Bus' found.".to_string(),
            ]
        );
        assert_eq!(result.warnings, vec!["Deprecated syntax".to_string()]);
    }

    #[tokio::test]
    async fn missing_executable_is_an_invocation_error() {
        let checker = RobotCliChecker::new("robot-binary-that-does-not-exist", 5);
        let err = checker.check(VALID).await.unwrap_err();
        assert!(matches!(err, AppError::CheckerInvocation(_)));
    }
}

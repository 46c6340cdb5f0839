//! Core type definitions for experiment records

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Git revision identifier (full or abbreviated sha, branch, tag)
pub type Rev = String;

/// Experiment name
pub type ExperimentName = String;

/// One experiment/revision row: column name to cell value
pub type ExperimentRecord = BTreeMap<String, CellValue>;

/// Text carrying display formatting alongside its content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichText {
    /// Plain textual content
    pub text: String,

    /// Display style (e.g. "bold green"), if any
    pub style: Option<String>,
}

impl RichText {
    /// Unstyled rich text
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: None,
        }
    }

    /// Styled rich text
    pub fn styled(text: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: Some(style.into()),
        }
    }

    /// The plain string without formatting
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for RichText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A single table cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Missing / fill value
    Null,

    /// Boolean
    Bool(bool),

    /// Integer
    Int(i64),

    /// Floating point number
    Float(f64),

    /// Plain string
    Str(String),

    /// Styled text as produced for display
    Rich(RichText),
}

impl CellValue {
    /// Returns true for styled/rich text values
    pub fn is_rich(&self) -> bool {
        matches!(self, CellValue::Rich(_))
    }

    /// Returns true for the null value
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Numeric view of the value, if it is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(v) => Some(*v as f64),
            CellValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Textual view of the value, if it is a string or rich text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Str(s) => Some(s),
            CellValue::Rich(r) => Some(r.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => f.write_str("-"),
            CellValue::Bool(v) => write!(f, "{}", v),
            CellValue::Int(v) => write!(f, "{}", v),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Str(v) => f.write_str(v),
            CellValue::Rich(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        CellValue::Bool(v)
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Int(v)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Float(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::Str(v.to_string())
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        CellValue::Str(v)
    }
}

impl From<RichText> for CellValue {
    fn from(v: RichText) -> Self {
        CellValue::Rich(v)
    }
}

/// How many first-parent commits to walk back from each baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitLimit {
    /// The last `n` commits (the baseline itself counts as one)
    Last(usize),

    /// The whole first-parent history
    All,
}

impl CommitLimit {
    /// Map a `git log -n` style count: negative means all history
    pub fn from_num(num: i64) -> Self {
        if num < 0 {
            CommitLimit::All
        } else {
            CommitLimit::Last(num as usize)
        }
    }

    /// Whether `walked` commits already satisfy the limit
    pub fn reached(&self, walked: usize) -> bool {
        match self {
            CommitLimit::Last(n) => walked >= *n,
            CommitLimit::All => false,
        }
    }
}

impl Default for CommitLimit {
    fn default() -> Self {
        CommitLimit::Last(1)
    }
}

/// Lifecycle state of an experiment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExperimentStatus {
    /// Waiting in the queue
    Queued,

    /// Currently executing
    Running,

    /// Finished successfully
    Success,

    /// Finished with an error
    Failed,
}

impl ExperimentStatus {
    /// Completed experiments never change again
    pub fn is_complete(&self) -> bool {
        matches!(self, ExperimentStatus::Success | ExperimentStatus::Failed)
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExperimentStatus::Queued => "Queued",
            ExperimentStatus::Running => "Running",
            ExperimentStatus::Success => "Success",
            ExperimentStatus::Failed => "Failed",
        };
        f.write_str(s)
    }
}

//! Terminal contract failures.
//!
//! A [`Violation`] is produced once per call, either when the input fails
//! its schema (never retried, empty ledger) or when output attempts are
//! exhausted or no longer retryable. It carries the full attempt ledger so
//! the failure can be reconstructed after the fact, and serializes to plain
//! JSON via [`Violation::to_value`].

use crate::diagnostic::Diagnostic;
use crate::ledger::AttemptRecord;
use crate::schema::{type_name, value_at, FieldError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Which side of the contract was broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractType {
    Input,
    Output,
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractType::Input => f.write_str("input"),
            ContractType::Output => f.write_str("output"),
        }
    }
}

/// A terminal contract failure for one guarded call.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    node_name: String,
    contract: ContractType,
    message: String,
    field_path: Option<String>,
    expected: Option<String>,
    received: Option<String>,
    received_type: String,
    suggestion: Option<String>,
    ledger: Vec<AttemptRecord>,
}

impl Violation {
    /// Input failed its schema. The producer never ran, so the ledger is empty.
    pub(crate) fn input(node_name: &str, error: &FieldError, input: &Value) -> Self {
        let diagnostic = Diagnostic::from_field_error(error, Some(input));
        let received_type = value_at(input, &error.path)
            .map(type_name)
            .unwrap_or("missing");
        Self::from_diagnostic(
            node_name,
            ContractType::Input,
            &diagnostic,
            received_type,
            Vec::new(),
        )
    }

    /// Output attempts ended in failure. `output` is the last value the
    /// producer returned, absent when the last attempt failed to decode;
    /// `path` holds the failing field's segments within it.
    pub(crate) fn output(
        node_name: &str,
        diagnostic: &Diagnostic,
        path: &[String],
        output: Option<&Value>,
        ledger: Vec<AttemptRecord>,
    ) -> Self {
        let received_type = match output {
            Some(value) => value_at(value, path).map(type_name).unwrap_or("missing"),
            None => "text",
        };
        Self::from_diagnostic(
            node_name,
            ContractType::Output,
            diagnostic,
            received_type,
            ledger,
        )
    }

    fn from_diagnostic(
        node_name: &str,
        contract: ContractType,
        diagnostic: &Diagnostic,
        received_type: &str,
        ledger: Vec<AttemptRecord>,
    ) -> Self {
        Self {
            node_name: node_name.to_string(),
            contract,
            message: diagnostic.message().to_string(),
            field_path: diagnostic.field().map(str::to_string),
            expected: diagnostic.expected().map(str::to_string),
            received: diagnostic
                .received()
                .or_else(|| diagnostic.raw_output())
                .map(str::to_string),
            received_type: received_type.to_string(),
            suggestion: diagnostic.suggestion().map(str::to_string),
            ledger,
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn contract(&self) -> ContractType {
        self.contract
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Dotted path of the failing field, `None` for the root value.
    pub fn field_path(&self) -> Option<&str> {
        self.field_path.as_deref()
    }

    pub fn expected(&self) -> Option<&str> {
        self.expected.as_deref()
    }

    pub fn received(&self) -> Option<&str> {
        self.received.as_deref()
    }

    pub fn received_type(&self) -> &str {
        &self.received_type
    }

    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }

    pub fn ledger(&self) -> &[AttemptRecord] {
        &self.ledger
    }

    /// Attempts made. An input violation counts as one conceptual attempt.
    pub fn total_attempts(&self) -> u32 {
        if self.ledger.is_empty() {
            1
        } else {
            self.ledger.len() as u32
        }
    }

    /// Plain wire form of this violation.
    pub fn report(&self) -> ViolationReport {
        ViolationReport {
            node_name: self.node_name.clone(),
            field_path: self.field_path.clone(),
            message: self.message.clone(),
            context: ViolationContext {
                contract_type: self.contract,
                expected: self.expected.clone(),
                received: self.received.clone(),
                received_type: self.received_type.clone(),
                suggestion: self.suggestion.clone(),
            },
            total_attempts: self.total_attempts(),
            ledger: self.ledger.clone(),
        }
    }

    /// Serialize to nested JSON objects/arrays of primitives.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self.report()).unwrap_or(Value::Null)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} contract violated in '{}': {}",
            self.contract, self.node_name, self.message
        )?;
        if let Some(ref field) = self.field_path {
            write!(f, " (field '{}')", field)?;
        }
        write!(f, " after {} attempt(s)", self.total_attempts())
    }
}

impl std::error::Error for Violation {}

impl Serialize for Violation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.report().serialize(serializer)
    }
}

impl From<ViolationReport> for Violation {
    fn from(report: ViolationReport) -> Self {
        Self {
            node_name: report.node_name,
            contract: report.context.contract_type,
            message: report.message,
            field_path: report.field_path,
            expected: report.context.expected,
            received: report.context.received,
            received_type: report.context.received_type,
            suggestion: report.context.suggestion,
            ledger: report.ledger,
        }
    }
}

/// Serialized form of a [`Violation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationReport {
    pub node_name: String,
    pub field_path: Option<String>,
    pub message: String,
    pub context: ViolationContext,
    pub total_attempts: u32,
    pub ledger: Vec<AttemptRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationContext {
    pub contract_type: ContractType,
    pub expected: Option<String>,
    pub received: Option<String>,
    pub received_type: String,
    pub suggestion: Option<String>,
}

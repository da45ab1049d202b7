//! Diagnostics
//!
//! Collects violations while a registry is being finalized. Every check runs
//! to completion so the caller sees all problems at once, not just the first.
//!
//! Composite keys are checked twice. A key that is not made of the via
//! entity's foreign keys fails declaration with
//! [`SchemaError::InvalidCompositeKey`](crate::error::SchemaError::InvalidCompositeKey).
//! A key column that no relationship through the entity links only shows up
//! once every side is known, so finalize reports it as
//! [`ViolationCode::InvalidCompositeKey`] (E011) inside the aggregate
//! `SchemaInconsistency`.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Violation Codes
// =============================================================================

/// Violation code for categorizing schema problems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationCode {
    // === Foreign keys ===
    /// Foreign key targets an entity that was never defined
    DanglingForeignKey,
    /// Foreign key targets a column that is not the target's single key column
    UnknownKeyColumn,
    /// Foreign key column is not an integer
    ForeignKeyTypeMismatch,

    // === Back-references ===
    /// `back_populates` names an attribute nobody declared
    MissingBackReference,
    /// Both sides exist but disagree on multiplicity, realization or names
    BackReferenceMismatch,
    /// Relationship declared on one entity only
    UnpairedRelationship,

    // === Realization ===
    /// No foreign key on the child realizes the relationship
    MissingForeignKey,
    /// Several foreign keys could realize the relationship
    AmbiguousForeignKey,
    /// One-to-one foreign key column is not unique
    NonUniqueOneToOne,
    /// Cascade declared on a side that does not own the children
    InvalidCascade,
    /// Composite key column of a join/association entity links nothing
    InvalidCompositeKey,

    // === Non-fatal ===
    /// Foreign keys form a cycle (table creation needs deferred constraints)
    ForeignKeyCycle,
    /// Dependent row survives deletion of the row it references
    UncascadedDependent,
}

impl ViolationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DanglingForeignKey => "E001",
            Self::UnknownKeyColumn => "E002",
            Self::ForeignKeyTypeMismatch => "E003",
            Self::MissingBackReference => "E004",
            Self::BackReferenceMismatch => "E005",
            Self::UnpairedRelationship => "E006",
            Self::MissingForeignKey => "E007",
            Self::AmbiguousForeignKey => "E008",
            Self::NonUniqueOneToOne => "E009",
            Self::InvalidCascade => "E010",
            Self::InvalidCompositeKey => "E011",
            Self::ForeignKeyCycle => "W001",
            Self::UncascadedDependent => "I001",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::ForeignKeyCycle => Severity::Warning,
            Self::UncascadedDependent => Severity::Info,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Violation severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Violation
// =============================================================================

/// A single problem found in a schema namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Entity the problem was found on
    pub entity: String,
    pub code: ViolationCode,
    pub message: String,
    /// Related entities, attributes or columns
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl Violation {
    pub fn new(entity: impl Into<String>, code: ViolationCode, message: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code,
            self.code.severity(),
            self.message,
            self.entity
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Violations Collection
// =============================================================================

/// Collection of violations from a finalize pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violations {
    items: Vec<Violation>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: Violation) {
        self.items.push(item);
    }

    /// Record a violation without extra context
    pub fn report(&mut self, entity: impl Into<String>, code: ViolationCode, message: impl Into<String>) {
        self.push(Violation::new(entity, code, message));
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| i.severity() == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Violation> {
        self.items.iter().filter(|i| i.severity() == Severity::Error)
    }

    /// Warnings and informational notices
    pub fn notices(&self) -> impl Iterator<Item = &Violation> {
        self.items.iter().filter(|i| i.severity() < Severity::Error)
    }

    /// True if any item carries the given code
    pub fn contains(&self, code: ViolationCode) -> bool {
        self.items.iter().any(|i| i.code == code)
    }

    pub fn with_code(&self, code: ViolationCode) -> impl Iterator<Item = &Violation> {
        self.items.iter().filter(move |i| i.code == code)
    }

    pub fn all(&self) -> &[Violation] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn notice_count(&self) -> usize {
        self.notices().count()
    }

    /// Split into (errors, notices)
    pub fn partition(self) -> (Violations, Violations) {
        let (errors, notices) = self
            .items
            .into_iter()
            .partition(|i| i.severity() == Severity::Error);
        (Violations { items: errors }, Violations { items: notices })
    }

    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in &self.items {
            output.push_str(&format!("{}\n", item));
        }

        if self.has_errors() {
            output.push_str(&format!(
                "\n{} error(s), {} notice(s)\n",
                self.error_count(),
                self.notice_count()
            ));
        } else if !self.is_empty() {
            output.push_str(&format!("\n{} notice(s)\n", self.notice_count()));
        }

        output
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl IntoIterator for Violations {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Violations {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

//! Stable, searchable diagnostic code registry.
//!
//! Ranges:
//! - `Q0001`  general syntax errors
//! - `Q01xx`  schema validation
//! - `Q02xx`  safety checks
//! - `Q03xx`  classification / access control
//! - `Q04xx`  cost estimation
//! - `Q05xx`  data warnings
//! - `Q06xx`  enrichment (info-level)
//!
//! New codes must take unused numbers in the matching band; existing numbers
//! are never reassigned.

use std::fmt;

/// A stable `Q<nnnn>` diagnostic code.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DiagnosticCode(pub u16);

impl fmt::Display for DiagnosticCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Q{:04}", self.0)
  }
}

impl fmt::Debug for DiagnosticCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{self}")
  }
}

impl serde::Serialize for DiagnosticCode {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.collect_str(self)
  }
}

// this module re-exports a `Code` alias so call sites read `codes::SYNTAX_ERROR`
// without repeating `DiagnosticCode` at every use.
pub use DiagnosticCode as Code;

// General
pub const SYNTAX_ERROR: Code = Code(1);

// Schema validation (Q01xx)
pub const TABLE_NOT_FOUND: Code = Code(101);
pub const COLUMN_NOT_FOUND: Code = Code(102);
pub const AMBIGUOUS_COLUMN: Code = Code(103);

// Safety checks (Q02xx)
pub const DELETE_WITHOUT_WHERE: Code = Code(201);
pub const MULTIPLE_STATEMENTS: Code = Code(202);
pub const UPDATE_WITHOUT_WHERE: Code = Code(203);
pub const CROSS_JOIN_NO_CONDITION: Code = Code(204);
pub const CONSTANT_CONDITION: Code = Code(205);
pub const DANGEROUS_FUNCTION: Code = Code(206);

// Classification / access control (Q03xx)
pub const WRITE_BLOCKED: Code = Code(301);
pub const DDL_BLOCKED: Code = Code(302);
pub const ADMIN_BLOCKED: Code = Code(303);
pub const UNKNOWN_STATEMENT_BLOCKED: Code = Code(304);

// Cost estimation (Q04xx)
pub const COST_OVER_THRESHOLD: Code = Code(401);
pub const FULL_TABLE_SCAN: Code = Code(402);

// Data warnings (Q05xx)
pub const VALUE_NOT_IN_COLUMN: Code = Code(501);
pub const TYPE_MISMATCH: Code = Code(502);

// Enrichment (Q06xx)
pub const LIMIT_INJECTED: Code = Code(601);

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn formats_as_q_nnnn() {
    assert_eq!(SYNTAX_ERROR.to_string(), "Q0001");
    assert_eq!(DELETE_WITHOUT_WHERE.to_string(), "Q0201");
    assert_eq!(ADMIN_BLOCKED.to_string(), "Q0303");
    assert_eq!(LIMIT_INJECTED.to_string(), "Q0601");
  }

  #[test]
  fn codes_are_ordered_by_value() {
    assert!(SYNTAX_ERROR < DELETE_WITHOUT_WHERE);
    assert!(DELETE_WITHOUT_WHERE < WRITE_BLOCKED);
  }
}

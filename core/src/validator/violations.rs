use serde::{Deserialize, Serialize};
use std::fmt;

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    SHAPE_MISMATCH,
    MALFORMED_SECTION,
    MISSING_TYPE,
    UNEXPECTED_TYPE,
    EMPTY_CONTENT,
    EMPTY_TITLE,
    DUPLICATE_TYPE,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Offending type name as received (may not be one of the seven).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl Violation {
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            section_type: None,
            field: None,
            message: message.into(),
        }
    }

    pub fn for_type(mut self, section_type: impl Into<String>) -> Self {
        self.section_type = Some(section_type.into());
        self
    }

    pub fn on_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(t) = &self.section_type {
            write!(f, " [{}]", t)?;
        }
        if let Some(field) = &self.field {
            write!(f, " .{}", field)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Every violation found in one validation pass, in rule order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViolationList {
    pub violations: Vec<Violation>,
}

impl ViolationList {
    pub fn push(&mut self, v: Violation) {
        self.violations.push(v);
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter()
    }

    pub fn is_shape_mismatch(&self) -> bool {
        self.violations
            .iter()
            .any(|v| v.kind == ViolationKind::SHAPE_MISMATCH)
    }

    pub fn contains(&self, kind: ViolationKind, section_type: &str) -> bool {
        self.violations
            .iter()
            .any(|v| v.kind == kind && v.section_type.as_deref() == Some(section_type))
    }

    pub fn kinds(&self) -> Vec<ViolationKind> {
        self.violations.iter().map(|v| v.kind).collect()
    }
}

impl fmt::Display for ViolationList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.violations.iter().map(|v| v.to_string()).collect();
        f.write_str(&parts.join("; "))
    }
}

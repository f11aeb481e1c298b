//! Combinator control behavior: decider conditions and arithmetic
//! operations over signals.
//!
//! Comparators are normalized to a canonical symbol set on every parse:
//! the two-character ASCII spellings `>=`, `<=`, `!=` and their unicode
//! equivalents all collapse to `≥`, `≤`, `≠`. Operands are polymorphic
//! over constants and signal references.

use serde::{Deserialize, Serialize};

use crate::error::EntityError;
use crate::signal::SignalId;

// ---------------------------------------------------------------------------
// Comparator
// ---------------------------------------------------------------------------

/// Comparison operator for decider conditions. Serialized as the canonical
/// symbol (`>`, `<`, `=`, `≥`, `≤`, `≠`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Comparator {
    Greater,
    Less,
    Equal,
    GreaterOrEqual,
    LessOrEqual,
    NotEqual,
}

impl Comparator {
    /// Parse a comparator symbol, accepting both ASCII digraphs and the
    /// canonical unicode forms.
    pub fn parse(symbol: &str) -> Result<Self, EntityError> {
        match symbol {
            ">" => Ok(Comparator::Greater),
            "<" => Ok(Comparator::Less),
            "=" | "==" => Ok(Comparator::Equal),
            ">=" | "≥" => Ok(Comparator::GreaterOrEqual),
            "<=" | "≤" => Ok(Comparator::LessOrEqual),
            "!=" | "≠" => Ok(Comparator::NotEqual),
            other => Err(EntityError::UnknownComparator(other.to_string())),
        }
    }

    /// The canonical symbol emitted in serialized output.
    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Greater => ">",
            Comparator::Less => "<",
            Comparator::Equal => "=",
            Comparator::GreaterOrEqual => "≥",
            Comparator::LessOrEqual => "≤",
            Comparator::NotEqual => "≠",
        }
    }
}

impl From<Comparator> for String {
    fn from(c: Comparator) -> String {
        c.symbol().to_string()
    }
}

impl TryFrom<String> for Comparator {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Comparator::parse(&value).map_err(|e| e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Arithmetic operator
// ---------------------------------------------------------------------------

/// Operator for arithmetic conditions. Serialized as the game's symbol set;
/// the word operators are canonically uppercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ArithmeticOp {
    Multiply,
    Divide,
    Add,
    Subtract,
    Modulo,
    Exponent,
    LeftShift,
    RightShift,
    And,
    Or,
    Xor,
}

impl ArithmeticOp {
    pub fn parse(symbol: &str) -> Result<Self, EntityError> {
        match symbol {
            "*" => Ok(ArithmeticOp::Multiply),
            "/" => Ok(ArithmeticOp::Divide),
            "+" => Ok(ArithmeticOp::Add),
            "-" => Ok(ArithmeticOp::Subtract),
            "%" => Ok(ArithmeticOp::Modulo),
            "^" => Ok(ArithmeticOp::Exponent),
            "<<" => Ok(ArithmeticOp::LeftShift),
            ">>" => Ok(ArithmeticOp::RightShift),
            "AND" | "and" => Ok(ArithmeticOp::And),
            "OR" | "or" => Ok(ArithmeticOp::Or),
            "XOR" | "xor" => Ok(ArithmeticOp::Xor),
            other => Err(EntityError::UnknownOperator(other.to_string())),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Modulo => "%",
            ArithmeticOp::Exponent => "^",
            ArithmeticOp::LeftShift => "<<",
            ArithmeticOp::RightShift => ">>",
            ArithmeticOp::And => "AND",
            ArithmeticOp::Or => "OR",
            ArithmeticOp::Xor => "XOR",
        }
    }
}

impl From<ArithmeticOp> for String {
    fn from(op: ArithmeticOp) -> String {
        op.symbol().to_string()
    }
}

impl TryFrom<String> for ArithmeticOp {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ArithmeticOp::parse(&value).map_err(|e| e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Operand
// ---------------------------------------------------------------------------

/// An operand of a condition: a constant integer or a signal reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Constant(i32),
    Signal(SignalId),
}

impl Operand {
    /// Resolve a bare signal name into a signal operand.
    pub fn signal(
        data: &fabricator_data::GameData,
        name: &str,
    ) -> Result<Self, EntityError> {
        Ok(Operand::Signal(SignalId::resolve(data, name)?))
    }
}

impl From<i32> for Operand {
    fn from(v: i32) -> Self {
        Operand::Constant(v)
    }
}

impl From<SignalId> for Operand {
    fn from(s: SignalId) -> Self {
        Operand::Signal(s)
    }
}

// ---------------------------------------------------------------------------
// Decider condition
// ---------------------------------------------------------------------------

/// The `decider_conditions` block of a decider combinator. Each operand is
/// stored in exactly one of the signal/constant field pairs; fields at
/// `None` are omitted from serialized output.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeciderCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_signal: Option<SignalId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_constant: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparator: Option<Comparator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_signal: Option<SignalId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_constant: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_signal: Option<SignalId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_count_from_input: Option<bool>,
}

impl DeciderCondition {
    pub fn is_empty(&self) -> bool {
        self.first_signal.is_none()
            && self.first_constant.is_none()
            && self.comparator.is_none()
            && self.second_signal.is_none()
            && self.second_constant.is_none()
            && self.output_signal.is_none()
            && self.copy_count_from_input.is_none()
    }

    /// Store an operand into a signal/constant field pair.
    pub(crate) fn set_first(&mut self, operand: Option<Operand>) {
        match operand {
            Some(Operand::Signal(s)) => {
                self.first_signal = Some(s);
                self.first_constant = None;
            }
            Some(Operand::Constant(c)) => {
                self.first_constant = Some(c);
                self.first_signal = None;
            }
            None => {
                self.first_signal = None;
                self.first_constant = None;
            }
        }
    }

    pub(crate) fn set_second(&mut self, operand: Option<Operand>) {
        match operand {
            Some(Operand::Signal(s)) => {
                self.second_signal = Some(s);
                self.second_constant = None;
            }
            Some(Operand::Constant(c)) => {
                self.second_constant = Some(c);
                self.second_signal = None;
            }
            None => {
                self.second_signal = None;
                self.second_constant = None;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Arithmetic condition
// ---------------------------------------------------------------------------

/// The `arithmetic_conditions` block of an arithmetic combinator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArithmeticCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_signal: Option<SignalId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_constant: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<ArithmeticOp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_signal: Option<SignalId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_constant: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_signal: Option<SignalId>,
}

impl ArithmeticCondition {
    pub fn is_empty(&self) -> bool {
        self.first_signal.is_none()
            && self.first_constant.is_none()
            && self.operation.is_none()
            && self.second_signal.is_none()
            && self.second_constant.is_none()
            && self.output_signal.is_none()
    }

    pub(crate) fn set_first(&mut self, operand: Option<Operand>) {
        match operand {
            Some(Operand::Signal(s)) => {
                self.first_signal = Some(s);
                self.first_constant = None;
            }
            Some(Operand::Constant(c)) => {
                self.first_constant = Some(c);
                self.first_signal = None;
            }
            None => {
                self.first_signal = None;
                self.first_constant = None;
            }
        }
    }

    pub(crate) fn set_second(&mut self, operand: Option<Operand>) {
        match operand {
            Some(Operand::Signal(s)) => {
                self.second_signal = Some(s);
                self.second_constant = None;
            }
            Some(Operand::Constant(c)) => {
                self.second_constant = Some(c);
                self.second_signal = None;
            }
            None => {
                self.second_signal = None;
                self.second_constant = None;
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_and_unicode_comparators_normalize_identically() {
        assert_eq!(
            Comparator::parse(">=").unwrap(),
            Comparator::parse("≥").unwrap()
        );
        assert_eq!(
            Comparator::parse("<=").unwrap(),
            Comparator::parse("≤").unwrap()
        );
        assert_eq!(
            Comparator::parse("!=").unwrap(),
            Comparator::parse("≠").unwrap()
        );
        assert_eq!(Comparator::parse(">=").unwrap().symbol(), "≥");
        assert_eq!(Comparator::parse("<=").unwrap().symbol(), "≤");
    }

    #[test]
    fn unknown_comparator_is_fatal() {
        assert!(matches!(
            Comparator::parse("incorrect"),
            Err(EntityError::UnknownComparator(_))
        ));
    }

    #[test]
    fn comparator_serde_uses_canonical_symbol() {
        let json = serde_json::to_string(&Comparator::GreaterOrEqual).unwrap();
        assert_eq!(json, "\"≥\"");
        // Both spellings deserialize.
        let a: Comparator = serde_json::from_str("\">=\"").unwrap();
        let b: Comparator = serde_json::from_str("\"≥\"").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn arithmetic_ops_parse_and_canonicalize() {
        assert_eq!(ArithmeticOp::parse("and").unwrap().symbol(), "AND");
        assert_eq!(ArithmeticOp::parse("<<").unwrap(), ArithmeticOp::LeftShift);
        assert!(matches!(
            ArithmeticOp::parse("incorrect"),
            Err(EntityError::UnknownOperator(_))
        ));
    }

    #[test]
    fn empty_condition_serializes_to_empty_object() {
        let cond = DeciderCondition::default();
        assert!(cond.is_empty());
        assert_eq!(serde_json::to_string(&cond).unwrap(), "{}");
    }

    #[test]
    fn operand_assignment_is_exclusive() {
        let mut cond = DeciderCondition::default();
        cond.set_first(Some(Operand::Constant(10)));
        assert_eq!(cond.first_constant, Some(10));
        cond.set_first(Some(Operand::Signal(SignalId::new(
            "signal-A",
            fabricator_data::SignalKind::Virtual,
        ))));
        // Switching to a signal clears the constant slot.
        assert_eq!(cond.first_constant, None);
        assert!(cond.first_signal.is_some());
    }

    #[test]
    fn condition_fields_omitted_when_none() {
        let mut cond = DeciderCondition::default();
        cond.set_first(Some(Operand::Constant(10)));
        cond.set_second(Some(Operand::Constant(10)));
        let json = serde_json::to_value(&cond).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"first_constant": 10, "second_constant": 10})
        );
    }
}

//! Tagged runtime values.
//!
//! Aura is dynamically typed: every variable slot, event payload entry, and
//! snapshot cell holds a [`Value`]. There is a single number type backed by
//! `f64`; whole numbers render without a decimal point so `print` output
//! matches what a beginner wrote.

use std::fmt;

/// A single Aura runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Str(String),
    Bool(bool),
    List(Vec<Value>),
    Null,
}

impl Value {
    /// Human-readable type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Str(_) => "text",
            Value::Bool(_) => "boolean",
            Value::List(_) => "list",
            Value::Null => "nothing",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness for `if` conditions: zero, empty text, empty lists, `false`,
    /// and `nothing` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::List(items) => !items.is_empty(),
            Value::Null => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    // Quote text inside lists so `[a, b]` and `["a", "b"]`
                    // stay distinguishable.
                    match item {
                        Value::Str(s) => write!(f, "\"{}\"", s)?,
                        other => write!(f, "{}", other)?,
                    }
                }
                write!(f, "]")
            }
            Value::Null => write!(f, "nothing"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_numbers_render_without_decimal() {
        assert_eq!(Value::Number(5.0).to_string(), "5");
        assert_eq!(Value::Number(-3.0).to_string(), "-3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Number(0.0).to_string(), "0");
    }

    #[test]
    fn test_list_display_quotes_text() {
        let list = Value::List(vec![
            Value::Number(1.0),
            Value::Str("a".to_string()),
            Value::Bool(true),
            Value::Null,
        ]);
        assert_eq!(list.to_string(), "[1, \"a\", true, nothing]");
    }

    #[test]
    fn test_null_renders_as_nothing() {
        assert_eq!(Value::Null.to_string(), "nothing");
        assert_eq!(Value::Null.type_name(), "nothing");
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::Number(1.0).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(Value::Str("x".to_string()).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::List(vec![Value::Null]).is_truthy());
        assert!(!Value::List(Vec::new()).is_truthy());
        assert!(!Value::Null.is_truthy());
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::Number(4.0).as_number(), Some(4.0));
        assert_eq!(Value::Str("hi".to_string()).as_str(), Some("hi"));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Number(4.0).as_str(), None);
        assert!(Value::Null.is_null());
    }
}

//! Runtime values that derived instances operate on.

use std::fmt;

/// A dynamically shaped value.
///
/// Product instances are `Record`s named after their constructor. A sum
/// instance is the `Record` of whichever variant it is, so variant
/// membership is a name comparison. Singletons are zero-field records.
/// Variadic fields are spread into the record's tail.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Record { name: String, fields: Vec<Value> },
}

impl Value {
    pub fn record(name: impl Into<String>, fields: Vec<Value>) -> Value {
        Value::Record {
            name: name.into(),
            fields,
        }
    }

    pub fn str(s: impl Into<String>) -> Value {
        Value::Str(s.into())
    }

    /// Constructor name of a record.
    pub fn record_name(&self) -> Option<&str> {
        match self {
            Value::Record { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Record { name, fields } => {
                write!(f, "{}(", name)?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, ")")
            }
        }
    }
}

// Bind values
//
// Parameters collected by the query builder, kept apart from raw SQL
// fragments until the statement is executed.

/// A value bound to a `{}` placeholder of a clause.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    String(String),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    /// Binary data stored as Vec<u8>
    Binary(Vec<u8>),
    /// SQL NULL
    Null,
}

impl BindValue {
    /// Get a debug representation
    pub fn debug(&self) -> String {
        match self {
            BindValue::String(s) => format!("String(\"{}\")", s),
            BindValue::I16(i) => format!("i16({})", i),
            BindValue::I32(i) => format!("i32({})", i),
            BindValue::I64(i) => format!("i64({})", i),
            BindValue::F32(f) => format!("f32({})", f),
            BindValue::F64(f) => format!("f64({})", f),
            BindValue::Bool(b) => format!("bool({})", b),
            BindValue::Binary(bytes) => format!("Binary({} bytes)", bytes.len()),
            BindValue::Null => "NULL".to_string(),
        }
    }
}

/// Trait for types that can be passed as clause parameters.
///
/// Implement this trait for custom types to use them in `where_` clauses.
///
/// # Example
///
/// ```ignore
/// use sqlx_struct_aggregates::{BindProxy, BindValue};
///
/// impl BindProxy for Status {
///     fn bind_value(&self) -> BindValue {
///         BindValue::String(self.as_str().to_string())
///     }
/// }
/// ```
pub trait BindProxy {
    fn bind_value(&self) -> BindValue;
}

impl BindProxy for str {
    fn bind_value(&self) -> BindValue {
        BindValue::String(self.to_string())
    }
}

impl BindProxy for &str {
    fn bind_value(&self) -> BindValue {
        BindValue::String(self.to_string())
    }
}

impl BindProxy for String {
    fn bind_value(&self) -> BindValue {
        BindValue::String(self.clone())
    }
}

impl BindProxy for i16 {
    fn bind_value(&self) -> BindValue {
        BindValue::I16(*self)
    }
}

impl BindProxy for i32 {
    fn bind_value(&self) -> BindValue {
        BindValue::I32(*self)
    }
}

impl BindProxy for i64 {
    fn bind_value(&self) -> BindValue {
        BindValue::I64(*self)
    }
}

impl BindProxy for f32 {
    fn bind_value(&self) -> BindValue {
        BindValue::F32(*self)
    }
}

impl BindProxy for f64 {
    fn bind_value(&self) -> BindValue {
        BindValue::F64(*self)
    }
}

impl BindProxy for bool {
    fn bind_value(&self) -> BindValue {
        BindValue::Bool(*self)
    }
}

impl BindProxy for Vec<u8> {
    fn bind_value(&self) -> BindValue {
        BindValue::Binary(self.clone())
    }
}

impl<T: BindProxy> BindProxy for Option<T> {
    fn bind_value(&self) -> BindValue {
        match self {
            Some(v) => v.bind_value(),
            None => BindValue::Null,
        }
    }
}

impl BindProxy for BindValue {
    fn bind_value(&self) -> BindValue {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_conversions() {
        assert_eq!("active".bind_value(), BindValue::String("active".to_string()));
        assert_eq!(10i32.bind_value(), BindValue::I32(10));
        assert_eq!(10i64.bind_value(), BindValue::I64(10));
        assert_eq!(true.bind_value(), BindValue::Bool(true));
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Some(5i64).bind_value(), BindValue::I64(5));
        assert_eq!(None::<i64>.bind_value(), BindValue::Null);
    }

    #[test]
    fn test_debug_representation() {
        assert_eq!(BindValue::String("a".to_string()).debug(), "String(\"a\")");
        assert_eq!(BindValue::Binary(vec![1, 2, 3]).debug(), "Binary(3 bytes)");
        assert_eq!(BindValue::Null.debug(), "NULL");
    }
}

use core::fmt;

/// A value bound to a positional statement parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Param<'a> {
    /// Bound as text.
    Text(&'a str),
    /// Bound as a 64-bit integer.
    Int(i64),
}

impl<'a> From<&'a str> for Param<'a> {
    fn from(value: &'a str) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Param<'_> {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for Param<'_> {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

/// A column value read back from a query.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// An integer column.
    Int(i64),
    /// A text column.
    Text(String),
    /// Anything else (floats, blobs); only kept for diagnostics.
    Other(String),
}

impl Value {
    /// Reads the value as a 64-bit integer.
    ///
    /// Integer columns are returned as-is. Text columns holding a decimal
    /// number are parsed, since older tables store the next id as `VARCHAR`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Null | Self::Other(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "'{s}'"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

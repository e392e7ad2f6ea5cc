//! The attribute database interface (DBMI) as seen from the adapter.

use crate::errors::Result;

/// SQL column types reported by `describe_table`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Character,
    SmallInt,
    Integer,
    Serial,
    Real,
    DoublePrecision,
    Decimal,
    Numeric,
    Date,
    Time,
    Timestamp,
    Interval,
    Text,
    /// A type code this crate does not know.
    Other(i32),
}

/// C-level value type a SQL type is read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CType {
    Int,
    Double,
    String,
    DateTime,
}

impl SqlType {
    pub fn c_type(self) -> Option<CType> {
        match self {
            SqlType::SmallInt | SqlType::Integer | SqlType::Serial => Some(CType::Int),
            SqlType::Real | SqlType::DoublePrecision | SqlType::Decimal | SqlType::Numeric => {
                Some(CType::Double)
            }
            SqlType::Character | SqlType::Text => Some(CType::String),
            SqlType::Date | SqlType::Time | SqlType::Timestamp | SqlType::Interval => {
                Some(CType::DateTime)
            }
            SqlType::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbColumn {
    pub name: String,
    pub sql_type: SqlType,
}

impl DbColumn {
    pub fn new(name: &str, sql_type: SqlType) -> Self {
        DbColumn {
            name: name.to_string(),
            sql_type,
        }
    }
}

/// One column value of a fetched row.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Int(i32),
    Double(f64),
    String(String),
    /// Date/time values come back already converted to text.
    DateTime(String),
}

impl DbValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DbValue::Null)
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            DbValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    Sequential,
    Scroll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDirection {
    First,
    Next,
    Previous,
    Current,
    Last,
}

/// Starts database drivers.
pub trait DbBackend {
    fn start_driver(&self, driver: &str, database: &str) -> Result<Box<dyn DbDriver>>;
}

/// A started driver with an open database.
pub trait DbDriver {
    fn describe_table(&mut self, table: &str) -> Result<Vec<DbColumn>>;

    fn open_select_cursor(&mut self, sql: &str, mode: CursorMode) -> Result<Box<dyn DbCursor>>;

    /// Closes the database and stops the driver. Must be safe to call twice.
    fn shutdown(&mut self) -> Result<()>;
}

/// A select cursor. Fetching moves the cursor, then returns the row it points
/// at, or `None` when the move left the result set.
pub trait DbCursor {
    fn columns(&self) -> &[DbColumn];

    fn num_rows(&self) -> usize;

    fn fetch(&mut self, direction: FetchDirection) -> Result<Option<Vec<DbValue>>>;

    /// Must be safe to call twice.
    fn close(&mut self);
}

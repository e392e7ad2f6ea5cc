//! Access to the attribute table linked to a layer.
//!
//! Drivers and cursors of the attribute database are owned through guards
//! that release them when dropped, so every early return gives them back.

use std::rc::Rc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, warn};

use crate::config::Environment;
use crate::errors::*;
use crate::store::db::{
    CursorMode, DbBackend, DbColumn, DbCursor, DbDriver, DbValue, FetchDirection,
};
use crate::store::vector::FieldLink;
use crate::vector::{Feature, FieldDefn, FieldType, FieldValue};

/// A started database driver. Shut down on drop.
pub(crate) struct DriverSession {
    driver: Box<dyn DbDriver>,
    name: String,
}

impl DriverSession {
    pub fn start(backend: &dyn DbBackend, env: &Environment, link: &FieldLink) -> Result<Self> {
        let database = env.expand(&link.database);
        debug!("starting driver '{}' on '{database}'", link.driver);
        let driver = backend
            .start_driver(&link.driver, &database)
            .map_err(|e| GrassError::DriverStartFailed {
                driver: link.driver.clone(),
                database,
                msg: e.to_string(),
            })?;
        Ok(DriverSession {
            driver,
            name: link.driver.clone(),
        })
    }

    pub fn describe_table(&mut self, table: &str) -> Result<Vec<DbColumn>> {
        self.driver.describe_table(table)
    }

    pub fn open_cursor(&mut self, sql: &str, mode: CursorMode) -> Result<CursorHandle> {
        debug!("query: {sql}");
        let cursor = self.driver.open_select_cursor(sql, mode)?;
        debug!("num rows = {}", cursor.num_rows());
        Ok(CursorHandle(cursor))
    }
}

impl Drop for DriverSession {
    fn drop(&mut self) {
        if let Err(e) = self.driver.shutdown() {
            warn!("cannot shut down driver '{}': {e}", self.name);
        }
    }
}

/// An open select cursor. Closed on drop.
pub(crate) struct CursorHandle(Box<dyn DbCursor>);

impl CursorHandle {
    pub fn fetch(&mut self, direction: FetchDirection) -> Result<Option<Vec<DbValue>>> {
        self.0.fetch(direction)
    }
}

impl Drop for CursorHandle {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// A link whose key column was found in the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttributeLink {
    pub link: FieldLink,
    /// Position of the key column in the table, and so in every fetched row.
    pub key_index: usize,
}

impl AttributeLink {
    pub fn select_sql(&self, filter: Option<&str>) -> String {
        let mut sql = format!("SELECT * FROM {} ", self.link.table);
        if let Some(filter) = filter {
            sql.push_str(&format!("WHERE {filter} "));
        }
        sql.push_str(&format!("ORDER BY {}", self.link.key));
        sql
    }

    pub fn key_sql(&self, cat: i32) -> String {
        format!(
            "SELECT * FROM {} WHERE {} = {cat}",
            self.link.table, self.link.key
        )
    }

    /// Category of a fetched row.
    pub fn row_category(&self, row: &[DbValue]) -> Result<i32> {
        row.get(self.key_index)
            .and_then(DbValue::as_int)
            .ok_or_else(|| GrassError::AttributeFetchFailed {
                method_name: "row_category",
                msg: format!("key column '{}' is not an integer", self.link.key),
            })
    }
}

/// Field schema of a layer and the link it was read from.
///
/// Never fails: a link that cannot be described is reported and dropped,
/// leaving a synthetic `cat` field for `layer_key > 0` and no fields for
/// layer 0.
pub(crate) fn describe_schema(
    backend: &dyn DbBackend,
    env: &Environment,
    link: Option<FieldLink>,
    layer_key: i32,
) -> (Vec<FieldDefn>, Option<AttributeLink>) {
    if let Some(link) = link {
        match describe_link(backend, env, &link) {
            Ok((fields, key_index)) => return (fields, Some(AttributeLink { link, key_index })),
            Err(e) => warn!("attributes of layer {layer_key} are not available: {e}"),
        }
    }
    let fields = if layer_key > 0 {
        vec![FieldDefn::new("cat", FieldType::Integer)]
    } else {
        Vec::new()
    };
    (fields, None)
}

fn describe_link(
    backend: &dyn DbBackend,
    env: &Environment,
    link: &FieldLink,
) -> Result<(Vec<FieldDefn>, usize)> {
    let mut session = DriverSession::start(backend, env, link)?;
    let columns = session.describe_table(&link.table)?;

    let fields = columns
        .iter()
        .map(|column| {
            let field_type = FieldType::from_sql(column.sql_type).ok_or_else(|| {
                GrassError::UnsupportedColumnType {
                    column: column.name.clone(),
                    sql_type: column.sql_type,
                }
            })?;
            Ok(FieldDefn::new(&column.name, field_type))
        })
        .collect::<Result<Vec<_>>>()?;

    let key_index = columns
        .iter()
        .position(|c| c.name.eq_ignore_ascii_case(&link.key))
        .ok_or_else(|| GrassError::MissingKeyColumn {
            key: link.key.clone(),
            table: link.table.clone(),
        })?;

    Ok((fields, key_index))
}

/// Driver connection of one layer, started on demand.
pub(crate) struct AttributeBridge {
    backend: Rc<dyn DbBackend>,
    env: Rc<Environment>,
    link: Option<Rc<AttributeLink>>,
    session: Option<DriverSession>,
}

impl AttributeBridge {
    pub fn new(
        backend: Rc<dyn DbBackend>,
        env: Rc<Environment>,
        link: Option<AttributeLink>,
    ) -> Self {
        AttributeBridge {
            backend,
            env,
            link: link.map(Rc::new),
            session: None,
        }
    }

    pub fn link(&self) -> Option<Rc<AttributeLink>> {
        self.link.clone()
    }

    pub fn has_attributes(&self) -> bool {
        self.link.is_some()
    }

    pub fn is_started(&self) -> bool {
        self.session.is_some()
    }

    /// Start the driver unless it already runs.
    pub fn start(&mut self) -> Result<&mut DriverSession> {
        let Some(attr) = &self.link else {
            return Err(GrassError::AttributeFetchFailed {
                method_name: "start",
                msg: "layer has no attribute table".to_string(),
            });
        };
        let session = match self.session.take() {
            Some(session) => session,
            None => DriverSession::start(self.backend.as_ref(), &self.env, &attr.link)?,
        };
        Ok(self.session.insert(session))
    }

    /// Shut the driver down. Does nothing when it is not running.
    pub fn stop(&mut self) {
        if self.session.take().is_some() {
            debug!("driver stopped");
        }
    }

    /// Row of one category through a one-shot cursor.
    pub fn fetch_category(&mut self, cat: i32) -> Result<Option<Vec<DbValue>>> {
        let sql = match &self.link {
            Some(attr) => attr.key_sql(cat),
            None => return Ok(None),
        };
        let mut cursor = self.start()?.open_cursor(&sql, CursorMode::Sequential)?;
        cursor.fetch(FetchDirection::Next)
    }
}

/// Copy a fetched row into a feature whose fields mirror the table columns.
///
/// Null values stay unset. Values that do not fit their field are reported
/// and left unset.
pub(crate) fn extract_row(feature: &mut Feature, row: Vec<DbValue>) {
    for (idx, value) in row.into_iter().enumerate() {
        let field_type = feature.defn().field(idx).map(FieldDefn::field_type);
        let value = match (value, field_type) {
            (DbValue::Null, _) => continue,
            (DbValue::Int(v), _) => FieldValue::IntegerValue(v),
            (DbValue::Double(v), _) => FieldValue::RealValue(v),
            (DbValue::String(v), _) | (DbValue::DateTime(v), Some(FieldType::String)) => {
                FieldValue::StringValue(v)
            }
            (DbValue::DateTime(text), Some(FieldType::Time)) => match parse_time(&text) {
                Some(t) => FieldValue::TimeValue(t),
                None => {
                    warn!("cannot parse time value '{text}'");
                    continue;
                }
            },
            (DbValue::DateTime(text), _) => match parse_datetime(&text) {
                Some(dt) => FieldValue::DateTimeValue(dt),
                None => {
                    warn!("cannot parse date/time value '{text}'");
                    continue;
                }
            },
        };
        if let Err(e) = feature.set_field(idx, value) {
            warn!("cannot set field {idx}: {e}");
        }
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Parse date/time text as written by the database drivers.
pub(crate) fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

/// Parse time-of-day text as written by the database drivers.
pub(crate) fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    TIME_FORMATS
        .iter()
        .find_map(|f| NaiveTime::parse_from_str(text, f).ok())
}

use thiserror::Error;

use crate::store::db::SqlType;

pub type Result<T> = std::result::Result<T, GrassError>;

#[derive(Debug, Error)]
pub enum GrassError {
    #[error("'{path}' is not a GRASS vector datasource name")]
    InvalidDatasource { path: String },
    #[error("Cannot open GRASS vector '{map}' in mapset '{mapset}' on level 2: {msg}")]
    MapOpenFailed {
        map: String,
        mapset: String,
        msg: String,
    },
    #[error("Unknown GRASS feature type {type_bits:#x} for feature id {id}")]
    UnsupportedGeometryType { type_bits: u32, id: i32 },
    #[error("Cannot read geometry of id {id}: {msg}")]
    GeometryReadFailed { id: i32, msg: String },
    #[error("Cannot open database '{database}' by driver '{driver}': {msg}")]
    DriverStartFailed {
        driver: String,
        database: String,
        msg: String,
    },
    #[error("Attribute fetch failed in '{method_name}': {msg}")]
    AttributeFetchFailed {
        method_name: &'static str,
        msg: String,
    },
    #[error("Database error in '{method_name}': {msg}")]
    DbError {
        method_name: &'static str,
        msg: String,
    },
    #[error("Unsupported SQL type {sql_type:?} for column '{column}'")]
    UnsupportedColumnType { column: String, sql_type: SqlType },
    #[error("Cannot find key column '{key}' in table '{table}'")]
    MissingKeyColumn { key: String, table: String },
    #[error("Invalid attribute filter '{expression}': {msg}")]
    InvalidAttributeFilter { expression: String, msg: String },
    #[error("Invalid field name '{field_name}' used on method {method_name}")]
    InvalidFieldName {
        field_name: String,
        method_name: &'static str,
    },
    #[error("Invalid field index {index} used on method {method_name}")]
    InvalidFieldIndex {
        index: usize,
        method_name: &'static str,
    },
    #[error("Feature id {fid} is out of range, layer has {count} features")]
    InvalidFeatureId { fid: u64, count: u64 },
    #[error("Feature index {index} is out of range, {count} features are reachable")]
    InvalidFeatureIndex { index: u64, count: u64 },
    #[error("Layer index {index} is out of range, datasource has {count} layers")]
    InvalidLayerIndex { index: usize, count: usize },
    #[error("No layer named '{0}'")]
    LayerNotFound(String),
    #[error("Bad argument: {0}")]
    BadArgument(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

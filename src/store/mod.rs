//! Interfaces of the GRASS libraries this crate adapts.
//!
//! The vector library (`Vect_*`) and the attribute database interface
//! (`db_*`) are consumed through these traits. Both are single-context
//! libraries: callers must serialize all access to one map handle.

pub mod db;
pub mod vector;

pub use db::{
    CType, CursorMode, DbBackend, DbColumn, DbCursor, DbDriver, DbValue, FetchDirection, SqlType,
};
pub use vector::{BoundBox, CategoryEntry, FeatureTypes, FieldLink, LinePoints, VectorMap};

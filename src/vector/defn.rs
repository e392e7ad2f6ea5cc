use crate::store::db::{CType, SqlType};
use crate::vector::GeometryType;

/// Attribute field types a layer can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Real,
    String,
    DateTime,
    /// Time of day without a date.
    Time,
}

impl FieldType {
    /// Field type a column of `sql_type` is exposed as.
    ///
    /// Intervals have no field type of their own and keep their text.
    pub fn from_sql(sql_type: SqlType) -> Option<FieldType> {
        match sql_type {
            SqlType::Time => Some(FieldType::Time),
            SqlType::Interval => Some(FieldType::String),
            other => other.c_type().map(FieldType::from),
        }
    }
}

impl From<CType> for FieldType {
    fn from(ctype: CType) -> Self {
        match ctype {
            CType::Int => FieldType::Integer,
            CType::Double => FieldType::Real,
            CType::String => FieldType::String,
            CType::DateTime => FieldType::DateTime,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefn {
    name: String,
    field_type: FieldType,
}

impl FieldDefn {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        FieldDefn {
            name: name.to_string(),
            field_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }
}

/// Layer definition
///
/// Defines the fields available for features in a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Defn {
    name: String,
    geometry_type: GeometryType,
    is_3d: bool,
    fields: Vec<FieldDefn>,
}

impl Defn {
    pub fn new(
        name: &str,
        geometry_type: GeometryType,
        is_3d: bool,
        fields: Vec<FieldDefn>,
    ) -> Self {
        Defn {
            name: name.to_string(),
            geometry_type,
            is_3d,
            fields,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Iterate over the field schema of this layer.
    pub fn fields(&self) -> std::slice::Iter<'_, FieldDefn> {
        self.fields.iter()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, index: usize) -> Option<&FieldDefn> {
        self.fields.get(index)
    }

    /// Index of the named field. Field names compare case-insensitively.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    /// Whether the geometries of this layer carry Z ordinates.
    pub fn is_3d(&self) -> bool {
        self.is_3d
    }
}

use std::rc::Rc;

use chrono::{NaiveDateTime, NaiveTime};

use crate::errors::*;
use crate::vector::{Defn, FieldType, Geometry};

/// A feature assembled from one category index entry.
///
/// Features are built fresh on every read and own all their data.
#[derive(Debug, Clone)]
pub struct Feature {
    defn: Rc<Defn>,
    fid: u64,
    category: Option<i32>,
    geometry: Option<Geometry>,
    fields: Vec<Option<FieldValue>>,
}

impl Feature {
    pub fn new(defn: Rc<Defn>) -> Feature {
        let fields = vec![None; defn.field_count()];
        Feature {
            defn,
            fid: 0,
            category: None,
            geometry: None,
            fields,
        }
    }

    pub fn defn(&self) -> &Defn {
        &self.defn
    }

    /// Ordinal id of the feature inside its layer.
    pub fn fid(&self) -> u64 {
        self.fid
    }

    pub fn set_fid(&mut self, fid: u64) {
        self.fid = fid;
    }

    /// GRASS category of the index entry the feature was built from.
    pub fn category(&self) -> Option<i32> {
        self.category
    }

    pub fn set_category(&mut self, cat: i32) {
        self.category = Some(cat);
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    pub fn set_geometry(&mut self, geom: Geometry) {
        self.geometry = Some(geom);
    }

    /// Get the value of a named field.
    ///
    /// Returns `Ok(None)` when the field exists but is not set, an error when
    /// there is no such field.
    pub fn field(&self, name: &str) -> Result<Option<FieldValue>> {
        let idx = self
            .defn
            .field_index(name)
            .ok_or_else(|| GrassError::InvalidFieldName {
                field_name: name.to_string(),
                method_name: "field",
            })?;
        Ok(self.fields[idx].clone())
    }

    pub fn field_by_index(&self, idx: usize) -> Result<Option<&FieldValue>> {
        self.fields
            .get(idx)
            .map(Option::as_ref)
            .ok_or(GrassError::InvalidFieldIndex {
                index: idx,
                method_name: "field_by_index",
            })
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn is_field_set(&self, idx: usize) -> bool {
        self.fields.get(idx).is_some_and(Option::is_some)
    }

    /// Set a field, converting integers to reals and numbers to strings
    /// when the field type asks for it.
    pub fn set_field(&mut self, idx: usize, value: FieldValue) -> Result<()> {
        let field_type = self
            .defn
            .field(idx)
            .ok_or(GrassError::InvalidFieldIndex {
                index: idx,
                method_name: "set_field",
            })?
            .field_type();
        let value = match (field_type, value) {
            (FieldType::Integer, v @ FieldValue::IntegerValue(_))
            | (FieldType::Real, v @ FieldValue::RealValue(_))
            | (FieldType::String, v @ FieldValue::StringValue(_))
            | (FieldType::DateTime, v @ FieldValue::DateTimeValue(_))
            | (FieldType::Time, v @ FieldValue::TimeValue(_)) => v,
            (FieldType::Real, FieldValue::IntegerValue(i)) => FieldValue::RealValue(i as f64),
            (FieldType::String, FieldValue::IntegerValue(i)) => {
                FieldValue::StringValue(i.to_string())
            }
            (FieldType::String, FieldValue::RealValue(r)) => FieldValue::StringValue(r.to_string()),
            (field_type, v) => {
                return Err(GrassError::BadArgument(format!(
                    "cannot set {v:?} on {field_type:?} field '{}'",
                    self.defn.field(idx).map(|f| f.name()).unwrap_or_default()
                )))
            }
        };
        self.fields[idx] = Some(value);
        Ok(())
    }

    pub fn set_field_by_name(&mut self, name: &str, value: FieldValue) -> Result<()> {
        let idx = self
            .defn
            .field_index(name)
            .ok_or_else(|| GrassError::InvalidFieldName {
                field_name: name.to_string(),
                method_name: "set_field_by_name",
            })?;
        self.set_field(idx, value)
    }

    pub fn unset_field(&mut self, idx: usize) {
        if let Some(field) = self.fields.get_mut(idx) {
            *field = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    IntegerValue(i32),
    RealValue(f64),
    StringValue(String),
    DateTimeValue(NaiveDateTime),
    TimeValue(NaiveTime),
}

impl FieldValue {
    /// Interpret the value as `String`. Returns `None` if the value is something else.
    pub fn into_string(self) -> Option<String> {
        match self {
            FieldValue::StringValue(rv) => Some(rv),
            _ => None,
        }
    }

    /// Interpret the value as `f64`. Integers are widened.
    pub fn into_real(self) -> Option<f64> {
        match self {
            FieldValue::RealValue(rv) => Some(rv),
            FieldValue::IntegerValue(rv) => Some(rv as f64),
            _ => None,
        }
    }

    /// Interpret the value as `i32`. Returns `None` if the value is something else.
    pub fn into_int(self) -> Option<i32> {
        match self {
            FieldValue::IntegerValue(rv) => Some(rv),
            _ => None,
        }
    }

    pub fn into_datetime(self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::DateTimeValue(rv) => Some(rv),
            _ => None,
        }
    }

    pub fn into_time(self) -> Option<NaiveTime> {
        match self {
            FieldValue::TimeValue(rv) => Some(rv),
            _ => None,
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::IntegerValue(_) => FieldType::Integer,
            FieldValue::RealValue(_) => FieldType::Real,
            FieldValue::StringValue(_) => FieldType::String,
            FieldValue::DateTimeValue(_) => FieldType::DateTime,
            FieldValue::TimeValue(_) => FieldType::Time,
        }
    }
}

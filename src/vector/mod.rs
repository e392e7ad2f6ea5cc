//! GRASS vector layers
//!
//! Each layer of a map is read through [`LayerAccess`]: features come out
//! in category index order, with geometries built from the map topology
//! and attributes joined from the linked table.
//!
//! ## Reading
//!
//! ```no_run
//! use gdal_grass::vector::LayerAccess;
//! # fn run(dataset: &mut gdal_grass::Dataset) -> gdal_grass::errors::Result<()> {
//! let layer = dataset.layer(0)?;
//! layer.set_attribute_filter("cat IN (3, 7)")?;
//! for feature in layer.features() {
//!     let cat = feature.field("cat")?;
//!     let geometry = feature.geometry();
//!     println!("{:?} {}", cat, geometry.map(|g| g.wkt()).unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

pub use defn::{Defn, FieldDefn, FieldType};
pub use feature::{Feature, FieldValue};
pub use geometry::{Envelope, Geometry, GeometryType, Vertex};
pub use layer::{FeatureIterator, Layer, LayerAccess, LayerCaps};
pub use query::{AttributeQuery, Record, Row, Value};

mod attributes;
mod cidx;
mod cursor;
mod defn;
mod feature;
mod filter;
mod geometry;
mod grass_to_geo;
mod layer;
mod materialize;
mod query;

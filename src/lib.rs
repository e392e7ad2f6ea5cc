//! GRASS vector maps for Rust, through an OGR-style layer API.
//!
//! A GRASS vector map is a single topological dataset whose points, lines
//! and areas are grouped into layers by their category index. Each layer
//! can be linked to an attribute table keyed by category. This crate reads
//! such a map as a set of simple feature layers: every feature carries a
//! point, line string or polygon plus the attributes of its category.
//!
//! The GRASS vector library and its database interface are reached through
//! the traits in [`store`], so any binding to them (or an in-memory stand-in)
//! can back a [`Dataset`].
//!
//! ## Use
//!
//! ```no_run
//! use std::rc::Rc;
//! use gdal_grass::{Dataset, MapOpener};
//! use gdal_grass::store::DbBackend;
//! use gdal_grass::vector::LayerAccess;
//!
//! # fn run(
//! #     opener: &dyn MapOpener,
//! #     backend: Rc<dyn DbBackend>,
//! # ) -> gdal_grass::errors::Result<()> {
//! let path = "/data/grassdata/world/PERMANENT/vector/roads/head";
//! let mut dataset = Dataset::open(path, opener, backend)?;
//! let layer = dataset.layer(0)?;
//! layer.set_spatial_filter_rect(26.1017, 44.4297, 26.1025, 44.4303)?;
//! for feature in layer.features() {
//!     let name = feature.field("name")?;
//!     let geometry = feature.geometry();
//!     println!("{:?} {}", name, geometry.map(|g| g.wkt()).unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

#![crate_name = "gdal_grass"]
#![crate_type = "lib"]

pub mod config;
mod dataset;
pub mod errors;
pub mod store;
pub mod vector;

pub use dataset::{Dataset, DatasourcePath, MapOpener};

#[cfg(test)]
pub(crate) mod test_utils;

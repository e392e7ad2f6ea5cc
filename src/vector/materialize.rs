//! Building simple feature geometries from map topology.

use log::error;

use crate::errors::*;
use crate::store::vector::{BoundBox, FeatureTypes, VectorMap};
use crate::vector::geometry::vertices_from_points;
use crate::vector::{Geometry, GeometryType};

/// How an exposed category index entry turns into a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FeatureKind {
    /// A single vertex read from a point line.
    Point,
    /// The vertex chain of a line or boundary.
    Line,
    /// An area ring plus one ring per isle.
    Area,
}

impl FeatureKind {
    pub fn from_type(feature_type: FeatureTypes) -> Option<Self> {
        if feature_type == FeatureTypes::POINT {
            Some(FeatureKind::Point)
        } else if feature_type == FeatureTypes::LINE || feature_type == FeatureTypes::BOUNDARY {
            Some(FeatureKind::Line)
        } else if feature_type == FeatureTypes::AREA {
            Some(FeatureKind::Area)
        } else {
            None
        }
    }

    /// Bounding box of the feature, without reading its vertices.
    pub fn feature_box(self, map: &dyn VectorMap, id: i32) -> BoundBox {
        match self {
            FeatureKind::Point | FeatureKind::Line => map.line_box(id),
            FeatureKind::Area => map.area_box(id),
        }
    }

    pub fn materialize(self, map: &dyn VectorMap, id: i32) -> Result<Geometry> {
        let is_3d = map.is_3d();
        match self {
            FeatureKind::Point => {
                let points = map.read_line(id)?;
                vertices_from_points(&points, is_3d)
                    .into_iter()
                    .next()
                    .map(Geometry::Point)
                    .ok_or_else(|| GrassError::GeometryReadFailed {
                        id,
                        msg: "point without vertices".to_string(),
                    })
            }
            FeatureKind::Line => {
                let points = map.read_line(id)?;
                Ok(Geometry::LineString(vertices_from_points(&points, is_3d)))
            }
            FeatureKind::Area => {
                let mut rings = vec![vertices_from_points(&map.area_points(id)?, is_3d)];
                for isle in map.area_isles(id) {
                    rings.push(vertices_from_points(&map.isle_points(isle)?, is_3d));
                }
                Ok(Geometry::Polygon(rings))
            }
        }
    }
}

/// Materialize the geometry of an index entry whose kind was resolved when
/// the layer was opened. Entries without a kind are reported and rejected.
pub(crate) fn materialize(
    map: &dyn VectorMap,
    kind: Option<FeatureKind>,
    feature_type: FeatureTypes,
    id: i32,
) -> Result<Geometry> {
    match kind {
        Some(kind) => kind.materialize(map, id),
        None => {
            error!("unknown GRASS feature type {:#x} for id {id}", feature_type.bits());
            Err(GrassError::UnsupportedGeometryType {
                type_bits: feature_type.bits(),
                id,
            })
        }
    }
}

/// Declared geometry type of a layer holding entries of `types`.
///
/// Lines and boundaries together are line strings and any area makes a
/// polygon layer. Other mixes, points with lines for one, are `Unknown`.
pub(crate) fn layer_geometry_type(types: FeatureTypes) -> GeometryType {
    if types.contains(FeatureTypes::AREA) {
        GeometryType::Polygon
    } else if !types.is_empty() && FeatureTypes::LINES.contains(types) {
        GeometryType::LineString
    } else if types == FeatureTypes::POINT {
        GeometryType::Point
    } else {
        GeometryType::Unknown
    }
}

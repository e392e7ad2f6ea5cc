//! The topological vector map as seen from the adapter.

use bitflags::bitflags;

use crate::errors::Result;

bitflags! {
    /// GRASS feature type codes, as stored in the category index.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FeatureTypes: u32 {
        const POINT = 0x01;
        const LINE = 0x02;
        const BOUNDARY = 0x04;
        const CENTROID = 0x08;
        const FACE = 0x10;
        const KERNEL = 0x20;
        const AREA = 0x40;
        const VOLUME = 0x80;

        const POINTS = Self::POINT.bits() | Self::CENTROID.bits();
        const LINES = Self::LINE.bits() | Self::BOUNDARY.bits();
    }
}

impl FeatureTypes {
    /// Types exposed as simple features. Centroids, faces, kernels and volumes are not.
    pub const EXPOSED: FeatureTypes = FeatureTypes::POINT
        .union(FeatureTypes::LINES)
        .union(FeatureTypes::AREA);

    pub fn is_exposed(self) -> bool {
        self.intersects(Self::EXPOSED)
    }
}

/// Bounding box of a line, area or the whole map.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundBox {
    pub n: f64,
    pub s: f64,
    pub e: f64,
    pub w: f64,
    pub t: f64,
    pub b: f64,
}

/// Vertex buffer filled by line, area and isle reads.
///
/// `z` has the same length as `x` and `y`; it holds zeros for 2D maps.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinePoints {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl LinePoints {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn push(&mut self, x: f64, y: f64, z: f64) {
        self.x.push(x);
        self.y.push(y);
        self.z.push(z);
    }
}

impl FromIterator<(f64, f64, f64)> for LinePoints {
    fn from_iter<I: IntoIterator<Item = (f64, f64, f64)>>(iter: I) -> Self {
        let mut points = LinePoints::default();
        for (x, y, z) in iter {
            points.push(x, y, z);
        }
        points
    }
}

/// One entry of the category index of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryEntry {
    pub cat: i32,
    pub feature_type: FeatureTypes,
    /// Line id for points/lines/boundaries, area id for areas.
    pub id: i32,
}

/// Database link of a layer (the `dbln` entry of a map).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLink {
    pub number: i32,
    pub name: Option<String>,
    pub table: String,
    pub key: String,
    pub database: String,
    pub driver: String,
}

/// A vector map opened on topology level.
///
/// `cidx_*` methods take a category index position (`index`), not the layer
/// number; `cidx_field_number` translates between the two. Entries of one
/// index are sorted by category.
///
/// Positions passed to `cidx_cat_by_index` are always inside
/// `0..cidx_num_cats_by_index(index)`; implementations may panic otherwise.
pub trait VectorMap {
    fn is_3d(&self) -> bool;

    fn map_box(&self) -> BoundBox;

    fn cidx_num_fields(&self) -> usize;

    fn cidx_field_number(&self, index: usize) -> i32;

    fn cidx_num_cats_by_index(&self, index: usize) -> usize;

    /// Number of index entries of layer `field` whose type is in `types`.
    fn cidx_type_count(&self, field: i32, types: FeatureTypes) -> usize;

    /// Types present in the index with their entry counts.
    fn cidx_types_by_index(&self, index: usize) -> Vec<(FeatureTypes, usize)>;

    fn cidx_cat_by_index(&self, index: usize, position: usize) -> CategoryEntry;

    fn field_link(&self, field: i32) -> Option<FieldLink>;

    fn read_line(&self, line: i32) -> Result<LinePoints>;

    fn area_points(&self, area: i32) -> Result<LinePoints>;

    fn area_isles(&self, area: i32) -> Vec<i32>;

    fn isle_points(&self, isle: i32) -> Result<LinePoints>;

    fn line_box(&self, line: i32) -> BoundBox;

    fn area_box(&self, area: i32) -> BoundBox;
}

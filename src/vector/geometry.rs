use crate::store::vector::{BoundBox, LinePoints};

/// Declared geometry type of a layer or actual type of a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryType {
    Unknown,
    Point,
    LineString,
    Polygon,
}

impl GeometryType {
    pub fn name(&self) -> &'static str {
        match self {
            GeometryType::Unknown => "Unknown (any)",
            GeometryType::Point => "Point",
            GeometryType::LineString => "Line String",
            GeometryType::Polygon => "Polygon",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Vertex {
    pub fn new(x: f64, y: f64) -> Self {
        Vertex { x, y, z: None }
    }

    pub fn new_3d(x: f64, y: f64, z: f64) -> Self {
        Vertex { x, y, z: Some(z) }
    }
}

/// Axis aligned extent, laid out like `OGREnvelope`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Envelope {
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }
}

impl From<BoundBox> for Envelope {
    fn from(bbox: BoundBox) -> Self {
        Envelope {
            min_x: bbox.w,
            max_x: bbox.e,
            min_y: bbox.s,
            max_y: bbox.n,
        }
    }
}

/// Simple feature geometry built from GRASS topology.
///
/// All vertices of one geometry have the same dimension: `z` is set on every
/// vertex of a 3D geometry and on none of a 2D one.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Vertex),
    LineString(Vec<Vertex>),
    /// Exterior ring first, then one ring per hole.
    Polygon(Vec<Vec<Vertex>>),
}

impl Geometry {
    /// Create a rectangular polygon from its bounds.
    pub fn bbox(w: f64, s: f64, e: f64, n: f64) -> Geometry {
        Geometry::Polygon(vec![vec![
            Vertex::new(w, n),
            Vertex::new(e, n),
            Vertex::new(e, s),
            Vertex::new(w, s),
            Vertex::new(w, n),
        ]])
    }

    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::LineString(_) => GeometryType::LineString,
            Geometry::Polygon(_) => GeometryType::Polygon,
        }
    }

    pub fn vertices(&self) -> Box<dyn Iterator<Item = &Vertex> + '_> {
        match self {
            Geometry::Point(v) => Box::new(std::iter::once(v)),
            Geometry::LineString(vs) => Box::new(vs.iter()),
            Geometry::Polygon(rings) => Box::new(rings.iter().flatten()),
        }
    }

    pub fn is_3d(&self) -> bool {
        self.vertices().next().is_some_and(|v| v.z.is_some())
    }

    /// 3 for 3D geometries, 2 otherwise.
    pub fn coordinate_dimension(&self) -> usize {
        if self.is_3d() {
            3
        } else {
            2
        }
    }

    /// Vertices as `(x, y, z)` tuples, `z` being 0 for 2D geometries.
    pub fn get_point_vec(&self) -> Vec<(f64, f64, f64)> {
        self.vertices()
            .map(|v| (v.x, v.y, v.z.unwrap_or(0.0)))
            .collect()
    }

    pub fn ring_count(&self) -> usize {
        match self {
            Geometry::Polygon(rings) => rings.len(),
            _ => 0,
        }
    }

    pub fn ring(&self, n: usize) -> Option<&[Vertex]> {
        match self {
            Geometry::Polygon(rings) => rings.get(n).map(Vec::as_slice),
            _ => None,
        }
    }

    pub fn envelope(&self) -> Envelope {
        let mut env = Envelope {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        };
        for v in self.vertices() {
            env.min_x = env.min_x.min(v.x);
            env.max_x = env.max_x.max(v.x);
            env.min_y = env.min_y.min(v.y);
            env.max_y = env.max_y.max(v.y);
        }
        env
    }

    /// True for a single ring polygon whose 5 vertices trace its own envelope.
    pub fn is_rectangle(&self) -> bool {
        let Geometry::Polygon(rings) = self else {
            return false;
        };
        let [ring] = rings.as_slice() else {
            return false;
        };
        if ring.len() != 5 || ring[0] != ring[4] {
            return false;
        }
        let env = self.envelope();
        let on_x = |x: f64| x == env.min_x || x == env.max_x;
        let on_y = |y: f64| y == env.min_y || y == env.max_y;
        ring.iter().all(|v| on_x(v.x) && on_y(v.y))
            && ring.windows(2).all(|w| w[0].x == w[1].x || w[0].y == w[1].y)
    }

    /// Well known text representation.
    pub fn wkt(&self) -> String {
        let z = if self.is_3d() { " Z" } else { "" };
        match self {
            Geometry::Point(v) => format!("POINT{z} ({})", coord_text(v)),
            Geometry::LineString(vs) => format!("LINESTRING{z} {}", ring_text(vs)),
            Geometry::Polygon(rings) => {
                let rings: Vec<String> = rings.iter().map(|r| ring_text(r)).collect();
                format!("POLYGON{z} ({})", rings.join(","))
            }
        }
    }
}

fn coord_text(v: &Vertex) -> String {
    match v.z {
        Some(z) => format!("{} {} {z}", v.x, v.y),
        None => format!("{} {}", v.x, v.y),
    }
}

fn ring_text(vs: &[Vertex]) -> String {
    let coords: Vec<String> = vs.iter().map(coord_text).collect();
    format!("({})", coords.join(","))
}

/// Convert a vertex buffer, keeping `z` only when `is_3d`.
pub(crate) fn vertices_from_points(points: &LinePoints, is_3d: bool) -> Vec<Vertex> {
    (0..points.len())
        .map(|i| Vertex {
            x: points.x[i],
            y: points.y[i],
            z: is_3d.then(|| points.z[i]),
        })
        .collect()
}

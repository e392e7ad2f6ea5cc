use crate::errors::GrassError;
use crate::vector::{Geometry, Vertex};

fn coord(v: &Vertex) -> geo_types::Coord<f64> {
    geo_types::Coord { x: v.x, y: v.y }
}

fn line_string(vs: &[Vertex]) -> geo_types::LineString<f64> {
    geo_types::LineString(vs.iter().map(coord).collect())
}

/// Z ordinates are dropped, geo-types being 2D only.
impl TryFrom<&Geometry> for geo_types::Geometry<f64> {
    type Error = GrassError;

    fn try_from(geo: &Geometry) -> Result<geo_types::Geometry<f64>, Self::Error> {
        match geo {
            Geometry::Point(v) => Ok(geo_types::Geometry::Point(geo_types::Point(coord(v)))),
            Geometry::LineString(vs) => Ok(geo_types::Geometry::LineString(line_string(vs))),
            Geometry::Polygon(rings) => {
                let Some((outer, holes)) = rings.split_first() else {
                    return Err(GrassError::BadArgument(
                        "polygon without exterior ring".to_string(),
                    ));
                };
                Ok(geo_types::Geometry::Polygon(geo_types::Polygon::new(
                    line_string(outer),
                    holes.iter().map(|h| line_string(h)).collect(),
                )))
            }
        }
    }
}

impl TryFrom<Geometry> for geo_types::Geometry<f64> {
    type Error = GrassError;
    fn try_from(value: Geometry) -> Result<Self, Self::Error> {
        Self::try_from(&value)
    }
}

fn vertices(ls: &geo_types::LineString<f64>) -> Vec<Vertex> {
    ls.0.iter().map(|c| Vertex::new(c.x, c.y)).collect()
}

impl From<&geo_types::Point<f64>> for Geometry {
    fn from(p: &geo_types::Point<f64>) -> Self {
        Geometry::Point(Vertex::new(p.x(), p.y()))
    }
}

impl From<&geo_types::LineString<f64>> for Geometry {
    fn from(ls: &geo_types::LineString<f64>) -> Self {
        Geometry::LineString(vertices(ls))
    }
}

impl From<&geo_types::Polygon<f64>> for Geometry {
    fn from(poly: &geo_types::Polygon<f64>) -> Self {
        let mut rings = vec![vertices(poly.exterior())];
        rings.extend(poly.interiors().iter().map(vertices));
        Geometry::Polygon(rings)
    }
}

impl From<&geo_types::Rect<f64>> for Geometry {
    fn from(rect: &geo_types::Rect<f64>) -> Self {
        Geometry::bbox(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

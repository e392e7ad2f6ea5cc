//! Per-feature filter results.

use geo::Intersects;
use log::debug;

use crate::errors::*;
use crate::store::db::FetchDirection;
use crate::store::vector::{BoundBox, VectorMap};
use crate::vector::attributes::{AttributeLink, CursorHandle};
use crate::vector::cidx::CategoryIndex;
use crate::vector::{Envelope, Geometry};

/// Which ordinals pass the installed filters. `None` means no filter of
/// that kind is installed and everything passes.
#[derive(Debug, Default)]
pub(crate) struct MatchCache {
    spatial: Option<Vec<bool>>,
    attribute: Option<Vec<bool>>,
}

impl MatchCache {
    pub fn passes(&self, ordinal: usize) -> bool {
        let check = |m: &Option<Vec<bool>>| m.as_ref().map_or(true, |m| m[ordinal]);
        check(&self.attribute) && check(&self.spatial)
    }

    pub fn is_active(&self) -> bool {
        self.spatial.is_some() || self.attribute.is_some()
    }

    pub fn set_spatial(&mut self, matches: Option<Vec<bool>>) {
        self.spatial = matches;
    }

    pub fn set_attribute(&mut self, matches: Option<Vec<bool>>) {
        self.attribute = matches;
    }

    /// Ordinal of the `n`-th passing feature.
    pub fn nth_match(&self, count: usize, n: usize) -> Option<usize> {
        (0..count).filter(|i| self.passes(*i)).nth(n)
    }
}

/// An installed spatial filter geometry.
pub(crate) struct SpatialFilter {
    geometry: Geometry,
    envelope: Envelope,
    /// `None` when the filter is its own envelope.
    exact: Option<geo_types::Geometry<f64>>,
}

impl SpatialFilter {
    pub fn new(geometry: Geometry) -> Result<Self> {
        let exact = if geometry.is_rectangle() {
            None
        } else {
            Some(geo_types::Geometry::try_from(&geometry)?)
        };
        Ok(SpatialFilter {
            envelope: geometry.envelope(),
            geometry,
            exact,
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Whether a feature with bounding box `bbox` may intersect the filter.
    pub fn matches_box(&self, bbox: BoundBox) -> bool {
        let envelope = Envelope::from(bbox);
        if !self.envelope.intersects(&envelope) {
            return false;
        }
        match &self.exact {
            None => true,
            Some(exact) => {
                let rect = geo_types::Rect::new(
                    geo_types::coord! { x: envelope.min_x, y: envelope.min_y },
                    geo_types::coord! { x: envelope.max_x, y: envelope.max_y },
                );
                exact.intersects(&rect)
            }
        }
    }
}

/// Test the bounding box of every feature against `filter`.
pub(crate) fn spatial_match(
    map: &dyn VectorMap,
    cidx: &CategoryIndex,
    filter: &SpatialFilter,
) -> Vec<bool> {
    cidx.ordinals()
        .iter()
        .enumerate()
        .map(|(i, ordinal)| {
            let entry = cidx.entry_at(ordinal.position);
            let Some(kind) = ordinal.kind else {
                return false;
            };
            let matched = filter.matches_box(kind.feature_box(map, entry.id));
            if matched {
                debug!("feature {i} in filter");
            }
            matched
        })
        .collect()
}

/// Mark the ordinals whose category has a row in `cursor`.
///
/// The rows must be ordered by key and the index by category: both are
/// walked once, forward, and categories out of order are missed.
pub(crate) fn query_match(
    cidx: &CategoryIndex,
    attr: &AttributeLink,
    cursor: &mut CursorHandle,
) -> Result<Vec<bool>> {
    let ordinals = cidx.ordinals();
    let num_cats = cidx.num_cats();
    let mut matches = vec![false; ordinals.len()];

    let mut position = 0;
    let mut fidx = 0;
    while let Some(row) = cursor.fetch(FetchDirection::Next)? {
        let cat = attr.row_category(&row)?;
        while position < num_cats {
            let entry = cidx.entry_at(position);
            if entry.cat > cat {
                break;
            }
            if entry.cat == cat && entry.feature_type.is_exposed() {
                while fidx < ordinals.len() && ordinals[fidx].position < position {
                    fidx += 1;
                }
                if fidx < ordinals.len() && ordinals[fidx].position == position {
                    matches[fidx] = true;
                }
            }
            position += 1;
        }
    }
    Ok(matches)
}

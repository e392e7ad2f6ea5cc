//! Read-only view of one layer's part of the category index.

use std::rc::Rc;

use log::debug;

use crate::store::vector::{CategoryEntry, FeatureTypes, VectorMap};
use crate::vector::materialize::FeatureKind;

/// Where an ordinal id points in the category index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OrdinalEntry {
    pub position: usize,
    /// `None` when the entry's type code has no simple feature mapping.
    pub kind: Option<FeatureKind>,
}

/// The category index of one layer, plus the dense ordinal numbering of the
/// entries exposed as features.
///
/// Centroids and other non-exposed entries stay in the index but get no
/// ordinal, so ordinal `i` maps to index position `ordinals[i].position`.
pub(crate) struct CategoryIndex {
    map: Rc<dyn VectorMap>,
    index: usize,
    field: i32,
    num_cats: usize,
    ordinals: Vec<OrdinalEntry>,
}

impl CategoryIndex {
    pub fn new(map: Rc<dyn VectorMap>, index: usize) -> Self {
        let field = map.cidx_field_number(index);
        let num_cats = map.cidx_num_cats_by_index(index);

        let ordinals: Vec<OrdinalEntry> = (0..num_cats)
            .filter_map(|position| {
                let entry = map.cidx_cat_by_index(index, position);
                entry.feature_type.is_exposed().then(|| OrdinalEntry {
                    position,
                    kind: FeatureKind::from_type(entry.feature_type),
                })
            })
            .collect();

        debug!(
            "category index {index}: layer {field}, {num_cats} entries, {} features",
            ordinals.len()
        );

        CategoryIndex {
            map,
            index,
            field,
            num_cats,
            ordinals,
        }
    }

    /// Layer number ("field") this index belongs to.
    pub fn field(&self) -> i32 {
        self.field
    }

    pub fn num_cats(&self) -> usize {
        self.num_cats
    }

    pub fn feature_count(&self) -> usize {
        self.ordinals.len()
    }

    /// Entry at a raw index position. `position` must be below `num_cats()`.
    pub fn entry_at(&self, position: usize) -> CategoryEntry {
        self.map.cidx_cat_by_index(self.index, position)
    }

    /// Entry behind an ordinal id. `ordinal` must be below `feature_count()`.
    pub fn resolve(&self, ordinal: usize) -> (CategoryEntry, Option<FeatureKind>) {
        let OrdinalEntry { position, kind } = self.ordinals[ordinal];
        (self.entry_at(position), kind)
    }

    pub fn ordinals(&self) -> &[OrdinalEntry] {
        &self.ordinals
    }

    /// Entries of this layer with any of `types`, as counted by the map.
    pub fn count_by_types(&self, types: FeatureTypes) -> usize {
        self.map.cidx_type_count(self.field, types)
    }

    /// Union of the exposed types present in this index.
    pub fn exposed_types(&self) -> FeatureTypes {
        self.map
            .cidx_types_by_index(self.index)
            .into_iter()
            .filter(|(t, count)| *count > 0 && t.is_exposed())
            .fold(FeatureTypes::empty(), |acc, (t, _)| acc | t)
    }
}

use std::rc::Rc;

use log::{debug, error, warn};

use crate::config::Environment;
use crate::errors::*;
use crate::store::db::{CursorMode, DbBackend, DbValue};
use crate::store::vector::{FeatureTypes, VectorMap};
use crate::vector::attributes::{describe_schema, extract_row, AttributeBridge, AttributeLink};
use crate::vector::cidx::CategoryIndex;
use crate::vector::cursor::SequentialCursor;
use crate::vector::filter::{query_match, spatial_match, MatchCache, SpatialFilter};
use crate::vector::materialize::{layer_geometry_type, materialize};
use crate::vector::{AttributeQuery, Defn, Envelope, Feature, FieldValue, Geometry};

/// Layer capabilities
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerCaps {
    /// Layer capability for random read
    OLCRandomRead,
    /// Layer capability for fast feature count retrieval
    OLCFastFeatureCount,
    /// Layer capability for fast spatial filter
    OLCFastSpatialFilter,
    /// Layer capability for fast extent retrieval
    OLCFastGetExtent,
    /// Layer capability for fast setting next index
    OLCFastSetNextByIndex,
    /// Layer capability for strings returned with UTF-8 encoding
    OLCStringsAsUTF8,
}

/// Layer in a GRASS vector map
///
/// ```no_run
/// use gdal_grass::vector::LayerAccess;
/// # fn run(dataset: &mut gdal_grass::Dataset) -> gdal_grass::errors::Result<()> {
/// let layer = dataset.layer(0)?;
/// for feature in layer.features() {
///     // do something with each feature
/// }
/// # Ok(())
/// # }
/// ```
pub struct Layer {
    name: String,
    defn: Rc<Defn>,
    map: Rc<dyn VectorMap>,
    cidx: CategoryIndex,
    cursor: SequentialCursor,
    attributes: AttributeBridge,
    matches: MatchCache,
    spatial_filter: Option<SpatialFilter>,
    attribute_filter: Option<String>,
    next_id: usize,
    features_read: u64,
}

impl Layer {
    /// Build the layer of category index position `index`.
    ///
    /// The schema is read from the linked table right away; a link that
    /// cannot be used is reported and the layer falls back to a `cat` field.
    pub fn new(
        map: Rc<dyn VectorMap>,
        index: usize,
        env: Rc<Environment>,
        backend: Rc<dyn DbBackend>,
    ) -> Layer {
        let cidx = CategoryIndex::new(map.clone(), index);
        let layer_key = cidx.field();
        let link = map.field_link(layer_key);

        let name = link
            .as_ref()
            .and_then(|l| l.name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| layer_key.to_string());
        let geometry_type = layer_geometry_type(cidx.exposed_types());
        debug!(
            "layer '{name}': key {layer_key}, {} features, geometry {}",
            cidx.feature_count(),
            geometry_type.name()
        );

        let (fields, attr_link) = describe_schema(backend.as_ref(), &env, link, layer_key);
        let defn = Rc::new(Defn::new(&name, geometry_type, map.is_3d(), fields));

        Layer {
            name,
            defn,
            map,
            cidx,
            cursor: SequentialCursor::Closed,
            attributes: AttributeBridge::new(backend, env, attr_link),
            matches: MatchCache::default(),
            spatial_filter: None,
            attribute_filter: None,
            next_id: 0,
            features_read: 0,
        }
    }

    /// Layer number ("field") in the map.
    pub fn layer_key(&self) -> i32 {
        self.cidx.field()
    }

    /// Whether attributes come from a linked table.
    pub fn has_attributes(&self) -> bool {
        self.attributes.has_attributes()
    }

    /// Features returned by `next_feature` and `feature` so far.
    pub fn features_read(&self) -> u64 {
        self.features_read
    }

    fn total_count(&self) -> usize {
        self.cidx.feature_count()
    }

    /// Geometry, ordinal and category of a feature, without attributes.
    fn read_feature(&self, ordinal: usize) -> Result<Feature> {
        let (entry, kind) = self.cidx.resolve(ordinal);
        let geometry = materialize(self.map.as_ref(), kind, entry.feature_type, entry.id)?;

        let mut feature = Feature::new(self.defn.clone());
        feature.set_fid(ordinal as u64);
        feature.set_category(entry.cat);
        feature.set_geometry(geometry);
        if !self.attributes.has_attributes() && self.layer_key() > 0 {
            feature.set_field(0, FieldValue::IntegerValue(entry.cat))?;
        }
        Ok(feature)
    }

    /// Row of `cat` from the sequential cursor, opening it when needed.
    fn sequential_row(&mut self, attr: &AttributeLink, cat: i32) -> Result<Option<Vec<DbValue>>> {
        if !self.cursor.is_open() {
            let filter = self.attribute_filter.as_deref();
            let session = self.attributes.start()?;
            self.cursor.open(session, attr, filter)?;
        }
        self.cursor.advance_to(cat, attr)
    }

    fn join_sequential(&mut self, feature: &mut Feature) {
        let (Some(attr), Some(cat)) = (self.attributes.link(), feature.category()) else {
            return;
        };
        match self.sequential_row(&attr, cat) {
            Ok(Some(row)) => extract_row(feature, row),
            Ok(None) => warn!("attributes not found for category {cat}"),
            Err(e) => {
                warn!("cannot fetch attributes of category {cat}: {e}");
                self.cursor.close();
            }
        }
    }

    fn join_one_shot(&mut self, feature: &mut Feature) {
        let Some(cat) = feature.category() else {
            return;
        };
        if !self.attributes.has_attributes() {
            return;
        }
        match self.attributes.fetch_category(cat) {
            Ok(Some(row)) => extract_row(feature, row),
            Ok(None) => warn!("attributes not found for category {cat}"),
            Err(e) => warn!("cannot fetch attributes of category {cat}: {e}"),
        }
        if !self.cursor.is_open() {
            self.attributes.stop();
        }
    }

    /// Close the iteration cursor and shut the driver down.
    fn release(&mut self) {
        self.cursor.close();
        self.attributes.stop();
    }

    fn pushdown_match(&mut self, attr: &AttributeLink, query: &str) -> Result<Vec<bool>> {
        self.cursor.close();
        let result = self.attributes.start().and_then(|session| {
            let sql = attr.select_sql(Some(query));
            let mut cursor = session.open_cursor(&sql, CursorMode::Scroll)?;
            query_match(&self.cidx, attr, &mut cursor)
        });
        self.attributes.stop();
        result
    }

    fn evaluate_match(&self, query: &AttributeQuery) -> Vec<bool> {
        (0..self.total_count())
            .map(|i| match self.read_feature(i) {
                Ok(feature) => {
                    let matched = query.evaluate(&feature);
                    debug!("i = {i} eval = {matched}");
                    matched
                }
                Err(e) => {
                    warn!("feature {i} left out of the attribute filter: {e}");
                    false
                }
            })
            .collect()
    }
}

impl Drop for Layer {
    fn drop(&mut self) {
        self.release();
    }
}

/// The layer contract.
pub trait LayerAccess: Sized {
    fn name(&self) -> String;

    fn defn(&self) -> &Defn;

    /// Start reading from the first feature again.
    fn reset_feature_reading(&mut self);

    /// Next feature passing the installed filters, `Ok(None)` at the end.
    fn next_feature(&mut self) -> Result<Option<Feature>>;

    /// Feature with ordinal id `fid`, regardless of the installed filters.
    fn feature(&mut self, fid: u64) -> Result<Feature>;

    /// Make the `index`-th feature passing the filters the next one read.
    fn set_next_by_index(&mut self, index: u64) -> Result<()>;

    fn set_spatial_filter(&mut self, geometry: &Geometry) -> Result<()>;

    /// Set a spatial filter on this layer to the rectangle with the given corners.
    fn set_spatial_filter_rect(
        &mut self,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    ) -> Result<()> {
        self.set_spatial_filter(&Geometry::bbox(min_x, min_y, max_x, max_y))
    }

    fn clear_spatial_filter(&mut self);

    fn spatial_filter(&self) -> Option<&Geometry>;

    /// Set a new attribute query that restricts features when using the feature iterator.
    ///
    /// An empty query clears the filter.
    fn set_attribute_filter(&mut self, query: &str) -> Result<()>;

    fn clear_attribute_filter(&mut self);

    fn attribute_filter(&self) -> Option<&str>;

    /// Feature count, when it is known without reading features.
    fn try_feature_count(&self) -> Option<u64>;

    /// Number of features passing the installed filters.
    ///
    /// Counts by iterating when the count is not known. Resets reading.
    fn feature_count(&mut self) -> u64 {
        if let Some(count) = self.try_feature_count() {
            return count;
        }
        let count = self.features().count() as u64;
        self.reset_feature_reading();
        count
    }

    fn get_extent(&self) -> Result<Envelope>;

    fn has_capability(&self, capability: LayerCaps) -> bool;

    /// Iterate over the features passing the installed filters, from the first one.
    fn features(&mut self) -> FeatureIterator<'_, Self> {
        self.reset_feature_reading();
        FeatureIterator { layer: self }
    }
}

impl LayerAccess for Layer {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn defn(&self) -> &Defn {
        &self.defn
    }

    fn reset_feature_reading(&mut self) {
        self.next_id = 0;
        if let Err(e) = self.cursor.reset() {
            warn!("cannot reset cursor: {e}");
            self.cursor.close();
        }
    }

    fn next_feature(&mut self) -> Result<Option<Feature>> {
        let count = self.total_count();
        while self.next_id < count && !self.matches.passes(self.next_id) {
            self.next_id += 1;
        }
        if self.next_id >= count {
            self.release();
            return Ok(None);
        }

        let ordinal = self.next_id;
        self.next_id += 1;
        let mut feature = self.read_feature(ordinal)?;
        self.join_sequential(&mut feature);
        self.features_read += 1;
        Ok(Some(feature))
    }

    fn feature(&mut self, fid: u64) -> Result<Feature> {
        let count = self.total_count() as u64;
        if fid >= count {
            return Err(GrassError::InvalidFeatureId { fid, count });
        }
        let mut feature = self.read_feature(fid as usize)?;
        self.join_one_shot(&mut feature);
        self.features_read += 1;
        Ok(feature)
    }

    fn set_next_by_index(&mut self, index: u64) -> Result<()> {
        let count = self.total_count();
        let ordinal = if self.matches.is_active() {
            let position = usize::try_from(index).ok();
            position.and_then(|n| self.matches.nth_match(count, n))
        } else {
            usize::try_from(index).ok().filter(|n| *n < count)
        };
        let Some(ordinal) = ordinal else {
            let reachable = (0..count).filter(|i| self.matches.passes(*i)).count();
            return Err(GrassError::InvalidFeatureIndex {
                index,
                count: reachable as u64,
            });
        };
        if ordinal < self.next_id {
            if let Err(e) = self.cursor.reset() {
                warn!("cannot reset cursor: {e}");
                self.cursor.close();
            }
        }
        self.next_id = ordinal;
        Ok(())
    }

    fn set_spatial_filter(&mut self, geometry: &Geometry) -> Result<()> {
        let filter = SpatialFilter::new(geometry.clone())?;
        let matches = spatial_match(self.map.as_ref(), &self.cidx, &filter);
        self.matches.set_spatial(Some(matches));
        self.spatial_filter = Some(filter);
        self.reset_feature_reading();
        Ok(())
    }

    fn clear_spatial_filter(&mut self) {
        self.matches.set_spatial(None);
        self.spatial_filter = None;
        self.reset_feature_reading();
    }

    fn spatial_filter(&self) -> Option<&Geometry> {
        self.spatial_filter.as_ref().map(SpatialFilter::geometry)
    }

    fn set_attribute_filter(&mut self, query: &str) -> Result<()> {
        debug!("set attribute filter: {query}");
        if query.trim().is_empty() {
            self.clear_attribute_filter();
            return Ok(());
        }

        // the database is the judge of filters on linked layers; the local
        // grammar only catches unknown fields early
        let matches = match self.attributes.link() {
            Some(attr) => match AttributeQuery::parse(query) {
                Ok(parsed) => parsed
                    .validate(&self.defn)
                    .and_then(|_| self.pushdown_match(&attr, query)),
                Err(e) => {
                    debug!("filter not checked locally: {e}");
                    self.pushdown_match(&attr, query)
                }
            },
            None => AttributeQuery::parse(query).and_then(|parsed| {
                parsed.validate(&self.defn)?;
                Ok(self.evaluate_match(&parsed))
            }),
        };

        match matches {
            Ok(matches) => {
                self.matches.set_attribute(Some(matches));
                self.attribute_filter = Some(query.to_string());
                // the iteration cursor selects with the filter
                self.cursor.close();
                self.reset_feature_reading();
                Ok(())
            }
            Err(e) => {
                error!("cannot set attribute filter '{query}': {e}");
                self.clear_attribute_filter();
                Err(e)
            }
        }
    }

    fn clear_attribute_filter(&mut self) {
        self.matches.set_attribute(None);
        if self.attribute_filter.take().is_some() {
            self.cursor.close();
        }
        self.reset_feature_reading();
    }

    fn attribute_filter(&self) -> Option<&str> {
        self.attribute_filter.as_deref()
    }

    fn try_feature_count(&self) -> Option<u64> {
        if self.matches.is_active() {
            None
        } else {
            Some(self.cidx.count_by_types(FeatureTypes::EXPOSED) as u64)
        }
    }

    /// Bounding box of the whole map. Installed filters are not considered.
    fn get_extent(&self) -> Result<Envelope> {
        Ok(Envelope::from(self.map.map_box()))
    }

    fn has_capability(&self, capability: LayerCaps) -> bool {
        match capability {
            LayerCaps::OLCRandomRead | LayerCaps::OLCFastGetExtent => true,
            LayerCaps::OLCFastFeatureCount | LayerCaps::OLCFastSetNextByIndex => {
                !self.matches.is_active()
            }
            LayerCaps::OLCFastSpatialFilter | LayerCaps::OLCStringsAsUTF8 => false,
        }
    }
}

pub struct FeatureIterator<'a, L: LayerAccess> {
    layer: &'a mut L,
}

impl<L: LayerAccess> Iterator for FeatureIterator<'_, L> {
    type Item = Feature;

    /// Features whose geometry cannot be read are reported and skipped.
    #[inline]
    fn next(&mut self) -> Option<Feature> {
        loop {
            match self.layer.next_feature() {
                Ok(feature) => return feature,
                Err(e) => error!("skipping feature: {e}"),
            }
        }
    }
}

use std::path::Path;
use std::rc::Rc;

use log::debug;

use crate::config::Environment;
use crate::errors::*;
use crate::store::db::DbBackend;
use crate::store::vector::VectorMap;
use crate::vector::{Layer, LayerAccess};

/// Components of a `<gisdbase>/<location>/<mapset>/vector/<map>/head` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasourcePath {
    pub gisdbase: String,
    pub location: String,
    pub mapset: String,
    pub map: String,
}

impl DatasourcePath {
    /// Split a path to the `head` file of a vector map.
    ///
    /// Repeated slashes are ignored. Relative paths need a gisdbase in front
    /// of the location, so at least six components.
    pub fn parse(path: &str) -> Result<Self> {
        let invalid = || GrassError::InvalidDatasource {
            path: path.to_string(),
        };

        let mut rest = path;
        let mut parts = Vec::with_capacity(5);
        while parts.len() < 5 {
            let (head, tail) = rest.rsplit_once('/').ok_or_else(invalid)?;
            rest = head;
            if !tail.is_empty() {
                parts.push(tail);
            }
        }

        let [file, map, vector, mapset, location] = parts.as_slice() else {
            return Err(invalid());
        };
        if *file != "head" || *vector != "vector" {
            return Err(invalid());
        }
        let gisdbase = match rest.trim_end_matches('/') {
            "" => "/",
            gisdbase => gisdbase,
        };

        Ok(DatasourcePath {
            gisdbase: gisdbase.to_string(),
            location: location.to_string(),
            mapset: mapset.to_string(),
            map: map.to_string(),
        })
    }
}

/// Opens vector maps on topology level.
pub trait MapOpener {
    /// Open `map` in `mapset`, resolving the mapset through `env`.
    fn open_map(&self, env: &Environment, map: &str, mapset: &str) -> Result<Rc<dyn VectorMap>>;
}

/// An opened GRASS vector map with one layer per category index field.
///
/// ```no_run
/// use std::rc::Rc;
/// use gdal_grass::Dataset;
/// use gdal_grass::vector::LayerAccess;
/// # fn run(
/// #     opener: &dyn gdal_grass::MapOpener,
/// #     backend: Rc<dyn gdal_grass::store::DbBackend>,
/// # ) -> gdal_grass::errors::Result<()> {
/// let path = "/data/grassdata/world/PERMANENT/vector/roads/head";
/// let mut dataset = Dataset::open(path, opener, backend)?;
/// let layer = dataset.layer_by_name("roads")?;
/// println!("{} features", layer.feature_count());
/// # Ok(())
/// # }
/// ```
pub struct Dataset {
    layers: Vec<Layer>,
    path: Option<DatasourcePath>,
    env: Rc<Environment>,
}

impl Dataset {
    /// Open the vector map whose `head` file is `path`.
    pub fn open<P: AsRef<Path>>(
        path: P,
        opener: &dyn MapOpener,
        backend: Rc<dyn DbBackend>,
    ) -> Result<Dataset> {
        let path = path.as_ref();
        let name = path.to_string_lossy();
        let invalid = || GrassError::InvalidDatasource {
            path: name.to_string(),
        };

        if !name.contains("vector") || !name.contains("head") {
            return Err(invalid());
        }
        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => invalid(),
            _ => GrassError::Io(e),
        })?;
        if !metadata.is_file() {
            return Err(invalid());
        }
        let ds_path = DatasourcePath::parse(&name)?;
        debug!("Gisdbase: {}", ds_path.gisdbase);
        debug!("Location: {}", ds_path.location);
        debug!("Mapset: {}", ds_path.mapset);
        debug!("Map: {}", ds_path.map);

        let env = Environment::for_mapset(&ds_path.gisdbase, &ds_path.location, &ds_path.mapset)?;
        let map = opener.open_map(&env, &ds_path.map, &ds_path.mapset)?;

        let mut dataset = Self::from_map(map, env, backend);
        dataset.path = Some(ds_path);
        Ok(dataset)
    }

    /// Wrap a map that is already open.
    pub fn from_map(
        map: Rc<dyn VectorMap>,
        env: Environment,
        backend: Rc<dyn DbBackend>,
    ) -> Dataset {
        let env = Rc::new(env);
        let num_fields = map.cidx_num_fields();
        debug!("Num layers = {num_fields}");
        let layers = (0..num_fields)
            .map(|i| Layer::new(map.clone(), i, env.clone(), backend.clone()))
            .collect();
        Dataset {
            layers,
            path: None,
            env,
        }
    }

    /// Path components, when opened from a path.
    pub fn path(&self) -> Option<&DatasourcePath> {
        self.path.as_ref()
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&mut self, idx: usize) -> Result<&mut Layer> {
        let count = self.layers.len();
        self.layers
            .get_mut(idx)
            .ok_or(GrassError::InvalidLayerIndex { index: idx, count })
    }

    /// Get layer with `name`.
    pub fn layer_by_name(&mut self, name: &str) -> Result<&mut Layer> {
        self.layers
            .iter_mut()
            .find(|l| l.name() == name)
            .ok_or_else(|| GrassError::LayerNotFound(name.to_string()))
    }

    pub fn layers(&self) -> std::slice::Iter<'_, Layer> {
        self.layers.iter()
    }

    pub fn into_layers(self) -> Vec<Layer> {
        self.layers
    }
}

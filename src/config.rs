//! GRASS environment context
//!
//! The GRASS libraries keep their location, mapset and search path in
//! process-wide variables. Here that state lives in an [`Environment`] value
//! which a [`Dataset`](crate::Dataset) creates and hands to each of its layers.
//!
//! ```
//! use gdal_grass::config::Environment;
//!
//! let env = Environment::for_mapset("/data/grassdata", "world", "PERMANENT").unwrap();
//!
//! assert_eq!(env.get_var("MAPSET"), Some("PERMANENT"));
//! assert_eq!(
//!     env.expand("$GISDBASE/$LOCATION_NAME/$MAPSET/sqlite/sqlite.db"),
//!     "/data/grassdata/world/PERMANENT/sqlite/sqlite.db"
//! );
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use log::{debug, warn};

use crate::errors::{GrassError, Result};

pub const GISBASE: &str = "GISBASE";
pub const GISDBASE: &str = "GISDBASE";
pub const LOCATION_NAME: &str = "LOCATION_NAME";
pub const MAPSET: &str = "MAPSET";

/// Installation directory used when `GISBASE` is not set in the process environment.
pub const DEFAULT_GISBASE: &str = "/usr/local/grass";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
    search_path: Vec<String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment pointing at one mapset, with that mapset as the only entry
    /// of the search path. `GISBASE` is taken from the process environment.
    pub fn for_mapset(gisdbase: &str, location: &str, mapset: &str) -> Result<Self> {
        let mut env = Environment::new();
        env.set_var(GISBASE, &gisbase_from_process())?;
        env.set_var(GISDBASE, gisdbase)?;
        env.set_var(LOCATION_NAME, location)?;
        env.set_var(MAPSET, mapset)?;
        env.reset_mapsets();
        env.add_mapset_to_search_path(mapset);
        Ok(env)
    }

    /// Set a variable. Names and values must not contain NUL, names must not contain `=`.
    pub fn set_var(&mut self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() || key.contains('\0') || key.contains('=') {
            return Err(GrassError::BadArgument(format!(
                "invalid environment variable name '{}'",
                key.escape_debug()
            )));
        }
        if value.contains('\0') {
            return Err(GrassError::BadArgument(format!(
                "value of '{key}' contains a NUL byte"
            )));
        }
        debug!("set {key} = {value}");
        self.vars.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn clear_var(&mut self, key: &str) {
        self.vars.remove(key);
    }

    pub fn gisbase(&self) -> &str {
        self.get_var(GISBASE).unwrap_or(DEFAULT_GISBASE)
    }

    pub fn search_path(&self) -> &[String] {
        &self.search_path
    }

    pub fn reset_mapsets(&mut self) {
        self.search_path.clear();
    }

    pub fn add_mapset_to_search_path(&mut self, mapset: &str) {
        if !self.search_path.iter().any(|m| m == mapset) {
            self.search_path.push(mapset.to_string());
        }
    }

    /// `$GISDBASE/$LOCATION_NAME/$MAPSET`, if all three are set.
    pub fn mapset_path(&self) -> Option<PathBuf> {
        let mut path = PathBuf::from(self.get_var(GISDBASE)?);
        path.push(self.get_var(LOCATION_NAME)?);
        path.push(self.get_var(MAPSET)?);
        Some(path)
    }

    /// Substitute `$GISBASE`, `$GISDBASE`, `$LOCATION_NAME` and `$MAPSET`
    /// in a database connection string. Unset variables are left as written.
    pub fn expand(&self, s: &str) -> String {
        let mut rv = s.to_string();
        for key in [LOCATION_NAME, GISDBASE, GISBASE, MAPSET] {
            if let Some(value) = self.get_var(key) {
                rv = rv.replace(&format!("${key}"), value);
            }
        }
        rv
    }
}

fn gisbase_from_process() -> String {
    match std::env::var(GISBASE) {
        Ok(gisbase) if !gisbase.is_empty() => gisbase,
        _ => {
            warn!(
                "GRASS warning: GISBASE environment variable was not set, using: {DEFAULT_GISBASE}"
            );
            DEFAULT_GISBASE.to_string()
        }
    }
}

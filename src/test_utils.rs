use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::config::Environment;
use crate::errors::{GrassError, Result};
use crate::store::db::{
    CursorMode, DbBackend, DbColumn, DbCursor, DbDriver, DbValue, FetchDirection,
};
use crate::store::vector::{
    BoundBox, CategoryEntry, FeatureTypes, FieldLink, LinePoints, VectorMap,
};
use crate::vector::{AttributeQuery, Row};
use crate::MapOpener;

/// A field link to `table` in the default sqlite database of the mapset.
pub fn link(number: i32, table: &str, key: &str) -> FieldLink {
    FieldLink {
        number,
        name: None,
        table: table.to_string(),
        key: key.to_string(),
        database: "$GISDBASE/$LOCATION_NAME/$MAPSET/sqlite/sqlite.db".to_string(),
        driver: "sqlite".to_string(),
    }
}

/// A temporary `<gisdbase>/<location>/<mapset>/vector/<map>/head` tree.
pub struct TempDatasource {
    _temp_dir: tempfile::TempDir,
    head: PathBuf,
}

impl TempDatasource {
    pub fn new(location: &str, mapset: &str, map: &str) -> Self {
        let _temp_dir = tempfile::tempdir().unwrap();
        let map_dir = _temp_dir
            .path()
            .join("grassdata")
            .join(location)
            .join(mapset)
            .join("vector")
            .join(map);
        std::fs::create_dir_all(&map_dir).unwrap();
        let head = map_dir.join("head");
        std::fs::write(&head, "ORGANIZATION: test\nMAP NAME:     test\n").unwrap();
        Self { _temp_dir, head }
    }

    pub fn head_path(&self) -> &Path {
        &self.head
    }
}

#[derive(Debug, Clone)]
struct MemoryArea {
    boundary: LinePoints,
    isles: Vec<i32>,
}

/// A vector map held in memory. Line, area and isle ids start at 1.
#[derive(Debug, Clone, Default)]
pub struct MemoryMap {
    is_3d: bool,
    lines: Vec<LinePoints>,
    areas: Vec<MemoryArea>,
    isles: Vec<LinePoints>,
    /// Category index per layer number, kept sorted by category.
    cidx: BTreeMap<i32, Vec<CategoryEntry>>,
    links: BTreeMap<i32, FieldLink>,
}

fn points_2d(coords: &[(f64, f64)]) -> LinePoints {
    coords.iter().map(|(x, y)| (*x, *y, 0.0)).collect()
}

fn points_box(points: &LinePoints) -> BoundBox {
    let mut bbox = BoundBox {
        n: f64::NEG_INFINITY,
        s: f64::INFINITY,
        e: f64::NEG_INFINITY,
        w: f64::INFINITY,
        t: f64::NEG_INFINITY,
        b: f64::INFINITY,
    };
    for i in 0..points.len() {
        bbox.n = bbox.n.max(points.y[i]);
        bbox.s = bbox.s.min(points.y[i]);
        bbox.e = bbox.e.max(points.x[i]);
        bbox.w = bbox.w.min(points.x[i]);
        bbox.t = bbox.t.max(points.z[i]);
        bbox.b = bbox.b.min(points.z[i]);
    }
    bbox
}

impl MemoryMap {
    pub fn new(is_3d: bool) -> Self {
        MemoryMap {
            is_3d,
            ..Default::default()
        }
    }

    /// Add a raw category index entry.
    pub fn add_entry(&mut self, field: i32, cat: i32, feature_type: FeatureTypes, id: i32) {
        let entries = self.cidx.entry(field).or_default();
        let at = entries.partition_point(|e| e.cat <= cat);
        entries.insert(
            at,
            CategoryEntry {
                cat,
                feature_type,
                id,
            },
        );
    }

    fn push_line(&mut self, points: LinePoints) -> i32 {
        self.lines.push(points);
        self.lines.len() as i32
    }

    pub fn add_point(&mut self, field: i32, cat: i32, x: f64, y: f64) -> i32 {
        self.add_point_3d(field, cat, x, y, 0.0)
    }

    pub fn add_point_3d(&mut self, field: i32, cat: i32, x: f64, y: f64, z: f64) -> i32 {
        let line = self.push_line(vec![(x, y, z)].into_iter().collect());
        self.add_entry(field, cat, FeatureTypes::POINT, line);
        line
    }

    pub fn add_centroid(&mut self, field: i32, cat: i32, x: f64, y: f64) -> i32 {
        let line = self.push_line(points_2d(&[(x, y)]));
        self.add_entry(field, cat, FeatureTypes::CENTROID, line);
        line
    }

    pub fn add_line(&mut self, field: i32, cat: i32, coords: &[(f64, f64)]) -> i32 {
        let line = self.push_line(points_2d(coords));
        self.add_entry(field, cat, FeatureTypes::LINE, line);
        line
    }

    pub fn add_line_3d(&mut self, field: i32, cat: i32, coords: &[(f64, f64, f64)]) -> i32 {
        let line = self.push_line(coords.iter().copied().collect());
        self.add_entry(field, cat, FeatureTypes::LINE, line);
        line
    }

    pub fn add_boundary(&mut self, field: i32, cat: i32, coords: &[(f64, f64)]) -> i32 {
        let line = self.push_line(points_2d(coords));
        self.add_entry(field, cat, FeatureTypes::BOUNDARY, line);
        line
    }

    /// Add an area and its isles without indexing it. Returns the area id.
    pub fn add_area(&mut self, exterior: &[(f64, f64)], isles: &[&[(f64, f64)]]) -> i32 {
        let isles = isles
            .iter()
            .map(|isle| {
                self.isles.push(points_2d(isle));
                self.isles.len() as i32
            })
            .collect();
        self.areas.push(MemoryArea {
            boundary: points_2d(exterior),
            isles,
        });
        self.areas.len() as i32
    }

    pub fn add_area_entry(&mut self, field: i32, cat: i32, area: i32) {
        self.add_entry(field, cat, FeatureTypes::AREA, area);
    }

    pub fn set_link(&mut self, link: FieldLink) {
        self.links.insert(link.number, link);
    }

    pub fn opener(self) -> MemoryOpener {
        MemoryOpener {
            map: Rc::new(self),
            opened: RefCell::new(Vec::new()),
        }
    }

    fn entries(&self, index: usize) -> &[CategoryEntry] {
        self.cidx
            .values()
            .nth(index)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn not_found(id: i32, what: &str) -> GrassError {
        GrassError::GeometryReadFailed {
            id,
            msg: format!("no {what} {id}"),
        }
    }
}

impl VectorMap for MemoryMap {
    fn is_3d(&self) -> bool {
        self.is_3d
    }

    fn map_box(&self) -> BoundBox {
        let all: LinePoints = self
            .lines
            .iter()
            .chain(self.areas.iter().map(|a| &a.boundary))
            .flat_map(|p| (0..p.len()).map(move |i| (p.x[i], p.y[i], p.z[i])))
            .collect();
        if all.is_empty() {
            BoundBox::default()
        } else {
            points_box(&all)
        }
    }

    fn cidx_num_fields(&self) -> usize {
        self.cidx.len()
    }

    fn cidx_field_number(&self, index: usize) -> i32 {
        self.cidx.keys().nth(index).copied().unwrap_or(-1)
    }

    fn cidx_num_cats_by_index(&self, index: usize) -> usize {
        self.entries(index).len()
    }

    fn cidx_type_count(&self, field: i32, types: FeatureTypes) -> usize {
        self.cidx
            .get(&field)
            .map_or(0, |entries| {
                entries
                    .iter()
                    .filter(|e| types.intersects(e.feature_type))
                    .count()
            })
    }

    fn cidx_types_by_index(&self, index: usize) -> Vec<(FeatureTypes, usize)> {
        let mut counts: Vec<(FeatureTypes, usize)> = Vec::new();
        for entry in self.entries(index) {
            match counts.iter_mut().find(|(t, _)| *t == entry.feature_type) {
                Some((_, count)) => *count += 1,
                None => counts.push((entry.feature_type, 1)),
            }
        }
        counts
    }

    fn cidx_cat_by_index(&self, index: usize, position: usize) -> CategoryEntry {
        self.entries(index)[position]
    }

    fn field_link(&self, field: i32) -> Option<FieldLink> {
        self.links.get(&field).cloned()
    }

    fn read_line(&self, line: i32) -> Result<LinePoints> {
        usize::try_from(line - 1)
            .ok()
            .and_then(|i| self.lines.get(i))
            .cloned()
            .ok_or_else(|| Self::not_found(line, "line"))
    }

    fn area_points(&self, area: i32) -> Result<LinePoints> {
        usize::try_from(area - 1)
            .ok()
            .and_then(|i| self.areas.get(i))
            .map(|a| a.boundary.clone())
            .ok_or_else(|| Self::not_found(area, "area"))
    }

    fn area_isles(&self, area: i32) -> Vec<i32> {
        usize::try_from(area - 1)
            .ok()
            .and_then(|i| self.areas.get(i))
            .map(|a| a.isles.clone())
            .unwrap_or_default()
    }

    fn isle_points(&self, isle: i32) -> Result<LinePoints> {
        usize::try_from(isle - 1)
            .ok()
            .and_then(|i| self.isles.get(i))
            .cloned()
            .ok_or_else(|| Self::not_found(isle, "isle"))
    }

    fn line_box(&self, line: i32) -> BoundBox {
        self.read_line(line).map(|p| points_box(&p)).unwrap_or_default()
    }

    fn area_box(&self, area: i32) -> BoundBox {
        self.area_points(area).map(|p| points_box(&p)).unwrap_or_default()
    }
}

/// Hands out one in-memory map and records what was asked for.
pub struct MemoryOpener {
    map: Rc<MemoryMap>,
    opened: RefCell<Vec<(String, String)>>,
}

impl MemoryOpener {
    /// `(map, mapset)` pairs opened so far.
    pub fn opened(&self) -> Vec<(String, String)> {
        self.opened.borrow().clone()
    }
}

impl MapOpener for MemoryOpener {
    fn open_map(&self, env: &Environment, map: &str, mapset: &str) -> Result<Rc<dyn VectorMap>> {
        assert_eq!(env.get_var("MAPSET"), Some(mapset));
        self.opened
            .borrow_mut()
            .push((map.to_string(), mapset.to_string()));
        Ok(self.map.clone())
    }
}

#[derive(Debug, Clone)]
struct MemoryTable {
    columns: Vec<DbColumn>,
    rows: Vec<Vec<DbValue>>,
}

#[derive(Debug, Default)]
struct DbState {
    tables: HashMap<String, MemoryTable>,
    unavailable: bool,
    failing_fetch: bool,
    drivers_started: usize,
    open_drivers: usize,
    open_cursors: usize,
    databases: Vec<String>,
    queries: Vec<String>,
    rewrites: HashMap<String, String>,
}

/// An attribute database held in memory.
///
/// Cursors run the `SELECT` statements the layers generate, evaluating the
/// `WHERE` clause with [`AttributeQuery`].
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Rc<RefCell<DbState>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&self, name: &str, columns: Vec<DbColumn>, rows: Vec<Vec<DbValue>>) {
        self.state
            .borrow_mut()
            .tables
            .insert(name.to_string(), MemoryTable { columns, rows });
    }

    /// Evaluate the `WHERE` condition `sql` as `local`, for SQL the
    /// in-memory evaluator does not speak.
    pub fn add_rewrite(&self, sql: &str, local: &str) {
        self.state
            .borrow_mut()
            .rewrites
            .insert(sql.to_string(), local.to_string());
    }

    /// Make every driver start fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.borrow_mut().unavailable = unavailable;
    }

    /// Make every fetch fail.
    pub fn set_failing_fetch(&self, failing: bool) {
        self.state.borrow_mut().failing_fetch = failing;
    }

    pub fn drivers_started(&self) -> usize {
        self.state.borrow().drivers_started
    }

    pub fn open_drivers(&self) -> usize {
        self.state.borrow().open_drivers
    }

    pub fn open_cursors(&self) -> usize {
        self.state.borrow().open_cursors
    }

    /// Database strings drivers were started on.
    pub fn databases(&self) -> Vec<String> {
        self.state.borrow().databases.clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.borrow().queries.clone()
    }
}

fn db_error(method_name: &'static str, msg: String) -> GrassError {
    GrassError::DbError { method_name, msg }
}

impl DbBackend for MemoryDatabase {
    fn start_driver(&self, driver: &str, database: &str) -> Result<Box<dyn DbDriver>> {
        let mut state = self.state.borrow_mut();
        if state.unavailable {
            return Err(db_error("start_driver", format!("driver '{driver}' is not available")));
        }
        state.drivers_started += 1;
        state.open_drivers += 1;
        state.databases.push(database.to_string());
        Ok(Box::new(MemoryDriver {
            state: self.state.clone(),
            open: true,
        }))
    }
}

struct MemoryDriver {
    state: Rc<RefCell<DbState>>,
    open: bool,
}

impl MemoryDriver {
    fn table(&self, name: &str) -> Result<MemoryTable> {
        self.state
            .borrow()
            .tables
            .get(name)
            .cloned()
            .ok_or_else(|| db_error("describe_table", format!("no table '{name}'")))
    }
}

/// `SELECT * FROM <table> [WHERE <cond>] [ORDER BY <column>]`
fn parse_select(sql: &str) -> Result<(&str, Option<&str>, Option<&str>)> {
    let rest = sql
        .strip_prefix("SELECT * FROM ")
        .ok_or_else(|| db_error("open_select_cursor", format!("unsupported statement '{sql}'")))?;
    let (table, rest) = rest.split_once(' ').unwrap_or((rest, ""));
    let (cond, order) = match rest.rfind("ORDER BY ") {
        Some(i) => (&rest[..i], Some(rest[i + "ORDER BY ".len()..].trim())),
        None => (rest, None),
    };
    let cond = cond.trim();
    let cond = match cond.strip_prefix("WHERE ") {
        Some(cond) => Some(cond.trim()),
        None if cond.is_empty() => None,
        None => {
            return Err(db_error(
                "open_select_cursor",
                format!("cannot parse '{sql}'"),
            ))
        }
    };
    Ok((table, cond, order))
}

impl DbDriver for MemoryDriver {
    fn describe_table(&mut self, table: &str) -> Result<Vec<DbColumn>> {
        Ok(self.table(table)?.columns)
    }

    fn open_select_cursor(&mut self, sql: &str, mode: CursorMode) -> Result<Box<dyn DbCursor>> {
        let (table, cond, order) = parse_select(sql)?;
        let MemoryTable { columns, mut rows } = self.table(table)?;

        let cond = cond.map(|cond| {
            self.state
                .borrow()
                .rewrites
                .get(cond)
                .cloned()
                .unwrap_or_else(|| cond.to_string())
        });
        if let Some(cond) = cond.as_deref() {
            let query = AttributeQuery::parse(cond)
                .map_err(|e| db_error("open_select_cursor", e.to_string()))?;
            if let Some(name) = query
                .field_names()
                .into_iter()
                .find(|n| !columns.iter().any(|c| c.name.eq_ignore_ascii_case(n)))
            {
                return Err(db_error("open_select_cursor", format!("no column '{name}'")));
            }
            rows.retain(|values| {
                query.evaluate(&Row {
                    columns: &columns,
                    values,
                })
            });
        }
        if let Some(order) = order {
            let idx = columns
                .iter()
                .position(|c| c.name.eq_ignore_ascii_case(order))
                .ok_or_else(|| db_error("open_select_cursor", format!("no column '{order}'")))?;
            rows.sort_by_key(|r| r[idx].as_int());
        }

        let mut state = self.state.borrow_mut();
        state.queries.push(sql.to_string());
        state.open_cursors += 1;
        Ok(Box::new(MemoryCursor {
            state: self.state.clone(),
            columns,
            rows,
            mode,
            pos: -1,
            open: true,
        }))
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            self.state.borrow_mut().open_drivers -= 1;
        }
        Ok(())
    }
}

struct MemoryCursor {
    state: Rc<RefCell<DbState>>,
    columns: Vec<DbColumn>,
    rows: Vec<Vec<DbValue>>,
    mode: CursorMode,
    /// -1 before the first row, `rows.len()` after the last.
    pos: isize,
    open: bool,
}

impl DbCursor for MemoryCursor {
    fn columns(&self) -> &[DbColumn] {
        &self.columns
    }

    fn num_rows(&self) -> usize {
        self.rows.len()
    }

    fn fetch(&mut self, direction: FetchDirection) -> Result<Option<Vec<DbValue>>> {
        if !self.open {
            return Err(db_error("fetch", "cursor is closed".to_string()));
        }
        if self.state.borrow().failing_fetch {
            return Err(db_error("fetch", "fetch failed".to_string()));
        }
        if self.mode == CursorMode::Sequential && direction != FetchDirection::Next {
            return Err(db_error("fetch", format!("{direction:?} on a sequential cursor")));
        }
        let len = self.rows.len() as isize;
        self.pos = match direction {
            FetchDirection::First => 0,
            FetchDirection::Next => (self.pos + 1).min(len),
            FetchDirection::Previous => (self.pos - 1).max(-1),
            FetchDirection::Current => self.pos,
            FetchDirection::Last => len - 1,
        };
        Ok(usize::try_from(self.pos)
            .ok()
            .and_then(|i| self.rows.get(i))
            .cloned())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.state.borrow_mut().open_cursors -= 1;
        }
    }
}

#[test]
fn test_memory_database_select() {
    let db = MemoryDatabase::new();
    db.add_table(
        "t",
        vec![
            DbColumn::new("cat", crate::store::db::SqlType::Integer),
            DbColumn::new("name", crate::store::db::SqlType::Text),
        ],
        vec![
            vec![DbValue::Int(2), DbValue::String("b".into())],
            vec![DbValue::Int(1), DbValue::String("a".into())],
        ],
    );
    let mut driver = db.start_driver("sqlite", "x").unwrap();
    let mut cursor = driver
        .open_select_cursor("SELECT * FROM t ORDER BY cat", CursorMode::Scroll)
        .unwrap();
    assert_eq!(cursor.num_rows(), 2);
    assert_eq!(cursor.fetch(FetchDirection::Next).unwrap().unwrap()[0], DbValue::Int(1));
    assert_eq!(cursor.fetch(FetchDirection::First).unwrap().unwrap()[0], DbValue::Int(1));
    assert!(cursor.fetch(FetchDirection::Previous).unwrap().is_none());
    assert_eq!(cursor.fetch(FetchDirection::Next).unwrap().unwrap()[0], DbValue::Int(1));
    cursor.close();

    let mut cursor = driver
        .open_select_cursor("SELECT * FROM t WHERE name = 'b' ", CursorMode::Sequential)
        .unwrap();
    assert_eq!(cursor.fetch(FetchDirection::Next).unwrap().unwrap()[0], DbValue::Int(2));
    assert!(cursor.fetch(FetchDirection::Next).unwrap().is_none());
    assert!(cursor.fetch(FetchDirection::First).is_err());
    cursor.close();

    assert!(driver
        .open_select_cursor("SELECT * FROM t WHERE nope = 1", CursorMode::Scroll)
        .is_err());
    driver.shutdown().unwrap();
    driver.shutdown().unwrap();
    assert_eq!(db.open_drivers(), 0);
    assert_eq!(db.open_cursors(), 0);
}

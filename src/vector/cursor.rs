use log::debug;

use crate::errors::*;
use crate::store::db::{CursorMode, DbValue, FetchDirection};
use crate::vector::attributes::{AttributeLink, CursorHandle, DriverSession};

/// The forward-only cursor a layer reads attributes through while iterating.
///
/// Rows come ordered by key and are only ever fetched forward, so features
/// must ask for categories in non-decreasing order between two resets.
pub(crate) enum SequentialCursor {
    Closed,
    Open {
        cursor: CursorHandle,
        /// Last fetched row and its category, `None` before the first fetch.
        current: Option<(i32, Vec<DbValue>)>,
    },
}

impl SequentialCursor {
    pub fn is_open(&self) -> bool {
        matches!(self, SequentialCursor::Open { .. })
    }

    /// Open a scrollable cursor over `SELECT * FROM <table> [WHERE <filter>] ORDER BY <key>`,
    /// replacing the cursor already open.
    pub fn open(
        &mut self,
        session: &mut DriverSession,
        attr: &AttributeLink,
        filter: Option<&str>,
    ) -> Result<()> {
        self.close();
        let cursor = session.open_cursor(&attr.select_sql(filter), CursorMode::Scroll)?;
        *self = SequentialCursor::Open {
            cursor,
            current: None,
        };
        Ok(())
    }

    pub fn close(&mut self) {
        if self.is_open() {
            debug!("closing sequential cursor");
        }
        *self = SequentialCursor::Closed;
    }

    /// Put the cursor before its first row.
    pub fn reset(&mut self) -> Result<()> {
        if let SequentialCursor::Open { cursor, current } = self {
            cursor.fetch(FetchDirection::First)?;
            cursor.fetch(FetchDirection::Previous)?;
            *current = None;
        }
        Ok(())
    }

    /// Move forward until a row with category `>= target` is current and
    /// return that row if its category is `target`.
    ///
    /// Never moves backwards: a target below the current category is not found.
    pub fn advance_to(
        &mut self,
        target: i32,
        attr: &AttributeLink,
    ) -> Result<Option<Vec<DbValue>>> {
        let SequentialCursor::Open { cursor, current } = self else {
            return Err(GrassError::AttributeFetchFailed {
                method_name: "advance_to",
                msg: "cursor is not opened".to_string(),
            });
        };
        if current.as_ref().map_or(true, |(cat, _)| *cat < target) {
            while let Some(row) = cursor.fetch(FetchDirection::Next)? {
                let cat = attr.row_category(&row)?;
                *current = Some((cat, row));
                if cat >= target {
                    break;
                }
            }
        }
        Ok(current
            .as_ref()
            .filter(|(cat, _)| *cat == target)
            .map(|(_, row)| row.clone()))
    }
}

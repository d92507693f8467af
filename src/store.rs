use crate::coord::Coord;
use crate::model::{Cell, CellId, Column, ColumnId, Row, RowId};
use ahash::AHashMap;

/// Entity addressed by a row or column index.
pub(crate) trait AxisEntity {
    fn create(index: u32) -> Self;
    fn index(&self) -> u32;
    fn set_index(&mut self, index: u32);
}

impl AxisEntity for Row {
    fn create(index: u32) -> Self {
        Row::new(index)
    }

    fn index(&self) -> u32 {
        self.index
    }

    fn set_index(&mut self, index: u32) {
        self.index = index;
    }
}

impl AxisEntity for Column {
    fn create(index: u32) -> Self {
        Column::new(index)
    }

    fn index(&self) -> u32 {
        self.index
    }

    fn set_index(&mut self, index: u32) {
        self.index = index;
    }
}

/// Arena of row or column entities, one per index, created lazily.
#[derive(Debug)]
struct Axis<E> {
    entities: AHashMap<u32, E>,
    by_index: AHashMap<u32, u32>,
    next_id: u32,
}

impl<E: AxisEntity> Axis<E> {
    fn new() -> Self {
        Self {
            entities: AHashMap::new(),
            by_index: AHashMap::new(),
            next_id: 0,
        }
    }

    fn lookup(&self, index: u32) -> Option<u32> {
        self.by_index.get(&index).copied()
    }

    fn get_or_create(&mut self, index: u32) -> u32 {
        if let Some(id) = self.lookup(index) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.entities.insert(id, E::create(index));
        self.by_index.insert(index, id);
        id
    }

    fn get(&self, id: u32) -> Option<&E> {
        self.entities.get(&id)
    }

    fn get_mut(&mut self, id: u32) -> Option<&mut E> {
        self.entities.get_mut(&id)
    }

    fn index_of(&self, id: u32) -> Option<u32> {
        self.entities.get(&id).map(AxisEntity::index)
    }

    /// Renumbers entities at or after `start` by `+count`, highest index
    /// first. Entities pushed to `limit` or beyond are dropped and returned.
    fn insert(&mut self, start: u32, count: u32, limit: u32) -> Vec<u32> {
        let mut moving: Vec<(u32, u32)> = self
            .by_index
            .iter()
            .filter(|(index, _)| **index >= start)
            .map(|(index, id)| (*index, *id))
            .collect();
        moving.sort_unstable_by(|a, b| b.0.cmp(&a.0));

        let mut dropped = Vec::new();
        for (index, id) in moving {
            self.by_index.remove(&index);
            match index.checked_add(count).filter(|next| *next < limit) {
                Some(next) => {
                    debug_assert!(!self.by_index.contains_key(&next));
                    if let Some(entity) = self.entities.get_mut(&id) {
                        entity.set_index(next);
                    }
                    self.by_index.insert(next, id);
                }
                None => {
                    self.entities.remove(&id);
                    dropped.push(id);
                }
            }
        }
        dropped
    }

    /// Drops entities inside `[start, start + count)` and renumbers the ones
    /// after it by `-count`, lowest index first.
    fn delete(&mut self, start: u32, count: u32) -> Vec<u32> {
        let end = start.saturating_add(count);
        let mut dropped = Vec::new();
        let mut moving: Vec<(u32, u32)> = Vec::new();
        for (index, id) in &self.by_index {
            if (start..end).contains(index) {
                dropped.push(*id);
            } else if *index >= end {
                moving.push((*index, *id));
            }
        }
        for id in &dropped {
            if let Some(entity) = self.entities.remove(id) {
                self.by_index.remove(&entity.index());
            }
        }

        moving.sort_unstable_by_key(|(index, _)| *index);
        for (index, id) in moving {
            let next = index - count;
            self.by_index.remove(&index);
            debug_assert!(!self.by_index.contains_key(&next));
            if let Some(entity) = self.entities.get_mut(&id) {
                entity.set_index(next);
            }
            self.by_index.insert(next, id);
        }
        dropped
    }
}

/// Which axis a structural edit runs along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EditAxis {
    Rows,
    Columns,
}

/// Outcome of a structural remap of the cache.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub moved: usize,
    pub evicted: Vec<Coord>,
}

/// Owning map from coordinate to cell, plus the row and column arenas the
/// cells link to.
#[derive(Debug)]
pub struct CellStore {
    cells: AHashMap<CellId, Cell>,
    by_coord: AHashMap<Coord, CellId>,
    rows: Axis<Row>,
    columns: Axis<Column>,
    next_cell: u32,
}

impl Default for CellStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CellStore {
    pub fn new() -> Self {
        Self {
            cells: AHashMap::new(),
            by_coord: AHashMap::new(),
            rows: Axis::new(),
            columns: Axis::new(),
            next_cell: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn lookup(&self, at: Coord) -> Option<CellId> {
        self.by_coord.get(&at).copied()
    }

    pub fn at(&self, at: Coord) -> Option<&Cell> {
        self.lookup(at).and_then(|id| self.cells.get(&id))
    }

    pub fn get(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(&id)
    }

    pub fn get_mut(&mut self, id: CellId) -> Option<&mut Cell> {
        self.cells.get_mut(&id)
    }

    /// Returns the cell at `at`, creating it (and its row/column) on first access.
    pub fn get_or_create(&mut self, at: Coord) -> CellId {
        if let Some(id) = self.lookup(at) {
            return id;
        }
        let row = self.row_id(at.row);
        let column = self.column_id(at.col);
        let id = CellId(self.next_cell);
        self.next_cell += 1;
        self.cells.insert(id, Cell::new(id, row, column));
        self.by_coord.insert(at, id);
        id
    }

    /// Mutable access to the cell at `at`, creating it on first access.
    pub fn cell_mut_at(&mut self, at: Coord) -> &mut Cell {
        let id = self.get_or_create(at);
        let row = self.row_id(at.row);
        let column = self.column_id(at.col);
        self.cells
            .entry(id)
            .or_insert_with(|| Cell::new(id, row, column))
    }

    pub fn row_id(&mut self, index: u32) -> RowId {
        RowId(self.rows.get_or_create(index))
    }

    pub fn column_id(&mut self, index: u32) -> ColumnId {
        ColumnId(self.columns.get_or_create(index))
    }

    pub fn row(&self, id: RowId) -> Option<&Row> {
        self.rows.get(id.0)
    }

    pub fn row_mut(&mut self, id: RowId) -> Option<&mut Row> {
        self.rows.get_mut(id.0)
    }

    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.get(id.0)
    }

    pub fn coord_of(&self, id: CellId) -> Option<Coord> {
        let cell = self.cells.get(&id)?;
        Some(Coord::new(
            self.rows.index_of(cell.row_id().0)?,
            self.columns.index_of(cell.column_id().0)?,
        ))
    }

    pub fn evict(&mut self, id: CellId) -> Option<(Coord, Cell)> {
        let at = self.coord_of(id)?;
        self.by_coord.remove(&at);
        self.cells.remove(&id).map(|cell| (at, cell))
    }

    pub fn ids(&self) -> Vec<CellId> {
        self.cells.keys().copied().collect()
    }

    /// Cached cells in row-major order.
    pub fn sorted(&self) -> Vec<(Coord, &Cell)> {
        let mut cells: Vec<(Coord, &Cell)> = self
            .by_coord
            .iter()
            .filter_map(|(at, id)| self.cells.get(id).map(|cell| (*at, cell)))
            .collect();
        cells.sort_unstable_by_key(|(at, _)| *at);
        cells
    }

    pub fn insert_rows(&mut self, start: u32, count: u32, limit: u32) -> Relocation {
        self.insert_along(EditAxis::Rows, start, count, limit)
    }

    pub fn delete_rows(&mut self, start: u32, count: u32) -> Relocation {
        self.delete_along(EditAxis::Rows, start, count)
    }

    pub fn insert_columns(&mut self, start: u32, count: u32, limit: u32) -> Relocation {
        self.insert_along(EditAxis::Columns, start, count, limit)
    }

    pub fn delete_columns(&mut self, start: u32, count: u32) -> Relocation {
        self.delete_along(EditAxis::Columns, start, count)
    }

    fn insert_along(&mut self, axis: EditAxis, start: u32, count: u32, limit: u32) -> Relocation {
        let mut relocation = Relocation::default();
        if count == 0 {
            return relocation;
        }

        let mut moving = self.cells_from(axis, start);
        // Highest index first so a relocated key never lands on one still in use.
        moving.sort_unstable_by(|a, b| along(axis, b.0).cmp(&along(axis, a.0)).then(b.0.cmp(&a.0)));

        let dropped = match axis {
            EditAxis::Rows => self.rows.insert(start, count, limit),
            EditAxis::Columns => self.columns.insert(start, count, limit),
        };
        relocation.evicted = self.evict_linked(axis, &dropped);
        relocation.moved = self.rekey(moving);
        relocation
    }

    fn delete_along(&mut self, axis: EditAxis, start: u32, count: u32) -> Relocation {
        let mut relocation = Relocation::default();
        if count == 0 {
            return relocation;
        }

        let end = start.saturating_add(count);
        let mut moving = self.cells_from(axis, end);
        // Lowest index first: each destination was vacated by the eviction or an earlier move.
        moving.sort_unstable_by(|a, b| along(axis, a.0).cmp(&along(axis, b.0)).then(a.0.cmp(&b.0)));

        let dropped = match axis {
            EditAxis::Rows => self.rows.delete(start, count),
            EditAxis::Columns => self.columns.delete(start, count),
        };
        relocation.evicted = self.evict_linked(axis, &dropped);
        relocation.moved = self.rekey(moving);
        relocation
    }

    fn cells_from(&self, axis: EditAxis, from: u32) -> Vec<(Coord, CellId)> {
        self.by_coord
            .iter()
            .filter(|(at, _)| along(axis, **at) >= from)
            .map(|(at, id)| (*at, *id))
            .collect()
    }

    /// Evicts every cell linked to a dropped row/column entity.
    fn evict_linked(&mut self, axis: EditAxis, dropped: &[u32]) -> Vec<Coord> {
        if dropped.is_empty() {
            return Vec::new();
        }
        let victims: Vec<(Coord, CellId)> = self
            .by_coord
            .iter()
            .filter(|(_, id)| {
                self.cells.get(id).is_some_and(|cell| match axis {
                    EditAxis::Rows => dropped.contains(&cell.row_id().0),
                    EditAxis::Columns => dropped.contains(&cell.column_id().0),
                })
            })
            .map(|(at, id)| (*at, *id))
            .collect();

        let mut evicted = Vec::with_capacity(victims.len());
        for (at, id) in victims {
            self.by_coord.remove(&at);
            self.cells.remove(&id);
            evicted.push(at);
        }
        evicted.sort_unstable();
        evicted
    }

    /// Moves coordinate keys to wherever each cell's row/column now sits.
    fn rekey(&mut self, moving: Vec<(Coord, CellId)>) -> usize {
        let mut moved = 0;
        for (old, id) in moving {
            let Some(new) = self.coord_of(id) else {
                continue;
            };
            if self.by_coord.get(&old) == Some(&id) {
                self.by_coord.remove(&old);
            }
            debug_assert!(
                !self.by_coord.contains_key(&new),
                "relocation collided at {new}"
            );
            self.by_coord.insert(new, id);
            moved += 1;
        }
        moved
    }
}

fn along(axis: EditAxis, at: Coord) -> u32 {
    match axis {
        EditAxis::Rows => at.row,
        EditAxis::Columns => at.col,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazy_creation_reuses_entities() {
        let mut store = CellStore::new();
        let a = store.get_or_create(Coord::new(2, 0));
        let b = store.get_or_create(Coord::new(2, 5));
        assert_ne!(a, b);
        assert_eq!(store.get_or_create(Coord::new(2, 0)), a);
        assert_eq!(
            store.get(a).unwrap().row_id(),
            store.get(b).unwrap().row_id()
        );
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn insert_rows_shifts_rows_at_or_after_start() {
        let mut store = CellStore::new();
        let above = store.get_or_create(Coord::new(1, 0));
        let at = store.get_or_create(Coord::new(3, 0));
        let below = store.get_or_create(Coord::new(4, 0));

        let relocation = store.insert_rows(3, 2, 100);
        assert_eq!(relocation.moved, 2);
        assert!(relocation.evicted.is_empty());
        assert_eq!(store.coord_of(above), Some(Coord::new(1, 0)));
        assert_eq!(store.coord_of(at), Some(Coord::new(5, 0)));
        assert_eq!(store.coord_of(below), Some(Coord::new(6, 0)));
        assert_eq!(store.lookup(Coord::new(6, 0)), Some(below));
        assert_eq!(store.lookup(Coord::new(3, 0)), None);
    }

    #[test]
    fn insert_rows_drops_cells_pushed_past_limit() {
        let mut store = CellStore::new();
        store.get_or_create(Coord::new(8, 1));
        let kept = store.get_or_create(Coord::new(2, 1));

        let relocation = store.insert_rows(0, 2, 10);
        assert_eq!(relocation.evicted, vec![Coord::new(8, 1)]);
        assert_eq!(store.coord_of(kept), Some(Coord::new(4, 1)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_columns_evicts_and_shifts_left() {
        let mut store = CellStore::new();
        let a = store.get_or_create(Coord::new(0, 0));
        store.get_or_create(Coord::new(0, 1));
        store.get_or_create(Coord::new(3, 2));
        let d = store.get_or_create(Coord::new(0, 3));

        let relocation = store.delete_columns(1, 2);
        assert_eq!(
            relocation.evicted,
            vec![Coord::new(0, 1), Coord::new(3, 2)]
        );
        assert_eq!(relocation.moved, 1);
        assert_eq!(store.coord_of(a), Some(Coord::new(0, 0)));
        assert_eq!(store.coord_of(d), Some(Coord::new(0, 1)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn dense_insert_has_no_transient_collisions() {
        let mut store = CellStore::new();
        let ids: Vec<CellId> = (0..20)
            .map(|row| store.get_or_create(Coord::new(row, 0)))
            .collect();
        store.insert_rows(0, 1, 1_000);
        for (row, id) in ids.iter().enumerate() {
            assert_eq!(store.coord_of(*id), Some(Coord::new(row as u32 + 1, 0)));
        }
        store.delete_rows(0, 1);
        for (row, id) in ids.iter().enumerate() {
            assert_eq!(store.lookup(Coord::new(row as u32, 0)), Some(*id));
        }
    }
}

//! Groups dirty cells into the fewest bulk writes the surface accepts.

use crate::coord::{Coord, Rect};
use std::collections::BTreeMap;

/// A contiguous group of dirty cells written with one surface call.
///
/// `items` is laid out row by row relative to `rect.top_left()`, so
/// `items[i][j]` belongs at `(rect.top + i, rect.left + j)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk<T> {
    pub rect: Rect,
    pub items: Vec<Vec<T>>,
}

impl<T> Chunk<T> {
    /// Payload of the top-left cell; every cell in a chunk shares it under
    /// the predicate the chunk was built with.
    pub fn anchor(&self) -> Option<&T> {
        self.items.first().and_then(|row| row.first())
    }

    pub fn len(&self) -> usize {
        self.items.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.iter().all(Vec::is_empty)
    }
}

/// Contiguous rows sharing one `hidden` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRun {
    pub first: u32,
    pub last: u32,
    pub hidden: bool,
}

/// Partitions cells into maximal filled rectangles.
///
/// Cells are visited in row-major order. Each unvisited cell anchors a block
/// that first grows right over contiguous compatible cells, then grows down
/// while the full width of the next row is present and compatible. Every
/// input cell lands in exactly one chunk. Duplicate coordinates keep the
/// last payload.
pub fn coalesce_blocks<T, F>(cells: impl IntoIterator<Item = (Coord, T)>, compatible: F) -> Vec<Chunk<T>>
where
    F: Fn(&T, &T) -> bool,
{
    let mut pending: BTreeMap<Coord, T> = cells.into_iter().collect();
    let mut chunks = Vec::new();

    while let Some((anchor, first)) = pending.pop_first() {
        let mut top_row = vec![first];
        let mut right = anchor.col;
        while let Some(next_col) = right.checked_add(1) {
            let next = Coord::new(anchor.row, next_col);
            let fits = pending
                .get(&next)
                .is_some_and(|item| compatible(&top_row[0], item));
            if !fits {
                break;
            }
            if let Some(item) = pending.remove(&next) {
                top_row.push(item);
            }
            right = next_col;
        }

        let mut items = vec![top_row];
        let mut bottom = anchor.row;
        while let Some(next_row) = bottom.checked_add(1) {
            let row_fits = (anchor.col..=right).all(|col| {
                pending
                    .get(&Coord::new(next_row, col))
                    .is_some_and(|item| compatible(&items[0][0], item))
            });
            if !row_fits {
                break;
            }
            let row: Vec<T> = (anchor.col..=right)
                .filter_map(|col| pending.remove(&Coord::new(next_row, col)))
                .collect();
            items.push(row);
            bottom = next_row;
        }

        chunks.push(Chunk {
            rect: Rect::new(anchor, Coord::new(bottom, right)),
            items,
        });
    }

    chunks
}

/// Partitions cells into maximal horizontal runs.
///
/// Cells are sorted into reading order; a run continues while the next cell
/// sits immediately to the right on the same row and the adjacent pair
/// satisfies `compatible`.
pub fn coalesce_runs<T, F>(cells: impl IntoIterator<Item = (Coord, T)>, compatible: F) -> Vec<Chunk<T>>
where
    F: Fn(&T, &T) -> bool,
{
    let sorted: BTreeMap<Coord, T> = cells.into_iter().collect();
    let mut chunks: Vec<Chunk<T>> = Vec::new();
    let mut last: Option<Coord> = None;

    for (at, item) in sorted {
        let extends = match (last, chunks.last()) {
            (Some(prev), Some(chunk)) => {
                prev.row == at.row
                    && prev.col.checked_add(1) == Some(at.col)
                    && chunk.items[0]
                        .last()
                        .is_some_and(|prev_item| compatible(prev_item, &item))
            }
            _ => false,
        };

        match chunks.last_mut() {
            Some(chunk) if extends => {
                chunk.rect.right = at.col;
                chunk.items[0].push(item);
            }
            _ => chunks.push(Chunk {
                rect: Rect::cell(at),
                items: vec![vec![item]],
            }),
        }
        last = Some(at);
    }

    chunks
}

/// One chunk per cell, in reading order.
pub fn singletons<T>(cells: impl IntoIterator<Item = (Coord, T)>) -> Vec<Chunk<T>> {
    coalesce_runs(cells, |_, _| false)
}

/// Groups rows by index into runs of equal `hidden`, splitting at every flip
/// and at every gap in the index sequence.
pub fn coalesce_rows(rows: impl IntoIterator<Item = (u32, bool)>) -> Vec<RowRun> {
    let sorted: BTreeMap<u32, bool> = rows.into_iter().collect();
    let mut runs: Vec<RowRun> = Vec::new();

    for (index, hidden) in sorted {
        match runs.last_mut() {
            Some(run) if run.hidden == hidden && run.last.checked_add(1) == Some(index) => {
                run.last = index;
            }
            _ => runs.push(RowRun {
                first: index,
                last: index,
                hidden,
            }),
        }
    }

    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(row: u32, col: u32) -> Coord {
        Coord::new(row, col)
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let none: Vec<(Coord, u8)> = Vec::new();
        assert!(coalesce_blocks(none.clone(), |_, _| true).is_empty());
        assert!(coalesce_runs(none, |_, _| true).is_empty());
        assert!(coalesce_rows(Vec::new()).is_empty());
    }

    #[test]
    fn singleton_is_one_by_one() {
        let chunks = coalesce_blocks(vec![(at(4, 2), "x")], |_, _| true);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].rect, Rect::cell(at(4, 2)));
        assert_eq!(chunks[0].items, vec![vec!["x"]]);
    }

    #[test]
    fn block_covers_full_rectangle_with_relative_payload() {
        let cells = vec![
            (at(1, 2), 12),
            (at(0, 1), 1),
            (at(1, 1), 11),
            (at(0, 2), 2),
        ];
        let chunks = coalesce_blocks(cells, |_, _| true);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].rect, Rect::new(at(0, 1), at(1, 2)));
        assert_eq!(chunks[0].items, vec![vec![1, 2], vec![11, 12]]);
    }

    #[test]
    fn ragged_block_splits_at_short_row() {
        // Row 0 spans three columns, row 1 only two: the top row cannot grow
        // downwards, so row 1 starts its own block.
        let cells = vec![
            (at(0, 0), 'a'),
            (at(0, 1), 'b'),
            (at(0, 2), 'c'),
            (at(1, 0), 'd'),
            (at(1, 1), 'e'),
        ];
        let chunks = coalesce_blocks(cells, |_, _| true);
        let rects: Vec<String> = chunks.iter().map(|c| c.rect.to_string()).collect();
        assert_eq!(rects, vec!["A1:C1", "A2:B2"]);
    }

    #[test]
    fn block_respects_predicate_classes() {
        let cells = vec![
            (at(0, 0), 1),
            (at(0, 1), 1),
            (at(0, 2), 2),
            (at(1, 0), 1),
            (at(1, 1), 1),
            (at(1, 2), 2),
        ];
        let chunks = coalesce_blocks(cells, |a, b| a == b);
        let rects: Vec<String> = chunks.iter().map(|c| c.rect.to_string()).collect();
        assert_eq!(rects, vec!["A1:B2", "C1:C2"]);
    }

    #[test]
    fn runs_require_positional_contiguity() {
        let style = "fill";
        let cells = vec![
            (at(2, 2), style),
            (at(0, 1), style),
            (at(0, 0), style),
            (at(0, 2), style),
        ];
        let chunks = coalesce_runs(cells, |a, b| a == b);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].rect, Rect::new(at(0, 0), at(0, 2)));
        assert_eq!(chunks[0].len(), 3);
        assert_eq!(chunks[1].rect, Rect::cell(at(2, 2)));
    }

    #[test]
    fn runs_split_where_predicate_fails() {
        let cells = vec![(at(0, 0), "0.00"), (at(0, 1), "0.00"), (at(0, 2), "0%")];
        let chunks = coalesce_runs(cells, |a, b| a == b);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].anchor(), Some(&"0.00"));
        assert_eq!(chunks[1].anchor(), Some(&"0%"));
    }

    #[test]
    fn runs_do_not_wrap_rows() {
        let cells = vec![(at(0, 16_383), 1), (at(1, 0), 1)];
        assert_eq!(coalesce_runs(cells, |_, _| true).len(), 2);
    }

    #[test]
    fn singletons_never_merge() {
        let cells = vec![(at(0, 0), "a"), (at(0, 1), "a")];
        assert_eq!(singletons(cells).len(), 2);
    }

    #[test]
    fn rows_partition_at_each_flip() {
        let rows = vec![
            (4, true),
            (0, true),
            (3, false),
            (1, true),
            (5, true),
            (2, true),
        ];
        let runs = coalesce_rows(rows);
        assert_eq!(
            runs,
            vec![
                RowRun {
                    first: 0,
                    last: 2,
                    hidden: true
                },
                RowRun {
                    first: 3,
                    last: 3,
                    hidden: false
                },
                RowRun {
                    first: 4,
                    last: 5,
                    hidden: true
                },
            ]
        );
    }

    #[test]
    fn rows_split_at_gaps() {
        let runs = coalesce_rows(vec![(1, true), (5, true)]);
        assert_eq!(runs.len(), 2);
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Zero-based cell coordinate. Ordering is row-major reading order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub row: u32,
    pub col: u32,
}

impl Coord {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parses an A1-style reference (`B3`, `$B$3`) into a zero-based coordinate.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().replace('$', "");
        let split_idx = s.find(|c: char| c.is_ascii_digit())?;
        let (col_str, row_str) = s.split_at(split_idx);

        let row = row_str.parse::<u32>().ok()?.checked_sub(1)?;
        let col = column_index(col_str)?;

        Some(Self { row, col })
    }

    /// Absolute A1 form, e.g. `$B$3`.
    pub fn to_absolute(self) -> String {
        format!("${}${}", column_letters(self.col), self.row + 1)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row + 1)
    }
}

/// Inclusive rectangular range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub top: u32,
    pub left: u32,
    pub bottom: u32,
    pub right: u32,
}

impl Rect {
    /// Builds the smallest rectangle containing both corners.
    pub fn new(a: Coord, b: Coord) -> Self {
        Self {
            top: a.row.min(b.row),
            left: a.col.min(b.col),
            bottom: a.row.max(b.row),
            right: a.col.max(b.col),
        }
    }

    pub fn cell(at: Coord) -> Self {
        Self::new(at, at)
    }

    pub fn rows_span(first: u32, last: u32, col: u32) -> Self {
        Self::new(Coord::new(first, col), Coord::new(last, col))
    }

    pub fn top_left(&self) -> Coord {
        Coord::new(self.top, self.left)
    }

    pub fn bottom_right(&self) -> Coord {
        Coord::new(self.bottom, self.right)
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top + 1
    }

    pub fn width(&self) -> u32 {
        self.right - self.left + 1
    }

    pub fn cell_count(&self) -> u64 {
        u64::from(self.height()) * u64::from(self.width())
    }

    pub fn contains(&self, at: Coord) -> bool {
        (self.top..=self.bottom).contains(&at.row) && (self.left..=self.right).contains(&at.col)
    }

    /// Cells of the rectangle in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = Coord> + '_ {
        (self.top..=self.bottom)
            .flat_map(move |row| (self.left..=self.right).map(move |col| Coord::new(row, col)))
    }

    /// Parses `A1` or `A1:C3`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.split_once(':') {
            Some((a, b)) => Some(Self::new(Coord::parse(a)?, Coord::parse(b)?)),
            None => Coord::parse(s).map(Self::cell),
        }
    }

    /// Absolute A1 form, e.g. `$A$1:$C$1`.
    pub fn to_absolute(&self) -> String {
        format!(
            "{}:{}",
            self.top_left().to_absolute(),
            self.bottom_right().to_absolute()
        )
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.top == self.bottom && self.left == self.right {
            write!(f, "{}", self.top_left())
        } else {
            write!(f, "{}:{}", self.top_left(), self.bottom_right())
        }
    }
}

/// Zero-based column index to letters: 0 -> `A`, 25 -> `Z`, 26 -> `AA`.
pub fn column_letters(index: u32) -> String {
    let mut n = u64::from(index) + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Column letters to a zero-based index.
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        col = col
            .checked_mul(26)?
            .checked_add(c.to_ascii_uppercase() as u32 - 'A' as u32 + 1)?;
    }
    Some(col - 1)
}

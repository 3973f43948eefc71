//! Tile address type definitions

use std::fmt;
use std::str::FromStr;

use super::{root_sub_index, tree_sub_index, PACKET_DEPTH};

/// Deepest addressable level; row and column are stored as `u32`.
pub const MAX_LEVEL: u32 = 31;

/// A tile in the imagery quadtree.
///
/// The path and the `(row, column, level)` triple are two views of the same
/// address. For every path character after the leading `'0'`, taken most
/// significant bit first:
///
/// ```text
/// row_bit = cell >> 1
/// col_bit = row_bit ^ (cell & 1)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileAddress {
    level: u32,
    row: u32,
    column: u32,
    path: String,
}

impl TileAddress {
    /// Parses a quadtree path such as `"0231"`.
    pub fn from_path(path: &str) -> Result<Self, CoordError> {
        let bytes = path.as_bytes();
        if bytes.first() != Some(&b'0') {
            return Err(CoordError::MalformedPath(path.to_string()));
        }
        if bytes.len() > MAX_LEVEL as usize + 1 {
            return Err(CoordError::LevelOutOfRange(bytes.len() as u32 - 1));
        }

        let mut row = 0u32;
        let mut column = 0u32;
        for &c in &bytes[1..] {
            let cell = match c {
                b'0'..=b'3' => u32::from(c - b'0'),
                _ => return Err(CoordError::MalformedPath(path.to_string())),
            };
            let row_bit = cell >> 1;
            let col_bit = row_bit ^ (cell & 1);
            row = (row << 1) | row_bit;
            column = (column << 1) | col_bit;
        }

        Ok(Self {
            level: bytes.len() as u32 - 1,
            row,
            column,
            path: path.to_string(),
        })
    }

    /// Builds the address of a tile from its grid position at `level`.
    pub fn from_row_col_level(row: u32, column: u32, level: u32) -> Result<Self, CoordError> {
        if level > MAX_LEVEL {
            return Err(CoordError::LevelOutOfRange(level));
        }
        let max = (1u64 << level) - 1;
        if u64::from(row) > max || u64::from(column) > max {
            return Err(CoordError::OutOfRange { row, column, level });
        }

        let mut path = String::with_capacity(level as usize + 1);
        path.push('0');
        for bit in (0..level).rev() {
            let row_bit = (row >> bit) & 1;
            let col_bit = (column >> bit) & 1;
            let cell = (row_bit << 1) | (row_bit ^ col_bit);
            path.push(char::from(b'0' + cell as u8));
        }

        Ok(Self {
            level,
            row,
            column,
            path,
        })
    }

    #[inline]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[inline]
    pub fn row(&self) -> u32 {
        self.row
    }

    #[inline]
    pub fn column(&self) -> u32 {
        self.column
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Position of this tile's node inside the packet that owns it.
    pub fn sub_index(&self) -> u32 {
        let len = self.path.len();
        if len <= PACKET_DEPTH {
            root_sub_index(&self.path)
        } else {
            tree_sub_index(&self.path[segment_start(len)..])
        }
    }

    /// Path of the packet holding this tile's node (`"0"` for the root packet).
    pub fn packet_path(&self) -> &str {
        let len = self.path.len();
        if len <= PACKET_DEPTH {
            &self.path[..1]
        } else {
            &self.path[..segment_start(len)]
        }
    }

    /// Ancestors whose nodes point at the packets on the way down to this tile.
    ///
    /// Yields prefixes of length 4, 8, ... strictly shorter than the path. Each
    /// prefix is looked up in the current packet, and its node's cache epoch
    /// names the next packet to fetch. The iterator can be cloned to restart.
    pub fn indices(&self) -> PacketPrefixes<'_> {
        PacketPrefixes {
            address: self,
            next_len: PACKET_DEPTH,
        }
    }

    /// The enclosing tile one level up, or `None` at the globe root.
    pub fn parent(&self) -> Option<TileAddress> {
        (self.level > 0).then(|| self.prefix(self.path.len() - 1))
    }

    /// The child tile in the given quadrant (0 to 3).
    pub fn child(&self, quadrant: u8) -> Result<TileAddress, CoordError> {
        if quadrant > 3 {
            return Err(CoordError::MalformedPath(format!("{}{}", self.path, quadrant)));
        }
        if self.level >= MAX_LEVEL {
            return Err(CoordError::LevelOutOfRange(self.level + 1));
        }
        let row_bit = u32::from(quadrant >> 1);
        let col_bit = row_bit ^ u32::from(quadrant & 1);
        let mut path = String::with_capacity(self.path.len() + 1);
        path.push_str(&self.path);
        path.push(char::from(b'0' + quadrant));
        Ok(Self {
            level: self.level + 1,
            row: (self.row << 1) | row_bit,
            column: (self.column << 1) | col_bit,
            path,
        })
    }

    /// Ancestor with a path of `len` characters. `len` must be in `1..=path.len()`.
    fn prefix(&self, len: usize) -> TileAddress {
        let level = len as u32 - 1;
        let shift = self.level - level;
        TileAddress {
            level,
            row: self.row >> shift,
            column: self.column >> shift,
            path: self.path[..len].to_string(),
        }
    }
}

/// Start of the last packet segment for a path of `len > 4` characters.
#[inline]
fn segment_start(len: usize) -> usize {
    ((len - 1) / PACKET_DEPTH) * PACKET_DEPTH
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl FromStr for TileAddress {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_path(s)
    }
}

/// Iterator over the packet-boundary ancestors of a [`TileAddress`].
#[derive(Debug, Clone)]
pub struct PacketPrefixes<'a> {
    address: &'a TileAddress,
    next_len: usize,
}

impl Iterator for PacketPrefixes<'_> {
    type Item = TileAddress;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_len >= self.address.path.len() {
            return None;
        }
        let prefix = self.address.prefix(self.next_len);
        self.next_len += PACKET_DEPTH;
        Some(prefix)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.address.path.len();
        let remaining = if self.next_len >= len {
            0
        } else {
            (len - 1 - self.next_len) / PACKET_DEPTH + 1
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PacketPrefixes<'_> {}

/// Errors that can occur while building a tile address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordError {
    /// Path is empty, does not start with '0' or contains a digit outside 0-3
    MalformedPath(String),
    /// Row or column does not fit the grid at the given level
    OutOfRange { row: u32, column: u32, level: u32 },
    /// Level is deeper than `MAX_LEVEL`
    LevelOutOfRange(u32),
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordError::MalformedPath(path) => {
                write!(
                    f,
                    "Malformed quadtree path: '{}' (must start with '0' and contain only digits 0-3)",
                    path
                )
            }
            CoordError::OutOfRange { row, column, level } => {
                write!(
                    f,
                    "Tile ({}, {}) is outside the grid at level {}",
                    row, column, level
                )
            }
            CoordError::LevelOutOfRange(level) => {
                write!(
                    f,
                    "Invalid level: {} (must be between 0 and {})",
                    level, MAX_LEVEL
                )
            }
        }
    }
}

impl std::error::Error for CoordError {}

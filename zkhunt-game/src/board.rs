//! The 8x8 board and the shared pool of map layouts.
//!
//! The pool is the single canonical copy of the terrain used by the authority,
//! the clients and the circuits. Index = `y * 8 + x`; `1` is jungle, `0` is plains.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const GRID_SIZE: u8 = 8;
pub const TILE_COUNT: usize = 64;
pub const MAP_COUNT: usize = 20;

/// Bumped whenever a layout in [`MAPS`] changes.
pub const MAP_POOL_VERSION: u32 = 1;

/// Offsets covered by a power search: centre, orthogonals, then diagonals.
/// Order matches the slot order of the search-response circuit.
pub const SEARCH_OFFSETS: [(i8, i8); 9] = [
    (0, 0),
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

pub const MAPS: [[u8; TILE_COUNT]; MAP_COUNT] = [
    // 0
    [
        0, 0, 1, 1, 1, 0, 0, 0,
        0, 1, 1, 0, 1, 1, 0, 0,
        1, 1, 0, 0, 0, 1, 1, 0,
        0, 1, 0, 0, 0, 0, 1, 1,
        1, 1, 0, 0, 0, 0, 1, 0,
        0, 1, 1, 0, 1, 1, 1, 0,
        0, 0, 1, 1, 1, 0, 0, 0,
        0, 0, 0, 1, 1, 1, 0, 0,
    ],
    // 1
    [
        0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 1, 1, 1, 1, 0, 0,
        0, 1, 1, 1, 1, 1, 1, 0,
        0, 1, 1, 1, 1, 1, 1, 0,
        0, 1, 1, 1, 1, 1, 1, 0,
        0, 0, 1, 1, 1, 1, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
    ],
    // 2
    [
        1, 1, 0, 0, 0, 0, 1, 1,
        1, 1, 1, 0, 0, 1, 1, 1,
        0, 1, 1, 1, 1, 1, 1, 0,
        0, 0, 1, 1, 1, 1, 0, 0,
        0, 0, 1, 1, 1, 1, 0, 0,
        0, 0, 0, 1, 1, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
    ],
    // 3
    [
        1, 1, 1, 1, 1, 1, 1, 1,
        1, 0, 0, 0, 0, 0, 0, 1,
        1, 0, 0, 0, 0, 0, 0, 1,
        1, 0, 0, 0, 0, 0, 0, 1,
        1, 0, 0, 0, 0, 0, 0, 1,
        1, 0, 0, 0, 0, 0, 0, 1,
        1, 0, 0, 0, 0, 0, 0, 1,
        1, 1, 1, 1, 1, 1, 1, 1,
    ],
    // 4
    [
        0, 0, 0, 1, 1, 0, 0, 0,
        0, 0, 0, 1, 1, 0, 0, 0,
        0, 0, 0, 1, 1, 0, 0, 0,
        1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1,
        0, 0, 0, 1, 1, 0, 0, 0,
        0, 0, 0, 1, 1, 0, 0, 0,
        0, 0, 0, 1, 1, 0, 0, 0,
    ],
    // 5
    [
        1, 1, 1, 0, 0, 0, 0, 0,
        1, 1, 1, 0, 0, 0, 0, 0,
        1, 1, 0, 0, 0, 0, 0, 0,
        1, 1, 0, 0, 0, 0, 0, 0,
        1, 1, 0, 0, 0, 0, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1,
        0, 1, 1, 1, 1, 1, 1, 1,
        0, 0, 0, 0, 0, 0, 0, 0,
    ],
    // 6
    [
        0, 0, 0, 1, 0, 0, 0, 0,
        0, 0, 1, 1, 1, 0, 0, 0,
        0, 1, 1, 1, 1, 1, 0, 0,
        1, 1, 1, 1, 1, 1, 1, 0,
        0, 1, 1, 1, 1, 1, 0, 0,
        0, 0, 1, 1, 1, 0, 0, 0,
        0, 0, 0, 1, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
    ],
    // 7
    [
        0, 0, 0, 0, 0, 0, 0, 0,
        1, 1, 0, 0, 0, 0, 1, 1,
        1, 1, 1, 0, 0, 1, 1, 1,
        0, 1, 1, 1, 1, 1, 1, 0,
        0, 1, 1, 1, 1, 1, 1, 0,
        1, 1, 1, 0, 0, 1, 1, 1,
        1, 1, 0, 0, 0, 0, 1, 1,
        0, 0, 0, 0, 0, 0, 0, 0,
    ],
    // 8
    [
        0, 1, 1, 1, 1, 1, 1, 0,
        0, 1, 1, 0, 0, 1, 1, 0,
        0, 1, 0, 0, 0, 0, 1, 0,
        0, 1, 0, 0, 0, 0, 1, 0,
        0, 1, 0, 0, 0, 0, 1, 0,
        0, 1, 0, 0, 0, 0, 1, 0,
        0, 1, 1, 0, 0, 1, 1, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
    ],
    // 9
    [
        0, 1, 0, 1, 0, 1, 0, 0,
        0, 1, 0, 1, 0, 1, 0, 0,
        0, 1, 1, 1, 0, 1, 1, 0,
        0, 0, 0, 1, 0, 0, 1, 0,
        1, 1, 0, 1, 1, 0, 1, 0,
        0, 1, 0, 0, 1, 0, 1, 0,
        0, 1, 1, 1, 1, 1, 1, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
    ],
    // 10
    [
        0, 0, 0, 1, 1, 0, 0, 0,
        0, 0, 1, 1, 1, 1, 0, 0,
        0, 0, 1, 1, 1, 1, 0, 0,
        0, 0, 1, 1, 1, 1, 0, 0,
        0, 0, 1, 1, 1, 1, 0, 0,
        0, 0, 1, 1, 1, 1, 0, 0,
        0, 0, 0, 1, 1, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
    ],
    // 11
    [
        0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 1, 1, 0, 0, 0,
        0, 0, 1, 1, 1, 1, 0, 0,
        0, 1, 1, 1, 1, 1, 1, 0,
        1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1,
        0, 0, 0, 0, 0, 0, 0, 0,
    ],
    // 12
    [
        0, 0, 1, 1, 1, 1, 0, 0,
        0, 0, 1, 1, 0, 0, 0, 0,
        0, 0, 1, 1, 0, 0, 0, 0,
        0, 0, 1, 1, 1, 1, 0, 0,
        0, 0, 0, 0, 1, 1, 0, 0,
        0, 0, 0, 0, 1, 1, 0, 0,
        0, 0, 1, 1, 1, 1, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
    ],
    // 13
    [
        0, 1, 1, 0, 0, 1, 1, 0,
        0, 1, 1, 0, 0, 1, 1, 0,
        0, 1, 1, 1, 1, 1, 1, 0,
        0, 1, 1, 0, 0, 1, 1, 0,
        0, 1, 1, 0, 0, 1, 1, 0,
        0, 1, 1, 0, 0, 1, 1, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
    ],
    // 14
    [
        1, 1, 0, 0, 0, 0, 0, 0,
        1, 1, 1, 0, 0, 0, 0, 0,
        0, 1, 1, 1, 0, 0, 0, 0,
        0, 0, 1, 1, 1, 0, 0, 0,
        0, 0, 0, 1, 1, 1, 0, 0,
        0, 0, 0, 0, 1, 1, 1, 0,
        0, 0, 0, 0, 0, 1, 1, 1,
        0, 0, 0, 0, 0, 0, 1, 1,
    ],
    // 15
    [
        0, 1, 1, 1, 1, 1, 0, 0,
        0, 1, 1, 0, 0, 0, 0, 0,
        0, 1, 1, 0, 0, 0, 0, 0,
        0, 1, 1, 0, 0, 0, 0, 0,
        0, 1, 1, 0, 0, 0, 0, 0,
        0, 1, 1, 0, 0, 0, 0, 0,
        0, 1, 1, 1, 1, 1, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
    ],
    // 16
    [
        1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 1, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1,
    ],
    // 17
    [
        0, 0, 1, 1, 1, 1, 0, 0,
        0, 0, 1, 1, 1, 1, 0, 0,
        1, 1, 1, 1, 1, 1, 0, 0,
        1, 1, 1, 0, 0, 1, 1, 1,
        0, 0, 1, 1, 1, 1, 1, 1,
        0, 0, 1, 1, 1, 1, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
    ],
    // 18
    [
        0, 0, 0, 0, 0, 1, 1, 1,
        0, 0, 0, 0, 0, 1, 1, 1,
        0, 0, 0, 0, 0, 1, 1, 1,
        0, 0, 0, 0, 0, 1, 1, 1,
        0, 0, 0, 0, 0, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1,
        0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
    ],
    // 19
    [
        0, 0, 0, 0, 0, 0, 0, 0,
        0, 1, 1, 1, 1, 1, 1, 0,
        0, 1, 0, 0, 0, 0, 1, 0,
        0, 1, 0, 1, 1, 0, 1, 0,
        0, 1, 0, 1, 1, 0, 1, 0,
        0, 1, 0, 0, 0, 0, 1, 0,
        0, 1, 1, 1, 1, 1, 1, 0,
        0, 0, 0, 0, 0, 0, 0, 0,
    ],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: u8,
    pub y: u8,
}

impl Position {
    pub const fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// Build a position from wire coordinates, `None` when off the board.
    pub fn checked(x: u32, y: u32) -> Option<Self> {
        if x < GRID_SIZE as u32 && y < GRID_SIZE as u32 {
            Some(Self::new(x as u8, y as u8))
        } else {
            None
        }
    }

    pub fn in_bounds(&self) -> bool {
        self.x < GRID_SIZE && self.y < GRID_SIZE
    }

    pub fn manhattan(&self, other: &Position) -> u8 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn chebyshev(&self, other: &Position) -> u8 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// Orthogonal step or staying put.
    pub fn is_step_from(&self, other: &Position) -> bool {
        self.manhattan(other) <= 1
    }

    pub fn offset(&self, dx: i8, dy: i8) -> Option<Position> {
        let x = self.x as i16 + dx as i16;
        let y = self.y as i16 + dy as i16;
        if (0..GRID_SIZE as i16).contains(&x) && (0..GRID_SIZE as i16).contains(&y) {
            Some(Position::new(x as u8, y as u8))
        } else {
            None
        }
    }

    fn index(&self) -> usize {
        self.y as usize * GRID_SIZE as usize + self.x as usize
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terrain {
    Plains,
    Jungle,
}

/// A read-only view of one layout in the pool.
#[derive(Debug, Clone, Copy)]
pub struct Board {
    index: u8,
    tiles: &'static [u8; TILE_COUNT],
}

impl Board {
    pub fn get(index: u8) -> Option<Self> {
        MAPS.get(index as usize).map(|tiles| Self { index, tiles })
    }

    /// Layout for an index taken from game state; indices wrap around the pool.
    pub fn from_index(index: u8) -> Self {
        let index = index % MAP_COUNT as u8;
        Self {
            index,
            tiles: &MAPS[index as usize],
        }
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    /// Terrain at `pos`, `None` when off the board.
    pub fn terrain(&self, pos: Position) -> Option<Terrain> {
        if !pos.in_bounds() {
            return None;
        }
        match self.tiles[pos.index()] {
            0 => Some(Terrain::Plains),
            _ => Some(Terrain::Jungle),
        }
    }

    pub fn is_jungle(&self, pos: Position) -> bool {
        self.terrain(pos) == Some(Terrain::Jungle)
    }

    pub fn is_plains(&self, pos: Position) -> bool {
        self.terrain(pos) == Some(Terrain::Plains)
    }

    /// Jungle tiles a power search from `center` covers, in circuit slot order.
    pub fn search_area(&self, center: Position) -> Vec<Position> {
        SEARCH_OFFSETS
            .iter()
            .filter_map(|&(dx, dy)| center.offset(dx, dy))
            .filter(|p| self.is_jungle(*p))
            .collect()
    }

    pub fn plains(&self) -> impl Iterator<Item = Position> + '_ {
        (0..TILE_COUNT as u8)
            .map(|i| Position::new(i % GRID_SIZE, i / GRID_SIZE))
            .filter(|p| self.is_plains(*p))
    }

    pub fn tiles(&self) -> &'static [u8; TILE_COUNT] {
        self.tiles
    }
}

/// Content address of the whole map pool, so every party can confirm it is
/// playing with the same layouts.
pub fn map_pool_digest() -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"zkhunt/map-pool");
    hasher.update(MAP_POOL_VERSION.to_be_bytes());
    for map in MAPS.iter() {
        hasher.update(map);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_shape() {
        for map in MAPS.iter() {
            assert!(map.iter().all(|&t| t == 0 || t == 1));
        }
        assert!(Board::get(MAP_COUNT as u8).is_none());
    }

    #[test]
    fn test_terrain_lookup() {
        let board = Board::get(0).unwrap();
        assert_eq!(board.terrain(Position::new(0, 0)), Some(Terrain::Plains));
        assert_eq!(board.terrain(Position::new(2, 0)), Some(Terrain::Jungle));
        assert_eq!(board.terrain(Position::new(8, 0)), None);
        assert!(!board.is_jungle(Position::new(0, 8)));
        assert!(!board.is_plains(Position::new(0, 8)));
    }

    #[test]
    fn test_distances() {
        let a = Position::new(3, 3);
        assert_eq!(a.manhattan(&Position::new(4, 4)), 2);
        assert_eq!(a.chebyshev(&Position::new(4, 4)), 1);
        assert!(a.is_step_from(&a));
        assert!(a.is_step_from(&Position::new(3, 4)));
        assert!(!a.is_step_from(&Position::new(4, 4)));
        assert_eq!(Position::new(0, 0).offset(-1, 0), None);
        assert_eq!(Position::checked(7, 7), Some(Position::new(7, 7)));
        assert_eq!(Position::checked(8, 0), None);
    }

    #[test]
    fn test_search_area_includes_diagonals() {
        // Map 0, around (1, 1): (1,0) (0,1) (0,0) (2,2) are plains
        let board = Board::get(0).unwrap();
        let area = board.search_area(Position::new(1, 1));
        assert_eq!(
            area,
            vec![
                Position::new(1, 1),
                Position::new(2, 1),
                Position::new(1, 2),
                Position::new(0, 2),
                Position::new(2, 0),
            ]
        );
        assert!(area.len() <= SEARCH_OFFSETS.len());
    }

    #[test]
    fn test_every_map_has_spawnable_plains() {
        for i in 0..MAP_COUNT as u8 {
            let board = Board::get(i).unwrap();
            assert!(board.plains().count() >= 2);
        }
    }

    #[test]
    fn test_pool_digest_is_stable() {
        assert_eq!(map_pool_digest(), map_pool_digest());
        assert_ne!(map_pool_digest(), [0u8; 32]);
    }
}

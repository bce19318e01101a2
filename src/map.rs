// Arena tile grid
//
// The grid is a fixed 15x13 array. Each round starts from the hand-authored
// base layout; cells the layout leaves open for generation are rerolled into
// soft walls or floor.

use rand::Rng;
use serde::{Serialize, Serializer};

use crate::types::{Coord, Tile, MAP_HEIGHT, MAP_WIDTH};

/// Base layout: 0 = floor, 1 = permanent wall, 2 = rerolled each round
pub const BASE_LAYOUT: [[u8; MAP_WIDTH as usize]; MAP_HEIGHT as usize] = [
    [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
    [1, 0, 0, 2, 2, 2, 2, 2, 2, 2, 2, 2, 0, 0, 1],
    [1, 0, 1, 2, 1, 2, 1, 2, 1, 2, 1, 2, 1, 0, 1],
    [1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 1],
    [1, 2, 1, 2, 1, 2, 1, 2, 1, 2, 1, 2, 1, 2, 1],
    [1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 1],
    [1, 0, 1, 2, 1, 2, 0, 0, 0, 2, 1, 2, 1, 0, 1],
    [1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 1],
    [1, 2, 1, 2, 1, 2, 1, 2, 1, 2, 1, 2, 1, 2, 1],
    [1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 1],
    [1, 0, 1, 2, 1, 2, 1, 2, 1, 2, 1, 2, 1, 0, 1],
    [1, 0, 0, 2, 2, 2, 2, 2, 2, 2, 2, 2, 0, 0, 1],
    [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
];

/// Spawn points in spawn-index order: four corners, then the centre
pub const SPAWN_POINTS: [Coord; 5] = [
    Coord::new(1, 1),
    Coord::new(13, 1),
    Coord::new(1, 11),
    Coord::new(13, 11),
    Coord::new(7, 6),
];

const REROLL_CODE: u8 = 2;

/// Row-major tile grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapGrid {
    tiles: Vec<Tile>,
}

impl MapGrid {
    /// Builds a grid from layout codes. Reroll markers become soft walls.
    pub fn from_layout(layout: &[[u8; MAP_WIDTH as usize]; MAP_HEIGHT as usize]) -> Self {
        let tiles = layout
            .iter()
            .flat_map(|row| row.iter())
            .map(|&code| Tile::from_code(code).unwrap_or(Tile::Empty))
            .collect();
        MapGrid { tiles }
    }

    /// Base layout with every reroll cell turned into floor
    pub fn cleared() -> Self {
        let mut grid = Self::from_layout(&BASE_LAYOUT);
        for tile in grid.tiles.iter_mut() {
            if *tile == Tile::Soft {
                *tile = Tile::Empty;
            }
        }
        grid
    }

    /// Copies the base layout and rerolls each open cell independently:
    /// soft wall with probability `soft_chance`, floor otherwise
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, soft_chance: f64) -> Self {
        let tiles = BASE_LAYOUT
            .iter()
            .flat_map(|row| row.iter())
            .map(|&code| {
                if code == REROLL_CODE {
                    if rng.random::<f64>() < soft_chance {
                        Tile::Soft
                    } else {
                        Tile::Empty
                    }
                } else {
                    Tile::from_code(code).unwrap_or(Tile::Empty)
                }
            })
            .collect();
        MapGrid { tiles }
    }

    fn index(at: Coord) -> Option<usize> {
        if at.in_bounds() {
            Some((at.y * MAP_WIDTH + at.x) as usize)
        } else {
            None
        }
    }

    /// Tile at `at`, or None outside the arena
    pub fn get(&self, at: Coord) -> Option<Tile> {
        Self::index(at).map(|i| self.tiles[i])
    }

    /// Single-cell mutation. A solid tile stays solid until the grid is
    /// regenerated, so anything trying to open one up is refused.
    pub fn set_tile(&mut self, at: Coord, tile: Tile) -> bool {
        match Self::index(at) {
            Some(i) if self.tiles[i] == Tile::Solid && tile != Tile::Solid => false,
            Some(i) => {
                self.tiles[i] = tile;
                true
            }
            None => false,
        }
    }

    /// Turns soft walls within Manhattan distance 1 of `spawn` into floor
    pub fn clear_spawn_neighborhood(&mut self, spawn: Coord) {
        for dy in -1..=1 {
            for dx in -1..=1 {
                let at = Coord::new(spawn.x + dx, spawn.y + dy);
                if at.manhattan(spawn) <= 1 && self.get(at) == Some(Tile::Soft) {
                    self.set_tile(at, Tile::Empty);
                }
            }
        }
    }

    /// All coordinates currently holding `tile`, row-major
    pub fn cells_of(&self, tile: Tile) -> impl Iterator<Item = Coord> + '_ {
        self.tiles.iter().enumerate().filter_map(move |(i, t)| {
            if *t == tile {
                let i = i as i32;
                Some(Coord::new(i % MAP_WIDTH, i / MAP_WIDTH))
            } else {
                None
            }
        })
    }

    pub fn rows(&self) -> Vec<Vec<Tile>> {
        self.tiles
            .chunks(MAP_WIDTH as usize)
            .map(|row| row.to_vec())
            .collect()
    }
}

impl Serialize for MapGrid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.rows().serialize(serializer)
    }
}

// Danger-zone calculation
//
// The set of cells that would be caught if every armed bomb went off right
// now. Bomb state changes on every tick, so callers recompute it each time
// instead of holding on to a previous result.

use std::collections::HashSet;

use crate::board::Board;
use crate::map::MapGrid;
use crate::types::{Coord, Direction, Tile};

/// Cells a blast reaches from `origin` in one direction, nearest first.
/// Bounds and solid walls stop the ray and are excluded; a soft wall is
/// included and stops it.
pub fn blast_ray(map: &MapGrid, origin: Coord, direction: Direction, power: u32) -> Vec<Coord> {
    let mut cells = Vec::new();
    let mut at = origin;

    for _ in 0..power {
        at = direction.apply(&at);
        match map.get(at) {
            None | Some(Tile::Solid) => break,
            Some(Tile::Soft) => {
                cells.push(at);
                break;
            }
            Some(Tile::Empty) => cells.push(at),
        }
    }

    cells
}

/// Every cell covered by some currently armed bomb
pub fn danger_zones(board: &Board) -> HashSet<Coord> {
    let mut danger = HashSet::new();

    for bomb in &board.bombs {
        danger.insert(bomb.pos);
        for direction in Direction::all() {
            danger.extend(blast_ray(&board.map, bomb.pos, direction, bomb.power));
        }
    }

    danger
}

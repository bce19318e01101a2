// Arena domain types
// Shared by the map, the bomb field, the bots and the wire protocol.

use serde::{Deserialize, Serialize, Serializer};

use crate::timers::TimerId;

/// Arena width in tiles
pub const MAP_WIDTH: i32 = 15;
/// Arena height in tiles
pub const MAP_HEIGHT: i32 = 13;

/// Player identity, unique within a room
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

/// Bomb identity, unique within a room
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(transparent)]
pub struct BombId(pub u64);

/// Power-up identity, unique within a room
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(transparent)]
pub struct PowerUpId(pub u64);

/// 2D coordinate on the grid, `y` grows downwards
#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Coord { x, y }
    }

    /// Whether the coordinate lies inside the arena
    pub fn in_bounds(&self) -> bool {
        self.x >= 0 && self.x < MAP_WIDTH && self.y >= 0 && self.y < MAP_HEIGHT
    }

    /// Calculates Manhattan distance between two coordinates
    pub fn manhattan(&self, other: Coord) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// The four movement directions
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Returns all possible directions
    pub fn all() -> [Direction; 4] {
        [Direction::Up, Direction::Down, Direction::Left, Direction::Right]
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Calculates the next coordinate when moving in this direction
    pub fn apply(&self, coord: &Coord) -> Coord {
        match self {
            Direction::Up => Coord { x: coord.x, y: coord.y - 1 },
            Direction::Down => Coord { x: coord.x, y: coord.y + 1 },
            Direction::Left => Coord { x: coord.x - 1, y: coord.y },
            Direction::Right => Coord { x: coord.x + 1, y: coord.y },
        }
    }
}

/// Tile kinds. Serialized as the small integers clients render from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tile {
    Empty,
    Solid,
    Soft,
}

impl Tile {
    pub fn code(&self) -> u8 {
        match self {
            Tile::Empty => 0,
            Tile::Solid => 1,
            Tile::Soft => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Tile> {
        match code {
            0 => Some(Tile::Empty),
            1 => Some(Tile::Solid),
            2 => Some(Tile::Soft),
            _ => None,
        }
    }
}

impl Serialize for Tile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// Power-up kinds revealed by destroyed soft walls
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PowerUpKind {
    BombUp,
    FireUp,
    BombPass,
    WallPass,
    KickBomb,
    Skull,
    SuperBomb,
}

/// Movement debuffs handed out by the skull
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Curse {
    /// Inverts the four cardinal directions
    Reverse,
    /// Every other move input is swallowed
    Slow,
}

impl Curse {
    pub fn all() -> [Curse; 2] {
        [Curse::Reverse, Curse::Slow]
    }
}

/// A contestant, human or bot
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub emoji: String,
    pub color: String,
    pub is_bot: bool,
    pub is_alive: bool,
    pub score: u32,
    #[serde(flatten)]
    pub pos: Coord,
    pub spawn_index: usize,
    pub bomb_power: u32,
    pub max_bombs: u32,
    pub active_bombs: u32,
    pub can_pass_bombs: bool,
    pub can_pass_walls: bool,
    pub can_kick_bombs: bool,
    pub has_super_bomb: bool,
    pub curse: Option<Curse>,
    #[serde(skip)]
    pub slow_tick: bool,
}

impl Player {
    pub fn new(
        id: PlayerId,
        name: String,
        emoji: String,
        color: String,
        is_bot: bool,
        spawn_index: usize,
        spawn: Coord,
    ) -> Self {
        Player {
            id,
            name,
            emoji,
            color,
            is_bot,
            is_alive: true,
            score: 0,
            pos: spawn,
            spawn_index,
            bomb_power: 1,
            max_bombs: 1,
            active_bombs: 0,
            can_pass_bombs: false,
            can_pass_walls: false,
            can_kick_bombs: false,
            has_super_bomb: false,
            curse: None,
            slow_tick: false,
        }
    }

    /// Puts the player back on its spawn with round-start capabilities.
    /// Identity and score are kept.
    pub fn reset_for_round(&mut self, spawn: Coord, bomb_power: u32, max_bombs: u32) {
        self.pos = spawn;
        self.is_alive = true;
        self.bomb_power = bomb_power;
        self.max_bombs = max_bombs;
        self.active_bombs = 0;
        self.can_pass_bombs = false;
        self.can_pass_walls = false;
        self.can_kick_bombs = false;
        self.has_super_bomb = false;
        self.curse = None;
        self.slow_tick = false;
    }

    pub fn stats(&self) -> PlayerStats {
        PlayerStats {
            bomb_power: self.bomb_power,
            max_bombs: self.max_bombs,
            can_pass_bombs: self.can_pass_bombs,
            can_pass_walls: self.can_pass_walls,
            can_kick_bombs: self.can_kick_bombs,
            has_super_bomb: self.has_super_bomb,
            curse: self.curse,
        }
    }
}

/// Capability snapshot sent along with a collected power-up
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub bomb_power: u32,
    pub max_bombs: u32,
    pub can_pass_bombs: bool,
    pub can_pass_walls: bool,
    pub can_kick_bombs: bool,
    pub has_super_bomb: bool,
    pub curse: Option<Curse>,
}

/// An in-flight kick
#[derive(Debug, Clone, Copy)]
pub struct Slide {
    pub timer: TimerId,
    pub direction: Direction,
}

/// An armed bomb
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Bomb {
    pub id: BombId,
    pub owner: PlayerId,
    #[serde(flatten)]
    pub pos: Coord,
    pub power: u32,
    pub is_super: bool,
    pub is_kicked: bool,
    #[serde(skip)]
    pub fuse: TimerId,
    #[serde(skip)]
    pub slide: Option<Slide>,
}

/// A collectible lying on the floor
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PowerUp {
    pub id: PowerUpId,
    #[serde(rename = "type")]
    pub kind: PowerUpKind,
    #[serde(flatten)]
    pub pos: Coord,
}

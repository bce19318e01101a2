// Board state and read-only queries
//
// The board is everything a round mutates: tiles, contestants, bombs and
// power-ups. Rules that only need to look (move validation, occupancy) live
// here so the bot planner and the command pipeline share one definition.

use std::collections::HashMap;

use crate::map::MapGrid;
use crate::types::{Bomb, BombId, Coord, Player, PlayerId, PowerUp, Tile};

#[derive(Debug, Clone)]
pub struct Board {
    pub map: MapGrid,
    pub players: HashMap<PlayerId, Player>,
    /// Player ids in join order, used for host succession and listings
    pub join_order: Vec<PlayerId>,
    pub bombs: Vec<Bomb>,
    pub power_ups: Vec<PowerUp>,
}

impl Default for Board {
    fn default() -> Self {
        Board {
            map: MapGrid::cleared(),
            players: HashMap::new(),
            join_order: Vec::new(),
            bombs: Vec::new(),
            power_ups: Vec::new(),
        }
    }
}

impl Board {
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// Players in join order
    pub fn ordered_players(&self) -> impl Iterator<Item = &Player> + '_ {
        self.join_order.iter().filter_map(move |id| self.players.get(id))
    }

    /// Owned copies in join order, for snapshots on the wire
    pub fn player_list(&self) -> Vec<Player> {
        self.ordered_players().cloned().collect()
    }

    pub fn living_players(&self) -> impl Iterator<Item = &Player> + '_ {
        self.ordered_players().filter(|p| p.is_alive)
    }

    /// A living player other than `except` standing on `at`
    pub fn living_player_at(&self, at: Coord, except: Option<PlayerId>) -> Option<&Player> {
        self.living_players()
            .find(|p| p.pos == at && Some(p.id) != except)
    }

    /// Whether any player, alive or not, occupies `at`
    pub fn any_player_at(&self, at: Coord) -> bool {
        self.players.values().any(|p| p.pos == at)
    }

    pub fn bomb(&self, id: BombId) -> Option<&Bomb> {
        self.bombs.iter().find(|b| b.id == id)
    }

    pub fn bomb_mut(&mut self, id: BombId) -> Option<&mut Bomb> {
        self.bombs.iter_mut().find(|b| b.id == id)
    }

    pub fn bomb_at(&self, at: Coord) -> Option<&Bomb> {
        self.bombs.iter().find(|b| b.pos == at)
    }

    pub fn power_up_at(&self, at: Coord) -> Option<&PowerUp> {
        self.power_ups.iter().find(|p| p.pos == at)
    }

    /// Whether `player` may step onto `target`
    ///
    /// Out of bounds and solid walls always block. Soft walls block unless the
    /// player has wall-pass. A bomb blocks unless the player has bomb-pass or is
    /// standing on it already (stepping off a freshly placed bomb).
    pub fn is_move_valid(&self, player: &Player, target: Coord) -> bool {
        match self.map.get(target) {
            None | Some(Tile::Solid) => return false,
            Some(Tile::Soft) if !player.can_pass_walls => return false,
            _ => {}
        }

        if self.bomb_at(target).is_some() {
            return player.can_pass_bombs || player.pos == target;
        }

        true
    }
}

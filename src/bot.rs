// Bot decision engine
//
// Bots share the human command pipeline: each think cycle produces at most
// one command, which the room then applies exactly as if a client had sent
// it. The planner only reads the board.

use rand::seq::IndexedRandom;
use rand::Rng;

use crate::board::Board;
use crate::config::Config;
use crate::danger::danger_zones;
use crate::types::{Coord, Curse, Direction, Player, PlayerId, Tile};

/// The single command a bot issues in one think cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotAction {
    Idle,
    Move(Direction),
    PlaceBomb,
}

/// Rule-based bot planner
/// Takes static configuration and exposes one decision per think cycle
#[derive(Debug, Clone)]
pub struct BotBrain {
    wander_chance: f64,
}

impl BotBrain {
    /// Creates a new planner from the `[bots]` section
    pub fn new(config: &Config) -> Self {
        BotBrain {
            wander_chance: config.bots.wander_chance,
        }
    }

    /// Picks the bot's next command
    ///
    /// Priorities, first match wins:
    /// 1. Escape when standing in a blast zone
    /// 2. Step onto an adjacent safe power-up
    /// 3. Bomb an adjacent rival
    /// 4. Bomb an adjacent soft wall
    /// 5. Wander to a random safe cell, sometimes
    ///
    /// Bombing is only considered while capacity remains and a safe step
    /// exists to leave the fuse behind.
    pub fn decide<R: Rng + ?Sized>(&self, board: &Board, bot_id: PlayerId, rng: &mut R) -> BotAction {
        let Some(bot) = board.player(bot_id).filter(|p| p.is_alive) else {
            return BotAction::Idle;
        };

        let danger = danger_zones(board);
        let legal = Self::generate_legal_moves(board, bot);
        let safe: Vec<(Direction, Coord)> = legal
            .iter()
            .copied()
            .filter(|(_, dest)| !danger.contains(dest))
            .collect();

        if danger.contains(&bot.pos) {
            // No safe neighbour: any valid step beats standing in the blast
            let pool = if safe.is_empty() { &legal } else { &safe };
            return match pool.choose(rng) {
                Some(&(dir, _)) => BotAction::Move(Self::command_for(bot, dir)),
                None => BotAction::Idle,
            };
        }

        if let Some(&(dir, _)) = safe
            .iter()
            .find(|(_, dest)| board.power_up_at(*dest).is_some())
        {
            return BotAction::Move(Self::command_for(bot, dir));
        }

        let can_bomb = bot.active_bombs < bot.max_bombs && !safe.is_empty();
        if can_bomb && Self::rival_adjacent(board, bot) {
            return BotAction::PlaceBomb;
        }
        if can_bomb && Self::soft_wall_adjacent(board, bot.pos) {
            return BotAction::PlaceBomb;
        }

        if rng.random::<f64>() < self.wander_chance {
            if let Some(&(dir, _)) = safe.choose(rng) {
                return BotAction::Move(Self::command_for(bot, dir));
            }
        }

        BotAction::Idle
    }

    /// Valid steps as (intended direction, destination) pairs
    fn generate_legal_moves(board: &Board, bot: &Player) -> Vec<(Direction, Coord)> {
        Direction::all()
            .iter()
            .map(|&dir| (dir, dir.apply(&bot.pos)))
            .filter(|(_, dest)| board.is_move_valid(bot, *dest))
            .collect()
    }

    /// The command that lands the bot one step in `intended`, accounting for
    /// a reverse curse
    fn command_for(bot: &Player, intended: Direction) -> Direction {
        match bot.curse {
            Some(Curse::Reverse) => intended.opposite(),
            _ => intended,
        }
    }

    fn rival_adjacent(board: &Board, bot: &Player) -> bool {
        board
            .living_players()
            .any(|p| p.id != bot.id && p.pos.manhattan(bot.pos) == 1)
    }

    fn soft_wall_adjacent(board: &Board, at: Coord) -> bool {
        Direction::all()
            .iter()
            .any(|dir| board.map.get(dir.apply(&at)) == Some(Tile::Soft))
    }
}

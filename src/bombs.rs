// Bomb placement, kicking and detonation
//
// Detonation is recursive: a blast that reaches another armed bomb sets it
// off on the spot, so inner bombs report before the bomb that triggered
// them. The round is only evaluated once the whole chain has resolved.

use log::{debug, warn};

use crate::protocol::{PlayerChange, ServerEvent, TileChange};
use crate::room::{Phase, Room};
use crate::timers::TimerKind;
use crate::types::{Bomb, BombId, Coord, Direction, PlayerId, Slide, Tile};

impl Room {
    /// Arms a bomb under the player if capacity allows
    pub(crate) fn place_bomb(&mut self, player_id: PlayerId) -> bool {
        if self.phase != Phase::Running {
            return false;
        }
        let Some(player) = self.board.player(player_id) else {
            return false;
        };
        if !player.is_alive || player.active_bombs >= player.max_bombs {
            return false;
        }
        let pos = player.pos;
        if self.board.bomb_at(pos).is_some() {
            debug!("Room {}: {:?} already has a bomb at {:?}", self.code, player_id, pos);
            return false;
        }

        let id = BombId(self.next_id());
        let fuse = self.timers.schedule(self.config.timing.fuse_ms, TimerKind::Fuse(id));
        let super_power = self.config.rules.super_bomb_power;

        let Some(player) = self.board.player_mut(player_id) else {
            return false;
        };
        player.active_bombs += 1;
        let is_super = std::mem::take(&mut player.has_super_bomb);
        let power = if is_super { super_power } else { player.bomb_power };

        self.board.bombs.push(Bomb {
            id,
            owner: player_id,
            pos,
            power,
            is_super,
            is_kicked: false,
            fuse,
            slide: None,
        });

        if is_super {
            self.emit(ServerEvent::PlayerUpdate {
                player_id,
                change: PlayerChange {
                    has_super_bomb: Some(false),
                    ..Default::default()
                },
            });
        }
        self.emit(ServerEvent::BombPlaced {
            id,
            x: pos.x,
            y: pos.y,
            is_super,
        });
        true
    }

    /// Starts a bomb sliding. A bomb already in flight ignores further kicks.
    pub(crate) fn kick_bomb(&mut self, bomb_id: BombId, direction: Direction) {
        let step = self.config.timing.slide_step_ms;
        let Some(bomb) = self.board.bomb_mut(bomb_id) else {
            return;
        };
        if bomb.is_kicked {
            return;
        }

        bomb.is_kicked = true;
        let timer = self.timers.schedule(step, TimerKind::SlideStep(bomb_id));
        bomb.slide = Some(Slide { timer, direction });
    }

    /// Advances a sliding bomb by one cell
    pub(crate) fn step_slide(&mut self, bomb_id: BombId) {
        let Some(bomb) = self.board.bomb(bomb_id) else {
            return;
        };
        let Some(slide) = bomb.slide else {
            return;
        };

        let next = slide.direction.apply(&bomb.pos);
        let open = self.board.map.get(next) == Some(Tile::Empty)
            && !self.board.bombs.iter().any(|b| b.id != bomb_id && b.pos == next);
        if !open {
            self.stop_slide(bomb_id);
            return;
        }

        // The bomb still enters a cell holding a player, then stops there
        let blocked = self.board.living_player_at(next, None).is_some();
        let step = self.config.timing.slide_step_ms;
        if let Some(bomb) = self.board.bomb_mut(bomb_id) {
            bomb.pos = next;
            if !blocked {
                let timer = self.timers.schedule(step, TimerKind::SlideStep(bomb_id));
                bomb.slide = Some(Slide { timer, ..slide });
            }
        }
        if blocked {
            self.stop_slide(bomb_id);
        }

        self.emit(ServerEvent::BombMoved {
            bomb_id,
            x: next.x,
            y: next.y,
        });
    }

    fn stop_slide(&mut self, bomb_id: BombId) {
        if let Some(bomb) = self.board.bomb_mut(bomb_id) {
            if let Some(slide) = bomb.slide.take() {
                self.timers.cancel(slide.timer);
            }
            bomb.is_kicked = false;
        }
    }

    /// Fuse expiry: detonates the bomb and any chain it sets off, then
    /// evaluates the round once
    pub(crate) fn explode(&mut self, bomb_id: BombId) {
        self.detonate(bomb_id, 0);
        self.check_round_over();
    }

    fn detonate(&mut self, bomb_id: BombId, depth: usize) {
        let Some(index) = self.board.bombs.iter().position(|b| b.id == bomb_id) else {
            return;
        };
        let bomb = self.board.bombs.remove(index);
        self.timers.cancel(bomb.fuse);
        if let Some(slide) = bomb.slide {
            self.timers.cancel(slide.timer);
        }
        if let Some(owner) = self.board.player_mut(bomb.owner) {
            owner.active_bombs = owner.active_bombs.saturating_sub(1);
        }

        let mut blast = vec![bomb.pos];
        let mut walls = Vec::new();
        let mut drops = Vec::new();

        for direction in Direction::all() {
            let mut at = bomb.pos;
            for _ in 0..bomb.power {
                at = direction.apply(&at);
                match self.board.map.get(at) {
                    None | Some(Tile::Solid) => break,
                    Some(_) => blast.push(at),
                }

                if let Some(other) = self.board.bomb_at(at).map(|b| b.id) {
                    if depth + 1 >= self.config.rules.max_chain_depth {
                        warn!(
                            "Room {}: chain depth limit reached at {:?}, {:?} left armed",
                            self.code, at, other
                        );
                    } else {
                        self.detonate(other, depth + 1);
                    }
                }

                if self.board.map.get(at) == Some(Tile::Soft) {
                    self.board.map.set_tile(at, Tile::Empty);
                    walls.push(TileChange::new(at, Tile::Empty));
                    drops.extend(self.roll_drop(at));
                    break;
                }
            }
        }

        debug!(
            "Room {}: {:?} exploded at {:?} covering {} cells",
            self.code,
            bomb.id,
            bomb.pos,
            blast.len()
        );
        self.emit(ServerEvent::BombExploded {
            bomb_id: bomb.id,
            explosion_tiles: blast.clone(),
        });
        if !walls.is_empty() {
            self.emit(ServerEvent::MapUpdate { tiles: walls });
        }
        for power_up in drops {
            self.emit(ServerEvent::PowerupSpawned { power_up });
        }
        self.kill_in(&blast);
    }

    fn kill_in(&mut self, blast: &[Coord]) {
        let victims: Vec<PlayerId> = self
            .board
            .living_players()
            .filter(|p| blast.contains(&p.pos))
            .map(|p| p.id)
            .collect();

        for player_id in victims {
            if let Some(player) = self.board.player_mut(player_id) {
                player.is_alive = false;
            }
            debug!("Room {}: {:?} caught in blast", self.code, player_id);
            self.emit(ServerEvent::PlayerUpdate {
                player_id,
                change: PlayerChange {
                    is_alive: Some(false),
                    ..Default::default()
                },
            });
        }
    }
}

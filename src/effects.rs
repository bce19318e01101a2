// Power-up drops, pickups and curses

use log::debug;
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::config::DropWeight;
use crate::protocol::ServerEvent;
use crate::room::Room;
use crate::types::{Coord, Curse, Player, PlayerId, PowerUp, PowerUpId, PowerUpKind};

/// Weighted table of power-up kinds
#[derive(Debug, Clone)]
pub struct DropTable {
    entries: Vec<DropWeight>,
    total: f64,
}

impl DropTable {
    pub fn new(entries: &[DropWeight]) -> Self {
        DropTable {
            entries: entries.to_vec(),
            total: entries.iter().map(|e| e.weight).sum(),
        }
    }

    /// Maps a uniform draw in `[0, 1)` onto the table. Weights are normalised
    /// by their sum, and rounding at the top end falls back to the last entry.
    pub fn pick(&self, draw: f64) -> PowerUpKind {
        let mut cumulative = 0.0;
        for entry in &self.entries {
            cumulative += entry.weight / self.total;
            if draw < cumulative {
                return entry.kind;
            }
        }
        self.entries
            .last()
            .map(|e| e.kind)
            .unwrap_or(PowerUpKind::BombUp)
    }

    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> PowerUpKind {
        self.pick(rng.random::<f64>())
    }
}

/// What a pickup did to the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pickup {
    /// A boost was applied; `cured` is set when it also lifted a curse
    Boosted { cured: bool },
    Cursed(Curse),
}

/// Applies a power-up to `player`. Any non-skull pickup cures an active curse.
pub fn apply_power_up<R: Rng + ?Sized>(player: &mut Player, kind: PowerUpKind, rng: &mut R) -> Pickup {
    if kind == PowerUpKind::Skull {
        let curse = *Curse::all().choose(rng).unwrap_or(&Curse::Reverse);
        player.curse = Some(curse);
        player.slow_tick = false;
        return Pickup::Cursed(curse);
    }

    let cured = player.curse.take().is_some();
    player.slow_tick = false;

    match kind {
        PowerUpKind::BombUp => player.max_bombs += 1,
        PowerUpKind::FireUp => player.bomb_power += 1,
        PowerUpKind::BombPass => player.can_pass_bombs = true,
        PowerUpKind::WallPass => player.can_pass_walls = true,
        PowerUpKind::KickBomb => player.can_kick_bombs = true,
        PowerUpKind::SuperBomb => player.has_super_bomb = true,
        PowerUpKind::Skull => {}
    }

    Pickup::Boosted { cured }
}

impl Room {
    /// Rolls for a power-up on a freshly destroyed wall
    pub(crate) fn roll_drop(&mut self, at: Coord) -> Option<PowerUp> {
        if self.rng.random::<f64>() >= self.config.rules.power_up_chance {
            return None;
        }
        if self.board.power_up_at(at).is_some() {
            return None;
        }

        let kind = self.drop_table.roll(&mut self.rng);
        let power_up = PowerUp {
            id: PowerUpId(self.next_id()),
            kind,
            pos: at,
        };
        self.board.power_ups.push(power_up.clone());
        Some(power_up)
    }

    /// Collects whatever lies under the player
    pub(crate) fn resolve_pickup(&mut self, player_id: PlayerId) {
        let Some(pos) = self.board.player(player_id).map(|p| p.pos) else {
            return;
        };
        let Some(index) = self.board.power_ups.iter().position(|p| p.pos == pos) else {
            return;
        };
        let power_up = self.board.power_ups.remove(index);
        let Some(player) = self.board.players.get_mut(&player_id) else {
            return;
        };

        let outcome = apply_power_up(player, power_up.kind, &mut self.rng);
        let stats = player.stats();
        debug!("Room {}: {:?} picked up {:?}", self.code, player_id, power_up.kind);

        match outcome {
            Pickup::Cursed(curse) => self.emit(ServerEvent::PlayerCursed { player_id, curse }),
            Pickup::Boosted { cured } => {
                if cured {
                    self.emit(ServerEvent::PlayerCured { player_id });
                }
                self.emit(ServerEvent::PowerupCollected {
                    power_up_id: power_up.id,
                    player_id,
                    stats,
                });
            }
        }
    }

    /// Hands the mover's curse to a clean player sharing its new cell
    pub(crate) fn transfer_curse(&mut self, from: PlayerId) {
        let Some(mover) = self.board.player(from) else {
            return;
        };
        let Some(curse) = mover.curse else {
            return;
        };
        let Some(to) = self
            .board
            .living_players()
            .find(|p| p.id != from && p.pos == mover.pos && p.curse.is_none())
            .map(|p| p.id)
        else {
            return;
        };

        if let Some(target) = self.board.player_mut(to) {
            target.curse = Some(curse);
            target.slow_tick = false;
        }
        if let Some(mover) = self.board.player_mut(from) {
            mover.curse = None;
            mover.slow_tick = false;
        }
        debug!("Room {}: {:?} passed {:?} to {:?}", self.code, from, curse, to);
        self.emit(ServerEvent::CurseTransferred { from_id: from, to_id: to, curse });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::room::testing::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fresh_player() -> Player {
        Player::new(
            PlayerId(1),
            "P1".to_string(),
            "😀".to_string(),
            "#FF4136".to_string(),
            false,
            0,
            Coord::new(1, 1),
        )
    }

    #[test]
    fn test_pick_follows_cumulative_weights() {
        let table = DropTable::new(&Config::default_hardcoded().drops);
        assert_eq!(table.pick(0.0), PowerUpKind::BombUp);
        assert_eq!(table.pick(0.26), PowerUpKind::FireUp);
        assert_eq!(table.pick(0.60), PowerUpKind::KickBomb);
        assert_eq!(table.pick(0.70), PowerUpKind::SuperBomb);
        assert_eq!(table.pick(0.80), PowerUpKind::Skull);
        assert_eq!(table.pick(0.90), PowerUpKind::WallPass);
        assert_eq!(table.pick(0.95), PowerUpKind::BombPass);
        assert_eq!(table.pick(0.9999999999), PowerUpKind::BombPass);
    }

    #[test]
    fn test_pick_normalises_uneven_weights() {
        let table = DropTable::new(&[
            DropWeight { kind: PowerUpKind::Skull, weight: 1.0 },
            DropWeight { kind: PowerUpKind::FireUp, weight: 3.0 },
        ]);
        assert_eq!(table.pick(0.24), PowerUpKind::Skull);
        assert_eq!(table.pick(0.25), PowerUpKind::FireUp);
    }

    #[test]
    fn test_boosts_apply_their_capability() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut player = fresh_player();

        apply_power_up(&mut player, PowerUpKind::BombUp, &mut rng);
        apply_power_up(&mut player, PowerUpKind::FireUp, &mut rng);
        apply_power_up(&mut player, PowerUpKind::KickBomb, &mut rng);
        apply_power_up(&mut player, PowerUpKind::SuperBomb, &mut rng);

        assert_eq!(player.max_bombs, 2);
        assert_eq!(player.bomb_power, 2);
        assert!(player.can_kick_bombs);
        assert!(player.has_super_bomb);
        assert!(!player.can_pass_walls);
    }

    #[test]
    fn test_skull_curses_and_boost_cures() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut player = fresh_player();

        let Pickup::Cursed(curse) = apply_power_up(&mut player, PowerUpKind::Skull, &mut rng) else {
            panic!("skull should curse");
        };
        assert_eq!(player.curse, Some(curse));

        let outcome = apply_power_up(&mut player, PowerUpKind::WallPass, &mut rng);
        assert_eq!(outcome, Pickup::Boosted { cured: true });
        assert_eq!(player.curse, None);
        assert!(player.can_pass_walls);
    }

    #[test]
    fn test_pickup_emits_cure_then_collected() {
        let (mut room, ids) = running_room(quiet_config(), &[(false, Coord::new(3, 1))]);
        room.board.player_mut(ids[0]).unwrap().curse = Some(Curse::Slow);
        room.board.power_ups.push(PowerUp {
            id: PowerUpId(50),
            kind: PowerUpKind::FireUp,
            pos: Coord::new(3, 1),
        });

        room.resolve_pickup(ids[0]);
        assert_eq!(kinds(&mut room), vec!["player_cured", "powerup_collected"]);
        assert!(room.board.power_ups.is_empty());
        assert_eq!(room.board.player(ids[0]).unwrap().bomb_power, 2);
    }

    #[test]
    fn test_skull_pickup_emits_only_cursed() {
        let (mut room, ids) = running_room(quiet_config(), &[(false, Coord::new(3, 1))]);
        room.board.power_ups.push(PowerUp {
            id: PowerUpId(50),
            kind: PowerUpKind::Skull,
            pos: Coord::new(3, 1),
        });

        room.resolve_pickup(ids[0]);
        assert_eq!(kinds(&mut room), vec!["player_cursed"]);
        assert!(room.board.player(ids[0]).unwrap().curse.is_some());
    }

    #[test]
    fn test_drop_never_stacks_on_existing_power_up() {
        let mut config = quiet_config();
        config.rules.power_up_chance = 1.0;
        let (mut room, _) = running_room(config, &[(false, Coord::new(1, 1))]);

        let first = room.roll_drop(Coord::new(5, 5));
        assert!(first.is_some());
        assert!(room.roll_drop(Coord::new(5, 5)).is_none());
        assert_eq!(room.board.power_ups.len(), 1);
    }
}

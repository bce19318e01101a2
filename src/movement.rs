// Move pipeline shared by humans and bots

use crate::protocol::ServerEvent;
use crate::room::{Phase, Room};
use crate::types::{Curse, Direction, PlayerId};

impl Room {
    /// Applies one move input. Returns whether the input had an effect
    /// (a step or a kick).
    pub(crate) fn attempt_move(&mut self, player_id: PlayerId, direction: Direction) -> bool {
        if self.phase != Phase::Running {
            return false;
        }
        let Some(player) = self.board.player_mut(player_id) else {
            return false;
        };
        if !player.is_alive {
            return false;
        }

        if player.curse == Some(Curse::Slow) {
            let swallowed = player.slow_tick;
            player.slow_tick = !swallowed;
            if swallowed {
                return false;
            }
        }
        let direction = match player.curse {
            Some(Curse::Reverse) => direction.opposite(),
            _ => direction,
        };

        let target = direction.apply(&player.pos);
        let kicks = player.can_kick_bombs && !player.can_pass_bombs;

        if let Some(bomb) = self.board.bomb_at(target) {
            if kicks && !bomb.is_kicked {
                let bomb_id = bomb.id;
                self.kick_bomb(bomb_id, direction);
                return true;
            }
        }

        let Some(player) = self.board.player(player_id) else {
            return false;
        };
        if !self.board.is_move_valid(player, target) {
            return false;
        }

        if let Some(player) = self.board.player_mut(player_id) {
            player.pos = target;
        }
        self.transfer_curse(player_id);
        self.resolve_pickup(player_id);
        self.emit(ServerEvent::PlayerMoved {
            player_id,
            x: target.x,
            y: target.y,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::room::testing::*;
    use crate::types::{Coord, Curse, Direction, PowerUp, PowerUpId, PowerUpKind, Tile};

    #[test]
    fn test_move_onto_soft_wall_is_rejected_silently() {
        let (mut room, ids) = running_room(quiet_config(), &[(false, Coord::new(1, 1))]);
        room.board.map.set_tile(Coord::new(2, 1), Tile::Soft);

        assert!(!room.attempt_move(ids[0], Direction::Right));
        assert_eq!(room.board.player(ids[0]).unwrap().pos, Coord::new(1, 1));
        assert!(room.drain_events().is_empty());
    }

    #[test]
    fn test_valid_move_emits_player_moved() {
        let (mut room, ids) = running_room(quiet_config(), &[(false, Coord::new(1, 1))]);
        assert!(room.attempt_move(ids[0], Direction::Down));
        assert_eq!(room.board.player(ids[0]).unwrap().pos, Coord::new(1, 2));
        assert_eq!(kinds(&mut room), vec!["player_moved"]);
    }

    #[test]
    fn test_dead_players_do_not_move() {
        let (mut room, ids) = running_room(quiet_config(), &[(false, Coord::new(1, 1))]);
        room.board.player_mut(ids[0]).unwrap().is_alive = false;
        assert!(!room.attempt_move(ids[0], Direction::Right));
    }

    #[test]
    fn test_reverse_curse_inverts_direction() {
        let (mut room, ids) = running_room(quiet_config(), &[(false, Coord::new(3, 1))]);
        room.board.player_mut(ids[0]).unwrap().curse = Some(Curse::Reverse);

        room.attempt_move(ids[0], Direction::Right);
        assert_eq!(room.board.player(ids[0]).unwrap().pos, Coord::new(2, 1));
    }

    #[test]
    fn test_slow_curse_swallows_every_other_input() {
        let (mut room, ids) = running_room(quiet_config(), &[(false, Coord::new(3, 1))]);
        room.board.player_mut(ids[0]).unwrap().curse = Some(Curse::Slow);

        assert!(room.attempt_move(ids[0], Direction::Right));
        assert!(!room.attempt_move(ids[0], Direction::Right));
        assert!(room.attempt_move(ids[0], Direction::Right));
        assert_eq!(room.board.player(ids[0]).unwrap().pos, Coord::new(5, 1));
    }

    #[test]
    fn test_curse_passes_to_clean_player_on_contact() {
        let (mut room, ids) = running_room(
            quiet_config(),
            &[(false, Coord::new(3, 1)), (false, Coord::new(4, 1))],
        );
        room.board.player_mut(ids[0]).unwrap().curse = Some(Curse::Reverse);

        // Reversed, so "left" carries the mover right onto the other player
        room.attempt_move(ids[0], Direction::Left);
        assert_eq!(room.board.player(ids[0]).unwrap().pos, Coord::new(4, 1));
        assert_eq!(room.board.player(ids[0]).unwrap().curse, None);
        assert_eq!(room.board.player(ids[1]).unwrap().curse, Some(Curse::Reverse));
        assert_eq!(kinds(&mut room), vec!["curse_transferred", "player_moved"]);
    }

    #[test]
    fn test_curse_not_passed_to_already_cursed_player() {
        let (mut room, ids) = running_room(
            quiet_config(),
            &[(false, Coord::new(3, 1)), (false, Coord::new(4, 1))],
        );
        room.board.player_mut(ids[0]).unwrap().curse = Some(Curse::Slow);
        room.board.player_mut(ids[1]).unwrap().curse = Some(Curse::Reverse);

        room.attempt_move(ids[0], Direction::Right);
        assert_eq!(room.board.player(ids[0]).unwrap().curse, Some(Curse::Slow));
        assert_eq!(room.board.player(ids[1]).unwrap().curse, Some(Curse::Reverse));
    }

    #[test]
    fn test_kicker_pushes_bomb_instead_of_moving() {
        let (mut room, ids) = running_room(
            quiet_config(),
            &[(false, Coord::new(3, 1)), (false, Coord::new(13, 11))],
        );
        room.place_bomb(ids[0]);
        room.attempt_move(ids[0], Direction::Left);
        room.board.player_mut(ids[0]).unwrap().can_kick_bombs = true;
        room.drain_events();

        assert!(room.attempt_move(ids[0], Direction::Right));
        assert_eq!(room.board.player(ids[0]).unwrap().pos, Coord::new(2, 1));
        assert!(room.board.bombs[0].is_kicked);
        assert!(room.drain_events().is_empty());

        room.advance(100);
        assert_eq!(room.board.bombs[0].pos, Coord::new(4, 1));
    }

    #[test]
    fn test_bomb_pass_walks_over_bombs() {
        let (mut room, ids) = running_room(quiet_config(), &[(false, Coord::new(3, 1))]);
        room.place_bomb(ids[0]);
        room.attempt_move(ids[0], Direction::Left);
        assert!(!room.attempt_move(ids[0], Direction::Right));

        let player = room.board.player_mut(ids[0]).unwrap();
        player.can_pass_bombs = true;
        player.can_kick_bombs = true;
        assert!(room.attempt_move(ids[0], Direction::Right));
        assert_eq!(room.board.player(ids[0]).unwrap().pos, Coord::new(3, 1));
    }

    #[test]
    fn test_stepping_on_power_up_collects_it() {
        let (mut room, ids) = running_room(quiet_config(), &[(false, Coord::new(1, 1))]);
        room.board.power_ups.push(PowerUp {
            id: PowerUpId(77),
            kind: PowerUpKind::BombUp,
            pos: Coord::new(2, 1),
        });

        room.attempt_move(ids[0], Direction::Right);
        assert_eq!(kinds(&mut room), vec!["powerup_collected", "player_moved"]);
        assert_eq!(room.board.player(ids[0]).unwrap().max_bombs, 2);
    }
}

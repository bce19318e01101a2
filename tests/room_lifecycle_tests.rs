// Integration tests for the room lifecycle
//
// Drives a Room through its public API only: lobby, round start, the round
// clock and membership changes. Time is advanced on the room's own clock so
// nothing here sleeps.

use bomb_arena::config::Config;
use bomb_arena::map::SPAWN_POINTS;
use bomb_arena::protocol::{ClientCommand, Recipient, ServerEvent};
use bomb_arena::room::{JoinError, Phase, Room};
use bomb_arena::types::{Direction, Tile};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

fn open_room(seed: u64) -> (Room, bomb_arena::types::PlayerId) {
    Room::open(
        "TEST".to_string(),
        Arc::new(Config::default_hardcoded()),
        StdRng::seed_from_u64(seed),
        "Host".to_string(),
        Some("🐸".to_string()),
    )
}

fn kinds(room: &mut Room) -> Vec<&'static str> {
    room.drain_events().iter().map(|e| e.event.kind()).collect()
}

#[test]
fn test_game_start_snapshot_shape() {
    let (mut room, host) = open_room(11);
    let guest = room.join("Guest".to_string(), None).unwrap();
    room.drain_events();

    room.handle_command(host, ClientCommand::StartGame {});
    let events = room.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].to, Recipient::Room);

    let value = serde_json::to_value(&events[0].event).unwrap();
    assert_eq!(value["type"], "game_start");
    let state = &value["initialState"];
    assert_eq!(state["gameMap"].as_array().unwrap().len(), 13);
    assert_eq!(state["gameMap"][0].as_array().unwrap().len(), 15);
    assert_eq!(state["players"].as_array().unwrap().len(), 2);
    assert_eq!(state["bombs"].as_array().unwrap().len(), 0);

    let guest = room.board().player(guest).unwrap();
    assert_eq!(guest.pos, SPAWN_POINTS[1]);
    assert!(guest.is_alive);
}

#[test]
fn test_guest_cannot_start_and_commands_wait_for_running() {
    let (mut room, host) = open_room(12);
    let guest = room.join("Guest".to_string(), None).unwrap();
    room.drain_events();

    room.handle_command(guest, ClientCommand::StartGame {});
    room.handle_command(host, ClientCommand::PlaceBomb {});
    room.handle_command(host, ClientCommand::Move { direction: Direction::Right });
    assert!(room.drain_events().is_empty());
    assert_eq!(room.phase(), Phase::Lobby);
    assert_eq!(room.board().player(host).unwrap().pos, SPAWN_POINTS[0]);
}

#[test]
fn test_bomb_at_spawn_detonates_after_fuse() {
    let (mut room, host) = open_room(13);
    room.join("Guest".to_string(), None).unwrap();
    room.handle_command(host, ClientCommand::StartGame {});
    room.drain_events();

    room.handle_command(host, ClientCommand::PlaceBomb {});
    assert_eq!(kinds(&mut room), vec!["bomb_placed"]);
    room.handle_command(host, ClientCommand::Move { direction: Direction::Down });
    assert_eq!(room.board().player(host).unwrap().pos, Direction::Down.apply(&SPAWN_POINTS[0]));
    room.drain_events();

    room.advance(2999);
    assert!(room.drain_events().is_empty());
    room.advance(1);
    let events = kinds(&mut room);
    assert_eq!(events[0], "bomb_exploded");
    assert!(room.board().bombs.is_empty());
    assert_eq!(room.board().player(host).unwrap().active_bombs, 0);
}

#[test]
fn test_round_clock_starts_arena_collapse() {
    let (mut room, host) = open_room(14);
    room.join("Guest".to_string(), None).unwrap();
    room.handle_command(host, ClientCommand::StartGame {});
    room.drain_events();

    room.advance(120_000);
    assert_eq!(kinds(&mut room), vec!["sudden_death_starting"]);

    let solid_before = room.board().map.cells_of(Tile::Solid).count();
    room.advance(5_000);
    let events = room.drain_events();
    assert_eq!(events.len(), 5);
    for envelope in &events {
        match &envelope.event {
            ServerEvent::MapUpdate { tiles } => {
                assert_eq!(tiles.len(), 1);
                assert_eq!(tiles[0].new_type, Tile::Solid);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
    assert_eq!(room.board().map.cells_of(Tile::Solid).count(), solid_before + 5);
}

#[test]
fn test_room_full_and_rejoin_after_leave() {
    let (mut room, host) = open_room(15);
    let mut guests = Vec::new();
    for i in 0..4 {
        guests.push(room.join(format!("G{}", i), None).unwrap());
    }
    assert_eq!(room.join("Sixth".to_string(), None), Err(JoinError::RoomFull));

    room.leave(guests[1]);
    let again = room.join("Again".to_string(), None).unwrap();
    assert_eq!(room.board().player(again).unwrap().spawn_index, 2);
    assert_eq!(room.host(), Some(host));
}

#[test]
fn test_host_leaving_promotes_next_human() {
    let (mut room, host) = open_room(16);
    room.handle_command(host, ClientCommand::AddBot {});
    let guest = room.join("Guest".to_string(), None).unwrap();
    room.drain_events();

    room.leave(host);
    assert_eq!(room.host(), Some(guest));
    let events = room.drain_events();
    match &events[0].event {
        ServerEvent::LobbyUpdate { host_id, players } => {
            assert_eq!(*host_id, Some(guest));
            assert_eq!(players.len(), 2);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_bots_alone_abandon_the_room() {
    let (mut room, host) = open_room(17);
    room.handle_command(host, ClientCommand::AddBot {});
    room.handle_command(host, ClientCommand::AddBot {});
    room.handle_command(host, ClientCommand::StartGame {});
    assert!(!room.is_abandoned());

    room.leave(host);
    assert!(room.is_abandoned());
    assert_eq!(room.next_deadline(), None);
}

#[test]
fn test_bots_act_once_the_round_runs() {
    let (mut room, host) = open_room(18);
    room.handle_command(host, ClientCommand::AddBot {});
    room.handle_command(host, ClientCommand::StartGame {});
    room.drain_events();

    // A bot may idle on a given cycle, but over ten seconds it does something
    room.advance(10_000);
    let events = room.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e.event, ServerEvent::PlayerMoved { .. } | ServerEvent::BombPlaced { .. })));
}

// Room registry and room actors
//
// `GameServer` owns the table of live rooms and the table of client
// connections. Each room runs as its own tokio task that exclusively owns the
// `Room`, so commands, timer expiries and disconnects for one room are applied
// strictly one at a time while different rooms run in parallel.

use log::{debug, info, warn};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};

use crate::config::Config;
use crate::debug_logger::DebugLogger;
use crate::protocol::{ClientCommand, Recipient, ServerEvent};
use crate::room::{JoinError, Room};
use crate::types::PlayerId;

/// Characters room codes are drawn from. `0` and `O` are left out.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNPQRSTUVWXYZ123456789";
const CODE_LENGTH: usize = 4;

pub type ConnectionId = u64;

/// Queue of events bound for one client
pub type Outbound = mpsc::UnboundedSender<ServerEvent>;

/// Messages accepted by a room actor
enum RoomMessage {
    Join {
        name: String,
        emoji: Option<String>,
        outbound: Outbound,
        reply: oneshot::Sender<Result<PlayerId, JoinError>>,
    },
    Command {
        player: PlayerId,
        command: ClientCommand,
    },
    Leave {
        player: PlayerId,
    },
}

/// Handle to a running room
#[derive(Clone)]
struct RoomHandle {
    tx: mpsc::UnboundedSender<RoomMessage>,
}

type RoomTable = Arc<Mutex<HashMap<String, RoomHandle>>>;
type ConnectionTable = Arc<Mutex<HashMap<ConnectionId, Connection>>>;

/// One client connection and the seat it holds, if any
struct Connection {
    outbound: Outbound,
    inbox: Option<mpsc::UnboundedReceiver<ServerEvent>>,
    seat: Option<(String, PlayerId)>,
}

/// Registry of every live room and connected client
pub struct GameServer {
    config: Arc<Config>,
    rooms: RoomTable,
    connections: ConnectionTable,
    next_connection: AtomicU64,
    logger: DebugLogger,
}

impl GameServer {
    pub fn new(config: Config, logger: DebugLogger) -> Self {
        GameServer {
            config: Arc::new(config),
            rooms: Arc::new(Mutex::new(HashMap::new())),
            connections: Arc::new(Mutex::new(HashMap::new())),
            next_connection: AtomicU64::new(1),
            logger,
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.lock().len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Registers a new client connection
    pub fn connect(&self) -> ConnectionId {
        let id = self.next_connection.fetch_add(1, Ordering::Relaxed);
        let (outbound, inbox) = mpsc::unbounded_channel();
        self.connections.lock().insert(
            id,
            Connection {
                outbound,
                inbox: Some(inbox),
                seat: None,
            },
        );
        debug!("Connection {} opened", id);
        id
    }

    /// Hands out the event stream of a connection. Only the first caller gets it.
    pub fn take_events(&self, conn: ConnectionId) -> Option<EventFeed> {
        let inbox = self.connections.lock().get_mut(&conn)?.inbox.take()?;
        Some(EventFeed {
            conn,
            inbox,
            rooms: self.rooms.clone(),
            connections: self.connections.clone(),
        })
    }

    /// Applies one raw inbound message from a connection.
    /// Returns false when the connection is unknown.
    pub async fn dispatch(&self, conn: ConnectionId, raw: &str) -> bool {
        let Some((outbound, seat)) = self
            .connections
            .lock()
            .get(&conn)
            .map(|c| (c.outbound.clone(), c.seat.clone()))
        else {
            return false;
        };

        let command = match ClientCommand::parse(raw) {
            Ok(command) => command,
            Err(e) => {
                warn!("Connection {}: {}", conn, e);
                return true;
            }
        };

        match command {
            ClientCommand::CreateRoom { .. } | ClientCommand::JoinRoom { .. } if seat.is_some() => {
                debug!("Connection {} is already seated, ignoring {:?}", conn, command);
            }
            ClientCommand::CreateRoom { name, emoji } => {
                let (code, player) = self.create_room(name, emoji, outbound);
                self.set_seat(conn, code, player);
            }
            ClientCommand::JoinRoom { room_code, name, emoji } => {
                match self.join_room(&room_code, name, emoji, outbound.clone()).await {
                    Ok((code, player)) => self.set_seat(conn, code, player),
                    Err(e) => {
                        debug!("Connection {} could not join {}: {}", conn, room_code, e);
                        let _ = outbound.send(ServerEvent::ErrorMessage { message: e.to_string() });
                    }
                }
            }
            command => match seat {
                Some((code, player)) => self.send_to_room(&code, RoomMessage::Command { player, command }),
                None => debug!("Connection {} has no room, ignoring {:?}", conn, command),
            },
        }
        true
    }

    /// Drops a connection and frees its seat
    pub fn disconnect(&self, conn: ConnectionId) -> bool {
        close_connection(&self.rooms, &self.connections, conn)
    }

    /// Records the seat a connection won. A connection that is gone, or was
    /// seated by another request in the meantime, gives the new seat back.
    fn set_seat(&self, conn: ConnectionId, code: String, player: PlayerId) {
        {
            let mut connections = self.connections.lock();
            match connections.get_mut(&conn) {
                Some(connection) if connection.seat.is_none() => {
                    connection.seat = Some((code, player));
                    return;
                }
                Some(_) => debug!("Connection {} already seated, releasing {:?} in {}", conn, player, code),
                None => debug!("Connection {} closed before taking {:?} in {}", conn, player, code),
            }
        }
        self.send_to_room(&code, RoomMessage::Leave { player });
    }

    fn send_to_room(&self, code: &str, message: RoomMessage) {
        send_to_room(&self.rooms, code, message);
    }

    fn create_room(&self, name: String, emoji: Option<String>, outbound: Outbound) -> (String, PlayerId) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut rooms = self.rooms.lock();
        let code = generate_code(&rooms);

        let (room, host) = Room::open(
            code.clone(),
            self.config.clone(),
            StdRng::from_os_rng(),
            name,
            emoji,
        );
        rooms.insert(code.clone(), RoomHandle { tx });
        drop(rooms);

        let members = HashMap::from([(host, outbound)]);
        tokio::spawn(run_room(room, members, rx, self.rooms.clone(), self.logger.clone()));
        (code, host)
    }

    async fn join_room(
        &self,
        room_code: &str,
        name: String,
        emoji: Option<String>,
        outbound: Outbound,
    ) -> Result<(String, PlayerId), JoinError> {
        let code = room_code.trim().to_uppercase();
        let handle = self
            .rooms
            .lock()
            .get(&code)
            .cloned()
            .ok_or(JoinError::RoomNotFound)?;

        let (reply, response) = oneshot::channel();
        handle
            .tx
            .send(RoomMessage::Join { name, emoji, outbound, reply })
            .map_err(|_| JoinError::RoomNotFound)?;

        // A room torn down before handling the request drops the reply
        let player = response.await.map_err(|_| JoinError::RoomNotFound)??;
        Ok((code, player))
    }
}

/// Outbound events of one connection. Dropping the feed closes the
/// connection, so a client that goes away without saying so loses its seat.
pub struct EventFeed {
    conn: ConnectionId,
    inbox: mpsc::UnboundedReceiver<ServerEvent>,
    rooms: RoomTable,
    connections: ConnectionTable,
}

impl EventFeed {
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.inbox.recv().await
    }
}

impl Drop for EventFeed {
    fn drop(&mut self) {
        if close_connection(&self.rooms, &self.connections, self.conn) {
            debug!("Connection {} stream dropped", self.conn);
        }
    }
}

fn close_connection(rooms: &RoomTable, connections: &ConnectionTable, conn: ConnectionId) -> bool {
    let Some(connection) = connections.lock().remove(&conn) else {
        return false;
    };
    if let Some((code, player)) = connection.seat {
        send_to_room(rooms, &code, RoomMessage::Leave { player });
    }
    debug!("Connection {} closed", conn);
    true
}

fn send_to_room(rooms: &RoomTable, code: &str, message: RoomMessage) {
    let handle = rooms.lock().get(code).cloned();
    match handle {
        Some(handle) => {
            if handle.tx.send(message).is_err() {
                debug!("Room {} is shutting down, message dropped", code);
            }
        }
        None => debug!("Room {} not found, message dropped", code),
    }
}

fn generate_code(rooms: &HashMap<String, RoomHandle>) -> String {
    let mut rng = rand::rng();
    loop {
        let code: String = (0..CODE_LENGTH)
            .filter_map(|_| CODE_ALPHABET.choose(&mut rng))
            .map(|&b| b as char)
            .collect();
        if !rooms.contains_key(&code) {
            return code;
        }
    }
}

/// Room actor: applies messages and due timers one at a time until the last
/// human leaves, then removes the room from the registry
async fn run_room(
    mut room: Room,
    mut members: HashMap<PlayerId, Outbound>,
    mut inbox: mpsc::UnboundedReceiver<RoomMessage>,
    rooms: RoomTable,
    logger: DebugLogger,
) {
    let started = Instant::now();
    let elapsed_ms = || started.elapsed().as_millis() as u64;
    info!("Room {} opened", room.code());
    flush(&mut room, &mut members, &logger);

    loop {
        let deadline = room
            .next_deadline()
            .map(|ms| started + Duration::from_millis(ms));

        tokio::select! {
            message = inbox.recv() => {
                let Some(message) = message else {
                    break;
                };
                room.advance_to(elapsed_ms());
                match message {
                    RoomMessage::Join { name, emoji, outbound, reply } => {
                        let result = room.join(name, emoji);
                        if let Ok(player) = result {
                            members.insert(player, outbound);
                        }
                        let _ = reply.send(result);
                    }
                    RoomMessage::Command { player, command } => room.handle_command(player, command),
                    RoomMessage::Leave { player } => {
                        members.remove(&player);
                        room.leave(player);
                    }
                }
            }
            _ = wait_for(deadline) => {
                room.advance_to(elapsed_ms());
            }
        }

        flush(&mut room, &mut members, &logger);
        if room.is_abandoned() {
            break;
        }
    }

    room.shutdown();
    rooms.lock().remove(room.code());
    info!("Room {} torn down", room.code());
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Delivers queued events. A member whose stream has closed leaves the room,
/// which may queue more events for the rest.
fn flush(room: &mut Room, members: &mut HashMap<PlayerId, Outbound>, logger: &DebugLogger) {
    loop {
        let gone = deliver(room, members, logger);
        if gone.is_empty() {
            return;
        }
        for player in gone {
            info!("Room {}: stream of {:?} closed", room.code(), player);
            members.remove(&player);
            room.leave(player);
        }
    }
}

/// Routes every queued event to its audience. Returns the members whose
/// stream is closed.
fn deliver(room: &mut Room, members: &HashMap<PlayerId, Outbound>, logger: &DebugLogger) -> Vec<PlayerId> {
    let mut gone = Vec::new();
    let mut send = |player: PlayerId, outbound: &Outbound, event: ServerEvent| {
        if outbound.send(event).is_err() && !gone.contains(&player) {
            gone.push(player);
        }
    };

    for envelope in room.drain_events() {
        logger.log_outcome(room.code(), room.round(), &envelope.event);
        match envelope.to {
            Recipient::Room => {
                for (player, outbound) in members {
                    send(*player, outbound, envelope.event.clone());
                }
            }
            Recipient::Player(player) => {
                if let Some(outbound) = members.get(&player) {
                    send(player, outbound, envelope.event);
                }
            }
        }
    }
    gone
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_avoid_ambiguous_characters() {
        let rooms = HashMap::new();
        for _ in 0..200 {
            let code = generate_code(&rooms);
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(!code.contains('0'));
            assert!(!code.contains('O'));
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_generated_code_is_unique_in_table() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut rooms = HashMap::new();
        for _ in 0..50 {
            let code = generate_code(&rooms);
            assert!(!rooms.contains_key(&code));
            rooms.insert(code, RoomHandle { tx: tx.clone() });
        }
        assert_eq!(rooms.len(), 50);
    }

    #[test]
    fn test_deliver_reports_members_with_closed_streams() {
        let (mut room, host) = Room::open(
            "TEST".to_string(),
            Arc::new(Config::default_hardcoded()),
            StdRng::seed_from_u64(1),
            "Ana".to_string(),
            None,
        );
        let (outbound, inbox) = mpsc::unbounded_channel();
        drop(inbox);
        let members = HashMap::from([(host, outbound)]);

        let gone = deliver(&mut room, &members, &DebugLogger::disabled());
        assert_eq!(gone, vec![host]);
    }

    #[tokio::test]
    async fn test_second_seat_on_one_connection_is_released() {
        let server = GameServer::new(Config::default_hardcoded(), DebugLogger::disabled());
        let conn = server.connect();
        let outbound = server.connections.lock()[&conn].outbound.clone();

        // Both creations got past the seat check before either was recorded
        let (first, first_host) = server.create_room("Ana".to_string(), None, outbound.clone());
        let (second, second_host) = server.create_room("Ana".to_string(), None, outbound);
        server.set_seat(conn, first.clone(), first_host);
        server.set_seat(conn, second.clone(), second_host);

        let seat = server.connections.lock()[&conn].seat.clone();
        assert_eq!(seat, Some((first.clone(), first_host)));

        for _ in 0..100 {
            if server.room_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(server.room_count(), 1);
        assert!(server.rooms.lock().contains_key(&first));
        assert!(!server.rooms.lock().contains_key(&second));
    }
}

// Room state and round lifecycle
//
// A `Room` is one match: its lobby, its board, its timers and its outbound
// event queue. It is owned by exactly one actor task and never shared, so
// every method here runs serialized. Bomb, movement and effect rules are
// implemented on `Room` in their own modules.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::board::Board;
use crate::bot::{BotAction, BotBrain};
use crate::config::Config;
use crate::effects::DropTable;
use crate::map::{MapGrid, SPAWN_POINTS};
use crate::protocol::{ClientCommand, Envelope, PlayerChange, Recipient, RoundState, ServerEvent, TileChange};
use crate::timers::{TimerId, TimerKind, TimerQueue};
use crate::types::{Curse, Player, PlayerId, Tile};

/// Colors handed out in join order
pub const PLAYER_COLORS: [&str; 5] = ["#FF4136", "#0074D9", "#2ECC40", "#FFDC00", "#B10DC9"];
const FALLBACK_COLOR: &str = "#888888";
const DEFAULT_EMOJI: &str = "😀";
const BOT_EMOJI: &str = "🤖";

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the host to start
    Lobby,
    /// Round in progress, moves and bombs accepted
    Running,
    /// Round decided, waiting to announce and restart
    RoundEnding,
    /// A player reached the win threshold
    GameOver,
}

/// Why a join request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    RoomNotFound,
    RoomFull,
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::RoomNotFound => write!(f, "Room not found."),
            JoinError::RoomFull => write!(f, "Room is full."),
        }
    }
}

pub struct Room {
    pub(crate) code: String,
    pub(crate) config: Arc<Config>,
    pub(crate) drop_table: DropTable,
    pub(crate) brain: BotBrain,
    pub(crate) phase: Phase,
    pub(crate) board: Board,
    pub(crate) host: Option<PlayerId>,
    pub(crate) timers: TimerQueue,
    pub(crate) rng: StdRng,
    pub(crate) round: u32,
    pub(crate) round_clock: Option<TimerId>,
    pub(crate) sudden_death_tick: Option<TimerId>,
    pub(crate) bot_timers: HashMap<PlayerId, TimerId>,
    pub(crate) announce: Option<TimerId>,
    pub(crate) next_round: Option<TimerId>,
    pub(crate) round_winner: Option<PlayerId>,
    pub(crate) bot_sudden_death: bool,
    pub(crate) timed_sudden_death: bool,
    next_entity: u64,
    outbox: Vec<Envelope>,
}

impl Room {
    fn new(code: String, config: Arc<Config>, rng: StdRng) -> Self {
        Room {
            code,
            drop_table: DropTable::new(&config.drops),
            brain: BotBrain::new(&config),
            config,
            phase: Phase::Lobby,
            board: Board::default(),
            host: None,
            timers: TimerQueue::new(),
            rng,
            round: 0,
            round_clock: None,
            sudden_death_tick: None,
            bot_timers: HashMap::new(),
            announce: None,
            next_round: None,
            round_winner: None,
            bot_sudden_death: false,
            timed_sudden_death: false,
            next_entity: 1,
            outbox: Vec::new(),
        }
    }

    /// Opens a room with its creator seated as host
    pub fn open(
        code: String,
        config: Arc<Config>,
        rng: StdRng,
        host_name: String,
        host_emoji: Option<String>,
    ) -> (Room, PlayerId) {
        let mut room = Room::new(code, config, rng);
        let host = room.seat(host_name, host_emoji, false);
        room.host = Some(host);

        info!("Room {} created by player {:?}", room.code, host);
        room.send_to(
            host,
            ServerEvent::RoomCreated {
                player_id: host,
                room_code: room.code.clone(),
                host_id: host,
                players: room.board.player_list(),
            },
        );
        (room, host)
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn host(&self) -> Option<PlayerId> {
        self.host
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Current room time in milliseconds
    pub fn now(&self) -> u64 {
        self.timers.now()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    /// A room with no humans left is torn down
    pub fn is_abandoned(&self) -> bool {
        !self.board.players.values().any(|p| !p.is_bot)
    }

    /// Takes every event queued since the last call, in emission order
    pub fn drain_events(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.outbox)
    }

    pub(crate) fn emit(&mut self, event: ServerEvent) {
        self.outbox.push(Envelope { to: Recipient::Room, event });
    }

    fn send_to(&mut self, player: PlayerId, event: ServerEvent) {
        self.outbox.push(Envelope { to: Recipient::Player(player), event });
    }

    pub(crate) fn next_id(&mut self) -> u64 {
        let id = self.next_entity;
        self.next_entity += 1;
        id
    }

    /// Fires every timer due up to `now_ms`, in deadline order
    pub fn advance_to(&mut self, now_ms: u64) {
        while let Some((_, kind)) = self.timers.pop_due(now_ms) {
            self.on_timer(kind);
        }
        self.timers.set_now(now_ms);
    }

    pub fn advance(&mut self, delta_ms: u64) {
        self.advance_to(self.timers.now() + delta_ms);
    }

    fn on_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Fuse(bomb) => self.explode(bomb),
            TimerKind::SlideStep(bomb) => self.step_slide(bomb),
            TimerKind::BotThink(bot) => self.run_bot(bot),
            TimerKind::RoundClock => self.start_timed_sudden_death(),
            TimerKind::SuddenDeathTick => self.crumble_tile(),
            TimerKind::AnnounceRound => self.announce_round(),
            TimerKind::NextRound => {
                self.next_round = None;
                if self.phase == Phase::RoundEnding {
                    self.start_round(false);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    fn seat(&mut self, name: String, emoji: Option<String>, is_bot: bool) -> PlayerId {
        let taken: Vec<usize> = self.board.players.values().map(|p| p.spawn_index).collect();
        let spawn_index = (0..SPAWN_POINTS.len())
            .find(|i| !taken.contains(i))
            .unwrap_or(0);

        let color = PLAYER_COLORS
            .iter()
            .find(|c| !self.board.players.values().any(|p| p.color == **c))
            .map_or(FALLBACK_COLOR, |c| *c)
            .to_string();
        let emoji = emoji
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_EMOJI.to_string());

        let id = PlayerId(self.next_id());
        let name = if is_bot { format!("Bot {}", spawn_index + 1) } else { name };
        let player = Player::new(id, name, emoji, color, is_bot, spawn_index, SPAWN_POINTS[spawn_index]);

        self.board.players.insert(id, player);
        self.board.join_order.push(id);
        id
    }

    fn is_full(&self) -> bool {
        self.board.players.len() >= self.config.rules.max_players
    }

    /// Seats a human. Late joiners sit out until the next round starts.
    pub fn join(&mut self, name: String, emoji: Option<String>) -> Result<PlayerId, JoinError> {
        if self.is_full() {
            return Err(JoinError::RoomFull);
        }

        let id = self.seat(name, emoji, false);
        if self.phase != Phase::Lobby {
            if let Some(player) = self.board.player_mut(id) {
                player.is_alive = false;
            }
        }

        info!("Player {:?} joined room {}", id, self.code);
        let host_id = self.host.unwrap_or(id);
        self.send_to(
            id,
            ServerEvent::RoomJoined {
                player_id: id,
                room_code: self.code.clone(),
                host_id,
                players: self.board.player_list(),
            },
        );
        self.emit_lobby_update();
        Ok(id)
    }

    fn emit_lobby_update(&mut self) {
        self.emit(ServerEvent::LobbyUpdate {
            players: self.board.player_list(),
            host_id: self.host,
        });
    }

    /// Removes a player. The oldest remaining human inherits the host seat.
    pub fn leave(&mut self, player_id: PlayerId) {
        if self.board.players.remove(&player_id).is_none() {
            return;
        }
        self.board.join_order.retain(|id| *id != player_id);
        if let Some(timer) = self.bot_timers.remove(&player_id) {
            self.timers.cancel(timer);
        }
        info!("Player {:?} left room {}", player_id, self.code);

        if self.is_abandoned() {
            self.shutdown();
            return;
        }

        if self.host == Some(player_id) {
            self.host = self.board.ordered_players().find(|p| !p.is_bot).map(|p| p.id);
        }

        match self.phase {
            Phase::Lobby => self.emit_lobby_update(),
            _ => {
                self.emit(ServerEvent::PlayerLeft {
                    player_id,
                    new_host_id: self.host,
                });
                self.check_round_over();
            }
        }
    }

    /// Cancels every pending timer. Called when the room is torn down.
    pub fn shutdown(&mut self) {
        self.timers.clear();
        self.bot_timers.clear();
        self.round_clock = None;
        self.sudden_death_tick = None;
        self.announce = None;
        self.next_round = None;
        for bomb in self.board.bombs.iter_mut() {
            bomb.slide = None;
        }
        info!("Room {} shut down", self.code);
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Applies a command from a seated player. Commands in the wrong phase or
    /// from the wrong seat are dropped without a reply.
    pub fn handle_command(&mut self, player_id: PlayerId, command: ClientCommand) {
        if self.board.player(player_id).is_none() {
            debug!("Room {}: command from unknown player {:?}", self.code, player_id);
            return;
        }

        match (self.phase, command) {
            (Phase::Lobby, ClientCommand::ChangeEmoji { emoji }) => {
                if let Some(player) = self.board.player_mut(player_id) {
                    player.emoji = emoji
                        .filter(|e| !e.is_empty())
                        .unwrap_or_else(|| DEFAULT_EMOJI.to_string());
                }
                self.emit_lobby_update();
            }
            (Phase::Lobby, ClientCommand::AddBot {}) => self.add_bot(player_id),
            (Phase::Lobby, ClientCommand::StartGame {}) => {
                if self.host == Some(player_id) {
                    self.start_round(true);
                }
            }
            (Phase::Running, ClientCommand::Move { direction }) => {
                self.attempt_move(player_id, direction);
            }
            (Phase::Running, ClientCommand::PlaceBomb {}) => {
                self.place_bomb(player_id);
            }
            (phase, command) => {
                debug!(
                    "Room {}: ignoring {:?} from {:?} during {:?}",
                    self.code, command, player_id, phase
                );
            }
        }
    }

    fn add_bot(&mut self, requested_by: PlayerId) {
        if self.host != Some(requested_by) || self.is_full() {
            return;
        }
        let id = self.seat(String::new(), Some(BOT_EMOJI.to_string()), true);
        debug!("Room {}: added bot {:?}", self.code, id);
        self.emit_lobby_update();
    }

    // ------------------------------------------------------------------
    // Round lifecycle
    // ------------------------------------------------------------------

    fn cancel_round_timers(&mut self) {
        for timer in [
            self.round_clock.take(),
            self.sudden_death_tick.take(),
            self.announce.take(),
            self.next_round.take(),
        ]
        .into_iter()
        .flatten()
        {
            self.timers.cancel(timer);
        }
        self.stop_bots();
    }

    fn stop_bots(&mut self) {
        for (_, timer) in self.bot_timers.drain() {
            self.timers.cancel(timer);
        }
    }

    /// Regenerates the arena and puts everyone back on their spawn
    pub(crate) fn start_round(&mut self, first: bool) {
        self.cancel_round_timers();
        for bomb in self.board.bombs.drain(..) {
            self.timers.cancel(bomb.fuse);
            if let Some(slide) = bomb.slide {
                self.timers.cancel(slide.timer);
            }
        }
        self.board.power_ups.clear();

        self.board.map = MapGrid::generate(&mut self.rng, self.config.rules.soft_wall_chance);
        for spawn in SPAWN_POINTS {
            self.board.map.clear_spawn_neighborhood(spawn);
        }

        let (power, bombs) = (
            self.config.rules.starting_bomb_power,
            self.config.rules.starting_max_bombs,
        );
        for player in self.board.players.values_mut() {
            player.reset_for_round(SPAWN_POINTS[player.spawn_index], power, bombs);
        }

        self.phase = Phase::Running;
        self.round += 1;
        self.round_winner = None;
        self.bot_sudden_death = false;
        self.timed_sudden_death = false;

        self.round_clock = Some(
            self.timers
                .schedule(self.config.timing.round_duration_ms, TimerKind::RoundClock),
        );
        let bots: Vec<PlayerId> = self.board.ordered_players().filter(|p| p.is_bot).map(|p| p.id).collect();
        for bot in bots {
            let timer = self
                .timers
                .schedule(self.config.timing.bot_think_interval_ms, TimerKind::BotThink(bot));
            self.bot_timers.insert(bot, timer);
        }

        info!("Room {}: round {} started", self.code, self.round);
        let state = self.round_state();
        if first {
            self.emit(ServerEvent::GameStart { initial_state: state });
        } else {
            self.emit(ServerEvent::RoundStart { new_state: state });
        }
    }

    pub fn round_state(&self) -> RoundState {
        RoundState {
            round: self.round,
            players: self.board.player_list(),
            game_map: self.board.map.clone(),
            bombs: self.board.bombs.clone(),
            power_ups: self.board.power_ups.clone(),
        }
    }

    /// Evaluates bot sudden death and the end of the round. Only acts while
    /// the round is running, so repeated calls after the round is decided
    /// change nothing.
    pub(crate) fn check_round_over(&mut self) {
        if self.phase != Phase::Running {
            return;
        }

        let alive: Vec<PlayerId> = self.board.living_players().map(|p| p.id).collect();
        let humans_alive = self.board.living_players().filter(|p| !p.is_bot).count();

        if humans_alive == 0 && alive.len() >= 2 && !self.bot_sudden_death {
            self.activate_bot_sudden_death(&alive);
        }

        if alive.len() <= 1 {
            self.end_round(alive.first().copied());
        }
    }

    fn activate_bot_sudden_death(&mut self, alive: &[PlayerId]) {
        self.bot_sudden_death = true;
        info!("Room {}: bot sudden death", self.code);
        self.emit(ServerEvent::SuddenDeath);

        let (power, bombs) = (
            self.config.rules.sudden_death_bomb_power,
            self.config.rules.sudden_death_max_bombs,
        );
        for &id in alive {
            let Some(bot) = self.board.player_mut(id).filter(|p| p.is_bot) else {
                continue;
            };
            bot.bomb_power = power;
            bot.max_bombs = bombs;
            self.emit(ServerEvent::PlayerUpdate {
                player_id: id,
                change: PlayerChange {
                    bomb_power: Some(power),
                    max_bombs: Some(bombs),
                    ..Default::default()
                },
            });
        }
    }

    fn end_round(&mut self, winner: Option<PlayerId>) {
        self.phase = Phase::RoundEnding;
        self.cancel_round_timers();

        if let Some(player) = winner.and_then(|id| self.board.player_mut(id)) {
            player.score += 1;
        }
        self.round_winner = winner;

        info!("Room {}: round {} over, winner {:?}", self.code, self.round, winner);
        self.announce = Some(
            self.timers
                .schedule(self.config.timing.round_end_delay_ms, TimerKind::AnnounceRound),
        );
    }

    fn announce_round(&mut self) {
        self.announce = None;
        if self.phase != Phase::RoundEnding {
            return;
        }

        let winner = self
            .round_winner
            .and_then(|id| self.board.player(id))
            .map(|p| (p.name.clone(), p.score));

        self.emit(ServerEvent::RoundOver {
            winner_name: winner.as_ref().map(|(name, _)| name.clone()),
        });
        self.emit(ServerEvent::ScoreUpdate {
            players: self.board.player_list(),
        });

        match winner {
            Some((name, score)) if score >= self.config.rules.wins_to_match => {
                info!("Room {}: {} wins the match", self.code, name);
                self.phase = Phase::GameOver;
                self.cancel_round_timers();
                self.emit(ServerEvent::GameOver { winner_name: name });
            }
            _ => {
                self.next_round = Some(
                    self.timers
                        .schedule(self.config.timing.next_round_delay_ms, TimerKind::NextRound),
                );
            }
        }
    }

    fn start_timed_sudden_death(&mut self) {
        self.round_clock = None;
        if self.phase != Phase::Running || self.timed_sudden_death {
            return;
        }

        self.timed_sudden_death = true;
        info!("Room {}: arena starts closing in", self.code);
        self.emit(ServerEvent::SuddenDeathStarting);
        self.sudden_death_tick = Some(
            self.timers
                .schedule(self.config.timing.sudden_death_interval_ms, TimerKind::SuddenDeathTick),
        );
    }

    /// One sudden-death tick: a random free floor tile becomes solid
    fn crumble_tile(&mut self) {
        self.sudden_death_tick = None;
        if self.phase != Phase::Running {
            return;
        }
        self.sudden_death_tick = Some(
            self.timers
                .schedule(self.config.timing.sudden_death_interval_ms, TimerKind::SuddenDeathTick),
        );

        let board = &self.board;
        let candidates: Vec<_> = board
            .map
            .cells_of(Tile::Empty)
            .filter(|&at| {
                !board.any_player_at(at) && board.power_up_at(at).is_none() && board.bomb_at(at).is_none()
            })
            .collect();

        let Some(&cell) = candidates.choose(&mut self.rng) else {
            return;
        };
        self.board.map.set_tile(cell, Tile::Solid);
        self.emit(ServerEvent::MapUpdate {
            tiles: vec![TileChange::new(cell, Tile::Solid)],
        });
    }

    // ------------------------------------------------------------------
    // Bots
    // ------------------------------------------------------------------

    fn run_bot(&mut self, bot_id: PlayerId) {
        self.bot_timers.remove(&bot_id);
        if self.phase != Phase::Running {
            return;
        }
        let Some(bot) = self.board.player(bot_id).filter(|p| p.is_bot) else {
            return;
        };
        let alive = bot.is_alive;

        let timer = self
            .timers
            .schedule(self.config.timing.bot_think_interval_ms, TimerKind::BotThink(bot_id));
        self.bot_timers.insert(bot_id, timer);

        if !alive {
            return;
        }

        // A slowed bot whose next move would be swallowed spends the cycle on it
        if let Some(bot) = self.board.player_mut(bot_id) {
            if bot.curse == Some(Curse::Slow) && bot.slow_tick {
                bot.slow_tick = false;
                return;
            }
        }

        let action = self.brain.decide(&self.board, bot_id, &mut self.rng);
        debug!("Room {}: bot {:?} -> {:?}", self.code, bot_id, action);
        match action {
            BotAction::Move(direction) => {
                self.attempt_move(bot_id, direction);
            }
            BotAction::PlaceBomb => {
                self.place_bomb(bot_id);
            }
            BotAction::Idle => {}
        }
    }
}

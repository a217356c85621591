//! Aggregate root for a multiplayer room.
//!
//! `Room` is a synchronous state machine. Every handler either rejects the
//! command with a `GameError`, leaving the room untouched, or mutates the
//! room and queues the `Effect`s the engine must carry out.

use std::time::Duration;

use chrono::{DateTime, Utc};
use geoquizz_core::clock::Clock;
use geoquizz_core::error::GameError;
use geoquizz_core::geo::{Coordinate, GeoScorer};
use geoquizz_core::photo::Photo;
use geoquizz_core::record::{GameRecord, PlayerRecord};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::commands::PlayerAction;
use super::effects::{Effect, RoomTimer};
use super::events::{
    JoinedRoom, PlayerRoundResult, PlayerSummary, ROOM_FAULT_CODE, RankingEntry, RoomSnapshot,
    RoundResults, RoundStarted, ServerMessage,
};
use super::player::{ConnectionId, PLAYER_COLORS, Player, PlayerId};
use super::room_code::RoomCode;

/// Roster limit: one palette color per player.
pub const MAX_PLAYERS: usize = PLAYER_COLORS.len();

/// Ready players needed before the host may start.
pub const MIN_READY_PLAYERS: usize = 2;

const TICK: Duration = Duration::from_secs(1);

const GAME_TIMERS: [RoomTimer; 6] = [
    RoomTimer::CountdownTick,
    RoomTimer::RoundTick,
    RoomTimer::RoundExpired,
    RoomTimer::PauseTick,
    RoomTimer::PauseExpired,
    RoomTimer::AutoAdvance,
];

/// Lifecycle state of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomState {
    /// Gathering players.
    Lobby,
    /// Counting down to the next round.
    Countdown,
    /// Accepting guesses.
    RoundActive,
    /// Showing the outcome of the last round.
    RoundResults,
    /// Waiting for a dropped player.
    Paused,
    /// Game over.
    Finished,
}

/// Durations that drive a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomTimings {
    /// Countdown ticks before each round.
    pub countdown_seconds: u32,
    /// Length of a round.
    pub round: Duration,
    /// How long a paused room waits for dropped players.
    pub pause_window: Duration,
    /// How long a dropped player can reclaim their identity.
    pub grace_window: Duration,
    /// Close the room after this long without a client command.
    pub idle_timeout: Duration,
    /// Leave round results automatically after this delay.
    pub auto_advance: Option<Duration>,
}

impl Default for RoomTimings {
    fn default() -> Self {
        Self {
            countdown_seconds: 3,
            round: Duration::from_secs(60),
            pause_window: Duration::from_secs(30),
            grace_window: Duration::from_secs(120),
            idle_timeout: Duration::from_secs(600),
            auto_advance: None,
        }
    }
}

/// What was running when the room paused.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Frozen {
    Countdown {
        seconds_remaining: u32,
        until_tick: Duration,
    },
    Round {
        remaining: Duration,
    },
}

#[derive(Debug, Clone)]
struct Pause {
    frozen: Frozen,
    deadline: Instant,
    /// Players who dropped while this pause was open. Earlier drops are
    /// not waited for.
    awaited: Vec<PlayerId>,
}

/// The aggregate root for one room.
#[derive(Debug)]
pub struct Room {
    code: RoomCode,
    name: String,
    created_at: DateTime<Utc>,
    num_rounds: usize,
    round_index: usize,
    state: RoomState,
    players: Vec<Player>,
    host: Option<PlayerId>,
    deck: Vec<Photo>,
    photo: Option<Photo>,
    round_deadline: Option<Instant>,
    countdown_remaining: u32,
    countdown_tick_at: Option<Instant>,
    pause: Option<Pause>,
    timings: RoomTimings,
    scorer: GeoScorer,
    /// Effects not yet handed to the engine.
    effects: Vec<Effect>,
}

impl Room {
    /// Creates an empty room in `LOBBY`. The first player to join hosts it.
    #[must_use]
    pub fn new(
        code: RoomCode,
        name: String,
        num_rounds: usize,
        deck: Vec<Photo>,
        timings: RoomTimings,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut room = Self {
            code,
            name,
            created_at,
            num_rounds,
            round_index: 0,
            state: RoomState::Lobby,
            players: Vec::new(),
            host: None,
            deck,
            photo: None,
            round_deadline: None,
            countdown_remaining: 0,
            countdown_tick_at: None,
            pause: None,
            timings,
            scorer: GeoScorer::default(),
            effects: Vec::new(),
        };
        room.touch();
        room
    }

    /// Room code.
    #[must_use]
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> RoomState {
        self.state
    }

    /// 0-based current round.
    #[must_use]
    pub fn round_index(&self) -> usize {
        self.round_index
    }

    /// Rounds in the game.
    #[must_use]
    pub fn num_rounds(&self) -> usize {
        self.num_rounds
    }

    /// Current host.
    #[must_use]
    pub fn host(&self) -> Option<PlayerId> {
        self.host
    }

    /// Roster in join order, departed players included.
    #[must_use]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Looks up a player.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// When the active round closes.
    #[must_use]
    pub fn round_deadline(&self) -> Option<Instant> {
        self.round_deadline
    }

    /// When a paused room resumes regardless.
    #[must_use]
    pub fn pause_deadline(&self) -> Option<Instant> {
        self.pause.as_ref().map(|p| p.deadline)
    }

    /// Effects queued since the last `take_effects`.
    #[must_use]
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// Drains the queued effects.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// Restarts the idle timeout. Called for every client command.
    pub fn touch(&mut self) {
        self.effects
            .push(Effect::after(RoomTimer::Idle, self.timings.idle_timeout));
    }

    /// Roster view broadcast in `room_updated`. Departed players are omitted.
    #[must_use]
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.code.clone(),
            name: self.name.clone(),
            state: self.state,
            host_id: self.host,
            round_index: self.round_index,
            num_rounds: self.num_rounds,
            players: self
                .players
                .iter()
                .filter(|p| !p.left)
                .map(|p| PlayerSummary {
                    player_id: p.id,
                    name: p.name.clone(),
                    color: p.color.to_owned(),
                    ready: p.ready,
                    connected: p.connected,
                    is_host: self.host == Some(p.id),
                    total_score: p.total_score(),
                })
                .collect(),
        }
    }

    /// Everyone who played, best total first. Equal totals keep join order.
    #[must_use]
    pub fn ranking(&self) -> Vec<RankingEntry> {
        let mut order: Vec<&Player> = self.players.iter().collect();
        order.sort_by_key(|p| std::cmp::Reverse(p.total_score()));
        order
            .into_iter()
            .enumerate()
            .map(|(i, p)| RankingEntry {
                rank: i + 1,
                player_id: p.id,
                name: p.name.clone(),
                color: p.color.to_owned(),
                total_score: p.total_score(),
            })
            .collect()
    }

    // --- joining -----------------------------------------------------------

    /// Adds a player, or re-binds an existing one whose session token matches.
    ///
    /// A token that matches nobody, or whose grace window has lapsed, is
    /// ignored and the caller joins under a fresh identity.
    ///
    /// # Errors
    ///
    /// Returns `GameError::InvalidTransition` once the game has finished and
    /// `GameError::RoomFull` when every palette color is taken.
    pub fn join(
        &mut self,
        connection: ConnectionId,
        name: String,
        session_token: Option<&str>,
        now: Instant,
    ) -> Result<PlayerId, GameError> {
        if self.state == RoomState::Finished {
            return Err(GameError::transition("the game has already finished"));
        }
        if let Some(token) = session_token {
            if let Ok(id) = self.reclaim(connection, token, now) {
                return Ok(id);
            }
        }

        let Some(color) = self.free_color() else {
            return Err(GameError::RoomFull { limit: MAX_PLAYERS });
        };
        let mut player = Player::new(name, color, connection);
        if let Some(round) = self.open_round_index() {
            player.open_round(round);
        }
        let id = player.id;
        self.players.push(player);
        if self.host.is_none() {
            self.host = Some(id);
        }
        self.announce_join(id, connection, false);
        Ok(id)
    }

    fn reclaim(
        &mut self,
        connection: ConnectionId,
        token: &str,
        now: Instant,
    ) -> Result<PlayerId, GameError> {
        let grace = self.timings.grace_window;
        let player = self
            .players
            .iter_mut()
            .find(|p| !p.left && p.session_token == token)
            .ok_or(GameError::StaleSession)?;
        if !player.connected {
            let lapsed = player
                .disconnected_at
                .is_none_or(|at| now.saturating_duration_since(at) > grace);
            if lapsed {
                return Err(GameError::StaleSession);
            }
        }

        let previous = player.connection.filter(|old| *old != connection);
        player.bind(connection);
        let id = player.id;
        if let Some(old) = previous {
            self.effects.push(Effect::Unbind { connection: old });
        }
        self.announce_join(id, connection, true);
        self.catch_up(connection, now);
        if self.state == RoomState::Paused && !self.pause_awaits_anyone() {
            self.resume(now);
        }
        Ok(id)
    }

    fn announce_join(&mut self, id: PlayerId, connection: ConnectionId, reconnected: bool) {
        let Some(player) = self.player(id) else {
            return;
        };
        let joined = JoinedRoom {
            player_id: id,
            color: player.color.to_owned(),
            room_id: self.code.clone(),
            session_token: player.session_token.clone(),
            is_host: self.host == Some(id),
            reconnected,
        };
        self.effects.push(Effect::Bind {
            connection,
            player: id,
        });
        self.effects.push(Effect::Send {
            connection,
            message: ServerMessage::JoinedRoom(joined),
        });
        self.broadcast_roster();
    }

    /// Replays the running round to a connection that just came back.
    fn catch_up(&mut self, connection: ConnectionId, now: Instant) {
        let mut messages = Vec::new();
        match (self.state, self.pause.as_ref().map(|p| p.frozen)) {
            (RoomState::Countdown, _) => messages.push(ServerMessage::CountdownTick {
                seconds_remaining: self.countdown_remaining,
            }),
            (RoomState::RoundActive, _) => {
                messages.extend(self.round_started());
                if let Some(deadline) = self.round_deadline {
                    messages.push(ServerMessage::TimerUpdate {
                        seconds_remaining: ceil_seconds(deadline.saturating_duration_since(now)),
                    });
                }
            }
            (RoomState::Paused, Some(Frozen::Round { .. })) => {
                messages.extend(self.round_started());
            }
            _ => {}
        }
        for message in messages {
            self.effects.push(Effect::Send {
                connection,
                message,
            });
        }
    }

    // --- player actions ----------------------------------------------------

    /// Applies a command from a bound player.
    ///
    /// # Errors
    ///
    /// Returns the guard failure; the room is left unchanged.
    pub fn act(
        &mut self,
        player: PlayerId,
        action: PlayerAction,
        now: Instant,
        clock: &dyn Clock,
    ) -> Result<(), GameError> {
        match action {
            PlayerAction::Ready(ready) => self.set_ready(player, ready),
            PlayerAction::Start => self.start(player, now),
            PlayerAction::Submit {
                latitude,
                longitude,
            } => self.submit(player, latitude, longitude, clock),
            PlayerAction::NextRound => self.next_round(player, now, clock),
            PlayerAction::Leave => self.leave(player, now),
            PlayerAction::Kick(target) => self.kick(player, target, now),
        }
    }

    fn set_ready(&mut self, id: PlayerId, ready: bool) -> Result<(), GameError> {
        self.require_state(RoomState::Lobby, "change readiness")?;
        let player = self.member_mut(id)?;
        player.ready = ready;
        self.broadcast_roster();
        Ok(())
    }

    fn start(&mut self, id: PlayerId, now: Instant) -> Result<(), GameError> {
        self.require_host(id, "start the game")?;
        self.require_state(RoomState::Lobby, "start the game")?;
        let ready = self
            .players
            .iter()
            .filter(|p| p.ready && p.is_active())
            .count();
        if ready < MIN_READY_PLAYERS {
            return Err(GameError::transition(format!(
                "need at least {MIN_READY_PLAYERS} ready players, have {ready}"
            )));
        }
        self.round_index = 0;
        self.begin_countdown(now);
        Ok(())
    }

    fn submit(
        &mut self,
        id: PlayerId,
        latitude: f64,
        longitude: f64,
        clock: &dyn Clock,
    ) -> Result<(), GameError> {
        self.require_state(RoomState::RoundActive, "submit a guess")?;
        let truth = self
            .photo
            .as_ref()
            .map(|p| p.location)
            .ok_or_else(|| GameError::transition("no photo is on show"))?;
        let location = Coordinate::new(latitude, longitude)?;
        let round = self.round_index;
        let scored = self.scorer.score(&location, &truth);

        let player = self.member_mut(id)?;
        if player.has_submitted(round) {
            return Err(GameError::DuplicateGuess { round_index: round });
        }
        player.open_round(round);
        if let Some(guess) = player.guess_for_mut(round) {
            guess.fill(location, scored, clock.now());
        }

        self.broadcast(ServerMessage::PlayerSubmitted { player_id: id });
        if self.all_submitted() {
            self.resolve();
        }
        Ok(())
    }

    fn next_round(
        &mut self,
        id: PlayerId,
        now: Instant,
        clock: &dyn Clock,
    ) -> Result<(), GameError> {
        self.require_host(id, "advance the game")?;
        self.require_state(RoomState::RoundResults, "advance the game")?;
        self.advance(now, clock);
        Ok(())
    }

    fn leave(&mut self, id: PlayerId, now: Instant) -> Result<(), GameError> {
        self.member_mut(id)?;
        self.depart(id, now);
        Ok(())
    }

    fn kick(&mut self, id: PlayerId, target: PlayerId, now: Instant) -> Result<(), GameError> {
        self.require_host(id, "kick players")?;
        if self.state == RoomState::Finished {
            return Err(GameError::transition("the game has already finished"));
        }
        if target == id {
            return Err(GameError::transition("the host cannot kick themselves"));
        }
        self.member_mut(target)?;
        self.broadcast(ServerMessage::PlayerKicked { player_id: target });
        self.depart(target, now);
        Ok(())
    }

    // --- connection loss ---------------------------------------------------

    /// Marks a player disconnected after their connection dropped.
    ///
    /// Ignored unless `connection` is the one currently bound to the player,
    /// so a late notice for a replaced connection changes nothing.
    pub fn disconnect(&mut self, id: PlayerId, connection: ConnectionId, now: Instant) {
        let Some(player) = self.players.iter_mut().find(|p| p.id == id) else {
            return;
        };
        if player.left || player.connection != Some(connection) {
            return;
        }
        player.unbind(now);
        let name = player.name.clone();
        if self.host == Some(id) {
            self.promote_host();
        }
        self.broadcast_roster();
        match self.state {
            RoomState::Countdown | RoomState::RoundActive => self.pause(id, name, now),
            RoomState::Paused => {
                if let Some(pause) = self.pause.as_mut().filter(|p| !p.awaited.contains(&id)) {
                    pause.awaited.push(id);
                }
            }
            _ => {}
        }
    }

    fn pause(&mut self, dropped: PlayerId, player_name: String, now: Instant) {
        let frozen = match self.state {
            RoomState::Countdown => Frozen::Countdown {
                seconds_remaining: self.countdown_remaining,
                until_tick: self
                    .countdown_tick_at
                    .map_or(TICK, |at| at.saturating_duration_since(now)),
            },
            _ => Frozen::Round {
                remaining: self
                    .round_deadline
                    .map_or(Duration::ZERO, |d| d.saturating_duration_since(now)),
            },
        };
        for timer in [
            RoomTimer::CountdownTick,
            RoomTimer::RoundTick,
            RoomTimer::RoundExpired,
        ] {
            self.effects.push(Effect::Cancel(timer));
        }
        let window = self.timings.pause_window;
        self.round_deadline = None;
        self.countdown_tick_at = None;
        self.state = RoomState::Paused;
        self.pause = Some(Pause {
            frozen,
            deadline: now + window,
            awaited: vec![dropped],
        });
        self.broadcast(ServerMessage::GamePaused {
            player_name,
            pause_seconds: ceil_seconds(window),
        });
        self.effects.push(Effect::after(RoomTimer::PauseExpired, window));
        self.effects.push(Effect::every(RoomTimer::PauseTick, TICK));
    }

    fn resume(&mut self, now: Instant) {
        let Some(pause) = self.pause.take() else {
            return;
        };
        self.effects.push(Effect::Cancel(RoomTimer::PauseExpired));
        self.effects.push(Effect::Cancel(RoomTimer::PauseTick));
        self.broadcast(ServerMessage::GameResumed);
        match pause.frozen {
            Frozen::Countdown {
                seconds_remaining,
                until_tick,
            } => {
                self.run_countdown(seconds_remaining, until_tick, now);
            }
            Frozen::Round { remaining } => {
                self.run_round(remaining, now);
                self.broadcast(ServerMessage::TimerUpdate {
                    seconds_remaining: ceil_seconds(remaining),
                });
                if self.all_submitted() {
                    self.resolve();
                }
            }
        }
    }

    // --- timers ------------------------------------------------------------

    /// Handles a timer firing. Firings that no longer fit the state are
    /// dropped.
    pub fn on_timer(&mut self, timer: RoomTimer, now: Instant, clock: &dyn Clock) {
        match (timer, self.state) {
            (RoomTimer::CountdownTick, RoomState::Countdown) => self.countdown_tick(now),
            (RoomTimer::RoundTick, RoomState::RoundActive) => {
                if let Some(deadline) = self.round_deadline {
                    let seconds_remaining = ceil_seconds(deadline.saturating_duration_since(now));
                    if seconds_remaining > 0 {
                        self.broadcast(ServerMessage::TimerUpdate { seconds_remaining });
                    }
                }
            }
            (RoomTimer::RoundExpired, RoomState::RoundActive) => self.resolve(),
            (RoomTimer::PauseTick, RoomState::Paused) => {
                if let Some(deadline) = self.pause_deadline() {
                    let seconds_remaining = ceil_seconds(deadline.saturating_duration_since(now));
                    if seconds_remaining > 0 {
                        self.broadcast(ServerMessage::PauseCountdown { seconds_remaining });
                    }
                }
            }
            (RoomTimer::PauseExpired, RoomState::Paused) => {
                let awaited = self
                    .pause
                    .as_ref()
                    .map(|p| p.awaited.clone())
                    .unwrap_or_default();
                for player in self
                    .players
                    .iter_mut()
                    .filter(|p| awaited.contains(&p.id) && p.is_awaited())
                {
                    player.absent = true;
                }
                self.resume(now);
            }
            (RoomTimer::AutoAdvance, RoomState::RoundResults) => self.advance(now, clock),
            (RoomTimer::Idle, _) => {
                self.broadcast(ServerMessage::RoomClosed {
                    reason: "idle timeout".to_owned(),
                });
                self.effects.push(Effect::Close);
            }
            _ => {}
        }
    }

    fn countdown_tick(&mut self, now: Instant) {
        self.countdown_remaining = self.countdown_remaining.saturating_sub(1);
        if self.countdown_remaining == 0 {
            self.countdown_tick_at = None;
            self.effects.push(Effect::Cancel(RoomTimer::CountdownTick));
            self.begin_round(now);
        } else {
            self.broadcast(ServerMessage::CountdownTick {
                seconds_remaining: self.countdown_remaining,
            });
            // Ticks are chained off the planned instant so they never drift.
            let next = self.countdown_tick_at.map_or(now, |at| at.max(now)) + TICK;
            self.schedule_countdown_tick(next.saturating_duration_since(now), now);
        }
    }

    // --- round flow --------------------------------------------------------

    fn begin_countdown(&mut self, now: Instant) {
        let Some(photo) = self.deck.get(self.round_index).cloned() else {
            self.fault(&format!("no photo for round {}", self.round_index + 1));
            return;
        };
        self.photo = Some(photo);
        for player in &mut self.players {
            player.ready = false;
        }
        self.run_countdown(self.timings.countdown_seconds, TICK, now);
    }

    /// Shows `seconds_remaining` and fires the next tick after `until_tick`.
    fn run_countdown(&mut self, seconds_remaining: u32, until_tick: Duration, now: Instant) {
        if seconds_remaining == 0 {
            self.begin_round(now);
            return;
        }
        self.state = RoomState::Countdown;
        self.countdown_remaining = seconds_remaining;
        self.broadcast(ServerMessage::CountdownTick { seconds_remaining });
        self.schedule_countdown_tick(until_tick, now);
    }

    fn schedule_countdown_tick(&mut self, delay: Duration, now: Instant) {
        self.countdown_tick_at = Some(now + delay);
        self.effects
            .push(Effect::after(RoomTimer::CountdownTick, delay));
    }

    fn begin_round(&mut self, now: Instant) {
        let round = self.round_index;
        for player in &mut self.players {
            player.open_round(round);
        }
        self.run_round(self.timings.round, now);
        if let Some(started) = self.round_started() {
            self.broadcast(started);
        }
    }

    fn run_round(&mut self, remaining: Duration, now: Instant) {
        self.state = RoomState::RoundActive;
        self.round_deadline = Some(now + remaining);
        self.effects
            .push(Effect::after(RoomTimer::RoundExpired, remaining));
        self.effects.push(Effect::every(RoomTimer::RoundTick, TICK));
    }

    fn round_started(&self) -> Option<ServerMessage> {
        self.photo.as_ref().map(|photo| {
            ServerMessage::RoundStarted(RoundStarted {
                round_index: self.round_index,
                total_rounds: self.num_rounds,
                photo_id: photo.id.clone(),
                photo_url: photo.url.clone(),
                duration_seconds: ceil_seconds(self.timings.round),
            })
        })
    }

    fn resolve(&mut self) {
        self.effects.push(Effect::Cancel(RoomTimer::RoundExpired));
        self.effects.push(Effect::Cancel(RoomTimer::RoundTick));
        self.round_deadline = None;
        let Some(location) = self.photo.as_ref().map(|p| p.location) else {
            self.fault("the round lost its photo");
            return;
        };
        self.state = RoomState::RoundResults;

        let round = self.round_index;
        let results = self
            .players
            .iter()
            .map(|p| {
                let guess = p.guess_for(round);
                PlayerRoundResult {
                    player_id: p.id,
                    name: p.name.clone(),
                    color: p.color.to_owned(),
                    guess: guess.and_then(|g| g.location),
                    distance_km: guess.and_then(|g| g.distance_km),
                    score: guess.map_or(0, |g| g.score),
                    total_score: p.total_score(),
                }
            })
            .collect();
        self.broadcast(ServerMessage::RoundResults(RoundResults {
            round_index: round,
            location,
            results,
        }));
        if let Some(delay) = self.timings.auto_advance {
            self.effects.push(Effect::after(RoomTimer::AutoAdvance, delay));
        }
    }

    fn advance(&mut self, now: Instant, clock: &dyn Clock) {
        self.effects.push(Effect::Cancel(RoomTimer::AutoAdvance));
        if self.round_index + 1 < self.num_rounds {
            self.round_index += 1;
            self.begin_countdown(now);
        } else {
            self.finish(clock);
        }
    }

    fn finish(&mut self, clock: &dyn Clock) {
        self.state = RoomState::Finished;
        self.photo = None;
        let ranking = self.ranking();
        let record = self.record(&ranking, clock.now());
        self.broadcast(ServerMessage::GameFinished { ranking });
        self.effects.push(Effect::Record(record));
    }

    #[allow(clippy::cast_precision_loss)]
    fn record(&self, ranking: &[RankingEntry], finished_at: DateTime<Utc>) -> GameRecord {
        let rounds = self.num_rounds.max(1) as f64;
        GameRecord {
            room_code: self.code.to_string(),
            room_name: self.name.clone(),
            created_at: self.created_at,
            finished_at,
            num_rounds: self.num_rounds,
            players: ranking
                .iter()
                .map(|entry| PlayerRecord {
                    player_name: entry.name.clone(),
                    rank: entry.rank,
                    total_score: entry.total_score,
                    average_score: (f64::from(entry.total_score) / rounds * 100.0).round() / 100.0,
                })
                .collect(),
        }
    }

    /// Forces the room to `FINISHED` after an internal inconsistency.
    fn fault(&mut self, reason: &str) {
        for timer in GAME_TIMERS {
            self.effects.push(Effect::Cancel(timer));
        }
        self.broadcast(ServerMessage::Error {
            message: reason.to_owned(),
            code: ROOM_FAULT_CODE.to_owned(),
        });
        self.state = RoomState::Finished;
        self.round_deadline = None;
        self.countdown_tick_at = None;
        self.pause = None;
        self.photo = None;
        self.broadcast_roster();
    }

    // --- departures --------------------------------------------------------

    /// Removes a player in the lobby, flags them `left` once the game runs.
    fn depart(&mut self, id: PlayerId, now: Instant) {
        let Some(index) = self.players.iter().position(|p| p.id == id) else {
            return;
        };
        let connection = self.players[index].connection;
        if self.state == RoomState::Lobby {
            self.players.remove(index);
        } else {
            let player = &mut self.players[index];
            player.left = true;
            player.ready = false;
            player.unbind(now);
        }
        if let Some(connection) = connection {
            self.effects.push(Effect::Unbind { connection });
        }
        if self.host == Some(id) {
            self.promote_host();
        }
        if self.players.iter().all(|p| p.left) {
            self.effects.push(Effect::Close);
            return;
        }
        self.broadcast_roster();
        self.settle(now);
    }

    /// Re-checks progress after the roster shrank.
    fn settle(&mut self, now: Instant) {
        match self.state {
            RoomState::Paused if !self.pause_awaits_anyone() => self.resume(now),
            RoomState::RoundActive if self.all_submitted() => self.resolve(),
            _ => {}
        }
    }

    /// Hands the host role to the first connected player in join order. If
    /// nobody is connected the current host keeps it unless they departed.
    fn promote_host(&mut self) {
        if let Some(next) = self.players.iter().find(|p| p.is_active()) {
            self.host = Some(next.id);
            return;
        }
        let host_remains = self
            .host
            .and_then(|id| self.player(id))
            .is_some_and(|p| !p.left);
        if !host_remains {
            self.host = self.players.iter().find(|p| !p.left).map(|p| p.id);
        }
    }

    // --- helpers -----------------------------------------------------------

    fn broadcast(&mut self, message: ServerMessage) {
        self.effects.push(Effect::Broadcast(message));
    }

    fn broadcast_roster(&mut self) {
        let snapshot = self.snapshot();
        self.broadcast(ServerMessage::RoomUpdated(snapshot));
    }

    fn require_state(&self, expected: RoomState, what: &str) -> Result<(), GameError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(GameError::transition(format!(
                "cannot {what} while the room is {:?}",
                self.state
            )))
        }
    }

    fn require_host(&self, id: PlayerId, what: &str) -> Result<(), GameError> {
        if self.host == Some(id) {
            Ok(())
        } else {
            Err(GameError::transition(format!("only the host can {what}")))
        }
    }

    fn member_mut(&mut self, id: PlayerId) -> Result<&mut Player, GameError> {
        self.players
            .iter_mut()
            .find(|p| p.id == id && !p.left)
            .ok_or_else(|| GameError::transition(format!("player {id} is not in the room")))
    }

    fn free_color(&self) -> Option<&'static str> {
        PLAYER_COLORS
            .iter()
            .copied()
            .find(|color| self.players.iter().all(|p| p.color != *color))
    }

    fn open_round_index(&self) -> Option<usize> {
        match (self.state, self.pause.as_ref().map(|p| p.frozen)) {
            (RoomState::RoundActive, _) | (RoomState::Paused, Some(Frozen::Round { .. })) => {
                Some(self.round_index)
            }
            _ => None,
        }
    }

    /// Whether a player this pause is waiting for is still missing.
    fn pause_awaits_anyone(&self) -> bool {
        self.pause.as_ref().is_some_and(|pause| {
            pause
                .awaited
                .iter()
                .any(|id| self.player(*id).is_some_and(Player::is_awaited))
        })
    }

    /// Every connected participant has guessed. Never true for an empty field.
    fn all_submitted(&self) -> bool {
        let mut active = self.players.iter().filter(|p| p.is_active()).peekable();
        active.peek().is_some() && active.all(|p| p.has_submitted(self.round_index))
    }
}

#[allow(clippy::cast_possible_truncation)]
fn ceil_seconds(duration: Duration) -> u32 {
    duration
        .as_millis()
        .div_ceil(1000)
        .min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoquizz_test_support::{FixedClock, photo_at};

    const A: ConnectionId = ConnectionId(1);
    const B: ConnectionId = ConnectionId(2);
    const C: ConnectionId = ConnectionId(3);

    fn room_with_rounds(num_rounds: usize) -> Room {
        let deck = (0..num_rounds).map(|i| photo_at(i, 10.0, 10.0)).collect();
        Room::new(
            RoomCode::parse("ABCDEF").unwrap(),
            "Friday".into(),
            num_rounds,
            deck,
            RoomTimings::default(),
            FixedClock::default_instant().0,
        )
    }

    fn broadcasts(effects: &[Effect]) -> Vec<&ServerMessage> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Broadcast(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    /// Two ready players, A hosting, round 0 running.
    fn running_round(num_rounds: usize) -> (Room, PlayerId, PlayerId, Instant) {
        let clock = FixedClock::default_instant();
        let now = Instant::now();
        let mut room = room_with_rounds(num_rounds);
        let a = room.join(A, "Ada".into(), None, now).unwrap();
        let b = room.join(B, "Bo".into(), None, now).unwrap();
        room.act(a, PlayerAction::Ready(true), now, &clock).unwrap();
        room.act(b, PlayerAction::Ready(true), now, &clock).unwrap();
        room.act(a, PlayerAction::Start, now, &clock).unwrap();
        for _ in 0..3 {
            room.on_timer(RoomTimer::CountdownTick, now, &clock);
        }
        room.take_effects();
        (room, a, b, now)
    }

    /// Three ready players in the lobby, A hosting.
    fn three_player_lobby(num_rounds: usize) -> (Room, PlayerId, PlayerId, PlayerId, Instant) {
        let clock = FixedClock::default_instant();
        let now = Instant::now();
        let mut room = room_with_rounds(num_rounds);
        let a = room.join(A, "Ada".into(), None, now).unwrap();
        let b = room.join(B, "Bo".into(), None, now).unwrap();
        let c = room.join(C, "Cy".into(), None, now).unwrap();
        for id in [a, b, c] {
            room.act(id, PlayerAction::Ready(true), now, &clock).unwrap();
        }
        room.take_effects();
        (room, a, b, c, now)
    }

    #[test]
    fn test_new_room_schedules_idle_timeout() {
        let room = room_with_rounds(1);
        assert_eq!(
            room.effects(),
            &[Effect::after(RoomTimer::Idle, Duration::from_secs(600))]
        );
        assert_eq!(room.state(), RoomState::Lobby);
    }

    #[test]
    fn test_first_joiner_hosts_and_gets_joined_room() {
        // Arrange
        let mut room = room_with_rounds(1);
        room.take_effects();

        // Act
        let id = room.join(A, "Ada".into(), None, Instant::now()).unwrap();

        // Assert
        let effects = room.take_effects();
        assert_eq!(room.host(), Some(id));
        assert_eq!(
            effects[0],
            Effect::Bind {
                connection: A,
                player: id
            }
        );
        match &effects[1] {
            Effect::Send {
                connection,
                message: ServerMessage::JoinedRoom(joined),
            } => {
                assert_eq!(*connection, A);
                assert!(joined.is_host);
                assert!(!joined.reconnected);
                assert_eq!(joined.color, PLAYER_COLORS[0]);
            }
            other => panic!("Expected JoinedRoom, got {other:?}"),
        }
        assert!(matches!(
            effects[2],
            Effect::Broadcast(ServerMessage::RoomUpdated(_))
        ));
    }

    #[test]
    fn test_colors_are_unique_by_join_order() {
        let mut room = room_with_rounds(1);
        let now = Instant::now();
        room.join(A, "Ada".into(), None, now).unwrap();
        room.join(B, "Bo".into(), None, now).unwrap();

        let colors: Vec<_> = room.players().iter().map(|p| p.color).collect();
        assert_eq!(colors, vec![PLAYER_COLORS[0], PLAYER_COLORS[1]]);
    }

    #[test]
    fn test_join_beyond_palette_is_room_full() {
        // Arrange
        let mut room = room_with_rounds(1);
        let now = Instant::now();
        for i in 0..MAX_PLAYERS {
            room.join(ConnectionId(i as u64), format!("P{i}"), None, now)
                .unwrap();
        }

        // Act
        let result = room.join(ConnectionId(99), "Late".into(), None, now);

        // Assert
        assert_eq!(result, Err(GameError::RoomFull { limit: MAX_PLAYERS }));
        assert_eq!(room.players().len(), MAX_PLAYERS);
    }

    #[test]
    fn test_ready_outside_lobby_is_rejected_without_change() {
        // Arrange
        let (mut room, a, _, now) = running_round(1);
        let clock = FixedClock::default_instant();

        // Act
        let result = room.act(a, PlayerAction::Ready(true), now, &clock);

        // Assert
        assert!(matches!(result, Err(GameError::InvalidTransition(_))));
        assert!(room.take_effects().is_empty());
        assert_eq!(room.state(), RoomState::RoundActive);
    }

    #[test]
    fn test_start_requires_host_and_two_ready_players() {
        // Arrange
        let clock = FixedClock::default_instant();
        let now = Instant::now();
        let mut room = room_with_rounds(1);
        let a = room.join(A, "Ada".into(), None, now).unwrap();
        let b = room.join(B, "Bo".into(), None, now).unwrap();
        room.act(a, PlayerAction::Ready(true), now, &clock).unwrap();

        // Act
        let by_guest = room.act(b, PlayerAction::Start, now, &clock);
        let without_quorum = room.act(a, PlayerAction::Start, now, &clock);

        // Assert
        assert!(matches!(by_guest, Err(GameError::InvalidTransition(_))));
        assert!(matches!(without_quorum, Err(GameError::InvalidTransition(_))));
        assert_eq!(room.state(), RoomState::Lobby);
    }

    #[test]
    fn test_start_broadcasts_first_countdown_tick() {
        // Arrange
        let clock = FixedClock::default_instant();
        let now = Instant::now();
        let mut room = room_with_rounds(1);
        let a = room.join(A, "Ada".into(), None, now).unwrap();
        let b = room.join(B, "Bo".into(), None, now).unwrap();
        room.act(a, PlayerAction::Ready(true), now, &clock).unwrap();
        room.act(b, PlayerAction::Ready(true), now, &clock).unwrap();
        room.take_effects();

        // Act
        room.act(a, PlayerAction::Start, now, &clock).unwrap();

        // Assert
        let effects = room.take_effects();
        assert_eq!(room.state(), RoomState::Countdown);
        assert_eq!(
            broadcasts(&effects),
            vec![&ServerMessage::CountdownTick {
                seconds_remaining: 3
            }]
        );
        assert!(effects.contains(&Effect::after(RoomTimer::CountdownTick, TICK)));
    }

    #[test]
    fn test_countdown_reaching_zero_starts_round() {
        // Arrange
        let (room, _, _, now) = running_round(2);

        // Assert
        assert_eq!(room.state(), RoomState::RoundActive);
        assert_eq!(room.round_deadline(), Some(now + Duration::from_secs(60)));
        assert!(room.players().iter().all(|p| p.guess_for(0).is_some()));
    }

    #[test]
    fn test_exact_guess_scores_max_and_duplicate_is_rejected() {
        // Arrange
        let (mut room, a, _, now) = running_round(1);
        let clock = FixedClock::default_instant();
        let submit = PlayerAction::Submit {
            latitude: 10.0,
            longitude: 10.0,
        };

        // Act
        room.act(a, submit, now, &clock).unwrap();
        let second = room.act(a, submit, now, &clock);

        // Assert
        assert_eq!(room.player(a).unwrap().total_score(), 5000);
        assert_eq!(second, Err(GameError::DuplicateGuess { round_index: 0 }));
        assert_eq!(room.state(), RoomState::RoundActive);
    }

    #[test]
    fn test_invalid_coordinate_is_rejected() {
        let (mut room, a, _, now) = running_round(1);
        let clock = FixedClock::default_instant();
        let result = room.act(
            a,
            PlayerAction::Submit {
                latitude: 95.0,
                longitude: 0.0,
            },
            now,
            &clock,
        );
        assert!(matches!(result, Err(GameError::InvalidInput(_))));
        assert!(!room.player(a).unwrap().has_submitted(0));
    }

    #[test]
    fn test_last_submission_resolves_and_cancels_round_timers() {
        // Arrange
        let (mut room, a, b, now) = running_round(2);
        let clock = FixedClock::default_instant();
        let submit = PlayerAction::Submit {
            latitude: 10.0,
            longitude: 10.0,
        };
        room.act(a, submit, now, &clock).unwrap();

        // Act
        room.act(b, submit, now, &clock).unwrap();

        // Assert
        let effects = room.take_effects();
        assert_eq!(room.state(), RoomState::RoundResults);
        assert!(effects.contains(&Effect::Cancel(RoomTimer::RoundExpired)));
        assert!(effects.contains(&Effect::Cancel(RoomTimer::RoundTick)));
        assert_eq!(room.round_deadline(), None);
    }

    #[test]
    fn test_expiry_scores_non_submitters_zero_with_null_distance() {
        // Arrange
        let (mut room, a, b, now) = running_round(1);
        let clock = FixedClock::default_instant();
        room.act(
            a,
            PlayerAction::Submit {
                latitude: 10.0,
                longitude: 10.0,
            },
            now,
            &clock,
        )
        .unwrap();
        room.take_effects();

        // Act
        room.on_timer(RoomTimer::RoundExpired, now, &clock);

        // Assert
        let effects = room.take_effects();
        let Some(ServerMessage::RoundResults(results)) = broadcasts(&effects).into_iter().next()
        else {
            panic!("Expected round_results");
        };
        let line_b = results.results.iter().find(|r| r.player_id == b).unwrap();
        assert_eq!(line_b.score, 0);
        assert_eq!(line_b.distance_km, None);
        let line_a = results.results.iter().find(|r| r.player_id == a).unwrap();
        assert_eq!(line_a.score, 5000);
        assert_eq!(line_a.distance_km, Some(0.0));
    }

    #[test]
    fn test_stale_round_expiry_after_early_resolution_is_ignored() {
        // Arrange
        let (mut room, a, b, now) = running_round(2);
        let clock = FixedClock::default_instant();
        let submit = PlayerAction::Submit {
            latitude: 10.0,
            longitude: 10.0,
        };
        room.act(a, submit, now, &clock).unwrap();
        room.act(b, submit, now, &clock).unwrap();
        room.take_effects();

        // Act
        room.on_timer(RoomTimer::RoundExpired, now, &clock);

        // Assert
        assert!(room.take_effects().is_empty());
    }

    #[test]
    fn test_final_next_round_finishes_with_ranking_and_record() {
        // Arrange
        let (mut room, a, b, now) = running_round(1);
        let clock = FixedClock::default_instant();
        room.act(
            a,
            PlayerAction::Submit {
                latitude: 10.0,
                longitude: 10.0,
            },
            now,
            &clock,
        )
        .unwrap();
        room.on_timer(RoomTimer::RoundExpired, now, &clock);
        room.take_effects();

        // Act
        room.act(a, PlayerAction::NextRound, now, &clock).unwrap();

        // Assert
        let effects = room.take_effects();
        assert_eq!(room.state(), RoomState::Finished);
        assert_eq!(room.round_index(), 0);
        let ranking = room.ranking();
        assert_eq!(ranking[0].player_id, a);
        assert_eq!(ranking[1].player_id, b);
        let record = effects.iter().find_map(|e| match e {
            Effect::Record(r) => Some(r),
            _ => None,
        });
        let record = record.unwrap();
        assert_eq!(record.players[0].average_score, 5000.0);
        assert_eq!(record.players[1].rank, 2);
    }

    #[test]
    fn test_ranking_ties_keep_join_order() {
        let (room, a, b, _) = running_round(1);
        let ranking = room.ranking();
        assert_eq!(ranking[0].player_id, a);
        assert_eq!(ranking[1].player_id, b);
        assert_eq!(ranking[1].rank, 2);
    }

    #[test]
    fn test_guest_cannot_advance() {
        let (mut room, a, b, now) = running_round(2);
        let clock = FixedClock::default_instant();
        room.on_timer(RoomTimer::RoundExpired, now, &clock);
        let result = room.act(b, PlayerAction::NextRound, now, &clock);
        assert!(matches!(result, Err(GameError::InvalidTransition(_))));
        room.act(a, PlayerAction::NextRound, now, &clock).unwrap();
        assert_eq!(room.state(), RoomState::Countdown);
        assert_eq!(room.round_index(), 1);
    }

    #[test]
    fn test_disconnect_mid_round_pauses_and_freezes_remaining_time() {
        // Arrange
        let (mut room, _, b, start) = running_round(1);
        let later = start + Duration::from_secs(20);

        // Act
        room.disconnect(b, B, later);

        // Assert
        let effects = room.take_effects();
        assert_eq!(room.state(), RoomState::Paused);
        assert_eq!(room.round_deadline(), None);
        assert_eq!(room.pause_deadline(), Some(later + Duration::from_secs(30)));
        assert!(effects.contains(&Effect::Cancel(RoomTimer::RoundExpired)));
        assert!(broadcasts(&effects).contains(&&ServerMessage::GamePaused {
            player_name: "Bo".into(),
            pause_seconds: 30,
        }));
    }

    #[test]
    fn test_reconnect_in_grace_window_resumes_with_frozen_time() {
        // Arrange
        let (mut room, _, b, start) = running_round(1);
        let token = room.player(b).unwrap().session_token.clone();
        let dropped = start + Duration::from_secs(20);
        room.disconnect(b, B, dropped);
        room.take_effects();
        let back = dropped + Duration::from_secs(5);

        // Act
        let id = room
            .join(ConnectionId(7), "Bo".into(), Some(&token), back)
            .unwrap();

        // Assert
        assert_eq!(id, b);
        assert_eq!(room.player(b).unwrap().color, PLAYER_COLORS[1]);
        assert_eq!(room.state(), RoomState::RoundActive);
        assert_eq!(room.round_deadline(), Some(back + Duration::from_secs(40)));
        let effects = room.take_effects();
        assert!(broadcasts(&effects).contains(&&ServerMessage::GameResumed));
        assert!(effects.contains(&Effect::after(
            RoomTimer::RoundExpired,
            Duration::from_secs(40)
        )));
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::Send {
                connection: ConnectionId(7),
                message: ServerMessage::RoundStarted(_)
            }
        )));
    }

    #[test]
    fn test_reconnect_after_grace_window_gets_new_identity() {
        // Arrange
        let now = Instant::now();
        let mut room = room_with_rounds(1);
        room.join(A, "Ada".into(), None, now).unwrap();
        let b = room.join(B, "Bo".into(), None, now).unwrap();
        let token = room.player(b).unwrap().session_token.clone();
        room.disconnect(b, B, now);

        // Act
        let late = now + Duration::from_secs(121);
        let id = room
            .join(ConnectionId(7), "Bo".into(), Some(&token), late)
            .unwrap();

        // Assert
        assert_ne!(id, b);
        assert_eq!(room.players().len(), 3);
    }

    #[test]
    fn test_pause_expiry_marks_missing_players_absent_and_resumes() {
        // Arrange
        let (mut room, a, b, start) = running_round(1);
        let clock = FixedClock::default_instant();
        room.act(
            a,
            PlayerAction::Submit {
                latitude: 10.0,
                longitude: 10.0,
            },
            start,
            &clock,
        )
        .unwrap();
        room.disconnect(b, B, start);

        // Act
        room.on_timer(RoomTimer::PauseExpired, start + Duration::from_secs(30), &clock);

        // Assert
        assert!(room.player(b).unwrap().absent);
        assert_eq!(room.state(), RoomState::RoundResults);
    }

    #[test]
    fn test_pause_expiry_only_marks_players_dropped_during_pause() {
        // Arrange
        let (mut room, a, b, c, now) = three_player_lobby(1);
        let clock = FixedClock::default_instant();
        room.act(a, PlayerAction::Start, now, &clock).unwrap();
        room.disconnect(b, B, now);
        room.disconnect(c, C, now + Duration::from_secs(10));

        // Act
        room.on_timer(RoomTimer::PauseExpired, now + Duration::from_secs(30), &clock);

        // Assert
        assert!(room.player(b).unwrap().absent);
        assert!(room.player(c).unwrap().absent);
        assert_eq!(room.state(), RoomState::Countdown);
    }

    #[test]
    fn test_lobby_dropout_does_not_block_resume() {
        // Arrange
        let (mut room, a, b, c, now) = three_player_lobby(1);
        let clock = FixedClock::default_instant();
        room.disconnect(c, C, now);
        room.act(a, PlayerAction::Start, now, &clock).unwrap();
        for _ in 0..3 {
            room.on_timer(RoomTimer::CountdownTick, now, &clock);
        }
        let token = room.player(b).unwrap().session_token.clone();
        room.disconnect(b, B, now + Duration::from_secs(5));
        room.take_effects();

        // Act
        let back = now + Duration::from_secs(7);
        room.join(ConnectionId(7), "Bo".into(), Some(&token), back)
            .unwrap();

        // Assert
        assert_eq!(room.state(), RoomState::RoundActive);
        assert_eq!(room.round_deadline(), Some(back + Duration::from_secs(55)));
        assert!(!room.player(c).unwrap().absent);
        assert!(broadcasts(&room.take_effects()).contains(&&ServerMessage::GameResumed));
    }

    #[test]
    fn test_results_dropout_does_not_block_resume() {
        // Arrange
        let (mut room, a, b, c, now) = three_player_lobby(2);
        let clock = FixedClock::default_instant();
        room.act(a, PlayerAction::Start, now, &clock).unwrap();
        for _ in 0..3 {
            room.on_timer(RoomTimer::CountdownTick, now, &clock);
        }
        for id in [a, b, c] {
            room.act(
                id,
                PlayerAction::Submit {
                    latitude: 10.0,
                    longitude: 10.0,
                },
                now,
                &clock,
            )
            .unwrap();
        }
        assert_eq!(room.state(), RoomState::RoundResults);
        room.disconnect(c, C, now);
        room.act(a, PlayerAction::NextRound, now, &clock).unwrap();
        for _ in 0..3 {
            room.on_timer(RoomTimer::CountdownTick, now, &clock);
        }
        assert_eq!(room.state(), RoomState::RoundActive);
        let token = room.player(b).unwrap().session_token.clone();
        room.disconnect(b, B, now);
        room.take_effects();

        // Act
        let back = now + Duration::from_secs(1);
        room.join(ConnectionId(7), "Bo".into(), Some(&token), back)
            .unwrap();

        // Assert
        assert_eq!(room.state(), RoomState::RoundActive);
        assert_eq!(room.round_index(), 1);
        assert!(broadcasts(&room.take_effects()).contains(&&ServerMessage::GameResumed));
    }

    #[test]
    fn test_countdown_pause_keeps_partial_tick() {
        // Arrange
        let (mut room, a, b, _, now) = three_player_lobby(1);
        let clock = FixedClock::default_instant();
        room.act(a, PlayerAction::Start, now, &clock).unwrap();
        let token = room.player(b).unwrap().session_token.clone();
        room.disconnect(b, B, now + Duration::from_millis(400));
        room.take_effects();

        // Act
        let back = now + Duration::from_secs(2);
        room.join(ConnectionId(7), "Bo".into(), Some(&token), back)
            .unwrap();

        // Assert
        let effects = room.take_effects();
        assert_eq!(room.state(), RoomState::Countdown);
        assert!(broadcasts(&effects).contains(&&ServerMessage::CountdownTick {
            seconds_remaining: 3
        }));
        assert!(effects.contains(&Effect::after(
            RoomTimer::CountdownTick,
            Duration::from_millis(600)
        )));

        // Act
        room.on_timer(
            RoomTimer::CountdownTick,
            back + Duration::from_millis(600),
            &clock,
        );

        // Assert
        let effects = room.take_effects();
        assert!(broadcasts(&effects).contains(&&ServerMessage::CountdownTick {
            seconds_remaining: 2
        }));
        assert!(effects.contains(&Effect::after(RoomTimer::CountdownTick, TICK)));
    }

    #[test]
    fn test_auto_advance_is_scheduled_on_results_and_cancelled_by_next_round() {
        // Arrange
        let now = Instant::now();
        let clock = FixedClock::default_instant();
        let deck = (0..2).map(|i| photo_at(i, 10.0, 10.0)).collect();
        let timings = RoomTimings {
            auto_advance: Some(Duration::from_secs(5)),
            ..RoomTimings::default()
        };
        let mut room = Room::new(
            RoomCode::parse("ABCDEF").unwrap(),
            "Friday".into(),
            2,
            deck,
            timings,
            clock.0,
        );
        let a = room.join(A, "Ada".into(), None, now).unwrap();
        let b = room.join(B, "Bo".into(), None, now).unwrap();
        room.act(a, PlayerAction::Ready(true), now, &clock).unwrap();
        room.act(b, PlayerAction::Ready(true), now, &clock).unwrap();
        room.act(a, PlayerAction::Start, now, &clock).unwrap();
        for _ in 0..3 {
            room.on_timer(RoomTimer::CountdownTick, now, &clock);
        }
        room.take_effects();

        // Act
        room.on_timer(RoomTimer::RoundExpired, now, &clock);

        // Assert
        let effects = room.take_effects();
        assert_eq!(room.state(), RoomState::RoundResults);
        assert!(effects.contains(&Effect::after(
            RoomTimer::AutoAdvance,
            Duration::from_secs(5)
        )));

        // Act
        room.act(a, PlayerAction::NextRound, now, &clock).unwrap();

        // Assert
        let effects = room.take_effects();
        assert!(effects.contains(&Effect::Cancel(RoomTimer::AutoAdvance)));
        assert_eq!(room.state(), RoomState::Countdown);
        assert_eq!(room.round_index(), 1);
    }

    #[test]
    fn test_disconnect_from_replaced_connection_is_ignored() {
        // Arrange
        let (mut room, _, b, now) = running_round(1);
        let token = room.player(b).unwrap().session_token.clone();
        room.join(ConnectionId(7), "Bo".into(), Some(&token), now)
            .unwrap();
        room.take_effects();

        // Act
        room.disconnect(b, B, now);

        // Assert
        assert!(room.take_effects().is_empty());
        assert!(room.player(b).unwrap().connected);
    }

    #[test]
    fn test_host_leaving_lobby_promotes_next_player() {
        // Arrange
        let clock = FixedClock::default_instant();
        let now = Instant::now();
        let mut room = room_with_rounds(1);
        let a = room.join(A, "Ada".into(), None, now).unwrap();
        let b = room.join(B, "Bo".into(), None, now).unwrap();

        // Act
        room.act(a, PlayerAction::Leave, now, &clock).unwrap();

        // Assert
        assert_eq!(room.host(), Some(b));
        assert_eq!(room.players().len(), 1);
        assert!(room.effects().contains(&Effect::Unbind { connection: A }));
    }

    #[test]
    fn test_last_player_leaving_closes_room() {
        let clock = FixedClock::default_instant();
        let now = Instant::now();
        let mut room = room_with_rounds(1);
        let a = room.join(A, "Ada".into(), None, now).unwrap();
        room.take_effects();

        room.act(a, PlayerAction::Leave, now, &clock).unwrap();

        assert_eq!(room.take_effects().last(), Some(&Effect::Close));
    }

    #[test]
    fn test_kick_mid_round_flags_left_and_resolves_if_rest_submitted() {
        // Arrange
        let (mut room, a, b, now) = running_round(1);
        let clock = FixedClock::default_instant();
        room.act(
            a,
            PlayerAction::Submit {
                latitude: 10.0,
                longitude: 10.0,
            },
            now,
            &clock,
        )
        .unwrap();
        room.take_effects();

        // Act
        room.act(a, PlayerAction::Kick(b), now, &clock).unwrap();

        // Assert
        let effects = room.take_effects();
        assert!(room.player(b).unwrap().left);
        assert_eq!(
            broadcasts(&effects)[0],
            &ServerMessage::PlayerKicked { player_id: b }
        );
        assert_eq!(room.state(), RoomState::RoundResults);
    }

    #[test]
    fn test_host_cannot_kick_self() {
        let (mut room, a, _, now) = running_round(1);
        let clock = FixedClock::default_instant();
        let result = room.act(a, PlayerAction::Kick(a), now, &clock);
        assert!(matches!(result, Err(GameError::InvalidTransition(_))));
    }

    #[test]
    fn test_missing_photo_faults_room_to_finished() {
        // Arrange
        let clock = FixedClock::default_instant();
        let now = Instant::now();
        let mut room = Room::new(
            RoomCode::parse("ABCDEF").unwrap(),
            "Empty".into(),
            1,
            Vec::new(),
            RoomTimings::default(),
            clock.0,
        );
        let a = room.join(A, "Ada".into(), None, now).unwrap();
        let b = room.join(B, "Bo".into(), None, now).unwrap();
        room.act(a, PlayerAction::Ready(true), now, &clock).unwrap();
        room.act(b, PlayerAction::Ready(true), now, &clock).unwrap();
        room.take_effects();

        // Act
        room.act(a, PlayerAction::Start, now, &clock).unwrap();

        // Assert
        let effects = room.take_effects();
        assert_eq!(room.state(), RoomState::Finished);
        assert!(broadcasts(&effects).iter().any(|m| matches!(
            m,
            ServerMessage::Error { code, .. } if code == ROOM_FAULT_CODE
        )));
    }

    #[test]
    fn test_idle_timeout_closes_room() {
        let mut room = room_with_rounds(1);
        room.take_effects();
        room.on_timer(
            RoomTimer::Idle,
            Instant::now(),
            &FixedClock::default_instant(),
        );
        let effects = room.take_effects();
        assert_eq!(effects.last(), Some(&Effect::Close));
        assert!(matches!(
            effects[0],
            Effect::Broadcast(ServerMessage::RoomClosed { .. })
        ));
    }

    #[test]
    fn test_ceil_seconds_rounds_partial_seconds_up() {
        assert_eq!(ceil_seconds(Duration::from_millis(40_001)), 41);
        assert_eq!(ceil_seconds(Duration::from_secs(40)), 40);
        assert_eq!(ceil_seconds(Duration::ZERO), 0);
    }
}

//! One match, end to end. A [`Match`] owns the engine, score board, controls,
//! power-ups and (when networked) the channel; nothing lives in globals.

use std::sync::Arc;

use crate::bot::bot_intent;
use crate::config::{MatchConfig, Side};
use crate::controls::{ControlMapper, ControlScope};
use crate::engine::{self, EngineError, EngineState, PongEngine, Role, publish_power_ups};
use crate::geometry::Vec2;
use crate::net::channel::{ChannelError, SyncChannel, SyncInbox};
use crate::net::messages::WireMessage;
use crate::powerup::{PowerUpEffect, PowerUpField, PowerUpKind, PowerUpView};
use crate::presentation::Presentation;
use crate::score::ScoreBoard;
use crate::tuning::PongTuning;

/// Things that happened during a frame, for the surrounding UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEvent {
    RoundScored { winner: Side, loser: Side },
    PowerUpCollected { kind: PowerUpKind, side: Side },
    GameOver { winner: Side },
    /// The channel dropped. The match is over without a winner.
    ConnectionLost,
}

pub struct Match {
    config: MatchConfig,
    role: Role,
    side: Option<Side>,
    tuning: PongTuning,
    engine: Box<dyn PongEngine>,
    controls: ControlMapper,
    scores: ScoreBoard,
    power_ups: Option<PowerUpField>,
    channel: Option<Box<dyn SyncChannel>>,
    inbox: Arc<SyncInbox>,
    seq: u64,
    last_sent_velocity: Option<Vec2>,
    winner: Option<Side>,
    connection_lost: bool,
    destroyed: bool,
}

impl Match {
    /// Same-screen match. Every active side's keys are live.
    pub fn local(config: MatchConfig, tuning: PongTuning) -> Result<Self, EngineError> {
        Self::build(config, Role::Local, None, tuning, None)
    }

    /// Networked match on `side`. The host simulates; followers mirror.
    pub fn networked(
        config: MatchConfig,
        role: Role,
        side: Side,
        tuning: PongTuning,
        channel: Box<dyn SyncChannel>,
    ) -> Result<Self, EngineError> {
        Self::build(config, role, Some(side), tuning, Some(channel))
    }

    fn build(
        config: MatchConfig,
        role: Role,
        side: Option<Side>,
        tuning: PongTuning,
        mut channel: Option<Box<dyn SyncChannel>>,
    ) -> Result<Self, EngineError> {
        if config.mode() != role.mode() {
            return Err(EngineError::ModeMismatch {
                mode: config.mode(),
                role,
            });
        }
        let inbox = SyncInbox::new();
        if let Some(ch) = channel.as_mut() {
            ch.set_on_message(inbox.handler());
        }

        let mut engine = engine::for_role(role, &tuning, Arc::clone(&inbox));
        engine.initialize(&config)?;

        let scope = match side {
            Some(own) if role != Role::Local => ControlScope::Only(own),
            _ => ControlScope::AllSides,
        };
        let controls = ControlMapper::new(scope, config.active_sides(), tuning.paddle_speed);

        let power_ups = (role.is_authoritative() && config.power_ups_enabled())
            .then(|| PowerUpField::new(config.active_power_ups().iter().copied(), &tuning));

        tracing::info!(
            ?role,
            side = side.map(Side::as_str),
            players = config.player_count(),
            map = config.map_style().as_str(),
            power_ups = config.power_ups_enabled(),
            "Match created"
        );

        Ok(Self {
            scores: ScoreBoard::new(config.active_sides().iter().copied()),
            config,
            role,
            side,
            tuning,
            engine,
            controls,
            power_ups,
            channel,
            inbox,
            seq: 0,
            last_sent_velocity: None,
            winner: None,
            connection_lost: false,
            destroyed: false,
        })
    }

    /// Replace the power-up field with a deterministic one.
    pub fn seed_power_ups(&mut self, seed: u64) {
        if self.power_ups.is_some() {
            self.power_ups = Some(PowerUpField::with_seed(
                self.config.active_power_ups().iter().copied(),
                &self.tuning,
                seed,
            ));
        }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn side(&self) -> Option<Side> {
        self.side
    }

    pub fn scores(&self) -> &ScoreBoard {
        &self.scores
    }

    pub fn engine(&self) -> &dyn PongEngine {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> &mut dyn PongEngine {
        self.engine.as_mut()
    }

    pub fn state(&self) -> EngineState {
        self.engine.state()
    }

    pub fn winner(&self) -> Option<Side> {
        self.winner
    }

    pub fn is_over(&self) -> bool {
        self.winner.is_some() || self.connection_lost || self.destroyed
    }

    /// Snapshots broadcast so far (host only).
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn power_up_views(&self) -> Vec<PowerUpView> {
        match (&self.power_ups, self.engine.as_follower()) {
            (Some(field), _) => field.views(),
            (None, Some(follower)) => follower.power_ups().to_vec(),
            (None, None) => Vec::new(),
        }
    }

    pub fn key_down(&mut self, key: &str) {
        self.controls.key_down(key);
    }

    pub fn key_up(&mut self, key: &str) {
        self.controls.key_up(key);
    }

    /// Ask the host to book a point for `side`.
    pub fn claim_point(&mut self, side: Side) -> Result<(), ChannelError> {
        match self.channel.as_mut() {
            Some(ch) => ch.send(&WireMessage::UpdateScore { side }),
            None => Err(ChannelError::Closed),
        }
    }

    /// Run one animation frame.
    pub fn frame(&mut self, scene: &mut dyn Presentation) -> Result<Vec<MatchEvent>, EngineError> {
        let mut events = Vec::new();
        if self.is_over() {
            return Ok(events);
        }
        if self.check_connection() {
            events.push(MatchEvent::ConnectionLost);
            return Ok(events);
        }

        if self.role.is_authoritative() {
            self.authoritative_frame(scene, &mut events)?;
        } else {
            self.follower_frame(scene, &mut events)?;
        }

        if self.connection_lost {
            events.push(MatchEvent::ConnectionLost);
        }
        Ok(events)
    }

    /// True if the channel just went away.
    fn check_connection(&mut self) -> bool {
        let Some(ch) = self.channel.as_ref() else {
            return false;
        };
        let reason = self.inbox.closed_reason();
        if ch.is_connected() && reason.is_none() {
            return false;
        }
        // A finished match may see the socket close right after game_over.
        if self.inbox.game_over().is_some() {
            return false;
        }
        tracing::warn!(
            reason = reason.as_deref().unwrap_or("disconnected"),
            "Match connection lost"
        );
        self.connection_lost = true;
        self.engine.finish();
        true
    }

    fn send(&mut self, msg: &WireMessage) {
        let Some(ch) = self.channel.as_mut() else {
            return;
        };
        match ch.send(msg) {
            Ok(()) => {},
            Err(ChannelError::Closed) => {
                if !self.connection_lost {
                    tracing::warn!(kind = msg.type_name(), "Send on closed channel");
                    self.connection_lost = true;
                    self.engine.finish();
                }
            },
            Err(e) => tracing::warn!(kind = msg.type_name(), error = %e, "Dropping message"),
        }
    }

    fn follower_frame(
        &mut self,
        scene: &mut dyn Presentation,
        events: &mut Vec<MatchEvent>,
    ) -> Result<(), EngineError> {
        let intent = self.controls.intent();
        if let Some(own) = self.side {
            let delta = intent.get(own);
            if delta != 0.0 {
                self.send(&WireMessage::PaddleMove {
                    delta,
                    rotation: 0.0,
                    side: Some(own),
                });
            }
        }

        self.engine.tick(&intent, scene)?;

        if let Some(follower) = self.engine.as_follower() {
            self.scores.merge_from(follower.mirrored_scores());
        }
        if let Some((winner, loser)) = self.inbox.take_reset() {
            events.push(MatchEvent::RoundScored { winner, loser });
        }
        if let Some(winner) = self.inbox.game_over() {
            self.finish(winner, events);
        }
        Ok(())
    }

    fn authoritative_frame(
        &mut self,
        scene: &mut dyn Presentation,
        events: &mut Vec<MatchEvent>,
    ) -> Result<(), EngineError> {
        let mut intent = self.controls.intent();
        if !self.config.bot_sides().is_empty() {
            let bots = bot_intent(self.engine.as_ref(), self.config.bot_sides(), &self.tuning);
            intent = intent.merged(&bots);
        }
        if self.role == Role::Host {
            for (side, delta) in self.inbox.drain_paddle_moves() {
                if Some(side) == self.side {
                    tracing::warn!(%side, "Ignoring remote move for the host's own paddle");
                    continue;
                }
                if let Some(auth) = self.engine.as_authoritative_mut()
                    && !auth.apply_paddle_move(side, delta)
                {
                    tracing::debug!(%side, delta, "Remote paddle move rejected");
                }
            }
            for side in self.inbox.drain_score_claims() {
                if self.config.is_active(side) {
                    tracing::info!(%side, "Score claim accepted");
                    self.scores.increment(side);
                }
            }
        }

        let outcome = self.engine.tick(&intent, scene)?;
        if let Some((winner, loser)) = outcome.point() {
            self.book_point(winner, loser, events);
        }

        for (kind, side) in self.step_power_ups(scene) {
            events.push(MatchEvent::PowerUpCollected { kind, side });
            if kind == PowerUpKind::InstantPoint
                && let Some(auth) = self.engine.as_authoritative_mut()
            {
                let (winner, loser) = auth.award_round(side);
                self.book_point(winner, loser, events);
            }
        }

        if self.role == Role::Host {
            self.broadcast_state();
        }

        if let Some(winner) = self.scores.has_winner(self.tuning.win_score) {
            if self.role == Role::Host {
                self.send(&WireMessage::GameOver {
                    winner,
                    tournament_id: None,
                });
            }
            self.finish(winner, events);
        }
        Ok(())
    }

    /// Move and collect power-ups, applying every effect except instant points.
    fn step_power_ups(&mut self, scene: &mut dyn Presentation) -> Vec<(PowerUpKind, Side)> {
        let (Some(field), Some(auth)) =
            (self.power_ups.as_mut(), self.engine.as_authoritative_mut())
        else {
            return Vec::new();
        };
        let area = self.config.play_area();
        let collected = field.step(
            &area,
            &auth.ball_box(),
            auth.last_contact(),
            &auth.paddle_boxes(),
        );
        let mut picked = Vec::with_capacity(collected.len());
        for c in collected {
            tracing::debug!(kind = ?c.kind, side = %c.side, "Power-up collected");
            match c.kind.effect() {
                PowerUpEffect::ScaleBallSpeed(f) => auth.scale_ball_speed(f),
                PowerUpEffect::ScaleOwnPaddle(f) => auth.resize_paddle(c.side, f),
                PowerUpEffect::ScaleOpponentPaddles(f) => {
                    for &other in self.config.active_sides() {
                        if other != c.side {
                            auth.resize_paddle(other, f);
                        }
                    }
                },
                PowerUpEffect::InstantPoint => {},
            }
            picked.push((c.kind, c.side));
        }
        publish_power_ups(scene, &field.views());
        picked
    }

    fn book_point(&mut self, winner: Side, loser: Side, events: &mut Vec<MatchEvent>) {
        let score = self.scores.increment(winner);
        tracing::info!(%winner, %loser, score, "Round scored");
        events.push(MatchEvent::RoundScored { winner, loser });
        if self.role == Role::Host {
            self.send(&WireMessage::reset_round(winner, loser));
        }
        self.engine.begin_round();
    }

    fn broadcast_state(&mut self) {
        let Some(auth) = self.engine.as_authoritative_mut() else {
            return;
        };
        let velocity = auth.ball().velocity;
        self.seq += 1;
        let power_ups = self
            .power_ups
            .as_ref()
            .map(PowerUpField::views)
            .unwrap_or_default();
        let snapshot = auth.snapshot(self.seq, self.scores.as_map(), power_ups);
        if self.last_sent_velocity != Some(velocity) {
            self.send(&WireMessage::SetBallVelocity {
                x: velocity.x,
                y: velocity.y,
            });
            self.last_sent_velocity = Some(velocity);
        }
        self.send(&WireMessage::GameStateUpdate { snapshot });
    }

    fn finish(&mut self, winner: Side, events: &mut Vec<MatchEvent>) {
        self.engine.finish();
        self.winner = Some(winner);
        tracing::info!(%winner, "Match finished");
        events.push(MatchEvent::GameOver { winner });
    }

    /// Release the channel. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.engine.finish();
        if let Some(mut ch) = self.channel.take() {
            ch.disconnect();
        }
        self.controls.release_all();
        tracing::debug!("Match destroyed");
    }
}

impl Drop for Match {
    fn drop(&mut self) {
        self.destroy();
    }
}

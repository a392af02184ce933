//! The conversation engine.
//!
//! A [`ChatRoom`] owns the roster, the history, the turn counter and the
//! cancellation token. It is opened once, then stepped by the caller: the
//! room itself never schedules work or sleeps. Pacing (step-by-step vs.
//! auto-paced) lives in the caller, which can use [`ChatRoom::pause`] to wait
//! between turns without outliving a stop.
//!
//! # Lifecycle
//!
//! ```text
//! closed --open()--> open --step()*--> ... --stop()--> stopped
//! ```
//!
//! `open` emits a system message announcing the topic and a join message per
//! seated agent. Each `step` may apply churn, picks a speaker, requests one
//! completion and emits the result. Turn-level failures never escape `step`:
//! provider errors and empty replies become `system` diagnostics, and a
//! cancelled turn emits nothing at all.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentroom::provider::ProviderRegistry;
//! use agentroom::room::{ChatRoom, StepOptions};
//! use agentroom::{load_roster, RoomConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let agents = load_roster("roster.json")?;
//!     let mut room = ChatRoom::new(RoomConfig::default(), agents, &ProviderRegistry::from_env())?;
//!     room.open().await?;
//!     while room.is_running() {
//!         let outcome = room.step(StepOptions::default()).await;
//!         if let Some(speaker) = outcome.speaker {
//!             println!("{} took the turn", speaker);
//!         }
//!         room.pause(Duration::from_secs(4)).await;
//!     }
//!     Ok(())
//! }
//! ```

use crate::churn::{self, ChurnDecision};
use crate::config::RoomConfig;
use crate::error::RoomError;
use crate::event::{RoomEvent, RoomEventHandler};
use crate::message::{MessageKind, RoomMessage};
use crate::personality::{color_for, validate_population, AgentConfig};
use crate::phrases;
use crate::prompt;
use crate::provider::{CompletionProvider, CompletionRequest, ProviderError, ProviderRegistry, TokenSink};
use crate::random::{RandomSource, StdRandom};
use crate::roster::Roster;
use crate::scheduler;
use crate::sequencer::MessageSequencer;
use crate::transcript::Transcript;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Where a room is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Closed,
    Open,
    Stopped,
}

/// Per-call knobs for [`ChatRoom::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOptions {
    /// Evaluate churn on this turn if it falls on the churn interval.
    pub churn: bool,
    /// Give the turn to this agent instead of running the scheduler.
    pub forced_speaker: Option<String>,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            churn: true,
            forced_speaker: None,
        }
    }
}

impl StepOptions {
    pub fn without_churn(mut self) -> Self {
        self.churn = false;
        self
    }

    pub fn with_speaker(mut self, name: impl Into<String>) -> Self {
        self.forced_speaker = Some(name.into());
        self
    }
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnResult {
    /// No speaker, or the room was not running.
    Idle,
    /// The speaker produced a chat message.
    Spoke(RoomMessage),
    /// The completion failed or came back empty; a diagnostic was emitted instead.
    Diagnostic(RoomMessage),
    /// The room was stopped while the completion was in flight.
    Cancelled,
}

/// What a single [`ChatRoom::step`] did.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub turn: u64,
    pub churn: ChurnDecision,
    pub speaker: Option<String>,
    pub result: TurnResult,
}

impl StepOutcome {
    fn idle(turn: u64) -> Self {
        Self {
            turn,
            churn: ChurnDecision::default(),
            speaker: None,
            result: TurnResult::Idle,
        }
    }
}

/// Forwards provider stream callbacks as room events.
struct ForwardingSink {
    agent: String,
    handler: Option<Arc<dyn RoomEventHandler>>,
}

#[async_trait]
impl TokenSink for ForwardingSink {
    async fn on_token(&mut self, chunk: &str) {
        if let Some(handler) = &self.handler {
            handler
                .on_event(&RoomEvent::StreamToken {
                    agent: self.agent.clone(),
                    chunk: chunk.to_string(),
                })
                .await;
        }
    }

    async fn on_done(&mut self, _full_text: &str) {
        if let Some(handler) = &self.handler {
            handler
                .on_event(&RoomEvent::StreamDone {
                    agent: self.agent.clone(),
                })
                .await;
        }
    }
}

pub struct ChatRoom {
    id: String,
    config: RoomConfig,
    roster: Roster,
    history: Vec<RoomMessage>,
    sequencer: MessageSequencer,
    /// Resolved provider per agent name.
    providers: HashMap<String, Arc<dyn CompletionProvider>>,
    handler: Option<Arc<dyn RoomEventHandler>>,
    rng: Box<dyn RandomSource>,
    cancel: CancellationToken,
    state: RoomState,
    turn_count: u64,
    preferred_roster: Option<Vec<String>>,
}

impl ChatRoom {
    /// Build a closed room.
    ///
    /// Fails if the config is out of range, the population is invalid or
    /// smaller than `min_agents`, or any agent references a provider kind the
    /// registry does not know.
    pub fn new(
        config: RoomConfig,
        agents: Vec<AgentConfig>,
        registry: &ProviderRegistry,
    ) -> Result<Self, RoomError> {
        config.validate()?;
        validate_population(&agents)?;
        if agents.len() < config.min_agents {
            return Err(RoomError::InvalidConfig(format!(
                "{} agents cannot satisfy min_agents = {}",
                agents.len(),
                config.min_agents
            )));
        }

        let mut providers = HashMap::with_capacity(agents.len());
        for agent in &agents {
            let provider = registry.get(&agent.endpoint.provider).ok_or_else(|| {
                RoomError::UnknownProvider {
                    agent: agent.name().to_string(),
                    provider: agent.endpoint.provider.clone(),
                }
            })?;
            providers.insert(agent.name().to_string(), provider);
        }

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            config,
            roster: Roster::new(agents),
            history: Vec::new(),
            sequencer: MessageSequencer::new(),
            providers,
            handler: None,
            rng: Box::new(StdRandom::from_entropy()),
            cancel: CancellationToken::new(),
            state: RoomState::Closed,
            turn_count: 0,
            preferred_roster: None,
        })
    }

    /// Rebuild a room from a persisted transcript.
    ///
    /// History is kept verbatim with its ids, the sequence continues after the
    /// highest persisted id, and the roster active when the transcript ended is
    /// seated again on [`open`](Self::open). Agents no longer in the population
    /// are dropped from that roster, which is then cut or topped up to fit the
    /// configured bounds.
    pub fn resume(
        config: RoomConfig,
        agents: Vec<AgentConfig>,
        registry: &ProviderRegistry,
        transcript: Transcript,
    ) -> Result<Self, RoomError> {
        let mut room = Self::new(config, agents, registry)?;

        let mut roster = transcript.active_roster();
        roster.retain(|name| {
            let known = room.roster.get(name).is_some();
            if !known {
                log::warn!(
                    "agentroom::room::resume(...): [{}] dropping unknown agent {} from persisted roster",
                    room.id,
                    name
                );
            }
            known
        });
        if !roster.is_empty() {
            let fitted = room.roster.fit_to_bounds(&roster, room.config.bounds());
            if fitted != roster {
                log::warn!(
                    "agentroom::room::resume(...): [{}] persisted roster {:?} adjusted to {:?} to fit {}..={} agents",
                    room.id,
                    roster,
                    fitted,
                    room.config.min_agents,
                    room.config.max_agents
                );
            }
            room.preferred_roster = Some(fitted);
        }

        room.sequencer = MessageSequencer::resume_after(transcript.last_id());
        room.history = transcript.messages;
        log::info!(
            "agentroom::room::resume(...): [{}] resumed with {} messages, next id {}",
            room.id,
            room.history.len(),
            room.sequencer.peek()
        );
        Ok(room)
    }

    /// Attach an observer for messages and streaming events (builder pattern).
    pub fn with_event_handler(mut self, handler: Arc<dyn RoomEventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Replace the random source used by the scheduler, churn and phrases (builder pattern).
    pub fn with_random_source(mut self, rng: impl RandomSource + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// Seat exactly these agents, in this order, when the room opens (builder pattern).
    ///
    /// Fails on an unknown name, or when the list seats fewer than
    /// `min_agents` or more than `max_agents` distinct agents.
    pub fn with_preferred_roster(mut self, names: Vec<String>) -> Result<Self, RoomError> {
        self.roster.check_preferred(&names, self.config.bounds())?;
        self.preferred_roster = Some(names);
        Ok(self)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn history(&self) -> &[RoomMessage] {
        &self.history
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn active_names(&self) -> Vec<String> {
        self.roster.active_names()
    }

    pub fn turn_count(&self) -> u64 {
        self.turn_count
    }

    /// A handle on the room's cancellation token. Cancelling it has the same
    /// effect as [`stop`](Self::stop), and can be done while a step is in flight.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state == RoomState::Open && !self.cancel.is_cancelled()
    }

    /// Announce the topic and seat the initial roster. Only valid once.
    pub async fn open(&mut self) -> Result<(), RoomError> {
        if self.state != RoomState::Closed {
            return Err(RoomError::InvalidState(format!(
                "open() on a room that is {:?}",
                self.state
            )));
        }

        match &self.preferred_roster {
            Some(names) => self.roster.partition_preferred(names)?,
            None => self
                .roster
                .partition(self.config.bounds(), self.rng.as_mut()),
        }
        self.state = RoomState::Open;

        log::info!(
            "agentroom::room::open(): [{}] topic \"{}\", seating {:?}",
            self.id,
            self.config.topic,
            self.roster.active_names()
        );

        self.emit_message(RoomMessage::system(format!("Topic: {}", self.config.topic)))
            .await;
        for name in self.roster.active_names() {
            self.emit_join(&name, None).await;
        }
        Ok(())
    }

    /// Run one turn.
    pub async fn step(&mut self, options: StepOptions) -> StepOutcome {
        if !self.is_running() {
            self.sync_stopped();
            return StepOutcome::idle(self.turn_count);
        }

        self.turn_count += 1;
        self.roster.tick();
        let mut outcome = StepOutcome::idle(self.turn_count);

        if options.churn && self.turn_count % self.config.churn_interval_turns == 0 {
            outcome.churn = self.apply_churn().await;
        }

        let Some(speaker) = self.choose_speaker(options.forced_speaker.as_deref()) else {
            log::debug!(
                "agentroom::room::step(...): [{}] turn {} has no speaker",
                self.id,
                self.turn_count
            );
            return outcome;
        };

        outcome.result = self.take_turn(&speaker).await;
        outcome.speaker = Some(speaker);
        outcome
    }

    /// Bench everybody and seat a fresh random roster.
    pub async fn shuffle(&mut self) -> Result<Vec<String>, RoomError> {
        if !self.is_running() {
            return Err(RoomError::InvalidState(
                "shuffle() requires an open room".to_string(),
            ));
        }

        for name in self.roster.active_names() {
            self.emit_leave(&name).await;
        }
        self.roster
            .partition(self.config.bounds(), self.rng.as_mut());

        let seated = self.roster.active_names();
        log::info!(
            "agentroom::room::shuffle(): [{}] new roster {:?}",
            self.id,
            seated
        );
        for name in &seated {
            let greeting = phrases::random_greeting(self.rng.as_mut());
            self.emit_join(name, Some(greeting)).await;
        }
        Ok(seated)
    }

    /// Append a line from the human participant.
    pub async fn inject_user_message(&mut self, text: impl Into<String>) -> RoomMessage {
        self.emit_message(RoomMessage::user(text)).await
    }

    /// Agents likely to speak next. Consumes no randomness.
    pub fn peek_candidates(&self) -> Vec<String> {
        let active = self.roster.active();
        scheduler::peek_candidates(&active, self.roster.last_speaker(), self.roster.silence())
    }

    /// The single most likely next speaker: the longest silent one.
    pub fn peek_next_speaker(&self) -> Option<String> {
        let active = self.roster.active();
        scheduler::fallback_speaker(&active, self.roster.last_speaker(), self.roster.silence())
    }

    /// Stop the room and cancel any in-flight completion. Idempotent.
    pub fn stop(&mut self) {
        if self.state != RoomState::Stopped {
            log::info!(
                "agentroom::room::stop(): [{}] stopping after {} turns",
                self.id,
                self.turn_count
            );
        }
        self.state = RoomState::Stopped;
        self.cancel.cancel();
    }

    /// Sleep for `duration` unless the room is stopped first.
    /// Returns `false` if the wait was cut short.
    pub async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    /// Same as [`pause`](Self::pause) for the configured base turn delay.
    pub async fn pause_for_turn(&self) -> bool {
        self.pause(self.config.base_turn_delay()).await
    }

    fn sync_stopped(&mut self) {
        if self.state == RoomState::Open && self.cancel.is_cancelled() {
            self.state = RoomState::Stopped;
        }
    }

    async fn emit(&self, event: RoomEvent) {
        if let Some(handler) = &self.handler {
            handler.on_event(&event).await;
        }
    }

    /// Assign an id if the message has none, append it and notify observers.
    async fn emit_message(&mut self, mut message: RoomMessage) -> RoomMessage {
        if message.id.is_none() {
            message.id = Some(self.sequencer.next_id());
        }
        self.history.push(message.clone());
        self.emit(RoomEvent::Message(message.clone())).await;
        message
    }

    fn color_of(&self, agent: &AgentConfig) -> String {
        let index = self.roster.population_index(agent.name()).unwrap_or(0);
        color_for(agent, index)
    }

    /// Join message for `name`: the tagline, plus a greeting after churn or a reshuffle.
    async fn emit_join(&mut self, name: &str, greeting: Option<&str>) {
        let Some(agent) = self.roster.get(name).cloned() else {
            return;
        };
        let content = match greeting {
            Some(greeting) => phrases::join_line(&agent.personality.tagline, greeting),
            None => agent.personality.tagline.clone(),
        };
        let provider_label = self
            .providers
            .get(name)
            .map(|provider| provider.name().to_string())
            .unwrap_or_else(|| agent.endpoint.provider.clone());
        let message = RoomMessage::new(name, content, self.color_of(&agent), MessageKind::Join)
            .with_labels(provider_label, agent.endpoint.model.clone());
        self.emit_message(message).await;
    }

    async fn emit_leave(&mut self, name: &str) {
        let Some(agent) = self.roster.get(name).cloned() else {
            return;
        };
        let excuse = phrases::random_excuse(self.rng.as_mut());
        let message = RoomMessage::new(
            name,
            phrases::leave_line(name, excuse),
            self.color_of(&agent),
            MessageKind::Leave,
        );
        self.emit_message(message).await;
    }

    async fn apply_churn(&mut self) -> ChurnDecision {
        let decision = {
            let active = self.roster.active();
            let benched = self.roster.benched();
            churn::evaluate(&active, &benched, self.config.bounds(), self.rng.as_mut())
        };

        if let Some(name) = &decision.leave {
            log::info!(
                "agentroom::room::apply_churn(): [{}] {} leaves",
                self.id,
                name
            );
            self.emit_leave(name).await;
            self.roster.bench(name);
        }
        if let Some(name) = &decision.join {
            log::info!(
                "agentroom::room::apply_churn(): [{}] {} joins",
                self.id,
                name
            );
            self.roster.activate(name);
            let greeting = phrases::random_greeting(self.rng.as_mut());
            self.emit_join(name, Some(greeting)).await;
        }
        decision
    }

    fn choose_speaker(&mut self, forced: Option<&str>) -> Option<String> {
        if let Some(name) = forced {
            if self.roster.is_active(name) {
                return Some(name.to_string());
            }
            log::warn!(
                "agentroom::room::choose_speaker(...): [{}] forced speaker {} is not in the room, using the scheduler",
                self.id,
                name
            );
        }

        let candidates = {
            let active = self.roster.active();
            scheduler::select_candidates(
                &active,
                self.roster.last_speaker(),
                self.roster.silence(),
                self.rng.as_mut(),
            )
        };
        log::debug!(
            "agentroom::room::choose_speaker(...): [{}] candidates {:?}",
            self.id,
            candidates
        );

        match candidates.len() {
            0 => None,
            1 => candidates.into_iter().next(),
            n => {
                let index = self.rng.pick_index(n);
                candidates.into_iter().nth(index)
            }
        }
    }

    async fn take_turn(&mut self, speaker: &str) -> TurnResult {
        let (Some(agent), Some(provider)) = (
            self.roster.get(speaker).cloned(),
            self.providers.get(speaker).cloned(),
        ) else {
            return TurnResult::Idle;
        };

        let reservation = self.sequencer.reserve();
        self.emit(RoomEvent::Thinking {
            agent: speaker.to_string(),
            message_id: reservation.id(),
        })
        .await;

        let request = CompletionRequest {
            model: agent.endpoint.model.clone(),
            messages: prompt::build_prompt(&agent.personality, &self.config, &self.history),
            temperature: agent.endpoint.temperature.unwrap_or(self.config.temperature),
            max_tokens: agent.endpoint.max_tokens.unwrap_or(self.config.max_tokens),
        };
        let mut sink = ForwardingSink {
            agent: speaker.to_string(),
            handler: self.handler.clone(),
        };
        let cancel = self.cancel.clone();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            result = provider.complete(request, Some(&mut sink as &mut dyn TokenSink), &cancel) => result,
        };

        // A reply that lands after stop() is discarded like any other cancellation.
        let result = if cancel.is_cancelled() {
            Err(ProviderError::Cancelled)
        } else {
            result
        };

        let color = self.color_of(&agent);
        match result {
            Err(ProviderError::Cancelled) => {
                self.sequencer.release(reservation);
                self.sync_stopped();
                log::info!(
                    "agentroom::room::take_turn(...): [{}] {}'s turn cancelled",
                    self.id,
                    speaker
                );
                TurnResult::Cancelled
            }
            Err(err) => {
                log::warn!(
                    "agentroom::room::take_turn(...): [{}] {} failed: {}",
                    self.id,
                    speaker,
                    err
                );
                let id = self.sequencer.commit(reservation);
                let message = self
                    .emit_message(
                        RoomMessage::system(format!("{} couldn't respond: {}", speaker, err))
                            .with_id(id),
                    )
                    .await;
                TurnResult::Diagnostic(message)
            }
            Ok(text) => {
                let content = prompt::strip_self_name(speaker, &text);
                let id = self.sequencer.commit(reservation);
                if content.is_empty() {
                    log::warn!(
                        "agentroom::room::take_turn(...): [{}] {} returned an empty reply",
                        self.id,
                        speaker
                    );
                    let message = self
                        .emit_message(
                            RoomMessage::system(format!("{} had nothing to say.", speaker))
                                .with_id(id),
                        )
                        .await;
                    return TurnResult::Diagnostic(message);
                }

                let message = self
                    .emit_message(
                        RoomMessage::new(speaker, content, color, MessageKind::Chat).with_id(id),
                    )
                    .await;
                self.roster.record_speech(speaker);
                TurnResult::Spoke(message)
            }
        }
    }
}

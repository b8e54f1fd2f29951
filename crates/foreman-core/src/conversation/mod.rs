//! Multi-agent conversations: ordered transcripts of turns on one topic.
//!
//! The manager owns the transcripts; message delivery itself is the
//! orchestrator's job because it needs the agent registry. Reaching the turn
//! cap forces a conversation to completed.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::agent::{AgentMessage, AgentResponse};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Status of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Paused,
    Completed,
    Failed,
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for ConversationStatus {
    type Err = ConversationStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(ConversationStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`ConversationStatus`] string.
#[derive(Debug, Clone)]
pub struct ConversationStatusParseError(pub String);

impl fmt::Display for ConversationStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid conversation status: {:?}", self.0)
    }
}

impl std::error::Error for ConversationStatusParseError {}

// ---------------------------------------------------------------------------

/// How turns are routed among participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    /// Agents speak in a fixed order.
    Sequential,
    /// Cycle through agents.
    RoundRobin,
    /// Participants join and are addressed as callers direct.
    Dynamic,
    /// Every message goes to all agents.
    Broadcast,
}

impl fmt::Display for ConversationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sequential => "sequential",
            Self::RoundRobin => "round_robin",
            Self::Dynamic => "dynamic",
            Self::Broadcast => "broadcast",
        };
        f.write_str(s)
    }
}

impl FromStr for ConversationMode {
    type Err = ConversationModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(Self::Sequential),
            "round_robin" => Ok(Self::RoundRobin),
            "dynamic" => Ok(Self::Dynamic),
            "broadcast" => Ok(Self::Broadcast),
            other => Err(ConversationModeParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`ConversationMode`] string.
#[derive(Debug, Clone)]
pub struct ConversationModeParseError(pub String);

impl fmt::Display for ConversationModeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid conversation mode: {:?}", self.0)
    }
}

impl std::error::Error for ConversationModeParseError {}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// A single turn: who spoke, the inbound message, and the response (if any).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: String,
    pub message: AgentMessage,
    #[serde(default)]
    pub response: Option<AgentResponse>,
    pub timestamp: DateTime<Utc>,
}

/// An ordered transcript of turns between named agents on one topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub topic: String,
    pub participants: Vec<String>,
    pub mode: ConversationMode,
    pub status: ConversationStatus,
    pub turns: Vec<ConversationTurn>,
    #[serde(default)]
    pub task_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub max_turns: usize,
}

impl Conversation {
    /// Create an active conversation with the default turn cap of 50.
    pub fn new(
        topic: impl Into<String>,
        participants: Vec<String>,
        mode: ConversationMode,
        task_id: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            participants,
            mode,
            status: ConversationStatus::Active,
            turns: Vec::new(),
            task_id,
            created_at: now,
            updated_at: now,
            metadata: HashMap::new(),
            max_turns: 50,
        }
    }

    /// Add a participant if not already present.
    pub fn add_participant(&mut self, agent_name: impl Into<String>) {
        let name = agent_name.into();
        if !self.participants.contains(&name) {
            self.participants.push(name);
            self.updated_at = Utc::now();
        }
    }

    /// Remove a participant.
    pub fn remove_participant(&mut self, agent_name: &str) {
        self.participants.retain(|p| p != agent_name);
        self.updated_at = Utc::now();
    }

    /// Append a turn. Reaching `max_turns` forces the conversation to
    /// completed.
    pub fn add_turn(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
        self.updated_at = Utc::now();
        if self.turns.len() >= self.max_turns {
            self.status = ConversationStatus::Completed;
        }
    }

    /// The transcript, optionally limited to the last `last_n` turns.
    pub fn history(&self, last_n: Option<usize>) -> &[ConversationTurn] {
        match last_n {
            Some(n) if n < self.turns.len() => &self.turns[self.turns.len() - n..],
            _ => &self.turns,
        }
    }

    /// Check whether the conversation accepts new turns.
    pub fn is_active(&self) -> bool {
        self.status == ConversationStatus::Active
    }

    /// Mark the conversation as completed.
    pub fn complete(&mut self) {
        self.status = ConversationStatus::Completed;
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Owns conversations and tracks which agents participate in which.
#[derive(Debug, Default)]
pub struct ConversationManager {
    conversations: HashMap<Uuid, Conversation>,
    agent_index: HashMap<String, Vec<Uuid>>,
}

impl ConversationManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a conversation and index its participants.
    pub fn create(
        &mut self,
        topic: impl Into<String>,
        participants: Vec<String>,
        mode: ConversationMode,
        task_id: Option<Uuid>,
    ) -> Uuid {
        let conversation = Conversation::new(topic, participants, mode, task_id);
        let id = conversation.id;
        for participant in &conversation.participants {
            self.index_agent(participant, id);
        }
        self.conversations.insert(id, conversation);
        id
    }

    /// Look up a conversation by id.
    pub fn get(&self, conversation_id: Uuid) -> Option<&Conversation> {
        self.conversations.get(&conversation_id)
    }

    /// Mutable lookup, used by the orchestrator to append turns.
    pub fn get_mut(&mut self, conversation_id: Uuid) -> Option<&mut Conversation> {
        self.conversations.get_mut(&conversation_id)
    }

    /// Add an agent to an existing conversation. Returns `false` if the
    /// conversation does not exist.
    pub fn add_participant(&mut self, conversation_id: Uuid, agent_name: &str) -> bool {
        let Some(conversation) = self.conversations.get_mut(&conversation_id) else {
            return false;
        };
        conversation.add_participant(agent_name);
        self.index_agent(agent_name, conversation_id);
        true
    }

    fn index_agent(&mut self, agent_name: &str, conversation_id: Uuid) {
        let ids = self.agent_index.entry(agent_name.to_string()).or_default();
        if !ids.contains(&conversation_id) {
            ids.push(conversation_id);
        }
    }

    /// All conversations an agent participates in.
    pub fn conversations_for_agent(&self, agent_name: &str) -> Vec<&Conversation> {
        self.agent_index
            .get(agent_name)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.conversations.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All currently active conversations.
    pub fn active(&self) -> Vec<&Conversation> {
        self.conversations
            .values()
            .filter(|c| c.status == ConversationStatus::Active)
            .collect()
    }

    /// End a conversation. Unknown ids are ignored.
    pub fn end(&mut self, conversation_id: Uuid) {
        if let Some(conversation) = self.conversations.get_mut(&conversation_id) {
            conversation.complete();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(speaker: &str) -> ConversationTurn {
        ConversationTurn {
            speaker: speaker.to_string(),
            message: AgentMessage::new(speaker, "other", "hello"),
            response: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn mode_display_roundtrip() {
        let variants = [
            ConversationMode::Sequential,
            ConversationMode::RoundRobin,
            ConversationMode::Dynamic,
            ConversationMode::Broadcast,
        ];
        for v in &variants {
            let s = v.to_string();
            let parsed: ConversationMode = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn status_display_roundtrip() {
        let variants = [
            ConversationStatus::Active,
            ConversationStatus::Paused,
            ConversationStatus::Completed,
            ConversationStatus::Failed,
        ];
        for v in &variants {
            let s = v.to_string();
            let parsed: ConversationStatus = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn add_participant_deduplicates() {
        let mut conversation = Conversation::new(
            "topic",
            vec!["alpha".to_string()],
            ConversationMode::Dynamic,
            None,
        );
        conversation.add_participant("alpha");
        conversation.add_participant("beta");
        assert_eq!(conversation.participants, vec!["alpha", "beta"]);

        conversation.remove_participant("alpha");
        assert_eq!(conversation.participants, vec!["beta"]);
    }

    #[test]
    fn turn_cap_forces_completion() {
        let mut conversation =
            Conversation::new("topic", Vec::new(), ConversationMode::Dynamic, None);
        conversation.max_turns = 3;

        conversation.add_turn(turn("a"));
        conversation.add_turn(turn("b"));
        assert!(conversation.is_active());

        conversation.add_turn(turn("c"));
        assert_eq!(conversation.status, ConversationStatus::Completed);
        assert!(!conversation.is_active());
        assert_eq!(conversation.turns.len(), 3);
    }

    #[test]
    fn history_limits_to_last_n() {
        let mut conversation =
            Conversation::new("topic", Vec::new(), ConversationMode::Dynamic, None);
        for speaker in ["a", "b", "c", "d"] {
            conversation.add_turn(turn(speaker));
        }

        assert_eq!(conversation.history(None).len(), 4);
        let last_two = conversation.history(Some(2));
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].speaker, "c");
        assert_eq!(last_two[1].speaker, "d");
        assert_eq!(conversation.history(Some(10)).len(), 4);
    }

    #[test]
    fn manager_creates_and_indexes() {
        let mut manager = ConversationManager::new();
        let id = manager.create(
            "review",
            vec!["dev".to_string(), "qa".to_string()],
            ConversationMode::Dynamic,
            None,
        );

        assert!(manager.get(id).is_some());
        assert_eq!(manager.conversations_for_agent("dev").len(), 1);
        assert_eq!(manager.conversations_for_agent("ghost").len(), 0);
        assert_eq!(manager.active().len(), 1);
    }

    #[test]
    fn manager_end_completes_conversation() {
        let mut manager = ConversationManager::new();
        let id = manager.create("topic", Vec::new(), ConversationMode::Dynamic, None);
        manager.end(id);
        assert_eq!(manager.get(id).unwrap().status, ConversationStatus::Completed);
        assert!(manager.active().is_empty());
    }

    #[test]
    fn add_participant_to_missing_conversation_fails() {
        let mut manager = ConversationManager::new();
        assert!(!manager.add_participant(Uuid::new_v4(), "dev"));
    }

    #[test]
    fn late_participant_is_indexed() {
        let mut manager = ConversationManager::new();
        let id = manager.create("topic", Vec::new(), ConversationMode::Dynamic, None);
        assert!(manager.add_participant(id, "late"));
        assert_eq!(manager.conversations_for_agent("late").len(), 1);
        assert!(manager.get(id).unwrap().participants.contains(&"late".to_string()));
    }
}

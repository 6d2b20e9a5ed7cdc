//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every message is a JSON object whose `type` field selects the variant.

use serde::{Deserialize, Serialize};

use crate::game::state::{CoinSide, Game, GameId};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Bind a player handle to this connection.
    Connect {
        /// Opaque wallet string used as the player handle.
        wallet: String,
    },

    /// Open a new game in the lobby.
    CreateGame {
        /// Host stake, must be positive.
        bet: f64,
    },

    /// Take the guest seat of a waiting game.
    JoinGame {
        /// Target game.
        #[serde(rename = "gameId")]
        game_id: String,
    },

    /// Commit to heads or tails.
    MakeChoice {
        /// Target game.
        #[serde(rename = "gameId")]
        game_id: String,
        /// Chosen side.
        choice: CoinSide,
    },

    /// Withdraw a waiting game (host only).
    CancelGame {
        /// Target game.
        #[serde(rename = "gameId")]
        game_id: String,
    },

    /// Request the current lobby.
    GetGames,
}

impl ClientMessage {
    /// Every `type` value the server understands.
    pub const TYPES: [&'static str; 6] = [
        "connect",
        "create_game",
        "join_game",
        "make_choice",
        "cancel_game",
        "get_games",
    ];

    /// Whether `kind` names a client message.
    pub fn is_known_type(kind: &str) -> bool {
        Self::TYPES.contains(&kind)
    }

    /// Wire name of this message's `type`.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Connect { .. } => "connect",
            ClientMessage::CreateGame { .. } => "create_game",
            ClientMessage::JoinGame { .. } => "join_game",
            ClientMessage::MakeChoice { .. } => "make_choice",
            ClientMessage::CancelGame { .. } => "cancel_game",
            ClientMessage::GetGames => "get_games",
        }
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handle bound.
    Connected {
        /// The bound handle.
        wallet: String,
    },

    /// Lobby snapshot (waiting games only).
    GamesList {
        /// Waiting games in creation order.
        games: Vec<Game>,
    },

    /// Sent to the host after `create_game`.
    GameCreated {
        /// The new game.
        game: Game,
    },

    /// Sent to both participants once a guest joins.
    GameStarted {
        /// The game, now playing.
        game: Game,
    },

    /// A participant has locked in a choice.
    OpponentChose {
        /// Game the choice was made in.
        #[serde(rename = "gameId")]
        game_id: GameId,
    },

    /// Game resolved.
    GameResult {
        /// The finished game including its result.
        game: Game,
    },

    /// Request rejected. Only ever sent to the originating connection.
    Error {
        /// Human-readable message.
        error: String,
        /// Machine-readable code.
        code: ErrorCode,
    },
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Unknown game id.
    NotFound,
    /// Operation not valid for the game's status.
    InvalidState,
    /// Malformed message or field.
    InvalidInput,
    /// Host tried to join their own game.
    SelfJoin,
    /// Game action before `connect`.
    NotConnected,
}

impl ServerMessage {
    /// Build an error envelope.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            error: message.into(),
            code,
        }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

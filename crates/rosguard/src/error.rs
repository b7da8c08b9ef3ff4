// Copyright (C) 2025 Joseph Sacchini
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the Free
// Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use crate::client::ClientError;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("JSON encode/decode failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{kind} has no .id")]
    MissingId { kind: &'static str },

    #[error("interface name {0:?} is reserved for key generation")]
    ReservedName(String),

    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("failed to decode base64 key: {0}")]
    KeyDecode(#[from] base64::DecodeError),

    #[error("invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),
}

impl OrchestratorError {
    /// True when the router answered 404 for the request.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Client(ClientError::NotFound { .. }))
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

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

//! Wireguard management for RouterOS devices over the REST API.

pub mod client;
pub mod config;
pub mod error;
pub mod keygen;
pub mod orchestrator;
pub mod state;

pub use client::{ClientError, RestClient, RouterClient};
pub use error::OrchestratorError;
pub use orchestrator::{Outcome, PeerCreated, WireguardServer};
pub use state::StateCache;

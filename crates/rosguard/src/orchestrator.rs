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

use std::fmt;

use ipnetwork::IpNetwork;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use rosguard_types::{Field, Interface, IpAddress, KeyPair, Peer, Resource};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::client::RouterClient;
use crate::error::{OrchestratorError, Result};
use crate::keygen;
use crate::state::StateCache;

/// What a mutation did. Failures are reported through `Err` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Created,
    Updated,
    Deleted,
    /// A record with the same identity is already cached; nothing was sent.
    AlreadyExists,
    /// The record is not in the cache; nothing was sent.
    NotFound,
}

impl Outcome {
    /// True when a request was sent to the router.
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Deleted)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::AlreadyExists => "already exists",
            Self::NotFound => "not found",
        })
    }
}

/// Result of [`WireguardServer::create_peer`]. When the peer had no public key,
/// `key_pair` holds the pair generated for it; its private half is not stored on
/// the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerCreated {
    pub outcome: Outcome,
    pub key_pair: Option<KeyPair>,
}

/// Wireguard configuration of one RouterOS device.
///
/// Keeps a [`StateCache`] of the device's interfaces, peers and addresses and
/// checks every mutation against it before touching the router. The cache is
/// only refreshed on request; callers refresh after mutating to observe the
/// result. Every operation holds the cache lock for its whole check-and-mutate
/// sequence, so operations on one instance never interleave.
pub struct WireguardServer<C> {
    client: C,
    state: Mutex<StateCache>,
}

impl<C: RouterClient> WireguardServer<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            state: Mutex::new(StateCache::default()),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub(crate) async fn lock_state(&self) -> MutexGuard<'_, StateCache> {
        self.state.lock().await
    }

    // -- Snapshots -----------------------------------------------------------

    pub async fn snapshot(&self) -> StateCache {
        self.state.lock().await.clone()
    }

    pub async fn interfaces(&self) -> Vec<Interface> {
        self.state.lock().await.interfaces().to_vec()
    }

    pub async fn peers(&self) -> Vec<Peer> {
        self.state.lock().await.peers().to_vec()
    }

    pub async fn addresses(&self) -> Vec<IpAddress> {
        self.state.lock().await.addresses().to_vec()
    }

    // -- Refresh -------------------------------------------------------------

    pub async fn refresh_interfaces(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.refresh_interfaces_locked(&mut state).await
    }

    pub async fn refresh_peers(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.refresh_peers_locked(&mut state).await
    }

    /// Refresh addresses. Interfaces are refreshed as well, since the address
    /// list is filtered against the interface names.
    pub async fn refresh_addresses(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.refresh_addresses_locked(&mut state).await
    }

    /// Refresh interfaces, then addresses, then peers.
    #[tracing::instrument(skip_all)]
    pub async fn refresh_all(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.refresh_interfaces_locked(&mut state).await?;
        self.refresh_addresses_locked(&mut state).await?;
        self.refresh_peers_locked(&mut state).await?;
        info!(
            interfaces = state.interfaces().len(),
            addresses = state.addresses().len(),
            peers = state.peers().len(),
            "refreshed router state"
        );
        Ok(())
    }

    pub(crate) async fn refresh_interfaces_locked(&self, state: &mut StateCache) -> Result<()> {
        let interfaces: Vec<Interface> = self.fetch_collection().await?;
        debug!(count = interfaces.len(), "refreshed interfaces");
        state.replace_interfaces(interfaces);
        Ok(())
    }

    async fn refresh_peers_locked(&self, state: &mut StateCache) -> Result<()> {
        let peers: Vec<Peer> = self.fetch_collection().await?;
        debug!(count = peers.len(), "refreshed peers");
        state.replace_peers(peers);
        Ok(())
    }

    async fn refresh_addresses_locked(&self, state: &mut StateCache) -> Result<()> {
        let raw: Vec<IpAddress> = self.fetch_collection().await?;
        self.refresh_interfaces_locked(state).await?;
        let total = raw.len();
        let dropped = state.replace_addresses(raw);
        debug!(total, kept = total - dropped, "refreshed addresses");
        Ok(())
    }

    async fn fetch_collection<R: Resource>(&self) -> Result<Vec<R>> {
        let body = self.client.get(R::COLLECTION).await?;
        Ok(serde_json::from_str(&body)?)
    }

    // -- Single reads --------------------------------------------------------

    /// Read one interface straight from the router by `.id` or name, bypassing
    /// the cache.
    pub async fn fetch_interface(&self, key: &str) -> Result<Interface> {
        self.fetch_item(key).await
    }

    /// Read one peer straight from the router by `.id`, bypassing the cache.
    pub async fn fetch_peer(&self, id: &str) -> Result<Peer> {
        self.fetch_item(id).await
    }

    async fn fetch_item<R: Resource>(&self, key: &str) -> Result<R> {
        let body = self.client.get(&item_path::<R>(key)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    // -- Interfaces ----------------------------------------------------------

    #[tracing::instrument(skip_all, fields(name = iface.name.as_deref()))]
    pub async fn create_interface(&self, iface: &Interface) -> Result<Outcome> {
        if let Some(name) = iface.name.as_deref() {
            if keygen::is_reserved_name(name) {
                return Err(OrchestratorError::ReservedName(name.to_string()));
            }
        }
        let state = self.state.lock().await;
        self.create_interface_locked(&state, iface).await
    }

    pub(crate) async fn create_interface_locked(
        &self,
        state: &StateCache,
        iface: &Interface,
    ) -> Result<Outcome> {
        if let Some(name) = iface.name.as_deref() {
            if state.interface_by_name(name).is_some() {
                info!(name, "interface already exists, not creating");
                return Ok(Outcome::AlreadyExists);
            }
        }
        self.put_record(iface).await?;
        info!("created interface");
        Ok(Outcome::Created)
    }

    #[tracing::instrument(skip_all, fields(name = iface.name.as_deref()))]
    pub async fn update_interface(&self, iface: &Interface) -> Result<Outcome> {
        let state = self.state.lock().await;
        let Some(name) = cached_interface_name(&state, iface) else {
            debug!("interface not in cache, not updating");
            return Ok(Outcome::NotFound);
        };
        self.patch_record(name, iface).await?;
        info!("updated interface");
        Ok(Outcome::Updated)
    }

    /// Delete an interface, then every cached address and peer bound to it, in
    /// that order. Deletions are sequential and the first failure stops the
    /// sequence; whatever was already deleted stays deleted.
    #[tracing::instrument(skip_all, fields(name = iface.name.as_deref()))]
    pub async fn delete_interface(&self, iface: &Interface) -> Result<Outcome> {
        let state = self.state.lock().await;
        let Some(name) = cached_interface_name(&state, iface) else {
            debug!("interface not in cache, not deleting");
            return Ok(Outcome::NotFound);
        };

        self.delete_record::<Interface>(name).await?;

        let addresses: Vec<&IpAddress> = state.addresses_on(name).collect();
        let peers: Vec<&Peer> = state.peers_on(name).collect();
        debug!(
            addresses = addresses.len(),
            peers = peers.len(),
            "cascading interface delete"
        );

        for address in &addresses {
            self.delete_by_id(*address).await?;
        }
        for peer in &peers {
            self.delete_by_id(*peer).await?;
        }

        info!(
            addresses = addresses.len(),
            peers = peers.len(),
            "deleted interface and its dependents"
        );
        Ok(Outcome::Deleted)
    }

    // -- Peers ---------------------------------------------------------------

    /// Create a peer. A peer without a public key gets one from the router's
    /// key generator first.
    #[tracing::instrument(skip_all, fields(interface = peer.interface.as_deref()))]
    pub async fn create_peer(&self, peer: &Peer) -> Result<PeerCreated> {
        let mut state = self.state.lock().await;

        if let Some(key) = peer.public_key.as_deref() {
            if state.peer_by_public_key(key).is_some() {
                info!(public_key = key, "peer already exists, not creating");
                return Ok(PeerCreated {
                    outcome: Outcome::AlreadyExists,
                    key_pair: None,
                });
            }
        }

        let mut peer = peer.clone();
        let mut key_pair = None;
        if peer.public_key.is_unset() {
            let pair = self.generate_keys_locked(&mut state).await?;
            debug!(public_key = %pair.public_key, "generated key pair for new peer");
            peer.public_key = Field::Set(pair.public_key.clone());
            key_pair = Some(pair);
        }

        self.put_record(&peer).await?;
        info!(public_key = peer.public_key.as_deref(), "created peer");
        Ok(PeerCreated {
            outcome: Outcome::Created,
            key_pair,
        })
    }

    /// Update a cached peer, matched by public key (or by `.id` when the record
    /// carries no key). The router path uses the cached peer's `.id`.
    #[tracing::instrument(skip_all, fields(public_key = peer.public_key.as_deref()))]
    pub async fn update_peer(&self, peer: &Peer) -> Result<Outcome> {
        let state = self.state.lock().await;
        let cached = match (peer.public_key.as_deref(), peer.id.as_deref()) {
            (Some(key), _) => state.peer_by_public_key(key),
            (None, Some(id)) => state.peer_by_id(id),
            (None, None) => None,
        };
        let Some(cached) = cached else {
            debug!("peer not in cache, not updating");
            return Ok(Outcome::NotFound);
        };
        let id = peer
            .id()
            .or(cached.id())
            .ok_or(OrchestratorError::MissingId { kind: Peer::KIND })?;

        self.patch_record(id, peer).await?;
        info!(id, "updated peer");
        Ok(Outcome::Updated)
    }

    /// Delete a peer by `.id`. No cache check.
    #[tracing::instrument(skip_all, fields(id = peer.id.as_deref()))]
    pub async fn delete_peer(&self, peer: &Peer) -> Result<Outcome> {
        let _state = self.state.lock().await;
        self.delete_by_id(peer).await?;
        info!("deleted peer");
        Ok(Outcome::Deleted)
    }

    // -- Addresses -----------------------------------------------------------

    /// Bind an address to a cached Wireguard interface.
    #[tracing::instrument(
        skip_all,
        fields(address = addr.address.as_deref(), interface = addr.interface.as_deref())
    )]
    pub async fn create_address(&self, addr: &IpAddress) -> Result<Outcome> {
        let address = addr.address.as_deref().unwrap_or_default();
        address
            .parse::<IpNetwork>()
            .map_err(|e| OrchestratorError::InvalidAddress {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        let state = self.state.lock().await;
        let Some(interface) = addr.interface.as_deref() else {
            debug!("address has no interface, not creating");
            return Ok(Outcome::NotFound);
        };
        if state.interface_by_name(interface).is_none() {
            warn!("interface not in cache, not binding address");
            return Ok(Outcome::NotFound);
        }
        if state
            .addresses_on(interface)
            .any(|existing| existing.address.as_deref() == Some(address))
        {
            info!("address already bound, not creating");
            return Ok(Outcome::AlreadyExists);
        }

        self.put_record(addr).await?;
        info!("created address");
        Ok(Outcome::Created)
    }

    /// Delete an address by `.id`. No cache check.
    #[tracing::instrument(skip_all, fields(id = addr.id.as_deref()))]
    pub async fn delete_address(&self, addr: &IpAddress) -> Result<Outcome> {
        let _state = self.state.lock().await;
        self.delete_by_id(addr).await?;
        info!("deleted address");
        Ok(Outcome::Deleted)
    }

    // -- Router requests -----------------------------------------------------

    pub(crate) async fn put_record<R: Resource>(&self, record: &R) -> Result<()> {
        let body = record.to_payload()?;
        debug!(kind = R::KIND, bytes = body.len(), "PUT {}", R::COLLECTION);
        self.client.put(R::COLLECTION, body).await?;
        Ok(())
    }

    async fn patch_record<R: Resource>(&self, key: &str, record: &R) -> Result<()> {
        let body = record.to_payload()?;
        let path = item_path::<R>(key);
        debug!(kind = R::KIND, bytes = body.len(), "PATCH {path}");
        self.client.patch(&path, body).await?;
        Ok(())
    }

    pub(crate) async fn delete_record<R: Resource>(&self, key: &str) -> Result<()> {
        let path = item_path::<R>(key);
        debug!(kind = R::KIND, "DELETE {path}");
        self.client.delete(&path).await?;
        Ok(())
    }

    async fn delete_by_id<R: Resource>(&self, record: &R) -> Result<()> {
        let id = record
            .id()
            .ok_or(OrchestratorError::MissingId { kind: R::KIND })?;
        self.delete_record::<R>(id).await
    }
}

/// Characters that would end or split a path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Item path with `key` encoded as a single segment, so a name such as
/// `wg#1` cannot address `wg`.
fn item_path<R: Resource>(key: &str) -> String {
    format!("{}/{}", R::COLLECTION, utf8_percent_encode(key, SEGMENT))
}

/// Name of `iface` if an interface with that name is cached.
fn cached_interface_name<'a>(state: &StateCache, iface: &'a Interface) -> Option<&'a str> {
    let name = iface.name.as_deref()?;
    state.interface_by_name(name).map(|_| name)
}

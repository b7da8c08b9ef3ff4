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

use std::collections::HashSet;

use rosguard_types::{Interface, IpAddress, Peer};

/// Last fetched snapshot of each Wireguard collection on the router.
///
/// Collections are only ever replaced whole. `None` means the collection has
/// never been fetched; lookups treat that the same as an empty collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateCache {
    interfaces: Option<Vec<Interface>>,
    peers: Option<Vec<Peer>>,
    addresses: Option<Vec<IpAddress>>,
}

impl StateCache {
    pub fn interfaces(&self) -> &[Interface] {
        self.interfaces.as_deref().unwrap_or_default()
    }

    pub fn peers(&self) -> &[Peer] {
        self.peers.as_deref().unwrap_or_default()
    }

    /// Addresses bound to a known Wireguard interface.
    pub fn addresses(&self) -> &[IpAddress] {
        self.addresses.as_deref().unwrap_or_default()
    }

    pub fn interfaces_loaded(&self) -> bool {
        self.interfaces.is_some()
    }

    pub fn peers_loaded(&self) -> bool {
        self.peers.is_some()
    }

    pub fn addresses_loaded(&self) -> bool {
        self.addresses.is_some()
    }

    pub fn interface_by_name(&self, name: &str) -> Option<&Interface> {
        self.interfaces()
            .iter()
            .find(|iface| iface.name.as_deref() == Some(name))
    }

    pub fn peer_by_public_key(&self, public_key: &str) -> Option<&Peer> {
        self.peers()
            .iter()
            .find(|peer| peer.public_key.as_deref() == Some(public_key))
    }

    pub fn peer_by_id(&self, id: &str) -> Option<&Peer> {
        self.peers().iter().find(|peer| peer.id.as_deref() == Some(id))
    }

    pub fn addresses_on<'a>(&'a self, interface: &'a str) -> impl Iterator<Item = &'a IpAddress> {
        self.addresses()
            .iter()
            .filter(move |addr| addr.interface.as_deref() == Some(interface))
    }

    pub fn peers_on<'a>(&'a self, interface: &'a str) -> impl Iterator<Item = &'a Peer> {
        self.peers()
            .iter()
            .filter(move |peer| peer.interface.as_deref() == Some(interface))
    }

    pub(crate) fn replace_interfaces(&mut self, interfaces: Vec<Interface>) {
        self.interfaces = Some(interfaces);
    }

    pub(crate) fn replace_peers(&mut self, peers: Vec<Peer>) {
        self.peers = Some(peers);
    }

    /// Keep only the addresses bound to a cached interface name and store them.
    /// Returns how many system addresses were dropped.
    pub(crate) fn replace_addresses(&mut self, raw: Vec<IpAddress>) -> usize {
        let total = raw.len();
        let filtered = self.wireguard_addresses(raw);
        let dropped = total - filtered.len();
        self.addresses = Some(filtered);
        dropped
    }

    fn wireguard_addresses(&self, raw: Vec<IpAddress>) -> Vec<IpAddress> {
        let names: HashSet<&str> = self
            .interfaces()
            .iter()
            .filter_map(|iface| iface.name.as_deref())
            .collect();
        raw.into_iter()
            .filter(|addr| {
                addr.interface
                    .as_deref()
                    .is_some_and(|name| names.contains(name))
            })
            .collect()
    }
}

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

//! Records for the `interface/wireguard`, `interface/wireguard/peer` and
//! `ip/address` REST collections.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::Field;

/// A record that lives in a RouterOS REST collection.
pub trait Resource: Serialize + DeserializeOwned {
    /// Short name used in logs and errors.
    const KIND: &'static str;
    /// Collection path relative to the REST root.
    const COLLECTION: &'static str;
    /// Attributes reported by the device that it refuses on create or update.
    const READ_ONLY: &'static [&'static str];

    /// The device-assigned `.id`, if known.
    fn id(&self) -> Option<&str>;

    /// Encode the record as a create/update body: unset attributes, the `.id`
    /// and read-only attributes are left out.
    fn to_payload(&self) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Some(map) = value.as_object_mut() {
            map.remove(".id");
            for key in Self::READ_ONLY {
                map.remove(*key);
            }
        }
        serde_json::to_string(&value)
    }
}

/// A Wireguard interface on the router.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    /// Device-assigned identifier.
    #[serde(rename = ".id", default, skip_serializing_if = "Field::is_unset")]
    pub id: Field<String>,
    /// Interface name, unique among Wireguard interfaces.
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub name: Field<String>,
    /// UDP listen port.
    #[serde(rename = "listen-port", default, skip_serializing_if = "Field::is_unset")]
    pub listen_port: Field<u16>,
    /// Interface MTU.
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub mtu: Field<u16>,
    /// Base64 private key; generated by the device when omitted on create.
    #[serde(rename = "private-key", default, skip_serializing_if = "Field::is_unset")]
    pub private_key: Field<String>,
    /// Base64 public key derived by the device.
    #[serde(rename = "public-key", default, skip_serializing_if = "Field::is_unset")]
    pub public_key: Field<String>,
    /// Whether the device reports the interface as running.
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub running: Field<bool>,
    /// Administrative disable flag.
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub disabled: Field<bool>,
    /// Free-form comment.
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub comment: Field<String>,
}

impl Interface {
    /// An interface with only its name set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Field::Set(name.into()),
            ..Self::default()
        }
    }
}

impl Resource for Interface {
    const KIND: &'static str = "interface";
    const COLLECTION: &'static str = "interface/wireguard";
    const READ_ONLY: &'static [&'static str] = &["running", "public-key"];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// A Wireguard peer attached to an interface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    /// Device-assigned identifier.
    #[serde(rename = ".id", default, skip_serializing_if = "Field::is_unset")]
    pub id: Field<String>,
    /// Base64 public key; identifies the peer.
    #[serde(rename = "public-key", default, skip_serializing_if = "Field::is_unset")]
    pub public_key: Field<String>,
    /// Name of the interface the peer belongs to.
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub interface: Field<String>,
    /// Comma separated CIDRs routed to this peer.
    #[serde(rename = "allowed-address", default, skip_serializing_if = "Field::is_unset")]
    pub allowed_address: Field<String>,
    /// Configured endpoint host.
    #[serde(rename = "endpoint-address", default, skip_serializing_if = "Field::is_unset")]
    pub endpoint_address: Field<String>,
    /// Configured endpoint port.
    #[serde(rename = "endpoint-port", default, skip_serializing_if = "Field::is_unset")]
    pub endpoint_port: Field<u16>,
    /// Endpoint host last seen by the device.
    #[serde(
        rename = "current-endpoint-address",
        default,
        skip_serializing_if = "Field::is_unset"
    )]
    pub current_endpoint_address: Field<String>,
    /// Endpoint port last seen by the device.
    #[serde(
        rename = "current-endpoint-port",
        default,
        skip_serializing_if = "Field::is_unset"
    )]
    pub current_endpoint_port: Field<u16>,
    /// Time since the last handshake, as rendered by the device (e.g. `1m12s`).
    #[serde(rename = "last-handshake", default, skip_serializing_if = "Field::is_unset")]
    pub last_handshake: Field<String>,
    /// Optional base64 preshared key.
    #[serde(rename = "preshared-key", default, skip_serializing_if = "Field::is_unset")]
    pub preshared_key: Field<String>,
    /// Keepalive interval as accepted by the device (e.g. `25s`).
    #[serde(
        rename = "persistent-keepalive",
        default,
        skip_serializing_if = "Field::is_unset"
    )]
    pub persistent_keepalive: Field<String>,
    /// Bytes received from the peer.
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub rx: Field<u64>,
    /// Bytes sent to the peer.
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub tx: Field<u64>,
    /// Administrative disable flag.
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub disabled: Field<bool>,
    /// Free-form comment.
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub comment: Field<String>,
}

impl Peer {
    /// A peer bound to `interface`, with everything else unset.
    pub fn on_interface(interface: impl Into<String>) -> Self {
        Self {
            interface: Field::Set(interface.into()),
            ..Self::default()
        }
    }
}

impl Resource for Peer {
    const KIND: &'static str = "peer";
    const COLLECTION: &'static str = "interface/wireguard/peer";
    const READ_ONLY: &'static [&'static str] = &[
        "current-endpoint-address",
        "current-endpoint-port",
        "last-handshake",
        "rx",
        "tx",
    ];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// An IP address binding. The device lists these system-wide; only the ones
/// bound to a Wireguard interface are of interest here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpAddress {
    /// Device-assigned identifier.
    #[serde(rename = ".id", default, skip_serializing_if = "Field::is_unset")]
    pub id: Field<String>,
    /// Address in CIDR notation.
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub address: Field<String>,
    /// Name of the interface the address is bound to.
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub interface: Field<String>,
    /// Network address.
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub network: Field<String>,
    /// Administrative disable flag.
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub disabled: Field<bool>,
    /// Free-form comment.
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub comment: Field<String>,
}

impl IpAddress {
    /// An address binding of `address` (CIDR) to `interface`.
    pub fn new(address: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            address: Field::Set(address.into()),
            interface: Field::Set(interface.into()),
            ..Self::default()
        }
    }
}

impl Resource for IpAddress {
    const KIND: &'static str = "address";
    const COLLECTION: &'static str = "ip/address";
    const READ_ONLY: &'static [&'static str] = &[];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// A Wireguard key pair produced by the device's generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    /// Base64 public key.
    #[serde(rename = "public-key")]
    pub public_key: String,
    /// Base64 private key.
    #[serde(rename = "private-key")]
    pub private_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE_INTERFACE: &str = r#"{
        ".id": "*5",
        "disabled": "false",
        "listen-port": "51820",
        "mtu": "1420",
        "name": "wg0",
        "private-key": "cHJpdmF0ZQ==",
        "public-key": "cHVibGlj",
        "running": "true"
    }"#;

    #[test]
    fn decodes_device_interface() {
        let iface: Interface = serde_json::from_str(DEVICE_INTERFACE).unwrap();
        assert_eq!(iface.id(), Some("*5"));
        assert_eq!(iface.name.as_deref(), Some("wg0"));
        assert_eq!(iface.listen_port, Field::Set(51820));
        assert_eq!(iface.mtu, Field::Set(1420));
        assert_eq!(iface.running, Field::Set(true));
        assert_eq!(iface.disabled, Field::Set(false));
        assert!(iface.comment.is_unset());
    }

    #[test]
    fn decodes_device_peer_ignoring_unknown_attributes() {
        let json = r#"{
            ".id": "*1",
            "allowed-address": "10.0.0.2/32",
            "current-endpoint-address": "",
            "current-endpoint-port": "0",
            "disabled": "false",
            "dynamic": "false",
            "interface": "wg0",
            "public-key": "cGVlcg==",
            "rx": "1024",
            "tx": "2048"
        }"#;
        let peer: Peer = serde_json::from_str(json).unwrap();
        assert_eq!(peer.interface.as_deref(), Some("wg0"));
        assert_eq!(peer.current_endpoint_port, Field::Set(0));
        assert_eq!(peer.rx, Field::Set(1024));
        assert!(peer.last_handshake.is_unset());
    }

    #[test]
    fn interface_payload_keeps_only_writable_set_fields() {
        let iface = Interface {
            listen_port: Field::Set(51820),
            disabled: Field::Set(false),
            ..Interface::new("wg0")
        };
        let payload: serde_json::Value =
            serde_json::from_str(&iface.to_payload().unwrap()).unwrap();
        assert_eq!(
            payload,
            serde_json::json!({
                "name": "wg0",
                "listen-port": "51820",
                "disabled": "false"
            })
        );
    }

    #[test]
    fn payload_strips_id_and_device_reported_fields() {
        let iface: Interface = serde_json::from_str(DEVICE_INTERFACE).unwrap();
        let payload: serde_json::Value =
            serde_json::from_str(&iface.to_payload().unwrap()).unwrap();
        let map = payload.as_object().unwrap();
        assert!(!map.contains_key(".id"));
        assert!(!map.contains_key("running"));
        assert!(!map.contains_key("public-key"));
        assert_eq!(map["private-key"], "cHJpdmF0ZQ==");
    }

    #[test]
    fn peer_payload_omits_counters() {
        let peer = Peer {
            public_key: Field::Set("cGVlcg==".into()),
            rx: Field::Set(10),
            comment: Field::Set(String::new()),
            ..Peer::on_interface("wg0")
        };
        let payload = peer.to_payload().unwrap();
        assert!(!payload.contains("\"rx\""));
        assert!(payload.contains(r#""comment":"""#));
    }

    #[test]
    fn address_constructor() {
        let addr = IpAddress::new("10.0.0.1/24", "wg0");
        assert_eq!(addr.address.as_deref(), Some("10.0.0.1/24"));
        assert_eq!(addr.interface.as_deref(), Some("wg0"));
        assert!(addr.id().is_none());
    }
}

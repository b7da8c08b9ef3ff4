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

//! Key pairs from the router's own generator.
//!
//! RouterOS has no key generation endpoint, but it fills in a fresh key pair
//! for every Wireguard interface created without one. A pair is obtained by
//! creating a throwaway interface under a reserved name, reading its keys back
//! and deleting it again.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rosguard_types::{Interface, KeyPair};
use tracing::{debug, info, warn};
use uuid::Uuid;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::client::RouterClient;
use crate::error::{OrchestratorError, Result};
use crate::orchestrator::WireguardServer;
use crate::state::StateCache;

/// Prefix of throwaway interface names. Callers cannot create interfaces with it.
pub const KEYGEN_PREFIX: &str = "rosguard-keygen-";

pub fn is_reserved_name(name: &str) -> bool {
    name.starts_with(KEYGEN_PREFIX)
}

/// A fresh reserved name, e.g. `rosguard-keygen-3f2a9c01b7de`.
pub fn reserved_name() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{KEYGEN_PREFIX}{}", &suffix[..12])
}

pub fn decode_key(b64: &str) -> Result<[u8; 32]> {
    let bytes = BASE64.decode(b64)?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| OrchestratorError::InvalidKeyLength(len))
}

/// Check that both halves are 32-byte base64 keys and that the public half
/// belongs to the private half.
pub fn validate_key_pair(pair: &KeyPair) -> Result<()> {
    if pair.public_key.is_empty() || pair.private_key.is_empty() {
        return Err(OrchestratorError::KeyGeneration(
            "router returned an empty key".into(),
        ));
    }
    let private = StaticSecret::from(decode_key(&pair.private_key)?);
    let public = decode_key(&pair.public_key)?;
    if PublicKey::from(&private).as_bytes() != &public {
        return Err(OrchestratorError::KeyGeneration(
            "public key does not match private key".into(),
        ));
    }
    Ok(())
}

impl<C: RouterClient> WireguardServer<C> {
    /// Obtain a key pair from the router. Holds the cache lock throughout, so
    /// no other operation on this instance runs in between. The throwaway
    /// interface is deleted even when reading its keys fails.
    #[tracing::instrument(skip_all)]
    pub async fn generate_keys(&self) -> Result<KeyPair> {
        let mut state = self.lock_state().await;
        self.generate_keys_locked(&mut state).await
    }

    pub(crate) async fn generate_keys_locked(&self, state: &mut StateCache) -> Result<KeyPair> {
        self.generate_keys_as(state, &reserved_name()).await
    }

    async fn generate_keys_as(&self, state: &mut StateCache, name: &str) -> Result<KeyPair> {
        debug!(name, "creating throwaway interface for key generation");

        // An existing interface under this name is not ours to delete.
        let extracted = match self.create_interface_locked(state, &Interface::new(name)).await {
            Ok(outcome) if !outcome.is_applied() => {
                return Err(OrchestratorError::KeyGeneration(format!(
                    "interface {name} already exists"
                )));
            }
            Ok(_) => self.read_keys(state, name).await,
            Err(e) => Err(e),
        };
        let discarded = self.discard_throwaway(state, name).await;

        match (extracted, discarded) {
            (Ok(pair), Ok(())) => {
                info!(public_key = %pair.public_key, "generated key pair");
                Ok(pair)
            }
            (Ok(_), Err(e)) => {
                warn!(name, error = %e, "generated keys but failed to remove throwaway interface");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(cleanup)) => {
                warn!(name, error = %cleanup, "failed to remove throwaway interface");
                Err(e)
            }
        }
    }

    async fn read_keys(&self, state: &mut StateCache, name: &str) -> Result<KeyPair> {
        self.refresh_interfaces_locked(state).await?;

        let iface = state.interface_by_name(name).ok_or_else(|| {
            OrchestratorError::KeyGeneration(format!("interface {name} missing after create"))
        })?;
        let pair = KeyPair {
            public_key: iface.public_key.get().cloned().unwrap_or_default(),
            private_key: iface.private_key.get().cloned().unwrap_or_default(),
        };
        validate_key_pair(&pair)?;
        Ok(pair)
    }

    async fn discard_throwaway(&self, state: &mut StateCache, name: &str) -> Result<()> {
        match self.delete_record::<Interface>(name).await {
            Ok(()) => debug!(name = %name, "removed throwaway interface"),
            Err(e) if e.is_not_found() => debug!(name = %name, "throwaway interface was never created"),
            Err(e) => return Err(e),
        }
        self.refresh_interfaces_locked(state).await
    }

    /// Delete reserved-name interfaces left behind by an interrupted key
    /// generation. Returns how many were removed.
    #[tracing::instrument(skip_all)]
    pub async fn sweep_keygen_leftovers(&self) -> Result<usize> {
        let mut state = self.lock_state().await;
        self.refresh_interfaces_locked(&mut state).await?;

        let leftovers: Vec<String> = state
            .interfaces()
            .iter()
            .filter_map(|iface| iface.name.as_deref())
            .filter(|name| is_reserved_name(name))
            .map(str::to_string)
            .collect();

        if leftovers.is_empty() {
            debug!("no leftover key generation interfaces");
            return Ok(0);
        }

        for name in &leftovers {
            warn!(name = %name, "removing leftover key generation interface");
            self.delete_record::<Interface>(name).await?;
        }
        self.refresh_interfaces_locked(&mut state).await?;
        Ok(leftovers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use test_case::test_case;

    fn pair_from_seed(seed: u8) -> KeyPair {
        let secret = StaticSecret::from([seed; 32]);
        let public = PublicKey::from(&secret);
        KeyPair {
            public_key: BASE64.encode(public.as_bytes()),
            private_key: BASE64.encode(secret.to_bytes()),
        }
    }

    /// Router that answers every read with an empty list and records calls.
    #[derive(Default)]
    struct Recorder {
        calls: std::sync::Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, method: &str, path: &str) {
            self.calls.lock().unwrap().push(format!("{method} {path}"));
        }
    }

    impl RouterClient for Recorder {
        async fn get(&self, path: &str) -> std::result::Result<String, ClientError> {
            self.push("GET", path);
            Ok("[]".into())
        }

        async fn put(&self, path: &str, _body: String) -> std::result::Result<(), ClientError> {
            self.push("PUT", path);
            Ok(())
        }

        async fn patch(&self, path: &str, _body: String) -> std::result::Result<(), ClientError> {
            self.push("PATCH", path);
            Ok(())
        }

        async fn delete(&self, path: &str) -> std::result::Result<(), ClientError> {
            self.push("DELETE", path);
            Ok(())
        }
    }

    #[tokio::test]
    async fn existing_interface_under_reserved_name_is_left_alone() {
        let name = format!("{KEYGEN_PREFIX}0123456789ab");
        let server = WireguardServer::new(Recorder::default());
        let mut state = server.lock_state().await;
        state.replace_interfaces(vec![Interface::new(name.as_str())]);

        let err = server.generate_keys_as(&mut state, &name).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::KeyGeneration(_)));
        assert!(server.client().calls.lock().unwrap().is_empty());
        assert!(state.interface_by_name(&name).is_some());
    }

    #[test]
    fn reserved_names_are_unique_and_recognised() {
        let a = reserved_name();
        let b = reserved_name();
        assert_ne!(a, b);
        assert!(is_reserved_name(&a));
        assert_eq!(a.len(), KEYGEN_PREFIX.len() + 12);
    }

    #[test_case("wg0", false)]
    #[test_case("keyGen", false)]
    #[test_case("rosguard-keygen-abc", true)]
    fn reserved_prefix(name: &str, reserved: bool) {
        assert_eq!(is_reserved_name(name), reserved);
    }

    #[test]
    fn matching_pair_is_valid() {
        assert!(validate_key_pair(&pair_from_seed(7)).is_ok());
    }

    #[test]
    fn mismatched_pair_is_rejected() {
        let mut pair = pair_from_seed(7);
        pair.public_key = pair_from_seed(8).public_key;
        assert!(matches!(
            validate_key_pair(&pair),
            Err(OrchestratorError::KeyGeneration(_))
        ));
    }

    #[test]
    fn empty_and_short_keys_are_rejected() {
        let empty = KeyPair {
            public_key: String::new(),
            private_key: String::new(),
        };
        assert!(validate_key_pair(&empty).is_err());

        let short = KeyPair {
            public_key: BASE64.encode([1u8; 16]),
            private_key: BASE64.encode([1u8; 16]),
        };
        assert!(matches!(
            validate_key_pair(&short),
            Err(OrchestratorError::InvalidKeyLength(16))
        ));
    }
}

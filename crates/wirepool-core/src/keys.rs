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

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::rngs::OsRng;
use wirepool_types::Keypair;
use x25519_dalek::{PublicKey, StaticSecret};

/// Source of fresh WireGuard keypairs.
pub trait KeyGenerator: Send + Sync {
    fn generate(&self) -> Keypair;
}

/// Curve25519 keys from the OS random source.
#[derive(Debug, Clone, Copy, Default)]
pub struct X25519Keys;

impl KeyGenerator for X25519Keys {
    fn generate(&self) -> Keypair {
        let secret = StaticSecret::random_from_rng(&mut OsRng);
        let public = PublicKey::from(&secret);
        Keypair {
            public_key: BASE64.encode(public.as_bytes()),
            private_key: BASE64.encode(secret.to_bytes()),
        }
    }
}

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

//! Request and response bodies for the client endpoints.

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

/// Body of both `POST /api/client` and `DELETE /api/client`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRequest {
    /// Instance the client belongs to.
    pub instance_name: String,
    /// Opaque caller-supplied client identity.
    pub client_id: String,
}

/// A freshly allocated client and its wg-quick profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocateClientResponse {
    /// Instance the slot was taken from.
    pub instance_name: String,
    /// Identity now bound to the slot.
    pub client_id: String,
    /// The slot's address.
    pub address: Ipv4Network,
    /// Public key of the slot.
    pub public_key: String,
    /// Complete client configuration, ready to be imported or QR encoded.
    pub profile: String,
}

/// Outcome of a revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeClientResponse {
    /// Address returned to the pool, absent when the identity held nothing.
    pub released: Option<Ipv4Network>,
}

// Copyright 2026 sshjob contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! SSH engine: credentials, key material, and the connection lifecycle.

pub mod connection;
pub mod credentials;
pub mod keys;

pub use connection::{
    AuthenticationError, Connection, ConnectionConfig, ConnectionError, DEFAULT_PORT,
};
pub use credentials::{AuthKind, Credential, CredentialError, SecretBundle, resolve};
pub use keys::{KeyMaterial, KeyParseError};

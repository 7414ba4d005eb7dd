// Copyright 2024 Touch Proxy Team
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

//! Error types for Touch Proxy

/// Result type alias for Touch Proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Main error type for Touch Proxy
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    #[error("Invalid text range: {0}")]
    InvalidRange(String),

    #[error("Unknown capability: {0}")]
    UnknownCapability(String),
}

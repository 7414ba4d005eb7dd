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

//! # Touch Proxy Core
//!
//! Shared types and text helpers used by the protocol, platform and server
//! crates.

pub mod error;
pub mod types;
pub mod utils;

pub use error::*;
pub use types::*;
pub use utils::*;

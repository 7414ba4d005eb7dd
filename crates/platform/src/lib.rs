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

//! # Touch Proxy Platform
//!
//! Everything that sits between native input callbacks and the event
//! channel: collaborator interfaces implemented by platform adapters, the
//! pointer identity mapper, and the text composition engine.

pub mod composition;
pub mod input;
pub mod pointer;

pub use composition::{
    reconcile, CompositionEngine, DeleteSurrounding, FocusState, PendingEditBatch, PreeditUpdate,
    NO_CURSOR,
};
pub use input::*;
pub use pointer::{PointerIdAllocator, PointerMapper};

/// Platform result type
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Platform-specific errors
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("Keyboard visibility error: {0}")]
    Keyboard(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

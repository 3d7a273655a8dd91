//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//


//! Cancellation tokens for in-flight invocations.

use super::{CancelHandler, HandlerError, InvocationId};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

/// A [`CancelHandler`] that trips a token per invocation.
///
/// The server facade tracks a token when an invocation is registered and
/// releases it when the invocation completes. Handlers observe the token
/// through [`Responder::cancellation`](super::Responder::cancellation).
/// Cancelling never stops a handler by force.
///
/// # Examples
///
/// ```rust
/// use airpc::invocation::{CancellationRegistry, InvocationId};
///
/// let registry = CancellationRegistry::new();
/// let id = InvocationId::new();
/// let token = registry.track(id);
///
/// assert!(registry.cancel_invocation(id));
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    tokens: DashMap<InvocationId, CancellationToken>,
}

impl CancellationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the token for an invocation, creating it if needed.
    pub fn track(&self, invocation_id: InvocationId) -> CancellationToken {
        self.tokens.entry(invocation_id).or_default().clone()
    }

    /// Returns the token for an invocation, if it is tracked.
    #[must_use]
    pub fn token(&self, invocation_id: InvocationId) -> Option<CancellationToken> {
        self.tokens.get(&invocation_id).map(|t| t.clone())
    }

    /// Trips the token for an invocation. Returns `false` if it is not
    /// tracked.
    pub fn cancel_invocation(&self, invocation_id: InvocationId) -> bool {
        match self.tokens.get(&invocation_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Stops tracking an invocation.
    pub fn release(&self, invocation_id: InvocationId) {
        self.tokens.remove(&invocation_id);
    }

    /// Returns the number of tracked invocations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl CancelHandler for CancellationRegistry {
    fn cancel(&self, invocation_id: InvocationId) -> Result<(), HandlerError> {
        if self.cancel_invocation(invocation_id) {
            tracing::debug!(invocation_id = %invocation_id, "Invocation cancelled");
        } else {
            tracing::debug!(
                invocation_id = %invocation_id,
                "Cancel for untracked invocation ignored"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_is_idempotent() {
        let registry = CancellationRegistry::new();
        let id = InvocationId::new();
        let first = registry.track(id);
        let second = registry.track(id);

        registry.cancel(id).unwrap();
        assert!(first.is_cancelled());
        assert!(second.is_cancelled());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_untracked_cancel_is_noop() {
        let registry = CancellationRegistry::new();
        assert!(!registry.cancel_invocation(InvocationId::new()));
        assert!(registry.cancel(InvocationId::new()).is_ok());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_release() {
        let registry = CancellationRegistry::new();
        let id = InvocationId::new();
        let token = registry.track(id);
        registry.release(id);

        assert!(registry.token(id).is_none());
        assert!(!registry.cancel_invocation(id));
        assert!(!token.is_cancelled());
    }
}

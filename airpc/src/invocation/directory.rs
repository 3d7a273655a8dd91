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


//! Client-side lookup of the server hosting a method.

use super::{InvocationError, ReplyRoute};
use crate::transport::Broker;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

/// Method name to the route of the server that hosts it.
///
/// A client may talk to several servers; each method resolves to exactly
/// one of them.
#[derive(Default)]
pub struct MethodDirectory {
    routes: DashMap<String, ReplyRoute>,
}

impl MethodDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes a method to a server, returning the route it replaces.
    pub fn register(&self, method: impl Into<String>, route: ReplyRoute) -> Option<ReplyRoute> {
        let method = method.into();
        tracing::debug!(method = %method, broker_id = route.id(), "Method routed");
        self.routes.insert(method, route)
    }

    /// Routes every method in `methods` to the same server.
    pub fn register_all<I, S>(&self, methods: I, route: ReplyRoute)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for method in methods {
            self.register(method, Arc::clone(&route));
        }
    }

    /// Returns the route for a method.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::MethodNotFound`] if the method is not
    /// routed.
    pub fn resolve(&self, method: &str) -> Result<ReplyRoute, InvocationError> {
        self.routes
            .get(method)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| InvocationError::MethodNotFound {
                method: method.to_string(),
            })
    }

    /// Removes a method. Returns `false` if it was not routed.
    pub fn unregister(&self, method: &str) -> bool {
        self.routes.remove(method).is_some()
    }

    /// Returns the routed method names, sorted.
    #[must_use]
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<_> = self.routes.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl fmt::Debug for MethodDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let routes: Vec<_> = self
            .routes
            .iter()
            .map(|e| (e.key().clone(), e.value().id().to_string()))
            .collect();
        f.debug_struct("MethodDirectory")
            .field("routes", &routes)
            .finish()
    }
}

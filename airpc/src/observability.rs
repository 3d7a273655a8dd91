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

//! Error reporting and metrics.
//!
//! Errors that have no caller to return to (a failed POST with no failure
//! callback, a poll that could not be decoded, a message for an unknown
//! invocation) are reported to an [`ErrorObserver`], the process's global
//! error sink. Reporting logs the error through `tracing` and then runs
//! every registered callback.
//!
//! # Examples
//!
//! ```rust
//! use airpc::observability::{ErrorMetrics, ErrorObserver};
//! use airpc::transport::TransportError;
//! use airpc::AirpcError;
//! use std::sync::Arc;
//!
//! let metrics = Arc::new(ErrorMetrics::new());
//! let observer = ErrorObserver::new();
//! let sink = metrics.clone();
//! observer.on_error(move |error| sink.record_error(error));
//!
//! observer.report(&AirpcError::Transport(TransportError::Closed {
//!     broker_id: "b1".to_string(),
//! }));
//! assert_eq!(metrics.transport_errors(), 1);
//! ```

mod metrics;

pub use metrics::BrokerMetrics;

use crate::AirpcError;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counts errors by layer.
///
/// Register it on an [`ErrorObserver`] to count everything reported to the
/// global error sink.
#[derive(Debug, Default)]
pub struct ErrorMetrics {
    /// Total number of transport errors
    transport_errors: AtomicU64,
    /// Total number of configuration errors
    configuration_errors: AtomicU64,
    /// Total number of protocol errors
    protocol_errors: AtomicU64,
    /// Total number of other invocation errors
    invocation_errors: AtomicU64,
    /// Total number of application errors
    application_errors: AtomicU64,
}

impl ErrorMetrics {
    /// Creates a new error metrics tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error and updates the relevant counter.
    pub fn record_error(&self, error: &AirpcError) {
        let counter = match error {
            AirpcError::Transport(_) => &self.transport_errors,
            AirpcError::Invocation(e) if e.is_configuration_error() => &self.configuration_errors,
            AirpcError::Invocation(e) if e.is_protocol_error() => &self.protocol_errors,
            AirpcError::Invocation(_) => &self.invocation_errors,
            AirpcError::Application(_) => &self.application_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of transport errors recorded.
    #[must_use]
    pub fn transport_errors(&self) -> u64 {
        self.transport_errors.load(Ordering::Relaxed)
    }

    /// Returns the number of configuration errors recorded.
    #[must_use]
    pub fn configuration_errors(&self) -> u64 {
        self.configuration_errors.load(Ordering::Relaxed)
    }

    /// Returns the number of protocol errors recorded.
    #[must_use]
    pub fn protocol_errors(&self) -> u64 {
        self.protocol_errors.load(Ordering::Relaxed)
    }

    /// Returns the number of application errors recorded.
    #[must_use]
    pub fn application_errors(&self) -> u64 {
        self.application_errors.load(Ordering::Relaxed)
    }

    /// Returns the total number of errors recorded.
    #[must_use]
    pub fn total_errors(&self) -> u64 {
        self.transport_errors()
            + self.configuration_errors()
            + self.protocol_errors()
            + self.invocation_errors.load(Ordering::Relaxed)
            + self.application_errors()
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        self.transport_errors.store(0, Ordering::Relaxed);
        self.configuration_errors.store(0, Ordering::Relaxed);
        self.protocol_errors.store(0, Ordering::Relaxed);
        self.invocation_errors.store(0, Ordering::Relaxed);
        self.application_errors.store(0, Ordering::Relaxed);
    }
}

/// Callback type for error notifications.
pub type ErrorCallback = Box<dyn Fn(&AirpcError) + Send + Sync>;

/// The global error sink.
///
/// Cloning an observer shares its callbacks, so one observer can be handed
/// to every broker and endpoint in a process. Callbacks run synchronously on
/// the reporting task and must not block.
///
/// # Examples
///
/// ```rust
/// use airpc::observability::ErrorObserver;
/// use airpc::invocation::InvocationError;
/// use airpc::AirpcError;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// let observer = ErrorObserver::new();
/// let counter = Arc::new(AtomicU64::new(0));
/// let counter_clone = counter.clone();
///
/// observer.on_error(move |_error| {
///     counter_clone.fetch_add(1, Ordering::Relaxed);
/// });
///
/// let error = AirpcError::Invocation(InvocationError::NoResponseHandler);
/// observer.notify(&error);
///
/// assert_eq!(counter.load(Ordering::Relaxed), 1);
/// ```
#[derive(Clone)]
pub struct ErrorObserver {
    callbacks: Arc<RwLock<Vec<Arc<ErrorCallback>>>>,
}

impl ErrorObserver {
    /// Creates a new error observer with no callbacks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            callbacks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Registers a callback to be invoked when errors are reported.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&AirpcError) + Send + Sync + 'static,
    {
        self.callbacks.write().push(Arc::new(Box::new(callback)));
    }

    /// Runs every registered callback without logging.
    pub fn notify(&self, error: &AirpcError) {
        // Snapshot so a callback may register further callbacks.
        let callbacks: Vec<_> = self.callbacks.read().iter().cloned().collect();
        for callback in callbacks {
            callback(error);
        }
    }

    /// Logs an error and notifies every registered callback.
    pub fn report(&self, error: &AirpcError) {
        log_error(error);
        self.notify(error);
    }

    /// Returns the number of registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Clears all registered callbacks.
    pub fn clear(&self) {
        self.callbacks.write().clear();
    }
}

impl Default for ErrorObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ErrorObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorObserver")
            .field("callback_count", &self.callback_count())
            .finish()
    }
}

/// Logs an error with structured context.
///
/// The level depends on the layer:
///
/// - Transport errors: ERROR
/// - Configuration errors: ERROR
/// - Protocol and other invocation errors: WARN
/// - Application errors: INFO (the framework doesn't control these)
pub fn log_error(error: &AirpcError) {
    match error {
        AirpcError::Transport(e) => {
            tracing::error!(
                error = %e,
                recoverable = error.is_recoverable(),
                "Transport error occurred"
            );
        }
        AirpcError::Invocation(e) if e.is_configuration_error() => {
            tracing::error!(error = %e, "Configuration error occurred");
        }
        AirpcError::Invocation(e) => {
            tracing::warn!(
                error = %e,
                invocation_id = ?e.invocation_id(),
                protocol = e.is_protocol_error(),
                "Invocation error occurred"
            );
        }
        AirpcError::Application(e) => {
            tracing::info!(error = %e, "Application error occurred");
        }
    }
}

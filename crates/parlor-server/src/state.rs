//! Shared application state handed to every handler.

use std::sync::Arc;
use std::time::Instant;

use parlor_messaging::{DispatchGateway, SessionSupervisor};
use parlor_store::Stores;

use crate::notifications::NotificationService;

/// State accessible from axum handlers.
///
/// Constructed once at startup and injected; handlers never construct or
/// look up shared objects themselves.
#[derive(Clone)]
pub struct AppState {
    /// The session supervisor.
    pub supervisor: Arc<SessionSupervisor>,
    /// The outbound dispatch gateway.
    pub gateway: Arc<DispatchGateway>,
    /// The record stores.
    pub stores: Arc<Stores>,
    /// Bulk send / report / reminder service.
    pub notifier: Arc<NotificationService>,
    /// Process start, for the health endpoint.
    pub start_time: Instant,
}

impl AppState {
    /// Bundle the application-lifetime objects.
    #[must_use]
    pub fn new(
        supervisor: Arc<SessionSupervisor>,
        gateway: Arc<DispatchGateway>,
        stores: Arc<Stores>,
        notifier: Arc<NotificationService>,
    ) -> Self {
        Self {
            supervisor,
            gateway,
            stores,
            notifier,
            start_time: Instant::now(),
        }
    }
}

use super::bookings::BookingOrchestrator;
use super::payments::PaymentReconciler;
use super::sessions::SessionRotator;
use super::slots::SlotPlanner;
use crate::config::Config;
use crate::domain::clock::Clock;
use crate::domain::payment::GatewaySigner;
use crate::domain::ports::{Backend, PaymentGateway};
use crate::domain::session::TokenKeys;
use crate::error::Result;
use std::sync::Arc;

/// The engine's four services, all backed by one storage adapter.
///
/// There is no shared mutable state in here; every coordination point lives
/// in the backend's transactions, so an `Engine` can be shared freely across
/// tasks behind an `Arc`.
pub struct Engine {
    pub slots: SlotPlanner,
    pub bookings: BookingOrchestrator,
    pub payments: PaymentReconciler,
    pub sessions: SessionRotator,
}

impl Engine {
    /// Wires the services from `backend`, which serves every store port.
    pub fn new<B: Backend + 'static>(
        backend: Arc<B>,
        gateway: Arc<dyn PaymentGateway>,
        config: &Config,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let timeout = config.store_timeout;

        let slots = SlotPlanner::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend.clone(),
            timeout,
        );
        let bookings = BookingOrchestrator::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend.clone(),
            clock.clone(),
            timeout,
        );
        let payments = PaymentReconciler::new(
            backend.clone(),
            backend.clone(),
            backend.clone(),
            gateway,
            GatewaySigner::new(config.gateway_secret.as_bytes()),
            config.gateway_name.clone(),
            clock.clone(),
            timeout,
        );
        let sessions = SessionRotator::new(
            backend.clone(),
            backend,
            TokenKeys::new(config.jwt_secret.as_bytes()),
            config.access_ttl,
            config.refresh_ttl,
            clock,
            timeout,
        )?;

        Ok(Self {
            slots,
            bookings,
            payments,
            sessions,
        })
    }
}

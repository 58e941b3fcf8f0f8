//! Shared setup for the service tests: one active mentor `asha` who is
//! available Mondays 10:00-12:00, a 60 minute offering, and one mentee.

use super::Engine;
use crate::config::Config;
use crate::domain::availability::AvailabilityRule;
use crate::domain::booking::{Booking, BookingStatus};
use crate::domain::clock::{Clock, TimeRange, parse_clock, parse_date};
use crate::domain::mentor::{Mentor, MentorService};
use crate::domain::payment::{GatewaySigner, Payment};
use crate::domain::ports::{
    AvailabilityStore, BookingStore, MentorDirectory, PaymentStore, ServiceCatalog, Transactor,
    UserDirectory,
};
use crate::domain::user::{Role, UserAccount};
use crate::infrastructure::gateway::LocalGateway;
use crate::infrastructure::in_memory::InMemoryStore;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::json;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub(crate) struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub(crate) fn set(&self, at: DateTime<Utc>) {
        *self.0.lock().unwrap() = at;
    }

    pub(crate) fn advance(&self, by: TimeDelta) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

pub(crate) struct World {
    pub store: Arc<InMemoryStore>,
    pub gateway: LocalGateway,
    pub clock: Arc<FixedClock>,
    pub config: Config,
    pub engine: Engine,
    pub mentor: Mentor,
    pub service: MentorService,
    pub user: UserAccount,
}

impl World {
    pub const MONDAY: &'static str = "2025-01-06";

    pub async fn new() -> Self {
        Self::with_gateway(LocalGateway::new()).await
    }

    pub async fn with_gateway(gateway: LocalGateway) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock(Mutex::new(Utc::now())));
        let config = Config::new("test-jwt-secret", "test-gateway-secret");
        let engine = Engine::new(
            store.clone(),
            Arc::new(gateway.clone()),
            &config,
            clock.clone(),
        )
        .unwrap();

        let user = UserAccount {
            id: Uuid::new_v4(),
            username: "ravi".to_string(),
            role: Role::User,
            is_active: true,
        };
        store.upsert_user(user.clone()).await.unwrap();

        let mentor = new_mentor("asha");
        store.upsert_mentor(mentor.clone()).await.unwrap();
        let service = MentorService {
            id: Uuid::new_v4(),
            mentor_id: mentor.id,
            title: "Mock interview".to_string(),
            duration_minutes: 60,
            price_cents: 150_000,
            currency: "INR".to_string(),
            is_active: true,
        };
        store.upsert_service(service.clone()).await.unwrap();
        let monday = AvailabilityRule::new(
            mentor.id,
            1,
            parse_clock("10:00").unwrap(),
            parse_clock("12:00").unwrap(),
        )
        .unwrap();
        store.insert_rule(monday).await.unwrap();

        Self {
            store,
            gateway,
            clock,
            config,
            engine,
            mentor,
            service,
            user,
        }
    }

    pub async fn add_mentor(&self, username: &str) -> Mentor {
        let mentor = new_mentor(username);
        self.store.upsert_mentor(mentor.clone()).await.unwrap();
        mentor
    }

    pub async fn upsert_service(&self, service: MentorService) {
        self.store.upsert_service(service).await.unwrap();
    }

    pub async fn upsert_user(&self, user: UserAccount) {
        self.store.upsert_user(user).await.unwrap();
    }

    /// Writes a one hour Monday booking for `asha` directly, in any status.
    pub async fn seed_booking(&self, start: &str, status: BookingStatus) -> Uuid {
        let range = TimeRange::starting_at(parse_clock(start).unwrap(), 60).unwrap();
        let date = parse_date(Self::MONDAY).unwrap();
        let mut booking =
            Booking::pending(Uuid::new_v4(), &self.service, date, range, self.clock.now());
        booking.status = status;

        let mut tx = self.store.begin_serializable().await.unwrap();
        tx.conflicts_locked(self.mentor.id, date, range).await.unwrap();
        tx.insert_booking(booking.clone()).await.unwrap();
        tx.commit().await.unwrap();
        booking.id
    }

    /// Books a Monday slot for the mentee through the orchestrator.
    pub async fn book(&self, start: &str) -> Uuid {
        self.engine
            .bookings
            .create_booking(self.user.id, self.service.id, Self::MONDAY, start)
            .await
            .unwrap()
            .id
    }

    pub async fn store_booking(&self, id: Uuid) -> Booking {
        self.store.get_booking(id).await.unwrap().unwrap()
    }

    pub async fn store_payment(&self, id: Uuid) -> Payment {
        self.store.get_payment(id).await.unwrap().unwrap()
    }

    pub async fn payment_for_booking(&self, booking_id: Uuid) -> Option<Payment> {
        PaymentStore::payment_for_booking(self.store.as_ref(), booking_id)
            .await
            .unwrap()
    }

    fn signer(&self) -> GatewaySigner {
        GatewaySigner::new(self.config.gateway_secret.as_bytes())
    }

    pub fn checkout_signature(&self, order_id: &str, payment_id: &str) -> String {
        self.signer().sign_checkout(order_id, payment_id).unwrap()
    }

    pub fn webhook_signature(&self, body: &[u8]) -> String {
        self.signer().sign_webhook(body).unwrap()
    }

    pub fn webhook_body(event: &str, order_id: &str, payment_id: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "entity": "event",
            "event": event,
            "payload": {"payment": {"entity": {
                "id": payment_id,
                "order_id": order_id,
                "status": if event == "payment.captured" { "captured" } else { "failed" },
                "amount": 150_000
            }}}
        }))
        .unwrap()
    }
}

fn new_mentor(username: &str) -> Mentor {
    Mentor {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        username: username.to_string(),
        timezone: "Asia/Kolkata".to_string(),
        is_active: true,
    }
}

#![allow(dead_code)]

use slotpay::application::Engine;
use slotpay::config::Config;
use slotpay::domain::availability::AvailabilityRule;
use slotpay::domain::clock::{SystemClock, parse_clock};
use slotpay::domain::mentor::{Mentor, MentorService};
use slotpay::domain::payment::GatewaySigner;
use slotpay::domain::ports::{AvailabilityStore, MentorDirectory, ServiceCatalog, UserDirectory};
use slotpay::domain::user::{Role, UserAccount};
use slotpay::infrastructure::gateway::LocalGateway;
use slotpay::infrastructure::in_memory::InMemoryStore;
use std::sync::Arc;
use uuid::Uuid;

pub const MONDAY: &str = "2025-01-06";
pub const SEED_FILE: &str = "tests/fixtures/seed.json";
pub const SEED_MENTOR: &str = "asha";
pub const SEED_SERVICE: &str = "3a7c9e1b-5d2f-4b8a-a6c4-e2f0d8b6a4c2";
pub const SEED_USER: &str = "0c9e5b0a-1d2f-4e3a-8b7c-6d5e4f3a2b1c";
pub const JWT_SECRET: &str = "integration-jwt-secret";
pub const GATEWAY_SECRET: &str = "integration-gateway-secret";

/// An engine over a fresh in-memory store, with mentor `asha` open on
/// Mondays 10:00-12:00 for a 60 minute offering.
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub gateway: LocalGateway,
    pub engine: Arc<Engine>,
    pub signer: GatewaySigner,
    pub mentor: Mentor,
    pub service: MentorService,
}

impl Harness {
    pub async fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let gateway = LocalGateway::new();
        let config = Config::new(JWT_SECRET, GATEWAY_SECRET);
        let engine = Engine::new(
            store.clone(),
            Arc::new(gateway.clone()),
            &config,
            Arc::new(SystemClock),
        )
        .unwrap();

        let mentor = Mentor {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            username: "asha".to_string(),
            timezone: "Asia/Kolkata".to_string(),
            is_active: true,
        };
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
        store
            .insert_rule(
                AvailabilityRule::new(
                    mentor.id,
                    1,
                    parse_clock("10:00").unwrap(),
                    parse_clock("12:00").unwrap(),
                )
                .unwrap(),
            )
            .await
            .unwrap();

        Self {
            store,
            gateway,
            engine: Arc::new(engine),
            signer: GatewaySigner::new(GATEWAY_SECRET.as_bytes()),
            mentor,
            service,
        }
    }

    pub async fn add_user(&self, username: &str) -> UserAccount {
        let user = UserAccount {
            id: Uuid::new_v4(),
            username: username.to_string(),
            role: Role::User,
            is_active: true,
        };
        self.store.upsert_user(user.clone()).await.unwrap();
        user
    }

    pub fn webhook_body(event: &str, order_id: &str, payment_id: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
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

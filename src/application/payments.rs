use super::bounded;
use crate::domain::booking::BookingStatus;
use crate::domain::clock::Clock;
use crate::domain::payment::{
    GatewaySigner, Payment, PaymentIntent, PaymentSettlement, PaymentStatus, Settlement,
};
use crate::domain::ports::{BookingStore, PaymentGateway, PaymentStore, StoreTx, Transactor};
use crate::domain::webhook::{GatewayEvent, PaymentEntity};
use crate::error::{AuthFailure, EngineError, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What a webhook delivery did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Captured(Settlement),
    Failed(Settlement),
    /// Acknowledged without effect; carries the event name.
    Ignored(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    ClientVerify,
    Webhook,
}

/// Ties gateway orders to bookings and settles them exactly once.
///
/// The client verify call and the `payment.captured` webhook race for the
/// same payment. Both lock the payment row, then the booking row, and apply
/// the guarded `created -> paid` / `pending -> confirmed` pair in one
/// transaction. Whichever commits second finds the payment already `paid`
/// and reports [`Settlement::AlreadySettled`] without writing.
pub struct PaymentReconciler {
    bookings: Arc<dyn BookingStore>,
    payments: Arc<dyn PaymentStore>,
    transactor: Arc<dyn Transactor>,
    gateway: Arc<dyn PaymentGateway>,
    signer: GatewaySigner,
    gateway_name: String,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl PaymentReconciler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        payments: Arc<dyn PaymentStore>,
        transactor: Arc<dyn Transactor>,
        gateway: Arc<dyn PaymentGateway>,
        signer: GatewaySigner,
        gateway_name: String,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            bookings,
            payments,
            transactor,
            gateway,
            signer,
            gateway_name,
            clock,
            timeout,
        }
    }

    /// Opens a gateway order for the caller's pending booking.
    ///
    /// Calling it again while the payment is still `created` returns the same
    /// order. The gateway call happens before the local transaction; if the
    /// commit then fails, or a concurrent call won, the gateway order is
    /// orphaned and only logged.
    pub async fn create_payment(&self, booking_id: Uuid, user_id: Uuid) -> Result<PaymentIntent> {
        let booking = bounded(self.timeout, self.bookings.get_booking(booking_id))
            .await?
            .ok_or(EngineError::NotFound("booking"))?;
        if booking.user_id != user_id {
            return Err(EngineError::Auth(AuthFailure::Forbidden));
        }
        if let Some(existing) =
            bounded(self.timeout, self.payments.payment_for_booking(booking_id)).await?
        {
            return reuse_payment(&existing);
        }
        if booking.status != BookingStatus::Pending {
            return Err(EngineError::Conflict(format!(
                "booking is {}, not awaiting payment",
                booking.status
            )));
        }

        let order_id = bounded(
            self.timeout,
            self.gateway
                .create_order(booking.price_cents, &booking.currency, &booking.id.to_string()),
        )
        .await?;

        let mut tx = bounded(self.timeout, self.transactor.begin_serializable()).await?;
        let current = bounded(self.timeout, tx.lock_booking(booking_id))
            .await?
            .ok_or(EngineError::NotFound("booking"))?;
        if let Some(existing) = bounded(self.timeout, tx.payment_for_booking(booking_id)).await? {
            warn!(
                booking_id = %booking_id,
                order_id = %order_id,
                "concurrent payment creation won, gateway order orphaned"
            );
            return reuse_payment(&existing);
        }
        if current.status != BookingStatus::Pending {
            warn!(
                booking_id = %booking_id,
                order_id = %order_id,
                status = %current.status,
                "booking moved on before payment commit, gateway order orphaned"
            );
            return Err(EngineError::Conflict(format!(
                "booking is {}, not awaiting payment",
                current.status
            )));
        }

        let now = self.clock.now();
        let payment = Payment {
            id: Uuid::new_v4(),
            booking_id,
            user_id,
            gateway: self.gateway_name.clone(),
            gateway_order_id: order_id,
            gateway_payment_id: None,
            gateway_signature: None,
            amount: current.price_cents,
            currency: current.currency.clone(),
            status: PaymentStatus::Created,
            created_at: now,
            updated_at: now,
        };
        bounded(self.timeout, tx.insert_payment(payment.clone())).await?;
        if let Err(e) = bounded(self.timeout, tx.commit()).await {
            warn!(
                booking_id = %booking_id,
                order_id = %payment.gateway_order_id,
                error = %e,
                "payment commit failed, gateway order orphaned"
            );
            return Err(e);
        }

        info!(
            payment_id = %payment.id,
            booking_id = %booking_id,
            order_id = %payment.gateway_order_id,
            amount = payment.amount,
            "payment created"
        );
        Ok(PaymentIntent::from(&payment))
    }

    /// Client-driven completion: checks the checkout signature over
    /// `order_id|gateway_payment_id`, then settles.
    pub async fn verify_payment(
        &self,
        payment_id: Uuid,
        gateway_payment_id: &str,
        signature: &str,
    ) -> Result<Settlement> {
        let payment = bounded(self.timeout, self.payments.get_payment(payment_id))
            .await?
            .ok_or(EngineError::NotFound("payment"))?;
        self.signer
            .verify_checkout(&payment.gateway_order_id, gateway_payment_id, signature)
            .inspect_err(|_| warn!(payment_id = %payment_id, "payment signature mismatch"))?;

        self.settle_paid(
            payment_id,
            PaymentSettlement {
                status: PaymentStatus::Paid,
                gateway_payment_id: Some(gateway_payment_id.to_string()),
                gateway_signature: Some(signature.trim().to_string()),
            },
            Signal::ClientVerify,
        )
        .await
    }

    /// Checks the webhook signature over the raw body.
    pub fn verify_webhook_signature(&self, raw_body: &[u8], signature: &str) -> Result<()> {
        self.signer.verify_webhook(raw_body, signature)
    }

    /// Single webhook entry point: verify, decode, dispatch.
    pub async fn handle_webhook(&self, raw_body: &[u8], signature: &str) -> Result<WebhookOutcome> {
        self.verify_webhook_signature(raw_body, signature)
            .inspect_err(|_| warn!("webhook signature mismatch"))?;

        let event = GatewayEvent::from_slice(raw_body)?;
        debug!(event = event.name(), "webhook received");
        match event {
            GatewayEvent::PaymentCaptured(entity) => Ok(WebhookOutcome::Captured(
                self.handle_payment_captured(&entity).await?,
            )),
            GatewayEvent::PaymentFailed(entity) => Ok(WebhookOutcome::Failed(
                self.handle_payment_failed(&entity).await?,
            )),
            GatewayEvent::Unrecognized(name) => {
                info!(event = %name, "webhook event ignored");
                Ok(WebhookOutcome::Ignored(name))
            }
        }
    }

    pub async fn handle_payment_captured(&self, entity: &PaymentEntity) -> Result<Settlement> {
        let payment = self.payment_for_order(&entity.order_id).await?;
        if entity.amount != 0 && entity.amount != payment.amount {
            warn!(
                payment_id = %payment.id,
                expected = payment.amount,
                captured = entity.amount,
                gateway_status = %entity.status,
                "captured amount differs from the order amount"
            );
        }
        if payment.status == PaymentStatus::Paid {
            info!(payment_id = %payment.id, "payment already settled");
            return Ok(Settlement::AlreadySettled);
        }
        self.settle_paid(
            payment.id,
            PaymentSettlement {
                status: PaymentStatus::Paid,
                gateway_payment_id: Some(entity.id.clone()),
                gateway_signature: None,
            },
            Signal::Webhook,
        )
        .await
    }

    pub async fn handle_payment_failed(&self, entity: &PaymentEntity) -> Result<Settlement> {
        let payment = self.payment_for_order(&entity.order_id).await?;
        if payment.status.is_settled() {
            info!(payment_id = %payment.id, status = ?payment.status, "payment already settled");
            return Ok(Settlement::AlreadySettled);
        }

        let mut tx = bounded(self.timeout, self.transactor.begin_serializable()).await?;
        let locked = bounded(self.timeout, tx.lock_payment(payment.id))
            .await?
            .ok_or(EngineError::NotFound("payment"))?;
        if locked.status.is_settled() {
            info!(payment_id = %payment.id, status = ?locked.status, "payment already settled");
            return Ok(Settlement::AlreadySettled);
        }
        lock_booking_row(&mut *tx, self.timeout, locked.booking_id).await?;

        let now = self.clock.now();
        let settlement = PaymentSettlement {
            status: PaymentStatus::Failed,
            gateway_payment_id: Some(entity.id.clone()).filter(|id| !id.is_empty()),
            gateway_signature: None,
        };
        self.apply_settlement(&mut *tx, payment.id, settlement).await?;

        let released = bounded(
            self.timeout,
            tx.set_booking_status_if_current(
                locked.booking_id,
                BookingStatus::Pending,
                BookingStatus::PaymentFailed,
                now,
            ),
        )
        .await?;
        if !released {
            warn!(
                booking_id = %locked.booking_id,
                "booking was not pending when its payment failed"
            );
        }
        bounded(self.timeout, tx.commit()).await?;

        info!(
            payment_id = %payment.id,
            booking_id = %locked.booking_id,
            gateway_status = %entity.status,
            "payment failed, booking released"
        );
        Ok(Settlement::Applied)
    }

    async fn payment_for_order(&self, order_id: &str) -> Result<Payment> {
        bounded(self.timeout, self.payments.find_by_gateway_order_id(order_id))
            .await?
            .ok_or(EngineError::NotFound("payment"))
    }

    async fn apply_settlement(
        &self,
        tx: &mut dyn StoreTx,
        payment_id: Uuid,
        settlement: PaymentSettlement,
    ) -> Result<()> {
        let applied = bounded(
            self.timeout,
            tx.settle_payment_if_current(
                payment_id,
                PaymentStatus::Created,
                settlement,
                self.clock.now(),
            ),
        )
        .await?;
        if applied {
            Ok(())
        } else {
            Err(EngineError::internal(format!(
                "payment {payment_id} changed while locked"
            )))
        }
    }

    async fn settle_paid(
        &self,
        payment_id: Uuid,
        settlement: PaymentSettlement,
        signal: Signal,
    ) -> Result<Settlement> {
        let mut tx = bounded(self.timeout, self.transactor.begin_serializable()).await?;
        let payment = bounded(self.timeout, tx.lock_payment(payment_id))
            .await?
            .ok_or(EngineError::NotFound("payment"))?;

        match (payment.status, signal) {
            (PaymentStatus::Paid, _) => {
                info!(payment_id = %payment_id, ?signal, "payment already settled");
                return Ok(Settlement::AlreadySettled);
            }
            (PaymentStatus::Failed, Signal::ClientVerify) => {
                return Err(EngineError::Conflict("payment already failed".to_string()));
            }
            (PaymentStatus::Failed, Signal::Webhook) => {
                warn!(payment_id = %payment_id, "capture for a failed payment ignored");
                return Ok(Settlement::AlreadySettled);
            }
            (PaymentStatus::Created, _) => {}
        }

        lock_booking_row(&mut *tx, self.timeout, payment.booking_id).await?;
        self.apply_settlement(&mut *tx, payment_id, settlement).await?;
        let confirmed = bounded(
            self.timeout,
            tx.set_booking_status_if_current(
                payment.booking_id,
                BookingStatus::Pending,
                BookingStatus::Confirmed,
                self.clock.now(),
            ),
        )
        .await?;
        if !confirmed {
            warn!(
                payment_id = %payment_id,
                booking_id = %payment.booking_id,
                "booking not pending, payment left unsettled"
            );
            return Err(EngineError::Conflict(
                "booking not in pending state".to_string(),
            ));
        }
        bounded(self.timeout, tx.commit()).await?;

        info!(
            payment_id = %payment_id,
            booking_id = %payment.booking_id,
            ?signal,
            "payment captured, booking confirmed"
        );
        Ok(Settlement::Applied)
    }
}

/// Takes the booking row lock after the payment lock, the order every
/// settling path follows.
async fn lock_booking_row(
    tx: &mut dyn StoreTx,
    timeout: Duration,
    booking_id: Uuid,
) -> Result<()> {
    bounded(timeout, tx.lock_booking(booking_id))
        .await?
        .map(|_| ())
        .ok_or(EngineError::NotFound("booking"))
}

fn reuse_payment(existing: &Payment) -> Result<PaymentIntent> {
    match existing.status {
        PaymentStatus::Created => Ok(PaymentIntent::from(existing)),
        status => Err(EngineError::Conflict(format!(
            "booking already has a {} payment",
            status.as_str()
        ))),
    }
}

//! Payment reconciliation
//!
//! Payment outcomes reach a booking through three channels: the customer's
//! redirect back from the provider, the provider's signed webhook, and the
//! trusted internal update endpoint. None of them writes a status directly;
//! each one normalizes its report into a [`PaymentOutcome`] and hands it to
//! [`BookingManager::apply_payment_outcome`].

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use pedal_core::{
    config::PaymentConfig,
    models::{
        classify_code, to_minor_units, Booking, BookingStatus, MerchantTransactionId,
        OrderRequest, PaymentOutcome, ProviderOutcome,
    },
    traits::{PaymentProvider, SignatureVerifier},
    AppError, AppResult,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::booking_manager::BookingManager;

/// Gateway settings
#[derive(Clone)]
pub struct GatewaySettings {
    /// Prefix of generated merchant transaction ids
    pub merchant_txn_prefix: String,

    /// Where the provider sends the customer after checkout
    pub redirect_url: String,

    /// Where the provider posts its server-to-server notification
    pub webhook_url: String,

    /// Shared secret for webhook signatures
    pub webhook_secret: String,

    /// Frontend base URL; results land on `<base>/payment/result`
    pub frontend_result_url: String,
}

impl GatewaySettings {
    pub fn from_config(config: &PaymentConfig) -> Self {
        Self {
            merchant_txn_prefix: config.merchant_txn_prefix.clone(),
            redirect_url: config.redirect_url.clone(),
            webhook_url: config.webhook_url.clone(),
            webhook_secret: config.webhook_secret.clone(),
            frontend_result_url: config.frontend_result_url.trim_end_matches('/').to_string(),
        }
    }
}

impl fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("merchant_txn_prefix", &self.merchant_txn_prefix)
            .field("redirect_url", &self.redirect_url)
            .field("webhook_url", &self.webhook_url)
            .field("webhook_secret", &"[REDACTED]")
            .field("frontend_result_url", &self.frontend_result_url)
            .finish()
    }
}

/// Result of starting a payment
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitiation {
    pub booking_id: Uuid,
    pub payment_url: String,
    pub provider_order_id: String,
    pub merchant_transaction_id: String,
    pub reference_id: String,
}

/// Outcome shown to the customer after the redirect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStatus {
    Success,
    Failed,
    Pending,
    Error,
}

impl fmt::Display for CallbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackStatus::Success => write!(f, "success"),
            CallbackStatus::Failed => write!(f, "failed"),
            CallbackStatus::Pending => write!(f, "pending"),
            CallbackStatus::Error => write!(f, "error"),
        }
    }
}

/// Result of handling a redirect callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackResult {
    pub status: CallbackStatus,
    pub booking_id: Option<Uuid>,
}

impl CallbackResult {
    fn error(booking_id: Option<Uuid>) -> Self {
        Self {
            status: CallbackStatus::Error,
            booking_id,
        }
    }
}

/// Webhook acknowledgement body
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub acknowledged: bool,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<Uuid>,
}

impl WebhookAck {
    fn ignored(booking_id: Option<Uuid>) -> Self {
        Self {
            acknowledged: true,
            applied: false,
            booking_id,
        }
    }
}

/// Webhook envelope: `{"response": "<base64 JSON>"}`
#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    response: String,
}

/// Decoded webhook event
#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(default)]
    code: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookData {
    merchant_transaction_id: String,
    transaction_id: Option<String>,
    amount: Option<i64>,
}

/// Report from the trusted internal endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalUpdate {
    pub booking_id: Uuid,
    pub success: bool,
    pub transaction_id: Option<String>,
    /// Minor units
    pub amount: Option<i64>,
}

/// Decode and parse a webhook body
fn decode_webhook(raw_body: &[u8]) -> AppResult<WebhookEvent> {
    let envelope: WebhookEnvelope = serde_json::from_slice(raw_body)
        .map_err(|e| AppError::InvalidInput(format!("webhook body: {}", e)))?;
    let decoded = STANDARD
        .decode(envelope.response.trim())
        .map_err(|e| AppError::InvalidInput(format!("webhook response is not base64: {}", e)))?;
    serde_json::from_slice(&decoded)
        .map_err(|e| AppError::InvalidInput(format!("webhook event: {}", e)))
}

/// Payment gateway
pub struct PaymentGateway {
    bookings: Arc<BookingManager>,
    provider: Arc<dyn PaymentProvider>,
    verifier: Arc<dyn SignatureVerifier>,
    settings: GatewaySettings,
}

impl PaymentGateway {
    /// Create a new payment gateway
    pub fn new(
        bookings: Arc<BookingManager>,
        provider: Arc<dyn PaymentProvider>,
        verifier: Arc<dyn SignatureVerifier>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            bookings,
            provider,
            verifier,
            settings,
        }
    }

    /// Start a deposit payment for a booking
    ///
    /// # Errors
    ///
    /// - `AppError::BookingNotFound` for an unknown booking
    /// - `AppError::Conflict` unless the booking is `pending` or `payment_failed`
    /// - `AppError::PaymentProvider` when the order cannot be created
    #[instrument(skip(self))]
    pub async fn initiate_payment(&self, booking_id: Uuid) -> AppResult<PaymentInitiation> {
        let booking = self.bookings.get(booking_id).await?;
        if !matches!(
            booking.status,
            BookingStatus::Pending | BookingStatus::PaymentFailed
        ) {
            return Err(AppError::Conflict(format!(
                "Booking {} cannot take a payment in status {}",
                booking_id, booking.status
            )));
        }

        let txn = MerchantTransactionId::new(
            self.settings.merchant_txn_prefix.as_str(),
            booking_id,
            Utc::now().timestamp_millis(),
        )
        .to_string();

        let booking = self.bookings.assign_payment_reference(booking_id, &txn).await?;
        let reference_id = booking
            .payment_reference_id
            .clone()
            .unwrap_or_else(|| txn.clone());
        let booking = self.bookings.record_payment_initiated(booking_id).await?;

        let order = self
            .provider
            .create_order(&OrderRequest {
                merchant_transaction_id: txn.clone(),
                merchant_user_id: booking.user_id.clone(),
                amount_minor: to_minor_units(booking.deposit_amount),
                redirect_url: self.settings.redirect_url.clone(),
                callback_url: self.settings.webhook_url.clone(),
            })
            .await?;

        info!(merchant_transaction_id = %txn, "Payment initiated");

        Ok(PaymentInitiation {
            booking_id,
            payment_url: order.payment_url,
            provider_order_id: order.provider_order_id,
            merchant_transaction_id: txn,
            reference_id,
        })
    }

    /// Resolve a redirect callback against the provider
    ///
    /// Never fails; problems are reported as [`CallbackStatus::Error`].
    #[instrument(skip(self))]
    pub async fn handle_callback(&self, merchant_transaction_id: &str) -> CallbackResult {
        let txn = match MerchantTransactionId::parse(merchant_transaction_id) {
            Ok(txn) => txn,
            Err(e) => {
                warn!(error = %e, "Callback with malformed transaction id");
                return CallbackResult::error(None);
            }
        };
        let booking_id = Some(txn.booking_id);

        let status = match self.provider.get_status(merchant_transaction_id).await {
            Ok(status) => status,
            Err(e) => {
                error!(error = %e, "Status check failed during callback");
                return CallbackResult::error(booking_id);
            }
        };

        let (outcome, shown) = match status.outcome() {
            ProviderOutcome::Pending => {
                debug!(code = %status.code, "Payment still pending");
                return CallbackResult {
                    status: CallbackStatus::Pending,
                    booking_id,
                };
            }
            ProviderOutcome::Success => (
                PaymentOutcome::succeeded(
                    status
                        .transaction_id
                        .unwrap_or_else(|| merchant_transaction_id.to_string()),
                    status.amount,
                ),
                CallbackStatus::Success,
            ),
            ProviderOutcome::Failure => (
                PaymentOutcome::failed(status.transaction_id),
                CallbackStatus::Failed,
            ),
        };

        match self
            .bookings
            .apply_payment_outcome(txn.booking_id, &outcome)
            .await
        {
            Ok(_) => CallbackResult {
                status: shown,
                booking_id,
            },
            Err(e) => {
                error!(error = %e, "Failed to apply callback outcome");
                CallbackResult::error(booking_id)
            }
        }
    }

    /// Frontend location for a callback result
    pub fn redirect_location(&self, result: &CallbackResult) -> String {
        let booking_id = result.booking_id.map(|id| id.to_string()).unwrap_or_default();
        format!(
            "{}/payment/result?status={}&bookingId={}",
            self.settings.frontend_result_url, result.status, booking_id
        )
    }

    /// Authenticate and apply a provider webhook
    ///
    /// # Errors
    ///
    /// - `AppError::InvalidSignature` when the signature is missing or wrong
    /// - `AppError::InvalidInput` when the body cannot be decoded
    ///
    /// Anything past that is acknowledged, applied or not.
    #[instrument(skip(self, raw_body, signature), fields(len = raw_body.len()))]
    pub async fn handle_webhook(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> AppResult<WebhookAck> {
        let verified = signature
            .map(|sig| self.verifier.verify(raw_body, sig, &self.settings.webhook_secret))
            .unwrap_or(false);
        if !verified {
            warn!(has_signature = signature.is_some(), "Rejected webhook with bad signature");
            return Err(AppError::InvalidSignature);
        }

        let event = decode_webhook(raw_body).map_err(|e| {
            warn!(error = %e, "Rejected undecodable webhook");
            e
        })?;

        let txn = match MerchantTransactionId::parse(&event.data.merchant_transaction_id) {
            Ok(txn) => txn,
            Err(e) => {
                warn!(error = %e, "Webhook for unknown transaction format, not applied");
                return Ok(WebhookAck::ignored(None));
            }
        };

        let outcome = match classify_code(&event.code) {
            ProviderOutcome::Pending => {
                debug!(code = %event.code, "Pending webhook, nothing to apply");
                return Ok(WebhookAck::ignored(Some(txn.booking_id)));
            }
            ProviderOutcome::Success => PaymentOutcome::succeeded(
                event
                    .data
                    .transaction_id
                    .unwrap_or(event.data.merchant_transaction_id),
                event.data.amount,
            ),
            ProviderOutcome::Failure => PaymentOutcome::failed(event.data.transaction_id),
        };

        match self
            .bookings
            .apply_payment_outcome(txn.booking_id, &outcome)
            .await
        {
            Ok(booking) => {
                info!(booking_id = %booking.id, status = %booking.status, "Webhook applied");
                Ok(WebhookAck {
                    acknowledged: true,
                    applied: true,
                    booking_id: Some(booking.id),
                })
            }
            Err(e) => {
                error!(error = %e, booking_id = %txn.booking_id, "Failed to apply webhook");
                Ok(WebhookAck::ignored(Some(txn.booking_id)))
            }
        }
    }

    /// Apply a report from the trusted internal endpoint
    #[instrument(skip(self, update), fields(booking_id = %update.booking_id, success = update.success))]
    pub async fn apply_internal_update(&self, update: InternalUpdate) -> AppResult<Booking> {
        let outcome = match (update.success, update.transaction_id) {
            (true, Some(tx)) if !tx.trim().is_empty() => PaymentOutcome::succeeded(tx, update.amount),
            (true, _) => return Err(AppError::MissingField("transactionId".to_string())),
            (false, tx) => PaymentOutcome::failed(tx),
        };

        self.bookings
            .apply_payment_outcome(update.booking_id, &outcome)
            .await
    }
}

//! Payment provider REST client
//!
//! Speaks the pay-page protocol: requests carry a base64 JSON payload and an
//! `X-VERIFY` checksum of `sha256(payload + endpoint + salt)###saltIndex`.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use pedal_core::{
    config::PaymentConfig,
    models::{OrderRequest, OrderResponse, ProviderStatus},
    traits::PaymentProvider,
    AppError, AppResult,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

const PAY_ENDPOINT: &str = "/pg/v1/pay";
const STATUS_ENDPOINT: &str = "/pg/v1/status";

/// Connection settings for the provider
#[derive(Clone)]
pub struct ProviderSettings {
    pub base_url: String,
    pub merchant_id: String,
    pub salt_key: String,
    pub salt_index: u32,
    pub timeout: Duration,
}

impl ProviderSettings {
    pub fn from_config(config: &PaymentConfig) -> Self {
        Self {
            base_url: config.provider_base_url.trim_end_matches('/').to_string(),
            merchant_id: config.merchant_id.clone(),
            salt_key: config.salt_key.clone(),
            salt_index: config.salt_index,
            timeout: Duration::from_secs(config.provider_timeout_secs),
        }
    }
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("base_url", &self.base_url)
            .field("merchant_id", &self.merchant_id)
            .field("salt_key", &"[REDACTED]")
            .field("salt_index", &self.salt_index)
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PayPayload<'a> {
    merchant_id: &'a str,
    merchant_transaction_id: &'a str,
    merchant_user_id: &'a str,
    amount: i64,
    redirect_url: &'a str,
    redirect_mode: &'static str,
    callback_url: &'a str,
    payment_instrument: PaymentInstrument,
}

#[derive(Debug, Serialize)]
struct PaymentInstrument {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct PayRequestBody {
    request: String,
}

/// Common provider envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayData {
    merchant_transaction_id: Option<String>,
    transaction_id: Option<String>,
    instrument_response: Option<InstrumentResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentResponse {
    redirect_info: Option<RedirectInfo>,
}

#[derive(Debug, Deserialize)]
struct RedirectInfo {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusData {
    amount: Option<i64>,
    transaction_id: Option<String>,
}

/// `sha256(payload + endpoint + salt)###index`
pub fn request_checksum(payload: &str, endpoint: &str, salt_key: &str, salt_index: u32) -> String {
    let digest = Sha256::digest(format!("{payload}{endpoint}{salt_key}").as_bytes());
    format!("{}###{}", hex::encode(digest), salt_index)
}

/// HTTP implementation of [`PaymentProvider`]
pub struct HttpPaymentProvider {
    client: Client,
    settings: ProviderSettings,
}

impl HttpPaymentProvider {
    pub fn new(settings: ProviderSettings) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, settings })
    }

    fn encode_order(&self, request: &OrderRequest) -> AppResult<String> {
        let payload = PayPayload {
            merchant_id: &self.settings.merchant_id,
            merchant_transaction_id: &request.merchant_transaction_id,
            merchant_user_id: &request.merchant_user_id,
            amount: request.amount_minor,
            redirect_url: &request.redirect_url,
            redirect_mode: "POST",
            callback_url: &request.callback_url,
            payment_instrument: PaymentInstrument { kind: "PAY_PAGE" },
        };
        Ok(STANDARD.encode(serde_json::to_vec(&payload)?))
    }

    fn provider_error(context: &str, err: reqwest::Error) -> AppError {
        error!("Payment provider {} failed: {}", context, err);
        AppError::PaymentProvider(format!("{}: {}", context, err))
    }
}

fn order_response(
    envelope: Envelope<PayData>,
    merchant_transaction_id: &str,
) -> AppResult<OrderResponse> {
    if !envelope.success {
        return Err(AppError::PaymentProvider(format!(
            "order rejected with {}: {}",
            envelope.code,
            envelope.message.unwrap_or_default()
        )));
    }

    let data = envelope
        .data
        .ok_or_else(|| AppError::PaymentProvider("order response without data".to_string()))?;

    let payment_url = data
        .instrument_response
        .and_then(|i| i.redirect_info)
        .map(|r| r.url)
        .ok_or_else(|| AppError::PaymentProvider("order response without redirect".to_string()))?;

    Ok(OrderResponse {
        payment_url,
        provider_order_id: data
            .transaction_id
            .or(data.merchant_transaction_id)
            .unwrap_or_else(|| merchant_transaction_id.to_string()),
    })
}

fn provider_status(envelope: Envelope<StatusData>) -> ProviderStatus {
    let (amount, transaction_id) = envelope
        .data
        .map(|d| (d.amount, d.transaction_id))
        .unwrap_or_default();

    ProviderStatus {
        code: envelope.code,
        amount,
        transaction_id,
    }
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    #[instrument(skip(self, request), fields(txn = %request.merchant_transaction_id))]
    async fn create_order(&self, request: &OrderRequest) -> AppResult<OrderResponse> {
        let encoded = self.encode_order(request)?;
        let checksum = request_checksum(
            &encoded,
            PAY_ENDPOINT,
            &self.settings.salt_key,
            self.settings.salt_index,
        );

        let envelope: Envelope<PayData> = self
            .client
            .post(format!("{}{}", self.settings.base_url, PAY_ENDPOINT))
            .header("X-VERIFY", checksum)
            .json(&PayRequestBody { request: encoded })
            .send()
            .await
            .map_err(|e| Self::provider_error("create order", e))?
            .json()
            .await
            .map_err(|e| Self::provider_error("decode order response", e))?;

        let response = order_response(envelope, &request.merchant_transaction_id)?;
        info!(provider_order_id = %response.provider_order_id, "Payment order created");
        Ok(response)
    }

    #[instrument(skip(self))]
    async fn get_status(&self, merchant_transaction_id: &str) -> AppResult<ProviderStatus> {
        let endpoint = format!(
            "{}/{}/{}",
            STATUS_ENDPOINT, self.settings.merchant_id, merchant_transaction_id
        );
        let checksum = request_checksum(
            "",
            &endpoint,
            &self.settings.salt_key,
            self.settings.salt_index,
        );

        let envelope: Envelope<StatusData> = self
            .client
            .get(format!("{}{}", self.settings.base_url, endpoint))
            .header("X-VERIFY", checksum)
            .header("X-MERCHANT-ID", &self.settings.merchant_id)
            .send()
            .await
            .map_err(|e| Self::provider_error("status check", e))?
            .json()
            .await
            .map_err(|e| Self::provider_error("decode status response", e))?;

        let status = provider_status(envelope);
        debug!(code = %status.code, "Provider status");
        Ok(status)
    }
}

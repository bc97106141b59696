//! Payment DTOs

use super::booking::BookingResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment initiation request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    pub booking_id: Uuid,
}

/// Redirect callback parameters, as query string or form body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(rename = "transactionId", alias = "merchantTransactionId")]
    pub transaction_id: Option<String>,
    pub code: Option<String>,
}

/// Result of a trusted status update
#[derive(Debug, Clone, Serialize)]
pub struct PaymentUpdateResponse {
    pub success: bool,
    pub booking: BookingResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_params_accept_both_names() {
        let p: CallbackParams =
            serde_json::from_str(r#"{"transactionId":"PEDAL_x_1","code":"PAYMENT_SUCCESS"}"#)
                .unwrap();
        assert_eq!(p.transaction_id.as_deref(), Some("PEDAL_x_1"));

        let p: CallbackParams =
            serde_json::from_str(r#"{"merchantTransactionId":"PEDAL_y_2"}"#).unwrap();
        assert_eq!(p.transaction_id.as_deref(), Some("PEDAL_y_2"));
    }
}

//! SOAP gateway adapter.
//!
//! Requests go out as a `SOAP-ENV` envelope carrying `amount` and
//! `callback_url`. Responses and callbacks are read by local element name
//! so that any namespace prefix the gateway picks is accepted.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use tracing::info;

use super::client::{GatewayClient, SOAP_CONTENT_TYPE};
use super::json::amount_as_f64;
use super::{
    CircuitState, GatewayError, GatewayName, GatewayRequest, GatewayResponse, PaymentGateway,
    PaymentStatus, Shutdown, CARD_IN_BANK_OUT,
};
use crate::domain::{PaymentMethod, TransactionType};

const SOAP_ENV_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";

#[derive(Serialize)]
#[serde(rename = "SOAP-ENV:Envelope")]
struct SoapEnvelope<'a> {
    #[serde(rename = "@xmlns:SOAP-ENV")]
    namespace: &'static str,
    #[serde(rename = "SOAP-ENV:Body")]
    body: SoapSubmission<'a>,
}

#[derive(Serialize)]
struct SoapSubmission<'a> {
    amount: f64,
    callback_url: &'a str,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct SoapStatusPayload {
    status: String,
    message: String,
    id: String,
}

#[derive(Clone, Copy)]
enum Field {
    Status,
    Message,
    Id,
}

fn encode_envelope(request: &GatewayRequest) -> Result<Vec<u8>, GatewayError> {
    let envelope = SoapEnvelope {
        namespace: SOAP_ENV_NAMESPACE,
        body: SoapSubmission {
            amount: amount_as_f64(&request.amount)?,
            callback_url: &request.callback_url,
        },
    };

    let xml = quick_xml::se::to_string(&envelope).map_err(|e| GatewayError::Encode(e.to_string()))?;
    Ok(xml.into_bytes())
}

/// Pulls `status`, `message` and `id` out of the envelope body.
fn decode_envelope(body: &[u8]) -> Result<SoapStatusPayload, String> {
    let text = std::str::from_utf8(body).map_err(|e| e.to_string())?;
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut payload = SoapStatusPayload::default();
    let mut saw_envelope = false;
    let mut in_body = false;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(start) => {
                field = None;
                match start.local_name().as_ref() {
                    b"Envelope" => saw_envelope = true,
                    b"Body" if saw_envelope => in_body = true,
                    b"status" if in_body => field = Some(Field::Status),
                    b"message" if in_body => field = Some(Field::Message),
                    b"id" if in_body => field = Some(Field::Id),
                    _ => {}
                }
            }
            Event::Text(text) => {
                if let Some(field) = field {
                    let value = text.unescape().map_err(|e| e.to_string())?.into_owned();
                    match field {
                        Field::Status => payload.status = value,
                        Field::Message => payload.message = value,
                        Field::Id => payload.id = value,
                    }
                }
            }
            Event::End(end) => {
                if end.local_name().as_ref() == b"Body" {
                    in_body = false;
                }
                field = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_envelope {
        return Err("missing SOAP envelope".to_string());
    }

    Ok(payload)
}

/// Gateway speaking SOAP over `POST /deposit` and `POST /withdraw`.
pub struct SoapGateway {
    client: GatewayClient,
}

impl SoapGateway {
    pub fn new(client: GatewayClient) -> Self {
        Self { client }
    }

    fn path(kind: TransactionType) -> &'static str {
        match kind {
            TransactionType::Deposit => "/deposit",
            TransactionType::Withdrawal => "/withdraw",
        }
    }
}

#[async_trait]
impl PaymentGateway for SoapGateway {
    fn name(&self) -> &GatewayName {
        self.client.name()
    }

    async fn submit(
        &self,
        kind: TransactionType,
        request: &GatewayRequest,
        shutdown: &Shutdown,
    ) -> Result<GatewayResponse, GatewayError> {
        let body = encode_envelope(request)?;

        let response = self
            .client
            .post(Self::path(kind), body, SOAP_CONTENT_TYPE, shutdown)
            .await?;

        let payload = decode_envelope(&response).map_err(GatewayError::InvalidResponse)?;
        if payload.id.is_empty() {
            return Err(GatewayError::InvalidResponse(
                "envelope carries no reference id".to_string(),
            ));
        }

        info!(
            gateway = %self.name(),
            transaction_id = %request.transaction_id,
            reference_id = %payload.id,
            status = %payload.status,
            message = %payload.message,
            "gateway accepted submission"
        );

        Ok(GatewayResponse {
            reference_id: payload.id,
            status: PaymentStatus::from_wire(&payload.status),
        })
    }

    fn verify_callback(
        &self,
        expected_reference: &str,
        body: &[u8],
    ) -> Result<GatewayResponse, GatewayError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(GatewayError::InvalidCallback("empty payload".to_string()));
        }

        let payload = decode_envelope(body)
            .map_err(|e| GatewayError::InvalidCallback(format!("malformed payload: {}", e)))?;

        if payload.status.is_empty() {
            return Err(GatewayError::InvalidCallback("missing status".to_string()));
        }

        if payload.id != expected_reference {
            return Err(GatewayError::InvalidCallback(format!(
                "reference id mismatch: expected {}, got {}",
                expected_reference, payload.id
            )));
        }

        Ok(GatewayResponse {
            reference_id: payload.id,
            status: PaymentStatus::from_wire(&payload.status),
        })
    }

    fn supports_method(&self, transaction_type: TransactionType, method: PaymentMethod) -> bool {
        CARD_IN_BANK_OUT.contains(&(transaction_type, method))
    }

    fn circuit_state(&self) -> CircuitState {
        self.client.circuit_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewaySettings;
    use crate::domain::PaymentMethodDetails;
    use bigdecimal::BigDecimal;
    use serde_json::json;
    use std::str::FromStr;
    use uuid::Uuid;

    const CALLBACK: &str = r#"<?xml version="1.0"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/">
  <SOAP-ENV:Body>
    <status>success</status>
    <message>settled</message>
    <id>REF1</id>
  </SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#;

    fn gateway() -> SoapGateway {
        let settings = GatewaySettings::for_base_url("http://127.0.0.1:9");
        SoapGateway::new(GatewayClient::new(GatewayName::from("gateway_b"), &settings).unwrap())
    }

    #[test]
    fn test_envelope_carries_amount_and_callback() {
        let details = PaymentMethodDetails::parse(
            PaymentMethod::BankTransfer,
            &json!({
                "account_number": "12345678901",
                "bank_code": "DEUTDEFF",
                "bank_code_type": "SWIFT"
            }),
        )
        .unwrap();
        let request = GatewayRequest {
            transaction_id: Uuid::new_v4(),
            amount: BigDecimal::from_str("42.5").unwrap(),
            callback_url: "http://localhost/cb?a=1&b=2".to_string(),
            payment_details: details,
        };

        let xml = String::from_utf8(encode_envelope(&request).unwrap()).unwrap();
        assert!(xml.starts_with("<SOAP-ENV:Envelope"));
        assert!(xml.contains(r#"xmlns:SOAP-ENV="http://schemas.xmlsoap.org/soap/envelope/""#));
        assert!(xml.contains("<amount>42.5</amount>"));
        assert!(xml.contains("<callback_url>http://localhost/cb?a=1&amp;b=2</callback_url>"));
        assert!(!xml.contains("12345678901"));
    }

    #[test]
    fn test_decode_reads_body_fields() {
        let payload = decode_envelope(CALLBACK.as_bytes()).unwrap();
        assert_eq!(
            payload,
            SoapStatusPayload {
                status: "success".to_string(),
                message: "settled".to_string(),
                id: "REF1".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_accepts_other_prefixes() {
        let xml = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope"><soap:Body><status>pending</status><id>R9</id></soap:Body></soap:Envelope>"#;
        let payload = decode_envelope(xml.as_bytes()).unwrap();
        assert_eq!(payload.status, "pending");
        assert_eq!(payload.id, "R9");
    }

    #[test]
    fn test_callback_verification() {
        let gw = gateway();
        let response = gw.verify_callback("REF1", CALLBACK.as_bytes()).unwrap();
        assert_eq!(response.status, PaymentStatus::Success);

        assert!(matches!(
            gw.verify_callback("REF2", CALLBACK.as_bytes()),
            Err(GatewayError::InvalidCallback(_))
        ));
        assert!(matches!(
            gw.verify_callback("REF1", b""),
            Err(GatewayError::InvalidCallback(_))
        ));
        assert!(matches!(
            gw.verify_callback("REF1", b"{\"status\":\"success\",\"id\":\"REF1\"}"),
            Err(GatewayError::InvalidCallback(_))
        ));
        assert!(matches!(
            gw.verify_callback("REF1", b"<SOAP-ENV:Envelope><SOAP-ENV:Body><id>REF1</id></SOAP-ENV:Body>"),
            Err(GatewayError::InvalidCallback(_))
        ));
    }
}

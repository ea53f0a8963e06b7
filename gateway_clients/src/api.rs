use std::sync::Arc;

use log::*;
use marketpay_engine::ProviderError;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
};
use serde_json::Value;

use crate::{error::transport_error, GatewayClientError};

pub enum RequestBody {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

/// A provider's reply. Non-2xx replies are returned too, so that each client can interpret its provider's error
/// format.
#[derive(Debug, Clone)]
pub struct RestResponse {
    pub status: u16,
    pub body: Value,
}

impl RestResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A thin REST client bound to one provider's base URL and credentials.
#[derive(Clone)]
pub struct RestClient {
    base_url: String,
    client: Arc<Client>,
}

impl RestClient {
    pub fn new(base_url: &str, authorization: &str) -> Result<Self, GatewayClientError> {
        let mut headers = HeaderMap::with_capacity(2);
        let mut val = HeaderValue::from_str(authorization)
            .map_err(|e| GatewayClientError::InvalidCredentials(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| GatewayClientError::Initialization(e.to_string()))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self { base_url, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn rest_query(&self, method: Method, path: &str, body: RequestBody) -> Result<RestResponse, ProviderError> {
        let url = self.url(path);
        trace!("🔌️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        req = match body {
            RequestBody::Empty => req,
            RequestBody::Json(json) => req.json(&json),
            RequestBody::Form(params) => req.form(&params),
        };
        let response = req.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(transport_error)?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(json) => json,
                Err(e) if (200..300).contains(&status) => {
                    warn!("🔌️ Provider replied with {status} and a body that is not JSON: {text}");
                    return Err(ProviderError::UnexpectedResponse(format!("Could not deserialize JSON: {e}")));
                },
                Err(_) => return Err(ProviderError::Rejected { status, message: text, raw: None }),
            }
        };
        trace!("🔌️ REST query returned {status}");
        Ok(RestResponse { status, body })
    }
}

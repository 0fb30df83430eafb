use std::sync::Arc;

use log::*;
use reqwest::{header::HeaderValue, Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

use crate::{config::MoyasarConfig, GatewayPayment, MoyasarApiError};

#[derive(Clone)]
pub struct MoyasarApi {
    config: MoyasarConfig,
    client: Arc<Client>,
}

impl MoyasarApi {
    pub fn new(config: MoyasarConfig) -> Result<Self, MoyasarApiError> {
        let mut headers = reqwest::header::HeaderMap::with_capacity(1);
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| MoyasarApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url)
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, MoyasarApiError> {
        let url = self.url(path);
        trace!("💳️ Sending REST query: {url}");
        // The secret key is the basic-auth user name; the password is empty.
        let mut req = self.client.request(method, url).basic_auth(self.config.secret_key.reveal(), Some(""));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| MoyasarApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("💳️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| MoyasarApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message =
                response.text().await.map_err(|e| MoyasarApiError::RestResponseError(e.to_string()))?;
            Err(MoyasarApiError::QueryError { status, message })
        }
    }

    pub async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, MoyasarApiError> {
        debug!("💳️ Fetching payment {payment_id} from the gateway");
        let path = format!("/payments/{payment_id}");
        match self.rest_query::<GatewayPayment, ()>(Method::GET, &path, None).await {
            Ok(payment) => {
                info!("💳️ Fetched payment {payment_id}. Gateway status: {}", payment.status);
                Ok(payment)
            },
            Err(MoyasarApiError::QueryError { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(MoyasarApiError::PaymentNotFound(payment_id.to_string()))
            },
            Err(e) => Err(e),
        }
    }
}

//! HMAC middleware for Actix Web.
//!
//! The payment gateway signs every webhook body with HMAC-SHA256, using the shared `TFL_MOYASAR_WEBHOOK_SECRET`, and
//! sends the hex-encoded signature in the `x-moyasar-signature` header.
//!
//! When the header is present, the signature is checked in constant time. A bad signature is answered with
//! `401 {success: false, error}` and the request never reaches the handler. A good signature is recorded as a
//! [`WebhookSignature`] in the request extensions.
//!
//! Requests without the header are passed through untouched. The webhook handler treats those as sync requests,
//! which must carry a bearer token instead.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorBadRequest,
    web,
    Error,
    HttpMessage,
    HttpResponse,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use serde_json::json;
use tf_common::Secret;

use crate::helpers::verify_hmac;

pub const MOYASAR_SIGNATURE_HEADER: &str = "x-moyasar-signature";

/// Marks a request whose body carried a valid gateway signature.
#[derive(Debug, Clone, Copy)]
pub struct WebhookSignature;

pub struct HmacMiddlewareFactory {
    hmac_header: String,
    key: Secret<String>,
}

impl HmacMiddlewareFactory {
    pub fn new(hmac_header: &str, key: Secret<String>) -> Self {
        HmacMiddlewareFactory { hmac_header: hmac_header.into(), key }
    }
}

impl<S, B> Transform<S, ServiceRequest> for HmacMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<EitherBody<B>>;
    type Transform = HmacMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(HmacMiddlewareService {
            hmac_header: self.hmac_header.clone(),
            key: self.key.clone(),
            service: Rc::new(service),
        }))
    }
}

pub struct HmacMiddlewareService<S> {
    hmac_header: String,
    key: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for HmacMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<EitherBody<B>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.key.clone();
        let hmac_header = self.hmac_header.clone();
        Box::pin(async move {
            let signature = match req.headers().get(&hmac_header) {
                Some(value) => value.to_str().unwrap_or_default().to_string(),
                None => {
                    trace!("🔐️ No {hmac_header} header. Passing the request on as a sync request.");
                    return service.call(req).await.map(ServiceResponse::map_into_left_body);
                },
            };
            trace!("🔐️ Checking HMAC for request");
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {:?}", e);
                ErrorBadRequest("Failed to extract request data.")
            })?;
            if secret.is_empty() {
                warn!("🔐️ No webhook secret has been configured. Denying access.");
                return Ok(unauthorized(req, "Webhook signatures cannot be verified"));
            }
            if verify_hmac(secret.reveal(), data.as_ref(), &signature) {
                trace!("🔐️ HMAC check for request ✅️");
                req.set_payload(bytes_to_payload(data));
                req.extensions_mut().insert(WebhookSignature);
                service.call(req).await.map(ServiceResponse::map_into_left_body)
            } else {
                warn!("🔐️ Invalid HMAC signature found in request. Denying access.");
                Ok(unauthorized(req, "Invalid signature"))
            }
        })
    }
}

fn unauthorized<B>(req: ServiceRequest, error: &str) -> ServiceResponse<EitherBody<B>> {
    let res = HttpResponse::Unauthorized().json(json!({ "success": false, "error": error }));
    req.into_response(res).map_into_right_body()
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}

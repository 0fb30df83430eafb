//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use actix_web::{get, http::StatusCode, web, HttpMessage, HttpRequest, HttpResponse, Responder, ResponseError};
use chrono::Utc;
use log::*;
use moyasar_tools::WebhookPayload;
use serde_json::{json, Value};
use tradeflow_engine::{
    auto_quote::AutoQuoteConfig,
    db_types::{OrderId, Role},
    storage::DocumentStorage,
    tf_api::{OrderStore, PaymentStore, PoStore, QuoteStore},
    traits::{AuditLog, VerificationBackend},
    AuditApi,
    AutoQuoteApi,
    OrderFlowApi,
    PaymentGateway,
    PaymentWebhookApi,
    PoWorkflowApi,
};

use crate::{
    auth::{JwtClaims, TokenVerifier},
    config::ServerOptions,
    data_objects::{
        AcceptQuoteResponse,
        DocumentUrl,
        PoUploadRequest,
        RegisterPaymentRequest,
        RejectRequest,
        SignedUrlQuery,
        StatusChangeRequest,
        SyncPaymentRequest,
        TransitionsResponse,
        VerificationResponse,
        WebhookResponse,
    },
    errors::ServerError,
    helpers::actor_for,
    integrations::moyasar::payment_update,
    middleware::WebhookSignature,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),+])  => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Payment webhook  -------------------------------------------------
route!(payment_webhook => Post "/payments" impl PaymentStore, PaymentGateway);
/// Route handler for the payment gateway webhook.
///
/// The route serves two kinds of caller:
/// * The gateway itself, which pushes payment objects signed with the webhook secret. The HMAC middleware has already
///   checked the signature by the time the request gets here. Replies are `{success, source: "webhook"}` and never
///   carry payment details.
/// * Clients and admins who ask for a payment to be re-fetched from the gateway (sync mode). These calls carry a bearer
///   token and a `{payment_id}` body, and get the updated payment record back.
pub async fn payment_webhook<B, G>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<PaymentWebhookApi<B, G>>,
    verifier: web::Data<TokenVerifier>,
    options: web::Data<ServerOptions>,
) -> HttpResponse
where
    B: PaymentStore,
    G: PaymentGateway,
{
    let signed = req.extensions().get::<WebhookSignature>().is_some();
    if signed {
        push_payment_update(&body, api.as_ref()).await
    } else {
        sync_payment(&req, &body, api.as_ref(), verifier.as_ref(), options.as_ref()).await
    }
}

async fn push_payment_update<B, G>(body: &[u8], api: &PaymentWebhookApi<B, G>) -> HttpResponse
where
    B: PaymentStore,
    G: PaymentGateway,
{
    let payload = match serde_json::from_slice::<Value>(body).and_then(WebhookPayload::from_value) {
        Ok(p) => p,
        Err(e) => {
            warn!("💻️ Could not parse webhook payload. {e}");
            return webhook_failure(StatusCode::BAD_REQUEST, format!("Invalid webhook payload. {e}"));
        },
    };
    let event = payload.event_type.as_deref().unwrap_or("payment");
    debug!("💻️ Webhook '{event}' received for payment {}", payload.payment.id);
    let update = payment_update(&payload.payment);
    match api.process_gateway_payment(&update).await {
        Ok(result) => {
            if let Some(order) = result.confirmed_order {
                info!("💻️ Payment {} confirmed order {}", update.external_payment_id, order.id);
            }
            HttpResponse::Ok().json(WebhookResponse::webhook())
        },
        Err(e) => {
            warn!("💻️ Could not process webhook for payment {}. {e}", update.external_payment_id);
            webhook_failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        },
    }
}

async fn sync_payment<B, G>(
    req: &HttpRequest,
    body: &[u8],
    api: &PaymentWebhookApi<B, G>,
    verifier: &TokenVerifier,
    options: &ServerOptions,
) -> HttpResponse
where
    B: PaymentStore,
    G: PaymentGateway,
{
    let claims = match verifier.verify_headers(req.headers()) {
        Ok(claims) => claims,
        Err(e) => {
            debug!("💻️ Unsigned webhook call without a valid bearer token. {e}");
            return webhook_failure(StatusCode::UNAUTHORIZED, e.to_string());
        },
    };
    let request = match serde_json::from_slice::<SyncPaymentRequest>(body) {
        Ok(r) => r,
        Err(e) => return webhook_failure(StatusCode::BAD_REQUEST, format!("Invalid sync request. {e}")),
    };
    if !request.has_sync_mode() {
        let mode = request.mode.as_deref().unwrap_or_default();
        return webhook_failure(StatusCode::BAD_REQUEST, format!("Unsupported webhook mode '{mode}'"));
    }
    let actor = actor_for(req, &claims, options).await;
    debug!("💻️ {} {} requested a sync of payment {}", actor.role, actor.user_id, request.payment_id);
    match api.sync_payment(&request.payment_id, &actor).await {
        Ok(result) => HttpResponse::Ok().json(WebhookResponse::sync(result)),
        Err(e) => {
            let err = ServerError::from(e);
            debug!("💻️ Could not sync payment {}. {err}", request.payment_id);
            webhook_failure(err.status_code(), err.to_string())
        },
    }
}

fn webhook_failure<S: Into<String>>(status: StatusCode, error: S) -> HttpResponse {
    HttpResponse::build(status).json(json!({ "success": false, "error": error.into() }))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(order_transitions => Get "/orders/{order_id}/transitions" impl OrderStore where requires [Role::Client, Role::Supplier, Role::Admin]);
/// The statuses an order can be moved to from its current status. Parties to the order and admins may ask.
pub async fn order_transitions<B: OrderStore>(
    path: web::Path<i64>,
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    let actor = claims.actor(None);
    debug!("💻️ GET transitions for order {order_id}");
    let order = api.fetch_order(order_id, &actor).await?;
    let allowed = api.allowed_transitions(order_id, &actor).await?;
    Ok(HttpResponse::Ok().json(TransitionsResponse { order_id: order_id.value(), status: order.status, allowed }))
}

route!(change_order_status => Patch "/orders/{order_id}/status" impl OrderStore where requires [Role::Admin]);
pub async fn change_order_status<B: OrderStore>(
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<StatusChangeRequest>,
    claims: JwtClaims,
    options: web::Data<ServerOptions>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    let next = body.into_inner().status;
    let actor = actor_for(&req, &claims, options.as_ref()).await;
    debug!("💻️ PATCH status of order {order_id} to {next}");
    let order = api.change_status(order_id, next, &actor).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(accept_quote => Post "/quotes/{quote_id}/accept" impl OrderStore where requires [Role::Client]);
/// The client accepts a quote. The order is created, rival quotes are rejected and the RFQ is closed.
pub async fn accept_quote<B: OrderStore>(
    path: web::Path<i64>,
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let quote_id = path.into_inner();
    debug!("💻️ POST accept quote {quote_id} by client {}", claims.sub);
    let accepted = api.accept_quote(quote_id, &claims.actor(None)).await?;
    Ok(HttpResponse::Ok().json(AcceptQuoteResponse::from(accepted)))
}

route!(register_payment => Post "/orders/{order_id}/payments" impl OrderStore where requires [Role::Client, Role::Admin]);
/// Records a payment that was started at the gateway, so that the gateway's webhook can be matched to the order.
pub async fn register_payment<B: OrderStore>(
    path: web::Path<i64>,
    body: web::Json<RegisterPaymentRequest>,
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    let RegisterPaymentRequest { payment_id, amount } = body.into_inner();
    debug!("💻️ POST payment {payment_id} for order {order_id}");
    let payment = api.register_payment(order_id, &payment_id, amount, &claims.actor(None)).await?;
    Ok(HttpResponse::Created().json(payment))
}

//----------------------------------------------   Purchase orders  ------------------------------------------------
route!(upload_client_po => Post "/orders/{order_id}/po" impl PoStore, VerificationBackend, DocumentStorage where requires [Role::Client, Role::Admin]);
/// Uploads a client PO. The file is sent as base64 in the `content` field.
pub async fn upload_client_po<B, V, S>(
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<PoUploadRequest>,
    claims: JwtClaims,
    options: web::Data<ServerOptions>,
    api: web::Data<PoWorkflowApi<B, V, S>>,
) -> Result<HttpResponse, ServerError>
where
    B: PoStore,
    V: VerificationBackend,
    S: DocumentStorage,
{
    let order_id = OrderId(path.into_inner());
    let PoUploadRequest { file_name, content } = body.into_inner();
    let content = base64::decode(content.trim()).map_err(|e| {
        debug!("💻️ PO upload for order {order_id} is not valid base64. {e}");
        ServerError::BadRequest(format!("The document content is not valid base64. {e}"))
    })?;
    let actor = actor_for(&req, &claims, options.as_ref()).await;
    debug!("💻️ POST client PO '{file_name}' ({} bytes) for order {order_id}", content.len());
    let document = api.upload_client_po(order_id, &file_name, &content, &actor).await?;
    Ok(HttpResponse::Created().json(document))
}

route!(generate_system_po => Post "/orders/{order_id}/system_po" impl PoStore, VerificationBackend, DocumentStorage where requires [Role::Admin]);
/// Generates the system PO for an order and confirms the order with it. Repeated calls are no-ops.
pub async fn generate_system_po<B, V, S>(
    req: HttpRequest,
    path: web::Path<i64>,
    claims: JwtClaims,
    options: web::Data<ServerOptions>,
    api: web::Data<PoWorkflowApi<B, V, S>>,
) -> Result<HttpResponse, ServerError>
where
    B: PoStore,
    V: VerificationBackend,
    S: DocumentStorage,
{
    let order_id = OrderId(path.into_inner());
    let actor = actor_for(&req, &claims, options.as_ref()).await;
    debug!("💻️ POST system PO for order {order_id}");
    let outcome = api.generate_system_po(order_id, &actor).await?;
    Ok(HttpResponse::Ok().json(VerificationResponse::from(outcome)))
}

route!(verify_client_po => Post "/documents/{document_id}/verify" impl PoStore, VerificationBackend, DocumentStorage where requires [Role::Admin]);
/// Verifies a client PO. Stock is decremented once, however many times this is called.
pub async fn verify_client_po<B, V, S>(
    req: HttpRequest,
    path: web::Path<i64>,
    claims: JwtClaims,
    options: web::Data<ServerOptions>,
    api: web::Data<PoWorkflowApi<B, V, S>>,
) -> Result<HttpResponse, ServerError>
where
    B: PoStore,
    V: VerificationBackend,
    S: DocumentStorage,
{
    let document_id = path.into_inner();
    let actor = actor_for(&req, &claims, options.as_ref()).await;
    debug!("💻️ POST verify document {document_id}");
    let outcome = api.verify_client_po(document_id, &actor).await?;
    Ok(HttpResponse::Ok().json(VerificationResponse::from(outcome)))
}

route!(reject_client_po => Post "/documents/{document_id}/reject" impl PoStore, VerificationBackend, DocumentStorage where requires [Role::Admin]);
pub async fn reject_client_po<B, V, S>(
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<RejectRequest>,
    claims: JwtClaims,
    options: web::Data<ServerOptions>,
    api: web::Data<PoWorkflowApi<B, V, S>>,
) -> Result<HttpResponse, ServerError>
where
    B: PoStore,
    V: VerificationBackend,
    S: DocumentStorage,
{
    let document_id = path.into_inner();
    let actor = actor_for(&req, &claims, options.as_ref()).await;
    debug!("💻️ POST reject document {document_id}");
    let document = api.reject_client_po(document_id, &body.reason, &actor).await?;
    Ok(HttpResponse::Ok().json(document))
}

route!(document_url => Get "/documents/{document_id}/url" impl PoStore, VerificationBackend, DocumentStorage where requires [Role::Client, Role::Admin]);
/// A short-lived signed link to a PO file.
pub async fn document_url<B, V, S>(
    path: web::Path<i64>,
    claims: JwtClaims,
    api: web::Data<PoWorkflowApi<B, V, S>>,
) -> Result<HttpResponse, ServerError>
where
    B: PoStore,
    V: VerificationBackend,
    S: DocumentStorage,
{
    let document_id = path.into_inner();
    trace!("💻️ GET url for document {document_id}");
    let url = api.document_url(document_id, &claims.actor(None)).await?;
    Ok(HttpResponse::Ok().json(DocumentUrl { url }))
}

route!(order_audit => Get "/orders/{order_id}/audit" impl AuditLog where requires [Role::Admin]);
pub async fn order_audit<B: AuditLog>(
    path: web::Path<i64>,
    api: web::Data<AuditApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    debug!("💻️ GET audit trail for order {order_id}");
    let entries = api.audit_trail(order_id).await?;
    Ok(HttpResponse::Ok().json(entries))
}

//----------------------------------------------   Documents  -------------------------------------------------------
route!(signed_file => Get "/files/{file_ref:.*}" impl DocumentStorage);
/// Serves a PO file to the holder of a valid signed link. No bearer token is needed.
pub async fn signed_file<S: DocumentStorage>(
    path: web::Path<String>,
    query: web::Query<SignedUrlQuery>,
    storage: web::Data<S>,
) -> Result<HttpResponse, ServerError> {
    let file_ref = path.into_inner();
    if !storage.verify_signature(&file_ref, query.expires, &query.signature, Utc::now()) {
        debug!("💻️ Refusing an expired or tampered link to {file_ref}");
        return Err(ServerError::InsufficientPermissions("The link is invalid or has expired".into()));
    }
    let content = storage.read(&file_ref).await.map_err(|e| {
        debug!("💻️ Could not read {file_ref}. {e}");
        ServerError::NoRecordFound(format!("{file_ref} is not available"))
    })?;
    let content_type = if file_ref.to_ascii_lowercase().ends_with(".pdf") {
        "application/pdf"
    } else if file_ref.ends_with(".txt") {
        "text/plain; charset=utf-8"
    } else {
        "application/octet-stream"
    };
    Ok(HttpResponse::Ok().content_type(content_type).body(content))
}

//----------------------------------------------   Auto-quotes  -----------------------------------------------------
route!(run_auto_quotes => Post "/auto_quotes/run" impl QuoteStore where requires [Role::Admin]);
/// Runs the auto-quote batch now, instead of waiting for the worker. The run honours the same configuration as the
/// worker, including the `enabled` flag.
pub async fn run_auto_quotes<B: QuoteStore>(
    claims: JwtClaims,
    config: web::Data<AutoQuoteConfig>,
    api: web::Data<AutoQuoteApi<B>>,
) -> Result<HttpResponse, ServerError> {
    info!("💻️ Auto-quote run requested by admin {}", claims.sub);
    let summary = api.run(config.as_ref(), Utc::now()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

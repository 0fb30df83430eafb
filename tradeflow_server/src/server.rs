use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use chrono::Duration as ChronoDuration;
use log::*;
use moyasar_tools::MoyasarApi;
use tradeflow_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    storage::LocalFileStorage,
    AuditApi,
    AutoQuoteApi,
    OrderFlowApi,
    PaymentWebhookApi,
    PoWorkflowApi,
    SqliteDatabase,
    SqliteVerifier,
};

use crate::{
    auth::TokenVerifier,
    auto_quote_worker::start_auto_quote_worker,
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::moyasar::MoyasarGateway,
    middleware::{HmacMiddlewareFactory, MOYASAR_SIGNATURE_HEADER},
    routes::{
        health,
        AcceptQuoteRoute,
        ChangeOrderStatusRoute,
        DocumentUrlRoute,
        GenerateSystemPoRoute,
        OrderAuditRoute,
        OrderTransitionsRoute,
        PaymentWebhookRoute,
        RegisterPaymentRoute,
        RejectClientPoRoute,
        RunAutoQuotesRoute,
        SignedFileRoute,
        UploadClientPoRoute,
        VerifyClientPoRoute,
    },
};

/// How long signed document links stay valid.
pub const DOCUMENT_URL_TTL_MINUTES: i64 = 15;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Could not migrate the database. {e}")))?;
    let hooks = create_event_hooks();
    let handlers = EventHandlers::new(128, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let _worker = start_auto_quote_worker(db.clone(), config.auto_quote.clone(), config.auto_quote_interval);
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Downstream services (fulfillment, notifications) hook in here. Out of the box the events are only logged.
fn create_event_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_confirmed(|ev| {
            Box::pin(async move {
                info!(
                    "📬️ Order {} confirmed with document #{}. {} stock line(s) taken.",
                    ev.order.id,
                    ev.document_id,
                    ev.decrements.len()
                );
            })
        })
        .on_payment_confirmed(|ev| {
            Box::pin(async move {
                info!(
                    "📬️ Payment {} of {} confirmed order {}. Ready for fulfillment.",
                    ev.payment.external_payment_id, ev.payment.amount, ev.order.id
                );
            })
        });
    hooks
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let moyasar_api =
        MoyasarApi::new(config.moyasar.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = MoyasarGateway::new(moyasar_api);
    let storage =
        LocalFileStorage::new(&config.document_root, &config.document_url_base, config.document_signing_key.clone());
    info!("📁️ Documents are stored in {}", storage.root().display());
    let verifier = db.verifier(config.verification_mode);
    let options = ServerOptions::from_config(&config);
    let (host, port) = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone());
        let po_api = PoWorkflowApi::new(db.clone(), verifier.clone(), storage.clone(), producers.clone())
            .with_url_ttl(ChronoDuration::minutes(DOCUMENT_URL_TTL_MINUTES));
        let payments_api = PaymentWebhookApi::new(db.clone(), gateway.clone(), producers.clone());
        let audit_api = AuditApi::new(db.clone());
        let auto_quote_api = AutoQuoteApi::new(db.clone());
        let token_verifier = TokenVerifier::new(&config.auth);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("tfl::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(po_api))
            .app_data(web::Data::new(payments_api))
            .app_data(web::Data::new(audit_api))
            .app_data(web::Data::new(auto_quote_api))
            .app_data(web::Data::new(config.auto_quote.clone()))
            .app_data(web::Data::new(storage.clone()))
            .app_data(web::Data::new(token_verifier))
            .app_data(web::Data::new(options));
        // Every route in this scope checks the bearer token and the caller's role
        let api_scope = web::scope("/api")
            .service(OrderTransitionsRoute::<SqliteDatabase>::new())
            .service(ChangeOrderStatusRoute::<SqliteDatabase>::new())
            .service(AcceptQuoteRoute::<SqliteDatabase>::new())
            .service(RegisterPaymentRoute::<SqliteDatabase>::new())
            .service(UploadClientPoRoute::<SqliteDatabase, SqliteVerifier, LocalFileStorage>::new())
            .service(GenerateSystemPoRoute::<SqliteDatabase, SqliteVerifier, LocalFileStorage>::new())
            .service(VerifyClientPoRoute::<SqliteDatabase, SqliteVerifier, LocalFileStorage>::new())
            .service(RejectClientPoRoute::<SqliteDatabase, SqliteVerifier, LocalFileStorage>::new())
            .service(DocumentUrlRoute::<SqliteDatabase, SqliteVerifier, LocalFileStorage>::new())
            .service(OrderAuditRoute::<SqliteDatabase>::new())
            .service(RunAutoQuotesRoute::<SqliteDatabase>::new());
        let webhook_scope = web::scope("/webhooks")
            .wrap(HmacMiddlewareFactory::new(MOYASAR_SIGNATURE_HEADER, config.moyasar.webhook_secret.clone()))
            .service(PaymentWebhookRoute::<SqliteDatabase, MoyasarGateway>::new());
        app.service(health).service(api_scope).service(webhook_scope).service(SignedFileRoute::<LocalFileStorage>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

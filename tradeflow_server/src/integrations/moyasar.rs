//! Connects the Moyasar REST client to the engine's [`PaymentGateway`] seam.
use log::*;
use moyasar_tools::{GatewayPayment, MoyasarApi, MoyasarApiError};
use tradeflow_engine::{GatewayError, GatewayPaymentUpdate, PaymentGateway};

#[derive(Clone)]
pub struct MoyasarGateway {
    api: MoyasarApi,
}

impl MoyasarGateway {
    pub fn new(api: MoyasarApi) -> Self {
        Self { api }
    }
}

impl PaymentGateway for MoyasarGateway {
    async fn fetch_payment(&self, external_payment_id: &str) -> Result<GatewayPaymentUpdate, GatewayError> {
        match self.api.fetch_payment(external_payment_id).await {
            Ok(payment) => Ok(payment_update(&payment)),
            Err(MoyasarApiError::PaymentNotFound(id)) => Err(GatewayError::PaymentNotFound(id)),
            Err(e) => {
                warn!("💳️ Could not fetch payment {external_payment_id} from Moyasar. {e}");
                Err(GatewayError::Unavailable(e.to_string()))
            },
        }
    }
}

/// Reduces a gateway payment object to the fields the engine acts on.
pub fn payment_update(payment: &GatewayPayment) -> GatewayPaymentUpdate {
    let mut update = GatewayPaymentUpdate::new(payment.id.as_str(), payment.status.as_str());
    if payment.amount.value() > 0 {
        update.amount = Some(payment.amount);
    }
    match payment.failure_reason() {
        Some(reason) => update.with_failure_reason(reason),
        None => update,
    }
}

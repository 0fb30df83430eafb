use mockall::mock;
use tradeflow_engine::{GatewayError, GatewayPaymentUpdate, PaymentGateway};

mock! {
    pub Gateway {}
    impl PaymentGateway for Gateway {
        async fn fetch_payment(&self, external_payment_id: &str) -> Result<GatewayPaymentUpdate, GatewayError>;
    }
}

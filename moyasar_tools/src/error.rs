use thiserror::Error;

#[derive(Debug, Error)]
pub enum MoyasarApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Could not reach the payment gateway: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Payment {0} does not exist on the gateway")]
    PaymentNotFound(String),
}

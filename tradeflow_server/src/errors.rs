use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use thiserror::Error;
use tradeflow_engine::{
    traits::StoreError,
    AuditApiError,
    AutoQuoteError,
    OrderFlowError,
    PaymentWebhookError,
    PoWorkflowError,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Payload deserialization error")]
    CouldNotDeserializePayload,
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("The payment gateway could not be reached. {0}")]
    GatewayError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::CouldNotDeserializePayload => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::InvalidSignature => StatusCode::UNAUTHORIZED,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            },
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No bearer token was provided.")]
    MissingToken,
    #[error("Bearer token is invalid. {0}")]
    ValidationError(String),
    #[error("The webhook signature is invalid.")]
    InvalidSignature,
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DatabaseError(_) | StoreError::SchemaCompatibility { .. } => {
                error!("🗃️ {e}");
                Self::BackendError(e.to_string())
            },
            StoreError::ConcurrencyConflict(_) | StoreError::DuplicatePayment(_) => Self::Conflict(e.to_string()),
            StoreError::InvalidTransition { .. } | StoreError::InvalidRequest(_) => Self::BadRequest(e.to_string()),
            StoreError::OrderNotFound(_) |
            StoreError::DocumentNotFound(_) |
            StoreError::QuoteNotFound(_) |
            StoreError::RfqNotFound(_) |
            StoreError::PaymentNotFound(_) => Self::NoRecordFound(e.to_string()),
        }
    }
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::Store(e) => e.into(),
            OrderFlowError::Forbidden(s) => Self::InsufficientPermissions(s),
        }
    }
}

impl From<PoWorkflowError> for ServerError {
    fn from(e: PoWorkflowError) -> Self {
        match e {
            PoWorkflowError::Store(e) => e.into(),
            PoWorkflowError::Storage(e) => match e {
                tradeflow_engine::storage::StorageError::Io(s) => Self::BackendError(s),
                e => Self::BadRequest(e.to_string()),
            },
            PoWorkflowError::Forbidden(s) => Self::InsufficientPermissions(s),
        }
    }
}

impl From<PaymentWebhookError> for ServerError {
    fn from(e: PaymentWebhookError) -> Self {
        match e {
            PaymentWebhookError::Store(e) => e.into(),
            PaymentWebhookError::Forbidden(s) => Self::InsufficientPermissions(s),
            PaymentWebhookError::Gateway(s) => Self::GatewayError(s),
            PaymentWebhookError::InvalidPayload(s) => Self::BadRequest(s),
        }
    }
}

impl From<AutoQuoteError> for ServerError {
    fn from(e: AutoQuoteError) -> Self {
        match e {
            AutoQuoteError::Store(e) => e.into(),
        }
    }
}

impl From<AuditApiError> for ServerError {
    fn from(e: AuditApiError) -> Self {
        match e {
            AuditApiError::Store(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod test {
    use tradeflow_engine::db_types::{OrderId, OrderStatus};

    use super::*;

    #[test]
    fn store_errors_map_to_status_codes() {
        let cases = [
            (StoreError::ConcurrencyConflict(OrderId(1)), StatusCode::CONFLICT),
            (
                StoreError::InvalidTransition {
                    order_id: OrderId(1),
                    from: OrderStatus::Delivered,
                    to: OrderStatus::Processing,
                },
                StatusCode::BAD_REQUEST,
            ),
            (StoreError::DocumentNotFound(4), StatusCode::NOT_FOUND),
            (StoreError::DatabaseError("disk I/O error".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ServerError::from(err).status_code(), expected);
        }
    }

    #[test]
    fn gateway_outages_are_bad_gateway() {
        let err = ServerError::from(PaymentWebhookError::Gateway("timed out".into()));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        let err = ServerError::from(PaymentWebhookError::Forbidden("not yours".into()));
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }
}

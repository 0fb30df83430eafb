mod acl;
mod hmac;

pub use acl::{AclMiddlewareFactory, AclMiddlewareService};
pub use hmac::{HmacMiddlewareFactory, HmacMiddlewareService, WebhookSignature, MOYASAR_SIGNATURE_HEADER};

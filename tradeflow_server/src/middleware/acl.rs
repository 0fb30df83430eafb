//! Access control list middleware for the TradeFlow server.
//! This middleware can be placed on any route or service.
//!
//! It checks the incoming request for a valid bearer token and then checks the role in the token against the roles
//! allowed on the route. A missing or invalid token gets a 401 Unauthorized response. A valid token whose role is not
//! in the list gets a 403 Forbidden response. Otherwise the claims are stored in the request extensions, where
//! handlers can extract them as [`JwtClaims`].

use std::{pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
    HttpMessage,
};
use futures::{
    future::{ok, Ready},
    Future,
};
use log::*;
use tradeflow_engine::db_types::Role;

use crate::{
    auth::{JwtClaims, TokenVerifier},
    errors::{AuthError, ServerError},
};

pub struct AclMiddlewareFactory {
    allowed_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(allowed_roles: &[Role]) -> Self {
        AclMiddlewareFactory { allowed_roles: allowed_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { allowed_roles: self.allowed_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    allowed_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let allowed_roles = self.allowed_roles.clone();
        Box::pin(async move {
            let verifier = req.app_data::<web::Data<TokenVerifier>>().cloned().ok_or_else(|| {
                error!("🔐️ No token verifier has been configured. Denying access.");
                ServerError::InitializeError("No token verifier has been configured".into())
            })?;
            let claims = verifier.verify_headers(req.headers()).map_err(|e| {
                debug!("🔐️ Denying access to {}. {e}", req.path());
                ServerError::AuthenticationError(e)
            })?;
            if !allowed_roles.contains(&claims.role) {
                info!("🔐️ {} {} may not access {}", claims.role, claims.sub, req.path());
                let msg = format!("The {} role cannot access this resource", claims.role);
                return Err(ServerError::AuthenticationError(AuthError::InsufficientPermissions(msg)).into());
            }
            req.extensions_mut().insert::<JwtClaims>(claims);
            service.call(req).await
        })
    }
}

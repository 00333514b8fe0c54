use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    web, Error, FromRequest, HttpMessage, HttpRequest, HttpResponse,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};

use crate::context::AppContext;
use crate::services::session::{IdentityClaims, SESSION_COOKIE};
use crate::utils::AppError;

/// Guards protected routes. Requests without a valid session cookie are
/// redirected to `/login`; authenticated ones carry their [`IdentityClaims`]
/// in the request extensions.
pub struct RequireSession;

impl<S, B> Transform<S, ServiceRequest> for RequireSession
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireSessionService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireSessionService { service }))
    }
}

pub struct RequireSessionService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequireSessionService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let claims = match req.app_data::<web::Data<AppContext>>() {
            Some(ctx) => req
                .cookie(SESSION_COOKIE)
                .and_then(|cookie| ctx.sessions.decode_session(cookie.value())),
            None => {
                log::error!("❌ AppContext missing from app data");
                None
            }
        };

        match claims {
            Some(claims) => {
                req.extensions_mut().insert(claims);
                let fut = self.service.call(req);
                Box::pin(async move {
                    let res = fut.await?;
                    Ok(res.map_into_left_body())
                })
            }
            None => {
                log::debug!("Anonymous request to {}, redirecting to /login", req.path());
                let response = HttpResponse::Found()
                    .append_header((header::LOCATION, "/login"))
                    .finish();
                Box::pin(async move { Ok(req.into_response(response).map_into_right_body()) })
            }
        }
    }
}

/// Extracts the session's identity, attached by [`RequireSession`].
#[derive(Debug, Clone)]
pub struct Authenticated(pub IdentityClaims);

impl FromRequest for Authenticated {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<IdentityClaims>()
                .cloned()
                .map(Authenticated)
                .ok_or_else(|| AppError::Unauthorized("no authenticated session".to_string())),
        )
    }
}

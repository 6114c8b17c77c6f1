//! Per-client throttling for the credential endpoints.

use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    http::header,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures::future::LocalBoxFuture;
use quill_shared::ErrorResponse;
use std::future::{Ready, ready};
use std::rc::Rc;
use std::sync::Arc;

use quill_core::ports::{RateLimiter, Throttle};

pub struct RateLimitMiddleware {
    limiter: Arc<dyn RateLimiter>,
    trust_forwarded_for: bool,
}

impl RateLimitMiddleware {
    /// Clients are keyed by the socket peer address.
    pub fn new(limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            limiter,
            trust_forwarded_for: false,
        }
    }

    /// Key on the forwarded client address instead. Only for deployments
    /// where a proxy overwrites `Forwarded`/`X-Forwarded-For`.
    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }
}

fn client_key(req: &ServiceRequest, trust_forwarded_for: bool) -> String {
    let key = if trust_forwarded_for {
        req.connection_info().realip_remote_addr().map(str::to_string)
    } else {
        req.peer_addr().map(|addr| addr.ip().to_string())
    };
    key.unwrap_or_else(|| "unknown".to_string())
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            trust_forwarded_for: self.trust_forwarded_for,
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: Arc<dyn RateLimiter>,
    trust_forwarded_for: bool,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let limiter = self.limiter.clone();

        let client = client_key(&req, self.trust_forwarded_for);

        Box::pin(async move {
            match limiter.check(&client).await {
                Ok(Throttle::Limited { retry_after }) => {
                    let secs = retry_after.as_secs().max(1);
                    tracing::warn!(%client, path = %req.path(), retry_after = secs, "Auth request throttled");

                    let body = ErrorResponse::too_many_requests()
                        .with_code("rate_limited")
                        .with_detail(format!("Too many attempts. Try again in {secs} seconds."));
                    let response = HttpResponse::TooManyRequests()
                        .insert_header((header::RETRY_AFTER, secs.to_string()))
                        .json(body);

                    return Ok(req.into_response(response).map_into_right_body());
                }
                Ok(Throttle::Allowed) => {}
                // An unavailable limiter must not lock everyone out.
                Err(e) => tracing::error!(error = %e, "Rate limiter failed; letting request through"),
            }

            service
                .call(req)
                .await
                .map(ServiceResponse::map_into_left_body)
        })
    }
}

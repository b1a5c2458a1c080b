//! Bearer token guard for the read-only `/api` scope
//!
//! An empty configured token disables the scope entirely (404).

use std::rc::Rc;

use actix_service::{Service, Transform};
use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::AUTHORIZATION,
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use subtle::ConstantTimeEq;
use tracing::{trace, warn};

#[derive(Clone)]
pub struct ApiAuth {
    token: Rc<str>,
}

impl ApiAuth {
    pub fn new(token: &str) -> Self {
        Self {
            token: Rc::from(token.trim()),
        }
    }
}

fn bearer_matches(req: &ServiceRequest, expected: &str) -> bool {
    let Some(presented) = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    else {
        return false;
    };
    presented
        .trim()
        .as_bytes()
        .ct_eq(expected.as_bytes())
        .into()
}

impl<S, B> Transform<S, ServiceRequest> for ApiAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = ApiAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiAuthMiddleware {
            service: Rc::new(service),
            token: self.token.clone(),
        }))
    }
}

pub struct ApiAuthMiddleware<S> {
    service: Rc<S>,
    token: Rc<str>,
}

impl<S, B> Service<ServiceRequest> for ApiAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    actix_service::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        let token = self.token.clone();

        Box::pin(async move {
            if token.is_empty() {
                trace!("API token not configured, /api disabled");
                return Ok(req.into_response(
                    HttpResponse::NotFound()
                        .json(serde_json::json!({ "error": "not_found" }))
                        .map_into_right_body(),
                ));
            }

            if !bearer_matches(&req, &token) {
                warn!("API authentication failed for {}", req.path());
                return Ok(req.into_response(
                    HttpResponse::Unauthorized()
                        .json(serde_json::json!({
                            "error": "unauthorized",
                            "message": "invalid or missing bearer token"
                        }))
                        .map_into_right_body(),
                ));
            }

            Ok(srv.call(req).await?.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test, web};

    async fn status_for(configured: &str, header: Option<&str>) -> StatusCode {
        let app = test::init_service(
            App::new()
                .wrap(ApiAuth::new(configured))
                .route("/", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let mut req = test::TestRequest::get().uri("/");
        if let Some(h) = header {
            req = req.insert_header((AUTHORIZATION, h));
        }
        test::call_service(&app, req.to_request()).await.status()
    }

    #[actix_web::test]
    async fn test_api_auth() {
        assert_eq!(status_for("", Some("Bearer x")).await, StatusCode::NOT_FOUND);
        assert_eq!(status_for("secret", None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_for("secret", Some("Bearer wrong")).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_for("secret", Some("Bearer secret")).await, StatusCode::OK);
    }
}

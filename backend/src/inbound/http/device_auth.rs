//! Bearer-key authentication for the device API.
//!
//! [`RequireDeviceKey`] wraps each device route and resolves the key before
//! any other extractor reads the body, so a request with a missing, malformed,
//! or unknown key is rejected with `401` whatever its payload looks like.
//! Handlers then take an [`AuthenticatedDevice`] argument.

use std::rc::Rc;
use std::task::{Context, Poll};

use actix_web::body::EitherBody;
use actix_web::dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{AUTHORIZATION, HeaderMap};
use actix_web::{FromRequest, HttpMessage, HttpRequest, ResponseError, web};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use serde_json::json;
use tracing::debug;

use crate::domain::{ApiKey, Device, Error};
use crate::inbound::http::state::HttpState;

const BEARER_PREFIX: &str = "Bearer ";

/// The device whose API key authenticated the current request.
#[derive(Debug, Clone)]
pub struct AuthenticatedDevice(pub Device);

impl AuthenticatedDevice {
    pub fn device(&self) -> &Device {
        &self.0
    }
}

fn missing_credentials() -> Error {
    Error::unauthorized("missing bearer api key")
        .with_details(json!({ "field": "Authorization", "code": "missing_api_key" }))
}

/// Pull the key out of `Authorization: Bearer <key>`.
pub(crate) fn bearer_key(headers: &HeaderMap) -> Result<ApiKey, Error> {
    let raw = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(missing_credentials)?;
    let token = raw
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(missing_credentials)?;
    ApiKey::new(token).map_err(|_| missing_credentials())
}

async fn authenticate(req: &ServiceRequest) -> Result<Device, Error> {
    let key = bearer_key(req.headers())?;
    let state = req
        .app_data::<web::Data<HttpState>>()
        .cloned()
        .ok_or_else(|| Error::internal("http state is not configured"))?;
    state.auth.authenticate(&key).await
}

/// Route middleware that authenticates the bearer key.
///
/// # Examples
/// ```
/// use actix_web::{App, HttpResponse, web};
/// use ecodrop::inbound::http::device_auth::RequireDeviceKey;
///
/// let app = App::new().service(
///     web::resource("/kiosk")
///         .wrap(RequireDeviceKey)
///         .route(web::post().to(HttpResponse::Ok)),
/// );
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct RequireDeviceKey;

impl<S, B> Transform<S, ServiceRequest> for RequireDeviceKey
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = RequireDeviceKeyMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireDeviceKeyMiddleware {
            service: Rc::new(service),
        }))
    }
}

/// Service wrapper produced by [`RequireDeviceKey`].
pub struct RequireDeviceKeyMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequireDeviceKeyMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        Box::pin(async move {
            match authenticate(&req).await {
                Ok(device) => {
                    req.extensions_mut().insert(AuthenticatedDevice(device));
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Err(err) => {
                    debug!(path = %req.path(), code = ?err.code(), "device authentication failed");
                    let response = err.error_response();
                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}

impl FromRequest for AuthenticatedDevice {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let device = req
            .extensions()
            .get::<AuthenticatedDevice>()
            .cloned()
            .ok_or_else(|| {
                Error::internal("device route is not wrapped in RequireDeviceKey").into()
            });
        ready(device)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::{App, HttpResponse, test as actix_test};
    use rstest::rstest;
    use serde::Deserialize;

    use super::*;
    use crate::domain::ports::{DeviceAuthentication, MockDeviceAuthentication};
    use crate::domain::test_fixtures::{YieldingRejection, kiosk};
    use crate::domain::{DeviceStatus, ErrorCode};

    fn headers(value: &'static str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(
            AUTHORIZATION,
            actix_web::http::header::HeaderValue::from_static(value),
        );
        map
    }

    #[rstest]
    #[case("Bearer kiosk-secret", "kiosk-secret")]
    #[case("Bearer   padded  ", "padded")]
    fn parses_bearer_token(#[case] header: &'static str, #[case] expected: &str) {
        let key = bearer_key(&headers(header)).expect("bearer key");
        assert_eq!(key.expose(), expected);
    }

    #[rstest]
    #[case("Bearer ")]
    #[case("Basic a2lvc2s6c2VjcmV0")]
    #[case("kiosk-secret")]
    fn rejects_malformed_header(#[case] header: &'static str) {
        let err = bearer_key(&headers(header)).expect_err("malformed");
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[rstest]
    fn rejects_missing_header() {
        let err = bearer_key(&HeaderMap::new()).expect_err("missing");
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    fn state_with(auth: impl DeviceAuthentication + 'static) -> web::Data<HttpState> {
        let defaults = HttpState::default();
        web::Data::new(HttpState::new(
            Arc::new(auth),
            defaults.telemetry,
            defaults.telemetry_query,
        ))
    }

    #[derive(Deserialize)]
    struct NamedBody {
        name: String,
    }

    async fn whoami(device: AuthenticatedDevice) -> HttpResponse {
        HttpResponse::Ok().body(device.device().device_id.to_string())
    }

    async fn whoami_with_body(
        device: AuthenticatedDevice,
        body: web::Json<NamedBody>,
    ) -> HttpResponse {
        HttpResponse::Ok().body(format!("{}:{}", device.device().device_id, body.name))
    }

    fn guarded_app(
        state: web::Data<HttpState>,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(state)
            .service(
                web::resource("/whoami")
                    .wrap(RequireDeviceKey)
                    .route(web::post().to(whoami)),
            )
            .service(
                web::resource("/named")
                    .wrap(RequireDeviceKey)
                    .route(web::post().to(whoami_with_body)),
            )
            .route("/unguarded", web::post().to(whoami))
    }

    #[actix_web::test]
    async fn resolves_device_for_valid_key() {
        let mut auth = MockDeviceAuthentication::new();
        auth.expect_authenticate()
            .withf(|key| key.expose() == "kiosk-secret")
            .times(1)
            .return_once(|_| Ok(kiosk(DeviceStatus::Online)));

        let app = actix_test::init_service(guarded_app(state_with(auth))).await;
        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/whoami")
                .insert_header((AUTHORIZATION, "Bearer kiosk-secret"))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(actix_test::read_body(res).await, "KIOSK-01");
    }

    #[actix_web::test]
    async fn missing_key_never_reaches_authentication() {
        let mut auth = MockDeviceAuthentication::new();
        auth.expect_authenticate().never();

        let app = actix_test::init_service(guarded_app(state_with(auth))).await;
        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::post().uri("/whoami").to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(res.headers().contains_key("www-authenticate"));
    }

    #[rstest]
    #[case::empty_object("{}")]
    #[case::not_json("{")]
    #[actix_web::test]
    async fn unknown_key_is_rejected_before_the_body_is_read(#[case] body: &'static str) {
        let app = actix_test::init_service(guarded_app(state_with(YieldingRejection))).await;
        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/named")
                .insert_header((AUTHORIZATION, "Bearer unknown"))
                .insert_header(("content-type", "application/json"))
                .set_payload(body)
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn unguarded_route_fails_closed() {
        let mut auth = MockDeviceAuthentication::new();
        auth.expect_authenticate().never();

        let app = actix_test::init_service(guarded_app(state_with(auth))).await;
        let res = actix_test::call_service(
            &app,
            actix_test::TestRequest::post()
                .uri("/unguarded")
                .insert_header((AUTHORIZATION, "Bearer kiosk-secret"))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

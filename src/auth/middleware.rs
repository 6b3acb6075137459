use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;

fn unauthorized(req: ServiceRequest, body: serde_json::Value) -> ServiceResponse<BoxBody> {
    let resp = HttpResponse::Unauthorized().json(body);
    req.into_response(resp.map_into_boxed_body())
}

/// Verifies the bearer access token and stores the caller as [`AuthUser`].
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?
        .clone();

    let header_value = match req.headers().get("Authorization") {
        Some(h) => match h.to_str() {
            Ok(v) => v.to_owned(),
            Err(_) => {
                return Ok(unauthorized(
                    req,
                    json!({"message": "Invalid Authorization header encoding"}),
                ));
            }
        },
        None => {
            return Ok(unauthorized(req, json!({"message": "Missing Authorization header"})));
        }
    };

    let token = match header_value.strip_prefix("Bearer ") {
        Some(t) => t,
        None => {
            return Ok(unauthorized(
                req,
                json!({"message": "Authorization header must start with Bearer"}),
            ));
        }
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "Token rejected");
            return Ok(unauthorized(req, json!({"message": "Invalid or expired token"})));
        }
    };

    let auth_user = match AuthUser::from_claims(claims) {
        Ok(user) => user,
        Err(e) => return Ok(unauthorized(req, json!({"message": e.to_string()}))),
    };

    tracing::debug!(user_id = auth_user.user_id, role = %auth_user.role, "Authenticated");
    req.extensions_mut().insert(auth_user);

    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::generate_access_token;
    use actix_web::{App, HttpResponse, http::StatusCode, middleware::from_fn, test, web};

    async fn whoami(auth: AuthUser) -> HttpResponse {
        HttpResponse::Ok().body(auth.username)
    }

    #[actix_web::test]
    async fn guards_protected_scope() {
        let cfg = Config::for_tests();
        let token = generate_access_token(3, "hr-lead".into(), 2, &cfg.jwt_secret, 60).unwrap();

        let app = test::init_service(
            App::new().app_data(Data::new(cfg)).service(
                web::scope("/api")
                    .wrap(from_fn(auth_middleware))
                    .route("/whoami", web::get().to(whoami)),
            ),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/whoami").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/api/whoami")
            .insert_header(("Authorization", "Token abc"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/api/whoami")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert_eq!(body, "hr-lead");
    }

    #[actix_web::test]
    async fn bad_token_body_is_message_only() {
        let app = test::init_service(
            App::new().app_data(Data::new(Config::for_tests())).service(
                web::scope("/api")
                    .wrap(from_fn(auth_middleware))
                    .route("/whoami", web::get().to(whoami)),
            ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/whoami")
            .insert_header(("Authorization", "Bearer not.a.jwt"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body, serde_json::json!({"message": "Invalid or expired token"}));
    }
}

use crate::{
    api::{attendance, fuel_requisition, leave, overtime, salary_sheet, users},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Result, anyhow};
use std::sync::Arc;

pub type Limiter = Governor<PeerIpKeyExtractor, NoOpMiddleware>;

/// Per-route limiters, built once at startup and shared by every worker.
#[derive(Clone)]
pub struct Limiters {
    pub login: Arc<Limiter>,
    pub register: Arc<Limiter>,
    pub refresh: Arc<Limiter>,
    pub protected: Arc<Limiter>,
}

fn build_limiter(requests_per_min: u32) -> Result<Limiter> {
    // 0 means "effectively unlimited": one token per millisecond
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        60_000 / u64::from(requests_per_min)
    };
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms.max(1))
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit of {requests_per_min}/min"))?;
    Ok(Governor::new(&cfg))
}

impl Limiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Limiters {
            login: Arc::new(build_limiter(config.rate_login_per_min)?),
            register: Arc::new(build_limiter(config.rate_register_per_min)?),
            refresh: Arc::new(build_limiter(config.rate_refresh_per_min)?),
            protected: Arc::new(build_limiter(config.rate_protected_per_min)?),
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(limiters.register.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes. Fixed segments go before `/{id}` so they are matched first.
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(limiters.protected.clone())
            .service(
                web::scope("/attendance")
                    .service(
                        web::resource("")
                            .route(web::get().to(attendance::list_attendance))
                            .route(web::post().to(attendance::mark_attendance)),
                    )
                    .route("/bulk", web::post().to(attendance::bulk_mark_attendance))
                    .route("/check-in", web::post().to(attendance::check_in))
                    .route("/check-out", web::post().to(attendance::check_out))
                    .route("/summary", web::get().to(attendance::monthly_summary))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(attendance::get_attendance))
                            .route(web::patch().to(attendance::update_attendance))
                            .route(web::delete().to(attendance::delete_attendance)),
                    ),
            )
            .service(
                web::scope("/leaves")
                    .service(
                        web::resource("")
                            .route(web::get().to(leave::list_leaves))
                            .route(web::post().to(leave::apply_leave)),
                    )
                    .service(
                        web::resource("/allowance")
                            .route(web::get().to(leave::get_allowance))
                            .route(web::put().to(leave::set_allowance)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(leave::get_leave))
                            .route(web::delete().to(leave::cancel_leave)),
                    )
                    .route("/{id}/status", web::patch().to(leave::decide_leave)),
            )
            .service(
                web::scope("/instructor-overtime")
                    .service(
                        web::resource("")
                            .route(web::get().to(overtime::list_claims))
                            .route(web::post().to(overtime::submit_claim)),
                    )
                    .route("/summary", web::get().to(overtime::monthly_summary))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(overtime::get_claim))
                            .route(web::put().to(overtime::update_claim))
                            .route(web::delete().to(overtime::delete_claim)),
                    )
                    .route("/{id}/verify", web::patch().to(overtime::verify_claim)),
            )
            .service(
                web::scope("/users")
                    .route("", web::get().to(users::list_users))
                    .route("/me", web::get().to(users::me))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(users::get_user))
                            .route(web::patch().to(users::update_user))
                            .route(web::delete().to(users::delete_user)),
                    ),
            )
            .service(
                web::scope("/salary-sheets")
                    .service(
                        web::resource("")
                            .route(web::get().to(salary_sheet::list_sheets))
                            .route(web::post().to(salary_sheet::create_sheet)),
                    )
                    .route("/preview", web::post().to(salary_sheet::preview_sheet))
                    .route("/generate", web::post().to(salary_sheet::generate_sheets))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(salary_sheet::get_sheet))
                            .route(web::patch().to(salary_sheet::update_sheet))
                            .route(web::delete().to(salary_sheet::delete_sheet)),
                    ),
            )
            .service(
                web::scope("/fuel-requisitions")
                    .service(
                        web::resource("")
                            .route(web::get().to(fuel_requisition::list_requisitions))
                            .route(web::post().to(fuel_requisition::create_requisition)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(fuel_requisition::get_requisition))
                            .route(web::delete().to(fuel_requisition::delete_requisition)),
                    )
                    .route(
                        "/{id}/status",
                        web::patch().to(fuel_requisition::decide_requisition),
                    )
                    .route(
                        "/{id}/items/{item_id}/verify",
                        web::patch().to(fuel_requisition::verify_item),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (ACCESS_TOKEN_TTL, 15 min by default)
//  └─ refresh_token (REFRESH_TOKEN_TTL, 7 days by default)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with Bearer refresh_token
//       └─ revokes it, returns a new pair

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiters_build_from_defaults() {
        assert!(Limiters::from_config(&Config::for_tests()).is_ok());
    }

    #[test]
    fn zero_means_unthrottled_not_an_error() {
        assert!(build_limiter(0).is_ok());
        assert!(build_limiter(100_000).is_ok());
    }
}

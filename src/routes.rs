use crate::{
    api::{attendance, dashboard},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::Context;
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-IP limiters, built once and shared by every worker.
#[derive(Clone)]
pub struct RateLimits {
    login: Limiter,
    register: Limiter,
    refresh: Limiter,
    protected: Limiter,
}

fn build_limiter(name: &str, requests_per_min: u32) -> anyhow::Result<Limiter> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);

    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .with_context(|| format!("invalid {name} rate limit"))?;

    Ok(Arc::new(Governor::new(&cfg)))
}

impl RateLimits {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            login: build_limiter("login", config.rate_login_per_min)?,
            register: build_limiter("register", config.rate_register_per_min)?,
            refresh: build_limiter("refresh", config.rate_refresh_per_min)?,
            protected: build_limiter("protected", config.rate_protected_per_min)?,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limits: RateLimits) {
    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limits.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(limits.register.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limits.refresh.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limits.login.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(limits.protected)
            .service(
                web::scope("/attendance")
                    .route("/checkin", web::post().to(attendance::check_in))
                    .route("/checkout", web::post().to(attendance::check_out))
                    .route("/today", web::get().to(attendance::today))
                    .route("/my-history", web::get().to(attendance::my_history))
                    .route("/my-summary", web::get().to(attendance::my_summary))
                    // manager
                    .route("/all", web::get().to(attendance::all_attendance))
                    .route("/summary", web::get().to(attendance::team_summary))
                    .route("/export", web::get().to(attendance::export))
                    .route("/today-status", web::get().to(attendance::today_status))
                    .route(
                        "/employee/{id}",
                        web::get().to(attendance::employee_attendance),
                    )
                    .route(
                        "/employee/{id}/{date}",
                        web::delete().to(attendance::mark_absent),
                    ),
            )
            .service(
                web::scope("/dashboard")
                    .route("/employee", web::get().to(dashboard::employee_dashboard))
                    .route("/manager", web::get().to(dashboard::manager_dashboard)),
            )
            .service(
                web::scope("/auth")
                    .route("/me", web::get().to(handlers::me))
                    .route(
                        "/pending-approvals",
                        web::get().to(handlers::pending_approvals),
                    )
                    .route("/approve/{id}", web::put().to(handlers::approve_user))
                    .route("/reject/{id}", web::delete().to(handlers::reject_user)),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with Authorization: Bearer refresh_token
//       └─ returns a new pair; the old refresh token is revoked

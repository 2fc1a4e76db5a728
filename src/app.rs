use std::{net::SocketAddr, time::Duration};

use axum::{
    http::{HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    auth, mailer, response::DefaultResponse, state::AppState, throttle::throttle, users,
};

pub fn build_app(state: AppState) -> Router {
    let status_limit = from_fn_with_state(
        state.throttle("status", 5, Duration::from_secs(60)),
        throttle,
    );

    Router::new()
        .route("/status", get(status).layer(status_limit))
        .merge(auth::router(&state))
        .merge(users::router())
        .merge(mailer::handlers::contact_routes(&state))
        .layer(from_fn_with_state(state.global_throttle(), throttle))
        .layer(cors(&state))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
                        }
                    },
                ),
        )
        .with_state(state)
}

async fn status() -> DefaultResponse<()> {
    DefaultResponse::message("Server is working")
}

/// Open outside production; in production only the frontend origin.
fn cors(state: &AppState) -> CorsLayer {
    if !state.config.production {
        return CorsLayer::permissive();
    }
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);
    match HeaderValue::from_str(state.config.frontend_link.trim_end_matches('/')) {
        Ok(origin) => base.allow_origin(origin),
        Err(e) => {
            tracing::warn!(error = %e, "FRONTEND_LINK is not a valid origin; cross-origin requests disabled");
            base
        }
    }
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

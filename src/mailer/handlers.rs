use std::time::Duration;

use axum::{extract::State, middleware::from_fn_with_state, routing::post, Router};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::templates;
use crate::{
    auth::password::is_valid_email,
    error::{AppError, AppResult},
    payload::{Payload, Validate},
    response::DefaultResponse,
    state::AppState,
    throttle::throttle,
};

#[derive(Debug, Deserialize)]
pub struct ContactUsRequest {
    pub email: String,
    pub subject: String,
    pub message: String,
}

fn check_len(value: &str, field: &str, min: usize, max: usize) -> Result<(), AppError> {
    let len = value.trim().chars().count();
    if (min..=max).contains(&len) {
        Ok(())
    } else {
        Err(AppError::bad_request(format!(
            "{field} must be between {min} and {max} characters"
        )))
    }
}

impl Validate for ContactUsRequest {
    fn validate(&self) -> Result<(), AppError> {
        if !is_valid_email(self.email.trim()) {
            return Err(AppError::bad_request("Invalid email"));
        }
        check_len(&self.subject, "subject", 6, 52)?;
        check_len(&self.message, "message", 6, 2048)
    }
}

pub fn contact_routes(state: &AppState) -> Router<AppState> {
    Router::new().route(
        "/customers/contact-us",
        post(contact_us).layer(from_fn_with_state(
            state.throttle("contact-us", 1, Duration::from_secs(60)),
            throttle,
        )),
    )
}

#[instrument(skip(state, payload))]
pub async fn contact_us(
    State(state): State<AppState>,
    Payload(payload): Payload<ContactUsRequest>,
) -> AppResult<DefaultResponse<()>> {
    let Some(admin) = state.config.mailer.admin_mail.as_deref() else {
        warn!("contact form used but ADMIN_MAIL is not configured");
        return Err(AppError::Internal(anyhow::anyhow!("ADMIN_MAIL is not configured")));
    };
    let from = payload.email.trim();
    state
        .mailer
        .send(templates::contact_form(
            admin,
            from,
            payload.subject.trim(),
            payload.message.trim(),
        ))
        .await?;
    info!(%from, "contact message forwarded");
    Ok(DefaultResponse::message(
        "Your email were sent successfully. We will send you a response in 12-48 hours",
    ))
}

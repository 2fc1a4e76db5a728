use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::password::{is_valid_email, is_valid_password, PASSWORD_POLICY_MESSAGE};
use crate::{error::AppError, payload::Validate, users::model::PublicUser};

fn check_email(email: &str) -> Result<(), AppError> {
    if is_valid_email(email.trim()) {
        Ok(())
    } else {
        Err(AppError::bad_request("Invalid email"))
    }
}

fn check_password(password: &str) -> Result<(), AppError> {
    if is_valid_password(password) {
        Ok(())
    } else {
        Err(AppError::bad_request(PASSWORD_POLICY_MESSAGE))
    }
}

fn check_present(value: &str, field: &str) -> Result<(), AppError> {
    if value.is_empty() {
        Err(AppError::bad_request(format!("{field} should not be empty")))
    } else {
        Ok(())
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), AppError> {
        check_email(&self.email)?;
        check_present(&self.password, "password")
    }
}

/// Request body for starting a registration.
#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
}

impl Validate for SignUpRequest {
    fn validate(&self) -> Result<(), AppError> {
        check_email(&self.email)?;
        check_password(&self.password)
    }
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

impl Validate for ForgotPasswordRequest {
    fn validate(&self) -> Result<(), AppError> {
        check_email(&self.email)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub new_password: String,
    pub repeat_password: String,
}

impl Validate for ResetPasswordRequest {
    fn validate(&self) -> Result<(), AppError> {
        check_password(&self.new_password)?;
        if self.new_password != self.repeat_password {
            return Err(AppError::bad_request(
                "Password and repeat password does not match",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEmailRequest {
    pub new_email: String,
    pub password: String,
}

impl Validate for ChangeEmailRequest {
    fn validate(&self) -> Result<(), AppError> {
        check_email(&self.new_email)?;
        check_present(&self.password, "password")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

impl Validate for ChangePasswordRequest {
    fn validate(&self) -> Result<(), AppError> {
        check_present(&self.old_password, "oldPassword")?;
        check_password(&self.new_password)
    }
}

/// Names the account to delete; users may only name themselves unless
/// they are a superadmin.
#[derive(Debug, Deserialize)]
pub struct DeleteProfileRequest {
    pub id: Uuid,
}

impl Validate for DeleteProfileRequest {
    fn validate(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Response returned after login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub user: PublicUser,
}

use serde::Deserialize;
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
};

use super::{
    model::Role,
    store::{DateRange, SortOrder, UserDateField, UserFilter},
};
use crate::{
    auth::password::{is_valid_email, is_valid_password, PASSWORD_POLICY_MESSAGE},
    error::AppError,
    payload::Validate,
};

pub const MAX_PAGE_SIZE: u64 = 100;

/// Admin edit of a user. When `email` is present it is applied on its own.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

impl Validate for UpdateUserRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.email.is_none() && self.password.is_none() && self.role.is_none() {
            return Err(AppError::bad_request(
                "At least one of email, password or role must be provided",
            ));
        }
        if let Some(email) = &self.email {
            if !is_valid_email(email.trim()) {
                return Err(AppError::bad_request("Invalid email"));
            }
        }
        if let Some(password) = &self.password {
            if !is_valid_password(password) {
                return Err(AppError::bad_request(PASSWORD_POLICY_MESSAGE));
            }
        }
        Ok(())
    }
}

/// Query string of `GET /users`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQueryParams {
    pub email: Option<String>,
    pub role: Option<Role>,
    pub date: Option<UserDateField>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub order: Option<SortOrder>,
    pub order_by: Option<UserDateField>,
    pub limit: Option<u64>,
    pub page: Option<u64>,
}

/// RFC 3339 instant, or a bare `YYYY-MM-DD` taken as the start (or end,
/// when `end_of_day`) of that UTC day.
fn parse_instant(raw: &str, field: &str, end_of_day: bool) -> Result<OffsetDateTime, AppError> {
    if let Ok(at) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(at);
    }
    let date = Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .map_err(|_| AppError::bad_request(format!("{field} must be an RFC 3339 date")))?;
    let at = if end_of_day {
        date.with_hms_nano(23, 59, 59, 999_999_999)
    } else {
        date.with_hms(0, 0, 0)
    }
    .map_err(|_| AppError::bad_request(format!("{field} is out of range")))?;
    Ok(at.assume_utc())
}

impl TryFrom<UserQueryParams> for UserFilter {
    type Error = AppError;

    fn try_from(q: UserQueryParams) -> Result<Self, Self::Error> {
        let defaults = UserFilter::default();

        let limit = q.limit.unwrap_or(defaults.limit);
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(AppError::bad_request(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        let page = q.page.unwrap_or(defaults.page);
        if page < 1 {
            return Err(AppError::bad_request("page must be at least 1"));
        }
        match (page - 1).checked_mul(limit) {
            Some(offset) if offset <= i64::MAX as u64 => {}
            _ => return Err(AppError::bad_request("page is out of range")),
        }

        let from = q
            .from_date
            .as_deref()
            .map(|raw| parse_instant(raw, "fromDate", false))
            .transpose()?;
        let to = q
            .to_date
            .as_deref()
            .map(|raw| parse_instant(raw, "toDate", true))
            .transpose()?;
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(AppError::bad_request("fromDate must not be after toDate"));
            }
        }
        let date_range = (from.is_some() || to.is_some()).then(|| DateRange {
            field: q.date.unwrap_or_default(),
            from,
            to,
        });

        Ok(UserFilter {
            email: q.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()),
            role: q.role,
            date_range,
            order: q.order.unwrap_or(defaults.order),
            order_by: q.order_by.unwrap_or(defaults.order_by),
            limit,
            page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_defaults() {
        let filter = UserFilter::try_from(UserQueryParams::default()).unwrap();
        assert_eq!(filter.limit, 10);
        assert_eq!(filter.page, 1);
        assert_eq!(filter.order, SortOrder::Desc);
        assert_eq!(filter.order_by, UserDateField::CreatedAt);
        assert!(filter.date_range.is_none());
    }

    #[test]
    fn query_parses_camel_case_and_dates() {
        let q: UserQueryParams = serde_json::from_value(serde_json::json!({
            "email": " GMAIL ",
            "role": "admin",
            "date": "updatedAt",
            "fromDate": "2024-01-01",
            "toDate": "2024-01-31T12:00:00Z",
            "order": "asc",
            "orderBy": "updatedAt",
            "limit": 25,
            "page": 3
        }))
        .unwrap();
        let filter = UserFilter::try_from(q).unwrap();
        assert_eq!(filter.email.as_deref(), Some("GMAIL"));
        assert_eq!(filter.role, Some(Role::Admin));
        assert_eq!(filter.order, SortOrder::Asc);
        assert_eq!(filter.order_by, UserDateField::UpdatedAt);
        assert_eq!(filter.offset(), 50);
        let range = filter.date_range.unwrap();
        assert_eq!(range.field, UserDateField::UpdatedAt);
        assert_eq!(range.from.unwrap().unix_timestamp(), 1_704_067_200);
    }

    #[test]
    fn query_rejects_bad_paging_and_dates() {
        for q in [
            UserQueryParams { limit: Some(0), ..Default::default() },
            UserQueryParams { limit: Some(101), ..Default::default() },
            UserQueryParams { page: Some(0), ..Default::default() },
            UserQueryParams { from_date: Some("yesterday".into()), ..Default::default() },
            UserQueryParams {
                from_date: Some("2024-02-01".into()),
                to_date: Some("2024-01-01".into()),
                ..Default::default()
            },
        ] {
            assert!(matches!(UserFilter::try_from(q), Err(AppError::BadRequest(_))));
        }
    }

    #[test]
    fn query_rejects_page_past_addressable_offset() {
        let huge = UserQueryParams {
            page: Some(u64::MAX),
            limit: Some(100),
            ..Default::default()
        };
        assert!(matches!(UserFilter::try_from(huge), Err(AppError::BadRequest(_))));

        let last = UserQueryParams {
            page: Some(i64::MAX as u64 / 100 + 1),
            limit: Some(100),
            ..Default::default()
        };
        let filter = UserFilter::try_from(last).unwrap();
        assert!(filter.offset() <= i64::MAX as u64);

        let unchecked = UserFilter {
            page: u64::MAX,
            limit: 100,
            ..Default::default()
        };
        assert_eq!(unchecked.offset(), u64::MAX);
    }

    #[test]
    fn update_requires_some_field() {
        assert!(UpdateUserRequest::default().validate().is_err());
        let role_only = UpdateUserRequest {
            role: Some(Role::Admin),
            ..Default::default()
        };
        assert!(role_only.validate().is_ok());
        let weak = UpdateUserRequest {
            password: Some("short".into()),
            ..Default::default()
        };
        assert!(weak.validate().is_err());
    }
}

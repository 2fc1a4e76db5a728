use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Standard success envelope: `{message, statusCode, data?}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultResponse<T> {
    pub message: String,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl DefaultResponse<()> {
    pub fn message<M: Into<String>>(message: M) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::OK.as_u16(),
            data: None,
        }
    }
}

impl<T> DefaultResponse<T> {
    pub fn with_data<M: Into<String>>(message: M, data: T) -> Self {
        Self {
            message: message.into(),
            status_code: StatusCode::OK.as_u16(),
            data: Some(data),
        }
    }
}

impl<T: Serialize> IntoResponse for DefaultResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub total: u64,
    pub total_pages: u64,
    pub limit_per_page: u64,
    pub current_page: u64,
    pub data: Vec<T>,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: u64, limit: u64, page: u64) -> Self {
        Self {
            total,
            total_pages: total.div_ceil(limit.max(1)),
            limit_per_page: limit,
            current_page: page,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_only_envelope_omits_data() {
        let json = serde_json::to_value(DefaultResponse::message("Server is working")).unwrap();
        assert_eq!(json["message"], "Server is working");
        assert_eq!(json["statusCode"], 200);
        assert!(json.get("data").is_none());
    }

    #[test]
    fn paginated_rounds_pages_up() {
        let page = PaginatedResponse::new(vec![1, 2, 3], 21, 10, 3);
        assert_eq!(page.total_pages, 3);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["limitPerPage"], 10);
        assert_eq!(json["currentPage"], 3);

        let empty: PaginatedResponse<u8> = PaginatedResponse::new(vec![], 0, 10, 1);
        assert_eq!(empty.total_pages, 0);
    }
}

//! Standard response envelope helpers.
//!
//! Every JSON body is `{"Success": bool, "Message": string, "Data": ...}`.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use std::fmt::Display;

#[derive(Debug, Serialize)]
pub struct BaseResponse {
    #[serde(rename = "Success")]
    pub success: bool,
    #[serde(rename = "Message")]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ModelResponse<T> {
    #[serde(flatten)]
    pub base: BaseResponse,
    #[serde(rename = "Data")]
    pub data: T,
}

fn res_model<T>(success: bool, data: T, message: Option<&dyn Display>) -> ModelResponse<T> {
    ModelResponse {
        base: BaseResponse {
            success,
            message: message.map(|m| m.to_string()).unwrap_or_default(),
        },
        data,
    }
}

pub fn ok<T: Serialize>(model: T) -> (StatusCode, Json<ModelResponse<T>>) {
    ok_code(StatusCode::OK, model)
}

pub fn ok_code<T: Serialize>(code: StatusCode, model: T) -> (StatusCode, Json<ModelResponse<T>>) {
    (code, Json(res_model(true, model, None)))
}

/// Failure envelope with `Data: null` and the error text as message.
pub fn fail_code<E: Display>(code: StatusCode, message: E) -> (StatusCode, Json<ModelResponse<Option<()>>>) {
    (code, Json(res_model(false, None, Some(&message))))
}

pub fn fail<E: Display>(message: E) -> (StatusCode, Json<ModelResponse<Option<()>>>) {
    fail_code(StatusCode::INTERNAL_SERVER_ERROR, message)
}

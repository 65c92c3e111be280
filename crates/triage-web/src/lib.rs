//! 分诊 HTTP 接口
//!
//! 自助机签到、紧急按钮和护士看板的 REST API

pub mod handlers;
pub mod server;

pub use handlers::{ApiError, AppState, QueueQueryParams, DEFAULT_SESSION, SESSION_HEADER};
pub use server::{create_app, WebServer};

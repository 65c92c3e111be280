//! Web服务器

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use triage_admin::ServerConfig;
use triage_core::Result;

use crate::handlers::{
    advance_patient, api_root, call_patient, create_check_in, get_kiosk_status, get_patient,
    get_queue, get_queue_stats, health, metrics, trigger_emergency, update_patient_status,
    AppState,
};

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState, config: &ServerConfig) -> Self {
        let app = create_app(state, config);

        Self { addr, app }
    }

    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// 运行直到收到关闭信号
    pub async fn run_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app)
            .with_graceful_shutdown(signal)
            .await?;

        info!("Web server stopped");
        Ok(())
    }
}

/// 构建完整路由
pub fn create_app(state: AppState, config: &ServerConfig) -> Router {
    let app = Router::new()
        // 根路径
        .route("/", get(api_root))

        // 健康检查与指标
        .route("/health", get(health))
        .route("/metrics", get(metrics))

        // API路由
        .nest("/api/v1", api_routes())
        .with_state(state)

        // 全局中间件
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(config.max_body_bytes)),
        );

    if config.enable_cors {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        app
    }
}

/// API v1 路由
fn api_routes() -> Router<AppState> {
    Router::new()
        // 自助机
        .route("/check-ins", post(create_check_in))
        .route("/emergency", post(trigger_emergency))
        .route("/kiosk/status", get(get_kiosk_status))

        // 护士看板
        .route("/queue", get(get_queue))
        .route("/queue/stats", get(get_queue_stats))
        .route("/patients/:id", get(get_patient))
        .route("/patients/:id/status", put(update_patient_status))
        .route("/patients/:id/call", post(call_patient))
        .route("/patients/:id/advance", post(advance_patient))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

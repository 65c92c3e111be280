//! 急诊分诊服务器主程序

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use triage_admin::{init_logging, ClassifierProvider, ConfigManager, TriageConfig, TriageMetrics};
use triage_classifier::{DisabledClassifier, GeminiClassifier, GeminiConfig, TriageClassifier};
use triage_web::{AppState, WebServer};
use triage_workflow::{EngineConfig, TriageEngine};

/// 分诊服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "triage-server")]
#[command(about = "QuickTriage ER 自助分诊签到与护士看板服务器")]
struct Args {
    /// 服务器端口
    #[arg(short, long)]
    port: Option<u16>,

    /// 监听地址
    #[arg(long)]
    host: Option<String>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别
    #[arg(short, long)]
    log_level: Option<String>,

    /// 不调用外部分类器，所有签到走人工分诊
    #[arg(long)]
    offline: bool,

    /// 打印生效配置（TOML）后退出
    #[arg(long)]
    print_config: bool,
}

impl Args {
    /// 命令行参数覆盖配置文件和环境变量
    fn apply(&self, config: &mut TriageConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.offline {
            config.classifier.provider = ClassifierProvider::Disabled;
        }
    }
}

fn build_classifier(config: &TriageConfig) -> anyhow::Result<Arc<dyn TriageClassifier>> {
    match config.classifier.provider {
        ClassifierProvider::Gemini => {
            let gemini = GeminiClassifier::new(GeminiConfig {
                endpoint: config.classifier.endpoint.clone(),
                model: config.classifier.model.clone(),
                api_key: config.classifier.api_key.clone(),
                request_timeout: config.classifier.timeout(),
            })?;
            Ok(Arc::new(gemini))
        }
        ClassifierProvider::Disabled => {
            warn!("分类器已禁用，所有签到将标记为人工分诊");
            Ok(Arc::new(DisabledClassifier))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let manager = ConfigManager::new(args.config.as_deref())?;
    let mut config = manager.get_config().await;
    args.apply(&mut config);

    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    manager
        .update_config(config.clone())
        .await
        .context("配置验证失败")?;

    // 初始化日志
    init_logging(&config.logging)?;

    info!("启动分诊服务器...");
    info!("分诊服务器配置:");
    info!("  名称: {}", config.server.name);
    info!("  监听地址: {}:{}", config.server.host, config.server.port);
    info!("  请求体上限: {} 字节", config.server.max_body_bytes);
    info!("  分类器: {:?} ({})", config.classifier.provider, config.classifier.model);
    info!("  分类超时: {} ms", config.classifier.timeout_ms);
    info!("  默认语言: {}", config.classifier.default_language);

    let classifier = build_classifier(&config)?;
    let engine = TriageEngine::new(
        classifier,
        EngineConfig {
            classifier_timeout: config.classifier.timeout(),
            default_language: config.classifier.default_language.clone(),
        },
    );
    let metrics = TriageMetrics::new()?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("无效的监听地址: {}", config.server.host))?;

    let server = WebServer::new(addr, AppState::new(engine, metrics), &config.server);

    if let Err(e) = server.run().await {
        error!("服务器运行失败: {}", e);
        return Err(e.into());
    }

    info!("分诊服务器已停止");
    Ok(())
}

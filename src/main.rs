use anyhow::Context;
use chatstream_lib::config::{apply_env_overrides, load_config, resolve_config_path};
use chatstream_lib::telemetry::init_tracing;
use chatstream_lib::{build_router, AppState};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = |key: &str| std::env::var(key).ok();

    let config_path = resolve_config_path(env);
    let loaded = load_config(&config_path)
        .with_context(|| format!("加载配置失败: {}", config_path.display()))?;
    let from_file = loaded.is_some();
    let mut config = loaded.unwrap_or_default();
    apply_env_overrides(&mut config, env);

    init_tracing(&config.logging);
    if !from_file {
        info!(path = %config_path.display(), "配置文件不存在，使用默认配置");
    }
    config.validate()?;

    info!(
        config = %config_path.display(),
        upstream = ?config.upstream,
        timeout_ms = config.stream.timeout_ms,
        "配置已加载"
    );

    let state = AppState::new(&config)?;
    let app = build_router(state);

    let addr = config.server.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("监听 {} 失败", addr))?;
    info!(addr = %addr, "服务已启动");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("服务异常退出")?;

    info!("服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "无法监听 Ctrl-C 信号");
        std::future::pending::<()>().await;
    }
    info!("收到停止信号，正在关闭");
}

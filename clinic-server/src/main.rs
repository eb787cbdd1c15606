//! 诊所排队与预约服务器主程序

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use clinic_admin::{init_logging, ConfigManager, ConfigOverrides};
use clinic_database::{DatabaseOptions, DatabasePool, DatabaseQueries};
use clinic_web::{AppState, AuthService, WebOptions, WebServer};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use tracing::{error, info};

/// 服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "clinic-server")]
#[command(about = "Klinik: antrian pasien dan janji temu dokter")]
struct Args {
    /// 服务器端口
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 数据库连接串
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// 日志级别
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut manager = ConfigManager::load(args.config.as_deref())?;
    manager.apply_overrides(ConfigOverrides {
        port: args.port,
        database_url: args.database_url,
        log_level: args.log_level,
    });
    manager.validate()?;
    let config = manager.into_config();

    // 初始化日志
    init_logging(&config.logging)?;

    info!("Starting clinic server...");
    info!("  Listen: {}:{}", config.server.host, config.server.port);
    info!("  Database pool: {}..{} connections", config.database.min_connections, config.database.max_connections);

    let db = DatabasePool::connect(&DatabaseOptions {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        min_connections: config.database.min_connections,
        acquire_timeout: config.database.acquire_timeout(),
    })
    .await
    .context("Failed to connect to database")?;

    if config.database.auto_migrate {
        let queries = DatabaseQueries::new(&db);
        queries.create_tables().await.context("Failed to create tables")?;
        queries.create_indexes().await.context("Failed to create indexes")?;
        info!("Database schema is up to date");
    }

    let auth = AuthService::new(&config.auth.jwt_secret, config.auth.token_ttl_hours);
    let state = AppState::new(db.clone(), auth);

    let options = WebOptions {
        static_dir: config.web.static_dir.as_ref().map(PathBuf::from),
        cors_allowed_origins: config.web.cors_allowed_origins.clone(),
    };
    let addr = resolve_addr(&config.server.host, config.server.port)?;

    let result = WebServer::new(addr, state, &options).run().await;
    db.close().await;

    if let Err(e) = result {
        error!("Server stopped with error: {}", e);
        return Err(e.into());
    }

    Ok(())
}

fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?
        .next()
        .ok_or_else(|| anyhow!("No address resolved for {}:{}", host, port))
}

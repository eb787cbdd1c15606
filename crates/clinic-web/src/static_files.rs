//! 前端静态文件服务

use std::path::{Path, PathBuf};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};

/// 静态文件配置
#[derive(Debug, Clone)]
pub struct StaticFileConfig {
    pub root_dir: PathBuf,
    pub index_file: String,
}

impl StaticFileConfig {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            index_file: "index.html".to_string(),
        }
    }

    fn index_path(&self) -> PathBuf {
        self.root_dir.join(&self.index_file)
    }
}

/// 前端单页应用服务
///
/// 找不到的路径回退到 `index.html`，由前端路由处理。目录不存在时返回 None。
pub fn spa_service(config: &StaticFileConfig) -> Option<ServeDir<ServeFile>> {
    if !is_dir(&config.root_dir) {
        warn!(
            "Static directory {} not found, frontend will not be served",
            config.root_dir.display()
        );
        return None;
    }

    info!("Serving frontend from {}", config.root_dir.display());
    Some(
        ServeDir::new(&config.root_dir)
            .append_index_html_on_directories(true)
            .fallback(ServeFile::new(config.index_path())),
    )
}

fn is_dir(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

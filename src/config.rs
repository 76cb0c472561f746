//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `XINYU__*` 覆盖（双下划线表示嵌套，如 `XINYU__LLM__PROVIDER=mock`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::RetryPolicy;
use crate::llm::{SILICONFLOW_BASE_URL, SILICONFLOW_DEFAULT_MODEL};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub summary: SummarySection,
}

/// [app] 段：应用名、数据目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 本地数据库所在目录，未设置时用 ./data
    pub data_dir: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            data_dir: PathBuf::from("data"),
        }
    }
}

impl AppSection {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("xinyu.db")
    }
}

/// [llm] 段：后端选择、端点、采样温度与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：siliconflow / mock；siliconflow 无密钥时退回 mock
    pub provider: String,
    pub base_url: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
    pub chat_temperature: f64,
    pub summary_temperature: f64,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "siliconflow".to_string(),
            base_url: Some(SILICONFLOW_BASE_URL.to_string()),
            model: SILICONFLOW_DEFAULT_MODEL.to_string(),
            api_key: None,
            chat_temperature: 0.7,
            summary_temperature: 0.5,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次请求上限（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 30 }
    }
}

/// [summary] 段：总结失败后的重试次数与间隔
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummarySection {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for SummarySection {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay_ms: 2000,
        }
    }
}

impl SummarySection {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_delay_ms))
    }
}

/// 从 config 目录加载配置，环境变量 XINYU__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 XINYU__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("XINYU")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

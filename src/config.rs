use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub matching: MatchingConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// 匹配/分配阈值，一次运行内固定不变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// 商品模糊匹配的最低分 (含)，低于此分视为未匹配
    pub partial_min_score: u8,
    /// 关联商品判定的名称相似度下限
    pub related_min_similarity: u8,
    /// 关联商品子串包含判定所需的最短名称长度
    pub related_substring_min_len: usize,
    /// 退货数量是否回补库存
    pub restock_returns: bool,
    /// 同一订单的行是否整体归入同一张表
    pub keep_orders_together: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub max_orders_per_sheet: usize,
    pub top_reasons: usize,
    pub output_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            partial_min_score: 70,
            related_min_similarity: 80,
            related_substring_min_len: 10,
            restock_returns: true,
            keep_orders_together: true,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_orders_per_sheet: 200,
            top_reasons: 5,
            output_dir: "output".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            matching: MatchingConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl AppConfig {
    /// 加载配置: 默认值 -> config/matcher.* (可选) -> DMS__* 环境变量
    ///
    /// 例如 `DMS__SERVER__PORT=9000`、`DMS__MATCHING__RESTOCK_RETURNS=true`
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = AppConfig::default();

        Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", defaults.server.port as i64)?
            .set_default(
                "matching.partial_min_score",
                defaults.matching.partial_min_score as i64,
            )?
            .set_default(
                "matching.related_min_similarity",
                defaults.matching.related_min_similarity as i64,
            )?
            .set_default(
                "matching.related_substring_min_len",
                defaults.matching.related_substring_min_len as i64,
            )?
            .set_default("matching.restock_returns", defaults.matching.restock_returns)?
            .set_default(
                "matching.keep_orders_together",
                defaults.matching.keep_orders_together,
            )?
            .set_default(
                "report.max_orders_per_sheet",
                defaults.report.max_orders_per_sheet as i64,
            )?
            .set_default("report.top_reasons", defaults.report.top_reasons as i64)?
            .set_default("report.output_dir", defaults.report.output_dir)?
            .add_source(File::with_name("config/matcher").required(false))
            .add_source(
                Environment::with_prefix("DMS")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

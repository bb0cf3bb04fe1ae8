/// 引擎配置 - 所有可调参数
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/bolt | 工作目录 (订单数据库、日志) |
/// | PAYMENT_TTL_SECS | 600 | 下单后的付款期限(秒) |
/// | SWEEP_INTERVAL_SECS | 30 | 过期订单扫描间隔(秒) |
/// | RESERVE_LOCK_TIMEOUT_MS | 250 | 库存锁获取超时(毫秒) |
/// | ENVIRONMENT | development | 运行环境 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/bolt PAYMENT_TTL_SECS=300 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储订单数据库等文件
    pub work_dir: String,
    /// Seconds a pending order may wait for payment before it expires
    pub payment_ttl_secs: u64,
    /// Seconds between expiry sweeps
    pub sweep_interval_secs: u64,
    /// How long a reservation may wait for the campaign lock before the
    /// caller gets RetryExhausted
    pub reserve_lock_timeout_ms: u64,
    /// 运行环境: development | staging | production
    pub environment: String,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/bolt".into()),
            payment_ttl_secs: std::env::var("PAYMENT_TTL_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(600),
            sweep_interval_secs: std::env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(30),
            reserve_lock_timeout_ms: std::env::var("RESERVE_LOCK_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(250),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, payment_ttl_secs: u64) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.payment_ttl_secs = payment_ttl_secs;
        config
    }

    /// Payment TTL in milliseconds (deadline arithmetic is in millis)
    pub fn payment_ttl_millis(&self) -> i64 {
        (self.payment_ttl_secs as i64) * 1000
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

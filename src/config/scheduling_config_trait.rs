// ==========================================
// 车间生产执行系统 - 排程配置读取 Trait
// ==========================================
// 职责: 定义排程引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use chrono::NaiveTime;
use std::error::Error;

// ==========================================
// SchedulingConfigReader Trait
// ==========================================
// 用途: 工作日历与重排引擎所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait SchedulingConfigReader: Send + Sync {
    // ===== 工作日历配置 =====

    /// 获取工作日开始时间
    ///
    /// # 默认值
    /// - 07:45
    async fn get_workday_start(&self) -> Result<NaiveTime, Box<dyn Error + Send + Sync>>;

    /// 获取周一至周四的下班时间
    ///
    /// # 默认值
    /// - 17:45
    async fn get_workday_end(&self) -> Result<NaiveTime, Box<dyn Error + Send + Sync>>;

    /// 获取周五的下班时间（周五提前下班）
    ///
    /// # 默认值
    /// - 16:45
    async fn get_friday_end(&self) -> Result<NaiveTime, Box<dyn Error + Send + Sync>>;

    /// 获取午休开始时间
    ///
    /// # 默认值
    /// - 13:00
    async fn get_break_start(&self) -> Result<NaiveTime, Box<dyn Error + Send + Sync>>;

    /// 获取午休结束时间
    ///
    /// # 默认值
    /// - 14:00
    async fn get_break_end(&self) -> Result<NaiveTime, Box<dyn Error + Send + Sync>>;

    // ===== 机台配置 =====

    /// 获取机台换型时间（分钟）
    ///
    /// # 默认值
    /// - 30
    async fn get_setup_minutes(&self) -> Result<i64, Box<dyn Error + Send + Sync>>;
}

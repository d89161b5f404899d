// ==========================================
// 车间生产执行系统 - 工作日历引擎
// ==========================================
// 车间作息: 周一至周五生产, 周五提前下班, 午休不计工时
// 所有时间参数来自配置层, 引擎本身无硬编码作息
// ==========================================

use crate::config::SchedulingConfigReader;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use std::error::Error;

// ==========================================
// WorkCalendar - 工作日历
// ==========================================
// 从配置快照构造; 构造后纯函数,无副作用
#[derive(Debug, Clone)]
pub struct WorkCalendar {
    workday_start: NaiveTime,
    workday_end: NaiveTime,
    friday_end: NaiveTime,
    break_start: NaiveTime,
    break_end: NaiveTime,
}

impl WorkCalendar {
    /// 从配置读取器加载日历参数
    pub async fn load<C: SchedulingConfigReader + ?Sized>(
        config: &C,
    ) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(Self {
            workday_start: config.get_workday_start().await?,
            workday_end: config.get_workday_end().await?,
            friday_end: config.get_friday_end().await?,
            break_start: config.get_break_start().await?,
            break_end: config.get_break_end().await?,
        })
    }

    /// 使用默认作息构造 (测试与无配置环境)
    pub fn with_defaults() -> Self {
        Self {
            workday_start: NaiveTime::from_hms_opt(7, 45, 0).unwrap(),
            workday_end: NaiveTime::from_hms_opt(17, 45, 0).unwrap(),
            friday_end: NaiveTime::from_hms_opt(16, 45, 0).unwrap(),
            break_start: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            break_end: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
        }
    }

    /// 是否为工作日 (周一至周五)
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// 严格下一个工作日 (跳过周末)
    pub fn next_working_day(&self, date: NaiveDate) -> NaiveDate {
        let mut next = date + Duration::days(1);
        while !self.is_working_day(next) {
            next += Duration::days(1);
        }
        next
    }

    /// 当天下班时间 (周五提前)
    pub fn workday_end_for(&self, date: NaiveDate) -> NaiveTime {
        if date.weekday() == Weekday::Fri {
            self.friday_end
        } else {
            self.workday_end
        }
    }

    /// 当天上班时间
    pub fn workday_start_time(&self) -> NaiveTime {
        self.workday_start
    }

    /// 当天可用工时 (小时, 扣除午休)
    pub fn work_hours_for(&self, date: NaiveDate) -> f64 {
        if !self.is_working_day(date) {
            return 0.0;
        }

        let total = self.workday_end_for(date) - self.workday_start;
        let brk = self.break_end - self.break_start;
        (total - brk).num_minutes() as f64 / 60.0
    }

    /// 将任意时刻规范化到最近的可用工作时刻
    ///
    /// - 周末 → 下一工作日上班
    /// - 上班前 → 当天上班
    /// - 午休中 → 午休结束
    /// - 下班后 → 下一工作日上班
    pub fn normalize(&self, at: NaiveDateTime) -> NaiveDateTime {
        let date = at.date();

        if !self.is_working_day(date) {
            return self.next_working_day(date).and_time(self.workday_start);
        }

        let t = at.time();
        if t < self.workday_start {
            return date.and_time(self.workday_start);
        }
        if t >= self.break_start && t < self.break_end {
            return date.and_time(self.break_end);
        }
        if t >= self.workday_end_for(date) {
            return self.next_working_day(date).and_time(self.workday_start);
        }

        at
    }

    /// 自给定时刻起消耗指定工时, 返回结束时刻
    ///
    /// 跨午休、跨夜、跨周末按日历顺延
    pub fn advance(&self, from: NaiveDateTime, hours: f64) -> NaiveDateTime {
        let mut cursor = self.normalize(from);
        let mut remaining = Duration::seconds((hours * 3600.0).round() as i64);

        while remaining > Duration::zero() {
            let date = cursor.date();
            let end = self.workday_end_for(date);

            // 当前连续可用时段的终点 (午休前或下班前)
            let segment_end = if cursor.time() < self.break_start {
                date.and_time(self.break_start.min(end))
            } else {
                date.and_time(end)
            };

            let available = segment_end - cursor;
            if available >= remaining {
                return cursor + remaining;
            }

            remaining = remaining - available;
            cursor = self.normalize(segment_end);
        }

        cursor
    }
}

use chrono::{ DateTime, SecondsFormat, Utc };
use std::time::Duration;

// 当前时间，格式与浏览器 Date.toISOString() 相同：2026-10-19T08:30:00.123Z
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// 把 ISO-8601 时间显示成 "October 19, 2026"，解析失败就原样返回
pub fn format_date(date_string: &str) -> String {
    match DateTime::parse_from_rfc3339(date_string) {
        Ok(date) => date.format("%B %-d, %Y").to_string(),
        Err(_) => date_string.to_string(),
    }
}

// 计算耗时，转换为人类易读的时间
pub fn format_duration(duration: Duration) -> (f64, &'static str) {
    if duration.as_secs() > 0 {
        (duration.as_secs_f64(), "s")
    } else if duration.as_millis() > 0 {
        (duration.as_millis() as f64, "ms")
    } else if duration.as_micros() > 0 {
        (duration.as_micros() as f64, "µs")
    } else {
        (duration.as_nanos() as f64, "ns")
    }
}

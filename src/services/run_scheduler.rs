use chrono::{DateTime, Duration, Months, NaiveTime, Utc};

use crate::models::ScanFrequency;

/// 计算扫描的下一次执行时间（UTC）
///
/// 当天的 `time_of_day` 若仍在 `now` 之后则直接使用，否则按频率推进一个周期。
/// hourly 忽略 `time_of_day`，始终为 `now + 1h`。返回值总是严格晚于 `now`。
pub fn next_run(
    frequency: ScanFrequency,
    time_of_day: NaiveTime,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let occurrence = now.date_naive().and_time(time_of_day).and_utc();

    match frequency {
        ScanFrequency::Hourly => now + Duration::hours(1),
        _ if occurrence > now => occurrence,
        ScanFrequency::Daily => occurrence + Duration::days(1),
        ScanFrequency::Weekly => occurrence + Duration::days(7),
        // 目标月份没有该日期时取月末
        ScanFrequency::Monthly => occurrence
            .checked_add_months(Months::new(1))
            .unwrap_or(occurrence + Duration::days(31)),
    }
}

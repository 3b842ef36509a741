//! ISO-8601 タイムスタンプ

use chrono::{NaiveDateTime, SecondsFormat, Utc};

/// 現在時刻（UTC, RFC 3339）
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// EXIFの日時 "YYYY-MM-DD HH:MM:SS" / "YYYY:MM:DD HH:MM:SS" をISO-8601へ
///
/// EXIFにはタイムゾーンがないため、そのままUTCとして扱う。
pub fn exif_to_iso8601(value: &str) -> Option<String> {
    let value = value.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y:%m:%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true))
}

//! 座標文字列 "lat,lon" の生成と検証

use crate::error::{Error, Result};

/// 緯度経度を "lat,lon" 形式に整形
pub fn format_coordinates(lat: f64, lon: f64) -> String {
    format!("{},{}", lat, lon)
}

/// "lat,lon" 形式を検証して緯度経度を返す
pub fn parse_coordinates(text: &str) -> Result<(f64, f64)> {
    let invalid = || Error::InvalidCoordinates(text.to_string());

    let (lat, lon) = text.split_once(',').ok_or_else(invalid)?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let lon: f64 = lon.trim().parse().map_err(|_| invalid())?;

    if !lat.is_finite() || !lon.is_finite() || lat.abs() > 90.0 || lon.abs() > 180.0 {
        return Err(invalid());
    }

    Ok((lat, lon))
}

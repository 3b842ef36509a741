use std::fs::File;
use std::io::BufReader;
use std::path::Path;

fn read_exif(path: &Path) -> Result<exif::Exif, Box<dyn std::error::Error>> {
    let file = File::open(path)?;
    let mut bufreader = BufReader::new(file);
    let exif_reader = exif::Reader::new();
    Ok(exif_reader.read_from_container(&mut bufreader)?)
}

pub fn extract_date(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let exif = read_exif(path)?;

    // DateTimeOriginal を探す
    if let Some(field) = exif.get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY) {
        return Ok(field.display_value().to_string());
    }

    // DateTime を探す
    if let Some(field) = exif.get_field(exif::Tag::DateTime, exif::In::PRIMARY) {
        return Ok(field.display_value().to_string());
    }

    Err("No date found in EXIF".into())
}

/// GPS座標（10進の緯度・経度）を取得
pub fn extract_gps(path: &Path) -> Result<(f64, f64), Box<dyn std::error::Error>> {
    let exif = read_exif(path)?;

    let lat = coordinate(&exif, exif::Tag::GPSLatitude, exif::Tag::GPSLatitudeRef)
        .ok_or("No GPSLatitude in EXIF")?;
    let lon = coordinate(&exif, exif::Tag::GPSLongitude, exif::Tag::GPSLongitudeRef)
        .ok_or("No GPSLongitude in EXIF")?;

    Ok((lat, lon))
}

fn coordinate(exif: &exif::Exif, tag: exif::Tag, ref_tag: exif::Tag) -> Option<f64> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match field.value {
        exif::Value::Rational(ref dms) => dms_to_degrees(dms, hemisphere(exif, ref_tag)),
        _ => None,
    }
}

/// 度・分・秒の3つの有理数を10進の度に変換（S/W は負）
fn dms_to_degrees(dms: &[exif::Rational], reference: Option<u8>) -> Option<f64> {
    if dms.len() < 3 {
        return None;
    }
    let degrees = dms[0].to_f64() + dms[1].to_f64() / 60.0 + dms[2].to_f64() / 3600.0;
    match reference {
        Some(b'S') | Some(b'W') => Some(-degrees),
        _ => Some(degrees),
    }
}

fn hemisphere(exif: &exif::Exif, tag: exif::Tag) -> Option<u8> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match field.value {
        exif::Value::Ascii(ref values) => values.first()?.first().copied(),
        _ => None,
    }
}

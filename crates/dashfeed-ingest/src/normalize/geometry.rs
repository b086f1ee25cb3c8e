// WKT geometry constructors
//
// Only numeric tokens ever reach the WKT text, so the expressions are safe to
// splice into a statement verbatim.

use crate::record::RawValue;
use dashfeed_common::sql::number_literal;

pub const SRID: u32 = 4326;

fn from_text(wkt: &str) -> String {
    format!("ST_GeomFromText('{}', {})", wkt, SRID)
}

fn is_number(token: &str) -> bool {
    token.parse::<f64>().map(|n| n.is_finite()).unwrap_or(false)
}

/// `"lat,lon lat,lon ..."` -> `POLYGON((lon lat,lon lat,...))`
///
/// Each pair is swapped and the original token text is kept. Returns `None`
/// for empty input or any pair that is not two numbers.
pub fn polygon_from_pairs(text: &str) -> Option<String> {
    let points = text
        .split_whitespace()
        .map(|pair| {
            let (a, b) = pair.split_once(',')?;
            let (a, b) = (a.trim(), b.trim());
            (is_number(a) && is_number(b)).then(|| format!("{} {}", b, a))
        })
        .collect::<Option<Vec<_>>>()?;

    if points.is_empty() {
        return None;
    }
    Some(from_text(&format!("POLYGON(({}))", points.join(","))))
}

fn position(items: &[RawValue]) -> Option<String> {
    let numbers = items
        .iter()
        .map(|v| match v {
            RawValue::Number(n) if n.is_finite() => Some(number_literal(*n)),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    (numbers.len() >= 2).then(|| numbers.join(" "))
}

/// Render a GeoJSON-style coordinate array as a WKT body: a position becomes
/// `x y`, and every level of nesting above it adds a parenthesized list.
fn coordinates_body(value: &RawValue) -> Option<String> {
    let items = value.as_list()?;
    if items.first().map(|v| matches!(v, RawValue::Number(_)))? {
        return position(items);
    }
    let parts = items
        .iter()
        .map(|item| {
            let body = coordinates_body(item)?;
            if item.as_list()?.first().map(|v| matches!(v, RawValue::Number(_)))? {
                Some(body)
            } else {
                Some(format!("({})", body))
            }
        })
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join(", "))
}

/// Geometry type plus coordinate array -> `TYPE(x y, x y)`
pub fn from_coordinates(geometry_type: &str, coordinates: &RawValue) -> Option<String> {
    let kind = geometry_type.trim().to_uppercase();
    if kind.is_empty() || !kind.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let body = coordinates_body(coordinates)?;
    Some(from_text(&format!("{}({})", kind, body)))
}

/// x/y pair -> `POINT(x y)`
pub fn point(x: &RawValue, y: &RawValue) -> Option<String> {
    let (x, y) = (x.as_number()?, y.as_number()?);
    Some(from_text(&format!(
        "POINT({} {})",
        number_literal(x),
        number_literal(y)
    )))
}

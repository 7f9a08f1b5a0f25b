use chrono::NaiveDate;

/// Date layouts tried in order. A value like `03/04/2024` is therefore read
/// as US month-first before the day-first layout gets a chance.
pub const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d"];

/// Parses a cell as a number, returning 0.0 for anything unparsable.
///
/// Thousands separators (commas) are stripped first, so `"1,234.50"` reads
/// as 1234.5. Non-finite results (`"NaN"`, `"inf"`) also collapse to 0.0.
pub fn coerce_float(value: &str) -> f64 {
    let cleaned = value.trim().replace(',', "");
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Same as [`coerce_float`] for a cell that may be missing from the row.
pub fn coerce_float_opt(value: Option<&str>) -> f64 {
    value.map(coerce_float).unwrap_or(0.0)
}

/// Parses a cell as a calendar date using [`DATE_FORMATS`].
pub fn coerce_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// Rounds to two decimal places using the exact binary value.
///
/// `2.675` is stored just below the half and comes out as 2.67; true halves
/// such as `0.125` go to the even neighbour.
pub fn round2(value: f64) -> f64 {
    format!("{:.2}", value).parse().unwrap_or(value)
}

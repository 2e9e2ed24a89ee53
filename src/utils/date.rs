use chrono::NaiveDate;

use crate::error::AppError;

/// Accepts YYYYMMDD or YYYY-MM-DD.
pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, AppError> {
    let trimmed = s.trim();
    if trimmed.len() == 8
        && let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y%m%d")
    {
        return Ok(d);
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| AppError::InvalidDate {
        input: s.to_string(),
    })
}

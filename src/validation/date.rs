use chrono::NaiveDate;

/// Two-digit years at or above this value resolve to the 1900s, the rest
/// to the 2000s. A fixed pivot is a policy choice, not a derived fact:
/// any document whose dates straddle the pivot decodes to the wrong
/// century, and no offline rule can do better without a reference date.
pub const CENTURY_PIVOT: u32 = 25;

fn split_yymmdd(yymmdd: &str) -> Option<(u32, u32, u32)> {
    if yymmdd.len() != 6 || !yymmdd.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let yy = yymmdd[0..2].parse().ok()?;
    let mm = yymmdd[2..4].parse().ok()?;
    let dd = yymmdd[4..6].parse().ok()?;
    Some((yy, mm, dd))
}

/// Resolve a YYMMDD birth date using the century pivot.
/// Returns `None` for non-numeric or impossible dates.
pub fn resolve_birth_date(yymmdd: &str) -> Option<NaiveDate> {
    let (yy, mm, dd) = split_yymmdd(yymmdd)?;
    let year = if yy >= CENTURY_PIVOT { 1900 + yy } else { 2000 + yy };
    NaiveDate::from_ymd_opt(year as i32, mm, dd)
}

/// Resolve a YYMMDD expiry date. Expiry dates on live documents are at
/// most ten years out, so they always land in the 2000s.
pub fn resolve_expiry_date(yymmdd: &str) -> Option<NaiveDate> {
    let (yy, mm, dd) = split_yymmdd(yymmdd)?;
    NaiveDate::from_ymd_opt(2000 + yy as i32, mm, dd)
}

/// Whether the document was expired as of `today`.
/// `None` when the expiry field does not decode to a date.
pub fn is_expired(expiry_yymmdd: &str, today: NaiveDate) -> Option<bool> {
    resolve_expiry_date(expiry_yymmdd).map(|expiry| expiry < today)
}

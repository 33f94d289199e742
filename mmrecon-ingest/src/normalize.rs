//! Field normalizer: raw cell text -> typed fields.
//!
//! Numeric cells go through a fixed repair sequence. Anything still unparseable
//! afterwards is reported as such; it is never coerced to zero.

use chrono::{NaiveDate, NaiveDateTime};
use mmrecon_core::{Direction, TxStatus};
use regex::Regex;
use std::sync::OnceLock;

/// Currency markers vendors print inside amount cells.
const CURRENCY_MARKERS: &[&str] = &["KSH", "KES", "UGX", "TZS", "GHS", "RWF", "ZMW"];

/// A parsed monetary cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericField {
    pub value: f64,
    /// A run of leading sign characters was collapsed
    pub sign_repaired: bool,
}

/// The cell has content but it is not a number, even after repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unparseable;

/// Trim and collapse all whitespace (including newlines) to single spaces.
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a timestamp against an ordered list of formats; the first match wins.
/// Date-only formats resolve to midnight.
pub fn parse_timestamp<S: AsRef<str>>(raw: &str, formats: &[S]) -> Option<NaiveDateTime> {
    let s = clean_text(raw);
    if s.is_empty() {
        return None;
    }
    for fmt in formats {
        let fmt = fmt.as_ref();
        if let Ok(ts) = NaiveDateTime::parse_from_str(&s, fmt) {
            return Some(ts);
        }
        if let Ok(d) = NaiveDate::parse_from_str(&s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

fn strip_currency(s: &str) -> &str {
    let upper = s.to_ascii_uppercase();
    for marker in CURRENCY_MARKERS {
        if upper.starts_with(marker) {
            return s[marker.len()..].trim();
        }
        if upper.ends_with(marker) {
            return s[..s.len() - marker.len()].trim();
        }
    }
    s
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Magnitude of an unsigned number. Commas or single spaces may separate
/// thousands groups of the integer part; anything else (a second number, a
/// stray group, letters) is rejected.
fn parse_magnitude(body: &str) -> Option<f64> {
    let (int_part, frac) = match body.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (body, None),
    };
    if frac.is_some_and(|f| !all_digits(f)) {
        return None;
    }

    if int_part.is_empty() && frac.is_none() {
        return None;
    }
    let mut digits = String::with_capacity(body.len());
    if !int_part.is_empty() {
        let groups: Vec<&str> = int_part.split(|c: char| c == ',' || c == ' ').collect();
        let (head, tail) = groups.split_first()?;
        let grouped = tail.is_empty()
            || (head.len() <= 3 && tail.iter().all(|g| g.len() == 3));
        if !grouped || !groups.iter().all(|g| all_digits(g)) {
            return None;
        }
        digits.extend(groups);
    }
    if let Some(f) = frac {
        digits.push('.');
        digits.push_str(f);
    }
    digits.parse().ok()
}

/// Parse an amount, fee or balance cell.
///
/// Blank cells (and a lone dash placeholder) are `Ok(None)`. Parentheses and
/// a leading minus both mark a negative; when a cell carries both, or a run
/// of sign characters, the value is negative and `sign_repaired` is set.
pub fn parse_numeric(raw: &str) -> Result<Option<NumericField>, Unparseable> {
    let cleaned = clean_text(&raw.replace('\u{2212}', "-"));
    let mut s = cleaned.as_str();
    if s.is_empty() || s == "-" {
        return Ok(None);
    }

    let bracketed = s.len() > 2 && s.starts_with('(') && s.ends_with(')');
    if bracketed {
        s = s[1..s.len() - 1].trim();
    }

    let body = strip_currency(s);
    let signs: String = body.chars().take_while(|c| *c == '-' || *c == '+').collect();
    let minus = signs.contains('-');
    if bracketed && signs.contains('+') {
        return Err(Unparseable);
    }
    let sign_repaired = signs.len() > 1 || (bracketed && minus);
    let digits = strip_currency(body[signs.len()..].trim_start());

    let magnitude = parse_magnitude(digits).ok_or(Unparseable)?;
    let negative = bracketed || minus;
    Ok(Some(NumericField {
        value: if negative { -magnitude } else { magnitude },
        sign_repaired,
    }))
}

fn trailing_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d[\d,]*)\s*$").expect("trailing token regex"))
}

/// Repair fee/balance column bleed.
///
/// When a balance is split at its decimal point across the fee and balance
/// columns, the fee cell holds an implausibly large integer and the balance
/// cell starts with '.'. Returns the reconstructed balance; the fee is then 0.
pub fn repair_column_bleed(fee_raw: &str, balance_raw: &str, threshold: f64) -> Option<f64> {
    let balance = balance_raw.trim();
    if !balance.starts_with('.') {
        return None;
    }
    let fee = parse_numeric(fee_raw).ok().flatten()?;
    if fee.value <= threshold {
        return None;
    }
    let token = trailing_token_re().captures(fee_raw.trim())?.get(1)?.as_str().replace(',', "");
    let rebuilt = format!("{token}{}", clean_text(balance).replace(' ', ""));
    parse_numeric(&rebuilt).ok().flatten().map(|n| n.value)
}

/// Map status text; the flag reports text that was not recognised.
pub fn parse_status(raw: &str) -> (TxStatus, bool) {
    let s = clean_text(raw).to_lowercase();
    match s.as_str() {
        "" | "completed" | "complete" | "success" | "successful" | "succeeded" => {
            (TxStatus::Success, false)
        }
        "failed" | "failure" | "declined" | "cancelled" | "canceled" => (TxStatus::Failed, false),
        "rolled back" | "rolledback" | "rollback" | "reversed" => (TxStatus::RolledBack, false),
        _ => (TxStatus::Success, true),
    }
}

pub fn parse_direction(raw: &str) -> Option<Direction> {
    match clean_text(raw).to_lowercase().as_str() {
        "cr" | "credit" | "c" | "+" | "in" => Some(Direction::Credit),
        "dr" | "debit" | "d" | "-" | "out" => Some(Direction::Debit),
        _ => None,
    }
}

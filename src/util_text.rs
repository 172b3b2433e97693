use chrono::{DateTime, Utc};

/// Shorten a hash-like identifier to `first6...last4`.
/// Strings of 10 characters or fewer are returned unchanged.
pub fn shorten_hash(s: &str) -> String {
    let len = s.chars().count();
    if len <= 10 {
        return s.to_string();
    }
    let head: String = s.chars().take(6).collect();
    let tail: String = s.chars().skip(len - 4).collect();
    format!("{head}...{tail}")
}

/// Strip a leading `0x` and upper-case the rest.
pub fn format_method_id(s: &str) -> String {
    s.strip_prefix("0x").unwrap_or(s).to_uppercase()
}

/// Human label for the distance between `then` and `now`.
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);
    let secs = delta.num_seconds();
    let future = secs < 0;
    let abs = secs.unsigned_abs();

    if abs < 5 {
        return "just now".to_string();
    }

    let (n, unit) = if abs < 60 {
        (abs, "second")
    } else if abs < 3_600 {
        (abs / 60, "minute")
    } else if abs < 86_400 {
        (abs / 3_600, "hour")
    } else {
        (abs / 86_400, "day")
    };
    let plural = if n == 1 { "" } else { "s" };

    if future {
        format!("in {n} {unit}{plural}")
    } else {
        format!("{n} {unit}{plural} ago")
    }
}

pub fn tx_kind_label(is_message: bool) -> &'static str {
    if is_message {
        "Message"
    } else {
        "Transaction"
    }
}

/// Execution status; `None` means the transaction has not executed yet.
pub fn status_label(status: Option<bool>) -> &'static str {
    match status {
        Some(true) => "Success",
        Some(false) => "Failed",
        None => "Pending",
    }
}

use chrono::{Duration, NaiveDateTime};
use rand::Rng;

/// Pending signups (and their codes) live for one hour.
pub const OTP_TTL_MINUTES: i64 = 60;

/// Six digits, zero padded.
pub fn generate_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", code)
}

pub fn expires_at(now: NaiveDateTime) -> NaiveDateTime {
    now + Duration::minutes(OTP_TTL_MINUTES)
}

/// A code is accepted when it matches and `now` is strictly before the expiry.
pub fn is_valid(expected: &str, submitted: &str, expires_at: NaiveDateTime, now: NaiveDateTime) -> bool {
    now < expires_at
        && super::password::constant_time_eq(expected.as_bytes(), submitted.trim().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn accepts_matching_code_before_expiry() {
        let now = Utc::now().naive_utc();
        assert!(is_valid("042917", " 042917 ", expires_at(now), now));
    }

    #[test]
    fn rejects_wrong_or_expired_code() {
        let now = Utc::now().naive_utc();
        let expiry = expires_at(now);
        assert!(!is_valid("042917", "042918", expiry, now));
        assert!(!is_valid("042917", "042917", expiry, expiry));
        assert!(!is_valid("042917", "042917", expiry, expiry + Duration::seconds(1)));
    }
}

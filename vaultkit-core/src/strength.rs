//! Password strength analysis.
//!
//! Deterministic and fully offline: the score is an entropy estimate over
//! the character pool, adjusted down by pattern penalties (dictionary words,
//! sequential runs, repeats, keyboard walks). The same input always yields
//! the same report, so callers can cache per entry.

/// Coarse strength band for UI display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum StrengthLabel {
    /// Trivially guessable.
    VeryWeak,
    /// Crackable with modest effort.
    Weak,
    /// Acceptable but improvable.
    Fair,
    /// Resistant to online and most offline attacks.
    Strong,
    /// Resistant to sustained offline attack.
    VeryStrong,
}

/// Order-of-magnitude crack time estimate, assuming an offline attacker at
/// ten billion guesses per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
pub enum CrackTime {
    /// Under a second.
    #[strum(serialize = "instantly")]
    Instantly,
    /// Under an hour.
    #[strum(serialize = "minutes")]
    Minutes,
    /// Under a week.
    #[strum(serialize = "days")]
    Days,
    /// Under a year.
    #[strum(serialize = "months")]
    Months,
    /// Under a century.
    #[strum(serialize = "years")]
    Years,
    /// A century or more.
    #[strum(serialize = "centuries")]
    Centuries,
}

/// Result of analyzing a candidate password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrengthReport {
    /// Score from 0 (very weak) to 4 (very strong).
    pub score: u8,
    /// Band corresponding to the score.
    pub label: StrengthLabel,
    /// Human-readable suggestions, empty for strong passwords.
    pub feedback: Vec<String>,
    /// Order-of-magnitude crack time under offline attack.
    pub crack_time: CrackTime,
}

/// Common passwords and password fragments checked case-insensitively.
const DICTIONARY: &[&str] = &[
    "password", "letmein", "welcome", "admin", "login", "qwerty", "dragon", "monkey",
    "master", "shadow", "sunshine", "princess", "football", "baseball", "superman",
    "batman", "trustno", "iloveyou", "secret", "freedom", "whatever", "michael",
    "jordan", "harley", "ranger", "hunter", "soccer", "hockey", "killer", "george",
    "charlie", "andrew", "thomas", "robert", "daniel", "summer", "winter", "ashley",
    "jessica", "amanda", "nicole",
];

/// Rows on a QWERTY keyboard for walk detection.
const KEYBOARD_ROWS: &[&str] = &["qwertyuiop", "asdfghjkl", "zxcvbnm", "1234567890"];

const GUESSES_PER_SECOND: f64 = 1e10;

/// Entropy penalty per detected weakness, in bits.
const PATTERN_PENALTY_BITS: f64 = 10.0;

/// Estimates the effective character pool size.
fn pool_size(password: &str) -> f64 {
    let mut pool = 0.0;
    if password.chars().any(|c| c.is_ascii_lowercase()) {
        pool += 26.0;
    }
    if password.chars().any(|c| c.is_ascii_uppercase()) {
        pool += 26.0;
    }
    if password.chars().any(|c| c.is_ascii_digit()) {
        pool += 10.0;
    }
    if password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        pool += 33.0;
    }
    pool
}

/// Counts distinct dictionary words embedded in the password.
fn dictionary_hits(lowered: &str) -> usize {
    DICTIONARY.iter().filter(|word| lowered.contains(**word)).count()
}

/// Detects ascending or descending runs of three or more adjacent
/// codepoints ("abc", "321").
fn has_sequential_run(password: &str) -> bool {
    let chars: Vec<u32> = password.chars().map(u32::from).collect();
    chars.windows(3).any(|w| {
        (w[1].wrapping_sub(w[0]) == 1 && w[2].wrapping_sub(w[1]) == 1)
            || (w[0].wrapping_sub(w[1]) == 1 && w[1].wrapping_sub(w[2]) == 1)
    })
}

/// Detects the same character repeated three or more times in a row.
fn has_repeated_run(password: &str) -> bool {
    let chars: Vec<char> = password.chars().collect();
    chars.windows(3).any(|w| w[0] == w[1] && w[1] == w[2])
}

/// Detects runs of three or more keys adjacent on a QWERTY row ("qwer",
/// "asdf"), in either direction.
fn has_keyboard_walk(lowered: &str) -> bool {
    let chars: Vec<char> = lowered.chars().collect();
    chars.windows(3).any(|w| {
        KEYBOARD_ROWS.iter().any(|row| {
            let fragment: String = w.iter().collect();
            let reversed: String = w.iter().rev().collect();
            row.contains(&fragment) || row.contains(&reversed)
        })
    })
}

/// Analyzes a candidate password and returns a deterministic report.
///
/// The empty string scores 0 with [`CrackTime::Instantly`]. Penalties only
/// lower the score; a long random password is never flagged for a
/// coincidental substring more than the fixed per-pattern deduction.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn analyze(password: &str) -> StrengthReport {
    if password.is_empty() {
        return StrengthReport {
            score: 0,
            label: StrengthLabel::VeryWeak,
            feedback: vec!["Add more characters".to_string()],
            crack_time: CrackTime::Instantly,
        };
    }

    let length = password.chars().count();
    let lowered = password.to_lowercase();
    let raw_entropy = length as f64 * pool_size(password).max(1.0).log2();

    let mut feedback = Vec::new();
    let mut penalty = 0.0;

    let hits = dictionary_hits(&lowered);
    if hits > 0 {
        penalty += PATTERN_PENALTY_BITS * hits as f64;
        feedback.push("Avoid common words and names".to_string());
    }
    if has_sequential_run(password) {
        penalty += PATTERN_PENALTY_BITS;
        feedback.push("Avoid sequences like 'abc' or '123'".to_string());
    }
    if has_repeated_run(password) {
        penalty += PATTERN_PENALTY_BITS;
        feedback.push("Avoid repeated characters".to_string());
    }
    if has_keyboard_walk(&lowered) {
        penalty += PATTERN_PENALTY_BITS;
        feedback.push("Avoid keyboard patterns like 'qwerty'".to_string());
    }

    let entropy = (raw_entropy - penalty).max(0.0);

    let (score, label) = if entropy < 28.0 {
        (0, StrengthLabel::VeryWeak)
    } else if entropy < 36.0 {
        (1, StrengthLabel::Weak)
    } else if entropy < 60.0 {
        (2, StrengthLabel::Fair)
    } else if entropy < 80.0 {
        (3, StrengthLabel::Strong)
    } else {
        (4, StrengthLabel::VeryStrong)
    };

    if score <= 1 {
        if length < 12 {
            feedback.push("Use at least 12 characters".to_string());
        }
        if pool_size(password) < 62.0 {
            feedback.push("Mix uppercase, lowercase, digits and symbols".to_string());
        }
    }

    let seconds = entropy.exp2() / GUESSES_PER_SECOND;
    let crack_time = if seconds < 1.0 {
        CrackTime::Instantly
    } else if seconds < 3_600.0 {
        CrackTime::Minutes
    } else if seconds < 604_800.0 {
        CrackTime::Days
    } else if seconds < 31_557_600.0 {
        CrackTime::Months
    } else if seconds < 3_155_760_000.0 {
        CrackTime::Years
    } else {
        CrackTime::Centuries
    };

    StrengthReport {
        score,
        label,
        feedback,
        crack_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn empty_password_scores_zero() {
        let report = analyze("");
        assert_eq!(report.score, 0);
        assert_eq!(report.crack_time, CrackTime::Instantly);
        assert!(!report.feedback.is_empty());
    }

    #[test_case("password" ; "dictionary word")]
    #[test_case("12345678" ; "digit sequence")]
    #[test_case("aaaa" ; "repeats")]
    #[test_case("qwerty" ; "keyboard walk")]
    fn weak_passwords_score_zero(password: &str) {
        let report = analyze(password);
        assert_eq!(report.score, 0, "{password:?} scored {}", report.score);
        assert_eq!(report.label, StrengthLabel::VeryWeak);
        assert!(!report.feedback.is_empty());
    }

    #[test]
    fn long_mixed_password_scores_high() {
        let report = analyze("Tr0ub4dor&3XyZ!99");
        assert!(report.score >= 3, "scored {}", report.score);
        assert!(report.crack_time >= CrackTime::Years);
    }

    #[test]
    fn strong_random_password_has_no_feedback() {
        let report = analyze("kT9#mQ2$vL8@xR4&nW7!");
        assert_eq!(report.score, 4);
        assert_eq!(report.label, StrengthLabel::VeryStrong);
        assert!(report.feedback.is_empty());
        assert_eq!(report.crack_time, CrackTime::Centuries);
    }

    #[test]
    fn analysis_is_deterministic() {
        let a = analyze("correct horse battery staple");
        let b = analyze("correct horse battery staple");
        assert_eq!(a, b);
    }

    #[test]
    fn longer_passwords_never_score_lower() {
        // Appending random characters must not decrease the score.
        let base = "mZ4$q";
        let mut previous = analyze(base).score;
        let mut password = base.to_string();
        for c in ['R', '8', '%', 'j', 'W', '2', '@', 'k', 'F', '5', '^', 'p'] {
            password.push(c);
            let score = analyze(&password).score;
            assert!(score >= previous, "{password:?} dropped to {score}");
            previous = score;
        }
    }

    #[test]
    fn crack_time_tracks_score() {
        let weak = analyze("abc");
        let strong = analyze("kT9#mQ2$vL8@xR4&nW7!");
        assert!(weak.crack_time < strong.crack_time);
    }

    #[test]
    fn dictionary_check_is_case_insensitive() {
        let report = analyze("PaSsWoRd");
        assert!(report
            .feedback
            .iter()
            .any(|f| f.contains("common words")));
    }
}

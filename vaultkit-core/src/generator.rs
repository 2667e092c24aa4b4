//! Password generation engine.
//!
//! Three generation modes share one cryptographically secure randomness
//! source (`OsRng`): free-form generation under a character-class policy,
//! pattern-driven generation, and pronounceable syllable generation. A
//! general-purpose PRNG is never used here.

use rand::rngs::OsRng;
use rand::seq::SliceRandom;

use crate::error::{ConfigError, VaultResult};

const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const NUMBERS: &str = "0123456789";
const SYMBOLS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Visually ambiguous glyphs dropped by `exclude_similar` (0/O, 1/l/I, ...).
const SIMILAR_CHARS: &str = "il1ILoO0";

/// Punctuation that tends to break copy/paste or shell quoting, dropped by
/// `exclude_ambiguous`.
const AMBIGUOUS_CHARS: &str = "{}[]()/\\'\"`~,;:.<>";

const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u'];
const CONSONANTS: &[char] = &[
    'b', 'c', 'd', 'f', 'g', 'h', 'j', 'k', 'm', 'n', 'p', 'r', 's', 't', 'v', 'w', 'z',
];

/// Generation policy.
///
/// Every field is defaulted centrally here; call sites override only what
/// they need instead of re-deriving fallbacks ad hoc.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GeneratorOptions {
    /// Output length in characters.
    pub length: usize,
    /// Include `A-Z`.
    pub include_uppercase: bool,
    /// Include `a-z`.
    pub include_lowercase: bool,
    /// Include `0-9`.
    pub include_numbers: bool,
    /// Include punctuation.
    pub include_symbols: bool,
    /// Drop visually ambiguous glyphs (`0/O`, `1/l/I`).
    pub exclude_similar: bool,
    /// Drop quoting-hostile punctuation.
    pub exclude_ambiguous: bool,
    /// Minimum digit count in the output.
    pub min_numbers: usize,
    /// Minimum symbol count in the output.
    pub min_symbols: usize,
    /// Extra characters appended to the active charset. When set with every
    /// class disabled, generation draws from these alone.
    pub custom_characters: Option<String>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            length: 16,
            include_uppercase: true,
            include_lowercase: true,
            include_numbers: true,
            include_symbols: true,
            exclude_similar: false,
            exclude_ambiguous: false,
            min_numbers: 0,
            min_symbols: 0,
            custom_characters: None,
        }
    }
}

impl GeneratorOptions {
    /// Applies the exclusion flags to a class charset.
    fn filter(&self, class: &str) -> Vec<char> {
        class
            .chars()
            .filter(|c| !(self.exclude_similar && SIMILAR_CHARS.contains(*c)))
            .filter(|c| !(self.exclude_ambiguous && AMBIGUOUS_CHARS.contains(*c)))
            .collect()
    }

    /// Builds the active charset from the enabled classes plus any custom
    /// characters.
    fn charset(&self) -> Vec<char> {
        let mut chars = Vec::new();
        if self.include_uppercase {
            chars.extend(self.filter(UPPERCASE));
        }
        if self.include_lowercase {
            chars.extend(self.filter(LOWERCASE));
        }
        if self.include_numbers {
            chars.extend(self.filter(NUMBERS));
        }
        if self.include_symbols {
            chars.extend(self.filter(SYMBOLS));
        }
        if let Some(custom) = &self.custom_characters {
            for c in custom.chars() {
                if !chars.contains(&c) {
                    chars.push(c);
                }
            }
        }
        chars
    }

    /// Validates the policy before generation.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.length == 0 {
            return Err(ConfigError::InvalidLength { length: 0 });
        }
        if self.min_numbers > 0 && !self.include_numbers {
            return Err(ConfigError::DisabledClassMinimum {
                class: "numbers".to_string(),
            });
        }
        if self.min_symbols > 0 && !self.include_symbols {
            return Err(ConfigError::DisabledClassMinimum {
                class: "symbols".to_string(),
            });
        }
        let required = self.min_numbers + self.min_symbols;
        if required > self.length {
            return Err(ConfigError::ImpossibleMinimums {
                required,
                length: self.length,
            });
        }
        Ok(())
    }
}

/// Draws one character from a non-empty pool.
fn pick(pool: &[char]) -> char {
    *pool.choose(&mut OsRng).expect("pool is checked non-empty")
}

/// Generates a password under the given policy.
///
/// Characters are drawn uniformly from the active charset. If the output
/// falls short of a minimum-count constraint, the shortfall is counted first
/// and then patched in at random positions; class counts are tracked across
/// patches so a patch never overwrites a character that another constrained
/// class still needs.
///
/// # Errors
///
/// Returns [`ConfigError::EmptyCharset`] when every class is disabled (or
/// exclusions empty the charset), and other [`ConfigError`] variants for
/// unusable lengths or minimums.
pub fn generate(options: &GeneratorOptions) -> VaultResult<String> {
    options.validate()?;
    let charset = options.charset();
    if charset.is_empty() {
        return Err(ConfigError::EmptyCharset.into());
    }

    let mut chars: Vec<char> = (0..options.length).map(|_| pick(&charset)).collect();

    // Count the shortfall before patching anything.
    let mut digit_count = chars.iter().filter(|c| c.is_ascii_digit()).count();
    let mut symbol_count = chars.iter().filter(|c| SYMBOLS.contains(**c)).count();

    if digit_count < options.min_numbers || symbol_count < options.min_symbols {
        let digit_pool = options.filter(NUMBERS);
        let symbol_pool = options.filter(SYMBOLS);
        if (digit_count < options.min_numbers && digit_pool.is_empty())
            || (symbol_count < options.min_symbols && symbol_pool.is_empty())
        {
            return Err(ConfigError::EmptyCharset.into());
        }

        // A position is patchable if it does not already hold the class
        // being topped up, and overwriting it cannot push the other class
        // below its own minimum. Since min_numbers + min_symbols <= length,
        // such a position always exists while a shortfall remains.
        while digit_count < options.min_numbers {
            let candidates: Vec<usize> = chars
                .iter()
                .enumerate()
                .filter(|(_, c)| !c.is_ascii_digit())
                .filter(|(_, c)| !SYMBOLS.contains(**c) || symbol_count > options.min_symbols)
                .map(|(i, _)| i)
                .collect();
            let pos = *candidates
                .choose(&mut OsRng)
                .expect("minimums validated against length");
            if SYMBOLS.contains(chars[pos]) {
                symbol_count -= 1;
            }
            chars[pos] = pick(&digit_pool);
            digit_count += 1;
        }
        while symbol_count < options.min_symbols {
            let candidates: Vec<usize> = chars
                .iter()
                .enumerate()
                .filter(|(_, c)| !SYMBOLS.contains(**c))
                .filter(|(_, c)| !c.is_ascii_digit() || digit_count > options.min_numbers)
                .map(|(i, _)| i)
                .collect();
            let pos = *candidates
                .choose(&mut OsRng)
                .expect("minimums validated against length");
            if chars[pos].is_ascii_digit() {
                digit_count -= 1;
            }
            chars[pos] = pick(&symbol_pool);
            symbol_count += 1;
        }
    }

    Ok(chars.into_iter().collect())
}

/// Generates a password from a pattern string.
///
/// Each pattern character selects a class:
///
/// | Selector | Emits                         |
/// |----------|-------------------------------|
/// | `A`      | an uppercase letter           |
/// | `a`      | a lowercase letter            |
/// | `9`      | a digit                       |
/// | `#`      | a symbol                      |
/// | `c`      | a custom character (if set)   |
///
/// Unrecognized characters pass through verbatim, which makes separators
/// like `-` easy: `"AAaa-9999-####"`.
///
/// # Errors
///
/// Returns [`ConfigError::EmptyCharset`] if a selector's pool is empty after
/// exclusions, or if the pattern is empty.
pub fn generate_from_pattern(pattern: &str, options: &GeneratorOptions) -> VaultResult<String> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidLength { length: 0 }.into());
    }

    let custom_pool: Vec<char> = options
        .custom_characters
        .as_deref()
        .map(|s| s.chars().collect())
        .unwrap_or_default();

    let mut out = String::with_capacity(pattern.len());
    for selector in pattern.chars() {
        let pool = match selector {
            'A' => options.filter(UPPERCASE),
            'a' => options.filter(LOWERCASE),
            '9' => options.filter(NUMBERS),
            '#' => options.filter(SYMBOLS),
            'c' => custom_pool.clone(),
            literal => {
                out.push(literal);
                continue;
            }
        };
        if pool.is_empty() {
            return Err(ConfigError::EmptyCharset.into());
        }
        out.push(pick(&pool));
    }
    Ok(out)
}

/// Generates a pronounceable password of exactly `length` characters.
///
/// Builds alternating consonant/vowel syllables trimmed to the exact
/// requested length, then optionally overwrites distinct random interior
/// positions with a digit and a symbol (when the respective classes are
/// enabled) and capitalizes the first character if uppercase is requested.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidLength`] for a zero length.
pub fn generate_pronounceable(length: usize, options: &GeneratorOptions) -> VaultResult<String> {
    if length == 0 {
        return Err(ConfigError::InvalidLength { length: 0 }.into());
    }

    let mut chars: Vec<char> = Vec::with_capacity(length + 1);
    while chars.len() < length {
        chars.push(pick(CONSONANTS));
        chars.push(pick(VOWELS));
    }
    chars.truncate(length);

    // Inject by replacement into the already-final window, at distinct
    // positions, so the digit and symbol cannot displace each other.
    if length >= 3 && (options.include_numbers || options.include_symbols) {
        let mut positions: Vec<usize> = (1..length).collect();
        positions.shuffle(&mut OsRng);
        let mut positions = positions.into_iter();

        if options.include_numbers {
            let digit_pool = options.filter(NUMBERS);
            if !digit_pool.is_empty() {
                let pos = positions.next().expect("length >= 3 leaves interior room");
                chars[pos] = pick(&digit_pool);
            }
        }
        if options.include_symbols {
            let symbol_pool = options.filter(SYMBOLS);
            if !symbol_pool.is_empty() {
                let pos = positions.next().expect("length >= 3 leaves interior room");
                chars[pos] = pick(&symbol_pool);
            }
        }
    }

    if options.include_uppercase {
        if let Some(first) = chars.first_mut() {
            *first = first.to_ascii_uppercase();
        }
    }
    Ok(chars.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaultError;
    use std::collections::HashSet;

    #[test]
    fn generate_respects_length() {
        let options = GeneratorOptions::default();
        let password = generate(&options).unwrap();
        assert_eq!(password.chars().count(), 16);
    }

    #[test]
    fn empty_charset_is_rejected() {
        let options = GeneratorOptions {
            include_uppercase: false,
            include_lowercase: false,
            include_numbers: false,
            include_symbols: false,
            ..GeneratorOptions::default()
        };
        assert!(matches!(
            generate(&options),
            Err(VaultError::Config(ConfigError::EmptyCharset))
        ));
    }

    #[test]
    fn custom_only_charset_is_honored() {
        let options = GeneratorOptions {
            include_uppercase: false,
            include_lowercase: false,
            include_numbers: false,
            include_symbols: false,
            custom_characters: Some("xyz".to_string()),
            ..GeneratorOptions::default()
        };
        let password = generate(&options).unwrap();
        assert!(password.chars().all(|c| "xyz".contains(c)));
    }

    #[test]
    fn minimum_digit_count_holds_over_many_trials() {
        let options = GeneratorOptions {
            length: 16,
            min_numbers: 2,
            ..GeneratorOptions::default()
        };
        for _ in 0..10_000 {
            let password = generate(&options).unwrap();
            assert_eq!(password.chars().count(), 16);
            let digits = password.chars().filter(char::is_ascii_digit).count();
            assert!(digits >= 2, "expected >=2 digits in {password:?}");
        }
    }

    #[test]
    fn minimums_for_both_classes_do_not_clobber() {
        let options = GeneratorOptions {
            length: 8,
            min_numbers: 4,
            min_symbols: 4,
            ..GeneratorOptions::default()
        };
        for _ in 0..1_000 {
            let password = generate(&options).unwrap();
            let digits = password.chars().filter(char::is_ascii_digit).count();
            let symbols = password.chars().filter(|c| SYMBOLS.contains(*c)).count();
            assert!(digits >= 4, "{password:?}");
            assert!(symbols >= 4, "{password:?}");
        }
    }

    #[test]
    fn minimums_hold_when_they_consume_the_full_length() {
        // Every position must end up in a constrained class; patches may
        // only land on surplus characters of the other class.
        let options = GeneratorOptions {
            length: 4,
            min_numbers: 2,
            min_symbols: 2,
            ..GeneratorOptions::default()
        };
        for _ in 0..2_000 {
            let password = generate(&options).unwrap();
            let digits = password.chars().filter(char::is_ascii_digit).count();
            let symbols = password.chars().filter(|c| SYMBOLS.contains(*c)).count();
            assert!(digits >= 2, "{password:?}");
            assert!(symbols >= 2, "{password:?}");
        }
    }

    #[test]
    fn impossible_minimums_are_rejected() {
        let options = GeneratorOptions {
            length: 4,
            min_numbers: 3,
            min_symbols: 3,
            ..GeneratorOptions::default()
        };
        assert!(matches!(
            generate(&options),
            Err(VaultError::Config(ConfigError::ImpossibleMinimums {
                required: 6,
                length: 4
            }))
        ));
    }

    #[test]
    fn minimum_for_disabled_class_is_rejected() {
        let options = GeneratorOptions {
            include_numbers: false,
            min_numbers: 1,
            ..GeneratorOptions::default()
        };
        assert!(matches!(
            generate(&options),
            Err(VaultError::Config(ConfigError::DisabledClassMinimum { .. }))
        ));
    }

    #[test]
    fn exclude_similar_drops_ambiguous_glyphs() {
        let options = GeneratorOptions {
            length: 64,
            exclude_similar: true,
            ..GeneratorOptions::default()
        };
        for _ in 0..100 {
            let password = generate(&options).unwrap();
            assert!(!password.chars().any(|c| SIMILAR_CHARS.contains(c)), "{password:?}");
        }
    }

    #[test]
    fn pattern_emits_classes_and_literals() {
        let options = GeneratorOptions::default();
        for _ in 0..100 {
            let password = generate_from_pattern("AAaa-9999-####", &options).unwrap();
            assert_eq!(password.len(), 14);
            let chars: Vec<char> = password.chars().collect();
            assert!(chars[0].is_ascii_uppercase());
            assert!(chars[1].is_ascii_uppercase());
            assert!(chars[2].is_ascii_lowercase());
            assert_eq!(chars[4], '-');
            assert!(chars[5].is_ascii_digit());
            assert_eq!(chars[9], '-');
            assert!(SYMBOLS.contains(chars[10]));
        }
    }

    #[test]
    fn pattern_custom_selector_requires_custom_characters() {
        let options = GeneratorOptions::default();
        assert!(matches!(
            generate_from_pattern("ccc", &options),
            Err(VaultError::Config(ConfigError::EmptyCharset))
        ));

        let with_custom = GeneratorOptions {
            custom_characters: Some("@".to_string()),
            ..GeneratorOptions::default()
        };
        assert_eq!(generate_from_pattern("ccc", &with_custom).unwrap(), "@@@");
    }

    #[test]
    fn pronounceable_has_exact_length_and_leading_capital() {
        let options = GeneratorOptions::default();
        for length in [3, 8, 12, 17] {
            let password = generate_pronounceable(length, &options).unwrap();
            assert_eq!(password.chars().count(), length);
            assert!(password.chars().next().unwrap().is_ascii_uppercase());
        }
    }

    #[test]
    fn pronounceable_injections_survive_length_trimming() {
        let options = GeneratorOptions::default();
        for length in [3, 5, 8, 13] {
            for _ in 0..500 {
                let password = generate_pronounceable(length, &options).unwrap();
                assert_eq!(password.chars().count(), length);
                assert!(
                    password.chars().any(|c| c.is_ascii_digit()),
                    "no digit in {password:?}"
                );
                assert!(
                    password.chars().any(|c| SYMBOLS.contains(c)),
                    "no symbol in {password:?}"
                );
            }
        }
    }

    #[test]
    fn pronounceable_without_injection_is_letters_only() {
        let options = GeneratorOptions {
            include_uppercase: false,
            include_numbers: false,
            include_symbols: false,
            ..GeneratorOptions::default()
        };
        let password = generate_pronounceable(12, &options).unwrap();
        assert!(password.chars().all(|c| c.is_ascii_lowercase()));
    }

    #[test]
    fn outputs_are_not_repeated() {
        // A predictable seed would collapse these to a handful of values.
        let options = GeneratorOptions::default();
        let outputs: HashSet<String> = (0..50).map(|_| generate(&options).unwrap()).collect();
        assert!(outputs.len() >= 49, "secure randomness should not collide");
    }
}

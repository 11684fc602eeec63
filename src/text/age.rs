use std::sync::LazyLock;

use regex::Regex;

use crate::models::Age;

/// Malformed age literals found in source transcripts and their repairs.
/// Matched against the whole trimmed literal.
pub const AGE_CORRECTIONS: &[(&str, &str)] = &[
    ("0;11.18.", "0;11.18"),
    ("2:06.14", "2;06.14"),
    ("3;00,20", "3;00.20"),
    ("1;8.", "1;08.0"),
    ("2;;03.10", "2;03.10"),
];

static YEARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+);").unwrap());
static MONTHS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+;(\d+)").unwrap());
static DAYS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+;\d+\.(\d+)").unwrap());

/// Apply the correction table to an age literal
pub fn correct_age_literal(literal: &str) -> String {
    let trimmed = literal.trim();
    AGE_CORRECTIONS
        .iter()
        .find(|(bad, _)| *bad == trimmed)
        .map(|(_, good)| good.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Parse a `years;months.days` age into its day count.
///
/// Missing components count as zero; input that matches nothing yields 0 days.
pub fn parse_age(literal: &str) -> Age {
    let literal = correct_age_literal(literal);

    let component = |re: &Regex| -> f64 {
        re.captures(&literal)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .map(f64::from)
            .unwrap_or(0.0)
    };

    let years = component(&YEARS);
    let months = component(&MONTHS);
    let days = component(&DAYS);

    Age {
        days: (years * 365.0 + months * 30.4 + days) as u32,
        literal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_age() {
        let age = parse_age("1;04.13");
        assert_eq!(age.literal, "1;04.13");
        assert_eq!(age.days, 499);
    }

    #[test]
    fn test_missing_components_default_to_zero() {
        assert_eq!(parse_age("2;").days, 730);
        assert_eq!(parse_age("2;06").days, 912);
        assert_eq!(parse_age("").days, 0);
        assert_eq!(parse_age("unknown").days, 0);
    }

    #[test]
    fn test_corrections_applied_before_parsing() {
        let age = parse_age("2:06.14");
        assert_eq!(age.literal, "2;06.14");
        assert_eq!(age.days, 926);

        assert_eq!(parse_age(" 0;11.18. ").literal, "0;11.18");
        assert_eq!(parse_age("3;00,20").days, 1115);
    }
}

use chrono::{Datelike, NaiveDate};

use super::calendar::{roman_month, to_hijri};
use super::NumberingError;

/// Field set available to a numbering template.
pub struct RenderContext<'a> {
    pub sequence: i64,
    pub category: &'a str,
    /// Empty for institution-wide numbers.
    pub org_unit_code: &'a str,
    pub issued_on: NaiveDate,
}

/// Substitute `{placeholder}` tokens in a template string.
///
/// Literal text outside braces is copied through untouched; the separators
/// are configuration, not protocol. Unknown placeholders are a
/// configuration defect and fail the allocation rather than rendering a
/// number the institution cannot parse back.
pub fn render(template: &str, ctx: &RenderContext<'_>) -> Result<String, NumberingError> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut chars = template.chars();

    while let Some(ch) = chars.next() {
        if ch != '{' {
            out.push(ch);
            continue;
        }

        let mut name = String::new();
        let mut closed = false;
        for inner in chars.by_ref() {
            if inner == '}' {
                closed = true;
                break;
            }
            name.push(inner);
        }
        if !closed {
            return Err(NumberingError::InvalidTemplate {
                template: template.to_string(),
                placeholder: format!("{{{name}"),
            });
        }

        match name.as_str() {
            // Minimum three digits; wider sequences keep all their digits.
            "seq" => out.push_str(&format!("{:03}", ctx.sequence)),
            "category" => out.push_str(ctx.category),
            "unit" => out.push_str(ctx.org_unit_code),
            "month" => out.push_str(&format!("{:02}", ctx.issued_on.month())),
            "month_roman" => out.push_str(roman_month(ctx.issued_on.month())),
            "hijri_year" => out.push_str(&to_hijri(ctx.issued_on).year.to_string()),
            "year" => out.push_str(&ctx.issued_on.year().to_string()),
            _ => {
                return Err(NumberingError::InvalidTemplate {
                    template: template.to_string(),
                    placeholder: name,
                })
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(sequence: i64, unit: &'static str) -> RenderContext<'static> {
        RenderContext {
            sequence,
            category: "SK",
            org_unit_code: unit,
            issued_on: NaiveDate::from_ymd_opt(2025, 8, 14).unwrap(),
        }
    }

    #[test]
    fn renders_full_letter_number() {
        let rendered = render(
            "{seq}/{category}/{unit}/{month_roman}/{hijri_year}/{year}",
            &ctx(7, "FST"),
        )
        .unwrap();
        assert_eq!(rendered, "007/SK/FST/VIII/1447/2025");
    }

    #[test]
    fn pads_to_three_digits_minimum() {
        let rendered = render("{seq}", &ctx(3, "FST")).unwrap();
        assert_eq!(rendered, "003");
    }

    #[test]
    fn wide_sequences_keep_all_digits() {
        let rendered = render("{seq}", &ctx(12345, "FST")).unwrap();
        assert_eq!(rendered, "12345");
    }

    #[test]
    fn institution_wide_unit_token_is_empty() {
        let rendered = render("{seq}/{unit}/{year}", &ctx(1, "")).unwrap();
        assert_eq!(rendered, "001//2025");
    }

    #[test]
    fn numeric_month_is_two_digits() {
        let rendered = render("{month}", &ctx(1, "")).unwrap();
        assert_eq!(rendered, "08");
    }

    #[test]
    fn unknown_placeholder_is_rejected() {
        let err = render("{seq}/{nope}", &ctx(1, "")).unwrap_err();
        match err {
            NumberingError::InvalidTemplate { placeholder, .. } => {
                assert_eq!(placeholder, "nope");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unterminated_placeholder_is_rejected() {
        assert!(render("{seq", &ctx(1, "")).is_err());
    }
}

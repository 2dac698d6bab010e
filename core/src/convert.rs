//! Conservative type-conversion table for CHANGE_TYPE migrations.
//!
//! The table errs on rejection: a conversion is only allowed when the cast
//! either cannot fail, or every existing value can be checked first with a
//! cheap predicate. Lossy-but-total casts (TIMESTAMPTZ to DATE, NUMERIC to
//! TEXT) are accepted as a known limitation.

use crate::column::ColumnType;
use crate::ddl::quote;

/// How to get from one physical column type to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversion {
    /// Types already identical. No DDL, no backup.
    Noop,
    /// The cast cannot fail. `using` is the `USING` expression.
    Safe { using: String },
    /// The cast can fail on bad values. `violation` is a `WHERE` fragment
    /// matching rows that would break the cast; the engine rejects the
    /// migration if any row matches, before taking a backup or touching
    /// the schema.
    Checked { using: String, violation: String },
    /// Rejected outright rather than risking data corruption.
    Unsupported,
}

impl Conversion {
    pub fn is_supported(&self) -> bool {
        !matches!(self, Conversion::Unsupported)
    }
}

// Conservative patterns: plain ISO forms only. Anything fancier is rejected
// even when Postgres could parse it.
const NUMERIC_RE: &str = "^-?([0-9]+(\\.[0-9]*)?|\\.[0-9]+)$";
const INTEGER_RE: &str = "^-?[0-9]+$";
const DATE_RE: &str = "^[0-9]{4}-[0-9]{2}-[0-9]{2}$";
const TIME_RE: &str = "^[0-9]{2}:[0-9]{2}(:[0-9]{2})?$";
const TIMESTAMP_RE: &str = "^[0-9]{4}-[0-9]{2}-[0-9]{2}([T ][0-9]{2}:[0-9]{2}(:[0-9]{2})?(\\.[0-9]+)?([+-][0-9]{2}(:?[0-9]{2})?|Z)?)?$";
const POINT_RE: &str = "^\\( *-?[0-9]+(\\.[0-9]+)? *, *-?[0-9]+(\\.[0-9]+)? *\\)$";

fn checked_pattern(col: &str, cast: ColumnType, pattern: &str) -> Conversion {
    let q = quote(col);
    Conversion::Checked {
        using: format!("btrim({q})::{}", cast.sql().to_lowercase()),
        violation: format!("{q} IS NOT NULL AND btrim({q}) !~ '{pattern}'"),
    }
}

fn checked_length(col: &str, n: u32) -> Conversion {
    let q = quote(col);
    Conversion::Checked {
        using: format!("({q}::text)::varchar({n})"),
        violation: format!("{q} IS NOT NULL AND length({q}::text) > {n}"),
    }
}

/// Look up the conversion for `column` from `from` to `to`.
pub fn conversion(column: &str, from: ColumnType, to: ColumnType) -> Conversion {
    use ColumnType::*;

    if from == to {
        return Conversion::Noop;
    }
    let q = quote(column);

    match (from, to) {
        // Anything renders as text.
        (_, Text) => Conversion::Safe {
            using: format!("{q}::text"),
        },
        // Anything wraps into JSONB.
        (_, Jsonb) => Conversion::Safe {
            using: format!("to_jsonb({q})"),
        },
        // Widening a varchar cannot fail; anything else must fit.
        (VarChar(m), VarChar(n)) if n >= m => Conversion::Safe {
            using: format!("{q}::varchar({n})"),
        },
        (_, VarChar(n)) => checked_length(column, n),

        (Integer, Numeric) => Conversion::Safe {
            using: format!("{q}::numeric"),
        },
        (Date, TimestampTz) => Conversion::Safe {
            using: format!("{q}::timestamptz"),
        },
        // Lossy (drops the time component); accepted as a known limitation.
        (TimestampTz, Date) => Conversion::Safe {
            using: format!("{q}::date"),
        },

        (Text | VarChar(_), Numeric) => checked_pattern(column, Numeric, NUMERIC_RE),
        (Text | VarChar(_), Integer) => checked_pattern(column, Integer, INTEGER_RE),
        (Text | VarChar(_), Date) => checked_pattern(column, Date, DATE_RE),
        (Text | VarChar(_), Time) => checked_pattern(column, Time, TIME_RE),
        (Text | VarChar(_), TimestampTz) => checked_pattern(column, TimestampTz, TIMESTAMP_RE),
        (Text | VarChar(_), Point) => checked_pattern(column, Point, POINT_RE),

        (Numeric, Integer) => Conversion::Checked {
            using: format!("{q}::integer"),
            violation: format!(
                "{q} IS NOT NULL AND ({q} <> trunc({q}) OR {q} < -2147483648 OR {q} > 2147483647)"
            ),
        },

        _ => Conversion::Unsupported,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::column::ColumnType::*;

    #[test]
    fn identical_types_are_a_noop() {
        assert_eq!(conversion("c", Numeric, Numeric), Conversion::Noop);
        assert_eq!(conversion("c", VarChar(255), VarChar(255)), Conversion::Noop);
    }

    #[test]
    fn anything_to_text_is_safe() {
        for from in [VarChar(20), Numeric, Integer, Date, Time, TimestampTz, Jsonb, Point] {
            assert!(matches!(
                conversion("c", from, Text),
                Conversion::Safe { .. }
            ));
        }
    }

    #[test]
    fn text_to_numeric_is_checked() {
        let conv = conversion("age", Text, Numeric);
        let Conversion::Checked { using, violation } = conv else {
            panic!("expected Checked, got {conv:?}");
        };
        assert_eq!(using, "btrim(\"age\")::numeric");
        assert!(violation.contains("\"age\" IS NOT NULL"));
        assert!(violation.contains("!~"));
    }

    #[test]
    fn varchar_widening_is_safe_narrowing_is_checked() {
        assert!(matches!(
            conversion("c", VarChar(20), VarChar(255)),
            Conversion::Safe { .. }
        ));
        assert!(matches!(
            conversion("c", VarChar(255), VarChar(20)),
            Conversion::Checked { .. }
        ));
    }

    #[test]
    fn nonsense_conversions_are_rejected() {
        assert_eq!(conversion("c", Jsonb, Numeric), Conversion::Unsupported);
        assert_eq!(conversion("c", Point, Integer), Conversion::Unsupported);
        assert_eq!(conversion("c", Date, Numeric), Conversion::Unsupported);
        assert_eq!(conversion("c", Time, Date), Conversion::Unsupported);
    }

    #[test]
    fn numeric_regex_accepts_plain_numbers_only() {
        // The predicate runs in Postgres; here we sanity-check the pattern
        // against the same regex semantics.
        let re = regex_lite(NUMERIC_RE);
        for ok in ["42", "-1", "3.14", ".5", "10."] {
            assert!(re(ok), "{ok} should look numeric");
        }
        for bad in ["abc", "1e5", "0x10", "1,000", ""] {
            assert!(!re(bad), "{bad} should not look numeric");
        }
    }

    // Minimal matcher for the handful of POSIX-compatible patterns above,
    // good enough to pin the test vectors without a regex dependency.
    fn regex_lite(pattern: &str) -> impl Fn(&str) -> bool + '_ {
        move |s: &str| match pattern {
            NUMERIC_RE => {
                let s = s.strip_prefix('-').unwrap_or(s);
                !s.is_empty()
                    && s != "."
                    && s.chars().all(|c| c.is_ascii_digit() || c == '.')
                    && s.chars().filter(|&c| c == '.').count() <= 1
            }
            _ => unreachable!(),
        }
    }
}

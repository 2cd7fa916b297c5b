//! Marathon-style constraint strings.
//!
//! Accepts the three spellings operators use in practice:
//! - nested JSON rows: `[["hostname","UNIQUE"],["rack","LIKE","r[1-3]"]]`
//! - a single flat JSON row: `["hostname","MAX_PER","2"]`
//! - colon/comma text: `hostname:UNIQUE,rack:LIKE:r[1-3]`, where `\:` and
//!   `\,` escape the separators
//!
//! Every generated spread rule only counts tasks of the pod type being
//! placed (`<pod_type>-.*`).

use thiserror::Error;
use tracing::{debug, info};

use crate::matcher::StringMatcher;
use crate::rule::PlacementRule;

const ESCAPE: char = '\\';

#[derive(Debug, Error)]
pub enum ConstraintError {
    #[error("expected 2 or 3 entries in constraint row, got {0:?}")]
    InvalidRow(Vec<String>),

    #[error("unsupported operator '{operator}' (expected UNIQUE, CLUSTER, GROUP_BY, LIKE, UNLIKE, MAX_PER, or IS)")]
    UnsupportedOperator { operator: String },

    #[error("missing required parameter for operator '{operator}'")]
    MissingParameter { operator: String },

    #[error("parameter for operator '{operator}' is not an integer: {value}")]
    InvalidNumber { operator: String, value: String },

    #[error("invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),
}

pub type ConstraintResult<T> = Result<T, ConstraintError>;

/// Which offer field a constraint row targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field<'a> {
    Hostname,
    Region,
    Zone,
    Attribute(&'a str),
}

impl<'a> Field<'a> {
    fn parse(name: &'a str) -> Self {
        match name {
            "hostname" | "@hostname" => Field::Hostname,
            "@region" => Field::Region,
            "@zone" => Field::Zone,
            other => Field::Attribute(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Unique,
    Cluster,
    GroupBy,
    Like,
    Unlike,
    MaxPer,
    Is,
}

impl Operator {
    fn parse(name: &str) -> ConstraintResult<Self> {
        match name.to_ascii_uppercase().as_str() {
            "UNIQUE" => Ok(Operator::Unique),
            "CLUSTER" => Ok(Operator::Cluster),
            "GROUP_BY" => Ok(Operator::GroupBy),
            "LIKE" => Ok(Operator::Like),
            "UNLIKE" => Ok(Operator::Unlike),
            "MAX_PER" => Ok(Operator::MaxPer),
            "IS" => Ok(Operator::Is),
            _ => Err(ConstraintError::UnsupportedOperator {
                operator: name.to_string(),
            }),
        }
    }
}

/// Parse a constraint string for `pod_type`.
///
/// Empty input and `[]` yield [`PlacementRule::Passthrough`].
pub fn parse(pod_type: &str, constraints: &str) -> ConstraintResult<PlacementRule> {
    let constraints = constraints.trim();
    if constraints.is_empty() || constraints == "[]" {
        return Ok(PlacementRule::Passthrough);
    }
    let task_filter = StringMatcher::regex(format!("{}-.*", regex::escape(pod_type)))?;
    let mut rules = split_rows(constraints)
        .iter()
        .map(|row| parse_row(&task_filter, row))
        .collect::<ConstraintResult<Vec<_>>>()?;
    if rules.len() == 1 {
        return Ok(rules.remove(0));
    }
    Ok(PlacementRule::and(rules))
}

/// AND a constraint string onto an existing rule.
///
/// Returns `rule` unchanged when the constraint string is empty.
pub fn parse_with(
    pod_type: &str,
    rule: PlacementRule,
    constraints: &str,
) -> ConstraintResult<PlacementRule> {
    match parse(pod_type, constraints)? {
        PlacementRule::Passthrough => Ok(rule),
        parsed => Ok(PlacementRule::and([rule, parsed])),
    }
}

fn split_rows(constraints: &str) -> Vec<Vec<String>> {
    if let Ok(row) = serde_json::from_str::<Vec<String>>(constraints) {
        debug!(input = constraints, "parsed flat constraint row");
        return vec![row];
    }
    if let Ok(rows) = serde_json::from_str::<Vec<Vec<String>>>(constraints) {
        debug!(input = constraints, rows = rows.len(), "parsed nested constraint rows");
        return rows;
    }
    let rows: Vec<Vec<String>> = escaped_split(constraints, ',')
        .iter()
        .map(|row| escaped_split(row, ':'))
        .collect();
    debug!(input = constraints, rows = rows.len(), "parsed delimited constraint rows");
    rows
}

/// Split on `sep`, honoring backslash escapes of `sep`. Tokens are trimmed.
///
/// A backslash before any other character is kept as-is so regex escapes
/// survive.
fn escaped_split(s: &str, sep: char) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            if c != sep {
                buf.push(ESCAPE);
            }
            buf.push(c);
            escaped = false;
        } else if c == ESCAPE {
            escaped = true;
        } else if c == sep {
            out.push(buf.trim().to_string());
            buf.clear();
        } else {
            buf.push(c);
        }
    }
    if escaped {
        buf.push(ESCAPE);
    }
    out.push(buf.trim().to_string());
    out
}

fn parse_row(task_filter: &StringMatcher, row: &[String]) -> ConstraintResult<PlacementRule> {
    if !(2..=3).contains(&row.len()) {
        return Err(ConstraintError::InvalidRow(row.to_vec()));
    }
    let field = Field::parse(&row[0]);
    let operator_name = row[1].as_str();
    let operator = Operator::parse(operator_name)?;
    let parameter = row.get(2).map(String::as_str);

    let rule = match operator {
        Operator::Is | Operator::Cluster => {
            let value = required(operator_name, parameter)?;
            require(field, exact_matcher(field, value))
        }
        Operator::Like => {
            let pattern = required(operator_name, parameter)?;
            require(field, regex_matcher(field, pattern)?)
        }
        Operator::Unlike => {
            let pattern = required(operator_name, parameter)?;
            PlacementRule::not(require(field, regex_matcher(field, pattern)?))
        }
        Operator::Unique => max_per(field, 1, task_filter)?,
        Operator::MaxPer => {
            let max = parse_number(operator_name, required(operator_name, parameter)?)?;
            max_per(field, max, task_filter)?
        }
        Operator::GroupBy => {
            let count = parameter
                .map(|p| parse_number(operator_name, p))
                .transpose()?;
            round_robin(field, count, task_filter)
        }
    };
    info!(row = ?row, rule = rule.kind(), "constraint row converted to placement rule");
    Ok(rule)
}

fn required<'a>(operator: &str, parameter: Option<&'a str>) -> ConstraintResult<&'a str> {
    parameter.ok_or_else(|| ConstraintError::MissingParameter {
        operator: operator.to_string(),
    })
}

fn parse_number(operator: &str, value: &str) -> ConstraintResult<u32> {
    value.parse().map_err(|_| ConstraintError::InvalidNumber {
        operator: operator.to_string(),
        value: value.to_string(),
    })
}

fn exact_matcher(field: Field<'_>, value: &str) -> StringMatcher {
    match field {
        Field::Attribute(name) => StringMatcher::attribute_exact(name, value),
        _ => StringMatcher::exact(value),
    }
}

fn regex_matcher(field: Field<'_>, pattern: &str) -> ConstraintResult<StringMatcher> {
    Ok(match field {
        Field::Attribute(name) => StringMatcher::attribute_regex(name, pattern)?,
        _ => StringMatcher::regex(pattern)?,
    })
}

fn require(field: Field<'_>, matcher: StringMatcher) -> PlacementRule {
    match field {
        Field::Hostname => PlacementRule::Hostname { matcher },
        Field::Region => PlacementRule::Region { matcher },
        Field::Zone => PlacementRule::Zone { matcher },
        Field::Attribute(_) => PlacementRule::Attribute { matcher },
    }
}

fn max_per(field: Field<'_>, max: u32, task_filter: &StringMatcher) -> ConstraintResult<PlacementRule> {
    let task_filter = task_filter.clone();
    Ok(match field {
        Field::Hostname => PlacementRule::MaxPerHostname { max, task_filter },
        Field::Region => PlacementRule::MaxPerRegion { max, task_filter },
        Field::Zone => PlacementRule::MaxPerZone { max, task_filter },
        Field::Attribute(name) => {
            // The agent must carry the attribute at all, then the limit
            // applies per distinct value.
            let matcher = StringMatcher::attribute_regex(name, ".*")?;
            PlacementRule::and([
                PlacementRule::Attribute {
                    matcher: matcher.clone(),
                },
                PlacementRule::MaxPerAttribute {
                    max,
                    matcher,
                    task_filter,
                },
            ])
        }
    })
}

fn round_robin(field: Field<'_>, count: Option<u32>, task_filter: &StringMatcher) -> PlacementRule {
    let task_filter = task_filter.clone();
    match field {
        Field::Hostname => PlacementRule::RoundRobinByHostname {
            agent_count: count,
            task_filter,
        },
        Field::Region => PlacementRule::RoundRobinByRegion {
            region_count: count,
            task_filter,
        },
        Field::Zone => PlacementRule::RoundRobinByZone {
            zone_count: count,
            task_filter,
        },
        Field::Attribute(name) => PlacementRule::RoundRobinByAttribute {
            attribute: name.to_string(),
            total_count: count,
            task_filter,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello_filter() -> StringMatcher {
        StringMatcher::regex("hello-.*").unwrap()
    }

    #[test]
    fn empty_input_is_passthrough() {
        assert_eq!(parse("hello", "").unwrap(), PlacementRule::Passthrough);
        assert_eq!(parse("hello", "[]").unwrap(), PlacementRule::Passthrough);
        assert_eq!(
            parse_with("hello", PlacementRule::agent("a1"), "").unwrap(),
            PlacementRule::agent("a1")
        );
    }

    #[test]
    fn unique_hostname_in_every_spelling() {
        let expected = PlacementRule::MaxPerHostname {
            max: 1,
            task_filter: hello_filter(),
        };
        for input in [
            r#"[["hostname","UNIQUE"]]"#,
            r#"["hostname","UNIQUE"]"#,
            "hostname:UNIQUE",
            "@hostname:unique",
        ] {
            assert_eq!(parse("hello", input).unwrap(), expected, "{input}");
        }
    }

    #[test]
    fn multiple_rows_are_anded() {
        let rule = parse("hello", "hostname:MAX_PER:2,@zone:GROUP_BY:3").unwrap();
        assert_eq!(
            rule,
            PlacementRule::and([
                PlacementRule::MaxPerHostname {
                    max: 2,
                    task_filter: hello_filter()
                },
                PlacementRule::RoundRobinByZone {
                    zone_count: Some(3),
                    task_filter: hello_filter()
                },
            ])
        );
    }

    #[test]
    fn attribute_operators() {
        assert_eq!(
            parse("hello", "rack:CLUSTER:r1").unwrap(),
            PlacementRule::Attribute {
                matcher: StringMatcher::attribute_exact("rack", "r1")
            }
        );
        let unlike = parse("hello", r#"[["rack","UNLIKE","r[7-9]"]]"#).unwrap();
        assert!(matches!(unlike, PlacementRule::Not { .. }));
        let group_by = parse("hello", "rack:GROUP_BY").unwrap();
        assert_eq!(
            group_by,
            PlacementRule::RoundRobinByAttribute {
                attribute: "rack".into(),
                total_count: None,
                task_filter: hello_filter()
            }
        );
        assert!(matches!(
            parse("hello", "rack:MAX_PER:2").unwrap(),
            PlacementRule::And { .. }
        ));
    }

    #[test]
    fn escaped_separators() {
        let rule = parse("hello", r"hostname:LIKE:host-[0-9]\,[a-z]").unwrap();
        assert_eq!(
            rule,
            PlacementRule::Hostname {
                matcher: StringMatcher::regex("host-[0-9],[a-z]").unwrap()
            }
        );
        assert_eq!(escaped_split(r"a\:b:c", ':'), vec!["a:b", "c"]);
        assert_eq!(escaped_split(r"a\.b", ':'), vec![r"a\.b"]);
        assert_eq!(escaped_split("a:b:", ':'), vec!["a", "b", ""]);
    }

    #[test]
    fn malformed_input() {
        assert!(matches!(
            parse("hello", "hostname"),
            Err(ConstraintError::InvalidRow(_))
        ));
        assert!(matches!(
            parse("hello", "hostname:NEAR:x"),
            Err(ConstraintError::UnsupportedOperator { .. })
        ));
        assert!(matches!(
            parse("hello", "hostname:LIKE"),
            Err(ConstraintError::MissingParameter { .. })
        ));
        assert!(matches!(
            parse("hello", "hostname:MAX_PER:two"),
            Err(ConstraintError::InvalidNumber { .. })
        ));
        assert!(matches!(
            parse("hello", "hostname:LIKE:("),
            Err(ConstraintError::InvalidRegex(_))
        ));
    }
}

//! Reusable transform operations.
//!
//! Operations are plain serializable data (so plans can be stored as JSON).
//! [`OperationTransform`] wraps one operation with the per-instance state a
//! chain element needs: a compiled regex and any injected field metadata.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::unsync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write as _;

use super::{unsupported, Input, MetadataBinding, Transform};
use crate::error::{TransformError, TransformResult};

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";
const ISO_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// All available transformation operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Remove leading and trailing whitespace
    Trim,

    /// Convert to uppercase
    Uppercase,

    /// Convert to lowercase
    Lowercase,

    /// Replace using regex pattern
    Replace {
        pattern: String,
        #[serde(default)]
        value: String,
    },

    /// Pad string at start to reach target length
    PadStart {
        length: usize,
        #[serde(default = "default_pad_char")]
        char: String,
    },

    /// Pad string at end to reach target length
    PadEnd {
        length: usize,
        #[serde(default = "default_pad_char")]
        char: String,
    },

    /// Ensure string starts with given prefix
    Prefix { value: String },

    /// Ensure string ends with given suffix
    Suffix { value: String },

    /// Keep at most `length` characters
    Truncate { length: usize },

    /// Take a character range
    Substring {
        start: usize,
        #[serde(default)]
        length: Option<usize>,
    },

    /// Map values using a lookup table
    Lookup {
        mapping: HashMap<String, String>,
        #[serde(default)]
        case_insensitive: bool,
        /// Value to use when no mapping match found (null = empty string)
        #[serde(default)]
        default_unmapped: Option<String>,
    },

    /// Split string into array
    Split {
        #[serde(default = "default_split_separator")]
        separator: String,
    },

    /// Convert to boolean
    ToBoolean {
        #[serde(default = "default_true_values")]
        true_values: Vec<String>,
    },

    /// Convert to number
    ToNumber,

    /// Remove all non-digit characters
    DigitsOnly,

    /// Remove all non-alphanumeric characters
    Alphanumeric,

    /// Extract year (4 digits) from a date string
    ExtractYear,

    /// Always produce `value`
    Constant { value: Value },

    /// Replace null or blank input with `value`
    Nvl { value: Value },

    /// Join the row's source values into its target vectors
    Concatenate {
        #[serde(default = "default_concat_separator")]
        separator: String,
    },

    /// Parse a date string into ISO form; format falls back to the
    /// source field's `in_format` annotation
    ParseDate {
        #[serde(default)]
        format: Option<String>,
    },

    /// Render an ISO date; format falls back to the target field's
    /// `out_format` annotation
    FormatDate {
        #[serde(default)]
        format: Option<String>,
    },
}

fn default_pad_char() -> String {
    "0".to_string()
}

fn default_split_separator() -> String {
    ",".to_string()
}

fn default_concat_separator() -> String {
    " ".to_string()
}

fn default_true_values() -> Vec<String> {
    vec![
        "true".to_string(),
        "1".to_string(),
        "yes".to_string(),
        "oui".to_string(),
        "o".to_string(),
        "y".to_string(),
    ]
}

impl Operation {
    /// snake_case name, as used in plan JSON.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Trim => "trim",
            Operation::Uppercase => "uppercase",
            Operation::Lowercase => "lowercase",
            Operation::Replace { .. } => "replace",
            Operation::PadStart { .. } => "pad_start",
            Operation::PadEnd { .. } => "pad_end",
            Operation::Prefix { .. } => "prefix",
            Operation::Suffix { .. } => "suffix",
            Operation::Truncate { .. } => "truncate",
            Operation::Substring { .. } => "substring",
            Operation::Lookup { .. } => "lookup",
            Operation::Split { .. } => "split",
            Operation::ToBoolean { .. } => "to_boolean",
            Operation::ToNumber => "to_number",
            Operation::DigitsOnly => "digits_only",
            Operation::Alphanumeric => "alphanumeric",
            Operation::ExtractYear => "extract_year",
            Operation::Constant { .. } => "constant",
            Operation::Nvl { .. } => "nvl",
            Operation::Concatenate { .. } => "concatenate",
            Operation::ParseDate { .. } => "parse_date",
            Operation::FormatDate { .. } => "format_date",
        }
    }

    /// Wrap this operation as a chain element.
    pub fn into_transform(self) -> OperationTransform {
        OperationTransform::new(self)
    }

    /// Apply this operation to a single value, without injected metadata.
    pub fn apply(&self, value: &Value) -> TransformResult<Value> {
        match self {
            Operation::Replace { pattern, value: replacement } => {
                let re = Regex::new(pattern)?;
                Ok(apply_replace(value, &re, replacement))
            }
            Operation::ParseDate { format } => {
                apply_parse_date(value, format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT))
            }
            Operation::FormatDate { format } => {
                apply_format_date(value, format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT))
            }
            _ => self.apply_plain(value),
        }
    }

    /// Operations that need neither a compiled pattern nor metadata.
    fn apply_plain(&self, value: &Value) -> TransformResult<Value> {
        let out = match self {
            Operation::Trim => map_string(value, |s| s.trim().to_string()),
            Operation::Uppercase => map_string(value, |s| s.to_uppercase()),
            Operation::Lowercase => map_string(value, |s| s.to_lowercase()),
            Operation::PadStart { length, char } => {
                map_string(value, |s| pad(&s, *length, char, true))
            }
            Operation::PadEnd { length, char } => {
                map_string(value, |s| pad(&s, *length, char, false))
            }
            Operation::Prefix { value: prefix } => map_string(value, |s| {
                if s.starts_with(prefix.as_str()) {
                    s
                } else {
                    format!("{}{}", prefix, s)
                }
            }),
            Operation::Suffix { value: suffix } => map_string(value, |s| {
                if s.ends_with(suffix.as_str()) {
                    s
                } else {
                    format!("{}{}", s, suffix)
                }
            }),
            Operation::Truncate { length } => {
                map_string(value, |s| s.chars().take(*length).collect())
            }
            Operation::Substring { start, length } => map_string(value, |s| {
                let chars = s.chars().skip(*start);
                match length {
                    Some(l) => chars.take(*l).collect(),
                    None => chars.collect(),
                }
            }),
            Operation::Lookup {
                mapping,
                case_insensitive,
                default_unmapped,
            } => apply_lookup(value, mapping, *case_insensitive, default_unmapped.as_deref()),
            Operation::Split { separator } => match as_string(value) {
                Some(s) => Value::Array(
                    s.split(separator.as_str())
                        .map(|p| Value::String(p.trim().to_string()))
                        .collect(),
                ),
                None => value.clone(),
            },
            Operation::ToBoolean { true_values } => match value {
                Value::Bool(b) => Value::Bool(*b),
                _ => match as_string(value) {
                    Some(s) => {
                        let lower = s.trim().to_lowercase();
                        Value::Bool(true_values.iter().any(|tv| tv.to_lowercase() == lower))
                    }
                    None => Value::Bool(false),
                },
            },
            Operation::ToNumber => apply_to_number(value),
            Operation::DigitsOnly => {
                map_string(value, |s| s.chars().filter(|c| c.is_ascii_digit()).collect())
            }
            Operation::Alphanumeric => {
                map_string(value, |s| s.chars().filter(|c| c.is_alphanumeric()).collect())
            }
            Operation::ExtractYear => apply_extract_year(value),
            Operation::Constant { value: constant } => constant.clone(),
            Operation::Nvl { value: fallback } => {
                if is_blank(value) {
                    fallback.clone()
                } else {
                    value.clone()
                }
            }
            Operation::Concatenate { .. } => match value {
                Value::String(_) | Value::Null => value.clone(),
                other => Value::String(other.to_string()),
            },
            Operation::Replace { .. } | Operation::ParseDate { .. } | Operation::FormatDate { .. } => {
                return self.apply(value);
            }
        };
        Ok(out)
    }
}

/// A chain element backed by an [`Operation`].
#[derive(Debug)]
pub struct OperationTransform {
    op: Operation,
    pattern: OnceCell<Regex>,
    source_metadata: Option<MetadataBinding>,
    target_metadata: Option<MetadataBinding>,
}

impl OperationTransform {
    pub fn new(op: Operation) -> Self {
        Self {
            op,
            pattern: OnceCell::new(),
            source_metadata: None,
            target_metadata: None,
        }
    }

    pub fn operation(&self) -> &Operation {
        &self.op
    }

    fn scalar(&self, value: Value) -> TransformResult<Value> {
        match &self.op {
            Operation::Replace { pattern, value: replacement } => {
                let re = self.pattern.get_or_try_init(|| Regex::new(pattern))?;
                Ok(apply_replace(&value, re, replacement))
            }
            Operation::ParseDate { format } => {
                let fmt = resolve_format(format, self.source_metadata.as_ref(), "in_format");
                apply_parse_date(&value, &fmt)
            }
            Operation::FormatDate { format } => {
                let fmt = resolve_format(format, self.target_metadata.as_ref(), "out_format");
                apply_format_date(&value, &fmt)
            }
            op => op.apply_plain(&value),
        }
    }

    fn row(&self, input: Input<'_, '_>) -> TransformResult<Value> {
        let row = match input {
            Input::Row(row) => row,
            other => return Err(unsupported(self.op.name(), &other)),
        };

        let produced = match &self.op {
            Operation::Constant { value } => value.clone(),
            Operation::Concatenate { separator } => {
                let parts: Vec<String> = row
                    .each_source()
                    .filter_map(|(_, v)| as_string(v))
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if parts.is_empty() {
                    Value::Null
                } else {
                    Value::String(parts.join(separator))
                }
            }
            Operation::Nvl { value } => row
                .each_source()
                .map(|(_, v)| v)
                .find(|v| !is_blank(v))
                .cloned()
                .unwrap_or_else(|| value.clone()),
            op => return Err(unsupported(op.name(), &Input::Row(row))),
        };

        let targets: Vec<String> = row.write_keys().into_iter().map(str::to_string).collect();
        for key in targets {
            row.set(&key, produced.clone())?;
        }
        Ok(Value::Null)
    }
}

impl From<Operation> for OperationTransform {
    fn from(op: Operation) -> Self {
        Self::new(op)
    }
}

impl Transform for OperationTransform {
    fn name(&self) -> &str {
        self.op.name()
    }

    fn call(&mut self, input: Input<'_, '_>) -> TransformResult<Value> {
        match input {
            Input::Value(v) => self.scalar(v),
            Input::None => match &self.op {
                Operation::Constant { value } | Operation::Nvl { value } => Ok(value.clone()),
                op => Err(unsupported(op.name(), &Input::None)),
            },
            row @ Input::Row(_) => self.row(row),
        }
    }

    fn accepts_source_metadata(&self) -> bool {
        matches!(self.op, Operation::ParseDate { .. })
    }

    fn accepts_target_metadata(&self) -> bool {
        matches!(self.op, Operation::FormatDate { .. })
    }

    fn set_source_metadata(&mut self, metadata: MetadataBinding) {
        self.source_metadata = Some(metadata);
    }

    fn set_target_metadata(&mut self, metadata: MetadataBinding) {
        self.target_metadata = Some(metadata);
    }
}

fn resolve_format(explicit: &Option<String>, metadata: Option<&MetadataBinding>, key: &str) -> String {
    explicit
        .clone()
        .or_else(|| {
            metadata
                .and_then(|m| m.lookup(key))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string())
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn map_string(value: &Value, f: impl FnOnce(String) -> String) -> Value {
    as_string(value)
        .map(|s| Value::String(f(s)))
        .unwrap_or_else(|| value.clone())
}

/// Null, blank strings and empty containers.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn pad(s: &str, length: usize, pad_char: &str, at_start: bool) -> String {
    let len = s.chars().count();
    if len >= length {
        return s.to_string();
    }
    let fill = pad_char.chars().next().unwrap_or('0');
    let padding: String = std::iter::repeat(fill).take(length - len).collect();
    if at_start {
        format!("{}{}", padding, s)
    } else {
        format!("{}{}", s, padding)
    }
}

fn apply_replace(value: &Value, re: &Regex, replacement: &str) -> Value {
    map_string(value, |s| re.replace_all(&s, replacement).into_owned())
}

fn apply_lookup(
    value: &Value,
    mapping: &HashMap<String, String>,
    case_insensitive: bool,
    default_unmapped: Option<&str>,
) -> Value {
    let Some(s) = as_string(value) else {
        return value.clone();
    };

    let found = if case_insensitive {
        let key = s.to_lowercase();
        mapping.iter().find(|(k, _)| k.to_lowercase() == key).map(|(_, v)| v)
    } else {
        mapping.get(&s)
    };

    match (found, default_unmapped) {
        (Some(v), _) => Value::String(v.clone()),
        (None, Some(d)) => Value::String(d.to_string()),
        (None, None) => Value::String(String::new()),
    }
}

fn apply_to_number(value: &Value) -> Value {
    if let Value::Number(_) = value {
        return value.clone();
    }
    let Some(s) = as_string(value) else {
        return Value::Null;
    };
    let trimmed = s.trim();

    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }

    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Value::Null;
    }
    let signed = if trimmed.starts_with('-') {
        format!("-{}", digits)
    } else {
        digits
    };
    signed.parse::<i64>().map(Value::from).unwrap_or(Value::Null)
}

fn apply_extract_year(value: &Value) -> Value {
    let Some(s) = as_string(value) else {
        return Value::Null;
    };
    let digits: Vec<char> = s.chars().collect();
    digits
        .windows(4)
        .find(|w| w.iter().all(|c| c.is_ascii_digit()))
        .and_then(|w| w.iter().collect::<String>().parse::<i64>().ok())
        .map(Value::from)
        .unwrap_or(Value::Null)
}

fn invalid(transform: &str, value: &Value, message: impl Into<String>) -> TransformError {
    TransformError::InvalidValue {
        transform: transform.to_string(),
        value: value.to_string(),
        message: message.into(),
    }
}

fn apply_parse_date(value: &Value, format: &str) -> TransformResult<Value> {
    if is_blank(value) {
        return Ok(Value::Null);
    }
    let Some(s) = as_string(value) else {
        return Err(invalid("parse_date", value, "not a string"));
    };
    let s = s.trim();

    if let Ok(date) = NaiveDate::parse_from_str(s, format) {
        return Ok(Value::String(date.format(DEFAULT_DATE_FORMAT).to_string()));
    }
    match NaiveDateTime::parse_from_str(s, format) {
        Ok(dt) => Ok(Value::String(dt.format(ISO_DATETIME_FORMAT).to_string())),
        Err(e) => Err(invalid("parse_date", value, format!("expected {}: {}", format, e))),
    }
}

fn apply_format_date(value: &Value, format: &str) -> TransformResult<Value> {
    if is_blank(value) {
        return Ok(Value::Null);
    }
    let Some(s) = as_string(value) else {
        return Err(invalid("format_date", value, "not a string"));
    };
    let s = s.trim();

    let mut out = String::new();
    let written = if let Ok(date) = NaiveDate::parse_from_str(s, DEFAULT_DATE_FORMAT) {
        write!(out, "{}", date.format(format))
    } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, ISO_DATETIME_FORMAT) {
        write!(out, "{}", dt.format(format))
    } else {
        return Err(invalid("format_date", value, "not an ISO date"));
    };

    written.map_err(|_| invalid("format_date", value, format!("bad format {}", format)))?;
    Ok(Value::String(out))
}

/// Get a description of all available operations
pub fn operations_description() -> String {
    r#"Available transformation operations:

| Operation | Description | Parameters |
|-----------|-------------|------------|
| trim | Remove leading/trailing whitespace | - |
| uppercase | Convert to uppercase | - |
| lowercase | Convert to lowercase | - |
| replace | Regex pattern replacement | pattern: regex, value: replacement |
| pad_start | Pad string at start | length: target length, char: pad character (default "0") |
| pad_end | Pad string at end | length: target length, char: pad character (default "0") |
| prefix | Add prefix if not present | value: prefix string |
| suffix | Add suffix if not present | value: suffix string |
| truncate | Keep the first characters | length: max characters |
| substring | Extract substring | start: start index, length: optional length |
| lookup | Map values using lookup table | mapping: {source: target}, case_insensitive: bool, default_unmapped |
| split | Split into array | separator: split char (default ",") |
| to_boolean | Convert to boolean | true_values: list of truthy strings |
| to_number | Convert to number | - |
| digits_only | Keep only digits | - |
| alphanumeric | Keep only alphanumeric chars | - |
| extract_year | Extract 4-digit year from date | - |
| constant | Always produce a value (any arity) | value |
| nvl | Replace null/blank (row: first non-blank source) | value |
| concatenate | Join source values into targets (row) | separator (default " ") |
| parse_date | Parse date to ISO; source field `in_format` | format: optional strftime |
| format_date | Render ISO date; target field `out_format` | format: optional strftime |

Example operations in JSON:
[
  {"type": "trim"},
  {"type": "replace", "pattern": "[-. ]", "value": ""},
  {"type": "lookup", "mapping": {"CA": "Composer", "A": "Author"}, "case_insensitive": true},
  {"type": "to_number"},
  {"type": "prefix", "value": "T"}
]"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FieldMetadata;
    use crate::row::{ColumnIndex, KeySet, Row};
    use serde_json::json;

    fn call(op: Operation, value: Value) -> Value {
        op.into_transform().call(Input::Value(value)).unwrap()
    }

    #[test]
    fn test_trim() {
        assert_eq!(call(Operation::Trim, json!("  hello  ")), json!("hello"));
    }

    #[test]
    fn test_lookup() {
        let mut mapping = HashMap::new();
        mapping.insert("CA".to_string(), "Composer".to_string());
        mapping.insert("A".to_string(), "Author".to_string());

        let op = Operation::Lookup {
            mapping: mapping.clone(),
            case_insensitive: true,
            default_unmapped: None,
        };
        assert_eq!(call(op.clone(), json!("ca")), json!("Composer"));
        assert_eq!(call(op, json!("Unknown")), json!(""));

        let with_default = Operation::Lookup {
            mapping,
            case_insensitive: true,
            default_unmapped: Some("Other".to_string()),
        };
        assert_eq!(call(with_default, json!("Unknown")), json!("Other"));
    }

    #[test]
    fn test_to_number() {
        assert_eq!(call(Operation::ToNumber, json!("123456789")), json!(123456789));
        assert_eq!(call(Operation::ToNumber, json!("123-456-789")), json!(123456789));
        assert_eq!(call(Operation::ToNumber, json!("2.5")), json!(2.5));
        assert_eq!(call(Operation::ToNumber, json!("n/a")), Value::Null);
    }

    #[test]
    fn test_extract_year() {
        assert_eq!(call(Operation::ExtractYear, json!("15/03/2024")), json!(2024));
        assert_eq!(call(Operation::ExtractYear, json!("2023-12-25")), json!(2023));
    }

    #[test]
    fn test_prefix() {
        let op = Operation::Prefix { value: "T".to_string() };
        assert_eq!(call(op.clone(), json!("1234567890")), json!("T1234567890"));
        assert_eq!(call(op, json!("T1234567890")), json!("T1234567890"));
    }

    #[test]
    fn test_pad_and_truncate() {
        let pad = Operation::PadStart { length: 5, char: "0".to_string() };
        assert_eq!(call(pad, json!("42")), json!("00042"));
        assert_eq!(call(Operation::Truncate { length: 3 }, json!("abcdef")), json!("abc"));
    }

    #[test]
    fn test_replace_reuses_compiled_pattern() {
        let mut t = Operation::Replace {
            pattern: "[-. ]".to_string(),
            value: String::new(),
        }
        .into_transform();

        assert_eq!(t.call(Input::Value(json!("T-123.4"))).unwrap(), json!("T1234"));
        assert_eq!(t.call(Input::Value(json!("9 9"))).unwrap(), json!("99"));
        assert!(t.pattern.get().is_some());
    }

    #[test]
    fn test_invalid_pattern_fails() {
        let mut t = Operation::Replace {
            pattern: "(".to_string(),
            value: String::new(),
        }
        .into_transform();

        let err = t.call(Input::Value(json!("x"))).unwrap_err();
        assert!(matches!(err, TransformError::InvalidPattern(_)));
    }

    #[test]
    fn test_parse_date_uses_source_metadata() {
        let mut fields = FieldMetadata::new();
        fields.annotate("born", "in_format", json!("%d/%m/%Y"));

        let mut t = Operation::ParseDate { format: None }.into_transform();
        assert!(t.accepts_source_metadata());
        t.set_source_metadata(MetadataBinding::for_vectors(&fields, &["born".to_string()]));

        assert_eq!(t.call(Input::Value(json!("15/03/2024"))).unwrap(), json!("2024-03-15"));
        assert_eq!(t.call(Input::Value(json!(""))).unwrap(), Value::Null);
        assert!(t.call(Input::Value(json!("2024-03-15"))).is_err());
    }

    #[test]
    fn test_format_date_uses_target_metadata() {
        let mut fields = FieldMetadata::new();
        fields.annotate("born", "out_format", json!("%m/%d/%Y"));

        let mut t = Operation::FormatDate { format: None }.into_transform();
        assert!(t.accepts_target_metadata());
        t.set_target_metadata(MetadataBinding::for_vectors(&fields, &["born".to_string()]));

        assert_eq!(t.call(Input::Value(json!("2024-03-15"))).unwrap(), json!("03/15/2024"));
    }

    #[test]
    fn test_constant_without_input() {
        let mut t = Operation::Constant { value: json!("x") }.into_transform();
        assert_eq!(t.call(Input::None).unwrap(), json!("x"));

        let mut trim = Operation::Trim.into_transform();
        assert!(matches!(
            trim.call(Input::None).unwrap_err(),
            TransformError::UnsupportedInput { .. }
        ));
    }

    #[test]
    fn test_concatenate_row() {
        let index = ColumnIndex::new(["first", "last", "full"]);
        let sources: KeySet = ["first", "last"].iter().map(|s| s.to_string()).collect();
        let mut row = Row::new(&index, vec![json!("Ada"), json!(" Lovelace "), Value::Null])
            .unwrap()
            .with_source_keys(&sources);

        let mut t = Operation::Concatenate { separator: " ".to_string() }.into_transform();
        t.call(Input::Row(&mut row)).unwrap();

        assert_eq!(row.get("full").unwrap(), &json!("Ada Lovelace"));
    }

    #[test]
    fn test_concatenate_into_a_source_vector() {
        let mut table = crate::table::Table::from_columns([
            ("first", vec![json!("Ada"), json!("Alan")]),
            ("last", vec![json!("Lovelace"), json!("Turing")]),
        ])
        .unwrap();

        crate::map::Map::in_place(&mut table)
            .source(["first", "last"])
            .target(["first"])
            .transform(Operation::Concatenate { separator: " ".to_string() }.into_transform())
            .execute()
            .unwrap();

        assert_eq!(
            table.get_column("first").unwrap(),
            &[json!("Ada Lovelace"), json!("Alan Turing")]
        );
        assert_eq!(table.get_column("last").unwrap(), &[json!("Lovelace"), json!("Turing")]);
    }

    #[test]
    fn test_nvl_row_takes_first_non_blank() {
        let index = ColumnIndex::new(["a", "b", "out"]);
        let sources: KeySet = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let mut row = Row::new(&index, vec![json!(" "), json!("b"), Value::Null])
            .unwrap()
            .with_source_keys(&sources);

        let mut t = Operation::Nvl { value: json!("none") }.into_transform();
        t.call(Input::Row(&mut row)).unwrap();
        assert_eq!(row.get("out").unwrap(), &json!("b"));
    }

    #[test]
    fn test_operation_json() {
        let ops: Vec<Operation> = serde_json::from_str(
            r#"[{"type": "trim"}, {"type": "pad_start", "length": 4}, {"type": "parse_date"}]"#,
        )
        .unwrap();

        assert_eq!(ops[0], Operation::Trim);
        assert_eq!(ops[1], Operation::PadStart { length: 4, char: "0".to_string() });
        assert_eq!(ops[2], Operation::ParseDate { format: None });
    }
}

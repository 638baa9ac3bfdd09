//! CSV loading with encoding and delimiter auto-detection.
//!
//! Loads CSV content into a [`Table`] (all cells as strings, header order
//! preserved) and writes tables back out as CSV.

use serde_json::Value;
use std::io::Write;
use std::path::Path;

use super::Table;
use crate::error::{LoadError, LoadResult};

/// Options controlling how CSV content becomes a table.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Force a delimiter instead of detecting it.
    pub delimiter: Option<char>,
    /// Load empty cells as `null` instead of `""`.
    pub blanks_as_null: bool,
}

/// A loaded table with the detected input settings.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: Table,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
}

impl LoadedTable {
    pub fn headers(&self) -> &[String] {
        self.table.columns()
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> LoadResult<String> {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => match String::from_utf8(bytes.to_vec()) {
            Ok(s) => s,
            Err(_) => String::from_utf8_lossy(bytes).into_owned(),
        },
        "iso-8859-1" | "latin-1" | "latin1" => {
            decode_with(encoding_rs::ISO_8859_15, bytes, encoding)?
        }
        "windows-1252" | "cp1252" => decode_with(encoding_rs::WINDOWS_1252, bytes, encoding)?,
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };
    Ok(decoded)
}

fn decode_with(
    codec: &'static encoding_rs::Encoding,
    bytes: &[u8],
    encoding: &str,
) -> LoadResult<String> {
    let (text, _, had_errors) = codec.decode(bytes);
    if had_errors {
        return Err(LoadError::Encoding {
            encoding: encoding.to_string(),
        });
    }
    Ok(text.into_owned())
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ';';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Load CSV text with an explicit delimiter.
pub fn load_str(content: &str, delimiter: char, options: &LoadOptions) -> LoadResult<Table> {
    if content.trim().is_empty() {
        return Err(LoadError::EmptyInput);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_byte(delimiter))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(LoadError::NoHeaders);
    }

    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        for (i, column) in columns.iter_mut().enumerate() {
            let cell = record.get(i).unwrap_or("");
            column.push(if cell.is_empty() && options.blanks_as_null {
                Value::Null
            } else {
                Value::String(cell.to_string())
            });
        }
    }

    let table = Table::from_columns(headers.into_iter().zip(columns))
        .map_err(|_| LoadError::NoHeaders)?;
    Ok(table)
}

/// Load CSV bytes with auto-detection of encoding and delimiter.
pub fn load_bytes_auto(bytes: &[u8], options: &LoadOptions) -> LoadResult<LoadedTable> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = options
        .delimiter
        .unwrap_or_else(|| detect_delimiter(&content));

    let table = load_str(&content, delimiter, options)?;
    Ok(LoadedTable {
        table,
        encoding,
        delimiter,
    })
}

/// Load a CSV file with auto-detection of encoding and delimiter.
pub fn load_file_auto<P: AsRef<Path>>(path: P, options: &LoadOptions) -> LoadResult<LoadedTable> {
    let bytes = std::fs::read(path.as_ref())?;
    load_bytes_auto(&bytes, options)
}

/// Write a table as CSV. `null` cells are written empty.
pub fn write_csv<W: Write>(table: &Table, writer: W, delimiter: char) -> LoadResult<()> {
    let mut out = csv::WriterBuilder::new()
        .delimiter(delimiter_byte(delimiter))
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    out.write_record(table.columns())?;
    for record in table.to_records() {
        let cells: Vec<String> = table
            .columns()
            .iter()
            .map(|name| cell_text(&record[name.as_str()]))
            .collect();
        out.write_record(&cells)?;
    }
    out.flush()?;
    Ok(())
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn delimiter_byte(delimiter: char) -> u8 {
    u8::try_from(delimiter).unwrap_or(b',')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_csv() {
        let table = load_str("name;age\nAlice;30\nBob;25", ';', &LoadOptions::default()).unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.columns(), &["name", "age"]);
        assert_eq!(table.get_column("name").unwrap()[0], "Alice");
        assert_eq!(table.get_column("age").unwrap()[1], "25");
    }

    #[test]
    fn test_quoted_values() {
        let csv = "name;value\n\"Alice\";\"Hello; World\"";
        let table = load_str(csv, ';', &LoadOptions::default()).unwrap();

        assert_eq!(table.get_column("value").unwrap()[0], "Hello; World");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let table = load_str("a;b\n1;2\n\n3;4\n", ';', &LoadOptions::default()).unwrap();
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_missing_values() {
        let table = load_str("a;b;c\n1;;3\n4", ';', &LoadOptions::default()).unwrap();

        assert_eq!(table.get_column("b").unwrap()[0], "");
        assert_eq!(table.get_column("c").unwrap()[1], "");
    }

    #[test]
    fn test_blanks_as_null() {
        let options = LoadOptions {
            blanks_as_null: true,
            ..LoadOptions::default()
        };
        let table = load_str("a;b\n1;", ';', &options).unwrap();
        assert_eq!(table.get_column("b").unwrap()[0], Value::Null);
    }

    #[test]
    fn test_empty_csv_error() {
        let err = load_str("", ';', &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::EmptyInput));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
    }

    #[test]
    fn test_auto_load() {
        let loaded = load_bytes_auto(b"name,age\nAlice,30\nBob,25", &LoadOptions::default()).unwrap();

        assert_eq!(loaded.delimiter, ',');
        assert_eq!(loaded.table.row_count(), 2);
        assert_eq!(loaded.headers(), &["name", "age"]);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_write_csv() {
        let table = Table::from_columns([
            ("a", vec![json!("x"), json!(null)]),
            ("b", vec![json!(1), json!(true)]),
        ])
        .unwrap();

        let mut out = Vec::new();
        write_csv(&table, &mut out, ',').unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a,b\nx,1\n,true\n");
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.csv");
        std::fs::write(&path, "id;name\n1;Ann\n").unwrap();

        let loaded = load_file_auto(&path, &LoadOptions::default()).unwrap();
        assert_eq!(loaded.delimiter, ';');
        assert_eq!(loaded.table.get_column("name").unwrap()[0], "Ann");
    }
}

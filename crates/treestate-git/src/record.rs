//! Parsing of single porcelain v2 records.
//!
//! Field layouts (`-z` mode):
//!
//! ```text
//! 1 <XY> <sub> <mH> <mI> <mW> <hH> <hI> <path>
//! 2 <XY> <sub> <mH> <mI> <mW> <hH> <hI> <X><score> <path>   (next record: <origPath>)
//! u <XY> <sub> <m1> <m2> <m3> <mW> <h1> <h2> <h3> <path>
//! ? <path>
//! ! <path>
//! # <key> <value>
//! ```
//!
//! The path is everything after the fixed number of leading fields, so paths
//! containing spaces survive.

/// Fields before the path in an ordinary (`1`) entry
const ORDINARY_FIELDS: usize = 8;
/// Fields before the path in a rename/copy (`2`) entry
const RENAME_FIELDS: usize = 9;
/// Fields before the path in an unmerged (`u`) entry
const UNMERGED_FIELDS: usize = 10;

/// Index (X) and working-tree (Y) status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode {
    pub x: char,
    pub y: char,
}

impl StatusCode {
    pub fn parse(field: &str) -> Option<Self> {
        let mut chars = field.chars();
        let x = chars.next()?;
        let y = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        Some(Self { x, y })
    }
}

/// How the records being parsed were delimited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordLayout {
    /// `-z` output. A tab is an ordinary path character and the original
    /// path of a rename arrives as the following record.
    #[default]
    NulDelimited,
    /// Newline output, where a rename carries `<path>\t<origPath>`
    LineDelimited,
}

/// One logical porcelain v2 record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record<'a> {
    /// `# key value`
    Header { key: &'a str, value: &'a str },
    /// Type `1`
    Ordinary { code: StatusCode, path: &'a str },
    /// Type `u`
    Unmerged { code: StatusCode, path: &'a str },
    /// Type `2`. `path` is the new path when present; `original` is set only
    /// for [`RecordLayout::LineDelimited`].
    Rename {
        code: StatusCode,
        path: Option<&'a str>,
        original: Option<&'a str>,
    },
    /// `? path`
    Untracked(&'a str),
    /// `! path`
    Ignored(&'a str),
    /// Blank record
    Empty,
    /// Unrecognised leading character or malformed fields
    Unknown,
}

impl<'a> Record<'a> {
    /// Parse one record produced in the given layout
    pub fn parse_as(raw: &'a str, layout: RecordLayout) -> Self {
        let record = raw.trim_start().trim_end_matches(['\n', '\r']);
        if record.trim().is_empty() {
            return Record::Empty;
        }

        if let Some(header) = record.strip_prefix("# ") {
            let (key, value) = header.split_once(' ').unwrap_or((header, ""));
            return Record::Header {
                key,
                value: value.trim(),
            };
        }
        if let Some(path) = record.strip_prefix("? ") {
            return Record::Untracked(path);
        }
        if let Some(path) = record.strip_prefix("! ") {
            return Record::Ignored(path);
        }

        match record.as_bytes()[0] {
            b'1' => match entry_fields(record, ORDINARY_FIELDS) {
                Some((code, Some(path))) => Record::Ordinary { code, path },
                _ => Record::Unknown,
            },
            b'u' => match entry_fields(record, UNMERGED_FIELDS) {
                Some((code, Some(path))) => Record::Unmerged { code, path },
                _ => Record::Unknown,
            },
            b'2' => match entry_fields(record, RENAME_FIELDS) {
                Some((code, Some(path))) => match path
                    .split_once('\t')
                    .filter(|_| layout == RecordLayout::LineDelimited)
                {
                    Some((path, original)) => Record::Rename {
                        code,
                        path: Some(path),
                        original: Some(original),
                    },
                    None => Record::Rename {
                        code,
                        path: Some(path),
                        original: None,
                    },
                },
                Some((code, None)) => Record::Rename {
                    code,
                    path: None,
                    original: None,
                },
                None => Record::Unknown,
            },
            _ => Record::Unknown,
        }
    }
}

/// Split an entry into its status code and trailing path.
///
/// `leading` counts the fields before the path, including the type field.
/// A record with fewer fields falls back to its last whitespace token as
/// the path, or to no path at all when only the type and code are present.
fn entry_fields(record: &str, leading: usize) -> Option<(StatusCode, Option<&str>)> {
    let mut fields = record.splitn(leading + 1, ' ');
    let _kind = fields.next()?;
    let code = StatusCode::parse(fields.next()?)?;

    let parts: Vec<&str> = fields.collect();
    if parts.len() == leading - 1 {
        let path = parts[leading - 2];
        return Some((code, (!path.is_empty()).then_some(path)));
    }

    match parts.last() {
        Some(_) if parts.len() > 1 => Some((code, record.rsplit_once(' ').map(|(_, p)| p))),
        _ => Some((code, None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Record<'_> {
        Record::parse_as(raw, RecordLayout::NulDelimited)
    }

    const SHA: &str = "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391";

    #[test]
    fn parses_headers() {
        assert_eq!(
            parse("# branch.head main"),
            Record::Header {
                key: "branch.head",
                value: "main"
            }
        );
        assert_eq!(
            parse("# branch.ab +3 -0"),
            Record::Header {
                key: "branch.ab",
                value: "+3 -0"
            }
        );
    }

    #[test]
    fn ordinary_path_keeps_spaces() {
        let raw = format!("1 .M N... 100644 100644 100644 {SHA} {SHA} docs/my notes.md");
        match parse(&raw) {
            Record::Ordinary { code, path } => {
                assert_eq!(code, StatusCode { x: '.', y: 'M' });
                assert_eq!(path, "docs/my notes.md");
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn unmerged_entry() {
        let raw = format!("u UU N... 100644 100644 100644 100644 {SHA} {SHA} {SHA} src/lib.rs");
        assert_eq!(
            parse(&raw),
            Record::Unmerged {
                code: StatusCode { x: 'U', y: 'U' },
                path: "src/lib.rs"
            }
        );
    }

    #[test]
    fn rename_with_path_field() {
        let raw = format!("2 R. N... 100644 100644 100644 {SHA} {SHA} R100 new file.txt");
        assert_eq!(
            parse(&raw),
            Record::Rename {
                code: StatusCode { x: 'R', y: '.' },
                path: Some("new file.txt"),
                original: None
            }
        );
    }

    #[test]
    fn rename_tab_layout_carries_original() {
        let raw = format!("2 R. N... 100644 100644 100644 {SHA} {SHA} R090 b.txt\ta.txt");
        assert_eq!(
            Record::parse_as(&raw, RecordLayout::LineDelimited),
            Record::Rename {
                code: StatusCode { x: 'R', y: '.' },
                path: Some("b.txt"),
                original: Some("a.txt")
            }
        );
    }

    #[test]
    fn tab_is_part_of_the_path_in_nul_layout() {
        let raw = format!("2 R. N... 100644 100644 100644 {SHA} {SHA} R100 odd\tname.txt");
        assert_eq!(
            parse(&raw),
            Record::Rename {
                code: StatusCode { x: 'R', y: '.' },
                path: Some("odd\tname.txt"),
                original: None
            }
        );
    }

    #[test]
    fn rename_header_without_path() {
        assert_eq!(
            parse("2 R."),
            Record::Rename {
                code: StatusCode { x: 'R', y: '.' },
                path: None,
                original: None
            }
        );
    }

    #[test]
    fn short_ordinary_record_falls_back_to_last_token() {
        assert_eq!(
            parse("1 M. N... a.txt"),
            Record::Ordinary {
                code: StatusCode { x: 'M', y: '.' },
                path: "a.txt"
            }
        );
    }

    #[test]
    fn misc_records() {
        assert_eq!(parse("? dir/file"), Record::Untracked("dir/file"));
        assert_eq!(parse("! target/"), Record::Ignored("target/"));
        assert_eq!(parse("   "), Record::Empty);
        assert_eq!(parse("x whatever"), Record::Unknown);
        assert_eq!(parse("1 MMM N... a"), Record::Unknown);
        assert_eq!(parse("1"), Record::Unknown);
    }
}

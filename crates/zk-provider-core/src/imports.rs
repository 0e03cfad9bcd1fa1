//! Import discovery in program text.
//!
//! Recognises `from "<path>" import ...;` and `import "<path>" [as name];`.
//! Comments and unrelated string literals are skipped. Paths are returned in
//! the order they appear, which is the order a resolver is consulted in.

use std::ops::Range;

/// One import path found in a source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatement {
    pub path: String,
    /// Byte range of the path inside the source, without the quotes.
    pub span: Range<usize>,
}

/// Scan `source` for import paths.
pub fn scan_imports(source: &str) -> Vec<ImportStatement> {
    let bytes = source.as_bytes();
    let mut imports = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = find_from(bytes, i, b"\n").map_or(bytes.len(), |end| end + 1);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = find_from(bytes, i + 2, b"*/").map_or(bytes.len(), |end| end + 2);
            }
            b'"' => {
                i = skip_string(bytes, i);
            }
            c if is_ident_start(c) => {
                let start = i;
                while i < bytes.len() && is_ident_char(bytes[i]) {
                    i += 1;
                }
                let word = &source[start..i];
                if word != "from" && word != "import" {
                    continue;
                }
                let mut j = i;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if bytes.get(j) == Some(&b'"') {
                    let end = skip_string(bytes, j);
                    // Unterminated literals are left for the engine to report.
                    if end <= bytes.len() && bytes.get(end - 1) == Some(&b'"') && end - 1 > j {
                        imports.push(ImportStatement {
                            path: source[j + 1..end - 1].to_string(),
                            span: j + 1..end - 1,
                        });
                    }
                    i = end;
                }
            }
            _ => i += 1,
        }
    }

    imports
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Index just past the closing quote of the literal opening at `start`.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn find_from(bytes: &[u8], start: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(start..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| start + pos)
}

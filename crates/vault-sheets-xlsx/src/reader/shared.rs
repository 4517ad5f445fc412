//! Shared formula expansion
//!
//! A shared formula is stored once on its anchor cell; the other cells in its
//! block carry only the group index. Their text is the anchor's with every
//! relative reference moved by the cell's offset from the anchor.

use vault_sheets_core::{CellAddress, MAX_COLS, MAX_ROWS};

/// Move the relative references in `formula` by (`d_row`, `d_col`)
///
/// Absolute parts (`$A`, `$1`) stay put. String literals and function names
/// are left alone. Returns `None` if a reference would leave the grid.
pub(crate) fn shift_formula(formula: &str, d_row: i64, d_col: i64) -> Option<String> {
    let chars: Vec<char> = formula.chars().collect();
    let mut out = String::with_capacity(formula.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '"' {
            // Copy the string literal through, including doubled quotes
            out.push(c);
            i += 1;
            while i < chars.len() {
                out.push(chars[i]);
                if chars[i] == '"' {
                    if chars.get(i + 1) == Some(&'"') {
                        out.push('"');
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
            continue;
        }

        let starts_token = i == 0 || !is_name_char(chars[i - 1]);
        if starts_token && (c == '$' || c.is_ascii_alphabetic()) {
            if let Some((reference, len)) = scan_reference(&chars[i..]) {
                out.push_str(&reference.shifted(d_row, d_col)?);
                i += len;
                continue;
            }
        }

        // Not a reference: copy the whole name so "LOG10" is not split
        if is_name_char(c) {
            while i < chars.len() && is_name_char(chars[i]) {
                out.push(chars[i]);
                i += 1;
            }
            continue;
        }

        out.push(c);
        i += 1;
    }

    Some(out)
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$'
}

struct Reference {
    col_abs: bool,
    col: u32,
    row_abs: bool,
    row: u32,
}

impl Reference {
    fn shifted(&self, d_row: i64, d_col: i64) -> Option<String> {
        let col = if self.col_abs {
            self.col as i64
        } else {
            self.col as i64 + d_col
        };
        let row = if self.row_abs {
            self.row as i64
        } else {
            self.row as i64 + d_row
        };

        if col < 0 || row < 0 || col >= MAX_COLS as i64 || row >= MAX_ROWS as i64 {
            return None;
        }

        Some(format!(
            "{}{}{}{}",
            if self.col_abs { "$" } else { "" },
            CellAddress::column_to_letters(col as u32),
            if self.row_abs { "$" } else { "" },
            row + 1
        ))
    }
}

/// Parse `[$]LETTERS[$]DIGITS` at the start of `chars`, returning the
/// reference and the number of characters it spans
fn scan_reference(chars: &[char]) -> Option<(Reference, usize)> {
    let mut i = 0;

    let col_abs = chars.first() == Some(&'$');
    if col_abs {
        i += 1;
    }
    let letters_start = i;
    while i < chars.len() && chars[i].is_ascii_uppercase() {
        i += 1;
    }
    if i == letters_start || i - letters_start > 3 {
        return None;
    }
    let letters: String = chars[letters_start..i].iter().collect();

    let row_abs = chars.get(i) == Some(&'$');
    if row_abs {
        i += 1;
    }
    let digits_start = i;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_start {
        return None;
    }

    // A trailing name character or '(' means this is a function or name
    if let Some(&next) = chars.get(i) {
        if is_name_char(next) || next == '(' || next == '!' {
            return None;
        }
    }

    let digits: String = chars[digits_start..i].iter().collect();
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    let col = CellAddress::letters_to_column(&letters).ok()?;

    Some((
        Reference {
            col_abs,
            col,
            row_abs,
            row: row - 1,
        },
        i,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_shift_relative_references() {
        assert_eq!(shift_formula("A1*2", 1, 0).as_deref(), Some("A2*2"));
        assert_eq!(shift_formula("A1+B1", 2, 1).as_deref(), Some("B3+C3"));
        assert_eq!(shift_formula("SUM(A1:A3)", 0, 1).as_deref(), Some("SUM(B1:B3)"));
    }

    #[test]
    fn test_shift_keeps_absolute_parts() {
        assert_eq!(
            shift_formula("$A$1+$A1+A$1", 2, 2).as_deref(),
            Some("$A$1+$A3+C$1")
        );
    }

    #[test]
    fn test_shift_skips_strings_and_functions() {
        assert_eq!(
            shift_formula("IF(A1>0,\"A1\",LOG10(A1))", 1, 0).as_deref(),
            Some("IF(A2>0,\"A1\",LOG10(A2))")
        );
        assert_eq!(
            shift_formula("\"say \"\"B2\"\"\"&B2", 0, 1).as_deref(),
            Some("\"say \"\"B2\"\"\"&C2")
        );
    }

    #[test]
    fn test_shift_off_grid() {
        assert_eq!(shift_formula("A1", -1, 0), None);
        assert_eq!(shift_formula("A1", 0, -1), None);
    }
}

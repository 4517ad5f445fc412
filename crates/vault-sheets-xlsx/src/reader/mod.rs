//! XLSX reader
//!
//! Only the first worksheet is read. Styles, comments, validations and the
//! other sheets are ignored.

mod shared;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use vault_sheets_core::{CellAddress, CellRange, MAX_COLS, MAX_ROWS};

/// Raw content of one cell, as typed by the document
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// No value (e.g. a formula that was never calculated)
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Error literal such as `#DIV/0!`
    Error(String),
    /// Rich value (embedded image, linked data type) with no primitive form
    Structured,
}

/// One populated cell
#[derive(Debug, Clone, PartialEq)]
pub struct RawCell {
    pub address: CellAddress,
    /// Value, or the last computed value for formula cells
    pub value: RawValue,
    /// Formula text without the leading `=`
    pub formula: Option<String>,
}

/// The first worksheet of a document
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub name: String,
    /// Declared dimension unioned with the populated cells; `None` for a
    /// sheet with neither. Oversized declarations are dropped, see
    /// [`DIMENSION_CELL_LIMIT`].
    pub used_range: Option<CellRange>,
    /// Populated cells in row-major order
    pub cells: Vec<RawCell>,
}

impl RawSheet {
    /// Look up a populated cell
    pub fn cell(&self, address: CellAddress) -> Option<&RawCell> {
        self.cells
            .binary_search_by(|c| c.address.cmp(&address))
            .ok()
            .map(|i| &self.cells[i])
    }
}

/// Decode Excel's `_xHHHH_` escape sequences in strings.
///
/// Excel uses this format to encode special characters in XML:
/// - `_x000d_` = CR (carriage return)
/// - `_x000a_` = LF (line feed)
/// - `_x0009_` = Tab
/// - `_x005f_` = Underscore (escaped underscore)
fn decode_excel_escapes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '_' {
            // Check if this looks like _xHHHH_
            let mut hex_chars = String::new();
            let mut is_escape = false;

            if chars.peek() == Some(&'x') {
                chars.next(); // consume 'x'

                // Try to read 4 hex digits
                for _ in 0..4 {
                    if let Some(&ch) = chars.peek() {
                        if ch.is_ascii_hexdigit() {
                            hex_chars.push(ch);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }

                // Check for closing underscore
                if hex_chars.len() == 4 && chars.peek() == Some(&'_') {
                    chars.next(); // consume closing '_'
                    if let Ok(code) = u32::from_str_radix(&hex_chars, 16) {
                        if let Some(decoded) = char::from_u32(code) {
                            result.push(decoded);
                            is_escape = true;
                        }
                    }
                }
            }

            if !is_escape {
                // Not a valid escape sequence, output what we consumed
                result.push('_');
                if !hex_chars.is_empty() {
                    result.push('x');
                    result.push_str(&hex_chars);
                }
            }
        } else {
            result.push(c);
        }
    }

    result
}

/// Attribute value as an owned string
fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|s| s.to_string()))
}

/// Cell state collected between `<c>` and `</c>`
#[derive(Default)]
struct PendingCell {
    address: Option<CellAddress>,
    cell_type: Option<String>,
    rich_value: bool,
    value: Option<String>,
    formula: Option<String>,
    shared_index: Option<String>,
}

/// Largest declared `<dimension>` trusted beyond the populated cells
pub const DIMENSION_CELL_LIMIT: u64 = 1 << 20;

/// XLSX file reader
pub struct XlsxReader;

impl XlsxReader {
    /// Read the first worksheet from a file path
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsxResult<RawSheet> {
        let file = File::open(path)?;
        Self::read(file)
    }

    /// Read the first worksheet from in-memory bytes
    pub fn read_bytes(bytes: &[u8]) -> XlsxResult<RawSheet> {
        Self::read(Cursor::new(bytes))
    }

    /// Read the first worksheet from a reader
    pub fn read<R: Read + Seek>(reader: R) -> XlsxResult<RawSheet> {
        let mut archive = zip::ZipArchive::new(reader)?;

        // Verify this is an XLSX file
        if archive.by_name("[Content_Types].xml").is_err() {
            return Err(XlsxError::InvalidFormat(
                "Missing [Content_Types].xml".into(),
            ));
        }

        let shared_strings = Self::read_shared_strings(&mut archive)?;
        let sheet_info = Self::read_workbook_xml(&mut archive)?;
        let sheet_paths = Self::read_workbook_rels(&mut archive)?;

        let (name, r_id) = sheet_info
            .into_iter()
            .next()
            .ok_or_else(|| XlsxError::InvalidFormat("workbook has no sheets".into()))?;

        let path = sheet_paths
            .get(&r_id)
            .ok_or_else(|| XlsxError::MissingPart(format!("relationship {}", r_id)))?;

        let (declared, mut cells) = Self::read_worksheet(&mut archive, path, &shared_strings)?;
        cells.sort_by(|a, b| a.address.cmp(&b.address));
        cells.dedup_by(|later, earlier| later.address == earlier.address);

        let populated = cells
            .iter()
            .map(|c| CellRange::single(c.address))
            .reduce(|a, b| a.union(&b));
        let used_range = Self::used_range(declared, populated);

        log::debug!(
            "read sheet {:?}: {} cells, used range {:?}",
            name,
            cells.len(),
            used_range.map(|r| r.to_string())
        );

        Ok(RawSheet {
            name,
            used_range,
            cells,
        })
    }

    /// Union of the declared dimension and the populated cells
    ///
    /// A declared dimension larger than [`DIMENSION_CELL_LIMIT`] that extends
    /// past the populated cells is ignored.
    fn used_range(declared: Option<CellRange>, populated: Option<CellRange>) -> Option<CellRange> {
        let declared = declared.filter(|range| {
            let covered = populated.is_some_and(|p| p.union(range) == p);
            if range.cell_count() > DIMENSION_CELL_LIMIT && !covered {
                log::warn!(
                    "ignoring declared dimension {} ({} cells); populated cells span {}",
                    range,
                    range.cell_count(),
                    populated.map_or_else(|| "nothing".to_string(), |p| p.to_string())
                );
                return false;
            }
            true
        });

        match (declared, populated) {
            (Some(d), Some(p)) => Some(d.union(&p)),
            (d, p) => d.or(p),
        }
    }

    /// Read the shared strings table
    fn read_shared_strings<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<Vec<String>> {
        let mut strings = Vec::new();

        let file = match archive.by_name("xl/sharedStrings.xml") {
            Ok(f) => f,
            Err(_) => return Ok(strings), // No shared strings is valid
        };

        let reader = BufReader::new(file);
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut current_string = String::new();
        let mut in_si = false;
        let mut in_t = false;
        // Phonetic runs repeat the text in another script
        let mut in_phonetic = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"si" => {
                        in_si = true;
                        current_string.clear();
                    }
                    b"rPh" => in_phonetic = true,
                    b"t" if in_si && !in_phonetic => in_t = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) if e.name().as_ref() == b"si" => {
                    strings.push(String::new());
                }
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"si" => {
                        strings.push(decode_excel_escapes(&current_string));
                        current_string.clear();
                        in_si = false;
                    }
                    b"rPh" => in_phonetic = false,
                    b"t" => in_t = false,
                    _ => {}
                },
                Ok(Event::Text(e)) if in_t => {
                    if let Ok(text) = e.unescape() {
                        current_string.push_str(&text);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(strings)
    }

    /// Read workbook.xml to get sheet names and rIds, in tab order
    fn read_workbook_xml<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<Vec<(String, String)>> {
        let file = archive
            .by_name("xl/workbook.xml")
            .map_err(|_| XlsxError::MissingPart("xl/workbook.xml".into()))?;

        let reader = BufReader::new(file);
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut sheets = Vec::new();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"sheet" => {
                    if let (Some(name), Some(r_id)) =
                        (attr_value(&e, b"name"), attr_value(&e, b"r:id"))
                    {
                        sheets.push((name, r_id));
                    } else {
                        log::warn!("skipping <sheet> entry without name or r:id");
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(sheets)
    }

    /// Read workbook.xml.rels to map worksheet rIds to part paths
    fn read_workbook_rels<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<HashMap<String, String>> {
        let file = archive
            .by_name("xl/_rels/workbook.xml.rels")
            .map_err(|_| XlsxError::MissingPart("xl/_rels/workbook.xml.rels".into()))?;

        let reader = BufReader::new(file);
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut rels = HashMap::new();

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e))
                    if e.name().as_ref() == b"Relationship" =>
                {
                    let id = attr_value(&e, b"Id");
                    let target = attr_value(&e, b"Target");
                    let rel_type = attr_value(&e, b"Type");

                    // Only include worksheet relationships
                    if let (Some(id), Some(target), Some(rel_type)) = (id, target, rel_type) {
                        if rel_type.ends_with("/worksheet") {
                            // Target is relative to the xl/ folder unless absolute
                            let full_path = match target.strip_prefix('/') {
                                Some(absolute) => absolute.to_string(),
                                None => format!("xl/{}", target),
                            };
                            rels.insert(id, full_path);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(rels)
    }

    /// Read a worksheet part: its declared dimension and populated cells
    fn read_worksheet<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
        path: &str,
        shared_strings: &[String],
    ) -> XlsxResult<(Option<CellRange>, Vec<RawCell>)> {
        let file = archive
            .by_name(path)
            .map_err(|_| XlsxError::MissingPart(path.to_string()))?;

        let reader = BufReader::new(file);
        let mut xml_reader = Reader::from_reader(reader);
        xml_reader.trim_text(true);

        let mut buf = Vec::new();
        let mut declared = None;
        let mut cells = Vec::new();

        // Anchor and text of each shared formula group, by group index
        let mut shared_formulas: HashMap<String, (CellAddress, String)> = HashMap::new();

        // Position tracking for rows and cells without an `r` attribute
        let mut current_row: u32 = 0;
        let mut next_col: u32 = 0;
        let mut seen_row = false;

        let mut cell: Option<PendingCell> = None;
        let mut in_value = false;
        let mut in_formula = false;
        let mut in_inline_str = false;
        let mut in_inline_text = false;

        loop {
            match xml_reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"dimension" => {
                    declared = attr_value(&e, b"ref").and_then(|r| match CellRange::parse(&r) {
                        Ok(range) => Some(range),
                        Err(err) => {
                            log::warn!("ignoring unreadable sheet dimension: {}", err);
                            None
                        }
                    });
                }
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"row" => {
                    match attr_value(&e, b"r").and_then(|r| r.parse::<u32>().ok()) {
                        Some(r) if r >= 1 => current_row = r - 1,
                        _ if seen_row => current_row += 1,
                        _ => current_row = 0,
                    }
                    seen_row = true;
                    next_col = 0;
                }
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"c" => {
                        let pending = Self::open_cell(&e, current_row, next_col)?;
                        if let Some(address) = pending.address {
                            next_col = address.col + 1;
                        }
                        cell = Some(pending);
                    }
                    b"v" if cell.is_some() => in_value = true,
                    b"f" if cell.is_some() => {
                        in_formula = true;
                        Self::note_shared_index(&e, cell.as_mut());
                    }
                    b"is" if cell.is_some() => in_inline_str = true,
                    b"t" if in_inline_str => in_inline_text = true,
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.name().as_ref() {
                    // <c r="A1" s="1"/> carries style only
                    b"c" => {
                        let pending = Self::open_cell(&e, current_row, next_col)?;
                        if let Some(address) = pending.address {
                            next_col = address.col + 1;
                        }
                        if pending.rich_value {
                            if let Some(raw) =
                                Self::finish_cell(pending, shared_strings, &mut shared_formulas)?
                            {
                                cells.push(raw);
                            }
                        }
                    }
                    // <f t="shared" si="0"/> on the non-anchor cells of a group
                    b"f" => Self::note_shared_index(&e, cell.as_mut()),
                    _ => {}
                },
                Ok(Event::Text(e)) => {
                    if let Some(pending) = cell.as_mut() {
                        let text = e.unescape().map_err(XlsxError::Xml)?;
                        if in_value || in_inline_text {
                            pending
                                .value
                                .get_or_insert_with(String::new)
                                .push_str(&text);
                        } else if in_formula {
                            pending
                                .formula
                                .get_or_insert_with(String::new)
                                .push_str(&text);
                        }
                    }
                }
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"c" => {
                        if let Some(pending) = cell.take() {
                            if let Some(raw) =
                                Self::finish_cell(pending, shared_strings, &mut shared_formulas)?
                            {
                                cells.push(raw);
                            }
                        }
                        in_value = false;
                        in_formula = false;
                        in_inline_str = false;
                        in_inline_text = false;
                    }
                    b"v" => in_value = false,
                    b"f" => in_formula = false,
                    b"is" => in_inline_str = false,
                    b"t" => in_inline_text = false,
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
            buf.clear();
        }

        Ok((declared, cells))
    }

    fn open_cell(e: &BytesStart, row: u32, next_col: u32) -> XlsxResult<PendingCell> {
        let address = match attr_value(e, b"r") {
            Some(r) => CellAddress::parse(&r)
                .map_err(|err| XlsxError::Parse(format!("cell reference: {}", err)))?,
            None if row < MAX_ROWS && next_col < MAX_COLS => CellAddress::new(row, next_col),
            None => {
                return Err(XlsxError::Parse(
                    "cell without reference lies outside the grid".into(),
                ))
            }
        };

        Ok(PendingCell {
            address: Some(address),
            cell_type: attr_value(e, b"t"),
            rich_value: attr_value(e, b"vm").is_some(),
            ..PendingCell::default()
        })
    }

    fn note_shared_index(e: &BytesStart, cell: Option<&mut PendingCell>) {
        if let Some(cell) = cell {
            if attr_value(e, b"t").as_deref() == Some("shared") {
                cell.shared_index = attr_value(e, b"si");
            }
        }
    }

    /// Turn collected cell state into a typed cell; `None` for cells with
    /// no content
    fn finish_cell(
        pending: PendingCell,
        shared_strings: &[String],
        shared_formulas: &mut HashMap<String, (CellAddress, String)>,
    ) -> XlsxResult<Option<RawCell>> {
        let Some(address) = pending.address else {
            return Ok(None);
        };

        let formula = match (pending.formula, pending.shared_index) {
            (Some(text), Some(si)) => {
                shared_formulas.insert(si, (address, text.clone()));
                Some(text)
            }
            (Some(text), None) => Some(text),
            (None, Some(si)) => match shared_formulas.get(&si) {
                Some((anchor, text)) => {
                    let d_row = address.row as i64 - anchor.row as i64;
                    let d_col = address.col as i64 - anchor.col as i64;
                    let shifted = shared::shift_formula(text, d_row, d_col);
                    if shifted.is_none() {
                        log::warn!("shared formula at {} shifts off the grid; keeping its value", address);
                    }
                    shifted
                }
                None => {
                    log::warn!("cell {} refers to unknown shared formula group {}", address, si);
                    None
                }
            },
            (None, None) => None,
        };

        let value = if pending.rich_value {
            RawValue::Structured
        } else {
            match pending.value {
                None => RawValue::Empty,
                Some(v) => Self::typed_value(pending.cell_type.as_deref(), v, shared_strings)?,
            }
        };

        if value == RawValue::Empty && formula.is_none() {
            return Ok(None);
        }

        Ok(Some(RawCell {
            address,
            value,
            formula,
        }))
    }

    fn typed_value(
        cell_type: Option<&str>,
        value: String,
        shared_strings: &[String],
    ) -> XlsxResult<RawValue> {
        Ok(match cell_type {
            // Shared string
            Some("s") => {
                let idx: usize = value.trim().parse().map_err(|_| {
                    XlsxError::Parse("shared string index is not a number".into())
                })?;
                let s = shared_strings.get(idx).ok_or_else(|| {
                    XlsxError::Parse(format!("shared string index {} out of bounds", idx))
                })?;
                RawValue::Text(s.clone())
            }

            Some("b") => RawValue::Boolean(value == "1" || value.eq_ignore_ascii_case("true")),

            Some("e") => RawValue::Error(value),

            // Inline and formula strings may carry _xHHHH_ escapes
            Some("inlineStr") | Some("str") => RawValue::Text(decode_excel_escapes(&value)),

            // Number (default type or explicit "n")
            None | Some("n") => match value.trim().parse::<f64>() {
                Ok(n) => RawValue::Number(n),
                Err(_) => {
                    log::warn!("numeric cell holds non-numeric text; reading it as text");
                    RawValue::Text(value)
                }
            },

            // ISO dates and anything newer: keep the text
            Some(_) => RawValue::Text(value),
        })
    }
}

//! Office Open XML (docx, pptx, xlsx) text extraction.
//!
//! Word documents are parsed with `docx-rs`. Presentations and workbooks are ZIP archives of
//! XML parts that are streamed through `quick-xml`, keeping only the text runs.

use crate::extraction::ExtractionError;
use docx_rs::{
    DocumentChild, Paragraph, ParagraphChild, RunChild, Table, TableCellContent, TableChild,
    TableRowChild,
};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use zip::ZipArchive;
use zip::result::ZipError;

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

fn open(bytes: &[u8]) -> Result<Archive<'_>, ExtractionError> {
    Ok(ZipArchive::new(Cursor::new(bytes))?)
}

fn read_part(archive: &mut Archive<'_>, name: &str) -> Result<String, ExtractionError> {
    read_optional_part(archive, name)?.ok_or_else(|| ExtractionError::MissingPart(name.into()))
}

fn read_optional_part(
    archive: &mut Archive<'_>,
    name: &str,
) -> Result<Option<String>, ExtractionError> {
    let mut part = match archive.by_name(name) {
        Ok(part) => part,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(error) => return Err(error.into()),
    };
    let mut xml = String::new();
    part.read_to_string(&mut xml)?;
    Ok(Some(xml))
}

/// Body paragraphs first, then table cells; blank entries dropped.
///
/// Cells of a table nested inside a cell follow the cell that contains them.
pub(crate) fn docx_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    // Surface a corrupt container as an archive error rather than a docx one.
    open(bytes)?;
    let docx =
        docx_rs::read_docx(bytes).map_err(|error| ExtractionError::Docx(error.to_string()))?;

    let mut lines = Vec::new();
    let mut cells = Vec::new();
    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(paragraph) => {
                lines.extend(non_blank(paragraph_text(paragraph)));
            }
            DocumentChild::Table(table) => collect_cells(table, &mut cells),
            _ => {}
        }
    }
    lines.append(&mut cells);
    Ok(lines.join("\n"))
}

fn collect_cells(table: &Table, cells: &mut Vec<String>) {
    for row in &table.rows {
        let TableChild::TableRow(row) = row;
        for cell in &row.cells {
            let TableRowChild::TableCell(cell) = cell;
            let mut paragraphs = Vec::new();
            let mut nested = Vec::new();
            for content in &cell.children {
                match content {
                    TableCellContent::Paragraph(paragraph) => {
                        paragraphs.push(paragraph_text(paragraph));
                    }
                    TableCellContent::Table(inner) => collect_cells(inner, &mut nested),
                    _ => {}
                }
            }
            cells.extend(non_blank(paragraphs.join("\n")));
            cells.append(&mut nested);
        }
    }
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    push_runs(&paragraph.children, &mut text);
    text
}

fn push_runs(children: &[ParagraphChild], text: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for run_child in &run.children {
                    match run_child {
                        RunChild::Text(run_text) => text.push_str(&run_text.text),
                        RunChild::Tab(_) => text.push('\t'),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => push_runs(&link.children, text),
            _ => {}
        }
    }
}

/// Every shape of every slide, in slide order, newline-terminated.
pub(crate) fn pptx_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = open(bytes)?;
    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| Some((slide_number(name)?, name.to_string())))
        .collect();
    slides.sort();

    let mut text = String::new();
    for (_, name) in slides {
        let xml = read_part(&mut archive, &name)?;
        slide_text(&xml, &mut text)?;
    }
    Ok(text)
}

fn slide_number(part: &str) -> Option<u32> {
    part.strip_prefix("ppt/slides/slide")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

fn slide_text(xml: &str, text: &mut String) -> Result<(), ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut shape: Option<Vec<String>> = None;
    let mut paragraph: Option<String> = None;
    let mut in_run_text = false;
    loop {
        match reader.read_event()? {
            Event::Start(element) => match element.local_name().as_ref() {
                b"sp" => shape = Some(Vec::new()),
                b"p" if shape.is_some() => paragraph = Some(String::new()),
                b"t" => in_run_text = paragraph.is_some(),
                _ => {}
            },
            Event::Empty(element) => {
                if let (b"p", Some(paragraphs)) = (element.local_name().as_ref(), shape.as_mut()) {
                    paragraphs.push(String::new());
                }
            }
            Event::Text(run) if in_run_text => {
                if let Some(paragraph) = paragraph.as_mut() {
                    paragraph.push_str(&run.unescape()?);
                }
            }
            Event::End(element) => match element.local_name().as_ref() {
                b"t" => in_run_text = false,
                b"p" => {
                    if let (Some(done), Some(paragraphs)) = (paragraph.take(), shape.as_mut()) {
                        paragraphs.push(done);
                    }
                }
                b"sp" => {
                    if let Some(paragraphs) = shape.take() {
                        text.push_str(&paragraphs.join("\n"));
                        text.push('\n');
                    }
                }
                _ => {}
            },
            Event::Eof => return Ok(()),
            _ => {}
        }
    }
}

/// Each sheet under a `--- Planilha: {name} ---` header, one line per row.
pub(crate) fn xlsx_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = open(bytes)?;
    let workbook = read_part(&mut archive, "xl/workbook.xml")?;
    let relationships = match read_optional_part(&mut archive, "xl/_rels/workbook.xml.rels")? {
        Some(xml) => relationship_targets(&xml)?,
        None => HashMap::new(),
    };
    let shared = match read_optional_part(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => shared_strings(&xml)?,
        None => Vec::new(),
    };

    let mut text = String::new();
    for (index, sheet) in sheet_entries(&workbook)?.into_iter().enumerate() {
        let name = sheet
            .name
            .unwrap_or_else(|| format!("Sheet{}", index + 1));
        let part = sheet
            .relationship
            .and_then(|id| relationships.get(&id))
            .map(|target| sheet_part_path(target))
            .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", index + 1));

        text.push_str(&format!("\n--- Planilha: {name} ---\n"));
        let Some(xml) = read_optional_part(&mut archive, &part)? else {
            tracing::warn!(sheet = %name, part = %part, "Worksheet part missing");
            continue;
        };
        text.push_str(&sheet_rows(&xml, &shared)?.join("\n"));
    }
    Ok(text)
}

struct SheetEntry {
    name: Option<String>,
    relationship: Option<String>,
}

fn sheet_entries(xml: &str) -> Result<Vec<SheetEntry>, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut sheets = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(element) | Event::Empty(element)
                if element.local_name().as_ref() == b"sheet" =>
            {
                sheets.push(SheetEntry {
                    name: attribute(&element, b"name")?,
                    relationship: attribute(&element, b"r:id")?,
                });
            }
            Event::Eof => return Ok(sheets),
            _ => {}
        }
    }
}

fn relationship_targets(xml: &str) -> Result<HashMap<String, String>, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut targets = HashMap::new();
    loop {
        match reader.read_event()? {
            Event::Start(element) | Event::Empty(element)
                if element.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) =
                    (attribute(&element, b"Id")?, attribute(&element, b"Target")?)
                {
                    targets.insert(id, target);
                }
            }
            Event::Eof => return Ok(targets),
            _ => {}
        }
    }
}

fn shared_strings(xml: &str) -> Result<Vec<String>, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut item: Option<String> = None;
    let mut in_text = false;
    loop {
        match reader.read_event()? {
            Event::Start(element) => match element.local_name().as_ref() {
                b"si" => item = Some(String::new()),
                b"t" => in_text = item.is_some(),
                _ => {}
            },
            Event::Empty(element) if element.local_name().as_ref() == b"si" => {
                strings.push(String::new());
            }
            Event::Text(run) if in_text => {
                if let Some(item) = item.as_mut() {
                    item.push_str(&run.unescape()?);
                }
            }
            Event::End(element) => match element.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => strings.extend(item.take()),
                _ => {}
            },
            Event::Eof => return Ok(strings),
            _ => {}
        }
    }
}

/// A cell being read: its `t` attribute plus whatever `<v>` or inline text it holds.
#[derive(Default)]
struct Cell {
    kind: Option<String>,
    value: Option<String>,
    inline: Option<String>,
}

impl Cell {
    fn text(self, shared: &[String]) -> Option<String> {
        match self.kind.as_deref().unwrap_or("n") {
            "s" => self
                .value
                .and_then(|index| index.trim().parse::<usize>().ok())
                .and_then(|index| shared.get(index).cloned()),
            "inlineStr" => self.inline,
            _ => self.value,
        }
    }
}

fn sheet_rows(xml: &str, shared: &[String]) -> Result<Vec<String>, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut rows = Vec::new();
    let mut row: Option<Vec<String>> = None;
    let mut cell: Option<Cell> = None;
    let mut in_value = false;
    let mut in_text = false;
    loop {
        match reader.read_event()? {
            Event::Start(element) => match element.local_name().as_ref() {
                b"row" => row = Some(Vec::new()),
                b"c" => {
                    cell = Some(Cell {
                        kind: attribute(&element, b"t")?,
                        ..Cell::default()
                    })
                }
                b"v" => in_value = cell.is_some(),
                b"t" => in_text = cell.is_some(),
                _ => {}
            },
            Event::Text(content) if in_value || in_text => {
                let content = content.unescape()?;
                if let Some(cell) = cell.as_mut() {
                    let slot = if in_value {
                        &mut cell.value
                    } else {
                        &mut cell.inline
                    };
                    slot.get_or_insert_with(String::new).push_str(&content);
                }
            }
            Event::End(element) => match element.local_name().as_ref() {
                b"v" => in_value = false,
                b"t" => in_text = false,
                b"c" => {
                    if let (Some(done), Some(cells)) = (cell.take(), row.as_mut()) {
                        cells.extend(done.text(shared));
                    }
                }
                b"row" => {
                    let line = row.take().unwrap_or_default().join(" ");
                    if !line.trim().is_empty() {
                        rows.push(line);
                    }
                }
                _ => {}
            },
            Event::Eof => return Ok(rows),
            _ => {}
        }
    }
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, ExtractionError> {
    match element
        .try_get_attribute(name)
        .map_err(quick_xml::Error::from)?
    {
        Some(attribute) => Ok(Some(attribute.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

fn sheet_part_path(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{target}"),
    }
}

fn non_blank(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

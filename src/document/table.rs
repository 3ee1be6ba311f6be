use crate::document::node::Element;
use crate::document::node::Node;

pub(crate) const TAG_TABLE: &str = "w:tbl";
pub(crate) const TAG_PARAGRAPH: &str = "w:p";
const TAG_ROW: &str = "w:tr";
const TAG_CELL: &str = "w:tc";
const TAG_CELL_PROPERTIES: &str = "w:tcPr";
const TAG_GRID: &str = "w:tblGrid";
const TAG_GRID_COLUMN: &str = "w:gridCol";
const TAG_RUN: &str = "w:r";
const TAG_RUN_PROPERTIES: &str = "w:rPr";
const TAG_PARAGRAPH_PROPERTIES: &str = "w:pPr";

/// Read access to one body-level table.
#[derive(Clone, Copy, Debug)]
pub struct Table<'a> {
    element: &'a Element,
}

impl<'a> Table<'a> {
    pub(crate) fn new(element: &'a Element) -> Self {
        Self { element }
    }

    pub fn row_count(&self) -> usize {
        self.element.children_named(TAG_ROW).count()
    }

    /// Number of columns declared by the table grid.
    pub fn column_count(&self) -> usize {
        self.element
            .child(TAG_GRID)
            .map(|grid| grid.children_named(TAG_GRID_COLUMN).count())
            .unwrap_or(0)
    }

    /// Cell texts of one row; a cell spanning several grid columns repeats.
    pub fn row(&self, index: usize) -> Option<Vec<String>> {
        self.element.children_named(TAG_ROW).nth(index).map(row_texts)
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.element.children_named(TAG_ROW).map(row_texts).collect()
    }
}

/// Write access to one body-level table.
#[derive(Debug)]
pub struct TableMut<'a> {
    element: &'a mut Element,
}

impl<'a> TableMut<'a> {
    pub(crate) fn new(element: &'a mut Element) -> Self {
        Self { element }
    }

    pub fn as_table(&self) -> Table<'_> {
        Table::new(self.element)
    }

    /// Removes every row after the first `keep` rows.
    pub fn truncate_rows(&mut self, keep: usize) {
        let mut seen = 0usize;
        self.element.children.retain(|node| match node {
            Node::Element(element) if element.name == TAG_ROW => {
                seen += 1;
                seen <= keep
            }
            _ => true,
        });
    }

    /// Appends a row with one empty cell per grid column and returns its index.
    pub fn append_row(&mut self) -> usize {
        let widths: Vec<Option<String>> = self
            .element
            .child(TAG_GRID)
            .map(|grid| {
                grid.children_named(TAG_GRID_COLUMN)
                    .map(|column| column.attribute("w:w").map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default();

        let mut row = Element::new(TAG_ROW);
        for width in widths {
            let mut cell = Element::new(TAG_CELL);
            if let Some(width) = width {
                let properties = Element::new(TAG_CELL_PROPERTIES)
                    .with_child(Element::new("w:tcW").with_attribute("w:w", &width).with_attribute("w:type", "dxa"));
                cell = cell.with_child(properties);
            }
            row.children.push(Node::Element(cell.with_child(Element::new(TAG_PARAGRAPH))));
        }
        self.element.children.push(Node::Element(row));
        self.as_table().row_count() - 1
    }

    /// Replaces the content of the cell covering grid column `col` with a
    /// single paragraph holding `text`. Returns false when there is no such cell.
    pub fn set_cell_text(&mut self, row: usize, col: usize, text: &str) -> bool {
        let Some(row) = self.element.elements_mut().filter(|element| element.name == TAG_ROW).nth(row) else {
            return false;
        };
        let mut column = 0usize;
        for cell in row.elements_mut().filter(|element| element.name == TAG_CELL) {
            let span = grid_span(cell);
            if col < column + span {
                fill_cell(cell, text);
                return true;
            }
            column += span;
        }
        false
    }
}

fn grid_span(cell: &Element) -> usize {
    cell.child(TAG_CELL_PROPERTIES)
        .and_then(|properties| properties.child("w:gridSpan"))
        .and_then(|span| span.attribute("w:val"))
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|span| *span > 0)
        .unwrap_or(1)
}

fn row_texts(row: &Element) -> Vec<String> {
    let mut texts = Vec::new();
    for cell in row.children_named(TAG_CELL) {
        let text = cell
            .children_named(TAG_PARAGRAPH)
            .map(paragraph_text)
            .collect::<Vec<_>>()
            .join("\n");
        for _ in 0..grid_span(cell) {
            texts.push(text.clone());
        }
    }
    texts
}

fn fill_cell(cell: &mut Element, text: &str) {
    let paragraph_properties = cell
        .child(TAG_PARAGRAPH)
        .and_then(|paragraph| paragraph.child(TAG_PARAGRAPH_PROPERTIES))
        .cloned();
    let run_properties = cell
        .child(TAG_PARAGRAPH)
        .and_then(first_run_properties)
        .cloned();
    cell.children.retain(|node| matches!(node, Node::Element(element) if element.name == TAG_CELL_PROPERTIES));

    let mut paragraph = Element::new(TAG_PARAGRAPH);
    if let Some(properties) = paragraph_properties {
        paragraph = paragraph.with_child(properties);
    }
    cell.children.push(Node::Element(paragraph.with_child(build_run(run_properties, text))));
}

/// Text of a paragraph: run text plus tabs and line breaks.
pub(crate) fn paragraph_text(paragraph: &Element) -> String {
    let mut text = String::new();
    collect_run_text(paragraph, &mut text);
    text
}

fn collect_run_text(element: &Element, text: &mut String) {
    for child in element.elements() {
        match child.name.as_str() {
            "w:t" => text.push_str(&child.inner_text()),
            "w:tab" => text.push('\t'),
            "w:br" | "w:cr" => text.push('\n'),
            "w:pPr" | "w:rPr" | "w:del" | "w:instrText" => (),
            _ => collect_run_text(child, text),
        }
    }
}

/// Replaces the content of a paragraph with one run, keeping the paragraph
/// properties and the formatting of its first run.
pub(crate) fn set_paragraph_text(paragraph: &mut Element, text: &str) {
    let run_properties = first_run_properties(paragraph).cloned();
    paragraph
        .children
        .retain(|node| matches!(node, Node::Element(element) if element.name == TAG_PARAGRAPH_PROPERTIES));
    paragraph.children.push(Node::Element(build_run(run_properties, text)));
}

fn first_run_properties(paragraph: &Element) -> Option<&Element> {
    fn find_run(element: &Element) -> Option<&Element> {
        element.elements().find_map(|child| match child.name.as_str() {
            TAG_RUN => Some(child),
            TAG_PARAGRAPH_PROPERTIES => None,
            _ => find_run(child),
        })
    }
    find_run(paragraph).and_then(|run| run.child(TAG_RUN_PROPERTIES))
}

/// Builds a run for `text`, turning tabs and newlines into their elements.
fn build_run(properties: Option<Element>, text: &str) -> Element {
    let mut run = Element::new(TAG_RUN);
    if let Some(properties) = properties {
        run = run.with_child(properties);
    }
    let mut buffer = String::new();
    let flush = |run: &mut Element, buffer: &mut String| {
        if !buffer.is_empty() {
            let mut t = Element::new("w:t").with_text(buffer);
            if buffer.starts_with(char::is_whitespace) || buffer.ends_with(char::is_whitespace) {
                t.set_attribute("xml:space", "preserve");
            }
            run.children.push(Node::Element(t));
            buffer.clear();
        }
    };
    for character in text.chars() {
        match character {
            '\n' => {
                flush(&mut run, &mut buffer);
                run.children.push(Node::Element(Element::new("w:br")));
            }
            '\t' => {
                flush(&mut run, &mut buffer);
                run.children.push(Node::Element(Element::new("w:tab")));
            }
            '\r' => (),
            other => buffer.push(other),
        }
    }
    flush(&mut run, &mut buffer);
    run
}

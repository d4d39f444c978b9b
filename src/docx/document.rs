use std::path::Path;

use anyhow::{anyhow, Context};

use super::package::DocxPackage;
use super::xml::{find_attr, parse_w_bool, parse_xml_part, XmlEvent, XmlPart};
use super::DOCUMENT_PART;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    /// Explicit `w:b` on the run itself; `None` when inherited from a style.
    pub bold: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Paragraph {
    pub text: String,
    /// Direct `w:r` children only. Hyperlinked runs contribute to `text`.
    pub runs: Vec<Run>,
}

impl Paragraph {
    pub fn from_runs(runs: Vec<Run>) -> Self {
        let text = runs.iter().map(|r| r.text.as_str()).collect();
        Self { text, runs }
    }
}

/// Rows of cell texts. A cell's text is its paragraphs joined with `\n`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

/// Top-level paragraphs and tables of the body. Paragraphs inside tables are
/// only seen through the cell texts.
#[derive(Clone, Debug, Default)]
pub struct Document {
    pub paragraphs: Vec<Paragraph>,
    pub tables: Vec<Table>,
}

impl Document {
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let pkg = DocxPackage::read(path)?;
        let bytes = pkg
            .part(DOCUMENT_PART)
            .ok_or_else(|| anyhow!("missing {DOCUMENT_PART} in {}", path.display()))?;
        let part = parse_xml_part(DOCUMENT_PART, bytes)
            .with_context(|| format!("parse {DOCUMENT_PART} of {}", path.display()))?;
        Ok(Self::from_part(&part))
    }

    pub fn from_part(part: &XmlPart) -> Self {
        let mut walker = BodyWalker::default();
        for ev in &part.events {
            walker.visit(ev);
        }
        Document {
            paragraphs: walker.paragraphs,
            tables: walker.tables,
        }
    }
}

#[derive(Default)]
struct RunCapture {
    depth: usize,
    direct: bool,
    text: String,
    bold: Option<bool>,
    in_rpr: bool,
    in_text: bool,
}

#[derive(Default)]
struct ParaCapture {
    depth: usize,
    in_cell: bool,
    text: String,
    runs: Vec<Run>,
    run: Option<RunCapture>,
    hyperlink_depth: Option<usize>,
}

#[derive(Default)]
struct BodyWalker {
    stack: Vec<String>,
    tbl_depth: usize,
    table: Option<Table>,
    cell: Option<Vec<String>>,
    para: Option<ParaCapture>,
    paragraphs: Vec<Paragraph>,
    tables: Vec<Table>,
}

impl BodyWalker {
    fn visit(&mut self, ev: &XmlEvent) {
        match ev {
            XmlEvent::Start { name, attrs } => {
                self.open(name, attrs, false);
                self.stack.push(name.clone());
            }
            XmlEvent::Empty { name, attrs } => {
                self.open(name, attrs, true);
            }
            XmlEvent::Text { text } => {
                if let Some(run) = self.para.as_mut().and_then(|p| p.run.as_mut()) {
                    if run.in_text {
                        run.text.push_str(text);
                    }
                }
            }
            XmlEvent::End { name } => {
                self.close(name);
                let _ = self.stack.pop();
            }
            _ => {}
        }
    }

    fn open(&mut self, name: &str, attrs: &[(String, String)], empty: bool) {
        let parent = self.stack.last().cloned().unwrap_or_default();
        let depth = self.stack.len();

        match name {
            "w:tbl" if !empty => {
                if parent == "w:body" && self.tbl_depth == 0 {
                    self.table = Some(Table::default());
                }
                self.tbl_depth += 1;
            }
            "w:tr" if self.tbl_depth == 1 && parent == "w:tbl" => {
                if let Some(table) = self.table.as_mut() {
                    table.rows.push(Vec::new());
                }
            }
            "w:tc" if self.tbl_depth == 1 && parent == "w:tr" => {
                self.cell = Some(Vec::new());
                if empty {
                    self.finish_cell();
                }
            }
            "w:p" => {
                let in_body = parent == "w:body" && self.tbl_depth == 0;
                let in_cell = parent == "w:tc" && self.tbl_depth == 1;
                if in_body || in_cell {
                    self.para = Some(ParaCapture {
                        depth: depth + 1,
                        in_cell,
                        ..Default::default()
                    });
                    if empty {
                        self.finish_paragraph();
                    }
                }
            }
            _ => self.open_inline(name, attrs, &parent, depth, empty),
        }
    }

    fn open_inline(
        &mut self,
        name: &str,
        attrs: &[(String, String)],
        parent: &str,
        depth: usize,
        empty: bool,
    ) {
        let Some(para) = self.para.as_mut() else {
            return;
        };
        match name {
            "w:hyperlink" => {
                if !empty && parent == "w:p" && depth == para.depth {
                    para.hyperlink_depth = Some(depth + 1);
                }
            }
            "w:r" => {
                let direct = parent == "w:p" && depth == para.depth;
                let linked = parent == "w:hyperlink" && para.hyperlink_depth == Some(depth);
                if !empty && (direct || linked) {
                    para.run = Some(RunCapture {
                        depth: depth + 1,
                        direct,
                        ..Default::default()
                    });
                }
            }
            _ => {
                let Some(run) = para.run.as_mut() else {
                    return;
                };
                let in_run = parent == "w:r" && depth == run.depth;
                match name {
                    "w:rPr" if in_run => run.in_rpr = !empty,
                    "w:b" if run.in_rpr && parent == "w:rPr" => {
                        run.bold = Some(parse_w_bool(attrs));
                    }
                    "w:t" if in_run => run.in_text = !empty,
                    "w:tab" | "w:ptab" if in_run => run.text.push('\t'),
                    "w:cr" if in_run => run.text.push('\n'),
                    "w:br" if in_run => {
                        if find_attr(attrs, "w:type").unwrap_or("textWrapping") == "textWrapping" {
                            run.text.push('\n');
                        }
                    }
                    "w:noBreakHyphen" if in_run => run.text.push('-'),
                    _ => {}
                }
            }
        }
    }

    fn close(&mut self, name: &str) {
        let depth = self.stack.len();
        match name {
            "w:tbl" => {
                self.tbl_depth = self.tbl_depth.saturating_sub(1);
                if self.tbl_depth == 0 {
                    if let Some(table) = self.table.take() {
                        self.tables.push(table);
                    }
                }
            }
            "w:tc" if self.tbl_depth == 1 => self.finish_cell(),
            "w:p" => {
                if self.para.as_ref().is_some_and(|p| p.depth == depth) {
                    self.finish_paragraph();
                }
            }
            _ => {
                let Some(para) = self.para.as_mut() else {
                    return;
                };
                match name {
                    "w:hyperlink" => {
                        if para.hyperlink_depth == Some(depth) {
                            para.hyperlink_depth = None;
                        }
                    }
                    "w:r" => {
                        if para.run.as_ref().is_some_and(|r| r.depth == depth) {
                            if let Some(run) = para.run.take() {
                                para.text.push_str(&run.text);
                                if run.direct {
                                    para.runs.push(Run {
                                        text: run.text,
                                        bold: run.bold,
                                    });
                                }
                            }
                        }
                    }
                    "w:rPr" | "w:t" => {
                        if let Some(run) = para.run.as_mut() {
                            if depth == run.depth + 1 {
                                if name == "w:rPr" {
                                    run.in_rpr = false;
                                } else {
                                    run.in_text = false;
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn finish_paragraph(&mut self) {
        let Some(para) = self.para.take() else {
            return;
        };
        if para.in_cell {
            if let Some(cell) = self.cell.as_mut() {
                cell.push(para.text);
            }
        } else {
            self.paragraphs.push(Paragraph {
                text: para.text,
                runs: para.runs,
            });
        }
    }

    fn finish_cell(&mut self) {
        let Some(cell) = self.cell.take() else {
            return;
        };
        if let Some(row) = self.table.as_mut().and_then(|t| t.rows.last_mut()) {
            row.push(cell.join("\n"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Document, Run};
    use crate::docx::xml::parse_xml_part;

    fn doc(body: &str) -> Document {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="urn:w"><w:body>{body}</w:body></w:document>"#
        );
        let part = parse_xml_part("word/document.xml", xml.as_bytes()).expect("parse xml");
        Document::from_part(&part)
    }

    #[test]
    fn body_paragraph_runs_and_bold() {
        let d = doc(concat!(
            r#"<w:p><w:pPr><w:rPr><w:b/></w:rPr></w:pPr>"#,
            r#"<w:r><w:rPr><w:b/></w:rPr><w:t>Ares</w:t></w:r>"#,
            r#"<w:r><w:t xml:space="preserve"> dio della guerra</w:t></w:r></w:p>"#,
            r#"<w:p><w:r><w:rPr><w:b w:val="0"/></w:rPr><w:t>Nota</w:t><w:tab/><w:t>x</w:t></w:r></w:p>"#,
            r#"<w:p/>"#,
        ));
        assert_eq!(d.paragraphs.len(), 3);
        let p = &d.paragraphs[0];
        assert_eq!(p.text, "Ares dio della guerra");
        assert_eq!(
            p.runs,
            vec![
                Run {
                    text: "Ares".to_string(),
                    bold: Some(true)
                },
                Run {
                    text: " dio della guerra".to_string(),
                    bold: None
                },
            ]
        );
        assert_eq!(d.paragraphs[1].text, "Nota\tx");
        assert_eq!(d.paragraphs[1].runs[0].bold, Some(false));
        assert_eq!(d.paragraphs[2].text, "");
        assert!(d.tables.is_empty());
    }

    #[test]
    fn hyperlink_text_counts_but_is_not_a_run() {
        let d = doc(concat!(
            r#"<w:p><w:r><w:t>Vedi </w:t></w:r>"#,
            r#"<w:hyperlink><w:r><w:t>Zeus</w:t></w:r></w:hyperlink></w:p>"#,
        ));
        assert_eq!(d.paragraphs[0].text, "Vedi Zeus");
        assert_eq!(d.paragraphs[0].runs.len(), 1);
    }

    #[test]
    fn tables_are_separate_from_body_paragraphs() {
        let d = doc(concat!(
            r#"<w:p><w:r><w:t>Fuoco</w:t></w:r></w:p>"#,
            r#"<w:tbl><w:tblPr/><w:tr>"#,
            r#"<w:tc><w:p><w:r><w:t>Incantesimo: Dardo</w:t></w:r></w:p></w:tc>"#,
            r#"<w:tc><w:p><w:r><w:t>Effetto: riga uno</w:t></w:r></w:p><w:p><w:r><w:t>riga due</w:t></w:r></w:p></w:tc>"#,
            r#"</w:tr><w:tr><w:tc><w:tbl><w:tr><w:tc><w:p><w:r><w:t>annidata</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
            r#"<w:p><w:r><w:t>Livello: I</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
            r#"<w:p><w:r><w:t>Acqua</w:t></w:r></w:p>"#,
        ));
        let texts: Vec<&str> = d.paragraphs.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["Fuoco", "Acqua"]);
        assert_eq!(d.tables.len(), 1);
        assert_eq!(
            d.tables[0].rows,
            vec![
                vec![
                    "Incantesimo: Dardo".to_string(),
                    "Effetto: riga uno\nriga due".to_string()
                ],
                vec!["Livello: I".to_string()],
            ]
        );
    }
}

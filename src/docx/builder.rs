use anyhow::Context;
use quick_xml::escape::escape;

use super::package::DocxPackage;
use super::xml::{write_xml_part, XmlEvent, XmlPart};
use super::{
    CONTENT_TYPES_PART, DOCUMENT_PART, DOCUMENT_RELS_PART, PACKAGE_RELS_PART, STYLES_PART,
};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

// A4 portrait, 2 cm margins (twentieths of a point).
const PAGE_WIDTH: u32 = 11906;
const PAGE_HEIGHT: u32 = 16838;
const PAGE_MARGIN: u32 = 1134;
const TEXT_WIDTH: u32 = PAGE_WIDTH - 2 * PAGE_MARGIN;

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#;

const PACKAGE_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSpec {
    pub text: String,
    pub bold: bool,
}

impl RunSpec {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellSpec {
    pub runs: Vec<RunSpec>,
    /// Number of grid columns the cell covers.
    pub span: usize,
}

impl CellSpec {
    pub fn new(runs: Vec<RunSpec>) -> Self {
        Self { runs, span: 1 }
    }

    pub fn spanning(mut self, span: usize) -> Self {
        self.span = span.max(1);
        self
    }
}

/// Builds a new package with a fixed style set around the appended body.
pub struct DocumentBuilder {
    body: Vec<XmlEvent>,
    font_name: String,
    font_size_pt: u32,
}

impl DocumentBuilder {
    pub fn new(font_name: &str, font_size_pt: u32) -> Self {
        Self {
            body: Vec::new(),
            font_name: font_name.to_string(),
            font_size_pt,
        }
    }

    pub fn title(&mut self, text: &str) {
        self.styled_paragraph("Title", &[RunSpec::plain(text)]);
    }

    pub fn heading(&mut self, text: &str) {
        self.styled_paragraph("Heading1", &[RunSpec::plain(text)]);
    }

    pub fn paragraph(&mut self, runs: &[RunSpec]) {
        self.body.push(XmlEvent::start("w:p", &[]));
        for run in runs {
            self.push_run(run);
        }
        self.body.push(XmlEvent::end("w:p"));
    }

    /// Empty paragraph with no spacing whose mark is `size_pt` tall.
    pub fn spacer(&mut self, size_pt: u32) {
        let half_points = (size_pt * 2).to_string();
        self.body.extend([
            XmlEvent::start("w:p", &[]),
            XmlEvent::start("w:pPr", &[]),
            XmlEvent::empty("w:spacing", &[("w:before", "0"), ("w:after", "0")]),
            XmlEvent::start("w:rPr", &[]),
            XmlEvent::empty("w:sz", &[("w:val", half_points.as_str())]),
            XmlEvent::empty("w:szCs", &[("w:val", half_points.as_str())]),
            XmlEvent::end("w:rPr"),
            XmlEvent::end("w:pPr"),
            XmlEvent::end("w:p"),
        ]);
    }

    /// Grid table with `columns` equal columns; cells may span several of them.
    pub fn table(&mut self, columns: usize, rows: &[Vec<CellSpec>]) {
        let columns = columns.max(1);
        let col_width = TEXT_WIDTH / columns as u32;
        let col_width_s = col_width.to_string();

        self.body.extend([
            XmlEvent::start("w:tbl", &[]),
            XmlEvent::start("w:tblPr", &[]),
            XmlEvent::empty("w:tblStyle", &[("w:val", "TableGrid")]),
            XmlEvent::empty("w:tblW", &[("w:w", "0"), ("w:type", "auto")]),
            XmlEvent::empty("w:tblLook", &[("w:val", "04A0")]),
            XmlEvent::end("w:tblPr"),
            XmlEvent::start("w:tblGrid", &[]),
        ]);
        for _ in 0..columns {
            self.body
                .push(XmlEvent::empty("w:gridCol", &[("w:w", col_width_s.as_str())]));
        }
        self.body.push(XmlEvent::end("w:tblGrid"));

        for row in rows {
            self.body.push(XmlEvent::start("w:tr", &[]));
            for cell in row {
                let width = (col_width * cell.span as u32).to_string();
                self.body.push(XmlEvent::start("w:tc", &[]));
                self.body.push(XmlEvent::start("w:tcPr", &[]));
                self.body
                    .push(XmlEvent::empty("w:tcW", &[("w:w", width.as_str()), ("w:type", "dxa")]));
                if cell.span > 1 {
                    let span = cell.span.to_string();
                    self.body
                        .push(XmlEvent::empty("w:gridSpan", &[("w:val", span.as_str())]));
                }
                self.body.push(XmlEvent::end("w:tcPr"));
                self.paragraph(&cell.runs);
                self.body.push(XmlEvent::end("w:tc"));
            }
            self.body.push(XmlEvent::end("w:tr"));
        }
        self.body.push(XmlEvent::end("w:tbl"));
    }

    pub fn finish(self) -> anyhow::Result<DocxPackage> {
        let page_w = PAGE_WIDTH.to_string();
        let page_h = PAGE_HEIGHT.to_string();
        let margin = PAGE_MARGIN.to_string();

        let mut events = vec![
            XmlEvent::Decl {
                version: "1.0".to_string(),
                encoding: Some("UTF-8".to_string()),
                standalone: Some("yes".to_string()),
            },
            XmlEvent::start("w:document", &[("xmlns:w", W_NS), ("xmlns:r", R_NS)]),
            XmlEvent::start("w:body", &[]),
        ];
        events.extend(self.body);
        events.extend([
            XmlEvent::start("w:sectPr", &[]),
            XmlEvent::empty("w:pgSz", &[("w:w", page_w.as_str()), ("w:h", page_h.as_str())]),
            XmlEvent::empty(
                "w:pgMar",
                &[
                    ("w:top", margin.as_str()),
                    ("w:right", margin.as_str()),
                    ("w:bottom", margin.as_str()),
                    ("w:left", margin.as_str()),
                    ("w:header", "708"),
                    ("w:footer", "708"),
                    ("w:gutter", "0"),
                ],
            ),
            XmlEvent::end("w:sectPr"),
            XmlEvent::end("w:body"),
            XmlEvent::end("w:document"),
        ]);

        let document = write_xml_part(&XmlPart {
            name: DOCUMENT_PART.to_string(),
            events,
        })
        .context("serialize document.xml")?;

        let mut pkg = DocxPackage::default();
        pkg.insert(CONTENT_TYPES_PART, CONTENT_TYPES_XML.as_bytes().to_vec());
        pkg.insert(PACKAGE_RELS_PART, PACKAGE_RELS_XML.as_bytes().to_vec());
        pkg.insert(DOCUMENT_PART, document);
        pkg.insert(DOCUMENT_RELS_PART, DOCUMENT_RELS_XML.as_bytes().to_vec());
        pkg.insert(
            STYLES_PART,
            styles_xml(&self.font_name, self.font_size_pt).into_bytes(),
        );
        Ok(pkg)
    }

    fn styled_paragraph(&mut self, style: &str, runs: &[RunSpec]) {
        self.body.extend([
            XmlEvent::start("w:p", &[]),
            XmlEvent::start("w:pPr", &[]),
            XmlEvent::empty("w:pStyle", &[("w:val", style)]),
            XmlEvent::end("w:pPr"),
        ]);
        for run in runs {
            self.push_run(run);
        }
        self.body.push(XmlEvent::end("w:p"));
    }

    fn push_run(&mut self, run: &RunSpec) {
        self.body.push(XmlEvent::start("w:r", &[]));
        if run.bold {
            self.body.extend([
                XmlEvent::start("w:rPr", &[]),
                XmlEvent::empty("w:b", &[]),
                XmlEvent::end("w:rPr"),
            ]);
        }
        // Line breaks and tabs become their own elements, as Word expects.
        let mut pending = String::new();
        for ch in run.text.chars() {
            let control = match ch {
                '\n' => "w:br",
                '\t' => "w:tab",
                _ => {
                    pending.push(ch);
                    continue;
                }
            };
            self.push_text(&pending);
            pending.clear();
            self.body.push(XmlEvent::empty(control, &[]));
        }
        self.push_text(&pending);
        self.body.push(XmlEvent::end("w:r"));
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.body.extend([
            XmlEvent::start("w:t", &[("xml:space", "preserve")]),
            XmlEvent::text(text),
            XmlEvent::end("w:t"),
        ]);
    }
}

fn styles_xml(font_name: &str, font_size_pt: u32) -> String {
    let font = escape(font_name);
    let sz = font_size_pt * 2;
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="{W_NS}"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="{font}" w:hAnsi="{font}" w:eastAsia="{font}" w:cs="{font}"/><w:sz w:val="{sz}"/><w:szCs w:val="{sz}"/><w:lang w:val="it-IT"/></w:rPr></w:rPrDefault><w:pPrDefault><w:pPr><w:spacing w:after="0" w:line="240" w:lineRule="auto"/></w:pPr></w:pPrDefault></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:qFormat/></w:style><w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:spacing w:after="240"/></w:pPr><w:rPr><w:sz w:val="52"/><w:szCs w:val="52"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:spacing w:before="360" w:after="120"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="32"/><w:szCs w:val="32"/></w:rPr></w:style><w:style w:type="table" w:default="1" w:styleId="TableNormal"><w:name w:val="Normal Table"/><w:tblPr><w:tblInd w:w="0" w:type="dxa"/><w:tblCellMar><w:top w:w="0" w:type="dxa"/><w:left w:w="108" w:type="dxa"/><w:bottom w:w="0" w:type="dxa"/><w:right w:w="108" w:type="dxa"/></w:tblCellMar></w:tblPr></w:style><w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/><w:basedOn w:val="TableNormal"/><w:tblPr><w:tblBorders><w:top w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:left w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:bottom w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:right w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideH w:val="single" w:sz="4" w:space="0" w:color="auto"/><w:insideV w:val="single" w:sz="4" w:space="0" w:color="auto"/></w:tblBorders></w:tblPr></w:style></w:styles>"#
    )
}

#[cfg(test)]
mod tests {
    use super::{CellSpec, DocumentBuilder, RunSpec};
    use crate::docx::document::{Document, Run};
    use crate::docx::xml::parse_xml_part;
    use crate::docx::STYLES_PART;

    #[test]
    fn built_document_reads_back() {
        let mut b = DocumentBuilder::new("Arial", 11);
        b.title("Lista Incantesimi");
        b.heading("Incantesimi di livello 1");
        b.spacer(3);
        b.table(
            4,
            &[
                vec![
                    CellSpec::new(vec![RunSpec::bold("Incantesimo"), RunSpec::plain(": Dardo")])
                        .spanning(2),
                    CellSpec::new(vec![RunSpec::bold("#"), RunSpec::plain(": 1")]),
                    CellSpec::new(vec![RunSpec::plain("FUOCO")]),
                ],
                vec![CellSpec::new(vec![RunSpec::plain("riga\nseconda")]).spanning(4)],
            ],
        );
        b.paragraph(&[RunSpec::bold("Fine"), RunSpec::plain(" & basta")]);
        let pkg = b.finish().expect("finish");

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.docx");
        pkg.write(&path).expect("write");

        let doc = Document::read(&path).expect("read back");
        let texts: Vec<&str> = doc.paragraphs.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Lista Incantesimi",
                "Incantesimi di livello 1",
                "",
                "Fine & basta"
            ]
        );
        assert_eq!(
            doc.paragraphs[3].runs[0],
            Run {
                text: "Fine".to_string(),
                bold: Some(true)
            }
        );
        assert_eq!(doc.tables.len(), 1);
        assert_eq!(
            doc.tables[0].rows,
            vec![
                vec![
                    "Incantesimo: Dardo".to_string(),
                    "#: 1".to_string(),
                    "FUOCO".to_string()
                ],
                vec!["riga\nseconda".to_string()],
            ]
        );
    }

    #[test]
    fn styles_part_is_well_formed_and_escaped() {
        let pkg = DocumentBuilder::new("Times & Co", 12).finish().expect("finish");
        let styles = pkg.part(STYLES_PART).expect("styles part");
        let part = parse_xml_part(STYLES_PART, styles).expect("parse styles");
        assert!(!part.events.is_empty());
        let s = String::from_utf8_lossy(styles);
        assert!(s.contains(r#"w:ascii="Times &amp; Co""#));
        assert!(s.contains(r#"<w:sz w:val="24"/>"#));
    }
}

use crate::error::IngestError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const DOCUMENT_PART: &str = "word/document.xml";

/// Body paragraph texts in document order, each followed by a newline.
/// Paragraphs inside tables and text boxes are not part of the body text.
pub fn extract_docx_text(path: &Path) -> Result<String, IngestError> {
    let file = File::open(path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|error| IngestError::DocxParse(error.to_string()))?;
    let mut part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|error| IngestError::DocxParse(format!("{DOCUMENT_PART}: {error}")))?;

    let mut xml = String::new();
    part.read_to_string(&mut xml)?;
    paragraphs_from_xml(&xml)
}

/// Containers whose paragraphs are not body paragraphs: tables, text boxes,
/// and the legacy fallback copy of alternate content.
const SKIPPED_CONTAINERS: [&[u8]; 3] = [b"w:tbl", b"w:txbxContent", b"mc:Fallback"];

fn is_skipped_container(name: &[u8]) -> bool {
    SKIPPED_CONTAINERS.contains(&name)
}

fn paragraphs_from_xml(xml: &str) -> Result<String, IngestError> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut paragraph = String::new();
    let mut skipped_depth = 0usize;
    let mut paragraph_depth = 0usize;
    let mut in_run_text = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|error| IngestError::DocxParse(error.to_string()))?;

        match event {
            Event::Start(element) => {
                let name = element.name();
                if is_skipped_container(name.as_ref()) {
                    skipped_depth += 1;
                    in_run_text = false;
                } else if skipped_depth == 0 {
                    match name.as_ref() {
                        b"w:p" => {
                            paragraph_depth += 1;
                            if paragraph_depth == 1 {
                                paragraph.clear();
                            }
                        }
                        b"w:t" if paragraph_depth > 0 => in_run_text = true,
                        _ => {}
                    }
                }
            }
            Event::Empty(element) if skipped_depth == 0 => match element.name().as_ref() {
                b"w:p" if paragraph_depth == 0 => text.push('\n'),
                b"w:tab" if paragraph_depth > 0 => paragraph.push('\t'),
                b"w:br" | b"w:cr" if paragraph_depth > 0 => paragraph.push('\n'),
                _ => {}
            },
            Event::Text(content) if in_run_text && skipped_depth == 0 => {
                let unescaped = content
                    .unescape()
                    .map_err(|error| IngestError::DocxParse(error.to_string()))?;
                paragraph.push_str(&unescaped);
            }
            Event::End(element) => {
                let name = element.name();
                if is_skipped_container(name.as_ref()) {
                    skipped_depth = skipped_depth.saturating_sub(1);
                } else if skipped_depth == 0 {
                    match name.as_ref() {
                        b"w:p" if paragraph_depth > 0 => {
                            paragraph_depth -= 1;
                            if paragraph_depth == 0 {
                                text.push_str(&paragraph);
                                text.push('\n');
                            }
                        }
                        b"w:t" => in_run_text = false,
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    pub(crate) fn docx_body(paragraphs: &[&str]) -> String {
        let body = paragraphs
            .iter()
            .map(|paragraph| format!("<w:p><w:r><w:t>{paragraph}</w:t></w:r></w:p>"))
            .collect::<String>();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        )
    }

    pub(crate) fn write_docx(path: &Path, document_xml: &str) {
        let file = File::create(path).expect("docx fixture is writable");
        let mut archive = zip::ZipWriter::new(file);
        archive
            .start_file(DOCUMENT_PART, SimpleFileOptions::default())
            .expect("zip entry starts");
        archive
            .write_all(document_xml.as_bytes())
            .expect("zip entry writes");
        archive.finish().expect("zip finishes");
    }

    #[test]
    fn joins_paragraphs_with_newlines() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("report.docx");
        write_docx(&path, &docx_body(&["Figure 2: Site plan", "Body &amp; notes"]));

        let text = extract_docx_text(&path)?;
        assert_eq!(text, "Figure 2: Site plan\nBody & notes\n");
        Ok(())
    }

    #[test]
    fn runs_tabs_and_empty_paragraphs() -> Result<(), IngestError> {
        let xml = r#"<w:document xmlns:w="x"><w:body>
            <w:p><w:r><w:t>Pump</w:t></w:r><w:r><w:tab/><w:t xml:space="preserve"> layout</w:t></w:r></w:p>
            <w:p/>
            <w:p><w:pPr><w:pStyle w:val="Caption"/></w:pPr><w:r><w:t>End</w:t></w:r></w:p>
        </w:body></w:document>"#;

        assert_eq!(paragraphs_from_xml(xml)?, "Pump\t layout\n\nEnd\n");
        Ok(())
    }

    #[test]
    fn table_paragraphs_are_excluded() -> Result<(), IngestError> {
        let xml = r#"<w:document xmlns:w="x"><w:body>
            <w:p><w:r><w:t>Before</w:t></w:r></w:p>
            <w:tbl><w:tr><w:tc><w:p><w:r><w:t>Cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
            <w:p><w:r><w:t>After</w:t></w:r></w:p>
        </w:body></w:document>"#;

        assert_eq!(paragraphs_from_xml(xml)?, "Before\nAfter\n");
        Ok(())
    }

    #[test]
    fn text_box_paragraphs_do_not_disturb_the_enclosing_paragraph() -> Result<(), IngestError> {
        let xml = r#"<w:document xmlns:w="x" xmlns:mc="m" xmlns:wps="s" xmlns:v="v"><w:body>
            <w:p>
                <w:r><w:t>Figure 1: Pump layout</w:t></w:r>
                <w:r><mc:AlternateContent>
                    <mc:Choice Requires="wps"><w:drawing><wps:txbx>
                        <w:txbxContent><w:p><w:r><w:t>Box</w:t></w:r></w:p></w:txbxContent>
                    </wps:txbx></w:drawing></mc:Choice>
                    <mc:Fallback><w:pict><v:textbox>
                        <w:txbxContent><w:p><w:r><w:t>Box</w:t></w:r></w:p></w:txbxContent>
                    </v:textbox></w:pict></mc:Fallback>
                </mc:AlternateContent></w:r>
                <w:r><w:t xml:space="preserve"> tail</w:t></w:r>
            </w:p>
            <w:p><w:r><w:t>Next</w:t></w:r></w:p>
        </w:body></w:document>"#;

        assert_eq!(paragraphs_from_xml(xml)?, "Figure 1: Pump layout tail\nNext\n");
        Ok(())
    }

    #[test]
    fn missing_document_part_is_a_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("empty.docx");
        let mut archive = zip::ZipWriter::new(File::create(&path)?);
        archive.start_file("word/styles.xml", SimpleFileOptions::default())?;
        archive.write_all(b"<styles/>")?;
        archive.finish()?;

        assert!(matches!(
            extract_docx_text(&path),
            Err(IngestError::DocxParse(_))
        ));
        Ok(())
    }
}

use crate::error::IngestError;
use crate::models::Figure;
use regex::Regex;
use std::path::PathBuf;

const FIGURE_PATTERN: &str = r"(?i)Figure\s+\S+:.+";

/// Finds figure captions such as `Figure 3: Pump layout` line by line.
#[derive(Debug, Clone)]
pub struct FigureDetector {
    pattern: Regex,
}

impl FigureDetector {
    pub fn new() -> Result<Self, IngestError> {
        Ok(Self {
            pattern: Regex::new(FIGURE_PATTERN)?,
        })
    }

    /// Titles in line order. Repeated labels are kept.
    pub fn detect(&self, text: &str) -> Vec<String> {
        text.split('\n')
            .filter_map(|line| self.pattern.find(line))
            .map(|found| found.as_str().trim().to_string())
            .filter(|title| !title.is_empty())
            .collect()
    }
}

pub trait FigureCorrelator {
    fn correlate(&self, titles: &[String], image_paths: &[PathBuf]) -> Vec<Figure>;
}

/// Order-based pairing: the i-th detected title takes the i-th extracted image.
///
/// This assumes the images come out of the file in the same order their
/// captions are read, which is not guaranteed (object order in a PDF can
/// differ from reading order). Titles without an image are dropped, so the
/// result length is `min(titles, images)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderBasedPairing;

impl FigureCorrelator for OrderBasedPairing {
    fn correlate(&self, titles: &[String], image_paths: &[PathBuf]) -> Vec<Figure> {
        titles
            .iter()
            .zip(image_paths)
            .map(|(title, path)| Figure {
                title: title.clone(),
                path: Some(path.to_string_lossy().to_string()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> FigureDetector {
        FigureDetector::new().expect("figure pattern compiles")
    }

    #[test]
    fn detects_titles_case_insensitively_in_line_order() {
        let text = "Intro\nFIGURE 2: Valve detail\nsee figure 1a: Pump layout  \nno caption here";
        let titles = detector().detect(text);
        assert_eq!(titles, vec!["FIGURE 2: Valve detail", "figure 1a: Pump layout"]);
    }

    #[test]
    fn match_starts_mid_line() {
        let titles = detector().detect("As shown in Figure 4: Wiring diagram");
        assert_eq!(titles, vec!["Figure 4: Wiring diagram"]);
    }

    #[test]
    fn duplicates_are_kept() {
        let titles = detector().detect("Figure 1: A\nFigure 1: A");
        assert_eq!(titles.len(), 2);
    }

    #[test]
    fn requires_label_colon_and_trailing_text() {
        let detector = detector();
        assert!(detector.detect("Figure: nothing").is_empty());
        assert!(detector.detect("Figure 3:").is_empty());
        assert!(detector.detect("Figure 3 without colon").is_empty());
    }

    #[test]
    fn carriage_returns_are_trimmed() {
        let titles = detector().detect("Figure 7: Layout\r\nbody");
        assert_eq!(titles, vec!["Figure 7: Layout"]);
    }

    #[test]
    fn pairing_is_bounded_by_shorter_list() {
        let titles = vec![
            "Figure 1: A".to_string(),
            "Figure 2: B".to_string(),
            "Figure 3: C".to_string(),
        ];
        let images = vec![PathBuf::from("out/a.png"), PathBuf::from("out/b.png")];

        let figures = OrderBasedPairing.correlate(&titles, &images);
        assert_eq!(figures.len(), 2);
        assert_eq!(figures[1].title, "Figure 2: B");
        assert_eq!(figures[1].path.as_deref(), Some("out/b.png"));

        let figures = OrderBasedPairing.correlate(&titles[..1], &images);
        assert_eq!(figures.len(), 1);
    }

    #[test]
    fn no_images_means_no_figures() {
        let titles = vec!["Figure 1: A".to_string()];
        assert!(OrderBasedPairing.correlate(&titles, &[]).is_empty());
    }
}

use super::*;
use crate::testing::write_test_pdf;
use tempfile::TempDir;

#[test]
fn document_kind_detection() {
    assert_eq!(
        DocumentKind::from_path(Path::new("rules.pdf")).expect("pdf is supported"),
        DocumentKind::Pdf
    );
    assert_eq!(
        DocumentKind::from_path(Path::new("RULES.PDF")).expect("extension is case-insensitive"),
        DocumentKind::Pdf
    );
    assert_eq!(
        DocumentKind::from_path(Path::new("notes.md")).expect("markdown is supported"),
        DocumentKind::Text
    );
    assert!(DocumentKind::from_path(Path::new("slides.pptx")).is_err());
    assert!(DocumentKind::from_path(Path::new("no_extension")).is_err());
}

#[test]
fn missing_file_is_reported() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let missing = temp_dir.path().join("missing.pdf");

    let err = load_document(&missing).expect_err("missing file must fail");
    assert!(matches!(err, RagError::Document(_)));
    assert!(err.to_string().contains("not found"));
}

#[test]
fn text_file_loads_as_single_page() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("notes.txt");
    fs::write(&path, "Free Parking is just a free resting place.").expect("should write file");

    let pages = load_document(&path).expect("text file should load");
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].metadata.page, 1);
    assert_eq!(pages[0].metadata.source, path);
    assert_eq!(pages[0].text, "Free Parking is just a free resting place.");
}

#[test]
fn pdf_loads_one_page_per_physical_page() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("rules.pdf");
    write_test_pdf(
        &path,
        &[
            "The bank pays each player $200 for passing Go.",
            "Players roll two dice to move around the board.",
        ],
    );

    let pages = load_document(&path).expect("pdf should load");
    assert_eq!(pages.len(), 2);

    assert_eq!(pages[0].metadata.page, 1);
    assert_eq!(pages[1].metadata.page, 2);
    assert!(pages.iter().all(|p| p.metadata.source == path));

    assert!(pages[0].text.contains("passing Go"), "page 1: {:?}", pages[0].text);
    assert!(pages[1].text.contains("two dice"), "page 2: {:?}", pages[1].text);
}

#[test]
fn corrupt_pdf_is_a_document_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("broken.pdf");
    fs::write(&path, b"definitely not a pdf").expect("should write file");

    let err = load_document(&path).expect_err("garbage must fail to parse");
    assert!(matches!(err, RagError::Document(_)));
}

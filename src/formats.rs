use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source extensions the office backend accepts as input
pub const INPUT_EXTENSIONS: &[&str] = &["doc", "docx", "txt", "rtf"];

/// Target format of a conversion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvertFormat {
    #[default]
    Pdf,
    Doc,
    Docx,
    Txt,
    Html,
    Rtf,
}

impl ConvertFormat {
    pub const ALL: [ConvertFormat; 6] = [
        ConvertFormat::Pdf,
        ConvertFormat::Doc,
        ConvertFormat::Docx,
        ConvertFormat::Txt,
        ConvertFormat::Html,
        ConvertFormat::Rtf,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            ConvertFormat::Pdf => "pdf",
            ConvertFormat::Doc => "doc",
            ConvertFormat::Docx => "docx",
            ConvertFormat::Txt => "txt",
            ConvertFormat::Html => "html",
            ConvertFormat::Rtf => "rtf",
        }
    }

    /// Save-format code understood by the office automation interface
    pub fn file_format_code(&self) -> FileFormatCode {
        match self {
            ConvertFormat::Pdf => FileFormatCode::PDF,
            ConvertFormat::Doc => FileFormatCode::DOCUMENT,
            ConvertFormat::Docx => FileFormatCode::DOCUMENT_DEFAULT,
            ConvertFormat::Txt => FileFormatCode::TEXT,
            ConvertFormat::Html => FileFormatCode::HTML,
            ConvertFormat::Rtf => FileFormatCode::RTF,
        }
    }

    /// Lenient lookup used where a format is optional; unknown names mean PDF.
    pub fn from_name_or_default(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }
}

impl fmt::Display for ConvertFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ConvertFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        ConvertFormat::ALL
            .into_iter()
            .find(|f| f.extension() == lower)
            .ok_or_else(|| AppError::UnsupportedFormat(format!("unknown target format '{}'", s)))
    }
}

/// Numeric `SaveAs` file format code (the `wdFormat*` family)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileFormatCode(pub u32);

impl FileFormatCode {
    pub const DOCUMENT: FileFormatCode = FileFormatCode(0);
    pub const TEXT: FileFormatCode = FileFormatCode(2);
    pub const RTF: FileFormatCode = FileFormatCode(6);
    pub const HTML: FileFormatCode = FileFormatCode(8);
    pub const DOCUMENT_DEFAULT: FileFormatCode = FileFormatCode(16);
    pub const PDF: FileFormatCode = FileFormatCode(17);

    /// Resolve a raw code back to a format. Codes outside the table are PDF.
    pub fn format(&self) -> ConvertFormat {
        match *self {
            FileFormatCode::DOCUMENT => ConvertFormat::Doc,
            FileFormatCode::TEXT => ConvertFormat::Txt,
            FileFormatCode::RTF => ConvertFormat::Rtf,
            FileFormatCode::HTML => ConvertFormat::Html,
            FileFormatCode::DOCUMENT_DEFAULT => ConvertFormat::Docx,
            _ => ConvertFormat::Pdf,
        }
    }
}

pub fn is_supported_input(ext: &str) -> bool {
    INPUT_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_format_has_a_code() {
        let codes: Vec<u32> = ConvertFormat::ALL
            .iter()
            .map(|f| f.file_format_code().0)
            .collect();
        assert_eq!(codes, vec![17, 0, 16, 2, 8, 6]);
    }

    #[test]
    fn test_codes_resolve_back_to_their_format() {
        for format in ConvertFormat::ALL {
            assert_eq!(format.file_format_code().format(), format);
        }
    }

    #[test]
    fn test_unmapped_values_default_to_pdf() {
        assert_eq!(FileFormatCode(42).format(), ConvertFormat::Pdf);
        assert_eq!(ConvertFormat::from_name_or_default("odt"), ConvertFormat::Pdf);
        assert_eq!(
            ConvertFormat::from_name_or_default("odt").file_format_code(),
            FileFormatCode::PDF
        );
    }

    #[test]
    fn test_parse_is_case_insensitive_and_strict() {
        assert_eq!("DOCX".parse::<ConvertFormat>().unwrap(), ConvertFormat::Docx);
        assert_eq!(" html ".parse::<ConvertFormat>().unwrap(), ConvertFormat::Html);
        assert!(matches!(
            "xls".parse::<ConvertFormat>(),
            Err(AppError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&ConvertFormat::Docx).unwrap();
        assert_eq!(json, "\"docx\"");
        let parsed: ConvertFormat = serde_json::from_str("\"rtf\"").unwrap();
        assert_eq!(parsed, ConvertFormat::Rtf);
    }

    #[test]
    fn test_supported_inputs() {
        assert!(is_supported_input("DOC"));
        assert!(is_supported_input("txt"));
        assert!(!is_supported_input("pdf"));
        assert!(!is_supported_input("xlsx"));
    }
}

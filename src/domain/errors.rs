use thiserror::Error;

/// Errors raised while parsing formulas or maintaining the workbook.
///
/// Spreadsheet-level failures such as division by zero are not errors here;
/// they are carried as [`crate::domain::CellError`] values inside cells.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("Parse error at {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Malformed tree: {0}")]
    MalformedTree(String),

    #[error("Invalid cell reference: {0}")]
    InvalidCellReference(String),

    #[error("Circular reference detected at {0}")]
    CircularReference(String),

    #[error("Unknown sheet: {0}")]
    UnknownSheet(String),

    #[error("Invalid sheet name: {0}")]
    InvalidSheetName(String),
}

impl DomainError {
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        DomainError::Parse {
            position,
            message: message.into(),
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::parse(3, "Unexpected character: '@'");
        assert_eq!(err.to_string(), "Parse error at 3: Unexpected character: '@'");

        let err = DomainError::CircularReference("Sheet1!A1".to_string());
        assert!(err.to_string().contains("Sheet1!A1"));
    }
}

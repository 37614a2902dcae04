use thiserror::Error;

/// Every way the partition/report pipeline can fail.
///
/// Each stage stops at its first failure and hands one of these back to
/// the caller; no stage produces partial output.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The dataset source is missing or could not be read.
    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    /// Header or data section is malformed.
    #[error("malformed dataset{}: {message}", .line.map(|l| format!(" (line {l})")).unwrap_or_default())]
    DatasetFormat {
        /// 1-based line number, when the problem is tied to one line.
        line: Option<usize>,
        message: String,
    },

    /// Unknown or under-populated stratification column, or unusable split ratios.
    #[error("cannot stratify: {0}")]
    Stratification(String),

    /// A chart could not be produced.
    #[error("cannot render chart: {0}")]
    Render(String),
}

impl PipelineError {
    pub(crate) fn format(line: usize, message: impl Into<String>) -> Self {
        PipelineError::DatasetFormat {
            line: Some(line),
            message: message.into(),
        }
    }

    pub(crate) fn format_global(message: impl Into<String>) -> Self {
        PipelineError::DatasetFormat {
            line: None,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_error_mentions_line_when_known() {
        let err = PipelineError::format(7, "expected 3 values, found 2");
        assert_eq!(
            err.to_string(),
            "malformed dataset (line 7): expected 3 values, found 2"
        );

        let err = PipelineError::format_global("empty input");
        assert_eq!(err.to_string(), "malformed dataset: empty input");
    }
}

// ABOUTME: Error types for the extraction core: the ErrorCode taxonomy and the ExtractError struct.
// ABOUTME: Most codes are degradations the orchestrator logs and absorbs; only contract violations surface.

use std::fmt;

/// Categories of extraction problems.
///
/// `EmptyField` and `NotFound` describe legitimate absence and never abort an
/// extraction. `Timeout`, `MalformedSelector` and `TransformFailure` degrade
/// the affected step only. `InvalidUrl` and `Registry` are returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    EmptyField,
    NotFound,
    Timeout,
    MalformedSelector,
    TransformFailure,
    InvalidUrl,
    Registry,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::EmptyField => "empty field",
            ErrorCode::NotFound => "no content found",
            ErrorCode::Timeout => "deadline exceeded",
            ErrorCode::MalformedSelector => "malformed selector",
            ErrorCode::TransformFailure => "transform failed",
            ErrorCode::InvalidUrl => "invalid URL",
            ErrorCode::Registry => "registry error",
        };
        write!(f, "{}", s)
    }
}

/// The error type shared by every extraction stage.
#[derive(Debug, thiserror::Error)]
pub struct ExtractError {
    pub code: ErrorCode,
    pub op: String,
    pub detail: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "extract: {}: {}", self.op, self.code)?;
        if !self.detail.is_empty() {
            write!(f, " ({})", self.detail)?;
        }
        if let Some(ref src) = self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

impl ExtractError {
    fn new(code: ErrorCode, op: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            code,
            op: op.into(),
            detail: detail.into(),
            source: None,
        }
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// A field resolved to nothing.
    pub fn empty_field(field: impl Into<String>) -> Self {
        Self::new(ErrorCode::EmptyField, "SelectField", field)
    }

    /// The scoring engine found no plausible content.
    pub fn not_found(op: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, op, "")
    }

    /// A probe or scoring pass ran past its deadline.
    pub fn timeout(op: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, op, detail)
    }

    /// A rule declares a selector the matcher cannot compile.
    pub fn malformed_selector(selector: impl Into<String>) -> Self {
        Self::new(ErrorCode::MalformedSelector, "CompileSelector", selector)
    }

    /// A single transform could not be applied.
    pub fn transform(selector: impl Into<String>, detail: impl Into<String>) -> Self {
        let selector = selector.into();
        let detail = detail.into();
        Self::new(
            ErrorCode::TransformFailure,
            "Transform",
            format!("{}: {}", selector, detail),
        )
    }

    /// The page URL is empty or cannot be parsed.
    pub fn invalid_url(url: impl Into<String>, op: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidUrl, op, url)
    }

    /// Rule data could not be loaded.
    pub fn registry(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::Registry, "LoadRegistry", detail)
    }

    /// Returns true if this is a Timeout error.
    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::Timeout
    }

    /// Returns true if this is a MalformedSelector error.
    pub fn is_malformed_selector(&self) -> bool {
        self.code == ErrorCode::MalformedSelector
    }

    /// Returns true if this is a TransformFailure error.
    pub fn is_transform_failure(&self) -> bool {
        self.code == ErrorCode::TransformFailure
    }

    /// Returns true if this is an InvalidUrl error.
    pub fn is_invalid_url(&self) -> bool {
        self.code == ErrorCode::InvalidUrl
    }
}

pub type Result<T, E = ExtractError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_op_code_and_detail() {
        let err = ExtractError::malformed_selector("[[[bad");
        assert_eq!(
            err.to_string(),
            "extract: CompileSelector: malformed selector ([[[bad)"
        );
        assert!(err.is_malformed_selector());
    }

    #[test]
    fn display_appends_source() {
        let err = ExtractError::registry("builtin rules")
            .with_source(anyhow::anyhow!("expected value at line 1"));
        let msg = err.to_string();
        assert!(msg.starts_with("extract: LoadRegistry: registry error"));
        assert!(msg.ends_with(": expected value at line 1"));
    }

    #[test]
    fn transform_error_names_selector() {
        let err = ExtractError::transform("figure.lede", "no single child");
        assert!(err.is_transform_failure());
        assert_eq!(err.detail, "figure.lede: no single child");
    }
}

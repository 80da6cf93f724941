/// Build stage that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticPhase {
    Validation,
    Unification,
    TreeBuild,
}

/// Severity of a build diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

/// Structured diagnostic suitable for tooling integration.
#[derive(Debug, Clone)]
pub struct BuildDiagnostic {
    pub phase: DiagnosticPhase,
    pub level: DiagnosticLevel,
    pub code: &'static str,
    pub message: String,
    /// Format, field or instruction the diagnostic is about.
    pub subject: Option<String>,
}

impl BuildDiagnostic {
    pub fn new(
        phase: DiagnosticPhase,
        level: DiagnosticLevel,
        code: &'static str,
        message: impl Into<String>,
        subject: Option<String>,
    ) -> Self {
        Self {
            phase,
            level,
            code,
            message: message.into(),
            subject,
        }
    }

    pub fn error(
        phase: DiagnosticPhase,
        code: &'static str,
        message: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self::new(
            phase,
            DiagnosticLevel::Error,
            code,
            message,
            Some(subject.into()),
        )
    }

    pub fn warning(
        phase: DiagnosticPhase,
        code: &'static str,
        message: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self::new(
            phase,
            DiagnosticLevel::Warning,
            code,
            message,
            Some(subject.into()),
        )
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }

    pub fn format_human(&self) -> String {
        let subject = self.subject.as_deref().unwrap_or("<unknown>");
        format!(
            "{level:?} {code}: {message} @ {subject}",
            level = self.level,
            code = self.code,
            message = self.message,
            subject = subject
        )
    }
}

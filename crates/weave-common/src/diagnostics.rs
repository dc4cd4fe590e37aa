/// How diagnostics are rendered.
///
/// `color` only affects the ariadne renderer; `json` asks the CLI to emit
/// one JSON object per diagnostic instead of a rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticOptions {
    pub color: bool,
    pub json: bool,
}

impl DiagnosticOptions {
    /// Plain text, no ANSI escapes. Used by tests for stable output.
    pub fn colorless() -> Self {
        Self {
            color: false,
            json: false,
        }
    }
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        Self {
            color: true,
            json: false,
        }
    }
}

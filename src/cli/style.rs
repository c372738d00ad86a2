//! Styled markers for console output.

use console::{style, StyledObject};

use paperlens::llm::{BackendKind, CapabilityState};

/// Green check.
pub fn success() -> StyledObject<&'static str> {
    style("✓").green()
}

/// Yellow bang.
pub fn warn() -> StyledObject<&'static str> {
    style("!").yellow()
}

/// Red cross.
pub fn error() -> StyledObject<&'static str> {
    style("✗").red()
}

/// Dim arrow for secondary info.
pub fn dim_arrow() -> StyledObject<&'static str> {
    style("→").dim()
}

/// Capability state colored by readiness.
pub fn capability(state: CapabilityState) -> StyledObject<&'static str> {
    let label = style(state.as_str());
    match state {
        CapabilityState::Available => label.green(),
        CapabilityState::Downloading => label.cyan(),
        CapabilityState::Downloadable => label.yellow(),
        CapabilityState::Unavailable => label.red(),
    }
}

/// Backend kind, on-device in cyan and remote in magenta.
pub fn backend(kind: BackendKind) -> StyledObject<&'static str> {
    let label = style(kind.as_str());
    match kind {
        BackendKind::OnDevice => label.cyan(),
        BackendKind::Remote => label.magenta(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_keep_text() {
        console::set_colors_enabled(false);
        assert_eq!(capability(CapabilityState::Downloadable).to_string(), "downloadable");
        assert_eq!(backend(BackendKind::OnDevice).to_string(), "on-device");
        assert_eq!(success().to_string(), "✓");
    }
}

/// Explicit human or operator command, bypassing presence detection.
///
/// Delivery is at-least-once; duplicates are harmless because the
/// supervisor treats repeated commands as no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideEvent {
    /// Dismiss the takeover now and suppress re-triggering for the cooldown.
    StopNow,
    /// Start the takeover now if it is armed and not cooling down.
    RestartNow,
}

impl OverrideEvent {
    /// Parses a hotkey or command word (`s`/`stop`, `r`/`restart`).
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "s" | "stop" => Some(OverrideEvent::StopNow),
            "r" | "restart" => Some(OverrideEvent::RestartNow),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("s", Some(OverrideEvent::StopNow))]
    #[case("STOP\n", Some(OverrideEvent::StopNow))]
    #[case(" r ", Some(OverrideEvent::RestartNow))]
    #[case("restart", Some(OverrideEvent::RestartNow))]
    #[case("q", None)]
    #[case("", None)]
    fn test_parse(#[case] input: &str, #[case] expected: Option<OverrideEvent>) {
        assert_eq!(OverrideEvent::parse(input), expected);
    }
}

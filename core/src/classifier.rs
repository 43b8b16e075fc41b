//! Classification of reassembled main controller output lines.
//!
//! The classifier is an ordered table of [`LineRule`]s. Each rule recognizes
//! one line shape and maps it to a [`LineAction`]; the first matching rule
//! wins. Lines no rule accepts are [`LineAction::PassThrough`] and only ever
//! reach the notification sink.

use std::sync::LazyLock;

use regex_lite::Captures;
use regex_lite::Regex;

/// Interactive prompt the MC prints without a trailing newline. It ends up
/// glued to the front of the next output line.
pub const MC_PROMPT: &str = "MC2> ";

/// Header line of the response to the `info` command.
pub const INFO_RESPONSE_HEADER: &str = "MC information:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineCategory {
    /// `MC@host: ...` lines describing the controller lifecycle.
    McLifecycle,
    /// `MTC@host: ...` lines describing test case execution.
    MtcLifecycle,
    /// Start of the multi-line `info` response.
    InfoResponse,
    /// Lines printed while the controller starts up.
    Banner,
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAction {
    Listening {
        address: Option<String>,
        port: Option<u16>,
    },
    StartupError(String),
    Banner,
    HcConnected {
        from: String,
    },
    MtcCreated,
    TestcaseStarted {
        name: String,
    },
    TestcaseFinished {
        name: String,
        verdict: String,
        reason: String,
    },
    ExecutionFinished,
    ExecuteSectionFinished,
    TerminatingMtc,
    MtcTerminated,
    ShuttingDown,
    ShutdownComplete,
    McError(String),
    InfoBegin,
    PassThrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLine {
    pub category: LineCategory,
    pub action: LineAction,
    /// Name of the rule that matched, `None` for pass-through lines.
    pub rule: Option<&'static str>,
    /// Host part of an `MC@host:` / `MTC@host:` prefix.
    pub host: Option<String>,
    /// The line with any leading prompt removed.
    pub text: String,
}

type ActionBuilder = fn(&Captures<'_>) -> LineAction;

pub struct LineRule {
    name: &'static str,
    category: LineCategory,
    pattern: Regex,
    build: ActionBuilder,
}

impl LineRule {
    #[allow(clippy::expect_used)]
    fn new(
        name: &'static str,
        category: LineCategory,
        pattern: &str,
        build: ActionBuilder,
    ) -> Self {
        Self {
            name,
            category,
            pattern: Regex::new(pattern).expect("line rule patterns are valid"),
            build,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn category(&self) -> LineCategory {
        self.category
    }

    /// Applies this rule alone to `line` (prompt already stripped).
    pub fn apply(&self, line: &str) -> Option<ClassifiedLine> {
        let caps = self.pattern.captures(line)?;
        Some(ClassifiedLine {
            category: self.category,
            action: (self.build)(&caps),
            rule: Some(self.name),
            host: caps.name("host").map(|m| m.as_str().to_string()),
            text: line.to_string(),
        })
    }
}

impl std::fmt::Debug for LineRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineRule")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

fn capture(caps: &Captures<'_>, name: &str) -> String {
    caps.name(name)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Pattern for an `MC@host:` lifecycle phrase. The prefix is optional so a
/// bare phrase suffix is recognized as well.
fn mc_phrase(phrase: &str) -> String {
    format!(r"^(?:MC@(?P<host>[^:\s]+):)? {phrase}")
}

fn listening(caps: &Captures<'_>) -> LineAction {
    LineAction::Listening {
        address: caps.name("address").map(|m| m.as_str().to_string()),
        port: caps.name("port").and_then(|m| m.as_str().parse().ok()),
    }
}

static DEFAULT_RULES: LazyLock<Vec<LineRule>> = LazyLock::new(|| {
    use LineCategory::*;
    vec![
        LineRule::new(
            "info_header",
            InfoResponse,
            r"^MC information:\s*$",
            |_| LineAction::InfoBegin,
        ),
        LineRule::new(
            "mc_listening_address",
            McLifecycle,
            &mc_phrase(r"Listening on IP address (?P<address>\S+) and TCP port (?P<port>\d+)\.?\s*$"),
            listening,
        ),
        LineRule::new(
            "mc_listening",
            McLifecycle,
            &mc_phrase(r"Listening on TCP port (?P<port>\d+)\.?\s*$"),
            listening,
        ),
        LineRule::new(
            "mc_hc_connected",
            McLifecycle,
            &mc_phrase(r"New HC connected from (?P<from>.+)$"),
            |caps| LineAction::HcConnected {
                from: capture(caps, "from").trim_end_matches('.').to_string(),
            },
        ),
        LineRule::new(
            "mc_mtc_created",
            McLifecycle,
            &mc_phrase(r"MTC is created\.\s*$"),
            |_| LineAction::MtcCreated,
        ),
        LineRule::new(
            "mc_execution_finished",
            McLifecycle,
            &mc_phrase(r"Test execution finished\.\s*$"),
            |_| LineAction::ExecutionFinished,
        ),
        LineRule::new(
            "mc_execute_section_finished",
            McLifecycle,
            &mc_phrase(r"Execution of \[EXECUTE\] section finished\.\s*$"),
            |_| LineAction::ExecuteSectionFinished,
        ),
        LineRule::new(
            "mc_terminating_mtc",
            McLifecycle,
            &mc_phrase(r"Terminating MTC\.\s*$"),
            |_| LineAction::TerminatingMtc,
        ),
        LineRule::new(
            "mc_mtc_terminated",
            McLifecycle,
            &mc_phrase(r"MTC terminated\.\s*$"),
            |_| LineAction::MtcTerminated,
        ),
        LineRule::new(
            "mc_shutting_down",
            McLifecycle,
            &mc_phrase(r"Shutting down session\.\s*$"),
            |_| LineAction::ShuttingDown,
        ),
        LineRule::new(
            "mc_shutdown_complete",
            McLifecycle,
            &mc_phrase(r"Shutdown complete\.\s*$"),
            |_| LineAction::ShutdownComplete,
        ),
        LineRule::new(
            "mc_error",
            McLifecycle,
            &mc_phrase(r"Error: (?P<text>.*)$"),
            |caps| LineAction::McError(capture(caps, "text")),
        ),
        LineRule::new(
            "mtc_testcase_started",
            MtcLifecycle,
            r"^MTC@(?P<host>[^:\s]+): Test case (?P<name>\S+) started\.\s*$",
            |caps| LineAction::TestcaseStarted {
                name: capture(caps, "name"),
            },
        ),
        LineRule::new(
            "mtc_testcase_finished",
            MtcLifecycle,
            r"^MTC@(?P<host>[^:\s]+): Test case (?P<name>\S+) finished\. Verdict: (?P<verdict>\S+)\s*(?: reason: (?P<reason>.*?))?\s*$",
            |caps| LineAction::TestcaseFinished {
                name: capture(caps, "name"),
                verdict: capture(caps, "verdict"),
                reason: capture(caps, "reason"),
            },
        ),
        LineRule::new(
            "banner_listening_address",
            Banner,
            r"^Listening on IP address (?P<address>\S+) and TCP port (?P<port>\d+)\.?\s*$",
            listening,
        ),
        LineRule::new(
            "banner_listening",
            Banner,
            r"^Listening on TCP port (?P<port>\d+)\.?\s*$",
            listening,
        ),
        LineRule::new(
            "banner_error",
            Banner,
            r"^Error: (?P<text>.*)$",
            |caps| LineAction::StartupError(capture(caps, "text")),
        ),
        LineRule::new(
            "banner_text",
            Banner,
            r"^(?:\*+\s*)?(?:TTCN-3 Main Controller|Version: |Copyright |License: |Using configuration file: )",
            |_| LineAction::Banner,
        ),
    ]
});

/// Removes any number of leading MC prompts from `line`.
pub fn strip_prompt(line: &str) -> &str {
    let mut rest = line;
    while let Some(stripped) = rest.strip_prefix(MC_PROMPT) {
        rest = stripped;
    }
    rest
}

#[derive(Debug, Clone, Copy)]
pub struct StatusLineClassifier {
    rules: &'static [LineRule],
}

impl Default for StatusLineClassifier {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.as_slice(),
        }
    }
}

impl StatusLineClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> &'static [LineRule] {
        self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&'static LineRule> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    pub fn classify(&self, line: &str) -> ClassifiedLine {
        let text = strip_prompt(line);
        self.rules
            .iter()
            .find_map(|rule| rule.apply(text))
            .unwrap_or_else(|| ClassifiedLine {
                category: LineCategory::Unrecognized,
                action: LineAction::PassThrough,
                rule: None,
                host: None,
                text: text.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn action(line: &str) -> LineAction {
        StatusLineClassifier::new().classify(line).action
    }

    #[test]
    fn rule_names_are_unique() {
        let classifier = StatusLineClassifier::new();
        let mut names: Vec<_> = classifier.rules().iter().map(LineRule::name).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn rules_match_in_isolation() {
        let classifier = StatusLineClassifier::new();
        let cases = [
            ("mc_mtc_created", "MC@host: MTC is created."),
            ("mc_execution_finished", "MC@host: Test execution finished."),
            (
                "mc_execute_section_finished",
                "MC@host: Execution of [EXECUTE] section finished.",
            ),
            ("mc_terminating_mtc", "MC@host: Terminating MTC."),
            ("mc_mtc_terminated", "MC@host: MTC terminated."),
            ("mc_shutting_down", "MC@host: Shutting down session."),
            ("mc_shutdown_complete", "MC@host: Shutdown complete."),
            ("mc_error", "MC@host: Error: Connection refused"),
            ("mc_hc_connected", "MC@host: New HC connected from 1.2.3.4"),
            (
                "mc_listening_address",
                "MC@host: Listening on IP address 10.0.0.1 and TCP port 4711.",
            ),
            ("mc_listening", "MC@host: Listening on TCP port 4711."),
            ("mtc_testcase_started", "MTC@host: Test case tc1 started."),
            (
                "mtc_testcase_finished",
                "MTC@host: Test case tc1 finished. Verdict: pass",
            ),
            (
                "banner_listening_address",
                "Listening on IP address 10.0.0.1 and TCP port 4711.",
            ),
            ("banner_listening", "Listening on TCP port 4711."),
            ("banner_error", "Error: could not open config file"),
            ("banner_text", "TTCN-3 Main Controller 10.1.0"),
            ("info_header", "MC information:"),
        ];
        for (name, line) in cases {
            let rule = classifier.rule(name).expect("rule exists");
            assert!(rule.apply(line).is_some(), "{name} should match {line:?}");
            assert!(
                rule.apply("MC@host: something else entirely").is_none(),
                "{name} matched an unrelated line"
            );
        }
    }

    #[test]
    fn lifecycle_lines_map_to_actions() {
        assert_eq!(action("MC@h: MTC is created."), LineAction::MtcCreated);
        assert_eq!(action("MC@h: Terminating MTC."), LineAction::TerminatingMtc);
        assert_eq!(action("MC@h: MTC terminated."), LineAction::MtcTerminated);
        assert_eq!(
            action("MC@h: Shutting down session."),
            LineAction::ShuttingDown
        );
        assert_eq!(
            action("MC@h: Shutdown complete."),
            LineAction::ShutdownComplete
        );
        assert_eq!(
            action("MC@h: Error: Connection refused"),
            LineAction::McError("Connection refused".to_string())
        );
        assert_eq!(
            action("MC@h: New HC connected from 1.2.3.4"),
            LineAction::HcConnected {
                from: "1.2.3.4".to_string()
            }
        );
        assert_eq!(
            action("MC@h: New HC connected from tester [10.0.0.2]. tester info: Linux"),
            LineAction::HcConnected {
                from: "tester [10.0.0.2]. tester info: Linux".to_string()
            }
        );
    }

    #[test]
    fn listening_banner_variants() {
        assert_eq!(
            action("Listening on TCP port 4711."),
            LineAction::Listening {
                address: None,
                port: Some(4711)
            }
        );
        assert_eq!(
            action("Listening on IP address 127.0.0.1 and TCP port 9000."),
            LineAction::Listening {
                address: Some("127.0.0.1".to_string()),
                port: Some(9000)
            }
        );
        let classified = StatusLineClassifier::new().classify("MC@box: Listening on TCP port 1.");
        assert_eq!(classified.category, LineCategory::McLifecycle);
        assert_eq!(classified.host.as_deref(), Some("box"));
    }

    #[test]
    fn testcase_finished_with_and_without_reason() {
        assert_eq!(
            action("MTC@host: Test case tc1 finished. Verdict: pass"),
            LineAction::TestcaseFinished {
                name: "tc1".to_string(),
                verdict: "pass".to_string(),
                reason: String::new(),
            }
        );
        assert_eq!(
            action("MTC@host: Test case Mod.tc2 finished. Verdict: fail reason: timer expired"),
            LineAction::TestcaseFinished {
                name: "Mod.tc2".to_string(),
                verdict: "fail".to_string(),
                reason: "timer expired".to_string(),
            }
        );
        assert_eq!(
            action("MTC@host: Test case tc3 finished. Verdict: inconc \t"),
            LineAction::TestcaseFinished {
                name: "tc3".to_string(),
                verdict: "inconc".to_string(),
                reason: String::new(),
            }
        );
        assert_eq!(
            action("MTC@host: Test case tc4 finished. Verdict: error reason: dte "),
            LineAction::TestcaseFinished {
                name: "tc4".to_string(),
                verdict: "error".to_string(),
                reason: "dte".to_string(),
            }
        );
    }

    #[test]
    fn prompt_is_stripped_before_matching() {
        let classified = StatusLineClassifier::new().classify("MC2> MC2> MC@h: MTC is created.");
        assert_eq!(classified.action, LineAction::MtcCreated);
        assert_eq!(classified.text, "MC@h: MTC is created.");
    }

    #[test]
    fn unknown_lines_pass_through() {
        let classified = StatusLineClassifier::new().classify("MC@h: Unknown command: foo");
        assert_eq!(classified.category, LineCategory::Unrecognized);
        assert_eq!(classified.action, LineAction::PassThrough);
        assert_eq!(classified.rule, None);

        // The phrase needs its leading separator.
        assert_eq!(action("MTC is created."), LineAction::PassThrough);
        assert_eq!(action(""), LineAction::PassThrough);
    }

    #[test]
    fn banner_lines() {
        assert_eq!(
            action("*************************************************************************"),
            LineAction::PassThrough
        );
        assert_eq!(
            action("TTCN-3 Main Controller 9.0.0"),
            LineAction::Banner
        );
        assert_eq!(
            action("Error: Could not open configuration file."),
            LineAction::StartupError("Could not open configuration file.".to_string())
        );
    }
}

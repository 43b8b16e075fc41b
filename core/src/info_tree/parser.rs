use std::net::IpAddr;
use std::sync::LazyLock;

use regex_lite::Regex;
use tracing::trace;

use super::Component;
use super::HostController;
use super::InfoTree;

const MC_STATE: &str = " MC state: ";
const HOST_INFORMATION: &str = " host information:";
const NO_HOSTS: &str = " no HCs are connected";
const HOST_ENTRY: &str = "  - ";
const OPERATING_SYSTEM: &str = "     operating system: ";
const HC_STATE: &str = "     HC state: ";
const COMPONENT_INFORMATION: &str = "     test component information:";
const NO_COMPONENTS: &str = "     no components on this host";
const COMPONENT_ENTRY: &str = "      - ";
const COMPONENT_DETAIL: &str = "         ";
const COMPONENT_TYPE: &str = "component type: ";
const COMPONENT_STATE: &str = "state: ";
const LOCAL_VERDICT: &str = "local verdict: ";
const PAUSE_FUNCTION: &str = " pause function: ";
const CONSOLE_LOGGING: &str = " console logging: ";

#[allow(clippy::expect_used)]
static COMPONENT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:name: (?P<name>.+?), )?component reference: (?P<reference>\S+?)\.?\s*$")
        .expect("component header pattern is valid")
});

#[allow(clippy::expect_used)]
static HOST_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<first>[^\s\[]+)(?: \[(?P<bracket>[^\]]+)\])?:\s*$")
        .expect("host header pattern is valid")
});

/// Result of feeding one line to an [`InfoTreeParser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseStep {
    /// The line belonged to the response; more may follow.
    Consumed,
    /// The response is complete. `unconsumed` carries the line that ended it
    /// when that line is not part of the response.
    Finished {
        tree: InfoTree,
        unconsumed: Option<String>,
    },
}

// Positions inside each nesting level. Levels only move forward.
const TOP_MC_STATE: u8 = 0;
const TOP_HOST_HEADER: u8 = 1;
const TOP_HOSTS: u8 = 2;
const TOP_PAUSE: u8 = 3;
const TOP_CONSOLE: u8 = 4;
const TOP_DONE: u8 = 5;

const HOST_OS: u8 = 0;
const HOST_STATE: u8 = 1;
const HOST_COMPONENT_HEADER: u8 = 2;
const HOST_COMPONENTS: u8 = 3;

const COMPONENT_TYPE_STAGE: u8 = 0;
const COMPONENT_STATE_STAGE: u8 = 1;
const COMPONENT_EXECUTED_STAGE: u8 = 2;
const COMPONENT_VERDICT_STAGE: u8 = 3;

/// Incremental parser for the lines following `MC information:`.
///
/// Every nesting level is an ordered list of optional line shapes. A level
/// only advances through its list; a line that fits none of its remaining
/// shapes closes the level and is offered to the parent. Nothing is ever
/// re-read.
#[derive(Debug, Default)]
pub struct InfoTreeParser {
    tree: InfoTree,
    top: u8,
    host: Option<(HostController, u8)>,
    component: Option<(Component, u8)>,
}

impl InfoTreeParser {
    /// Starts a parser positioned right after the `MC information:` header.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, line: &str) -> ParseStep {
        if self.component.is_some() {
            if self.component_detail(line) {
                return ParseStep::Consumed;
            }
            self.close_component();
        }

        if let Some((_, stage)) = &self.host
            && *stage == HOST_COMPONENTS
        {
            if let Some(component) = parse_component_header(line) {
                self.component = Some((component, COMPONENT_TYPE_STAGE));
                return ParseStep::Consumed;
            }
            self.close_host();
        }

        if self.host.is_some() {
            if self.host_detail(line) {
                return ParseStep::Consumed;
            }
            self.close_host();
        }

        if self.top == TOP_HOSTS {
            if let Some(host) = parse_host_header(line) {
                self.host = Some((host, HOST_OS));
                return ParseStep::Consumed;
            }
            self.top = TOP_PAUSE;
        }

        if self.top_level(line) {
            if self.top == TOP_DONE {
                return ParseStep::Finished {
                    tree: self.take_tree(),
                    unconsumed: None,
                };
            }
            return ParseStep::Consumed;
        }

        trace!(line, "info response ended at unexpected line");
        ParseStep::Finished {
            tree: self.take_tree(),
            unconsumed: Some(line.to_string()),
        }
    }

    /// Returns whatever was parsed so far, e.g. when the stream ends in the
    /// middle of a response.
    pub fn finish(mut self) -> InfoTree {
        self.take_tree()
    }

    fn take_tree(&mut self) -> InfoTree {
        self.close_host();
        self.top = TOP_DONE;
        std::mem::take(&mut self.tree)
    }

    fn top_level(&mut self, line: &str) -> bool {
        if self.top == TOP_MC_STATE
            && let Some(value) = line.strip_prefix(MC_STATE)
        {
            self.tree.state_info = Some(value.trim().to_string());
            self.top = TOP_HOST_HEADER;
            return true;
        }
        if self.top <= TOP_HOST_HEADER {
            if line.trim_end() == HOST_INFORMATION {
                self.top = TOP_HOSTS;
                return true;
            }
            if line.trim_end().trim_end_matches('.') == NO_HOSTS {
                self.top = TOP_PAUSE;
                return true;
            }
        }
        if self.top <= TOP_PAUSE
            && let Some(value) = line.strip_prefix(PAUSE_FUNCTION)
        {
            self.tree.pause_info = Some(value.trim().to_string());
            self.top = TOP_CONSOLE;
            return true;
        }
        if self.top <= TOP_CONSOLE
            && let Some(value) = line.strip_prefix(CONSOLE_LOGGING)
        {
            self.tree.console_logging_info = Some(value.trim().to_string());
            self.top = TOP_DONE;
            return true;
        }
        false
    }

    fn host_detail(&mut self, line: &str) -> bool {
        let Some((host, stage)) = self.host.as_mut() else {
            return false;
        };
        if *stage == HOST_OS
            && let Some(value) = line.strip_prefix(OPERATING_SYSTEM)
        {
            host.operating_system = Some(value.trim().to_string());
            *stage = HOST_STATE;
            return true;
        }
        if *stage <= HOST_STATE
            && let Some(value) = line.strip_prefix(HC_STATE)
        {
            host.state = Some(value.trim().to_string());
            *stage = HOST_COMPONENT_HEADER;
            return true;
        }
        if *stage <= HOST_COMPONENT_HEADER {
            if line.trim_end() == COMPONENT_INFORMATION {
                *stage = HOST_COMPONENTS;
                return true;
            }
            if line.trim_end().trim_end_matches('.') == NO_COMPONENTS {
                // Nothing else can follow inside this host.
                *stage = HOST_COMPONENTS + 1;
                return true;
            }
        }
        false
    }

    fn component_detail(&mut self, line: &str) -> bool {
        let Some((component, stage)) = self.component.as_mut() else {
            return false;
        };
        let Some(detail) = line.strip_prefix(COMPONENT_DETAIL) else {
            return false;
        };
        if detail.starts_with(' ') {
            return false;
        }
        if *stage == COMPONENT_TYPE_STAGE
            && let Some(value) = detail.strip_prefix(COMPONENT_TYPE)
        {
            component.component_type = Some(value.trim().to_string());
            *stage = COMPONENT_STATE_STAGE;
            return true;
        }
        if *stage <= COMPONENT_STATE_STAGE
            && let Some(value) = detail.strip_prefix(COMPONENT_STATE)
        {
            component.state = Some(value.trim().to_string());
            *stage = COMPONENT_EXECUTED_STAGE;
            return true;
        }
        if *stage <= COMPONENT_EXECUTED_STAGE && detail.starts_with("execut") {
            component.executed_info = Some(detail.trim().to_string());
            *stage = COMPONENT_VERDICT_STAGE;
            return true;
        }
        if *stage <= COMPONENT_VERDICT_STAGE
            && let Some(value) = detail.strip_prefix(LOCAL_VERDICT)
        {
            component.verdict = Some(value.trim().to_string());
            *stage = COMPONENT_VERDICT_STAGE + 1;
            return true;
        }
        false
    }

    fn close_component(&mut self) {
        if let Some((component, _)) = self.component.take()
            && let Some((host, _)) = self.host.as_mut()
        {
            host.components.push(component);
        }
    }

    fn close_host(&mut self) {
        self.close_component();
        if let Some((host, _)) = self.host.take() {
            self.tree.hosts.push(host);
        }
    }
}

fn parse_host_header(line: &str) -> Option<HostController> {
    let body = line.strip_prefix(HOST_ENTRY)?;
    let caps = HOST_HEADER.captures(body)?;
    let first = caps.name("first")?.as_str();
    let bracket = caps.name("bracket").map(|m| m.as_str());

    let mut host = HostController::new(bracket.unwrap_or(first));
    if let Some(address) = bracket
        && address != first
    {
        host.host_name = Some(first.to_string());
    }
    if host.ip_address.parse::<IpAddr>().is_ok() {
        host.ip_number = Some(host.ip_address.clone());
    }
    Some(host)
}

fn parse_component_header(line: &str) -> Option<Component> {
    let body = line.strip_prefix(COMPONENT_ENTRY)?;
    let caps = COMPONENT_HEADER.captures(body)?;
    let mut component = Component::new(caps.name("reference")?.as_str());
    component.name = caps.name("name").map(|m| m.as_str().to_string());
    Some(component)
}

//! Breakpoint bookkeeping.

use std::collections::{BTreeMap, HashMap};

use migdb_mi::{Fields, Value};

/// A breakpoint as reported by the debugger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    /// Debugger-assigned number (the table key).
    pub number: u32,
    /// Source file as given by the debugger.
    pub file: Option<String>,
    /// Absolute source path, when known.
    pub fullname: Option<String>,
    /// Line number (1-based).
    pub line: Option<u32>,
    pub function: Option<String>,
    pub address: Option<String>,
    pub condition: Option<String>,
    pub enabled: bool,
    pub temporary: bool,
    pub hardware: bool,
    /// Hit count.
    pub times: u32,
}

impl Breakpoint {
    /// Create a plain enabled breakpoint with only a number.
    pub fn new(number: u32) -> Self {
        Self {
            number,
            file: None,
            fullname: None,
            line: None,
            function: None,
            address: None,
            condition: None,
            enabled: true,
            temporary: false,
            hardware: false,
            times: 0,
        }
    }

    /// Place the breakpoint at a source line.
    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Build from a `bkpt={...}` tuple.
    ///
    /// Returns `None` when the number is missing or belongs to a
    /// sub-location (`1.2`).
    ///
    /// A breakpoint with several locations (`addr="<MULTIPLE>"`) takes its
    /// file and line from the first entry of its `locations` list.
    pub fn from_fields(fields: &Fields) -> Option<Self> {
        let number = match parse_number(fields.get_str("number")?) {
            Ok(number) => number,
            Err(text) => {
                tracing::debug!("skipping breakpoint row {}", text);
                return None;
            }
        };
        let first_location = fields
            .get_list("locations")
            .and_then(|list| list.items().into_iter().find_map(Value::as_tuple));
        let source = |name: &str| {
            fields
                .get_str(name)
                .or_else(|| first_location.and_then(|loc| loc.get_str(name)))
        };
        let owned = |name: &str| fields.get_str(name).map(str::to_string);
        Some(Self {
            number,
            file: source("file").map(str::to_string),
            fullname: source("fullname").map(str::to_string),
            line: source("line").and_then(|l| l.parse().ok()),
            function: owned("func"),
            address: owned("addr"),
            condition: owned("cond"),
            enabled: fields.get_str("enabled") != Some("n"),
            temporary: fields.get_str("disp") == Some("del"),
            hardware: fields
                .get_str("type")
                .is_some_and(|t| t.starts_with("hw")),
            times: fields
                .get_str("times")
                .and_then(|t| t.parse().ok())
                .unwrap_or(0),
        })
    }

    /// Whether this breakpoint resolved to more than one address.
    pub fn has_multiple_locations(&self) -> bool {
        self.address.as_deref() == Some("<MULTIPLE>")
    }

    /// File names this breakpoint can be looked up by.
    fn file_keys(&self) -> impl Iterator<Item = &str> {
        self.file
            .iter()
            .chain(self.fullname.iter())
            .map(String::as_str)
    }
}

/// Parse a top-level breakpoint number. Location rows (`1.2`) and
/// anything else unreadable come back as the offending text.
fn parse_number(text: &str) -> Result<u32, &str> {
    match text.parse() {
        Ok(number) => Ok(number),
        Err(e) => {
            if !text.contains('.') {
                tracing::warn!("unreadable breakpoint number {:?}: {}", text, e);
            }
            Err(text)
        }
    }
}

/// Breakpoints by number, with a per-file line index.
#[derive(Debug, Clone, Default)]
pub struct BreakpointTable {
    by_number: BTreeMap<u32, Breakpoint>,
    /// file -> (line, number) pairs
    by_file: HashMap<String, Vec<(u32, u32)>>,
}

impl BreakpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a breakpoint, returning the previous entry.
    pub fn insert(&mut self, bp: Breakpoint) -> Option<Breakpoint> {
        let previous = self.remove(bp.number);
        if let Some(line) = bp.line {
            for key in bp.file_keys() {
                self.by_file
                    .entry(key.to_string())
                    .or_default()
                    .push((line, bp.number));
            }
        }
        self.by_number.insert(bp.number, bp);
        previous
    }

    /// Remove a breakpoint from both indices.
    pub fn remove(&mut self, number: u32) -> Option<Breakpoint> {
        let bp = self.by_number.remove(&number)?;
        for key in bp.file_keys() {
            if let Some(entries) = self.by_file.get_mut(key) {
                entries.retain(|(_, n)| *n != number);
                if entries.is_empty() {
                    self.by_file.remove(key);
                }
            }
        }
        Some(bp)
    }

    pub fn get(&self, number: u32) -> Option<&Breakpoint> {
        self.by_number.get(&number)
    }

    /// Whether any breakpoint sits on `file:line`.
    ///
    /// `file` may be either the short name or the full path.
    pub fn is_breakpoint(&self, file: &str, line: u32) -> bool {
        self.by_file
            .get(file)
            .is_some_and(|entries| entries.iter().any(|(l, _)| *l == line))
    }

    /// Sorted, de-duplicated breakpoint lines in `file`.
    pub fn lines_in(&self, file: &str) -> Vec<u32> {
        let mut lines: Vec<u32> = self
            .by_file
            .get(file)
            .map(|entries| entries.iter().map(|(line, _)| *line).collect())
            .unwrap_or_default();
        lines.sort_unstable();
        lines.dedup();
        lines
    }

    /// Returns false if the breakpoint is unknown.
    pub fn set_enabled(&mut self, number: u32, enabled: bool) -> bool {
        match self.by_number.get_mut(&number) {
            Some(bp) => {
                bp.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Returns false if the breakpoint is unknown.
    pub fn set_condition(&mut self, number: u32, condition: Option<String>) -> bool {
        match self.by_number.get_mut(&number) {
            Some(bp) => {
                bp.condition = condition;
                true
            }
            None => false,
        }
    }

    /// All breakpoints in number order.
    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.by_number.values()
    }

    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }
}

//! GDB/MI command builder.
//!
//! Commands render as `token-operation options -- parameters`. The `--`
//! separator is only written when a parameter could be mistaken for an
//! option. Arguments containing whitespace or quotes are written as C
//! strings.

use std::fmt;
use std::str::FromStr;

/// Display format of a variable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarFormat {
    Binary,
    Decimal,
    Hexadecimal,
    Octal,
    Natural,
}

impl VarFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            VarFormat::Binary => "binary",
            VarFormat::Decimal => "decimal",
            VarFormat::Hexadecimal => "hexadecimal",
            VarFormat::Octal => "octal",
            VarFormat::Natural => "natural",
        }
    }
}

impl FromStr for VarFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" | "b" => Ok(VarFormat::Binary),
            "decimal" | "d" => Ok(VarFormat::Decimal),
            "hexadecimal" | "hex" | "x" => Ok(VarFormat::Hexadecimal),
            "octal" | "o" => Ok(VarFormat::Octal),
            "natural" | "n" => Ok(VarFormat::Natural),
            other => Err(format!("unknown format: {other}")),
        }
    }
}

/// How much value text `-var-update` and `-var-list-children` report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintValues {
    NoValues,
    AllValues,
    SimpleValues,
}

impl PrintValues {
    fn as_flag(self) -> &'static str {
        match self {
            PrintValues::NoValues => "--no-values",
            PrintValues::AllValues => "--all-values",
            PrintValues::SimpleValues => "--simple-values",
        }
    }
}

/// Access kind of a watchpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    Write,
    Read,
    Access,
}

/// Options of `-break-insert`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakInsert {
    pub location: Option<String>,
    pub condition: Option<String>,
    pub temporary: bool,
    pub hardware: bool,
    /// Create a pending breakpoint if the location is not yet known.
    pub force: bool,
    pub ignore_count: Option<u32>,
    pub thread: Option<u32>,
}

impl BreakInsert {
    pub fn at(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            ..Self::default()
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn temporary(mut self) -> Self {
        self.temporary = true;
        self
    }

    pub fn hardware(mut self) -> Self {
        self.hardware = true;
        self
    }
}

/// Address range or source range for `-data-disassemble`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisassembleRange {
    Addresses {
        start: String,
        end: String,
    },
    Source {
        file: String,
        line: u32,
        lines: Option<u32>,
    },
}

/// One MI command, optionally with a caller-chosen token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiCommand {
    operation: String,
    options: Vec<String>,
    parameters: Vec<String>,
    token: Option<u64>,
    raw: bool,
}

impl MiCommand {
    /// A command with no arguments yet.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            options: Vec::new(),
            parameters: Vec::new(),
            token: None,
            raw: false,
        }
    }

    /// User-typed text sent verbatim after the token (MI or CLI syntax).
    pub fn raw(text: impl Into<String>) -> Self {
        let text: String = text.into();
        Self {
            raw: true,
            ..Self::new(text.trim())
        }
    }

    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    /// Add `flag value` to the options.
    pub fn option_value(self, flag: &str, value: impl Into<String>) -> Self {
        self.option(flag).option(value)
    }

    fn option_if(self, enabled: bool, flag: &str) -> Self {
        if enabled {
            self.option(flag)
        } else {
            self
        }
    }

    pub fn parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameters.push(parameter.into());
        self
    }

    pub fn parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters.extend(parameters.into_iter().map(Into::into));
        self
    }

    /// Use an explicit token instead of the next one the session allocates.
    pub fn with_token(mut self, token: u64) -> Self {
        self.token = Some(token);
        self
    }

    pub fn token(&self) -> Option<u64> {
        self.token
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Whether this command sets the target running (`-exec-*` other than
    /// `-exec-arguments` and `-exec-interrupt`).
    pub fn resumes_target(&self) -> bool {
        !self.raw
            && self.operation.starts_with("-exec-")
            && !matches!(self.operation.as_str(), "-exec-arguments" | "-exec-interrupt")
    }

    /// The command line without trailing newline.
    pub fn render(&self, token: u64) -> String {
        if self.raw {
            return format!("{token}{}", self.operation);
        }
        let mut line = format!("{token}{}", self.operation);
        for option in &self.options {
            line.push(' ');
            line.push_str(&quote(option));
        }
        let needs_separator = !self.options.is_empty()
            && self.parameters.first().is_some_and(|p| p.starts_with('-'));
        if needs_separator {
            line.push_str(" --");
        }
        for parameter in &self.parameters {
            line.push(' ');
            line.push_str(&quote(parameter));
        }
        line
    }

    // Breakpoints

    pub fn break_after(number: u32, count: u32) -> Self {
        Self::new("-break-after")
            .parameter(number.to_string())
            .parameter(count.to_string())
    }

    pub fn break_condition(number: u32, condition: &str) -> Self {
        Self::new("-break-condition")
            .parameter(number.to_string())
            .parameter(condition)
    }

    pub fn break_delete(numbers: &[u32]) -> Self {
        Self::new("-break-delete").parameters(numbers.iter().map(u32::to_string))
    }

    pub fn break_disable(numbers: &[u32]) -> Self {
        Self::new("-break-disable").parameters(numbers.iter().map(u32::to_string))
    }

    pub fn break_enable(numbers: &[u32]) -> Self {
        Self::new("-break-enable").parameters(numbers.iter().map(u32::to_string))
    }

    pub fn break_info(number: u32) -> Self {
        Self::new("-break-info").parameter(number.to_string())
    }

    pub fn break_insert(request: &BreakInsert) -> Self {
        let mut command = Self::new("-break-insert")
            .option_if(request.temporary, "-t")
            .option_if(request.hardware, "-h")
            .option_if(request.force, "-f");
        if let Some(condition) = &request.condition {
            command = command.option_value("-c", condition.as_str());
        }
        if let Some(count) = request.ignore_count {
            command = command.option_value("-i", count.to_string());
        }
        if let Some(thread) = request.thread {
            command = command.option_value("-p", thread.to_string());
        }
        match &request.location {
            Some(location) => command.parameter(location.as_str()),
            None => command,
        }
    }

    pub fn break_list() -> Self {
        Self::new("-break-list")
    }

    pub fn break_watch(expression: &str, kind: WatchKind) -> Self {
        let command = Self::new("-break-watch");
        let command = match kind {
            WatchKind::Write => command,
            WatchKind::Read => command.option("-r"),
            WatchKind::Access => command.option("-a"),
        };
        command.parameter(expression)
    }

    // Program context

    pub fn exec_arguments<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new("-exec-arguments").parameters(args)
    }

    pub fn environment_cd(dir: &str) -> Self {
        Self::new("-environment-cd").parameter(dir)
    }

    pub fn environment_pwd() -> Self {
        Self::new("-environment-pwd")
    }

    // Execution

    pub fn exec_continue() -> Self {
        Self::new("-exec-continue")
    }

    pub fn exec_finish() -> Self {
        Self::new("-exec-finish")
    }

    pub fn exec_interrupt() -> Self {
        Self::new("-exec-interrupt")
    }

    pub fn exec_next() -> Self {
        Self::new("-exec-next")
    }

    pub fn exec_next_instruction() -> Self {
        Self::new("-exec-next-instruction")
    }

    pub fn exec_return() -> Self {
        Self::new("-exec-return")
    }

    pub fn exec_run() -> Self {
        Self::new("-exec-run")
    }

    pub fn exec_step() -> Self {
        Self::new("-exec-step")
    }

    pub fn exec_step_instruction() -> Self {
        Self::new("-exec-step-instruction")
    }

    pub fn exec_until(location: Option<&str>) -> Self {
        let command = Self::new("-exec-until");
        match location {
            Some(location) => command.parameter(location),
            None => command,
        }
    }

    // Stack

    pub fn stack_info_frame() -> Self {
        Self::new("-stack-info-frame")
    }

    pub fn stack_info_depth(max_depth: Option<u32>) -> Self {
        let command = Self::new("-stack-info-depth");
        match max_depth {
            Some(depth) => command.parameter(depth.to_string()),
            None => command,
        }
    }

    pub fn stack_list_arguments(show_values: bool, range: Option<(u32, u32)>) -> Self {
        let command =
            Self::new("-stack-list-arguments").parameter(if show_values { "1" } else { "0" });
        match range {
            Some((low, high)) => command.parameter(low.to_string()).parameter(high.to_string()),
            None => command,
        }
    }

    pub fn stack_list_frames(range: Option<(u32, u32)>) -> Self {
        let command = Self::new("-stack-list-frames");
        match range {
            Some((low, high)) => command.parameter(low.to_string()).parameter(high.to_string()),
            None => command,
        }
    }

    pub fn stack_list_locals(show_values: bool) -> Self {
        Self::new("-stack-list-locals").parameter(if show_values { "1" } else { "0" })
    }

    pub fn stack_select_frame(level: u32) -> Self {
        Self::new("-stack-select-frame").parameter(level.to_string())
    }

    // Variable objects

    /// `-var-create`; a `None` name lets the debugger pick one, a `None`
    /// frame means the current frame.
    pub fn var_create(name: Option<&str>, frame: Option<&str>, expression: &str) -> Self {
        Self::new("-var-create")
            .parameter(name.unwrap_or("-"))
            .parameter(frame.unwrap_or("*"))
            .parameter(expression)
    }

    pub fn var_delete(name: &str) -> Self {
        Self::new("-var-delete").parameter(name)
    }

    pub fn var_set_format(name: &str, format: VarFormat) -> Self {
        Self::new("-var-set-format")
            .parameter(name)
            .parameter(format.as_str())
    }

    pub fn var_show_format(name: &str) -> Self {
        Self::new("-var-show-format").parameter(name)
    }

    pub fn var_info_num_children(name: &str) -> Self {
        Self::new("-var-info-num-children").parameter(name)
    }

    pub fn var_list_children(name: &str, print: PrintValues) -> Self {
        Self::new("-var-list-children")
            .option(print.as_flag())
            .parameter(name)
    }

    pub fn var_info_type(name: &str) -> Self {
        Self::new("-var-info-type").parameter(name)
    }

    pub fn var_info_path_expression(name: &str) -> Self {
        Self::new("-var-info-path-expression").parameter(name)
    }

    pub fn var_show_attributes(name: &str) -> Self {
        Self::new("-var-show-attributes").parameter(name)
    }

    pub fn var_evaluate_expression(name: &str) -> Self {
        Self::new("-var-evaluate-expression").parameter(name)
    }

    pub fn var_assign(name: &str, expression: &str) -> Self {
        Self::new("-var-assign")
            .parameter(name)
            .parameter(expression)
    }

    /// `-var-update`; `None` updates every variable object.
    pub fn var_update(name: Option<&str>, print: PrintValues) -> Self {
        Self::new("-var-update")
            .option(print.as_flag())
            .parameter(name.unwrap_or("*"))
    }

    pub fn var_set_frozen(name: &str, frozen: bool) -> Self {
        Self::new("-var-set-frozen")
            .parameter(name)
            .parameter(if frozen { "1" } else { "0" })
    }

    // Data

    pub fn data_evaluate_expression(expression: &str) -> Self {
        Self::new("-data-evaluate-expression").parameter(expression)
    }

    pub fn data_disassemble(range: &DisassembleRange, mode: u8) -> Self {
        let command = Self::new("-data-disassemble");
        let command = match range {
            DisassembleRange::Addresses { start, end } => command
                .option_value("-s", start.as_str())
                .option_value("-e", end.as_str()),
            DisassembleRange::Source { file, line, lines } => {
                let command = command
                    .option_value("-f", file.as_str())
                    .option_value("-l", line.to_string());
                match lines {
                    Some(n) => command.option_value("-n", n.to_string()),
                    None => command,
                }
            }
        };
        // The mode is positional after an explicit separator.
        command.option("--").parameter(mode.to_string())
    }

    pub fn data_list_register_names() -> Self {
        Self::new("-data-list-register-names")
    }

    pub fn data_list_register_values(format: &str, registers: &[u32]) -> Self {
        Self::new("-data-list-register-values")
            .parameter(format)
            .parameters(registers.iter().map(u32::to_string))
    }

    pub fn data_list_changed_registers() -> Self {
        Self::new("-data-list-changed-registers")
    }

    pub fn data_read_memory(
        address: &str,
        format: &str,
        word_size: u32,
        rows: u32,
        columns: u32,
        byte_offset: Option<i64>,
    ) -> Self {
        let command = Self::new("-data-read-memory");
        let command = match byte_offset {
            Some(offset) => command.option_value("-o", offset.to_string()),
            None => command,
        };
        command
            .parameter(address)
            .parameter(format)
            .parameter(word_size.to_string())
            .parameter(rows.to_string())
            .parameter(columns.to_string())
    }

    // Files

    pub fn file_exec_and_symbols(path: &str) -> Self {
        Self::new("-file-exec-and-symbols").parameter(path)
    }

    pub fn file_exec_file(path: &str) -> Self {
        Self::new("-file-exec-file").parameter(path)
    }

    pub fn file_list_exec_sections() -> Self {
        Self::new("-file-list-exec-sections")
    }

    pub fn file_list_exec_source_file() -> Self {
        Self::new("-file-list-exec-source-file")
    }

    pub fn file_list_exec_source_files() -> Self {
        Self::new("-file-list-exec-source-files")
    }

    pub fn file_list_shared_libraries() -> Self {
        Self::new("-file-list-shared-libraries")
    }

    pub fn file_list_symbol_files() -> Self {
        Self::new("-file-list-symbol-files")
    }

    pub fn file_symbol_file(path: &str) -> Self {
        Self::new("-file-symbol-file").parameter(path)
    }

    // Target

    pub fn target_attach(target: &str) -> Self {
        Self::new("-target-attach").parameter(target)
    }

    pub fn target_detach() -> Self {
        Self::new("-target-detach")
    }

    pub fn target_disconnect() -> Self {
        Self::new("-target-disconnect")
    }

    pub fn target_download() -> Self {
        Self::new("-target-download")
    }

    pub fn target_exec_status() -> Self {
        Self::new("-target-exec-status")
    }

    pub fn target_select(kind: &str, params: &[&str]) -> Self {
        Self::new("-target-select")
            .parameter(kind)
            .parameters(params.iter().copied())
    }

    pub fn gdb_exit() -> Self {
        Self::new("-gdb-exit")
    }
}

impl fmt::Display for MiCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Rendered without a token.
        let line = self.render(0);
        f.write_str(line.strip_prefix('0').unwrap_or(&line))
    }
}

/// Quote an argument as a C string when the MI argument splitter would
/// otherwise break it apart.
fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && !arg
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\\');
    if plain {
        return arg.to_string();
    }
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}

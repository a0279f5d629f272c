//! Console command table.
//!
//! Every command is an entry with its names, usage, positional-argument
//! bounds and a parser producing a typed [`Action`]. Input that matches
//! no entry is reported back, never interpreted.

use migdb_session::{BreakInsert, WatchId};
use thiserror::Error;

/// What a console line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Break(BreakInsert),
    Delete(Vec<u32>),
    Enable(Vec<u32>),
    Disable(Vec<u32>),
    Condition { number: u32, expression: String },
    Run,
    Continue,
    Step,
    Next,
    StepInstruction,
    NextInstruction,
    Until(Option<String>),
    Finish,
    Return,
    Interrupt,
    File { path: String, args: Vec<String> },
    Attach(u32),
    Detach,
    Frame(u32),
    /// Evaluate once, without a variable object.
    Print(String),
    Watch(String),
    Unwatch(WatchId),
    Watches,
    /// MI or CLI text passed through unchanged.
    Mi(String),
    /// A note written to the session log.
    Log(String),
    Help(Option<String>),
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: {0} (try `help`)")]
    Unknown(String),

    #[error("usage: {usage}")]
    Arity { usage: &'static str },

    #[error("{name}: {message}")]
    BadArgument { name: &'static str, message: String },
}

/// Arguments after the command name.
pub struct Args<'a> {
    name: &'static str,
    words: Vec<&'a str>,
    /// Everything after the command name, trimmed.
    rest: &'a str,
}

impl<'a> Args<'a> {
    fn word(&self, index: usize) -> Option<&'a str> {
        self.words.get(index).copied()
    }

    /// Text following the first `skip` words.
    fn rest_after(&self, skip: usize) -> &'a str {
        let mut rest = self.rest;
        for _ in 0..skip {
            rest = rest.trim_start();
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            rest = &rest[end..];
        }
        rest.trim()
    }

    fn number<T: std::str::FromStr>(&self, index: usize) -> Result<T, CommandError> {
        let word = self.word(index).unwrap_or_default();
        word.parse().map_err(|_| CommandError::BadArgument {
            name: self.name,
            message: format!("expected a number, got `{word}`"),
        })
    }

    fn numbers(&self) -> Result<Vec<u32>, CommandError> {
        (0..self.words.len()).map(|i| self.number(i)).collect()
    }
}

type Parse = fn(&Args<'_>) -> Result<Action, CommandError>;

pub struct CommandSpec {
    pub names: &'static [&'static str],
    pub usage: &'static str,
    pub summary: &'static str,
    pub min_args: usize,
    /// `None` for no upper bound.
    pub max_args: Option<usize>,
    parse: Parse,
}

impl CommandSpec {
    pub fn name(&self) -> &'static str {
        self.names[0]
    }

    fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }
}

macro_rules! fixed {
    ($action:expr) => {
        |_: &Args<'_>| Ok($action)
    };
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        names: &["b"],
        usage: "b LOCATION [CONDITION]",
        summary: "set a breakpoint, optionally conditional",
        min_args: 1,
        max_args: None,
        parse: |args| {
            let mut request = BreakInsert::at(args.words[0]);
            let condition = args.rest_after(1);
            if !condition.is_empty() {
                request = request.with_condition(condition);
            }
            Ok(Action::Break(request))
        },
    },
    CommandSpec {
        names: &["tb"],
        usage: "tb LOCATION",
        summary: "set a temporary breakpoint",
        min_args: 1,
        max_args: Some(1),
        parse: |args| Ok(Action::Break(BreakInsert::at(args.rest).temporary())),
    },
    CommandSpec {
        names: &["hb"],
        usage: "hb LOCATION",
        summary: "set a hardware breakpoint",
        min_args: 1,
        max_args: Some(1),
        parse: |args| Ok(Action::Break(BreakInsert::at(args.rest).hardware())),
    },
    CommandSpec {
        names: &["d"],
        usage: "d NUMBER...",
        summary: "delete breakpoints",
        min_args: 1,
        max_args: None,
        parse: |args| args.numbers().map(Action::Delete),
    },
    CommandSpec {
        names: &["en"],
        usage: "en NUMBER...",
        summary: "enable breakpoints",
        min_args: 1,
        max_args: None,
        parse: |args| args.numbers().map(Action::Enable),
    },
    CommandSpec {
        names: &["dis"],
        usage: "dis NUMBER...",
        summary: "disable breakpoints",
        min_args: 1,
        max_args: None,
        parse: |args| args.numbers().map(Action::Disable),
    },
    CommandSpec {
        names: &["cond"],
        usage: "cond NUMBER [EXPRESSION]",
        summary: "set or clear a breakpoint condition",
        min_args: 1,
        max_args: None,
        parse: |args| {
            Ok(Action::Condition {
                number: args.number(0)?,
                expression: args.rest_after(1).to_string(),
            })
        },
    },
    CommandSpec {
        names: &["r"],
        usage: "r",
        summary: "run the program",
        min_args: 0,
        max_args: Some(0),
        parse: fixed!(Action::Run),
    },
    CommandSpec {
        names: &["c"],
        usage: "c",
        summary: "continue",
        min_args: 0,
        max_args: Some(0),
        parse: fixed!(Action::Continue),
    },
    CommandSpec {
        names: &["s"],
        usage: "s",
        summary: "step into",
        min_args: 0,
        max_args: Some(0),
        parse: fixed!(Action::Step),
    },
    CommandSpec {
        names: &["n"],
        usage: "n",
        summary: "step over",
        min_args: 0,
        max_args: Some(0),
        parse: fixed!(Action::Next),
    },
    CommandSpec {
        names: &["si"],
        usage: "si",
        summary: "step one instruction",
        min_args: 0,
        max_args: Some(0),
        parse: fixed!(Action::StepInstruction),
    },
    CommandSpec {
        names: &["ni"],
        usage: "ni",
        summary: "step over one instruction",
        min_args: 0,
        max_args: Some(0),
        parse: fixed!(Action::NextInstruction),
    },
    CommandSpec {
        names: &["u"],
        usage: "u [LOCATION]",
        summary: "run until a location or the next line",
        min_args: 0,
        max_args: Some(1),
        parse: |args| Ok(Action::Until(args.word(0).map(str::to_string))),
    },
    CommandSpec {
        names: &["fin"],
        usage: "fin",
        summary: "run until the current function returns",
        min_args: 0,
        max_args: Some(0),
        parse: fixed!(Action::Finish),
    },
    CommandSpec {
        names: &["ret"],
        usage: "ret",
        summary: "return from the current function now",
        min_args: 0,
        max_args: Some(0),
        parse: fixed!(Action::Return),
    },
    CommandSpec {
        names: &["int"],
        usage: "int",
        summary: "interrupt the running program",
        min_args: 0,
        max_args: Some(0),
        parse: fixed!(Action::Interrupt),
    },
    CommandSpec {
        names: &["f", "file"],
        usage: "f PATH [ARGS...]",
        summary: "load a program and set its arguments",
        min_args: 1,
        max_args: None,
        parse: |args| {
            Ok(Action::File {
                path: args.words[0].to_string(),
                args: args.words[1..].iter().map(|w| w.to_string()).collect(),
            })
        },
    },
    CommandSpec {
        names: &["att"],
        usage: "att PID",
        summary: "attach to a process",
        min_args: 1,
        max_args: Some(1),
        parse: |args| args.number(0).map(Action::Attach),
    },
    CommandSpec {
        names: &["det"],
        usage: "det",
        summary: "detach from the process",
        min_args: 0,
        max_args: Some(0),
        parse: fixed!(Action::Detach),
    },
    CommandSpec {
        names: &["fr"],
        usage: "fr LEVEL",
        summary: "select a stack frame",
        min_args: 1,
        max_args: Some(1),
        parse: |args| args.number(0).map(Action::Frame),
    },
    CommandSpec {
        names: &["p", "print"],
        usage: "p EXPRESSION",
        summary: "print an expression once",
        min_args: 1,
        max_args: None,
        parse: |args| Ok(Action::Print(args.rest.to_string())),
    },
    CommandSpec {
        names: &["w"],
        usage: "w EXPRESSION",
        summary: "watch an expression",
        min_args: 1,
        max_args: None,
        parse: |args| Ok(Action::Watch(args.rest.to_string())),
    },
    CommandSpec {
        names: &["uw"],
        usage: "uw ID",
        summary: "remove a watch",
        min_args: 1,
        max_args: Some(1),
        parse: |args| args.number(0).map(Action::Unwatch),
    },
    CommandSpec {
        names: &["ws"],
        usage: "ws",
        summary: "list watches with their values",
        min_args: 0,
        max_args: Some(0),
        parse: fixed!(Action::Watches),
    },
    CommandSpec {
        names: &["mi"],
        usage: "mi TEXT",
        summary: "send MI or CLI text to the debugger",
        min_args: 1,
        max_args: None,
        parse: |args| Ok(Action::Mi(args.rest.to_string())),
    },
    CommandSpec {
        names: &["log"],
        usage: "log TEXT",
        summary: "write a note to the session log",
        min_args: 1,
        max_args: None,
        parse: |args| Ok(Action::Log(args.rest.to_string())),
    },
    CommandSpec {
        names: &["help"],
        usage: "help [COMMAND]",
        summary: "list commands or describe one",
        min_args: 0,
        max_args: Some(1),
        parse: |args| Ok(Action::Help(args.word(0).map(str::to_string))),
    },
    CommandSpec {
        names: &["q"],
        usage: "q",
        summary: "quit",
        min_args: 0,
        max_args: Some(0),
        parse: fixed!(Action::Quit),
    },
];

pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|entry| entry.names.contains(&name))
}

/// Parse one console line. Blank lines give `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<Action>, CommandError> {
    let line = line.trim();
    let Some(name) = line.split_whitespace().next() else {
        return Ok(None);
    };
    let entry = lookup(name).ok_or_else(|| CommandError::Unknown(name.to_string()))?;
    let rest = line[name.len()..].trim();
    let args = Args {
        name: entry.name(),
        words: rest.split_whitespace().collect(),
        rest,
    };
    if !entry.accepts(args.words.len()) {
        return Err(CommandError::Arity { usage: entry.usage });
    }
    (entry.parse)(&args).map(Some)
}

/// Command list, or the usage of one command.
pub fn help_text(name: Option<&str>) -> Result<String, CommandError> {
    match name {
        Some(name) => {
            let entry = lookup(name).ok_or_else(|| CommandError::Unknown(name.to_string()))?;
            Ok(format!("{}\n  {}", entry.usage, entry.summary))
        }
        None => {
            let width = COMMANDS.iter().map(|s| s.usage.len()).max().unwrap_or(0);
            Ok(COMMANDS
                .iter()
                .map(|s| format!("{:width$}  {}", s.usage, s.summary))
                .collect::<Vec<_>>()
                .join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Action {
        parse_line(line).unwrap().unwrap()
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<&str> = COMMANDS.iter().flat_map(|s| s.names.iter().copied()).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn every_command_is_listed_in_help() {
        let help = help_text(None).unwrap();
        for entry in COMMANDS {
            assert!(help.contains(entry.usage), "{} missing from help", entry.name());
        }
    }

    #[test]
    fn blank_line_is_nothing() {
        assert_eq!(parse_line("   "), Ok(None));
    }

    #[test]
    fn unknown_command_is_reported_not_run() {
        assert_eq!(
            parse_line("__import__('os').system('ls')"),
            Err(CommandError::Unknown("__import__('os').system('ls')".into()))
        );
        assert_eq!(parse_line("x 1"), Err(CommandError::Unknown("x".into())));
    }

    #[test]
    fn arity_is_checked() {
        assert_eq!(
            parse_line("b"),
            Err(CommandError::Arity {
                usage: "b LOCATION [CONDITION]"
            })
        );
        assert_eq!(parse_line("c now"), Err(CommandError::Arity { usage: "c" }));
        assert!(matches!(parse_line("fr 1 2"), Err(CommandError::Arity { .. })));
    }

    #[test]
    fn breakpoints() {
        assert_eq!(parse("b main.c:10"), Action::Break(BreakInsert::at("main.c:10")));
        assert_eq!(
            parse("b main.c:10 i > 3"),
            Action::Break(BreakInsert::at("main.c:10").with_condition("i > 3"))
        );
        assert_eq!(
            parse("tb foo"),
            Action::Break(BreakInsert::at("foo").temporary())
        );
        assert_eq!(parse("hb foo"), Action::Break(BreakInsert::at("foo").hardware()));
        assert_eq!(parse("d 1 2 3"), Action::Delete(vec![1, 2, 3]));
        assert_eq!(parse("en 4"), Action::Enable(vec![4]));
        assert_eq!(parse("dis 4"), Action::Disable(vec![4]));
    }

    #[test]
    fn bad_numbers_are_reported() {
        assert_eq!(
            parse_line("d 1 two"),
            Err(CommandError::BadArgument {
                name: "d",
                message: "expected a number, got `two`".into()
            })
        );
        assert!(matches!(
            parse_line("att -5"),
            Err(CommandError::BadArgument { name: "att", .. })
        ));
    }

    #[test]
    fn condition_keeps_whole_expression() {
        assert_eq!(
            parse("cond 2 a == b && c"),
            Action::Condition {
                number: 2,
                expression: "a == b && c".into()
            }
        );
        assert_eq!(
            parse("cond 2"),
            Action::Condition {
                number: 2,
                expression: String::new()
            }
        );
    }

    #[test]
    fn execution() {
        assert_eq!(parse("r"), Action::Run);
        assert_eq!(parse("c"), Action::Continue);
        assert_eq!(parse("s"), Action::Step);
        assert_eq!(parse("n"), Action::Next);
        assert_eq!(parse("si"), Action::StepInstruction);
        assert_eq!(parse("ni"), Action::NextInstruction);
        assert_eq!(parse("u"), Action::Until(None));
        assert_eq!(parse("u 42"), Action::Until(Some("42".into())));
        assert_eq!(parse("fin"), Action::Finish);
        assert_eq!(parse("ret"), Action::Return);
        assert_eq!(parse("int"), Action::Interrupt);
    }

    #[test]
    fn files_and_processes() {
        let expected = Action::File {
            path: "./a.out".into(),
            args: vec!["-v".into(), "input.txt".into()],
        };
        assert_eq!(parse("f ./a.out -v input.txt"), expected);
        assert_eq!(parse("file ./a.out -v input.txt"), expected);
        assert_eq!(parse("att 1234"), Action::Attach(1234));
        assert_eq!(parse("det"), Action::Detach);
        assert_eq!(parse("fr 2"), Action::Frame(2));
    }

    #[test]
    fn watches_and_passthrough() {
        assert_eq!(parse("w v[0] + 1"), Action::Watch("v[0] + 1".into()));
        assert_eq!(parse("print  *p"), Action::Print("*p".into()));
        assert_eq!(parse("p a + b"), Action::Print("a + b".into()));
        assert_eq!(parse("uw 3"), Action::Unwatch(3));
        assert_eq!(parse("ws"), Action::Watches);
        assert_eq!(
            parse("mi -stack-list-frames 0 3"),
            Action::Mi("-stack-list-frames 0 3".into())
        );
        assert_eq!(parse("log  about to crash"), Action::Log("about to crash".into()));
        assert_eq!(parse("help"), Action::Help(None));
        assert_eq!(parse("help b"), Action::Help(Some("b".into())));
        assert_eq!(parse("q"), Action::Quit);
    }

    #[test]
    fn help_for_one_command() {
        assert_eq!(
            help_text(Some("uw")).unwrap(),
            "uw ID\n  remove a watch"
        );
        assert!(help_text(Some("zz")).is_err());
    }
}

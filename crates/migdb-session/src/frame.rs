//! Stack frame description.

use migdb_mi::Fields;

/// The frame the debuggee is stopped in.
///
/// Replaced wholesale on every update, never merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub level: Option<u32>,
    pub address: Option<String>,
    pub function: Option<String>,
    /// Source file as given by the debugger.
    pub file: Option<String>,
    /// Absolute source path, when known.
    pub fullname: Option<String>,
    /// Line number (1-based).
    pub line: Option<u32>,
}

impl Frame {
    /// Build from a `frame={...}` tuple.
    ///
    /// Returns `None` for a tuple that names no location at all.
    pub fn from_fields(fields: &Fields) -> Option<Self> {
        let owned = |name: &str| fields.get_str(name).map(str::to_string);
        let frame = Self {
            level: fields.get_str("level").and_then(|l| l.parse().ok()),
            address: owned("addr"),
            function: owned("func"),
            file: owned("file"),
            fullname: owned("fullname"),
            line: fields.get_str("line").and_then(|l| l.parse().ok()),
        };
        let located = frame.address.is_some() || frame.function.is_some() || frame.file.is_some();
        located.then_some(frame)
    }

    /// Best path for opening the source: the full path if known.
    pub fn source_path(&self) -> Option<&str> {
        self.fullname.as_deref().or(self.file.as_deref())
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let function = self.function.as_deref().unwrap_or("??");
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{function} at {file}:{line}"),
            _ => match &self.address {
                Some(addr) => write!(f, "{function} ({addr})"),
                None => f.write_str(function),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use migdb_mi::{MiGrammar, Record};

    use super::*;

    fn frame_fields(line: &str) -> Fields {
        let Record::Async { fields, .. } = MiGrammar::new().parse_line(line).unwrap() else {
            panic!("expected async record");
        };
        fields.get_tuple("frame").unwrap().clone()
    }

    #[test]
    fn frame_from_stopped_record() {
        let fields = frame_fields(
            r#"*stopped,frame={addr="0x08048428",func="main",args=[],file="hello.c",fullname="/src/hello.c",line="16"}"#,
        );
        let frame = Frame::from_fields(&fields).unwrap();
        assert_eq!(frame.function.as_deref(), Some("main"));
        assert_eq!(frame.line, Some(16));
        assert_eq!(frame.source_path(), Some("/src/hello.c"));
        assert_eq!(frame.to_string(), "main at hello.c:16");
    }

    #[test]
    fn frame_without_debug_info() {
        let fields = frame_fields(r#"*stopped,frame={addr="0x0000dead",func="??"}"#);
        let frame = Frame::from_fields(&fields).unwrap();
        assert_eq!(frame.line, None);
        assert_eq!(frame.source_path(), None);
        assert_eq!(frame.to_string(), "?? (0x0000dead)");
    }

    #[test]
    fn frame_requires_a_location() {
        let fields = frame_fields(r#"*stopped,frame={level="0"}"#);
        assert!(Frame::from_fields(&fields).is_none());
    }
}

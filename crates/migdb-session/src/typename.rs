//! C++ type-name normalization.
//!
//! A simplified parser for the type strings GDB reports. It is only
//! precise enough to pick a decoder: cv-qualifiers, signedness and
//! elaborated-type keywords are dropped, pointer and reference markers are
//! kept, and template arguments are normalized recursively.

use std::fmt;
use std::sync::OnceLock;

use migdb_parser::{
    delimited_list, one_of, optional, parse_all, satisfy, word, zero_or_more, BoxedParser,
    Forward, Lexeme, Lexer, Parser,
};

const IDENT_CHARS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_";

const DROPPED_KEYWORDS: &[&str] = &[
    "const", "volatile", "signed", "unsigned", "struct", "class", "union", "enum",
];
const SIZE_KEYWORDS: &[&str] = &["short", "long"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeTok {
    Ident,
    Scope,
    Lt,
    Gt,
    Comma,
    Star,
    Amp,
}

/// One `::`-separated component, with template arguments if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeName {
    pub name: String,
    pub args: Option<Vec<CppType>>,
}

/// A parsed type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CppType {
    /// `short` / `long` specifiers, in source order.
    pub specifiers: Vec<String>,
    /// Qualified name; empty for types spelled with specifiers only.
    pub path: Vec<ScopeName>,
    /// Trailing `*` and `&` markers.
    pub declarators: Vec<char>,
}

impl CppType {
    /// Qualified name without template arguments, e.g. `std::vector`.
    pub fn base_name(&self) -> String {
        if self.path.is_empty() {
            return self.specifiers.join(" ");
        }
        let name = self
            .path
            .iter()
            .map(|scope| scope.name.as_str())
            .collect::<Vec<_>>()
            .join("::");
        if self.specifiers.is_empty() {
            name
        } else {
            format!("{} {}", self.specifiers.join(" "), name)
        }
    }

    /// Template arguments of the innermost scope.
    pub fn template_args(&self) -> &[CppType] {
        self.path
            .last()
            .and_then(|scope| scope.args.as_deref())
            .unwrap_or(&[])
    }

    pub fn is_pointer(&self) -> bool {
        self.declarators.last() == Some(&'*')
    }

    /// The same type with trailing references removed.
    pub fn without_reference(&self) -> CppType {
        let mut ty = self.clone();
        while ty.declarators.last() == Some(&'&') {
            ty.declarators.pop();
        }
        ty
    }

    /// The pointed-to type, if this is a pointer.
    pub fn pointee(&self) -> Option<CppType> {
        if !self.is_pointer() {
            return None;
        }
        let mut ty = self.clone();
        ty.declarators.pop();
        Some(ty)
    }
}

impl fmt::Display for ScopeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(args) = &self.args {
            let args: Vec<String> = args.iter().map(ToString::to_string).collect();
            // "> >" keeps nested arguments valid for pre-C++11 parsers
            if args.last().is_some_and(|a| a.ends_with('>')) {
                write!(f, "<{} >", args.join(", "))?;
            } else {
                write!(f, "<{}>", args.join(", "))?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for CppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.specifiers.clone();
        if !self.path.is_empty() {
            let path: Vec<String> = self.path.iter().map(ToString::to_string).collect();
            parts.push(path.join("::"));
        }
        if parts.is_empty() {
            parts.push("int".to_string());
        }
        f.write_str(&parts.join(" "))?;
        if !self.declarators.is_empty() {
            let markers: String = self.declarators.iter().collect();
            write!(f, " {markers}")?;
        }
        Ok(())
    }
}

struct TypeGrammar {
    lexer: Lexer<TypeTok>,
    ty: BoxedParser<Lexeme<TypeTok>, CppType>,
}

fn grammar() -> &'static TypeGrammar {
    static GRAMMAR: OnceLock<TypeGrammar> = OnceLock::new();
    GRAMMAR.get_or_init(|| TypeGrammar {
        lexer: type_lexer(),
        ty: type_parser(),
    })
}

fn type_lexer() -> Lexer<TypeTok> {
    Lexer::new()
        .literal(TypeTok::Scope, "::")
        .literal(TypeTok::Lt, "<")
        .literal(TypeTok::Gt, ">")
        .literal(TypeTok::Comma, ",")
        .literal(TypeTok::Star, "*")
        .literal(TypeTok::Amp, "&")
        .pattern(TypeTok::Ident, word(IDENT_CHARS))
        .skip(one_of(" \t"))
}

fn tok(kind: TypeTok) -> impl Parser<Lexeme<TypeTok>, Output = String> + Clone {
    satisfy(move |l: &Lexeme<TypeTok>| l.kind == kind).map(|l: Lexeme<TypeTok>| l.text)
}

fn ident_in(words: &'static [&'static str]) -> impl Parser<Lexeme<TypeTok>, Output = String> + Clone {
    satisfy(move |l: &Lexeme<TypeTok>| l.kind == TypeTok::Ident && words.contains(&l.text.as_str()))
        .map(|l: Lexeme<TypeTok>| l.text)
}

fn type_parser() -> BoxedParser<Lexeme<TypeTok>, CppType> {
    let ty: Forward<Lexeme<TypeTok>, CppType> = Forward::new();

    let name = satisfy(|l: &Lexeme<TypeTok>| {
        l.kind == TypeTok::Ident
            && !DROPPED_KEYWORDS.contains(&l.text.as_str())
            && !SIZE_KEYWORDS.contains(&l.text.as_str())
    })
    .map(|l: Lexeme<TypeTok>| l.text);

    let template_scope = name
        .clone()
        .then_skip(tok(TypeTok::Lt))
        .then(delimited_list(ty.clone(), tok(TypeTok::Comma)))
        .then_skip(tok(TypeTok::Gt))
        .map(|(name, args)| ScopeName {
            name,
            args: Some(args),
        });
    let plain_scope = name.map(|name| ScopeName { name, args: None });
    let scope = template_scope.or(plain_scope);
    let path = optional(tok(TypeTok::Scope)).skip_then(delimited_list(scope, tok(TypeTok::Scope)));

    // Dropped keywords yield None, size specifiers are kept.
    let prefix = zero_or_more(
        ident_in(DROPPED_KEYWORDS)
            .map(|_| None::<String>)
            .or(ident_in(SIZE_KEYWORDS).map(Some)),
    )
    .map(|words| words.into_iter().flatten().collect::<Vec<String>>());
    let qualifiers = zero_or_more(ident_in(DROPPED_KEYWORDS)).ignore();
    let marker = tok(TypeTok::Star)
        .or(tok(TypeTok::Amp))
        .then_skip(qualifiers.clone())
        .map(|text| text.chars().next().unwrap_or('*'));

    let full = prefix
        .then(optional(path))
        .then_skip(qualifiers)
        .then(zero_or_more(marker))
        .map(|((specifiers, path), declarators)| CppType {
            specifiers,
            path: path.unwrap_or_default(),
            declarators,
        });
    ty.define(full);
    ty.boxed()
}

/// Parse a type string. Returns `None` for anything outside the simplified
/// grammar (arrays, function pointers, anonymous namespaces).
pub fn parse_type(text: &str) -> Option<CppType> {
    let grammar = grammar();
    let lexemes = grammar.lexer.lex(text).ok()?;
    if lexemes.is_empty() {
        return None;
    }
    parse_all(&grammar.ty, lexemes)
}

/// Canonical spelling of a type string.
///
/// Falls back to the whitespace-collapsed input when it cannot be parsed.
pub fn normalize_type(text: &str) -> String {
    match parse_type(text) {
        Some(ty) => ty.to_string(),
        None => text.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_qualifiers() {
        assert_eq!(normalize_type("const int"), "int");
        assert_eq!(normalize_type("unsigned int"), "int");
        assert_eq!(normalize_type("volatile unsigned long"), "long");
        assert_eq!(normalize_type("const char *"), "char *");
        assert_eq!(normalize_type("char const * const"), "char *");
        assert_eq!(normalize_type("struct point *"), "point *");
    }

    #[test]
    fn normalize_keeps_pointer_and_reference_markers() {
        assert_eq!(normalize_type("int**"), "int **");
        assert_eq!(normalize_type("const std::string &"), "std::string &");
    }

    #[test]
    fn normalize_template_arguments_recursively() {
        assert_eq!(
            normalize_type("std::vector<const int, std::allocator<const int> >"),
            "std::vector<int, std::allocator<int> >"
        );
        assert_eq!(
            normalize_type("std::map<int,std::pair<int,char>>"),
            "std::map<int, std::pair<int, char> >"
        );
    }

    #[test]
    fn normalize_falls_back_on_unparsed_input() {
        assert_eq!(normalize_type("int  [3]"), "int [3]");
        assert_eq!(normalize_type("void (*)(int)"), "void (*)(int)");
        assert_eq!(parse_type(""), None);
    }

    #[test]
    fn keyword_prefixes_are_not_split() {
        assert_eq!(normalize_type("constant_t"), "constant_t");
        assert_eq!(normalize_type("long_name"), "long_name");
    }

    #[test]
    fn parse_exposes_structure() {
        let ty = parse_type("std::map<int, std::basic_string<char> >").unwrap();
        assert_eq!(ty.base_name(), "std::map");
        let args = ty.template_args();
        assert_eq!(args.len(), 2);
        assert_eq!(args[1].base_name(), "std::basic_string");
        assert!(!ty.is_pointer());

        let ptr = parse_type("int *").unwrap();
        assert!(ptr.is_pointer());
        assert_eq!(ptr.pointee().unwrap().to_string(), "int");

        let reference = parse_type("std::string &").unwrap();
        assert!(!reference.is_pointer());
        assert_eq!(reference.without_reference().to_string(), "std::string");
    }

    #[test]
    fn leading_scope_operator() {
        assert_eq!(normalize_type("::std::string"), "std::string");
    }

    #[test]
    fn specifier_only_types() {
        let ty = parse_type("unsigned long long").unwrap();
        assert_eq!(ty.base_name(), "long long");
        assert_eq!(ty.to_string(), "long long");
        assert_eq!(parse_type("unsigned").unwrap().to_string(), "int");
    }
}

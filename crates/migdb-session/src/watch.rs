//! Typed watches: type-directed decoding of variable objects into native
//! values.
//!
//! A watch is built once, at registration, from the normalized type of its
//! expression. Container decoders depend on derived variable objects
//! (synthesized expressions such as `(v)._M_impl._M_start[0]@3`); decoding
//! only reads cached values from the [`VarTable`] and never talks to the
//! debugger.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::typename::{parse_type, CppType};
use crate::varobj::VarTable;

/// Identifier of a registered watch.
pub type WatchId = u64;

/// A decoded debuggee value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeValue {
    Int(i64),
    /// An unsigned value above `i64::MAX`.
    UInt(u64),
    Char(char),
    Str(String),
    Pair(Box<NativeValue>, Box<NativeValue>),
    List(Vec<NativeValue>),
    Map(Vec<(NativeValue, NativeValue)>),
    Pointer { address: u64, pointee: String },
    /// The raw value string, uninterpreted.
    Opaque(String),
    /// Out of scope or not fetched yet.
    Unavailable,
}

impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeValue::Int(n) => write!(f, "{n}"),
            NativeValue::UInt(n) => write!(f, "{n}"),
            NativeValue::Char(c) => write!(f, "{c:?}"),
            NativeValue::Str(s) => write!(f, "{s:?}"),
            NativeValue::Pair(first, second) => write!(f, "({first}, {second})"),
            NativeValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            NativeValue::Map(entries) => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            NativeValue::Pointer { address, pointee } => write!(f, "({pointee} *) {address:#x}"),
            NativeValue::Opaque(raw) => f.write_str(raw),
            NativeValue::Unavailable => f.write_str("<unavailable>"),
        }
    }
}

/// Decoder family chosen for a normalized type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeClass {
    Int,
    Char,
    /// `char *`, decoded from its own printed value.
    CString,
    /// `std::string` and its spellings.
    Str,
    Pair,
    Vector,
    /// Key and value types, needed to spell the tree-node cast.
    Map { key: CppType, value: CppType },
    Pointer { pointee: String },
    Opaque,
}

type Predicate = fn(&CppType) -> bool;
type Constructor = fn(&CppType) -> TypeClass;

/// Dispatch rules, first match wins.
const RULES: &[(Predicate, Constructor)] = &[
    (is_integral, int_class),
    (is_char, char_class),
    (is_c_string, c_string_class),
    (is_std_string, string_class),
    (is_pair, pair_class),
    (is_vector, vector_class),
    (is_map, map_class),
    (CppType::is_pointer, pointer_class),
];

const INTEGRAL_NAMES: &[&str] = &[
    "int", "size_t", "ssize_t", "ptrdiff_t", "intptr_t", "uintptr_t", "int8_t", "int16_t",
    "int32_t", "int64_t", "uint8_t", "uint16_t", "uint32_t", "uint64_t",
];

const STRING_NAMES: &[&str] = &[
    "std::string",
    "std::basic_string",
    "std::__cxx11::basic_string",
    "std::__cxx11::string",
];

fn is_integral(ty: &CppType) -> bool {
    if !ty.declarators.is_empty() {
        return false;
    }
    match ty.path.as_slice() {
        [] => true,
        [scope] => scope.args.is_none() && INTEGRAL_NAMES.contains(&scope.name.as_str()),
        _ => false,
    }
}

fn is_char(ty: &CppType) -> bool {
    ty.declarators.is_empty() && ty.specifiers.is_empty() && ty.base_name() == "char"
}

fn is_c_string(ty: &CppType) -> bool {
    ty.declarators == ['*'] && ty.pointee().is_some_and(|p| is_char(&p))
}

fn is_std_string(ty: &CppType) -> bool {
    ty.declarators.is_empty() && STRING_NAMES.contains(&ty.base_name().as_str())
}

fn is_pair(ty: &CppType) -> bool {
    ty.declarators.is_empty() && ty.base_name() == "std::pair" && ty.template_args().len() == 2
}

fn is_vector(ty: &CppType) -> bool {
    ty.declarators.is_empty() && ty.base_name() == "std::vector"
}

fn is_map(ty: &CppType) -> bool {
    ty.declarators.is_empty() && ty.base_name() == "std::map" && ty.template_args().len() >= 2
}

fn int_class(_: &CppType) -> TypeClass {
    TypeClass::Int
}

fn char_class(_: &CppType) -> TypeClass {
    TypeClass::Char
}

fn c_string_class(_: &CppType) -> TypeClass {
    TypeClass::CString
}

fn string_class(_: &CppType) -> TypeClass {
    TypeClass::Str
}

fn pair_class(_: &CppType) -> TypeClass {
    TypeClass::Pair
}

fn vector_class(_: &CppType) -> TypeClass {
    TypeClass::Vector
}

fn map_class(ty: &CppType) -> TypeClass {
    let args = ty.template_args();
    TypeClass::Map {
        key: args[0].clone(),
        value: args[1].clone(),
    }
}

fn pointer_class(ty: &CppType) -> TypeClass {
    TypeClass::Pointer {
        pointee: ty.pointee().map(|p| p.to_string()).unwrap_or_default(),
    }
}

/// Pick the decoder family for a type string as reported by the debugger.
pub fn classify(type_name: &str) -> TypeClass {
    let Some(ty) = parse_type(type_name) else {
        return TypeClass::Opaque;
    };
    let ty = ty.without_reference();
    RULES
        .iter()
        .find(|(matches, _)| matches(&ty))
        .map(|(_, build)| build(&ty))
        .unwrap_or(TypeClass::Opaque)
}

// Derived expressions. `base` is the full expression of the watched value.

pub fn vector_length_expr(base: &str) -> String {
    format!("({base})._M_impl._M_finish - ({base})._M_impl._M_start")
}

pub fn vector_array_expr(base: &str, length: usize) -> String {
    format!("({base})._M_impl._M_start[0]@{length}")
}

pub fn string_chars_expr(base: &str) -> String {
    format!("({base})._M_dataplus._M_p")
}

pub fn pair_member_expr(base: &str, member: &str) -> String {
    format!("({base}).{member}")
}

pub fn map_count_expr(base: &str) -> String {
    format!("({base})._M_t._M_impl._M_node_count")
}

pub fn map_root_expr(base: &str) -> String {
    format!("({base})._M_t._M_impl._M_header._M_parent")
}

/// Left or right child pointer of a tree node.
pub fn tree_child_expr(address: u64, side: &str) -> String {
    format!("((std::_Rb_tree_node_base *){address:#x})->_M_{side}")
}

/// `first` or `second` of the pair stored in a map node.
pub fn map_node_member_expr(address: u64, key: &CppType, value: &CppType, member: &str) -> String {
    let payload = format!("std::pair<const {key}, {value}>");
    let node = format!("std::_Rb_tree_node<{payload} >");
    format!("(*({payload} *)&(({node} *){address:#x})->_M_storage).{member}")
}

/// A node of a decoded map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapNode {
    pub address: u64,
    pub key: TypedWatch,
    pub value: TypedWatch,
}

/// Decoder together with the variable objects it reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoder {
    Int,
    Char,
    CString,
    Str {
        /// Variable object of the character pointer.
        chars: String,
    },
    Pair {
        first: Box<TypedWatch>,
        second: Box<TypedWatch>,
    },
    Vector {
        /// Variable object holding the element count.
        length: String,
        /// Array variable object; `None` while the vector is empty.
        array: Option<String>,
        elements: Vec<TypedWatch>,
    },
    Map {
        /// Variable object holding the node count.
        count: String,
        /// Variable objects of the root pointer and of every child pointer
        /// followed during the walk, null ones included.
        links: Vec<String>,
        nodes: Vec<MapNode>,
    },
    Pointer {
        pointee: String,
    },
    Opaque,
}

impl Decoder {
    /// Root variable objects this decoder reads, excluding the watched
    /// object itself.
    pub fn derived_roots(&self) -> Vec<String> {
        let mut roots = Vec::new();
        match self {
            Decoder::Str { chars } => roots.push(chars.clone()),
            Decoder::Pair { first, second } => {
                for member in [first, second] {
                    roots.push(member.var.clone());
                    roots.extend(member.derived_roots());
                }
            }
            Decoder::Vector {
                length,
                array,
                elements,
            } => {
                roots.push(length.clone());
                roots.extend(array.iter().cloned());
                // elements are children of the array
                for element in elements {
                    roots.extend(element.derived_roots());
                }
            }
            Decoder::Map {
                count,
                links,
                nodes,
            } => {
                roots.push(count.clone());
                roots.extend(links.iter().cloned());
                for node in nodes {
                    for member in [&node.key, &node.value] {
                        roots.push(member.var.clone());
                        roots.extend(member.derived_roots());
                    }
                }
            }
            _ => {}
        }
        roots
    }
}

/// A variable object with a type-directed decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedWatch {
    /// Variable object of the watched value itself.
    pub var: String,
    /// Full expression of the watched value.
    pub expression: String,
    pub decoder: Decoder,
}

impl TypedWatch {
    pub fn new(var: impl Into<String>, expression: impl Into<String>, decoder: Decoder) -> Self {
        Self {
            var: var.into(),
            expression: expression.into(),
            decoder,
        }
    }

    /// Every variable object this watch reads, its own included.
    pub fn vars(&self) -> Vec<String> {
        let mut vars = vec![self.var.clone()];
        match &self.decoder {
            Decoder::Str { chars } => vars.push(chars.clone()),
            Decoder::Pair { first, second } => {
                vars.extend(first.vars());
                vars.extend(second.vars());
            }
            Decoder::Vector {
                length,
                array,
                elements,
            } => {
                vars.push(length.clone());
                vars.extend(array.iter().cloned());
                for element in elements {
                    vars.extend(element.vars());
                }
            }
            Decoder::Map {
                count,
                links,
                nodes,
            } => {
                vars.push(count.clone());
                vars.extend(links.iter().cloned());
                for node in nodes {
                    vars.extend(node.key.vars());
                    vars.extend(node.value.vars());
                }
            }
            _ => {}
        }
        vars
    }

    /// Root variable objects created on behalf of this watch. They are
    /// deleted when the watch is removed.
    pub fn derived_roots(&self) -> Vec<String> {
        self.decoder.derived_roots()
    }

    /// Variables whose change invalidates the derived structure: vector
    /// lengths, map node counts and tree links.
    pub fn structural_vars(&self) -> Vec<String> {
        match &self.decoder {
            Decoder::Pair { first, second } => {
                let mut vars = first.structural_vars();
                vars.extend(second.structural_vars());
                vars
            }
            Decoder::Vector {
                length, elements, ..
            } => {
                let mut vars = vec![length.clone()];
                for element in elements {
                    vars.extend(element.structural_vars());
                }
                vars
            }
            Decoder::Map {
                count,
                links,
                nodes,
            } => {
                let mut vars = vec![count.clone()];
                vars.extend(links.iter().cloned());
                for node in nodes {
                    vars.extend(node.key.structural_vars());
                    vars.extend(node.value.structural_vars());
                }
                vars
            }
            _ => Vec::new(),
        }
    }

    /// Decode from the currently cached values.
    pub fn decode(&self, vars: &VarTable) -> NativeValue {
        let Some(var) = vars.get(&self.var) else {
            return NativeValue::Unavailable;
        };
        if !var.in_scope {
            return NativeValue::Unavailable;
        }
        let value = var.value.as_deref();
        match &self.decoder {
            Decoder::Int => decode_with(value, |v| {
                parse_int(v)
                    .map(NativeValue::Int)
                    .or_else(|| parse_uint(v).map(NativeValue::UInt))
            }),
            Decoder::Char => decode_with(value, parse_char),
            Decoder::CString => decode_with(value, |v| quoted(v).map(NativeValue::Str)),
            Decoder::Str { chars } => {
                let chars = vars.get(chars).and_then(|c| c.value.as_deref());
                match chars {
                    Some(text) => match quoted(text) {
                        Some(s) => NativeValue::Str(s),
                        None => NativeValue::Opaque(text.to_string()),
                    },
                    None => NativeValue::Unavailable,
                }
            }
            Decoder::Pair { first, second } => NativeValue::Pair(
                Box::new(first.decode(vars)),
                Box::new(second.decode(vars)),
            ),
            Decoder::Vector {
                length, elements, ..
            } => {
                let len = count_of(vars, length);
                NativeValue::List(
                    elements
                        .iter()
                        .take(len)
                        .map(|element| element.decode(vars))
                        .collect(),
                )
            }
            Decoder::Map { nodes, .. } => NativeValue::Map(
                nodes
                    .iter()
                    .map(|node| (node.key.decode(vars), node.value.decode(vars)))
                    .collect(),
            ),
            Decoder::Pointer { pointee } => {
                decode_with(value, |v| parse_pointer(v, pointee))
            }
            Decoder::Opaque => match value {
                Some(v) => NativeValue::Opaque(v.to_string()),
                None => NativeValue::Unavailable,
            },
        }
    }
}

/// Apply `parse`, falling back to the raw string.
fn decode_with(value: Option<&str>, parse: impl FnOnce(&str) -> Option<NativeValue>) -> NativeValue {
    match value {
        Some(v) => parse(v).unwrap_or_else(|| NativeValue::Opaque(v.to_string())),
        None => NativeValue::Unavailable,
    }
}

/// Element count held by a length variable. Negative, missing or
/// unparseable counts read as zero.
pub fn count_of(vars: &VarTable, name: &str) -> usize {
    vars.get(name)
        .and_then(|v| v.value.as_deref())
        .and_then(parse_int)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}

/// Leading integer of a printed value: `42`, `-7`, `0x1f`, `97 'a'`.
pub fn parse_int(value: &str) -> Option<i64> {
    let head = value.split_whitespace().next()?;
    if let Some(hex) = head.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16).ok();
    }
    head.parse().ok()
}

/// Leading unsigned integer, for values that overflow `i64`.
pub fn parse_uint(value: &str) -> Option<u64> {
    let head = value.split_whitespace().next()?;
    match head.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => head.parse().ok(),
    }
}

fn parse_char(value: &str) -> Option<NativeValue> {
    let code = parse_int(value)?;
    // chars print signed, e.g. -61 '\303'
    let code = if code < 0 { code + 256 } else { code };
    let code = u32::try_from(code).ok()?;
    char::from_u32(code).map(NativeValue::Char)
}

/// Text between the first and last double quote, C escapes undone.
fn quoted(value: &str) -> Option<String> {
    let start = value.find('"')?;
    let end = value.rfind('"')?;
    (end > start).then(|| unescape(&value[start + 1..end]))
}

/// Undo the escapes the debugger prints inside string values: `\"`,
/// `\\`, the usual control letters and octal bytes such as `\303`.
fn unescape(text: &str) -> String {
    let mut bytes = Vec::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut utf8 = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => bytes.push(b'\n'),
            Some('t') => bytes.push(b'\t'),
            Some('r') => bytes.push(b'\r'),
            Some('a') => bytes.push(0x07),
            Some('b') => bytes.push(0x08),
            Some('f') => bytes.push(0x0c),
            Some('v') => bytes.push(0x0b),
            Some('e') => bytes.push(0x1b),
            Some(digit @ '0'..='7') => {
                let mut code = digit as u32 - '0' as u32;
                for _ in 0..2 {
                    match chars.peek() {
                        Some(&next @ '0'..='7') => {
                            code = code * 8 + (next as u32 - '0' as u32);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                bytes.push((code & 0xff) as u8);
            }
            Some(other) => {
                let mut utf8 = [0u8; 4];
                bytes.extend_from_slice(other.encode_utf8(&mut utf8).as_bytes());
            }
            None => bytes.push(b'\\'),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn pointer_regexes() -> &'static (Regex, Regex) {
    static REGEXES: OnceLock<(Regex, Regex)> = OnceLock::new();
    REGEXES.get_or_init(|| {
        (
            Regex::new(r"0x([0-9a-fA-F]+)").expect("address regex is valid"),
            Regex::new(r"^\(([^)]*)\)").expect("cast regex is valid"),
        )
    })
}

/// First hexadecimal address in a printed value.
pub fn parse_address(value: &str) -> Option<u64> {
    let (address_re, _) = pointer_regexes();
    let digits = address_re.captures(value)?.get(1)?.as_str();
    u64::from_str_radix(digits, 16).ok()
}

/// Address and pointee type from a printed pointer such as
/// `(point *) 0x602010` or `0x4005d4 <main>`. A null pointer prints as
/// `0x0`.
fn parse_pointer(value: &str, fallback: &str) -> Option<NativeValue> {
    let (_, cast_re) = pointer_regexes();
    let address = parse_address(value)?;
    let pointee = cast_re
        .captures(value.trim_start())
        .and_then(|caps| caps.get(1))
        .map(|cast| cast.as_str().trim().trim_end_matches('*').trim_end().to_string())
        .unwrap_or_else(|| fallback.to_string());
    Some(NativeValue::Pointer { address, pointee })
}

/// Registered watches by id.
#[derive(Debug, Clone, Default)]
pub struct WatchRegistry {
    watches: BTreeMap<WatchId, TypedWatch>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: WatchId, watch: TypedWatch) -> Option<TypedWatch> {
        self.watches.insert(id, watch)
    }

    pub fn remove(&mut self, id: WatchId) -> Option<TypedWatch> {
        self.watches.remove(&id)
    }

    pub fn get(&self, id: WatchId) -> Option<&TypedWatch> {
        self.watches.get(&id)
    }

    /// Ids of watches reading any of `changed`.
    pub fn affected_by(&self, changed: &HashSet<String>) -> Vec<WatchId> {
        self.watches
            .iter()
            .filter(|(_, watch)| watch.vars().iter().any(|v| changed.contains(v)))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Ids of watches whose structure must be rebuilt after `changed`.
    pub fn restructured_by(&self, changed: &HashSet<String>) -> Vec<WatchId> {
        self.watches
            .iter()
            .filter(|(_, watch)| watch.structural_vars().iter().any(|v| changed.contains(v)))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn ids(&self) -> Vec<WatchId> {
        self.watches.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::varobj::VarObject;

    fn table(entries: &[(&str, &str)]) -> VarTable {
        let mut table = VarTable::new();
        for (name, value) in entries {
            table.insert(VarObject {
                name: name.to_string(),
                expression: name.to_string(),
                type_name: None,
                value: Some(value.to_string()),
                num_children: 0,
                in_scope: true,
                children: None,
                path_expression: None,
            });
        }
        table
    }

    fn leaf(var: &str, decoder: Decoder) -> TypedWatch {
        TypedWatch::new(var, var, decoder)
    }

    #[test]
    fn native_value_display() {
        let value = NativeValue::Map(vec![
            (
                NativeValue::Str("a\"b".into()),
                NativeValue::List(vec![NativeValue::Int(1), NativeValue::Char('x')]),
            ),
            (
                NativeValue::Str("p".into()),
                NativeValue::Pair(
                    Box::new(NativeValue::Pointer {
                        address: 0x602010,
                        pointee: "point".into(),
                    }),
                    Box::new(NativeValue::Unavailable),
                ),
            ),
        ]);
        assert_eq!(
            value.to_string(),
            r#"{"a\"b": [1, 'x'], "p": ((point *) 0x602010, <unavailable>)}"#
        );
    }

    #[test]
    fn classify_precedence() {
        assert_eq!(classify("int"), TypeClass::Int);
        assert_eq!(classify("const unsigned long"), TypeClass::Int);
        assert_eq!(classify("size_t"), TypeClass::Int);
        assert_eq!(classify("char"), TypeClass::Char);
        assert_eq!(classify("const char *"), TypeClass::CString);
        assert_eq!(classify("std::string"), TypeClass::Str);
        assert_eq!(
            classify("std::__cxx11::basic_string<char, std::char_traits<char>, std::allocator<char> >"),
            TypeClass::Str
        );
        assert_eq!(classify("const std::string &"), TypeClass::Str);
        assert_eq!(classify("std::pair<int, char>"), TypeClass::Pair);
        assert_eq!(
            classify("std::vector<int, std::allocator<int> >"),
            TypeClass::Vector
        );
        assert_eq!(
            classify("point *"),
            TypeClass::Pointer {
                pointee: "point".into()
            }
        );
        assert_eq!(classify("point"), TypeClass::Opaque);
        assert_eq!(classify("int [3]"), TypeClass::Opaque);
    }

    #[test]
    fn classify_map_keeps_argument_types() {
        match classify("std::map<int, std::basic_string<char>, std::less<int> >") {
            TypeClass::Map { key, value } => {
                assert_eq!(key.to_string(), "int");
                assert_eq!(value.to_string(), "std::basic_string<char>");
            }
            other => panic!("expected map, got {other:?}"),
        }
    }

    #[test]
    fn derived_expressions() {
        assert_eq!(
            vector_length_expr("v"),
            "(v)._M_impl._M_finish - (v)._M_impl._M_start"
        );
        assert_eq!(vector_array_expr("v", 3), "(v)._M_impl._M_start[0]@3");
        assert_eq!(string_chars_expr("s"), "(s)._M_dataplus._M_p");
        assert_eq!(pair_member_expr("p", "first"), "(p).first");
        assert_eq!(
            tree_child_expr(0x602010, "left"),
            "((std::_Rb_tree_node_base *)0x602010)->_M_left"
        );
        let int = parse_type("int").unwrap();
        assert_eq!(
            map_node_member_expr(0x10, &int, &int, "first"),
            "(*(std::pair<const int, int> *)&((std::_Rb_tree_node<std::pair<const int, int> > *)0x10)->_M_storage).first"
        );
    }

    #[test]
    fn decode_vector_in_order() {
        let vars = table(&[
            ("var1", "{...}"),
            ("var2", "3"),
            ("var3", "[3]"),
            ("var3.0", "1"),
            ("var3.1", "2"),
            ("var3.2", "3"),
        ]);
        let watch = TypedWatch::new(
            "var1",
            "v",
            Decoder::Vector {
                length: "var2".into(),
                array: Some("var3".into()),
                elements: vec![
                    leaf("var3.0", Decoder::Int),
                    leaf("var3.1", Decoder::Int),
                    leaf("var3.2", Decoder::Int),
                ],
            },
        );
        assert_eq!(
            watch.decode(&vars),
            NativeValue::List(vec![
                NativeValue::Int(1),
                NativeValue::Int(2),
                NativeValue::Int(3)
            ])
        );
        assert_eq!(watch.derived_roots(), vec!["var2", "var3"]);
        assert_eq!(watch.structural_vars(), vec!["var2"]);
    }

    #[test]
    fn decode_vector_with_bad_length_is_empty() {
        for length in ["-4", "<error>"] {
            let vars = table(&[("var1", "{...}"), ("var2", length)]);
            let watch = TypedWatch::new(
                "var1",
                "v",
                Decoder::Vector {
                    length: "var2".into(),
                    array: None,
                    elements: Vec::new(),
                },
            );
            assert_eq!(watch.decode(&vars), NativeValue::List(Vec::new()));
        }
    }

    #[test]
    fn decode_string_from_char_pointer() {
        let vars = table(&[("var1", "{...}"), ("var2", r#"0x602010 "hello""#)]);
        let watch = TypedWatch::new(
            "var1",
            "s",
            Decoder::Str {
                chars: "var2".into(),
            },
        );
        assert_eq!(watch.decode(&vars), NativeValue::Str("hello".into()));
    }

    #[test]
    fn decode_empty_map() {
        let vars = table(&[("var1", "std::map with 0 elements"), ("var2", "0")]);
        let watch = TypedWatch::new(
            "var1",
            "m",
            Decoder::Map {
                count: "var2".into(),
                links: vec!["var3".into()],
                nodes: Vec::new(),
            },
        );
        assert_eq!(watch.decode(&vars), NativeValue::Map(Vec::new()));
        assert_eq!(watch.derived_roots(), vec!["var2", "var3"]);
        assert_eq!(watch.structural_vars(), vec!["var2", "var3"]);
    }

    #[test]
    fn decode_pair_and_scalars() {
        let vars = table(&[
            ("var1", "{...}"),
            ("var2", "7"),
            ("var3", "97 'a'"),
            ("var4", r#"0x4005d4 "text""#),
        ]);
        let watch = TypedWatch::new(
            "var1",
            "p",
            Decoder::Pair {
                first: Box::new(leaf("var2", Decoder::Int)),
                second: Box::new(leaf("var3", Decoder::Char)),
            },
        );
        assert_eq!(
            watch.decode(&vars),
            NativeValue::Pair(
                Box::new(NativeValue::Int(7)),
                Box::new(NativeValue::Char('a'))
            )
        );
        assert_eq!(
            leaf("var4", Decoder::CString).decode(&vars),
            NativeValue::Str("text".into())
        );
    }

    #[test]
    fn decode_escaped_strings() {
        let vars = table(&[
            ("var1", r#"0x602010 "say \"hi\" \\ caf\303\251\n""#),
            ("var2", r#"0x602020 "tab\there""#),
        ]);
        assert_eq!(
            leaf("var1", Decoder::CString).decode(&vars),
            NativeValue::Str("say \"hi\" \\ café\n".into())
        );
        assert_eq!(
            leaf("var2", Decoder::CString).decode(&vars),
            NativeValue::Str("tab\there".into())
        );
    }

    #[test]
    fn decode_unsigned_beyond_i64() {
        let vars = table(&[
            ("var1", "18446744073709551615"),
            ("var2", "0xffffffffffffffff"),
            ("var3", "-5"),
        ]);
        assert_eq!(
            leaf("var1", Decoder::Int).decode(&vars),
            NativeValue::UInt(u64::MAX)
        );
        assert_eq!(
            leaf("var2", Decoder::Int).decode(&vars),
            NativeValue::UInt(u64::MAX)
        );
        assert_eq!(leaf("var3", Decoder::Int).decode(&vars), NativeValue::Int(-5));
        assert_eq!(NativeValue::UInt(u64::MAX).to_string(), "18446744073709551615");
    }

    #[test]
    fn decode_pointer_forms() {
        let vars = table(&[("var1", "(point *) 0x602010"), ("var2", "0x0")]);
        assert_eq!(
            leaf(
                "var1",
                Decoder::Pointer {
                    pointee: "ignored".into()
                }
            )
            .decode(&vars),
            NativeValue::Pointer {
                address: 0x602010,
                pointee: "point".into()
            }
        );
        assert_eq!(
            leaf(
                "var2",
                Decoder::Pointer {
                    pointee: "int".into()
                }
            )
            .decode(&vars),
            NativeValue::Pointer {
                address: 0,
                pointee: "int".into()
            }
        );
    }

    #[test]
    fn decode_degrades_to_opaque_or_unavailable() {
        let mut vars = table(&[("var1", "<optimized out>")]);
        assert_eq!(
            leaf("var1", Decoder::Int).decode(&vars),
            NativeValue::Opaque("<optimized out>".into())
        );
        assert_eq!(
            leaf("missing", Decoder::Int).decode(&vars),
            NativeValue::Unavailable
        );
        vars.get_mut("var1").unwrap().in_scope = false;
        assert_eq!(
            leaf("var1", Decoder::Opaque).decode(&vars),
            NativeValue::Unavailable
        );
    }

    #[test]
    fn parse_int_forms() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("-7"), Some(-7));
        assert_eq!(parse_int("0x1f"), Some(31));
        assert_eq!(parse_int("97 'a'"), Some(97));
        assert_eq!(parse_int("{...}"), None);
        assert_eq!(parse_int(""), None);
    }

    #[test]
    fn registry_affected_and_restructured() {
        let mut registry = WatchRegistry::new();
        registry.insert(1, leaf("var1", Decoder::Int));
        registry.insert(
            2,
            TypedWatch::new(
                "var2",
                "v",
                Decoder::Vector {
                    length: "var3".into(),
                    array: Some("var4".into()),
                    elements: vec![leaf("var4.0", Decoder::Int)],
                },
            ),
        );

        let changed: HashSet<String> = ["var4.0".to_string()].into_iter().collect();
        assert_eq!(registry.affected_by(&changed), vec![2]);
        assert!(registry.restructured_by(&changed).is_empty());

        let changed: HashSet<String> = ["var3".to_string(), "var1".to_string()].into_iter().collect();
        assert_eq!(registry.affected_by(&changed), vec![1, 2]);
        assert_eq!(registry.restructured_by(&changed), vec![2]);

        assert!(registry.remove(1).is_some());
        assert_eq!(registry.ids(), vec![2]);
    }
}

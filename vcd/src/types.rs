//! The parsed document: header declarations plus the flat list of
//! simulation commands.

use std::{collections::HashMap, fmt};

use derive_more::{From, Into};
use num_derive::FromPrimitive;
use typed_index_collections::TiVec;

use crate::{error::ParseError, value::Value};

#[derive(From, Into, Debug, Default, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScopeId(pub usize);

/// The root scope is always the first one.
pub const ROOT_SCOPE: ScopeId = ScopeId(0);

#[derive(FromPrimitive, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TimescaleMagnitude {
    One = 1,
    Ten = 10,
    Hundred = 100,
}

impl TimescaleMagnitude {
    pub fn value(self) -> u32 {
        self as u32
    }

    fn power(self) -> i8 {
        match self {
            TimescaleMagnitude::One => 0,
            TimescaleMagnitude::Ten => 1,
            TimescaleMagnitude::Hundred => 2,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TimescaleUnit {
    S,
    Ms,
    Us,
    Ns,
    Ps,
    Fs,
}

impl TimescaleUnit {
    pub fn from_bytes(name: &[u8]) -> Option<Self> {
        Some(match name {
            b"s" => TimescaleUnit::S,
            b"ms" => TimescaleUnit::Ms,
            b"us" => TimescaleUnit::Us,
            b"ns" => TimescaleUnit::Ns,
            b"ps" => TimescaleUnit::Ps,
            b"fs" => TimescaleUnit::Fs,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimescaleUnit::S => "s",
            TimescaleUnit::Ms => "ms",
            TimescaleUnit::Us => "us",
            TimescaleUnit::Ns => "ns",
            TimescaleUnit::Ps => "ps",
            TimescaleUnit::Fs => "fs",
        }
    }

    /// Power of ten of one unit in seconds.
    pub fn power(self) -> i8 {
        match self {
            TimescaleUnit::S => 0,
            TimescaleUnit::Ms => -3,
            TimescaleUnit::Us => -6,
            TimescaleUnit::Ns => -9,
            TimescaleUnit::Ps => -12,
            TimescaleUnit::Fs => -15,
        }
    }
}

/// How long one tick is, e.g. `10 ns`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Timescale {
    pub magnitude: TimescaleMagnitude,
    pub unit: TimescaleUnit,
}

impl Timescale {
    /// One tick is `10^timebase_power()` seconds. Converting ticks to real
    /// time is left to the caller.
    pub fn timebase_power(&self) -> i8 {
        self.unit.power() + self.magnitude.power()
    }
}

impl fmt::Display for Timescale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.magnitude.value(), self.unit.as_str())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScopeType {
    Begin,
    Fork,
    Function,
    Module,
    Task,
    /// The implicit scope at the top of the tree. Never appears in a file.
    Root,
}

impl ScopeType {
    pub fn from_bytes(name: &[u8]) -> Option<Self> {
        Some(match name {
            b"begin" => ScopeType::Begin,
            b"fork" => ScopeType::Fork,
            b"function" => ScopeType::Function,
            b"module" => ScopeType::Module,
            b"task" => ScopeType::Task,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScopeType::Begin => "begin",
            ScopeType::Fork => "fork",
            ScopeType::Function => "function",
            ScopeType::Module => "module",
            ScopeType::Task => "task",
            ScopeType::Root => "root",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VarType {
    Event,
    Integer,
    Parameter,
    Real,
    Realtime,
    Reg,
    Supply0,
    Supply1,
    Time,
    Tri,
    Triand,
    Trior,
    Trireg,
    Tri0,
    Tri1,
    Wand,
    Wire,
    Wor,
}

const VAR_TYPES: [(&str, VarType); 18] = [
    ("event", VarType::Event),
    ("integer", VarType::Integer),
    ("parameter", VarType::Parameter),
    ("real", VarType::Real),
    ("realtime", VarType::Realtime),
    ("reg", VarType::Reg),
    ("supply0", VarType::Supply0),
    ("supply1", VarType::Supply1),
    ("time", VarType::Time),
    ("tri", VarType::Tri),
    ("triand", VarType::Triand),
    ("trior", VarType::Trior),
    ("trireg", VarType::Trireg),
    ("tri0", VarType::Tri0),
    ("tri1", VarType::Tri1),
    ("wand", VarType::Wand),
    ("wire", VarType::Wire),
    ("wor", VarType::Wor),
];

impl VarType {
    pub fn from_bytes(name: &[u8]) -> Option<Self> {
        VAR_TYPES
            .iter()
            .find(|(n, _)| n.as_bytes() == name)
            .map(|(_, t)| *t)
    }

    pub fn as_str(self) -> &'static str {
        VAR_TYPES
            .iter()
            .find(|(_, t)| *t == self)
            .map_or("", |(n, _)| n)
    }

    /// Real-valued vars change with `r` records rather than bits.
    pub fn is_real(self) -> bool {
        matches!(self, VarType::Real | VarType::Realtime)
    }
}

/// A `$var` declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Var {
    pub var_type: VarType,
    /// Width in bits.
    pub size: u32,
    /// The short identifier code used in value changes, e.g. `!`.
    pub id: String,
    /// The human readable name, e.g. `clk`.
    pub reference: String,
    /// Optional bit select following the reference, e.g. `[7:0]`.
    pub range: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scope {
    pub scope_type: ScopeType,
    pub identifier: String,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub vars: Vec<Var>,
}

impl Scope {
    fn root() -> Self {
        Self {
            scope_type: ScopeType::Root,
            identifier: String::new(),
            parent: None,
            children: Vec::new(),
            vars: Vec::new(),
        }
    }
}

/// Everything in the header.
#[derive(Clone, Debug, PartialEq)]
pub struct Declarations {
    pub comments: Vec<String>,
    pub date: Option<String>,
    pub version: Option<String>,
    pub timescale: Option<Timescale>,
    /// All scopes in the order they were declared, starting with the root.
    pub scopes: TiVec<ScopeId, Scope>,
    /// Var identifier to (scope, index into `Scope::vars`).
    id_index: HashMap<String, Vec<(ScopeId, usize)>>,
}

impl Default for Declarations {
    fn default() -> Self {
        let mut scopes = TiVec::new();
        scopes.push(Scope::root());
        Self {
            comments: Vec::new(),
            date: None,
            version: None,
            timescale: None,
            scopes,
            id_index: HashMap::new(),
        }
    }
}

impl Declarations {
    pub fn root(&self) -> &Scope {
        &self.scopes[ROOT_SCOPE]
    }

    pub fn scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id)
    }

    /// Add a new scope as the last child of `parent`.
    pub fn add_scope(
        &mut self,
        parent: ScopeId,
        scope_type: ScopeType,
        identifier: String,
    ) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            scope_type,
            identifier,
            parent: Some(parent),
            children: Vec::new(),
            vars: Vec::new(),
        });
        self.scopes[parent].children.push(id);
        id
    }

    pub fn add_var(&mut self, scope: ScopeId, var: Var) {
        let vars = &mut self.scopes[scope].vars;
        self.id_index
            .entry(var.id.clone())
            .or_default()
            .push((scope, vars.len()));
        vars.push(var);
    }

    pub fn children(&self, id: ScopeId) -> impl Iterator<Item = (ScopeId, &Scope)> + '_ {
        self.scopes[id]
            .children
            .iter()
            .map(move |&child| (child, &self.scopes[child]))
    }

    /// Every var with its scope, in declaration order of the scopes.
    pub fn vars(&self) -> impl Iterator<Item = (ScopeId, &Var)> + '_ {
        self.scopes
            .iter()
            .enumerate()
            .flat_map(|(i, s)| s.vars.iter().map(move |v| (ScopeId(i), v)))
    }

    pub fn num_vars(&self) -> usize {
        self.scopes.iter().map(|s| s.vars.len()).sum()
    }

    /// All vars declared with identifier `id`. Several vars can share an
    /// identifier when they are the same net seen from different scopes.
    pub fn var_by_id<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a Var> + 'a {
        self.id_index
            .get(id)
            .into_iter()
            .flatten()
            .map(move |&(scope, index)| &self.scopes[scope].vars[index])
    }

    /// Dotted path of a scope from the root, e.g. `top.cpu`.
    pub fn scope_path(&self, id: ScopeId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(scope_id) = current {
            let scope = &self.scopes[scope_id];
            if scope.scope_type != ScopeType::Root {
                names.push(scope.identifier.as_str());
            }
            current = scope.parent;
        }
        names.reverse();
        names.join(".")
    }

    fn fmt_scope(&self, f: &mut fmt::Formatter<'_>, id: ScopeId, depth: usize) -> fmt::Result {
        let scope = &self.scopes[id];
        let indent = "  ".repeat(depth);
        if scope.scope_type == ScopeType::Root {
            writeln!(f, "{indent}root")?;
        } else {
            writeln!(
                f,
                "{indent}scope {} {}",
                scope.scope_type.as_str(),
                scope.identifier
            )?;
        }
        for var in scope.vars.iter() {
            write!(
                f,
                "{indent}  var {} {} {} {}",
                var.var_type.as_str(),
                var.size,
                var.id,
                var.reference
            )?;
            if let Some(range) = &var.range {
                write!(f, " {range}")?;
            }
            writeln!(f)?;
        }
        for &child in scope.children.iter() {
            self.fmt_scope(f, child, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Declarations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(date) = &self.date {
            writeln!(f, "date {date}")?;
        }
        if let Some(version) = &self.version {
            writeln!(f, "version {version}")?;
        }
        if let Some(timescale) = &self.timescale {
            writeln!(f, "timescale {timescale}")?;
        }
        for comment in self.comments.iter() {
            writeln!(f, "comment {comment}")?;
        }
        self.fmt_scope(f, ROOT_SCOPE, 0)
    }
}

/// A value change for one signal.
#[derive(Clone, Debug, PartialEq)]
pub struct Change {
    pub value: Value,
    /// The var identifier code, not its name.
    pub id: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DumpSection {
    /// `$dumpvars`: initial values of all vars.
    Vars,
    /// `$dumpall`: current values of all vars.
    All,
    /// `$dumpon`: dumping resumed.
    On,
    /// `$dumpoff`: dumping suspended; vars are shown as X.
    Off,
}

impl DumpSection {
    pub fn from_keyword(keyword: &[u8]) -> Option<Self> {
        Some(match keyword {
            b"$dumpvars" => DumpSection::Vars,
            b"$dumpall" => DumpSection::All,
            b"$dumpon" => DumpSection::On,
            b"$dumpoff" => DumpSection::Off,
            _ => return None,
        })
    }

    pub fn keyword(self) -> &'static str {
        match self {
            DumpSection::Vars => "$dumpvars",
            DumpSection::All => "$dumpall",
            DumpSection::On => "$dumpon",
            DumpSection::Off => "$dumpoff",
        }
    }
}

/// One command from the body of the file.
///
/// Ticks are kept in sequence rather than attached to each change; a tick
/// applies to all changes after it until the next tick.
#[derive(Clone, Debug, PartialEq)]
pub enum SimCmd {
    Comment(String),
    Tick(u64),
    Change(Change),
    Dump(DumpSection),
}

impl fmt::Display for SimCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimCmd::Comment(text) => write!(f, "comment {text}"),
            SimCmd::Tick(t) => write!(f, "#{t}"),
            SimCmd::Change(c) => write!(f, "{} {}", c.value, c.id),
            SimCmd::Dump(section) => f.write_str(section.keyword()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub declarations: Declarations,
    pub sim_cmds: Vec<SimCmd>,
    /// Records that were skipped rather than failing the parse.
    pub diagnostics: Vec<ParseError>,
}

impl Document {
    /// Stable text rendering of the whole document: the header, the scope
    /// tree indented by depth, then one line per command.
    pub fn describe(&self) -> String {
        self.to_string()
    }

    pub fn ticks(&self) -> impl Iterator<Item = u64> + '_ {
        self.sim_cmds.iter().filter_map(|c| match c {
            SimCmd::Tick(t) => Some(*t),
            _ => None,
        })
    }

    pub fn changes(&self) -> impl Iterator<Item = &Change> + '_ {
        self.sim_cmds.iter().filter_map(|c| match c {
            SimCmd::Change(change) => Some(change),
            _ => None,
        })
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.declarations)?;
        for cmd in self.sim_cmds.iter() {
            writeln!(f, "{cmd}")?;
        }
        Ok(())
    }
}

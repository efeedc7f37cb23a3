//! Execution arguments.
//!
//! A job declares the names of the arguments it understands. Values are not
//! stored on the job; they are looked up at run time from whatever
//! [`ArgumentSource`] the caller supplies (form fields of an HTTP trigger,
//! `name=value` tokens on a command line, a plain map in tests).

use std::collections::{BTreeMap, HashMap};

const FORBIDDEN: [char; 5] = [' ', '=', '&', '#', '?'];

/// Whether `name` (already trimmed) may be used as an argument name.
pub fn is_valid_argument_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(FORBIDDEN)
}

/// Ordered, duplicate-free list of argument names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentNames {
    names: Vec<String>,
}

impl ArgumentNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a name. Invalid names and duplicates are ignored; returns whether
    /// the list grew.
    pub fn add(&mut self, name: &str) -> bool {
        let name = name.trim();
        if !is_valid_argument_name(name) || self.contains(name) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }

    /// Add several names with the same per-name rule as [`add`](Self::add).
    pub fn extend<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.add(name.as_ref());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = name.trim();
        self.names.iter().any(|existing| existing == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Key/value lookup for argument values.
pub trait ArgumentSource {
    fn lookup(&self, name: &str) -> Option<String>;
}

/// A source with no values at all. Used for scheduler-driven runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoArguments;

impl ArgumentSource for NoArguments {
    fn lookup(&self, _name: &str) -> Option<String> {
        None
    }
}

impl ArgumentSource for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl ArgumentSource for BTreeMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl<S: ArgumentSource + ?Sized> ArgumentSource for &S {
    fn lookup(&self, name: &str) -> Option<String> {
        (**self).lookup(name)
    }
}

/// Values given as `name=value` command-line tokens.
///
/// A token without `=` sets its name to the empty string. Later tokens win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArguments {
    values: BTreeMap<String, String>,
}

impl CliArguments {
    pub fn parse<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut values = BTreeMap::new();
        for token in tokens {
            let token = token.as_ref().trim();
            let (name, value) = token.split_once('=').unwrap_or((token, ""));
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            values.insert(name.to_string(), value.trim().to_string());
        }
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ArgumentSource for CliArguments {
    fn lookup(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

/// Look up `name` (trimmed) in `source`. `None` means unset.
pub fn resolve_value(source: &dyn ArgumentSource, name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    source.lookup(name)
}

//! Type registry: resolves a type identifier to the routines that render a
//! value of that type to its canonical text and parse it back.
//!
//! The registry stands in for the host type system. Builtins follow the
//! PostgreSQL text formats so logged parameters can be replayed verbatim.

mod array;
mod builtin;

use parking_lot::RwLock;
use pg_grab_shared::{Datum, Oid};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{GrabError, Result};

pub use array::{format_array_literal, parse_array_literal};

pub type OutputFn = Arc<dyn Fn(&Datum, &TypeRegistry) -> Result<String> + Send + Sync>;
pub type InputFn = Arc<dyn Fn(&str, &TypeRegistry) -> Result<Datum> + Send + Sync>;

#[derive(Clone)]
pub struct TypeEntry {
    pub oid: Oid,
    pub name: String,
    pub aliases: Vec<String>,
    output: OutputFn,
    input: Option<InputFn>,
}

impl TypeEntry {
    pub fn new(oid: Oid, name: impl Into<String>, output: OutputFn) -> Self {
        Self {
            oid,
            name: name.into(),
            aliases: Vec::new(),
            output,
            input: None,
        }
    }

    pub fn with_input(mut self, input: InputFn) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }
}

impl std::fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeEntry")
            .field("oid", &self.oid)
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("has_input", &self.input.is_some())
            .finish()
    }
}

pub struct TypeRegistry {
    // oid -> entry
    entries: RwLock<HashMap<Oid, TypeEntry>>,
}

impl TypeRegistry {
    pub fn empty() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Registry preloaded with the builtin types.
    pub fn builtin() -> Self {
        let registry = Self::empty();
        for entry in builtin::entries() {
            registry.register(entry);
        }
        registry
    }

    /// Adds or replaces a type.
    pub fn register(&self, entry: TypeEntry) {
        let mut entries = self.entries.write();
        entries.insert(entry.oid, entry);
    }

    pub fn contains(&self, oid: Oid) -> bool {
        self.entries.read().contains_key(&oid)
    }

    pub fn output_function(&self, oid: Oid) -> Option<OutputFn> {
        let entries = self.entries.read();
        entries.get(&oid).map(|e| e.output.clone())
    }

    pub fn input_function(&self, oid: Oid) -> Option<InputFn> {
        let entries = self.entries.read();
        entries.get(&oid).and_then(|e| e.input.clone())
    }

    /// Renders `value` with the output function of the declared type `oid`.
    pub fn render(&self, oid: Oid, value: &Datum) -> Result<String> {
        let output = self
            .output_function(oid)
            .ok_or(GrabError::NoOutputFunction(oid))?;
        output(value, self)
    }

    /// Parses canonical text back into a value of type `oid`.
    pub fn parse(&self, oid: Oid, text: &str) -> Result<Datum> {
        let input = self
            .input_function(oid)
            .ok_or(GrabError::NoInputFunction(oid))?;
        input(text, self)
    }

    /// Display name as the regtype output shows it.
    pub fn type_name(&self, oid: Oid) -> Option<String> {
        let entries = self.entries.read();
        entries.get(&oid).map(|e| e.name.clone())
    }

    /// Resolves a display name or alias, case-insensitively.
    pub fn lookup_type_name(&self, name: &str) -> Option<Oid> {
        let wanted = name.trim().to_lowercase();
        let entries = self.entries.read();
        entries
            .values()
            .find(|e| e.name == wanted || e.aliases.iter().any(|a| *a == wanted))
            .map(|e| e.oid)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

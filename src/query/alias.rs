// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Per-query table aliases.
//!
//! The primary type is always `a`. Every other type gets the next letter
//! when it first enters the query: `b`, `c`, ... `z`, then `aa`, `ab`, ...
//! A map belongs to one query instance and is never shared.

use crate::{
    compiler::AliasResolver,
    entity::EntityType,
    error::{Error, Result}
};

/// Alias for the `index`-th type of a query.
pub fn alias_for(index: usize) -> String {
    const LETTERS: usize = 26;
    let letter = |i: usize| char::from(b'a' + (i % LETTERS) as u8);
    if index < LETTERS {
        letter(index).to_string()
    } else {
        let mut alias = alias_for(index / LETTERS - 1);
        alias.push(letter(index));
        alias
    }
}

/// Type-to-alias map in first-use order.
#[derive(Debug, Clone)]
pub struct AliasMap {
    entries: Vec<(&'static EntityType, String)>
}

impl AliasMap {
    /// Map holding only the primary type.
    pub fn new(primary: &'static EntityType) -> Self {
        Self {
            entries: vec![(primary, alias_for(0))]
        }
    }

    /// Primary type.
    pub fn primary(&self) -> &'static EntityType {
        self.entries[0].0
    }

    /// Alias of the primary type.
    pub fn primary_alias(&self) -> &str {
        &self.entries[0].1
    }

    /// Add a type if absent and return its alias.
    pub fn register(&mut self, ty: &'static EntityType) -> &str {
        let index = match self.position(ty.name()) {
            Some(index) => index,
            None => {
                self.entries.push((ty, alias_for(self.entries.len())));
                self.entries.len() - 1
            }
        };
        &self.entries[index].1
    }

    /// Check if a type is part of the query.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Alias of a registered type.
    pub fn alias(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.entries[i].1.as_str())
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`: the primary type is registered at creation.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(ty, _)| ty.name() == name)
    }

    fn lookup(&self, entity: Option<&'static str>) -> Result<(&'static EntityType, &str)> {
        let index = match entity {
            None => 0,
            Some(name) => self.position(name).ok_or_else(|| {
                Error::translation(format!(
                    "type `{name}` is not part of the query over `{}`",
                    self.primary().name()
                ))
            })?
        };
        let (ty, alias) = &self.entries[index];
        Ok((*ty, alias.as_str()))
    }
}

impl AliasResolver for AliasMap {
    fn entity_type(&self, entity: Option<&'static str>) -> Result<&'static EntityType> {
        self.lookup(entity).map(|(ty, _)| ty)
    }

    fn qualifier(&self, entity: Option<&'static str>) -> Result<Option<String>> {
        self.lookup(entity).map(|(_, alias)| Some(alias.to_string()))
    }
}

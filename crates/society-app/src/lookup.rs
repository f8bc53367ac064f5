// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Cascading master-data selection.
//!
//! A hierarchy is an ordered list of levels (for example
//! Society -> Apartment -> Flat). Each level holds the option nodes loaded
//! for it and at most one selected id. Picking a value at one level clears
//! every level below it.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{ApartmentGroupId, ComponentId, GroupComponent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupNode {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub label: String,
    pub is_active: bool,
}

impl LookupNode {
    pub fn new(id: i64, parent_id: Option<i64>, label: impl Into<String>) -> Self {
        Self {
            id,
            parent_id,
            label: label.into(),
            is_active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupLevel {
    pub name: String,
    pub nodes: Vec<LookupNode>,
    pub selected: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LookupHierarchy {
    levels: Vec<LookupLevel>,
}

impl LookupHierarchy {
    pub fn new<I, S>(level_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            levels: level_names
                .into_iter()
                .map(|name| LookupLevel {
                    name: name.into(),
                    nodes: Vec::new(),
                    selected: None,
                })
                .collect(),
        }
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, level: usize) -> Option<&LookupLevel> {
        self.levels.get(level)
    }

    pub fn level_index(&self, name: &str) -> Option<usize> {
        self.levels.iter().position(|level| level.name == name)
    }

    /// Replaces the loaded option set of one level. Selections are kept even
    /// when the new set no longer contains them.
    pub fn load_level(&mut self, level: usize, nodes: Vec<LookupNode>) -> Result<()> {
        let Some(slot) = self.levels.get_mut(level) else {
            bail!("lookup level {level} is out of range (depth {})", self.depth());
        };
        slot.nodes = nodes;
        Ok(())
    }

    /// Active nodes under `parent_id`. The root level ignores the parent.
    pub fn options_for(&self, level: usize, parent_id: Option<i64>) -> Vec<&LookupNode> {
        let Some(slot) = self.levels.get(level) else {
            return Vec::new();
        };
        slot.nodes
            .iter()
            .filter(|node| node.is_active)
            .filter(|node| level == 0 || node.parent_id == parent_id)
            .collect()
    }

    /// Options for `level` filtered by whatever is selected one level up.
    pub fn current_options(&self, level: usize) -> Vec<&LookupNode> {
        let parent = match level {
            0 => None,
            _ => self.selected(level - 1),
        };
        self.options_for(level, parent)
    }

    pub fn selected(&self, level: usize) -> Option<i64> {
        self.levels.get(level).and_then(|slot| slot.selected)
    }

    /// Sets the selection at `level` and clears every deeper level, also
    /// when `value` is empty. Returns the levels that were cleared.
    pub fn on_parent_change(&mut self, level: usize, value: Option<i64>) -> Result<Vec<usize>> {
        if level >= self.depth() {
            bail!("lookup level {level} is out of range (depth {})", self.depth());
        }

        self.levels[level].selected = value.filter(|id| *id > 0);
        let cleared: Vec<usize> = ((level + 1)..self.depth()).collect();
        for dependent in &cleared {
            self.levels[*dependent].selected = None;
        }
        Ok(cleared)
    }

    pub fn label(&self, level: usize, id: i64) -> String {
        let nodes = self
            .levels
            .get(level)
            .map(|slot| slot.nodes.as_slice())
            .unwrap_or_default();
        resolve_label(nodes, id)
    }
}

/// Label of `id` in `nodes`, or `#<id>` when the node is not loaded.
pub fn resolve_label(nodes: &[LookupNode], id: i64) -> String {
    nodes
        .iter()
        .find(|node| node.id == id)
        .map_or_else(|| format!("#{id}"), |node| node.label.clone())
}

/// Read-only view of group-to-component mappings with the per-group total
/// the backend keeps in sync.
#[derive(Debug, Clone, Default)]
pub struct ComponentRollup {
    components: Vec<LookupNode>,
    mappings: Vec<GroupComponent>,
}

impl ComponentRollup {
    pub fn new(components: Vec<LookupNode>, mappings: Vec<GroupComponent>) -> Self {
        Self {
            components,
            mappings,
        }
    }

    pub fn components_of(&self, group: ApartmentGroupId) -> Vec<&GroupComponent> {
        self.mappings
            .iter()
            .filter(|mapping| mapping.apartment_group_id == group)
            .collect()
    }

    pub fn total_for(&self, group: ApartmentGroupId) -> f64 {
        self.components_of(group)
            .into_iter()
            .filter(|mapping| mapping.is_active)
            .map(|mapping| mapping.amount)
            .sum()
    }

    pub fn totals(&self) -> BTreeMap<ApartmentGroupId, f64> {
        let mut totals = BTreeMap::new();
        for mapping in self.mappings.iter().filter(|mapping| mapping.is_active) {
            *totals.entry(mapping.apartment_group_id).or_insert(0.0) += mapping.amount;
        }
        totals
    }

    pub fn label_for(&self, component: ComponentId) -> String {
        resolve_label(&self.components, component.get())
    }
}

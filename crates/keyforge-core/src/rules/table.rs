// Keyforge Rule Table
//
// The UI thread owns the ordered rule list and edits it; the hook thread
// reads an immutable map of enabled rules. Every edit builds a fresh map and
// swaps it in under a momentary write lock, so a reader never sees a
// half-applied edit and never waits on rule validation.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

use super::{cycle, CycleError, RuleError};
use crate::{KeyName, KeyRule, RemapMode, RuleRecord};

/// Enabled rules keyed by source key
pub type DispatchMap = HashMap<KeyName, KeyRule>;

/// Position of a rule in the ordered list
pub type RuleId = usize;

/// Read-only view of the dispatch snapshot, handed to the hook thread
#[derive(Debug, Clone, Default)]
pub struct RulesHandle {
    snapshot: Arc<RwLock<Arc<DispatchMap>>>,
    toggles: Arc<RwLock<Arc<Vec<KeyRule>>>>,
}

impl RulesHandle {
    /// Current snapshot; stays valid even if the table is edited afterwards
    pub fn snapshot(&self) -> Arc<DispatchMap> {
        Arc::clone(&self.snapshot.read())
    }

    /// Look up the enabled rule for a key, in any spelling
    pub fn lookup(&self, key: &str) -> Option<KeyRule> {
        let key = KeyName::normalized(key);
        self.snapshot.read().get(&*key).cloned()
    }

    pub fn enabled_count(&self) -> usize {
        self.snapshot.read().len()
    }

    /// Every toggle rule, enabled or not
    ///
    /// A rule disabled while latched leaves the dispatch map but keeps its
    /// latch, which shutdown still has to reset.
    pub fn toggle_rules(&self) -> Arc<Vec<KeyRule>> {
        Arc::clone(&self.toggles.read())
    }

    fn publish(&self, map: Arc<DispatchMap>, toggles: Arc<Vec<KeyRule>>) {
        *self.snapshot.write() = map;
        *self.toggles.write() = toggles;
    }
}

/// All configured rules, in display order, plus the dispatch index
#[derive(Debug, Default)]
pub struct RuleTable {
    ordered: Vec<KeyRule>,
    by_source: Arc<DispatchMap>,
    handle: RulesHandle,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from persisted records
    pub fn from_records(records: &[RuleRecord]) -> Result<Self, RuleError> {
        let mut table = Self::new();
        table.load(records)?;
        Ok(table)
    }

    /// Handle for the hook thread; it observes every later edit
    pub fn dispatch_handle(&self) -> RulesHandle {
        self.handle.clone()
    }

    /// Append a rule, rejecting it if it would close a remap cycle
    pub fn add(
        &mut self,
        source: &str,
        target: &str,
        mode: RemapMode,
        enabled: bool,
    ) -> Result<RuleId, RuleError> {
        let rule = build_rule(source, target, mode, enabled)?;
        self.validate(&rule, None)?;

        debug!("Adding rule {}", rule);
        self.ordered.push(rule);
        self.publish();
        Ok(self.ordered.len() - 1)
    }

    /// Replace the rule at `index`
    ///
    /// Editing only the enabled flag keeps the rule's toggle state.
    pub fn update(
        &mut self,
        index: RuleId,
        source: &str,
        target: &str,
        mode: RemapMode,
        enabled: bool,
    ) -> Result<(), RuleError> {
        let current = self.get(index).ok_or_else(|| self.index_error(index))?;
        let mut rule = build_rule(source, target, mode, enabled)?;
        self.validate(&rule, Some(index))?;

        if rule.source() == current.source()
            && rule.target() == current.target()
            && rule.mode() == current.mode()
        {
            rule = rule.with_latch(current.latch().clone());
        }

        debug!("Updating rule {}: {} => {}", index, current, rule);
        self.ordered[index] = rule;
        self.publish();
        Ok(())
    }

    /// Enable or disable the rule at `index`
    pub fn set_enabled(&mut self, index: RuleId, enabled: bool) -> Result<(), RuleError> {
        let rule = self.get(index).ok_or_else(|| self.index_error(index))?;
        let (source, target, mode) = (rule.source().clone(), rule.target().clone(), rule.mode());
        self.update(index, source.as_str(), target.as_str(), mode, enabled)
    }

    /// Remove the rule at `index` and return it
    pub fn remove(&mut self, index: RuleId) -> Result<KeyRule, RuleError> {
        if index >= self.ordered.len() {
            return Err(self.index_error(index));
        }
        let rule = self.ordered.remove(index);
        debug!("Removed rule {}", rule);
        self.publish();
        Ok(rule)
    }

    /// Replace the whole rule set; on error the current set is kept
    pub fn load(&mut self, records: &[RuleRecord]) -> Result<(), RuleError> {
        let mut rules = Vec::with_capacity(records.len());
        for record in records {
            rules.push(build_rule(
                &record.key_to_replace,
                &record.replacement_key,
                record.mode,
                record.enabled,
            )?);
        }

        check_duplicates(&rules)?;
        if let Some(path) = cycle::find_cycle(rules.iter().map(|r| (r.source(), r.target()))) {
            return Err(CycleError::new(path).into());
        }

        debug!("Loaded {} rules", rules.len());
        self.ordered = rules;
        self.publish();
        Ok(())
    }

    /// Records for persistence, in display order
    pub fn export(&self) -> Vec<RuleRecord> {
        self.ordered.iter().map(KeyRule::to_record).collect()
    }

    /// Remove every rule
    pub fn clear(&mut self) {
        self.ordered.clear();
        self.publish();
    }

    /// All rules in display order
    pub fn rules(&self) -> &[KeyRule] {
        &self.ordered
    }

    pub fn get(&self, index: RuleId) -> Option<&KeyRule> {
        self.ordered.get(index)
    }

    /// Enabled rule for `source`, if any
    pub fn dispatch_lookup(&self, source: &str) -> Option<&KeyRule> {
        self.by_source.get(&*KeyName::normalized(source))
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn enabled_count(&self) -> usize {
        self.by_source.len()
    }

    fn index_error(&self, index: RuleId) -> RuleError {
        RuleError::Index {
            index,
            len: self.ordered.len(),
        }
    }

    // Every rule counts as an edge, enabled or not. The candidate goes first
    // so a reported loop reads from the edge being added.
    fn validate(&self, candidate: &KeyRule, replacing: Option<RuleId>) -> Result<(), RuleError> {
        let others = || {
            self.ordered
                .iter()
                .enumerate()
                .filter(move |(i, _)| Some(*i) != replacing)
                .map(|(_, rule)| rule)
        };

        if candidate.is_enabled() {
            if let Some(dup) = others().find(|r| r.is_enabled() && r.source() == candidate.source()) {
                return Err(RuleError::DuplicateSource(dup.source().clone()));
            }
        }

        let edges = std::iter::once(candidate)
            .chain(others())
            .map(|r| (r.source(), r.target()));
        match cycle::find_cycle(edges) {
            Some(path) => Err(CycleError::new(path).into()),
            None => Ok(()),
        }
    }

    fn publish(&mut self) {
        let map: DispatchMap = self
            .ordered
            .iter()
            .filter(|rule| rule.is_enabled())
            .map(|rule| (rule.source().clone(), rule.clone()))
            .collect();
        let toggles: Vec<KeyRule> = self
            .ordered
            .iter()
            .filter(|rule| rule.mode() == RemapMode::Toggle)
            .cloned()
            .collect();
        self.by_source = Arc::new(map);
        self.handle.publish(Arc::clone(&self.by_source), Arc::new(toggles));
    }
}

fn build_rule(
    source: &str,
    target: &str,
    mode: RemapMode,
    enabled: bool,
) -> Result<KeyRule, RuleError> {
    let source = KeyName::new(source);
    if source.is_empty() {
        return Err(RuleError::EmptyKey { field: "source key" });
    }
    let target = KeyName::new(target);
    if target.is_empty() {
        return Err(RuleError::EmptyKey { field: "target key" });
    }
    Ok(KeyRule::new(source, target, mode, enabled))
}

fn check_duplicates(rules: &[KeyRule]) -> Result<(), RuleError> {
    let mut seen = std::collections::HashSet::new();
    for rule in rules.iter().filter(|r| r.is_enabled()) {
        if !seen.insert(rule.source()) {
            return Err(RuleError::DuplicateSource(rule.source().clone()));
        }
    }
    Ok(())
}

//! Priority tiers.
//!
//! An entity's queue is a family of lists, one per priority label, named by
//! a template over the queue base name and the label. Push and pop work on
//! opposite ends of a list, so each tier is FIFO; across tiers the
//! configured label order decides what is popped first.

use crate::error::{Error, Result};
use crate::store::Store;
use std::sync::Arc;
use tracing::{debug, info};

const PRIORITY_SEPARATOR: char = ';';
const PLACEHOLDER: &str = "%s";

// ---------------------------------------------------------------------------
// Levels
// ---------------------------------------------------------------------------

/// Ordered, distinct priority labels, highest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityLevels(Vec<String>);

impl PriorityLevels {
    /// Parse a `;`-separated list. Other punctuation stays part of a label.
    pub fn parse(text: &str) -> Result<Self> {
        let mut labels: Vec<String> = Vec::new();
        for label in text.split(PRIORITY_SEPARATOR).map(str::trim) {
            if label.is_empty() {
                continue;
            }
            if labels.iter().any(|l| l == label) {
                return Err(Error::Config(format!("duplicate priority level {label:?}")));
            }
            labels.push(label.to_string());
        }
        if labels.is_empty() {
            return Err(Error::Config("no priority levels configured".to_string()));
        }
        Ok(Self(labels))
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|l| l == label)
    }

    /// Fail with `UnknownPriority` unless `label` is configured.
    pub fn check(&self, label: &str) -> Result<()> {
        if self.contains(label) {
            Ok(())
        } else {
            Err(Error::UnknownPriority(label.to_string()))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tier naming
// ---------------------------------------------------------------------------

/// List name template with two `%s` slots: queue base name, then label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierTemplate(String);

impl TierTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let slots = template.matches(PLACEHOLDER).count();
        if slots != 2 {
            return Err(Error::Config(format!(
                "queue name template {template:?} must contain exactly two %s, found {slots}"
            )));
        }
        Ok(Self(template))
    }

    pub fn render(&self, queue_base: &str, priority: &str) -> String {
        let mut parts = self.0.splitn(3, PLACEHOLDER);
        let head = parts.next().unwrap_or_default();
        let mid = parts.next().unwrap_or_default();
        let tail = parts.next().unwrap_or_default();
        format!("{head}{queue_base}{mid}{priority}{tail}")
    }
}

// ---------------------------------------------------------------------------
// Pending counts
// ---------------------------------------------------------------------------

/// Per-priority queue lengths, in priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingCounts(Vec<(String, u64)>);

impl PendingCounts {
    pub fn get(&self, label: &str) -> Option<u64> {
        self.0.iter().find(|(l, _)| l == label).map(|(_, n)| *n)
    }

    pub fn total(&self) -> u64 {
        self.0.iter().map(|(_, n)| n).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(l, n)| (l.as_str(), *n))
    }
}

// ---------------------------------------------------------------------------
// Queue set
// ---------------------------------------------------------------------------

/// Push/pop/length/purge over the tier lists of a queue base name.
pub struct QueueSet {
    store: Arc<dyn Store>,
    levels: PriorityLevels,
    template: TierTemplate,
}

impl QueueSet {
    pub fn new(store: Arc<dyn Store>, levels: PriorityLevels, template: TierTemplate) -> Self {
        Self {
            store,
            levels,
            template,
        }
    }

    pub fn levels(&self) -> &PriorityLevels {
        &self.levels
    }

    pub fn tier_name(&self, queue_base: &str, priority: &str) -> String {
        self.template.render(queue_base, priority)
    }

    pub async fn push(&self, queue_base: &str, priority: &str, envelope: &str) -> Result<()> {
        self.levels.check(priority)?;
        let tier = self.tier_name(queue_base, priority);
        self.store.lpush(&tier, envelope).await?;
        debug!(tier = %tier, "pushed envelope");
        Ok(())
    }

    /// Pop from one tier, or from the highest non-empty tier when
    /// `priority` is `None`. Empty tiers are skipped, not treated as the
    /// end of the scan.
    pub async fn pop(&self, queue_base: &str, priority: Option<&str>) -> Result<Option<String>> {
        if let Some(priority) = priority {
            self.levels.check(priority)?;
            return self.store.rpop(&self.tier_name(queue_base, priority)).await;
        }

        for level in self.levels.iter() {
            let tier = self.tier_name(queue_base, level);
            if let Some(envelope) = self.store.rpop(&tier).await? {
                debug!(tier = %tier, "popped envelope");
                return Ok(Some(envelope));
            }
        }
        Ok(None)
    }

    pub async fn length(&self, queue_base: &str, priority: &str) -> Result<u64> {
        self.levels.check(priority)?;
        self.store.llen(&self.tier_name(queue_base, priority)).await
    }

    pub async fn lengths(&self, queue_base: &str) -> Result<PendingCounts> {
        let mut counts = Vec::with_capacity(self.levels.len());
        for level in self.levels.iter() {
            let n = self.store.llen(&self.tier_name(queue_base, level)).await?;
            counts.push((level.to_string(), n));
        }
        Ok(PendingCounts(counts))
    }

    /// Delete every tier list of the queue.
    pub async fn purge_all(&self, queue_base: &str) -> Result<()> {
        for level in self.levels.iter() {
            let tier = self.tier_name(queue_base, level);
            self.store.del(&tier).await?;
            info!(tier = %tier, "removed all jobs from tier");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_keep_order_and_literal_labels() {
        let levels = PriorityLevels::parse("High; Medium,Low ;;Low").unwrap();
        assert_eq!(
            levels.iter().collect::<Vec<_>>(),
            vec!["High", "Medium,Low", "Low"]
        );
        assert!(levels.contains("Medium,Low"));
        assert!(!levels.contains("Medium"));
    }

    #[test]
    fn levels_reject_duplicates_and_empty() {
        assert!(matches!(
            PriorityLevels::parse("High;High"),
            Err(Error::Config(_))
        ));
        assert!(matches!(PriorityLevels::parse(" ; "), Err(Error::Config(_))));
    }

    #[test]
    fn unknown_priority_is_reported() {
        let levels = PriorityLevels::parse("High;Low").unwrap();
        assert!(matches!(levels.check("Urgent"), Err(Error::UnknownPriority(p)) if p == "Urgent"));
    }

    #[test]
    fn template_renders_base_then_label() {
        let t = TierTemplate::new("%s_%s").unwrap();
        assert_eq!(t.render("plangQueue", "High"), "plangQueue_High");

        let t = TierTemplate::new("queue:%s:tier:%s").unwrap();
        assert_eq!(t.render("a%sb", "Low"), "queue:a%sb:tier:Low");
    }

    #[test]
    fn template_needs_two_slots() {
        assert!(TierTemplate::new("%s").is_err());
        assert!(TierTemplate::new("%s_%s_%s").is_err());
    }
}

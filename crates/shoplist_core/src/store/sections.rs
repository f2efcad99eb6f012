//! Derived groupings of items, recomputed from the graph on every call.

use super::entity_store::EntityStore;
use crate::model::item::Item;
use crate::model::location::Location;
use chrono::{DateTime, Duration as ChronoDuration, Local, TimeZone};

/// On-list items grouped under one location, or all of them when ungrouped.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSection {
    /// `None` for the single ungrouped section.
    pub location: Option<Location>,
    pub items: Vec<Item>,
}

/// Off-list items split around the purchase history mark.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PurchasedSections {
    /// Purchased on or after the history mark.
    pub recent: Vec<Item>,
    /// Purchased before the mark, or never purchased.
    pub older: Vec<Item>,
}

impl EntityStore {
    /// On-list items for the shopping list.
    ///
    /// Grouped output has one section per location that has on-list items,
    /// in visitation order. Ungrouped output is a single section holding the
    /// same items in the same order. An empty list yields no sections.
    pub fn shopping_list_sections(&self, grouped_by_location: bool) -> Vec<ItemSection> {
        let sections: Vec<ItemSection> = self
            .query_locations()
            .into_iter()
            .filter_map(|location| {
                let items: Vec<Item> = self
                    .items_at(location.id)
                    .into_iter()
                    .filter(|item| item.on_list)
                    .collect();
                if items.is_empty() {
                    None
                } else {
                    Some(ItemSection {
                        location: Some(location),
                        items,
                    })
                }
            })
            .collect();

        if grouped_by_location || sections.is_empty() {
            return sections;
        }
        vec![ItemSection {
            location: None,
            items: sections
                .into_iter()
                .flat_map(|section| section.items)
                .collect(),
        }]
    }

    /// Off-list items split at local start-of-day minus `history_days`.
    pub fn purchased_sections(&self, history_days: u32, now: DateTime<Local>) -> PurchasedSections {
        let mark_ms = history_mark(history_days, now);
        let mut sections = PurchasedSections::default();
        for item in self.query_items(false) {
            match item.date_last_purchased {
                Some(purchased) if purchased >= mark_ms => sections.recent.push(item),
                _ => sections.older.push(item),
            }
        }
        sections
    }
}

/// Epoch milliseconds of local midnight `history_days` before `now`.
pub fn history_mark(history_days: u32, now: DateTime<Local>) -> i64 {
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .unwrap_or(now);
    (midnight - ChronoDuration::days(i64::from(history_days))).timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::history_mark;
    use chrono::{Local, Timelike};

    #[test]
    fn history_mark_is_midnight_days_back() {
        let now = Local::now();
        let mark_today = history_mark(0, now);
        let mark_back = history_mark(2, now);
        assert!(mark_today <= now.timestamp_millis());
        assert!(mark_back < mark_today);

        let mark_time = chrono::DateTime::from_timestamp_millis(mark_today)
            .unwrap()
            .with_timezone(&Local);
        assert_eq!(mark_time.hour(), 0);
        assert_eq!(mark_time.minute(), 0);
    }
}

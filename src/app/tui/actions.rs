use std::collections::HashSet;

use ratatui::widgets::TableState;

use crate::app::playlist::Entry;

pub(super) fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

pub(super) fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}

/// Catalog rows currently visible, as indices into the full playlist, so a
/// selection in the filtered view still plays the right entry.
pub(super) fn visible_indices(
    entries: &[Entry],
    search: &str,
    group: Option<&str>,
    favorites_only: Option<&HashSet<String>>,
) -> Vec<usize> {
    let needle = search.trim().to_lowercase();
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| {
            if let Some(favorites) = favorites_only
                && !favorites.contains(&entry.source_url)
            {
                return false;
            }
            if let Some(group) = group
                && entry.group != group
            {
                return false;
            }
            if needle.is_empty() {
                return true;
            }
            entry.title.to_lowercase().contains(&needle)
                || entry.group.to_lowercase().contains(&needle)
                || entry.source_url.to_lowercase().contains(&needle)
        })
        .map(|(index, _)| index)
        .collect()
}

pub(super) fn group_names(entries: &[Entry]) -> Vec<String> {
    let mut groups: Vec<String> = entries.iter().map(|entry| entry.group.clone()).collect();
    groups.sort();
    groups.dedup();
    groups
}

/// Advance the group filter: all -> first group -> ... -> last -> all.
pub(super) fn cycle_group(groups: &[String], current: Option<&str>) -> Option<String> {
    match current {
        None => groups.first().cloned(),
        Some(current) => {
            let position = groups.iter().position(|g| g == current)?;
            groups.get(position + 1).cloned()
        }
    }
}

pub(super) fn clamp_selection(table_state: &mut TableState, visible_len: usize) {
    if visible_len == 0 {
        table_state.select(None);
        return;
    }
    match table_state.selected() {
        Some(selected) => table_state.select(Some(selected.min(visible_len - 1))),
        None => table_state.select(Some(0)),
    }
}

pub(super) fn truncate(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let kept: String = value.chars().take(limit.saturating_sub(1)).collect();
    format!("{kept}…")
}

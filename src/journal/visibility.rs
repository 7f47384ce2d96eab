//! Which journals and details a viewer may see.

use super::models::{DetailProperty, Journal, JournalDetail};
use std::collections::HashSet;

/// Everything visibility depends on, resolved once for one viewer and one
/// project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerContext {
    pub user_id: i64,
    pub can_view_private_notes: bool,
    pub visible_custom_field_ids: HashSet<i64>,
}

impl ViewerContext {
    pub fn can_see_detail(&self, detail: &JournalDetail) -> bool {
        match detail.property {
            DetailProperty::CustomField => detail
                .custom_field_id()
                .map_or(false, |id| self.visible_custom_field_ids.contains(&id)),
            DetailProperty::Attribute | DetailProperty::Attachment => true,
        }
    }

    pub fn can_see_notes_of(&self, journal: &Journal) -> bool {
        !journal.private_notes || journal.user_id == self.user_id || self.can_view_private_notes
    }
}

/// Orders journals by `(created_on, id)`, numbers them from 1, then drops
/// what the viewer may not see. Indices survive filtering.
pub fn filter_visible(mut journals: Vec<Journal>, viewer: &ViewerContext) -> Vec<Journal> {
    journals.sort_by_key(|j| (j.created_on, j.id));
    for (i, journal) in journals.iter_mut().enumerate() {
        journal.indice = Some(i + 1);
    }

    journals
        .into_iter()
        .filter(|j| viewer.can_see_notes_of(j))
        .filter_map(|mut journal| {
            journal.details.retain(|d| viewer.can_see_detail(d));
            if journal.has_notes() || !journal.details.is_empty() {
                Some(journal)
            } else {
                None
            }
        })
        .collect()
}

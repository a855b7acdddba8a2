// File: ./src/model/merge.rs
use crate::model::event::{Event, is_present};

/// Fills empty optional fields on `kept` from `dropped`.
///
/// Populated fields on `kept` are never overwritten. Only the fields a
/// duplicate can meaningfully contribute are considered; title, start and
/// source always stay with the retained record.
pub fn backfill(kept: &mut Event, dropped: &Event) {
    macro_rules! fill_field {
        ($field:ident) => {
            if !is_present(&kept.$field) && is_present(&dropped.$field) {
                kept.$field = dropped.$field.clone();
            }
        };
    }

    fill_field!(link);
    fill_field!(location);
    fill_field!(cost);
    fill_field!(description);
    fill_field!(category);
}

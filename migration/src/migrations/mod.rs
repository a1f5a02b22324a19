pub mod m202510160001_create_final_mark_records;
pub mod m202510160002_create_moderation_events;

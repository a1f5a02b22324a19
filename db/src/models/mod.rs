pub mod final_mark_record;
pub mod moderation_event;

pub use final_mark_record::Entity as FinalMarkRecord;
pub use moderation_event::Entity as ModerationEvent;

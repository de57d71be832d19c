//! Load-time upgrade of stored game documents.
//!
//! Documents written by older releases lack fields that were added later.
//! Instead of defaulting them ad hoc wherever they are read, every loaded
//! document runs through [`migrate`] exactly once, right after it leaves the
//! backend. The upgraded shape is written back on the next mutation.

use tracing::debug;

use crate::dao::models::GameEntity;

/// Layout version produced by the current code.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Mode assumed for documents that predate play modes.
const LEGACY_MODE: &str = "classic";

/// Upgrade `entity` in place to [`CURRENT_SCHEMA_VERSION`].
///
/// Returns `true` when anything changed.
pub fn migrate(entity: &mut GameEntity) -> bool {
    if entity.schema_version >= CURRENT_SCHEMA_VERSION {
        return false;
    }

    let from = entity.schema_version;
    if from < 1 {
        upgrade_to_v1(entity);
    }
    entity.schema_version = CURRENT_SCHEMA_VERSION;

    debug!(
        game_id = %entity.id,
        from,
        to = CURRENT_SCHEMA_VERSION,
        "migrated stored game document"
    );
    true
}

/// v1 introduced play modes and the explicit timer flag.
fn upgrade_to_v1(entity: &mut GameEntity) {
    if entity.mode.trim().is_empty() {
        entity.mode = LEGACY_MODE.to_owned();
    }

    if entity.timer_enabled.is_none() {
        let legacy_timer = entity.timer_minutes.is_some_and(|minutes| minutes > 0);
        entity.timer_enabled = Some(legacy_timer);
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use uuid::Uuid;

    use super::*;

    fn legacy_entity() -> GameEntity {
        GameEntity {
            id: Uuid::new_v4(),
            schema_version: 0,
            revision: 3,
            name: "legacy".into(),
            status: "active".into(),
            mode: String::new(),
            has_questions: false,
            supervised: false,
            timer_enabled: None,
            timer_minutes: Some(45),
            stage_timer_minutes: None,
            started_at: None,
            ended_at: None,
            created_at: SystemTime::UNIX_EPOCH,
            updated_at: SystemTime::UNIX_EPOCH,
            stages: Vec::new(),
            teams: Vec::new(),
        }
    }

    #[test]
    fn empty_mode_defaults_to_classic() {
        let mut entity = legacy_entity();
        assert!(migrate(&mut entity));
        assert_eq!(entity.mode, "classic");
        assert_eq!(entity.schema_version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn positive_legacy_timer_is_backfilled_as_enabled() {
        let mut entity = legacy_entity();
        migrate(&mut entity);
        assert_eq!(entity.timer_enabled, Some(true));
    }

    #[test]
    fn missing_timer_is_backfilled_as_disabled() {
        let mut entity = legacy_entity();
        entity.timer_minutes = None;
        migrate(&mut entity);
        assert_eq!(entity.timer_enabled, Some(false));
    }

    #[test]
    fn explicit_values_are_kept() {
        let mut entity = legacy_entity();
        entity.mode = "qr_hunt".into();
        entity.timer_enabled = Some(false);
        migrate(&mut entity);
        assert_eq!(entity.mode, "qr_hunt");
        assert_eq!(entity.timer_enabled, Some(false));
    }

    #[test]
    fn current_documents_are_untouched() {
        let mut entity = legacy_entity();
        entity.schema_version = CURRENT_SCHEMA_VERSION;
        let before = entity.clone();
        assert!(!migrate(&mut entity));
        assert_eq!(entity, before);
    }
}

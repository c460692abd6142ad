//! Eligible promotion targets for a source group.

use roster_state::Group;

use crate::ladder::level_order;

/// Groups a student in `source` may move to.
///
/// Lateral moves (same level, another group) and exactly one level up are
/// eligible. The source group itself and skips of two or more levels are
/// not. Input order of `active_groups` is preserved.
pub fn eligible_targets(source: &Group, active_groups: &[Group]) -> Vec<Group> {
    active_groups
        .iter()
        .filter(|candidate| is_eligible_target(source, candidate))
        .cloned()
        .collect()
}

/// `true` when `target` would be returned by [`eligible_targets`].
pub fn is_eligible_target(source: &Group, target: &Group) -> bool {
    if source.id == target.id {
        return false;
    }
    let source_order = level_order(&source.level.name);
    let order = level_order(&target.level.name);
    order >= source_order && order <= source_order + 1
}

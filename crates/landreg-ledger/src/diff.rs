//! # Diff-Integrity Gate
//!
//! Every action permits a statically-known subset of fields to change
//! between a consumed version and its produced counterpart. The check is
//! reflection-free: clone the produced version, copy the *allowed* fields
//! back from the consumed version, and demand equality with the consumed
//! version. Any drift in a field outside the allowed set survives the
//! revert and breaks the comparison.

use crate::violation::Violations;

/// Whether `new` differs from `old` only in the fields `revert` copies back.
///
/// `revert` receives a mutable clone of `new` and the original `old`; it
/// must overwrite exactly the fields the action under test is allowed to
/// change. Returns `true` when every other field is identical.
pub fn unchanged_except<T, F>(old: &T, new: &T, revert: F) -> bool
where
    T: Clone + PartialEq,
    F: FnOnce(&mut T, &T),
{
    let mut candidate = new.clone();
    revert(&mut candidate, old);
    candidate == *old
}

/// Record a diff violation unless `new` differs from `old` only in the
/// reverted fields.
pub fn require_unchanged_except<T, F>(
    violations: &mut Violations,
    old: &T,
    new: &T,
    action: &str,
    allowed: &str,
    revert: F,
) where
    T: Clone + PartialEq,
    F: FnOnce(&mut T, &T),
{
    violations.require(
        unchanged_except(old, new, revert),
        format!("diff: {action} may change only {allowed}, but another field changed"),
    );
}

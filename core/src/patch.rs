//! Three-way optional for field-level updates.
//!
//! Optional fields on update requests distinguish three cases with
//! different semantics: *absent* (leave the field unchanged), *empty*
//! (clear it) and *present* (set it). A plain `Option` cannot express all
//! three, so updates carry a [`Patch`] per field.

/// A field-level update instruction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    /// Leave the current value unchanged.
    #[default]
    Keep,
    /// Clear the value.
    Clear,
    /// Replace the value.
    Set(T),
}

impl<T> Patch<T> {
    /// Whether this patch leaves the field untouched.
    #[must_use]
    pub const fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    /// The replacement value, if this is a `Set`.
    #[must_use]
    pub const fn as_set(&self) -> Option<&T> {
        match self {
            Self::Set(value) => Some(value),
            _ => None,
        }
    }

    /// Apply the patch to an optional field.
    ///
    /// Returns `true` when the field actually changed, so callers can skip
    /// publishing events for no-op updates (clearing an already-absent
    /// field changes nothing).
    pub fn apply(self, field: &mut Option<T>) -> bool
    where
        T: PartialEq,
    {
        match self {
            Self::Keep => false,
            Self::Clear => field.take().is_some(),
            Self::Set(value) => {
                if field.as_ref() == Some(&value) {
                    false
                } else {
                    *field = Some(value);
                    true
                }
            }
        }
    }
}

impl Patch<String> {
    /// Decode the wire convention for optional string fields: absent means
    /// keep, empty string means clear, anything else means set.
    #[must_use]
    pub fn from_field(field: Option<String>) -> Self {
        match field {
            None => Self::Keep,
            Some(value) if value.is_empty() => Self::Clear,
            Some(value) => Self::Set(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_changes_nothing() {
        let mut field = Some("a".to_string());
        assert!(!Patch::Keep.apply(&mut field));
        assert_eq!(field.as_deref(), Some("a"));
    }

    #[test]
    fn clear_removes_present_value() {
        let mut field = Some("a".to_string());
        assert!(Patch::Clear.apply(&mut field));
        assert_eq!(field, None);
    }

    #[test]
    fn clear_of_absent_value_is_noop() {
        let mut field: Option<String> = None;
        assert!(!Patch::Clear.apply(&mut field));
    }

    #[test]
    fn set_replaces_and_reports_change() {
        let mut field = Some("a".to_string());
        assert!(Patch::Set("b".to_string()).apply(&mut field));
        assert_eq!(field.as_deref(), Some("b"));
    }

    #[test]
    fn set_to_same_value_is_noop() {
        let mut field = Some("a".to_string());
        assert!(!Patch::Set("a".to_string()).apply(&mut field));
    }

    #[test]
    fn wire_convention_decodes_three_ways() {
        assert_eq!(Patch::from_field(None), Patch::Keep);
        assert_eq!(Patch::from_field(Some(String::new())), Patch::Clear);
        assert_eq!(
            Patch::from_field(Some("x".to_string())),
            Patch::Set("x".to_string())
        );
    }
}

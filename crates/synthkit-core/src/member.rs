//! Member discovery and assignment capabilities.
//!
//! Generators never inspect a target type themselves. They ask a
//! [`MemberRegistry`] which members exist and for a setter that writes a
//! type-erased value into one of them.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Type-erased value produced by a rule.
pub type BoxedValue = Box<dyn Any + Send>;

/// Assigns a produced value to one member of `T`.
///
/// Returns the value back when it does not have the member's type.
pub type MemberSetter<T> =
    Arc<dyn Fn(&mut T, BoxedValue) -> std::result::Result<(), BoxedValue> + Send + Sync>;

/// Describes one assignable member of a target type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub name: String,
    pub type_id: TypeId,
    pub type_name: &'static str,
}

impl MemberInfo {
    pub fn of<V: Any>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_id: TypeId::of::<V>(),
            type_name: std::any::type_name::<V>(),
        }
    }

    /// Returns true when values of `V` can be stored in this member.
    pub fn accepts<V: Any>(&self) -> bool {
        self.type_id == TypeId::of::<V>()
    }
}

/// Enumerates the assignable members of `T` and binds setters for them.
pub trait MemberRegistry<T>: Send + Sync {
    /// Members in declaration order.
    fn members(&self) -> Vec<MemberInfo>;

    /// Setter for `member`, or `None` when the member is unknown.
    fn setter(&self, member: &str) -> Option<MemberSetter<T>>;
}

struct MemberEntry<T> {
    info: MemberInfo,
    setter: MemberSetter<T>,
}

/// Registry backed by an explicit list of members and assignment closures.
pub struct MemberTable<T> {
    entries: Vec<MemberEntry<T>>,
}

impl<T: 'static> MemberTable<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Declares a member of type `V` and how to assign it.
    ///
    /// Declaring the same name twice replaces the earlier entry in place.
    pub fn member<V, F>(mut self, name: impl Into<String>, assign: F) -> Self
    where
        V: Any + Send,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let info = MemberInfo::of::<V>(name);
        let setter: MemberSetter<T> = Arc::new(move |target: &mut T, value: BoxedValue| {
            let value = value.downcast::<V>()?;
            assign(target, *value);
            Ok(())
        });

        match self.entries.iter_mut().find(|entry| entry.info.name == info.name) {
            Some(entry) => {
                entry.info = info;
                entry.setter = setter;
            }
            None => self.entries.push(MemberEntry { info, setter }),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: 'static> Default for MemberTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MemberTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| &entry.info.name))
            .finish()
    }
}

impl<T: 'static> MemberRegistry<T> for MemberTable<T> {
    fn members(&self) -> Vec<MemberInfo> {
        self.entries.iter().map(|entry| entry.info.clone()).collect()
    }

    fn setter(&self, member: &str) -> Option<MemberSetter<T>> {
        self.entries
            .iter()
            .find(|entry| entry.info.name == member)
            .map(|entry| Arc::clone(&entry.setter))
    }
}

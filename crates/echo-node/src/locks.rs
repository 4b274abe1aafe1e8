use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use echo_types::ObjectType;

/// One reader-writer lock per object type.
///
/// Operations that need several types always acquire them in
/// [`ObjectType::ALL`] order, so two multi-type operations cannot deadlock.
#[derive(Debug, Default)]
pub struct TypeLocks {
    locks: [RwLock<()>; ObjectType::ALL.len()],
}

/// Guards held for the duration of one operation.
#[must_use]
pub enum Held<'a> {
    Read(Vec<RwLockReadGuard<'a, ()>>),
    Write(Vec<RwLockWriteGuard<'a, ()>>),
}

impl Held<'_> {
    /// Number of types locked.
    pub fn count(&self) -> usize {
        match self {
            Self::Read(guards) => guards.len(),
            Self::Write(guards) => guards.len(),
        }
    }
}

impl TypeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared access to the given types.
    pub fn read(&self, types: &[ObjectType]) -> Held<'_> {
        Held::Read(
            ordered(types)
                .into_iter()
                .map(|t| self.locks[t.ordinal()].read().expect("lock poisoned"))
                .collect(),
        )
    }

    /// Exclusive access to the given types.
    pub fn write(&self, types: &[ObjectType]) -> Held<'_> {
        Held::Write(
            ordered(types)
                .into_iter()
                .map(|t| self.locks[t.ordinal()].write().expect("lock poisoned"))
                .collect(),
        )
    }

    /// Exclusive access to every type.
    pub fn write_all(&self) -> Held<'_> {
        self.write(&ObjectType::ALL)
    }
}

fn ordered(types: &[ObjectType]) -> Vec<ObjectType> {
    let mut types = types.to_vec();
    types.sort_by_key(ObjectType::ordinal);
    types.dedup();
    types
}

use std::marker::PhantomData;
use num::{One, PrimInt, Zero};

pub trait IntUid: Copy + Eq + Ord {
    type Raw;
    fn from_raw(raw: Self::Raw) -> Self;
    fn raw(&self) -> Self::Raw;
}

/// Hands out consecutive ids for one run. Ids are never shared between runs, so
/// two plans built from the same input number their clusters identically.
#[derive(Debug, Clone)]
pub struct UidCounter<T: IntUid> {
    next: T::Raw,
    _marker: PhantomData<T>,
}

impl<T> UidCounter<T> where
    T: IntUid,
    T::Raw: PrimInt,
{
    pub fn new() -> Self {
        return Self::starting_at(<T::Raw as Zero>::zero())
    }

    pub fn starting_at(first: T::Raw) -> Self {
        return UidCounter { next: first, _marker: PhantomData }
    }

    pub fn next_id(&mut self) -> T {
        let id = T::from_raw(self.next);
        self.next = self.next + <T::Raw as One>::one();
        return id
    }

    /// Reserves `n` consecutive ids and returns the first.
    pub fn reserve(&mut self, n: usize) -> T {
        let first = T::from_raw(self.next);
        for _ in 0..n {
            self.next = self.next + <T::Raw as One>::one();
        }
        return first
    }
}

impl<T> Default for UidCounter<T> where
    T: IntUid,
    T::Raw: PrimInt,
{
    fn default() -> Self { Self::new() }
}

#[macro_export(local_inner_macros)]
macro_rules! _impl_define_uint_id_type {
    ($name:ident, $type:ty) => {
        #[derive(PartialEq, Eq, Hash, Copy, Clone, Debug, Ord, PartialOrd)]
        pub struct $name($type);

        impl $crate::IntUid for $name {
            type Raw = $type;

            fn from_raw(raw: $type) -> Self {
                return Self(raw)
            }

            fn raw(&self) -> Self::Raw {
                return self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }
    }
}

#[macro_export]
macro_rules! define_u32_id_type { ($name:ident) => { _impl_define_uint_id_type!{$name, u32} } }


#[cfg(test)]
mod tests {
    use super::*;

    define_u32_id_type!(TestId);

    #[test]
    fn counter_is_sequential() {
        let mut c = UidCounter::<TestId>::new();
        assert_eq!(c.next_id().raw(), 0);
        assert_eq!(c.next_id().raw(), 1);
        let first = c.reserve(3);
        assert_eq!(first.raw(), 2);
        assert_eq!(c.next_id().raw(), 5);
    }

    #[test]
    fn counters_are_independent() {
        let mut a = UidCounter::<TestId>::starting_at(10);
        let mut b = UidCounter::<TestId>::starting_at(10);
        assert_eq!(a.next_id(), b.next_id());
        assert_eq!(a.next_id().to_string(), "11");
    }
}

//! Dense owning arrays.
//!
//! [`Array`] never changes its extents; [`VecArray`] resizes in place,
//! keeping the leading elements in storage order. Both store one element per
//! unit, so their flat and direct views coincide, and both take their
//! storage from an [`Allocator`], the global one unless a `*_in` constructor
//! names another.

use crate::caps::{fill_slots, ArrayLike, ArrayLikeMut, Capabilities, Construct, ResizeKind};
use crate::flat::IndexWalker;
use crate::index::Index;
use crate::order::{offset, RowMajor, StorageOrder};
use crate::{fatal, LoopError, Result};
use allocator_api2::alloc::{Allocator, Global};
use allocator_api2::vec::Vec as Buffer;
use log::debug;
use num_traits::{One, Zero};
use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;

macro_rules! dense_array {
    (
        $(#[$doc:meta])*
        $name:ident, $resize:expr, [$($bound:tt)*]
    ) => {
        $(#[$doc])*
        pub struct $name<T, const N: usize, O: StorageOrder = RowMajor, A: Allocator = Global> {
            data: Buffer<T, A>,
            extents: [usize; N],
            strides: [usize; N],
            _order: PhantomData<O>,
        }

        impl<T, const N: usize, O: StorageOrder> $name<T, N, O> {
            /// Wrap `items`, given in storage order.
            ///
            /// # Panics
            ///
            /// Panics when `items.len()` is not the product of `extents`.
            #[track_caller]
            pub fn from_parts(items: Vec<T>, extents: [usize; N]) -> Self {
                match Self::try_from_parts(items, extents) {
                    Ok(array) => array,
                    Err(err) => fatal(err),
                }
            }

            pub fn try_from_parts(items: Vec<T>, extents: [usize; N]) -> Result<Self> {
                let len: usize = extents.iter().product();
                if items.len() != len {
                    return Err(LoopError::ElementCount {
                        len: items.len(),
                        extents: extents.to_vec(),
                    });
                }
                Self::try_from_iter_in(items, extents, Global)
            }

            /// Element at each position computed by `f`, called in storage order.
            pub fn from_fn<F>(extents: [usize; N], f: F) -> Self
            where
                F: FnMut(&Index<N>) -> T,
            {
                Self::from_fn_in(extents, f, Global)
            }

            pub fn filled(extents: [usize; N], value: T) -> Self
            where
                T: Clone,
            {
                Self::filled_in(extents, value, Global)
            }

            pub fn zeros(extents: [usize; N]) -> Self
            where
                T: Zero + Clone,
            {
                Self::filled(extents, T::zero())
            }

            pub fn ones(extents: [usize; N]) -> Self
            where
                T: One + Clone,
            {
                Self::filled(extents, T::one())
            }
        }

        impl<T, const N: usize, O: StorageOrder, A: Allocator> $name<T, N, O, A> {
            /// Wrap a buffer holding the elements in storage order.
            #[track_caller]
            pub fn from_buffer(data: Buffer<T, A>, extents: [usize; N]) -> Self {
                match Self::try_from_buffer(data, extents) {
                    Ok(array) => array,
                    Err(err) => fatal(err),
                }
            }

            pub fn try_from_buffer(data: Buffer<T, A>, extents: [usize; N]) -> Result<Self> {
                let len: usize = extents.iter().product();
                if data.len() != len {
                    return Err(LoopError::ElementCount {
                        len: data.len(),
                        extents: extents.to_vec(),
                    });
                }
                Ok(Self {
                    data,
                    extents,
                    strides: O::strides(&extents),
                    _order: PhantomData,
                })
            }

            /// Collect `items`, given in storage order, into storage from `alloc`.
            ///
            /// Consumes at most one item past the element count.
            pub fn try_from_iter_in<I>(items: I, extents: [usize; N], alloc: A) -> Result<Self>
            where
                I: IntoIterator<Item = T>,
            {
                let len: usize = extents.iter().product();
                let mut data = Buffer::with_capacity_in(len, alloc);
                data.extend(items.into_iter().take(len + 1));
                Self::try_from_buffer(data, extents)
            }

            #[track_caller]
            pub fn from_iter_in<I>(items: I, extents: [usize; N], alloc: A) -> Self
            where
                I: IntoIterator<Item = T>,
            {
                match Self::try_from_iter_in(items, extents, alloc) {
                    Ok(array) => array,
                    Err(err) => fatal(err),
                }
            }

            pub fn from_fn_in<F>(extents: [usize; N], mut f: F, alloc: A) -> Self
            where
                F: FnMut(&Index<N>) -> T,
            {
                let walker = IndexWalker::new::<O>(extents);
                Self::from_iter_in(walker.map(|idx| f(&idx)), extents, alloc)
            }

            pub fn filled_in(extents: [usize; N], value: T, alloc: A) -> Self
            where
                T: Clone,
            {
                let len = extents.iter().product();
                Self::from_iter_in(std::iter::repeat(value).take(len), extents, alloc)
            }

            /// No elements; later growth allocates from `alloc`.
            pub fn empty_in(alloc: A) -> Self {
                Self {
                    data: Buffer::new_in(alloc),
                    extents: [0; N],
                    strides: [0; N],
                    _order: PhantomData,
                }
            }

            #[inline]
            pub fn allocator(&self) -> &A {
                self.data.allocator()
            }

            #[inline]
            pub fn extents(&self) -> [usize; N] {
                self.extents
            }

            #[inline]
            pub fn strides(&self) -> [usize; N] {
                self.strides
            }

            #[inline]
            pub fn len(&self) -> usize {
                self.data.len()
            }

            #[inline]
            pub fn is_empty(&self) -> bool {
                self.data.is_empty()
            }

            /// Elements in storage order.
            #[inline]
            pub fn as_slice(&self) -> &[T] {
                &self.data
            }

            #[inline]
            pub fn as_mut_slice(&mut self) -> &mut [T] {
                &mut self.data
            }

            pub fn iter(&self) -> std::slice::Iter<'_, T> {
                self.data.iter()
            }

            pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
                self.data.iter_mut()
            }

            /// Move the storage out, leaving an empty array on the same allocator.
            pub fn take(&mut self) -> Self
            where
                A: Clone,
            {
                let empty = Self::empty_in(self.allocator().clone());
                std::mem::replace(self, empty)
            }

            pub fn into_vec(self) -> Vec<T> {
                self.data.into_iter().collect()
            }

            pub fn into_buffer(self) -> Buffer<T, A> {
                self.data
            }

            /// Raw bytes of the storage.
            pub fn as_bytes(&self) -> &[u8]
            where
                T: bytemuck::Pod,
            {
                bytemuck::cast_slice(&self.data[..])
            }

            #[inline]
            #[track_caller]
            fn offset(&self, index: &[usize; N]) -> usize {
                offset(index, &self.extents, &self.strides)
            }
        }

        impl<T, const N: usize, O: StorageOrder, A: Allocator + Default> Default
            for $name<T, N, O, A>
        {
            fn default() -> Self {
                Self::empty_in(A::default())
            }
        }

        impl<T: Clone, const N: usize, O: StorageOrder, A: Allocator + Clone> Clone
            for $name<T, N, O, A>
        {
            fn clone(&self) -> Self {
                Self {
                    data: self.data.clone(),
                    extents: self.extents,
                    strides: self.strides,
                    _order: PhantomData,
                }
            }

            fn clone_from(&mut self, source: &Self) {
                self.data.clone_from(&source.data);
                self.extents = source.extents;
                self.strides = source.strides;
            }
        }

        impl<T: fmt::Debug, const N: usize, O: StorageOrder, A: Allocator> fmt::Debug
            for $name<T, N, O, A>
        {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("extents", &self.extents)
                    .field("order", &O::KIND)
                    .field("data", &&self.data[..])
                    .finish()
            }
        }

        impl<T: PartialEq, const N: usize, O: StorageOrder, A: Allocator> PartialEq
            for $name<T, N, O, A>
        {
            fn eq(&self, other: &Self) -> bool {
                self.extents == other.extents && self.data[..] == other.data[..]
            }
        }

        impl<T: Eq, const N: usize, O: StorageOrder, A: Allocator> Eq for $name<T, N, O, A> {}

        impl<T, const N: usize, O: StorageOrder, A: Allocator> std::ops::Index<[usize; N]>
            for $name<T, N, O, A>
        {
            type Output = T;

            #[inline]
            #[track_caller]
            fn index(&self, index: [usize; N]) -> &T {
                &self.data[self.offset(&index)]
            }
        }

        impl<T, const N: usize, O: StorageOrder, A: Allocator> std::ops::IndexMut<[usize; N]>
            for $name<T, N, O, A>
        {
            #[inline]
            #[track_caller]
            fn index_mut(&mut self, index: [usize; N]) -> &mut T {
                let at = self.offset(&index);
                &mut self.data[at]
            }
        }

        impl<T, const N: usize, O: StorageOrder, A: Allocator> std::ops::Index<Index<N>>
            for $name<T, N, O, A>
        {
            type Output = T;

            #[inline]
            #[track_caller]
            fn index(&self, index: Index<N>) -> &T {
                &self[index.0]
            }
        }

        impl<T, const N: usize, O: StorageOrder, A: Allocator> std::ops::IndexMut<Index<N>>
            for $name<T, N, O, A>
        {
            #[inline]
            #[track_caller]
            fn index_mut(&mut self, index: Index<N>) -> &mut T {
                &mut self[index.0]
            }
        }

        impl<$($bound)*, const N: usize, O: StorageOrder, A> ArrayLike<N> for $name<T, N, O, A>
        where
            A: Allocator + Clone + 'static,
        {
            type Elem = T;
            type Unit = T;
            type Order = O;
            type Ref<'a> = &'a T where Self: 'a;
            type Flat<'a> = std::iter::Cloned<std::slice::Iter<'a, T>> where Self: 'a;
            type Direct<'a> = std::iter::Cloned<std::slice::Iter<'a, T>> where Self: 'a;

            const CAPS: Capabilities = Capabilities {
                resize: $resize,
                ..Capabilities::DENSE
            };

            #[inline]
            fn extents(&self) -> [usize; N] {
                self.extents
            }

            #[inline]
            fn at(&self, index: &Index<N>) -> &T {
                &self.data[self.offset(&index.0)]
            }

            #[inline]
            fn get(&self, index: &Index<N>) -> T {
                self.data[self.offset(&index.0)].clone()
            }

            #[inline]
            fn flat(&self) -> Self::Flat<'_> {
                self.data.iter().cloned()
            }

            #[inline]
            fn direct(&self) -> Option<Self::Direct<'_>> {
                Some(self.data.iter().cloned())
            }

            fn memory_size(&self) -> Option<usize> {
                Some(std::mem::size_of_val(&self.data[..]))
            }

            fn native_id() -> Option<TypeId> {
                Some(TypeId::of::<Self>())
            }

            fn as_native(&self) -> Option<&dyn Any> {
                Some(self)
            }

            #[inline]
            fn len(&self) -> usize {
                self.data.len()
            }
        }

        impl<$($bound)*, const N: usize, O: StorageOrder, A> ArrayLikeMut<N> for $name<T, N, O, A>
        where
            A: Allocator + Clone + 'static,
        {
            type RefMut<'a> = &'a mut T where Self: 'a;

            #[inline]
            fn at_mut(&mut self, index: &Index<N>) -> &mut T {
                &mut self[index.0]
            }

            #[inline]
            fn set(&mut self, index: &Index<N>, value: T) {
                self[index.0] = value;
            }

            #[track_caller]
            fn fill_flat<I: IntoIterator<Item = T>>(&mut self, items: I) {
                let written = fill_slots(&mut self.data[..], items);
                if written != self.data.len() {
                    fatal(LoopError::ElementCount {
                        len: written,
                        extents: self.extents.to_vec(),
                    });
                }
            }

            #[inline]
            fn direct_mut(&mut self) -> Option<&mut [T]> {
                Some(&mut self.data[..])
            }

            fn native_assign(&mut self, src: &dyn Any) -> bool {
                match src.downcast_ref::<Self>() {
                    Some(src) => {
                        self.clone_from(src);
                        true
                    }
                    None => false,
                }
            }

            fn native_take(&mut self, src: &mut dyn Any) -> bool {
                match src.downcast_mut::<Self>() {
                    Some(src) => {
                        *self = src.take();
                        true
                    }
                    None => false,
                }
            }

            fn as_native_mut(&mut self) -> Option<&mut dyn Any> {
                Some(self)
            }

            fn resize(&mut self, extents: [usize; N]) -> Result<()> {
                self.resize_storage(extents)
            }

            fn release(&mut self) {
                *self = Self::empty_in(self.allocator().clone());
            }
        }

        impl<$($bound)* + Default, const N: usize, O: StorageOrder, A> Construct<N>
            for $name<T, N, O, A>
        where
            A: Allocator + Clone + Default + 'static,
        {
            fn with_extents(extents: [usize; N]) -> Self {
                Self::from_fn_in(extents, |_| T::default(), A::default())
            }

            #[track_caller]
            fn place<I: IntoIterator<Item = T>>(extents: [usize; N], items: I) -> Self {
                Self::from_iter_in(items, extents, A::default())
            }

            fn from_native(src: &dyn Any) -> Option<Self> {
                src.downcast_ref::<Self>().cloned()
            }
        }
    };
}

dense_array! {
    /// Fixed-extent dense array.
    ///
    /// # Example
    ///
    /// ```rust
    /// use loopnest::{Array, ColMajor};
    ///
    /// let a: Array<i32, 2, ColMajor> = Array::from_fn([2, 3], |i| (10 * i[0] + i[1]) as i32);
    /// assert_eq!(a.as_slice(), &[0, 10, 1, 11, 2, 12]);
    /// assert_eq!(a[[1, 2]], 12);
    /// ```
    Array, ResizeKind::Fixed, [T: Clone + 'static]
}

dense_array! {
    /// Dense array that resizes in place, preserving leading elements.
    VecArray, ResizeKind::Preserving, [T: Clone + Default + 'static]
}

impl<T, const N: usize, O: StorageOrder, A: Allocator> Array<T, N, O, A> {
    fn resize_storage(&mut self, extents: [usize; N]) -> Result<()> {
        if extents == self.extents {
            return Ok(());
        }
        Err(LoopError::NotResizable {
            from: self.extents.to_vec(),
            to: extents.to_vec(),
        })
    }
}

impl<T: Default, const N: usize, O: StorageOrder, A: Allocator> VecArray<T, N, O, A> {
    /// Change the extents in place.
    ///
    /// Growing default-constructs the new trailing elements; shrinking drops
    /// the trailing ones. Positions keep their storage offset, not their
    /// coordinates.
    pub fn resize_to(&mut self, extents: [usize; N]) {
        let len: usize = extents.iter().product();
        debug!(
            "VecArray resize {:?} -> {:?} ({} -> {} elements)",
            self.extents,
            extents,
            self.data.len(),
            len
        );
        if len <= self.data.len() {
            self.data.truncate(len);
        } else {
            let grow = len - self.data.len();
            self.data.extend(std::iter::repeat_with(T::default).take(grow));
        }
        self.extents = extents;
        self.strides = O::strides(&extents);
    }

    fn resize_storage(&mut self, extents: [usize; N]) -> Result<()> {
        self.resize_to(extents);
        Ok(())
    }
}

impl<T, const N: usize, O: StorageOrder, A: Allocator> From<Array<T, N, O, A>>
    for VecArray<T, N, O, A>
{
    fn from(array: Array<T, N, O, A>) -> Self {
        VecArray {
            data: array.data,
            extents: array.extents,
            strides: array.strides,
            _order: PhantomData,
        }
    }
}

impl<T, const N: usize, O: StorageOrder, A: Allocator> From<VecArray<T, N, O, A>>
    for Array<T, N, O, A>
{
    fn from(array: VecArray<T, N, O, A>) -> Self {
        Array {
            data: array.data,
            extents: array.extents,
            strides: array.strides,
            _order: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::ColMajor;
    use allocator_api2::alloc::AllocError;
    use std::alloc::Layout;
    use std::cell::Cell;
    use std::ptr::NonNull;
    use std::rc::Rc;

    /// Global allocator that counts allocations.
    #[derive(Clone, Default)]
    struct Counting(Rc<Cell<usize>>);

    unsafe impl Allocator for Counting {
        fn allocate(&self, layout: Layout) -> std::result::Result<NonNull<[u8]>, AllocError> {
            self.0.set(self.0.get() + 1);
            Global.allocate(layout)
        }

        unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
            unsafe { Global.deallocate(ptr, layout) }
        }
    }

    #[test]
    fn from_parts_and_index() {
        let a: Array<i32, 2> = Array::from_parts(vec![1, 2, 3, 4, 5, 6], [2, 3]);
        assert_eq!(a[[0, 2]], 3);
        assert_eq!(a[Index([1, 0])], 4);
        assert_eq!(a.strides(), [3, 1]);
        assert_eq!(a.get(&Index([1, 2])), 6);
    }

    #[test]
    fn col_major_layout() {
        let a: Array<i32, 2, ColMajor> = Array::from_parts(vec![1, 2, 3, 4, 5, 6], [2, 3]);
        assert_eq!(a[[1, 0]], 2);
        assert_eq!(a[[0, 1]], 3);
        assert_eq!(a.strides(), [1, 2]);
    }

    #[test]
    fn element_count_mismatch() {
        let err = Array::<i32, 2>::try_from_parts(vec![1, 2, 3], [2, 2]).unwrap_err();
        assert_eq!(
            err,
            LoopError::ElementCount {
                len: 3,
                extents: vec![2, 2]
            }
        );
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn index_past_extent_is_fatal() {
        let a: Array<u8, 2> = Array::zeros([2, 2]);
        let _ = a[[0, 2]];
    }

    #[test]
    fn take_leaves_empty() {
        let mut a: Array<f64, 1> = Array::ones([4]);
        let b = a.take();
        assert!(a.is_empty());
        assert_eq!(a.extents(), [0]);
        assert_eq!(b.as_slice(), &[1.0; 4]);
    }

    #[test]
    fn capabilities() {
        assert_eq!(<Array<i32, 1> as ArrayLike<1>>::CAPS.resize, ResizeKind::Fixed);
        assert_eq!(<VecArray<i32, 1> as ArrayLike<1>>::CAPS.resize, ResizeKind::Preserving);
        let a: Array<u32, 2> = Array::zeros([3, 5]);
        assert_eq!(ArrayLike::memory_size(&a), Some(60));
        assert_eq!(a.as_bytes().len(), 60);
    }

    #[test]
    fn fixed_array_refuses_resize() {
        let mut a: Array<i32, 1> = Array::zeros([3]);
        assert!(ArrayLikeMut::resize(&mut a, [3]).is_ok());
        assert!(matches!(
            ArrayLikeMut::resize(&mut a, [4]),
            Err(LoopError::NotResizable { .. })
        ));
    }

    #[test]
    fn vec_array_resize_preserves_prefix() {
        let mut a: VecArray<i32, 2> = VecArray::from_parts(vec![1, 2, 3, 4], [2, 2]);
        a.resize_to([3, 2]);
        assert_eq!(a.as_slice(), &[1, 2, 3, 4, 0, 0]);
        a.resize_to([1, 3]);
        assert_eq!(a.as_slice(), &[1, 2, 3]);
        assert_eq!(a.strides(), [3, 1]);
    }

    #[derive(Clone, Default)]
    struct Tracked(Option<Rc<Cell<usize>>>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            if let Some(count) = &self.0 {
                count.set(count.get() + 1);
            }
        }
    }

    #[test]
    fn shrinking_drops_trailing_elements() {
        let dropped = Rc::new(Cell::new(0));
        let items = (0..6).map(|_| Tracked(Some(dropped.clone()))).collect();
        let mut a: VecArray<Tracked, 1> = VecArray::from_parts(items, [6]);
        a.resize_to([4]);
        assert_eq!(dropped.get(), 2);
        drop(a);
        assert_eq!(dropped.get(), 6);
    }

    #[test]
    fn native_paths() {
        let src: Array<i32, 1> = Array::from_parts(vec![1, 2, 3], [3]);
        let mut dst: Array<i32, 1> = Array::zeros([3]);
        assert!(dst.native_assign(&src));
        assert_eq!(dst, src);

        let other: VecArray<i32, 1> = VecArray::zeros([3]);
        assert!(!dst.native_assign(&other));

        let mut moved: Array<i32, 1> = Array::default();
        let mut src = src;
        assert!(moved.native_take(&mut src));
        assert!(src.is_empty());
        assert_eq!(moved.as_slice(), &[1, 2, 3]);
    }

    #[test]
    #[should_panic(expected = "do not fill")]
    fn short_fill_is_fatal() {
        let mut a: Array<i32, 1> = Array::zeros([3]);
        a.fill_flat([1, 2]);
    }

    #[test]
    #[should_panic(expected = "4 elements do not fill")]
    fn overfull_fill_is_fatal() {
        let mut a: Array<i32, 1> = Array::zeros([3]);
        a.fill_flat([1, 2, 3, 4]);
    }

    #[test]
    #[should_panic(expected = "3 elements do not fill")]
    fn overfull_place_is_fatal() {
        let _ = VecArray::<i32, 1>::place([2], 0..);
    }

    #[test]
    fn storage_comes_from_the_given_allocator() {
        let counter = Counting::default();
        let a: Array<i32, 2, RowMajor, Counting> =
            Array::from_fn_in([2, 3], |i| (i[0] * 3 + i[1]) as i32, counter.clone());
        assert_eq!(counter.0.get(), 1);
        assert_eq!(a.as_slice(), &[0, 1, 2, 3, 4, 5]);

        let b = a.clone();
        assert_eq!(counter.0.get(), 2);
        assert_eq!(b, a);

        let mut v: VecArray<i32, 1, RowMajor, Counting> =
            VecArray::filled_in([2], 7, counter.clone());
        assert_eq!(counter.0.get(), 3);
        v.resize_to([40]);
        assert!(counter.0.get() >= 4);
        assert_eq!(v[[1]], 7);
        assert_eq!(v[[39]], 0);
        assert!(Rc::ptr_eq(&v.allocator().0, &counter.0));

        // Released storage keeps its allocator.
        let mut moved: VecArray<i32, 1, RowMajor, Counting> = VecArray::default();
        assert!(moved.native_take(&mut v));
        assert!(v.is_empty());
        assert!(Rc::ptr_eq(&v.allocator().0, &counter.0));
        assert_eq!(moved.len(), 40);
    }

    #[test]
    fn conversions() {
        let a: Array<i32, 2> = Array::from_fn([2, 2], |i| (i[0] * 2 + i[1]) as i32);
        let v: VecArray<i32, 2> = a.clone().into();
        assert_eq!(v.as_slice(), a.as_slice());
        let back: Array<i32, 2> = v.into();
        assert_eq!(back, a);
    }
}

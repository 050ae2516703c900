//! Bit-packed boolean arrays.
//!
//! A [`BitArray`] stores [`WORD_BITS`] booleans per `u64` word, in storage
//! order, least significant bit first. Bits past the last element of the last
//! word are always zero; every write path (including writes through the
//! direct view followed by [`ArrayLikeMut::fixup_direct`]) keeps it that way,
//! which is what makes whole-word comparison and the wordwise operators sound.
//!
//! Elements are reached through the proxies [`BitRef`] and [`BitMut`].

use crate::caps::{ArrayLike, ArrayLikeMut, Capabilities, Construct, Packing, ResizeKind};
use crate::flat::IndexWalker;
use crate::index::Index;
use crate::order::{offset, RowMajor, StorageOrder};
use crate::{fatal, LoopError, Result, WORD_BITS};
use allocator_api2::alloc::{Allocator, Global};
use allocator_api2::vec::Vec as Buffer;
use log::debug;
use std::any::{Any, TypeId};
use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;

#[inline(always)]
fn words_for(len: usize) -> usize {
    len.div_ceil(WORD_BITS)
}

#[inline(always)]
fn split(position: usize) -> (usize, u32) {
    (position / WORD_BITS, (position % WORD_BITS) as u32)
}

/// Mask of the used bits in the last word of a `len`-bit buffer.
#[inline(always)]
fn tail_mask(len: usize) -> u64 {
    match len % WORD_BITS {
        0 => u64::MAX,
        used => (1u64 << used) - 1,
    }
}

/// Read-only proxy for one packed element.
#[derive(Clone, Copy)]
pub struct BitRef<'a> {
    word: &'a u64,
    bit: u32,
}

impl BitRef<'_> {
    #[inline]
    pub fn get(self) -> bool {
        (*self.word >> self.bit) & 1 == 1
    }
}

impl fmt::Debug for BitRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.get(), f)
    }
}

impl From<BitRef<'_>> for bool {
    #[inline]
    fn from(r: BitRef<'_>) -> bool {
        r.get()
    }
}

impl PartialEq<bool> for BitRef<'_> {
    #[inline]
    fn eq(&self, other: &bool) -> bool {
        self.get() == *other
    }
}

impl PartialEq for BitRef<'_> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

/// Writable proxy for one packed element.
pub struct BitMut<'a> {
    word: &'a mut u64,
    bit: u32,
}

impl BitMut<'_> {
    #[inline]
    pub fn get(&self) -> bool {
        (*self.word >> self.bit) & 1 == 1
    }

    #[inline]
    pub fn set(&mut self, value: bool) {
        let mask = 1u64 << self.bit;
        if value {
            *self.word |= mask;
        } else {
            *self.word &= !mask;
        }
    }

    /// Copy the element another proxy refers to.
    #[inline]
    pub fn assign(&mut self, other: BitRef<'_>) {
        self.set(other.get());
    }
}

impl fmt::Debug for BitMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.get(), f)
    }
}

impl From<BitMut<'_>> for bool {
    #[inline]
    fn from(r: BitMut<'_>) -> bool {
        r.get()
    }
}

/// Flat view of packed booleans.
#[derive(Clone)]
pub struct Bits<'a> {
    words: &'a [u64],
    pos: usize,
    len: usize,
}

impl Iterator for Bits<'_> {
    type Item = bool;

    #[inline]
    fn next(&mut self) -> Option<bool> {
        if self.pos == self.len {
            return None;
        }
        let (w, b) = split(self.pos);
        self.pos += 1;
        Some((self.words[w] >> b) & 1 == 1)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.len - self.pos;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Bits<'_> {}

impl FusedIterator for Bits<'_> {}

/// Resizable array of packed booleans.
pub struct BitArray<const N: usize, O: StorageOrder = RowMajor, A: Allocator = Global> {
    words: Buffer<u64, A>,
    len: usize,
    extents: [usize; N],
    strides: [usize; N],
    _order: PhantomData<O>,
}

impl<const N: usize, O: StorageOrder> BitArray<N, O> {
    /// All elements `false`.
    pub fn zeros(extents: [usize; N]) -> Self {
        Self::zeros_in(extents, Global)
    }

    pub fn filled(extents: [usize; N], value: bool) -> Self {
        Self::filled_in(extents, value, Global)
    }

    /// Pack `items`, given in storage order.
    #[track_caller]
    pub fn from_bools<I: IntoIterator<Item = bool>>(items: I, extents: [usize; N]) -> Self {
        Self::from_bools_in(items, extents, Global)
    }

    pub fn try_from_bools<I: IntoIterator<Item = bool>>(
        items: I,
        extents: [usize; N],
    ) -> Result<Self> {
        Self::try_from_bools_in(items, extents, Global)
    }

    pub fn from_fn<F: FnMut(&Index<N>) -> bool>(extents: [usize; N], f: F) -> Self {
        Self::from_fn_in(extents, f, Global)
    }
}

impl<const N: usize, O: StorageOrder, A: Allocator> BitArray<N, O, A> {
    /// All elements `false`, words from `alloc`.
    pub fn zeros_in(extents: [usize; N], alloc: A) -> Self {
        let len = extents.iter().product();
        let count = words_for(len);
        let mut words = Buffer::with_capacity_in(count, alloc);
        words.extend(std::iter::repeat(0u64).take(count));
        BitArray {
            words,
            len,
            extents,
            strides: O::strides(&extents),
            _order: PhantomData,
        }
    }

    pub fn filled_in(extents: [usize; N], value: bool, alloc: A) -> Self {
        let mut out = Self::zeros_in(extents, alloc);
        if value {
            out.words.fill(u64::MAX);
            out.clear_padding();
        }
        out
    }

    #[track_caller]
    pub fn from_bools_in<I: IntoIterator<Item = bool>>(
        items: I,
        extents: [usize; N],
        alloc: A,
    ) -> Self {
        match Self::try_from_bools_in(items, extents, alloc) {
            Ok(bits) => bits,
            Err(err) => fatal(err),
        }
    }

    pub fn try_from_bools_in<I: IntoIterator<Item = bool>>(
        items: I,
        extents: [usize; N],
        alloc: A,
    ) -> Result<Self> {
        let mut out = Self::zeros_in(extents, alloc);
        let written = out.pack(items);
        if written != out.len {
            return Err(LoopError::ElementCount {
                len: written,
                extents: extents.to_vec(),
            });
        }
        Ok(out)
    }

    pub fn from_fn_in<F>(extents: [usize; N], mut f: F, alloc: A) -> Self
    where
        F: FnMut(&Index<N>) -> bool,
    {
        let mut out = Self::zeros_in(extents, alloc);
        out.pack(IndexWalker::new::<O>(extents).map(|idx| f(&idx)));
        out
    }

    /// No elements; later growth allocates from `alloc`.
    pub fn empty_in(alloc: A) -> Self {
        BitArray {
            words: Buffer::new_in(alloc),
            len: 0,
            extents: [0; N],
            strides: [0; N],
            _order: PhantomData,
        }
    }

    #[inline]
    pub fn allocator(&self) -> &A {
        self.words.allocator()
    }

    #[inline]
    pub fn extents(&self) -> [usize; N] {
        self.extents
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Storage words; padding bits are zero.
    #[inline]
    pub fn as_words(&self) -> &[u64] {
        &self.words
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words[..])
    }

    #[inline]
    pub fn iter(&self) -> Bits<'_> {
        Bits {
            words: &self.words,
            pos: 0,
            len: self.len,
        }
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Move the storage out, leaving an empty array on the same allocator.
    pub fn take(&mut self) -> Self
    where
        A: Clone,
    {
        let empty = Self::empty_in(self.allocator().clone());
        std::mem::replace(self, empty)
    }

    /// Change the extents in place, keeping the leading elements in storage
    /// order. New elements are `false`.
    pub fn resize_to(&mut self, extents: [usize; N]) {
        let len: usize = extents.iter().product();
        debug!(
            "BitArray resize {:?} -> {:?} ({} -> {} bits)",
            self.extents, extents, self.len, len
        );
        let count = words_for(len);
        if count <= self.words.len() {
            self.words.truncate(count);
        } else {
            let grow = count - self.words.len();
            self.words.extend(std::iter::repeat(0u64).take(grow));
        }
        self.len = len;
        self.extents = extents;
        self.strides = O::strides(&extents);
        self.clear_padding();
    }

    /// Wordwise AND. Both operands must have the same extents.
    #[track_caller]
    pub fn fast_and(&self, other: &Self) -> Self
    where
        A: Clone,
    {
        self.combine(other, |a, b| a & b)
    }

    /// Wordwise OR. Both operands must have the same extents.
    #[track_caller]
    pub fn fast_or(&self, other: &Self) -> Self
    where
        A: Clone,
    {
        self.combine(other, |a, b| a | b)
    }

    /// Wordwise XOR. Both operands must have the same extents.
    #[track_caller]
    pub fn fast_xor(&self, other: &Self) -> Self
    where
        A: Clone,
    {
        self.combine(other, |a, b| a ^ b)
    }

    /// Wordwise NOT.
    pub fn fast_not(&self) -> Self
    where
        A: Clone,
    {
        let mut words = Buffer::with_capacity_in(self.words.len(), self.allocator().clone());
        words.extend(self.words.iter().map(|w| !w));
        let mut out = self.with_words(words);
        out.clear_padding();
        out
    }

    #[track_caller]
    fn combine(&self, other: &Self, op: impl Fn(u64, u64) -> u64) -> Self
    where
        A: Clone,
    {
        crate::caps::assert_same_extents(&self.extents, &other.extents);
        let mut words = Buffer::with_capacity_in(self.words.len(), self.allocator().clone());
        words.extend(self.words.iter().zip(other.words.iter()).map(|(&a, &b)| op(a, b)));
        self.with_words(words)
    }

    /// Same shape as `self` over `words`.
    fn with_words(&self, words: Buffer<u64, A>) -> Self {
        BitArray {
            words,
            len: self.len,
            extents: self.extents,
            strides: self.strides,
            _order: PhantomData,
        }
    }

    /// Overwrite from the front; returns how many bits were written.
    fn pack<I: IntoIterator<Item = bool>>(&mut self, items: I) -> usize {
        self.words.fill(0);
        let mut written = 0usize;
        for value in items.into_iter().take(self.len + 1) {
            if written == self.len {
                // One past the end: report the overflow without writing.
                return written + 1;
            }
            if value {
                let (w, b) = split(written);
                self.words[w] |= 1 << b;
            }
            written += 1;
        }
        written
    }

    fn clear_padding(&mut self) {
        let mask = tail_mask(self.len);
        if let Some(last) = self.words.last_mut() {
            *last &= mask;
        }
    }

    #[inline]
    #[track_caller]
    fn position(&self, index: &[usize; N]) -> (usize, u32) {
        split(offset(index, &self.extents, &self.strides))
    }
}

impl<const N: usize, O: StorageOrder, A: Allocator + Default> Default for BitArray<N, O, A> {
    fn default() -> Self {
        Self::empty_in(A::default())
    }
}

impl<const N: usize, O: StorageOrder, A: Allocator + Clone> Clone for BitArray<N, O, A> {
    fn clone(&self) -> Self {
        BitArray {
            words: self.words.clone(),
            len: self.len,
            extents: self.extents,
            strides: self.strides,
            _order: PhantomData,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.words.clone_from(&source.words);
        self.len = source.len;
        self.extents = source.extents;
        self.strides = source.strides;
    }
}

impl<const N: usize, O: StorageOrder, A: Allocator> PartialEq for BitArray<N, O, A> {
    fn eq(&self, other: &Self) -> bool {
        self.extents == other.extents && self.words[..] == other.words[..]
    }
}

impl<const N: usize, O: StorageOrder, A: Allocator> Eq for BitArray<N, O, A> {}

impl<const N: usize, O: StorageOrder, A: Allocator> fmt::Debug for BitArray<N, O, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits: String = self.iter().map(|b| if b { '1' } else { '0' }).collect();
        f.debug_struct("BitArray")
            .field("extents", &self.extents)
            .field("order", &O::KIND)
            .field("bits", &bits)
            .finish()
    }
}

impl<const N: usize, O: StorageOrder, A: Allocator> std::ops::Index<[usize; N]>
    for BitArray<N, O, A>
{
    type Output = bool;

    #[inline]
    #[track_caller]
    fn index(&self, index: [usize; N]) -> &bool {
        let (w, b) = self.position(&index);
        if (self.words[w] >> b) & 1 == 1 {
            &true
        } else {
            &false
        }
    }
}

impl<const N: usize, O: StorageOrder, A> ArrayLike<N> for BitArray<N, O, A>
where
    A: Allocator + Clone + 'static,
{
    type Elem = bool;
    type Unit = u64;
    type Order = O;
    type Ref<'a> = BitRef<'a> where Self: 'a;
    type Flat<'a> = Bits<'a> where Self: 'a;
    type Direct<'a> = std::iter::Copied<std::slice::Iter<'a, u64>> where Self: 'a;

    const CAPS: Capabilities = Capabilities {
        native: true,
        direct_view: true,
        fast_flat_view: true,
        resize: ResizeKind::Preserving,
        memory_size: true,
        placement: true,
        packing: Packing::Bits {
            per_unit: WORD_BITS as u32,
        },
    };

    #[inline]
    fn extents(&self) -> [usize; N] {
        self.extents
    }

    #[inline]
    fn at(&self, index: &Index<N>) -> BitRef<'_> {
        let (w, bit) = self.position(&index.0);
        BitRef {
            word: &self.words[w],
            bit,
        }
    }

    #[inline]
    fn get(&self, index: &Index<N>) -> bool {
        self.at(index).get()
    }

    #[inline]
    fn flat(&self) -> Bits<'_> {
        self.iter()
    }

    #[inline]
    fn direct(&self) -> Option<Self::Direct<'_>> {
        Some(self.words.iter().copied())
    }

    fn memory_size(&self) -> Option<usize> {
        Some(std::mem::size_of_val(&self.words[..]))
    }

    fn native_id() -> Option<TypeId> {
        Some(TypeId::of::<Self>())
    }

    fn as_native(&self) -> Option<&dyn Any> {
        Some(self)
    }

    #[inline]
    fn len(&self) -> usize {
        self.len
    }
}

impl<const N: usize, O: StorageOrder, A> ArrayLikeMut<N> for BitArray<N, O, A>
where
    A: Allocator + Clone + 'static,
{
    type RefMut<'a> = BitMut<'a> where Self: 'a;

    #[inline]
    fn at_mut(&mut self, index: &Index<N>) -> BitMut<'_> {
        let (w, bit) = self.position(&index.0);
        BitMut {
            word: &mut self.words[w],
            bit,
        }
    }

    #[inline]
    fn set(&mut self, index: &Index<N>, value: bool) {
        self.at_mut(index).set(value);
    }

    #[track_caller]
    fn fill_flat<I: IntoIterator<Item = bool>>(&mut self, items: I) {
        let written = self.pack(items);
        if written != self.len {
            fatal(LoopError::ElementCount {
                len: written,
                extents: self.extents.to_vec(),
            });
        }
    }

    #[inline]
    fn direct_mut(&mut self) -> Option<&mut [u64]> {
        Some(&mut self.words[..])
    }

    fn fixup_direct(&mut self) {
        self.clear_padding();
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
        self.resize_to(extents);
        Ok(())
    }

    fn release(&mut self) {
        *self = Self::empty_in(self.allocator().clone());
    }
}

impl<const N: usize, O: StorageOrder, A> Construct<N> for BitArray<N, O, A>
where
    A: Allocator + Clone + Default + 'static,
{
    fn with_extents(extents: [usize; N]) -> Self {
        Self::zeros_in(extents, A::default())
    }

    #[track_caller]
    fn place<I: IntoIterator<Item = bool>>(extents: [usize; N], items: I) -> Self {
        Self::from_bools_in(items, extents, A::default())
    }

    fn from_native(src: &dyn Any) -> Option<Self> {
        src.downcast_ref::<Self>().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::ColMajor;
    use rand::{Rng, SeedableRng};

    fn random_bits(rng: &mut impl Rng, len: usize) -> BitArray<1> {
        BitArray::from_bools((0..len).map(|_| rng.gen_bool(0.5)), [len])
    }

    #[test]
    fn proxies_read_and_write() {
        let mut bits: BitArray<2> = BitArray::zeros([3, 30]);
        bits.at_mut(&Index([2, 29])).set(true);
        assert!(bits.get(&Index([2, 29])));
        assert!(bits[[2, 29]]);
        assert_eq!(bits.count_ones(), 1);

        let src: BitArray<1> = BitArray::from_bools([true, false], [2]);
        let mut dst: BitArray<1> = BitArray::zeros([2]);
        dst.at_mut(&Index([1])).assign(src.at(&Index([0])));
        assert_eq!(dst.at(&Index([1])), true);
        assert!(!bool::from(dst.at(&Index([0]))));
    }

    #[test]
    fn col_major_packing() {
        let bits: BitArray<2, ColMajor> = BitArray::from_fn([2, 2], |i| i[0] == 1);
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![false, true, false, true]);
        assert_eq!(bits.as_words(), &[0b1010]);
    }

    #[test]
    fn padding_stays_clear() {
        let ones: BitArray<1> = BitArray::filled([70], true);
        assert_eq!(ones.as_words(), &[u64::MAX, 0b11_1111]);
        let flipped = BitArray::<1>::zeros([70]).fast_not();
        assert_eq!(flipped, ones);
        assert_eq!(flipped.fast_not().count_ones(), 0);
    }

    #[test]
    fn fast_ops_match_proxy_ops() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for len in 1..=129 {
            let a = random_bits(&mut rng, len);
            let b = random_bits(&mut rng, len);
            let and = a.fast_and(&b);
            let or = a.fast_or(&b);
            let xor = a.fast_xor(&b);
            let not = a.fast_not();
            for i in 0..len {
                let idx = Index([i]);
                let (x, y) = (a.get(&idx), b.get(&idx));
                assert_eq!(and.get(&idx), x & y, "and at {i} of {len}");
                assert_eq!(or.get(&idx), x | y, "or at {i} of {len}");
                assert_eq!(xor.get(&idx), x ^ y, "xor at {i} of {len}");
                assert_eq!(not.get(&idx), !x, "not at {i} of {len}");
            }
            assert_eq!(not.count_ones(), len - a.count_ones());
        }
    }

    #[test]
    fn resize_keeps_prefix() {
        let mut bits: BitArray<1> = BitArray::filled([66], true);
        bits.resize_to([3]);
        assert_eq!(bits.as_words(), &[0b111]);
        bits.resize_to([5]);
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![true, true, true, false, false]);
    }

    #[test]
    fn fill_counts_are_checked() {
        assert!(BitArray::<1>::try_from_bools([true; 3], [2]).is_err());
        assert!(BitArray::<1>::try_from_bools([true; 1], [2]).is_err());
        let bits = BitArray::<1>::try_from_bools([true; 2], [2]).unwrap();
        assert_eq!(bits.len(), 2);
    }

    #[test]
    #[should_panic(expected = "4 elements do not fill")]
    fn overfull_fill_is_fatal() {
        let mut bits: BitArray<1> = BitArray::zeros([3]);
        bits.fill_flat([true; 4]);
    }

    #[test]
    fn wordwise_results_share_the_allocator() {
        let bits: BitArray<1, RowMajor, Global> = BitArray::filled_in([70], true, Global);
        let flipped = bits.fast_not();
        assert_eq!(flipped.count_ones(), 0);
        assert_eq!(bits.fast_or(&flipped), bits);

        let mut moved: BitArray<1> = BitArray::default();
        let mut src = bits.clone();
        assert!(moved.native_take(&mut src));
        assert!(src.as_words().is_empty());
        assert_eq!(moved, bits);
    }

    #[test]
    fn direct_view_and_bytes() {
        let bits: BitArray<1> = BitArray::from_bools([true, true, false, true], [4]);
        assert_eq!(bits.direct().map(|d| d.collect::<Vec<_>>()), Some(vec![0b1011]));
        assert_eq!(bits.as_bytes().len(), 8);
        assert_eq!(ArrayLike::memory_size(&bits), Some(8));
    }
}

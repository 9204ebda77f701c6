//! Wrapper around `Box<[T; LEN]>` with a custom `bincode::Decode` implementation that
//! deserializes directly into heap memory.
//!
//! The implementation that `#[derive(Decode)]` generates for `Box<[T; LEN]>` deserializes into
//! stack memory and then moves to the heap, which is a problem for 64KB video memory banks.

use bincode::de::{BorrowDecoder, Decoder};
use bincode::error::DecodeError;
use bincode::{BorrowDecode, Decode, Encode};
use std::ops::{Deref, DerefMut};

#[derive(Debug, Clone, PartialEq, Eq, Encode)]
pub struct BoxedArray<T, const LEN: usize>(Box<[T; LEN]>);

pub type BoxedByteArray<const LEN: usize> = BoxedArray<u8, LEN>;
pub type BoxedWordArray<const LEN: usize> = BoxedArray<u16, LEN>;

fn new_boxed<T: Copy + Default, const LEN: usize>() -> Box<[T; LEN]> {
    let slice = vec![T::default(); LEN].into_boxed_slice();

    // Length is LEN by construction
    match slice.try_into() {
        Ok(array) => array,
        Err(_) => unreachable!("boxed slice length always matches the array length"),
    }
}

impl<T: Copy + Default, const LEN: usize> BoxedArray<T, LEN> {
    #[must_use]
    pub fn new() -> Self {
        Self(new_boxed())
    }
}

impl<T: Copy + Default, const LEN: usize> Default for BoxedArray<T, LEN> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const LEN: usize> From<Box<[T; LEN]>> for BoxedArray<T, LEN> {
    fn from(value: Box<[T; LEN]>) -> Self {
        Self(value)
    }
}

impl<T, const LEN: usize> Deref for BoxedArray<T, LEN> {
    type Target = Box<[T; LEN]>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T, const LEN: usize> DerefMut for BoxedArray<T, LEN> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T, const LEN: usize, Context> Decode<Context> for BoxedArray<T, LEN>
where
    T: Copy + Default + Decode<Context>,
{
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let mut array: Box<[T; LEN]> = new_boxed();

        for value in array.as_mut() {
            *value = T::decode(decoder)?;
        }

        Ok(Self(array))
    }
}

impl<'de, T, const LEN: usize, Context> BorrowDecode<'de, Context> for BoxedArray<T, LEN>
where
    T: Copy + Default + Decode<Context>,
{
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        let mut array: Box<[T; LEN]> = new_boxed();

        for value in array.as_mut() {
            *value = T::decode(decoder)?;
        }

        Ok(Self(array))
    }
}

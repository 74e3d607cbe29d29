//! Growable arrays of fixed size records backed by a single byte buffer.
//!
//! The byte layout of a record is described by a [`StructArrayLayout`], which is generated
//! together with a typed `emplace_back`/`get` API by the `struct_array!` macro. The bytes can
//! be handed to a GPU without any conversion.
//!
//! Values are stored with the width of their field. Callers convert with `as`, so an integer
//! which does not fit into its field silently wraps around. This is a known limitation shared
//! with the buffers consumed by existing renderers.

use std::{fmt, fmt::Formatter, marker::PhantomData};

use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

/// Records a fresh array can hold before it needs to allocate again.
pub const DEFAULT_CAPACITY: usize = 128;
pub const RESIZE_MULTIPLIER: usize = 5;

/// Numeric type of a single member of a record.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViewType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
}

impl ViewType {
    pub const fn size(self) -> usize {
        match self {
            ViewType::Int8 | ViewType::Uint8 => 1,
            ViewType::Int16 | ViewType::Uint16 => 2,
            ViewType::Int32 | ViewType::Uint32 | ViewType::Float32 => 4,
        }
    }
}

/// Rust types which can be stored in a record.
pub trait Field: bytemuck::Pod {
    const VIEW_TYPE: ViewType;
}

macro_rules! impl_field {
    ($($ty:ty => $view_type:ident),+) => {
        $(impl Field for $ty {
            const VIEW_TYPE: ViewType = ViewType::$view_type;
        })+
    };
}

impl_field!(
    i8 => Int8,
    u8 => Uint8,
    i16 => Int16,
    u16 => Uint16,
    i32 => Int32,
    u32 => Uint32,
    f32 => Float32
);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StructArrayMember {
    pub name: &'static str,
    pub view_type: ViewType,
    /// Byte offset within a record
    pub offset: usize,
}

impl StructArrayMember {
    pub const fn new(name: &'static str, view_type: ViewType) -> Self {
        Self {
            name,
            view_type,
            offset: 0,
        }
    }
}

const fn align(offset: usize, size: usize) -> usize {
    ((offset + size - 1) / size) * size
}

/// Assigns offsets to `members`. Every member is aligned to its own size.
pub const fn create_layout<const N: usize>(
    mut members: [StructArrayMember; N],
) -> [StructArrayMember; N] {
    let mut offset = 0;
    let mut i = 0;
    while i < N {
        let size = members[i].view_type.size();
        offset = align(offset, size);
        members[i].offset = offset;
        offset += size;
        i += 1;
    }
    members
}

/// Size of a record, padded to the largest member or `alignment`, whichever is larger.
pub const fn layout_size(members: &[StructArrayMember], alignment: usize) -> usize {
    let mut end = 0;
    let mut max_size = 1;
    let mut i = 0;
    while i < members.len() {
        let size = members[i].view_type.size();
        end = members[i].offset + size;
        if size > max_size {
            max_size = size;
        }
        i += 1;
    }
    let alignment = if alignment > max_size {
        alignment
    } else {
        max_size
    };
    align(end, alignment)
}

pub trait StructArrayLayout: 'static {
    const NAME: &'static str;
    const MEMBERS: &'static [StructArrayMember];
    const ALIGNMENT: usize;
    const BYTES_PER_ELEMENT: usize = layout_size(Self::MEMBERS, Self::ALIGNMENT);
}

/// An array of records with the layout `L`.
///
/// The length is tracked separately from the capacity of the underlying buffer. The buffer grows
/// by [`RESIZE_MULTIPLIER`] and never shrinks unless [`StructArray::trim`] is called.
pub struct StructArray<L: StructArrayLayout> {
    array_buffer: Vec<u8>,
    length: usize,
    capacity: usize,
    layout: PhantomData<L>,
}

impl<L: StructArrayLayout> StructArray<L> {
    pub fn new() -> Self {
        Self {
            array_buffer: vec![0; DEFAULT_CAPACITY * L::BYTES_PER_ELEMENT],
            length: 0,
            capacity: DEFAULT_CAPACITY,
            layout: PhantomData,
        }
    }

    pub fn members() -> &'static [StructArrayMember] {
        L::MEMBERS
    }

    pub fn bytes_per_element() -> usize {
        L::BYTES_PER_ELEMENT
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn byte_len(&self) -> usize {
        self.length * L::BYTES_PER_ELEMENT
    }

    /// The bytes of all written records.
    pub fn as_bytes(&self) -> &[u8] {
        &self.array_buffer[..self.byte_len()]
    }

    /// Makes room for `additional` records past the current length. Indices which are already
    /// written stay valid.
    pub fn reserve(&mut self, additional: usize) {
        self.ensure_capacity(self.length + additional);
    }

    /// Sets the length to `n`, growing the buffer if needed.
    pub fn resize(&mut self, n: usize) {
        self.ensure_capacity(n);
        self.length = n;
    }

    pub fn clear(&mut self) {
        self.length = 0;
    }

    /// Drops the capacity which is not used by records.
    pub fn trim(&mut self) {
        if self.length != self.capacity {
            self.capacity = self.length;
            self.array_buffer.truncate(self.byte_len());
            self.array_buffer.shrink_to_fit();
        }
    }

    /// Appends a copy of the record at `index` and returns the index of the copy.
    pub fn duplicate(&mut self, index: usize) -> usize {
        let stride = L::BYTES_PER_ELEMENT;
        let copy = self.length;
        self.resize(copy + 1);
        self.array_buffer
            .copy_within(index * stride..(index + 1) * stride, copy * stride);
        copy
    }

    fn ensure_capacity(&mut self, n: usize) {
        if n > self.capacity {
            self.capacity = n.max(self.capacity * RESIZE_MULTIPLIER);
            self.array_buffer
                .resize(self.capacity * L::BYTES_PER_ELEMENT, 0);
        }
    }

    pub(crate) fn ensure_len(&mut self, n: usize) {
        if n > self.length {
            self.resize(n);
        }
    }

    /// Writes `value` to the member with index `member` of record `index`.
    pub(crate) fn write_member<T: Field>(&mut self, index: usize, member: usize, value: T) {
        let member = &L::MEMBERS[member];
        debug_assert_eq!(member.view_type, T::VIEW_TYPE);
        let start = index * L::BYTES_PER_ELEMENT + member.offset;
        self.array_buffer[start..start + std::mem::size_of::<T>()]
            .copy_from_slice(bytemuck::bytes_of(&value));
    }

    /// Reads the member with index `member` of record `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`StructArray::len`].
    pub(crate) fn read_member<T: Field>(&self, index: usize, member: usize) -> T {
        assert!(index < self.length, "record {index} out of bounds");
        let member = &L::MEMBERS[member];
        debug_assert_eq!(member.view_type, T::VIEW_TYPE);
        let start = index * L::BYTES_PER_ELEMENT + member.offset;
        bytemuck::pod_read_unaligned(&self.array_buffer[start..start + std::mem::size_of::<T>()])
    }
}

impl<L: StructArrayLayout> Default for StructArray<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: StructArrayLayout> Clone for StructArray<L> {
    fn clone(&self) -> Self {
        Self {
            array_buffer: self.array_buffer.clone(),
            length: self.length,
            capacity: self.capacity,
            layout: PhantomData,
        }
    }
}

impl<L: StructArrayLayout> fmt::Debug for StructArray<L> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(length={}, capacity={})",
            L::NAME,
            self.length,
            self.capacity
        )
    }
}

#[derive(Serialize)]
struct SerializedStructArrayRef<'a> {
    layout: &'a str,
    length: usize,
    bytes: &'a [u8],
}

#[derive(Deserialize)]
struct SerializedStructArray {
    layout: String,
    length: usize,
    bytes: Vec<u8>,
}

/// Only the written records are serialized.
impl<L: StructArrayLayout> Serialize for StructArray<L> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SerializedStructArrayRef {
            layout: L::NAME,
            length: self.length,
            bytes: self.as_bytes(),
        }
        .serialize(serializer)
    }
}

impl<'de, L: StructArrayLayout> Deserialize<'de> for StructArray<L> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let serialized = SerializedStructArray::deserialize(deserializer)?;

        if serialized.layout != L::NAME {
            return Err(D::Error::custom(format!(
                "expected layout {} but got {}",
                L::NAME,
                serialized.layout
            )));
        }

        if serialized.bytes.len() != serialized.length * L::BYTES_PER_ELEMENT {
            return Err(D::Error::custom(format!(
                "{} bytes do not hold {} records of {}",
                serialized.bytes.len(),
                serialized.length,
                L::NAME
            )));
        }

        Ok(Self {
            array_buffer: serialized.bytes,
            length: serialized.length,
            capacity: serialized.length,
            layout: PhantomData,
        })
    }
}

/// Declares a [`StructArray`] type alias, its layout and a record type with typed accessors.
///
/// ```ignore
/// struct_array! {
///     pub struct PosArray(PosLayout, align = 4) -> Pos { x: i16, y: i16 }
/// }
/// ```
macro_rules! struct_array {
    (
        $(#[$meta:meta])*
        $vis:vis struct $array:ident($layout:ident, align = $align:literal) -> $record:ident {
            $($field:ident: $ty:ty),+ $(,)?
        }
    ) => {
        #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
        $vis struct $layout;

        impl $crate::struct_array::StructArrayLayout for $layout {
            const NAME: &'static str = stringify!($array);
            const MEMBERS: &'static [$crate::struct_array::StructArrayMember] =
                &$crate::struct_array::create_layout([$(
                    $crate::struct_array::StructArrayMember::new(
                        stringify!($field),
                        <$ty as $crate::struct_array::Field>::VIEW_TYPE,
                    )
                ),+]);
            const ALIGNMENT: usize = $align;
        }

        #[derive(Copy, Clone, Debug, Default, PartialEq)]
        $vis struct $record {
            $(pub $field: $ty),+
        }

        $(#[$meta])*
        $vis type $array = $crate::struct_array::StructArray<$layout>;

        impl $crate::struct_array::StructArray<$layout> {
            /// Appends a record and returns its index.
            #[allow(clippy::too_many_arguments)]
            pub fn emplace_back(&mut self, $($field: $ty),+) -> usize {
                let index = self.len();
                self.emplace(index, $($field),+)
            }

            /// Writes the record at `index`. The array grows if `index` is past its end.
            #[allow(clippy::too_many_arguments)]
            pub fn emplace(&mut self, index: usize, $($field: $ty),+) -> usize {
                self.ensure_len(index + 1);
                let mut member = 0;
                $(
                    self.write_member(index, member, $field);
                    member += 1;
                )+
                debug_assert_eq!(member, Self::members().len());
                index
            }

            pub fn get(&self, index: usize) -> $record {
                let mut member = 0;
                $(
                    let $field = self.read_member::<$ty>(index, member);
                    member += 1;
                )+
                let _ = member;
                $record { $($field),+ }
            }
        }
    };
}

mod array_types;

pub use array_types::*;

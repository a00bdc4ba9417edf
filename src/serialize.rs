//! Stream serialization for [`OrderedMap`] and [`OrderedSet`].
//!
//! Two wire formats share one little-endian, fixed-width layout:
//!
//! - **Flat**: a header (`u32` protocol version, `u64` element count, `u64`
//!   bucket count, `f32` max load factor), the elements in insertion order,
//!   then one `(u32 position_or_sentinel, u32 truncated_hash)` record per
//!   bucket.
//! - **Chunked**: the same content framed as `(u32 kind, u32 byte_len,
//!   bytes)` chunks of kind [`ChunkKind::Header`], [`ChunkKind::DataElements`],
//!   [`ChunkKind::DataBuckets`], and a terminating [`ChunkKind::End`].
//!   Element and bucket sequences may span several consecutive frames of the
//!   same kind, but a single value never straddles a frame boundary. The
//!   header counts are authoritative; a frame's `byte_len` only bounds reads
//!   inside that frame.
//!
//! Loading supports two modes. The portable mode rehashes every element and
//! ignores the stored bucket records, so any hasher works. The
//! *hash-compatible* mode copies the bucket records verbatim, skipping every
//! hash computation; it is only sound when the reading table uses the same
//! hasher state, equality, and position width as the writer did. None of
//! that can be checked from the stream, and a mismatch leaves the table
//! corrupt.
//!
//! Chunked deserialization is resumable: when a stream breaks mid-way, the
//! partially-filled table can be handed a continuation stream (header
//! included; it is validated and skipped) and loading picks up where it
//! stopped.
//!
//! Keys and values travel through the [`Encode`] and [`Decode`] traits,
//! implemented here for the primitive types, `String`, `Option`, `Vec`, and
//! pairs.
//!
//! [`OrderedMap`]: crate::OrderedMap
//! [`OrderedSet`]: crate::OrderedSet

use std::io;
use std::io::Read;
use std::io::Write;

use core::hash::BuildHasher;
use core::hash::Hash;

use crate::error::Error;
use crate::raw;
use crate::raw::BucketEntry;
use crate::raw::OrderedHash;
use crate::raw::Position;
use crate::raw::MAX_MAX_LOAD_FACTOR;
use crate::raw::MIN_MAX_LOAD_FACTOR;
use crate::store::OrderedStore;
use crate::OrderedMap;
use crate::OrderedSet;

/// Version written into every stream header. Readers reject other versions.
pub const PROTOCOL_VERSION: u32 = 1;

/// Default byte-size target for one chunk in the chunked format.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

const HEADER_BYTES: u64 = 4 + 8 + 8 + 4;
const BUCKET_SENTINEL: u32 = u32::MAX;

/// Frame kinds of the chunked format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ChunkKind {
    /// Stream header: version, counts, max load factor.
    Header = 1,
    /// A run of serialized elements in insertion order.
    DataElements = 2,
    /// A run of serialized bucket records.
    DataBuckets = 3,
    /// End of stream.
    End = 4,
}

impl ChunkKind {
    fn from_u32(value: u32) -> Result<Self, Error> {
        match value {
            1 => Ok(ChunkKind::Header),
            2 => Ok(ChunkKind::DataElements),
            3 => Ok(ChunkKind::DataBuckets),
            4 => Ok(ChunkKind::End),
            _ => Err(Error::malformed("unknown chunk kind")),
        }
    }
}

/// A value that can be written to a stream in the crate's little-endian
/// format.
pub trait Encode {
    /// Writes `self` to `writer`.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from the writer.
    fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), Error>;
}

/// A value that can be read back from a stream written with [`Encode`].
pub trait Decode: Sized {
    /// Reads one value from `reader`.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors and reports [`Error::MalformedStream`] for
    /// bytes that do not form a valid value.
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, Error>;
}

macro_rules! impl_le_codec {
    ($($ty:ty),* $(,)?) => {$(
        impl Encode for $ty {
            fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), Error> {
                writer.write_all(&self.to_le_bytes())?;
                Ok(())
            }
        }

        impl Decode for $ty {
            fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, Error> {
                let mut bytes = [0u8; core::mem::size_of::<$ty>()];
                reader.read_exact(&mut bytes)?;
                Ok(<$ty>::from_le_bytes(bytes))
            }
        }
    )*};
}

impl_le_codec!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, f32, f64);

impl Encode for bool {
    fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), Error> {
        u8::from(*self).encode(writer)
    }
}

impl Decode for bool {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, Error> {
        match u8::decode(reader)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(Error::malformed("invalid boolean byte")),
        }
    }
}

impl Encode for char {
    fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), Error> {
        u32::from(*self).encode(writer)
    }
}

impl Decode for char {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, Error> {
        char::from_u32(u32::decode(reader)?).ok_or(Error::malformed("invalid char code point"))
    }
}

impl Encode for String {
    fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), Error> {
        (self.len() as u64).encode(writer)?;
        writer.write_all(self.as_bytes())?;
        Ok(())
    }
}

impl Decode for String {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, Error> {
        let len = decode_len(reader)?;
        let bytes = read_exact_len(reader, len)?;
        String::from_utf8(bytes).map_err(|_| Error::malformed("invalid utf-8 in string"))
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), Error> {
        (self.len() as u64).encode(writer)?;
        for value in self {
            value.encode(writer)?;
        }
        Ok(())
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, Error> {
        let len = decode_len(reader)?;
        // Capacity is grown on demand so a lying length cannot force a huge
        // allocation up front.
        let mut values = Vec::with_capacity(len.min(4096));
        for _ in 0..len {
            values.push(T::decode(reader)?);
        }
        Ok(values)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), Error> {
        match self {
            None => 0u8.encode(writer),
            Some(value) => {
                1u8.encode(writer)?;
                value.encode(writer)
            }
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, Error> {
        match u8::decode(reader)? {
            0 => Ok(None),
            1 => Ok(Some(T::decode(reader)?)),
            _ => Err(Error::malformed("invalid option tag")),
        }
    }
}

impl<A: Encode, B: Encode> Encode for (A, B) {
    fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), Error> {
        self.0.encode(writer)?;
        self.1.encode(writer)
    }
}

impl<A: Decode, B: Decode> Decode for (A, B) {
    fn decode<R: Read + ?Sized>(reader: &mut R) -> Result<Self, Error> {
        Ok((A::decode(reader)?, B::decode(reader)?))
    }
}

fn decode_len<R: Read + ?Sized>(reader: &mut R) -> Result<usize, Error> {
    usize::try_from(u64::decode(reader)?).map_err(|_| Error::malformed("length field too large"))
}

fn read_exact_len<R: Read + ?Sized>(reader: &mut R, len: usize) -> Result<Vec<u8>, Error> {
    let mut bytes = Vec::with_capacity(len.min(4096));
    reader.take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(Error::Io(io::ErrorKind::UnexpectedEof.into()));
    }
    Ok(bytes)
}

struct Header {
    version: u32,
    element_count: u64,
    bucket_count: u64,
    max_load_factor: f32,
}

fn read_header<R: Read + ?Sized>(reader: &mut R) -> Result<Header, Error> {
    Ok(Header {
        version: u32::decode(reader)?,
        element_count: u64::decode(reader)?,
        bucket_count: u64::decode(reader)?,
        max_load_factor: f32::decode(reader)?,
    })
}

/// Checks a header against the protocol and the position width, returning
/// the element and bucket counts as `usize`.
fn validate_header<P: Position>(header: &Header) -> Result<(usize, usize), Error> {
    if header.version != PROTOCOL_VERSION {
        return Err(Error::ProtocolMismatch {
            found: header.version,
            expected: PROTOCOL_VERSION,
        });
    }
    if !(MIN_MAX_LOAD_FACTOR..=MAX_MAX_LOAD_FACTOR).contains(&header.max_load_factor) {
        return Err(Error::InvalidMaxLoadFactor {
            value: header.max_load_factor,
            min: MIN_MAX_LOAD_FACTOR,
            max: MAX_MAX_LOAD_FACTOR,
        });
    }
    let element_count = usize::try_from(header.element_count)
        .map_err(|_| Error::malformed("element count too large"))?;
    let bucket_count = usize::try_from(header.bucket_count)
        .map_err(|_| Error::malformed("bucket count too large"))?;
    if element_count > P::max_size() {
        return Err(Error::CapacityExceeded {
            max_size: P::max_size(),
        });
    }
    if !bucket_count.is_power_of_two() {
        return Err(Error::malformed("bucket count is not a power of two"));
    }
    if bucket_count > P::max_bucket_count() {
        return Err(Error::CapacityExceeded {
            max_size: P::max_size(),
        });
    }
    Ok((element_count, bucket_count))
}

fn write_header_fields<V, St, P, W>(
    writer: &mut W,
    table: &OrderedHash<V, St, P>,
) -> Result<(), Error>
where
    St: OrderedStore<V>,
    P: Position,
    W: Write + ?Sized,
{
    PROTOCOL_VERSION.encode(writer)?;
    (table.len() as u64).encode(writer)?;
    (table.bucket_count() as u64).encode(writer)?;
    table.max_load_factor().encode(writer)?;
    Ok(())
}

fn write_bucket_record<P, W>(bucket: &BucketEntry<P>, writer: &mut W) -> Result<(), Error>
where
    P: Position,
    W: Write + ?Sized,
{
    if bucket.empty() {
        BUCKET_SENTINEL.encode(writer)?;
        0u32.encode(writer)
    } else {
        let position = bucket.index().to_usize();
        if position >= BUCKET_SENTINEL as usize {
            return Err(Error::CapacityExceeded {
                max_size: BUCKET_SENTINEL as usize - 1,
            });
        }
        (position as u32).encode(writer)?;
        (bucket.truncated_hash().to_usize() as u32).encode(writer)
    }
}

fn decode_bucket_record<P, R>(reader: &mut R, element_count: usize) -> Result<BucketEntry<P>, Error>
where
    P: Position,
    R: Read + ?Sized,
{
    let position = u32::decode(reader)?;
    let hash = u32::decode(reader)?;
    if position == BUCKET_SENTINEL {
        return Ok(BucketEntry::EMPTY);
    }
    let position = position as usize;
    if position >= element_count || position > P::max_size() {
        return Err(Error::malformed("bucket record position out of range"));
    }
    Ok(BucketEntry::occupied(
        P::from_usize(position),
        P::truncate_hash(u64::from(hash)),
    ))
}

/// Maps an end-of-frame I/O error to a framing error: values must not cross
/// chunk boundaries.
fn decode_in_frame<T: Decode, R: Read>(reader: &mut R) -> Result<T, Error> {
    match T::decode(reader) {
        Err(Error::Io(error)) if error.kind() == io::ErrorKind::UnexpectedEof => {
            Err(Error::malformed("value crosses a chunk boundary"))
        }
        other => other,
    }
}

pub(crate) fn serialize_table<V, St, P, W>(
    table: &OrderedHash<V, St, P>,
    writer: &mut W,
) -> Result<(), Error>
where
    V: Encode,
    St: OrderedStore<V>,
    P: Position,
    W: Write,
{
    write_header_fields(writer, table)?;
    for value in table.iter() {
        value.encode(writer)?;
    }
    for bucket in table.buckets_slice() {
        write_bucket_record(bucket, writer)?;
    }
    Ok(())
}

pub(crate) fn deserialize_table<V, St, P, R, F, G>(
    reader: &mut R,
    hash_compatible: bool,
    hash_of: F,
    eq: G,
) -> Result<OrderedHash<V, St, P>, Error>
where
    V: Decode,
    St: OrderedStore<V>,
    P: Position,
    R: Read,
    F: Fn(&V) -> u64,
    G: Fn(&V, &V) -> bool,
{
    let header = read_header(reader)?;
    let (element_count, bucket_count) = validate_header::<P>(&header)?;
    let mut table = OrderedHash::new();
    if hash_compatible {
        if element_count > bucket_count {
            return Err(Error::malformed("element count exceeds bucket count"));
        }
        table.begin_bucket_load(bucket_count, header.max_load_factor, element_count)?;
        for _ in 0..element_count {
            table.push_loaded_value(V::decode(reader)?);
        }
        for _ in 0..bucket_count {
            table.push_loaded_bucket(decode_bucket_record::<P, _>(reader, element_count)?);
        }
        table.finish_bucket_load()?;
    } else {
        table.set_max_load_factor(header.max_load_factor)?;
        table.reserve(element_count)?;
        for _ in 0..element_count {
            let value = V::decode(reader)?;
            let hash = hash_of(&value);
            match table.entry(hash, |existing| eq(&value, existing)) {
                raw::Entry::Occupied(_) => {}
                raw::Entry::Vacant(vacant) => {
                    vacant.insert(value)?;
                }
            }
        }
        // The stored bucket layout belongs to the writer's hasher; skip it.
        for _ in 0..bucket_count {
            u32::decode(reader)?;
            u32::decode(reader)?;
        }
    }
    Ok(table)
}

fn write_frame<W: Write>(writer: &mut W, kind: ChunkKind, payload: &[u8]) -> Result<(), Error> {
    (kind as u32).encode(writer)?;
    let len = u32::try_from(payload.len())
        .map_err(|_| Error::malformed("chunk exceeds the frame size limit"))?;
    len.encode(writer)?;
    writer.write_all(payload)?;
    Ok(())
}

pub(crate) fn serialize_table_chunked<V, St, P, W>(
    table: &OrderedHash<V, St, P>,
    writer: &mut W,
    chunk_size: usize,
) -> Result<(), Error>
where
    V: Encode,
    St: OrderedStore<V>,
    P: Position,
    W: Write,
{
    let chunk_size = chunk_size.max(1);
    let mut payload = Vec::with_capacity(HEADER_BYTES as usize);
    write_header_fields(&mut payload, table)?;
    write_frame(writer, ChunkKind::Header, &payload)?;

    payload.clear();
    for value in table.iter() {
        value.encode(&mut payload)?;
        if payload.len() >= chunk_size {
            write_frame(writer, ChunkKind::DataElements, &payload)?;
            payload.clear();
        }
    }
    if !payload.is_empty() {
        write_frame(writer, ChunkKind::DataElements, &payload)?;
        payload.clear();
    }

    for bucket in table.buckets_slice() {
        write_bucket_record(bucket, &mut payload)?;
        if payload.len() >= chunk_size {
            write_frame(writer, ChunkKind::DataBuckets, &payload)?;
            payload.clear();
        }
    }
    if !payload.is_empty() {
        write_frame(writer, ChunkKind::DataBuckets, &payload)?;
    }

    write_frame(writer, ChunkKind::End, &[])
}

pub(crate) fn deserialize_table_chunked_into<V, St, P, R, F, G>(
    table: &mut OrderedHash<V, St, P>,
    reader: &mut R,
    hash_compatible: bool,
    hash_of: F,
    eq: G,
) -> Result<(), Error>
where
    V: Decode,
    St: OrderedStore<V>,
    P: Position,
    R: Read,
    F: Fn(&V) -> u64,
    G: Fn(&V, &V) -> bool,
{
    // A non-empty receiver means a broken-off load is being resumed: the
    // continuation stream's header is validated and skipped, data frames
    // keep appending.
    let resuming = !table.is_empty();
    let mut counts: Option<(usize, usize)> = None;

    loop {
        let kind = ChunkKind::from_u32(u32::decode(reader)?)?;
        let len = u32::decode(reader)?;
        let mut frame = (&mut *reader).take(u64::from(len));

        if counts.is_none() && !resuming && kind != ChunkKind::Header {
            return Err(Error::malformed("stream does not start with a header chunk"));
        }

        match kind {
            ChunkKind::Header => {
                let header = read_header(&mut frame)?;
                let validated = validate_header::<P>(&header)?;
                if !resuming {
                    let (element_count, bucket_count) = validated;
                    if hash_compatible {
                        if element_count > bucket_count {
                            return Err(Error::malformed("element count exceeds bucket count"));
                        }
                        table.begin_bucket_load(
                            bucket_count,
                            header.max_load_factor,
                            element_count,
                        )?;
                    } else {
                        table.set_max_load_factor(header.max_load_factor)?;
                        table.reserve(element_count)?;
                    }
                }
                counts = Some(validated);
            }
            ChunkKind::DataElements => {
                while frame.limit() > 0 {
                    let value = decode_in_frame::<V, _>(&mut frame)?;
                    if hash_compatible {
                        if let Some((element_count, _)) = counts {
                            if table.len() >= element_count {
                                return Err(Error::malformed("more elements than declared"));
                            }
                        }
                        table.push_loaded_value(value);
                    } else {
                        let hash = hash_of(&value);
                        match table.entry(hash, |existing| eq(&value, existing)) {
                            raw::Entry::Occupied(_) => {}
                            raw::Entry::Vacant(vacant) => {
                                vacant.insert(value)?;
                            }
                        }
                    }
                }
            }
            ChunkKind::DataBuckets => {
                if hash_compatible {
                    let element_count = match counts {
                        Some((element_count, _)) => element_count,
                        None => table.len(),
                    };
                    while frame.limit() > 0 {
                        if let Some((_, bucket_count)) = counts {
                            if table.loaded_bucket_count() >= bucket_count {
                                return Err(Error::malformed("more bucket records than declared"));
                            }
                        }
                        let record = decode_bucket_record::<P, _>(&mut frame, element_count)?;
                        table.push_loaded_bucket(record);
                    }
                } else {
                    io::copy(&mut frame, &mut io::sink())?;
                }
            }
            ChunkKind::End => {
                if hash_compatible {
                    table.finish_bucket_load()?;
                } else if let Some((element_count, _)) = counts {
                    if table.len() != element_count {
                        return Err(Error::malformed("element count does not match the header"));
                    }
                }
                return Ok(());
            }
        }

        if frame.limit() > 0 {
            return Err(Error::malformed("trailing bytes in chunk"));
        }
    }
}

impl<K, V, S, St, P> OrderedMap<K, V, S, St, P>
where
    K: Encode,
    V: Encode,
    St: OrderedStore<(K, V)>,
    P: Position,
{
    /// Writes the map in the flat stream format.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors; [`Error::CapacityExceeded`] if a position
    /// cannot be represented in the 32-bit wire format.
    pub fn serialize_into<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        serialize_table(self.raw(), writer)
    }

    /// Writes the map in the chunked stream format, targeting `chunk_size`
    /// bytes per chunk.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors; [`Error::CapacityExceeded`] if a position
    /// cannot be represented in the 32-bit wire format.
    pub fn serialize_chunked_into<W: Write>(
        &self,
        writer: &mut W,
        chunk_size: usize,
    ) -> Result<(), Error> {
        serialize_table_chunked(self.raw(), writer, chunk_size)
    }
}

impl<K, V, S, St, P> OrderedMap<K, V, S, St, P>
where
    K: Decode + Hash + Eq,
    V: Decode,
    S: BuildHasher,
    St: OrderedStore<(K, V)>,
    P: Position,
{
    /// Reads a map from the flat stream format with the default hasher.
    ///
    /// With `hash_compatible` set, the stored bucket records are copied
    /// verbatim instead of rehashing every key; this requires the default
    /// hasher to match the writer's (see the [module docs](self)).
    ///
    /// # Errors
    ///
    /// [`Error::ProtocolMismatch`], [`Error::InvalidMaxLoadFactor`],
    /// [`Error::MalformedStream`], or an I/O error.
    pub fn deserialize_from<R: Read>(reader: &mut R, hash_compatible: bool) -> Result<Self, Error>
    where
        S: Default,
    {
        Self::deserialize_from_with_hasher(reader, hash_compatible, S::default())
    }

    /// Reads a map from the flat stream format with an explicit hasher.
    ///
    /// # Errors
    ///
    /// [`Error::ProtocolMismatch`], [`Error::InvalidMaxLoadFactor`],
    /// [`Error::MalformedStream`], or an I/O error.
    pub fn deserialize_from_with_hasher<R: Read>(
        reader: &mut R,
        hash_compatible: bool,
        hash_builder: S,
    ) -> Result<Self, Error> {
        let inner = deserialize_table(
            reader,
            hash_compatible,
            |entry: &(K, V)| hash_builder.hash_one(&entry.0),
            |new, existing| new.0 == existing.0,
        )?;
        Ok(Self::from_raw_parts(inner, hash_builder))
    }

    /// Reads a map from the chunked stream format with the default hasher.
    ///
    /// # Errors
    ///
    /// [`Error::ProtocolMismatch`], [`Error::InvalidMaxLoadFactor`],
    /// [`Error::MalformedStream`], or an I/O error. An I/O error part-way
    /// in leaves nothing behind; use
    /// [`resume_deserialize_chunked`](OrderedMap::resume_deserialize_chunked)
    /// on an initially empty map to keep partial progress.
    pub fn deserialize_chunked_from<R: Read>(
        reader: &mut R,
        hash_compatible: bool,
    ) -> Result<Self, Error>
    where
        S: Default,
    {
        let mut map = OrderedMap::from_raw_parts(OrderedHash::new(), S::default());
        map.resume_deserialize_chunked(reader, hash_compatible)?;
        Ok(map)
    }

    /// Continues a chunked load into this map.
    ///
    /// On an empty map this performs a full load. On a non-empty map the
    /// continuation stream's header is validated and skipped and the data
    /// frames keep appending, which resumes a load whose stream broke off
    /// mid-way.
    ///
    /// # Errors
    ///
    /// [`Error::ProtocolMismatch`], [`Error::InvalidMaxLoadFactor`],
    /// [`Error::MalformedStream`], or an I/O error. After an I/O error the
    /// map keeps the entries loaded so far and the load can be resumed with
    /// a continuation stream.
    pub fn resume_deserialize_chunked<R: Read>(
        &mut self,
        reader: &mut R,
        hash_compatible: bool,
    ) -> Result<(), Error> {
        let (inner, hash_builder) = self.raw_and_hasher_mut();
        deserialize_table_chunked_into(
            inner,
            reader,
            hash_compatible,
            |entry: &(K, V)| hash_builder.hash_one(&entry.0),
            |new, existing| new.0 == existing.0,
        )
    }
}

impl<T, S, St, P> OrderedSet<T, S, St, P>
where
    T: Encode,
    St: OrderedStore<T>,
    P: Position,
{
    /// Writes the set in the flat stream format.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors; [`Error::CapacityExceeded`] if a position
    /// cannot be represented in the 32-bit wire format.
    pub fn serialize_into<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        serialize_table(self.raw(), writer)
    }

    /// Writes the set in the chunked stream format, targeting `chunk_size`
    /// bytes per chunk.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors; [`Error::CapacityExceeded`] if a position
    /// cannot be represented in the 32-bit wire format.
    pub fn serialize_chunked_into<W: Write>(
        &self,
        writer: &mut W,
        chunk_size: usize,
    ) -> Result<(), Error> {
        serialize_table_chunked(self.raw(), writer, chunk_size)
    }
}

impl<T, S, St, P> OrderedSet<T, S, St, P>
where
    T: Decode + Hash + Eq,
    S: BuildHasher,
    St: OrderedStore<T>,
    P: Position,
{
    /// Reads a set from the flat stream format with the default hasher.
    ///
    /// # Errors
    ///
    /// [`Error::ProtocolMismatch`], [`Error::InvalidMaxLoadFactor`],
    /// [`Error::MalformedStream`], or an I/O error.
    pub fn deserialize_from<R: Read>(reader: &mut R, hash_compatible: bool) -> Result<Self, Error>
    where
        S: Default,
    {
        Self::deserialize_from_with_hasher(reader, hash_compatible, S::default())
    }

    /// Reads a set from the flat stream format with an explicit hasher.
    ///
    /// # Errors
    ///
    /// [`Error::ProtocolMismatch`], [`Error::InvalidMaxLoadFactor`],
    /// [`Error::MalformedStream`], or an I/O error.
    pub fn deserialize_from_with_hasher<R: Read>(
        reader: &mut R,
        hash_compatible: bool,
        hash_builder: S,
    ) -> Result<Self, Error> {
        let inner = deserialize_table(
            reader,
            hash_compatible,
            |value: &T| hash_builder.hash_one(value),
            |new, existing| new == existing,
        )?;
        Ok(Self::from_raw_parts(inner, hash_builder))
    }

    /// Reads a set from the chunked stream format with the default hasher.
    ///
    /// # Errors
    ///
    /// [`Error::ProtocolMismatch`], [`Error::InvalidMaxLoadFactor`],
    /// [`Error::MalformedStream`], or an I/O error.
    pub fn deserialize_chunked_from<R: Read>(
        reader: &mut R,
        hash_compatible: bool,
    ) -> Result<Self, Error>
    where
        S: Default,
    {
        let mut set = OrderedSet::from_raw_parts(OrderedHash::new(), S::default());
        set.resume_deserialize_chunked(reader, hash_compatible)?;
        Ok(set)
    }

    /// Continues a chunked load into this set; see
    /// [`OrderedMap::resume_deserialize_chunked`].
    ///
    /// # Errors
    ///
    /// [`Error::ProtocolMismatch`], [`Error::InvalidMaxLoadFactor`],
    /// [`Error::MalformedStream`], or an I/O error.
    pub fn resume_deserialize_chunked<R: Read>(
        &mut self,
        reader: &mut R,
        hash_compatible: bool,
    ) -> Result<(), Error> {
        let (inner, hash_builder) = self.raw_and_hasher_mut();
        deserialize_table_chunked_into(
            inner,
            reader,
            hash_compatible,
            |value: &T| hash_builder.hash_one(value),
            |new, existing| new == existing,
        )
    }
}

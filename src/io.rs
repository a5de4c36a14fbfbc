use std::{
    convert::TryInto,
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    mem::size_of,
    path::Path,
};

use bit_vec::BitVec;

use crate::{error::StoreError, types::StoreResult};

pub trait Encodeable {
    fn to_bytes(&self) -> Vec<u8>;
}

pub trait Decodeable {
    fn read_from<R: Read>(reader: &mut R) -> Self;
}

pub fn read_into<T: Decodeable, R: Read>(reader: &mut R) -> T {
    T::read_from(reader)
}

pub fn read_exact<R: Read>(reader: &mut R, bytes_count: usize) -> Vec<u8> {
    let mut buffer = vec![0u8; bytes_count];
    reader
        .read_exact(&mut buffer)
        .expect(&format!("io error, expect {} bytes", bytes_count));
    buffer
}

/// A thin wrapper around a read/write file handle used for heap files and
/// the write-ahead log.
pub struct StoreFile {
    file: File,
}

impl StoreFile {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        let file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .open(file_path)
            .unwrap();

        Self { file }
    }

    pub fn write<T: Encodeable + ?Sized>(&mut self, obj: &T) -> StoreResult {
        self.file
            .write_all(&obj.to_bytes())
            .or(Err(StoreError::io("write failed")))?;
        Ok(())
    }

    pub fn read<T: Decodeable>(&mut self) -> Result<T, StoreError> {
        Ok(T::read_from(&mut self.file))
    }

    /// Read a length-prefixed blob (e.g. a page image in an UPDATE
    /// record).
    pub fn read_blob(&mut self) -> Result<Vec<u8>, StoreError> {
        let size = self.read::<usize>()?;
        let mut buf: Vec<u8> = vec![0; size];
        self.file
            .read_exact(&mut buf)
            .or(Err(StoreError::io("read failed")))?;
        Ok(buf)
    }

    pub fn get_size(&self) -> Result<u64, StoreError> {
        let metadata = self.file.metadata().or(Err(StoreError::io("io error")))?;
        Ok(metadata.len())
    }

    pub fn get_current_position(&mut self) -> Result<u64, StoreError> {
        self.file
            .seek(SeekFrom::Current(0))
            .or(Err(StoreError::io("io error")))
    }

    pub fn set_len(&self, len: u64) -> StoreResult {
        self.file.set_len(len).or(Err(StoreError::io("io error")))?;
        Ok(())
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, StoreError> {
        self.file.seek(pos).or(Err(StoreError::io("io error")))
    }

    /// Flush and force the content down to the disk.
    pub fn sync(&mut self) -> StoreResult {
        self.file.flush().or(Err(StoreError::io("io error")))?;
        self.file.sync_all().or(Err(StoreError::io("io error")))?;
        Ok(())
    }
}

pub struct StoreWriter {
    buf: Vec<u8>,
}

impl StoreWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn write<T: Encodeable + ?Sized>(&mut self, obj: &T) {
        self.buf.extend_from_slice(obj.to_bytes().as_slice());
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.buf.clone()
    }

    pub fn to_padded_bytes(&self, size: usize) -> Vec<u8> {
        let mut buf = self.buf.clone();

        if buf.len() > size {
            panic!(
                "buffer size is larger than the given size: {} > {}",
                buf.len(),
                size
            );
        }

        buf.resize(size, 0);
        buf
    }
}

/// Bytes the `BitVec` codec spends on its length prefix.
pub const BIT_VEC_LEN_BYTES: usize = 2;

/// # Format
///
/// - 2 bytes: bytes size (range: 0 - 65535)
/// - n bytes: bit vector
impl Encodeable for BitVec {
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        let payload = BitVec::to_bytes(self);

        // write size
        let len = payload.len() as u16;
        buf.extend_from_slice(&len.to_le_bytes());

        // write payload
        buf.extend_from_slice(&payload);

        buf
    }
}

impl Decodeable for BitVec {
    fn read_from<R: Read>(reader: &mut R) -> Self {
        // read size
        let size = u16::from_le_bytes(read_exact(reader, BIT_VEC_LEN_BYTES).try_into().unwrap());

        // read payload
        let buf = read_exact(reader, size as usize);

        BitVec::from_bytes(&buf)
    }
}

impl Encodeable for [u8] {
    fn to_bytes(&self) -> Vec<u8> {
        self.to_vec()
    }
}

macro_rules! impl_serialization {
    (for $($t:ty),+) => {
        $(
            impl Encodeable for $t {
                fn to_bytes(&self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }
            }

            impl Decodeable for $t {
                fn read_from<R: Read>(reader: &mut R) -> Self {
                    let bytes = read_exact(reader, size_of::<Self>());
                    Self::from_le_bytes(bytes.try_into().unwrap())
                }
            }
        )*
    }
}

impl_serialization!(for u8, u16, u32, u64, u128, i8, i16, i32, i64, i128, isize, usize, f32, f64);

//! Address spaces, regions and big-endian access.
//!
//! Guest memory is a set of host-owned buffers. Each [`MemoryRegion`]
//! borrows one buffer and applies an access policy; [`MemoryMap`] places
//! several regions in the 32-bit address space. Everything that can be
//! translated implements [`Memory`], which layers byte/word/long access on
//! top of `translate`.
//!
//! Multi-byte values are stored most significant byte first regardless of
//! host byte order.

use std::fmt;

use thiserror::Error;

/// Function code driven on FC0-FC2 for every bus cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FunctionCode {
    /// FC=0, undefined.
    Reserved0 = 0,
    /// FC=1.
    UserData = 1,
    /// FC=2.
    UserProgram = 2,
    /// FC=3, undefined.
    Reserved3 = 3,
    /// FC=4, undefined.
    Reserved4 = 4,
    /// FC=5.
    SupervisorData = 5,
    /// FC=6.
    SupervisorProgram = 6,
    /// FC=7: interrupt acknowledge, breakpoint and coprocessor cycles.
    CpuSpace = 7,
}

impl FunctionCode {
    /// Build a function code from supervisor and program/data flags.
    #[must_use]
    pub const fn from_flags(supervisor: bool, program: bool) -> Self {
        match (supervisor, program) {
            (false, false) => Self::UserData,
            (false, true) => Self::UserProgram,
            (true, false) => Self::SupervisorData,
            (true, true) => Self::SupervisorProgram,
        }
    }

    /// Decode the low three bits, as held in SFC/DFC.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 7 {
            0 => Self::Reserved0,
            1 => Self::UserData,
            2 => Self::UserProgram,
            3 => Self::Reserved3,
            4 => Self::Reserved4,
            5 => Self::SupervisorData,
            6 => Self::SupervisorProgram,
            _ => Self::CpuSpace,
        }
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// User-mode codes, including the reserved code below them.
    #[must_use]
    pub const fn is_user(self) -> bool {
        self.bits() <= Self::UserProgram.bits()
    }
}

/// Kind of bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
    /// Instruction fetch.
    Exec,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Exec => "fetch",
        })
    }
}

/// Why a translation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// `addr + len` wrapped past the top of the address space.
    #[error("{len}-byte access at {addr:#010x} wraps the address space")]
    Overflow { addr: u32, len: u32 },
    /// The access ends beyond the backing buffer.
    #[error("{len}-byte access at {addr:#010x} runs past the end of its region")]
    OutOfRange { addr: u32, len: u32 },
    /// The region policy refused this function code or access kind.
    #[error("{access} at {addr:#010x} denied to {fc:?}")]
    Protected {
        addr: u32,
        fc: FunctionCode,
        access: Access,
    },
    /// No region covers the address.
    #[error("no region mapped at {addr:#010x}")]
    Unmapped { addr: u32 },
}

impl MemoryError {
    /// Guest address the failure refers to.
    #[must_use]
    pub const fn addr(&self) -> u32 {
        match *self {
            Self::Overflow { addr, .. }
            | Self::OutOfRange { addr, .. }
            | Self::Protected { addr, .. }
            | Self::Unmapped { addr } => addr,
        }
    }

    /// Shift a region-relative address to an absolute one.
    #[must_use]
    fn rebased(self, start: u32) -> Self {
        let shift = |addr: u32| addr.wrapping_add(start);
        match self {
            Self::Overflow { addr, len } => Self::Overflow {
                addr: shift(addr),
                len,
            },
            Self::OutOfRange { addr, len } => Self::OutOfRange {
                addr: shift(addr),
                len,
            },
            Self::Protected { addr, fc, access } => Self::Protected {
                addr: shift(addr),
                fc,
                access,
            },
            Self::Unmapped { addr } => Self::Unmapped { addr: shift(addr) },
        }
    }
}

/// Size of the vector table protected by [`RegionPolicy::LowMemory`].
pub const LOW_MEMORY_LIMIT: u32 = 1024;

/// Access policy attached to a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegionPolicy {
    /// Any function code, any access kind.
    #[default]
    General,
    /// Like `General`, but the first [`LOW_MEMORY_LIMIT`] bytes are
    /// supervisor-only and never executable.
    LowMemory,
}

/// A contiguous guest-visible window onto a host buffer.
pub struct MemoryRegion<'a> {
    base: &'a mut [u8],
    policy: RegionPolicy,
}

impl<'a> MemoryRegion<'a> {
    /// A region with the general policy.
    #[must_use]
    pub fn new(base: &'a mut [u8]) -> Self {
        Self {
            base,
            policy: RegionPolicy::General,
        }
    }

    /// A region whose first 1024 bytes hold system vectors.
    #[must_use]
    pub fn low_memory(base: &'a mut [u8]) -> Self {
        Self {
            base,
            policy: RegionPolicy::LowMemory,
        }
    }

    #[must_use]
    pub fn with_policy(base: &'a mut [u8], policy: RegionPolicy) -> Self {
        Self { base, policy }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.base.len()
    }

    #[must_use]
    pub const fn policy(&self) -> RegionPolicy {
        self.policy
    }

    /// Validate an access and return the byte range it covers.
    fn check(
        &self,
        addr: u32,
        len: u32,
        fc: FunctionCode,
        access: Access,
    ) -> Result<std::ops::Range<usize>, MemoryError> {
        if self.policy == RegionPolicy::LowMemory
            && addr < LOW_MEMORY_LIMIT
            && (fc.is_user() || access == Access::Exec)
        {
            return Err(MemoryError::Protected { addr, fc, access });
        }

        let end = addr
            .checked_add(len)
            .ok_or(MemoryError::Overflow { addr, len })?;
        if end as usize > self.base.len() {
            return Err(MemoryError::OutOfRange { addr, len });
        }
        Ok(addr as usize..end as usize)
    }
}

impl fmt::Debug for MemoryRegion<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRegion")
            .field("size", &self.base.len())
            .field("policy", &self.policy)
            .finish()
    }
}

/// Anything that can translate guest addresses to host bytes.
///
/// Implementors supply `translate` and `translate_mut`; the sized accessors
/// are provided. A returned slice always has exactly `len` bytes.
pub trait Memory {
    fn translate(
        &self,
        addr: u32,
        len: u32,
        fc: FunctionCode,
        access: Access,
    ) -> Result<&[u8], MemoryError>;

    fn translate_mut(
        &mut self,
        addr: u32,
        len: u32,
        fc: FunctionCode,
        access: Access,
    ) -> Result<&mut [u8], MemoryError>;

    fn get_byte(&self, addr: u32, fc: FunctionCode) -> Result<u8, MemoryError> {
        self.get(addr, 1, fc, Access::Read).map(|v| v as u8)
    }

    fn get_word(&self, addr: u32, fc: FunctionCode) -> Result<u16, MemoryError> {
        self.get(addr, 2, fc, Access::Read).map(|v| v as u16)
    }

    fn get_long(&self, addr: u32, fc: FunctionCode) -> Result<u32, MemoryError> {
        self.get(addr, 4, fc, Access::Read)
    }

    fn put_byte(&mut self, addr: u32, value: u8, fc: FunctionCode) -> Result<(), MemoryError> {
        self.put(addr, 1, u32::from(value), fc)
    }

    fn put_word(&mut self, addr: u32, value: u16, fc: FunctionCode) -> Result<(), MemoryError> {
        self.put(addr, 2, u32::from(value), fc)
    }

    fn put_long(&mut self, addr: u32, value: u32, fc: FunctionCode) -> Result<(), MemoryError> {
        self.put(addr, 4, value, fc)
    }

    /// Instruction fetch. The caller guarantees an even address.
    fn get_instruction_word(&self, addr: u32, fc: FunctionCode) -> Result<u16, MemoryError> {
        debug_assert!(addr & 1 == 0);
        self.get(addr, 2, fc, Access::Exec).map(|v| v as u16)
    }

    /// Read `len` (1 to 4) bytes as one big-endian value.
    fn get(
        &self,
        addr: u32,
        len: u32,
        fc: FunctionCode,
        access: Access,
    ) -> Result<u32, MemoryError> {
        let bytes = self.translate(addr, len, fc, access)?;
        Ok(bytes.iter().fold(0, |acc, &b| (acc << 8) | u32::from(b)))
    }

    /// Write the low `len` (1 to 4) bytes of `value`, most significant first.
    fn put(
        &mut self,
        addr: u32,
        len: u32,
        value: u32,
        fc: FunctionCode,
    ) -> Result<(), MemoryError> {
        let bytes = self.translate_mut(addr, len, fc, Access::Write)?;
        let mut shift = len * 8;
        for byte in bytes {
            shift -= 8;
            *byte = (value >> shift) as u8;
        }
        Ok(())
    }
}

impl Memory for MemoryRegion<'_> {
    fn translate(
        &self,
        addr: u32,
        len: u32,
        fc: FunctionCode,
        access: Access,
    ) -> Result<&[u8], MemoryError> {
        let range = self.check(addr, len, fc, access)?;
        Ok(&self.base[range])
    }

    fn translate_mut(
        &mut self,
        addr: u32,
        len: u32,
        fc: FunctionCode,
        access: Access,
    ) -> Result<&mut [u8], MemoryError> {
        let range = self.check(addr, len, fc, access)?;
        Ok(&mut self.base[range])
    }
}

impl<T: Memory + ?Sized> Memory for &mut T {
    fn translate(
        &self,
        addr: u32,
        len: u32,
        fc: FunctionCode,
        access: Access,
    ) -> Result<&[u8], MemoryError> {
        (**self).translate(addr, len, fc, access)
    }

    fn translate_mut(
        &mut self,
        addr: u32,
        len: u32,
        fc: FunctionCode,
        access: Access,
    ) -> Result<&mut [u8], MemoryError> {
        (**self).translate_mut(addr, len, fc, access)
    }
}

/// Error assembling a [`MemoryMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("region at {start:#010x} overlaps the region at {other:#010x}")]
    Overlap { start: u32, other: u32 },
    #[error("region at {start:#010x} extends past the top of the address space")]
    PastEnd { start: u32 },
    #[error("region at {start:#010x} is empty")]
    Empty { start: u32 },
}

/// Regions placed at fixed guest addresses.
///
/// The layout is fixed once built; only region contents change afterwards.
#[derive(Debug, Default)]
pub struct MemoryMap<'a> {
    regions: Vec<(u32, MemoryRegion<'a>)>,
}

/// Builder for [`MemoryMap`].
#[derive(Debug, Default)]
pub struct MemoryMapBuilder<'a> {
    regions: Vec<(u32, MemoryRegion<'a>)>,
}

impl<'a> MemoryMapBuilder<'a> {
    /// Place `region` so its first byte appears at guest address `start`.
    #[must_use]
    pub fn region(mut self, start: u32, region: MemoryRegion<'a>) -> Self {
        self.regions.push((start, region));
        self
    }

    /// Sort the regions and reject overlaps.
    pub fn build(mut self) -> Result<MemoryMap<'a>, MapError> {
        self.regions.sort_by_key(|(start, _)| *start);

        let mut previous_end: Option<(u32, u64)> = None;
        for (start, region) in &self.regions {
            if region.size() == 0 {
                return Err(MapError::Empty { start: *start });
            }
            let end = u64::from(*start) + region.size() as u64;
            if end > 1 << 32 {
                return Err(MapError::PastEnd { start: *start });
            }
            if let Some((other, prev_end)) = previous_end {
                if u64::from(*start) < prev_end {
                    return Err(MapError::Overlap {
                        start: *start,
                        other,
                    });
                }
            }
            previous_end = Some((*start, end));
        }

        Ok(MemoryMap {
            regions: self.regions,
        })
    }
}

impl<'a> MemoryMap<'a> {
    #[must_use]
    pub fn builder() -> MemoryMapBuilder<'a> {
        MemoryMapBuilder::default()
    }

    /// Index of the region containing `addr`.
    fn find(&self, addr: u32) -> Result<usize, MemoryError> {
        let idx = self.regions.partition_point(|(start, _)| *start <= addr);
        let idx = idx.checked_sub(1).ok_or(MemoryError::Unmapped { addr })?;
        let (start, region) = &self.regions[idx];
        if (addr - start) as usize >= region.size() {
            return Err(MemoryError::Unmapped { addr });
        }
        Ok(idx)
    }

    /// Number of regions in the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl Memory for MemoryMap<'_> {
    fn translate(
        &self,
        addr: u32,
        len: u32,
        fc: FunctionCode,
        access: Access,
    ) -> Result<&[u8], MemoryError> {
        let idx = self.find(addr)?;
        let (start, region) = &self.regions[idx];
        region
            .translate(addr - start, len, fc, access)
            .map_err(|e| e.rebased(*start))
    }

    fn translate_mut(
        &mut self,
        addr: u32,
        len: u32,
        fc: FunctionCode,
        access: Access,
    ) -> Result<&mut [u8], MemoryError> {
        let idx = self.find(addr)?;
        let (start, region) = &mut self.regions[idx];
        let start = *start;
        region
            .translate_mut(addr - start, len, fc, access)
            .map_err(|e| e.rebased(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SD: FunctionCode = FunctionCode::SupervisorData;
    const UD: FunctionCode = FunctionCode::UserData;

    #[test]
    fn translate_rejects_wrapping_sum() {
        let mut buf = [0u8; 16];
        let region = MemoryRegion::new(&mut buf);
        assert_eq!(
            region.translate(0xFFFF_FFFE, 4, SD, Access::Read),
            Err(MemoryError::Overflow {
                addr: 0xFFFF_FFFE,
                len: 4
            })
        );
    }

    #[test]
    fn translate_allows_access_ending_at_size() {
        let mut buf = [0u8; 16];
        let region = MemoryRegion::new(&mut buf);
        assert_eq!(region.translate(12, 4, UD, Access::Read).map(<[u8]>::len), Ok(4));
        assert!(matches!(
            region.translate(13, 4, UD, Access::Read),
            Err(MemoryError::OutOfRange { addr: 13, len: 4 })
        ));
    }

    #[test]
    fn word_round_trip_is_big_endian() {
        let mut buf = [0u8; 8];
        let mut region = MemoryRegion::new(&mut buf);
        region.put_word(2, 0x1234, SD).unwrap();
        assert_eq!(region.get_word(2, SD), Ok(0x1234));
        assert_eq!(region.get_byte(2, SD), Ok(0x12));

        region.put_byte(4, 0x12, SD).unwrap();
        region.put_byte(5, 0x34, SD).unwrap();
        assert_eq!(region.get_word(4, SD), Ok(0x1234));
        drop(region);
        assert_eq!(&buf[2..6], &[0x12, 0x34, 0x12, 0x34]);
    }

    #[test]
    fn unaligned_long_composes_bytes() {
        let mut buf = [0u8; 8];
        let mut region = MemoryRegion::new(&mut buf);
        region.put_long(1, 0xDEAD_BEEF, SD).unwrap();
        assert_eq!(region.get_long(1, SD), Ok(0xDEAD_BEEF));
        assert_eq!(region.get_word(2, SD), Ok(0xADBE));
    }

    #[test]
    fn low_memory_policy() {
        let mut buf = vec![0u8; 2048];
        let region = MemoryRegion::low_memory(&mut buf);

        assert!(region.translate(0, 4, SD, Access::Read).is_ok());
        assert!(region.translate(1020, 4, SD, Access::Write).is_ok());
        assert!(matches!(
            region.translate(8, 2, FunctionCode::SupervisorProgram, Access::Exec),
            Err(MemoryError::Protected { .. })
        ));
        assert!(matches!(
            region.translate(1023, 1, FunctionCode::UserProgram, Access::Read),
            Err(MemoryError::Protected { .. })
        ));
        assert!(matches!(
            region.translate(0, 1, FunctionCode::Reserved0, Access::Read),
            Err(MemoryError::Protected { .. })
        ));
        assert!(region.translate(1024, 2, UD, Access::Exec).is_ok());
        assert!(region.translate(1024, 2, UD, Access::Write).is_ok());
    }

    #[test]
    fn map_routes_by_start_address() {
        let mut low = vec![0u8; 0x400];
        let mut high = vec![0u8; 0x100];
        let mut map = MemoryMap::builder()
            .region(0x1000, MemoryRegion::new(&mut high))
            .region(0, MemoryRegion::new(&mut low))
            .build()
            .unwrap();

        map.put_long(0x1010, 0x0102_0304, SD).unwrap();
        assert_eq!(map.get_long(0x1010, SD), Ok(0x0102_0304));
        assert_eq!(
            map.get_byte(0x800, SD),
            Err(MemoryError::Unmapped { addr: 0x800 })
        );
        assert_eq!(
            map.get_long(0x10FE, SD),
            Err(MemoryError::OutOfRange {
                addr: 0x10FE,
                len: 4
            })
        );
        drop(map);
        assert_eq!(&high[0x10..0x14], &[1, 2, 3, 4]);
    }

    #[test]
    fn map_rejects_overlap() {
        let mut a = vec![0u8; 0x200];
        let mut b = vec![0u8; 0x200];
        let err = MemoryMap::builder()
            .region(0, MemoryRegion::new(&mut a))
            .region(0x100, MemoryRegion::new(&mut b))
            .build()
            .unwrap_err();
        assert_eq!(err, MapError::Overlap { start: 0x100, other: 0 });
    }

    #[test]
    fn function_code_classes() {
        assert!(FunctionCode::UserData.is_user());
        assert!(FunctionCode::Reserved0.is_user());
        assert!(!FunctionCode::Reserved3.is_user());
        assert_eq!(FunctionCode::from_flags(true, true).bits(), 6);
        assert_eq!(FunctionCode::from_bits(0xF), FunctionCode::CpuSpace);
    }

    proptest! {
        #[test]
        fn translate_matches_bounds_arithmetic(
            size in 0usize..4096,
            addr in any::<u32>(),
            len in 1u32..=4,
        ) {
            let mut buf = vec![0u8; size];
            let region = MemoryRegion::new(&mut buf);
            let fits = addr.checked_add(len).is_some_and(|end| end as usize <= size);
            let result = region.translate(addr, len, SD, Access::Read);
            prop_assert_eq!(result.is_ok(), fits);
            if let Ok(bytes) = result {
                prop_assert_eq!(bytes.len(), len as usize);
            }
        }

        #[test]
        fn low_memory_denies_user_and_exec(
            addr in 0u32..2048,
            user in any::<bool>(),
            exec in any::<bool>(),
        ) {
            let mut buf = vec![0u8; 4096];
            let region = MemoryRegion::low_memory(&mut buf);
            let fc = FunctionCode::from_flags(!user, exec);
            let access = if exec { Access::Exec } else { Access::Read };
            let denied = addr < LOW_MEMORY_LIMIT && (user || exec);
            prop_assert_eq!(region.translate(addr, 2, fc, access).is_err(), denied);
        }
    }
}

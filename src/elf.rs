// elf.rs — minimal single-segment ELF64 image builder
//
// Produces the smallest loadable executable: a 64-byte ELF header, one
// 56-byte PT_LOAD program header, then raw machine code appended verbatim.
// No sections, no string tables, no relocations. The headers are written
// once at creation and never revisited; in particular p_filesz/p_memsz stay
// zero as the code region grows (known divergence from a fully conformant
// image, preserved deliberately).

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use bytes::{BufMut, BytesMut};

pub const ELF_HEADER_SIZE: usize = 64;
pub const PROGRAM_HEADER_SIZE: usize = 56;

/// ELF header + program header; appended code starts at this offset.
pub const HEADER_SIZE: usize = ELF_HEADER_SIZE + PROGRAM_HEADER_SIZE;

/// Virtual address base; entry point = BASE + HEADER_SIZE.
pub const BASE: u64 = 0x400000;

const EI_MAG: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1; // little-endian
const EV_CURRENT: u8 = 1;
const ELFOSABI_NONE: u8 = 0;
const ET_EXEC: u16 = 2;
const EM_X86_64: u16 = 62;
const PT_LOAD: u32 = 1;
const PF_R: u32 = 4;
const PF_X: u32 = 1;

/// Entry point declared in the file header, fixed at creation.
pub const ENTRY_POINT: u64 = BASE + HEADER_SIZE as u64;

/// An open, append-only executable image.
///
/// Created once per `create` request; afterwards mutated only by `append`.
/// Dropping the handle releases the file, so replacing an `Image` with a
/// newly created one closes the previous file.
pub struct Image {
    file: File,
}

fn header_region() -> BytesMut {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE);

    // ELF64 header (64 bytes)
    buf.put_slice(&EI_MAG);
    buf.put_u8(ELFCLASS64);
    buf.put_u8(ELFDATA2LSB);
    buf.put_u8(EV_CURRENT);
    buf.put_u8(ELFOSABI_NONE);
    buf.put_slice(&[0u8; 8]); // e_ident padding
    buf.put_u16_le(ET_EXEC);
    buf.put_u16_le(EM_X86_64);
    buf.put_u32_le(EV_CURRENT as u32);
    buf.put_u64_le(ENTRY_POINT); // e_entry
    buf.put_u64_le(ELF_HEADER_SIZE as u64); // e_phoff, right after the ehdr
    buf.put_u64_le(0); // e_shoff, no sections
    buf.put_u32_le(0); // e_flags
    buf.put_u16_le(ELF_HEADER_SIZE as u16); // e_ehsize
    buf.put_u16_le(PROGRAM_HEADER_SIZE as u16); // e_phentsize
    buf.put_u16_le(1); // e_phnum, the single LOAD segment
    buf.put_u16_le(0); // e_shentsize
    buf.put_u16_le(0); // e_shnum
    buf.put_u16_le(0); // e_shstrndx
    debug_assert_eq!(buf.len(), ELF_HEADER_SIZE);

    // Program header (56 bytes)
    buf.put_u32_le(PT_LOAD);
    buf.put_u32_le(PF_R | PF_X);
    buf.put_u64_le(ELF_HEADER_SIZE as u64); // p_offset
    buf.put_u64_le(BASE + ELF_HEADER_SIZE as u64); // p_vaddr
    buf.put_u64_le(BASE + ELF_HEADER_SIZE as u64); // p_paddr
    buf.put_u64_le(0); // p_filesz, never updated on append
    buf.put_u64_le(0); // p_memsz, never updated on append
    buf.put_u64_le(0); // p_align
    debug_assert_eq!(buf.len(), HEADER_SIZE);

    buf
}

impl Image {
    /// Opens (creating or truncating) an executable file at `path` and
    /// writes the fixed header region. The load address and entry point
    /// are computed here and never recalculated.
    pub fn create(path: &Path) -> io::Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o755)
            .open(path)?;
        file.write_all(&header_region())?;
        Ok(Self { file })
    }

    /// Appends raw bytes at the current end of file, in the exact order
    /// supplied. The header region is never touched again.
    pub fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)
    }
}

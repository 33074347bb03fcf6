// LC_UUID lookup through dyld's list of loaded images.
//
// Image 0 is the main executable; later images are dylibs and frameworks.
// The first image that carries an LC_UUID load command wins.

use std::ptr;

const MH_MAGIC: u32 = 0xfeed_face;
const MH_CIGAM: u32 = 0xcefa_edfe;
const MH_MAGIC_64: u32 = 0xfeed_facf;
const MH_CIGAM_64: u32 = 0xcffa_edfe;
const LC_UUID: u32 = 0x1b;

const MACH_HEADER_LEN: usize = 28;
const MACH_HEADER_64_LEN: usize = 32;

// Field layout mirrors <mach-o/loader.h>; only some fields are read
#[allow(dead_code)]
#[repr(C)]
#[derive(Clone, Copy)]
struct MachHeader {
    magic: u32,
    cputype: i32,
    cpusubtype: i32,
    filetype: u32,
    ncmds: u32,
    sizeofcmds: u32,
    flags: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct LoadCommand {
    cmd: u32,
    cmdsize: u32,
}

#[allow(dead_code)]
#[repr(C)]
#[derive(Clone, Copy)]
struct UuidCommand {
    cmd: u32,
    cmdsize: u32,
    uuid: [u8; 16],
}

unsafe extern "C" {
    fn _dyld_image_count() -> u32;
    fn _dyld_get_image_header(image_index: u32) -> *const MachHeader;
}

/// UUID bytes of the first loaded image that has one
pub(super) fn first_image_uuid() -> Option<[u8; 16]> {
    // SAFETY: dyld functions are thread-safe and the returned headers stay
    // mapped while the image is loaded
    let count = unsafe { _dyld_image_count() };
    (0..count).find_map(|index| {
        let header = unsafe { _dyld_get_image_header(index) };
        if header.is_null() {
            None
        } else {
            // SAFETY: non-null header returned by dyld for a loaded image
            unsafe { image_uuid(header) }
        }
    })
}

/// Walk the load commands following `header`
///
/// # Safety
///
/// `header` must point at a mapped Mach-O header followed by its load commands.
unsafe fn image_uuid(header: *const MachHeader) -> Option<[u8; 16]> {
    let header_value = unsafe { ptr::read_unaligned(header) };
    let header_len = match header_value.magic {
        MH_MAGIC_64 | MH_CIGAM_64 => MACH_HEADER_64_LEN,
        MH_MAGIC | MH_CIGAM => MACH_HEADER_LEN,
        _ => return None,
    };

    let mut command_ptr = unsafe { header.cast::<u8>().add(header_len) };
    for _ in 0..header_value.ncmds {
        let command = unsafe { ptr::read_unaligned(command_ptr.cast::<LoadCommand>()) };
        if command.cmd == LC_UUID {
            let uuid = unsafe { ptr::read_unaligned(command_ptr.cast::<UuidCommand>()) };
            return Some(uuid.uuid);
        }
        if command.cmdsize == 0 {
            return None;
        }
        command_ptr = unsafe { command_ptr.add(command.cmdsize as usize) };
    }
    None
}

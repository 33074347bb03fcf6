// GNU build-id lookup through the dynamic loader's view of the process.
//
// `dl_iterate_phdr` reports the main executable first. Its PT_NOTE segments
// are already mapped, so reading them is plain memory access.

use std::ffi::c_void;
use std::os::raw::c_int;

const NT_GNU_BUILD_ID: u32 = 3;
const GNU_OWNER: &[u8] = b"GNU\0";
const NOTE_HEADER_LEN: usize = 12;

/// Raw build-id bytes of the main executable
pub(super) fn main_executable_build_id() -> Option<Vec<u8>> {
    let mut found: Option<Vec<u8>> = None;
    // SAFETY: `visit_main_image` only dereferences pointers the loader passes
    // for the duration of the callback, and `found` outlives the call.
    unsafe {
        libc::dl_iterate_phdr(
            Some(visit_main_image),
            (&mut found as *mut Option<Vec<u8>>).cast::<c_void>(),
        );
    }
    found
}

unsafe extern "C" fn visit_main_image(
    info: *mut libc::dl_phdr_info,
    _size: libc::size_t,
    data: *mut c_void,
) -> c_int {
    // SAFETY: `data` is the `Option<Vec<u8>>` passed by `main_executable_build_id`
    let found = unsafe { &mut *data.cast::<Option<Vec<u8>>>() };
    // SAFETY: the loader hands us a valid `dl_phdr_info` for this call
    let info = unsafe { &*info };

    if info.dlpi_phdr.is_null() {
        return 1;
    }

    // SAFETY: `dlpi_phdr` points at `dlpi_phnum` program headers
    let headers =
        unsafe { std::slice::from_raw_parts(info.dlpi_phdr, usize::from(info.dlpi_phnum)) };

    for header in headers.iter().filter(|h| h.p_type == libc::PT_NOTE) {
        let start = (info.dlpi_addr as usize).wrapping_add(header.p_vaddr as usize);
        // SAFETY: PT_NOTE segments are loaded, so `p_memsz` bytes at the
        // relocated address are mapped and readable
        let notes =
            unsafe { std::slice::from_raw_parts(start as *const u8, header.p_memsz as usize) };
        if let Some(id) = find_build_id(notes) {
            *found = Some(id.to_vec());
            break;
        }
    }

    // Stop after the first image: it is the main executable
    1
}

fn align4(n: usize) -> Option<usize> {
    n.checked_add(3).map(|v| v & !3)
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw = bytes.get(at..at + 4)?;
    Some(u32::from_ne_bytes(raw.try_into().ok()?))
}

/// Scan a note segment for the `NT_GNU_BUILD_ID` descriptor
fn find_build_id(mut notes: &[u8]) -> Option<&[u8]> {
    while notes.len() >= NOTE_HEADER_LEN {
        let name_len = read_u32(notes, 0)? as usize;
        let desc_len = read_u32(notes, 4)? as usize;
        let kind = read_u32(notes, 8)?;

        let desc_start = NOTE_HEADER_LEN.checked_add(align4(name_len)?)?;
        let desc_end = desc_start.checked_add(desc_len)?;
        let name_end = NOTE_HEADER_LEN.checked_add(name_len)?;
        let name = notes.get(NOTE_HEADER_LEN..name_end)?;
        let desc = notes.get(desc_start..desc_end)?;

        if kind == NT_GNU_BUILD_ID && name == GNU_OWNER && !desc.is_empty() {
            return Some(desc);
        }

        let next = desc_start.checked_add(align4(desc_len)?)?;
        notes = notes.get(next..).unwrap_or_default();
    }
    None
}

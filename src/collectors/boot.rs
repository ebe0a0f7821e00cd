use crate::models::drive::BootCode;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const SECTOR: usize = 512;
/// MBR boot code ends where the disk signature and partition table begin.
const CODE_END: usize = 440;

/// Read the first sector of a disk. Needs read access to the device node.
pub fn read_sector(path: &Path) -> Option<[u8; SECTOR]> {
    let mut buf = [0u8; SECTOR];
    File::open(path).ok()?.read_exact(&mut buf).ok()?;
    Some(buf)
}

fn contains(hay: &[u8], needle: &[u8]) -> bool {
    hay.windows(needle.len()).any(|w| w == needle)
}

/// Identify the boot loader installed in an MBR sector.
pub fn scan(sector: &[u8]) -> Option<BootCode> {
    if sector.len() < SECTOR || sector[510] != 0x55 || sector[511] != 0xAA {
        return None;
    }
    let code = &sector[..CODE_END];
    if code.iter().all(|b| *b == 0) {
        return None;
    }
    if contains(code, b"GRUB") {
        Some(BootCode::Grub)
    } else if contains(code, b"SYSLINUX") || contains(code, b"ISOLINUX") {
        Some(BootCode::Syslinux)
    } else if contains(code, b"Invalid partition table") || contains(code, b"BOOTMGR") {
        Some(BootCode::Windows)
    } else {
        Some(BootCode::Other)
    }
}

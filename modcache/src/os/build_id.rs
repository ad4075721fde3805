//! Build identifiers of ELF binaries

use log::debug;
use object::Object;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Read the GNU build-id note of the binary at `path`.
///
/// Returns `None` if the file cannot be read, is not an object file, or has
/// no build-id note.
#[must_use]
pub fn read_build_id(path: &Path) -> Option<Vec<u8>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            debug!("Cannot read {} for its build id: {e}", path.display());
            return None;
        }
    };

    let obj_file = object::File::parse(&*data).ok()?;
    match obj_file.build_id() {
        Ok(id) => id.map(<[u8]>::to_vec),
        Err(e) => {
            debug!("Malformed build id note in {}: {e}", path.display());
            None
        }
    }
}

/// Format a build id the way Breakpad symbol servers expect it.
///
/// The first 16 bytes (zero padded) are read as a GUID whose first three
/// fields are stored little-endian, printed as upper-case hex, followed by an
/// age of `0`.
#[must_use]
pub fn symbol_server_id(build_id: &[u8]) -> String {
    let mut guid = [0u8; 16];
    let len = build_id.len().min(guid.len());
    guid[..len].copy_from_slice(&build_id[..len]);

    guid[0..4].reverse();
    guid[4..6].reverse();
    guid[6..8].reverse();

    let mut id = String::with_capacity(33);
    for byte in guid {
        let _ = write!(id, "{byte:02X}");
    }
    id.push('0');
    id
}

/// Lower-case hex rendering of a build id
#[must_use]
pub fn hex_id(build_id: &[u8]) -> String {
    let mut id = String::with_capacity(build_id.len() * 2);
    for byte in build_id {
        let _ = write!(id, "{byte:02x}");
    }
    id
}

//! Top-level ISO BMFF (MP4/QuickTime) atom inspection.
//!
//! Only box headers are read; payloads are skipped with seeks, so inspecting a
//! multi-gigabyte file costs a handful of small reads.

use std::io::SeekFrom;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

const MAX_ATOMS: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    pub kind: [u8; 4],
    pub offset: u64,
    pub size: u64,
}

impl Atom {
    pub fn kind_str(&self) -> String {
        String::from_utf8_lossy(&self.kind).to_string()
    }
}

/// List the top-level atoms of the file at `path`, in file order.
///
/// Parsing stops quietly at the first truncated or malformed header.
pub async fn top_level_atoms(path: &Path) -> std::io::Result<Vec<Atom>> {
    let mut file = tokio::fs::File::open(path).await?;
    let file_len = file.metadata().await?.len();

    let mut atoms = Vec::new();
    let mut offset = 0u64;

    while offset + 8 <= file_len && atoms.len() < MAX_ATOMS {
        file.seek(SeekFrom::Start(offset)).await?;
        let mut header = [0u8; 8];
        file.read_exact(&mut header).await?;

        let size32 = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let kind = [header[4], header[5], header[6], header[7]];

        let size = match size32 {
            // Extends to end of file
            0 => file_len - offset,
            // 64-bit size follows the type
            1 => {
                if offset + 16 > file_len {
                    break;
                }
                let mut large = [0u8; 8];
                file.read_exact(&mut large).await?;
                u64::from_be_bytes(large)
            }
            n => n,
        };

        if size < 8 || offset.saturating_add(size) > file_len {
            break;
        }

        atoms.push(Atom { kind, offset, size });
        offset += size;
    }

    Ok(atoms)
}

/// Whether `moov` precedes the first `mdat`, so playback can start before the
/// whole file arrives.
pub async fn is_faststart(path: &Path) -> std::io::Result<bool> {
    let atoms = top_level_atoms(path).await?;
    let moov = atoms.iter().position(|a| &a.kind == b"moov");
    let mdat = atoms.iter().position(|a| &a.kind == b"mdat");
    Ok(matches!((moov, mdat), (Some(m), Some(d)) if m < d))
}

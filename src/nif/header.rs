use super::stream::decode_string;
use super::Version;
use crate::errors::Result;
use crate::util::cur::Cur;

/// The only file version Bethesda's Skyrim and Fallout 4 era games use.
pub const FILE_VERSION: u32 = 0x1402_0007;
/// Supported stream versions: Skyrim (83), Skyrim SE (100), Fallout 4 (130).
pub const MIN_STREAM_VERSION: u32 = 83;
pub const MAX_STREAM_VERSION: u32 = 130;

#[derive(Debug, Clone)]
pub struct Header {
    pub version_string: String,
    pub version: Version,
    pub author: String,
    pub block_types: Vec<String>,
    pub block_type_index: Vec<u16>,
    pub block_sizes: Vec<u32>,
    pub strings: Vec<String>,
}

impl Header {
    pub fn num_blocks(&self) -> usize {
        self.block_type_index.len()
    }

    pub fn block_type(&self, block: usize) -> &str {
        let idx = (self.block_type_index[block] & 0x7FFF) as usize;
        self.block_types.get(idx).map(|s| s.as_str()).unwrap_or("")
    }
}

pub fn read_header(cur: &mut Cur) -> Result<Header> {
    let line = cur.next_until(b'\n', 128)?;
    let version_string = decode_string(line);
    if !version_string.starts_with("Gamebryo File Format")
        && !version_string.starts_with("NetImmerse File Format")
    {
        bail!("not a NIF file");
    }

    fields!(*cur, NifHeader {
        file_version: u32,
        endian: u8,
        user_version: u32,
        num_blocks: u32,
        end: Cur,
    });
    *cur = end;

    if file_version != FILE_VERSION {
        bail!("unsupported NIF version {:#010x} ({})", file_version, version_string);
    }
    if endian != 1 {
        bail!("big-endian NIFs are not supported");
    }
    if user_version < 3 {
        bail!("NIF has no Bethesda stream header (user version {})", user_version);
    }

    let stream = cur.next::<u32>()?;
    if stream < MIN_STREAM_VERSION || stream > MAX_STREAM_VERSION {
        bail!("unsupported NIF stream version {}", stream);
    }
    let author = export_string(cur)?;
    export_string(cur)?; // process script
    export_string(cur)?; // export script
    if stream >= 103 {
        export_string(cur)?; // max filepath
    }

    let num_block_types = cur.next::<u16>()? as usize;
    let mut block_types = vec![];
    for _ in 0..num_block_types {
        block_types.push(sized_string(cur)?);
    }

    let num_blocks = num_blocks as usize;
    let block_type_index: Vec<u16> = cur.next_n::<u16>(num_blocks)?.collect();
    for (i, &idx) in block_type_index.iter().enumerate() {
        if (idx & 0x7FFF) as usize >= block_types.len() {
            bail!("block {} has bad type index {}", i, idx);
        }
    }
    let block_sizes: Vec<u32> = cur.next_n::<u32>(num_blocks)?.collect();

    let num_strings = cur.next::<u32>()? as usize;
    let _max_string_len = cur.next::<u32>()?;
    let mut strings = vec![];
    for _ in 0..num_strings {
        strings.push(sized_string(cur)?);
    }

    let num_groups = cur.next::<u32>()? as usize;
    cur.next_n::<u32>(num_groups)?;

    Ok(Header {
        version_string,
        version: Version { file: file_version, user: user_version, stream },
        author,
        block_types,
        block_type_index,
        block_sizes,
        strings,
    })
}

fn export_string(cur: &mut Cur) -> Result<String> {
    let len = cur.next::<u8>()? as usize;
    Ok(decode_string(cur.next_n_u8s(len)?))
}

fn sized_string(cur: &mut Cur) -> Result<String> {
    let len = cur.next::<u32>()? as usize;
    Ok(decode_string(cur.next_n_u8s(len)?))
}

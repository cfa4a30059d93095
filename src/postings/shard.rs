use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use lru::LruCache;
use memmap2::Mmap;
use parking_lot::Mutex;
use crate::cache::container::SegmentCaches;
use crate::compression::vbyte;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::Term;
use crate::postings::posting::Posting;
use crate::storage::container::{self, ContainerKind};
use crate::storage::descriptor::SegmentDescriptor;
use crate::storage::layout::StorageLayout;

/// Terms are spread across shard files by their token's first character,
/// so a lookup opens only the one relevant file.
pub const SHARD_COUNT: u8 = 16;

pub fn shard_id(token: &str) -> u8 {
    let first = match token.chars().next() {
        Some(ch) => ch,
        None => return 0,
    };
    let mut buf = [0u8; 4];
    (crc32fast::hash(first.encode_utf8(&mut buf).as_bytes()) % SHARD_COUNT as u32) as u8
}

/// Relative offset and length of each term's posting block in the data
/// region.
type Directory = HashMap<Term, (u32, u32)>;

/// Read-only handle on one posting shard file. The file is memory-mapped;
/// the term directory is decoded once at open and individual posting
/// blocks are decoded on demand, with decoded lists kept in a bounded LRU.
pub struct ShardHandle {
    mmap: Mmap,
    data_start: usize,
    directory: Directory,
    cache: Mutex<LruCache<Term, Arc<Vec<Posting>>>>,
}

impl ShardHandle {
    pub fn open(path: &Path, cache_capacity: usize) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let payload = container::verify(&mmap, ContainerKind::Postings)?;

        if payload.len() < 8 {
            return Err(Error::new(ErrorKind::Parse, "posting shard truncated".to_string()));
        }
        let dir_len =
            u64::from_le_bytes(mmap[payload.start..payload.start + 8].try_into().unwrap()) as usize;
        let dir_start = payload.start + 8;
        if dir_start + dir_len > payload.end {
            return Err(Error::new(ErrorKind::Parse, "posting directory truncated".to_string()));
        }
        let directory: Directory = bincode::deserialize(&mmap[dir_start..dir_start + dir_len])?;
        let data_start = dir_start + dir_len;

        let capacity = NonZeroUsize::new(cache_capacity.max(1)).unwrap();
        Ok(ShardHandle {
            mmap,
            data_start,
            directory,
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn contains(&self, term: &Term) -> bool {
        self.directory.contains_key(term)
    }

    /// Postings for `term`, ascending by document id; `None` when the term
    /// is not present in this shard (a normal outcome, not an error).
    pub fn postings(&self, term: &Term) -> Result<Option<Arc<Vec<Posting>>>> {
        {
            let mut cache = self.cache.lock();
            if let Some(postings) = cache.get(term) {
                return Ok(Some(postings.clone()));
            }
        }

        let (offset, length) = match self.directory.get(term) {
            Some(entry) => *entry,
            None => return Ok(None),
        };

        let start = self.data_start + offset as usize;
        let end = start + length as usize;
        if end > self.mmap.len() {
            return Err(Error::new(ErrorKind::Parse, "posting block out of bounds".to_string()));
        }
        let postings = Arc::new(decode_block(&self.mmap[start..end])?);

        let mut cache = self.cache.lock();
        cache.put(term.clone(), postings.clone());
        Ok(Some(postings))
    }

    pub fn term_count(&self) -> usize {
        self.directory.len()
    }
}

fn decode_block(block: &[u8]) -> Result<Vec<Posting>> {
    if block.len() < 4 {
        return Err(Error::new(ErrorKind::Parse, "posting block truncated".to_string()));
    }
    let count = u32::from_le_bytes(block[0..4].try_into().unwrap()) as usize;
    let mut pos = 4;
    let doc_ids = vbyte::decode_sorted(block, &mut pos, count)?;
    let mut postings = Vec::with_capacity(count);
    for doc_id in doc_ids {
        let weight = vbyte::decode_u32(block, &mut pos)?;
        postings.push(Posting::new(doc_id.into(), weight));
    }
    Ok(postings)
}

/// Write one shard file: framed header, term directory, then one
/// delta+vbyte coded block per term.
pub fn write_shard(path: &Path, terms: &BTreeMap<Term, Vec<Posting>>) -> Result<()> {
    let mut directory = Directory::with_capacity(terms.len());
    let mut data = Vec::new();

    for (term, postings) in terms {
        let start = data.len() as u32;
        data.extend_from_slice(&(postings.len() as u32).to_le_bytes());
        let doc_ids: Vec<u32> = postings.iter().map(|p| p.document_id.0).collect();
        vbyte::encode_sorted(&mut data, &doc_ids);
        for posting in postings {
            vbyte::encode_u32(&mut data, posting.weight);
        }
        directory.insert(term.clone(), (start, data.len() as u32 - start));
    }

    let directory_bytes = bincode::serialize(&directory)?;
    let mut payload = Vec::with_capacity(8 + directory_bytes.len() + data.len());
    payload.extend_from_slice(&(directory_bytes.len() as u64).to_le_bytes());
    payload.extend_from_slice(&directory_bytes);
    payload.extend_from_slice(&data);
    container::write_file(path, ContainerKind::Postings, &payload)
}

/// Load the shard that would hold `token` through the container cache.
/// `Ok(None)` when the segment has no such shard (term cannot be present).
pub fn load_shard(
    layout: &StorageLayout,
    descriptor: &SegmentDescriptor,
    caches: &SegmentCaches,
    token: &str,
    cache_capacity: usize,
) -> Result<Option<Arc<ShardHandle>>> {
    let shard = shard_id(token);
    if !descriptor.has_shard(shard) {
        return Ok(None);
    }
    let path = layout.shard_path(descriptor.version, shard);
    caches
        .shards
        .get_or_load(&(descriptor.version, shard), || {
            ShardHandle::open(&path, cache_capacity)
        })
        .map(Some)
}

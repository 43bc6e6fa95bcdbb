//! Sparse data-range engine for regular files.
//!
//! A file's content is a list of [`DataRange`]s kept sorted by offset. No two
//! ranges overlap or touch: a write adjacent to an existing range is merged
//! into it. Everything between ranges, and between the last range and `size`,
//! is an implicit hole that reads as zeros and occupies no memory.

use crate::error::{Error, Result};

/// A contiguous run of stored bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DataRange {
    pub(crate) offset: u64,
    pub(crate) data: Vec<u8>,
}

impl DataRange {
    pub(crate) fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub(crate) fn end(&self) -> u64 {
        self.offset + self.len()
    }
}

/// A run of unstored, zero-valued bytes. Computed, never materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HoleRange {
    pub(crate) offset: u64,
    pub(crate) size: u64,
}

/// One step of a [`DataIter`] walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Data { offset: u64, bytes: &'a [u8] },
    Hole(HoleRange),
}

impl Segment<'_> {
    pub(crate) fn offset(&self) -> u64 {
        match self {
            Segment::Data { offset, .. } => *offset,
            Segment::Hole(hole) => hole.offset,
        }
    }

    pub(crate) fn len(&self) -> u64 {
        match self {
            Segment::Data { bytes, .. } => bytes.len() as u64,
            Segment::Hole(hole) => hole.size,
        }
    }

    pub(crate) fn is_data(&self) -> bool {
        matches!(self, Segment::Data { .. })
    }
}

/// Content of a regular inode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RegularData {
    pub(crate) size: u64,
    ranges: Vec<DataRange>,
}

fn to_usize(n: u64) -> Result<usize> {
    usize::try_from(n).map_err(|_| Error::OutOfMemory)
}

fn zeroed(len: u64) -> Result<Vec<u8>> {
    let len = to_usize(len)?;
    let mut data = Vec::new();
    data.try_reserve_exact(len)?;
    data.resize(len, 0);
    Ok(data)
}

impl RegularData {
    /// Rebuild from persisted parts. The caller has validated ordering.
    pub(crate) fn from_parts(size: u64, ranges: Vec<DataRange>) -> Self {
        RegularData { size, ranges }
    }

    pub(crate) fn ranges(&self) -> &[DataRange] {
        &self.ranges
    }

    /// Bytes actually held in memory.
    pub(crate) fn stored_bytes(&self) -> u64 {
        self.ranges.iter().map(DataRange::len).sum()
    }

    /// Ensure every byte of `[offset, offset + len)` is backed by storage.
    ///
    /// Newly backed bytes are zero. Ranges touching or overlapping the span
    /// are merged into a single range with one reallocation. Returns the index
    /// of the range that now contains `offset`. Grows `size` to cover the span.
    pub(crate) fn alloc_data(&mut self, offset: u64, len: u64) -> Result<usize> {
        let end = offset.checked_add(len).ok_or(Error::FileTooBig)?;
        let first = self.ranges.partition_point(|r| r.end() < offset);
        let last = self.ranges.partition_point(|r| r.offset <= end);

        if first == last {
            let data = zeroed(len)?;
            self.ranges.try_reserve(1)?;
            self.ranges.insert(first, DataRange { offset, data });
        } else {
            let start = self.ranges[first].offset.min(offset);
            let new_end = self.ranges[last - 1].end().max(end);
            let new_len = to_usize(new_end - start)?;

            if self.ranges[first].offset == start {
                let base = &mut self.ranges[first].data;
                base.try_reserve_exact(new_len - base.len())?;
                base.resize(new_len, 0);
            } else {
                let mut data = zeroed(new_end - start)?;
                let head = &self.ranges[first];
                let at = (head.offset - start) as usize;
                data[at..at + head.data.len()].copy_from_slice(&head.data);
                self.ranges[first] = DataRange {
                    offset: start,
                    data,
                };
            }

            let absorbed: Vec<DataRange> = self.ranges.drain(first + 1..last).collect();
            let base = &mut self.ranges[first];
            for range in absorbed {
                let at = (range.offset - start) as usize;
                base.data[at..at + range.data.len()].copy_from_slice(&range.data);
            }
        }

        self.size = self.size.max(end);
        Ok(first)
    }

    /// Store `buf` at `offset`, growing the file as needed.
    pub(crate) fn write(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let idx = self.alloc_data(offset, buf.len() as u64)?;
        let range = &mut self.ranges[idx];
        let at = (offset - range.offset) as usize;
        range.data[at..at + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    /// Fill `buf` from `offset`, zeros for holes. Returns the byte count,
    /// which is short only at end of file.
    pub(crate) fn read(&self, offset: u64, buf: &mut [u8]) -> usize {
        if offset >= self.size {
            return 0;
        }
        let n = (buf.len() as u64).min(self.size - offset) as usize;
        let mut done = 0;
        for segment in self.iter_from(offset) {
            if done == n {
                break;
            }
            let take = (segment.len() as usize).min(n - done);
            match segment {
                Segment::Data { bytes, .. } => {
                    buf[done..done + take].copy_from_slice(&bytes[..take]);
                }
                Segment::Hole(_) => buf[done..done + take].fill(0),
            }
            done += take;
        }
        n
    }

    /// Set the file size. Growing only moves `size` (the new tail is a
    /// hole); shrinking releases every byte at or past `len`.
    pub(crate) fn truncate(&mut self, len: u64) {
        if len >= self.size {
            self.size = len;
            return;
        }
        if len == 0 {
            self.ranges = Vec::new();
            self.size = 0;
            return;
        }
        let keep = self.ranges.partition_point(|r| r.offset < len);
        self.ranges.truncate(keep);
        if let Some(last) = self.ranges.last_mut() {
            if last.end() > len {
                last.data.truncate((len - last.offset) as usize);
                last.data.shrink_to_fit();
            }
        }
        self.size = len;
    }

    /// Release the bytes of `[offset, offset + len)`, turning them into a
    /// hole. `size` is unchanged.
    pub(crate) fn punch_hole(&mut self, offset: u64, len: u64) -> Result<()> {
        let end = offset.saturating_add(len).min(self.size);
        if offset >= end {
            return Ok(());
        }

        let first = self.ranges.partition_point(|r| r.end() <= offset);
        let last = self.ranges.partition_point(|r| r.offset < end);
        if first == last {
            return Ok(());
        }

        // A single range straddling both edges splits in two.
        if last - first == 1 {
            let r = &self.ranges[first];
            if r.offset < offset && r.end() > end {
                let cut = (end - r.offset) as usize;
                let mut tail = Vec::new();
                tail.try_reserve_exact(r.data.len() - cut)?;
                tail.extend_from_slice(&r.data[cut..]);
                self.ranges.try_reserve(1)?;

                let head = &mut self.ranges[first];
                head.data.truncate((offset - head.offset) as usize);
                head.data.shrink_to_fit();
                self.ranges.insert(
                    first + 1,
                    DataRange {
                        offset: end,
                        data: tail,
                    },
                );
                return Ok(());
            }
        }

        let mut lo = first;
        let mut hi = last;
        {
            let head = &mut self.ranges[first];
            if head.offset < offset {
                head.data.truncate((offset - head.offset) as usize);
                head.data.shrink_to_fit();
                lo += 1;
            }
        }
        if hi > lo {
            let tail = &mut self.ranges[hi - 1];
            if tail.end() > end {
                tail.data.drain(..(end - tail.offset) as usize);
                tail.data.shrink_to_fit();
                tail.offset = end;
                hi -= 1;
            }
        }
        self.ranges.drain(lo..hi);
        Ok(())
    }

    /// Walk data and hole segments starting at `offset`.
    pub(crate) fn iter_from(&self, offset: u64) -> DataIter<'_> {
        DataIter::new(self, offset)
    }

    /// First offset at or after `offset` that holds data, or `size`.
    pub(crate) fn seek_data(&self, offset: u64) -> u64 {
        self.iter_from(offset)
            .find(Segment::is_data)
            .map_or(self.size, |s| s.offset())
    }

    /// First offset at or after `offset` inside a hole, or `size`.
    pub(crate) fn seek_hole(&self, offset: u64) -> u64 {
        self.iter_from(offset)
            .find(|s| !s.is_data())
            .map_or(self.size, |s| s.offset())
    }

    /// Sorted, non-touching, and within `size`.
    pub(crate) fn is_canonical(&self) -> bool {
        let ordered = self
            .ranges
            .windows(2)
            .all(|w| w[0].end() < w[1].offset);
        let nonempty = self.ranges.iter().all(|r| !r.data.is_empty());
        let bounded = self.ranges.last().map_or(true, |r| r.end() <= self.size);
        ordered && nonempty && bounded
    }
}

/// Cursor over the alternating data/hole segments of a file.
///
/// The first segment is clipped to start at the requested offset. Iteration
/// ends at `size`.
#[derive(Debug, Clone)]
pub(crate) struct DataIter<'a> {
    ranges: &'a [DataRange],
    size: u64,
    pos: u64,
    /// Index of the first range ending after `pos`.
    idx: usize,
}

impl<'a> DataIter<'a> {
    fn new(file: &'a RegularData, offset: u64) -> Self {
        let ranges = file.ranges();
        DataIter {
            ranges,
            size: file.size,
            pos: offset,
            idx: ranges.partition_point(|r| r.end() <= offset),
        }
    }
}

impl<'a> Iterator for DataIter<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Segment<'a>> {
        if self.pos >= self.size {
            return None;
        }
        match self.ranges.get(self.idx) {
            Some(r) if r.offset <= self.pos => {
                let skip = (self.pos - r.offset) as usize;
                let segment = Segment::Data {
                    offset: self.pos,
                    bytes: &r.data[skip..],
                };
                self.pos = r.end();
                self.idx += 1;
                Some(segment)
            }
            next => {
                let stop = next.map_or(self.size, |r| r.offset.min(self.size));
                let segment = Segment::Hole(HoleRange {
                    offset: self.pos,
                    size: stop - self.pos,
                });
                self.pos = stop;
                Some(segment)
            }
        }
    }
}

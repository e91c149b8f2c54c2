//! Source files, and positions within them.

use std::fmt;
use std::num::NonZeroU32;
use std::ops::Range;

use codespan_reporting::files::{Error, SimpleFile};

/// File id.
///
/// A `NonZeroU32` keeps `Option<FileId>` and `ByteRange` small.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FileId(NonZeroU32);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl TryFrom<u32> for FileId {
    type Error = <NonZeroU32 as TryFrom<u32>>::Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(FileId(NonZeroU32::try_from(value)?))
    }
}

impl From<FileId> for usize {
    fn from(file_id: FileId) -> usize {
        file_id.0.get() as usize
    }
}

/// Byte offsets into source files.
pub type BytePos = u32;

/// A range of bytes in a specific source file.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct ByteRange {
    file_id: FileId,
    start: BytePos,
    end: BytePos,
}

impl fmt::Debug for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteRange({}, {}..{})", self.file_id, self.start, self.end)
    }
}

impl ByteRange {
    pub const fn new(file_id: FileId, start: BytePos, end: BytePos) -> ByteRange {
        ByteRange {
            file_id,
            start,
            end,
        }
    }

    pub const fn file_id(&self) -> FileId {
        self.file_id
    }

    pub const fn start(&self) -> BytePos {
        self.start
    }

    pub const fn end(&self) -> BytePos {
        self.end
    }

    /// The smallest range covering both `self` and `other`.
    ///
    /// Ranges from different files cannot be merged, in which case `self` is
    /// returned unchanged.
    pub fn merge(self, other: ByteRange) -> ByteRange {
        if self.file_id != other.file_id {
            return self;
        }
        ByteRange::new(
            self.file_id,
            self.start.min(other.start),
            self.end.max(other.end),
        )
    }
}

impl From<ByteRange> for Range<usize> {
    fn from(range: ByteRange) -> Range<usize> {
        (range.start as usize)..(range.end as usize)
    }
}

/// A database of source files, addressed by [`FileId`].
pub struct Files {
    files: Vec<SimpleFile<String, String>>,
}

impl Files {
    pub fn new() -> Files {
        Files { files: Vec::new() }
    }

    /// Add a file to the database, returning the id that refers to it.
    pub fn add(&mut self, name: impl Into<String>, source: impl Into<String>) -> FileId {
        let source = source.into();
        assert!(
            source.len() <= BytePos::MAX as usize,
            "source files must be smaller than 4GiB",
        );

        self.files.push(SimpleFile::new(name.into(), source));
        let len = u32::try_from(self.files.len()).expect("too many source files");
        FileId::try_from(len).expect("file ids start at one")
    }

    pub fn get(&self, file_id: FileId) -> Result<&SimpleFile<String, String>, Error> {
        self.files
            .get(usize::from(file_id) - 1)
            .ok_or(Error::FileMissing)
    }

    pub fn source(&self, file_id: FileId) -> Option<&str> {
        self.get(file_id).ok().map(|file| file.source().as_str())
    }
}

impl Default for Files {
    fn default() -> Files {
        Files::new()
    }
}

impl<'a> codespan_reporting::files::Files<'a> for Files {
    type FileId = FileId;
    type Name = String;
    type Source = &'a str;

    fn name(&self, file_id: FileId) -> Result<String, Error> {
        Ok(self.get(file_id)?.name().clone())
    }

    fn source(&'a self, file_id: FileId) -> Result<&'a str, Error> {
        Ok(self.get(file_id)?.source().as_str())
    }

    fn line_index(&self, file_id: FileId, byte_index: usize) -> Result<usize, Error> {
        self.get(file_id)?.line_index((), byte_index)
    }

    fn line_range(&self, file_id: FileId, line_index: usize) -> Result<Range<usize>, Error> {
        self.get(file_id)?.line_range((), line_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// `ByteRange` is stored on every name in the surface syntax.
    fn byte_range_size() {
        assert_eq!(std::mem::size_of::<ByteRange>(), 12);
        assert_eq!(std::mem::size_of::<Option<ByteRange>>(), 12);
    }

    #[test]
    fn file_ids_start_at_one() {
        let mut files = Files::new();
        let first = files.add("a.ccn", "node A;");
        let second = files.add("b.ccn", "node B;");

        assert_eq!(usize::from(first), 1);
        assert_eq!(usize::from(second), 2);
        assert_eq!(files.source(second), Some("node B;"));
    }

    #[test]
    fn merge_ranges() {
        let mut files = Files::new();
        let file_id = files.add("a.ccn", "");
        let range = ByteRange::new(file_id, 4, 8).merge(ByteRange::new(file_id, 2, 5));

        assert_eq!((range.start(), range.end()), (2, 8));
    }
}

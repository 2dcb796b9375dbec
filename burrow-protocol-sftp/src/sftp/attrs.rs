//! SFTP attribute records and `ls -l` style listing lines.

use std::fs::Metadata;

use russh_sftp::protocol::FileAttributes;
use time::{OffsetDateTime, UtcOffset};

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
#[cfg(not(unix))]
const S_IFREG: u32 = 0o100000;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Attributes reported for a file, recomputed on every request.
/// The all-zero `Default` is reported for entries that could not be stat'ed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileAttrs {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    /// Whole seconds since the epoch
    pub atime: u32,
    /// Whole seconds since the epoch
    pub mtime: u32,
}

impl FileAttrs {
    #[cfg(unix)]
    pub fn from_metadata(meta: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;

        Self {
            mode: meta.mode(),
            uid: meta.uid(),
            gid: meta.gid(),
            size: meta.len(),
            atime: clamp_seconds(meta.atime()),
            mtime: clamp_seconds(meta.mtime()),
        }
    }

    #[cfg(not(unix))]
    pub fn from_metadata(meta: &Metadata) -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};

        let seconds = |time: std::io::Result<SystemTime>| {
            time.ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| clamp_seconds(d.as_secs() as i64))
                .unwrap_or(0)
        };
        let (file_type, permissions) = if meta.is_dir() {
            (S_IFDIR, 0o755)
        } else {
            (S_IFREG, 0o644)
        };
        let permissions = if meta.permissions().readonly() {
            permissions & !0o222
        } else {
            permissions
        };

        Self {
            mode: file_type | permissions,
            uid: 0,
            gid: 0,
            size: meta.len(),
            atime: seconds(meta.accessed()),
            mtime: seconds(meta.modified()),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }
}

fn clamp_seconds(seconds: i64) -> u32 {
    u32::try_from(seconds.max(0)).unwrap_or(u32::MAX)
}

impl From<FileAttrs> for FileAttributes {
    fn from(attrs: FileAttrs) -> Self {
        let mut attributes = FileAttributes::default();
        attributes.size = Some(attrs.size);
        attributes.uid = Some(attrs.uid);
        attributes.gid = Some(attrs.gid);
        attributes.permissions = Some(attrs.mode);
        attributes.atime = Some(attrs.atime);
        attributes.mtime = Some(attrs.mtime);
        attributes
    }
}

/// Display line for a directory entry, e.g.
/// `-rw-r--r-- 1 user group          2 Dec 20 2025 a.txt`.
///
/// Advisory only, clients are expected to read the structured attributes.
/// The date is in the server's local time, or UTC when the local offset
/// cannot be determined.
pub fn long_name(filename: &str, attrs: &FileAttrs) -> String {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    long_name_at_offset(filename, attrs, offset)
}

fn long_name_at_offset(filename: &str, attrs: &FileAttrs, offset: UtcOffset) -> String {
    let kind = if attrs.is_dir() { 'd' } else { '-' };
    let mut permissions = String::with_capacity(9);
    for shift in [6, 3, 0] {
        let bits = attrs.mode >> shift;
        permissions.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        permissions.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        permissions.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }

    format!(
        "{kind}{permissions} 1 user group {:>10} {} {filename}",
        attrs.size,
        format_date(attrs.mtime, offset)
    )
}

fn format_date(mtime: u32, offset: UtcOffset) -> String {
    let date = OffsetDateTime::from_unix_timestamp(i64::from(mtime));
    match date.map(|date| date.to_offset(offset)) {
        Ok(date) => format!(
            "{} {:02} {}",
            MONTHS[usize::from(u8::from(date.month())) - 1],
            date.day(),
            date.year()
        ),
        Err(_) => "Jan 01 1970".to_owned(),
    }
}

//! NFS version 3 XDR types and constants (RFC 1813 section 2).
//!
//! Procedure specific argument/result structures live in the submodules:
//! [`dir`] for directory procedures, [`file`] for data procedures and [`fs`]
//! for the file system information procedures.

#![allow(non_camel_case_types)]

use std::fmt;
use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::*;

pub mod dir;
pub mod file;
pub mod fs;

pub const PROGRAM: u32 = 100003;
pub const VERSION: u32 = 3;

/// The maximum size in bytes of the opaque file handle.
pub const NFS3_FHSIZE: usize = 64;
/// The size in bytes of the opaque cookie verifier passed by READDIR and
/// READDIRPLUS.
pub const NFS3_COOKIEVERFSIZE: usize = 8;
pub const NFS3_CREATEVERFSIZE: usize = 8;
pub const NFS3_WRITEVERFSIZE: usize = 8;

/// Longest single path component accepted from a client.
pub const NFS3_MAXNAMLEN: usize = 255;

/// Byte string used for file names and symlink targets. NFS does not mandate
/// an encoding, so the bytes are kept as received.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct nfsstring(pub Vec<u8>);

impl nfsstring {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for nfsstring {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for nfsstring {
    fn from(value: &[u8]) -> Self {
        Self(value.into())
    }
}

impl From<&str> for nfsstring {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().into())
    }
}

impl AsRef<[u8]> for nfsstring {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::ops::Deref for nfsstring {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Debug for nfsstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for nfsstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl Serialize for nfsstring {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.0.serialize(dest)
    }
}

impl Deserialize for nfsstring {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.0.deserialize(src)
    }
}

/// NFSv3 procedure numbers.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
pub enum NFSProgram {
    NFSPROC3_NULL = 0,
    NFSPROC3_GETATTR = 1,
    NFSPROC3_SETATTR = 2,
    NFSPROC3_LOOKUP = 3,
    NFSPROC3_ACCESS = 4,
    NFSPROC3_READLINK = 5,
    NFSPROC3_READ = 6,
    NFSPROC3_WRITE = 7,
    NFSPROC3_CREATE = 8,
    NFSPROC3_MKDIR = 9,
    NFSPROC3_SYMLINK = 10,
    NFSPROC3_MKNOD = 11,
    NFSPROC3_REMOVE = 12,
    NFSPROC3_RMDIR = 13,
    NFSPROC3_RENAME = 14,
    NFSPROC3_LINK = 15,
    NFSPROC3_READDIR = 16,
    NFSPROC3_READDIRPLUS = 17,
    NFSPROC3_FSSTAT = 18,
    NFSPROC3_FSINFO = 19,
    NFSPROC3_PATHCONF = 20,
    NFSPROC3_COMMIT = 21,
}

pub type filename3 = nfsstring;
pub type nfspath3 = nfsstring;
pub type fileid3 = u64;
pub type cookie3 = u64;
pub type cookieverf3 = [u8; NFS3_COOKIEVERFSIZE];
pub type createverf3 = [u8; NFS3_CREATEVERFSIZE];
pub type writeverf3 = [u8; NFS3_WRITEVERFSIZE];
pub type uid3 = u32;
pub type gid3 = u32;
pub type size3 = u64;
pub type offset3 = u64;
pub type mode3 = u32;
pub type count3 = u32;

/// Status of every NFSv3 procedure.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum nfsstat3 {
    NFS3_OK = 0,
    NFS3ERR_PERM = 1,
    NFS3ERR_NOENT = 2,
    NFS3ERR_IO = 5,
    NFS3ERR_NXIO = 6,
    NFS3ERR_ACCES = 13,
    NFS3ERR_EXIST = 17,
    NFS3ERR_XDEV = 18,
    NFS3ERR_NODEV = 19,
    NFS3ERR_NOTDIR = 20,
    NFS3ERR_ISDIR = 21,
    NFS3ERR_INVAL = 22,
    NFS3ERR_FBIG = 27,
    NFS3ERR_NOSPC = 28,
    NFS3ERR_ROFS = 30,
    NFS3ERR_MLINK = 31,
    NFS3ERR_NAMETOOLONG = 63,
    NFS3ERR_NOTEMPTY = 66,
    NFS3ERR_DQUOT = 69,
    /// The handle does not (or no longer) refer to a cached object. Clients
    /// re-resolve from the root when they see this.
    NFS3ERR_STALE = 70,
    NFS3ERR_REMOTE = 71,
    NFS3ERR_BADHANDLE = 10001,
    NFS3ERR_NOT_SYNC = 10002,
    /// The READDIR cookie or verifier no longer matches the directory.
    NFS3ERR_BAD_COOKIE = 10003,
    NFS3ERR_NOTSUPP = 10004,
    NFS3ERR_TOOSMALL = 10005,
    NFS3ERR_SERVERFAULT = 10006,
    NFS3ERR_BADTYPE = 10007,
    NFS3ERR_JUKEBOX = 10008,
}
SerializeEnum!(nfsstat3);
DeserializeEnum!(nfsstat3);

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum ftype3 {
    #[default]
    NF3REG = 1,
    NF3DIR = 2,
    NF3BLK = 3,
    NF3CHR = 4,
    NF3LNK = 5,
    NF3SOCK = 6,
    NF3FIFO = 7,
}
SerializeEnum!(ftype3);
DeserializeEnum!(ftype3);

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct specdata3 {
    pub specdata1: u32,
    pub specdata2: u32,
}
DeserializeStruct!(specdata3, specdata1, specdata2);
SerializeStruct!(specdata3, specdata1, specdata2);

/// Opaque file handle, at most [`NFS3_FHSIZE`] bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct nfs_fh3 {
    pub data: Vec<u8>,
}
DeserializeStruct!(nfs_fh3, data);
SerializeStruct!(nfs_fh3, data);

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct nfstime3 {
    pub seconds: u32,
    pub nseconds: u32,
}
DeserializeStruct!(nfstime3, seconds, nseconds);
SerializeStruct!(nfstime3, seconds, nseconds);

/// File attributes as returned by GETATTR and every `post_op_attr`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct fattr3 {
    pub ftype: ftype3,
    pub mode: mode3,
    pub nlink: u32,
    pub uid: uid3,
    pub gid: gid3,
    pub size: size3,
    pub used: size3,
    pub rdev: specdata3,
    pub fsid: u64,
    pub fileid: fileid3,
    pub atime: nfstime3,
    pub mtime: nfstime3,
    pub ctime: nfstime3,
}
DeserializeStruct!(
    fattr3, ftype, mode, nlink, uid, gid, size, used, rdev, fsid, fileid, atime, mtime, ctime
);
SerializeStruct!(
    fattr3, ftype, mode, nlink, uid, gid, size, used, rdev, fsid, fileid, atime, mtime, ctime
);

/// Subset of attributes used for weak cache consistency checks.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct wcc_attr {
    pub size: size3,
    pub mtime: nfstime3,
    pub ctime: nfstime3,
}
DeserializeStruct!(wcc_attr, size, mtime, ctime);
SerializeStruct!(wcc_attr, size, mtime, ctime);

pub type pre_op_attr = Option<wcc_attr>;
pub type post_op_attr = Option<fattr3>;
pub type post_op_fh3 = Option<nfs_fh3>;

/// Attributes of an object before and after a modifying procedure.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct wcc_data {
    pub before: pre_op_attr,
    pub after: post_op_attr,
}
DeserializeStruct!(wcc_data, before, after);
SerializeStruct!(wcc_data, before, after);

pub type set_mode3 = Option<mode3>;
pub type set_uid3 = Option<uid3>;
pub type set_gid3 = Option<gid3>;
pub type set_size3 = Option<size3>;

/// `time_how` union shared by `set_atime` and `set_mtime`.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum set_time {
    #[default]
    DONT_CHANGE,
    SET_TO_SERVER_TIME,
    SET_TO_CLIENT_TIME(nfstime3),
}

pub type set_atime = set_time;
pub type set_mtime = set_time;

impl Serialize for set_time {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            set_time::DONT_CHANGE => 0_u32.serialize(dest),
            set_time::SET_TO_SERVER_TIME => 1_u32.serialize(dest),
            set_time::SET_TO_CLIENT_TIME(v) => {
                2_u32.serialize(dest)?;
                v.serialize(dest)
            }
        }
    }
}

impl Deserialize for set_time {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match deserialize::<u32>(src)? {
            0 => set_time::DONT_CHANGE,
            1 => set_time::SET_TO_SERVER_TIME,
            2 => set_time::SET_TO_CLIENT_TIME(deserialize(src)?),
            c => return Err(utils::invalid_data(&format!("Invalid time_how value: {c}"))),
        };
        Ok(())
    }
}

/// Attributes a client asks to set on CREATE, MKDIR, SYMLINK and SETATTR.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct sattr3 {
    pub mode: set_mode3,
    pub uid: set_uid3,
    pub gid: set_gid3,
    pub size: set_size3,
    pub atime: set_atime,
    pub mtime: set_mtime,
}
DeserializeStruct!(sattr3, mode, uid, gid, size, atime, mtime);
SerializeStruct!(sattr3, mode, uid, gid, size, atime, mtime);

/// A name inside a directory.
#[derive(Clone, Debug, Default)]
pub struct diropargs3 {
    pub dir: nfs_fh3,
    pub name: filename3,
}
DeserializeStruct!(diropargs3, dir, name);
SerializeStruct!(diropargs3, dir, name);

/// Successful LOOKUP / CREATE / MKDIR / SYMLINK share this tail.
#[derive(Clone, Debug, Default)]
pub struct diropres3ok {
    pub obj: post_op_fh3,
    pub obj_attributes: post_op_attr,
    pub dir_wcc: wcc_data,
}
DeserializeStruct!(diropres3ok, obj, obj_attributes, dir_wcc);
SerializeStruct!(diropres3ok, obj, obj_attributes, dir_wcc);

#[derive(Clone, Debug, Default)]
pub struct symlinkdata3 {
    pub symlink_attributes: sattr3,
    pub symlink_data: nfspath3,
}
DeserializeStruct!(symlinkdata3, symlink_attributes, symlink_data);
SerializeStruct!(symlinkdata3, symlink_attributes, symlink_data);

pub const ACCESS3_READ: u32 = 0x0001;
pub const ACCESS3_LOOKUP: u32 = 0x0002;
pub const ACCESS3_MODIFY: u32 = 0x0004;
pub const ACCESS3_EXTEND: u32 = 0x0008;
pub const ACCESS3_DELETE: u32 = 0x0010;
pub const ACCESS3_EXECUTE: u32 = 0x0020;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum createmode3 {
    #[default]
    UNCHECKED = 0,
    GUARDED = 1,
    EXCLUSIVE = 2,
}
SerializeEnum!(createmode3);
DeserializeEnum!(createmode3);

/// `createhow3` union switched on [`createmode3`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum createhow3 {
    UNCHECKED(sattr3),
    GUARDED(sattr3),
    EXCLUSIVE(createverf3),
}

impl Default for createhow3 {
    fn default() -> Self {
        createhow3::UNCHECKED(sattr3::default())
    }
}

impl Serialize for createhow3 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            createhow3::UNCHECKED(attr) => {
                createmode3::UNCHECKED.serialize(dest)?;
                attr.serialize(dest)
            }
            createhow3::GUARDED(attr) => {
                createmode3::GUARDED.serialize(dest)?;
                attr.serialize(dest)
            }
            createhow3::EXCLUSIVE(verf) => {
                createmode3::EXCLUSIVE.serialize(dest)?;
                verf.serialize(dest)
            }
        }
    }
}

impl Deserialize for createhow3 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match deserialize::<createmode3>(src)? {
            createmode3::UNCHECKED => createhow3::UNCHECKED(deserialize(src)?),
            createmode3::GUARDED => createhow3::GUARDED(deserialize(src)?),
            createmode3::EXCLUSIVE => createhow3::EXCLUSIVE(deserialize(src)?),
        };
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct CREATE3args {
    pub dirops: diropargs3,
    pub how: createhow3,
}
DeserializeStruct!(CREATE3args, dirops, how);
SerializeStruct!(CREATE3args, dirops, how);

/// SETATTR is skipped unless the object's ctime still equals this value.
pub type sattrguard3 = Option<nfstime3>;

#[derive(Clone, Debug, Default)]
pub struct SETATTR3args {
    pub object: nfs_fh3,
    pub new_attribute: sattr3,
    pub guard: sattrguard3,
}
DeserializeStruct!(SETATTR3args, object, new_attribute, guard);
SerializeStruct!(SETATTR3args, object, new_attribute, guard);

#[derive(Clone, Debug, Default)]
pub struct ACCESS3args {
    pub object: nfs_fh3,
    pub access: u32,
}
DeserializeStruct!(ACCESS3args, object, access);
SerializeStruct!(ACCESS3args, object, access);

#[derive(Clone, Debug, Default)]
pub struct RENAME3args {
    pub from: diropargs3,
    pub to: diropargs3,
}
DeserializeStruct!(RENAME3args, from, to);
SerializeStruct!(RENAME3args, from, to);

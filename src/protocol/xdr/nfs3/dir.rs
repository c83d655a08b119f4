//! Directory procedures: MKDIR, SYMLINK, MKNOD, LINK, READDIR and READDIRPLUS
//! (RFC 1813 sections 3.3.9 - 3.3.17).

#![allow(non_camel_case_types)]

use num_derive::{FromPrimitive, ToPrimitive};

use super::*;

#[derive(Clone, Debug, Default)]
pub struct MKDIR3args {
    pub dirops: diropargs3,
    pub attributes: sattr3,
}
DeserializeStruct!(MKDIR3args, dirops, attributes);
SerializeStruct!(MKDIR3args, dirops, attributes);

#[derive(Clone, Debug, Default)]
pub struct SYMLINK3args {
    pub dirops: diropargs3,
    pub symlink: symlinkdata3,
}
DeserializeStruct!(SYMLINK3args, dirops, symlink);
SerializeStruct!(SYMLINK3args, dirops, symlink);

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum devicetype3 {
    #[default]
    NF3CHR = 0,
    NF3BLK = 1,
    NF3SOCK = 2,
    NF3FIFO = 3,
}
SerializeEnum!(devicetype3);
DeserializeEnum!(devicetype3);

#[derive(Clone, Debug, Default)]
pub struct devicedata3 {
    pub dev_type: devicetype3,
    pub device: specdata3,
}
DeserializeStruct!(devicedata3, dev_type, device);
SerializeStruct!(devicedata3, dev_type, device);

#[derive(Clone, Debug, Default)]
pub struct mknoddata3 {
    pub mknod_type: ftype3,
    pub device: devicedata3,
}
DeserializeStruct!(mknoddata3, mknod_type, device);
SerializeStruct!(mknoddata3, mknod_type, device);

/// Decoded only to validate the call; MKNOD is answered with NOTSUPP.
#[derive(Clone, Debug, Default)]
pub struct MKNOD3args {
    pub where_dir: diropargs3,
    pub what: mknoddata3,
}
DeserializeStruct!(MKNOD3args, where_dir, what);
SerializeStruct!(MKNOD3args, where_dir, what);

/// Decoded only to validate the call; LINK is answered with NOTSUPP.
#[derive(Clone, Debug, Default)]
pub struct LINK3args {
    pub file: nfs_fh3,
    pub link: diropargs3,
}
DeserializeStruct!(LINK3args, file, link);
SerializeStruct!(LINK3args, file, link);

#[derive(Clone, Debug, Default)]
pub struct READDIR3args {
    pub dir: nfs_fh3,
    /// Zero starts at the beginning of the listing.
    pub cookie: cookie3,
    pub cookieverf: cookieverf3,
    /// Upper bound in bytes for the whole READDIR3resok.
    pub count: count3,
}
DeserializeStruct!(READDIR3args, dir, cookie, cookieverf, count);
SerializeStruct!(READDIR3args, dir, cookie, cookieverf, count);

#[derive(Clone, Debug, Default)]
pub struct READDIRPLUS3args {
    pub dir: nfs_fh3,
    pub cookie: cookie3,
    pub cookieverf: cookieverf3,
    /// Upper bound for the name/fileid/cookie part of the entries.
    pub dircount: count3,
    /// Upper bound for the whole READDIRPLUS3resok.
    pub maxcount: count3,
}
DeserializeStruct!(READDIRPLUS3args, dir, cookie, cookieverf, dircount, maxcount);
SerializeStruct!(READDIRPLUS3args, dir, cookie, cookieverf, dircount, maxcount);

#[derive(Clone, Debug, Default)]
pub struct entry3 {
    pub fileid: fileid3,
    pub name: filename3,
    pub cookie: cookie3,
}
DeserializeStruct!(entry3, fileid, name, cookie);
SerializeStruct!(entry3, fileid, name, cookie);

#[derive(Clone, Debug, Default)]
pub struct entryplus3 {
    pub fileid: fileid3,
    pub name: filename3,
    pub cookie: cookie3,
    pub name_attributes: post_op_attr,
    pub name_handle: post_op_fh3,
}
DeserializeStruct!(entryplus3, fileid, name, cookie, name_attributes, name_handle);
SerializeStruct!(entryplus3, fileid, name, cookie, name_attributes, name_handle);

/// Decoded READDIR3resok. The server streams the list itself, this type is
/// what clients (and tests) read back.
#[derive(Clone, Debug, Default)]
pub struct READDIR3resok {
    pub dir_attributes: post_op_attr,
    pub cookieverf: cookieverf3,
    pub entries: Vec<entry3>,
    pub eof: bool,
}

/// Decoded READDIRPLUS3resok.
#[derive(Clone, Debug, Default)]
pub struct READDIRPLUS3resok {
    pub dir_attributes: post_op_attr,
    pub cookieverf: cookieverf3,
    pub entries: Vec<entryplus3>,
    pub eof: bool,
}

/// Reads the `entry *nextentry` linked list that ends every dirlist.
fn read_entry_list<T, R>(src: &mut R) -> std::io::Result<Vec<T>>
where
    T: Deserialize + Default,
    R: Read,
{
    let mut entries = Vec::new();
    while deserialize::<bool>(src)? {
        entries.push(deserialize::<T>(src)?);
    }
    Ok(entries)
}

fn write_entry_list<T, W>(entries: &[T], eof: bool, dest: &mut W) -> std::io::Result<()>
where
    T: Serialize,
    W: Write,
{
    for entry in entries {
        true.serialize(dest)?;
        entry.serialize(dest)?;
    }
    false.serialize(dest)?;
    eof.serialize(dest)
}

impl Deserialize for READDIR3resok {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.dir_attributes.deserialize(src)?;
        self.cookieverf.deserialize(src)?;
        self.entries = read_entry_list(src)?;
        self.eof.deserialize(src)
    }
}

impl Serialize for READDIR3resok {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.dir_attributes.serialize(dest)?;
        self.cookieverf.serialize(dest)?;
        write_entry_list(&self.entries, self.eof, dest)
    }
}

impl Deserialize for READDIRPLUS3resok {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.dir_attributes.deserialize(src)?;
        self.cookieverf.deserialize(src)?;
        self.entries = read_entry_list(src)?;
        self.eof.deserialize(src)
    }
}

impl Serialize for READDIRPLUS3resok {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.dir_attributes.serialize(dest)?;
        self.cookieverf.serialize(dest)?;
        write_entry_list(&self.entries, self.eof, dest)
    }
}

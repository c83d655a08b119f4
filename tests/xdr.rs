use std::fmt::Debug;

use nfs_gateway::xdr::{deserialize, nfs3, Deserialize, Serialize};

#[derive(Default)]
struct Context {
    buf: Vec<u8>,
}

trait TestValue: Deserialize + Serialize + Eq + Default + Debug + Clone {}
impl<T: Deserialize + Serialize + Eq + Default + Debug + Clone> TestValue for T {}

impl Context {
    /// Encodes behind some unaligned garbage and decodes it back.
    fn check<T: TestValue>(&mut self, src_value: &T) {
        for existing in 0..8 {
            self.buf = vec![0xaa; existing];

            src_value.serialize(&mut self.buf).expect("cannot serialize");
            assert_eq!((self.buf.len() - existing) % 4, 0);

            let result_value =
                deserialize::<T>(&mut &self.buf[existing..]).expect("cannot deserialize");
            assert_eq!(src_value, &result_value);
        }
    }

    fn check_multi<T: TestValue>(&mut self, src_values: &[T]) {
        src_values.iter().for_each(|i| self.check(i));
    }
}

fn encode<T: Serialize>(value: &T) -> Vec<u8> {
    let mut buf = Vec::new();
    value.serialize(&mut buf).expect("cannot serialize");
    buf
}

#[test]
fn test_scalar_bijection() {
    let mut ctx = Context::default();

    ctx.check_multi(&[true, false]);
    ctx.check_multi(&[i32::MIN, -1i32, 0i32, 1i32, i32::MAX]);
    ctx.check_multi(&[u32::MIN, 1u32, 2u32, u32::MAX]);
    ctx.check_multi(&[u64::MIN, 1u64, 2u64, u64::MAX]);
}

#[test]
fn test_opaque_bijection() {
    let mut ctx = Context::default();

    ctx.check(&[1u8]);
    ctx.check(&[1u8, 2u8, 3u8, 4u8, 5u8, 6u8]);
    ctx.check_multi(&[vec![], vec![1u8], vec![1u8, 2u8, 3u8], vec![1u8, 2u8, 3u8, 4u8]]);
    ctx.check_multi(&[vec![], vec![1u32], vec![1u32, 2u32, 3u32]]);
    ctx.check_multi(&[None, Some(7u32)]);
}

#[test]
fn opaque_is_length_prefixed_and_padded() {
    assert_eq!(encode(&b"abcde".to_vec()), [0, 0, 0, 5, b'a', b'b', b'c', b'd', b'e', 0, 0, 0]);
    // fixed size opaque carries no length
    assert_eq!(encode(&[9u8; 8]), [9u8; 8]);
}

#[test]
fn optional_values_are_bool_unions() {
    assert_eq!(encode(&None::<u32>), [0, 0, 0, 0]);
    assert_eq!(encode(&Some(3u32)), [0, 0, 0, 1, 0, 0, 0, 3]);
}

#[test]
fn createhow_switches_on_mode() {
    let verf = [1, 2, 3, 4, 5, 6, 7, 8];
    let encoded = encode(&nfs3::createhow3::EXCLUSIVE(verf));
    assert_eq!(encoded, [0, 0, 0, 2, 1, 2, 3, 4, 5, 6, 7, 8]);
    let decoded = deserialize::<nfs3::createhow3>(&mut &encoded[..]).expect("decode");
    assert_eq!(decoded, nfs3::createhow3::EXCLUSIVE(verf));

    let attr = nfs3::sattr3 { mode: Some(0o600), ..Default::default() };
    let encoded = encode(&nfs3::createhow3::GUARDED(attr));
    assert_eq!(&encoded[..4], &[0, 0, 0, 1]);
    let decoded = deserialize::<nfs3::createhow3>(&mut &encoded[..]).expect("decode");
    assert_eq!(decoded, nfs3::createhow3::GUARDED(attr));
}

#[test]
fn set_time_client_value() {
    let time = nfs3::set_time::SET_TO_CLIENT_TIME(nfs3::nfstime3 { seconds: 5, nseconds: 6 });
    assert_eq!(encode(&time), [0, 0, 0, 2, 0, 0, 0, 5, 0, 0, 0, 6]);
    assert_eq!(encode(&nfs3::set_time::SET_TO_SERVER_TIME), [0, 0, 0, 1]);
}

#[test]
fn directory_entries_are_a_flagged_list() {
    let res = nfs3::dir::READDIR3resok {
        dir_attributes: None,
        cookieverf: [0; 8],
        entries: vec![
            nfs3::dir::entry3 { fileid: 1, name: ".".into(), cookie: 1 },
            nfs3::dir::entry3 { fileid: 2, name: "ab".into(), cookie: 2 },
        ],
        eof: true,
    };
    let encoded = encode(&res);

    let mut expected = vec![0, 0, 0, 0];
    expected.extend([0; 8]);
    expected.extend([0, 0, 0, 1]);
    expected.extend(encode(&1u64));
    expected.extend([0, 0, 0, 1, b'.', 0, 0, 0]);
    expected.extend(encode(&1u64));
    expected.extend([0, 0, 0, 1]);
    expected.extend(encode(&2u64));
    expected.extend([0, 0, 0, 2, b'a', b'b', 0, 0]);
    expected.extend(encode(&2u64));
    expected.extend([0, 0, 0, 0]);
    expected.extend([0, 0, 0, 1]);
    assert_eq!(encoded, expected);

    let decoded = deserialize::<nfs3::dir::READDIR3resok>(&mut &encoded[..]).expect("decode");
    assert_eq!(decoded.entries.len(), 2);
    assert_eq!(decoded.entries[1].name.to_string(), "ab");
    assert!(decoded.eof);
}

#[test]
fn oversized_opaque_length_is_rejected() {
    let encoded = encode(&u32::MAX);
    assert!(deserialize::<Vec<u8>>(&mut &encoded[..]).is_err());
}

#[test]
fn unknown_enum_value_is_rejected() {
    let encoded = encode(&99u32);
    assert!(deserialize::<nfs3::ftype3>(&mut &encoded[..]).is_err());
}

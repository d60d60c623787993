mod encoding;
mod node_id;

use std::{fmt::Debug, io::Cursor};

use crate::types::*;

pub fn serialize_as_stream<T>(value: T) -> Cursor<Vec<u8>>
where
    T: BinaryEncoder<T> + Debug,
{
    // Ask the struct for its byte length
    let byte_len = value.byte_len();
    let mut stream = Cursor::new(vec![0u8; byte_len]);

    let start_pos = stream.position();
    let result = value.encode(&mut stream);
    let end_pos = stream.position();
    assert!(result.is_ok());

    // This ensures the size reported is the same as the byte length impl
    assert_eq!(result.unwrap(), byte_len);
    assert_eq!((end_pos - start_pos) as usize, byte_len);

    let actual = stream.into_inner();
    println!("value = {:?}", value);
    println!("encoded bytes = {:?}", actual);
    Cursor::new(actual)
}

pub fn serialize_test_and_return<T>(value: T) -> T
where
    T: BinaryEncoder<T> + Debug + PartialEq + Clone,
{
    let mut stream = serialize_as_stream(value.clone());
    let decoding_options = DecodingOptions::test();
    let new_value: T = T::decode(&mut stream, &decoding_options).unwrap();
    println!("new value = {:?}", new_value);
    assert_eq!(value, new_value);
    new_value
}

pub fn serialize_test<T>(value: T)
where
    T: BinaryEncoder<T> + Debug + PartialEq + Clone,
{
    let _ = serialize_test_and_return(value);
}

/// Encodes the value and compares it to the expected bytes, then decodes the bytes and compares
/// the result to the value.
pub fn serialize_and_compare<T>(value: T, expected: &[u8])
where
    T: BinaryEncoder<T> + Debug + PartialEq,
{
    let mut stream = serialize_as_stream(value);
    assert_eq!(stream.get_ref().as_slice(), expected);
    let decoding_options = DecodingOptions::test();
    let _ = T::decode(&mut stream, &decoding_options).unwrap();
}

/// Decodes the bytes expecting the decode to fail with the given status
pub fn decode_fails<T>(bytes: &[u8], decoding_options: &DecodingOptions, expected: StatusCode)
where
    T: BinaryEncoder<T> + Debug,
{
    let mut stream = Cursor::new(bytes);
    let result = T::decode(&mut stream, decoding_options);
    assert_eq!(result.unwrap_err(), expected);
}

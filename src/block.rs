
use std::io::{self, Cursor, Error, ErrorKind};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// Header of an IEEE-488.2 definite-length arbitrary block: `#` followed by
/// the decimal digit count of the byte-length field, then the byte length
/// itself.  128000 bytes encodes as `#6128000`.
pub fn definite_length_header(num_bytes: usize) -> String {
    let len = num_bytes.to_string();
    format!("#{}{}", len.len(), len)
}

// Packing methods produce exactly two bytes per sample, so the declared
// block length is always 2x the sample count

pub fn pack_samples(samples: &[i16]) -> io::Result<Vec<u8>> {
    let mut buff: Vec<u8> = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        buff.write_i16::<LittleEndian>(s)?;
    }
    Ok(buff)
}

pub fn unpack_samples(data: &[u8]) -> io::Result<Vec<i16>> {
    if data.len() % 2 != 0 {
        return Err(Error::new(ErrorKind::Other, "Block payload has an odd number of bytes"));
    }

    let mut rdr = Cursor::new(data);
    let mut samples: Vec<i16> = Vec::with_capacity(data.len() / 2);
    for _ in 0..(data.len() / 2) {
        samples.push(rdr.read_i16::<LittleEndian>()?);
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn header_digit_count_matches_length_field() {
        assert_eq!(definite_length_header(128_000), "#6128000");
        assert_eq!(definite_length_header(8), "#18");
        assert_eq!(definite_length_header(1_000_000), "#71000000");
    }

    #[test]
    fn samples_pack_little_endian() {
        let packed = pack_samples(&[2047]).unwrap();
        assert_eq!(packed, vec![0xFF, 0x07]);

        let packed = pack_samples(&[-1, 0, 256]).unwrap();
        assert_eq!(packed, vec![0xFF, 0xFF, 0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn pack_then_unpack_is_lossless() {
        let samples: Vec<i16> = vec![0, 1, -1, 2047, -2047, i16::MAX, i16::MIN, 1234];
        let packed = pack_samples(&samples).unwrap();
        assert_eq!(packed.len(), samples.len() * 2);
        assert_eq!(unpack_samples(&packed).unwrap(), samples);
    }

    #[test]
    fn odd_length_payload_is_rejected() {
        assert!(unpack_samples(&[0x01, 0x02, 0x03]).is_err());
    }

}

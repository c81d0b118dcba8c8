use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{DiameterError, Result};

pub const AVP_FLAG_VENDOR: u8 = 0x80;
pub const AVP_FLAG_MANDATORY: u8 = 0x40;

/// One attribute-value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avp {
    pub code: u32,
    pub flags: u8,
    pub vendor_id: Option<u32>,
    pub data: Bytes,
}

impl Avp {
    pub fn octets(code: u32, vendor_id: Option<u32>, data: impl Into<Bytes>) -> Self {
        let flags = match vendor_id {
            Some(_) => AVP_FLAG_VENDOR | AVP_FLAG_MANDATORY,
            None => AVP_FLAG_MANDATORY,
        };
        Self { code, flags, vendor_id, data: data.into() }
    }

    pub fn utf8(code: u32, vendor_id: Option<u32>, value: &str) -> Self {
        Self::octets(code, vendor_id, Bytes::copy_from_slice(value.as_bytes()))
    }

    pub fn unsigned32(code: u32, vendor_id: Option<u32>, value: u32) -> Self {
        let mut data = BytesMut::with_capacity(4);
        data.put_u32(value);
        Self::octets(code, vendor_id, data.freeze())
    }

    pub fn enumerated(code: u32, vendor_id: Option<u32>, value: i32) -> Self {
        let mut data = BytesMut::with_capacity(4);
        data.put_i32(value);
        Self::octets(code, vendor_id, data.freeze())
    }

    pub fn grouped(code: u32, vendor_id: Option<u32>, members: Vec<Avp>) -> Self {
        let mut data = BytesMut::new();
        for member in &members {
            member.encode(&mut data);
        }
        Self::octets(code, vendor_id, data.freeze())
    }

    pub fn as_utf8(&self) -> Result<String> {
        String::from_utf8(self.data.to_vec())
            .map_err(|_| DiameterError::Codec(format!("AVP {} is not UTF-8", self.code)))
    }

    pub fn as_unsigned32(&self) -> Result<u32> {
        if self.data.len() != 4 {
            return Err(DiameterError::Codec(format!(
                "AVP {} has {} data octets, expected 4",
                self.code,
                self.data.len()
            )));
        }
        Ok(u32::from_be_bytes([self.data[0], self.data[1], self.data[2], self.data[3]]))
    }

    pub fn as_enumerated(&self) -> Result<i32> {
        self.as_unsigned32().map(|v| v as i32)
    }

    pub fn as_grouped(&self) -> Result<Vec<Avp>> {
        let mut cursor = self.data.clone();
        let mut members = Vec::new();
        while cursor.has_remaining() {
            members.push(Avp::decode(&mut cursor)?);
        }
        Ok(members)
    }

    fn header_len(&self) -> usize {
        if self.vendor_id.is_some() {
            12
        } else {
            8
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        let length = self.header_len() + self.data.len();
        buf.put_u32(self.code);
        buf.put_u8(self.flags);
        buf.put_uint(length as u64, 3);
        if let Some(vendor_id) = self.vendor_id {
            buf.put_u32(vendor_id);
        }
        buf.put_slice(&self.data);
        // Pad to a 32-bit boundary.
        let padding = (4 - length % 4) % 4;
        buf.put_bytes(0, padding);
    }

    pub fn decode(buf: &mut Bytes) -> Result<Avp> {
        if buf.remaining() < 8 {
            return Err(DiameterError::Codec("truncated AVP header".into()));
        }
        let code = buf.get_u32();
        let flags = buf.get_u8();
        let length = buf.get_uint(3) as usize;

        let has_vendor = flags & AVP_FLAG_VENDOR != 0;
        let header_len = if has_vendor { 12 } else { 8 };
        if length < header_len {
            return Err(DiameterError::Codec(format!("AVP {code} length {length} too short")));
        }

        let vendor_id = if has_vendor {
            if buf.remaining() < 4 {
                return Err(DiameterError::Codec("truncated vendor id".into()));
            }
            Some(buf.get_u32())
        } else {
            None
        };

        let data_len = length - header_len;
        let padding = (4 - length % 4) % 4;
        if buf.remaining() < data_len + padding {
            return Err(DiameterError::Codec(format!("truncated AVP {code} data")));
        }
        let data = buf.split_to(data_len);
        buf.advance(padding);

        Ok(Avp { code, flags, vendor_id, data })
    }
}

/// First AVP with the given code, ignoring vendor qualification (the codes
/// in our dictionary subset are unambiguous).
pub fn find<'a>(avps: &'a [Avp], code: u32) -> Option<&'a Avp> {
    avps.iter().find(|avp| avp.code == code)
}

pub fn find_all<'a>(avps: &'a [Avp], code: u32) -> impl Iterator<Item = &'a Avp> {
    avps.iter().filter(move |avp| avp.code == code)
}

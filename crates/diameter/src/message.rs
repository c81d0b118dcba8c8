use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::avp::{self, Avp};
use crate::dictionary::{
    AVP_EXPERIMENTAL_RESULT, AVP_EXPERIMENTAL_RESULT_CODE, AVP_RESULT_CODE, AVP_SESSION_ID,
};
use crate::{DiameterError, Result};

pub const FLAG_REQUEST: u8 = 0x80;
pub const FLAG_PROXYABLE: u8 = 0x40;

const HEADER_LEN: usize = 20;
const DIAMETER_VERSION: u8 = 1;

/// A Diameter message: header plus AVP list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub code: u32,
    pub application_id: u32,
    pub flags: u8,
    pub hop_by_hop: u32,
    pub end_to_end: u32,
    pub avps: Vec<Avp>,
}

impl Message {
    pub fn request(code: u32, application_id: u32) -> Self {
        Self {
            code,
            application_id,
            flags: FLAG_REQUEST | FLAG_PROXYABLE,
            hop_by_hop: rand::random(),
            end_to_end: rand::random(),
            avps: Vec::new(),
        }
    }

    /// An answer template for this request: same command, application and
    /// identifiers, request bit cleared.
    pub fn answer(&self) -> Self {
        Self {
            code: self.code,
            application_id: self.application_id,
            flags: self.flags & !FLAG_REQUEST,
            hop_by_hop: self.hop_by_hop,
            end_to_end: self.end_to_end,
            avps: Vec::new(),
        }
    }

    pub fn is_request(&self) -> bool {
        self.flags & FLAG_REQUEST != 0
    }

    pub fn with_avp(mut self, avp: Avp) -> Self {
        self.avps.push(avp);
        self
    }

    pub fn add_avp(&mut self, avp: Avp) {
        self.avps.push(avp);
    }

    pub fn avp(&self, code: u32) -> Option<&Avp> {
        avp::find(&self.avps, code)
    }

    pub fn avps_with(&self, code: u32) -> impl Iterator<Item = &Avp> {
        avp::find_all(&self.avps, code)
    }

    pub fn str_avp(&self, code: u32) -> Option<String> {
        self.avp(code).and_then(|avp| avp.as_utf8().ok())
    }

    pub fn u32_avp(&self, code: u32) -> Option<u32> {
        self.avp(code).and_then(|avp| avp.as_unsigned32().ok())
    }

    pub fn i32_avp(&self, code: u32) -> Option<i32> {
        self.avp(code).and_then(|avp| avp.as_enumerated().ok())
    }

    pub fn session_id(&self) -> Option<String> {
        self.str_avp(AVP_SESSION_ID)
    }

    pub fn result_code(&self) -> Option<u32> {
        self.u32_avp(AVP_RESULT_CODE)
    }

    /// Experimental-Result-Code inside the grouped Experimental-Result.
    pub fn experimental_result_code(&self) -> Option<u32> {
        let grouped = self.avp(AVP_EXPERIMENTAL_RESULT)?.as_grouped().ok()?;
        avp::find(&grouped, AVP_EXPERIMENTAL_RESULT_CODE)?.as_unsigned32().ok()
    }

    pub fn encode(&self) -> Bytes {
        let mut body = BytesMut::new();
        for avp in &self.avps {
            avp.encode(&mut body);
        }

        let mut buf = BytesMut::with_capacity(HEADER_LEN + body.len());
        buf.put_u8(DIAMETER_VERSION);
        buf.put_uint((HEADER_LEN + body.len()) as u64, 3);
        buf.put_u8(self.flags);
        buf.put_uint(self.code as u64, 3);
        buf.put_u32(self.application_id);
        buf.put_u32(self.hop_by_hop);
        buf.put_u32(self.end_to_end);
        buf.put_slice(&body);
        buf.freeze()
    }

    pub fn decode(mut frame: Bytes) -> Result<Message> {
        if frame.len() < HEADER_LEN {
            return Err(DiameterError::Codec("truncated header".into()));
        }

        let version = frame.get_u8();
        if version != DIAMETER_VERSION {
            return Err(DiameterError::Codec(format!("unsupported version {version}")));
        }
        let length = frame.get_uint(3) as usize;
        if length < HEADER_LEN {
            return Err(DiameterError::Codec(format!("length field {length} too short")));
        }
        let flags = frame.get_u8();
        let code = frame.get_uint(3) as u32;
        let application_id = frame.get_u32();
        let hop_by_hop = frame.get_u32();
        let end_to_end = frame.get_u32();

        if frame.remaining() != length - HEADER_LEN {
            return Err(DiameterError::Codec(format!(
                "length field {length} does not match frame of {} octets",
                HEADER_LEN + frame.remaining()
            )));
        }

        let mut avps = Vec::new();
        while frame.has_remaining() {
            avps.push(Avp::decode(&mut frame)?);
        }

        Ok(Message { code, application_id, flags, hop_by_hop, end_to_end, avps })
    }
}

/// Read the message length out of the fixed header, for framing.
pub fn frame_length(header: &[u8; 4]) -> usize {
    u32::from_be_bytes([0, header[1], header[2], header[3]]) as usize
}

/// A unique session id in the conventional `host;high;low` form.
pub fn new_session_id(origin_host: &str) -> String {
    let high: u32 = rand::random();
    let low: u32 = rand::random();
    format!("{origin_host};{high};{low}")
}

//! The lc0 V6 training record and its packed little-endian codec.

use crate::encoder::PLANE_COUNT;
use crate::policy::POLICY_SIZE;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

pub const V6_VERSION: u32 = 6;

/// Size of one packed record in bytes.
pub const V6_RECORD_SIZE: usize = 8356;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSample {
    pub version: u32,
    pub input_format: u32,
    /// `-1` for illegal moves, `0` for legal ones, `1` for the played move.
    pub probabilities: [f32; POLICY_SIZE],
    /// Stored with the bits of every byte reversed (h-file in bit 0).
    pub planes: [u64; PLANE_COUNT],
    pub castling_us_ooo: u8,
    pub castling_us_oo: u8,
    pub castling_them_ooo: u8,
    pub castling_them_oo: u8,
    pub side_to_move_or_enpassant: u8,
    pub rule50_count: u8,
    pub invariance_info: u8,
    pub dummy: u8,
    pub root_q: f32,
    pub best_q: f32,
    pub root_d: f32,
    pub best_d: f32,
    pub root_m: f32,
    pub best_m: f32,
    pub plies_left: f32,
    pub result_q: f32,
    pub result_d: f32,
    pub played_q: f32,
    pub played_d: f32,
    pub played_m: f32,
    pub orig_q: f32,
    pub orig_d: f32,
    pub orig_m: f32,
    pub visits: u32,
    pub played_idx: u16,
    pub best_idx: u16,
    pub policy_kld: f32,
    pub reserved: u32,
}

impl Default for TrainingSample {
    fn default() -> Self {
        Self {
            version: V6_VERSION,
            input_format: 1,
            probabilities: [-1.0; POLICY_SIZE],
            planes: [0; PLANE_COUNT],
            castling_us_ooo: 0,
            castling_us_oo: 0,
            castling_them_ooo: 0,
            castling_them_oo: 0,
            side_to_move_or_enpassant: 0,
            rule50_count: 0,
            invariance_info: 0,
            dummy: 0,
            root_q: 0.0,
            best_q: 0.0,
            root_d: 0.0,
            best_d: 0.0,
            root_m: 0.0,
            best_m: 0.0,
            plies_left: 0.0,
            result_q: 0.0,
            result_d: 0.0,
            played_q: 0.0,
            played_d: 0.0,
            played_m: 0.0,
            orig_q: 0.0,
            orig_d: 0.0,
            orig_m: 0.0,
            visits: 0,
            played_idx: 0,
            best_idx: 0,
            policy_kld: 0.0,
            reserved: 0,
        }
    }
}

impl TrainingSample {
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.version)?;
        w.write_u32::<LittleEndian>(self.input_format)?;
        for &p in &self.probabilities {
            w.write_f32::<LittleEndian>(p)?;
        }
        for &plane in &self.planes {
            w.write_u64::<LittleEndian>(plane)?;
        }
        w.write_all(&[
            self.castling_us_ooo,
            self.castling_us_oo,
            self.castling_them_ooo,
            self.castling_them_oo,
            self.side_to_move_or_enpassant,
            self.rule50_count,
            self.invariance_info,
            self.dummy,
        ])?;
        for v in [
            self.root_q,
            self.best_q,
            self.root_d,
            self.best_d,
            self.root_m,
            self.best_m,
            self.plies_left,
            self.result_q,
            self.result_d,
            self.played_q,
            self.played_d,
            self.played_m,
            self.orig_q,
            self.orig_d,
            self.orig_m,
        ] {
            w.write_f32::<LittleEndian>(v)?;
        }
        w.write_u32::<LittleEndian>(self.visits)?;
        w.write_u16::<LittleEndian>(self.played_idx)?;
        w.write_u16::<LittleEndian>(self.best_idx)?;
        w.write_f32::<LittleEndian>(self.policy_kld)?;
        w.write_u32::<LittleEndian>(self.reserved)?;
        Ok(())
    }

    /// Read one record. Returns `Ok(None)` at a clean end of stream and
    /// `UnexpectedEof` for a truncated record.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Option<Self>> {
        let mut buf = [0u8; V6_RECORD_SIZE];
        let mut filled = 0;
        while filled < V6_RECORD_SIZE {
            match r.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        match filled {
            0 => return Ok(None),
            V6_RECORD_SIZE => {}
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("truncated record: {filled} of {V6_RECORD_SIZE} bytes"),
                ));
            }
        }
        Self::decode(&mut &buf[..]).map(Some)
    }

    fn decode(r: &mut &[u8]) -> io::Result<Self> {
        let mut sample = Self {
            version: r.read_u32::<LittleEndian>()?,
            input_format: r.read_u32::<LittleEndian>()?,
            ..Self::default()
        };
        r.read_f32_into::<LittleEndian>(&mut sample.probabilities)?;
        r.read_u64_into::<LittleEndian>(&mut sample.planes)?;

        let mut bytes = [0u8; 8];
        r.read_exact(&mut bytes)?;
        [
            sample.castling_us_ooo,
            sample.castling_us_oo,
            sample.castling_them_ooo,
            sample.castling_them_oo,
            sample.side_to_move_or_enpassant,
            sample.rule50_count,
            sample.invariance_info,
            sample.dummy,
        ] = bytes;

        let mut floats = [0f32; 15];
        r.read_f32_into::<LittleEndian>(&mut floats)?;
        [
            sample.root_q,
            sample.best_q,
            sample.root_d,
            sample.best_d,
            sample.root_m,
            sample.best_m,
            sample.plies_left,
            sample.result_q,
            sample.result_d,
            sample.played_q,
            sample.played_d,
            sample.played_m,
            sample.orig_q,
            sample.orig_d,
            sample.orig_m,
        ] = floats;

        sample.visits = r.read_u32::<LittleEndian>()?;
        sample.played_idx = r.read_u16::<LittleEndian>()?;
        sample.best_idx = r.read_u16::<LittleEndian>()?;
        sample.policy_kld = r.read_f32::<LittleEndian>()?;
        sample.reserved = r.read_u32::<LittleEndian>()?;
        Ok(sample)
    }

    /// Index of the single probability entry equal to 1.
    pub fn played_policy_index(&self) -> Option<usize> {
        self.probabilities.iter().position(|&p| p == 1.0)
    }
}

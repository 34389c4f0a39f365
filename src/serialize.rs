//! Versioned little-endian byte layout for ciphertexts and keys.
//!
//! Every blob starts with `b"RFHE" | version: u16 | kind: u8`. Ring elements
//! are written as `count: u32 | N: u64` followed, per prime in chain order, by
//! `q_i: u64` and N residues in coefficient order. Decoding always happens
//! against a context and rejects blobs that do not fit it.

use std::sync::Arc;

use crate::bfv::BfvCiphertext;
use crate::ckks::CkksCiphertext;
use crate::error::{FheError, Result};
use crate::keys::{GaloisKey, KeyContext, PublicKey, RelinKey, SwitchingKey};
use crate::params::{BfvParams, CkksParams, ModulusChain};
use crate::ring::rns::{RnsBasis, RnsPoly};

const MAGIC: &[u8; 4] = b"RFHE";
const VERSION: u16 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum Kind {
    Ciphertext = 1,
    PublicKey = 2,
    RelinKey = 3,
    GaloisKey = 4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum SchemeTag {
    Bfv = 0,
    Ckks = 1,
}

fn corrupt(msg: impl Into<String>) -> FheError {
    FheError::Serialization(msg.into())
}

struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    fn new(kind: Kind) -> Self {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend(VERSION.to_le_bytes());
        bytes.push(kind as u8);
        Self { bytes }
    }

    fn u8(&mut self, v: u8) {
        self.bytes.push(v);
    }

    fn u32(&mut self, v: u32) {
        self.bytes.extend(v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.bytes.extend(v.to_le_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.bytes.extend(v.to_le_bytes());
    }

    fn poly(&mut self, poly: &RnsPoly) {
        self.u32(poly.num_components() as u32);
        self.u64(poly.ring_degree as u64);
        self.bytes.reserve(poly.num_components() * (poly.ring_degree + 1) * 8);
        for comp in poly.to_coeff_polys() {
            self.u64(comp.modulus);
            for &c in &comp.coeffs {
                self.u64(c);
            }
        }
    }

    fn switching_key(&mut self, key: &SwitchingKey) {
        self.u64(key.key_id);
        self.u32(key.keys.len() as u32);
        for (b, a) in &key.keys {
            self.poly(b);
            self.poly(a);
        }
    }

    fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8], kind: Kind) -> Result<Self> {
        let mut reader = Self { bytes, pos: 0 };
        if reader.take(4)? != MAGIC {
            return Err(corrupt("bad magic"));
        }
        let version = reader.u16()?;
        if version != VERSION {
            return Err(corrupt(format!("unsupported version {version}")));
        }
        let got = reader.u8()?;
        if got != kind as u8 {
            return Err(corrupt(format!("expected kind {}, found {got}", kind as u8)));
        }
        Ok(reader)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or_else(|| corrupt("length overflow"))?;
        let slice = self.bytes.get(self.pos..end).ok_or_else(|| corrupt("unexpected end of input"))?;
        self.pos = end;
        Ok(slice)
    }

    fn array<const K: usize>(&mut self) -> Result<[u8; K]> {
        self.take(K)?.try_into().map_err(|_| corrupt("truncated field"))
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    /// A ring element that must live over exactly `basis`.
    fn poly(&mut self, basis: &RnsBasis) -> Result<RnsPoly> {
        let count = self.u32()? as usize;
        if count != basis.num_moduli() {
            return Err(FheError::ModulusMismatch);
        }
        let n = self.u64()?;
        if n != basis.ring_degree as u64 {
            return Err(FheError::InvalidDegree { expected: basis.ring_degree, got: n as usize });
        }
        let residues = basis
            .moduli
            .iter()
            .map(|&q| {
                if self.u64()? != q {
                    return Err(FheError::ModulusMismatch);
                }
                (0..basis.ring_degree)
                    .map(|_| {
                        let c = self.u64()?;
                        if c >= q {
                            return Err(corrupt(format!("residue {c} not below {q}")));
                        }
                        Ok(c)
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        basis.from_residues(residues)
    }

    fn switching_key(&mut self, chain: &Arc<ModulusChain>) -> Result<SwitchingKey> {
        let key_id = self.u64()?;
        let count = self.u32()? as usize;
        if count != chain.top_level() + 1 {
            return Err(FheError::ModulusMismatch);
        }
        let ext = chain.extended_basis(chain.top_level())?;
        let keys = (0..count)
            .map(|_| Ok((self.poly(ext)?, self.poly(ext)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(SwitchingKey { keys, key_id, chain: chain.clone() })
    }

    fn finish(self) -> Result<()> {
        if self.pos != self.bytes.len() {
            return Err(corrupt(format!("{} trailing bytes", self.bytes.len() - self.pos)));
        }
        Ok(())
    }
}

/// Shared ciphertext header: scheme, level, scale, noise, key id, components.
fn write_ciphertext(
    tag: SchemeTag,
    level: usize,
    scale: f64,
    noise_bits: f64,
    key_id: u64,
    c: &[RnsPoly],
) -> Vec<u8> {
    let mut w = Writer::new(Kind::Ciphertext);
    w.u8(tag as u8);
    w.u32(level as u32);
    w.f64(scale);
    w.f64(noise_bits);
    w.u64(key_id);
    w.u32(c.len() as u32);
    for poly in c {
        w.poly(poly);
    }
    w.finish()
}

struct CiphertextParts {
    scale: f64,
    noise_bits: f64,
    key_id: u64,
    c: Vec<RnsPoly>,
}

fn read_ciphertext(bytes: &[u8], tag: SchemeTag, chain: &ModulusChain, max_level: usize) -> Result<CiphertextParts> {
    let mut r = Reader::new(bytes, Kind::Ciphertext)?;
    let got = r.u8()?;
    if got != tag as u8 {
        return Err(corrupt(format!("ciphertext belongs to scheme {got}, expected {}", tag as u8)));
    }
    let level = r.u32()? as usize;
    if level > max_level {
        return Err(FheError::ModulusMismatch);
    }
    let scale = r.f64()?;
    let noise_bits = r.f64()?;
    let key_id = r.u64()?;
    let count = r.u32()? as usize;
    if !(2..=3).contains(&count) {
        return Err(corrupt(format!("ciphertext with {count} components")));
    }
    let basis = chain.basis(level)?;
    let c = (0..count).map(|_| r.poly(basis)).collect::<Result<Vec<_>>>()?;
    r.finish()?;
    Ok(CiphertextParts { scale, noise_bits, key_id, c })
}

pub fn serialize_bfv_ciphertext(ct: &BfvCiphertext) -> Vec<u8> {
    write_ciphertext(SchemeTag::Bfv, ct.level(), 1.0, ct.noise_bits, ct.key_id, &ct.c)
}

pub fn deserialize_bfv_ciphertext(bytes: &[u8], params: &Arc<BfvParams>) -> Result<BfvCiphertext> {
    let parts = read_ciphertext(bytes, SchemeTag::Bfv, &params.chain, params.top_level())?;
    Ok(BfvCiphertext {
        c: parts.c,
        noise_bits: parts.noise_bits,
        key_id: parts.key_id,
        params: params.clone(),
    })
}

pub fn serialize_ckks_ciphertext(ct: &CkksCiphertext) -> Vec<u8> {
    write_ciphertext(SchemeTag::Ckks, ct.level(), ct.scale, ct.noise_bits, ct.key_id, &ct.c)
}

/// Levels above `max_level` (the bootstrap primes) are accepted too.
pub fn deserialize_ckks_ciphertext(bytes: &[u8], params: &Arc<CkksParams>) -> Result<CkksCiphertext> {
    let parts = read_ciphertext(bytes, SchemeTag::Ckks, &params.chain, params.physical_top())?;
    if !(parts.scale.is_finite() && parts.scale > 0.0) {
        return Err(corrupt(format!("invalid scale {}", parts.scale)));
    }
    Ok(CkksCiphertext {
        c: parts.c,
        scale: parts.scale,
        noise_bits: parts.noise_bits,
        key_id: parts.key_id,
        params: params.clone(),
    })
}

pub fn serialize_public_key(pk: &PublicKey) -> Vec<u8> {
    let mut w = Writer::new(Kind::PublicKey);
    w.u64(pk.key_id);
    w.poly(&pk.p0);
    w.poly(&pk.p1);
    w.finish()
}

pub fn deserialize_public_key<C: KeyContext>(bytes: &[u8], ctx: &C) -> Result<PublicKey> {
    let chain = ctx.chain();
    let basis = chain.basis(chain.top_level())?;
    let mut r = Reader::new(bytes, Kind::PublicKey)?;
    let key_id = r.u64()?;
    let p0 = r.poly(basis)?;
    let p1 = r.poly(basis)?;
    r.finish()?;
    Ok(PublicKey { p0, p1, key_id, chain: chain.clone() })
}

pub fn serialize_relin_key(rk: &RelinKey) -> Vec<u8> {
    let mut w = Writer::new(Kind::RelinKey);
    w.switching_key(&rk.key);
    w.finish()
}

pub fn deserialize_relin_key<C: KeyContext>(bytes: &[u8], ctx: &C) -> Result<RelinKey> {
    let mut r = Reader::new(bytes, Kind::RelinKey)?;
    let key = r.switching_key(ctx.chain())?;
    r.finish()?;
    Ok(RelinKey { key })
}

pub fn serialize_galois_key(gk: &GaloisKey) -> Vec<u8> {
    let mut w = Writer::new(Kind::GaloisKey);
    w.u64(gk.element as u64);
    w.switching_key(&gk.key);
    w.finish()
}

pub fn deserialize_galois_key<C: KeyContext>(bytes: &[u8], ctx: &C) -> Result<GaloisKey> {
    let mut r = Reader::new(bytes, Kind::GaloisKey)?;
    let element = r.u64()? as usize;
    let two_n = 2 * ctx.chain().ring_degree();
    if element % 2 == 0 || element >= two_n {
        return Err(corrupt(format!("Galois element {element} is not a unit below {two_n}")));
    }
    let key = r.switching_key(ctx.chain())?;
    r.finish()?;
    Ok(GaloisKey { element, key })
}

//! INP/INX container codec.
//!
//! Layout (integers are big-endian):
//! - `TRNSRTS\0` magic, `u32` JSON length, JSON payload
//! - `TEX_SECT`, `u32` texture count, then per texture `u32` length, `u8` encoding, data
//! - optional `EXT_SECT`, `u32` entry count, then per entry a length-prefixed
//!   name and a length-prefixed payload

use crate::error::{PuppetError, Result};

pub const MAGIC: &[u8; 8] = b"TRNSRTS\0";
pub const TEX_SECTION: &[u8; 8] = b"TEX_SECT";
pub const EXT_SECTION: &[u8; 8] = b"EXT_SECT";

/// Encoding tag of an embedded texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureEncoding {
    Png,
    Tga,
    Bc7,
}

impl TextureEncoding {
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(TextureEncoding::Png),
            1 => Ok(TextureEncoding::Tga),
            2 => Ok(TextureEncoding::Bc7),
            other => Err(PuppetError::UnknownTextureEncoding(other)),
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            TextureEncoding::Png => 0,
            TextureEncoding::Tga => 1,
            TextureEncoding::Bc7 => 2,
        }
    }
}

/// One encoded texture blob.
#[derive(Clone, Debug, PartialEq)]
pub struct InpTexture {
    pub encoding: TextureEncoding,
    pub data: Vec<u8>,
}

/// Decoded container: raw JSON plus still-encoded textures.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InpFile {
    pub json: String,
    pub textures: Vec<InpTexture>,
    /// Vendor extension payloads, in file order.
    pub extensions: Vec<(String, Vec<u8>)>,
}

/// Whether `bytes` starts with the INP magic.
pub fn is_inp(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, section: &'static str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or(PuppetError::Truncated { section })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u32(&mut self, section: &'static str) -> Result<u32> {
        let b = self.take(4, section)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u8(&mut self, section: &'static str) -> Result<u8> {
        Ok(self.take(1, section)?[0])
    }

    fn tag(&mut self, expected: &'static [u8; 8], name: &'static str) -> Result<()> {
        let found = self.take(8, name)?;
        if found != expected {
            return Err(PuppetError::BadSection {
                expected: name,
                found: String::from_utf8_lossy(found).into_owned(),
            });
        }
        Ok(())
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

/// Parse an INP/INX buffer.
pub fn read_inp(bytes: &[u8]) -> Result<InpFile> {
    if bytes.is_empty() {
        return Err(PuppetError::Empty);
    }
    if !is_inp(bytes) {
        return Err(PuppetError::BadMagic);
    }
    let mut r = Reader {
        buf: bytes,
        pos: MAGIC.len(),
    };

    let json_len = r.u32("puppet json")? as usize;
    let json = std::str::from_utf8(r.take(json_len, "puppet json")?)?.to_owned();

    r.tag(TEX_SECTION, "TEX_SECT")?;
    let count = r.u32("TEX_SECT")?;
    let mut textures = Vec::new();
    for _ in 0..count {
        let len = r.u32("TEX_SECT")? as usize;
        let encoding = TextureEncoding::from_tag(r.u8("TEX_SECT")?)?;
        let data = r.take(len, "TEX_SECT")?.to_vec();
        textures.push(InpTexture { encoding, data });
    }

    let mut extensions = Vec::new();
    if r.remaining() > 0 {
        r.tag(EXT_SECTION, "EXT_SECT")?;
        let count = r.u32("EXT_SECT")?;
        for _ in 0..count {
            let name_len = r.u32("EXT_SECT")? as usize;
            let name = String::from_utf8_lossy(r.take(name_len, "EXT_SECT")?).into_owned();
            let payload_len = r.u32("EXT_SECT")? as usize;
            let payload = r.take(payload_len, "EXT_SECT")?.to_vec();
            extensions.push((name, payload));
        }
    }

    log::debug!(
        "read INP container: {} bytes json, {} textures, {} extensions",
        json.len(),
        textures.len(),
        extensions.len()
    );
    Ok(InpFile {
        json,
        textures,
        extensions,
    })
}

fn push_len(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&(len as u32).to_be_bytes());
}

/// Serialize a container. The extension section is only written when non-empty.
pub fn write_inp(file: &InpFile) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        32 + file.json.len() + file.textures.iter().map(|t| t.data.len() + 5).sum::<usize>(),
    );
    out.extend_from_slice(MAGIC);
    push_len(&mut out, file.json.len());
    out.extend_from_slice(file.json.as_bytes());

    out.extend_from_slice(TEX_SECTION);
    push_len(&mut out, file.textures.len());
    for tex in &file.textures {
        push_len(&mut out, tex.data.len());
        out.push(tex.encoding.tag());
        out.extend_from_slice(&tex.data);
    }

    if !file.extensions.is_empty() {
        out.extend_from_slice(EXT_SECTION);
        push_len(&mut out, file.extensions.len());
        for (name, payload) in &file.extensions {
            push_len(&mut out, name.len());
            out.extend_from_slice(name.as_bytes());
            push_len(&mut out, payload.len());
            out.extend_from_slice(payload);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InpFile {
        InpFile {
            json: r#"{"meta":{"name":"x"}}"#.into(),
            textures: vec![InpTexture {
                encoding: TextureEncoding::Tga,
                data: vec![1, 2, 3],
            }],
            extensions: vec![("com.example".into(), vec![9, 9])],
        }
    }

    #[test]
    fn container_survives_write_then_read() {
        let file = sample();
        assert_eq!(read_inp(&write_inp(&file)).unwrap(), file);
    }

    #[test]
    fn truncated_texture_names_section() {
        let mut bytes = write_inp(&InpFile {
            extensions: vec![],
            ..sample()
        });
        bytes.pop();
        match read_inp(&bytes) {
            Err(PuppetError::Truncated { section }) => assert_eq!(section, "TEX_SECT"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_and_foreign_data() {
        assert!(matches!(read_inp(&[]), Err(PuppetError::Empty)));
        assert!(matches!(read_inp(b"PNG...."), Err(PuppetError::BadMagic)));
    }

    #[test]
    fn rejects_unknown_encoding() {
        let mut bytes = write_inp(&InpFile {
            extensions: vec![],
            ..sample()
        });
        // encoding byte sits after magic, json, tag, count, length
        let json_len = sample().json.len();
        let idx = 8 + 4 + json_len + 8 + 4 + 4;
        bytes[idx] = 7;
        assert!(matches!(
            read_inp(&bytes),
            Err(PuppetError::UnknownTextureEncoding(7))
        ));
    }
}
